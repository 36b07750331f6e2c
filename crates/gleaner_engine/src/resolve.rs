use std::time::Duration;

use gleaner_logging::gleaner_debug;
use thiserror::Error;

use gleaner_core::{OriginalRef, ThumbnailRef};

use crate::browse::{BrowseError, FeedPage, LinkedView};

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error(transparent)]
    Browse(#[from] BrowseError),
    #[error("view yielded no valid original source")]
    InvalidSource,
}

#[derive(Debug, Clone)]
pub struct ResolveSettings {
    /// Total attempts per thumbnail before it is skipped.
    pub max_attempts: u32,
    /// Delay between attempts.
    pub retry_backoff: Duration,
    /// Bound on waiting for the linked view to finish loading.
    pub idle_timeout: Duration,
    /// Grace delay after the view reports idle, for client-side
    /// rendering to settle.
    pub settle_grace: Duration,
}

impl Default for ResolveSettings {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            retry_backoff: Duration::from_secs(2),
            idle_timeout: Duration::from_secs(30),
            settle_grace: Duration::from_secs(2),
        }
    }
}

/// Performs the two-hop resolution from a thumbnail to its original.
///
/// Resolution shares the target's single viewport, so callers run it
/// sequentially per thumbnail; only the later download stage fans out.
pub struct Resolver {
    settings: ResolveSettings,
}

impl Resolver {
    pub fn new(settings: ResolveSettings) -> Self {
        Self { settings }
    }

    /// Resolve one thumbnail, retrying transient failures. `None` after
    /// exhausting every attempt; the caller skips the thumbnail and the
    /// containing harvest continues.
    pub async fn resolve(
        &self,
        page: &dyn FeedPage,
        thumbnail: &ThumbnailRef,
    ) -> Option<OriginalRef> {
        let attempts = self.settings.max_attempts.max(1);
        for attempt in 1..=attempts {
            match self.attempt(page, thumbnail).await {
                Ok(original) => return Some(original),
                Err(error) => {
                    gleaner_debug!(
                        "resolve attempt {attempt}/{attempts} failed for {thumbnail}: {error}"
                    );
                    if attempt < attempts && !self.settings.retry_backoff.is_zero() {
                        tokio::time::sleep(self.settings.retry_backoff).await;
                    }
                }
            }
        }
        None
    }

    async fn attempt(
        &self,
        page: &dyn FeedPage,
        thumbnail: &ThumbnailRef,
    ) -> Result<OriginalRef, ResolveError> {
        let view = page.open_linked_view(thumbnail.as_str()).await?;
        // The view is closed on every exit path, success or not.
        let outcome = self.inspect(view.as_ref()).await;
        view.close().await;
        outcome
    }

    async fn inspect(&self, view: &dyn LinkedView) -> Result<OriginalRef, ResolveError> {
        view.wait_idle(self.settings.idle_timeout).await?;
        if !self.settings.settle_grace.is_zero() {
            tokio::time::sleep(self.settings.settle_grace).await;
        }

        match view.image_source().await? {
            // The address fallback applies only to views with no image
            // element at all.
            Some(source) => {
                OriginalRef::from_source(&source).ok_or(ResolveError::InvalidSource)
            }
            None => {
                let address = view.address().await?;
                OriginalRef::from_source(&address).ok_or(ResolveError::InvalidSource)
            }
        }
    }
}
