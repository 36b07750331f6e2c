use std::time::Duration;

use gleaner_core::{RevealTracker, RoundVerdict, ThumbnailRef, DEFAULT_STAGNATION_THRESHOLD};

use crate::browse::{BrowseError, FeedPage};

#[derive(Debug, Clone)]
pub struct RevealSettings {
    /// Delay after each scroll for lazily-loaded content to settle.
    pub settle_delay: Duration,
    /// Consecutive unproductive rounds before the feed counts as
    /// exhausted.
    pub stagnation_threshold: u32,
}

impl Default for RevealSettings {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_secs(3),
            stagnation_threshold: DEFAULT_STAGNATION_THRESHOLD,
        }
    }
}

/// One executed scroll-and-settle round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevealRound {
    /// Thumbnails observed for the first time this round.
    pub fresh: Vec<ThumbnailRef>,
    /// Scrollable extent after the scroll settled.
    pub extent: u64,
    pub extent_grew: bool,
}

/// Drives incremental disclosure of one feed view.
///
/// A finite, non-restartable sequence of rounds: once the tracker
/// reports exhaustion, [`RevealLoop::next_round`] yields `None` forever.
pub struct RevealLoop<'a> {
    page: &'a dyn FeedPage,
    tracker: RevealTracker,
    settings: RevealSettings,
    exhausted: bool,
}

impl<'a> RevealLoop<'a> {
    pub fn new(page: &'a dyn FeedPage, settings: RevealSettings) -> Self {
        let tracker = RevealTracker::new(settings.stagnation_threshold);
        Self {
            page,
            tracker,
            settings,
            exhausted: false,
        }
    }

    /// Distinct thumbnails observed so far.
    pub fn thumbnails_processed(&self) -> usize {
        self.tracker.processed_count()
    }

    /// Execute one round: scroll, settle, re-measure, enumerate. Returns
    /// the round's observations, or `None` once the feed is exhausted.
    /// Rounds with an empty `fresh` batch are still reported so callers
    /// can surface progress.
    pub async fn next_round(&mut self) -> Result<Option<RevealRound>, BrowseError> {
        if self.exhausted {
            return Ok(None);
        }

        let before = self.page.scroll_extent().await?;
        self.page.scroll_to_bottom().await?;
        if !self.settings.settle_delay.is_zero() {
            tokio::time::sleep(self.settings.settle_delay).await;
        }
        let extent = self.page.scroll_extent().await?;

        let sources = self.page.image_sources().await?;
        let outcome = self.tracker.observe_round(sources);
        if outcome.verdict == RoundVerdict::Exhausted {
            self.exhausted = true;
        }

        Ok(Some(RevealRound {
            fresh: outcome.fresh,
            extent,
            extent_grew: extent > before,
        }))
    }
}
