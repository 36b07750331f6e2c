use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// Errors surfaced by the browser capability.
#[derive(Debug, Error)]
pub enum BrowseError {
    #[error("navigation failed: {0}")]
    Navigation(String),
    #[error("timed out waiting for the view to settle")]
    IdleTimeout,
    #[error("no link target found for the image element")]
    LinkTargetMissing,
    #[error("browser protocol error: {0}")]
    Protocol(String),
}

/// A rendering engine able to open feed views.
///
/// The pipeline depends only on this contract and its two view traits;
/// the concrete engine is an external collaborator. One implementation
/// must be safe to share across target workers, each worker getting its
/// own isolated view from [`Browser::open_feed`].
#[async_trait]
pub trait Browser: Send + Sync {
    /// Open a fresh view navigated to `url`.
    async fn open_feed(&self, url: &str) -> Result<Box<dyn FeedPage>, BrowseError>;
}

/// One scrollable timeline view.
#[async_trait]
pub trait FeedPage: Send + Sync {
    /// Current scrollable extent of the view.
    async fn scroll_extent(&self) -> Result<u64, BrowseError>;

    /// Trigger a scroll to the bottom of the view.
    async fn scroll_to_bottom(&self) -> Result<(), BrowseError>;

    /// The `src` attribute of every image element currently in the view.
    async fn image_sources(&self) -> Result<Vec<String>, BrowseError>;

    /// Narrow the view to entries with attachments, best effort. `false`
    /// means the affordance was absent and the view is unfiltered.
    async fn apply_attachment_filter(&self) -> Result<bool, BrowseError>;

    /// Open the resource linked from the image element bearing `source`
    /// in a new view.
    async fn open_linked_view(&self, source: &str) -> Result<Box<dyn LinkedView>, BrowseError>;

    /// Dispose of the view. Failures are the implementation's to log.
    async fn close(self: Box<Self>);
}

/// The view spawned from a thumbnail, expected to land on the original.
#[async_trait]
pub trait LinkedView: Send + Sync {
    /// Wait until the view has finished loading, bounded by `timeout`.
    async fn wait_idle(&self, timeout: Duration) -> Result<(), BrowseError>;

    /// The `src` attribute of the view's image element, if it has one.
    async fn image_source(&self) -> Result<Option<String>, BrowseError>;

    /// The view's own address.
    async fn address(&self) -> Result<String, BrowseError>;

    /// Dispose of the view. Failures are the implementation's to log.
    async fn close(self: Box<Self>);
}
