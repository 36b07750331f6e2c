use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

use async_trait::async_trait;
use gleaner_core::ThumbnailRef;
use gleaner_engine::{BrowseError, FeedPage, LinkedView, ResolveSettings, Resolver};

const THUMB: &str = "https://media.misskeyusercontent.jp/io/thumbnail-t1.webp";
const ORIGINAL: &str = "https://media.misskeyusercontent.jp/io/t1.png";
const NOTE_PAGE: &str = "https://misskey.example/notes/abc123";

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(gleaner_logging::initialize_for_tests);
}

/// What the linked view looks like for one resolution attempt.
#[derive(Clone)]
enum ViewScript {
    /// The view renders an image element with this source.
    Image(String),
    /// The view has no image element; its address is this.
    Address(String),
    /// Opening the view fails outright.
    OpenFails,
}

struct ScriptedFeed {
    scripts: Mutex<VecDeque<ViewScript>>,
    opened: AtomicU32,
    closed: Arc<AtomicU32>,
}

impl ScriptedFeed {
    fn new(scripts: Vec<ViewScript>) -> Self {
        Self {
            scripts: Mutex::new(scripts.into()),
            opened: AtomicU32::new(0),
            closed: Arc::new(AtomicU32::new(0)),
        }
    }

    fn opened(&self) -> u32 {
        self.opened.load(Ordering::SeqCst)
    }

    fn closed(&self) -> u32 {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FeedPage for ScriptedFeed {
    async fn scroll_extent(&self) -> Result<u64, BrowseError> {
        Ok(0)
    }

    async fn scroll_to_bottom(&self) -> Result<(), BrowseError> {
        Ok(())
    }

    async fn image_sources(&self) -> Result<Vec<String>, BrowseError> {
        Ok(Vec::new())
    }

    async fn apply_attachment_filter(&self) -> Result<bool, BrowseError> {
        Ok(true)
    }

    async fn open_linked_view(&self, _source: &str) -> Result<Box<dyn LinkedView>, BrowseError> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        let script = self
            .scripts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(ViewScript::OpenFails);
        match script {
            ViewScript::OpenFails => Err(BrowseError::Navigation("scripted failure".into())),
            other => Ok(Box::new(ScriptedView {
                script: other,
                closed: Arc::clone(&self.closed),
            })),
        }
    }

    async fn close(self: Box<Self>) {}
}

struct ScriptedView {
    script: ViewScript,
    closed: Arc<AtomicU32>,
}

#[async_trait]
impl LinkedView for ScriptedView {
    async fn wait_idle(&self, _timeout: Duration) -> Result<(), BrowseError> {
        Ok(())
    }

    async fn image_source(&self) -> Result<Option<String>, BrowseError> {
        match &self.script {
            ViewScript::Image(source) => Ok(Some(source.clone())),
            _ => Ok(None),
        }
    }

    async fn address(&self) -> Result<String, BrowseError> {
        match &self.script {
            ViewScript::Address(address) => Ok(address.clone()),
            _ => Ok(NOTE_PAGE.to_string()),
        }
    }

    async fn close(self: Box<Self>) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}

fn fast_settings() -> ResolveSettings {
    ResolveSettings {
        max_attempts: 2,
        retry_backoff: Duration::ZERO,
        idle_timeout: Duration::from_secs(1),
        settle_grace: Duration::ZERO,
    }
}

fn thumbnail() -> ThumbnailRef {
    ThumbnailRef::from_source(THUMB).unwrap()
}

#[tokio::test]
async fn resolves_from_the_views_image_element() {
    init_logging();
    let feed = ScriptedFeed::new(vec![ViewScript::Image(ORIGINAL.to_string())]);
    let resolver = Resolver::new(fast_settings());

    let resolved = resolver.resolve(&feed, &thumbnail()).await;

    assert_eq!(resolved.unwrap().as_str(), ORIGINAL);
    assert_eq!(feed.opened(), 1);
    assert_eq!(feed.closed(), 1);
}

#[tokio::test]
async fn falls_back_to_the_views_address_without_image() {
    init_logging();
    let feed = ScriptedFeed::new(vec![ViewScript::Address(ORIGINAL.to_string())]);
    let resolver = Resolver::new(fast_settings());

    let resolved = resolver.resolve(&feed, &thumbnail()).await;

    assert_eq!(resolved.unwrap().as_str(), ORIGINAL);
    assert_eq!(feed.closed(), 1);
}

#[tokio::test]
async fn invalid_image_source_retries_and_then_succeeds() {
    init_logging();
    // First attempt lands on a view whose image is still the thumbnail.
    let feed = ScriptedFeed::new(vec![
        ViewScript::Image(THUMB.to_string()),
        ViewScript::Image(ORIGINAL.to_string()),
    ]);
    let resolver = Resolver::new(fast_settings());

    let resolved = resolver.resolve(&feed, &thumbnail()).await;

    assert_eq!(resolved.unwrap().as_str(), ORIGINAL);
    assert_eq!(feed.opened(), 2);
    // Both views were closed, the invalid one included.
    assert_eq!(feed.closed(), 2);
}

#[tokio::test]
async fn open_failure_is_retried() {
    init_logging();
    let feed = ScriptedFeed::new(vec![
        ViewScript::OpenFails,
        ViewScript::Image(ORIGINAL.to_string()),
    ]);
    let resolver = Resolver::new(fast_settings());

    let resolved = resolver.resolve(&feed, &thumbnail()).await;

    assert_eq!(resolved.unwrap().as_str(), ORIGINAL);
    assert_eq!(feed.opened(), 2);
    assert_eq!(feed.closed(), 1);
}

#[tokio::test]
async fn exhausted_attempts_yield_none() {
    init_logging();
    let feed = ScriptedFeed::new(vec![
        ViewScript::Address(NOTE_PAGE.to_string()),
        ViewScript::Address(NOTE_PAGE.to_string()),
    ]);
    let resolver = Resolver::new(fast_settings());

    let resolved = resolver.resolve(&feed, &thumbnail()).await;

    assert!(resolved.is_none());
    assert_eq!(feed.opened(), 2);
    assert_eq!(feed.closed(), 2);
}
