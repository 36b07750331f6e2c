use std::num::NonZeroUsize;
use std::sync::Arc;

use gleaner_logging::gleaner_warn;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use gleaner_core::{HarvestSummary, Target};

use crate::browse::{Browser, BrowseError, FeedPage};
use crate::fetch::ImageFetcher;
use crate::resolve::{Resolver, ResolveSettings};
use crate::reveal::{RevealLoop, RevealSettings};
use crate::store::ContentStore;
use crate::types::{HarvestEvent, HarvestSink};

#[derive(Debug, Clone, Default)]
pub struct HarvestSettings {
    pub reveal: RevealSettings,
    pub resolve: ResolveSettings,
    /// Cap on concurrently harvested targets. `None` uses
    /// min(target count, available parallelism).
    pub max_workers: Option<usize>,
}

/// Orchestrates the reveal -> resolve -> fetch -> store pipeline across
/// targets.
///
/// Targets run in parallel under a worker cap, each in its own feed
/// view, all sharing one dedup index through the store. A failed target
/// is reported and contributes zero to the aggregate.
pub struct Harvester {
    browser: Arc<dyn Browser>,
    fetcher: Arc<ImageFetcher>,
    store: Arc<ContentStore>,
    sink: Arc<dyn HarvestSink>,
    settings: HarvestSettings,
}

impl Harvester {
    pub fn new(
        browser: Arc<dyn Browser>,
        fetcher: Arc<ImageFetcher>,
        store: Arc<ContentStore>,
        sink: Arc<dyn HarvestSink>,
        settings: HarvestSettings,
    ) -> Self {
        Self {
            browser,
            fetcher,
            store,
            sink,
            settings,
        }
    }

    /// Harvest every target to its natural termination and aggregate the
    /// per-target counts.
    pub async fn harvest(&self, targets: Vec<Target>) -> HarvestSummary {
        let worker_limit = self
            .settings
            .max_workers
            .unwrap_or_else(|| default_worker_limit(targets.len()))
            .max(1);
        let semaphore = Arc::new(Semaphore::new(worker_limit));

        let mut workers = JoinSet::new();
        for target in targets {
            let semaphore = Arc::clone(&semaphore);
            let browser = Arc::clone(&self.browser);
            let fetcher = Arc::clone(&self.fetcher);
            let store = Arc::clone(&self.store);
            let sink = Arc::clone(&self.sink);
            let settings = self.settings.clone();
            workers.spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return HarvestSummary::default();
                };
                harvest_target(target, browser, fetcher, store, sink, settings).await
            });
        }

        let mut aggregate = HarvestSummary::default();
        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(summary) => aggregate.absorb(summary),
                Err(error) => gleaner_warn!("target worker panicked: {error}"),
            }
        }
        aggregate
    }
}

fn default_worker_limit(target_count: usize) -> usize {
    let available = std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1);
    target_count.min(available).max(1)
}

async fn harvest_target(
    target: Target,
    browser: Arc<dyn Browser>,
    fetcher: Arc<ImageFetcher>,
    store: Arc<ContentStore>,
    sink: Arc<dyn HarvestSink>,
    settings: HarvestSettings,
) -> HarvestSummary {
    let username = target.username().to_string();
    sink.emit(HarvestEvent::TargetStarted {
        username: username.clone(),
    });

    match run_target(
        &target,
        browser.as_ref(),
        &fetcher,
        &store,
        sink.as_ref(),
        &settings,
    )
    .await
    {
        Ok(summary) => {
            sink.emit(HarvestEvent::TargetFinished { username, summary });
            summary
        }
        Err(error) => {
            sink.emit(HarvestEvent::TargetFailed {
                username,
                reason: error.to_string(),
            });
            HarvestSummary::default()
        }
    }
}

async fn run_target(
    target: &Target,
    browser: &dyn Browser,
    fetcher: &ImageFetcher,
    store: &ContentStore,
    sink: &dyn HarvestSink,
    settings: &HarvestSettings,
) -> Result<HarvestSummary, BrowseError> {
    let page = browser.open_feed(target.feed_url()).await?;

    match page.apply_attachment_filter().await {
        Ok(true) => {}
        Ok(false) => sink.emit(HarvestEvent::FilterUnavailable {
            username: target.username().to_string(),
        }),
        Err(error) => {
            gleaner_warn!("[{}] attachment filter failed: {error}", target.username());
            sink.emit(HarvestEvent::FilterUnavailable {
                username: target.username().to_string(),
            });
        }
    }

    let result = drive_feed(page.as_ref(), target, fetcher, store, sink, settings).await;
    page.close().await;
    result
}

/// Run the reveal loop to exhaustion, resolving each fresh batch
/// sequentially (resolution shares the feed's viewport) and downloading
/// it concurrently.
async fn drive_feed(
    page: &dyn FeedPage,
    target: &Target,
    fetcher: &ImageFetcher,
    store: &ContentStore,
    sink: &dyn HarvestSink,
    settings: &HarvestSettings,
) -> Result<HarvestSummary, BrowseError> {
    let resolver = Resolver::new(settings.resolve.clone());
    let mut reveal = RevealLoop::new(page, settings.reveal.clone());
    let mut images_stored = 0usize;

    while let Some(round) = reveal.next_round().await? {
        sink.emit(HarvestEvent::RoundObserved {
            username: target.username().to_string(),
            fresh: round.fresh.len(),
            extent: round.extent,
            extent_grew: round.extent_grew,
        });
        if round.fresh.is_empty() {
            continue;
        }

        let mut originals = Vec::with_capacity(round.fresh.len());
        for thumbnail in &round.fresh {
            match resolver.resolve(page, thumbnail).await {
                Some(original) => originals.push(original),
                None => sink.emit(HarvestEvent::ThumbnailSkipped {
                    username: target.username().to_string(),
                    thumbnail: thumbnail.as_str().to_string(),
                    attempts: settings.resolve.max_attempts,
                }),
            }
        }

        if !originals.is_empty() {
            images_stored += fetcher
                .fetch_batch(&originals, target.username(), store, sink)
                .await;
        }
    }

    Ok(HarvestSummary::new(reveal.thumbnails_processed(), images_stored))
}
