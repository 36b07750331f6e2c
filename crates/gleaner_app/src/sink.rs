//! Forwards pipeline events to the terminal logger.

use gleaner_engine::{HarvestEvent, HarvestSink};
use gleaner_logging::{gleaner_error, gleaner_info, gleaner_warn};

pub struct LogSink;

impl HarvestSink for LogSink {
    fn emit(&self, event: HarvestEvent) {
        match event {
            HarvestEvent::TargetStarted { username } => {
                gleaner_info!("[{username}] harvest started");
            }
            HarvestEvent::FilterUnavailable { username } => {
                gleaner_warn!(
                    "[{username}] attachment filter unavailable; harvesting unfiltered"
                );
            }
            HarvestEvent::RoundObserved {
                username,
                fresh,
                extent,
                extent_grew,
            } => {
                if fresh > 0 {
                    gleaner_info!("[{username}] reveal round: {fresh} new thumbnail(s)");
                } else {
                    gleaner_info!(
                        "[{username}] reveal round: nothing new (extent {extent}, grew: {extent_grew})"
                    );
                }
            }
            HarvestEvent::ThumbnailSkipped {
                username,
                thumbnail,
                attempts,
            } => {
                gleaner_warn!("[{username}] giving up on {thumbnail} after {attempts} attempt(s)");
            }
            HarvestEvent::ExcludedRendition { username, filename } => {
                gleaner_info!("[{username}] skipping derivative rendition {filename}");
            }
            HarvestEvent::FetchFailed { url, reason } => {
                gleaner_warn!("download failed for {url}: {reason}");
            }
            HarvestEvent::StoreFailed { url, reason } => {
                gleaner_error!("could not store bytes from {url}: {reason}");
            }
            HarvestEvent::FileStored { username, path } => {
                gleaner_info!("[{username}] stored {}", path.display());
            }
            HarvestEvent::DuplicateRejected { username, url } => {
                gleaner_info!("[{username}] duplicate content from {url}; skipped");
            }
            HarvestEvent::TargetFinished { username, summary } => {
                gleaner_info!(
                    "[{username}] finished: {} thumbnail(s) processed, {} image(s) stored",
                    summary.thumbnails_processed,
                    summary.images_stored
                );
            }
            HarvestEvent::TargetFailed { username, reason } => {
                gleaner_error!("[{username}] harvest failed: {reason}");
            }
        }
    }
}
