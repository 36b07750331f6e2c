use std::collections::HashSet;

use crate::grammar;
use crate::ThumbnailRef;

/// Default number of consecutive unproductive rounds after which a feed
/// counts as exhausted.
pub const DEFAULT_STAGNATION_THRESHOLD: u32 = 3;

/// Verdict after one reveal round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundVerdict {
    /// Keep scrolling; the feed may still produce new thumbnails.
    Continue,
    /// The stagnation threshold was reached; stop revealing.
    Exhausted,
}

/// Result of feeding one round of observed image sources to the tracker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundOutcome {
    /// Thumbnail references seen for the first time this round.
    pub fresh: Vec<ThumbnailRef>,
    pub verdict: RoundVerdict,
}

/// Bookkeeping for incremental feed disclosure.
///
/// The processed set only grows: a thumbnail that reappears after further
/// scrolling is never yielded twice. Termination is bounded by counting
/// unproductive rounds alone, so a feed whose scroll extent keeps growing
/// without new thumbnails (or never grows at all) still terminates.
#[derive(Debug)]
pub struct RevealTracker {
    processed: HashSet<String>,
    stagnant_rounds: u32,
    threshold: u32,
}

impl RevealTracker {
    pub fn new(threshold: u32) -> Self {
        Self {
            processed: HashSet::new(),
            stagnant_rounds: 0,
            threshold: threshold.max(1),
        }
    }

    /// Number of distinct thumbnails observed so far.
    pub fn processed_count(&self) -> usize {
        self.processed.len()
    }

    /// Record one round of observed image sources. Sources that do not
    /// match the thumbnail grammar are ignored; already-seen thumbnails
    /// are dropped. A round with nothing fresh increments the stagnation
    /// counter, any fresh thumbnail resets it to zero.
    pub fn observe_round<I>(&mut self, sources: I) -> RoundOutcome
    where
        I: IntoIterator<Item = String>,
    {
        let mut fresh = Vec::new();
        for source in sources {
            if !grammar::is_thumbnail_source(&source) {
                continue;
            }
            if self.processed.contains(&source) {
                continue;
            }
            fresh.push(ThumbnailRef::new(source.clone()));
            self.processed.insert(source);
        }

        if fresh.is_empty() {
            self.stagnant_rounds += 1;
        } else {
            self.stagnant_rounds = 0;
        }

        let verdict = if self.stagnant_rounds >= self.threshold {
            RoundVerdict::Exhausted
        } else {
            RoundVerdict::Continue
        };
        RoundOutcome { fresh, verdict }
    }
}

impl Default for RevealTracker {
    fn default() -> Self {
        Self::new(DEFAULT_STAGNATION_THRESHOLD)
    }
}
