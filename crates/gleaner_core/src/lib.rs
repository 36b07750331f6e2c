//! Gleaner core: pure domain rules for the harvest pipeline.
//!
//! Everything in this crate is synchronous and IO-free: the media URL
//! grammar, target identity, reveal-round bookkeeping, and the summary
//! types the coordinator aggregates. The IO pipeline lives in
//! `gleaner_engine`.
mod grammar;
mod refs;
mod reveal;
mod summary;
mod target;

pub use grammar::{
    candidate_filename, ensure_scheme, is_excluded_filename, is_original_source,
    is_recognized_image, is_thumbnail_source, suffixed_filename, MEDIA_PATH_MARKER,
    THUMBNAIL_MARKER,
};
pub use refs::{OriginalRef, ThumbnailRef};
pub use reveal::{RevealTracker, RoundOutcome, RoundVerdict, DEFAULT_STAGNATION_THRESHOLD};
pub use summary::HarvestSummary;
pub use target::Target;
