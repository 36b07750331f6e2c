use std::error;
use std::fmt;
use std::path::PathBuf;

use gleaner_core::HarvestSummary;

/// Observations emitted by the pipeline while a harvest runs.
///
/// Components never touch the global logger; they emit events to an
/// injected [`HarvestSink`] whose lifetime is scoped to one run. The app
/// installs a sink that forwards to the log facade, tests install
/// collecting sinks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HarvestEvent {
    TargetStarted {
        username: String,
    },
    /// The attachment-filter affordance was missing or unusable; the
    /// target is harvested unfiltered.
    FilterUnavailable {
        username: String,
    },
    RoundObserved {
        username: String,
        fresh: usize,
        extent: u64,
        extent_grew: bool,
    },
    /// A thumbnail exhausted its resolution attempts and was skipped.
    ThumbnailSkipped {
        username: String,
        thumbnail: String,
        attempts: u32,
    },
    /// A resolved URL named a derivative rendition that is never stored.
    ExcludedRendition {
        username: String,
        filename: String,
    },
    FetchFailed {
        url: String,
        reason: String,
    },
    /// Downloaded bytes could not be written; unlike a fetch failure this
    /// loses data already on hand, so it is surfaced separately.
    StoreFailed {
        url: String,
        reason: String,
    },
    FileStored {
        username: String,
        path: PathBuf,
    },
    DuplicateRejected {
        username: String,
        url: String,
    },
    TargetFinished {
        username: String,
        summary: HarvestSummary,
    },
    TargetFailed {
        username: String,
        reason: String,
    },
}

/// Destination for pipeline events, injected into each component.
pub trait HarvestSink: Send + Sync {
    fn emit(&self, event: HarvestEvent);
}

/// Failure while retrieving one original-image URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchError {
    pub kind: FetchFailureKind,
    pub message: String,
}

impl FetchError {
    pub(crate) fn new(kind: FetchFailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl error::Error for FetchError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchFailureKind {
    InvalidUrl,
    HttpStatus(u16),
    Timeout,
    TooLarge { max_bytes: u64, actual: Option<u64> },
    Network,
}

impl fmt::Display for FetchFailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchFailureKind::InvalidUrl => write!(f, "invalid url"),
            FetchFailureKind::HttpStatus(code) => write!(f, "http status {code}"),
            FetchFailureKind::Timeout => write!(f, "timeout"),
            FetchFailureKind::TooLarge { max_bytes, actual } => {
                write!(f, "response too large (max {max_bytes}, actual {actual:?})")
            }
            FetchFailureKind::Network => write!(f, "network error"),
        }
    }
}
