use std::fmt;

use crate::grammar;

/// URL of a low-resolution preview image observed in a feed view.
///
/// Unique within a target's processed set; once observed it is never
/// yielded again, even if the same source reappears after scrolling.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ThumbnailRef(String);

impl ThumbnailRef {
    /// Validate `source` against the thumbnail grammar.
    pub fn from_source(source: &str) -> Option<Self> {
        grammar::is_thumbnail_source(source).then(|| Self(source.to_string()))
    }

    pub(crate) fn new(source: String) -> Self {
        Self(source)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ThumbnailRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Resolved URL of full-resolution bytes, produced from exactly one
/// thumbnail. Never carries the thumbnail marker.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OriginalRef(String);

impl OriginalRef {
    /// Validate `source` against the full-resolution grammar.
    pub fn from_source(source: &str) -> Option<Self> {
        grammar::is_original_source(source).then(|| Self(source.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OriginalRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
