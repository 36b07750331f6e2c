/// One tracked account: its handle and the canonical feed URL.
///
/// Read-only during a harvest; the username doubles as the per-target
/// output directory name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    username: String,
    feed_url: String,
}

impl Target {
    /// Derive the target identity from its feed URL.
    pub fn from_feed_url(feed_url: &str) -> Self {
        Self {
            username: username_from_url(feed_url),
            feed_url: feed_url.to_string(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn feed_url(&self) -> &str {
        &self.feed_url
    }
}

/// The `@name` handle embedded in the URL; URLs without one fall back to
/// the last path component with any `@` stripped.
fn username_from_url(url: &str) -> String {
    if let Some(pos) = url.find('@') {
        let rest = &url[pos + 1..];
        let name = rest.split('/').next().unwrap_or(rest);
        if !name.is_empty() {
            return name.to_string();
        }
    }
    let base = url.rsplit('/').next().unwrap_or(url);
    base.replace('@', "")
}
