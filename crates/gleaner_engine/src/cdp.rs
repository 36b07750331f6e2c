//! CDP-backed implementation of the browser capability, driving a
//! headless chromium over the DevTools protocol.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::{BrowserConfig, Page};
use futures_util::StreamExt;
use gleaner_logging::{gleaner_debug, gleaner_warn};
use tokio::sync::Mutex;

use crate::browse::{BrowseError, Browser, FeedPage, LinkedView};

/// Settings for the CDP session.
#[derive(Debug, Clone)]
pub struct CdpSettings {
    /// Bound on feed navigation and linked-view loading.
    pub navigation_timeout: Duration,
    /// Labels of the timeline filter buttons, clicked in order.
    pub filter_labels: Vec<String>,
    /// Settle delay after clicking a filter button.
    pub filter_settle: Duration,
}

impl Default for CdpSettings {
    fn default() -> Self {
        Self {
            navigation_timeout: Duration::from_secs(30),
            filter_labels: vec!["ノート".to_string(), "ファイル付き".to_string()],
            filter_settle: Duration::from_secs(2),
        }
    }
}

/// Headless chromium behind the [`Browser`] capability contract.
///
/// One chromium process serves every target; each feed gets its own
/// isolated page, so the instance is shared across target workers.
pub struct CdpBrowser {
    handle: Arc<Mutex<chromiumoxide::Browser>>,
    settings: CdpSettings,
}

impl CdpBrowser {
    /// Launch a headless chromium and drive its CDP event loop on a
    /// background task.
    pub async fn launch(settings: CdpSettings) -> Result<Self, BrowseError> {
        let config = BrowserConfig::builder()
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .build()
            .map_err(BrowseError::Protocol)?;
        let (browser, mut handler) = chromiumoxide::Browser::launch(config)
            .await
            .map_err(protocol)?;
        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });
        Ok(Self {
            handle: Arc::new(Mutex::new(browser)),
            settings,
        })
    }
}

#[async_trait]
impl Browser for CdpBrowser {
    async fn open_feed(&self, url: &str) -> Result<Box<dyn FeedPage>, BrowseError> {
        let page = self
            .handle
            .lock()
            .await
            .new_page(url)
            .await
            .map_err(protocol)?;
        wait_until_ready(&page, self.settings.navigation_timeout).await?;
        Ok(Box::new(CdpFeedPage {
            page,
            handle: Arc::clone(&self.handle),
            settings: self.settings.clone(),
        }))
    }
}

struct CdpFeedPage {
    page: Page,
    handle: Arc<Mutex<chromiumoxide::Browser>>,
    settings: CdpSettings,
}

#[async_trait]
impl FeedPage for CdpFeedPage {
    async fn scroll_extent(&self) -> Result<u64, BrowseError> {
        let height: f64 = self
            .page
            .evaluate("document.body.scrollHeight".to_string())
            .await
            .map_err(protocol)?
            .into_value()
            .map_err(protocol)?;
        Ok(height as u64)
    }

    async fn scroll_to_bottom(&self) -> Result<(), BrowseError> {
        self.page
            .evaluate("window.scrollTo(0, document.body.scrollHeight)".to_string())
            .await
            .map_err(protocol)?;
        Ok(())
    }

    async fn image_sources(&self) -> Result<Vec<String>, BrowseError> {
        self.page
            .evaluate(
                "Array.from(document.images, (img) => img.getAttribute('src') || '')".to_string(),
            )
            .await
            .map_err(protocol)?
            .into_value()
            .map_err(protocol)
    }

    async fn apply_attachment_filter(&self) -> Result<bool, BrowseError> {
        let mut all_found = true;
        for label in &self.settings.filter_labels {
            let quoted = js_string(label)?;
            let script = format!(
                "(() => {{ \
                     const button = Array.from(document.querySelectorAll('button')) \
                         .find((el) => el.textContent.trim().includes({quoted})); \
                     if (!button) return false; \
                     button.click(); \
                     return true; \
                 }})()"
            );
            let clicked: bool = self
                .page
                .evaluate(script)
                .await
                .map_err(protocol)?
                .into_value()
                .map_err(protocol)?;
            if clicked {
                tokio::time::sleep(self.settings.filter_settle).await;
            } else {
                all_found = false;
            }
        }
        Ok(all_found)
    }

    async fn open_linked_view(&self, source: &str) -> Result<Box<dyn LinkedView>, BrowseError> {
        let quoted = js_string(source)?;
        let script = format!(
            "(() => {{ \
                 const img = Array.from(document.images) \
                     .find((el) => el.getAttribute('src') === {quoted}); \
                 if (!img) return null; \
                 const anchor = img.closest('a'); \
                 return anchor ? anchor.href : null; \
             }})()"
        );
        let href: Option<String> = self
            .page
            .evaluate(script)
            .await
            .map_err(protocol)?
            .into_value()
            .map_err(protocol)?;
        let href = href.ok_or(BrowseError::LinkTargetMissing)?;
        let page = self
            .handle
            .lock()
            .await
            .new_page(href.as_str())
            .await
            .map_err(protocol)?;
        Ok(Box::new(CdpLinkedView { page }))
    }

    async fn close(self: Box<Self>) {
        if let Err(error) = self.page.close().await {
            gleaner_warn!("failed to close feed view: {error}");
        }
    }
}

struct CdpLinkedView {
    page: Page,
}

#[async_trait]
impl LinkedView for CdpLinkedView {
    async fn wait_idle(&self, timeout: Duration) -> Result<(), BrowseError> {
        wait_until_ready(&self.page, timeout).await
    }

    async fn image_source(&self) -> Result<Option<String>, BrowseError> {
        self.page
            .evaluate(
                "(() => { \
                     const img = document.querySelector('img'); \
                     return img ? img.getAttribute('src') : null; \
                 })()"
                    .to_string(),
            )
            .await
            .map_err(protocol)?
            .into_value()
            .map_err(protocol)
    }

    async fn address(&self) -> Result<String, BrowseError> {
        let url = self
            .page
            .url()
            .await
            .map_err(protocol)?
            .map(|u| u.to_string());
        url.ok_or_else(|| BrowseError::Protocol("view has no address".to_string()))
    }

    async fn close(self: Box<Self>) {
        if let Err(error) = self.page.close().await {
            gleaner_warn!("failed to close linked view: {error}");
        }
    }
}

/// Readiness poll for a freshly opened view. The client renders after
/// `DOMContentLoaded`, so readiness here means the document reached at
/// least the interactive state; callers add their own settle delays on
/// top.
async fn wait_until_ready(page: &Page, timeout: Duration) -> Result<(), BrowseError> {
    const READY_SCRIPT: &str = "\
        new Promise((resolve) => { \
            if (document.readyState === 'complete' || document.readyState === 'interactive') { \
                resolve(document.readyState); \
            } else { \
                document.addEventListener('DOMContentLoaded', () => resolve(document.readyState)); \
                setTimeout(() => resolve('timeout'), 10000); \
            } \
        })";

    match tokio::time::timeout(timeout, page.evaluate(READY_SCRIPT.to_string())).await {
        Ok(Ok(result)) => {
            let state: String = result
                .into_value()
                .unwrap_or_else(|_| "unknown".to_string());
            gleaner_debug!("view ready state: {state}");
            Ok(())
        }
        Ok(Err(err)) => Err(BrowseError::Navigation(err.to_string())),
        Err(_) => Err(BrowseError::IdleTimeout),
    }
}

fn js_string(value: &str) -> Result<String, BrowseError> {
    serde_json::to_string(value).map_err(protocol)
}

fn protocol<E: fmt::Display>(err: E) -> BrowseError {
    BrowseError::Protocol(err.to_string())
}
