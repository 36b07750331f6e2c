use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use futures_util::{stream, StreamExt};

use gleaner_core::{candidate_filename, ensure_scheme, is_excluded_filename, OriginalRef};

use crate::store::{Acceptance, ContentDigest, ContentStore};
use crate::types::{FetchError, FetchFailureKind, HarvestEvent, HarvestSink};

/// Client identity presented to the media host.
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                          (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    /// Ceiling on concurrent in-flight requests per batch.
    pub concurrency: usize,
    pub max_bytes: u64,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            concurrency: 30,
            max_bytes: 64 * 1024 * 1024,
        }
    }
}

/// Concurrent downloader feeding the content store.
pub struct ImageFetcher {
    client: reqwest::Client,
    settings: FetchSettings,
}

impl ImageFetcher {
    pub fn new(settings: FetchSettings) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|err| FetchError::new(FetchFailureKind::Network, err.to_string()))?;
        Ok(Self { client, settings })
    }

    /// Download one reveal batch concurrently and offer every blob to the
    /// store. Failures are per-URL: they are reported to the sink and
    /// never cancel sibling downloads. Returns the number of newly
    /// stored files.
    pub async fn fetch_batch(
        &self,
        originals: &[OriginalRef],
        username: &str,
        store: &ContentStore,
        sink: &dyn HarvestSink,
    ) -> usize {
        let downloads: Vec<Pin<Box<dyn Future<Output = bool> + Send + '_>>> = originals
            .iter()
            .map(|original| Box::pin(self.fetch_and_store(original, username, store, sink)) as _)
            .collect();
        stream::iter(downloads)
            .buffer_unordered(self.settings.concurrency.max(1))
            .fold(0usize, |stored, newly| async move {
                stored + usize::from(newly)
            })
            .await
    }

    async fn fetch_and_store(
        &self,
        original: &OriginalRef,
        username: &str,
        store: &ContentStore,
        sink: &dyn HarvestSink,
    ) -> bool {
        let url = ensure_scheme(original.as_str());
        let Some(filename) = candidate_filename(&url) else {
            sink.emit(HarvestEvent::FetchFailed {
                url,
                reason: "url path has no usable filename".into(),
            });
            return false;
        };
        if is_excluded_filename(&filename) {
            sink.emit(HarvestEvent::ExcludedRendition {
                username: username.to_string(),
                filename,
            });
            return false;
        }

        let blob = match self.fetch_bytes(&url).await {
            Ok(blob) => blob,
            Err(error) => {
                sink.emit(HarvestEvent::FetchFailed {
                    url,
                    reason: error.to_string(),
                });
                return false;
            }
        };

        let digest = ContentDigest::of(&blob);
        match store.accept(digest, &blob, &filename, username) {
            Ok(Acceptance::Stored(file)) => {
                sink.emit(HarvestEvent::FileStored {
                    username: username.to_string(),
                    path: file.path,
                });
                true
            }
            Ok(Acceptance::Duplicate) => {
                sink.emit(HarvestEvent::DuplicateRejected {
                    username: username.to_string(),
                    url,
                });
                false
            }
            Err(error) => {
                sink.emit(HarvestEvent::StoreFailed {
                    url,
                    reason: error.to_string(),
                });
                false
            }
        }
    }

    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let parsed = reqwest::Url::parse(url)
            .map_err(|err| FetchError::new(FetchFailureKind::InvalidUrl, err.to_string()))?;

        let response = self.client.get(parsed).send().await.map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::new(
                FetchFailureKind::HttpStatus(status.as_u16()),
                status.to_string(),
            ));
        }

        if let Some(content_len) = response.content_length() {
            if content_len > self.settings.max_bytes {
                return Err(FetchError::new(
                    FetchFailureKind::TooLarge {
                        max_bytes: self.settings.max_bytes,
                        actual: Some(content_len),
                    },
                    "response too large",
                ));
            }
        }

        let mut bytes = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(map_reqwest_error)?;
            let next_len = bytes.len() as u64 + chunk.len() as u64;
            if next_len > self.settings.max_bytes {
                return Err(FetchError::new(
                    FetchFailureKind::TooLarge {
                        max_bytes: self.settings.max_bytes,
                        actual: Some(next_len),
                    },
                    "response too large",
                ));
            }
            bytes.extend_from_slice(&chunk);
        }

        Ok(bytes)
    }
}

fn map_reqwest_error(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        return FetchError::new(FetchFailureKind::Timeout, err.to_string());
    }
    FetchError::new(FetchFailureKind::Network, err.to_string())
}
