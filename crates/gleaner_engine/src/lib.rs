//! Gleaner engine: browser-driven harvest pipeline and content store.
mod browse;
#[cfg(feature = "browser")]
mod cdp;
mod fetch;
mod harvest;
mod resolve;
mod reveal;
mod store;
mod types;

pub use browse::{Browser, BrowseError, FeedPage, LinkedView};
#[cfg(feature = "browser")]
pub use cdp::{CdpBrowser, CdpSettings};
pub use fetch::{FetchSettings, ImageFetcher};
pub use harvest::{Harvester, HarvestSettings};
pub use resolve::{ResolveError, Resolver, ResolveSettings};
pub use reveal::{RevealLoop, RevealRound, RevealSettings};
pub use store::{
    ensure_output_dir, Acceptance, ContentDigest, ContentStore, DedupIndex, StoreError, StoredFile,
};
pub use types::{FetchError, FetchFailureKind, HarvestEvent, HarvestSink};
