mod logging;
mod sink;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use gleaner_core::Target;
use gleaner_engine::{
    CdpBrowser, CdpSettings, ContentStore, DedupIndex, FetchSettings, Harvester, HarvestSettings,
    ImageFetcher,
};
use gleaner_logging::gleaner_info;

use crate::sink::LogSink;

/// Harvest full-resolution media attachments from user timelines.
#[derive(Parser, Debug)]
#[command(name = "gleaner", version, about)]
struct Cli {
    /// Feed URLs to harvest, one per target account.
    #[arg(long = "links", short = 'l', required = true, num_args = 1..)]
    links: Vec<String>,

    /// Directory the harvested images are stored under.
    #[arg(long = "output-dir", short = 'o', default_value = "harvested_images")]
    output_dir: PathBuf,

    /// Cap on concurrently harvested targets
    /// (default: min of target count and available parallelism).
    #[arg(long = "workers", short = 'p')]
    workers: Option<usize>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::initialize();
    let cli = Cli::parse();

    let targets: Vec<Target> = cli
        .links
        .iter()
        .map(|url| Target::from_feed_url(url))
        .collect();
    gleaner_info!(
        "harvesting {} target(s) into {}",
        targets.len(),
        cli.output_dir.display()
    );

    let store = ContentStore::open(&cli.output_dir, DedupIndex::new())
        .context("cannot prepare output directory")?;
    let seeded = store.seed_from_disk();
    gleaner_info!("seeded {seeded} existing digest(s) from the output tree");

    let fetcher = ImageFetcher::new(FetchSettings::default()).context("cannot build http client")?;
    let browser = CdpBrowser::launch(CdpSettings::default())
        .await
        .context("cannot launch headless browser")?;

    let store = Arc::new(store);
    let settings = HarvestSettings {
        max_workers: cli.workers,
        ..HarvestSettings::default()
    };
    let harvester = Harvester::new(
        Arc::new(browser),
        Arc::new(fetcher),
        Arc::clone(&store),
        Arc::new(LogSink),
        settings,
    );

    let summary = harvester.harvest(targets).await;
    let swept = store.sweep_duplicates();

    gleaner_info!(
        "all targets finished: {} thumbnail(s) processed, {} unique image(s) stored, {} duplicate(s) swept",
        summary.thumbnails_processed,
        summary.images_stored,
        swept
    );
    Ok(())
}
