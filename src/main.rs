//! # Newsdesk
//!
//! A scheduled content pipeline that asks a text-generation oracle for
//! news stories on a configured set of topics, screens and deduplicates
//! the results, balances them against per-topic targets, partitions them
//! into thematic groups, expands each into an article, and publishes the
//! lot as static HTML with a 14-day rolling archive.
//!
//! ## Usage
//!
//! ```sh
//! ORACLE_API_KEY=... newsdesk -o ./site
//! ```
//!
//! ## Architecture
//!
//! One run is a strictly sequential pipeline:
//! 1. **History**: digest the prior 14 days of published runs
//! 2. **Acquisition**: per topic, oracle → validate → dedupe, bounded retries
//! 3. **Selection**: balance the pool against targets (oracle, with a
//!    deterministic fallback)
//! 4. **Grouping**: 3–6 named sections (oracle, two attempts, then a
//!    guaranteed even split)
//! 5. **Expansion**: one article per story, one at a time
//! 6. **Output**: render the run directory, rebuild the archive index

use chrono::Local;
use clap::Parser;
use std::error::Error;
use std::path::Path;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod acquisition;
mod cli;
mod config;
mod expand;
mod grouping;
mod history;
mod models;
mod oracle;
mod outputs;
mod pipeline;
mod selection;
mod utils;
mod validate;

use cli::Cli;
use config::RunConfig;
use history::RUN_DIR_FORMAT;
use oracle::HttpOracle;
use utils::ensure_writable_dir;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("newsdesk starting up");

    let args = Cli::parse();
    let output_root = Path::new(&args.output_dir);

    if let Err(e) = ensure_writable_dir(output_root).await {
        error!(
            path = %output_root.display(),
            error = %e,
            "Output directory is not writable (fix perms or choose a different path)"
        );
        return Err(e);
    }

    let config = RunConfig::load(args.config.as_deref().map(Path::new))?;
    info!(
        topics = config.topics.len(),
        target_total = config.target_total,
        live_search = !args.no_live_search,
        "Run configured"
    );
    if config.target_sum() != config.target_total {
        warn!(
            target_sum = config.target_sum(),
            target_total = config.target_total,
            "Per-topic targets do not sum to the total; selection pads or trims"
        );
    }

    let oracle = HttpOracle::new(args.api_url.clone(), args.api_key.clone(), args.model.clone())?;
    let now = Local::now().naive_local();

    let briefing = match pipeline::run(
        &oracle,
        &config,
        output_root,
        now,
        !args.no_live_search,
    )
    .await
    {
        Ok(briefing) => briefing,
        Err(e) => {
            error!(error = %e, "Run aborted; no artifacts written");
            return Err(e.into());
        }
    };

    let run_dir_name = now.format(RUN_DIR_FORMAT).to_string();
    outputs::html::write_run_dir(output_root, &run_dir_name, &briefing).await?;
    if let Err(e) = outputs::archive::update_archive(output_root, now.date(), config.lookback_days).await
    {
        error!(error = %e, "Failed to rebuild archive index");
    }

    let elapsed = start_time.elapsed();
    info!(
        secs = elapsed.as_secs(),
        stories = briefing.story_count(),
        groups = briefing.groups.len(),
        edition = %run_dir_name,
        "Execution complete"
    );
    Ok(())
}
