//! # Blog Digest
//!
//! A scheduled content pipeline that crawls a fixed set of engineering
//! blogs, summarizes posts it has not seen before through an LLM, and
//! appends the summaries to per-day JSONL files.
//!
//! ## Usage
//!
//! ```sh
//! blog_digest -d ./ --template blog_summary
//! ```
//!
//! ## Architecture
//!
//! 1. **Collection**: every site collector runs concurrently; the framework
//!    merges their posts into one stream and stamps provenance
//! 2. **Filtering**: posts already present in storage are skipped before
//!    any content is fetched
//! 3. **Summarization**: post bodies are resolved lazily and sent to the LLM
//! 4. **Persistence**: new summaries are appended to `data/<YYYYMM>/<YYYYMMDD>.jsonl`

use clap::Parser;
use std::error::Error;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod api;
mod app;
mod cli;
mod collectors;
mod error;
mod framework;
mod models;
mod storage;
mod summarizer;
mod utils;

use app::App;
use cli::Cli;
use framework::Framework;
use storage::Storage;
use summarizer::TextSummarizer;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("blog_digest starting up");

    let args = Cli::parse();
    debug!(?args, "Parsed CLI arguments");

    // ---- Collectors ----
    let collectors = collectors::select(collectors::registry()?, &args.only);
    let framework = Framework::new(collectors)?
        .with_collector_timeout(args.collector_timeout_secs.map(Duration::from_secs));
    if framework.is_empty() {
        warn!(only = ?args.only, "No collectors selected; nothing to do");
        return Ok(());
    }
    info!(collectors = framework.len(), "Registered collectors");

    // ---- Storage ----
    let storage = Storage::open(&args.data_root).await?;
    if storage.is_empty() {
        info!(root = %args.data_root, "No previous summaries found");
    }

    // ---- Summarizer ----
    let summarizer = TextSummarizer::load(args.config.as_deref(), &args.template).await?;

    // ---- Cancellation ----
    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received; cancelling collectors");
            on_signal.cancel();
        }
    });

    let mut app = App::new(framework, summarizer, storage).with_channel_capacity(args.channel_capacity);
    let report = app.run(&cancel).await?;

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        written = report.written,
        failed = report.failed,
        known = app.storage().len(),
        "Execution complete"
    );

    Ok(())
}
