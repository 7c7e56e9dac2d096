//! Command-line interface definitions for Blog Digest.
//!
//! Every option can also be supplied through the environment variable
//! named next to it.

use clap::Parser;

/// Command-line arguments for one collect → summarize → persist run.
///
/// # Examples
///
/// ```sh
/// # Everything with defaults: data under ./data, awful_aj's config.yaml
/// blog_digest
///
/// # Only two sites, with a per-site deadline
/// blog_digest --only muratbuffalo,thegreenplace --collector-timeout-secs 120
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Root directory; summaries are stored under `<root>/data`
    #[arg(short, long, env = "BLOG_DIGEST_ROOT", default_value = "./")]
    pub data_root: String,

    /// Path to the LLM config.yaml (defaults to awful_aj's config directory)
    #[arg(short, long, env = "BLOG_DIGEST_LLM_CONFIG")]
    pub config: Option<String>,

    /// Name of the chat template holding the summarizer's system prompt
    #[arg(short, long, env = "BLOG_DIGEST_TEMPLATE", default_value = "blog_summary")]
    pub template: String,

    /// Only run these collectors (comma separated)
    #[arg(long, env = "BLOG_DIGEST_ONLY", value_delimiter = ',')]
    pub only: Vec<String>,

    /// Abandon a collector that is still listing after this many seconds
    #[arg(long, env = "BLOG_DIGEST_COLLECTOR_TIMEOUT")]
    pub collector_timeout_secs: Option<u64>,

    /// Capacity of the channel between collection and summarization
    #[arg(long, default_value_t = crate::app::DEFAULT_CHANNEL_CAPACITY)]
    pub channel_capacity: usize,
}
