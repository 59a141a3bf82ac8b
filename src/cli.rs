//! Command-line interface definitions.
//!
//! The binary is a single-shot batch job: invoked once (typically from a
//! scheduler), it writes one run directory and exits. All options can be
//! provided via command-line flags or environment variables.

use clap::Parser;

/// Command-line arguments for the newsdesk batch job.
///
/// # Examples
///
/// ```sh
/// # Basic usage (ORACLE_API_KEY in the environment)
/// newsdesk -o ./site
///
/// # With an explicit config and no live search
/// newsdesk -o ./site -c ./newsdesk.yaml --no-live-search
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Output directory for run directories and the archive index
    #[arg(short, long)]
    pub output_dir: String,

    /// Optional path to a YAML run-configuration file
    #[arg(short, long)]
    pub config: Option<String>,

    /// API key for the text-generation service
    #[arg(long, env = "ORACLE_API_KEY", hide_env_values = true)]
    pub api_key: String,

    /// Chat-completions endpoint URL
    #[arg(
        long,
        env = "ORACLE_API_URL",
        default_value = "https://api.x.ai/v1/chat/completions"
    )]
    pub api_url: String,

    /// Model identifier sent with every request
    #[arg(long, env = "ORACLE_MODEL", default_value = "grok-4-fast-reasoning")]
    pub model: String,

    /// Disable live-search grounding and rely on the model's own knowledge
    #[arg(long)]
    pub no_live_search: bool,
}
