//! ABI Harvest CLI
//!
//! The `abi-harvest` command pulls recent CI artifacts for a repository into
//! the canonical result tree. Meant to be run nightly by a scheduler; runs
//! are idempotent, so overlapping or repeated invocations are safe.
//!
//! Settings come from the environment (`INPUT_REPOSITORY`, `GITHUB_TOKEN`,
//! `INPUT_OUTPUT`, `INPUT_DAYS`, ...) and are overridden by flags.
//!
//! Exit status is 0 whenever the run completes, even if some artifacts were
//! skipped or failed. It is non-zero only when listing fails or the
//! configuration is unusable.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use abi_harvest_core::{
    init_tracing, write_summary_json, ArtifactTree, GitHubArtifactSource, GitHubConfig,
    HarvestConfig, Harvester, RunSummary,
};
use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::{error, info, Level};

#[derive(Parser, Debug)]
#[command(name = "abi-harvest")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Harvest CI artifacts into a canonical ABI result tree", long_about = None)]
struct Cli {
    /// Repository to harvest (owner/name); defaults to INPUT_REPOSITORY or GITHUB_REPOSITORY
    repository: Option<String>,

    /// Root of the destination tree (default: artifacts)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Only consider artifacts created within this many days
    #[arg(long)]
    days: Option<i64>,

    /// Assumed artifact lifetime when the provider reports no expiry
    #[arg(long)]
    retention_days: Option<i64>,

    /// Artifacts processed concurrently
    #[arg(short = 'j', long)]
    concurrency: Option<usize>,

    /// Provider API root
    #[arg(long)]
    api_base: Option<String>,

    /// API token
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Write the run summary as JSON to this path
    #[arg(long)]
    summary: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long)]
    json: bool,
}

impl Cli {
    /// Layer command-line flags over `base`.
    fn apply(&self, mut base: HarvestConfig) -> HarvestConfig {
        if let Some(repo) = &self.repository {
            base.repository = repo.clone();
        }
        if let Some(output) = &self.output {
            base.output = output.clone();
        }
        if let Some(days) = self.days {
            base.window_days = days;
        }
        if let Some(days) = self.retention_days {
            base.retention_days = days;
        }
        if let Some(n) = self.concurrency {
            base.concurrency = n;
        }
        if let Some(api) = &self.api_base {
            base.api_base = api.clone();
        }
        if let Some(token) = &self.token {
            base.token = Some(token.clone());
        }
        base
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    init_tracing(cli.json, level);

    let config = cli.apply(HarvestConfig::from_env().context("Failed to read environment")?);
    config.validate()?;
    if config.token.is_none() {
        bail!("an API token is required (--token or GITHUB_TOKEN)");
    }

    let tree = ArtifactTree::open(&config.output)
        .with_context(|| format!("Failed to open destination tree {:?}", config.output))?;
    let source = GitHubArtifactSource::new(GitHubConfig::from_harvest(&config))?;

    info!(
        repository = %config.repository,
        output = %config.output.display(),
        "starting harvest"
    );
    let harvester = Harvester::new(Arc::new(source), tree, config);
    let summary = harvester.run().await.context("Harvest aborted")?;

    print!("{}", summary.render_text());

    if let Some(path) = &cli.summary {
        save_summary(path, &summary);
    }

    Ok(())
}

/// Write the JSON summary. The run has already completed, so a failure here
/// is logged and does not change the exit status.
fn save_summary(path: &Path, summary: &RunSummary) {
    match write_summary_json(path, summary) {
        Ok(()) => info!(path = %path.display(), "wrote run summary"),
        Err(e) => error!(path = %path.display(), error = %e, "failed to write run summary"),
    }
}
