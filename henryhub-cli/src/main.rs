//! Henry Hub CLI: update, derive, status and publish commands.
//!
//! Commands:
//! - `update`: fetch new prices from the EIA API, merge, derive and write
//! - `derive`: recompute derived columns of an existing table in place
//! - `status`: report row count, date range and the latest move
//! - `publish`: commit the table and force-push it to the configured remote

mod publish;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use henryhub_core::data::{EiaSource, PaginatedFetcher};
use henryhub_core::data::store;
use henryhub_core::pipeline::{self, ExistingSource, RunReport, UpdateOptions};
use henryhub_core::Config;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Config file read when `--config` is not given, if it exists.
const DEFAULT_CONFIG: &str = "henryhub.toml";

#[derive(Parser)]
#[command(
    name = "henryhub",
    about = "Henry Hub CLI: daily natural-gas spot prices with derived columns"
)]
struct Cli {
    /// Path to a TOML config file. Defaults to ./henryhub.toml when present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch new prices, merge with existing data and rewrite the table.
    Update {
        /// Output CSV. Overrides output.path.
        #[arg(long)]
        output: Option<PathBuf>,

        /// Read existing data from this URL instead of the output file.
        #[arg(long)]
        mirror: Option<String>,

        /// Append new rows instead of rewriting the table.
        #[arg(long, default_value_t = false)]
        append: bool,

        /// Fetch and compute, but do not write.
        #[arg(long, default_value_t = false)]
        dry_run: bool,
    },
    /// Recompute derived columns of an existing table in place.
    Derive {
        /// Table to rewrite. Defaults to output.path.
        #[arg(long)]
        input: Option<PathBuf>,
    },
    /// Report row count, date range and the latest move.
    Status {
        /// Table to inspect. Defaults to output.path.
        #[arg(long)]
        input: Option<PathBuf>,
    },
    /// Commit all changes and force-push to the configured remote.
    Publish {
        /// Repository directory. Overrides publish.repo_path.
        #[arg(long)]
        repo: Option<PathBuf>,

        /// Remote URL. Overrides publish.remote_url / GITHUB_REPO_URL.
        #[arg(long)]
        remote: Option<String>,

        /// Branch to push. Overrides publish.branch.
        #[arg(long)]
        branch: Option<String>,
    },
}

fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Update {
            output,
            mirror,
            append,
            dry_run,
        } => run_update_cmd(&config, output, mirror, append, dry_run),
        Commands::Derive { input } => run_derive(&config, input),
        Commands::Status { input } => run_status(&config, input),
        Commands::Publish {
            repo,
            remote,
            branch,
        } => run_publish(config, repo, remote, branch),
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Explicit path must exist; the default path is optional.
fn load_config(path: Option<&Path>) -> Result<Config> {
    let config = match path {
        Some(p) => Config::from_file(p)?,
        None if Path::new(DEFAULT_CONFIG).exists() => Config::from_file(Path::new(DEFAULT_CONFIG))?,
        None => Config::default(),
    };
    Ok(config.apply_env())
}

fn run_update_cmd(
    config: &Config,
    output: Option<PathBuf>,
    mirror: Option<String>,
    append: bool,
    dry_run: bool,
) -> Result<()> {
    if config.api.api_key.is_none() {
        bail!(
            "missing API key: set {} or api.api_key in the config file",
            henryhub_core::config::ENV_API_KEY
        );
    }

    let target = output.unwrap_or_else(|| config.output.path.clone());
    let existing = match mirror.or_else(|| config.output.mirror_url.clone()) {
        Some(url) => ExistingSource::Mirror {
            url,
            timeout: Duration::from_secs(config.api.timeout_secs),
        },
        None => ExistingSource::Local(target.clone()),
    };

    let source = EiaSource::new(&config.api)?;
    let fetcher = PaginatedFetcher::new(source, config.api.page_size, config.retry);

    let opts = UpdateOptions {
        append: append || config.output.append,
        dry_run,
    };
    let report = pipeline::run_update(&existing, &fetcher, &target, opts)
        .context("update failed")?;

    print_report(&report);
    Ok(())
}

fn print_report(report: &RunReport) {
    println!("Existing rows:   {}", report.existing_rows);
    match report.cutoff {
        Some(d) => println!("Most recent date: {d}"),
        None => println!("Most recent date: (none)"),
    }
    println!(
        "Fetched:         {} records in {} page(s), stopped at {}",
        report.fetched, report.pages, report.page_end
    );
    println!("Appended:        {}", report.appended);
    if !report.dropped.is_empty() {
        println!(
            "Dropped:         {} (bad date: {}, bad value: {})",
            report.dropped.total(),
            report.dropped.bad_date,
            report.dropped.bad_value
        );
    }
    println!("Total rows:      {}", report.final_rows);
    match &report.meta {
        Some(meta) => println!(
            "Written to:      {} (hash {})",
            report.output.display(),
            &meta.data_hash[..12.min(meta.data_hash.len())]
        ),
        None => println!("Dry run:         nothing written"),
    }
}

fn run_derive(config: &Config, input: Option<PathBuf>) -> Result<()> {
    let path = input.unwrap_or_else(|| config.output.path.clone());
    let (dataset, meta) = pipeline::rederive_file(&path)
        .with_context(|| format!("failed to rederive {}", path.display()))?;
    info!(rows = meta.rows, "derived columns recomputed");
    println!("Rewrote {} ({} rows)", path.display(), dataset.len());
    Ok(())
}

fn run_status(config: &Config, input: Option<PathBuf>) -> Result<()> {
    let path = input.unwrap_or_else(|| config.output.path.clone());
    if !path.exists() {
        bail!("no table at {}", path.display());
    }
    let dataset = pipeline::load_dataset(&path)?;
    let summary = dataset.summary();

    println!("Table:     {}", path.display());
    println!("Rows:      {}", summary.rows);
    if let (Some(first), Some(last)) = (summary.first_date, summary.last_date) {
        println!("Range:     {first} .. {last}");
    }
    if let (Some(price), Some(flag), Some(run)) =
        (summary.last_price, summary.last_flag, summary.last_run)
    {
        println!("Latest:    {price} ({flag}, run {run})");
    }
    if let Some(meta) = store::read_meta(&path) {
        println!("Written:   {}", meta.written_at.format("%Y-%m-%d %H:%M:%S"));
    }
    Ok(())
}

fn run_publish(
    mut config: Config,
    repo: Option<PathBuf>,
    remote: Option<String>,
    branch: Option<String>,
) -> Result<()> {
    if let Some(repo) = repo {
        config.publish.repo_path = repo;
    }
    if let Some(remote) = remote {
        config.publish.remote_url = Some(remote);
    }
    if let Some(branch) = branch {
        config.publish.branch = branch;
    }

    let outcome = publish::publish(&config.publish)?;
    if outcome.committed {
        println!("Committed and pushed to {}", config.publish.branch);
    } else {
        println!("Nothing to commit; pushed {}", config.publish.branch);
    }
    Ok(())
}
