//! CLI entry point for the wikiharvest tool.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;
use indicatif::ProgressBar;
use tracing::{debug, info};

use wikiharvest_core::eligibility::load_denylist;
use wikiharvest_core::record::provider::ProviderDirectory;
use wikiharvest_core::{FetchClient, MediaStore, MediaWikiClient, Pipeline, PipelineConfig};

mod cli;

use cli::{Args, BatchArgs, Command};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Determine log level based on verbose/quiet flags
    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt().with_env_filter(filter).init();

    debug!(?args, "CLI arguments parsed");
    info!("Wikiharvest starting");

    match args.command {
        Command::Download(cmd) => {
            let (pipeline, ids) = build_pipeline(&cmd.batch, cmd.overwrite, false).await?;

            let spinner = start_spinner(args.quiet, "downloading record batch");
            pipeline.run_download(&ids).await?;
            spinner.finish_and_clear();

            println!("{}", pipeline.tracker().summary());
        }
        Command::Upload(cmd) => {
            let (pipeline, ids) = build_pipeline(&cmd.batch, false, cmd.dry_run).await?;
            let wiki = Arc::new(MediaWikiClient::new(&cmd.wiki_api_url, &cmd.wiki_token));

            let spinner = start_spinner(args.quiet, "publishing record batch");
            pipeline.run_publish(&ids, wiki).await?;
            spinner.finish_and_clear();

            println!("{}", pipeline.tracker().summary());
        }
    }

    Ok(())
}

/// Loads run-wide state and constructs the pipeline.
///
/// Startup failures here (unreadable id file, unknown partner, missing
/// denylist, bad store URL) abort the process before any record is touched.
async fn build_pipeline(
    batch: &BatchArgs,
    overwrite: bool,
    dry_run: bool,
) -> Result<(Pipeline, Vec<String>)> {
    let ids = read_id_file(&batch.id_file)?;
    if ids.is_empty() {
        bail!("id file {} contains no record ids", batch.id_file.display());
    }
    info!(records = ids.len(), "id file read");

    let startup_client = FetchClient::new();
    let directory = ProviderDirectory::load(&startup_client, &batch.provider_directory)
        .await
        .context("failed to load provider directory")?;

    if directory.provider(&batch.partner).is_none() {
        bail!("unknown partner {:?}: not in provider directory", batch.partner);
    }

    let denylist: HashSet<String> = match &batch.denylist {
        Some(path) => load_denylist(path)
            .with_context(|| format!("failed to read denylist {}", path.display()))?,
        None => HashSet::new(),
    };

    let store = open_store(&batch.store_url)?;

    let config = PipelineConfig {
        partner: batch.partner.clone(),
        aggregator_url: batch.api_url.clone(),
        api_key: batch.api_key.clone(),
        concurrency: usize::from(batch.concurrency),
        max_retries: u32::from(batch.max_retries),
        overwrite,
        dry_run,
    };

    let pipeline = Pipeline::new(config, store, directory, denylist)?;
    Ok((pipeline, ids))
}

/// Opens the object store from a URL such as `s3://bucket/prefix`.
fn open_store(store_url: &str) -> Result<MediaStore> {
    let url = url::Url::parse(store_url)
        .with_context(|| format!("invalid store URL {store_url:?}"))?;
    let (inner, prefix) = object_store::parse_url(&url)
        .with_context(|| format!("unsupported store URL {store_url:?}"))?;

    let store: Arc<dyn object_store::ObjectStore> = if prefix.as_ref().is_empty() {
        Arc::from(inner)
    } else {
        Arc::new(object_store::prefix::PrefixStore::new(inner, prefix))
    };
    Ok(MediaStore::new(store))
}

/// Reads record ids, one per line; blanks and `#` comments are skipped.
fn read_id_file(path: &Path) -> Result<Vec<String>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read id file {}", path.display()))?;
    Ok(text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(ToString::to_string)
        .collect())
}

/// Spinner shown while a stage runs; disabled in quiet mode.
fn start_spinner(quiet: bool, message: &'static str) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }
    let spinner = ProgressBar::new_spinner();
    spinner.set_message(message);
    spinner.enable_steady_tick(Duration::from_millis(120));
    spinner
}
