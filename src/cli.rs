//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand};

use wikiharvest_core::{DEFAULT_CONCURRENCY, DEFAULT_MAX_RETRIES};

/// Batch ingest and publish digital-library media.
///
/// Wikiharvest resolves each catalog record's media assets, stores them in a
/// content-addressed object store, and publishes them to a wiki media
/// repository, skipping work already done.
#[derive(Parser, Debug)]
#[command(name = "wikiharvest")]
#[command(author, version, about)]
pub struct Args {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Pipeline stages.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Fetch, validate, and store media assets for a batch of records
    Download(DownloadArgs),
    /// Publish previously stored assets to the target wiki repository
    Upload(UploadArgs),
}

/// Arguments shared by both stages.
#[derive(ClapArgs, Debug)]
pub struct BatchArgs {
    /// File with one record id per line (# comments allowed)
    pub id_file: PathBuf,

    /// Partner identifier; prefixes every storage path and must appear in the
    /// provider directory
    #[arg(long)]
    pub partner: String,

    /// Aggregator item-API base URL
    #[arg(long, default_value = "https://api.dp.la/v2/items")]
    pub api_url: String,

    /// Aggregator API key
    #[arg(long, env = "WIKIHARVEST_API_KEY")]
    pub api_key: String,

    /// Provider directory document (URL or local path)
    #[arg(long)]
    pub provider_directory: String,

    /// Record-id denylist file; ids listed there are never processed
    #[arg(long)]
    pub denylist: Option<PathBuf>,

    /// Object store URL (e.g. s3://bucket/prefix, memory:///)
    #[arg(long)]
    pub store_url: String,

    /// Maximum records in flight (1-50)
    #[arg(short = 'c', long, default_value_t = DEFAULT_CONCURRENCY as u8, value_parser = clap::value_parser!(u8).range(1..=50))]
    pub concurrency: u8,

    /// Maximum retry attempts for transient fetch failures (1-10)
    #[arg(short = 'r', long, default_value_t = DEFAULT_MAX_RETRIES as u8, value_parser = clap::value_parser!(u8).range(1..=10))]
    pub max_retries: u8,
}

/// Arguments for the download stage.
#[derive(ClapArgs, Debug)]
pub struct DownloadArgs {
    #[command(flatten)]
    pub batch: BatchArgs,

    /// Re-fetch assets whose destination is already populated
    #[arg(long)]
    pub overwrite: bool,
}

/// Arguments for the upload stage.
#[derive(ClapArgs, Debug)]
pub struct UploadArgs {
    #[command(flatten)]
    pub batch: BatchArgs,

    /// Wiki action-API endpoint
    #[arg(long, default_value = "https://commons.wikimedia.org/w/api.php")]
    pub wiki_api_url: String,

    /// OAuth access token for the wiki API
    #[arg(long, env = "WIKIHARVEST_WIKI_TOKEN")]
    pub wiki_token: String,

    /// Run every check but withhold the uploads
    #[arg(long)]
    pub dry_run: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: [&str; 10] = [
        "wikiharvest",
        "download",
        "ids.txt",
        "--partner",
        "nara",
        "--api-key",
        "k",
        "--provider-directory",
        "providers.json",
        "--store-url",
    ];

    fn download_args(extra: &[&str]) -> Vec<String> {
        BASE.iter()
            .copied()
            .chain(std::iter::once("s3://bucket"))
            .chain(extra.iter().copied())
            .map(ToString::to_string)
            .collect()
    }

    #[test]
    fn test_cli_download_defaults() {
        let args = Args::try_parse_from(download_args(&[])).unwrap();
        let Command::Download(cmd) = args.command else {
            panic!("expected download subcommand");
        };
        assert_eq!(cmd.batch.partner, "nara");
        assert_eq!(cmd.batch.concurrency, 8);
        assert_eq!(cmd.batch.max_retries, 3);
        assert!(!cmd.overwrite);
        assert!(cmd.batch.denylist.is_none());
        assert_eq!(cmd.batch.api_url, "https://api.dp.la/v2/items");
    }

    #[test]
    fn test_cli_download_overwrite_and_limits() {
        let args =
            Args::try_parse_from(download_args(&["--overwrite", "-c", "2", "-r", "5"])).unwrap();
        let Command::Download(cmd) = args.command else {
            panic!("expected download subcommand");
        };
        assert!(cmd.overwrite);
        assert_eq!(cmd.batch.concurrency, 2);
        assert_eq!(cmd.batch.max_retries, 5);
    }

    #[test]
    fn test_cli_concurrency_out_of_range_rejected() {
        let result = Args::try_parse_from(download_args(&["-c", "0"]));
        assert!(result.is_err());
        let result = Args::try_parse_from(download_args(&["-c", "51"]));
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_upload_parses_flags() {
        let result = Args::try_parse_from([
            "wikiharvest",
            "upload",
            "ids.txt",
            "--partner",
            "nara",
            "--api-key",
            "k",
            "--provider-directory",
            "providers.json",
            "--store-url",
            "s3://bucket",
            "--wiki-token",
            "t",
            "--dry-run",
        ]);
        let args = result.unwrap();
        let Command::Upload(cmd) = args.command else {
            panic!("expected upload subcommand");
        };
        assert!(cmd.dry_run);
        assert_eq!(cmd.wiki_api_url, "https://commons.wikimedia.org/w/api.php");
        assert_eq!(cmd.wiki_token, "t");
    }

    #[test]
    fn test_cli_missing_subcommand_errors() {
        let result = Args::try_parse_from(["wikiharvest"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_verbose_flag_is_global() {
        let args = Args::try_parse_from(download_args(&["-v"])).unwrap();
        assert_eq!(args.verbose, 1);
    }
}
