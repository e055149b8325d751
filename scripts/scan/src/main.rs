mod builder;
mod cache;
mod config;
mod cover;
mod filename;
mod merge;
mod model;
mod normalize;
mod provider;
mod scanner;
mod shard;
mod store;

use anyhow::Result;
use clap::{ArgAction, Args, Parser, Subcommand};
use log::{debug, info};
use simplelog::{ConfigBuilder, LevelFilter, WriteLogger};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use crate::builder::CatalogueBuilder;
use crate::config::{
    Config, DEFAULT_CACHE_PATH, DEFAULT_COVER_DIR, DEFAULT_COVER_PREFIX, DEFAULT_LIBRARY_PATH,
    DEFAULT_LOG_FILE, DEFAULT_OUTPUT_PATH, DEFAULT_SHARD_DIR, DEFAULT_TO_READ_PATH,
    REQUEST_TIMEOUT,
};
use crate::provider::{ReqwestFetch, TokioSleep};

#[derive(Parser, Debug)]
#[command(
    name = "bibliotheque-scan",
    version,
    about = "Build the e-book catalogue: scan folders, enrich from Google Books / Open Library, shard for the UI"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Scan the library, enrich every book and write the catalogue (then shard it)
    Scan(ScanArgs),
    /// Re-shard an existing catalogue.json
    Split(SplitArgs),
}

#[derive(Args, Debug)]
struct LogArgs {
    /// Debug logs written to a file (logs/scan.log unless --log-file is given)
    #[arg(long, action = ArgAction::SetTrue)]
    debug: bool,

    /// Explicit log file path (enables file logging). Ignored if empty.
    #[arg(long, default_value = "")]
    log_file: String,
}

#[derive(Args, Debug)]
struct ScanArgs {
    /// Library root
    #[arg(long, env = "LIBRARY_PATH", default_value = DEFAULT_LIBRARY_PATH)]
    library_path: PathBuf,

    /// Root of the books still to read
    #[arg(long, env = "TO_READ_PATH", default_value = DEFAULT_TO_READ_PATH)]
    to_read_path: PathBuf,

    /// Catalogue file to write
    #[arg(long, env = "OUTPUT_PATH", default_value = DEFAULT_OUTPUT_PATH)]
    output_path: PathBuf,

    /// Where cover images are stored
    #[arg(long, env = "COVER_OUTPUT_DIR", default_value = DEFAULT_COVER_DIR)]
    cover_dir: PathBuf,

    /// Public URL prefix of the cover directory
    #[arg(long, env = "COVER_PUBLIC_PREFIX", default_value = DEFAULT_COVER_PREFIX)]
    cover_prefix: String,

    /// Persistent API response cache
    #[arg(long, env = "CACHE_PATH", default_value = DEFAULT_CACHE_PATH)]
    cache_path: PathBuf,

    /// Directory receiving the catalogue shards
    #[arg(long, env = "CATALOGUE_DIR", default_value = DEFAULT_SHARD_DIR)]
    shard_dir: PathBuf,

    /// Google Books API key (optional, raises the quota)
    #[arg(long, env = "GOOGLE_BOOKS_API_KEY", hide_env_values = true)]
    google_api_key: Option<String>,

    /// Maximum number of files to process (0 = unlimited)
    #[arg(short, long, default_value_t = 0)]
    limit: usize,

    /// Write catalogue.json only, skip sharding
    #[arg(long, action = ArgAction::SetTrue)]
    no_split: bool,

    #[command(flatten)]
    log: LogArgs,
}

#[derive(Args, Debug)]
struct SplitArgs {
    /// Catalogue file to split
    #[arg(long, env = "OUTPUT_PATH", default_value = DEFAULT_OUTPUT_PATH)]
    catalogue: PathBuf,

    /// Directory receiving the shards
    #[arg(long, env = "CATALOGUE_DIR", default_value = DEFAULT_SHARD_DIR)]
    shard_dir: PathBuf,

    #[command(flatten)]
    log: LogArgs,
}

impl From<ScanArgs> for Config {
    fn from(args: ScanArgs) -> Self {
        Config {
            library_path: args.library_path,
            to_read_path: args.to_read_path,
            output_path: args.output_path,
            cover_dir: args.cover_dir,
            cover_prefix: args.cover_prefix,
            cache_path: args.cache_path,
            shard_dir: args.shard_dir,
            google_api_key: args.google_api_key.filter(|k| !k.trim().is_empty()),
            limit: args.limit,
            split: !args.no_split,
        }
    }
}

fn init_logging(args: &LogArgs) {
    if args.debug || !args.log_file.is_empty() {
        let log_path = if !args.log_file.is_empty() {
            PathBuf::from(&args.log_file)
        } else {
            PathBuf::from(DEFAULT_LOG_FILE)
        };
        if let Some(parent) = log_path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        match std::fs::File::create(&log_path) {
            Ok(file) => {
                let cfg = ConfigBuilder::new()
                    .set_time_format_rfc3339()
                    .set_target_level(LevelFilter::Off)
                    .build();
                if let Err(e) = WriteLogger::init(LevelFilter::Debug, cfg, file) {
                    eprintln!("[warn] file logger init failed: {e}");
                } else {
                    println!("[debug] logs → {:?}", log_path);
                }
            }
            Err(e) => {
                eprintln!("[warn] cannot create log file {:?}: {e}", log_path);
                env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
                    .init();
            }
        }
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    }
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Scan(args) => {
            init_logging(&args.log);
            let config = Config::from(args);
            debug!(
                "library {:?}, to-read {:?}, catalogue {:?}, covers {:?} ({}), cache {:?}, shards {:?}",
                config.library_path,
                config.to_read_path,
                config.output_path,
                config.cover_dir,
                config.cover_prefix,
                config.cache_path,
                config.shard_dir
            );
            if config.google_api_key.is_none() {
                info!("no Google Books API key, using the anonymous quota");
            }
            let fetch = Arc::new(ReqwestFetch::new(REQUEST_TIMEOUT)?);
            let mut builder = CatalogueBuilder::new(config, fetch, Arc::new(TokioSleep));
            builder.run().await?;
        }
        Command::Split(args) => {
            init_logging(&args.log);
            shard::split_file(&args.catalogue, &args.shard_dir)?;
        }
    }
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
