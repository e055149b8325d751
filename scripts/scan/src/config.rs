use std::path::PathBuf;
use std::time::Duration;

// Default locations, relative to the working directory (overridable by env or flags)
pub const DEFAULT_LIBRARY_PATH: &str = "library";
pub const DEFAULT_TO_READ_PATH: &str = "library/livre a lire";
pub const DEFAULT_OUTPUT_PATH: &str = "public/data/catalogue.json";
pub const DEFAULT_COVER_DIR: &str = "public/data/covers";
pub const DEFAULT_COVER_PREFIX: &str = "/data/covers";
pub const DEFAULT_CACHE_PATH: &str = "data/cache_api.json";
pub const DEFAULT_SHARD_DIR: &str = "public/data/catalogue";
pub const DEFAULT_LOG_FILE: &str = "logs/scan.log";

// Provider etiquette
pub const API_REQUEST_DELAY: Duration = Duration::from_millis(500);
pub const RETRY_DELAY: Duration = Duration::from_secs(5);
pub const MAX_RETRIES: usize = 3;
pub const MAX_RESULTS: usize = 10;
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

// Cache checkpoint: flush after this many new entries in one provider namespace
pub const CACHE_FLUSH_EVERY: usize = 50;

pub const BOOKS_PER_PAGE: usize = 24;

pub const COVER_WIDTH: u32 = 500;
pub const COVER_HEIGHT: u32 = 750;
pub const COVER_JPEG_QUALITY: u8 = 80;
pub const PLACEHOLDER_CHARS_PER_LINE: usize = 20;
pub const PLACEHOLDER_MAX_LINES: usize = 4;

/// Resolved settings for one scan run.
#[derive(Debug, Clone)]
pub struct Config {
    pub library_path: PathBuf,
    pub to_read_path: PathBuf,
    pub output_path: PathBuf,
    pub cover_dir: PathBuf,
    /// Public URL prefix written into `cover` (the UI serves `cover_dir` under it).
    pub cover_prefix: String,
    pub cache_path: PathBuf,
    pub shard_dir: PathBuf,
    pub google_api_key: Option<String>,
    /// Maximum number of files to process (0 = unlimited)
    pub limit: usize,
    /// Shard the catalogue after writing it
    pub split: bool,
}
