use anyhow::Result;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::config::CACHE_FLUSH_EVERY;
use crate::model::now_iso;
use crate::store::{read_json, write_json_atomic};

/// External metadata sources, each with its own cache namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Provider {
    GoogleBooks,
    OpenLibrary,
}

impl Provider {
    pub fn label(&self) -> &'static str {
        match self {
            Provider::GoogleBooks => "Google Books",
            Provider::OpenLibrary => "Open Library",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

type Namespace = BTreeMap<String, Option<Value>>;

// On-disk layout: {"googleBooks": {...}, "openLibrary": {...}, "lastUpdated": "..."}
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CacheFile {
    #[serde(default)]
    google_books: Namespace,
    #[serde(default)]
    open_library: Namespace,
    #[serde(default)]
    last_updated: Option<String>,
}

impl CacheFile {
    fn namespace(&self, provider: Provider) -> &Namespace {
        match provider {
            Provider::GoogleBooks => &self.google_books,
            Provider::OpenLibrary => &self.open_library,
        }
    }

    fn namespace_mut(&mut self, provider: Provider) -> &mut Namespace {
        match provider {
            Provider::GoogleBooks => &mut self.google_books,
            Provider::OpenLibrary => &mut self.open_library,
        }
    }
}

/// Result of a cache read. `Hit(None)` is a remembered "no result", not a miss.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CacheLookup<'a> {
    Miss,
    Hit(Option<&'a Value>),
}

/// Provider responses keyed by normalized title/author, persisted across runs.
#[derive(Debug)]
pub struct ApiCache {
    path: PathBuf,
    data: CacheFile,
    new_google: usize,
    new_open_library: usize,
    flush_every: usize,
}

impl ApiCache {
    /// Load the cache file; a missing or unreadable file yields an empty cache.
    pub fn load(path: &Path) -> Self {
        let data = if path.exists() {
            match read_json::<CacheFile>(path) {
                Ok(data) => {
                    info!(
                        "API cache loaded: {} Google Books / {} Open Library entries",
                        data.google_books.len(),
                        data.open_library.len()
                    );
                    data
                }
                Err(e) => {
                    warn!("API cache unreadable, starting empty: {e:#}");
                    CacheFile::default()
                }
            }
        } else {
            warn!("no API cache at {:?}, starting empty", path);
            CacheFile::default()
        };
        Self {
            path: path.to_path_buf(),
            data,
            new_google: 0,
            new_open_library: 0,
            flush_every: CACHE_FLUSH_EVERY,
        }
    }

    #[cfg(test)]
    pub fn with_flush_every(mut self, every: usize) -> Self {
        self.flush_every = every.max(1);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, provider: Provider, key: &str) -> CacheLookup<'_> {
        match self.data.namespace(provider).get(key) {
            Some(value) => CacheLookup::Hit(value.as_ref()),
            None => CacheLookup::Miss,
        }
    }

    /// Store a response (or `None` for a confirmed empty result). Every
    /// `flush_every` new keys in a namespace the file is checkpointed.
    pub fn put(&mut self, provider: Provider, key: &str, value: Option<Value>) {
        let is_new = self
            .data
            .namespace_mut(provider)
            .insert(key.to_string(), value)
            .is_none();
        if !is_new {
            return;
        }
        let added = {
            let counter = match provider {
                Provider::GoogleBooks => &mut self.new_google,
                Provider::OpenLibrary => &mut self.new_open_library,
            };
            *counter += 1;
            *counter
        };
        if added % self.flush_every == 0 {
            debug!("cache checkpoint after {added} new {provider} entries");
            if let Err(e) = self.flush() {
                warn!("cache checkpoint failed: {e:#}");
            }
        }
    }

    pub fn len(&self, provider: Provider) -> usize {
        self.data.namespace(provider).len()
    }

    /// Rewrite the whole cache file with a fresh `lastUpdated`.
    pub fn flush(&mut self) -> Result<()> {
        self.data.last_updated = Some(now_iso());
        write_json_atomic(&self.path, &self.data)
    }
}
