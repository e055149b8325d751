//! One scan run: walk the roots, enrich each file, write the catalogue, shard it.

use anyhow::{bail, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, error, info, warn};
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

use crate::cache::{ApiCache, Provider};
use crate::config::Config;
use crate::cover::CoverResolver;
use crate::filename;
use crate::merge::merge;
use crate::model::{now_iso, BookRecord, Catalogue};
use crate::provider::{GoogleBooks, HttpFetch, OpenLibrary, ProviderClient, RetryPolicy, Sleep};
use crate::scanner::{self, ScannedFile};
use crate::shard::{self, ShardSummary};
use crate::store::write_json_atomic;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Init,
    Scanning,
    Processing,
    Writing,
    Done,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub found: usize,
    pub written: usize,
    pub skipped: usize,
    pub shards: Option<ShardSummary>,
}

pub struct CatalogueBuilder {
    config: Config,
    primary: ProviderClient,
    fallback: ProviderClient,
    covers: CoverResolver,
    cache: ApiCache,
    state: RunState,
}

impl CatalogueBuilder {
    pub fn new(config: Config, fetch: Arc<dyn HttpFetch>, sleeper: Arc<dyn Sleep>) -> Self {
        Self::with_policy(config, fetch, sleeper, RetryPolicy::default())
    }

    pub fn with_policy(
        config: Config,
        fetch: Arc<dyn HttpFetch>,
        sleeper: Arc<dyn Sleep>,
        policy: RetryPolicy,
    ) -> Self {
        let primary = ProviderClient::new(
            Box::new(GoogleBooks::new(config.google_api_key.clone())),
            fetch.clone(),
            sleeper.clone(),
            policy.clone(),
        );
        let fallback = ProviderClient::new(Box::new(OpenLibrary), fetch.clone(), sleeper, policy);
        let covers = CoverResolver::new(fetch, &config.cover_dir, &config.cover_prefix);
        let cache = ApiCache::load(&config.cache_path);
        Self {
            config,
            primary,
            fallback,
            covers,
            cache,
            state: RunState::Init,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    fn enter(&mut self, state: RunState) {
        debug!("run state {:?} -> {:?}", self.state, state);
        self.state = state;
    }

    /// Run the whole pipeline. The API cache is flushed whatever the outcome.
    pub async fn run(&mut self) -> Result<RunReport> {
        let started = Instant::now();
        let outcome = self.build().await;
        match self.cache.flush() {
            Ok(()) => info!(
                "API cache saved to {:?} ({} Google Books / {} Open Library entries)",
                self.cache.path(),
                self.cache.len(Provider::GoogleBooks),
                self.cache.len(Provider::OpenLibrary)
            ),
            Err(e) => warn!("API cache not saved: {e:#}"),
        }
        match &outcome {
            Ok(report) => {
                self.enter(RunState::Done);
                info!(
                    "scan done in {:.1}s: {} files found, {} books written, {} skipped",
                    started.elapsed().as_secs_f32(),
                    report.found,
                    report.written,
                    report.skipped
                );
                if let Some(shards) = &report.shards {
                    debug!("shards: {shards:?}");
                }
            }
            Err(e) => {
                self.enter(RunState::Failed);
                error!("scan failed: {e:#}");
            }
        }
        outcome
    }

    async fn build(&mut self) -> Result<RunReport> {
        self.enter(RunState::Scanning);
        info!(
            "scanning {:?} and {:?}",
            self.config.library_path, self.config.to_read_path
        );
        let mut files = scanner::scan(&self.config.library_path, &self.config.to_read_path);
        let found = files.len();
        info!("{found} book files found");
        if self.config.limit > 0 && files.len() > self.config.limit {
            files.truncate(self.config.limit);
            info!("limited to the first {} files", self.config.limit);
        }

        self.enter(RunState::Processing);
        let pb = ProgressBar::new(files.len() as u64);
        pb.set_style(
            ProgressStyle::with_template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        let mut books = Vec::with_capacity(files.len());
        let mut skipped = 0;
        for file in &files {
            pb.set_message(file.stem.clone());
            match self.process(file).await {
                Ok(record) => books.push(record),
                Err(e) => {
                    skipped += 1;
                    warn!("skipping {:?}: {e:#}", file.path);
                }
            }
            pb.inc(1);
        }
        pb.finish_with_message("done");

        self.enter(RunState::Writing);
        let catalogue = Catalogue {
            last_updated: now_iso(),
            books,
        };
        write_json_atomic(&self.config.output_path, &catalogue)
            .with_context(|| format!("write catalogue {:?}", self.config.output_path))?;
        info!(
            "catalogue of {} books written to {:?}",
            catalogue.books.len(),
            self.config.output_path
        );
        let shards = if self.config.split {
            Some(shard::shard(&catalogue, &self.config.shard_dir)?)
        } else {
            None
        };

        Ok(RunReport {
            found,
            written: catalogue.books.len(),
            skipped,
            shards,
        })
    }

    async fn process(&mut self, file: &ScannedFile) -> Result<BookRecord> {
        let hints = filename::parse(&file.stem, &file.rel_path);
        if hints.title.trim().is_empty() {
            bail!("no usable title in file name");
        }
        debug!(
            "{:?} ({} bytes, modified {:?}): hints {:?}",
            file.rel_path, file.size, file.modified, hints
        );

        let author = hints.author.as_deref();
        let meta = match self.primary.lookup(&mut self.cache, &hints.title, author).await {
            Some(meta) => Some(meta),
            None => {
                debug!("no {} result for {:?}", self.primary.provider(), hints.title);
                self.fallback.lookup(&mut self.cache, &hints.title, author).await
            }
        };

        let merged = merge(&hints, meta.as_ref());
        let id = Uuid::new_v4().to_string();
        let cover = self
            .covers
            .resolve(
                &id,
                merged.cover_url.as_deref(),
                &merged.title,
                &merged.author,
                file.file_type,
            )
            .await;

        Ok(BookRecord {
            id,
            title: merged.title,
            author: merged.author,
            cover,
            summary: merged.summary,
            genre: merged.genre,
            language: merged.language,
            publisher: merged.publisher,
            published_date: merged.published_date,
            file_path: file.path.to_string_lossy().into_owned(),
            file_type: file.file_type,
            file_size: file.size,
            to_read: file.to_read,
            added_date: now_iso(),
            series: merged.series,
        })
    }
}
