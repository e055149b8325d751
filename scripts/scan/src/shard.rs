//! Splits a catalogue into the small files the UI loads on demand: an index of
//! genres, one file per genre, fixed-size pages and the to-read list.

use anyhow::{Context, Result};
use log::{debug, info};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

use crate::config::BOOKS_PER_PAGE;
use crate::model::{
    BookRecord, Catalogue, CatalogueIndex, GenreEntry, GenreShard, Page, PageRef,
    PaginationIndex, ToReadShard, UNCATEGORIZED,
};
use crate::normalize::genre_id;
use crate::store::{read_json, write_json_atomic};

const INDEX_FILE: &str = "index.json";
const PAGINATION_FILE: &str = "pagination.json";
const TO_READ_FILE: &str = "to-read.json";

/// What one sharding pass wrote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardSummary {
    pub genres: usize,
    pub pages: usize,
    pub to_read: usize,
}

// File stems that a genre id must not take over
fn is_reserved(id: &str) -> bool {
    matches!(id, "index" | "pagination" | "to-read")
        || id
            .strip_prefix("page-")
            .is_some_and(|n| !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()))
}

/// Genres in first-appearance order, then stably sorted by size (largest first).
fn group_by_genre(books: &[BookRecord]) -> Vec<(&str, Vec<&BookRecord>)> {
    let mut groups: Vec<(&str, Vec<&BookRecord>)> = Vec::new();
    let mut position: HashMap<&str, usize> = HashMap::new();
    for book in books {
        let genre = match book.genre.trim() {
            "" => UNCATEGORIZED,
            g => g,
        };
        let slot = *position.entry(genre).or_insert_with(|| {
            groups.push((genre, Vec::new()));
            groups.len() - 1
        });
        groups[slot].1.push(book);
    }
    groups.sort_by(|a, b| b.1.len().cmp(&a.1.len()));
    groups
}

fn unique_id(name: &str, used: &mut HashSet<String>) -> String {
    let base = match genre_id(name) {
        id if id.is_empty() => "genre".to_string(),
        id => id,
    };
    let mut candidate = base.clone();
    let mut n = 2;
    while is_reserved(&candidate) || used.contains(&candidate) {
        candidate = format!("{base}-{n}");
        n += 1;
    }
    used.insert(candidate.clone());
    candidate
}

fn clear_json_files(dir: &Path) -> Result<()> {
    for entry in fs::read_dir(dir).with_context(|| format!("list {:?}", dir))? {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|e| e == "json") {
            fs::remove_file(&path).with_context(|| format!("remove stale {:?}", path))?;
        }
    }
    Ok(())
}

pub fn total_pages(total_books: usize) -> usize {
    total_books.div_ceil(BOOKS_PER_PAGE)
}

/// Regenerate every shard file of `catalogue` under `dir`.
pub fn shard(catalogue: &Catalogue, dir: &Path) -> Result<ShardSummary> {
    fs::create_dir_all(dir).with_context(|| format!("create shard directory {:?}", dir))?;
    clear_json_files(dir)?;

    let mut used = HashSet::new();
    let mut genres = Vec::new();
    for (name, books) in group_by_genre(&catalogue.books) {
        let id = unique_id(name, &mut used);
        let file = format!("{id}.json");
        let count = books.len();
        write_json_atomic(
            &dir.join(&file),
            &GenreShard {
                genre: name,
                count,
                books,
            },
        )?;
        debug!("genre shard {file} written");
        genres.push(GenreEntry {
            id,
            name: name.to_string(),
            count,
            file,
        });
    }

    let index = CatalogueIndex {
        last_updated: catalogue.last_updated.clone(),
        total_books: catalogue.books.len(),
        genres,
    };
    write_json_atomic(&dir.join(INDEX_FILE), &index)?;

    let pages = total_pages(catalogue.books.len());
    let mut refs = Vec::with_capacity(pages);
    for (i, chunk) in catalogue.books.chunks(BOOKS_PER_PAGE).enumerate() {
        let page = i + 1;
        let file = format!("page-{page}.json");
        write_json_atomic(
            &dir.join(&file),
            &Page {
                page,
                total_pages: pages,
                count: chunk.len(),
                books: chunk,
            },
        )?;
        refs.push(PageRef { page, file });
    }
    write_json_atomic(
        &dir.join(PAGINATION_FILE),
        &PaginationIndex {
            total_books: catalogue.books.len(),
            books_per_page: BOOKS_PER_PAGE,
            total_pages: pages,
            pages: refs,
        },
    )?;

    let to_read: Vec<&BookRecord> = catalogue.books.iter().filter(|b| b.to_read).collect();
    let to_read_count = to_read.len();
    if to_read_count > 0 {
        write_json_atomic(
            &dir.join(TO_READ_FILE),
            &ToReadShard {
                count: to_read_count,
                books: to_read,
            },
        )?;
    }

    let summary = ShardSummary {
        genres: index.genres.len(),
        pages,
        to_read: to_read_count,
    };
    info!(
        "catalogue split into {} genres, {} pages, {} to-read under {:?}",
        summary.genres, summary.pages, summary.to_read, dir
    );
    Ok(summary)
}

/// Re-shard an existing catalogue file.
pub fn split_file(catalogue_path: &Path, dir: &Path) -> Result<ShardSummary> {
    let catalogue: Catalogue = read_json(catalogue_path)?;
    info!("{} books read from {:?}", catalogue.books.len(), catalogue_path);
    shard(&catalogue, dir)
}
