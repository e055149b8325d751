use log::{debug, warn};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use walkdir::{DirEntry, WalkDir};

use crate::model::FileType;

/// A book file found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedFile {
    pub path: PathBuf,
    /// File name without extension
    pub stem: String,
    pub file_type: FileType,
    pub size: u64,
    pub modified: Option<SystemTime>,
    pub to_read: bool,
    /// Path relative to the root the file was found under, file name included
    pub rel_path: String,
}

fn is_skipped(entry: &DirEntry) -> bool {
    if entry.depth() == 0 {
        return false;
    }
    let name = entry.file_name().to_string_lossy();
    name.starts_with('.') || name == "node_modules"
}

// `to_read` expressed under `library` when it is nested inside it
fn nested_root(library: &Path, to_read: &Path) -> Option<PathBuf> {
    let library_canon = fs::canonicalize(library).ok()?;
    let to_read_canon = fs::canonicalize(to_read).ok()?;
    let suffix = to_read_canon.strip_prefix(&library_canon).ok()?;
    (!suffix.as_os_str().is_empty()).then(|| library.join(suffix))
}

fn walk(root: &Path, to_read: bool, exclude: Option<&Path>, out: &mut Vec<ScannedFile>) {
    if !root.is_dir() {
        warn!("directory not found, skipped: {:?}", root);
        return;
    }
    let walker = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_skipped(e) && exclude != Some(e.path()));
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("cannot read entry under {:?}: {e}", root);
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let Some(file_type) = path
            .extension()
            .and_then(|ext| FileType::from_extension(&ext.to_string_lossy()))
        else {
            continue;
        };
        let (size, modified) = match entry.metadata() {
            Ok(meta) => (meta.len(), meta.modified().ok()),
            Err(e) => {
                warn!("cannot stat {:?}: {e}", path);
                continue;
            }
        };
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let rel_path = path
            .strip_prefix(root)
            .unwrap_or(path)
            .to_string_lossy()
            .into_owned();
        out.push(ScannedFile {
            path: path.to_path_buf(),
            stem,
            file_type,
            size,
            modified,
            to_read,
            rel_path,
        });
    }
}

/// All book files under the library root, then under the to-read root. Each
/// walk is sorted by file name; a to-read root nested in the library is only
/// walked once, as to-read.
pub fn scan(library: &Path, to_read: &Path) -> Vec<ScannedFile> {
    let exclude = nested_root(library, to_read);
    if let Some(nested) = &exclude {
        debug!("to-read folder {:?} is inside the library, walked separately", nested);
    }
    let mut files = Vec::new();
    walk(library, false, exclude.as_deref(), &mut files);
    let library_count = files.len();
    walk(to_read, true, None, &mut files);
    debug!(
        "scan found {} library files and {} to-read files",
        library_count,
        files.len() - library_count
    );
    files
}
