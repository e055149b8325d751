use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

// Temp file next to `path`, filled by `fill`, then renamed over `path`
fn replace_atomic(path: &Path, fill: impl FnOnce(&mut NamedTempFile) -> Result<()>) -> Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).with_context(|| format!("create directory {:?}", parent))?;
    let mut tmp = NamedTempFile::new_in(parent)
        .with_context(|| format!("create temp file in {:?}", parent))?;
    fill(&mut tmp)?;
    tmp.flush()?;
    tmp.persist(path)
        .with_context(|| format!("replace {:?}", path))?;
    Ok(())
}

/// Serialize `value` as pretty JSON and swap it into place, so readers only ever
/// see the previous file or the complete new one.
pub fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    replace_atomic(path, |tmp| {
        serde_json::to_writer_pretty(tmp, value).with_context(|| format!("serialize {:?}", path))
    })
}

pub fn write_bytes_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    replace_atomic(path, |tmp| {
        tmp.write_all(bytes).with_context(|| format!("write {:?}", path))
    })
}

/// Read a JSON document, reporting the failing field path on schema errors.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = fs::read_to_string(path).with_context(|| format!("read {:?}", path))?;
    let de = &mut serde_json::Deserializer::from_str(&text);
    serde_path_to_error::deserialize(de).with_context(|| format!("parse {:?}", path))
}
