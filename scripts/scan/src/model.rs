use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const UNKNOWN_AUTHOR: &str = "Auteur inconnu";
pub const UNCATEGORIZED: &str = "Non classé";

/// Book file formats picked up by the scanner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Epub,
    Pdf,
    Cbz,
    Cbr,
}

impl FileType {
    pub const ALL: [FileType; 4] = [FileType::Epub, FileType::Pdf, FileType::Cbz, FileType::Cbr];

    /// Case-insensitive match on a bare extension (`"EPUB"`, `"pdf"`, ...).
    pub fn from_extension(ext: &str) -> Option<Self> {
        let ext = ext.trim_start_matches('.');
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(ext))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FileType::Epub => "epub",
            FileType::Pdf => "pdf",
            FileType::Cbz => "cbz",
            FileType::Cbr => "cbr",
        }
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Series {
    pub name: String,
    /// 1-based position in the series
    pub number: u32,
}

/// One book's canonical metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookRecord {
    pub id: String,
    pub title: String,
    pub author: String,
    /// Public path of the cover image; `null` only when even the placeholder failed.
    pub cover: Option<String>,
    pub summary: String,
    pub genre: String,
    pub language: String,
    pub publisher: String,
    pub published_date: String,
    pub file_path: String,
    pub file_type: FileType,
    pub file_size: u64,
    pub to_read: bool,
    pub added_date: String,
    #[serde(rename = "serie", default, skip_serializing_if = "Option::is_none")]
    pub series: Option<Series>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Catalogue {
    pub last_updated: String,
    pub books: Vec<BookRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenreEntry {
    pub id: String,
    pub name: String,
    pub count: usize,
    pub file: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogueIndex {
    pub last_updated: String,
    pub total_books: usize,
    pub genres: Vec<GenreEntry>,
}

#[derive(Debug, Serialize)]
pub struct GenreShard<'a> {
    pub genre: &'a str,
    pub count: usize,
    pub books: Vec<&'a BookRecord>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<'a> {
    pub page: usize,
    pub total_pages: usize,
    pub count: usize,
    pub books: &'a [BookRecord],
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageRef {
    pub page: usize,
    pub file: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationIndex {
    pub total_books: usize,
    pub books_per_page: usize,
    pub total_pages: usize,
    pub pages: Vec<PageRef>,
}

#[derive(Debug, Serialize)]
pub struct ToReadShard<'a> {
    pub count: usize,
    pub books: Vec<&'a BookRecord>,
}

/// ISO 8601 UTC timestamp with millisecond precision (`2024-05-01T10:00:00.000Z`).
pub fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_type_is_case_insensitive() {
        assert_eq!(FileType::from_extension("EPUB"), Some(FileType::Epub));
        assert_eq!(FileType::from_extension(".Cbr"), Some(FileType::Cbr));
        assert_eq!(FileType::from_extension("mobi"), None);
    }

    #[test]
    fn record_serializes_with_ui_field_names() {
        let record = BookRecord {
            id: "abc".into(),
            title: "Dune".into(),
            author: "Frank Herbert".into(),
            cover: None,
            summary: String::new(),
            genre: UNCATEGORIZED.into(),
            language: "fr".into(),
            publisher: String::new(),
            published_date: String::new(),
            file_path: "/books/Dune.epub".into(),
            file_type: FileType::Epub,
            file_size: 42,
            to_read: true,
            added_date: "2024-01-01T00:00:00.000Z".into(),
            series: Some(Series { name: "Dune".into(), number: 1 }),
        };
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["cover"], serde_json::Value::Null);
        assert_eq!(value["fileType"], "epub");
        assert_eq!(value["toRead"], true);
        assert_eq!(value["serie"]["number"], 1);
        assert!(value.get("series").is_none());

        let back: BookRecord = serde_json::from_value(value).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn missing_series_is_omitted() {
        let json = r#"{"id":"x","title":"T","author":"A","cover":"/c.jpg","summary":"",
            "genre":"g","language":"","publisher":"","publishedDate":"","filePath":"p",
            "fileType":"pdf","fileSize":1,"toRead":false,"addedDate":"d"}"#;
        let record: BookRecord = serde_json::from_str(json).unwrap();
        assert!(record.series.is_none());
        let out = serde_json::to_string(&record).unwrap();
        assert!(!out.contains("serie"));
    }
}
