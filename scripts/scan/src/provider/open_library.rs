use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

use super::{first_string, is_french_publisher, non_blank, MetadataSource, ProviderMetadata, SearchRequest};
use crate::cache::Provider;
use crate::config::MAX_RESULTS;
use crate::filename::{first_series_match, name_number, SeriesPattern};
use crate::model::Series;

const SEARCH_URL: &str = "https://openlibrary.org/search.json";
const COVERS_URL: &str = "https://covers.openlibrary.org/b/id";

static VOLUME_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(?:tome|livre|volume|vol\.?)\s*(\d+)").expect("valid volume regex"));

static TITLE_SERIES: Lazy<Vec<SeriesPattern>> = Lazy::new(|| {
    vec![
        // "Fondation - Tome 2" / "Fondation, Livre 2"
        SeriesPattern::new(
            r"(?i)^([^-,]+)\s*[-,]\s*(?:Tome|Livre|Volume|Vol\.?)\s*(\d+)",
            name_number,
        ),
        // "Seconde Fondation (Fondation 3)"
        SeriesPattern::new(
            r"(?i)^.+\s*[\(\[]\s*([^\d\(\)\[\]]+)\s*(\d+)\s*[\)\]]$",
            name_number,
        ),
    ]
});

// One entry of `docs` in a search.json response
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Doc {
    title: Option<String>,
    author_name: Vec<String>,
    subject: Vec<String>,
    language: Vec<String>,
    publisher: Vec<String>,
    publish_date: Vec<String>,
    series: Option<Value>,
    cover_i: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    docs: Vec<Value>,
}

/// Open Library search, used when Google Books has nothing.
pub struct OpenLibrary;

fn doc(candidate: &Value) -> Option<Doc> {
    Doc::deserialize(candidate).ok()
}

fn first_non_blank(values: Vec<String>) -> Option<String> {
    values.into_iter().find_map(|v| non_blank(Some(v)))
}

fn series_of(doc: &Doc) -> Option<Series> {
    let title = doc.title.as_deref().unwrap_or("");
    if let Some(name) = doc.series.as_ref().and_then(first_string) {
        let number = VOLUME_NUMBER
            .captures(title)
            .and_then(|c| c[1].parse::<u32>().ok())
            .filter(|n| *n > 0)
            .unwrap_or(1);
        return Some(Series { name, number });
    }
    first_series_match(&TITLE_SERIES, title).map(|m| Series {
        name: m.name,
        number: m.number,
    })
}

impl MetadataSource for OpenLibrary {
    fn provider(&self) -> Provider {
        Provider::OpenLibrary
    }

    fn search_request(&self, title: &str, author: Option<&str>) -> SearchRequest {
        let mut query = vec![("title".to_string(), format!("\"{}\"", title.replace('"', "")))];
        if let Some(author) = author.map(str::trim).filter(|a| !a.is_empty()) {
            query.push(("author".to_string(), format!("\"{}\"", author.replace('"', ""))));
        }
        query.push(("limit".to_string(), MAX_RESULTS.to_string()));
        query.push(("language".to_string(), "fre".to_string()));
        SearchRequest {
            url: SEARCH_URL.to_string(),
            query,
        }
    }

    fn candidates(&self, body: Value) -> Vec<Value> {
        serde_json::from_value::<SearchResponse>(body)
            .map(|r| r.docs)
            .unwrap_or_default()
    }

    fn is_preferred_edition(&self, candidate: &Value) -> bool {
        doc(candidate).is_some_and(|d| {
            d.language.iter().any(|l| l == "fre")
                || d.publisher.iter().any(|p| is_french_publisher(p))
        })
    }

    fn metadata(&self, candidate: &Value) -> Option<ProviderMetadata> {
        let doc = doc(candidate)?;
        let series = series_of(&doc);
        let language = doc
            .language
            .iter()
            .any(|l| l == "fre")
            .then(|| "fr".to_string());
        let cover_url = doc
            .cover_i
            .filter(|id| *id > 0)
            .map(|id| format!("{COVERS_URL}/{id}-L.jpg"));
        Some(ProviderMetadata {
            title: non_blank(doc.title),
            authors: doc
                .author_name
                .into_iter()
                .filter_map(|a| non_blank(Some(a)))
                .collect(),
            summary: None,
            genre: first_non_blank(doc.subject),
            language,
            publisher: first_non_blank(doc.publisher),
            published_date: first_non_blank(doc.publish_date),
            series,
            cover_url,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn search_request_parameters() {
        let req = OpenLibrary.search_request("L'Étranger", Some("Albert Camus"));
        assert_eq!(req.url, SEARCH_URL);
        assert_eq!(
            req.query,
            vec![
                ("title".to_string(), "\"L'Étranger\"".to_string()),
                ("author".to_string(), "\"Albert Camus\"".to_string()),
                ("limit".to_string(), "10".to_string()),
                ("language".to_string(), "fre".to_string()),
            ]
        );
        let req = OpenLibrary.search_request("Dune", None);
        assert!(req.query.iter().all(|(k, _)| k != "author"));
    }

    #[test]
    fn doc_fields_are_mapped() {
        let m = OpenLibrary
            .metadata(&json!({
                "title": "L'Étranger",
                "author_name": ["Albert Camus"],
                "subject": ["Fiction", "Absurde"],
                "language": ["eng", "fre"],
                "publisher": ["Gallimard"],
                "publish_date": ["1942"],
                "cover_i": 12345
            }))
            .unwrap();
        assert_eq!(m.authors, vec!["Albert Camus".to_string()]);
        assert_eq!(m.genre.as_deref(), Some("Fiction"));
        assert_eq!(m.language.as_deref(), Some("fr"));
        assert_eq!(m.published_date.as_deref(), Some("1942"));
        assert_eq!(m.cover_url.as_deref(), Some("https://covers.openlibrary.org/b/id/12345-L.jpg"));
        assert_eq!(m.summary, None);
    }

    #[test]
    fn non_french_doc_has_no_language() {
        let m = OpenLibrary.metadata(&json!({"title": "Dune", "language": ["eng"]})).unwrap();
        assert_eq!(m.language, None);
        assert_eq!(m.cover_url, None);
    }

    #[test]
    fn series_field_with_number_from_title() {
        let m = OpenLibrary
            .metadata(&json!({"title": "Fondation, tome 2", "series": ["Le Cycle de Fondation"]}))
            .unwrap();
        assert_eq!(m.series, Some(Series { name: "Le Cycle de Fondation".into(), number: 2 }));
    }

    #[test]
    fn series_from_title_patterns() {
        let m = OpenLibrary.metadata(&json!({"title": "Fondation - Tome 3"})).unwrap();
        assert_eq!(m.series, Some(Series { name: "Fondation".into(), number: 3 }));

        let m = OpenLibrary.metadata(&json!({"title": "Seconde Fondation (Fondation 3)"})).unwrap();
        assert_eq!(m.series, Some(Series { name: "Fondation".into(), number: 3 }));
    }

    #[test]
    fn french_language_is_preferred() {
        assert!(OpenLibrary.is_preferred_edition(&json!({"language": ["fre"]})));
        assert!(OpenLibrary.is_preferred_edition(&json!({"publisher": ["Flammarion"]})));
        assert!(!OpenLibrary.is_preferred_edition(&json!({"language": ["eng"]})));
    }
}
