use crate::filename::ParsedName;
use crate::model::{Series, UNCATEGORIZED, UNKNOWN_AUTHOR};
use crate::provider::ProviderMetadata;

/// Reconciled descriptive fields for one book, before file facts and cover are attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedRecord {
    pub title: String,
    pub author: String,
    pub genre: String,
    pub series: Option<Series>,
    pub summary: String,
    pub language: String,
    pub publisher: String,
    pub published_date: String,
    pub cover_url: Option<String>,
}

fn filled(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

// Provider-only text field, empty when absent
fn text(value: Option<&str>) -> String {
    value.and_then(filled).unwrap_or_default()
}

/// Field by field: provider value if non-empty, else the filename hint, else the sentinel.
pub fn merge(hints: &ParsedName, meta: Option<&ProviderMetadata>) -> MergedRecord {
    let provider_title = meta.and_then(|m| m.title.as_deref()).and_then(filled);
    let provider_author = meta
        .map(|m| m.authors.join(", "))
        .as_deref()
        .and_then(filled);
    let provider_genre = meta.and_then(|m| m.genre.as_deref()).and_then(filled);

    let series = meta
        .and_then(|m| m.series.clone())
        .or_else(|| {
            hints.series.as_ref().map(|s| Series {
                name: s.name.clone(),
                number: s.number,
            })
        });

    MergedRecord {
        title: provider_title
            .or_else(|| filled(&hints.title))
            .unwrap_or_default(),
        author: provider_author
            .or_else(|| hints.author.as_deref().and_then(filled))
            .unwrap_or_else(|| UNKNOWN_AUTHOR.to_string()),
        genre: provider_genre
            .or_else(|| hints.genre.as_deref().and_then(filled))
            .unwrap_or_else(|| UNCATEGORIZED.to_string()),
        series,
        summary: text(meta.and_then(|m| m.summary.as_deref())),
        language: text(meta.and_then(|m| m.language.as_deref())),
        publisher: text(meta.and_then(|m| m.publisher.as_deref())),
        published_date: text(meta.and_then(|m| m.published_date.as_deref())),
        cover_url: meta
            .and_then(|m| m.cover_url.as_deref())
            .and_then(filled),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filename::{parse, SeriesMatch};

    fn hints() -> ParsedName {
        ParsedName {
            title: "La Chambre des Secrets".into(),
            author: Some("J.K. Rowling".into()),
            series: Some(SeriesMatch {
                name: "Harry Potter".into(),
                number: 2,
                extracted_title: Some("La Chambre des Secrets".into()),
            }),
            genre: Some("Jeunesse".into()),
        }
    }

    #[test]
    fn no_provider_uses_hints() {
        let merged = merge(&hints(), None);
        assert_eq!(merged.title, "La Chambre des Secrets");
        assert_eq!(merged.author, "J.K. Rowling");
        assert_eq!(merged.genre, "Jeunesse");
        assert_eq!(merged.series, Some(Series { name: "Harry Potter".into(), number: 2 }));
        assert_eq!(merged.summary, "");
        assert_eq!(merged.cover_url, None);
    }

    #[test]
    fn nothing_known_yields_sentinels() {
        let parsed = parse("Sans titre", "Sans titre.epub");
        let merged = merge(&parsed, None);
        assert_eq!(merged.title, "Sans titre");
        assert_eq!(merged.author, UNKNOWN_AUTHOR);
        assert_eq!(merged.genre, UNCATEGORIZED);
        assert_eq!(merged.series, None);
    }

    #[test]
    fn provider_values_win() {
        let meta = ProviderMetadata {
            title: Some("Harry Potter et la Chambre des Secrets".into()),
            authors: vec!["J. K. Rowling".into(), "Jean-François Ménard".into()],
            genre: Some("Juvenile Fiction".into()),
            summary: Some("Deuxième année.".into()),
            language: Some("fr".into()),
            cover_url: Some("https://example.org/c.jpg".into()),
            ..Default::default()
        };
        let merged = merge(&hints(), Some(&meta));
        assert_eq!(merged.title, "Harry Potter et la Chambre des Secrets");
        assert_eq!(merged.author, "J. K. Rowling, Jean-François Ménard");
        assert_eq!(merged.genre, "Juvenile Fiction");
        assert_eq!(merged.language, "fr");
        assert_eq!(merged.publisher, "");
        assert_eq!(merged.cover_url.as_deref(), Some("https://example.org/c.jpg"));
        // provider had no series, so the filename one is kept
        assert_eq!(merged.series.map(|s| s.number), Some(2));
    }

    #[test]
    fn blank_provider_fields_fall_back() {
        let meta = ProviderMetadata {
            title: Some("  ".into()),
            authors: vec![],
            genre: Some(String::new()),
            series: Some(Series { name: "Poudlard".into(), number: 7 }),
            ..Default::default()
        };
        let merged = merge(&hints(), Some(&meta));
        assert_eq!(merged.title, "La Chambre des Secrets");
        assert_eq!(merged.author, "J.K. Rowling");
        assert_eq!(merged.genre, "Jeunesse");
        // series is taken whole from one source
        assert_eq!(merged.series, Some(Series { name: "Poudlard".into(), number: 7 }));
    }
}
