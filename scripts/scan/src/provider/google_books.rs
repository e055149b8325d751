use once_cell::sync::Lazy;
use serde::Deserialize;
use serde_json::Value;

use super::{first_string, is_french_publisher, non_blank, positive_number, MetadataSource, ProviderMetadata, SearchRequest};
use crate::cache::Provider;
use crate::config::MAX_RESULTS;
use crate::filename::{first_series_match, name_number, number_name, SeriesPattern};
use crate::model::Series;

const VOLUMES_URL: &str = "https://www.googleapis.com/books/v1/volumes";

static SUBTITLE_SERIES: Lazy<Vec<SeriesPattern>> = Lazy::new(|| {
    vec![
        // "Tome 3 de la série Fondation"
        SeriesPattern::new(
            r"(?i)(?:Tome|Livre|Volume|Vol\.?)\s*(\d+)\s*(?:de|of|from)?\s*(?:la|the)?\s*(?:série|series)?\s*([^,\.]+)",
            number_name,
        ),
        // "Fondation, tome 3"
        SeriesPattern::new(
            r"(?i)([^,\.]+)\s*,\s*(?:tome|livre|volume|vol\.?)\s*(\d+)",
            name_number,
        ),
    ]
});

static TITLE_SERIES: Lazy<Vec<SeriesPattern>> = Lazy::new(|| {
    // "Le Trône de Fer, Tome 1" / "Le Trône de Fer (Tome 1)"
    vec![SeriesPattern::new(
        r"(?i)^([^,\(\)]+)\s*[,\(]\s*(?:Tome|Livre|Volume|Vol\.?)\s*(\d+)(?:[\),]|$)",
        name_number,
    )]
});

#[derive(Debug, Default, Deserialize)]
struct VolumesResponse {
    #[serde(default)]
    items: Vec<Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct Volume {
    volume_info: VolumeInfo,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct VolumeInfo {
    title: Option<String>,
    subtitle: Option<String>,
    authors: Vec<String>,
    description: Option<String>,
    categories: Vec<String>,
    language: Option<String>,
    publisher: Option<String>,
    published_date: Option<String>,
    image_links: Option<ImageLinks>,
    series_info: Option<Value>,
    series: Option<Value>,
    series_position: Option<Value>,
    volume_number: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ImageLinks {
    thumbnail: Option<String>,
    small_thumbnail: Option<String>,
}

/// Google Books volumes search, restricted to French results.
pub struct GoogleBooks {
    api_key: Option<String>,
}

impl GoogleBooks {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            api_key: api_key.filter(|k| !k.trim().is_empty()),
        }
    }
}

fn volume_info(candidate: &Value) -> Option<VolumeInfo> {
    Volume::deserialize(candidate).ok().map(|v| v.volume_info)
}

fn series_of(info: &VolumeInfo) -> Option<Series> {
    if let Some(series_info) = info.series_info.as_ref().filter(|v| v.is_object()) {
        let name = ["title", "name", "shortSeriesBookTitle"]
            .iter()
            .find_map(|k| series_info.get(*k).and_then(first_string));
        if let Some(name) = name {
            let number = ["bookOrderInSeries", "volumeNumber", "bookDisplayNumber"]
                .iter()
                .find_map(|k| series_info.get(*k).and_then(positive_number))
                .or_else(|| {
                    series_info
                        .pointer("/volumeSeries/0/orderNumber")
                        .and_then(positive_number)
                })
                .unwrap_or(1);
            return Some(Series { name, number });
        }
    }

    if let Some(name) = info.series.as_ref().and_then(first_string) {
        let number = info
            .series_position
            .as_ref()
            .or(info.volume_number.as_ref())
            .and_then(positive_number)
            .unwrap_or(1);
        return Some(Series { name, number });
    }

    info.subtitle
        .as_deref()
        .and_then(|s| first_series_match(&SUBTITLE_SERIES, s))
        .or_else(|| {
            info.title
                .as_deref()
                .and_then(|t| first_series_match(&TITLE_SERIES, t))
        })
        .map(|m| Series {
            name: m.name,
            number: m.number,
        })
}

impl MetadataSource for GoogleBooks {
    fn provider(&self) -> Provider {
        Provider::GoogleBooks
    }

    fn search_request(&self, title: &str, author: Option<&str>) -> SearchRequest {
        let mut q = format!("intitle:\"{}\"", title.replace('"', ""));
        if let Some(author) = author.map(str::trim).filter(|a| !a.is_empty()) {
            q.push_str(&format!(" inauthor:\"{}\"", author.replace('"', "")));
        }
        let mut query = vec![
            ("q".to_string(), q),
            ("langRestrict".to_string(), "fr".to_string()),
            ("maxResults".to_string(), MAX_RESULTS.to_string()),
        ];
        if let Some(key) = &self.api_key {
            query.push(("key".to_string(), key.clone()));
        }
        SearchRequest {
            url: VOLUMES_URL.to_string(),
            query,
        }
    }

    fn candidates(&self, body: Value) -> Vec<Value> {
        serde_json::from_value::<VolumesResponse>(body)
            .map(|r| r.items)
            .unwrap_or_default()
    }

    fn is_preferred_edition(&self, candidate: &Value) -> bool {
        volume_info(candidate).is_some_and(|info| {
            info.language.as_deref() == Some("fr")
                || info.publisher.as_deref().is_some_and(is_french_publisher)
        })
    }

    fn metadata(&self, candidate: &Value) -> Option<ProviderMetadata> {
        let info = volume_info(candidate)?;
        let series = series_of(&info);
        let cover_url = info
            .image_links
            .as_ref()
            .and_then(|l| l.thumbnail.clone().or_else(|| l.small_thumbnail.clone()))
            .map(|url| url.replacen("http://", "https://", 1));
        Some(ProviderMetadata {
            title: non_blank(info.title),
            authors: info
                .authors
                .into_iter()
                .filter_map(|a| non_blank(Some(a)))
                .collect(),
            summary: non_blank(info.description),
            genre: info.categories.into_iter().find_map(|c| non_blank(Some(c))),
            language: non_blank(info.language),
            publisher: non_blank(info.publisher),
            published_date: non_blank(info.published_date),
            series,
            cover_url,
        })
    }
}
