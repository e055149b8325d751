//! Filename heuristics: author, series and genre hints from a book's name and path.
//!
//! Every table here is ordered and the first validated hit wins, so the order of
//! entries is part of the behaviour.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::normalize::fold_accents;

/// Folder keyword -> canonical genre. Keywords are accent-folded, matched
/// against accent-folded path segments (exact or substring).
const GENRE_KEYWORDS: &[(&str, &str)] = &[
    ("science-fiction", "Science-Fiction"),
    ("sciencefiction", "Science-Fiction"),
    ("sci-fi", "Science-Fiction"),
    ("scifi", "Science-Fiction"),
    ("sf", "Science-Fiction"),
    ("fantasy", "Fantasy"),
    ("fantastique", "Fantastique"),
    ("policier", "Policier"),
    ("thriller", "Thriller"),
    ("mystere", "Mystère"),
    ("romance", "Romance"),
    ("historique", "Historique"),
    ("histoire", "Historique"),
    ("biographie", "Biographie"),
    ("bio", "Biographie"),
    ("autobiographie", "Autobiographie"),
    ("jeunesse", "Jeunesse"),
    ("enfant", "Jeunesse"),
    ("bd", "Bande Dessinée"),
    ("bande-dessinee", "Bande Dessinée"),
    ("bande dessinee", "Bande Dessinée"),
    ("manga", "Manga"),
    ("comics", "Comics"),
    ("poesie", "Poésie"),
    ("theatre", "Théâtre"),
    ("essai", "Essai"),
    ("philosophie", "Philosophie"),
    ("religion", "Religion"),
    ("spiritualite", "Spiritualité"),
    ("art", "Art"),
    ("cuisine", "Cuisine"),
    ("voyage", "Voyage"),
    ("guide", "Guide"),
    ("sante", "Santé"),
    ("bien-etre", "Bien-être"),
    ("developpement personnel", "Développement Personnel"),
    ("economie", "Économie"),
    ("politique", "Politique"),
    ("droit", "Droit"),
    ("informatique", "Informatique"),
    ("technique", "Technique"),
    ("science", "Science"),
    ("education", "Éducation"),
    ("horreur", "Horreur"),
    ("epouvante", "Horreur"),
    ("aventure", "Aventure"),
    ("western", "Western"),
    ("guerre", "Guerre"),
    ("espionnage", "Espionnage"),
    ("dystopie", "Dystopie"),
    ("utopie", "Utopie"),
    ("erotique", "Érotique"),
    ("humour", "Humour"),
    ("comedie", "Comédie"),
    ("drame", "Drame"),
    ("tragedie", "Tragédie"),
    ("conte", "Conte"),
    ("fable", "Fable"),
    ("mythologie", "Mythologie"),
    ("legende", "Légende"),
    ("nouvelle", "Nouvelle"),
    ("recueil", "Recueil"),
    ("anthologie", "Anthologie"),
    ("dictionnaire", "Dictionnaire"),
    ("encyclopedie", "Encyclopédie"),
    ("manuel", "Manuel"),
    ("scolaire", "Scolaire"),
    ("universitaire", "Universitaire"),
    ("academique", "Académique"),
];

/// Series position recovered from a name or a provider field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesMatch {
    pub name: String,
    pub number: u32,
    /// Cleaner title left once the series part is removed, when the pattern has one.
    pub extracted_title: Option<String>,
}

impl SeriesMatch {
    /// Build a match if the name is longer than 2 chars and the number a positive integer.
    pub fn checked(name: &str, number: &str, title: Option<&str>) -> Option<Self> {
        let name = name.trim();
        if name.chars().count() <= 2 {
            return None;
        }
        let number = number.trim().parse::<u32>().ok().filter(|n| *n > 0)?;
        let extracted_title = title
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string);
        Some(Self {
            name: name.to_string(),
            number,
            extracted_title,
        })
    }
}

/// A regex plus the function mapping its groups to a series match.
pub struct SeriesPattern {
    regex: Regex,
    extract: fn(&Captures) -> Option<SeriesMatch>,
}

impl SeriesPattern {
    pub fn new(pattern: &str, extract: fn(&Captures) -> Option<SeriesMatch>) -> Self {
        Self {
            regex: Regex::new(pattern).expect("valid series pattern"),
            extract,
        }
    }
}

/// First pattern that matches `text` and yields a valid series.
pub fn first_series_match(patterns: &[SeriesPattern], text: &str) -> Option<SeriesMatch> {
    patterns.iter().find_map(|p| {
        let caps = p.regex.captures(text)?;
        (p.extract)(&caps)
    })
}

fn group<'t>(caps: &Captures<'t>, i: usize) -> &'t str {
    caps.get(i).map(|m| m.as_str()).unwrap_or("")
}

// name=1, number=2, title=3
pub fn name_number_title(caps: &Captures) -> Option<SeriesMatch> {
    SeriesMatch::checked(group(caps, 1), group(caps, 2), caps.get(3).map(|m| m.as_str()))
}

// title=1, name=2, number=3
fn title_name_number(caps: &Captures) -> Option<SeriesMatch> {
    SeriesMatch::checked(group(caps, 2), group(caps, 3), caps.get(1).map(|m| m.as_str()))
}

// number=1, name=2
pub fn number_name(caps: &Captures) -> Option<SeriesMatch> {
    SeriesMatch::checked(group(caps, 2), group(caps, 1), None)
}

// name=1, number=2
pub fn name_number(caps: &Captures) -> Option<SeriesMatch> {
    SeriesMatch::checked(group(caps, 1), group(caps, 2), None)
}

static SERIES_PATTERNS: Lazy<Vec<SeriesPattern>> = Lazy::new(|| {
    vec![
        // [Série 3] Titre / (Série 3) Titre
        SeriesPattern::new(
            r"(?i)^\s*[\[\(]([^\d\]\)]+)\s+(\d+)[\]\)]\s*(.+)$",
            name_number_title,
        ),
        // Série - Tome 3 - Titre
        SeriesPattern::new(
            r"(?i)^([^-]+)\s*-\s*\b(?:Tome|T|Livre|L|Volume|Vol)\s*(\d+)\s*-\s*(.+)$",
            name_number_title,
        ),
        // Série Tome 3 - Titre / Série T3 - Titre
        SeriesPattern::new(
            r"(?i)^([^\d]+)\s*\b(?:Tome|T|Livre|L|Volume|Vol)\s*(\d+)\s*-\s*(.+)$",
            name_number_title,
        ),
        // Série T.3 - Titre / Série Vol.3 : Titre
        SeriesPattern::new(
            r"(?i)^([^\d]+)\s*\b(?:T|L|Vol)\.\s*(\d+)\s*[:-]\s*(.+)$",
            name_number_title,
        ),
        // Série 3: Titre / Série 3 - Titre
        SeriesPattern::new(r"(?i)^([^\d]+)\s*(\d+)\s*[:-]\s*(.+)$", name_number_title),
        // Titre - Série 3
        SeriesPattern::new(r"(?i)^(.+)\s*-\s*([^\d-]+)\s*(\d+)$", title_name_number),
        // Série.3.Titre
        SeriesPattern::new(r"(?i)^([^\d\.]+)\.(\d+)\.(.+)$", name_number_title),
        // Série 3 - Titre
        SeriesPattern::new(r"(?i)^([^\d]+)\s*(\d+)\s*-\s*(.+)$", name_number_title),
        // Harry Potter 1
        SeriesPattern::new(r"(?i)^([^\d]+)\s*(\d+)$", name_number),
    ]
});

/// Author capture group per pattern; the first validated capture wins.
static AUTHOR_PATTERNS: Lazy<Vec<(Regex, usize)>> = Lazy::new(|| {
    [
        // Titre - Auteur
        (r"^(.+)\s+-\s+(.+)$", 2),
        // Auteur - Titre
        (r"^([^\d]+?)\s+-\s+(.+)$", 1),
        // Titre [Auteur] / Titre (Auteur)
        (r"^.+\s+[\[\(]([^\[\(\]\)]+)[\]\)]$", 1),
        // Auteur - [Série] - Titre
        (r"^([^\d-]+?)\s+-\s+\[[^\]]+\]\s+-\s+.+$", 1),
        // Titre.Prénom Nom.suffixe
        (r"^.+\.([^.]+\s+[^.]+)\.[^.]+$", 1),
    ]
    .into_iter()
    .map(|(re, g)| (Regex::new(re).expect("valid author pattern"), g))
    .collect()
});

/// Hints derived from a file's own name and location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedName {
    /// Series-refined title, else the bare filename.
    pub title: String,
    pub author: Option<String>,
    pub series: Option<SeriesMatch>,
    pub genre: Option<String>,
}

/// Parse a filename stem (extension already stripped) found at `path`.
pub fn parse(stem: &str, path: &str) -> ParsedName {
    let series = series_from_name(stem);
    let title = series
        .as_ref()
        .and_then(|s| s.extracted_title.clone())
        .unwrap_or_else(|| stem.trim().to_string());
    ParsedName {
        title,
        author: author_from_name(stem),
        series,
        genre: genre_from_path(path).map(str::to_string),
    }
}

pub fn genre_from_path(path: &str) -> Option<&'static str> {
    let folded = fold_accents(path);
    folded
        .split(['/', '\\'])
        .filter(|seg| !seg.is_empty())
        .find_map(|segment| {
            GENRE_KEYWORDS
                .iter()
                .find(|(kw, _)| segment == *kw || segment.contains(*kw))
                .map(|(_, genre)| *genre)
        })
}

pub fn author_from_name(stem: &str) -> Option<String> {
    AUTHOR_PATTERNS.iter().find_map(|(re, idx)| {
        let caps = re.captures(stem)?;
        let candidate = caps.get(*idx)?.as_str().trim();
        let numeric = candidate.chars().all(|c| c.is_ascii_digit());
        (candidate.chars().count() > 2 && !numeric).then(|| candidate.to_string())
    })
}

pub fn series_from_name(stem: &str) -> Option<SeriesMatch> {
    first_series_match(&SERIES_PATTERNS, stem)
}
