use unicode_normalization::{char::is_combining_mark, UnicodeNormalization};

/// Lowercase and drop combining marks (`"Étoile"` -> `"etoile"`).
pub fn fold_accents(s: &str) -> String {
    s.to_lowercase()
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect()
}

// Accent-folded, keeping only [a-z0-9]
fn key_part(s: &str) -> String {
    fold_accents(s)
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        .collect()
}

/// Cache key for a provider lookup: `title` or `title_author` once normalized.
pub fn cache_key(title: &str, author: Option<&str>) -> String {
    let title = key_part(title);
    match author.map(key_part) {
        Some(author) if !author.is_empty() => format!("{title}_{author}"),
        _ => title,
    }
}

/// Genre id / shard file stem: lowercase, whitespace runs and path separators become `-`.
pub fn genre_id(name: &str) -> String {
    let lower = name.trim().to_lowercase();
    let mut out = String::with_capacity(lower.len());
    let mut pending_dash = false;
    for ch in lower.chars() {
        if ch.is_whitespace() || ch == '/' || ch == '\\' {
            pending_dash = true;
            continue;
        }
        if pending_dash {
            out.push('-');
            pending_dash = false;
        }
        out.push(ch);
    }
    out
}
