//! Cleanup of user-typed account handles.

/// Normalizes a handle as typed by a person or pasted from a profile page.
///
/// Strips a leading `@`, zero-width characters and directional formatting
/// marks. Case is left alone: domain resolution happens upstream.
pub fn normalize_handle(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let trimmed = trimmed.strip_prefix('@').unwrap_or(trimmed);

    let cleaned: String = trimmed.chars().filter(|c| !is_invisible(*c)).collect();
    let cleaned = cleaned.trim();

    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned.to_string())
    }
}

/// Normalizes every entry, dropping the ones that end up empty.
pub fn normalize_all<I, S>(raw: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    raw.into_iter()
        .filter_map(|h| normalize_handle(h.as_ref()))
        .collect()
}

fn is_invisible(c: char) -> bool {
    matches!(c, '\u{200B}'..='\u{200D}' | '\u{FEFF}' | '\u{2060}'..='\u{2069}')
}
