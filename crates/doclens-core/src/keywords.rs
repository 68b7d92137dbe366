//! Keyword normalization applied before an analysis row is written.

/// Characters that separate entries in the stored list representation.
const SEPARATORS: &[char] = &[',', ';', '\n', '\r', '\t'];

/// Trims each keyword, replaces embedded separators with spaces, collapses
/// the resulting whitespace runs, and drops empty entries. Order is kept.
pub fn normalize_keywords<S: AsRef<str>>(keywords: &[S]) -> Vec<String> {
    keywords
        .iter()
        .map(|k| {
            k.as_ref()
                .replace(SEPARATORS, " ")
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ")
        })
        .filter(|k| !k.is_empty())
        .collect()
}
