//! Derivation of stable, URL-safe identifiers from display names.

/// Normalizes a display name into the slug that keys its knowledge record.
///
/// Lowercases ASCII alphanumerics and collapses every run of other
/// characters into a single hyphen, with no leading or trailing hyphen.
/// The function is deterministic and idempotent, so two names that
/// normalize identically address the same record.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_sep = false;
    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_sep && !slug.is_empty() {
                slug.push('-');
            }
            pending_sep = false;
            slug.push(ch.to_ascii_lowercase());
        } else {
            pending_sep = true;
        }
    }
    slug
}
