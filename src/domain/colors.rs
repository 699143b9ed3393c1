//! Color name normalization.
//!
//! Color names are unique case-insensitively, so every name entering the
//! system is trimmed and lowercased before it reaches storage or a lookup.

use super::error::DomainError;

/// Normalize a single color name.
///
/// Returns a validation error when nothing remains after trimming.
pub fn normalize_name(raw: &str) -> Result<String, DomainError> {
    let name = raw.trim().to_lowercase();
    if name.is_empty() {
        return Err(DomainError::validation("color name must not be blank"));
    }
    Ok(name)
}

/// Normalize a list of requested color names: trim, lowercase, drop blanks,
/// dedup while preserving first-seen order.
pub fn normalize_names(raw: &[String]) -> Vec<String> {
    let mut seen = Vec::new();
    for name in raw {
        let name = name.trim().to_lowercase();
        if !name.is_empty() && !seen.contains(&name) {
            seen.push(name);
        }
    }
    seen
}
