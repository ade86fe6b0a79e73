use once_cell::sync::Lazy;
use regex::Regex;

use crate::AuthError;

static EMAIL_PATTERN: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").ok());

/// Normalises and checks an email address.
pub fn validate_email(email: &str) -> Result<String, AuthError> {
    let normalized = chatline_database::normalize_email(email);
    let valid = EMAIL_PATTERN
        .as_ref()
        .map(|pattern| pattern.is_match(&normalized))
        .unwrap_or(false);

    if normalized.len() > 254 || !valid {
        return Err(AuthError::InvalidEmail);
    }
    Ok(normalized)
}
