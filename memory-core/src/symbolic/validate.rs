//! Field validation for symbolic facts.

use regex::Regex;

use super::Fact;
use crate::error::{Error, Result};

fn key_regex() -> &'static Regex {
    static RE: std::sync::OnceLock<Regex> = std::sync::OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9._:-]+$").expect("static regex is valid"))
}

/// Validate a fact's fields per the Symbolic Store's validation rules:
/// `confidence` in `[0, 1]`, `key` non-empty and ≤256 chars matching the key
/// charset, and `project_id` matching the identifier regex.
///
/// # Errors
///
/// Returns [`Error::ValidationFailed`] describing the first violated rule.
pub fn validate_fact_fields(fact: &Fact) -> Result<()> {
    if fact.project_id.is_empty() || fact.project_id.len() > 150 {
        return Err(Error::ValidationFailed(
            "project_id must be 1-150 characters".into(),
        ));
    }
    if !fact
        .project_id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(Error::ValidationFailed(
            "project_id contains characters outside [A-Za-z0-9_-]".into(),
        ));
    }
    if fact.key.is_empty() {
        return Err(Error::ValidationFailed("key must not be empty".into()));
    }
    if fact.key.len() > 256 {
        return Err(Error::ValidationFailed(
            "key must not exceed 256 characters".into(),
        ));
    }
    if !key_regex().is_match(&fact.key) {
        return Err(Error::ValidationFailed(format!(
            "key '{}' does not match /^[A-Za-z0-9._:-]+$/",
            fact.key
        )));
    }
    if !(0.0..=1.0).contains(&fact.confidence) {
        return Err(Error::ValidationFailed(format!(
            "confidence {} is outside [0, 1]",
            fact.confidence
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FactCategory, Source};

    fn base_fact() -> Fact {
        Fact::new(
            "alpha-aaaaaaaa",
            FactCategory::Fact,
            "db.engine",
            serde_json::json!("postgres"),
            0.9,
            Source::User,
        )
    }

    #[test]
    fn accepts_well_formed_fact() {
        assert!(validate_fact_fields(&base_fact()).is_ok());
    }

    #[test]
    fn confidence_boundaries_zero_and_one_are_accepted() {
        let mut fact = base_fact();
        fact.confidence = 0.0;
        assert!(validate_fact_fields(&fact).is_ok());
        fact.confidence = 1.0;
        assert!(validate_fact_fields(&fact).is_ok());
    }

    #[test]
    fn confidence_outside_unit_interval_is_rejected() {
        let mut fact = base_fact();
        fact.confidence = -0.01;
        assert!(validate_fact_fields(&fact).is_err());
        fact.confidence = 1.01;
        assert!(validate_fact_fields(&fact).is_err());
    }

    #[test]
    fn key_charset_is_enforced() {
        let mut fact = base_fact();
        fact.key = "bad key with spaces".into();
        assert!(validate_fact_fields(&fact).is_err());
    }
}
