//! Abstraction invariant: episodes store lessons, not logs.

use std::collections::HashSet;

use super::Episode;
use crate::error::{Error, Result};

const MAX_LESSON_CHARS: usize = 1000;
const MAX_WORD_OVERLAP: f64 = 0.70;

fn tokenize(text: &str) -> HashSet<String> {
    text.split_whitespace()
        .map(|w| w.to_ascii_lowercase())
        .collect()
}

/// Word-overlap ratio between `lesson` and `situation`: the fraction of
/// `lesson`'s distinct whitespace tokens (lowercased) that also appear in
/// `situation`.
#[must_use]
pub fn word_overlap_ratio(lesson: &str, situation: &str) -> f64 {
    let lesson_words = tokenize(lesson);
    if lesson_words.is_empty() {
        return 0.0;
    }
    let situation_words = tokenize(situation);
    let overlap = lesson_words.intersection(&situation_words).count();
    overlap as f64 / lesson_words.len() as f64
}

/// Heuristic detection of an embedded file path: three or more `/`- or
/// `\`-separated path-like components (e.g. `/home/user/project`). Two
/// components is too common in ordinary prose ("a/b") to flag on its own.
#[must_use]
pub fn looks_like_file_path(text: &str) -> bool {
    for candidate in text.split_whitespace() {
        let forward_components = candidate.split('/').filter(|c| !c.is_empty()).count();
        let back_components = candidate.split('\\').filter(|c| !c.is_empty()).count();
        if forward_components >= 3 || back_components >= 3 {
            return true;
        }
    }
    false
}

/// Heuristic detection of raw chat transcript markers leaking into a lesson.
#[must_use]
pub fn looks_like_chat_marker(text: &str) -> bool {
    const MARKERS: &[&str] = &["user:", "assistant:", "system:", "human:", "ai:"];
    let lower = text.to_ascii_lowercase();
    MARKERS.iter().any(|marker| lower.contains(marker))
}

/// Validate an episode against the Episodic Store's abstraction rules.
///
/// # Errors
///
/// Returns [`Error::ValidationFailed`] if any text field is empty, `lesson`
/// exceeds 1000 characters, `lesson` shares ≥70% of its whitespace-tokenized
/// words with `situation`, or `lesson` contains a file path or chat marker.
pub fn validate_episode_fields(episode: &Episode) -> Result<()> {
    if episode.project_id.is_empty() || episode.project_id.len() > 150 {
        return Err(Error::ValidationFailed(
            "project_id must be 1-150 characters".into(),
        ));
    }
    if episode.situation.trim().is_empty() {
        return Err(Error::ValidationFailed("situation must not be empty".into()));
    }
    if episode.action.trim().is_empty() {
        return Err(Error::ValidationFailed("action must not be empty".into()));
    }
    if episode.outcome.trim().is_empty() {
        return Err(Error::ValidationFailed("outcome must not be empty".into()));
    }
    if episode.lesson.trim().is_empty() {
        return Err(Error::ValidationFailed("lesson must not be empty".into()));
    }
    if episode.lesson.chars().count() > MAX_LESSON_CHARS {
        return Err(Error::ValidationFailed(format!(
            "lesson exceeds {MAX_LESSON_CHARS} characters"
        )));
    }
    if looks_like_file_path(&episode.lesson) {
        return Err(Error::ValidationFailed(
            "lesson appears to contain a file path; store the pattern, not the instance".into(),
        ));
    }
    if looks_like_chat_marker(&episode.lesson) {
        return Err(Error::ValidationFailed(
            "lesson appears to contain raw chat transcript markers".into(),
        ));
    }
    let overlap = word_overlap_ratio(&episode.lesson, &episode.situation);
    if overlap >= MAX_WORD_OVERLAP {
        return Err(Error::ValidationFailed(format!(
            "lesson overlaps situation by {:.0}%, must abstract rather than restate (limit 70%)",
            overlap * 100.0
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_unix_paths() {
        assert!(looks_like_file_path("check /home/user/project for details"));
        assert!(!looks_like_file_path("use a/b separator loosely"));
    }

    #[test]
    fn detects_windows_paths() {
        assert!(looks_like_file_path(r"open C:\Users\dev\project"));
    }

    #[test]
    fn overlap_ratio_is_symmetric_on_identical_text() {
        let ratio = word_overlap_ratio("same words here", "same words here");
        assert!((ratio - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn overlap_ratio_is_zero_for_disjoint_text() {
        let ratio = word_overlap_ratio("alpha beta gamma", "delta epsilon zeta");
        assert_eq!(ratio, 0.0);
    }

    #[test]
    fn boundary_length_1000_is_accepted_1001_is_rejected() {
        let lesson_ok = "x".repeat(1000);
        let lesson_bad = "x".repeat(1001);
        assert!(lesson_ok.chars().count() == MAX_LESSON_CHARS);
        assert!(lesson_bad.chars().count() > MAX_LESSON_CHARS);
    }

    #[test]
    fn chat_markers_are_rejected() {
        assert!(looks_like_chat_marker("User: please fix the bug"));
        assert!(!looks_like_chat_marker("users reported the bug"));
    }
}
