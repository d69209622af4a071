//! Correction candidates.
//!
//! This module provides:
//! - `CandidateSource`: dictionary membership of a candidate
//! - `CandidateMode`: how the candidate widget is presented
//! - `CandidateList`: the candidates for the current preedit and the
//!   visibility of the widget showing them

use serde::{Deserialize, Serialize};

/// Dictionary a candidate was found in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateSource {
    System,
    User,
    /// Not a known word
    Invalid,
}

/// Presentation of the candidate widget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateMode {
    /// Single suggestion next to the preedit (word tracker)
    Popup,
    /// Full list of candidates
    SuggestionList,
}

/// Candidates for the current preedit.
///
/// The first candidate is conventionally the literal input. The list is
/// shown in at most one [`CandidateMode`] at a time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CandidateList {
    /// All candidates, literal input first
    candidates: Vec<String>,

    /// Preedit the candidates were generated for
    preedit: String,

    /// Widget mode, `None` when hidden
    mode: Option<CandidateMode>,
}

impl CandidateList {
    /// Create a new empty, hidden candidate list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the candidates.
    pub fn set_candidates(&mut self, candidates: Vec<String>) {
        self.candidates = candidates;
    }

    pub fn set_preedit_string(&mut self, preedit: &str) {
        self.preedit = preedit.to_string();
    }

    pub fn preedit_string(&self) -> &str {
        &self.preedit
    }

    /// Get all candidates.
    pub fn candidates(&self) -> &[String] {
        &self.candidates
    }

    /// Get the total number of candidates.
    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    /// Check if the list is empty.
    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// Index of `text` in the list.
    pub fn index_of(&self, text: &str) -> Option<usize> {
        self.candidates.iter().position(|c| c == text)
    }

    /// The candidate offered in popup mode: the first one that differs from
    /// the preedit.
    pub fn suggestion(&self) -> Option<&str> {
        self.suggestion_index().map(|i| self.candidates[i].as_str())
    }

    pub fn suggestion_index(&self) -> Option<usize> {
        self.candidates.iter().position(|c| *c != self.preedit)
    }

    pub fn show(&mut self, mode: CandidateMode) {
        self.mode = Some(mode);
    }

    pub fn hide(&mut self) {
        self.mode = None;
    }

    pub fn is_visible(&self) -> bool {
        self.mode.is_some()
    }

    /// Current widget mode, `None` when hidden.
    pub fn mode(&self) -> Option<CandidateMode> {
        self.mode
    }

    /// Drop candidates and preedit, and hide the widget.
    pub fn clear(&mut self) {
        self.candidates.clear();
        self.preedit.clear();
        self.mode = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suggestion_skips_literal() {
        let mut list = CandidateList::new();
        list.set_preedit_string("helo");
        list.set_candidates(vec!["helo".into(), "hello".into(), "help".into()]);
        assert_eq!(list.suggestion(), Some("hello"));
        assert_eq!(list.suggestion_index(), Some(1));
    }

    #[test]
    fn test_no_suggestion_when_only_literal() {
        let mut list = CandidateList::new();
        list.set_preedit_string("a");
        list.set_candidates(vec!["a".into()]);
        assert_eq!(list.suggestion(), None);
    }

    #[test]
    fn test_clear_hides() {
        let mut list = CandidateList::new();
        list.set_candidates(vec!["x".into(), "y".into()]);
        list.show(CandidateMode::Popup);
        assert_eq!(list.mode(), Some(CandidateMode::Popup));
        list.clear();
        assert!(!list.is_visible());
        assert!(list.is_empty());
    }
}
