//! Shift state and auto-capitalization.

use crate::host::ContentType;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Characters ending a sentence for auto-capitalization.
pub const SENTENCE_DELIMITERS: &str = ".?!¡¿";

/// Sentence delimiter followed by one or more spaces at the end of the text.
static AUTO_CAPS_TRIGGER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!("[{}] +$", regex::escape(SENTENCE_DELIMITERS)))
        .expect("valid auto-caps pattern")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShiftState {
    #[default]
    Clear,
    /// Upper case for the next character only
    Latched,
    /// Caps lock
    Locked,
}

impl ShiftState {
    pub fn is_on(self) -> bool {
        self != ShiftState::Clear
    }

    /// Keyboard level showing this state.
    pub fn level(self) -> u8 {
        if self.is_on() {
            1
        } else {
            0
        }
    }

    /// State after a click on the shift key.
    ///
    /// A shift latched by auto-capitalization goes back to clear instead of
    /// locking.
    pub fn clicked(self, latched_by_auto_caps: bool) -> Self {
        match self {
            ShiftState::Clear => ShiftState::Latched,
            ShiftState::Latched if latched_by_auto_caps => ShiftState::Clear,
            ShiftState::Latched => ShiftState::Locked,
            ShiftState::Locked => ShiftState::Clear,
        }
    }
}

/// Whether auto-capitalization applies to a field of this type at all.
pub fn auto_caps_allowed(content_type: Option<ContentType>, host_enabled: Option<bool>) -> bool {
    matches!(content_type, Some(t) if !t.is_numeric()) && host_enabled == Some(true)
}

/// Whether the next character should be upper case.
///
/// True with an empty preedit when the cursor is at the start of the text or
/// the text before the cursor ends with a sentence delimiter and spaces.
/// `cursor` counts characters.
pub fn auto_caps_triggered(text: &str, cursor: usize, preedit_empty: bool) -> bool {
    if !preedit_empty {
        return false;
    }
    if cursor == 0 {
        return true;
    }
    match text.char_indices().nth(cursor) {
        Some((at, _)) => AUTO_CAPS_TRIGGER.is_match(&text[..at]),
        None if cursor == text.chars().count() => AUTO_CAPS_TRIGGER.is_match(text),
        None => false,
    }
}
