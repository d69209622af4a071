//! Input-method host protocol.
//!
//! [`InputHost`] is the semantic contract toward the input-method framework:
//! preedit and commit strings, key events, and the queries the keyboard needs
//! about the focused text field. The transport behind it is not part of this
//! crate.
//!
//! [`RecordingHost`] is an in-memory host that applies commits and backspaces
//! to a text buffer and records every call, for tests and the replay tool.

use crate::key::{KeyCode, KeyEvent};
use serde::{Deserialize, Serialize};

/// Content type of the focused text field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    /// Free-form text input (default)
    #[default]
    FreeText,
    Number,
    PhoneNumber,
    Email,
    Url,
    Custom,
}

impl ContentType {
    /// Numeric fields get neither auto-capitalization nor word context.
    pub fn is_numeric(self) -> bool {
        matches!(self, ContentType::Number | ContentType::PhoneNumber)
    }
}

/// How the focused application wants key input delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputMethodMode {
    #[default]
    Normal,
    /// Raw key events only: no composing, no gestures
    Direct,
    Proxy,
}

/// Where key input currently comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandlerState {
    #[default]
    OnScreen,
    Hardware,
    Accessory,
}

/// Styling of the preedit string in the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreeditFace {
    NoCandidates,
    Default,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyEventType {
    Press,
    Release,
}

/// Text around the preedit that the preedit replaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Replacement {
    /// Offset relative to the cursor, in characters
    pub start: i32,
    pub length: usize,
}

pub trait InputHost {
    fn send_preedit_string(&mut self, text: &str, face: PreeditFace, replacement: Option<Replacement>);

    fn send_commit_string(&mut self, text: &str);

    /// Deliver a key event. `signal_only` events are notifications the
    /// application must not turn into text.
    fn send_key_event(&mut self, event: &KeyEvent, kind: KeyEventType, signal_only: bool);

    /// Text of the focused field and the cursor position in characters.
    fn surrounding_text(&self) -> Option<(String, usize)>;

    fn content_type(&self) -> Option<ContentType>;

    fn input_method_mode(&self) -> InputMethodMode;

    /// Whether the application allows correction, if it says.
    fn correction_enabled(&self) -> Option<bool>;

    fn auto_capitalization_enabled(&self) -> Option<bool>;

    fn set_global_correction_enabled(&mut self, enabled: bool);
}

/// A call received by [`RecordingHost`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "call", rename_all = "snake_case")]
pub enum HostCall {
    Preedit {
        text: String,
        face: PreeditFace,
    },
    Commit {
        text: String,
    },
    Key {
        text: String,
        kind: KeyEventType,
        signal_only: bool,
    },
    GlobalCorrection {
        enabled: bool,
    },
}

/// In-memory host.
///
/// Commits are inserted at the cursor, and a non-signal backspace press
/// deletes the character before it. The preedit is kept apart from the text
/// until committed.
#[derive(Debug, Clone, Default)]
pub struct RecordingHost {
    /// Committed text of the field
    pub text: String,
    /// Cursor position (characters)
    pub cursor: usize,
    /// Current preedit as last sent
    pub preedit: String,
    pub preedit_face: Option<PreeditFace>,
    pub content_type: ContentType,
    pub mode: InputMethodMode,
    pub correction_allowed: Option<bool>,
    pub auto_capitalization: Option<bool>,
    pub global_correction: Option<bool>,
    pub calls: Vec<HostCall>,
}

impl RecordingHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Host whose field already contains `text` with the cursor at its end.
    pub fn with_text(text: &str) -> Self {
        Self {
            text: text.to_string(),
            cursor: text.chars().count(),
            ..Self::default()
        }
    }

    /// All commit strings in order.
    pub fn commits(&self) -> Vec<&str> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                HostCall::Commit { text } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    /// All preedit strings in order.
    pub fn preedits(&self) -> Vec<&str> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                HostCall::Preedit { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Key events that were not signal-only.
    pub fn key_events(&self) -> Vec<(&str, KeyEventType)> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                HostCall::Key {
                    text,
                    kind,
                    signal_only: false,
                } => Some((text.as_str(), *kind)),
                _ => None,
            })
            .collect()
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    fn byte_offset(&self, chars: usize) -> usize {
        self.text
            .char_indices()
            .nth(chars)
            .map_or(self.text.len(), |(i, _)| i)
    }
}

impl InputHost for RecordingHost {
    fn send_preedit_string(&mut self, text: &str, face: PreeditFace, _replacement: Option<Replacement>) {
        self.preedit = text.to_string();
        self.preedit_face = Some(face);
        self.calls.push(HostCall::Preedit {
            text: text.to_string(),
            face,
        });
    }

    fn send_commit_string(&mut self, text: &str) {
        let at = self.byte_offset(self.cursor);
        self.text.insert_str(at, text);
        self.cursor += text.chars().count();
        self.preedit.clear();
        self.preedit_face = None;
        self.calls.push(HostCall::Commit {
            text: text.to_string(),
        });
    }

    fn send_key_event(&mut self, event: &KeyEvent, kind: KeyEventType, signal_only: bool) {
        if !signal_only && kind == KeyEventType::Press && event.code == KeyCode::Backspace && self.cursor > 0 {
            let start = self.byte_offset(self.cursor - 1);
            let end = self.byte_offset(self.cursor);
            self.text.replace_range(start..end, "");
            self.cursor -= 1;
        }
        self.calls.push(HostCall::Key {
            text: event.text.clone(),
            kind,
            signal_only,
        });
    }

    fn surrounding_text(&self) -> Option<(String, usize)> {
        Some((self.text.clone(), self.cursor))
    }

    fn content_type(&self) -> Option<ContentType> {
        Some(self.content_type)
    }

    fn input_method_mode(&self) -> InputMethodMode {
        self.mode
    }

    fn correction_enabled(&self) -> Option<bool> {
        self.correction_allowed
    }

    fn auto_capitalization_enabled(&self) -> Option<bool> {
        self.auto_capitalization
    }

    fn set_global_correction_enabled(&mut self, enabled: bool) {
        self.global_correction = Some(enabled);
        self.calls.push(HostCall::GlobalCorrection { enabled });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commit_inserts_at_cursor() {
        let mut host = RecordingHost::with_text("héllo");
        host.cursor = 1;
        host.send_commit_string("ab");
        assert_eq!(host.text, "habéllo");
        assert_eq!(host.cursor, 3);
        assert_eq!(host.commits(), vec!["ab"]);
    }

    #[test]
    fn test_backspace_deletes_only_when_not_signal() {
        let mut host = RecordingHost::with_text("é1");
        let ev = KeyEvent::backspace(false);
        host.send_key_event(&ev, KeyEventType::Press, true);
        assert_eq!(host.text, "é1");
        host.send_key_event(&ev, KeyEventType::Press, false);
        host.send_key_event(&ev, KeyEventType::Press, false);
        assert_eq!(host.text, "");
        assert_eq!(host.cursor, 0);
        host.send_key_event(&ev, KeyEventType::Press, false);
        assert_eq!(host.cursor, 0);
    }

    #[test]
    fn test_commit_clears_preedit() {
        let mut host = RecordingHost::new();
        host.send_preedit_string("ab", PreeditFace::NoCandidates, None);
        assert_eq!(host.preedit, "ab");
        host.send_commit_string("ab");
        assert!(host.preedit.is_empty());
        assert_eq!(host.preedits(), vec!["ab"]);
    }

    #[test]
    fn test_numeric_content_types() {
        assert!(ContentType::Number.is_numeric());
        assert!(ContentType::PhoneNumber.is_numeric());
        assert!(!ContentType::Email.is_numeric());
    }
}
