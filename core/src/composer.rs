//! Preedit composition.
//!
//! The composer owns the preedit (the word being typed, shown underlined in
//! the application) and its correction candidates. Characters accumulate in
//! the preedit while correction is enabled; word-breaking input, candidate
//! confirmation and state changes commit it. With correction disabled, or
//! without an engine, every character is committed as it is typed.
//!
//! The candidate list is empty whenever the preedit is empty.

use crate::candidate::{CandidateList, CandidateMode, CandidateSource};
use crate::correction::CorrectionEngine;
use crate::geometry::Point;
use crate::host::{InputHost, KeyEventType, PreeditFace};
use crate::key::{KeyCode, KeyEvent};
use tracing::debug;
use unicode_segmentation::UnicodeSegmentation;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComposerState {
    /// Empty preedit
    Idle,
    /// Preedit without visible candidates
    Composing,
    CandidatesShown(CandidateMode),
}

/// Preedit styling for a candidate count.
pub fn preedit_face(candidate_count: usize) -> PreeditFace {
    if candidate_count > 1 {
        PreeditFace::Default
    } else {
        PreeditFace::NoCandidates
    }
}

/// Word before the cursor, if the text before the cursor ends with a space.
pub fn context_before_cursor(text: &str, cursor: usize) -> String {
    let end = text
        .char_indices()
        .nth(cursor)
        .map_or(text.len(), |(i, _)| i);
    let before = &text[..end];
    if !before.ends_with(' ') {
        return String::new();
    }
    before
        .unicode_words()
        .next_back()
        .unwrap_or_default()
        .to_string()
}

pub struct PreeditComposer {
    preedit: String,
    candidates: CandidateList,
    engine: Option<Box<dyn CorrectionEngine>>,
    correction_enabled: bool,
}

impl PreeditComposer {
    pub fn new(engine: Option<Box<dyn CorrectionEngine>>) -> Self {
        Self {
            preedit: String::new(),
            candidates: CandidateList::new(),
            correction_enabled: engine.is_some(),
            engine,
        }
    }

    pub fn preedit(&self) -> &str {
        &self.preedit
    }

    pub fn candidates(&self) -> &CandidateList {
        &self.candidates
    }

    pub fn engine(&self) -> Option<&dyn CorrectionEngine> {
        self.engine.as_deref()
    }

    pub fn engine_mut(&mut self) -> Option<&mut (dyn CorrectionEngine + 'static)> {
        self.engine.as_deref_mut()
    }

    pub fn state(&self) -> ComposerState {
        match self.candidates.mode() {
            Some(mode) => ComposerState::CandidatesShown(mode),
            None if self.preedit.is_empty() => ComposerState::Idle,
            None => ComposerState::Composing,
        }
    }

    /// Correction is on and an engine is available.
    pub fn is_correction_enabled(&self) -> bool {
        self.correction_enabled && self.engine.is_some()
    }

    /// Switch correction on or off. Switching it off commits a pending
    /// preedit as one string.
    pub fn set_correction_enabled<H: InputHost + ?Sized>(&mut self, enabled: bool, host: &mut H) {
        if !enabled && !self.preedit.is_empty() {
            debug!(preedit = %self.preedit, "correction disabled, flushing preedit");
            self.flush(host);
        }
        self.correction_enabled = enabled;
    }

    /// Add typed text.
    ///
    /// `touch_point` is the corrected tap position handed to the engine for
    /// key-distance correction.
    pub fn append_character<H: InputHost + ?Sized>(
        &mut self,
        text: &str,
        touch_point: Point,
        shift_on: bool,
        host: &mut H,
    ) {
        if !self.is_correction_enabled() {
            self.flush(host);
            host.send_commit_string(text);
            return;
        }
        let Some(engine) = self.engine.as_deref_mut() else {
            return;
        };

        self.preedit.push_str(text);
        self.candidates.clear();
        engine.tap_keyboard(touch_point, text, shift_on);
        let candidates = engine.candidates();
        let source = engine.candidate_source(0);

        let popup = candidates.len() > 1 && source == CandidateSource::Invalid;
        self.candidates.set_preedit_string(&self.preedit);
        self.candidates.set_candidates(candidates);
        self.update_preedit_style(host);

        if popup {
            self.candidates.show(CandidateMode::Popup);
        } else {
            self.candidates.hide();
        }
    }

    /// Word-breaking key (space, return, tab) while composing.
    ///
    /// A space while the popup shows a suggestion commits the suggestion; a
    /// space while the suggestion list is open is ignored. Otherwise the
    /// preedit is committed, followed by the key's own text.
    pub fn commit_word_break<H: InputHost + ?Sized>(
        &mut self,
        event: &KeyEvent,
        last_was_cycle: bool,
        host: &mut H,
    ) {
        let word = match self.candidates.mode() {
            Some(CandidateMode::SuggestionList) if event.code == KeyCode::Space => return,
            Some(CandidateMode::Popup) if event.code == KeyCode::Space => self
                .candidates
                .suggestion()
                .unwrap_or(&self.preedit)
                .to_string(),
            _ => self.preedit.clone(),
        };

        if !word.is_empty() {
            host.send_commit_string(&word);
        }
        self.candidates.clear();
        if let Some(engine) = self.engine.as_deref_mut() {
            if !last_was_cycle {
                engine.set_context(&self.preedit);
            }
        }

        host.send_commit_string(&event.text);
        if let Some(engine) = self.engine.as_deref_mut() {
            engine.clear_engine_buffer();
        }
        self.preedit.clear();
    }

    /// Commit `text`, or the preedit if none is given, and return to idle.
    /// The engine learns the word.
    pub fn commit<H: InputHost + ?Sized>(&mut self, text: Option<&str>, host: &mut H) {
        let text = text.map_or_else(|| self.preedit.clone(), str::to_string);
        if !text.is_empty() {
            host.send_commit_string(&text);
        }
        self.preedit.clear();
        self.candidates.clear();
        if let Some(engine) = self.engine.as_deref_mut() {
            engine.save_and_clear_engine_buffer();
        }
    }

    /// Commit a non-empty preedit as is, then reset.
    pub fn flush<H: InputHost + ?Sized>(&mut self, host: &mut H) {
        if !self.preedit.is_empty() {
            host.send_commit_string(&self.preedit);
        }
        self.reset();
    }

    /// Drop preedit, candidates and the engine buffer without committing.
    pub fn reset(&mut self) {
        self.preedit.clear();
        self.candidates.clear();
        if let Some(engine) = self.engine.as_deref_mut() {
            engine.clear_engine_buffer();
        }
    }

    /// Delete one character.
    ///
    /// With a preedit, the last character is removed, or the whole preedit is
    /// dropped while backspace auto-repeats. Without one, a backspace key
    /// event goes to the application.
    pub fn backspace<H: InputHost + ?Sized>(&mut self, repeating: bool, shift_on: bool, host: &mut H) {
        if self.preedit.is_empty() {
            host.send_key_event(&KeyEvent::backspace(shift_on), KeyEventType::Press, false);
            return;
        }

        if repeating {
            self.reset();
            host.send_commit_string("");
        } else {
            let mut text = self.preedit.clone();
            text.pop();
            self.set_preedit(&text);
            self.update_preedit_style(host);
        }
    }

    /// Replace the preedit with `text` and recompute candidates from it.
    fn set_preedit(&mut self, text: &str) {
        self.preedit = text.to_string();
        self.candidates.set_candidates(Vec::new());
        self.candidates.set_preedit_string(text);
        if let Some(engine) = self.engine.as_deref_mut() {
            engine.clear_engine_buffer();
            engine.append_string(text, true);
            if !text.is_empty() {
                self.candidates.set_candidates(engine.candidates());
            }
        }
        if self.candidates.len() <= 1 {
            self.candidates.hide();
        }
    }

    /// Preedit set by something other than typing (multitap cycling). The
    /// engine buffer follows it but no candidates are generated.
    pub fn set_raw_preedit<H: InputHost + ?Sized>(&mut self, text: &str, host: &mut H) {
        self.preedit = text.to_string();
        self.candidates.clear();
        if let Some(engine) = self.engine.as_deref_mut() {
            engine.clear_engine_buffer();
            engine.append_string(text, true);
        }
        host.send_preedit_string(&self.preedit, PreeditFace::NoCandidates, None);
    }

    /// The user picked `text`: show it, commit it and tell the engine which
    /// candidate was chosen.
    pub fn confirm_candidate<H: InputHost + ?Sized>(&mut self, text: &str, host: &mut H) {
        self.preedit = text.to_string();
        host.send_preedit_string(text, PreeditFace::Default, None);

        if let Some(engine) = self.engine.as_deref_mut() {
            if self.candidates.len() > 1 {
                if let Some(index) = self.candidates.index_of(text).filter(|&i| i > 0) {
                    debug!(index, "candidate chosen");
                    engine.set_suggested_candidate_index(index);
                }
            }
            engine.save_and_clear_engine_buffer();
        }

        host.send_commit_string(&self.preedit);
        self.preedit.clear();
        self.candidates.clear();
    }

    pub fn update_preedit_style<H: InputHost + ?Sized>(&self, host: &mut H) {
        host.send_preedit_string(&self.preedit, preedit_face(self.candidates.len()), None);
    }

    /// Open the full suggestion list. Returns false without candidates.
    pub fn show_suggestion_list(&mut self) -> bool {
        if self.candidates.is_empty() {
            return false;
        }
        self.candidates.show(CandidateMode::SuggestionList);
        true
    }

    /// A long tap on space turns the popup into the suggestion list.
    pub fn long_tap_space(&mut self) {
        if self.candidates.mode() == Some(CandidateMode::Popup) && !self.candidates.is_empty() {
            self.candidates.show(CandidateMode::SuggestionList);
        }
    }

    pub fn hide_candidates(&mut self) {
        self.candidates.hide();
    }

    pub fn set_context(&mut self, context: &str) {
        if let Some(engine) = self.engine.as_deref_mut() {
            debug!(context, "correction context");
            engine.set_context(context);
        }
    }
}
