//! Word correction engine interface.
//!
//! The engine keeps its own input buffer, fed by keyboard taps (for
//! key-distance correction) or whole strings, and produces an ordered list of
//! candidates for it. Calls are synchronous: a call to [`CorrectionEngine::candidates`]
//! reflects every tap made before it.

use crate::candidate::CandidateSource;
use crate::geometry::Point;
use crate::key::KeyCatalog;

pub trait CorrectionEngine {
    /// Select the dictionary language. Returns false if unsupported.
    fn set_language(&mut self, language: &str) -> bool;

    /// Key geometry used to interpret taps.
    fn load_keyboard_layout(&mut self, catalog: &KeyCatalog) -> bool;

    /// Append `text` to the input buffer.
    fn append_string(&mut self, text: &str, is_preedit: bool);

    /// Append `text`, produced by a tap at `point`. An empty `text` means
    /// the engine picks the character itself, uppercased when `shift` is set.
    fn tap_keyboard(&mut self, point: Point, text: &str, shift: bool);

    /// Candidates for the current buffer, literal input first.
    fn candidates(&self) -> Vec<String>;

    fn candidate_source(&self, index: usize) -> CandidateSource;

    /// Text preceding the word being composed.
    fn set_context(&mut self, context: &str);

    fn clear_engine_buffer(&mut self);

    /// Learn the current word, then clear the buffer.
    fn save_and_clear_engine_buffer(&mut self);

    /// The user picked candidate `index`.
    fn set_suggested_candidate_index(&mut self, index: usize);

    fn enable_correction(&mut self);

    fn disable_correction(&mut self);

    fn correction_enabled(&self) -> bool;

    fn set_maximum_candidates(&mut self, max: usize);
}
