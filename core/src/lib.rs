//! libvkb-core
//!
//! Touch resolution and text composition for on-screen keyboards.
//!
//! Raw pointer streams (several fingers at once, possibly overlapping) are
//! turned into key presses, releases and clicks, with per-finger "gravity"
//! to absorb drift near key edges, flick gestures and long presses. Clicks
//! drive a preedit composer backed by a pluggable word-correction engine and
//! a multitap cycle-key handler; the results go to the input-method host.
//!
//! Public API:
//! - `KeyboardHost` - Complete keyboard session driving an `InputHost`
//! - `KeyArea` - Touch points to key events (gravity, cross-talk, dead keys)
//! - `PreeditComposer` - Preedit, candidates and commits
//! - `CycleKeyHandler` - Multitap cycle keys
//! - `CorrectionEngine` / `WordListEngine` - Correction interface and a
//!   dictionary-backed implementation
//! - `Config` - Timing, gravity and feature settings
use serde::{Deserialize, Serialize};

pub mod error;
pub use error::Error;

pub mod geometry;
pub use geometry::{Point, Rect};

pub mod accent;

pub mod key;
pub use key::{Key, KeyAction, KeyCatalog, KeyCode, KeyEvent, KeyId, SpecialKey};

pub mod event;
pub use event::{PointerSource, TouchEvent, TouchPhase};

pub mod timer;
pub use timer::Timer;

// Touch resolution
pub mod touch;
pub use touch::{TouchPoint, TouchPointTracker};

pub mod gravity;
pub use gravity::KeyHitResolver;

pub mod gesture;
pub use gesture::{FlickDirection, FlickEvent, FlickGesture, FlickRecognizer, FlickState, GestureClassifier};

pub mod key_area;
pub use key_area::{AreaEvent, Feedback, KeyArea};

// Composition
pub mod host;
pub use host::{
    ContentType, HandlerState, HostCall, InputHost, InputMethodMode, KeyEventType, PreeditFace,
    RecordingHost, Replacement,
};

pub mod candidate;
pub use candidate::{CandidateList, CandidateMode, CandidateSource};

pub mod correction;
pub use correction::CorrectionEngine;

pub mod word_engine;
pub use word_engine::WordListEngine;

pub mod composer;
pub use composer::{ComposerState, PreeditComposer};

pub mod cycle;
pub use cycle::CycleKeyHandler;

pub mod shift;
pub use shift::ShiftState;

pub mod keyboard;
pub use keyboard::KeyboardHost;

/// Keyboard configuration.
///
/// Every field has a default, so a TOML file only needs the settings it
/// changes. Durations are in milliseconds.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Correction engine language
    pub language: String,
    /// User setting for word correction
    pub correction_enabled: bool,
    /// Accept touch events (several fingers) instead of mouse events
    pub multitouch_enabled: bool,
    /// Show the magnifier popup over pressed keys
    pub use_popup: bool,
    /// User setting for auto-capitalization
    pub auto_caps_enabled: bool,
    /// Maximum number of correction candidates
    pub max_candidates: usize,

    // Gravity: how far (px) a finger may drift off its initial key
    pub touchpoint_horizontal_gravity: f32,
    pub touchpoint_vertical_gravity: f32,

    /// Flick finish distance as a fraction of the keyboard width/height
    pub flick_threshold_ratio: f32,
    pub flick_timeout_ms: u64,

    pub long_press_timeout_ms: u64,
    /// Hold time before backspace starts repeating
    pub auto_backspace_delay_ms: u64,
    pub backspace_repeat_interval_ms: u64,
    /// Hold time on space that opens the suggestion list
    pub long_tap_space_delay_ms: u64,
    /// Window for repeated clicks on a cycle key
    pub multitap_timeout_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            language: "en_GB".to_string(),
            correction_enabled: true,
            multitouch_enabled: false,
            use_popup: true,
            auto_caps_enabled: true,
            max_candidates: 5,
            touchpoint_horizontal_gravity: 10.0,
            touchpoint_vertical_gravity: 10.0,
            flick_threshold_ratio: 0.3,
            flick_timeout_ms: 1000,
            long_press_timeout_ms: 500,
            auto_backspace_delay_ms: 500,
            backspace_repeat_interval_ms: 100,
            long_tap_space_delay_ms: 1000,
            multitap_timeout_ms: 1500,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load_toml<P: AsRef<std::path::Path>>(path: P) -> Result<Self, Error> {
        let content = std::fs::read_to_string(path)?;
        Ok(Self::from_toml_str(&content)?)
    }

    /// Save configuration to a TOML file.
    pub fn save_toml<P: AsRef<std::path::Path>>(&self, path: P) -> Result<(), Error> {
        let content = self.to_toml_string()?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load configuration from TOML string.
    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Serialize configuration to TOML string.
    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    // ========== Gravity ==========

    /// Set both gravity margins.
    pub fn set_gravity(&mut self, horizontal: f32, vertical: f32) {
        self.touchpoint_horizontal_gravity = horizontal.max(0.0);
        self.touchpoint_vertical_gravity = vertical.max(0.0);
    }

    pub fn gravity(&self) -> (f32, f32) {
        (
            self.touchpoint_horizontal_gravity,
            self.touchpoint_vertical_gravity,
        )
    }

    // ========== Feature toggles ==========

    pub fn toggle_correction(&mut self) {
        self.correction_enabled = !self.correction_enabled;
    }

    pub fn set_max_candidates(&mut self, max: usize) {
        if max > 0 {
            self.max_candidates = max;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = Config::from_toml_str("multitouch_enabled = true\nlong_press_timeout_ms = 800\n").unwrap();
        assert!(config.multitouch_enabled);
        assert_eq!(config.long_press_timeout_ms, 800);
        assert_eq!(config.language, "en_GB");
        assert_eq!(config.multitap_timeout_ms, 1500);
    }

    #[test]
    fn test_toml_string_roundtrip() {
        let mut config = Config::default();
        config.set_gravity(6.0, -1.0);
        config.set_max_candidates(0);
        let parsed = Config::from_toml_str(&config.to_toml_string().unwrap()).unwrap();
        assert_eq!(parsed, config);
        assert_eq!(parsed.gravity(), (6.0, 0.0));
        assert_eq!(parsed.max_candidates, 5);
    }
}
