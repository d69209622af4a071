//! Key catalog and key events.
//!
//! The catalog is the keyboard layout as seen by the touch core: a list of
//! keys with their screen rectangles and bindings. It is built by the layout
//! loader (outside this crate) and never mutated while touches are processed.
//! Touch points and the key area refer to keys by [`KeyId`].

use crate::accent;
use crate::error::Error;
use crate::geometry::{Point, Rect};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Index of a key within its [`KeyCatalog`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct KeyId(pub usize);

/// What clicking a key does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyAction {
    /// Inserts the key's label
    #[default]
    Insert,
    Space,
    Return,
    Tab,
    Backspace,
    Shift,
    /// Opens the symbol view
    Sym,
    /// Switches symbol view page
    Switch,
    /// Opens the layout menu
    LayoutMenu,
    /// Plus-minus key, always delivered as a real key event
    PlusMinus,
}

/// A single key of the layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Key {
    /// Screen rectangle in keyboard-local coordinates
    pub rect: Rect,
    /// Lowercase label, also the inserted text for `Insert` keys
    pub label: String,
    /// Label for shifted levels; defaults to the uppercased label
    #[serde(default)]
    pub upper_label: Option<String>,
    #[serde(default)]
    pub action: KeyAction,
    /// Dead keys select an accent instead of inserting text
    #[serde(default)]
    pub dead: bool,
    /// Alternatives cycled by repeated clicks (multitap)
    #[serde(default)]
    pub cycle_set: Option<String>,
}

impl Key {
    pub fn new(label: impl Into<String>, rect: Rect) -> Self {
        Self {
            rect,
            label: label.into(),
            upper_label: None,
            action: KeyAction::Insert,
            dead: false,
            cycle_set: None,
        }
    }

    pub fn with_action(mut self, action: KeyAction) -> Self {
        self.action = action;
        self
    }

    pub fn dead_key(mut self) -> Self {
        self.dead = true;
        self
    }

    pub fn with_cycle_set(mut self, set: impl Into<String>) -> Self {
        self.cycle_set = Some(set.into());
        self
    }

    pub fn with_upper_label(mut self, label: impl Into<String>) -> Self {
        self.upper_label = Some(label.into());
        self
    }

    /// Label for the given shift level.
    pub fn label_for(&self, upper: bool) -> String {
        if !upper {
            return self.label.clone();
        }
        match &self.upper_label {
            Some(label) => label.clone(),
            None => self.label.to_uppercase(),
        }
    }

    /// Text bound to the key (what a flick-up on the key produces).
    pub fn binding(&self) -> &str {
        &self.label
    }

    /// Accent this key contributes when it is the active dead key.
    pub fn accent(&self) -> Option<char> {
        if self.dead {
            self.label.chars().next()
        } else {
            None
        }
    }

    pub fn is_cycle_key(&self) -> bool {
        self.cycle_set.is_some()
    }
}

/// The keys of one layout section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KeyCatalog {
    keys: Vec<Key>,
}

impl KeyCatalog {
    pub fn new(keys: Vec<Key>) -> Self {
        Self { keys }
    }

    /// Build a grid layout where every character of a row string is one key.
    ///
    /// Rows are laid out top to bottom with uniform key size, each row
    /// starting at x = 0.
    pub fn from_rows(rows: &[&str], key_width: f32, key_height: f32) -> Self {
        let mut keys = Vec::new();
        for (row, chars) in rows.iter().enumerate() {
            for (col, ch) in chars.chars().enumerate() {
                let rect = Rect::new(
                    col as f32 * key_width,
                    row as f32 * key_height,
                    key_width,
                    key_height,
                );
                keys.push(Key::new(ch.to_string(), rect));
            }
        }
        Self { keys }
    }

    /// Parse a catalog from its JSON form.
    pub fn from_json_str(content: &str) -> Result<Self, Error> {
        let catalog: Self = serde_json::from_str(content)?;
        for key in catalog.keys.iter().filter(|k| k.dead) {
            if !accent::is_dead_key_label(&key.label) {
                warn!(label = %key.label, "dead key without a known diacritic, it will not compose");
            }
        }
        Ok(catalog)
    }

    /// Load a catalog from a JSON file.
    pub fn load_json<P: AsRef<std::path::Path>>(path: P) -> Result<Self, Error> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    /// Append a key, returning its id.
    pub fn push(&mut self, key: Key) -> KeyId {
        self.keys.push(key);
        KeyId(self.keys.len() - 1)
    }

    pub fn get(&self, id: KeyId) -> Option<&Key> {
        self.keys.get(id.0)
    }

    pub fn keys(&self) -> &[Key] {
        &self.keys
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = KeyId> + '_ {
        (0..self.keys.len()).map(KeyId)
    }

    /// Id of the first key whose label equals `label`.
    pub fn find(&self, label: &str) -> Option<KeyId> {
        self.keys.iter().position(|k| k.label == label).map(KeyId)
    }

    /// Plain geometric hit test.
    pub fn key_at(&self, pos: Point) -> Option<KeyId> {
        self.keys.iter().position(|k| k.rect.contains(pos)).map(KeyId)
    }

    /// Bounding rectangle of all keys.
    pub fn bounds(&self) -> Rect {
        self.keys
            .iter()
            .fold(Rect::default(), |acc, k| acc.union(&k.rect))
    }
}

/// Special-key classification carried by key events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecialKey {
    NotSpecial,
    CycleSet,
    Sym,
    Switch,
    LayoutMenu,
}

/// Key code of an event as understood by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyCode {
    Character,
    Space,
    Return,
    Tab,
    Backspace,
    Shift,
    PlusMinus,
    Other,
}

impl KeyCode {
    /// Word-breaking keys commit the preedit.
    pub fn is_word_break(self) -> bool {
        matches!(self, KeyCode::Space | KeyCode::Return | KeyCode::Tab)
    }
}

/// A resolved key event: what a key press, release or click means in text.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyEvent {
    pub key: Option<KeyId>,
    pub text: String,
    pub code: KeyCode,
    pub special: SpecialKey,
    pub shift: bool,
    /// Corrected touch coordinate, fed to the correction engine
    pub touch_point: Point,
}

impl KeyEvent {
    /// Build the event for `key` under the given accent and shift level.
    pub fn from_key(
        id: KeyId,
        key: &Key,
        accent: Option<char>,
        upper: bool,
        touch_point: Point,
    ) -> Self {
        let (code, special) = match key.action {
            KeyAction::Insert if key.is_cycle_key() => (KeyCode::Character, SpecialKey::CycleSet),
            KeyAction::Insert => (KeyCode::Character, SpecialKey::NotSpecial),
            KeyAction::Space => (KeyCode::Space, SpecialKey::NotSpecial),
            KeyAction::Return => (KeyCode::Return, SpecialKey::NotSpecial),
            KeyAction::Tab => (KeyCode::Tab, SpecialKey::NotSpecial),
            KeyAction::Backspace => (KeyCode::Backspace, SpecialKey::NotSpecial),
            KeyAction::Shift => (KeyCode::Shift, SpecialKey::NotSpecial),
            KeyAction::PlusMinus => (KeyCode::PlusMinus, SpecialKey::NotSpecial),
            KeyAction::Sym => (KeyCode::Other, SpecialKey::Sym),
            KeyAction::Switch => (KeyCode::Other, SpecialKey::Switch),
            KeyAction::LayoutMenu => (KeyCode::Other, SpecialKey::LayoutMenu),
        };

        let text = match key.action {
            KeyAction::Insert => match &key.cycle_set {
                Some(set) if upper => set.to_uppercase(),
                Some(set) => set.clone(),
                None => {
                    let label = key.label_for(upper);
                    match accent {
                        Some(accent) => accent::compose(&label, accent),
                        None => label,
                    }
                }
            },
            KeyAction::Space => " ".to_string(),
            KeyAction::Return => "\r".to_string(),
            KeyAction::Tab => "\t".to_string(),
            KeyAction::Backspace => "\u{8}".to_string(),
            KeyAction::PlusMinus => "±".to_string(),
            _ => String::new(),
        };

        Self {
            key: Some(id),
            text,
            code,
            special,
            shift: upper,
            touch_point,
        }
    }

    /// A synthesized backspace not originating from a key of the layout.
    pub fn backspace(shift: bool) -> Self {
        Self {
            key: None,
            text: "\u{8}".to_string(),
            code: KeyCode::Backspace,
            special: SpecialKey::NotSpecial,
            shift,
            touch_point: Point::default(),
        }
    }

    /// Whether `other` comes from the same logical key (ignores touch point).
    pub fn same_key(&self, other: &KeyEvent) -> bool {
        self.key == other.key
            && self.text == other.text
            && self.code == other.code
            && self.special == other.special
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_rows_layout() {
        let catalog = KeyCatalog::from_rows(&["qwe", "as"], 10.0, 20.0);
        assert_eq!(catalog.len(), 5);
        let a = catalog.find("a").unwrap();
        assert_eq!(catalog.get(a).unwrap().rect, Rect::new(0.0, 20.0, 10.0, 20.0));
        assert_eq!(catalog.bounds(), Rect::new(0.0, 0.0, 30.0, 40.0));
    }

    #[test]
    fn test_key_at() {
        let catalog = KeyCatalog::from_rows(&["qwe"], 10.0, 10.0);
        assert_eq!(catalog.key_at(Point::new(15.0, 5.0)), catalog.find("w"));
        assert_eq!(catalog.key_at(Point::new(35.0, 5.0)), None);
    }

    #[test]
    fn test_event_text_with_accent_and_shift() {
        let key = Key::new("e", Rect::new(0.0, 0.0, 10.0, 10.0));
        let ev = KeyEvent::from_key(KeyId(0), &key, Some('´'), true, Point::default());
        assert_eq!(ev.text, "É");
        assert_eq!(ev.code, KeyCode::Character);
        assert_eq!(ev.special, SpecialKey::NotSpecial);
    }

    #[test]
    fn test_cycle_key_event() {
        let key = Key::new("a", Rect::default()).with_cycle_set("aáà");
        let ev = KeyEvent::from_key(KeyId(3), &key, None, false, Point::default());
        assert_eq!(ev.special, SpecialKey::CycleSet);
        assert_eq!(ev.text, "aáà");
    }

    #[test]
    fn test_catalog_json() {
        let json = r#"{"keys":[{"rect":{"x":0,"y":0,"width":10,"height":10},"label":"´","dead":true},
                              {"rect":{"x":10,"y":0,"width":30,"height":10},"label":" ","action":"space"}]}"#;
        let catalog = KeyCatalog::from_json_str(json).unwrap();
        assert!(catalog.get(KeyId(0)).unwrap().dead);
        assert_eq!(catalog.get(KeyId(1)).unwrap().action, KeyAction::Space);
    }
}
