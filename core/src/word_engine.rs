//! Reference correction engine backed by a word list.
//!
//! Words are stored in an `fst::Set` (lowercase). Each tap is recorded with
//! the key it hit and the neighbouring keys a sloppy finger may have meant;
//! candidates are the dictionary words reachable by substituting neighbours,
//! followed by prefix completions. Words the user commits that are not in the
//! dictionary are learned into a user word set.

use crate::candidate::CandidateSource;
use crate::correction::CorrectionEngine;
use crate::error::Error;
use crate::geometry::{Point, Rect};
use crate::key::{KeyAction, KeyCatalog};
use ahash::{AHashMap, AHashSet};
use fst::automaton::{Automaton, Str};
use fst::{IntoStreamer, Set, Streamer};
use std::cell::RefCell;
use std::collections::BTreeSet;
use std::num::NonZeroUsize;
use tracing::debug;

/// A key counts as a neighbour of a tap within this many key sizes.
const NEIGHBOUR_RADIUS: f32 = 1.25;

/// Partial corrections kept per input position.
const BEAM_WIDTH: usize = 32;

const CACHE_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq)]
struct Tap {
    ch: char,
    neighbours: Vec<char>,
}

pub struct WordListEngine {
    language: String,
    dictionary: Set<Vec<u8>>,
    user_words: AHashSet<String>,
    layout: AHashMap<char, Rect>,
    input: Vec<Tap>,
    context: String,
    correction: bool,
    max_candidates: usize,
    suggested: Option<usize>,
    last: RefCell<Vec<String>>,
    cache: RefCell<lru::LruCache<String, Vec<String>>>,
}

impl WordListEngine {
    /// Build an engine from a list of words. Case and duplicates are ignored.
    pub fn from_words<I, S>(words: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let sorted: BTreeSet<String> = words
            .into_iter()
            .map(|w| w.as_ref().trim().to_lowercase())
            .filter(|w| !w.is_empty())
            .collect();
        let dictionary = Set::from_iter(sorted)?;

        Ok(Self {
            language: String::new(),
            dictionary,
            user_words: AHashSet::new(),
            layout: AHashMap::new(),
            input: Vec::new(),
            context: String::new(),
            correction: true,
            max_candidates: 5,
            suggested: None,
            last: RefCell::new(Vec::new()),
            cache: RefCell::new(lru::LruCache::new(
                NonZeroUsize::new(CACHE_CAPACITY).unwrap_or(NonZeroUsize::MIN),
            )),
        })
    }

    /// Load a word list with one word per line.
    pub fn load<P: AsRef<std::path::Path>>(path: P) -> Result<Self, Error> {
        let content = std::fs::read_to_string(path)?;
        Self::from_words(content.lines())
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn context(&self) -> &str {
        &self.context
    }

    /// Current input buffer as typed.
    pub fn input(&self) -> String {
        self.input.iter().map(|t| t.ch).collect()
    }

    pub fn user_words(&self) -> impl Iterator<Item = &str> {
        self.user_words.iter().map(String::as_str)
    }

    fn is_known(&self, word: &str) -> bool {
        self.dictionary.contains(word) || self.user_words.contains(word)
    }

    fn has_prefix(&self, prefix: &str) -> bool {
        let mut stream = self
            .dictionary
            .search(Str::new(prefix).starts_with())
            .into_stream();
        stream.next().is_some() || self.user_words.iter().any(|w| w.starts_with(prefix))
    }

    fn completions(&self, prefix: &str, limit: usize) -> Vec<String> {
        let mut words = Vec::new();
        let mut stream = self
            .dictionary
            .search(Str::new(prefix).starts_with())
            .into_stream();
        while let Some(bytes) = stream.next() {
            if let Ok(word) = std::str::from_utf8(bytes) {
                words.push(word.to_string());
            }
        }
        words.extend(self.user_words.iter().filter(|w| w.starts_with(prefix)).cloned());
        words.sort_by(|a, b| a.chars().count().cmp(&b.chars().count()).then_with(|| a.cmp(b)));
        words.dedup();
        words.truncate(limit);
        words
    }

    /// Lowercase spellings reachable by neighbour substitution that are
    /// still prefixes of some known word, literal spelling first.
    fn corrections(&self) -> Vec<String> {
        let mut beam = vec![String::new()];
        for tap in &self.input {
            let mut next = Vec::new();
            for prefix in &beam {
                for ch in std::iter::once(tap.ch).chain(tap.neighbours.iter().copied()) {
                    let mut candidate = prefix.clone();
                    candidate.extend(ch.to_lowercase());
                    if self.has_prefix(&candidate) && !next.contains(&candidate) {
                        next.push(candidate);
                    }
                }
            }
            next.truncate(BEAM_WIDTH);
            beam = next;
            if beam.is_empty() {
                break;
            }
        }
        beam
    }

    fn cache_key(&self) -> String {
        let mut key = String::new();
        for tap in &self.input {
            key.push(tap.ch);
            key.extend(tap.neighbours.iter());
            key.push('\u{1f}');
        }
        key
    }

    fn generate(&self, literal: &str) -> Vec<String> {
        let capitalize = literal.chars().next().is_some_and(char::is_uppercase);
        let limit = self.max_candidates.max(1);
        let variants = self.corrections();

        let mut words: Vec<String> = variants.iter().filter(|v| self.is_known(v)).cloned().collect();
        for variant in &variants {
            if words.len() >= limit {
                break;
            }
            words.extend(self.completions(variant, limit));
        }

        let mut out = vec![literal.to_string()];
        for word in words {
            let word = if capitalize { capitalized(&word) } else { word };
            if !out.contains(&word) {
                out.push(word);
            }
            if out.len() >= limit {
                break;
            }
        }
        out
    }

    fn nearest_keys(&self, point: Point) -> Option<Tap> {
        let mut by_distance: Vec<(f32, char, Rect)> = self
            .layout
            .iter()
            .map(|(&ch, &rect)| (distance_to_rect(point, &rect), ch, rect))
            .collect();
        by_distance.sort_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.cmp(&b.1)));

        let &(_, ch, _) = by_distance.first()?;
        let neighbours = by_distance
            .iter()
            .skip(1)
            .filter(|(_, _, rect)| {
                let c = rect.center();
                let radius = NEIGHBOUR_RADIUS * rect.width.max(rect.height);
                ((c.x - point.x).powi(2) + (c.y - point.y).powi(2)).sqrt() <= radius
            })
            .map(|&(_, ch, _)| ch)
            .collect();
        Some(Tap { ch, neighbours })
    }
}

fn distance_to_rect(p: Point, r: &Rect) -> f32 {
    let dx = (r.left() - p.x).max(0.0).max(p.x - r.right());
    let dy = (r.top() - p.y).max(0.0).max(p.y - r.bottom());
    (dx * dx + dy * dy).sqrt()
}

fn capitalized(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

impl CorrectionEngine for WordListEngine {
    fn set_language(&mut self, language: &str) -> bool {
        self.language = language.to_string();
        true
    }

    fn load_keyboard_layout(&mut self, catalog: &KeyCatalog) -> bool {
        self.layout = catalog
            .keys()
            .iter()
            .filter(|k| k.action == KeyAction::Insert && !k.dead)
            .filter_map(|k| {
                let mut chars = k.label.chars();
                match (chars.next(), chars.next()) {
                    (Some(ch), None) => Some((ch, k.rect)),
                    _ => None,
                }
            })
            .collect();
        debug!(keys = self.layout.len(), "keyboard layout loaded");
        !self.layout.is_empty()
    }

    fn append_string(&mut self, text: &str, _is_preedit: bool) {
        self.input.extend(text.chars().map(|ch| Tap {
            ch,
            neighbours: Vec::new(),
        }));
    }

    fn tap_keyboard(&mut self, point: Point, text: &str, shift: bool) {
        let nearest = self.nearest_keys(point);
        if nearest.is_none() {
            debug!(x = point.x, y = point.y, "tap without keyboard layout");
        }
        // Produced text over the nearest key's label, neighbours from the key.
        let mut chars = text.chars();
        let tap = match (nearest, chars.next()) {
            (Some(tap), Some(ch)) => Tap { ch, ..tap },
            (None, Some(ch)) => Tap {
                ch,
                neighbours: Vec::new(),
            },
            (Some(mut tap), None) => {
                if shift {
                    tap.ch = tap.ch.to_uppercase().next().unwrap_or(tap.ch);
                }
                tap
            }
            (None, None) => return,
        };
        self.input.push(tap);
        self.append_string(chars.as_str(), false);
    }

    fn candidates(&self) -> Vec<String> {
        let literal = self.input();
        if literal.is_empty() {
            self.last.borrow_mut().clear();
            return Vec::new();
        }

        let list = if !self.correction {
            vec![literal]
        } else {
            let key = self.cache_key();
            let cached = self.cache.borrow_mut().get(&key).cloned();
            match cached {
                Some(list) => list,
                None => {
                    let list = self.generate(&literal);
                    self.cache.borrow_mut().put(key, list.clone());
                    list
                }
            }
        };

        *self.last.borrow_mut() = list.clone();
        list
    }

    fn candidate_source(&self, index: usize) -> CandidateSource {
        let last = self.last.borrow();
        let Some(word) = last.get(index).map(|w| w.to_lowercase()) else {
            return CandidateSource::Invalid;
        };
        if self.dictionary.contains(&word) {
            CandidateSource::System
        } else if self.user_words.contains(&word) {
            CandidateSource::User
        } else {
            CandidateSource::Invalid
        }
    }

    fn set_context(&mut self, context: &str) {
        self.context = context.to_string();
    }

    fn clear_engine_buffer(&mut self) {
        self.input.clear();
        self.suggested = None;
        self.last.borrow_mut().clear();
    }

    fn save_and_clear_engine_buffer(&mut self) {
        let word = match self.suggested {
            Some(index) => self.last.borrow().get(index).cloned(),
            None => Some(self.input()),
        };
        if let Some(word) = word.map(|w| w.to_lowercase()) {
            if !word.is_empty() && word.chars().all(char::is_alphabetic) && !self.is_known(&word) {
                debug!(word = %word, "learned user word");
                self.user_words.insert(word);
                self.cache.borrow_mut().clear();
            }
        }
        self.clear_engine_buffer();
    }

    fn set_suggested_candidate_index(&mut self, index: usize) {
        self.suggested = Some(index);
    }

    fn enable_correction(&mut self) {
        self.correction = true;
    }

    fn disable_correction(&mut self) {
        self.correction = false;
    }

    fn correction_enabled(&self) -> bool {
        self.correction
    }

    fn set_maximum_candidates(&mut self, max: usize) {
        self.max_candidates = max;
        self.cache.borrow_mut().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> WordListEngine {
        let mut engine =
            WordListEngine::from_words(["hello", "help", "jelly", "he", "held"]).unwrap();
        engine.load_keyboard_layout(&KeyCatalog::from_rows(
            &["qwertyuiop", "asdfghjkl", "zxcvbnm"],
            40.0,
            40.0,
        ));
        engine
    }

    fn tap(engine: &mut WordListEngine, catalog: &KeyCatalog, label: &str) {
        let id = catalog.find(label).unwrap();
        engine.tap_keyboard(catalog.get(id).unwrap().rect.center(), label, false);
    }

    #[test]
    fn test_literal_first_then_dictionary_words() {
        let catalog = KeyCatalog::from_rows(&["qwertyuiop", "asdfghjkl", "zxcvbnm"], 40.0, 40.0);
        let mut engine = engine();
        for l in ["h", "e", "l"] {
            tap(&mut engine, &catalog, l);
        }
        let candidates = engine.candidates();
        assert_eq!(candidates[0], "hel");
        assert!(candidates.contains(&"hello".to_string()));
        assert!(candidates.contains(&"help".to_string()));
        assert_eq!(engine.candidate_source(0), CandidateSource::Invalid);
    }

    #[test]
    fn test_neighbour_substitution() {
        let catalog = KeyCatalog::from_rows(&["qwertyuiop", "asdfghjkl", "zxcvbnm"], 40.0, 40.0);
        let mut engine = engine();
        // "j" is next to "h"
        for l in ["j", "e"] {
            tap(&mut engine, &catalog, l);
        }
        let candidates = engine.candidates();
        assert_eq!(candidates[0], "je");
        assert!(candidates.contains(&"he".to_string()));
    }

    #[test]
    fn test_tap_keeps_composed_text() {
        let catalog = KeyCatalog::from_rows(&["qwertyuiop", "asdfghjkl", "zxcvbnm"], 40.0, 40.0);
        let mut engine = WordListEngine::from_words(["hep"]).unwrap();
        engine.load_keyboard_layout(&catalog);
        tap(&mut engine, &catalog, "h");
        let e = catalog.get(catalog.find("e").unwrap()).unwrap().rect.center();
        engine.tap_keyboard(e, "é", false);

        assert_eq!(engine.input(), "hé");
        assert_eq!(engine.candidates()[0], "hé");
    }

    #[test]
    fn test_tap_without_text_uses_nearest_key() {
        let catalog = KeyCatalog::from_rows(&["qwertyuiop", "asdfghjkl", "zxcvbnm"], 40.0, 40.0);
        let mut engine = engine();
        let h = catalog.get(catalog.find("h").unwrap()).unwrap().rect.center();
        engine.tap_keyboard(h, "", true);
        assert_eq!(engine.input(), "H");
    }

    #[test]
    fn test_known_word_source() {
        let mut engine = engine();
        engine.append_string("help", true);
        let candidates = engine.candidates();
        assert_eq!(candidates[0], "help");
        assert_eq!(engine.candidate_source(0), CandidateSource::System);
    }

    #[test]
    fn test_capitalized_input() {
        let mut engine = engine();
        engine.append_string("Hel", true);
        let candidates = engine.candidates();
        assert_eq!(candidates[0], "Hel");
        assert!(candidates.contains(&"Hello".to_string()));
    }

    #[test]
    fn test_learns_unknown_word() {
        let mut engine = engine();
        engine.append_string("rust", true);
        engine.candidates();
        engine.save_and_clear_engine_buffer();
        assert!(engine.input().is_empty());

        engine.append_string("rust", true);
        engine.candidates();
        assert_eq!(engine.candidate_source(0), CandidateSource::User);
    }

    #[test]
    fn test_disabled_correction_only_literal() {
        let mut engine = engine();
        engine.disable_correction();
        engine.append_string("hel", true);
        assert_eq!(engine.candidates(), vec!["hel".to_string()]);
    }

    #[test]
    fn test_max_candidates() {
        let mut engine = engine();
        engine.set_maximum_candidates(2);
        engine.append_string("he", true);
        assert_eq!(engine.candidates().len(), 2);
    }
}
