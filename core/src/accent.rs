//! Dead-key accent composition.
//!
//! A dead key carries a spacing diacritic as its label (for example `´`).
//! Clicking a letter while the dead key is active produces the letter with the
//! matching combining mark applied, normalized to NFC so that `e` + `´`
//! becomes the single code point `é`.

use phf::phf_map;
use unicode_normalization::UnicodeNormalization;

/// Spacing diacritic (dead key label) to combining mark.
static COMBINING_MARKS: phf::Map<char, char> = phf_map! {
    '`' => '\u{0300}',
    '´' => '\u{0301}',
    '\'' => '\u{0301}',
    '^' => '\u{0302}',
    '~' => '\u{0303}',
    '¯' => '\u{0304}',
    '˘' => '\u{0306}',
    '˙' => '\u{0307}',
    '¨' => '\u{0308}',
    '˚' => '\u{030A}',
    '˝' => '\u{030B}',
    'ˇ' => '\u{030C}',
    '¸' => '\u{0327}',
    '˛' => '\u{0328}',
};

/// Combining mark for a dead key label, if the label is a known diacritic.
pub fn combining_mark(accent: char) -> Option<char> {
    COMBINING_MARKS.get(&accent).copied()
}

/// Whether `label` names a diacritic usable as a dead key.
pub fn is_dead_key_label(label: &str) -> bool {
    let mut chars = label.chars();
    matches!((chars.next(), chars.next()), (Some(c), None) if combining_mark(c).is_some())
}

/// Apply `accent` to the first character of `text`.
///
/// If the accent is unknown, or the base character has no precomposed form,
/// the text is returned unchanged.
pub fn compose(text: &str, accent: char) -> String {
    let Some(mark) = combining_mark(accent) else {
        return text.to_string();
    };
    let mut chars = text.chars();
    let Some(base) = chars.next() else {
        return String::new();
    };

    let composed: String = [base, mark].into_iter().nfc().collect();
    if composed.chars().count() != 1 {
        return text.to_string();
    }

    let mut out = composed;
    out.extend(chars);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compose_acute() {
        assert_eq!(compose("e", '´'), "é");
        assert_eq!(compose("E", '´'), "É");
    }

    #[test]
    fn test_compose_grave_and_diaeresis() {
        assert_eq!(compose("a", '`'), "à");
        assert_eq!(compose("u", '¨'), "ü");
        assert_eq!(compose("c", 'ˇ'), "č");
    }

    #[test]
    fn test_compose_without_precomposed_form() {
        // No precomposed q with tilde
        assert_eq!(compose("q", '~'), "q");
    }

    #[test]
    fn test_unknown_accent_passes_through() {
        assert_eq!(compose("a", 'x'), "a");
        assert_eq!(compose("", '´'), "");
    }

    #[test]
    fn test_dead_key_label() {
        assert!(is_dead_key_label("´"));
        assert!(!is_dead_key_label("a"));
        assert!(!is_dead_key_label("´´"));
    }
}
