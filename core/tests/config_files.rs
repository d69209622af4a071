//! Loading configuration, key catalogs and word lists from disk, and a
//! keyboard running on what was loaded.

use libvkb_core::{
    CandidateMode, Config, Error, KeyAction, KeyCatalog, KeyboardHost, RecordingHost, TouchEvent,
    TouchPhase, WordListEngine,
};
use std::path::PathBuf;
use std::time::Instant;

fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("vkb_{}_{}", name, std::process::id()))
}

#[test]
fn test_config_save_and_load() {
    let path = temp_path("config.toml");
    let mut config = Config::default();
    config.multitouch_enabled = true;
    config.set_gravity(12.0, 8.0);
    config.language = "fi".to_string();

    config.save_toml(&path).expect("save config");
    let loaded = Config::load_toml(&path).expect("load config");
    let _ = std::fs::remove_file(&path);

    assert_eq!(loaded, config);
}

#[test]
fn test_config_errors() {
    let path = temp_path("broken.toml");
    std::fs::write(&path, "long_press_timeout_ms = \"soon\"\n").unwrap();
    let result = Config::load_toml(&path);
    let _ = std::fs::remove_file(&path);
    assert!(matches!(result, Err(Error::TomlDe(_))));

    let missing = Config::load_toml(temp_path("missing.toml"));
    assert!(matches!(missing, Err(Error::Io(_))));
}

const LAYOUT: &str = r#"{
  "keys": [
    { "rect": { "x": 0, "y": 0, "width": 40, "height": 40 }, "label": "h" },
    { "rect": { "x": 40, "y": 0, "width": 40, "height": 40 }, "label": "e" },
    { "rect": { "x": 80, "y": 0, "width": 40, "height": 40 }, "label": "l" },
    { "rect": { "x": 120, "y": 0, "width": 40, "height": 40 }, "label": "p" },
    { "rect": { "x": 0, "y": 40, "width": 40, "height": 40 }, "label": "´", "dead": true },
    { "rect": { "x": 40, "y": 40, "width": 120, "height": 40 }, "label": " ", "action": "space" }
  ]
}"#;

#[test]
fn test_catalog_from_json() {
    let path = temp_path("layout.json");
    std::fs::write(&path, LAYOUT).unwrap();
    let catalog = KeyCatalog::load_json(&path).expect("load layout");
    let _ = std::fs::remove_file(&path);

    assert_eq!(catalog.len(), 6);
    let dead = catalog.get(catalog.find("´").unwrap()).unwrap();
    assert!(dead.dead);
    assert_eq!(dead.accent(), Some('´'));
    let space = catalog.get(catalog.find(" ").unwrap()).unwrap();
    assert_eq!(space.action, KeyAction::Space);
    assert!(space.cycle_set.is_none());
}

#[test]
fn test_catalog_errors() {
    assert!(matches!(
        KeyCatalog::load_json(temp_path("missing.json")),
        Err(Error::Io(_))
    ));
    assert!(matches!(
        KeyCatalog::from_json_str("{\"keys\": [{\"label\": \"a\"}]}"),
        Err(Error::Json(_))
    ));
}

#[test]
fn test_word_list_drives_suggestion() {
    let words = temp_path("words.txt");
    std::fs::write(&words, "hello\nhelp\n\n").unwrap();
    let engine = WordListEngine::load(&words).expect("load word list");
    let _ = std::fs::remove_file(&words);

    let catalog = KeyCatalog::from_json_str(LAYOUT).unwrap();
    let mut kb = KeyboardHost::new(
        RecordingHost::new(),
        catalog,
        Config::default(),
        Some(Box::new(engine)),
    );
    let now = Instant::now();

    for label in ["h", "e", "l", " "] {
        let catalog = kb.area().catalog();
        let pos = catalog.get(catalog.find(label).unwrap()).unwrap().rect.center();
        kb.touch(&TouchEvent::mouse(pos, TouchPhase::Pressed), now);
        kb.touch(&TouchEvent::mouse(pos, TouchPhase::Released), now);
        if label == "l" {
            assert_eq!(kb.composer().preedit(), "hel");
            assert_eq!(
                kb.composer().candidates().candidates(),
                ["hel", "help", "hello"]
            );
            assert_eq!(kb.composer().candidates().mode(), Some(CandidateMode::Popup));
        }
    }

    assert_eq!(kb.host().text, "help ");
}

#[test]
fn test_word_list_keeps_dead_key_accent() {
    let engine = WordListEngine::from_words(["hep"]).unwrap();
    let catalog = KeyCatalog::from_json_str(LAYOUT).unwrap();
    let mut kb = KeyboardHost::new(
        RecordingHost::new(),
        catalog,
        Config::default(),
        Some(Box::new(engine)),
    );
    let now = Instant::now();

    for label in ["h", "´", "e", " "] {
        let catalog = kb.area().catalog();
        let pos = catalog.get(catalog.find(label).unwrap()).unwrap().rect.center();
        kb.touch(&TouchEvent::mouse(pos, TouchPhase::Pressed), now);
        kb.touch(&TouchEvent::mouse(pos, TouchPhase::Released), now);
        if label == "e" {
            assert_eq!(kb.composer().preedit(), "hé");
            assert_eq!(kb.composer().candidates().candidates(), ["hé"]);
        }
    }

    assert_eq!(kb.host().text, "hé ");
}
