//! vkb-replay: drive a keyboard with a recorded touch script and print what
//! the application would have received.

use anyhow::{Context, Result};
use clap::Parser;
use libvkb_core::{
    Config, CorrectionEngine, KeyCatalog, KeyboardHost, RecordingHost, TouchEvent, WordListEngine,
};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{debug, info};

#[derive(Parser)]
#[command(about = "Replay a touch script against the keyboard core")]
struct Args {
    /// Key catalog (JSON)
    #[arg(long)]
    layout: PathBuf,

    /// Touch script (JSON array of steps)
    #[arg(long)]
    script: PathBuf,

    /// Keyboard configuration (TOML)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Word list for the correction engine, one word per line
    #[arg(long)]
    words: Option<PathBuf>,

    /// Initial content of the text field
    #[arg(long, default_value = "")]
    text: String,

    /// Let the text field request auto-capitalization
    #[arg(long)]
    auto_caps: bool,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum Action {
    Touch { event: TouchEvent },
    Tick,
    Confirm { text: String },
    PreeditClicked,
    Focus { focus_in: bool },
    Show,
    Hide,
    Reset,
}

#[derive(Debug, Deserialize)]
struct Step {
    /// Milliseconds since the start of the script
    #[serde(default)]
    at_ms: u64,
    #[serde(flatten)]
    action: Action,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::load_toml(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => Config::default(),
    };
    let catalog = KeyCatalog::load_json(&args.layout)
        .with_context(|| format!("loading layout {}", args.layout.display()))?;
    let engine: Option<Box<dyn CorrectionEngine>> = match &args.words {
        Some(path) => Some(Box::new(
            WordListEngine::load(path)
                .with_context(|| format!("loading word list {}", path.display()))?,
        )),
        None => None,
    };
    let script = std::fs::read_to_string(&args.script)
        .with_context(|| format!("reading script {}", args.script.display()))?;
    let steps: Vec<Step> = serde_json::from_str(&script).context("parsing script")?;
    info!(keys = catalog.len(), steps = steps.len(), "replaying");

    let mut host = RecordingHost::with_text(&args.text);
    if args.auto_caps {
        host.auto_capitalization = Some(true);
    }

    let mut keyboard = KeyboardHost::new(host, catalog, config, engine);
    keyboard.focus_changed(true);
    keyboard.show();

    let start = Instant::now();
    for step in steps {
        let now = start + Duration::from_millis(step.at_ms);
        run_timers(&mut keyboard, now);

        let events = match step.action {
            Action::Touch { event } => keyboard.touch(&event, now),
            Action::Tick => keyboard.tick(now),
            Action::Confirm { text } => {
                keyboard.confirm_candidate(&text);
                keyboard.take_events()
            }
            Action::PreeditClicked => {
                keyboard.preedit_clicked();
                keyboard.take_events()
            }
            Action::Focus { focus_in } => {
                keyboard.focus_changed(focus_in);
                keyboard.take_events()
            }
            Action::Show => {
                keyboard.show();
                keyboard.take_events()
            }
            Action::Hide => {
                keyboard.hide();
                keyboard.take_events()
            }
            Action::Reset => {
                keyboard.reset();
                keyboard.take_events()
            }
        };
        for event in events {
            debug!(at_ms = step.at_ms, ?event, "area");
        }
    }

    let host = keyboard.into_host();
    for call in &host.calls {
        println!("{}", serde_json::to_string(call)?);
    }
    println!("text: {:?}", host.text);
    if !host.preedit.is_empty() {
        println!("preedit: {:?}", host.preedit);
    }
    Ok(())
}

/// Fire every timer that falls due up to `now`, in deadline order.
fn run_timers(keyboard: &mut KeyboardHost<RecordingHost>, now: Instant) {
    while let Some(deadline) = keyboard.next_deadline().filter(|d| *d <= now) {
        for event in keyboard.tick(deadline) {
            debug!(?event, "timer");
        }
    }
}
