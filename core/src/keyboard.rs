//! Keyboard host.
//!
//! [`KeyboardHost`] ties the pieces together for one text field session:
//! pointer events go through the [`KeyArea`], the resulting key presses,
//! releases and clicks are turned into [`KeyEvent`]s and routed to the host
//! connection, the cycle-key handler and the preedit composer. It also owns
//! the shift state machine, auto-capitalization, backspace auto-repeat and
//! the long tap on space.
//!
//! Everything runs on the caller's thread. Timers are polled by [`KeyboardHost::tick`].

use crate::candidate::CandidateMode;
use crate::composer::{context_before_cursor, PreeditComposer};
use crate::correction::CorrectionEngine;
use crate::cycle::CycleKeyHandler;
use crate::event::TouchEvent;
use crate::geometry::Point;
use crate::gesture::FlickGesture;
use crate::host::{ContentType, HandlerState, InputHost, InputMethodMode, KeyEventType};
use crate::key::{KeyCatalog, KeyCode, KeyEvent, KeyId, SpecialKey};
use crate::key_area::{AreaEvent, KeyArea};
use crate::shift::{self, ShiftState};
use crate::timer::Timer;
use crate::Config;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

pub struct KeyboardHost<H: InputHost> {
    host: H,
    config: Config,
    area: KeyArea,
    composer: PreeditComposer,
    cycle: CycleKeyHandler,
    shift: ShiftState,
    auto_caps_enabled: bool,
    auto_caps_triggered: bool,
    shift_held_down: bool,
    /// Cursor position from the last surrounding text query
    cursor: usize,
    state: HandlerState,
    mode: InputMethodMode,
    content_type: ContentType,
    backspace_timer: Timer,
    space_timer: Timer,
    last_click: Option<KeyEvent>,
    have_focus: bool,
    visible: bool,
    /// Area notifications raised outside of `touch`, e.g. by shift changes
    pending: Vec<AreaEvent>,
}

impl<H: InputHost> KeyboardHost<H> {
    /// Create the keyboard for `catalog`. The engine, if any, is configured
    /// for the layout and the configured language.
    pub fn new(
        host: H,
        catalog: KeyCatalog,
        config: Config,
        mut engine: Option<Box<dyn CorrectionEngine>>,
    ) -> Self {
        if let Some(engine) = engine.as_deref_mut() {
            configure_engine(engine, &catalog, &config);
        }

        let mut keyboard = Self {
            host,
            area: KeyArea::new(catalog, &config),
            composer: PreeditComposer::new(engine),
            cycle: CycleKeyHandler::new(Duration::from_millis(config.multitap_timeout_ms)),
            shift: ShiftState::Clear,
            auto_caps_enabled: false,
            auto_caps_triggered: false,
            shift_held_down: false,
            cursor: 0,
            state: HandlerState::OnScreen,
            mode: InputMethodMode::Normal,
            content_type: ContentType::default(),
            backspace_timer: Timer::new(Duration::from_millis(config.auto_backspace_delay_ms)),
            space_timer: Timer::new(Duration::from_millis(config.long_tap_space_delay_ms)),
            last_click: None,
            have_focus: false,
            visible: false,
            pending: Vec::new(),
            config,
        };
        keyboard.update_correction_state();
        keyboard.update();
        keyboard
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn into_host(self) -> H {
        self.host
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn area(&self) -> &KeyArea {
        &self.area
    }

    pub fn composer(&self) -> &PreeditComposer {
        &self.composer
    }

    pub fn shift_state(&self) -> ShiftState {
        self.shift
    }

    pub fn handler_state(&self) -> HandlerState {
        self.state
    }

    pub fn input_method_mode(&self) -> InputMethodMode {
        self.mode
    }

    pub fn content_type(&self) -> ContentType {
        self.content_type
    }

    pub fn is_auto_caps_triggered(&self) -> bool {
        self.auto_caps_triggered
    }

    pub fn is_correction_enabled(&self) -> bool {
        self.composer.is_correction_enabled()
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn has_focus(&self) -> bool {
        self.have_focus
    }

    pub fn is_backspace_repeating(&self) -> bool {
        self.backspace_timer.is_active()
    }

    /// Earliest instant at which [`KeyboardHost::tick`] has work to do.
    pub fn next_deadline(&self) -> Option<Instant> {
        [
            self.area.long_press_deadline(),
            self.backspace_timer.deadline(),
            self.space_timer.deadline(),
            self.cycle.deadline(),
        ]
        .into_iter()
        .flatten()
        .min()
    }

    /// Area notifications raised since the last call, outside of `touch`,
    /// `flick` and `tick`.
    pub fn take_events(&mut self) -> Vec<AreaEvent> {
        std::mem::take(&mut self.pending)
    }

    /// Apply changed settings.
    pub fn apply_config(&mut self, config: Config) {
        self.area.apply_config(&config);
        self.cycle
            .set_timeout(Duration::from_millis(config.multitap_timeout_ms));
        self.space_timer
            .set_interval(Duration::from_millis(config.long_tap_space_delay_ms));
        if let Some(engine) = self.composer.engine_mut() {
            engine.set_maximum_candidates(config.max_candidates);
            if config.correction_enabled {
                engine.enable_correction();
            } else {
                engine.disable_correction();
            }
        }
        self.config = config;
        self.update_correction_state();
    }

    // ---------- pointer input ----------

    /// Process a pointer event and act on the keys it resolves to.
    ///
    /// Returns every area notification, including the key events already
    /// acted upon, for the view layer.
    pub fn touch(&mut self, event: &TouchEvent, now: Instant) -> Vec<AreaEvent> {
        let events = self.area.touch(event, now);
        self.finish(events, now)
    }

    /// Feed a flick recognized outside the key area.
    pub fn flick(&mut self, gesture: &FlickGesture, now: Instant) -> Vec<AreaEvent> {
        let events = self.area.handle_flick(gesture);
        self.finish(events, now)
    }

    /// Fire due timers: long press, backspace auto-repeat, long tap on
    /// space and the multitap timeout.
    pub fn tick(&mut self, now: Instant) -> Vec<AreaEvent> {
        let events = self.area.tick(now);

        if self.backspace_timer.poll(now) {
            // Restart before deleting so the deletion counts as repeating
            self.backspace_timer.start_with(
                now,
                Duration::from_millis(self.config.backspace_repeat_interval_ms),
            );
            self.do_backspace();
        }

        if self.space_timer.poll(now) {
            debug!("long tap on space");
            self.composer.long_tap_space();
        }

        self.cycle.tick(now, &mut self.composer, &mut self.host);

        self.finish(events, now)
    }

    fn finish(&mut self, mut events: Vec<AreaEvent>, now: Instant) -> Vec<AreaEvent> {
        self.dispatch(&events, now);
        events.append(&mut self.pending);
        events
    }

    fn dispatch(&mut self, events: &[AreaEvent], now: Instant) {
        for event in events {
            match event {
                AreaEvent::KeyPressed { key, accent, upper } => {
                    if let Some(ev) = self.key_event(*key, *accent, *upper, Point::default()) {
                        self.handle_key_press(&ev, now);
                    }
                }
                AreaEvent::KeyReleased { key, accent, upper } => {
                    if let Some(ev) = self.key_event(*key, *accent, *upper, Point::default()) {
                        self.handle_key_release(&ev);
                    }
                }
                AreaEvent::KeyClicked {
                    key,
                    accent,
                    upper,
                    pos,
                } => {
                    if let Some(ev) = self.key_event(*key, *accent, *upper, *pos) {
                        self.handle_key_click(&ev, now);
                    }
                }
                AreaEvent::FlickDown => {
                    debug!("flick down, hiding keyboard");
                    self.hide();
                }
                _ => {}
            }
        }
    }

    fn key_event(&self, id: KeyId, accent: Option<char>, upper: bool, pos: Point) -> Option<KeyEvent> {
        self.area
            .catalog()
            .get(id)
            .map(|key| KeyEvent::from_key(id, key, accent, upper, pos))
    }

    // ---------- key events ----------

    /// Key events are signal-only unless the application takes raw keys.
    fn is_signal_only(&self, event: &KeyEvent) -> bool {
        let raw = self.mode == InputMethodMode::Direct && event.special == SpecialKey::NotSpecial;
        !(raw || event.code == KeyCode::PlusMinus)
    }

    pub fn handle_key_press(&mut self, event: &KeyEvent, now: Instant) {
        if event.code == KeyCode::Shift {
            if self.shift_held_down {
                return;
            }
            if self.state == HandlerState::OnScreen && self.area.multitouch_enabled() {
                self.shift_held_down = true;
            }
        }

        let signal_only = self.is_signal_only(event);
        if signal_only {
            match event.code {
                KeyCode::Backspace => self.backspace_timer.start_with(
                    now,
                    Duration::from_millis(self.config.auto_backspace_delay_ms),
                ),
                KeyCode::Space
                    if self.composer.is_correction_enabled()
                        && self.composer.candidates().mode() == Some(CandidateMode::Popup) =>
                {
                    self.space_timer.start(now)
                }
                _ => {}
            }
        }

        self.host
            .send_key_event(event, KeyEventType::Press, signal_only);
    }

    pub fn handle_key_release(&mut self, event: &KeyEvent) {
        if event.code == KeyCode::Shift {
            if !self.shift_held_down {
                return;
            }
            if self.state == HandlerState::OnScreen && self.area.multitouch_enabled() {
                self.shift_held_down = false;
            }
        }

        let signal_only = self.is_signal_only(event);
        if signal_only {
            if event.code == KeyCode::Backspace && self.backspace_timer.is_active() {
                self.backspace_timer.stop();
                if self.composer.candidates().is_visible() {
                    self.composer.hide_candidates();
                } else {
                    self.do_backspace();
                }
            } else if event.code == KeyCode::Space && self.composer.is_correction_enabled() {
                self.space_timer.stop();
            }
        }

        self.host
            .send_key_event(event, KeyEventType::Release, signal_only);
    }

    pub fn handle_key_click(&mut self, event: &KeyEvent, now: Instant) {
        let direct = self.mode == InputMethodMode::Direct;
        if self.state == HandlerState::Hardware && !direct {
            // Symbol view clicks go out as plain key strokes
            self.host.send_key_event(event, KeyEventType::Press, false);
            self.host.send_key_event(event, KeyEventType::Release, false);
        } else if !direct {
            self.handle_text_input_click(event, now);
        }

        self.handle_general_click(event);
        self.last_click = Some(event.clone());

        if event.code != KeyCode::Shift {
            self.refresh_text_state();
        }
    }

    fn handle_text_input_click(&mut self, event: &KeyEvent, now: Instant) {
        let has_text = matches!(event.special, SpecialKey::NotSpecial | SpecialKey::CycleSet);
        let handled_elsewhere = matches!(
            event.code,
            KeyCode::Backspace | KeyCode::PlusMinus | KeyCode::Shift
        );
        if !has_text || handled_elsewhere {
            return;
        }

        if self
            .cycle
            .handle_click(event, &mut self.composer, &mut self.host, now)
        {
            return;
        }
        if event.text.is_empty() {
            return;
        }

        if self.composer.is_correction_enabled() && event.code.is_word_break() {
            let last_was_cycle = self
                .last_click
                .as_ref()
                .is_some_and(|last| last.special == SpecialKey::CycleSet);
            self.composer
                .commit_word_break(event, last_was_cycle, &mut self.host);
        } else {
            self.composer.append_character(
                &event.text,
                event.touch_point,
                self.shift.is_on(),
                &mut self.host,
            );
        }
    }

    fn handle_general_click(&mut self, event: &KeyEvent) {
        if event.code == KeyCode::Shift {
            let next = self.shift.clicked(self.auto_caps_triggered);
            self.set_shift_state(next);
            self.auto_caps_triggered = false;
            return;
        }

        let keeps_shift = event.code == KeyCode::Backspace
            || matches!(
                event.special,
                SpecialKey::Sym | SpecialKey::Switch | SpecialKey::LayoutMenu
            )
            || (self.shift_held_down && !self.auto_caps_triggered);
        if self.shift == ShiftState::Latched && !keeps_shift {
            self.set_shift_state(ShiftState::Clear);
        }
    }

    fn do_backspace(&mut self) {
        let repeating = self.backspace_timer.is_active();
        let had_preedit = !self.composer.preedit().is_empty();

        self.composer
            .backspace(repeating, self.shift.is_on(), &mut self.host);
        if repeating && had_preedit {
            // The whole preedit went, stop repeating
            self.backspace_timer.stop();
        }

        if self.shift == ShiftState::Latched && (!self.auto_caps_enabled || self.cursor != 0) {
            self.set_shift_state(ShiftState::Clear);
        }
        self.refresh_text_state();
    }

    pub fn set_shift_state(&mut self, state: ShiftState) {
        if self.shift != state {
            debug!(from = ?self.shift, to = ?state, "shift state");
        }
        self.shift = state;
        let events = self.area.switch_level(state.level());
        self.pending.extend(events);
    }

    // ---------- host state ----------

    /// Re-read the text field's properties.
    pub fn update(&mut self) {
        if let Some(content_type) = self.host.content_type() {
            self.content_type = content_type;
        }

        self.update_auto_capitalization();
        self.update_context();

        self.mode = self.host.input_method_mode();
        self.area.set_mode(self.mode);
    }

    fn refresh_text_state(&mut self) {
        self.update_auto_capitalization();
        self.update_context();
    }

    pub fn update_auto_capitalization(&mut self) {
        let allowed = self.config.auto_caps_enabled
            && shift::auto_caps_allowed(
                self.host.content_type(),
                self.host.auto_capitalization_enabled(),
            );
        let surrounding = if allowed {
            self.host.surrounding_text()
        } else {
            None
        };
        self.auto_caps_enabled = surrounding.is_some();
        let Some((text, cursor)) = surrounding else {
            return;
        };

        self.cursor = cursor;
        self.auto_caps_triggered =
            shift::auto_caps_triggered(&text, cursor, self.composer.preedit().is_empty());

        if self.state == HandlerState::OnScreen && self.shift != ShiftState::Locked {
            let next = if self.auto_caps_triggered {
                ShiftState::Latched
            } else {
                ShiftState::Clear
            };
            self.set_shift_state(next);
        }
    }

    /// Hand the word before the cursor to the engine while idle.
    pub fn update_context(&mut self) {
        if !self.composer.is_correction_enabled() || !self.composer.preedit().is_empty() {
            return;
        }

        let mut context = String::new();
        if matches!(self.host.content_type(), Some(t) if !t.is_numeric()) {
            if let Some((text, cursor)) = self.host.surrounding_text() {
                self.cursor = cursor;
                context = context_before_cursor(&text, cursor);
            }
        }
        self.composer.set_context(&context);
    }

    /// Decide whether typed text is corrected, and tell the host what the
    /// engine's global setting is.
    pub fn update_correction_state(&mut self) {
        let engine_enabled = self
            .composer
            .engine()
            .map(|engine| engine.correction_enabled());

        let enabled = match engine_enabled {
            Some(engine_enabled) if self.state != HandlerState::Hardware => {
                self.host.set_global_correction_enabled(engine_enabled);
                match self.host.correction_enabled() {
                    Some(allowed) => allowed && engine_enabled,
                    None => engine_enabled,
                }
            }
            _ => {
                self.host.set_global_correction_enabled(false);
                false
            }
        };
        self.composer.set_correction_enabled(enabled, &mut self.host);
    }

    pub fn focus_changed(&mut self, focus_in: bool) {
        self.have_focus = focus_in;
        if focus_in {
            if self.state == HandlerState::OnScreen {
                self.reset_shift_state();
            }
        } else {
            self.reset_internal_state();
            self.cancel_interaction();
        }
    }

    /// Drop a temporary shift (latched by the user or by auto-caps).
    fn reset_shift_state(&mut self) {
        if self.state == HandlerState::OnScreen && self.shift != ShiftState::Locked {
            self.auto_caps_triggered = false;
            self.set_shift_state(ShiftState::Clear);
        }
    }

    /// Switch between on-screen and hardware input. A pending preedit is
    /// committed when leaving on-screen input.
    pub fn set_state(&mut self, state: HandlerState) {
        if self.state == state {
            return;
        }
        debug!(from = ?self.state, to = ?state, "handler state");

        if self.state == HandlerState::OnScreen {
            self.composer.flush(&mut self.host);
        }
        self.reset_internal_state();
        self.cancel_interaction();
        self.state = state;

        self.update_correction_state();
        self.update_auto_capitalization();
    }

    /// The focused application changed.
    pub fn client_changed(&mut self) {
        self.reset_internal_state();
        self.hide();
    }

    /// The host asks to drop composition state.
    pub fn reset(&mut self) {
        if self.state == HandlerState::OnScreen {
            self.reset_internal_state();
        }
    }

    fn reset_internal_state(&mut self) {
        self.backspace_timer.stop();
        self.composer.reset();
        self.cycle.reset();
    }

    pub fn show(&mut self) {
        self.visible = true;
        self.update_correction_state();
    }

    /// A character still cycling is committed; the preedit is kept.
    pub fn hide(&mut self) {
        self.cycle.commit_pending(&mut self.composer, &mut self.host);
        self.composer.hide_candidates();
        self.cancel_interaction();
        self.visible = false;
    }

    /// Release held keys, clear the dead key and forget every touch point
    /// and timer.
    fn cancel_interaction(&mut self) {
        let events = self.area.set_visible(false);
        self.pending.extend(events);
        self.area.reset();
        self.backspace_timer.stop();
        self.space_timer.stop();
        self.cycle.reset();
    }

    /// Replace the layout. Touch and dead-key state of the old one is dropped.
    pub fn set_layout(&mut self, catalog: KeyCatalog) {
        if let Some(engine) = self.composer.engine_mut() {
            if !engine.load_keyboard_layout(&catalog) {
                warn!("correction engine rejected the keyboard layout");
            }
        }
        self.area.set_catalog(catalog);
    }

    /// The user tapped the preedit in the application. Returns true if the
    /// suggestion list opened.
    pub fn preedit_clicked(&mut self) -> bool {
        self.composer.show_suggestion_list()
    }

    /// The user picked `text` from the candidate list.
    pub fn confirm_candidate(&mut self, text: &str) {
        self.composer.confirm_candidate(text, &mut self.host);
        self.refresh_text_state();
    }
}

fn configure_engine(engine: &mut dyn CorrectionEngine, catalog: &KeyCatalog, config: &Config) {
    if !engine.set_language(&config.language) {
        warn!(language = %config.language, "correction engine does not support language");
    }
    if !engine.load_keyboard_layout(catalog) {
        warn!("correction engine rejected the keyboard layout");
    }
    engine.set_maximum_candidates(config.max_candidates);
    if config.correction_enabled {
        engine.enable_correction();
    } else {
        engine.disable_correction();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::RecordingHost;
    use crate::key::{Key, KeyAction};
    use crate::geometry::Rect;

    fn catalog() -> KeyCatalog {
        let mut catalog = KeyCatalog::from_rows(&["qwertyuiop", "asdfghjkl"], 40.0, 40.0);
        catalog.push(Key::new("shift", Rect::new(0.0, 80.0, 80.0, 40.0)).with_action(KeyAction::Shift));
        catalog.push(Key::new(" ", Rect::new(80.0, 80.0, 200.0, 40.0)).with_action(KeyAction::Space));
        catalog.push(Key::new("bksp", Rect::new(280.0, 80.0, 120.0, 40.0)).with_action(KeyAction::Backspace));
        catalog
    }

    fn keyboard(host: RecordingHost) -> KeyboardHost<RecordingHost> {
        KeyboardHost::new(host, catalog(), Config::default(), None)
    }

    fn tap(keyboard: &mut KeyboardHost<RecordingHost>, label: &str, now: Instant) {
        let id = keyboard.area().catalog().find(label).unwrap();
        let pos = keyboard.area().catalog().get(id).unwrap().rect.center();
        keyboard.touch(&TouchEvent::mouse(pos, crate::event::TouchPhase::Pressed), now);
        keyboard.touch(&TouchEvent::mouse(pos, crate::event::TouchPhase::Released), now);
    }

    #[test]
    fn test_without_engine_commits_each_character() {
        let mut kb = keyboard(RecordingHost::new());
        let now = Instant::now();
        tap(&mut kb, "h", now);
        tap(&mut kb, "i", now);
        assert_eq!(kb.host().text, "hi");
        assert!(!kb.is_correction_enabled());
        assert_eq!(kb.host().global_correction, Some(false));
    }

    #[test]
    fn test_shift_click_cycle_and_latch_clears() {
        let mut kb = keyboard(RecordingHost::new());
        let now = Instant::now();

        tap(&mut kb, "shift", now);
        assert_eq!(kb.shift_state(), ShiftState::Latched);
        tap(&mut kb, "a", now);
        assert_eq!(kb.host().text, "A");
        assert_eq!(kb.shift_state(), ShiftState::Clear);

        tap(&mut kb, "shift", now);
        tap(&mut kb, "shift", now);
        assert_eq!(kb.shift_state(), ShiftState::Locked);
        tap(&mut kb, "b", now);
        tap(&mut kb, "c", now);
        assert_eq!(kb.host().text, "ABC");
        tap(&mut kb, "shift", now);
        assert_eq!(kb.shift_state(), ShiftState::Clear);
    }

    #[test]
    fn test_backspace_auto_repeat() {
        let mut kb = keyboard(RecordingHost::with_text("abcdef"));
        let t0 = Instant::now();
        let id = kb.area().catalog().find("bksp").unwrap();
        let pos = kb.area().catalog().get(id).unwrap().rect.center();

        kb.touch(&TouchEvent::mouse(pos, crate::event::TouchPhase::Pressed), t0);
        kb.tick(t0 + Duration::from_millis(499));
        assert_eq!(kb.host().text, "abcdef");
        kb.tick(t0 + Duration::from_millis(500));
        assert_eq!(kb.host().text, "abcde");
        kb.tick(t0 + Duration::from_millis(600));
        assert_eq!(kb.host().text, "abcd");

        // The pending repeat is performed on release, then repeating stops
        kb.touch(&TouchEvent::mouse(pos, crate::event::TouchPhase::Released), t0 + Duration::from_millis(650));
        assert_eq!(kb.host().text, "abc");
        assert!(!kb.is_backspace_repeating());
        kb.tick(t0 + Duration::from_millis(2000));
        assert_eq!(kb.host().text, "abc");
    }

    #[test]
    fn test_short_backspace_deletes_on_release() {
        let mut kb = keyboard(RecordingHost::with_text("ab"));
        tap(&mut kb, "bksp", Instant::now());
        assert_eq!(kb.host().text, "a");
    }

    #[test]
    fn test_hardware_state_forwards_raw_keys() {
        let mut kb = keyboard(RecordingHost::new());
        kb.set_state(HandlerState::Hardware);
        kb.host_mut().clear_calls();
        tap(&mut kb, "q", Instant::now());
        assert_eq!(
            kb.host().key_events(),
            vec![("q", KeyEventType::Press), ("q", KeyEventType::Release)]
        );
        assert!(kb.host().commits().is_empty());
    }

    #[test]
    fn test_auto_caps_after_sentence() {
        let mut host = RecordingHost::with_text("Hello.");
        host.auto_capitalization = Some(true);
        let mut kb = keyboard(host);
        assert_eq!(kb.shift_state(), ShiftState::Clear);

        tap(&mut kb, " ", Instant::now());
        assert_eq!(kb.host().text, "Hello. ");
        assert!(kb.is_auto_caps_triggered());
        assert_eq!(kb.shift_state(), ShiftState::Latched);

        tap(&mut kb, "w", Instant::now());
        assert_eq!(kb.host().text, "Hello. W");
        assert_eq!(kb.shift_state(), ShiftState::Clear);
    }

    #[test]
    fn test_flick_down_hides() {
        let mut kb = keyboard(RecordingHost::new());
        kb.show();
        assert!(kb.is_visible());
        let gesture = FlickGesture {
            state: crate::gesture::FlickState::Finished,
            direction: crate::gesture::FlickDirection::Down,
            start_pos: Point::new(20.0, 20.0),
        };
        let events = kb.flick(&gesture, Instant::now());
        assert!(events.contains(&AreaEvent::FlickDown));
        assert!(!kb.is_visible());
    }
}
