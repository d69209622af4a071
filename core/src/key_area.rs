//! Key interaction coordinator.
//!
//! [`KeyArea`] is the state machine between raw pointer events and key
//! notifications. For every touch point it decides which key is held down,
//! and it emits [`AreaEvent`]s in the order a consumer must observe them:
//!
//! - a key is never pressed twice by the same touch point without a release
//!   in between;
//! - a slide from one key to another releases the old key before pressing the
//!   new one;
//! - a release emits `KeyReleased` followed by `KeyClicked` for the key under
//!   the (gravity-corrected) release position.
//!
//! Only one touch point at a time is "actively pressed". A new press while
//! another point holds that marker releases and force-clicks the other
//! point's initial key and invalidates its slot, so a stray second finger
//! never leaves two keys logically down.
//!
//! Dead keys never produce a click. Clicking one selects it (replacing any
//! previously selected dead key), clicking it again deselects it, and the
//! next ordinary click carries its accent and clears the selection.

use crate::geometry::Point;
use crate::gesture::{FlickEvent, FlickGesture, FlickRecognizer, GestureClassifier};
use crate::host::InputMethodMode;
use crate::key::{KeyCatalog, KeyId};
use crate::event::{PointerSource, TouchEvent, TouchPhase};
use crate::gravity::KeyHitResolver;
use crate::timer::Timer;
use crate::touch::TouchPointTracker;
use crate::Config;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// Haptic/audio cue requested from the feedback player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feedback {
    /// Finger slid onto a key
    Press,
    /// Finger slid off all keys
    Cancel,
}

/// Notification emitted by [`KeyArea`].
///
/// `accent` is the label of the active dead key, `upper` is the shift level
/// (odd levels are upper case).
#[derive(Debug, Clone, PartialEq)]
pub enum AreaEvent {
    KeyPressed {
        key: KeyId,
        accent: Option<char>,
        upper: bool,
    },
    KeyReleased {
        key: KeyId,
        accent: Option<char>,
        upper: bool,
    },
    KeyClicked {
        key: KeyId,
        accent: Option<char>,
        upper: bool,
        /// Corrected touch coordinate
        pos: Point,
    },
    LongKeyPressed {
        key: KeyId,
        accent: Option<char>,
        upper: bool,
    },
    FlickLeft,
    FlickRight,
    FlickDown,
    /// Binding of the key the flick started on
    FlickUp(String),
    Feedback(Feedback),
    /// Magnifier popup over `key`; `finger_offset` is the finger position
    /// relative to the key center, normalized by the key size
    PopupShown {
        key: KeyId,
        finger_offset: Point,
        accent: Option<char>,
        upper: bool,
    },
    PopupHidden,
    PopupLongPressed {
        key: KeyId,
        accent: Option<char>,
        upper: bool,
    },
    ModifiersChanged {
        shift: bool,
        accent: Option<char>,
    },
}

impl From<FlickEvent> for AreaEvent {
    fn from(event: FlickEvent) -> Self {
        match event {
            FlickEvent::Left => AreaEvent::FlickLeft,
            FlickEvent::Right => AreaEvent::FlickRight,
            FlickEvent::Down => AreaEvent::FlickDown,
            FlickEvent::Up(binding) => AreaEvent::FlickUp(binding),
        }
    }
}

pub struct KeyArea {
    catalog: KeyCatalog,
    tracker: TouchPointTracker,
    resolver: KeyHitResolver,
    recognizer: FlickRecognizer,
    gestures: GestureClassifier,
    long_press: Timer,
    active_dead_key: Option<KeyId>,
    level: u8,
    mode: InputMethodMode,
    multitouch: bool,
    popup_enabled: bool,
    popup_visible: bool,
    flick_threshold_ratio: f32,
}

impl KeyArea {
    pub fn new(catalog: KeyCatalog, config: &Config) -> Self {
        let mut area = Self {
            catalog,
            tracker: TouchPointTracker::new(),
            resolver: KeyHitResolver::new(
                config.touchpoint_horizontal_gravity,
                config.touchpoint_vertical_gravity,
            ),
            recognizer: FlickRecognizer::new(
                0.0,
                0.0,
                Duration::from_millis(config.flick_timeout_ms),
            ),
            gestures: GestureClassifier::new(),
            long_press: Timer::new(Duration::from_millis(config.long_press_timeout_ms)),
            active_dead_key: None,
            level: 0,
            mode: InputMethodMode::Normal,
            multitouch: config.multitouch_enabled,
            popup_enabled: config.use_popup,
            popup_visible: false,
            flick_threshold_ratio: config.flick_threshold_ratio,
        };
        area.update_flick_thresholds();
        area
    }

    /// Re-read gravity, timing and popup settings.
    pub fn apply_config(&mut self, config: &Config) {
        self.resolver = KeyHitResolver::new(
            config.touchpoint_horizontal_gravity,
            config.touchpoint_vertical_gravity,
        );
        self.recognizer
            .set_timeout(Duration::from_millis(config.flick_timeout_ms));
        self.long_press
            .set_interval(Duration::from_millis(config.long_press_timeout_ms));
        self.multitouch = config.multitouch_enabled;
        self.popup_enabled = config.use_popup;
        self.flick_threshold_ratio = config.flick_threshold_ratio;
        self.update_flick_thresholds();
    }

    fn update_flick_thresholds(&mut self) {
        let bounds = self.catalog.bounds();
        self.recognizer.set_finish_threshold(
            (bounds.width * self.flick_threshold_ratio).floor(),
            (bounds.height * self.flick_threshold_ratio).floor(),
        );
    }

    pub fn catalog(&self) -> &KeyCatalog {
        &self.catalog
    }

    /// Replace the layout. All touch and dead-key state is dropped.
    pub fn set_catalog(&mut self, catalog: KeyCatalog) {
        self.catalog = catalog;
        self.reset();
        self.active_dead_key = None;
        self.update_flick_thresholds();
    }

    pub fn tracker(&self) -> &TouchPointTracker {
        &self.tracker
    }

    pub fn active_dead_key(&self) -> Option<KeyId> {
        self.active_dead_key
    }

    pub fn level(&self) -> u8 {
        self.level
    }

    pub fn is_upper(&self) -> bool {
        self.level % 2 == 1
    }

    pub fn mode(&self) -> InputMethodMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: InputMethodMode) {
        self.mode = mode;
    }

    pub fn multitouch_enabled(&self) -> bool {
        self.multitouch
    }

    pub fn is_gesture_triggered(&self) -> bool {
        self.gestures.is_triggered()
    }

    pub fn is_popup_visible(&self) -> bool {
        self.popup_visible
    }

    pub fn long_press_deadline(&self) -> Option<Instant> {
        self.long_press.deadline()
    }

    /// Accent of the active dead key.
    pub fn accent(&self) -> Option<char> {
        self.active_dead_key
            .and_then(|id| self.catalog.get(id))
            .and_then(|key| key.accent())
    }

    /// Process one pointer event.
    ///
    /// Mouse events are only honoured while multitouch is disabled, touch
    /// events only while it is enabled.
    pub fn touch(&mut self, event: &TouchEvent, now: Instant) -> Vec<AreaEvent> {
        let mut out = Vec::new();
        let id = match event.source {
            PointerSource::Mouse if !self.multitouch => 0,
            PointerSource::Touch if self.multitouch => event.id,
            _ => return out,
        };
        match event.phase {
            TouchPhase::Pressed => self.touch_pressed(id, event.pos, now, &mut out),
            TouchPhase::Moved => self.touch_moved(id, event.pos, now, &mut out),
            TouchPhase::Released => self.touch_released(id, event.pos, now, &mut out),
        }
        out
    }

    /// Feed a gesture recognized outside the area.
    pub fn handle_flick(&mut self, gesture: &FlickGesture) -> Vec<AreaEvent> {
        let mut out = Vec::new();
        self.apply_gesture(gesture, &mut out);
        out
    }

    /// Fire the long-press timer if due.
    pub fn tick(&mut self, now: Instant) -> Vec<AreaEvent> {
        let mut out = Vec::new();
        if self.long_press.poll(now) {
            self.long_key_pressed(&mut out);
        }
        out
    }

    /// Change the shift level.
    pub fn switch_level(&mut self, level: u8) -> Vec<AreaEvent> {
        let mut out = Vec::new();
        if level != self.level {
            self.level = level;
            self.modifiers_changed(&mut out);
        }
        out
    }

    /// The area was shown or hidden.
    pub fn set_visible(&mut self, visible: bool) -> Vec<AreaEvent> {
        let mut out = Vec::new();
        if !visible {
            self.hide_popup(&mut out);
            self.long_press.stop();
            self.clear_active_keys(&mut out);
            self.unlock_dead_keys(&mut out);
        }
        out
    }

    pub fn unlock_dead_keys(&mut self, out: &mut Vec<AreaEvent>) {
        if self.active_dead_key.take().is_some() {
            self.modifiers_changed(out);
        }
    }

    /// Release every held key.
    pub fn clear_active_keys(&mut self, out: &mut Vec<AreaEvent>) {
        let ids: Vec<usize> = self.tracker.iter_mut().map(|tp| tp.id).collect();
        for id in ids {
            self.set_active_key(id, None, out);
        }
    }

    /// Forget all touch points, gestures and timers without emitting anything.
    pub fn reset(&mut self) {
        self.tracker.reset_all();
        self.recognizer.reset();
        self.gestures.reset();
        self.long_press.stop();
        self.popup_visible = false;
    }

    fn touch_pressed(&mut self, raw_id: i32, pos: Point, now: Instant, out: &mut Vec<AreaEvent>) {
        let Some(id) = TouchPointTracker::validate(raw_id) else {
            return;
        };

        self.gestures.reset();
        self.recognizer.press(id, pos, now);

        if let Some(pressed) = self.tracker.actively_pressed() {
            self.preempt(pressed, out);
        }

        self.tracker.begin(id, pos);
        let Some(key) = self.catalog.key_at(pos) else {
            return;
        };
        if let Some(tp) = self.tracker.get_mut(id) {
            tp.finger_inside_area = true;
            tp.initial_key = Some(key);
        }

        self.update_popup(pos, Some(key), now, out);
        self.set_active_key(id, Some(key), out);
        self.tracker.set_actively_pressed(id);
    }

    /// Cross-talk: finish the actively pressed point before a new press.
    fn preempt(&mut self, id: usize, out: &mut Vec<AreaEvent>) {
        let Some((initial, pos)) = self
            .tracker
            .get(id)
            .and_then(|tp| tp.initial_key.map(|key| (key, tp.pos)))
        else {
            return;
        };
        debug!(id, key = initial.0, "preempting actively pressed touch point");

        self.set_active_key(id, None, out);
        if let Some(tp) = self.tracker.get_mut(id) {
            tp.initial_key = None;
            tp.invalid = true;
        }
        self.tracker.clear_actively_pressed();
        self.click(initial, pos, out);
    }

    fn touch_moved(&mut self, raw_id: i32, pos: Point, now: Instant, out: &mut Vec<AreaEvent>) {
        let Some(id) = TouchPointTracker::validate(raw_id) else {
            return;
        };

        if let Some(gesture) = self.recognizer.moved(id, pos, now) {
            self.apply_gesture(&gesture, out);
        }

        let Some(tp) = self.tracker.observe_move(id, pos) else {
            return;
        };
        if self.gestures.is_triggered() {
            return;
        }

        let key = self.resolver.resolve(&self.catalog, pos, tp);
        let newest = self.tracker.newest() == Some(id);

        if let Some(tp) = self.tracker.get_mut(id) {
            if key.is_some() {
                let slid = tp.active_key != key;
                tp.finger_inside_area = true;
                if slid {
                    out.push(AreaEvent::Feedback(Feedback::Press));
                }
                if newest {
                    self.update_popup(pos, key, now, out);
                }
            } else {
                let was_inside = std::mem::replace(&mut tp.finger_inside_area, false);
                if was_inside {
                    out.push(AreaEvent::Feedback(Feedback::Cancel));
                    if newest {
                        self.hide_popup(out);
                        self.long_press.stop();
                    }
                }
            }
        }

        self.set_active_key(id, key, out);
    }

    fn touch_released(&mut self, raw_id: i32, pos: Point, now: Instant, out: &mut Vec<AreaEvent>) {
        let Some(id) = TouchPointTracker::validate(raw_id) else {
            return;
        };

        if let Some(gesture) = self.recognizer.release(id, pos, now) {
            self.apply_gesture(&gesture, out);
        }

        let tp = self.tracker.end(id);
        if self.gestures.is_triggered() || tp.invalid {
            return;
        }

        if self.tracker.newest() == Some(id) {
            self.hide_popup(out);
            self.long_press.stop();
        }

        let Some(tp) = self.tracker.get_mut(id) else {
            return;
        };
        let key = self.resolver.resolve(&self.catalog, pos, tp);
        let corrected = tp.corrected_pos;

        match key {
            Some(key) => {
                // Release may arrive without an observed move onto this key
                self.set_active_key(id, Some(key), out);
                self.set_active_key(id, None, out);
                self.click(key, corrected, out);
            }
            None => self.set_active_key(id, None, out),
        }
    }

    fn apply_gesture(&mut self, gesture: &FlickGesture, out: &mut Vec<AreaEvent>) {
        let action = self.gestures.handle(gesture, self.mode, &self.catalog);
        if action.suppress_keys {
            debug!(state = ?gesture.state, "gesture took over the interaction");
            self.hide_popup(out);
            self.long_press.stop();
            self.clear_active_keys(out);
        }
        if let Some(flick) = action.flick {
            out.push(flick.into());
        }
    }

    fn set_active_key(&mut self, id: usize, key: Option<KeyId>, out: &mut Vec<AreaEvent>) {
        let accent = self.accent();
        let upper = self.is_upper();
        let Some(tp) = self.tracker.get_mut(id) else {
            return;
        };
        if tp.invalid {
            return;
        }

        if let Some(active) = tp.active_key {
            if Some(active) != key {
                tp.active_key = None;
                out.push(AreaEvent::KeyReleased {
                    key: active,
                    accent,
                    upper,
                });
            }
        }

        if let Some(key) = key {
            if tp.active_key != Some(key) {
                tp.active_key = Some(key);
                out.push(AreaEvent::KeyPressed { key, accent, upper });
            }
        }
    }

    fn click(&mut self, id: KeyId, pos: Point, out: &mut Vec<AreaEvent>) {
        let Some(key) = self.catalog.get(id) else {
            return;
        };

        if !key.dead {
            let accent = self.accent();
            self.unlock_dead_keys(out);
            out.push(AreaEvent::KeyClicked {
                key: id,
                accent,
                upper: self.is_upper(),
                pos,
            });
        } else if self.active_dead_key == Some(id) {
            self.unlock_dead_keys(out);
        } else {
            trace!(key = id.0, "dead key selected");
            self.active_dead_key = Some(id);
            self.modifiers_changed(out);
        }
    }

    fn long_key_pressed(&mut self, out: &mut Vec<AreaEvent>) {
        self.tracker.clear_actively_pressed();

        let accent = self.accent();
        let upper = self.is_upper();
        let Some(key) = self
            .tracker
            .newest()
            .and_then(|id| self.tracker.get(id))
            .and_then(|tp| tp.active_key)
        else {
            return;
        };

        if self.popup_enabled {
            out.push(AreaEvent::PopupLongPressed { key, accent, upper });
        }
        out.push(AreaEvent::LongKeyPressed { key, accent, upper });
    }

    fn update_popup(&mut self, pos: Point, key: Option<KeyId>, now: Instant, out: &mut Vec<AreaEvent>) {
        let Some((key, rect)) = key.and_then(|id| self.catalog.get(id).map(|k| (id, k.rect))) else {
            self.hide_popup(out);
            self.long_press.stop();
            return;
        };

        self.long_press.start(now);
        if !self.popup_enabled {
            return;
        }

        let center = rect.center();
        let finger_offset = Point::new(
            (pos.x - center.x) / rect.width,
            (pos.y - center.y) / rect.height,
        );
        self.popup_visible = true;
        out.push(AreaEvent::PopupShown {
            key,
            finger_offset,
            accent: self.accent(),
            upper: self.is_upper(),
        });
    }

    fn hide_popup(&mut self, out: &mut Vec<AreaEvent>) {
        if std::mem::take(&mut self.popup_visible) {
            out.push(AreaEvent::PopupHidden);
        }
    }

    fn modifiers_changed(&mut self, out: &mut Vec<AreaEvent>) {
        out.push(AreaEvent::ModifiersChanged {
            shift: self.level == 1,
            accent: self.accent(),
        });
    }
}
