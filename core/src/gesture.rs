//! Flick gestures.
//!
//! [`FlickRecognizer`] turns the raw movement of one pointer into a
//! [`FlickGesture`] lifecycle. [`GestureClassifier`] decides what a gesture
//! means for the key area: the first sign of a flick cancels ordinary key
//! handling for the rest of the interaction, and a finished flick maps to
//! exactly one [`FlickEvent`].

use crate::geometry::Point;
use crate::host::InputMethodMode;
use crate::key::KeyCatalog;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlickDirection {
    Left,
    Right,
    Up,
    Down,
}

impl FlickDirection {
    fn of(delta_x: f32, delta_y: f32) -> Self {
        if delta_x.abs() >= delta_y.abs() {
            if delta_x < 0.0 {
                FlickDirection::Left
            } else {
                FlickDirection::Right
            }
        } else if delta_y < 0.0 {
            FlickDirection::Up
        } else {
            FlickDirection::Down
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlickState {
    NoGesture,
    Started,
    Updated,
    Finished,
    Canceled,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlickGesture {
    pub state: FlickState,
    pub direction: FlickDirection,
    pub start_pos: Point,
}

#[derive(Debug, Clone)]
struct Tracking {
    id: usize,
    start_pos: Point,
    start_time: Instant,
    started: bool,
    dead: bool,
}

/// Recognizes flicks of a single pointer.
///
/// The start threshold is half the finish threshold on each axis. A flick
/// that has not finished within the timeout is canceled. Nothing is
/// recognized while either finish threshold is zero.
#[derive(Debug, Clone)]
pub struct FlickRecognizer {
    finish_threshold: (f32, f32),
    timeout: Duration,
    tracking: Option<Tracking>,
}

impl FlickRecognizer {
    pub fn new(horizontal: f32, vertical: f32, timeout: Duration) -> Self {
        Self {
            finish_threshold: (horizontal, vertical),
            timeout,
            tracking: None,
        }
    }

    pub fn set_finish_threshold(&mut self, horizontal: f32, vertical: f32) {
        self.finish_threshold = (horizontal, vertical);
    }

    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    pub fn start_threshold(&self) -> (f32, f32) {
        (self.finish_threshold.0 / 2.0, self.finish_threshold.1 / 2.0)
    }

    pub fn finish_threshold(&self) -> (f32, f32) {
        self.finish_threshold
    }

    pub fn is_enabled(&self) -> bool {
        self.finish_threshold.0 > 0.0 && self.finish_threshold.1 > 0.0
    }

    pub fn reset(&mut self) {
        self.tracking = None;
    }

    pub fn press(&mut self, id: usize, pos: Point, now: Instant) {
        if !self.is_enabled() {
            self.tracking = None;
            return;
        }
        if self.tracking.as_ref().is_some_and(|t| !t.dead) {
            return;
        }
        self.tracking = Some(Tracking {
            id,
            start_pos: pos,
            start_time: now,
            started: false,
            dead: false,
        });
    }

    pub fn moved(&mut self, id: usize, pos: Point, now: Instant) -> Option<FlickGesture> {
        if !self.is_enabled() {
            return None;
        }
        let (start_h, start_v) = self.start_threshold();
        let timeout = self.timeout;
        let t = self.tracking.as_mut().filter(|t| t.id == id && !t.dead)?;

        let dx = pos.x - t.start_pos.x;
        let dy = pos.y - t.start_pos.y;
        let direction = FlickDirection::of(dx, dy);

        if now.duration_since(t.start_time) > timeout {
            t.dead = true;
            return t.started.then_some(FlickGesture {
                state: FlickState::Canceled,
                direction,
                start_pos: t.start_pos,
            });
        }

        let state = if t.started {
            FlickState::Updated
        } else if dx.abs() >= start_h || dy.abs() >= start_v {
            t.started = true;
            FlickState::Started
        } else {
            return None;
        };

        Some(FlickGesture {
            state,
            direction,
            start_pos: t.start_pos,
        })
    }

    pub fn release(&mut self, id: usize, pos: Point, now: Instant) -> Option<FlickGesture> {
        if self.tracking.as_ref().map(|t| t.id) != Some(id) {
            return None;
        }
        let t = self.tracking.take()?;
        if t.dead || !t.started {
            return None;
        }

        let dx = pos.x - t.start_pos.x;
        let dy = pos.y - t.start_pos.y;
        let direction = FlickDirection::of(dx, dy);
        let far_enough = match direction {
            FlickDirection::Left | FlickDirection::Right => dx.abs() >= self.finish_threshold.0,
            FlickDirection::Up | FlickDirection::Down => dy.abs() >= self.finish_threshold.1,
        };
        let in_time = now.duration_since(t.start_time) <= self.timeout;

        Some(FlickGesture {
            state: if far_enough && in_time {
                FlickState::Finished
            } else {
                FlickState::Canceled
            },
            direction,
            start_pos: t.start_pos,
        })
    }
}

/// Outcome of a finished flick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlickEvent {
    Left,
    Right,
    Down,
    /// Up carries the binding of the key the flick started on
    Up(String),
}

/// What the key area must do in response to a gesture update.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GestureAction {
    /// First gesture of this interaction: cancel popup/long press, clear keys
    pub suppress_keys: bool,
    pub flick: Option<FlickEvent>,
}

#[derive(Debug, Clone, Default)]
pub struct GestureClassifier {
    triggered: bool,
}

impl GestureClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// A gesture has consumed the current interaction.
    pub fn is_triggered(&self) -> bool {
        self.triggered
    }

    /// New interaction: forget previous gesture.
    pub fn reset(&mut self) {
        self.triggered = false;
    }

    pub fn handle(
        &mut self,
        gesture: &FlickGesture,
        mode: InputMethodMode,
        catalog: &KeyCatalog,
    ) -> GestureAction {
        let mut action = GestureAction::default();
        if mode == InputMethodMode::Direct {
            return action;
        }

        if !self.triggered && gesture.state != FlickState::NoGesture {
            self.triggered = true;
            action.suppress_keys = true;
        }

        if gesture.state == FlickState::Finished {
            action.flick = match gesture.direction {
                FlickDirection::Left => Some(FlickEvent::Left),
                FlickDirection::Right => Some(FlickEvent::Right),
                FlickDirection::Down => Some(FlickEvent::Down),
                FlickDirection::Up => catalog
                    .key_at(gesture.start_pos)
                    .and_then(|id| catalog.get(id))
                    .map(|key| FlickEvent::Up(key.binding().to_string())),
            };
        }
        action
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recognizer() -> FlickRecognizer {
        FlickRecognizer::new(100.0, 60.0, Duration::from_millis(1000))
    }

    #[test]
    fn test_flick_right_finishes() {
        let t0 = Instant::now();
        let mut r = recognizer();
        r.press(0, Point::new(10.0, 10.0), t0);
        assert_eq!(r.moved(0, Point::new(40.0, 10.0), t0), None);
        let g = r.moved(0, Point::new(70.0, 10.0), t0).unwrap();
        assert_eq!(g.state, FlickState::Started);
        let g = r.release(0, Point::new(120.0, 12.0), t0 + Duration::from_millis(200)).unwrap();
        assert_eq!(g.state, FlickState::Finished);
        assert_eq!(g.direction, FlickDirection::Right);
    }

    #[test]
    fn test_short_flick_is_canceled() {
        let t0 = Instant::now();
        let mut r = recognizer();
        r.press(0, Point::new(100.0, 30.0), t0);
        r.moved(0, Point::new(40.0, 30.0), t0).unwrap();
        let g = r.release(0, Point::new(30.0, 30.0), t0).unwrap();
        assert_eq!(g.state, FlickState::Canceled);
    }

    #[test]
    fn test_slow_flick_times_out() {
        let t0 = Instant::now();
        let mut r = recognizer();
        r.press(0, Point::new(0.0, 0.0), t0);
        r.moved(0, Point::new(60.0, 0.0), t0).unwrap();
        let g = r.moved(0, Point::new(200.0, 0.0), t0 + Duration::from_secs(2)).unwrap();
        assert_eq!(g.state, FlickState::Canceled);
        assert_eq!(r.release(0, Point::new(200.0, 0.0), t0 + Duration::from_secs(2)), None);
    }

    #[test]
    fn test_zero_threshold_recognizes_nothing() {
        let t0 = Instant::now();
        let mut r = FlickRecognizer::new(0.0, 0.0, Duration::from_millis(1000));
        assert!(!r.is_enabled());
        r.press(0, Point::new(0.0, 0.0), t0);
        assert_eq!(r.moved(0, Point::new(1.0, 0.0), t0), None);
        assert_eq!(r.moved(0, Point::new(300.0, 0.0), t0), None);
        assert_eq!(r.release(0, Point::new(300.0, 0.0), t0), None);

        r.set_finish_threshold(100.0, 60.0);
        r.press(0, Point::new(0.0, 0.0), t0);
        assert_eq!(r.moved(0, Point::new(1.0, 0.0), t0), None);
        assert_eq!(r.moved(0, Point::new(60.0, 0.0), t0).unwrap().state, FlickState::Started);
    }

    #[test]
    fn test_other_pointer_ignored() {
        let t0 = Instant::now();
        let mut r = recognizer();
        r.press(0, Point::new(0.0, 0.0), t0);
        r.press(1, Point::new(0.0, 0.0), t0);
        assert_eq!(r.moved(1, Point::new(80.0, 0.0), t0), None);
    }

    #[test]
    fn test_classifier_up_uses_start_key() {
        let catalog = KeyCatalog::from_rows(&["ab"], 40.0, 40.0);
        let mut c = GestureClassifier::new();
        let g = FlickGesture {
            state: FlickState::Finished,
            direction: FlickDirection::Up,
            start_pos: Point::new(50.0, 20.0),
        };
        let action = c.handle(&g, InputMethodMode::Normal, &catalog);
        assert!(action.suppress_keys);
        assert_eq!(action.flick, Some(FlickEvent::Up("b".to_string())));
        assert!(c.is_triggered());
    }

    #[test]
    fn test_classifier_disabled_in_direct_mode() {
        let catalog = KeyCatalog::default();
        let mut c = GestureClassifier::new();
        let g = FlickGesture {
            state: FlickState::Finished,
            direction: FlickDirection::Left,
            start_pos: Point::default(),
        };
        assert_eq!(c.handle(&g, InputMethodMode::Direct, &catalog), GestureAction::default());
        assert!(!c.is_triggered());
    }

    #[test]
    fn test_classifier_suppresses_once() {
        let catalog = KeyCatalog::default();
        let mut c = GestureClassifier::new();
        let mut g = FlickGesture {
            state: FlickState::Started,
            direction: FlickDirection::Left,
            start_pos: Point::default(),
        };
        assert!(c.handle(&g, InputMethodMode::Normal, &catalog).suppress_keys);
        g.state = FlickState::Finished;
        let action = c.handle(&g, InputMethodMode::Normal, &catalog);
        assert!(!action.suppress_keys);
        assert_eq!(action.flick, Some(FlickEvent::Left));
    }
}
