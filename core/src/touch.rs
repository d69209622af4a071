//! Per-finger touch state.
//!
//! Each pointer id from the input source owns one [`TouchPoint`] slot. Slots
//! are created on first use, reset (not destroyed) when the same id presses
//! again, and kept after release so the id can be reused. Ids outside
//! `0..TOUCH_POINT_LIMIT` are refused.
//!
//! The tracker also owns the cross-talk marker: the id of the touch point
//! whose key is "actively pressed". The key area consults and clears it; at
//! most one id holds it at a time.

use crate::geometry::Point;
use crate::key::KeyId;
use tracing::warn;

/// Refuse to process more than this many simultaneous touch points.
pub const TOUCH_POINT_LIMIT: i32 = 20;

/// Minimal distinguishable finger movement (Manhattan distance, pixels).
pub const MOVEMENT_THRESHOLD: f32 = 5.0;

#[derive(Debug, Clone, PartialEq)]
pub struct TouchPoint {
    pub id: usize,
    pub pos: Point,
    pub initial_pos: Point,
    /// Key hit at press time
    pub initial_key: Option<KeyId>,
    /// Key currently held down by this touch point
    pub active_key: Option<KeyId>,
    /// Gravity still applies to `initial_key`
    pub check_gravity: bool,
    pub finger_inside_area: bool,
    /// Release coordinate adjusted to lie inside the resolved key
    pub corrected_pos: Point,
    /// Terminated by cross-talk; ignores further events until the next press
    pub invalid: bool,
}

impl TouchPoint {
    pub fn new(id: usize) -> Self {
        Self {
            id,
            pos: Point::default(),
            initial_pos: Point::default(),
            initial_key: None,
            active_key: None,
            check_gravity: true,
            finger_inside_area: false,
            corrected_pos: Point::default(),
            invalid: false,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new(self.id);
    }
}

/// Whether moving from `prev` to `pos` is more than sensor noise.
pub fn is_observable_move(prev: Point, pos: Point) -> bool {
    prev.manhattan_distance(pos) >= MOVEMENT_THRESHOLD
}

#[derive(Debug, Clone, Default)]
pub struct TouchPointTracker {
    points: Vec<TouchPoint>,
    actively_pressed: Option<usize>,
    newest: Option<usize>,
}

impl TouchPointTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate a raw id from the input source.
    pub fn validate(id: i32) -> Option<usize> {
        if (0..TOUCH_POINT_LIMIT).contains(&id) {
            Some(id as usize)
        } else {
            warn!(id, "too many touch points, ignoring event");
            None
        }
    }

    fn slot_mut(&mut self, id: usize) -> &mut TouchPoint {
        if id >= self.points.len() {
            let start = self.points.len();
            self.points.extend((start..=id).map(TouchPoint::new));
        }
        &mut self.points[id]
    }

    /// Start a new contact for `id`, overwriting whatever the slot held.
    pub fn begin(&mut self, id: usize, pos: Point) -> &mut TouchPoint {
        self.newest = Some(id);
        let tp = self.slot_mut(id);
        tp.reset();
        tp.pos = pos;
        tp.initial_pos = pos;
        tp
    }

    /// Record a move. Returns the touch point only if the move is observable
    /// and the point has not been invalidated.
    pub fn observe_move(&mut self, id: usize, pos: Point) -> Option<&mut TouchPoint> {
        let tp = self.slot_mut(id);
        if tp.invalid || !is_observable_move(tp.pos, pos) {
            return None;
        }
        tp.pos = pos;
        Some(tp)
    }

    /// Slot for a release, created if the press was never seen.
    pub fn end(&mut self, id: usize) -> &mut TouchPoint {
        if self.actively_pressed == Some(id) {
            self.actively_pressed = None;
        }
        let tp = self.slot_mut(id);
        tp.finger_inside_area = false;
        tp
    }

    pub fn get(&self, id: usize) -> Option<&TouchPoint> {
        self.points.get(id)
    }

    pub fn get_mut(&mut self, id: usize) -> Option<&mut TouchPoint> {
        self.points.get_mut(id)
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut TouchPoint> {
        self.points.iter_mut()
    }

    pub fn newest(&self) -> Option<usize> {
        self.newest
    }

    pub fn actively_pressed(&self) -> Option<usize> {
        self.actively_pressed
    }

    pub fn set_actively_pressed(&mut self, id: usize) {
        self.actively_pressed = Some(id);
    }

    pub fn clear_actively_pressed(&mut self) {
        self.actively_pressed = None;
    }

    /// Forget all touch state.
    pub fn reset_all(&mut self) {
        for tp in &mut self.points {
            tp.reset();
        }
        self.actively_pressed = None;
        self.newest = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_rejects_out_of_range() {
        assert_eq!(TouchPointTracker::validate(-1), None);
        assert_eq!(TouchPointTracker::validate(TOUCH_POINT_LIMIT), None);
        assert_eq!(TouchPointTracker::validate(0), Some(0));
        assert_eq!(TouchPointTracker::validate(19), Some(19));
    }

    #[test]
    fn test_begin_resets_slot() {
        let mut tracker = TouchPointTracker::new();
        {
            let tp = tracker.begin(3, Point::new(1.0, 1.0));
            tp.check_gravity = false;
            tp.invalid = true;
        }
        let tp = tracker.begin(3, Point::new(5.0, 5.0));
        assert!(tp.check_gravity);
        assert!(!tp.invalid);
        assert_eq!(tp.initial_pos, Point::new(5.0, 5.0));
        assert_eq!(tracker.newest(), Some(3));
    }

    #[test]
    fn test_small_moves_are_noise() {
        let mut tracker = TouchPointTracker::new();
        tracker.begin(0, Point::new(10.0, 10.0));
        assert!(tracker.observe_move(0, Point::new(12.0, 12.0)).is_none());
        assert!(tracker.observe_move(0, Point::new(13.0, 12.0)).is_some());
        assert_eq!(tracker.get(0).unwrap().pos, Point::new(13.0, 12.0));
    }

    #[test]
    fn test_invalid_point_ignores_moves() {
        let mut tracker = TouchPointTracker::new();
        tracker.begin(0, Point::new(0.0, 0.0)).invalid = true;
        assert!(tracker.observe_move(0, Point::new(50.0, 0.0)).is_none());
    }

    #[test]
    fn test_end_clears_marker_of_same_id_only() {
        let mut tracker = TouchPointTracker::new();
        tracker.begin(1, Point::default());
        tracker.set_actively_pressed(1);
        tracker.end(0);
        assert_eq!(tracker.actively_pressed(), Some(1));
        tracker.end(1);
        assert_eq!(tracker.actively_pressed(), None);
    }
}
