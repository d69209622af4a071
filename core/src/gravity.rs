//! Gravity hit-testing.
//!
//! A finger resting near the edge of the key it pressed should not flicker
//! between that key and its neighbour. While gravity applies, the initially
//! pressed key keeps winning inside its rectangle grown by the gravity
//! margins. The first position outside the grown rectangle switches the touch
//! point to plain hit-testing for the rest of the contact.

use crate::geometry::Point;
use crate::key::{KeyCatalog, KeyId};
use crate::touch::TouchPoint;

/// Minimal distance of a corrected touch point from the key edge.
pub const CORRECTION_DISTANCE: f32 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeyHitResolver {
    horizontal_gravity: f32,
    vertical_gravity: f32,
}

impl KeyHitResolver {
    pub fn new(horizontal_gravity: f32, vertical_gravity: f32) -> Self {
        Self {
            horizontal_gravity,
            vertical_gravity,
        }
    }

    pub fn horizontal_gravity(&self) -> f32 {
        self.horizontal_gravity
    }

    pub fn vertical_gravity(&self) -> f32 {
        self.vertical_gravity
    }

    /// Resolve the key under `pos` for touch point `tp`.
    ///
    /// Updates `tp.corrected_pos`, and clears `tp.check_gravity` once the
    /// finger leaves the gravity well.
    pub fn resolve(&self, catalog: &KeyCatalog, pos: Point, tp: &mut TouchPoint) -> Option<KeyId> {
        let initial = match tp.initial_key {
            Some(id) if tp.check_gravity => id,
            _ => {
                tp.corrected_pos = pos;
                return catalog.key_at(pos);
            }
        };

        let Some(key) = catalog.get(initial) else {
            tp.check_gravity = false;
            tp.corrected_pos = pos;
            return catalog.key_at(pos);
        };
        let r = key.rect;

        if r.contains_expanded(pos, self.horizontal_gravity, self.vertical_gravity) {
            let mut corrected = pos;
            if pos.x < r.left() {
                corrected.x = r.left() + CORRECTION_DISTANCE;
            } else if pos.x > r.right() {
                corrected.x = r.right() - CORRECTION_DISTANCE;
            }
            if pos.y < r.top() {
                corrected.y = r.top() + CORRECTION_DISTANCE;
            } else if pos.y > r.bottom() {
                corrected.y = r.bottom() - CORRECTION_DISTANCE;
            }
            tp.corrected_pos = corrected;
            Some(initial)
        } else {
            tp.check_gravity = false;
            tp.corrected_pos = pos;
            catalog.key_at(pos)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pressed_on(catalog: &KeyCatalog, label: &str) -> TouchPoint {
        let mut tp = TouchPoint::new(0);
        tp.initial_key = catalog.find(label);
        tp
    }

    #[test]
    fn test_stays_on_initial_key_inside_margin() {
        let catalog = KeyCatalog::from_rows(&["as"], 40.0, 40.0);
        let resolver = KeyHitResolver::new(10.0, 10.0);
        let mut tp = pressed_on(&catalog, "a");

        // Raw position is on "s", but within 10px of "a"
        let key = resolver.resolve(&catalog, Point::new(45.0, 20.0), &mut tp);
        assert_eq!(key, catalog.find("a"));
        assert!(tp.check_gravity);
        assert_eq!(tp.corrected_pos, Point::new(38.0, 20.0));
    }

    #[test]
    fn test_leaving_margin_disables_gravity_for_good() {
        let catalog = KeyCatalog::from_rows(&["as"], 40.0, 40.0);
        let resolver = KeyHitResolver::new(10.0, 10.0);
        let mut tp = pressed_on(&catalog, "a");

        let key = resolver.resolve(&catalog, Point::new(60.0, 20.0), &mut tp);
        assert_eq!(key, catalog.find("s"));
        assert!(!tp.check_gravity);

        // Back inside the margin: plain hit test now
        let key = resolver.resolve(&catalog, Point::new(45.0, 20.0), &mut tp);
        assert_eq!(key, catalog.find("s"));
        assert_eq!(tp.corrected_pos, Point::new(45.0, 20.0));
    }

    #[test]
    fn test_vertical_correction() {
        let catalog = KeyCatalog::from_rows(&["a"], 40.0, 40.0);
        let resolver = KeyHitResolver::new(10.0, 10.0);
        let mut tp = pressed_on(&catalog, "a");

        let key = resolver.resolve(&catalog, Point::new(20.0, -5.0), &mut tp);
        assert_eq!(key, catalog.find("a"));
        assert_eq!(tp.corrected_pos, Point::new(20.0, 2.0));
    }

    #[test]
    fn test_without_initial_key_uses_plain_hit_test() {
        let catalog = KeyCatalog::from_rows(&["as"], 40.0, 40.0);
        let resolver = KeyHitResolver::new(10.0, 10.0);
        let mut tp = TouchPoint::new(0);
        assert_eq!(resolver.resolve(&catalog, Point::new(100.0, 20.0), &mut tp), None);
        assert!(tp.check_gravity);
    }
}
