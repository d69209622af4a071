//! Pointer events as delivered to the key area.
//!
//! Mouse and multi-touch input are unified into one `(id, position, phase)`
//! shape before they reach touch tracking. A mouse is a single pointer and
//! always gets id 0.

use crate::geometry::Point;
use serde::{Deserialize, Serialize};

/// Lifecycle phase of a pointer contact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TouchPhase {
    Pressed,
    Moved,
    Released,
}

/// Which input path produced the event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointerSource {
    Mouse,
    Touch,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TouchEvent {
    pub id: i32,
    pub pos: Point,
    pub phase: TouchPhase,
    pub source: PointerSource,
}

impl TouchEvent {
    pub fn touch(id: i32, pos: Point, phase: TouchPhase) -> Self {
        Self {
            id,
            pos,
            phase,
            source: PointerSource::Touch,
        }
    }

    pub fn mouse(pos: Point, phase: TouchPhase) -> Self {
        Self {
            id: 0,
            pos,
            phase,
            source: PointerSource::Mouse,
        }
    }

    pub fn press(id: i32, pos: Point) -> Self {
        Self::touch(id, pos, TouchPhase::Pressed)
    }

    pub fn moved(id: i32, pos: Point) -> Self {
        Self::touch(id, pos, TouchPhase::Moved)
    }

    pub fn release(id: i32, pos: Point) -> Self {
        Self::touch(id, pos, TouchPhase::Released)
    }
}
