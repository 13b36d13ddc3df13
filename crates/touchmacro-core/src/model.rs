//! Touch events, strokes and macro metadata
//!
//! Events serialize to compact camelCase JSON so one event fits on one line
//! of a storage file.

use serde::{Deserialize, Serialize};

use crate::settings::PlaybackSettings;

/// Pointer action of a single raw touch sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TouchAction {
    Down,
    Move,
    Up,
    Cancel,
}

impl TouchAction {
    /// Whether this action closes a pointer's stroke.
    pub fn ends_stroke(self) -> bool {
        matches!(self, TouchAction::Up | TouchAction::Cancel)
    }
}

/// Single captured touch sample
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TouchEvent {
    /// Milliseconds since the recording session started
    pub timestamp_ms: u64,
    pub x: f32,
    pub y: f32,
    pub action: TouchAction,
    /// Normalised pressure in [0, 1]
    #[serde(default = "default_pressure")]
    pub pressure: f32,
    #[serde(default)]
    pub pointer_id: u32,
}

fn default_pressure() -> f32 {
    1.0
}

impl TouchEvent {
    pub fn new(
        timestamp_ms: u64,
        x: f32,
        y: f32,
        action: TouchAction,
        pressure: f32,
        pointer_id: u32,
    ) -> Self {
        let pressure = if pressure.is_finite() {
            pressure.clamp(0.0, 1.0)
        } else {
            default_pressure()
        };
        Self {
            timestamp_ms,
            x,
            y,
            action,
            pressure,
            pointer_id,
        }
    }

    pub fn point(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// One pointer's complete down-to-up path. Rebuilt from events before every
/// playback, never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct Stroke {
    pub points: Vec<Point>,
    /// Start offset relative to the recording start
    pub start_ms: u64,
    /// Always at least 1
    pub duration_ms: u64,
}

/// A timed path handed to the input-synthesis capability.
#[derive(Debug, Clone, PartialEq)]
pub struct Gesture {
    pub points: Vec<Point>,
    pub duration_ms: u64,
}

impl Gesture {
    pub fn new(points: Vec<Point>, duration_ms: u64) -> Self {
        Self {
            points,
            duration_ms: duration_ms.max(1),
        }
    }

    pub fn start(&self) -> Option<Point> {
        self.points.first().copied()
    }

    pub fn end(&self) -> Option<Point> {
        self.points.last().copied()
    }
}

impl From<Stroke> for Gesture {
    fn from(stroke: Stroke) -> Self {
        Gesture::new(stroke.points, stroke.duration_ms)
    }
}

/// Saved macro metadata. The event sequence is stored separately.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Macro {
    pub id: String,
    pub name: String,
    /// Unix epoch millis of creation
    pub created_at_ms: i64,
    /// Length of the original recording
    pub duration_ms: u64,
    pub event_count: usize,
    #[serde(default)]
    pub settings: PlaybackSettings,
}

impl Macro {
    pub fn new(id: impl Into<String>, name: impl Into<String>, created_at_ms: i64) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            created_at_ms,
            duration_ms: 0,
            event_count: 0,
            settings: PlaybackSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: PlaybackSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Whether this macro still needs a deferred trigger at `now_ms`.
    pub fn has_pending_schedule(&self, now_ms: i64) -> bool {
        self.settings.scheduled_time_ms.is_some_and(|at| at > now_ms)
            || self.settings.interval_minutes.is_some_and(|m| m > 0)
    }
}
