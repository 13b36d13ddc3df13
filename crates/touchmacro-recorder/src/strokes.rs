//! Grouping of interleaved multi-pointer events into complete strokes

use std::collections::HashMap;

use touchmacro_core::{Point, Stroke, TouchAction, TouchEvent};

/// One pointer's in-progress path.
#[derive(Debug, Clone)]
pub(crate) struct PathAccumulator {
    pub(crate) points: Vec<Point>,
    pub(crate) start_ms: u64,
}

impl PathAccumulator {
    pub(crate) fn open(event: &TouchEvent) -> Self {
        Self {
            points: vec![event.point()],
            start_ms: event.timestamp_ms,
        }
    }

    pub(crate) fn push(&mut self, event: &TouchEvent) {
        self.points.push(event.point());
    }

    /// Close with the final sample. Duration is at least 1ms.
    pub(crate) fn close(mut self, last: &TouchEvent) -> Stroke {
        self.points.push(last.point());
        Stroke {
            points: self.points,
            start_ms: self.start_ms,
            duration_ms: last.timestamp_ms.saturating_sub(self.start_ms).max(1),
        }
    }
}

/// Build strokes from events in arrival order.
///
/// A `DOWN` opens a path for its pointer (replacing a stale one), `MOVE`
/// extends it, `UP`/`CANCEL` closes it. Samples for a pointer with no open
/// path are ignored, and paths still open at the end are dropped. The result
/// is stably sorted by start time.
pub fn build_strokes(events: &[TouchEvent]) -> Vec<Stroke> {
    let mut open: HashMap<u32, PathAccumulator> = HashMap::new();
    let mut strokes = Vec::new();

    for event in events {
        match event.action {
            TouchAction::Down => {
                open.insert(event.pointer_id, PathAccumulator::open(event));
            }
            TouchAction::Move => {
                if let Some(acc) = open.get_mut(&event.pointer_id) {
                    acc.push(event);
                }
            }
            TouchAction::Up | TouchAction::Cancel => {
                if let Some(acc) = open.remove(&event.pointer_id) {
                    strokes.push(acc.close(event));
                }
            }
        }
    }

    strokes.sort_by_key(|s| s.start_ms);
    strokes
}
