//! Input synthesis for hosts without an accessibility service
//!
//! Gestures are logged instead of injected and complete after their own
//! duration, so playback timing behaves as it would on a device.

use std::time::Duration;
use tokio::runtime::Handle;
use tracing::info;

use touchmacro::prelude::{Gesture, GestureCallback, GestureOutcome, InputCapability};

pub struct DryRunCapability {
    runtime: Handle,
}

impl DryRunCapability {
    pub fn new(runtime: Handle) -> Self {
        Self { runtime }
    }
}

impl InputCapability for DryRunCapability {
    fn is_available(&self) -> bool {
        true
    }

    fn dispatch(&self, gesture: Gesture, on_done: GestureCallback) -> bool {
        let (Some(from), Some(to)) = (gesture.start(), gesture.end()) else {
            return false;
        };
        info!(
            from = ?(from.x, from.y),
            to = ?(to.x, to.y),
            points = gesture.points.len(),
            duration_ms = gesture.duration_ms,
            "gesture"
        );
        let duration = Duration::from_millis(gesture.duration_ms);
        self.runtime.spawn(async move {
            tokio::time::sleep(duration).await;
            on_done(GestureOutcome::Completed);
        });
        true
    }
}
