//! Live pass-through of captured strokes
//!
//! While a capture layer sits on top of the screen the app underneath sees
//! nothing, so each finished stroke is re-emitted right away as a gesture.

use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, trace};

use touchmacro_core::{Gesture, InputCapability, TouchAction, TouchEvent};

use crate::strokes::PathAccumulator;

pub struct LiveRedispatcher {
    capability: Arc<dyn InputCapability>,
    open: HashMap<u32, PathAccumulator>,
}

impl LiveRedispatcher {
    pub fn new(capability: Arc<dyn InputCapability>) -> Self {
        Self {
            capability,
            open: HashMap::new(),
        }
    }

    /// Feed one captured event. Returns true when a gesture was handed to
    /// the capability.
    ///
    /// Failures are swallowed: redispatch must never interrupt a recording.
    pub fn on_event(&mut self, event: &TouchEvent) -> bool {
        match event.action {
            TouchAction::Down => {
                self.open
                    .insert(event.pointer_id, PathAccumulator::open(event));
                false
            }
            TouchAction::Move => {
                if let Some(acc) = self.open.get_mut(&event.pointer_id) {
                    acc.push(event);
                }
                false
            }
            TouchAction::Up => match self.open.remove(&event.pointer_id) {
                Some(acc) => self.dispatch(acc.close(event).into()),
                None => false,
            },
            TouchAction::Cancel => {
                if !self.open.is_empty() {
                    debug!(open = self.open.len(), "touch cancelled, dropping open strokes");
                }
                self.open.clear();
                false
            }
        }
    }

    /// Pointers currently down.
    pub fn open_pointers(&self) -> usize {
        self.open.len()
    }

    fn dispatch(&self, gesture: Gesture) -> bool {
        if !self.capability.is_available() {
            debug!("capability unavailable, skipping live redispatch");
            return false;
        }
        trace!(
            points = gesture.points.len(),
            duration_ms = gesture.duration_ms,
            "redispatching stroke"
        );
        let accepted = self.capability.dispatch(gesture, Box::new(|_| {}));
        if !accepted {
            debug!("host refused live redispatch");
        }
        accepted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};
    use touchmacro_core::GestureCallback;

    #[derive(Default)]
    struct Recording {
        available: AtomicBool,
        gestures: Mutex<Vec<Gesture>>,
    }

    impl InputCapability for Recording {
        fn is_available(&self) -> bool {
            self.available.load(Ordering::SeqCst)
        }

        fn dispatch(&self, gesture: Gesture, on_done: GestureCallback) -> bool {
            self.gestures.lock().push(gesture);
            on_done(touchmacro_core::GestureOutcome::Completed);
            true
        }
    }

    fn ev(t: u64, x: f32, action: TouchAction, pointer: u32) -> TouchEvent {
        TouchEvent::new(t, x, 0.0, action, 1.0, pointer)
    }

    fn capability(available: bool) -> Arc<Recording> {
        let cap = Arc::new(Recording::default());
        cap.available.store(available, Ordering::SeqCst);
        cap
    }

    #[test]
    fn dispatches_each_pointer_on_up() {
        let cap = capability(true);
        let mut r = LiveRedispatcher::new(cap.clone());

        assert!(!r.on_event(&ev(0, 1.0, TouchAction::Down, 0)));
        assert!(!r.on_event(&ev(5, 9.0, TouchAction::Down, 1)));
        assert!(!r.on_event(&ev(10, 2.0, TouchAction::Move, 0)));
        assert!(r.on_event(&ev(20, 9.5, TouchAction::Up, 1)));
        assert_eq!(r.open_pointers(), 1);
        assert!(r.on_event(&ev(40, 3.0, TouchAction::Up, 0)));

        let gestures = cap.gestures.lock();
        assert_eq!(gestures.len(), 2);
        assert_eq!(gestures[0].duration_ms, 15);
        assert_eq!(gestures[1].points.len(), 3);
        assert_eq!(gestures[1].duration_ms, 40);
    }

    #[test]
    fn cancel_discards_everything() {
        let cap = capability(true);
        let mut r = LiveRedispatcher::new(cap.clone());
        r.on_event(&ev(0, 1.0, TouchAction::Down, 0));
        r.on_event(&ev(1, 1.0, TouchAction::Down, 1));
        r.on_event(&ev(2, 1.0, TouchAction::Cancel, 0));
        assert_eq!(r.open_pointers(), 0);
        assert!(!r.on_event(&ev(3, 1.0, TouchAction::Up, 1)));
        assert!(cap.gestures.lock().is_empty());
    }

    #[test]
    fn unavailable_capability_is_silent() {
        let cap = capability(false);
        let mut r = LiveRedispatcher::new(cap.clone());
        r.on_event(&ev(0, 1.0, TouchAction::Down, 0));
        assert!(!r.on_event(&ev(10, 1.0, TouchAction::Up, 0)));
        assert!(cap.gestures.lock().is_empty());

        // Still usable once the capability returns.
        cap.available.store(true, Ordering::SeqCst);
        r.on_event(&ev(20, 1.0, TouchAction::Down, 0));
        assert!(r.on_event(&ev(30, 1.0, TouchAction::Up, 0)));
    }
}
