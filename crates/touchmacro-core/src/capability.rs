//! Input-synthesis capability boundary
//!
//! The host facility that can inject gestures on the user's behalf. It may
//! come and go at runtime, so callers check [`InputCapability::is_available`]
//! right before they need it instead of caching the answer.

use crate::model::Gesture;

/// How the host finished a dispatched gesture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GestureOutcome {
    Completed,
    /// Interrupted by the host, or refused outright.
    Cancelled,
}

/// Invoked exactly once by the host when the gesture finishes.
pub type GestureCallback = Box<dyn FnOnce(GestureOutcome) + Send + 'static>;

pub trait InputCapability: Send + Sync {
    fn is_available(&self) -> bool;

    /// Submit a timed path gesture.
    ///
    /// Returns `false` when the host refused the gesture; `on_done` may then
    /// never be called.
    fn dispatch(&self, gesture: Gesture, on_done: GestureCallback) -> bool;
}

/// A capability that is never connected.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCapability;

impl InputCapability for NoCapability {
    fn is_available(&self) -> bool {
        false
    }

    fn dispatch(&self, _gesture: Gesture, _on_done: GestureCallback) -> bool {
        false
    }
}
