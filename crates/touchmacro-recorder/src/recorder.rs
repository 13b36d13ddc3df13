//! Session-scoped touch recorder
//!
//! Lifecycle: `start` -> `add_event`* -> (`pause` / `resume`)* -> `stop`.
//! The capture path writes through `add_event` while a save path may read
//! `snapshot` at the same time; both go through one mutex.

use parking_lot::Mutex;
use std::time::Instant;
use tracing::{debug, info, warn};

use touchmacro_core::{RecorderConfig, TouchAction, TouchEvent};

/// Frozen output of a recording session
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordingResult {
    pub events: Vec<TouchEvent>,
    pub duration_ms: u64,
}

impl RecordingResult {
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

#[derive(Default)]
struct Session {
    active: bool,
    paused: bool,
    started: Option<Instant>,
    events: Vec<TouchEvent>,
    last_ts: u64,
    overflowed: bool,
}

impl Session {
    fn elapsed_ms(&self) -> u64 {
        self.started
            .map(|s| s.elapsed().as_millis() as u64)
            .unwrap_or(0)
    }
}

/// Records raw pointer samples into timestamped [`TouchEvent`]s.
pub struct TouchRecorder {
    config: RecorderConfig,
    session: Mutex<Session>,
    last_result: Mutex<Option<RecordingResult>>,
}

impl TouchRecorder {
    pub fn new() -> Self {
        Self::with_config(RecorderConfig::default())
    }

    pub fn with_config(config: RecorderConfig) -> Self {
        Self {
            config,
            session: Mutex::new(Session::default()),
            last_result: Mutex::new(None),
        }
    }

    /// Begin a fresh session, discarding any buffered events and the
    /// previous result.
    pub fn start(&self) {
        let mut session = self.session.lock();
        *session = Session {
            active: true,
            started: Some(Instant::now()),
            ..Session::default()
        };
        *self.last_result.lock() = None;
        info!("recording started");
    }

    /// Append a sample. Silently dropped unless a session is active and not
    /// paused. Returns the stored event when it was kept.
    pub fn add_event(
        &self,
        x: f32,
        y: f32,
        action: TouchAction,
        pressure: f32,
        pointer_id: u32,
    ) -> Option<TouchEvent> {
        let mut session = self.session.lock();
        if !session.active || session.paused {
            return None;
        }
        if session.events.len() >= self.config.max_events {
            if !session.overflowed {
                warn!(
                    max_events = self.config.max_events,
                    "recording buffer full, dropping further events"
                );
                session.overflowed = true;
            }
            return None;
        }
        // Instant is monotonic; the max keeps the invariant explicit.
        let ts = session.elapsed_ms().max(session.last_ts);
        session.last_ts = ts;
        let event = TouchEvent::new(ts, x, y, action, pressure, pointer_id);
        session.events.push(event);
        Some(event)
    }

    /// Events arriving while paused are dropped, not buffered.
    pub fn pause(&self) {
        let mut session = self.session.lock();
        if session.active {
            session.paused = true;
            debug!(events = session.events.len(), "recording paused");
        }
    }

    pub fn resume(&self) {
        let mut session = self.session.lock();
        if session.active {
            session.paused = false;
            debug!("recording resumed");
        }
    }

    /// Freeze the session and return its result. Without an active session
    /// this returns an empty result and keeps the previous one.
    pub fn stop(&self) -> RecordingResult {
        let mut session = self.session.lock();
        if !session.active {
            return RecordingResult::default();
        }
        let result = RecordingResult {
            events: std::mem::take(&mut session.events),
            duration_ms: session.elapsed_ms(),
        };
        session.active = false;
        session.paused = false;
        drop(session);

        info!(
            events = result.events.len(),
            duration_ms = result.duration_ms,
            "recording stopped"
        );
        *self.last_result.lock() = Some(result.clone());
        result
    }

    pub fn is_recording(&self) -> bool {
        self.session.lock().active
    }

    pub fn is_paused(&self) -> bool {
        self.session.lock().paused
    }

    pub fn event_count(&self) -> usize {
        self.session.lock().events.len()
    }

    /// Live session length, 0 when idle.
    pub fn duration_ms(&self) -> u64 {
        let session = self.session.lock();
        if session.active {
            session.elapsed_ms()
        } else {
            0
        }
    }

    /// Copy of the events captured so far, readable while capture continues.
    pub fn snapshot(&self) -> Vec<TouchEvent> {
        self.session.lock().events.clone()
    }

    /// Result of the most recent completed session, until the next `start`.
    pub fn last_result(&self) -> Option<RecordingResult> {
        self.last_result.lock().clone()
    }
}

impl Default for TouchRecorder {
    fn default() -> Self {
        Self::new()
    }
}
