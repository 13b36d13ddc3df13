//! Raw pointer samples fed to `tm record`
//!
//! One JSON object per line:
//!
//! ```json
//! {"x": 120.0, "y": 640.5, "action": "DOWN", "pointerId": 0, "atMs": 0}
//! ```
//!
//! `atMs` paces the feed relative to when reading started; samples without
//! it are delivered as soon as they are read.

use crossbeam_channel::Sender;
use serde::Deserialize;
use std::io::BufRead;
use std::thread;
use std::time::{Duration, Instant};
use tracing::warn;

use touchmacro::TouchAction;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSample {
    pub x: f32,
    pub y: f32,
    pub action: TouchAction,
    #[serde(default = "full_pressure")]
    pub pressure: f32,
    #[serde(default)]
    pub pointer_id: u32,
    #[serde(default)]
    pub at_ms: Option<u64>,
}

fn full_pressure() -> f32 {
    1.0
}

/// Read samples on a background thread. The channel closes at end of input.
pub fn spawn_reader<R>(input: R, tx: Sender<RawSample>) -> thread::JoinHandle<()>
where
    R: BufRead + Send + 'static,
{
    thread::spawn(move || {
        let started = Instant::now();
        for (n, line) in input.lines().enumerate() {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    warn!(error = %e, "input read failed");
                    break;
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            let sample: RawSample = match serde_json::from_str(&line) {
                Ok(sample) => sample,
                Err(e) => {
                    warn!(line = n + 1, error = %e, "skipping malformed sample");
                    continue;
                }
            };
            if let Some(at) = sample.at_ms {
                let due = started + Duration::from_millis(at);
                if let Some(wait) = due.checked_duration_since(Instant::now()) {
                    thread::sleep(wait);
                }
            }
            if tx.send(sample).is_err() {
                break;
            }
        }
    })
}
