//! Deferred-trigger host boundary
//!
//! The host owns the actual wake-ups (an OS alarm service on a device, a
//! Tokio timer in [`TokioAlarmHost`]). Registration is keyed by
//! [`TriggerId`], so setting an id twice keeps only the latest request.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use touchmacro_core::Clock;

use crate::trigger::{TriggerId, TriggerPayload};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Delivery {
    /// Fire at the requested time, even from a low-power state.
    Exact,
    /// Fire eventually, within the host's power-management slack.
    Inexact,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlarmRequest {
    pub id: TriggerId,
    /// Unix epoch millis
    pub fire_at_ms: i64,
    pub delivery: Delivery,
    pub payload: TriggerPayload,
}

pub trait AlarmHost: Send + Sync {
    /// Whether exact delivery is currently granted.
    fn can_schedule_exact(&self) -> bool;

    /// Register `request`, replacing any alarm with the same id.
    fn set_alarm(&self, request: AlarmRequest);

    /// Drop the alarm with `id`. Unknown ids are ignored.
    fn cancel_alarm(&self, id: TriggerId);
}

/// In-process host backed by Tokio timers.
///
/// Fired payloads arrive on the receiver returned by [`TokioAlarmHost::new`].
/// Alarms live only as long as the process, which is what boot recovery is
/// for.
pub struct TokioAlarmHost {
    exact: bool,
    clock: Arc<dyn Clock>,
    runtime: Handle,
    tx: mpsc::UnboundedSender<TriggerPayload>,
    alarms: Mutex<HashMap<TriggerId, JoinHandle<()>>>,
}

impl TokioAlarmHost {
    /// Must be called from within a Tokio runtime; timers are spawned on it.
    pub fn new(
        clock: Arc<dyn Clock>,
        exact: bool,
    ) -> (Self, mpsc::UnboundedReceiver<TriggerPayload>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let host = Self {
            exact,
            clock,
            runtime: Handle::current(),
            tx,
            alarms: Mutex::new(HashMap::new()),
        };
        (host, rx)
    }

    /// Ids with an alarm that has not fired yet.
    pub fn pending(&self) -> Vec<TriggerId> {
        let mut ids: Vec<TriggerId> = self
            .alarms
            .lock()
            .iter()
            .filter(|(_, task)| !task.is_finished())
            .map(|(id, _)| *id)
            .collect();
        ids.sort();
        ids
    }
}

impl AlarmHost for TokioAlarmHost {
    fn can_schedule_exact(&self) -> bool {
        self.exact
    }

    fn set_alarm(&self, request: AlarmRequest) {
        let delay_ms = (request.fire_at_ms - self.clock.now_ms()).max(0) as u64;
        let tx = self.tx.clone();
        let id = request.id;
        debug!(
            id = %id,
            delay_ms,
            delivery = ?request.delivery,
            macro_id = %request.payload.macro_id,
            "alarm set"
        );

        let payload = request.payload;
        let task = self.runtime.spawn(async move {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            trace!(id = %id, "alarm fired");
            let _ = tx.send(payload);
        });

        let mut alarms = self.alarms.lock();
        alarms.retain(|_, t| !t.is_finished());
        if let Some(previous) = alarms.insert(id, task) {
            previous.abort();
        }
    }

    fn cancel_alarm(&self, id: TriggerId) {
        if let Some(task) = self.alarms.lock().remove(&id) {
            task.abort();
            debug!(id = %id, "alarm cancelled");
        }
    }
}

impl Drop for TokioAlarmHost {
    fn drop(&mut self) {
        for (_, task) in self.alarms.lock().drain() {
            task.abort();
        }
    }
}
