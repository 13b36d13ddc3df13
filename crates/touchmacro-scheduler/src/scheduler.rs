//! Registration of one-time and recurring macro triggers
//!
//! Nothing here returns an error: a past-due start is skipped, a missing
//! exact-delivery grant downgrades to inexact delivery, and cancelling an
//! unregistered trigger is a no-op on the host side.

use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use touchmacro_core::{Clock, Macro, MacroStore, SchedulerConfig};

use crate::host::{AlarmHost, AlarmRequest, Delivery};
use crate::trigger::{interval_id, once_id, TriggerPayload};

const MS_PER_MINUTE: i64 = 60_000;

/// Fire times registered by one [`Scheduler::schedule`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Armed {
    pub once_at_ms: Option<i64>,
    pub interval_at_ms: Option<i64>,
}

impl Armed {
    pub fn is_empty(&self) -> bool {
        self.once_at_ms.is_none() && self.interval_at_ms.is_none()
    }
}

pub struct Scheduler {
    host: Arc<dyn AlarmHost>,
    clock: Arc<dyn Clock>,
    config: SchedulerConfig,
}

impl Scheduler {
    pub fn new(host: Arc<dyn AlarmHost>, clock: Arc<dyn Clock>, config: SchedulerConfig) -> Self {
        Self {
            host,
            clock,
            config,
        }
    }

    fn delivery(&self) -> Delivery {
        if self.config.prefer_exact && self.host.can_schedule_exact() {
            Delivery::Exact
        } else {
            Delivery::Inexact
        }
    }

    /// Register whatever triggers the macro's settings call for.
    ///
    /// The recurring trigger's first firing is one interval from now, so
    /// every call restarts the interval clock.
    pub fn schedule(&self, macro_: &Macro) -> Armed {
        let now = self.clock.now_ms();
        let settings = &macro_.settings;
        let mut armed = Armed::default();

        match settings.scheduled_time_ms {
            Some(at) if at > now => {
                self.host.set_alarm(AlarmRequest {
                    id: once_id(&macro_.id),
                    fire_at_ms: at,
                    delivery: self.delivery(),
                    payload: TriggerPayload::once(&macro_.id),
                });
                armed.once_at_ms = Some(at);
            }
            Some(at) => debug!(id = %macro_.id, at, now, "one-time start already passed, skipping"),
            None => {}
        }

        armed.interval_at_ms = self.arm_interval(macro_, now);

        if !armed.is_empty() {
            info!(
                id = %macro_.id,
                once_at_ms = ?armed.once_at_ms,
                interval_at_ms = ?armed.interval_at_ms,
                "macro scheduled"
            );
        }
        armed
    }

    /// Request cancellation of both trigger slots of `macro_id`.
    pub fn cancel(&self, macro_id: &str) {
        self.host.cancel_alarm(once_id(macro_id));
        self.host.cancel_alarm(interval_id(macro_id));
        debug!(id = macro_id, "macro triggers cancelled");
    }

    /// Arm the next recurring cycle from `macro_`'s current settings.
    /// Returns the fire time, or `None` when it no longer recurs.
    pub fn reschedule_interval(&self, macro_: &Macro) -> Option<i64> {
        self.arm_interval(macro_, self.clock.now_ms())
    }

    fn arm_interval(&self, macro_: &Macro, now: i64) -> Option<i64> {
        let minutes = macro_.settings.interval_minutes.filter(|m| *m > 0)?;
        let at = now + i64::from(minutes) * MS_PER_MINUTE;
        self.host.set_alarm(AlarmRequest {
            id: interval_id(&macro_.id),
            fire_at_ms: at,
            delivery: self.delivery(),
            payload: TriggerPayload::interval(
                &macro_.id,
                minutes,
                macro_.settings.selected_days,
            ),
        });
        Some(at)
    }

    /// Schedule every macro, returning how many armed at least one trigger.
    pub fn schedule_all(&self, macros: &[Macro]) -> usize {
        macros
            .iter()
            .filter(|m| !self.schedule(m).is_empty())
            .count()
    }

    pub fn cancel_all<'a>(&self, macro_ids: impl IntoIterator<Item = &'a str>) {
        for id in macro_ids {
            self.cancel(id);
        }
    }

    /// Re-register triggers after a host restart. Downtime is not credited:
    /// intervals restart from now.
    pub fn restore(&self, store: &dyn MacroStore) -> usize {
        let macros = match store.scheduled_macros(self.clock.now_ms()) {
            Ok(macros) => macros,
            Err(e) => {
                warn!(error = %e, "cannot list scheduled macros, nothing restored");
                return 0;
            }
        };
        let restored = self.schedule_all(&macros);
        info!(restored, candidates = macros.len(), "triggers restored");
        restored
    }
}
