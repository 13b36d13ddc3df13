//! touchmacro-scheduler - deferred triggers for touch macros
//!
//! [`Scheduler`] turns a macro's settings into one-time and recurring
//! alarms on an [`AlarmHost`]; [`TriggerHandler`] reacts when one fires,
//! applies the day filter, starts playback and re-arms recurring triggers.

pub mod handler;
pub mod host;
pub mod scheduler;
pub mod trigger;

#[cfg(test)]
mod testing;

pub use handler::{is_today_active, EngineLauncher, PlaybackLauncher, TriggerHandler, TriggerOutcome};
pub use host::{AlarmHost, AlarmRequest, Delivery, TokioAlarmHost};
pub use scheduler::{Armed, Scheduler};
pub use trigger::{interval_id, once_id, trigger_base, TriggerId, TriggerKind, TriggerPayload};

pub mod prelude {
    pub use crate::handler::{EngineLauncher, PlaybackLauncher, TriggerHandler, TriggerOutcome};
    pub use crate::host::{AlarmHost, TokioAlarmHost};
    pub use crate::scheduler::Scheduler;
    pub use crate::trigger::{TriggerId, TriggerKind, TriggerPayload};
}
