//! Reaction to fired triggers

use chrono::Weekday;
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::{info, warn};

use touchmacro_core::{Clock, DaySet, MacroStore, Result};
use touchmacro_recorder::PlaybackEngine;

use crate::scheduler::Scheduler;
use crate::trigger::TriggerPayload;

/// Starts playback of a stored macro on behalf of a trigger.
pub trait PlaybackLauncher: Send + Sync {
    fn launch(&self, macro_id: &str) -> Result<()>;
}

/// Launcher that plays through an in-process [`PlaybackEngine`].
pub struct EngineLauncher {
    engine: PlaybackEngine,
    store: Arc<dyn MacroStore>,
    runtime: Handle,
}

impl EngineLauncher {
    pub fn new(engine: PlaybackEngine, store: Arc<dyn MacroStore>, runtime: Handle) -> Self {
        Self {
            engine,
            store,
            runtime,
        }
    }

    pub fn engine(&self) -> &PlaybackEngine {
        &self.engine
    }
}

impl PlaybackLauncher for EngineLauncher {
    fn launch(&self, macro_id: &str) -> Result<()> {
        let macro_ = self.store.get_macro(macro_id)?;
        let events = self.store.load_events(macro_id)?;
        let _guard = self.runtime.enter();
        self.engine.execute_events(&events, &macro_.settings);
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TriggerOutcome {
    pub played: bool,
    pub rearmed: bool,
}

/// An empty set means every day.
pub fn is_today_active(days: &DaySet, today: Weekday) -> bool {
    days.is_active_on(today)
}

pub struct TriggerHandler {
    scheduler: Arc<Scheduler>,
    store: Arc<dyn MacroStore>,
    launcher: Arc<dyn PlaybackLauncher>,
    clock: Arc<dyn Clock>,
}

impl TriggerHandler {
    pub fn new(
        scheduler: Arc<Scheduler>,
        store: Arc<dyn MacroStore>,
        launcher: Arc<dyn PlaybackLauncher>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            scheduler,
            store,
            launcher,
            clock,
        }
    }

    /// Play the macro if today passes the day filter, then re-arm a
    /// recurring trigger whether or not it played.
    pub fn on_trigger(&self, payload: &TriggerPayload) -> TriggerOutcome {
        let id = payload.macro_id.as_str();
        let today = self.clock.today();

        let played = if is_today_active(&payload.selected_days, today) {
            match self.launcher.launch(id) {
                Ok(()) => {
                    info!(id, "scheduled playback started");
                    true
                }
                Err(e) => {
                    warn!(id, error = %e, "scheduled playback failed to start");
                    false
                }
            }
        } else {
            info!(id, ?today, "not an active day, skipping playback");
            false
        };

        let rearmed = payload.is_recurring() && self.rearm(id);
        TriggerOutcome { played, rearmed }
    }

    // Settings are re-read so edits since registration take effect.
    fn rearm(&self, id: &str) -> bool {
        match self.store.get_macro(id) {
            Ok(macro_) => self.scheduler.reschedule_interval(&macro_).is_some(),
            Err(e) => {
                warn!(id, error = %e, "cannot re-arm recurring trigger");
                false
            }
        }
    }
}
