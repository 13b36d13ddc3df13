//! Test doubles for the scheduler's collaborators

use chrono::Weekday;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};

use touchmacro_core::{Clock, Error, Macro, MacroStore, Result, TouchEvent};

use crate::handler::PlaybackLauncher;
use crate::host::{AlarmHost, AlarmRequest};
use crate::trigger::TriggerId;

pub struct FixedClock {
    now_ms: AtomicI64,
    today: Mutex<Weekday>,
}

impl FixedClock {
    pub fn at(now_ms: i64) -> Self {
        Self {
            now_ms: AtomicI64::new(now_ms),
            today: Mutex::new(Weekday::Mon),
        }
    }

    pub fn on(self, day: Weekday) -> Self {
        *self.today.lock() = day;
        self
    }

    pub fn advance(&self, ms: i64) {
        self.now_ms.fetch_add(ms, Ordering::SeqCst);
    }
}

impl Clock for FixedClock {
    fn now_ms(&self) -> i64 {
        self.now_ms.load(Ordering::SeqCst)
    }

    fn today(&self) -> Weekday {
        *self.today.lock()
    }
}

/// Keeps registered alarms in a map, like a real alarm service.
pub struct FakeHost {
    pub exact: AtomicBool,
    pub alarms: Mutex<BTreeMap<TriggerId, AlarmRequest>>,
    pub cancels: Mutex<Vec<TriggerId>>,
}

impl FakeHost {
    pub fn new() -> Self {
        Self {
            exact: AtomicBool::new(true),
            alarms: Mutex::new(BTreeMap::new()),
            cancels: Mutex::new(Vec::new()),
        }
    }

    pub fn get(&self, id: TriggerId) -> Option<AlarmRequest> {
        self.alarms.lock().get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.alarms.lock().len()
    }
}

impl AlarmHost for FakeHost {
    fn can_schedule_exact(&self) -> bool {
        self.exact.load(Ordering::SeqCst)
    }

    fn set_alarm(&self, request: AlarmRequest) {
        self.alarms.lock().insert(request.id, request);
    }

    fn cancel_alarm(&self, id: TriggerId) {
        self.alarms.lock().remove(&id);
        self.cancels.lock().push(id);
    }
}

#[derive(Default)]
pub struct MemoryStore {
    macros: Mutex<BTreeMap<String, (Macro, Vec<TouchEvent>)>>,
    pub broken: AtomicBool,
}

impl MemoryStore {
    pub fn with(macros: impl IntoIterator<Item = Macro>) -> Self {
        let store = Self::default();
        for m in macros {
            store.macros.lock().insert(m.id.clone(), (m, Vec::new()));
        }
        store
    }

    fn check(&self) -> Result<()> {
        if self.broken.load(Ordering::SeqCst) {
            Err(Error::storage("read", "disk unplugged"))
        } else {
            Ok(())
        }
    }
}

impl MacroStore for MemoryStore {
    fn list_macros(&self) -> Result<Vec<Macro>> {
        self.check()?;
        let mut all: Vec<Macro> = self.macros.lock().values().map(|(m, _)| m.clone()).collect();
        all.sort_by(|a, b| b.created_at_ms.cmp(&a.created_at_ms));
        Ok(all)
    }

    fn get_macro(&self, id: &str) -> Result<Macro> {
        self.check()?;
        self.macros
            .lock()
            .get(id)
            .map(|(m, _)| m.clone())
            .ok_or_else(|| Error::macro_not_found(id))
    }

    fn load_events(&self, id: &str) -> Result<Vec<TouchEvent>> {
        self.check()?;
        self.macros
            .lock()
            .get(id)
            .map(|(_, e)| e.clone())
            .ok_or_else(|| Error::macro_not_found(id))
    }

    fn save_macro(&self, macro_: &Macro, events: &[TouchEvent]) -> Result<()> {
        self.macros
            .lock()
            .insert(macro_.id.clone(), (macro_.clone(), events.to_vec()));
        Ok(())
    }

    fn update_macro(&self, macro_: &Macro) -> Result<()> {
        let mut macros = self.macros.lock();
        let entry = macros
            .get_mut(&macro_.id)
            .ok_or_else(|| Error::macro_not_found(&macro_.id))?;
        entry.0 = macro_.clone();
        Ok(())
    }

    fn delete_macro(&self, id: &str) -> Result<()> {
        self.macros
            .lock()
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| Error::macro_not_found(id))
    }
}

#[derive(Default)]
pub struct RecordingLauncher {
    pub launched: Mutex<Vec<String>>,
    pub fail: AtomicBool,
}

impl PlaybackLauncher for RecordingLauncher {
    fn launch(&self, macro_id: &str) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::capability_unavailable());
        }
        self.launched.lock().push(macro_id.to_string());
        Ok(())
    }
}
