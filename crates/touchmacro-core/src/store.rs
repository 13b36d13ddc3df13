//! Persistence collaborator for macro metadata and event logs

use crate::error::Result;
use crate::model::{Macro, TouchEvent};

pub trait MacroStore: Send + Sync {
    /// All macros, newest first.
    fn list_macros(&self) -> Result<Vec<Macro>>;

    fn get_macro(&self, id: &str) -> Result<Macro>;

    /// Recorded events for a macro. Empty when the macro has none stored.
    fn load_events(&self, id: &str) -> Result<Vec<TouchEvent>>;

    fn save_macro(&self, macro_: &Macro, events: &[TouchEvent]) -> Result<()>;

    /// Rewrite metadata only; the event log is left alone.
    fn update_macro(&self, macro_: &Macro) -> Result<()>;

    fn delete_macro(&self, id: &str) -> Result<()>;

    /// Macros that still need a trigger: a future one-time start or a
    /// positive interval. Used for boot recovery.
    fn scheduled_macros(&self, now_ms: i64) -> Result<Vec<Macro>> {
        Ok(self
            .list_macros()?
            .into_iter()
            .filter(|m| m.has_pending_schedule(now_ms))
            .collect())
    }
}
