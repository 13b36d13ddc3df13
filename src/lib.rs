//! touchmacro - record multi-touch gestures and replay them later
//!
//! Facade over the workspace crates:
//!
//! - [`model`]: data model, settings, execution state, errors, config and
//!   the host traits (input synthesis, storage, clock)
//! - [`recorder`]: capture sessions, stroke building, live redispatch,
//!   the playback engine, JSON-lines storage and exchange bundles
//! - [`scheduler`]: stable trigger ids, one-time and recurring triggers,
//!   trigger handling and boot recovery
//!
//! ```rust,ignore
//! use touchmacro::prelude::*;
//!
//! let engine = PlaybackEngine::new(capability, PlaybackConfig::default());
//! let mut states = engine.subscribe();
//! engine.execute_events(&events, &macro_.settings);
//! while let Ok(state) = states.recv().await {
//!     println!("{state}");
//!     if state.is_terminal() { break; }
//! }
//! ```

pub use touchmacro_core as model;
pub use touchmacro_recorder as recorder;
pub use touchmacro_scheduler as scheduler;

pub use touchmacro_core::{
    Config, Error, ErrorCode, ExecutionState, InputCapability, Macro, MacroStore,
    PlaybackSettings, Result, TouchAction, TouchEvent,
};
pub use touchmacro_recorder::{exchange, MacroStorage, PlaybackEngine, TouchRecorder};
pub use touchmacro_scheduler::{Scheduler, TriggerHandler};

pub mod prelude {
    pub use touchmacro_core::prelude::*;
    pub use touchmacro_core::{
        GestureCallback, NoCapability, PlaybackConfig, RecorderConfig, SchedulerConfig,
    };
    pub use touchmacro_recorder::prelude::*;
    pub use touchmacro_scheduler::prelude::*;
}
