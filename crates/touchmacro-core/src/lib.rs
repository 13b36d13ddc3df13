//! touchmacro-core - data model and collaborator traits for touch macros
//!
//! Everything the recorder, the playback engine and the scheduler share:
//! touch events, strokes, playback settings, the execution state, structured
//! errors, configuration, and the traits behind which the host lives
//! (input synthesis, persistence, wall clock).

pub mod capability;
pub mod clock;
pub mod config;
pub mod error;
pub mod model;
pub mod settings;
pub mod state;
pub mod store;

pub use capability::{GestureCallback, GestureOutcome, InputCapability, NoCapability};
pub use clock::{Clock, SystemClock};
pub use config::{Config, ConfigError, PlaybackConfig, RecorderConfig, SchedulerConfig};
pub use error::{Error, ErrorCode, Result};
pub use model::{Gesture, Macro, Point, Stroke, TouchAction, TouchEvent};
pub use settings::{day_number, weekday_from_number, DaySet, PlaybackSettings, REPEAT_FOREVER};
pub use state::ExecutionState;
pub use store::MacroStore;

pub mod prelude {
    pub use crate::capability::{GestureOutcome, InputCapability};
    pub use crate::clock::{Clock, SystemClock};
    pub use crate::config::Config;
    pub use crate::error::{Error, ErrorCode, Result};
    pub use crate::model::{Gesture, Macro, Point, Stroke, TouchAction, TouchEvent};
    pub use crate::settings::{DaySet, PlaybackSettings};
    pub use crate::state::ExecutionState;
    pub use crate::store::MacroStore;
}
