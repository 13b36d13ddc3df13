//! touchmacro-recorder - touch stroke recording and timed replay
//!
//! Capture raw pointer samples into a session, group them into strokes,
//! pass strokes through to the app while capturing, and drive cancellable
//! replay against an input-synthesis capability.
//!
//! ## Flow
//!
//! ```text
//! TouchRecorder -> events -> build_strokes -> PlaybackEngine
//!        \-> LiveRedispatcher (during capture)
//! ```

pub mod exchange;
pub mod recorder;
pub mod redispatch;
pub mod replay;
pub mod storage;
pub mod strokes;

pub use exchange::BundleError;
pub use recorder::{RecordingResult, TouchRecorder};
pub use redispatch::LiveRedispatcher;
pub use replay::PlaybackEngine;
pub use storage::MacroStorage;
pub use strokes::build_strokes;

pub mod prelude {
    pub use crate::exchange;
    pub use crate::recorder::{RecordingResult, TouchRecorder};
    pub use crate::redispatch::LiveRedispatcher;
    pub use crate::replay::PlaybackEngine;
    pub use crate::storage::MacroStorage;
    pub use crate::strokes::build_strokes;
}
