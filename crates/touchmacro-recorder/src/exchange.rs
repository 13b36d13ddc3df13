//! Macro exchange bundles
//!
//! A single JSON document carrying one macro and its events:
//!
//! ```json
//! { "version": 1, "macro": { ... }, "events": [ ... ] }
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use touchmacro_core::{Error, Macro, TouchEvent};

pub const BUNDLE_VERSION: u32 = 1;
pub const FILE_EXTENSION: &str = "macro";
pub const MIME_TYPE: &str = "application/x-macro-recorder";

#[derive(Debug, Error)]
pub enum BundleError {
    #[error("malformed bundle: {0}")]
    Malformed(#[source] serde_json::Error),
    #[error("unsupported bundle version {0}")]
    UnsupportedVersion(u32),
    #[error("bundle has no events")]
    Empty,
}

impl From<BundleError> for Error {
    fn from(e: BundleError) -> Self {
        Error::invalid_bundle(e)
    }
}

#[derive(Serialize)]
struct BundleRef<'a> {
    version: u32,
    #[serde(rename = "macro")]
    macro_: &'a Macro,
    events: &'a [TouchEvent],
}

#[derive(Deserialize)]
struct Bundle {
    version: u32,
    #[serde(rename = "macro")]
    macro_: Macro,
    events: Vec<TouchEvent>,
}

/// Pretty-printed bundle for `macro_` and its events.
pub fn to_json(macro_: &Macro, events: &[TouchEvent]) -> Result<String, BundleError> {
    serde_json::to_string_pretty(&BundleRef {
        version: BUNDLE_VERSION,
        macro_,
        events,
    })
    .map_err(BundleError::Malformed)
}

/// Parse a bundle into a macro with a fresh identity.
///
/// The imported macro gets a new UUID and `created_at_ms` of now, so it can
/// sit next to the macro it was exported from.
pub fn parse(json: &str) -> Result<(Macro, Vec<TouchEvent>), BundleError> {
    let bundle: Bundle = serde_json::from_str(json).map_err(BundleError::Malformed)?;
    if bundle.version != BUNDLE_VERSION {
        return Err(BundleError::UnsupportedVersion(bundle.version));
    }
    if bundle.events.is_empty() {
        return Err(BundleError::Empty);
    }

    let mut imported = bundle.macro_;
    imported.id = Uuid::new_v4().to_string();
    imported.created_at_ms = chrono::Utc::now().timestamp_millis();
    imported.event_count = bundle.events.len();
    Ok((imported, bundle.events))
}

/// [`parse`], with any rejection collapsed to `None`.
pub fn import(json: &str) -> Option<(Macro, Vec<TouchEvent>)> {
    parse(json)
        .map_err(|e| debug!(error = %e, "bundle rejected"))
        .ok()
}

/// File name for exporting a macro called `name`.
pub fn suggested_filename(name: &str) -> String {
    let safe: String = name
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | ' ') {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("{}.{}", safe, FILE_EXTENSION)
}
