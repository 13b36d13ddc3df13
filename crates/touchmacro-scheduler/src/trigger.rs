//! Stable trigger identifiers and fired-trigger payloads
//!
//! Every macro owns two trigger slots, derived from its id alone so the
//! mapping survives restarts and re-registration replaces instead of
//! duplicating:
//!
//! | kind     | bit 28 | bits 0..28                      |
//! |----------|--------|---------------------------------|
//! | once     | 0      | SHA-256(id)[0..4] big-endian    |
//! | interval | 1      | same                            |

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

use touchmacro_core::DaySet;

/// Low 28 bits carry the hashed macro id.
pub const BASE_MASK: u32 = 0x0FFF_FFFF;
/// Set for recurring triggers, clear for one-time triggers.
pub const INTERVAL_BIT: u32 = 0x1000_0000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TriggerKind {
    Once,
    Interval,
}

/// Host-facing trigger identifier. Always non-negative as an `i32`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TriggerId(u32);

impl TriggerId {
    pub fn new(macro_id: &str, kind: TriggerKind) -> Self {
        match kind {
            TriggerKind::Once => once_id(macro_id),
            TriggerKind::Interval => interval_id(macro_id),
        }
    }

    pub fn value(self) -> u32 {
        self.0
    }

    pub fn kind(self) -> TriggerKind {
        if self.0 & INTERVAL_BIT != 0 {
            TriggerKind::Interval
        } else {
            TriggerKind::Once
        }
    }
}

impl fmt::Display for TriggerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

/// 28-bit hash of a macro id, shared by both of its triggers.
pub fn trigger_base(macro_id: &str) -> u32 {
    let digest = Sha256::digest(macro_id.as_bytes());
    u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]) & BASE_MASK
}

pub fn once_id(macro_id: &str) -> TriggerId {
    TriggerId(trigger_base(macro_id) & !INTERVAL_BIT)
}

pub fn interval_id(macro_id: &str) -> TriggerId {
    TriggerId(trigger_base(macro_id) | INTERVAL_BIT)
}

/// What a trigger carries back when it fires: the settings in effect when
/// it was registered, so firing never depends on storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerPayload {
    pub macro_id: String,
    /// `None` for a one-time trigger
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval_minutes: Option<u32>,
    #[serde(default)]
    pub selected_days: DaySet,
}

impl TriggerPayload {
    pub fn once(macro_id: impl Into<String>) -> Self {
        Self {
            macro_id: macro_id.into(),
            interval_minutes: None,
            selected_days: DaySet::EVERY_DAY,
        }
    }

    pub fn interval(macro_id: impl Into<String>, minutes: u32, days: DaySet) -> Self {
        Self {
            macro_id: macro_id.into(),
            interval_minutes: Some(minutes),
            selected_days: days,
        }
    }

    pub fn is_recurring(&self) -> bool {
        self.interval_minutes.is_some_and(|m| m > 0)
    }
}
