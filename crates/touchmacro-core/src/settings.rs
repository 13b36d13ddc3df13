//! Per-macro playback and scheduling settings

use chrono::Weekday;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::config::PlaybackConfig;

/// `repeat_count` value meaning "loop until stopped".
pub const REPEAT_FOREVER: i32 = -1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlaybackSettings {
    /// Number of runs, or [`REPEAT_FOREVER`]. Never 0 once normalized.
    pub repeat_count: i32,
    /// Speed multiplier, 2.0 halves every delay
    pub speed: f32,
    pub pause_between_runs_ms: u64,
    /// Absolute epoch millis for a one-time start
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduled_time_ms: Option<i64>,
    /// Recurring trigger period
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interval_minutes: Option<u32>,
    /// Days a recurring trigger actually plays. Empty means every day.
    pub selected_days: DaySet,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            repeat_count: 1,
            speed: 1.0,
            pause_between_runs_ms: 0,
            scheduled_time_ms: None,
            interval_minutes: None,
            selected_days: DaySet::EVERY_DAY,
        }
    }
}

impl PlaybackSettings {
    /// Bring out-of-range values back into the supported domain.
    pub fn normalized(&self, config: &PlaybackConfig) -> Self {
        let repeat_count = match self.repeat_count {
            0 => 1,
            n if n < REPEAT_FOREVER => REPEAT_FOREVER,
            n => n,
        };
        let speed = if self.speed.is_finite() {
            self.speed.clamp(config.min_speed, config.max_speed)
        } else {
            1.0
        };
        Self {
            repeat_count,
            speed,
            interval_minutes: self.interval_minutes.filter(|m| *m > 0),
            ..self.clone()
        }
    }

    /// `None` when the macro loops until stopped.
    pub fn total_runs(&self) -> Option<u32> {
        if self.repeat_count == REPEAT_FOREVER {
            None
        } else {
            Some(self.repeat_count.max(1) as u32)
        }
    }

    pub fn is_recurring(&self) -> bool {
        self.interval_minutes.is_some_and(|m| m > 0)
    }
}

/// Day number in host calendar order: Sunday = 1 ... Saturday = 7.
pub fn day_number(day: Weekday) -> u8 {
    day.num_days_from_sunday() as u8 + 1
}

pub fn weekday_from_number(n: u8) -> Option<Weekday> {
    match n {
        1 => Some(Weekday::Sun),
        2 => Some(Weekday::Mon),
        3 => Some(Weekday::Tue),
        4 => Some(Weekday::Wed),
        5 => Some(Weekday::Thu),
        6 => Some(Weekday::Fri),
        7 => Some(Weekday::Sat),
        _ => None,
    }
}

/// Set of weekdays packed into a bitmask (bit 0 = Sunday).
///
/// Serialized as a sorted list of day numbers so stored settings stay
/// readable: `[2, 4, 6]` is Monday, Wednesday, Friday.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct DaySet(u8);

impl DaySet {
    /// Empty set, which the day filter treats as "every day".
    pub const EVERY_DAY: DaySet = DaySet(0);
    pub const ALL: DaySet = DaySet(0x7f);

    pub fn from_days(days: impl IntoIterator<Item = Weekday>) -> Self {
        days.into_iter().fold(Self::EVERY_DAY, |set, d| set.with(d))
    }

    /// Build from day numbers, rejecting anything outside 1..=7.
    pub fn from_numbers(numbers: &[u8]) -> Result<Self, u8> {
        let mut set = Self::EVERY_DAY;
        for &n in numbers {
            set = set.with(weekday_from_number(n).ok_or(n)?);
        }
        Ok(set)
    }

    pub fn with(self, day: Weekday) -> Self {
        Self(self.0 | 1 << day.num_days_from_sunday())
    }

    pub fn without(self, day: Weekday) -> Self {
        Self(self.0 & !(1 << day.num_days_from_sunday()))
    }

    pub fn contains(&self, day: Weekday) -> bool {
        self.0 & (1 << day.num_days_from_sunday()) != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    /// Whether a trigger filtered by this set should play on `day`.
    pub fn is_active_on(&self, day: Weekday) -> bool {
        self.is_empty() || self.contains(day)
    }

    pub fn numbers(&self) -> Vec<u8> {
        (1..=7u8)
            .filter(|&n| weekday_from_number(n).is_some_and(|d| self.contains(d)))
            .collect()
    }
}

impl Serialize for DaySet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.numbers().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for DaySet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let numbers = Vec::<u8>::deserialize(deserializer)?;
        DaySet::from_numbers(&numbers).map_err(|n| {
            serde::de::Error::custom(format!("day number {} is outside 1..=7", n))
        })
    }
}
