//! Core domain types shared by the store, the slot machinery and the API

use chrono::{DateTime, NaiveTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Number of physical slots on the device
pub const SLOT_COUNT: usize = 5;

/// Physical slot position, 0-based internally
///
/// Users see slots numbered 1..=5.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotIndex(u8);

impl SlotIndex {
    pub fn new(index: u8) -> Option<Self> {
        ((index as usize) < SLOT_COUNT).then_some(Self(index))
    }

    /// Parse a user-facing 1-based slot number
    pub fn from_number(number: u8) -> Option<Self> {
        number.checked_sub(1).and_then(Self::new)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// 1-based number shown to users
    pub fn number(self) -> u8 {
        self.0 + 1
    }

    pub fn all() -> impl Iterator<Item = SlotIndex> {
        (0..SLOT_COUNT as u8).map(SlotIndex)
    }
}

impl fmt::Display for SlotIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.number())
    }
}

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_type!(UserId);
id_type!(MedicationId);
id_type!(AlarmId);
id_type!(PillEventId);

/// Minute-resolution time of day, written as `HH:MM`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimeOfDay(NaiveTime);

impl TimeOfDay {
    pub fn new(hour: u32, minute: u32) -> Option<Self> {
        NaiveTime::from_hms_opt(hour, minute, 0).map(Self)
    }

    /// Truncate a clock reading to its minute
    pub fn from_time(time: NaiveTime) -> Self {
        Self(NaiveTime::from_hms_opt(time.hour(), time.minute(), 0).unwrap_or(time))
    }

    pub fn as_time(&self) -> NaiveTime {
        self.0
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%H:%M"))
    }
}

impl FromStr for TimeOfDay {
    type Err = chrono::ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        // Browsers may submit seconds with <input type="time">
        NaiveTime::parse_from_str(s, "%H:%M")
            .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
            .map(Self::from_time)
    }
}

impl Serialize for TimeOfDay {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TimeOfDay {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Medication {
    pub id: MedicationId,
    pub user_id: UserId,
    pub name: String,
    pub frequency_per_day: u32,
    pub pills_left: u32,
    pub pills_per_dose: u32,
    pub slot: Option<SlotIndex>,
}

/// Medication about to be registered
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMedication {
    pub user_id: UserId,
    pub name: String,
    pub frequency_per_day: u32,
    pub pills_left: u32,
    pub pills_per_dose: u32,
}

/// Schedule entry: ring `med_id`'s slot every day at `time`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alarm {
    pub id: AlarmId,
    pub user_id: UserId,
    pub med_id: MedicationId,
    pub time: TimeOfDay,
}

/// Confirmed dose
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PillEvent {
    pub id: PillEventId,
    pub user_id: UserId,
    pub med_id: MedicationId,
    /// Medication name at the time of the dose, kept after the medication is deleted
    pub med_name: String,
    pub taken_at: DateTime<Utc>,
}

/// Who an active slot is ringing for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AlarmContext {
    pub user_id: UserId,
    pub med_id: MedicationId,
}

/// Run-time state of one slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotActivity {
    pub slot: SlotIndex,
    pub active: bool,
    pub context: Option<AlarmContext>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_index_bounds() {
        assert!(SlotIndex::new(4).is_some());
        assert!(SlotIndex::new(5).is_none());
        assert!(SlotIndex::from_number(0).is_none());
        assert_eq!(SlotIndex::from_number(1), SlotIndex::new(0));
        assert_eq!(SlotIndex::new(2).unwrap().number(), 3);
        assert_eq!(SlotIndex::all().count(), SLOT_COUNT);
    }

    #[test]
    fn test_time_of_day_parsing() {
        let t: TimeOfDay = "08:30".parse().unwrap();
        assert_eq!(t.to_string(), "08:30");

        let t: TimeOfDay = "21:05:59".parse().unwrap();
        assert_eq!(t, TimeOfDay::new(21, 5).unwrap());

        assert!("25:00".parse::<TimeOfDay>().is_err());
        assert!("noon".parse::<TimeOfDay>().is_err());
    }

    #[test]
    fn test_time_of_day_truncates_seconds() {
        let now = NaiveTime::from_hms_opt(7, 15, 42).unwrap();
        assert_eq!(TimeOfDay::from_time(now), TimeOfDay::new(7, 15).unwrap());
    }

    #[test]
    fn test_time_of_day_serde() {
        let t = TimeOfDay::new(9, 0).unwrap();
        assert_eq!(serde_json::to_string(&t).unwrap(), "\"09:00\"");
        let back: TimeOfDay = serde_json::from_str("\"09:00\"").unwrap();
        assert_eq!(back, t);
    }
}
