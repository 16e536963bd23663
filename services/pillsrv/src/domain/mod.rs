//! Domain model

pub mod types;

pub use types::{
    Alarm, AlarmContext, AlarmId, Medication, MedicationId, NewMedication, PillEvent, PillEventId,
    SlotActivity, SlotIndex, TimeOfDay, User, UserId, SLOT_COUNT,
};
