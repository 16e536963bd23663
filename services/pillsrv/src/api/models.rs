//! API request and response models
//!
//! Field names follow the existing web UI (`userName`, `frequencyPerDay`,
//! `medName`). Slot numbers are 1-based.

use serde::{Deserialize, Serialize};

use crate::domain::{Alarm, AlarmId, Medication, MedicationId, PillEvent, SlotActivity, UserId};

/// Health check endpoint response
pub const HEALTH_OK: &str = "OK";

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub name: Option<String>,
}

/// `?userName=` filter
#[derive(Debug, Deserialize)]
pub struct UserQuery {
    #[serde(rename = "userName")]
    pub user_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateMedicationRequest {
    #[serde(rename = "userName")]
    pub user_name: Option<String>,
    pub name: Option<String>,
    #[serde(rename = "frequencyPerDay")]
    pub frequency_per_day: Option<u32>,
    pub pills_left: Option<u32>,
    pub pills_per_dose: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MedicationResponse {
    pub id: MedicationId,
    pub user_id: UserId,
    pub name: String,
    #[serde(rename = "frequencyPerDay")]
    pub frequency_per_day: u32,
    pub pills_left: u32,
    pub pills_per_dose: u32,
    pub slot: Option<u8>,
}

impl From<Medication> for MedicationResponse {
    fn from(med: Medication) -> Self {
        Self {
            id: med.id,
            user_id: med.user_id,
            name: med.name,
            frequency_per_day: med.frequency_per_day,
            pills_left: med.pills_left,
            pills_per_dose: med.pills_per_dose,
            slot: med.slot.map(|s| s.number()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CreateMedicationResponse {
    pub status: &'static str,
    pub id: MedicationId,
    pub slot: u8,
}

#[derive(Debug, Serialize)]
pub struct DeleteMedicationResponse {
    pub status: &'static str,
    pub freed_slot: Option<u8>,
}

#[derive(Debug, Serialize)]
pub struct SlotMedication {
    pub id: MedicationId,
    pub name: String,
    pub user_id: Option<UserId>,
}

#[derive(Debug, Serialize)]
pub struct SlotInfo {
    pub slot: u8,
    /// "empty" or "occupied"
    pub status: &'static str,
    pub active: bool,
    pub medication: Option<SlotMedication>,
}

#[derive(Debug, Deserialize)]
pub struct CreateAlarmRequest {
    #[serde(rename = "userName")]
    pub user_name: Option<String>,
    #[serde(rename = "medName")]
    pub med_name: Option<String>,
    pub time: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CreateAlarmResponse {
    pub status: &'static str,
    pub id: AlarmId,
}

#[derive(Debug, Serialize)]
pub struct AlarmResponse {
    pub id: AlarmId,
    pub user_id: UserId,
    pub med_id: MedicationId,
    pub time: String,
}

impl From<Alarm> for AlarmResponse {
    fn from(alarm: Alarm) -> Self {
        Self {
            id: alarm.id,
            user_id: alarm.user_id,
            med_id: alarm.med_id,
            time: alarm.time.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DeleteAlarmResponse {
    pub status: &'static str,
    pub removed: u64,
}

#[derive(Debug, Deserialize)]
pub struct TakePillRequest {
    #[serde(rename = "userName")]
    pub user_name: Option<String>,
    #[serde(rename = "medName")]
    pub med_name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TakePillResponse {
    pub status: &'static str,
    pub taken_at: String,
}

#[derive(Debug, Serialize)]
pub struct PillLogEntry {
    pub taken_at: String,
    pub name: String,
}

impl From<PillEvent> for PillLogEntry {
    fn from(event: PillEvent) -> Self {
        Self {
            taken_at: event.taken_at.to_rfc3339(),
            name: event.med_name,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SlotStateResponse {
    pub slot: u8,
    pub active: bool,
    pub user_id: Option<UserId>,
    pub med_id: Option<MedicationId>,
}

impl From<SlotActivity> for SlotStateResponse {
    fn from(activity: SlotActivity) -> Self {
        Self {
            slot: activity.slot.number(),
            active: activity.active,
            user_id: activity.context.map(|c| c.user_id),
            med_id: activity.context.map(|c| c.med_id),
        }
    }
}
