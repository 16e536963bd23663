//! API handlers for the pill service

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use tracing::{info, warn};

use crate::api::models::*;
use crate::domain::{AlarmId, Medication, MedicationId, NewMedication, TimeOfDay, User};
use crate::error::{PillError, Result};
use crate::AppState;

const DEFAULT_PILLS_LEFT: u32 = 30;
const DEFAULT_PILLS_PER_DOSE: u32 = 1;

/// Health check endpoint
pub async fn health_check() -> &'static str {
    HEALTH_OK
}

fn required(field: Option<String>, name: &str) -> Result<String> {
    match field.map(|v| v.trim().to_string()) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(PillError::invalid_input(format!("missing {}", name))),
    }
}

/// Resolve a user and one of their medications by name
async fn resolve_user_med(
    state: &AppState,
    user_name: &str,
    med_name: &str,
) -> Result<(User, Medication)> {
    let user = state
        .store
        .find_user_by_name(user_name)
        .await?
        .ok_or_else(|| PillError::not_found("user or medication"))?;
    let med = state
        .store
        .find_medication(user.id, med_name)
        .await?
        .ok_or_else(|| PillError::not_found("user or medication"))?;
    Ok((user, med))
}

// ---- users ----

pub async fn create_user(
    State(state): State<AppState>,
    Json(request): Json<CreateUserRequest>,
) -> Result<Json<User>> {
    let name = required(request.name, "name")?;
    let user = state.store.upsert_user(&name).await?;
    Ok(Json(user))
}

pub async fn list_users(State(state): State<AppState>) -> Result<Json<Vec<User>>> {
    Ok(Json(state.store.list_users().await?))
}

// ---- medications ----

/// Create a medication and bind it to the first free slot
pub async fn create_medication(
    State(state): State<AppState>,
    Json(request): Json<CreateMedicationRequest>,
) -> Result<Json<CreateMedicationResponse>> {
    let user_name = required(request.user_name, "userName")?;
    let name = required(request.name, "name")?;
    let pills_per_dose = request.pills_per_dose.unwrap_or(DEFAULT_PILLS_PER_DOSE);
    if pills_per_dose == 0 {
        return Err(PillError::invalid_input("pills_per_dose must be at least 1"));
    }

    let user = state
        .store
        .find_user_by_name(&user_name)
        .await?
        .ok_or_else(|| PillError::not_found("user"))?;

    let med = state
        .slots
        .register(&NewMedication {
            user_id: user.id,
            name,
            frequency_per_day: request.frequency_per_day.unwrap_or(1),
            pills_left: request.pills_left.unwrap_or(DEFAULT_PILLS_LEFT),
            pills_per_dose,
        })
        .await?;

    let slot = med
        .slot
        .map(|s| s.number())
        .ok_or_else(|| PillError::invalid_input("medication was not given a slot"))?;

    Ok(Json(CreateMedicationResponse {
        status: "Medication added",
        id: med.id,
        slot,
    }))
}

/// Medications of one user; unknown or missing user gives an empty list
pub async fn list_medications(
    State(state): State<AppState>,
    Query(query): Query<UserQuery>,
) -> Result<Json<Vec<MedicationResponse>>> {
    let Some(user_name) = query.user_name else {
        return Ok(Json(Vec::new()));
    };
    let Some(user) = state.store.find_user_by_name(&user_name).await? else {
        return Ok(Json(Vec::new()));
    };

    let meds = state.store.list_medications(user.id).await?;
    Ok(Json(meds.into_iter().map(MedicationResponse::from).collect()))
}

pub async fn delete_medication(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<DeleteMedicationResponse>> {
    let freed = state.slots.remove_medication(MedicationId(id)).await?;
    Ok(Json(DeleteMedicationResponse {
        status: "Medication deleted",
        freed_slot: freed.map(|s| s.number()),
    }))
}

// ---- slots ----

pub async fn get_slots(State(state): State<AppState>) -> Result<Json<Vec<SlotInfo>>> {
    let states = state.slots.slot_states().await;

    let mut slots = Vec::with_capacity(states.len());
    for (slot_activity, occupant) in states {
        let slot = slot_activity.slot;
        let medication = match occupant {
            None => None,
            Some(med_id) => Some(match state.store.get_medication(med_id).await {
                Ok(med) => SlotMedication {
                    id: med_id,
                    name: med.name,
                    user_id: Some(med.user_id),
                },
                Err(PillError::NotFound { .. }) => SlotMedication {
                    id: med_id,
                    name: "Unknown".to_string(),
                    user_id: None,
                },
                Err(e) => return Err(e),
            }),
        };

        slots.push(SlotInfo {
            slot: slot.number(),
            status: if medication.is_some() { "occupied" } else { "empty" },
            active: slot_activity.active,
            medication,
        });
    }

    Ok(Json(slots))
}

pub async fn get_alarm_state(State(state): State<AppState>) -> Json<Vec<SlotStateResponse>> {
    Json(
        state
            .alarms
            .snapshot()
            .into_iter()
            .map(SlotStateResponse::from)
            .collect(),
    )
}

// ---- alarms ----

pub async fn create_alarm(
    State(state): State<AppState>,
    Json(request): Json<CreateAlarmRequest>,
) -> Result<(StatusCode, Json<CreateAlarmResponse>)> {
    let (Some(user_name), Some(med_name), Some(time)) =
        (request.user_name, request.med_name, request.time)
    else {
        return Err(PillError::invalid_input("Missing userName, medName, or time"));
    };

    let time: TimeOfDay = time
        .parse()
        .map_err(|_| PillError::invalid_input(format!("time must be HH:MM, got '{}'", time)))?;

    let (user, med) = resolve_user_med(&state, &user_name, &med_name).await?;
    let alarm = state.store.insert_alarm(user.id, med.id, time).await?;

    if med.slot.is_none() {
        warn!(
            "Alarm {} created for medication {} which holds no slot",
            alarm.id, med.id
        );
    }
    info!("Alarm {} added: {} at {}", alarm.id, med.name, time);

    Ok((
        StatusCode::CREATED,
        Json(CreateAlarmResponse {
            status: "Alarm added",
            id: alarm.id,
        }),
    ))
}

pub async fn list_alarms(State(state): State<AppState>) -> Result<Json<Vec<AlarmResponse>>> {
    let alarms = state.store.list_alarms().await?;
    Ok(Json(alarms.into_iter().map(AlarmResponse::from).collect()))
}

pub async fn delete_alarm(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<DeleteAlarmResponse>> {
    let removed = state.store.delete_alarm(AlarmId(id)).await?;
    Ok(Json(DeleteAlarmResponse {
        status: "Alarm deleted",
        removed,
    }))
}

// ---- doses ----

/// Manual dose confirmation
///
/// Acknowledges the medication's slot when it is ringing, otherwise logs an
/// unscheduled dose.
pub async fn take_pill(
    State(state): State<AppState>,
    Json(request): Json<TakePillRequest>,
) -> Result<Json<TakePillResponse>> {
    let user_name = required(request.user_name, "userName")?;
    let med_name = required(request.med_name, "medName")?;

    let (user, med) = resolve_user_med(&state, &user_name, &med_name).await?;
    let slot = state.slots.lookup(med.id).await;

    let event = state
        .alarms
        .record_manual_dose(slot, user.id, med.id)
        .await?;

    Ok(Json(TakePillResponse {
        status: "Pill logged",
        taken_at: event.taken_at.to_rfc3339(),
    }))
}

/// Dose history of one user, newest first
pub async fn pill_logs(
    State(state): State<AppState>,
    Query(query): Query<UserQuery>,
) -> Result<Json<Vec<PillLogEntry>>> {
    let Some(user_name) = query.user_name else {
        return Ok(Json(Vec::new()));
    };
    let Some(user) = state.store.find_user_by_name(&user_name).await? else {
        return Ok(Json(Vec::new()));
    };

    let events = state.store.list_pill_events(user.id).await?;
    Ok(Json(events.into_iter().map(PillLogEntry::from).collect()))
}
