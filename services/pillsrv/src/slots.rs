//! Slot Assigner
//!
//! Partial injective mapping from the five physical slots to medications.
//! First free slot by ascending index; the mapping is persisted on the
//! medication row and reloaded at startup.
//!
//! Lock order: this table's mutex first, then the alarm controller's.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::alarm_state::AlarmController;
use crate::domain::{
    Alarm, Medication, MedicationId, NewMedication, SlotActivity, SlotIndex, UserId, SLOT_COUNT,
};
use crate::error::{PillError, Result};
use crate::storage::EntityStore;

type Occupancy = [Option<MedicationId>; SLOT_COUNT];

/// Result of asking a scheduled alarm to ring
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
    Triggered(SlotIndex),
    AlreadyActive(SlotIndex),
    /// Medication holds no slot
    Unassigned,
}

pub struct SlotAssigner {
    occupancy: Mutex<Occupancy>,
    store: EntityStore,
    alarms: Arc<AlarmController>,
}

fn position(occupancy: &Occupancy, med_id: MedicationId) -> Option<SlotIndex> {
    occupancy
        .iter()
        .position(|o| *o == Some(med_id))
        .and_then(|i| SlotIndex::new(i as u8))
}

fn first_free(occupancy: &Occupancy) -> Option<SlotIndex> {
    SlotIndex::all().find(|s| occupancy[s.index()].is_none())
}

impl SlotAssigner {
    /// Build from the persisted assignments
    pub async fn load(store: EntityStore, alarms: Arc<AlarmController>) -> Result<Self> {
        let mut occupancy: Occupancy = [None; SLOT_COUNT];
        for (slot, med_id) in store.occupied_slots().await? {
            occupancy[slot.index()] = Some(med_id);
        }

        let used = occupancy.iter().filter(|o| o.is_some()).count();
        info!("Slot table loaded: {}/{} slots occupied", used, SLOT_COUNT);

        Ok(Self {
            occupancy: Mutex::new(occupancy),
            store,
            alarms,
        })
    }

    /// Bind an existing medication to the lowest free slot
    ///
    /// A medication that already holds a slot keeps it. On `CapacityExceeded`
    /// nothing is changed.
    pub async fn assign(&self, med_id: MedicationId) -> Result<SlotIndex> {
        let mut occupancy = self.occupancy.lock().await;

        if let Some(slot) = position(&occupancy, med_id) {
            return Ok(slot);
        }

        let slot = first_free(&occupancy).ok_or(PillError::CapacityExceeded {
            capacity: SLOT_COUNT,
        })?;

        self.store.set_medication_slot(med_id, Some(slot)).await?;
        occupancy[slot.index()] = Some(med_id);

        info!("Medication {} assigned to slot {}", med_id, slot);
        Ok(slot)
    }

    /// Create a medication already bound to a slot
    ///
    /// Capacity is checked before the insert, so a full device leaves no
    /// orphan row behind.
    pub async fn register(&self, med: &NewMedication) -> Result<Medication> {
        let mut occupancy = self.occupancy.lock().await;

        let slot = first_free(&occupancy).ok_or(PillError::CapacityExceeded {
            capacity: SLOT_COUNT,
        })?;

        let created = self.store.insert_medication(med, Some(slot)).await?;
        occupancy[slot.index()] = Some(created.id);

        info!(
            "Medication '{}' ({}) registered in slot {}",
            created.name, created.id, slot
        );
        Ok(created)
    }

    /// Release the slot held by `med_id`, clearing any alarm ringing on it
    ///
    /// Idempotent: `Ok(None)` if the medication held no slot.
    pub async fn free(&self, med_id: MedicationId) -> Result<Option<SlotIndex>> {
        let mut occupancy = self.occupancy.lock().await;

        let Some(slot) = position(&occupancy, med_id) else {
            debug!("Medication {} holds no slot, nothing to free", med_id);
            return Ok(None);
        };

        self.alarms.force_clear(slot).await;
        self.store.set_medication_slot(med_id, None).await?;
        occupancy[slot.index()] = None;

        info!("Slot {} freed (medication {})", slot, med_id);
        Ok(Some(slot))
    }

    /// Delete a medication, freeing its slot first
    ///
    /// Returns the slot it held, if any.
    pub async fn remove_medication(&self, med_id: MedicationId) -> Result<Option<SlotIndex>> {
        let mut occupancy = self.occupancy.lock().await;

        let slot = position(&occupancy, med_id);
        if let Some(slot) = slot {
            self.alarms.force_clear(slot).await;
        }

        self.store.delete_medication(med_id).await?;

        if let Some(slot) = slot {
            occupancy[slot.index()] = None;
            info!("Medication {} deleted, slot {} freed", med_id, slot);
        } else {
            info!("Medication {} deleted", med_id);
        }
        Ok(slot)
    }

    pub async fn lookup(&self, med_id: MedicationId) -> Option<SlotIndex> {
        position(&*self.occupancy.lock().await, med_id)
    }

    pub async fn occupant(&self, slot: SlotIndex) -> Option<MedicationId> {
        self.occupancy.lock().await[slot.index()]
    }

    /// Occupant of every slot, by index
    pub async fn snapshot(&self) -> [Option<MedicationId>; SLOT_COUNT] {
        *self.occupancy.lock().await
    }

    /// Ring the slot held by `med_id`
    ///
    /// Resolution and trigger happen under the slot lock, so a concurrent
    /// `free` cannot leave an unoccupied slot active, and a medication with
    /// no slot never lights anything.
    pub async fn ring(&self, user_id: UserId, med_id: MedicationId) -> TriggerOutcome {
        let occupancy = self.occupancy.lock().await;

        let Some(slot) = position(&occupancy, med_id) else {
            return TriggerOutcome::Unassigned;
        };

        if self.alarms.trigger(slot, user_id, med_id).await {
            TriggerOutcome::Triggered(slot)
        } else {
            TriggerOutcome::AlreadyActive(slot)
        }
    }

    /// Ring the slot of a due alarm
    pub async fn trigger_scheduled(&self, alarm: &Alarm) -> TriggerOutcome {
        self.ring(alarm.user_id, alarm.med_id).await
    }

    /// Occupancy and alarm activity read together under the slot lock
    pub async fn slot_states(&self) -> Vec<(SlotActivity, Option<MedicationId>)> {
        let occupancy = self.occupancy.lock().await;
        self.alarms
            .snapshot()
            .into_iter()
            .map(|activity| {
                let occupant = occupancy[activity.slot.index()];
                (activity, occupant)
            })
            .collect()
    }
}
