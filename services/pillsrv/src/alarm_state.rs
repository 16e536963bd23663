//! Alarm State Machine
//!
//! Sole owner of per-slot alarm activity. Every transition runs under one
//! mutex, drives the device, and publishes a fresh snapshot for readers.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{watch, Mutex};
use tracing::{debug, error, info};

use crate::device::DeviceIo;
use crate::domain::{
    AlarmContext, MedicationId, PillEvent, SlotActivity, SlotIndex, UserId, SLOT_COUNT,
};
use crate::error::{DeviceError, PillError, Result};
use crate::storage::EntityStore;

#[derive(Debug, Default)]
struct SlotTable {
    slots: [Option<AlarmContext>; SLOT_COUNT],
    /// Last buzzer level sent to the device
    buzzer_on: bool,
}

impl SlotTable {
    fn any_active(&self) -> bool {
        self.slots.iter().any(Option::is_some)
    }

    fn snapshot(&self) -> Vec<SlotActivity> {
        SlotIndex::all()
            .map(|slot| {
                let context = self.slots[slot.index()];
                SlotActivity {
                    slot,
                    active: context.is_some(),
                    context,
                }
            })
            .collect()
    }
}

/// Coordinates trigger, acknowledge and forced clear for all slots
pub struct AlarmController {
    table: Mutex<SlotTable>,
    device: Arc<dyn DeviceIo>,
    store: EntityStore,
    published: watch::Sender<Vec<SlotActivity>>,
}

impl AlarmController {
    /// Create the controller with every slot inactive and the device quiet
    pub fn new(store: EntityStore, device: Arc<dyn DeviceIo>) -> Self {
        let table = SlotTable::default();
        let (published, _) = watch::channel(table.snapshot());

        match device.all_off() {
            Ok(()) => info!("Device outputs reset: all LEDs and buzzers off"),
            Err(e) => error!("Failed to reset device outputs at startup: {}", e),
        }

        Self {
            table: Mutex::new(table),
            device,
            store,
            published,
        }
    }

    /// Start ringing `slot`
    ///
    /// Returns false when the slot is already active; the existing context is kept.
    /// Callers go through `SlotAssigner`, which holds the slot lock and has
    /// checked that `med_id` occupies `slot`.
    pub(crate) async fn trigger(
        &self,
        slot: SlotIndex,
        user_id: UserId,
        med_id: MedicationId,
    ) -> bool {
        let mut table = self.table.lock().await;

        if let Some(current) = table.slots[slot.index()] {
            debug!(
                "Slot {} already active for medication {}, trigger suppressed",
                slot, current.med_id
            );
            return false;
        }

        table.slots[slot.index()] = Some(AlarmContext { user_id, med_id });
        self.write_led(slot, true);
        self.sync_buzzer(&mut table);
        self.publish(&table);

        info!("Slot {} triggered: user {} medication {}", slot, user_id, med_id);
        true
    }

    /// Confirm the dose for an active slot
    ///
    /// Inactive slot: `Ok(None)`, nothing written. Otherwise the slot goes dark
    /// first, then the dose is stored; a store failure comes back as
    /// `DoseNotRecorded` with the slot already inactive.
    pub async fn acknowledge(&self, slot: SlotIndex) -> Result<Option<PillEvent>> {
        let mut table = self.table.lock().await;
        self.acknowledge_locked(&mut table, slot).await
    }

    async fn acknowledge_locked(
        &self,
        table: &mut SlotTable,
        slot: SlotIndex,
    ) -> Result<Option<PillEvent>> {
        let Some(context) = self.deactivate(table, slot) else {
            debug!("Acknowledge on inactive slot {} ignored", slot);
            return Ok(None);
        };

        match self
            .store
            .record_dose(context.user_id, context.med_id, Utc::now())
            .await
        {
            Ok(event) => {
                info!(
                    "Slot {} acknowledged: medication {} taken at {}",
                    slot, context.med_id, event.taken_at
                );
                Ok(Some(event))
            },
            Err(e) => {
                error!(
                    "Slot {} acknowledged but dose for medication {} was not recorded: {}",
                    slot, context.med_id, e
                );
                Err(PillError::DoseNotRecorded {
                    slot,
                    med_id: context.med_id,
                    reason: e.to_string(),
                })
            },
        }
    }

    /// Turn a slot off without recording a dose
    ///
    /// Returns whether the slot was active.
    pub async fn force_clear(&self, slot: SlotIndex) -> bool {
        let mut table = self.table.lock().await;
        match self.deactivate(&mut table, slot) {
            Some(context) => {
                info!(
                    "Slot {} force-cleared (medication {}), no dose recorded",
                    slot, context.med_id
                );
                true
            },
            None => false,
        }
    }

    /// Record a dose the user reports taking
    ///
    /// If `slot` is ringing for this medication the alarm is acknowledged;
    /// otherwise an unscheduled dose is stored and no slot changes.
    pub async fn record_manual_dose(
        &self,
        slot: Option<SlotIndex>,
        user_id: UserId,
        med_id: MedicationId,
    ) -> Result<PillEvent> {
        let mut table = self.table.lock().await;

        if let Some(slot) = slot {
            let ringing_for_med = table.slots[slot.index()].is_some_and(|c| c.med_id == med_id);
            if ringing_for_med {
                if let Some(event) = self.acknowledge_locked(&mut table, slot).await? {
                    return Ok(event);
                }
            }
        }

        let event = self.store.record_dose(user_id, med_id, Utc::now()).await?;
        info!("Unscheduled dose recorded for medication {}", med_id);
        Ok(event)
    }

    pub fn is_active(&self, slot: SlotIndex) -> bool {
        self.published
            .borrow()
            .get(slot.index())
            .is_some_and(|s| s.active)
    }

    /// Last published state of every slot
    pub fn snapshot(&self) -> Vec<SlotActivity> {
        self.published.borrow().clone()
    }

    /// Receiver that sees every published snapshot
    pub fn subscribe(&self) -> watch::Receiver<Vec<SlotActivity>> {
        self.published.subscribe()
    }

    /// Force every slot inactive and quiet the device
    pub async fn shutdown(&self) {
        let mut table = self.table.lock().await;
        let cleared = table.slots.iter_mut().filter_map(Option::take).count();
        table.buzzer_on = false;

        if let Err(e) = self.device.all_off() {
            error!("Failed to switch device outputs off at shutdown: {}", e);
        }
        self.publish(&table);

        info!(
            "Alarm controller stopped: {} active slot(s) cleared, outputs off",
            cleared
        );
    }

    /// Shared off path of acknowledge and force_clear
    fn deactivate(&self, table: &mut SlotTable, slot: SlotIndex) -> Option<AlarmContext> {
        let context = table.slots[slot.index()].take()?;
        self.write_led(slot, false);
        self.sync_buzzer(table);
        self.publish(table);
        Some(context)
    }

    /// Buzzer follows "any slot active"; only level changes reach the device
    fn sync_buzzer(&self, table: &mut SlotTable) {
        let wanted = table.any_active();
        if wanted == table.buzzer_on {
            return;
        }
        table.buzzer_on = wanted;
        if let Err(e) = self.device.set_buzzer(wanted) {
            log_device_error("buzzer", e);
        }
    }

    fn write_led(&self, slot: SlotIndex, on: bool) {
        if let Err(e) = self.device.set_led(slot, on) {
            log_device_error(&format!("LED {}", slot), e);
        }
    }

    fn publish(&self, table: &SlotTable) {
        self.published.send_replace(table.snapshot());
    }
}

fn log_device_error(output: &str, e: DeviceError) {
    error!("Device write to {} failed: {}", output, e);
}
