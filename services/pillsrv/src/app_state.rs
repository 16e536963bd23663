//! Application State Management
//!
//! Shared handles to the coordination engine, used by the API handlers and
//! the background loops.

use std::sync::Arc;

use tracing::info;

use crate::alarm_state::AlarmController;
use crate::device::DeviceIo;
use crate::error::Result;
use crate::slots::SlotAssigner;
use crate::storage::EntityStore;

#[derive(Clone)]
pub struct AppState {
    pub store: EntityStore,
    pub alarms: Arc<AlarmController>,
    pub slots: Arc<SlotAssigner>,
}

impl AppState {
    /// Wire the engine over an initialised store
    ///
    /// Outputs are switched off and slot assignments reloaded from the store.
    pub async fn build(store: EntityStore, device: Arc<dyn DeviceIo>) -> Result<Self> {
        let alarms = Arc::new(AlarmController::new(store.clone(), device.clone()));
        let slots = Arc::new(SlotAssigner::load(store.clone(), alarms.clone()).await?);

        info!("Coordination engine ready ({} backend)", device.name());

        Ok(Self {
            store,
            alarms,
            slots,
        })
    }
}
