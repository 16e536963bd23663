//! Common test utilities and helpers

#![allow(dead_code)]

use std::sync::Arc;

use anyhow::Result;
use common::SqliteClient;
use pillsrv::{
    api::create_router,
    device::SimulatedIo,
    domain::{Medication, MedicationId, NewMedication, SlotIndex, User, UserId},
    AppState, EntityStore, TriggerOutcome,
};

/// Engine over an in-memory database and a simulated device
pub struct TestEngine {
    pub state: AppState,
    pub sim: Arc<SimulatedIo>,
    pub client: SqliteClient,
}

impl TestEngine {
    pub fn store(&self) -> &EntityStore {
        &self.state.store
    }
}

pub async fn create_test_engine() -> Result<TestEngine> {
    let client = SqliteClient::in_memory().await?;
    let store = EntityStore::new(client.pool().clone());
    store.init_schema().await?;

    let sim = Arc::new(SimulatedIo::new());
    let state = AppState::build(store, sim.clone()).await?;

    Ok(TestEngine { state, sim, client })
}

/// Create a test router for API testing
pub async fn create_test_router() -> Result<(axum::Router, TestEngine)> {
    let engine = create_test_engine().await?;
    Ok((create_router(engine.state.clone()), engine))
}

pub fn slot(index: u8) -> SlotIndex {
    SlotIndex::new(index).expect("slot index in range")
}

/// Register a medication for `user_name` in the next free slot
pub async fn add_medication(
    engine: &TestEngine,
    user_name: &str,
    med_name: &str,
    pills_left: u32,
    pills_per_dose: u32,
) -> Result<(User, Medication)> {
    let user = engine.store().upsert_user(user_name).await?;
    let med = engine
        .state
        .slots
        .register(&NewMedication {
            user_id: user.id,
            name: med_name.to_string(),
            frequency_per_day: 1,
            pills_left,
            pills_per_dose,
        })
        .await?;
    Ok((user, med))
}

/// Ring the slot held by `med_id`; true when it started ringing
pub async fn ring(engine: &TestEngine, user_id: UserId, med_id: MedicationId) -> bool {
    matches!(
        engine.state.slots.ring(user_id, med_id).await,
        TriggerOutcome::Triggered(_)
    )
}
