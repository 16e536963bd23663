//! Pill reminder controller library
//!
//! Five physical slots map to medications. A schedule scanner rings slots
//! when their alarms are due, a hardware monitor acknowledges them on button
//! presses, and the HTTP API manages users, medications and alarms. All
//! alarm transitions go through [`alarm_state::AlarmController`].

pub mod alarm_state;
pub mod api;
pub mod app_state;
pub mod bootstrap;
pub mod config;
pub mod device;
pub mod domain;
pub mod error;
pub mod services;
pub mod slots;
pub mod storage;

pub use alarm_state::AlarmController;
pub use app_state::AppState;
pub use config::PillsrvConfig;
pub use error::{DeviceError, PillError, Result};
pub use slots::{SlotAssigner, TriggerOutcome};
pub use storage::EntityStore;
