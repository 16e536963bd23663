//! Device Output Adapter
//!
//! One interface over the LEDs, buzzers and buttons. The backend is chosen
//! once at startup; nothing else branches on which one is in use.

mod simulated;
#[cfg(feature = "gpio")]
mod physical;

use std::sync::Arc;

use tracing::info;

pub use simulated::{spawn_console_input, DeviceCommand, SimulatedIo};
#[cfg(feature = "gpio")]
pub use physical::PhysicalIo;

use crate::config::{DeviceBackend, DeviceConfig};
use crate::domain::{SlotIndex, SLOT_COUNT};
use crate::error::{DeviceError, Result};

/// LED, buzzer and button lines of the pill box
pub trait DeviceIo: Send + Sync {
    /// Backend name for logs
    fn name(&self) -> &'static str;

    fn set_led(&self, slot: SlotIndex, on: bool) -> std::result::Result<(), DeviceError>;

    /// Drives every buzzer line together
    fn set_buzzer(&self, on: bool) -> std::result::Result<(), DeviceError>;

    /// Current pressed state per slot
    fn read_buttons(&self) -> std::result::Result<[bool; SLOT_COUNT], DeviceError>;

    /// Everything dark and silent; attempts every line even if one fails
    fn all_off(&self) -> std::result::Result<(), DeviceError> {
        let mut first_err = None;
        for slot in SlotIndex::all() {
            if let Err(e) = self.set_led(slot, false) {
                first_err.get_or_insert(e);
            }
        }
        if let Err(e) = self.set_buzzer(false) {
            first_err.get_or_insert(e);
        }
        first_err.map_or(Ok(()), Err)
    }
}

/// Selected backend plus the simulated handle when there is one
pub struct DeviceHandles {
    pub io: Arc<dyn DeviceIo>,
    /// Present only for the simulated backend, used for console input
    pub simulated: Option<Arc<SimulatedIo>>,
}

/// Build the configured backend
pub fn create_device(config: &DeviceConfig, force_simulated: bool) -> Result<DeviceHandles> {
    let backend = if force_simulated {
        DeviceBackend::Simulated
    } else {
        config.backend
    };

    let handles = match backend {
        DeviceBackend::Simulated => {
            let sim = Arc::new(SimulatedIo::new());
            DeviceHandles {
                io: sim.clone(),
                simulated: Some(sim),
            }
        },
        DeviceBackend::Physical => create_physical(config)?,
    };

    info!("Device backend: {}", handles.io.name());
    Ok(handles)
}

#[cfg(feature = "gpio")]
fn create_physical(config: &DeviceConfig) -> Result<DeviceHandles> {
    let io = PhysicalIo::new(config)?;
    Ok(DeviceHandles {
        io: Arc::new(io),
        simulated: None,
    })
}

#[cfg(not(feature = "gpio"))]
fn create_physical(_config: &DeviceConfig) -> Result<DeviceHandles> {
    Err(crate::error::PillError::config(
        "physical device backend requires building with the `gpio` feature",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PillError;

    #[test]
    fn test_force_simulated_overrides_config() {
        let config = DeviceConfig {
            backend: DeviceBackend::Physical,
            ..Default::default()
        };
        let handles = create_device(&config, true).unwrap();
        assert_eq!(handles.io.name(), "simulated");
        assert!(handles.simulated.is_some());
    }

    #[cfg(not(feature = "gpio"))]
    #[test]
    fn test_physical_without_gpio_feature_is_config_error() {
        let config = DeviceConfig {
            backend: DeviceBackend::Physical,
            ..Default::default()
        };
        assert!(matches!(
            create_device(&config, false),
            Err(PillError::Config(_))
        ));
    }
}
