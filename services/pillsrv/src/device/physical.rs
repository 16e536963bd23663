//! Raspberry Pi GPIO backend (rppal)

use std::sync::{Mutex, MutexGuard};

use rppal::gpio::{Gpio, InputPin, OutputPin};
use tracing::info;

use super::DeviceIo;
use crate::config::DeviceConfig;
use crate::domain::{SlotIndex, SLOT_COUNT};
use crate::error::DeviceError;

/// Real LED, buzzer and button lines
///
/// Buttons are wired with external resistors and read high when pressed.
pub struct PhysicalIo {
    leds: Mutex<Vec<OutputPin>>,
    buzzers: Mutex<Vec<OutputPin>>,
    buttons: Vec<InputPin>,
}

fn gpio_err(e: rppal::gpio::Error) -> DeviceError {
    DeviceError::Gpio(e.to_string())
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl PhysicalIo {
    pub fn new(config: &DeviceConfig) -> Result<Self, DeviceError> {
        let gpio = Gpio::new().map_err(|e| DeviceError::Unavailable(e.to_string()))?;

        let buttons = config
            .button_pins
            .iter()
            .map(|pin| gpio.get(*pin).map(|p| p.into_input()).map_err(gpio_err))
            .collect::<Result<Vec<_>, _>>()?;

        // Outputs start low so nothing is lit or sounding at boot
        let leds = config
            .led_pins
            .iter()
            .map(|pin| gpio.get(*pin).map(|p| p.into_output_low()).map_err(gpio_err))
            .collect::<Result<Vec<_>, _>>()?;

        let buzzers = config
            .buzzer_pins
            .iter()
            .map(|pin| gpio.get(*pin).map(|p| p.into_output_low()).map_err(gpio_err))
            .collect::<Result<Vec<_>, _>>()?;

        if buttons.len() != SLOT_COUNT || leds.len() != SLOT_COUNT {
            return Err(DeviceError::Unavailable(format!(
                "expected {} button and LED pins",
                SLOT_COUNT
            )));
        }

        info!(
            "GPIO ready: buttons {:?}, LEDs {:?}, buzzers {:?}",
            config.button_pins, config.led_pins, config.buzzer_pins
        );

        Ok(Self {
            leds: Mutex::new(leds),
            buzzers: Mutex::new(buzzers),
            buttons,
        })
    }
}

impl DeviceIo for PhysicalIo {
    fn name(&self) -> &'static str {
        "gpio"
    }

    fn set_led(&self, slot: SlotIndex, on: bool) -> Result<(), DeviceError> {
        let mut leds = lock(&self.leds);
        let pin = leds
            .get_mut(slot.index())
            .ok_or(DeviceError::InvalidSlot(slot.index()))?;
        if on {
            pin.set_high();
        } else {
            pin.set_low();
        }
        Ok(())
    }

    fn set_buzzer(&self, on: bool) -> Result<(), DeviceError> {
        for pin in lock(&self.buzzers).iter_mut() {
            if on {
                pin.set_high();
            } else {
                pin.set_low();
            }
        }
        Ok(())
    }

    fn read_buttons(&self) -> Result<[bool; SLOT_COUNT], DeviceError> {
        let mut pressed = [false; SLOT_COUNT];
        for (state, pin) in pressed.iter_mut().zip(&self.buttons) {
            *state = pin.is_high();
        }
        Ok(pressed)
    }
}
