//! Console stand-in for the real hardware

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::DeviceIo;
use crate::domain::{SlotIndex, SLOT_COUNT};
use crate::error::DeviceError;

const HISTORY_LIMIT: usize = 256;

/// Output command as issued to the device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceCommand {
    Led { slot: SlotIndex, on: bool },
    Buzzer(bool),
}

#[derive(Debug, Default)]
struct SimState {
    leds: [bool; SLOT_COUNT],
    buzzer: bool,
    history: VecDeque<DeviceCommand>,
    pending_presses: VecDeque<SlotIndex>,
    fail_writes: bool,
}

impl SimState {
    fn record(&mut self, cmd: DeviceCommand) {
        if self.history.len() == HISTORY_LIMIT {
            self.history.pop_front();
        }
        self.history.push_back(cmd);
    }
}

/// Simulated device: logs outputs, takes button presses from `press`
#[derive(Debug, Default)]
pub struct SimulatedIo {
    state: Mutex<SimState>,
}

impl SimulatedIo {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Queue a button press, seen by the next `read_buttons`
    pub fn press(&self, slot: SlotIndex) {
        debug!("[SIM] button {} pressed", slot);
        self.lock().pending_presses.push_back(slot);
    }

    pub fn led(&self, slot: SlotIndex) -> bool {
        self.lock().leds[slot.index()]
    }

    pub fn buzzer(&self) -> bool {
        self.lock().buzzer
    }

    /// Most recent output commands, oldest first
    pub fn history(&self) -> Vec<DeviceCommand> {
        self.lock().history.iter().copied().collect()
    }

    /// Number of off-to-on buzzer transitions seen in the history
    pub fn buzzer_on_edges(&self) -> usize {
        let state = self.lock();
        let mut on = false;
        let mut edges = 0;
        for cmd in &state.history {
            if let DeviceCommand::Buzzer(next) = cmd {
                if *next && !on {
                    edges += 1;
                }
                on = *next;
            }
        }
        edges
    }

    /// Make every output write fail, for exercising error paths
    pub fn set_fail_writes(&self, fail: bool) {
        self.lock().fail_writes = fail;
    }
}

impl DeviceIo for SimulatedIo {
    fn name(&self) -> &'static str {
        "simulated"
    }

    fn set_led(&self, slot: SlotIndex, on: bool) -> Result<(), DeviceError> {
        let mut state = self.lock();
        if state.fail_writes {
            return Err(DeviceError::Unavailable("simulated write failure".into()));
        }
        state.leds[slot.index()] = on;
        state.record(DeviceCommand::Led { slot, on });
        info!("[SIM] LED {} {}", slot, if on { "ON" } else { "OFF" });
        Ok(())
    }

    fn set_buzzer(&self, on: bool) -> Result<(), DeviceError> {
        let mut state = self.lock();
        if state.fail_writes {
            return Err(DeviceError::Unavailable("simulated write failure".into()));
        }
        state.buzzer = on;
        state.record(DeviceCommand::Buzzer(on));
        info!("[SIM] Buzzer {}", if on { "ON" } else { "OFF" });
        Ok(())
    }

    fn read_buttons(&self) -> Result<[bool; SLOT_COUNT], DeviceError> {
        let mut pressed = [false; SLOT_COUNT];
        for slot in self.lock().pending_presses.drain(..) {
            pressed[slot.index()] = true;
        }
        Ok(pressed)
    }
}

/// Read slot numbers (1-5) from stdin and feed them in as button presses
pub fn spawn_console_input(io: Arc<SimulatedIo>, shutdown: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("Simulated input: type a slot number 1-{} and press Enter", SLOT_COUNT);
        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                line = lines.next_line() => match line {
                    Ok(Some(line)) => match parse_slot_number(&line) {
                        Some(slot) => io.press(slot),
                        None => warn!(
                            "Ignoring console input '{}': expected 1-{}",
                            line.trim(),
                            SLOT_COUNT
                        ),
                    },
                    Ok(None) => {
                        debug!("Console input closed");
                        break;
                    },
                    Err(e) => {
                        warn!("Console input error: {}", e);
                        break;
                    },
                },
            }
        }
    })
}

fn parse_slot_number(line: &str) -> Option<SlotIndex> {
    line.trim().parse::<u8>().ok().and_then(SlotIndex::from_number)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot(i: u8) -> SlotIndex {
        SlotIndex::new(i).unwrap()
    }

    #[test]
    fn test_presses_are_consumed_once() {
        let io = SimulatedIo::new();
        io.press(slot(3));

        let first = io.read_buttons().unwrap();
        assert!(first[3]);
        assert_eq!(first.iter().filter(|p| **p).count(), 1);

        let second = io.read_buttons().unwrap();
        assert!(second.iter().all(|p| !p));
    }

    #[test]
    fn test_all_off_clears_outputs() {
        let io = SimulatedIo::new();
        io.set_led(slot(1), true).unwrap();
        io.set_buzzer(true).unwrap();

        io.all_off().unwrap();
        assert!(!io.led(slot(1)));
        assert!(!io.buzzer());
    }

    #[test]
    fn test_buzzer_edges_counted() {
        let io = SimulatedIo::new();
        io.set_buzzer(true).unwrap();
        io.set_buzzer(true).unwrap();
        io.set_buzzer(false).unwrap();
        io.set_buzzer(true).unwrap();
        assert_eq!(io.buzzer_on_edges(), 2);
    }

    #[test]
    fn test_parse_slot_number() {
        assert_eq!(parse_slot_number(" 1\n"), Some(slot(0)));
        assert_eq!(parse_slot_number("5"), Some(slot(4)));
        assert_eq!(parse_slot_number("0"), None);
        assert_eq!(parse_slot_number("6"), None);
        assert_eq!(parse_slot_number("abc"), None);
    }
}
