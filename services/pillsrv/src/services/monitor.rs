//! Hardware Monitor
//!
//! Polls the buttons and acknowledges active slots. After an acknowledged
//! press the slot's button is ignored for the debounce window.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::alarm_state::AlarmController;
use crate::device::DeviceIo;
use crate::domain::{SlotIndex, SLOT_COUNT};

pub struct HardwareMonitor {
    device: Arc<dyn DeviceIo>,
    alarms: Arc<AlarmController>,
    poll: Duration,
    debounce: Duration,
    suppressed_until: [Option<Instant>; SLOT_COUNT],
}

impl HardwareMonitor {
    pub fn new(
        device: Arc<dyn DeviceIo>,
        alarms: Arc<AlarmController>,
        poll: Duration,
        debounce: Duration,
    ) -> Self {
        Self {
            device,
            alarms,
            poll,
            debounce,
            suppressed_until: [None; SLOT_COUNT],
        }
    }

    /// One poll of every button as of `now`
    ///
    /// Returns the number of doses recorded.
    pub async fn poll_at(&mut self, now: Instant) -> usize {
        let pressed = match self.device.read_buttons() {
            Ok(pressed) => pressed,
            Err(e) => {
                error!("Button read failed: {}", e);
                return 0;
            },
        };

        let mut recorded = 0;
        for slot in SlotIndex::all() {
            if !pressed[slot.index()] {
                continue;
            }

            if self.suppressed_until[slot.index()].is_some_and(|until| now < until) {
                debug!("Button {} ignored (debounce)", slot);
                continue;
            }

            if !self.alarms.is_active(slot) {
                debug!("Button {} pressed with no active alarm", slot);
                continue;
            }

            // The slot is off after acknowledge whether or not the dose was stored
            match self.alarms.acknowledge(slot).await {
                Ok(Some(_)) => recorded += 1,
                Ok(None) => debug!("Slot {} was cleared before the press was handled", slot),
                Err(e) => error!("Button {} acknowledge error: {}", slot, e),
            }
            self.suppressed_until[slot.index()] = Some(now + self.debounce);
        }

        recorded
    }

    /// Poll until cancelled
    pub async fn run(mut self, shutdown: CancellationToken) {
        info!(
            "Hardware monitor started: poll {}ms, debounce {}ms",
            self.poll.as_millis(),
            self.debounce.as_millis()
        );

        let mut ticker = interval(self.poll);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    self.poll_at(Instant::now()).await;
                }
            }
        }

        info!("Hardware monitor stopped");
    }
}
