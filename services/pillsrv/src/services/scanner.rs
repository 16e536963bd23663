//! Schedule Scanner
//!
//! Every period, finds the alarms due this minute and asks the slot
//! machinery to ring them. An alarm rings at most once per due minute: the
//! scanner remembers which alarms fired in the current minute, so a dose
//! acknowledged between two polls of that minute is not asked for again.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveTime;
use tokio::sync::Mutex;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::domain::{AlarmId, TimeOfDay};
use crate::error::{PillError, Result};
use crate::slots::{SlotAssigner, TriggerOutcome};
use crate::storage::EntityStore;

/// Counts from one scan
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanReport {
    pub due: usize,
    pub triggered: usize,
    pub already_active: usize,
    /// Rang earlier in the same minute
    pub already_fired: usize,
    pub unresolved: usize,
}

/// Alarms that rang during `minute`
#[derive(Debug, Default)]
struct FiredMinute {
    minute: Option<TimeOfDay>,
    alarms: HashSet<AlarmId>,
}

pub struct ScheduleScanner {
    store: EntityStore,
    slots: Arc<SlotAssigner>,
    period: Duration,
    fired: Mutex<FiredMinute>,
}

impl ScheduleScanner {
    pub fn new(store: EntityStore, slots: Arc<SlotAssigner>, period: Duration) -> Self {
        Self {
            store,
            slots,
            period,
            fired: Mutex::new(FiredMinute::default()),
        }
    }

    /// Scan for alarms due at the minute containing `now`
    pub async fn scan_at(&self, now: NaiveTime) -> Result<ScanReport> {
        let minute = TimeOfDay::from_time(now);
        let due = self.store.alarms_due_at(minute).await?;

        let mut report = ScanReport {
            due: due.len(),
            ..Default::default()
        };

        let mut fired = self.fired.lock().await;
        if fired.minute != Some(minute) {
            fired.minute = Some(minute);
            fired.alarms.clear();
        }

        for alarm in &due {
            if fired.alarms.contains(&alarm.id) {
                report.already_fired += 1;
                continue;
            }

            match self.slots.trigger_scheduled(alarm).await {
                TriggerOutcome::Triggered(_) => {
                    report.triggered += 1;
                    fired.alarms.insert(alarm.id);
                },
                TriggerOutcome::AlreadyActive(_) => {
                    report.already_active += 1;
                    fired.alarms.insert(alarm.id);
                },
                TriggerOutcome::Unassigned => {
                    report.unresolved += 1;
                    let reason = PillError::ScheduleUnresolved {
                        med_id: alarm.med_id,
                    };
                    warn!("Alarm {} at {} skipped: {}", alarm.id, minute, reason);
                },
            }
        }

        if report.due > 0 {
            debug!("Scan {}: {:?}", minute, report);
        }
        Ok(report)
    }

    /// Scan on a fixed period until cancelled
    ///
    /// Ticks never overlap: a slow scan delays the next one.
    pub async fn run(&self, shutdown: CancellationToken) {
        info!("Schedule scanner started, period {}s", self.period.as_secs());

        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    let now = chrono::Local::now().time();
                    if let Err(e) = self.scan_at(now).await {
                        error!("Schedule scan failed: {}", e);
                    }
                }
            }
        }

        info!("Schedule scanner stopped");
    }
}
