//! Alarm state machine: trigger, acknowledge, forced clear and the
//! device outputs that follow them

mod support;

use pillsrv::device::DeviceCommand;
use pillsrv::{PillError, TriggerOutcome};
use support::{add_medication, create_test_engine, ring, slot};

#[tokio::test]
async fn test_trigger_then_acknowledge_records_one_event() {
    let engine = create_test_engine().await.unwrap();
    let (user, med) = add_medication(&engine, "alice", "aspirin", 10, 1).await.unwrap();
    let alarms = &engine.state.alarms;
    let s = med.slot.unwrap();

    assert!(ring(&engine, user.id, med.id).await);
    assert!(alarms.is_active(s));
    assert!(engine.sim.led(s));
    assert!(engine.sim.buzzer());

    let event = alarms.acknowledge(s).await.unwrap().expect("dose recorded");
    assert_eq!(event.med_id, med.id);
    assert_eq!(event.user_id, user.id);

    assert!(!alarms.is_active(s));
    assert!(!engine.sim.led(s));
    assert!(!engine.sim.buzzer());

    let med = engine.store().get_medication(med.id).await.unwrap();
    assert_eq!(med.pills_left, 9);
}

#[tokio::test]
async fn test_acknowledge_inactive_slot_is_noop() {
    let engine = create_test_engine().await.unwrap();
    let (user, med) = add_medication(&engine, "alice", "aspirin", 10, 2).await.unwrap();
    let s = med.slot.unwrap();
    let commands_before = engine.sim.history().len();

    for _ in 0..3 {
        assert!(engine.state.alarms.acknowledge(s).await.unwrap().is_none());
    }

    assert!(engine.store().list_pill_events(user.id).await.unwrap().is_empty());
    let med = engine.store().get_medication(med.id).await.unwrap();
    assert_eq!(med.pills_left, 10);
    assert_eq!(engine.sim.history().len(), commands_before);
}

#[tokio::test]
async fn test_duplicate_trigger_single_buzzer_edge() {
    let engine = create_test_engine().await.unwrap();
    let (user, med) = add_medication(&engine, "alice", "aspirin", 10, 1).await.unwrap();
    let alarms = &engine.state.alarms;
    let s = med.slot.unwrap();

    assert!(ring(&engine, user.id, med.id).await);
    assert!(!ring(&engine, user.id, med.id).await);

    assert_eq!(engine.sim.buzzer_on_edges(), 1);
    let led_on = engine
        .sim
        .history()
        .into_iter()
        .filter(|c| *c == DeviceCommand::Led { slot: s, on: true })
        .count();
    assert_eq!(led_on, 1);
}

#[tokio::test]
async fn test_buzzer_follows_any_active_slot() {
    let engine = create_test_engine().await.unwrap();
    let (user, a) = add_medication(&engine, "alice", "aspirin", 10, 1).await.unwrap();
    let (_, b) = add_medication(&engine, "alice", "vitamin d", 10, 1).await.unwrap();
    let alarms = &engine.state.alarms;
    let (sa, sb) = (a.slot.unwrap(), b.slot.unwrap());

    ring(&engine, user.id, a.id).await;
    ring(&engine, user.id, b.id).await;
    assert!(engine.sim.buzzer());

    alarms.acknowledge(sa).await.unwrap();
    assert!(engine.sim.buzzer(), "buzzer stays on while slot B rings");
    assert!(!engine.sim.led(sa));
    assert!(engine.sim.led(sb));

    alarms.acknowledge(sb).await.unwrap();
    assert!(!engine.sim.buzzer());
    assert_eq!(engine.sim.buzzer_on_edges(), 1);
}

#[tokio::test]
async fn test_trigger_acknowledge_twice_scenario() {
    let engine = create_test_engine().await.unwrap();
    // Fill slots 0 and 1 so the medication under test lands in slot 2
    add_medication(&engine, "bob", "a", 10, 1).await.unwrap();
    add_medication(&engine, "bob", "b", 10, 1).await.unwrap();
    let (user, med) = add_medication(&engine, "bob", "c", 10, 1).await.unwrap();
    assert_eq!(med.slot, Some(slot(2)));

    let alarms = &engine.state.alarms;
    assert!(ring(&engine, user.id, med.id).await);

    let first = alarms.acknowledge(slot(2)).await.unwrap();
    assert_eq!(first.map(|e| e.med_id), Some(med.id));

    let second = alarms.acknowledge(slot(2)).await.unwrap();
    assert!(second.is_none());
}

#[tokio::test]
async fn test_inventory_never_negative() {
    let engine = create_test_engine().await.unwrap();
    let (user, med) = add_medication(&engine, "alice", "big dose", 1, 3).await.unwrap();
    let alarms = &engine.state.alarms;
    let s = med.slot.unwrap();

    for _ in 0..3 {
        ring(&engine, user.id, med.id).await;
        alarms.acknowledge(s).await.unwrap().expect("dose recorded");
        let current = engine.store().get_medication(med.id).await.unwrap();
        assert_eq!(current.pills_left, 0);
    }

    assert_eq!(engine.store().list_pill_events(user.id).await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_force_clear_records_nothing() {
    let engine = create_test_engine().await.unwrap();
    let (user, med) = add_medication(&engine, "alice", "aspirin", 10, 1).await.unwrap();
    let alarms = &engine.state.alarms;
    let s = med.slot.unwrap();

    ring(&engine, user.id, med.id).await;
    assert!(alarms.force_clear(s).await);
    assert!(!alarms.force_clear(s).await);

    assert!(!alarms.is_active(s));
    assert!(!engine.sim.led(s));
    assert!(!engine.sim.buzzer());
    assert!(engine.store().list_pill_events(user.id).await.unwrap().is_empty());
    assert_eq!(engine.store().get_medication(med.id).await.unwrap().pills_left, 10);
}

#[tokio::test]
async fn test_store_failure_still_turns_slot_off() {
    let engine = create_test_engine().await.unwrap();
    let (user, med) = add_medication(&engine, "alice", "aspirin", 10, 1).await.unwrap();
    let alarms = &engine.state.alarms;
    let s = med.slot.unwrap();

    ring(&engine, user.id, med.id).await;
    engine.client.pool().close().await;

    let result = alarms.acknowledge(s).await;
    match result {
        Err(PillError::DoseNotRecorded { slot, med_id, .. }) => {
            assert_eq!(slot, s);
            assert_eq!(med_id, med.id);
        },
        other => panic!("expected DoseNotRecorded, got {:?}", other),
    }

    assert!(!alarms.is_active(s));
    assert!(!engine.sim.led(s));
    assert!(!engine.sim.buzzer());
}

#[tokio::test]
async fn test_device_failure_does_not_block_transition() {
    let engine = create_test_engine().await.unwrap();
    let (user, med) = add_medication(&engine, "alice", "aspirin", 10, 1).await.unwrap();
    let alarms = &engine.state.alarms;
    let s = med.slot.unwrap();

    engine.sim.set_fail_writes(true);
    assert!(ring(&engine, user.id, med.id).await);
    assert!(alarms.is_active(s));

    let event = alarms.acknowledge(s).await.unwrap();
    assert!(event.is_some());
    assert!(!alarms.is_active(s));
}

#[tokio::test]
async fn test_manual_dose_without_alarm() {
    let engine = create_test_engine().await.unwrap();
    let (user, med) = add_medication(&engine, "alice", "aspirin", 10, 2).await.unwrap();
    let commands_before = engine.sim.history().len();

    let event = engine
        .state
        .alarms
        .record_manual_dose(med.slot, user.id, med.id)
        .await
        .unwrap();
    assert_eq!(event.med_id, med.id);
    assert_eq!(engine.store().get_medication(med.id).await.unwrap().pills_left, 8);
    assert_eq!(engine.sim.history().len(), commands_before);
}

#[tokio::test]
async fn test_manual_dose_acknowledges_ringing_slot() {
    let engine = create_test_engine().await.unwrap();
    let (user, med) = add_medication(&engine, "alice", "aspirin", 10, 1).await.unwrap();
    let alarms = &engine.state.alarms;
    let s = med.slot.unwrap();

    ring(&engine, user.id, med.id).await;
    alarms
        .record_manual_dose(Some(s), user.id, med.id)
        .await
        .unwrap();

    assert!(!alarms.is_active(s));
    assert!(!engine.sim.buzzer());
    assert_eq!(engine.store().list_pill_events(user.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_shutdown_clears_everything() {
    let engine = create_test_engine().await.unwrap();
    let (user, a) = add_medication(&engine, "alice", "aspirin", 10, 1).await.unwrap();
    let (_, b) = add_medication(&engine, "alice", "vitamin d", 10, 1).await.unwrap();
    let alarms = &engine.state.alarms;

    ring(&engine, user.id, a.id).await;
    ring(&engine, user.id, b.id).await;

    alarms.shutdown().await;

    assert!(alarms.snapshot().iter().all(|s| !s.active));
    assert!(!engine.sim.buzzer());
    assert!(!engine.sim.led(a.slot.unwrap()));
    assert!(!engine.sim.led(b.slot.unwrap()));
}

#[tokio::test]
async fn test_snapshot_reports_context() {
    let engine = create_test_engine().await.unwrap();
    let (user, med) = add_medication(&engine, "alice", "aspirin", 10, 1).await.unwrap();
    let s = med.slot.unwrap();
    let alarms = &engine.state.alarms;
    let mut rx = alarms.subscribe();

    assert!(ring(&engine, user.id, med.id).await);

    assert!(rx.has_changed().unwrap());
    let published = rx.borrow_and_update().clone();
    let entry = published[s.index()];
    assert!(entry.active);
    assert_eq!(entry.context.map(|c| c.med_id), Some(med.id));
    assert_eq!(entry.context.map(|c| c.user_id), Some(user.id));
    assert_eq!(alarms.snapshot(), published);
}

#[tokio::test]
async fn test_unassigned_medication_never_rings() {
    let engine = create_test_engine().await.unwrap();
    let (user, med) = add_medication(&engine, "alice", "aspirin", 10, 1).await.unwrap();
    engine.state.slots.free(med.id).await.unwrap();
    let edges_before = engine.sim.buzzer_on_edges();

    let outcome = engine.state.slots.ring(user.id, med.id).await;

    assert_eq!(outcome, TriggerOutcome::Unassigned);
    assert!(engine.state.alarms.snapshot().iter().all(|s| !s.active));
    assert!(!engine.sim.buzzer());
    assert_eq!(engine.sim.buzzer_on_edges(), edges_before);
}

#[tokio::test]
async fn test_concurrent_triggers_single_activation() {
    let engine = create_test_engine().await.unwrap();
    let (user, med) = add_medication(&engine, "alice", "aspirin", 10, 1).await.unwrap();
    let s = med.slot.unwrap();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let slots = engine.state.slots.clone();
        handles.push(tokio::spawn(async move {
            matches!(
                slots.ring(user.id, med.id).await,
                TriggerOutcome::Triggered(_)
            )
        }));
    }

    let mut transitions = 0;
    for h in handles {
        if h.await.unwrap() {
            transitions += 1;
        }
    }
    assert_eq!(transitions, 1);
    assert_eq!(engine.sim.buzzer_on_edges(), 1);
}

#[tokio::test]
async fn test_startup_quiesces_outputs() {
    let engine = create_test_engine().await.unwrap();
    let history = engine.sim.history();

    assert!(history.contains(&DeviceCommand::Buzzer(false)));
    for i in 0..5 {
        assert!(history.contains(&DeviceCommand::Led { slot: slot(i), on: false }));
    }
    assert!(engine.state.alarms.snapshot().iter().all(|s| !s.active));
}
