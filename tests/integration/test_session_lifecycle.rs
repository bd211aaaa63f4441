//! Integration Tests: Session Lifecycle
//!
//! Tab creation and teardown, process exit, automatic restart and the
//! fate of pending background requests along the way.

#[path = "../test_utils/mod.rs"]
mod test_utils;

use shellmux::error::Error;
use shellmux::session::NOTICE_PREFIX;
use shellmux::{InputMode, RequestKind, SessionEvent};
use test_utils::*;

#[test]
fn test_exit_during_read_fails_request_once() {
    let mut h = Harness::new();
    let id = h.ready_session();
    h.drain_events();

    h.manager.read_file("/notes").unwrap();
    h.stdout(&id, "partial con");
    h.exit(&id, Some(1), true);

    let completions = h.completions();
    assert_eq!(completions.len(), 1);
    let done = &completions[0];
    assert!(!done.success);
    assert_eq!(done.kind, RequestKind::ReadFile("/notes".to_string()));
    assert_eq!(done.text, "partial con");
    assert!(done.error_message.is_some());
    assert!(h.manager.background_slot_holder().is_none());
    assert!(h.completions().is_empty());
}

#[test]
fn test_exit_restarts_and_keeps_history() {
    let mut h = Harness::new();
    let id = h.ready_session();
    h.drain_events();

    h.exit(&id, Some(0), true);

    let session = h.manager.session(&id).unwrap();
    assert_eq!(session.generation(), 2);
    assert_eq!(session.mode(), InputMode::Initializing);
    assert!(session.is_running());
    assert!(session.transcript().contains("Welcome"));
    assert!(session
        .transcript()
        .contains("--- process terminated normally (exit code 0) ---"));
    assert_eq!(h.spawner.spawn_count(), 2);

    let events = h.drain_events();
    assert!(events
        .iter()
        .any(|e| matches!(e, SessionEvent::ProcessExited { exit_code: Some(0), normal: true, .. })));
    assert!(events
        .iter()
        .any(|e| matches!(e, SessionEvent::Restarted { generation: 2, .. })));

    h.stdout(&id, &prompt("~"));
    assert_eq!(h.manager.session(&id).unwrap().mode(), InputMode::Normal);
    assert_eq!(h.manager.session(&id).unwrap().restart_attempts(), 0);
}

#[test]
fn test_unexpected_exit_notice() {
    let mut config = test_config();
    config.session.restart_on_exit = false;
    let mut h = Harness::with_config(config);
    let id = h.ready_session();

    h.exit(&id, None, false);

    let session = h.manager.session(&id).unwrap();
    assert!(!session.is_running());
    assert!(session
        .transcript()
        .contains("--- process terminated unexpectedly (exit code unknown) ---"));
    assert_eq!(h.spawner.spawn_count(), 1);
    assert!(matches!(
        h.manager.submit_line(&id),
        Err(Error::StdinUnavailable { .. })
    ));
}

#[test]
fn test_restart_cap_stops_crash_loop() {
    let mut h = Harness::new();
    let id = h.manager.create_session();

    // Never reaches the shell prompt
    for _ in 0..5 {
        h.exit(&id, Some(1), true);
    }

    let session = h.manager.session(&id).unwrap();
    assert_eq!(h.spawner.spawn_count(), 4, "initial spawn plus three restarts");
    assert!(!session.is_running());
    assert!(session.transcript().contains("Not restarting after 3 attempts"));
}

#[test]
fn test_restart_cap_with_error_output() {
    let mut h = Harness::new();
    let id = h.manager.create_session();

    // Output without a prompt does not count as reaching the shell
    for _ in 0..10 {
        h.stderr(&id, "fatal: disk image missing\n");
        h.exit(&id, Some(1), true);
    }

    let session = h.manager.session(&id).unwrap();
    assert_eq!(h.spawner.spawn_count(), 4);
    assert!(!session.is_running());
    assert!(session.transcript().contains("Not restarting after 3 attempts"));
}

#[test]
fn test_restart_failure_keeps_tab_initializing() {
    let mut h = Harness::new();
    let id = h.ready_session();
    h.drain_events();
    h.spawner.fail_always(true);

    h.exit(&id, Some(2), true);

    let session = h.manager.session(&id).expect("tab stays open");
    assert_eq!(session.mode(), InputMode::Initializing);
    assert!(!session.is_running());
    assert!(session.transcript().contains(NOTICE_PREFIX));
    assert!(h
        .drain_events()
        .iter()
        .any(|e| matches!(e, SessionEvent::RestartFailed { .. })));

    let err = h.manager.restart_session(&id).unwrap_err();
    assert!(matches!(err, Error::ProcessRestartFailed { .. }));

    h.spawner.fail_always(false);
    h.manager.restart_session(&id).expect("restart succeeds");
    assert!(h.manager.session(&id).unwrap().is_running());
}

#[test]
fn test_manual_restart_terminates_old_process() {
    let mut h = Harness::new();
    let id = h.ready_session();
    h.drain_events();

    h.manager.read_file("/notes").unwrap();
    h.manager.restart_session(&id).unwrap();

    assert!(h.spawner.terminated(&id, 1));
    let completions = h.completions();
    assert_eq!(completions.len(), 1);
    assert!(!completions[0].success);
    assert_eq!(completions[0].error_message.as_deref(), Some("Process restarted"));

    // The old prompt is history now
    let session = h.manager.session(&id).unwrap();
    assert_eq!(session.mode(), InputMode::Initializing);
    assert_eq!(session.input_start(), session.transcript().len());
}

#[test]
fn test_stale_generation_events_are_ignored() {
    let mut h = Harness::new();
    let id = h.ready_session();
    h.manager.restart_session(&id).unwrap();
    let before = h.transcript(&id);

    h.manager
        .handle_process_event(shellmux::process::ProcessEvent::Stdout {
            session_id: id.clone(),
            generation: 1,
            text: prompt("/old"),
        });
    h.manager
        .handle_process_event(shellmux::process::ProcessEvent::Exited {
            session_id: id.clone(),
            generation: 1,
            exit_code: Some(0),
            normal: true,
        });

    let session = h.manager.session(&id).unwrap();
    assert_eq!(session.transcript(), before);
    assert_eq!(session.mode(), InputMode::Initializing);
    assert!(session.is_running());
}

#[test]
fn test_destroy_moves_current_to_neighbor() {
    let mut h = Harness::new();
    let a = h.ready_session();
    let b = h.ready_session();
    let c = h.ready_session();
    h.manager.set_current_session(&b).unwrap();

    h.manager.destroy_session(&b).unwrap();
    assert_eq!(h.manager.session_ids(), &[a.clone(), c.clone()]);
    assert_eq!(h.manager.current_session_id(), Some(&c));
    assert!(h.spawner.terminated(&b, 1));

    h.manager.destroy_session(&c).unwrap();
    assert_eq!(h.manager.current_session_id(), Some(&a));
}

#[test]
fn test_destroy_last_tab_opens_new_one() {
    let mut h = Harness::new();
    let id = h.ready_session();
    h.manager.read_file("/notes").unwrap();
    h.drain_events();

    h.manager.destroy_session(&id).unwrap();

    assert_eq!(h.manager.len(), 1);
    let current = h.manager.current_session_id().cloned().unwrap();
    assert_ne!(current, id);
    assert!(h.manager.background_slot_holder().is_none());

    let events = h.drain_events();
    let failed = events
        .iter()
        .filter(|e| matches!(e, SessionEvent::RequestCompleted(c) if !c.success))
        .count();
    assert_eq!(failed, 1);
    assert!(events
        .iter()
        .any(|e| matches!(e, SessionEvent::Closed { session_id } if *session_id == id)));
}

#[test]
fn test_destroy_unknown_session() {
    let mut h = Harness::new();
    h.manager.create_session();
    let err = h
        .manager
        .destroy_session(&shellmux::SessionId::from("missing"))
        .unwrap_err();
    assert!(matches!(err, Error::SessionNotFound { .. }));
}

#[test]
fn test_spawn_failure_still_registers_tab() {
    let mut h = Harness::new();
    h.spawner.fail_next(1);

    let id = h.manager.create_session();

    assert_eq!(h.manager.current_session_id(), Some(&id));
    let session = h.manager.session(&id).unwrap();
    assert!(!session.is_running());
    assert_eq!(session.mode(), InputMode::Initializing);
    assert!(session.transcript().starts_with(NOTICE_PREFIX));
    assert!(h
        .drain_events()
        .iter()
        .any(|e| matches!(e, SessionEvent::SpawnFailed { .. })));

    h.manager.restart_session(&id).unwrap();
    assert!(h.manager.session(&id).unwrap().is_running());
}

#[test]
fn test_shutdown_fails_pending_and_terminates() {
    let mut h = Harness::new();
    let a = h.ready_session();
    let b = h.ready_session();
    h.manager.execute(&a, shellmux::BackgroundCommand::list_directory()).unwrap();
    h.drain_events();

    h.manager.shutdown();

    assert!(h.manager.is_empty());
    assert!(h.manager.current_session_id().is_none());
    assert!(h.spawner.terminated(&a, 1));
    assert!(h.spawner.terminated(&b, 1));
    let completions = h.completions();
    assert_eq!(completions.len(), 1);
    assert_eq!(completions[0].error_message.as_deref(), Some("Shutting down"));
}
