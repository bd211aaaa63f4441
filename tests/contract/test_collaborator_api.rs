//! Contract Tests: Collaborator API
//!
//! The operations explorer and editor panels rely on: which shell
//! commands they send, how results are addressed, and how sessions are
//! described to them.

#[path = "../test_utils/mod.rs"]
mod test_utils;

use shellmux::error::Error;
use shellmux::{BackgroundCommand, RequestKind, SessionEvent, SessionSnapshot};
use test_utils::*;

#[test]
fn test_no_active_session() {
    let mut h = Harness::new();
    let err = h.manager.list_directory().unwrap_err();
    assert!(matches!(err, Error::NoActiveSession));
    assert!(matches!(
        h.manager.read_file("/x").unwrap_err(),
        Error::NoActiveSession
    ));
}

#[test]
fn test_operations_target_current_session() {
    let mut h = Harness::new();
    let first = h.ready_session();
    let second = h.ready_session();
    h.writes(&first);
    h.writes(&second);

    h.manager.list_directory().unwrap();
    assert!(h.writes(&first).is_empty());
    assert_eq!(h.writes(&second), vec!["ls -a\n"]);
    assert_eq!(h.manager.background_slot_holder(), Some(&second));
}

#[test]
fn test_command_text_for_each_operation() {
    let mut h = Harness::new();
    let id = h.ready_session();
    h.writes(&id);

    h.manager.read_file(r"/my\doc").unwrap();
    expect_step(&mut h, &id, "cat \"/my\\doc\"\n");

    h.manager.change_directory("//docs//a").unwrap();
    expect_step(&mut h, &id, "cd /docs/a\n");

    h.manager.change_directory("").unwrap();
    expect_step(&mut h, &id, "cd ~\n");

    h.manager.write_file("/f", "").unwrap();
    expect_step(&mut h, &id, "echo \"\" > \"/f\"\n");

    h.manager
        .execute_background_command("whoami", RequestKind::Other)
        .unwrap();
    expect_step(&mut h, &id, "whoami\n");
}

/// Check the single command sent, then finish the request
fn expect_step(h: &mut Harness, id: &shellmux::SessionId, expected: &str) {
    assert_eq!(h.writes(id), vec![expected.to_string()]);
    h.stdout(id, &prompt("~"));
    assert!(h.manager.background_slot_holder().is_none());
}

#[test]
fn test_write_file_trailing_newline_and_crlf() {
    let cmd = BackgroundCommand::write_file("/f", "one\r\ntwo\n").unwrap();
    assert_eq!(
        cmd.commands().collect::<Vec<_>>(),
        vec!["echo \"one\" > \"/f\"", "echo \"two\" >> \"/f\""]
    );
}

#[test]
fn test_double_quote_rejected_before_any_write() {
    let mut h = Harness::new();
    let id = h.ready_session();
    h.writes(&id);

    let err = h.manager.write_file("/f", "fine\nsay \"hi\"").unwrap_err();
    assert!(matches!(err, Error::UnquotableArgument { .. }));
    assert!(h.manager.read_file("/my \"doc\"").is_err());
    assert!(h.writes(&id).is_empty());
    assert!(h.manager.background_slot_holder().is_none());
}

#[test]
fn test_empty_background_command_rejected() {
    assert!(BackgroundCommand::new(RequestKind::Other, Vec::<String>::new()).is_err());
}

#[test]
fn test_directory_refresh_event() {
    let mut h = Harness::new();
    h.manager.create_session();
    h.drain_events();

    h.manager.request_directory_refresh();
    let events = h.drain_events();
    assert_eq!(events, vec![SessionEvent::DirectoryRefreshRequested]);
    assert_eq!(events[0].session_id(), None);
}

#[test]
fn test_completion_addressing() {
    let mut h = Harness::new();
    let id = h.ready_session();
    h.drain_events();

    h.manager.write_file("/notes", "x").unwrap();
    h.stdout(&id, &prompt("~"));
    let done = h.completions().pop().expect("completion");
    assert_eq!(done.session_id, id);
    assert_eq!(done.target, "/notes");

    h.manager.change_directory("/").unwrap();
    h.stdout(&id, &prompt("/"));
    let done = h.completions().pop().expect("completion");
    assert_eq!(done.kind, RequestKind::ChangeDirectory);
    assert_eq!(done.target, id.to_string());
}

#[test]
fn test_snapshots_serialize() {
    let mut h = Harness::new();
    let id = h.ready_session();
    h.manager.read_file("/notes").unwrap();

    let snapshots = h.manager.snapshots();
    assert_eq!(snapshots.len(), 1);
    let snapshot = &snapshots[0];
    assert_eq!(snapshot.id, id);
    assert_eq!(snapshot.current_path, "~");
    assert!(snapshot.running);
    assert_eq!(snapshot.pid, Some(1000));
    assert_eq!(
        snapshot.pending_request,
        Some(RequestKind::ReadFile("/notes".to_string()))
    );

    let json = serde_json::to_value(snapshot).unwrap();
    assert_eq!(json["mode"], "normal");
    assert_eq!(json["pending_request"]["kind"], "read_file");
    assert_eq!(json["pending_request"]["path"], "/notes");

    let back: SessionSnapshot = serde_json::from_value(json).unwrap();
    assert_eq!(&back, snapshot);
}

#[test]
fn test_events_serialize_with_tag() {
    let mut h = Harness::new();
    let id = h.ready_session();
    h.drain_events();
    h.manager.read_file("/notes").unwrap();
    h.stdout(&id, &format!("hi\n{}", prompt("~")));

    let event = h
        .drain_events()
        .into_iter()
        .find(|e| matches!(e, SessionEvent::RequestCompleted(_)))
        .unwrap();
    let json = serde_json::to_value(&event).unwrap();
    assert_eq!(json["event"], "request_completed");
    assert_eq!(json["success"], true);
    assert_eq!(json["text"], "hi\n");
}

#[test]
fn test_set_current_session_events() {
    let mut h = Harness::new();
    let a = h.manager.create_session();
    let _b = h.manager.create_session();
    h.drain_events();

    h.manager.set_current_session(&a).unwrap();
    assert_eq!(
        h.drain_events(),
        vec![SessionEvent::CurrentChanged {
            session_id: a.clone()
        }]
    );

    // Already current: nothing to announce
    h.manager.set_current_session(&a).unwrap();
    assert!(h.drain_events().is_empty());
}

#[test]
fn test_subscribers_receive_published_events() {
    let mut h = Harness::new();
    let mut late = h.manager.subscribe();
    let id = h.manager.create_session();

    let event = tokio_test::block_on(late.recv()).expect("bus open");
    assert_eq!(event, SessionEvent::Created { session_id: id });
    assert_eq!(h.manager.events().subscription_count(), 2);
}
