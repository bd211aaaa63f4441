//! Security Tests: Password Isolation
//!
//! Passwords typed at login or sudo prompts go to the process but never
//! into the transcript, snapshots or events.

#[path = "../test_utils/mod.rs"]
mod test_utils;

use shellmux::terminal::{EraseResult, Submission};
use shellmux::{InputMode, SessionEvent};
use test_utils::*;

const SECRET: &str = "hunter2";

fn type_text(h: &mut Harness, id: &shellmux::SessionId, text: &str) {
    for ch in text.chars() {
        h.manager.handle_character(id, ch).unwrap();
    }
}

#[test]
fn test_login_flow_keeps_password_out_of_transcript() {
    let mut h = Harness::new();
    let id = h.manager.create_session();

    h.stdout(&id, USERNAME_PROMPT);
    assert_eq!(h.manager.session(&id).unwrap().mode(), InputMode::LoginUsername);
    type_text(&mut h, &id, "root");
    assert_eq!(
        h.manager.submit_line(&id).unwrap(),
        Submission::Command("root".to_string())
    );

    h.stdout(&id, PASSWORD_PROMPT);
    assert_eq!(h.manager.session(&id).unwrap().mode(), InputMode::LoginPassword);
    let before = h.transcript(&id);
    type_text(&mut h, &id, SECRET);
    assert_eq!(h.transcript(&id), before, "typing must not echo");
    assert_eq!(h.manager.session(&id).unwrap().password_len(), SECRET.len());

    assert_eq!(h.manager.submit_line(&id).unwrap(), Submission::Secret);
    assert_eq!(h.writes(&id), vec!["root\n".to_string(), format!("{}\n", SECRET)]);
    assert_eq!(h.manager.session(&id).unwrap().password_len(), 0);

    h.stdout(&id, &format!("\n{}", prompt("~")));
    let session = h.manager.session(&id).unwrap();
    assert_eq!(session.mode(), InputMode::Normal);
    assert!(session.transcript().contains("root\n"));
    assert!(!session.transcript().contains(SECRET));

    let snapshot = serde_json::to_string(&h.manager.snapshot(&id).unwrap()).unwrap();
    assert!(!snapshot.contains(SECRET));
    for event in h.drain_events() {
        let json = serde_json::to_string(&event).unwrap();
        assert!(!json.contains(SECRET), "leaked in {:?}", event);
    }
}

#[test]
fn test_erase_in_password_mode_only_touches_buffer() {
    let mut h = Harness::new();
    let id = h.manager.create_session();
    h.stdout(&id, PASSWORD_PROMPT);
    let len = h.transcript(&id).len();

    type_text(&mut h, &id, "ab");
    assert_eq!(h.manager.handle_erase(&id, len).unwrap(), EraseResult::Erased);
    assert_eq!(h.manager.session(&id).unwrap().password_len(), 1);
    assert_eq!(h.manager.handle_erase(&id, len).unwrap(), EraseResult::Erased);
    assert_eq!(h.manager.handle_erase(&id, len).unwrap(), EraseResult::Rejected);
    assert_eq!(h.transcript(&id), PASSWORD_PROMPT);
}

#[test]
fn test_sudo_prompt_hides_input() {
    let mut h = Harness::new();
    let id = h.ready_session();
    h.manager.send_line(&id, "sudo ls").unwrap();

    h.stdout(&id, &sudo_prompt("root"));
    assert_eq!(h.manager.session(&id).unwrap().mode(), InputMode::SudoPassword);

    assert_eq!(h.manager.send_line(&id, SECRET).unwrap(), Submission::Secret);
    assert!(!h.transcript(&id).contains(SECRET));
    assert_eq!(h.writes(&id).last(), Some(&format!("{}\n", SECRET)));
}

#[test]
fn test_leaving_password_mode_discards_buffer() {
    let mut h = Harness::new();
    let id = h.manager.create_session();
    h.stdout(&id, PASSWORD_PROMPT);
    type_text(&mut h, &id, SECRET);

    // Process gave up on the password and went back to the username prompt
    h.stdout(&id, &format!("\nLogin timed out\n{}", USERNAME_PROMPT));
    let session = h.manager.session(&id).unwrap();
    assert_eq!(session.mode(), InputMode::LoginUsername);
    assert_eq!(session.password_len(), 0);
}

#[test]
fn test_password_typed_during_request_is_isolated() {
    let mut h = Harness::new();
    let id = h.ready_session();
    h.drain_events();
    h.manager
        .execute_background_command("su admin", shellmux::RequestKind::Other)
        .unwrap();

    h.stdout(&id, PASSWORD_PROMPT);
    type_text(&mut h, &id, SECRET);
    // Password prompts may still be answered while a request is pending
    assert_eq!(h.manager.submit_line(&id).unwrap(), Submission::Secret);

    h.stdout(&id, &format!("\n{}", prompt("~")));
    let completions: Vec<_> = h
        .drain_events()
        .into_iter()
        .filter_map(|e| match e {
            SessionEvent::RequestCompleted(done) => Some(done),
            _ => None,
        })
        .collect();
    assert_eq!(completions.len(), 1);
    assert!(!completions[0].text.contains(SECRET));
}
