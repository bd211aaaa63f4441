//! Property-based tests for interactive input

#[path = "../test_utils/mod.rs"]
mod test_utils;

use proptest::prelude::*;
use shellmux::terminal::EraseResult;
use test_utils::*;

proptest! {
    #[test]
    fn test_erase_never_reaches_history(
        typed in "[a-zA-Z0-9 é]{0,20}",
        caret_back in 0usize..64,
    ) {
        let mut h = Harness::new();
        let id = h.ready_session();
        for ch in typed.chars() {
            h.manager.handle_character(&id, ch).unwrap();
        }
        let session = h.manager.session(&id).unwrap();
        let input_start = session.input_start();
        let history = session.transcript()[..input_start].to_string();
        let caret = input_start.saturating_sub(caret_back);

        prop_assert_eq!(h.manager.handle_erase(&id, caret).unwrap(), EraseResult::Rejected);
        prop_assert_eq!(&h.transcript(&id)[..input_start], history.as_str());
    }

    #[test]
    fn test_backspace_removes_only_typed_text(typed in "[a-zA-Z0-9 ñ]{0,20}", extra in 0usize..5) {
        let mut h = Harness::new();
        let id = h.ready_session();
        let before = h.transcript(&id);
        for ch in typed.chars() {
            h.manager.handle_character(&id, ch).unwrap();
        }
        for _ in 0..typed.chars().count() {
            let caret = h.transcript(&id).len();
            prop_assert_eq!(h.manager.handle_erase(&id, caret).unwrap(), EraseResult::Erased);
        }
        for _ in 0..extra {
            let caret = h.transcript(&id).len();
            prop_assert_eq!(h.manager.handle_erase(&id, caret).unwrap(), EraseResult::Rejected);
        }
        prop_assert_eq!(h.transcript(&id), before);
    }

    #[test]
    fn test_password_typing_never_changes_transcript(secret in "[ -~]{1,32}") {
        let mut h = Harness::new();
        let id = h.manager.create_session();
        h.stdout(&id, PASSWORD_PROMPT);
        let before = h.transcript(&id);

        for ch in secret.chars() {
            h.manager.handle_character(&id, ch).unwrap();
        }
        prop_assert_eq!(h.transcript(&id), before.clone());
        prop_assert_eq!(h.manager.session(&id).unwrap().password_len(), secret.len());

        h.manager.submit_line(&id).unwrap();
        prop_assert!(!h.transcript(&id).contains(&secret) || before.contains(&secret));
        prop_assert_eq!(h.manager.session(&id).unwrap().password_len(), 0);
    }
}
