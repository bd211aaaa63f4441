//! Unit tests for output decoding and normalization

use shellmux::terminal::output::normalize;
use shellmux::terminal::{strip_ansi_codes, OutputNormalizer, Utf8Decoder};

#[test]
fn test_strip_colors() {
    assert_eq!(strip_ansi_codes("\x1b[1;32mgreen\x1b[0m text"), "green text");
    assert_eq!(strip_ansi_codes("\x1b]0;title\x07after"), "after");
}

#[test]
fn test_line_endings_and_controls() {
    let out = normalize("a\r\nb\tc\x07\x08d\n");
    assert_eq!(out.text, "a\nb\tcd\n");
    assert!(!out.screen_reset);
}

#[test]
fn test_screen_reset_keeps_text_after_last_reset() {
    let out = normalize("old\x1b[2Jmiddle\x1b[3Jnew");
    assert!(out.screen_reset);
    assert_eq!(out.text, "new");

    let out = normalize("before\x0cafter");
    assert!(out.screen_reset);
    assert_eq!(out.text, "after");

    let out = normalize("x\x1bcy");
    assert!(out.screen_reset);
    assert_eq!(out.text, "y");
}

#[test]
fn test_normalizer_joins_split_escape() {
    let mut normalizer = OutputNormalizer::new();
    let first = normalizer.push("red: \x1b[3");
    assert_eq!(first.text, "red: ");
    let second = normalizer.push("1mon\x1b[0m");
    assert_eq!(second.text, "on");
}

#[test]
fn test_normalizer_reset_drops_partial_escape() {
    let mut normalizer = OutputNormalizer::new();
    normalizer.push("\x1b[");
    normalizer.reset();
    assert_eq!(normalizer.push("plain").text, "plain");
}

#[test]
fn test_normalizer_gives_up_on_overlong_escape() {
    let mut normalizer = OutputNormalizer::new();
    let long = format!("\x1b]{}", "t".repeat(100));
    // Not held back forever; the bare ESC is dropped as a control character
    let out = normalizer.push(&long);
    assert!(out.text.ends_with("ttt"));
}

#[test]
fn test_decoder_across_reads() {
    let mut decoder = Utf8Decoder::new();
    let bytes = "añb€".as_bytes();
    let mut text = String::new();
    for byte in bytes {
        text.push_str(&decoder.decode(std::slice::from_ref(byte)));
    }
    assert_eq!(text, "añb€");
    assert!(!decoder.has_pending());
    assert_eq!(decoder.finish(), "");
}
