//! Property-based tests for the line protocol.
//!
//! These tests generate arbitrary messages and arguments and check the
//! invariants the host relies on: a response is always one line with
//! exactly five fields, and a message survives the trip intact.

use fingerkey_core::SlotId;
use fingerkey_protocol::command::parse_integer;
use fingerkey_protocol::{Command, CommandTag, Response, ResponseKind};
use proptest::prelude::*;

fn any_kind() -> impl Strategy<Value = ResponseKind> {
    prop_oneof![
        Just(ResponseKind::Success),
        Just(ResponseKind::Failure),
        Just(ResponseKind::Ready),
        Just(ResponseKind::Info),
    ]
}

/// Messages biased towards the characters that need escaping.
fn any_message() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-zA-Z0-9 ,\\\\\n\r#.-]{0,80}")
        .expect("Failed to create message regex strategy")
}

proptest! {
    /// Property: a serialized response is a single line with five fields.
    #[test]
    fn prop_response_is_single_line(
        kind in any_kind(),
        id in any::<u16>(),
        confidence in any::<u16>(),
        message in any_message(),
    ) {
        let line = Response::new(kind, id, confidence, message).to_line();

        prop_assert!(!line.contains('\n'));
        prop_assert!(!line.contains('\r'));
        prop_assert!(line.starts_with("R,"));

        let prefix: Vec<&str> = line.splitn(5, ',').collect();
        prop_assert_eq!(prefix.len(), 5);
        prop_assert_eq!(prefix[1].chars().count(), 1);
        prop_assert_eq!(prefix[2], id.to_string());
        prop_assert_eq!(prefix[3], confidence.to_string());
    }

    /// Property: the message field contains no unescaped delimiter.
    #[test]
    fn prop_no_delimiter_injection(message in any_message()) {
        let line = Response::failure(0, message).to_line();
        let field = line.splitn(5, ',').nth(4).unwrap_or_default();

        let mut escaped = false;
        for c in field.chars() {
            if escaped {
                escaped = false;
                continue;
            }
            match c {
                '\\' => escaped = true,
                ',' => prop_assert!(false, "bare delimiter in {field:?}"),
                _ => {}
            }
        }
    }

    /// Property: parse_line recovers every field of to_line.
    #[test]
    fn prop_response_line_preserves_fields(
        kind in any_kind(),
        id in any::<u16>(),
        confidence in any::<u16>(),
        message in any_message(),
    ) {
        let response = Response::new(kind, id, confidence, message);
        let parsed = Response::parse_line(&response.to_line()).unwrap();
        prop_assert_eq!(parsed, response);
    }

    /// Property: every in-range slot is accepted, every other value rejected.
    #[test]
    fn prop_slot_range(value in -1000i64..1000) {
        let cmd = Command::parse(&format!("D{value}")).unwrap();
        prop_assert_eq!(cmd.tag, CommandTag::Delete);
        prop_assert_eq!(cmd.argument, Some(value));
        prop_assert_eq!(cmd.slot().is_ok(), (1..=127).contains(&value));
    }

    /// Property: host-built commands parse back to the same command.
    #[test]
    fn prop_command_wire_form(raw in 1u16..=127) {
        let slot = SlotId::new(raw).unwrap();
        for cmd in [Command::enroll(slot), Command::delete(slot)] {
            let parsed = Command::parse(&cmd.to_wire()).unwrap();
            prop_assert_eq!(parsed, cmd);
            prop_assert_eq!(parsed.slot().unwrap(), slot);
        }
    }

    /// Property: leading junk never changes the parsed integer.
    #[test]
    fn prop_parse_integer_skips_junk(junk in "[a-zA-Z ]{0,10}", value in 0i64..100_000) {
        let input = format!("{junk}{value}\n");
        let (parsed, consumed) = parse_integer(&input).unwrap();
        prop_assert_eq!(parsed, value);
        prop_assert_eq!(consumed, input.len() - 1);
    }
}
