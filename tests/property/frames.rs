#![allow(clippy::unwrap_used, clippy::expect_used)]

//! Property-based tests for socket frame handling.
//!
//! Uses proptest to verify:
//! 1. Arbitrary text never panics in `decode_inbound` (malformed input is an `Err`).
//! 2. Any well-formed data frame decodes to the message it carries.
//! 3. Control frames are recognised no matter what else they carry.
//! 4. The identify frame always names the generated handle and the messages channel.

use chrono::{DateTime, Utc};
use proptest::prelude::*;
use roomchat_proto::cable::{
    self, ControlFrame, InboundFrame, MESSAGES_CHANNEL, SubscribeCommand, SubscriptionHandle,
};
use roomchat_proto::model::{Message, MessageId, Participant, ParticipantId};

/// Strategy for creation timestamps with whole-second precision.
fn arb_timestamp() -> impl Strategy<Value = DateTime<Utc>> {
    (0i64..4_000_000_000).prop_map(|secs| DateTime::from_timestamp(secs, 0).unwrap_or_default())
}

/// Strategy for arbitrary chat messages.
fn arb_message() -> impl Strategy<Value = Message> {
    (
        any::<i64>(),
        ".{0,200}",
        arb_timestamp(),
        any::<i64>(),
        "[a-zA-Z ]{1,32}",
    )
        .prop_map(|(id, body, created_at, user_id, name)| Message {
            id: MessageId::new(id),
            body,
            created_at,
            user: Participant::new(ParticipantId::new(user_id), name),
        })
}

proptest! {
    #[test]
    fn decode_never_panics(text in ".*") {
        let _ = cable::decode_inbound(&text);
    }

    #[test]
    fn decode_never_panics_on_json_objects(key in "[a-z_]{1,12}", value in ".*") {
        let text = serde_json::json!({ key: value }).to_string();
        let _ = cable::decode_inbound(&text);
    }

    #[test]
    fn data_frame_carries_message(msg in arb_message()) {
        let text = serde_json::json!({ "message": msg }).to_string();
        let decoded = cable::decode_inbound(&text).unwrap();
        prop_assert_eq!(decoded, InboundFrame::Data(msg));
    }

    #[test]
    fn control_frames_ignore_payload(
        kind in prop_oneof![Just("ping"), Just("welcome"), Just("confirm_subscription")],
        msg in arb_message(),
    ) {
        let text = serde_json::json!({ "type": kind, "message": msg }).to_string();
        let decoded = cable::decode_inbound(&text).unwrap();
        prop_assert!(matches!(decoded, InboundFrame::Control(_)));
        prop_assert_eq!(decoded, InboundFrame::Control(ControlFrame::from_type(kind).unwrap()));
    }

    #[test]
    fn identify_names_handle_and_channel(token in "[0-9a-z]{1,32}") {
        let handle = SubscriptionHandle::new(token.clone());
        let text = cable::encode_identify(&handle).unwrap();
        let command: SubscribeCommand = serde_json::from_str(&text).unwrap();
        let identifier = command.channel_identifier().unwrap();
        prop_assert_eq!(command.command.as_str(), "subscribe");
        prop_assert_eq!(identifier.id, token);
        prop_assert_eq!(identifier.channel.as_str(), MESSAGES_CHANNEL);
    }
}
