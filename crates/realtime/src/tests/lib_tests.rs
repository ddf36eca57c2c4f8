use super::*;
use serde_json::json;

#[test]
fn channel_names_follow_transport_charset() {
    assert!(validate_channel("presentation-42").is_ok());
    assert!(validate_channel("queue-7").is_ok());
    assert!(validate_channel("a_b=c@d,e.f;g").is_ok());
    assert!(validate_channel("").is_err());
    assert!(validate_channel("has space").is_err());
    assert!(validate_channel(&"x".repeat(MAX_CHANNEL_NAME_LEN + 1)).is_err());
}

#[test]
fn event_name_length_is_capped() {
    assert!(validate_event("timer-update").is_ok());
    assert!(validate_event("").is_err());
    assert!(validate_event(&"e".repeat(MAX_EVENT_NAME_LEN + 1)).is_err());
}

#[test]
fn oversized_payload_is_rejected() {
    let small = json!({ "timer": 12 });
    assert_eq!(encode_payload(&small).expect("encode"), r#"{"timer":12}"#);

    let large = json!({ "blob": "z".repeat(MAX_PAYLOAD_BYTES) });
    assert!(matches!(
        encode_payload(&large),
        Err(TriggerError::PayloadTooLarge(_))
    ));
}
