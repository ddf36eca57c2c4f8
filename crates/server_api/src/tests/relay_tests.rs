use super::*;
use crate::support::RecordingBroadcaster;
use serde_json::json;

#[tokio::test]
async fn disabled_relay_skips_publish() {
    let relay = Relay::disabled();
    assert!(!relay.is_enabled());
    relay
        .trigger("presentation-1", "presentation-start", &json!({}))
        .await
        .expect("skipped publish counts as success");
}

#[tokio::test]
async fn every_sink_is_attempted_even_after_a_failure() {
    let failing: Arc<dyn Broadcaster> = Arc::new(RecordingBroadcaster::failing());
    let recorder = Arc::new(RecordingBroadcaster::default());
    let healthy: Arc<dyn Broadcaster> = recorder.clone();
    let relay = Relay::new(vec![failing, healthy]);

    let err = relay
        .publish(
            "presentation-1",
            "presentation-end",
            &json!({ "team": null }),
            "Failed to end presentation",
        )
        .await
        .expect_err("first sink fails");
    assert_eq!(err.code, ErrorCode::Internal);
    assert_eq!(err.message, "Failed to end presentation");
    assert_eq!(recorder.events().len(), 1);
}

#[tokio::test]
async fn notify_swallows_transport_errors() {
    let failing: Arc<dyn Broadcaster> = Arc::new(RecordingBroadcaster::failing());
    let relay = Relay::new(vec![failing]);
    relay.notify("teams", "updated", &json!({})).await;
    assert_eq!(relay.sink_names(), vec!["recording"]);
}
