use super::*;
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config(host: Option<String>) -> PusherConfig {
    PusherConfig {
        app_id: "3".into(),
        key: "278d425bdf160c739803".into(),
        secret: "7ad3773142a6692b25b8".into(),
        cluster: "eu".into(),
        host,
    }
}

#[test]
fn default_base_url_uses_cluster() {
    let config = config(None);
    assert_eq!(config.base_url(), "https://api-eu.pusher.com");
    assert_eq!(config.events_path(), "/apps/3/events");
}

#[test]
fn signature_covers_method_path_and_query() {
    let query = "auth_key=k&auth_timestamp=1&auth_version=1.0&body_md5=abc";
    let signature = sign_request("secret", "POST", "/apps/3/events", query).expect("sign");

    let mut mac = Hmac::<Sha256>::new_from_slice(b"secret").expect("key");
    mac.update(b"POST\n/apps/3/events\nauth_key=k&auth_timestamp=1&auth_version=1.0&body_md5=abc");
    assert_eq!(signature, hex::encode(mac.finalize().into_bytes()));
    assert_eq!(signature.len(), 64);

    let other = sign_request("secret", "POST", "/apps/4/events", query).expect("sign");
    assert_ne!(signature, other);
}

#[test]
fn signed_query_carries_body_digest() {
    let client = PusherClient::new(config(None)).expect("client");
    let query = client.signed_query("{}", 1_353_088_179).expect("query");

    assert!(query.starts_with(
        "auth_key=278d425bdf160c739803&auth_timestamp=1353088179&auth_version=1.0&body_md5=99914b932bd37a50b983c5e7c90ae93b&auth_signature="
    ));
}

#[tokio::test]
async fn trigger_posts_signed_event() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/apps/3/events"))
        .and(query_param("auth_key", "278d425bdf160c739803"))
        .and(query_param("auth_version", "1.0"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
        .expect(1)
        .mount(&server)
        .await;

    let client = PusherClient::new(config(Some(server.uri()))).expect("client");
    client
        .trigger("presentation-9", "timer-update", &json!({ "timer": 30 }))
        .await
        .expect("trigger");

    let requests = server.received_requests().await.expect("recording");
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).expect("body");
    assert_eq!(body["name"], "timer-update");
    assert_eq!(body["channels"], json!(["presentation-9"]));
    assert_eq!(body["data"], r#"{"timer":30}"#);
}

#[tokio::test]
async fn rejected_publish_surfaces_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/apps/3/events"))
        .respond_with(ResponseTemplate::new(401).set_body_string("Invalid signature"))
        .mount(&server)
        .await;

    let client = PusherClient::new(config(Some(server.uri()))).expect("client");
    let err = client
        .trigger("presentation-9", "presentation-end", &json!({ "team": null }))
        .await
        .expect_err("rejected");
    match err {
        TriggerError::Status { status, body } => {
            assert_eq!(status, 401);
            assert_eq!(body, "Invalid signature");
        }
        other => panic!("unexpected error: {other}"),
    }
}
