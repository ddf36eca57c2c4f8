use super::*;
use axum::{
    body::{self, Body},
    http::{Request, StatusCode},
    response::Response,
};
use serde_json::{json, Value};
use server_api::auth::issue_token;
use shared::domain::{Role, UserId};
use tower::ServiceExt;

fn test_auth() -> AuthConfig {
    AuthConfig {
        jwt_secret: "test-secret".into(),
        token_ttl_seconds: 3600,
        bcrypt_cost: 4,
    }
}

async fn test_app(hub: Option<LocalHub>) -> Router {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let relay = match &hub {
        Some(hub) => {
            let sink: Arc<dyn Broadcaster> = Arc::new(hub.clone());
            Relay::new(vec![sink])
        }
        None => Relay::disabled(),
    };
    let api = ApiContext {
        storage,
        auth: test_auth(),
        relay,
    };
    build_router(Arc::new(AppState { api, hub }), &Settings::default())
}

fn bearer(role: Role) -> String {
    let token = issue_token(&test_auth(), UserId(1), role).expect("token");
    format!("Bearer {token}")
}

fn post_json(uri: &str, auth: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::post(uri).header("content-type", "application/json");
    if let Some(auth) = auth {
        builder = builder.header("authorization", auth);
    }
    builder.body(Body::from(body.to_string())).expect("request")
}

async fn json_body(response: Response) -> Value {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json")
}

#[tokio::test]
async fn healthz_reports_ok_when_storage_is_ready() {
    let app = test_app(None).await;
    let request = Request::get("/healthz")
        .body(Body::empty())
        .expect("request");
    let response = app.oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let body = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    assert_eq!(body.as_ref(), b"ok");
}

#[tokio::test]
async fn api_root_reports_running() {
    let app = test_app(None).await;
    let response = app
        .oneshot(Request::get("/api").body(Body::empty()).expect("request"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "success");
    assert_eq!(body["message"], "API is running");
}

#[tokio::test]
async fn presentation_routes_require_a_valid_token() {
    let app = test_app(None).await;

    let missing = app
        .clone()
        .oneshot(post_json("/api/presentations/1/start", None, json!({})))
        .await
        .expect("response");
    assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(missing).await["message"], "Authentication required");

    let forged = app
        .oneshot(post_json(
            "/api/presentations/1/start",
            Some("Bearer not-a-jwt"),
            json!({}),
        ))
        .await
        .expect("response");
    assert_eq!(forged.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(forged).await["message"], "Invalid token");
}

#[tokio::test]
async fn register_then_fetch_profile() {
    let app = test_app(None).await;
    let register = app
        .clone()
        .oneshot(post_json(
            "/api/auth/register",
            None,
            json!({ "email": "Ada@Example.edu", "password": "pw", "name": "Ada", "role": "teacher" }),
        ))
        .await
        .expect("response");
    assert_eq!(register.status(), StatusCode::CREATED);
    let registered = json_body(register).await;
    let token = registered["token"].as_str().expect("token").to_string();

    let me = app
        .clone()
        .oneshot(
            Request::get("/api/auth/me")
                .header("authorization", format!("Bearer {token}"))
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(me.status(), StatusCode::OK);
    let profile = json_body(me).await;
    assert_eq!(profile["email"], "ada@example.edu");
    assert_eq!(profile["role"], "teacher");

    let duplicate = app
        .oneshot(post_json(
            "/api/auth/register",
            None,
            json!({ "email": "ada@example.edu", "password": "pw" }),
        ))
        .await
        .expect("response");
    assert_eq!(duplicate.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(duplicate).await["message"], "User already exists");
}

#[tokio::test]
async fn peers_cannot_create_classes() {
    let app = test_app(None).await;
    let auth = bearer(Role::Peer);
    let response = app
        .oneshot(post_json(
            "/api/classes",
            Some(&auth),
            json!({ "name": "CS-A", "semester": "5" }),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn start_reaches_local_hub_subscribers() {
    let hub = LocalHub::new(8);
    let mut rx = hub.subscribe();
    let app = test_app(Some(hub)).await;
    let auth = bearer(Role::Teacher);

    let response = app
        .oneshot(post_json(
            "/api/presentations/7/start",
            Some(&auth),
            json!({ "team": { "name": "Alpha" } }),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["message"], "Presentation started");

    let event = rx.recv().await.expect("event");
    assert_eq!(event.channel, "presentation-7");
    assert_eq!(event.event, "presentation-start");
    assert_eq!(event.data, json!({ "team": { "name": "Alpha" }, "timer": 0 }));
}

#[tokio::test]
async fn empty_presentation_body_relays_defaults() {
    let hub = LocalHub::new(8);
    let mut rx = hub.subscribe();
    let app = test_app(Some(hub)).await;

    let request = Request::post("/api/presentations/3/start")
        .header("authorization", bearer(Role::Teacher))
        .body(Body::empty())
        .expect("request");
    let response = app.clone().oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["message"], "Presentation started");

    let event = rx.recv().await.expect("event");
    assert_eq!(event.channel, "presentation-3");
    assert_eq!(event.data, json!({ "team": null, "timer": 0 }));

    let malformed = Request::post("/api/presentations/3/end")
        .header("authorization", bearer(Role::Teacher))
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .expect("request");
    let response = app.oneshot(malformed).await.expect("response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn timer_rejects_non_numeric_values() {
    let app = test_app(Some(LocalHub::new(8))).await;
    let auth = bearer(Role::Teacher);
    let response = app
        .oneshot(post_json(
            "/api/presentations/7/timer",
            Some(&auth),
            json!({ "timer": "soon", "team": null }),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["code"], "validation");
    assert_eq!(body["message"], "Timer must be a number");
}

#[tokio::test]
async fn without_transport_timer_degrades_and_form_push_is_unavailable() {
    let app = test_app(None).await;
    let auth = bearer(Role::Teacher);

    let timer = app
        .clone()
        .oneshot(post_json(
            "/api/presentations/7/timer",
            Some(&auth),
            json!({ "timer": 42, "team": null }),
        ))
        .await
        .expect("response");
    assert_eq!(timer.status(), StatusCode::OK);
    assert_eq!(
        json_body(timer).await["message"],
        "Timer updated (realtime not available)"
    );

    let push = app
        .oneshot(post_json(
            "/api/presentations/7/evaluation-form",
            Some(&auth),
            json!({ "form": { "title": "Demo", "evaluationTime": 120 } }),
        ))
        .await
        .expect("response");
    assert_eq!(push.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn missing_project_is_not_found() {
    let app = test_app(None).await;
    let response = app
        .oneshot(
            Request::get("/api/projects/404")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(json_body(response).await["message"], "Project not found");
}

#[test]
fn error_codes_map_to_statuses() {
    assert_eq!(api::status_for(ErrorCode::Unauthorized), StatusCode::UNAUTHORIZED);
    assert_eq!(api::status_for(ErrorCode::Validation), StatusCode::BAD_REQUEST);
    assert_eq!(
        api::status_for(ErrorCode::Unavailable),
        StatusCode::SERVICE_UNAVAILABLE
    );
}
