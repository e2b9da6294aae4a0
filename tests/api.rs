mod common;

use std::time::Duration;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use futures::StreamExt;
use serde_json::json;
use tower::ServiceExt;

use common::{test_app, FixedResponder, TestApp};
use folio_chat::responder::FALLBACK_REPLY;

type Frames = axum::body::BodyDataStream;

async fn open_stream(app: &TestApp, uri: &str) -> Frames {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    response.into_body().into_data_stream()
}

/// Collect SSE text until `needle` shows up.
async fn read_until(frames: &mut Frames, needle: &str) -> String {
    let mut text = String::new();
    let read = tokio::time::timeout(Duration::from_secs(5), async {
        while !text.contains(needle) {
            let frame = frames.next().await.expect("stream ended").unwrap();
            text.push_str(&String::from_utf8_lossy(&frame));
        }
    })
    .await;
    assert!(read.is_ok(), "{:?} not seen in {:?}", needle, text);
    text
}

#[tokio::test]
async fn start_requires_identity() {
    let app = test_app(FixedResponder::replying("hi")).await;

    let (status, body) = app.post("/chat/start", None, json!({})).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "authentication required");

    let (status, _) = app.post("/chat/start", Some("bogus"), json!({})).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn start_accepts_an_empty_body() {
    let app = test_app(FixedResponder::replying("hi")).await;
    let token = app.visitor_token().await;

    let (status, body) = app
        .call(axum::http::Method::POST, "/chat/start", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["conversationId"].is_string());
}

#[tokio::test]
async fn start_rejects_malformed_body() {
    let app = test_app(FixedResponder::replying("hi")).await;
    let token = app.visitor_token().await;

    let request = Request::builder()
        .method(axum::http::Method::POST)
        .uri("/chat/start")
        .header("authorization", format!("Bearer {}", token))
        .header("content-type", "application/json")
        .body(Body::from("{\"reset\": tru"))
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn start_honors_reset_and_name() {
    let app = test_app(FixedResponder::replying("hi")).await;
    let token = app.visitor_token().await;

    let (_, first) = app.post("/chat/start", Some(&token), json!({})).await;
    let (status, fresh) = app
        .post("/chat/start", Some(&token), json!({ "name": "Ada", "reset": true }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_ne!(fresh["conversationId"], first["conversationId"]);

    let owner = app.owner_token().await;
    let (_, inbox) = app.get("/admin/conversations", Some(&owner)).await;
    let row = inbox["conversations"]
        .as_array()
        .unwrap()
        .iter()
        .find(|c| c["id"] == fresh["conversationId"])
        .unwrap()
        .clone();
    assert_eq!(row["visitorName"], "Ada");
}

#[tokio::test]
async fn send_validates_input() {
    let app = test_app(FixedResponder::replying("hi")).await;
    let token = app.visitor_token().await;
    let (_, started) = app.post("/chat/start", Some(&token), json!({})).await;
    let conv = started["conversationId"].as_str().unwrap();

    let (status, _) = app
        .post("/chat/send", None, json!({ "conversationId": conv, "content": "hi" }))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = app
        .post("/chat/send", Some(&token), json!({ "conversationId": conv }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "content is required");

    let (status, _) = app
        .post("/chat/send", Some(&token), json!({ "conversationId": conv, "content": "   " }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app.post("/chat/send", Some(&token), json!({ "content": "hi" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "conversationId is required");

    let (status, _) = app
        .post("/chat/send", Some(&token), json!({ "conversationId": "nope", "content": "hi" }))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn fresh_visitor_asks_about_projects() {
    let app = test_app(FixedResponder::replying("Here are my projects.")).await;
    let token = app.visitor_token().await;

    let (status, started) = app.post("/chat/start", Some(&token), json!({ "name": "Ada" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(started["isHumanControlled"], false);
    assert_eq!(started["messages"], json!([]));
    let conv = started["conversationId"].as_str().unwrap().to_string();

    let (status, sent) = app
        .post(
            "/chat/send",
            Some(&token),
            json!({ "conversationId": conv, "content": "Tell me about your projects", "intent": "projects" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(sent["reply"], "Here are my projects.");
    assert_eq!(sent["message"]["sender"], "automated");
    assert_eq!(sent["display"]["kind"], "show_projects");
    assert!(sent["display"]["projectIds"].as_array().unwrap().len() > 0);

    let (_, resumed) = app.post("/chat/start", Some(&token), json!({})).await;
    assert_eq!(resumed["conversationId"], conv.as_str());
    let messages = resumed["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0]["sender"], "visitor");
    assert_eq!(messages[0]["content"], "Tell me about your projects");
    assert_eq!(messages[1]["sender"], "automated");
}

#[tokio::test]
async fn unknown_intent_gets_general_reply_without_directive() {
    let app = test_app(FixedResponder::replying("Hello!")).await;
    let token = app.visitor_token().await;
    let (_, started) = app.post("/chat/start", Some(&token), json!({})).await;

    let (status, sent) = app
        .post(
            "/chat/send",
            Some(&token),
            json!({ "conversationId": started["conversationId"], "content": "hey", "intent": "weather" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(sent["reply"], "Hello!");
    assert!(sent.get("display").is_none());
}

#[tokio::test]
async fn takeover_routes_visitor_to_operator() {
    let responder = FixedResponder::replying("bot reply");
    let app = test_app(responder.clone()).await;
    let visitor = app.visitor_token().await;
    let owner = app.owner_token().await;

    let (_, started) = app.post("/chat/start", Some(&visitor), json!({})).await;
    let conv = started["conversationId"].as_str().unwrap().to_string();

    let (status, body) = app
        .post("/admin/takeover", Some(&owner), json!({ "conversationId": conv }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "success": true, "mode": "manual" }));

    let (status, body) = app
        .post("/chat/send", Some(&visitor), json!({ "conversationId": conv, "content": "hello" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "status": "sent_to_operator" }));
    assert_eq!(responder.call_count(), 0);

    let (status, body) = app
        .post(
            "/admin/send",
            Some(&owner),
            json!({ "conversationId": conv, "content": "Hi! Alex here." }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["mode"], "manual");
    assert_eq!(body["message"]["sender"], "operator");

    let (status, body) = app
        .get(&format!("/admin/conversations/{}/messages", conv), Some(&owner))
        .await;
    assert_eq!(status, StatusCode::OK);
    let senders: Vec<_> = body["messages"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["sender"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(senders, vec!["visitor", "operator"]);

    let (_, resumed) = app.post("/chat/start", Some(&visitor), json!({})).await;
    assert_eq!(resumed["isHumanControlled"], true);

    let (status, body) = app
        .post("/admin/release", Some(&owner), json!({ "conversationId": conv }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "success": true, "mode": "ai" }));

    let (_, body) = app
        .post("/chat/send", Some(&visitor), json!({ "conversationId": conv, "content": "still there?" }))
        .await;
    assert_eq!(body["reply"], "bot reply");
}

#[tokio::test]
async fn non_owners_cannot_change_mode() {
    let app = test_app(FixedResponder::replying("hi")).await;
    let visitor = app.visitor_token().await;
    let (_, started) = app.post("/chat/start", Some(&visitor), json!({})).await;
    let conv = started["conversationId"].as_str().unwrap().to_string();

    let (status, _) = app
        .post("/admin/takeover", Some(&visitor), json!({ "conversationId": conv }))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app.post("/admin/takeover", None, json!({ "conversationId": conv })).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .post("/admin/send", Some(&visitor), json!({ "conversationId": conv, "content": "fake" }))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let stored = app.store.get_conversation(&conv).await.unwrap().unwrap();
    assert!(stored.assigned_operator.is_none());
    assert!(app.store.all_messages(&conv).await.unwrap().is_empty());

    // Release by a non-owner leaves a human-controlled conversation alone too.
    let owner = app.owner_token().await;
    app.post("/admin/takeover", Some(&owner), json!({ "conversationId": conv }))
        .await;
    let (status, _) = app
        .post("/admin/release", Some(&visitor), json!({ "conversationId": conv }))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let stored = app.store.get_conversation(&conv).await.unwrap().unwrap();
    assert!(stored.assigned_operator.is_some());
}

#[tokio::test]
async fn wrong_owner_credentials_are_rejected() {
    let app = test_app(FixedResponder::replying("hi")).await;

    let (status, _) = app
        .post("/auth/login", None, json!({ "email": common::OWNER_EMAIL, "password": "nope" }))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app.post("/auth/login", None, json!({ "email": "" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn responder_outage_yields_single_fallback() {
    let app = test_app(FixedResponder::failing()).await;
    let token = app.visitor_token().await;
    let (_, started) = app.post("/chat/start", Some(&token), json!({})).await;
    let conv = started["conversationId"].as_str().unwrap().to_string();

    let (status, body) = app
        .post("/chat/send", Some(&token), json!({ "conversationId": conv, "content": "hi" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["reply"], FALLBACK_REPLY);

    let messages = app.store.all_messages(&conv).await.unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[1].content, FALLBACK_REPLY);
}

#[tokio::test]
async fn visitors_cannot_post_into_other_conversations() {
    let app = test_app(FixedResponder::replying("hi")).await;
    let alice = app.visitor_token().await;
    let bob = app.visitor_token().await;
    let (_, started) = app.post("/chat/start", Some(&alice), json!({})).await;

    let (status, _) = app
        .post(
            "/chat/send",
            Some(&bob),
            json!({ "conversationId": started["conversationId"], "content": "hi" }),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn owner_cannot_post_through_visitor_endpoint() {
    let responder = FixedResponder::replying("hi");
    let app = test_app(responder.clone()).await;
    let visitor = app.visitor_token().await;
    let owner = app.owner_token().await;
    let (_, started) = app.post("/chat/start", Some(&visitor), json!({})).await;
    let conv = started["conversationId"].as_str().unwrap().to_string();

    let (status, _) = app
        .post("/chat/send", Some(&owner), json!({ "conversationId": conv, "content": "hi" }))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(app.store.all_messages(&conv).await.unwrap().is_empty());
    assert_eq!(responder.call_count(), 0);
}

#[tokio::test]
async fn inbox_reports_presence() {
    let app = test_app(FixedResponder::replying("hi")).await;
    let visitor = app.visitor_token().await;
    let owner = app.owner_token().await;
    let (_, started) = app.post("/chat/start", Some(&visitor), json!({ "name": "Ada" })).await;
    let conv = started["conversationId"].as_str().unwrap().to_string();

    let (_, inbox) = app.get("/admin/conversations", Some(&owner)).await;
    assert_eq!(inbox["conversations"][0]["online"], false);

    let (status, _) = app
        .post("/chat/heartbeat", Some(&visitor), json!({ "conversationId": conv }))
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, inbox) = app.get("/admin/conversations", Some(&owner)).await;
    assert_eq!(status, StatusCode::OK);
    let row = &inbox["conversations"][0];
    assert_eq!(row["id"], conv.as_str());
    assert_eq!(row["online"], true);
    assert_eq!(row["visitorName"], "Ada");
    assert_eq!(row["mode"], "ai");

    let (status, _) = app.get("/admin/conversations", Some(&visitor)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn content_endpoints_fall_back_to_samples() {
    let app = test_app(FixedResponder::replying("hi")).await;

    let (status, profile) = app.get("/content/profile", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(profile["name"].is_string());

    for path in [
        "/content/projects",
        "/content/skills",
        "/content/experiences",
        "/content/interests",
        "/content/vision-cards",
        "/content/background-cards",
    ] {
        let (status, body) = app.get(path, None).await;
        assert_eq!(status, StatusCode::OK, "{}", path);
        assert!(!body.as_array().unwrap().is_empty(), "{} was empty", path);
    }
}

#[tokio::test]
async fn visitor_stream_pushes_mode_changes() {
    let app = test_app(FixedResponder::replying("hi")).await;
    let visitor = app.visitor_token().await;
    let owner = app.owner_token().await;
    let (_, started) = app.post("/chat/start", Some(&visitor), json!({})).await;
    let conv = started["conversationId"].as_str().unwrap().to_string();

    let request = Request::builder()
        .uri(format!("/chat/events?conversationId={}&token={}", conv, visitor))
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let mut frames = response.into_body().into_data_stream();

    app.post("/admin/takeover", Some(&owner), json!({ "conversationId": conv }))
        .await;

    let frame = tokio::time::timeout(Duration::from_secs(5), frames.next())
        .await
        .expect("no event within 5s")
        .unwrap()
        .unwrap();
    let text = String::from_utf8(frame.to_vec()).unwrap();
    assert!(text.contains("event: mode_changed"), "{}", text);
    assert!(text.contains("\"mode\":\"manual\""), "{}", text);
}

#[tokio::test]
async fn visitor_stream_requires_own_conversation() {
    let app = test_app(FixedResponder::replying("hi")).await;
    let alice = app.visitor_token().await;
    let bob = app.visitor_token().await;
    let (_, started) = app.post("/chat/start", Some(&alice), json!({})).await;
    let conv = started["conversationId"].as_str().unwrap();

    let (status, _) = app
        .get(&format!("/chat/events?conversationId={}&token={}", conv, bob), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app.get(&format!("/chat/events?conversationId={}", conv), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn operator_message_reaches_visitor_stream() {
    let app = test_app(FixedResponder::replying("hi")).await;
    let visitor = app.visitor_token().await;
    let owner = app.owner_token().await;
    let (_, started) = app.post("/chat/start", Some(&visitor), json!({})).await;
    let conv = started["conversationId"].as_str().unwrap().to_string();

    let mut frames = open_stream(
        &app,
        &format!("/chat/events?conversationId={}&token={}", conv, visitor),
    )
    .await;

    let (status, _) = app
        .post("/admin/send", Some(&owner), json!({ "conversationId": conv, "content": "Alex here" }))
        .await;
    assert_eq!(status, StatusCode::OK);

    let text = read_until(&mut frames, "Alex here").await;
    assert!(text.contains("event: mode_changed"), "{}", text);
    assert!(text.contains("event: message"), "{}", text);
    assert!(text.contains("\"sender\":\"operator\""), "{}", text);
    assert!(
        text.find("event: mode_changed").unwrap() < text.find("event: message").unwrap(),
        "{}",
        text
    );
}

#[tokio::test]
async fn visitor_stream_omits_presence() {
    let app = test_app(FixedResponder::replying("hi")).await;
    let visitor = app.visitor_token().await;
    let owner = app.owner_token().await;
    let (_, started) = app.post("/chat/start", Some(&visitor), json!({})).await;
    let conv = started["conversationId"].as_str().unwrap().to_string();

    let mut frames = open_stream(
        &app,
        &format!("/chat/events?conversationId={}&token={}", conv, visitor),
    )
    .await;

    // Published in this order; only the second may reach the visitor.
    app.post("/chat/heartbeat", Some(&visitor), json!({ "conversationId": conv }))
        .await;
    app.post("/admin/takeover", Some(&owner), json!({ "conversationId": conv }))
        .await;

    let text = read_until(&mut frames, "event: mode_changed").await;
    assert!(!text.contains("presence"), "{}", text);
    assert!(!text.contains("online"), "{}", text);
}

#[tokio::test]
async fn admin_stream_sees_everything() {
    let app = test_app(FixedResponder::replying("bot says hi")).await;
    let visitor = app.visitor_token().await;
    let owner = app.owner_token().await;

    let (status, _) = app.get(&format!("/admin/events?token={}", visitor), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app.get("/admin/events", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let mut frames = open_stream(&app, &format!("/admin/events?token={}", owner)).await;

    let (_, started) = app.post("/chat/start", Some(&visitor), json!({})).await;
    let conv = started["conversationId"].as_str().unwrap().to_string();
    app.post("/chat/heartbeat", Some(&visitor), json!({ "conversationId": conv }))
        .await;
    app.post("/chat/send", Some(&visitor), json!({ "conversationId": conv, "content": "hello" }))
        .await;

    let text = read_until(&mut frames, "bot says hi").await;
    assert!(text.contains("event: presence"), "{}", text);
    assert!(text.contains("\"online\":true"), "{}", text);
    assert!(text.contains("\"content\":\"hello\""), "{}", text);
    assert!(text.contains(&conv), "{}", text);
}
