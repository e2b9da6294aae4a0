#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::Value;
use tower::ServiceExt;

use folio_chat::{
    auth::Authenticator,
    bus::EventBus,
    manager::ChatManager,
    presence::PresenceTracker,
    responder::{Prompt, Responder, ResponderError, ResponderErrorKind},
    store::Store,
    web::{self, AppState},
};

pub const OWNER_EMAIL: &str = "owner@example.com";
pub const OWNER_PASSWORD: &str = "correct horse";

/// Replies with a fixed text, or fails when `reply` is None.
pub struct FixedResponder {
    reply: Option<String>,
    pub calls: AtomicUsize,
}

impl FixedResponder {
    pub fn replying(text: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Some(text.to_string()),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            reply: None,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Responder for FixedResponder {
    async fn respond(&self, _prompt: &Prompt) -> Result<String, ResponderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.reply
            .clone()
            .ok_or_else(|| ResponderError::new(ResponderErrorKind::Network, "simulated outage"))
    }

    fn name(&self) -> &str {
        "fixed"
    }
}

pub struct TestApp {
    pub router: Router,
    pub store: Store,
}

pub async fn test_app(responder: Arc<dyn Responder>) -> TestApp {
    let store = Store::in_memory().await.unwrap();
    let bus = Arc::new(EventBus::new());
    let presence = Arc::new(PresenceTracker::new(Duration::from_secs(20)));
    let auth = Authenticator::new(
        store.clone(),
        Some(OWNER_EMAIL.to_string()),
        Some(OWNER_PASSWORD.to_string()),
    );
    let manager = Arc::new(ChatManager::new(
        store.clone(),
        bus.clone(),
        responder,
        presence,
        "Alex",
        50,
    ));

    TestApp {
        router: web::router(AppState::new(manager, auth, bus)),
        store,
    }
}

impl TestApp {
    pub async fn call(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            request = request.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => request
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_vec(&body).unwrap()))
                .unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.call(Method::POST, uri, token, Some(body)).await
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.call(Method::GET, uri, token, None).await
    }

    pub async fn visitor_token(&self) -> String {
        let (status, body) = self.call(Method::POST, "/auth/anonymous", None, None).await;
        assert_eq!(status, StatusCode::OK);
        body["token"].as_str().unwrap().to_string()
    }

    pub async fn owner_token(&self) -> String {
        let (status, body) = self
            .post(
                "/auth/login",
                None,
                serde_json::json!({ "email": OWNER_EMAIL, "password": OWNER_PASSWORD }),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        body["token"].as_str().unwrap().to_string()
    }
}

/// Serve the router on an ephemeral local port; returns the base URL.
pub async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}
