// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared test harness. Each test binary uses a different subset.
#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, HeaderMap, Request, StatusCode},
    Router,
};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header};
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tower::ServiceExt;
use tripdude::config::Config;
use tripdude::db::{FirestoreDb, MemoryDb};
use tripdude::error::AppError;
use tripdude::models::{Activity, Place};
use tripdude::routes::create_router;
use tripdude::services::{
    ActivitySource, GoogleOidcVerifier, Geocoder, IdentityVerifier, TextClassifier,
};
use tripdude::{AppState, Upstreams};

pub const TEST_KID: &str = "test-kid";
pub const TEST_PRIVATE_KEY: &[u8] = include_bytes!("../fixtures/google_test_key.pem");
pub const TEST_PUBLIC_KEY: &[u8] = include_bytes!("../fixtures/google_test_key.pub.pem");
/// Base64url modulus of the test key, for JWKS documents.
pub const TEST_KEY_MODULUS: &str = include_str!("../fixtures/google_test_key.n.txt");

/// Check if emulator is available via environment variable.
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

// ─────────────────────────────────────────────────────────────────────────
// Upstream fakes
// ─────────────────────────────────────────────────────────────────────────

/// Geocoder returning a fixed list (or failing).
pub struct FakeGeocoder {
    pub places: Vec<Place>,
    pub fail: bool,
}

#[async_trait]
impl Geocoder for FakeGeocoder {
    async fn search(&self, _query: &str) -> Result<Vec<Place>, AppError> {
        if self.fail {
            return Err(AppError::Upstream("geocoder down".to_string()));
        }
        Ok(self.places.clone())
    }
}

/// Activity source returning a fixed list (or failing).
pub struct FakeActivitySource {
    pub activities: Vec<Activity>,
    pub fail: bool,
}

#[async_trait]
impl ActivitySource for FakeActivitySource {
    async fn activities_near(
        &self,
        _latitude: f64,
        _longitude: f64,
        _radius_km: f64,
    ) -> Result<Vec<Activity>, AppError> {
        if self.fail {
            return Err(AppError::Upstream("activities down".to_string()));
        }
        Ok(self.activities.clone())
    }
}

type Responder = dyn Fn(&str) -> Result<String, AppError> + Send + Sync;

/// Classifier answering each prompt with a caller-supplied function.
pub struct ScriptedClassifier {
    respond: Box<Responder>,
    pub calls: AtomicUsize,
    pub prompts: std::sync::Mutex<Vec<String>>,
    /// When each call reached the classifier (tokio clock).
    pub call_times: std::sync::Mutex<Vec<tokio::time::Instant>>,
}

impl ScriptedClassifier {
    pub fn new(
        respond: impl Fn(&str) -> Result<String, AppError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            respond: Box::new(respond),
            calls: AtomicUsize::new(0),
            prompts: std::sync::Mutex::new(Vec::new()),
            call_times: std::sync::Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TextClassifier for ScriptedClassifier {
    async fn complete(&self, prompt: &str) -> Result<String, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.call_times
            .lock()
            .unwrap()
            .push(tokio::time::Instant::now());
        self.prompts.lock().unwrap().push(prompt.to_string());
        (self.respond)(prompt)
    }
}

/// A place at the given coordinates.
pub fn place(latitude: f64, longitude: f64, country: &str, city: Option<&str>) -> Place {
    Place {
        latitude,
        longitude,
        display_name: country.to_string(),
        country: Some(country.to_string()),
        city: city.map(str::to_string),
        place_type: Some("city".to_string()),
        bounding_box: None,
    }
}

/// `count` activities with IDs `"0"`, `"1"`, ...
pub fn numbered_activities(count: usize) -> Vec<Activity> {
    (0..count)
        .map(|i| Activity {
            id: Some(i.to_string()),
            name: Some(format!("Activity {i}")),
            description: Some(format!("Description of activity {i}")),
            ..Default::default()
        })
        .collect()
}

/// Google verifier trusting only the fixture key.
pub fn static_google_verifier(config: &Config) -> GoogleOidcVerifier {
    GoogleOidcVerifier::new_with_static_key(
        config,
        TEST_KID,
        DecodingKey::from_rsa_pem(TEST_PUBLIC_KEY).unwrap(),
    )
    .unwrap()
}

/// Sign Google-style ID token claims with the fixture key.
pub fn sign_google_token(claims: &Value) -> String {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = Some(TEST_KID.to_string());
    jsonwebtoken::encode(
        &header,
        claims,
        &EncodingKey::from_rsa_pem(TEST_PRIVATE_KEY).unwrap(),
    )
    .unwrap()
}

/// Claims Google would put in an ID token for this app.
pub fn google_claims(config: &Config, email: &str) -> Value {
    let now = chrono::Utc::now().timestamp();
    serde_json::json!({
        "iss": "https://accounts.google.com",
        "aud": config.google_client_id,
        "sub": "1234567890",
        "email": email,
        "email_verified": true,
        "name": "Test Person",
        "iat": now,
        "exp": now + 3600,
    })
}

// ─────────────────────────────────────────────────────────────────────────
// App construction
// ─────────────────────────────────────────────────────────────────────────

/// Upstreams that never touch the network.
pub fn fake_upstreams(
    config: &Config,
    places: Vec<Place>,
    activities: Vec<Activity>,
    classifier: Arc<ScriptedClassifier>,
) -> Upstreams {
    let identity: Arc<dyn IdentityVerifier> = Arc::new(static_google_verifier(config));
    Upstreams {
        identity,
        geocoder: Arc::new(FakeGeocoder {
            places,
            fail: false,
        }),
        activities: Arc::new(FakeActivitySource {
            activities,
            fail: false,
        }),
        classifier,
    }
}

/// Create a test app backed by the in-memory store and fake upstreams.
/// Returns the router and the shared state.
pub fn create_test_app() -> (Router, Arc<AppState>) {
    let config = Config::test_default();
    let classifier = Arc::new(ScriptedClassifier::new(|_| Ok(String::new())));
    let upstreams = fake_upstreams(&config, vec![], vec![], classifier);
    create_test_app_with(config, upstreams)
}

pub fn create_test_app_with(config: Config, upstreams: Upstreams) -> (Router, Arc<AppState>) {
    let state = Arc::new(AppState::new(config, MemoryDb::new(), upstreams).unwrap());
    (create_router(state.clone()), state)
}

// ─────────────────────────────────────────────────────────────────────────
// HTTP helpers
// ─────────────────────────────────────────────────────────────────────────

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestResponse {
    /// `Set-Cookie` header for `name`, if any.
        pub fn set_cookie(&self, name: &str) -> Option<String> {
        self.headers
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .find(|value| value.starts_with(&format!("{name}=")))
            .map(str::to_string)
    }
}

/// Send a request through the router and decode the JSON body (`Null` if
/// the body is empty).
pub async fn send(app: &Router, request: Request<Body>) -> TestResponse {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };

    TestResponse {
        status,
        headers,
        body,
    }
}

pub fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Request carrying `Authorization: Bearer <token>`.
pub fn bearer_request(method: &str, uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap()
}

/// Register and log in; returns the login response body.
pub async fn register_and_login(app: &Router, email: &str, password: &str) -> Value {
    let registered = send(
        app,
        json_request(
            "POST",
            "/auth/register",
            serde_json::json!({ "email": email, "password": password, "username": "tester" }),
        ),
    )
    .await;
    assert_eq!(registered.status, StatusCode::CREATED, "{:?}", registered.body);

    let login = send(
        app,
        json_request(
            "POST",
            "/auth/login",
            serde_json::json!({ "email": email, "password": password }),
        ),
    )
    .await;
    assert_eq!(login.status, StatusCode::OK, "{:?}", login.body);
    login.body
}
