#![allow(dead_code)]

use std::time::Duration;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use facility_api::{
    ServerConfig, accounts::AccountService, clock::Clock, create_app, db::Database,
    jwt::JwtSettings, session::SessionSettings,
};
use tower::ServiceExt;

pub const START: i64 = 1_700_000_000;
pub const JWT_SECRET: &[u8] = b"test-jwt-secret-with-enough-bytes";
pub const ISSUER: &str = "facility-api-test";
pub const PASSWORD: &str = "correct horse battery";

pub struct TestApp {
    pub app: Router,
    pub db: Database,
    pub clock: Clock,
}

pub fn jwt_settings() -> JwtSettings {
    JwtSettings {
        secret: JWT_SECRET.to_vec(),
        issuer: ISSUER.to_string(),
        audience: vec!["web".to_string(), "ios".to_string(), "android".to_string()],
        access_ttl_minutes: 15,
    }
}

pub async fn setup() -> TestApp {
    setup_with_max_sessions(3).await
}

pub async fn setup_with_max_sessions(max_sessions: usize) -> TestApp {
    let db = Database::open(":memory:")
        .await
        .expect("Failed to open test database");
    let clock = Clock::fixed(START);
    let config = ServerConfig {
        db: db.clone(),
        jwt: jwt_settings(),
        sessions: SessionSettings {
            refresh_ttl_days: 30,
            max_sessions,
        },
        request_timeout: Duration::from_secs(30),
        clock: clock.clone(),
    };
    TestApp {
        app: create_app(&config),
        db,
        clock,
    }
}

/// Create an active user directly through the account service.
pub async fn create_user(db: &Database, username: &str, role: &str) -> i64 {
    AccountService::new(db.clone())
        .register(username, PASSWORD, role)
        .await
        .expect("Failed to create user")
}

impl TestApp {
    /// Send a request and return the status and parsed JSON body
    /// (`Null` for an empty body).
    pub async fn send(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<serde_json::Value>,
    ) -> (StatusCode, serde_json::Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let body = match body {
            Some(json) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        let response = self
            .app
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null)
        };
        (status, json)
    }

    pub async fn post(&self, uri: &str, body: serde_json::Value) -> (StatusCode, serde_json::Value) {
        self.send("POST", uri, None, Some(body)).await
    }

    pub async fn get_auth(&self, uri: &str, token: &str) -> (StatusCode, serde_json::Value) {
        self.send("GET", uri, Some(token), None).await
    }

    /// Log in and return the token response, panicking on failure.
    pub async fn login(&self, username: &str) -> serde_json::Value {
        let (status, json) = self
            .post(
                "/api/v1/auth/login",
                serde_json::json!({ "username": username, "password": PASSWORD }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "login failed: {}", json);
        json
    }
}

pub fn access_token(tokens: &serde_json::Value) -> &str {
    tokens["access_token"].as_str().unwrap()
}

pub fn refresh_token(tokens: &serde_json::Value) -> &str {
    tokens["refresh_token"].as_str().unwrap()
}
