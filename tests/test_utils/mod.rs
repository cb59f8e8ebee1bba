//! Test utilities for integration tests
#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
};
use serde_json::Value;
use tower::util::ServiceExt;

use commons::api::{AppState, app};
use commons::core::db::{async_db, initialize_db};
use commons::core::{AppConfig, MailerKind};
use commons::mail::QueueMailer;
use commons::models::User;

pub const MAIL_DOMAIN: &str = "mail.example.com";
pub const MAILGUN_KEY: &str = "key-test";

pub struct TestApp {
    pub app: Router,
    pub db: tokio_rusqlite::Connection,
    pub mailer: QueueMailer,
    pub admin: User,
    pub alice: User,
    pub bob: User,
}

pub fn test_config(mailer: MailerKind) -> AppConfig {
    AppConfig {
        db_path: String::from(":memory:"),
        base_url: String::from("https://commons.example.com"),
        mailer,
        mailgun_api_key: String::from(MAILGUN_KEY),
        mailgun_domain: String::from(MAIL_DOMAIN),
        mailgun_api_url: String::from("http://localhost:1"),
    }
}

/// Creates a test application backed by an in-memory database with
/// an administrator and two regular users. Emails are captured by a
/// queue mailer regardless of the configured mailer kind.
pub async fn test_app_with(mailer_kind: MailerKind) -> TestApp {
    let db = async_db(":memory:")
        .await
        .expect("Failed to connect to async db");
    let (admin, alice, bob) = db
        .call(|conn| {
            initialize_db(conn)?;
            let admin = User::create(conn, "Admin", "admin@example.com", true)?;
            let alice = User::create(conn, "Alice", "alice@example.com", false)?;
            let bob = User::create(conn, "Bob", "bob@example.com", false)?;
            Ok((admin, alice, bob))
        })
        .await
        .expect("Failed to seed db");

    let mailer = QueueMailer::default();
    let app_state = AppState::with_mailer(
        db.clone(),
        test_config(mailer_kind),
        Arc::new(mailer.clone()),
    );
    TestApp {
        app: app(Arc::new(app_state)),
        db,
        mailer,
        admin,
        alice,
        bob,
    }
}

pub async fn test_app() -> TestApp {
    test_app_with(MailerKind::Queue).await
}

pub async fn body_to_json(body: Body) -> Value {
    let bytes = to_bytes(body, usize::MAX).await.unwrap();
    if bytes.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(&bytes).unwrap()
}

impl TestApp {
    /// Send a JSON request, authenticated as `user` when given.
    pub async fn request(
        &self,
        method: &str,
        uri: &str,
        user: Option<&User>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(user) = user {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", user.api_key));
        }
        let body = match body {
            Some(body) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(body.to_string())
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
        (status, body_to_json(response.into_body()).await)
    }

    pub async fn get(&self, uri: &str, user: Option<&User>) -> (StatusCode, Value) {
        self.request("GET", uri, user, None).await
    }

    pub async fn post(&self, uri: &str, user: Option<&User>, body: Value) -> (StatusCode, Value) {
        self.request("POST", uri, user, Some(body)).await
    }

    pub async fn post_form(&self, uri: &str, fields: &[(&str, &str)]) -> (StatusCode, Value) {
        let body = fields
            .iter()
            .map(|(key, value)| format!("{}={}", key, urlencoding::encode(value)))
            .collect::<Vec<_>>()
            .join("&");
        let response = self
            .app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(uri)
                    .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        (status, body_to_json(response.into_body()).await)
    }

    pub async fn count(&self, table: &'static str) -> i64 {
        self.db
            .call(move |conn| {
                Ok(conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
                    row.get(0)
                })?)
            })
            .await
            .unwrap()
    }

    /// Alice starts a conversation with Bob and sends the first
    /// message. Returns the ids of both.
    pub async fn start_conversation(&self) -> (i64, i64) {
        let (status, body) = self
            .post(
                "/api/conversations",
                Some(&self.alice),
                serde_json::json!({
                    "title": "Gardening",
                    "creator_user_id": self.alice.id,
                    "other_user_id": self.bob.id,
                }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        let conversation_id = body["data"]["id"].as_i64().unwrap();

        let (status, body) = self
            .post(
                "/api/messages",
                Some(&self.alice),
                serde_json::json!({
                    "conversation_id": conversation_id,
                    "sender_user_id": self.alice.id,
                    "content": "Want to help with the garden?",
                }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        (conversation_id, body["data"]["id"].as_i64().unwrap())
    }
}
