//! Shared fixtures for handler tests: an in-memory `AppState`, a mailer that
//! records what it would have sent, and macros for driving the app.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use actix_web::http::header::{HeaderName, AUTHORIZATION};
use async_trait::async_trait;

use crate::app_state::AppState;
use crate::config::Config;
use crate::mail::{EmailMessage, MailError, Mailer};
use crate::store::memory::{MemoryTaskStore, MemoryTeamStore, MemoryUserStore};

#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<EmailMessage>>,
    failing: AtomicBool,
}

impl RecordingMailer {
    pub fn sent(&self) -> Vec<EmailMessage> {
        self.sent.lock().unwrap().clone()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, message: &EmailMessage) -> Result<(), MailError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(MailError::Delivery("connection refused".to_string()));
        }
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }
}

pub fn test_state() -> (AppState, Arc<RecordingMailer>) {
    let mailer = Arc::new(RecordingMailer::default());
    let state = AppState {
        users: Arc::new(MemoryUserStore::default()),
        tasks: Arc::new(MemoryTaskStore::default()),
        teams: Arc::new(MemoryTeamStore::default()),
        mailer: mailer.clone(),
        config: Config::for_tests(),
        started_at: Instant::now(),
    };
    (state, mailer)
}

pub fn bearer(token: &str) -> (HeaderName, String) {
    (AUTHORIZATION, format!("Bearer {}", token))
}

/// Builds the full app, with authentication, over the given state.
macro_rules! test_app {
    ($state:expr) => {
        actix_web::test::init_service(
            actix_web::App::new()
                .app_data(actix_web::web::Data::new($state.clone()))
                .wrap(crate::Authentication)
                .configure(crate::configure_routes),
        )
        .await
    };
}

/// Sends a `TestRequest` builder and returns the status and JSON body.
macro_rules! call_json {
    ($app:expr, $req:expr) => {{
        let resp = actix_web::test::call_service(&$app, $req.to_request()).await;
        let status = resp.status();
        let body: serde_json::Value = actix_web::test::read_body_json(resp).await;
        (status, body)
    }};
}

/// Registers an account with password `secret123`, returning its id and
/// token.
macro_rules! register_user {
    ($app:expr, $name:expr, $email:expr) => {{
        let (status, body) = call_json!(
            $app,
            actix_web::test::TestRequest::post()
                .uri("/api/auth/register")
                .set_json(serde_json::json!({
                    "name": $name,
                    "email": $email,
                    "password": "secret123",
                }))
        );
        assert_eq!(status, actix_web::http::StatusCode::CREATED, "{}", body);
        (
            body["data"]["user"]["id"].as_str().unwrap().to_string(),
            body["data"]["token"].as_str().unwrap().to_string(),
        )
    }};
}
