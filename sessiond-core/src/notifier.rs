//! Control-plane "session over" notifications.
//!
//! When a session crosses a deadline the actor tells the control plane so it
//! can warn the user. Failures fall in two classes:
//!
//! - **SessionUnknown**: the control plane answered that it has no such
//!   session. This is authoritative and ends the session locally.
//! - **Transient**: anything else (timeout, connect error, 5xx). Local state
//!   is left alone and the next alarm cycle retries.

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::types::OverReason;

/// Path appended to the control-plane base URL
pub const SCHEDULE_OVER_PATH: &str = "/agent-session/schedule-over";

/// Notification failure
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NotifyError {
    #[error("control plane does not know session {0}")]
    SessionUnknown(String),

    #[error("control plane notification failed: {0}")]
    Transient(String),
}

impl NotifyError {
    pub fn is_session_unknown(&self) -> bool {
        matches!(self, Self::SessionUnknown(_))
    }
}

/// Body of the schedule-over callback
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleOverRequest<'a> {
    pub session_id: &'a str,
    pub reason: OverReason,
    pub delay: i64,
}

/// Outbound channel to the control plane
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn schedule_over(
        &self,
        session_id: &str,
        reason: OverReason,
        delay_ms: i64,
    ) -> Result<(), NotifyError>;
}

/// Notifier used when no control plane is configured
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn schedule_over(
        &self,
        session_id: &str,
        reason: OverReason,
        delay_ms: i64,
    ) -> Result<(), NotifyError> {
        debug!(
            session_id = %session_id,
            reason = %reason,
            delay_ms,
            "No control plane configured, skipping notification"
        );
        Ok(())
    }
}

/// Classify a non-success control-plane response
pub fn classify_failure(session_id: &str, status: u16, body: &str) -> NotifyError {
    if status == 404 || body.to_ascii_lowercase().contains("not found") {
        NotifyError::SessionUnknown(session_id.to_string())
    } else {
        NotifyError::Transient(format!("HTTP {}: {}", status, body.trim()))
    }
}

#[cfg(feature = "http-notifier")]
pub use http::HttpNotifier;

#[cfg(feature = "http-notifier")]
mod http {
    use super::*;
    use std::time::Duration;

    /// Notifier calling the control plane over HTTP
    #[derive(Clone)]
    pub struct HttpNotifier {
        endpoint: String,
        token: String,
        client: reqwest::Client,
    }

    impl HttpNotifier {
        /// Create a notifier for `base_url` with a per-request timeout
        pub fn new(
            base_url: &str,
            token: impl Into<String>,
            timeout: Duration,
        ) -> crate::Result<Self> {
            let client = reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .map_err(|e| {
                    crate::Error::Other(format!("Failed to create HTTP client: {}", e))
                })?;

            Ok(Self {
                endpoint: format!("{}{}", base_url.trim_end_matches('/'), SCHEDULE_OVER_PATH),
                token: token.into(),
                client,
            })
        }

        pub fn endpoint(&self) -> &str {
            &self.endpoint
        }
    }

    #[async_trait]
    impl Notifier for HttpNotifier {
        async fn schedule_over(
            &self,
            session_id: &str,
            reason: OverReason,
            delay_ms: i64,
        ) -> Result<(), NotifyError> {
            let body = ScheduleOverRequest {
                session_id,
                reason,
                delay: delay_ms,
            };

            let resp = self
                .client
                .post(&self.endpoint)
                .header(reqwest::header::AUTHORIZATION, &self.token)
                .json(&body)
                .send()
                .await
                .map_err(|e| NotifyError::Transient(format!("request failed: {}", e)))?;

            let status = resp.status();
            if status.is_success() {
                info!(
                    session_id = %session_id,
                    reason = %reason,
                    "Control plane notified"
                );
                return Ok(());
            }

            let text = resp.text().await.unwrap_or_default();
            Err(classify_failure(session_id, status.as_u16(), &text))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_404_is_unknown() {
        let err = classify_failure("s1", 404, "");
        assert_eq!(err, NotifyError::SessionUnknown("s1".to_string()));
    }

    #[test]
    fn test_classify_not_found_message_is_unknown() {
        let err = classify_failure("s1", 400, "{\"error\":\"Session Not Found\"}");
        assert!(err.is_session_unknown());
    }

    #[test]
    fn test_classify_server_error_is_transient() {
        let err = classify_failure("s1", 503, "upstream unavailable ");
        assert_eq!(
            err,
            NotifyError::Transient("HTTP 503: upstream unavailable".to_string())
        );
        assert!(!classify_failure("s1", 401, "unauthorized").is_session_unknown());
    }

    #[test]
    fn test_request_body_shape() {
        let body = ScheduleOverRequest {
            session_id: "abc",
            reason: OverReason::Idle,
            delay: 15_000,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["sessionId"], "abc");
        assert_eq!(json["reason"], "idle");
        assert_eq!(json["delay"], 15_000);
    }

    #[tokio::test]
    async fn test_noop_notifier_succeeds() {
        let result = NoopNotifier
            .schedule_over("s1", OverReason::MaxDuration, 0)
            .await;
        assert!(result.is_ok());
    }

    #[cfg(feature = "http-notifier")]
    mod http_notifier {
        use super::super::*;
        use axum::{
            extract::State,
            http::{HeaderMap, StatusCode},
            routing::post,
            Json, Router,
        };
        use std::sync::{Arc, Mutex};
        use std::time::Duration;

        #[derive(Clone, Default)]
        struct Seen(Arc<Mutex<Vec<(Option<String>, serde_json::Value)>>>);

        async fn spawn_control_plane(status: StatusCode, body: &'static str) -> (String, Seen) {
            let seen = Seen::default();
            let app = Router::new()
                .route(
                    SCHEDULE_OVER_PATH,
                    post(
                        move |State(seen): State<Seen>,
                              headers: HeaderMap,
                              Json(payload): Json<serde_json::Value>| async move {
                            let auth = headers
                                .get("authorization")
                                .and_then(|v| v.to_str().ok())
                                .map(String::from);
                            seen.0.lock().unwrap().push((auth, payload));
                            (status, body)
                        },
                    ),
                )
                .with_state(seen.clone());

            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            tokio::spawn(async move {
                axum::serve(listener, app).await.unwrap();
            });
            (format!("http://{}", addr), seen)
        }

        #[tokio::test]
        async fn test_success_posts_body_and_token() {
            let (base, seen) = spawn_control_plane(StatusCode::OK, "{}").await;
            let notifier =
                HttpNotifier::new(&format!("{}/", base), "svc-token", Duration::from_secs(5))
                    .unwrap();
            assert!(notifier.endpoint().ends_with("/agent-session/schedule-over"));

            notifier
                .schedule_over("s1", OverReason::Idle, 15_000)
                .await
                .unwrap();

            let calls = seen.0.lock().unwrap();
            assert_eq!(calls.len(), 1);
            assert_eq!(calls[0].0.as_deref(), Some("svc-token"));
            assert_eq!(calls[0].1["sessionId"], "s1");
            assert_eq!(calls[0].1["reason"], "idle");
            assert_eq!(calls[0].1["delay"], 15_000);
        }

        #[tokio::test]
        async fn test_404_is_session_unknown() {
            let (base, _) = spawn_control_plane(StatusCode::NOT_FOUND, "missing").await;
            let notifier = HttpNotifier::new(&base, "t", Duration::from_secs(5)).unwrap();

            let err = notifier
                .schedule_over("s1", OverReason::MaxDuration, 0)
                .await
                .unwrap_err();
            assert!(err.is_session_unknown());
        }

        #[tokio::test]
        async fn test_500_is_transient() {
            let (base, _) =
                spawn_control_plane(StatusCode::INTERNAL_SERVER_ERROR, "boom").await;
            let notifier = HttpNotifier::new(&base, "t", Duration::from_secs(5)).unwrap();

            let err = notifier
                .schedule_over("s1", OverReason::Idle, 15_000)
                .await
                .unwrap_err();
            assert!(matches!(err, NotifyError::Transient(_)));
        }

        #[tokio::test]
        async fn test_timeout_is_transient() {
            let app = Router::new().route(
                SCHEDULE_OVER_PATH,
                post(|| async {
                    tokio::time::sleep(Duration::from_millis(500)).await;
                    StatusCode::OK
                }),
            );
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            tokio::spawn(async move {
                axum::serve(listener, app).await.unwrap();
            });

            let notifier = HttpNotifier::new(
                &format!("http://{}", addr),
                "t",
                Duration::from_millis(50),
            )
            .unwrap();
            let err = notifier
                .schedule_over("s1", OverReason::Idle, 15_000)
                .await
                .unwrap_err();
            assert!(matches!(err, NotifyError::Transient(_)));
        }

        #[tokio::test]
        async fn test_unreachable_is_transient() {
            // Bind then drop to get a port nothing listens on.
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            drop(listener);

            let notifier = HttpNotifier::new(
                &format!("http://{}", addr),
                "t",
                Duration::from_millis(500),
            )
            .unwrap();
            let err = notifier
                .schedule_over("s1", OverReason::Idle, 15_000)
                .await
                .unwrap_err();
            assert!(matches!(err, NotifyError::Transient(_)));
        }
    }
}
