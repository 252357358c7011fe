//! Typed client for the planning-assistant backend.
//!
//! The backend exposes one planning call, `POST /api/planificar`, and a
//! health probe, `GET /api/health`. Requests carry the whole conversation so
//! far; the backend is stateless apart from the session id.
//!
//! ## Retry Strategy
//!
//! Transport failures and 5xx responses are retried with exponential
//! backoff (`retry_backoff_ms * 2^attempt`, capped at 60 s). 4xx responses are the backend
//! rejecting the request itself and are returned at once.

use crate::config::AssistantConfig;
use crate::error::CollaboratorError;
use crate::model::{ConversationTurn, PhotoRef, SidePanel, TripRequest};
use crate::prompts::GENERIC_FAILURE;
use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Body of `POST /api/planificar`.
#[derive(Debug, Clone, Serialize)]
pub struct PlanRequest<'a> {
    #[serde(rename = "pregunta")]
    pub question: &'a str,
    #[serde(rename = "datosViaje")]
    pub trip: &'a TripRequest,
    pub session_id: &'a str,
    #[serde(rename = "historial")]
    pub history: &'a [ConversationTurn],
}

/// Successful planning answer.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PlanResponse {
    #[serde(rename = "respuesta")]
    pub answer: String,
    #[serde(rename = "fotos", default)]
    pub photos: Vec<PhotoRef>,
    #[serde(rename = "info_panel", default, deserialize_with = "lenient_panel")]
    pub side_panel: Option<SidePanel>,
}

/// The backend sends `{}` when it has no live data; treat anything that is
/// not a complete panel as absent.
fn lenient_panel<'de, D>(deserializer: D) -> Result<Option<SidePanel>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| serde_json::from_value(v).ok()))
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: Option<String>,
}

/// Result of `GET /api/health`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    #[serde(default)]
    pub message: String,
}

/// Anything that can answer planning questions.
#[async_trait]
pub trait PlanningAssistant: Send + Sync {
    async fn ask(&self, request: &PlanRequest<'_>) -> Result<PlanResponse, CollaboratorError>;
}

/// `reqwest` implementation of [`PlanningAssistant`].
#[derive(Debug, Clone)]
pub struct AssistantClient {
    http: reqwest::Client,
    config: AssistantConfig,
}

impl AssistantClient {
    pub fn new(config: AssistantConfig) -> Result<Self, CollaboratorError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| CollaboratorError::Unreachable {
                reason: e.to_string(),
            })?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &AssistantConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }

    /// Probe the backend.
    pub async fn health(&self) -> Result<HealthStatus, CollaboratorError> {
        let response = self
            .http
            .get(self.url("/api/health"))
            .send()
            .await
            .map_err(|e| CollaboratorError::Unreachable {
                reason: e.to_string(),
            })?;
        let status = response.status();
        if !status.is_success() {
            return Err(CollaboratorError::Rejected {
                status: status.as_u16(),
                message: format!("health check returned HTTP {status}"),
            });
        }
        response
            .json()
            .await
            .map_err(|e| CollaboratorError::InvalidResponse {
                reason: e.to_string(),
            })
    }

    async fn send_once(&self, request: &PlanRequest<'_>) -> Attempt {
        let response = match self
            .http
            .post(self.url("/api/planificar"))
            .json(request)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                return Attempt::Retry(CollaboratorError::Unreachable {
                    reason: e.to_string(),
                })
            }
        };

        let status = response.status();
        if status.is_success() {
            return match response.json::<PlanResponse>().await {
                Ok(plan) => Attempt::Done(Ok(plan)),
                Err(e) => Attempt::Done(Err(CollaboratorError::InvalidResponse {
                    reason: e.to_string(),
                })),
            };
        }

        let message = response
            .json::<ErrorBody>()
            .await
            .ok()
            .and_then(|b| b.error)
            .unwrap_or_else(|| GENERIC_FAILURE.to_string());
        let err = CollaboratorError::Rejected {
            status: status.as_u16(),
            message,
        };
        if status.is_server_error() {
            Attempt::Retry(err)
        } else {
            Attempt::Done(Err(err))
        }
    }
}

enum Attempt {
    Done(Result<PlanResponse, CollaboratorError>),
    Retry(CollaboratorError),
}

#[async_trait]
impl PlanningAssistant for AssistantClient {
    async fn ask(&self, request: &PlanRequest<'_>) -> Result<PlanResponse, CollaboratorError> {
        if request.question.trim().is_empty() {
            return Err(CollaboratorError::EmptyQuestion);
        }

        let mut last_err = None;
        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                let backoff = backoff_ms(self.config.retry_backoff_ms, attempt);
                warn!(
                    attempt,
                    max_retries = self.config.max_retries,
                    backoff_ms = backoff,
                    "Retrying assistant request"
                );
                sleep(Duration::from_millis(backoff)).await;
            }

            match self.send_once(request).await {
                Attempt::Done(result) => {
                    if let Ok(plan) = &result {
                        debug!(
                            answer_len = plan.answer.len(),
                            photos = plan.photos.len(),
                            "Assistant answered"
                        );
                    }
                    return result;
                }
                Attempt::Retry(err) => {
                    warn!(attempt = attempt + 1, error = %err, "Assistant request failed");
                    last_err = Some(err);
                }
            }
        }

        Err(last_err.unwrap_or(CollaboratorError::Unreachable {
            reason: "no attempt made".into(),
        }))
    }
}

/// Delay before retry `attempt` (1-based): `base * 2^(attempt-1)`, capped.
fn backoff_ms(base: u64, attempt: u32) -> u64 {
    const MAX_BACKOFF_MS: u64 = 60_000;
    2u64
        .checked_pow(attempt.saturating_sub(1))
        .map_or(u64::MAX, |factor| base.saturating_mul(factor))
        .min(MAX_BACKOFF_MS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Budget, Preference};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn trip() -> TripRequest {
        TripRequest::new("Oaxaca", "2026-12-20", Budget::Mid, Preference::Culture)
    }

    /// Serve one canned response per connection, in order.
    async fn serve(responses: Vec<(u16, &'static str)>) -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        tokio::spawn(async move {
            for (status, body) in responses {
                let (mut socket, _) = listener.accept().await.unwrap();
                let mut buf = vec![0u8; 16 * 1024];
                let _ = socket.read(&mut buf).await;
                counter.fetch_add(1, Ordering::SeqCst);
                let reply = format!(
                    "HTTP/1.1 {status} X\r\ncontent-type: application/json\r\n\
                     content-length: {}\r\nconnection: close\r\n\r\n{body}",
                    body.len()
                );
                socket.write_all(reply.as_bytes()).await.unwrap();
                let _ = socket.shutdown().await;
            }
        });
        (format!("http://{addr}"), hits)
    }

    fn client(base_url: String, max_retries: u32) -> AssistantClient {
        AssistantClient::new(AssistantConfig {
            base_url,
            timeout_secs: 5,
            max_retries,
            retry_backoff_ms: 1,
        })
        .unwrap()
    }

    #[test]
    fn backoff_doubles_and_saturates() {
        assert_eq!(backoff_ms(500, 1), 500);
        assert_eq!(backoff_ms(500, 2), 1_000);
        assert_eq!(backoff_ms(500, 3), 2_000);
        assert_eq!(backoff_ms(500, 64), 60_000);
        assert_eq!(backoff_ms(500, 65), 60_000);
        assert_eq!(backoff_ms(u64::MAX, u32::MAX), 60_000);
        assert_eq!(backoff_ms(0, 100), 0);
    }

    #[test]
    fn request_uses_backend_field_names() {
        let trip = trip();
        let history = vec![ConversationTurn::new("¿Qué ver?", "Monte Albán.", "")];
        let req = PlanRequest {
            question: "¿Y comer?",
            trip: &trip,
            session_id: "session_1",
            history: &history,
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["pregunta"], "¿Y comer?");
        assert_eq!(json["datosViaje"]["destino"], "Oaxaca");
        assert_eq!(json["session_id"], "session_1");
        assert_eq!(json["historial"][0]["respuesta"], "Monte Albán.");
    }

    #[test]
    fn empty_info_panel_is_none() {
        let raw = r#"{"respuesta": "Hola", "fotos": [], "info_panel": {}}"#;
        let plan: PlanResponse = serde_json::from_str(raw).unwrap();
        assert!(plan.side_panel.is_none());

        let raw = r#"{"respuesta": "Hola", "info_panel": {"temperatura": 18,
                     "descripcion_clima": "despejado", "diferencia_horaria": -6}}"#;
        let plan: PlanResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(plan.side_panel.unwrap().temperature, 18.0);
        assert!(plan.photos.is_empty());
    }

    #[tokio::test]
    async fn empty_question_is_not_sent() {
        let trip = trip();
        let c = client("http://127.0.0.1:9".into(), 0);
        let req = PlanRequest {
            question: "   ",
            trip: &trip,
            session_id: "s",
            history: &[],
        };
        assert_eq!(c.ask(&req).await.unwrap_err(), CollaboratorError::EmptyQuestion);
    }

    #[tokio::test]
    async fn retries_server_errors_then_succeeds() {
        let (base, hits) = serve(vec![
            (500, r#"{"error": "Error al comunicarse con Gemini: 503"}"#),
            (200, r#"{"respuesta": "Visita el Zócalo.", "fotos": [{"url": "https://img/1"}]}"#),
        ])
        .await;
        let trip = trip();
        let req = PlanRequest {
            question: "¿Qué ver?",
            trip: &trip,
            session_id: "s",
            history: &[],
        };
        let plan = client(base, 2).ask(&req).await.unwrap();
        assert_eq!(plan.answer, "Visita el Zócalo.");
        assert_eq!(plan.photos.len(), 1);
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn client_errors_are_verbatim_and_not_retried() {
        let (base, hits) = serve(vec![(400, r#"{"error": "No se proporcionó una pregunta"}"#)]).await;
        let trip = trip();
        let req = PlanRequest {
            question: "x",
            trip: &trip,
            session_id: "s",
            history: &[],
        };
        let err = client(base, 3).ask(&req).await.unwrap_err();
        assert_eq!(err.to_string(), "No se proporcionó una pregunta");
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unreachable_backend() {
        // Bind then drop to get a port nothing listens on.
        let port = {
            let l = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            l.local_addr().unwrap().port()
        };
        let trip = trip();
        let req = PlanRequest {
            question: "x",
            trip: &trip,
            session_id: "s",
            history: &[],
        };
        let err = client(format!("http://127.0.0.1:{port}"), 1)
            .ask(&req)
            .await
            .unwrap_err();
        assert!(matches!(err, CollaboratorError::Unreachable { .. }), "{err:?}");
    }

    #[tokio::test]
    async fn health_probe() {
        let (base, _) = serve(vec![(
            200,
            r#"{"status": "ok", "message": "Servidor funcionando correctamente"}"#,
        )])
        .await;
        let status = client(base, 0).health().await.unwrap();
        assert_eq!(status.status, "ok");
    }
}
