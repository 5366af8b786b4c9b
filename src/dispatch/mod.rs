//! Request dispatch to the remote completion service.
//!
//! One call, one POST: the dispatcher checks the credential, enforces the
//! token ceiling, picks the wire format from the model id, and races the
//! request against a hard timeout and the caller's cancellation token.
//! Nothing is retried.

mod http;
pub mod mock;

pub use http::ReqwestTransport;

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{human_duration, ErrorKind};
use crate::prompt::{self, AnalysisMode};
use crate::settings::PromptConfiguration;
use crate::tokens;
use crate::wire::{self, WireFormat, WireRequest};

/// Upper bound on waiting for a response.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10 * 60);

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("no API key configured")]
    MissingCredential,
    #[error("{estimated} estimated tokens exceeds the {ceiling} token limit")]
    RequestTooLarge { estimated: usize, ceiling: usize },
    #[error("the analysis took longer than {} and was canceled", human_duration(.0))]
    Timeout(Duration),
    #[error("the request was canceled before a response arrived")]
    Cancelled,
    #[error("HTTP {status}: {message}")]
    Remote { status: u16, message: String },
    #[error("{0}")]
    Network(String),
    #[error("failed to encode request: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl DispatchError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DispatchError::MissingCredential | DispatchError::Serialize(_) => {
                ErrorKind::Configuration
            }
            DispatchError::RequestTooLarge { .. } => ErrorKind::RequestTooLarge,
            DispatchError::Timeout(_) => ErrorKind::Timeout,
            DispatchError::Cancelled => ErrorKind::Cancelled,
            DispatchError::Remote { .. } => ErrorKind::Remote,
            DispatchError::Network(_) => ErrorKind::Network,
        }
    }
}

/// Raw HTTP result, before status classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpReply {
    pub status: u16,
    pub body: String,
}

/// Sends one authenticated JSON POST.
///
/// The credential is applied per request; implementations must not stash
/// it in shared client state, since calls may be in flight concurrently.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn post(
        &self,
        endpoint: &str,
        credential: &str,
        body: Vec<u8>,
    ) -> Result<HttpReply, DispatchError>;
}

/// A successful exchange, ready for parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchOutcome {
    pub body: String,
    pub format: WireFormat,
    pub estimated_tokens: usize,
}

/// Dispatches prompts over a [`Transport`].
#[derive(Clone)]
pub struct Dispatcher {
    transport: Arc<dyn Transport>,
    timeout: Duration,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    /// Dispatcher over a fresh HTTPS client.
    pub fn new() -> Self {
        Self::with_transport(Arc::new(ReqwestTransport::new()))
    }

    pub fn with_transport(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Override the response timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Send `prompt` and return the raw success body with its format.
    pub async fn dispatch(
        &self,
        prompt: &str,
        mode: AnalysisMode,
        config: &PromptConfiguration,
        cancel: &CancellationToken,
    ) -> Result<DispatchOutcome, DispatchError> {
        let credential = match config.credential.as_deref() {
            Some(key) if !key.trim().is_empty() => key,
            _ => return Err(DispatchError::MissingCredential),
        };

        let estimated_tokens = tokens::estimate(prompt);
        debug!(
            estimated_tokens,
            chars = prompt.len(),
            "estimated prompt size"
        );
        if estimated_tokens > tokens::REQUEST_TOKEN_CEILING {
            warn!(estimated_tokens, "request exceeds token ceiling, not sending");
            return Err(DispatchError::RequestTooLarge {
                estimated: estimated_tokens,
                ceiling: tokens::REQUEST_TOKEN_CEILING,
            });
        }

        if cancel.is_cancelled() {
            debug!("token already canceled, not sending");
            return Err(DispatchError::Cancelled);
        }

        let format = WireFormat::for_model(&config.model);
        let endpoint = format.endpoint(&config.base_url);
        let body = format.request_body(&WireRequest {
            model: &config.model,
            system_instruction: prompt::system_instruction(mode),
            prompt,
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        })?;

        info!(
            model = %config.model,
            %format,
            %endpoint,
            bytes = body.len(),
            "sending analysis request"
        );

        let reply = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                warn!("request canceled by caller");
                return Err(DispatchError::Cancelled);
            }
            result = tokio::time::timeout(self.timeout, self.transport.post(&endpoint, credential, body)) => {
                match result {
                    Ok(reply) => reply?,
                    Err(_) => {
                        warn!(timeout = ?self.timeout, "request timed out");
                        return Err(DispatchError::Timeout(self.timeout));
                    }
                }
            }
        };

        debug!(status = reply.status, bytes = reply.body.len(), "received response");

        if !(200..300).contains(&reply.status) {
            let message = wire::error_message(&reply.body).unwrap_or(reply.body);
            return Err(DispatchError::Remote {
                status: reply.status,
                message,
            });
        }

        Ok(DispatchOutcome {
            body: reply.body,
            format,
            estimated_tokens,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::mock::MockTransport;
    use super::*;

    fn config(model: &str) -> PromptConfiguration {
        PromptConfiguration {
            model: model.to_string(),
            max_tokens: 4000,
            temperature: 0.7,
            credential: Some("sk-test".to_string()),
            base_url: "https://api.example.test".to_string(),
        }
    }

    fn dispatcher(mock: &Arc<MockTransport>) -> Dispatcher {
        Dispatcher::with_transport(mock.clone())
    }

    #[tokio::test]
    async fn test_missing_credential_rejected() {
        let mock = Arc::new(MockTransport::ok("{}"));
        for credential in [None, Some(String::new()), Some("   ".to_string())] {
            let cfg = PromptConfiguration {
                credential,
                ..config("gpt-5")
            };
            let err = dispatcher(&mock)
                .dispatch("hi", AnalysisMode::CheatDetection, &cfg, &CancellationToken::new())
                .await
                .unwrap_err();
            assert!(matches!(err, DispatchError::MissingCredential));
            assert_eq!(err.kind(), ErrorKind::Configuration);
        }
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn test_oversized_prompt_never_sent() {
        let mock = Arc::new(MockTransport::ok("{}"));
        let prompt = "x".repeat(500_000);
        let err = dispatcher(&mock)
            .dispatch(
                &prompt,
                AnalysisMode::VulnerabilityDetection,
                &config("gpt-4o"),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();

        match err {
            DispatchError::RequestTooLarge { estimated, ceiling } => {
                assert_eq!(estimated, tokens::estimate(&prompt));
                assert_eq!(ceiling, tokens::REQUEST_TOKEN_CEILING);
            }
            other => panic!("expected RequestTooLarge, got {:?}", other),
        }
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn test_responses_format_for_newer_models() {
        let mock = Arc::new(MockTransport::ok(r#"{"output": []}"#));
        let outcome = dispatcher(&mock)
            .dispatch(
                "PROMPT",
                AnalysisMode::CheatDetection,
                &config("gpt-5-mini"),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(outcome.format, WireFormat::Responses);
        assert_eq!(outcome.body, r#"{"output": []}"#);
        assert_eq!(mock.call_count(), 1);

        let sent = mock.last_request().unwrap();
        assert_eq!(sent.endpoint, "https://api.example.test/v1/responses");
        assert_eq!(sent.credential, "sk-test");
        let json: serde_json::Value = serde_json::from_slice(&sent.body).unwrap();
        assert!(json["input"].as_str().unwrap().ends_with("PROMPT"));
    }

    #[tokio::test]
    async fn test_chat_format_for_other_models() {
        let mock = Arc::new(MockTransport::ok(r#"{"choices": []}"#));
        let outcome = dispatcher(&mock)
            .dispatch(
                "PROMPT",
                AnalysisMode::VulnerabilityDetection,
                &config("gpt-4o"),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(outcome.format, WireFormat::ChatCompletions);
        let sent = mock.last_request().unwrap();
        assert_eq!(sent.endpoint, "https://api.example.test/v1/chat/completions");
        let json: serde_json::Value = serde_json::from_slice(&sent.body).unwrap();
        assert_eq!(
            json["messages"][0]["content"],
            prompt::system_instruction(AnalysisMode::VulnerabilityDetection)
        );
        assert_eq!(json["max_tokens"], 4000);
    }

    #[tokio::test]
    async fn test_remote_error_envelope() {
        let mock = Arc::new(MockTransport::reply(
            401,
            r#"{"error": {"message": "Incorrect API key provided", "code": "invalid_api_key"}}"#,
        ));
        let err = dispatcher(&mock)
            .dispatch("hi", AnalysisMode::CheatDetection, &config("gpt-5"), &CancellationToken::new())
            .await
            .unwrap_err();

        match err {
            DispatchError::Remote { status, message } => {
                assert_eq!(status, 401);
                assert_eq!(message, "Incorrect API key provided");
            }
            other => panic!("expected Remote, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_remote_error_raw_body() {
        let mock = Arc::new(MockTransport::reply(503, "upstream unavailable"));
        let err = dispatcher(&mock)
            .dispatch("hi", AnalysisMode::CheatDetection, &config("gpt-4o"), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            DispatchError::Remote { status: 503, ref message } if message == "upstream unavailable"
        ));
        assert_eq!(err.kind(), ErrorKind::Remote);
    }

    #[test]
    fn test_timeout_default_and_override() {
        let mock = Arc::new(MockTransport::ok("{}"));
        assert_eq!(dispatcher(&mock).timeout(), DEFAULT_TIMEOUT);
        assert_eq!(DEFAULT_TIMEOUT, Duration::from_secs(600));
        assert_eq!(
            dispatcher(&mock)
                .with_timeout(Duration::from_secs(3))
                .timeout(),
            Duration::from_secs(3)
        );
    }

    #[tokio::test]
    async fn test_timeout() {
        let mock = Arc::new(MockTransport::ok("{}").with_delay(Duration::from_secs(5)));
        let err = dispatcher(&mock)
            .with_timeout(Duration::from_millis(20))
            .dispatch("hi", AnalysisMode::CheatDetection, &config("gpt-5"), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, DispatchError::Timeout(d) if d == Duration::from_millis(20)));
        assert_eq!(err.kind(), ErrorKind::Timeout);
    }

    #[tokio::test]
    async fn test_cancellation_aborts_promptly() {
        let mock = Arc::new(MockTransport::ok("{}").with_delay(Duration::from_secs(30)));
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let started = std::time::Instant::now();
        let err = dispatcher(&mock)
            .dispatch("hi", AnalysisMode::CheatDetection, &config("gpt-5"), &cancel)
            .await
            .unwrap_err();

        assert!(matches!(err, DispatchError::Cancelled));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_precanceled_token_never_sends() {
        // an instant reply must not win against a token canceled up front
        let mock = Arc::new(MockTransport::ok(
            r#"{"choices":[{"message":{"content":"ok"}}]}"#,
        ));
        let cancel = CancellationToken::new();
        cancel.cancel();

        for _ in 0..200 {
            let err = dispatcher(&mock)
                .dispatch("hi", AnalysisMode::CheatDetection, &config("gpt-4o"), &cancel)
                .await
                .unwrap_err();
            assert!(matches!(err, DispatchError::Cancelled));
            assert_eq!(err.kind(), ErrorKind::Cancelled);
        }
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn test_network_failure_passthrough() {
        let mock = Arc::new(MockTransport::failing("connection refused"));
        let err = dispatcher(&mock)
            .dispatch("hi", AnalysisMode::CheatDetection, &config("gpt-5"), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::Network(ref m) if m == "connection refused"));
        assert_eq!(mock.call_count(), 1);
    }
}
