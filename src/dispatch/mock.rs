//! Scripted [`Transport`] for tests and offline runs.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use super::{DispatchError, HttpReply, Transport};

/// A request captured by [`MockTransport`].
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub endpoint: String,
    pub credential: String,
    pub body: Vec<u8>,
}

/// Returns the same scripted reply to every call and records what was sent.
pub struct MockTransport {
    reply: Result<HttpReply, String>,
    delay: Option<Duration>,
    call_count: AtomicUsize,
    last: Mutex<Option<RecordedRequest>>,
}

impl MockTransport {
    /// Reply with `status` and `body`.
    pub fn reply(status: u16, body: &str) -> Self {
        Self {
            reply: Ok(HttpReply {
                status,
                body: body.to_string(),
            }),
            delay: None,
            call_count: AtomicUsize::new(0),
            last: Mutex::new(None),
        }
    }

    /// Reply 200 with `body`.
    pub fn ok(body: &str) -> Self {
        Self::reply(200, body)
    }

    /// Fail every call with a network error.
    pub fn failing(message: &str) -> Self {
        let mut mock = Self::ok("");
        mock.reply = Err(message.to_string());
        mock
    }

    /// Wait this long before replying.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<RecordedRequest> {
        self.last.lock().ok().and_then(|guard| guard.clone())
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn post(
        &self,
        endpoint: &str,
        credential: &str,
        body: Vec<u8>,
    ) -> Result<HttpReply, DispatchError> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut last) = self.last.lock() {
            *last = Some(RecordedRequest {
                endpoint: endpoint.to_string(),
                credential: credential.to_string(),
                body,
            });
        }

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        self.reply.clone().map_err(DispatchError::Network)
    }
}
