//! HTTPS transport backed by reqwest.

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;

use super::{DispatchError, HttpReply, Transport};

/// Pooled reqwest client; released when the last dispatcher holding it drops.
pub struct ReqwestTransport {
    http: Client,
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl ReqwestTransport {
    pub fn new() -> Self {
        let http = Client::builder()
            .user_agent(concat!("ilprobe/", env!("CARGO_PKG_VERSION")))
            .build()
            .expect("failed to create HTTP client");
        Self { http }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn post(
        &self,
        endpoint: &str,
        credential: &str,
        body: Vec<u8>,
    ) -> Result<HttpReply, DispatchError> {
        let response = self
            .http
            .post(endpoint)
            .bearer_auth(credential)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(network_error)?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(network_error)?;
        Ok(HttpReply { status, body })
    }
}

fn network_error(e: reqwest::Error) -> DispatchError {
    DispatchError::Network(e.to_string())
}
