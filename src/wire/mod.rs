//! Request/response shapes for the two completion wire formats.
//!
//! - Responses (`/v1/responses`): newer model family, single `input` string
//! - Chat Completions (`/v1/chat/completions`): system + user messages
//!
//! The format is chosen once per request from the model id and threaded
//! through dispatch and parsing unchanged.

mod chat;
mod responses;

use serde::Deserialize;

/// Model ids with this prefix use the Responses format.
pub const RESPONSES_MODEL_PREFIX: &str = "gpt-5";

/// Everything a format needs to build its request body.
#[derive(Debug, Clone, Copy)]
pub struct WireRequest<'a> {
    pub model: &'a str,
    pub system_instruction: &'a str,
    pub prompt: &'a str,
    pub max_tokens: u32,
    pub temperature: f64,
}

/// The two incompatible request/response shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WireFormat {
    Responses,
    ChatCompletions,
}

impl WireFormat {
    /// Select the format for a model id.
    pub fn for_model(model: &str) -> Self {
        if model.starts_with(RESPONSES_MODEL_PREFIX) {
            WireFormat::Responses
        } else {
            WireFormat::ChatCompletions
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WireFormat::Responses => "responses",
            WireFormat::ChatCompletions => "chat-completions",
        }
    }

    /// Path appended to the service base URL.
    pub fn endpoint_path(&self) -> &'static str {
        match self {
            WireFormat::Responses => "/v1/responses",
            WireFormat::ChatCompletions => "/v1/chat/completions",
        }
    }

    /// Full endpoint URL for `base_url`.
    pub fn endpoint(&self, base_url: &str) -> String {
        format!("{}{}", base_url.trim_end_matches('/'), self.endpoint_path())
    }

    /// Serialize the request body.
    pub fn request_body(&self, request: &WireRequest<'_>) -> Result<Vec<u8>, serde_json::Error> {
        match self {
            WireFormat::Responses => serde_json::to_vec(&responses::body(request)),
            WireFormat::ChatCompletions => serde_json::to_vec(&chat::body(request)),
        }
    }

    /// Pull the answer text out of a success body.
    ///
    /// `Ok(None)` means the body parsed but carried no usable text.
    pub fn extract_text(&self, body: &str) -> Result<Option<String>, serde_json::Error> {
        match self {
            WireFormat::Responses => responses::extract_text(body),
            WireFormat::ChatCompletions => chat::extract_text(body),
        }
    }
}

impl std::fmt::Display for WireFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// `{"error": {"message": "..."}}`, shared by both formats.
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: Option<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: Option<String>,
}

/// Message from an error envelope, if the body is one.
pub fn error_message(body: &str) -> Option<String> {
    serde_json::from_str::<ErrorEnvelope>(body)
        .ok()?
        .error?
        .message
        .filter(|m| !m.is_empty())
}
