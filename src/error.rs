//! Failure taxonomy for the analysis pipeline.
//!
//! Every stage converts its own failures into [`AnalysisError`]; the
//! analyzer renders them into a marked display string so they never
//! reach the caller as raw errors.

use std::time::Duration;
use thiserror::Error;

use crate::dispatch::DispatchError;
use crate::response::ParseError;

/// Prefix marking a failure in the output stream.
pub const FAILURE_MARKER: &str = "❌";

/// Broad class of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Configuration,
    RequestTooLarge,
    Timeout,
    Cancelled,
    Remote,
    Network,
    Parse,
    Extraction,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Configuration => "configuration",
            ErrorKind::RequestTooLarge => "request-too-large",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Remote => "remote",
            ErrorKind::Network => "network",
            ErrorKind::Parse => "parse",
            ErrorKind::Extraction => "extraction",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
    #[error(transparent)]
    Parse(#[from] ParseError),
}

impl AnalysisError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AnalysisError::Dispatch(e) => e.kind(),
            AnalysisError::Parse(_) => ErrorKind::Parse,
        }
    }

    /// Display string: marker, title, detail and a hint where one helps.
    ///
    /// `estimated_tokens` is echoed in hints for size/time failures.
    pub fn render(&self, estimated_tokens: usize) -> String {
        let title = match self {
            AnalysisError::Dispatch(e) => match e {
                DispatchError::MissingCredential => "API not configured",
                DispatchError::RequestTooLarge { .. } => "Request too large",
                DispatchError::Timeout(_) => "Request timeout",
                DispatchError::Cancelled => "Request canceled",
                DispatchError::Remote { .. } => "API error",
                DispatchError::Network(_) => "Network error",
                DispatchError::Serialize(_) => "Invalid request",
            },
            AnalysisError::Parse(ParseError::Malformed { .. }) => "Error parsing response",
            AnalysisError::Parse(ParseError::MissingText { .. }) => "Could not extract text",
        };

        let mut out = format!("{} **{}**: {}", FAILURE_MARKER, title, self);
        if let Some(hint) = self.hint(estimated_tokens) {
            out.push_str("\n\n");
            out.push_str(&hint);
        }
        out
    }

    fn hint(&self, estimated_tokens: usize) -> Option<String> {
        match self {
            AnalysisError::Dispatch(DispatchError::MissingCredential) => {
                Some("Set an API key with `ilprobe config set api_key <KEY>`.".to_string())
            }
            AnalysisError::Dispatch(DispatchError::RequestTooLarge { .. }) => Some(
                "Please select less code for analysis. Try analyzing smaller methods or types individually."
                    .to_string(),
            ),
            AnalysisError::Dispatch(DispatchError::Timeout(_)) => Some(format!(
                "**Possible causes:**\n\
                 • Slow network connection to the API\n\
                 • API rate limiting\n\
                 • Large request size\n\n\
                 **Debug info:** Estimated tokens: {}",
                estimated_tokens
            )),
            AnalysisError::Dispatch(DispatchError::Network(_)) => {
                Some("Check your internet connection and API base URL.".to_string())
            }
            _ => None,
        }
    }
}

/// Render a duration for messages, e.g. `10 minutes` or `250ms`.
pub(crate) fn human_duration(d: &Duration) -> String {
    let secs = d.as_secs();
    if secs >= 60 && secs % 60 == 0 {
        let mins = secs / 60;
        format!("{} minute{}", mins, if mins == 1 { "" } else { "s" })
    } else if secs > 0 {
        format!("{} seconds", secs)
    } else {
        format!("{}ms", d.as_millis())
    }
}
