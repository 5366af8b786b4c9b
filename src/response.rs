//! Answer extraction from completion responses.
//!
//! Parsing never loses information: when no answer can be extracted the
//! error carries the raw body verbatim.

use thiserror::Error;
use tracing::warn;

use crate::wire::WireFormat;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("{detail}\n\nRaw response:\n{raw}")]
    Malformed { detail: String, raw: String },
    #[error("{format} response received but no text could be extracted\n\nRaw response:\n{raw}")]
    MissingText { format: WireFormat, raw: String },
}

impl ParseError {
    /// The unmodified response body.
    pub fn raw(&self) -> &str {
        match self {
            ParseError::Malformed { raw, .. } | ParseError::MissingText { raw, .. } => raw,
        }
    }
}

/// Extract the answer text from a success body of the given format.
pub fn parse(body: &str, format: WireFormat) -> Result<String, ParseError> {
    match format.extract_text(body) {
        Ok(Some(text)) => Ok(text),
        Ok(None) => {
            warn!(%format, "no answer text in response");
            Err(ParseError::MissingText {
                format,
                raw: body.to_string(),
            })
        }
        Err(e) => {
            warn!(%format, error = %e, "malformed response body");
            Err(ParseError::Malformed {
                detail: e.to_string(),
                raw: body.to_string(),
            })
        }
    }
}
