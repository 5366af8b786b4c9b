//! Responses format: `POST /v1/responses`.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::WireRequest;

const APPROACH_INSTRUCTION: &str =
    "Before you analyze, explain your approach and what you'll be looking for.";

#[derive(Debug, Serialize)]
pub(super) struct RequestBody<'a> {
    model: &'a str,
    input: String,
    reasoning: Reasoning,
    text: TextOptions,
}

#[derive(Debug, Serialize)]
struct Reasoning {
    effort: &'static str,
}

#[derive(Debug, Serialize)]
struct TextOptions {
    verbosity: &'static str,
}

pub(super) fn body<'a>(request: &WireRequest<'a>) -> RequestBody<'a> {
    RequestBody {
        model: request.model,
        input: format!(
            "{}\n\n{}\n\n{}",
            request.system_instruction, APPROACH_INSTRUCTION, request.prompt
        ),
        reasoning: Reasoning { effort: "medium" },
        text: TextOptions { verbosity: "high" },
    }
}

#[derive(Debug, Deserialize)]
struct ResponseBody {
    #[serde(default)]
    output: Vec<OutputItem>,
}

#[derive(Debug, Deserialize)]
struct OutputItem {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    content: Option<Vec<ContentItem>>,
}

#[derive(Debug, Deserialize)]
struct ContentItem {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    text: Option<String>,
}

/// First non-empty `output_text` of the first `message` item that has one.
///
/// Reasoning items usually precede the message, so order matters.
pub(super) fn extract_text(body: &str) -> Result<Option<String>, serde_json::Error> {
    let parsed: ResponseBody = serde_json::from_str(body)?;
    debug!(items = parsed.output.len(), "parsing responses output");

    for (index, item) in parsed.output.into_iter().enumerate() {
        if item.kind.as_deref() != Some("message") {
            continue;
        }
        for content in item.content.unwrap_or_default() {
            if content.kind.as_deref() != Some("output_text") {
                continue;
            }
            if let Some(text) = content.text.filter(|t| !t.is_empty()) {
                debug!(item = index, chars = text.len(), "found output text");
                return Ok(Some(text));
            }
        }
    }
    Ok(None)
}
