//! Chat Completions format: `POST /v1/chat/completions`.

use serde::{Deserialize, Serialize};

use super::WireRequest;

const USER_PREFIX: &str = "Analyze the following code and provide detailed analysis:";

#[derive(Debug, Serialize)]
pub(super) struct RequestBody<'a> {
    model: &'a str,
    messages: Vec<Message>,
    max_tokens: u32,
    temperature: f64,
}

#[derive(Debug, Serialize)]
struct Message {
    role: &'static str,
    content: String,
}

pub(super) fn body<'a>(request: &WireRequest<'a>) -> RequestBody<'a> {
    RequestBody {
        model: request.model,
        messages: vec![
            Message {
                role: "system",
                content: request.system_instruction.to_string(),
            },
            Message {
                role: "user",
                content: format!("{}\n\n{}", USER_PREFIX, request.prompt),
            },
        ],
        max_tokens: request.max_tokens,
        temperature: request.temperature,
    }
}

#[derive(Debug, Deserialize)]
struct ResponseBody {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    #[serde(default)]
    message: Option<ChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// `message.content` of the first choice.
pub(super) fn extract_text(body: &str) -> Result<Option<String>, serde_json::Error> {
    let parsed: ResponseBody = serde_json::from_str(body)?;
    Ok(parsed
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message)
        .and_then(|m| m.content))
}
