use serde::{Deserialize, Serialize};
use serde_json::Value;

const FENCE: &str = "```";
const GENERATE_IMAGE_ACTION: &str = "generate_image";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DirectiveAction {
    GenerateImage,
}

impl DirectiveAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GenerateImage => GENERATE_IMAGE_ACTION,
        }
    }
}

/// Machine-actionable instruction embedded in a model reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Directive {
    pub action: DirectiveAction,
    pub prompt: String,
}

impl Directive {
    pub fn generate_image(prompt: impl Into<String>) -> Self {
        Self {
            action: DirectiveAction::GenerateImage,
            prompt: prompt.into(),
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

/// A model reply is either prose for the transcript or a directive to act on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelReply {
    Conversation(String),
    Directive(Directive),
}

pub fn classify_reply(text: &str) -> ModelReply {
    match parse_directive(text) {
        Some(directive) => ModelReply::Directive(directive),
        None => ModelReply::Conversation(text.to_string()),
    }
}

/// Looks for an embedded `{"action":"generate_image","prompt":...}` object,
/// either inside the first ```json fence or as the whole trimmed text.
/// Malformed or partial JSON yields `None`.
pub fn parse_directive(text: &str) -> Option<Directive> {
    let payload = match fenced_json_body(text) {
        Some(body) => serde_json::from_str::<Value>(body.trim()).ok()?,
        None => {
            let trimmed = text.trim();
            if !trimmed.starts_with('{') {
                return None;
            }
            serde_json::from_str::<Value>(trimmed).ok()?
        }
    };
    directive_from_value(&payload)
}

fn directive_from_value(value: &Value) -> Option<Directive> {
    let obj = value.as_object()?;
    let action = obj.get("action").and_then(Value::as_str)?;
    if action != GENERATE_IMAGE_ACTION {
        return None;
    }
    let prompt = obj
        .get("prompt")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())?;
    Some(Directive::generate_image(prompt))
}

/// Interior of the first fenced block opened with a `json` tag. Other
/// backtick runs (prose mentions, inline spans, fences of other languages)
/// are skipped. An opening with no closing fence after it does not count.
fn fenced_json_body(text: &str) -> Option<&str> {
    let mut cursor = 0;
    while let Some(offset) = text[cursor..].find(FENCE) {
        let open = cursor + offset + FENCE.len();
        cursor = open;
        let Some(line_len) = text[open..].find('\n') else {
            continue;
        };
        if !text[open..open + line_len].trim().eq_ignore_ascii_case("json") {
            continue;
        }
        let body_start = open + line_len + 1;
        let close = text[body_start..].find(FENCE)?;
        return Some(&text[body_start..body_start + close]);
    }
    None
}
