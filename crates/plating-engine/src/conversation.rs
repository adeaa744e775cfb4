use std::time::Duration;

use anyhow::{bail, Context, Result};
use plating_contracts::chat::Directive;
use reqwest::blocking::Client as HttpClient;
use serde_json::{json, Value};

use crate::config::EngineConfig;
use crate::read_json_response;

/// One live conversation with a chat model. The session owns whatever turn
/// history the service needs; callers only exchange text.
pub trait ChatSession: Send {
    fn model(&self) -> &str;
    fn send_message(&mut self, text: &str) -> Result<String>;
}

/// Gemini `generateContent` session. The REST API is stateless, so the turn
/// history lives here and is replayed on every call.
pub struct GeminiChatSession {
    api_base: String,
    api_key: String,
    model: String,
    system_instruction: String,
    history: Vec<Value>,
    http: HttpClient,
}

impl GeminiChatSession {
    pub fn new(config: &EngineConfig) -> Result<Self> {
        let Some(api_key) = config.api_key.clone() else {
            bail!("GEMINI_API_KEY or GOOGLE_API_KEY not set");
        };
        let http = HttpClient::builder()
            .timeout(None::<Duration>)
            .build()
            .context("failed to build Gemini HTTP client")?;
        Ok(Self {
            api_base: config.gemini_api_base.clone(),
            api_key,
            model: config.text_model.clone(),
            system_instruction: config.system_instruction.clone(),
            history: Vec::new(),
            http,
        })
    }

    fn endpoint(&self) -> String {
        let trimmed = self.model.trim();
        let model_path = if trimmed.starts_with("models/") {
            trimmed.to_string()
        } else {
            format!("models/{trimmed}")
        };
        format!("{}/{}:generateContent", self.api_base, model_path)
    }

    fn build_payload(&self, text: &str) -> Value {
        let mut contents = self.history.clone();
        contents.push(text_content("user", text));
        let mut payload = json!({ "contents": contents });
        if !self.system_instruction.trim().is_empty() {
            payload["systemInstruction"] = json!({
                "parts": [{ "text": self.system_instruction }],
            });
        }
        payload
    }

    fn extract_text(response_payload: &Value) -> Result<String> {
        let candidates = response_payload
            .get("candidates")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        let Some(candidate) = candidates.first() else {
            if let Some(reason) = response_payload
                .get("promptFeedback")
                .and_then(|feedback| feedback.get("blockReason"))
                .and_then(Value::as_str)
            {
                bail!("Gemini blocked the prompt ({reason})");
            }
            bail!("Gemini returned no candidates");
        };

        let text = candidate
            .get("content")
            .and_then(|content| content.get("parts"))
            .and_then(Value::as_array)
            .map(|parts| {
                parts
                    .iter()
                    .filter(|part| !part.get("thought").and_then(Value::as_bool).unwrap_or(false))
                    .filter_map(|part| part.get("text").and_then(Value::as_str))
                    .collect::<String>()
            })
            .unwrap_or_default();
        if text.trim().is_empty() {
            let reason = candidate
                .get("finishReason")
                .and_then(Value::as_str)
                .unwrap_or("unknown");
            bail!("Gemini returned an empty reply (finish reason: {reason})");
        }
        Ok(text)
    }
}

impl ChatSession for GeminiChatSession {
    fn model(&self) -> &str {
        &self.model
    }

    fn send_message(&mut self, text: &str) -> Result<String> {
        let endpoint = self.endpoint();
        let payload = self.build_payload(text);
        let response = self
            .http
            .post(&endpoint)
            .query(&[("key", self.api_key.as_str())])
            .json(&payload)
            .send()
            .with_context(|| format!("Gemini request failed ({endpoint})"))?;
        let response_payload = read_json_response("Gemini", response)?;
        let reply = Self::extract_text(&response_payload)?;

        self.history.push(text_content("user", text));
        self.history.push(text_content("model", &reply));
        Ok(reply)
    }
}

fn text_content(role: &str, text: &str) -> Value {
    json!({
        "role": role,
        "parts": [{ "text": text }],
    })
}

/// Offline stand-in: asks one follow-up question, then asks for a picture of
/// everything the user said.
#[derive(Debug, Default)]
pub struct DryrunChatSession {
    user_turns: Vec<String>,
}

impl DryrunChatSession {
    pub const FOLLOW_UP: &'static str =
        "Sounds delicious! How is it served (plate, bowl or glass), and what goes on top?";

    pub fn new() -> Self {
        Self::default()
    }
}

impl ChatSession for DryrunChatSession {
    fn model(&self) -> &str {
        "dryrun-text-1"
    }

    fn send_message(&mut self, text: &str) -> Result<String> {
        self.user_turns.push(text.trim().to_string());
        if self.user_turns.len() < 2 {
            return Ok(Self::FOLLOW_UP.to_string());
        }
        let details = self.user_turns.join(". ");
        self.user_turns.clear();
        let directive = Directive::generate_image(format!(
            "Photorealistic food photography of {details}. Styled on a rustic table, soft natural light, shallow depth of field."
        ));
        Ok(format!("```json\n{}\n```", directive.to_json()))
    }
}
