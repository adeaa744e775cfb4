use anyhow::{bail, Context, Result};
use reqwest::blocking::Response as HttpResponse;
use serde_json::Value;

mod config;
mod conversation;
mod imaging;
mod orchestrator;
mod synthesizer;
pub mod text;

pub use config::{
    resolve_image_model, resolve_text_model, EngineConfig, DEFAULT_API_BASE, DEFAULT_IMAGE_MODEL,
    DEFAULT_SYSTEM_INSTRUCTION, DEFAULT_TEXT_MODEL,
};
pub use conversation::{ChatSession, DryrunChatSession, GeminiChatSession};
pub use imaging::{
    DryrunImageService, GeneratedImage, ImageRequest, ImageResponse, ImageService, ImagenProvider,
};
pub use orchestrator::{ChatOrchestrator, IgnoreReason, SubmitOutcome, TurnPhase};
pub use synthesizer::{decode_generated_image, ImageSynthesizer};

/// Reads a Google API response body as JSON. Non-2xx replies become errors
/// carrying the status and, when present, the `error.message` of Google's
/// error envelope.
pub(crate) fn read_json_response(service: &str, response: HttpResponse) -> Result<Value> {
    let status = response.status();
    let body = response
        .text()
        .with_context(|| format!("{service} response body could not be read"))?;
    if !status.is_success() {
        bail!(
            "{service} responded with {status}: {}",
            api_error_message(&body)
        );
    }
    serde_json::from_str(&body).with_context(|| format!("{service} response is not valid JSON"))
}

fn api_error_message(body: &str) -> String {
    let envelope_message = serde_json::from_str::<Value>(body).ok().and_then(|payload| {
        payload
            .get("error")
            .and_then(|error| error.get("message"))
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|message| !message.is_empty())
            .map(str::to_string)
    });
    match envelope_message {
        Some(message) => message,
        None if body.trim().is_empty() => "empty body".to_string(),
        None => clip(body.trim(), API_ERROR_BODY_MAX_CHARS),
    }
}

const API_ERROR_BODY_MAX_CHARS: usize = 300;

/// One-line rendering of an error and its causes, as shown in the transcript.
pub fn describe_error(err: &anyhow::Error, max_chars: usize) -> String {
    let flattened = format!("{err:#}").replace(['\n', '\r'], " ");
    clip(flattened.trim(), max_chars)
}

fn clip(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}…", &text[..cut]),
        None => text.to_string(),
    }
}
