use std::env;
use std::fmt;
use std::path::Path;

use anyhow::{Context, Result};

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_TEXT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_IMAGE_MODEL: &str = "imagen-4.0-generate-001";
pub const DEFAULT_SYSTEM_INSTRUCTION: &str = include_str!("../resources/system_instruction.md");

/// Settings for the conversational and image services.
///
/// Resolved from the environment first; the CLI then layers its flags on top
/// with the `with_*` builders.
#[derive(Clone)]
pub struct EngineConfig {
    pub api_key: Option<String>,
    pub imagen_api_key: Option<String>,
    pub gemini_api_base: String,
    pub imagen_api_base: String,
    pub text_model: String,
    pub image_model: String,
    pub system_instruction: String,
}

impl EngineConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let api_key = get("GEMINI_API_KEY").or_else(|| get("GOOGLE_API_KEY"));
        let imagen_api_key = get("IMAGEN_API_KEY").or_else(|| api_key.clone());
        let gemini_api_base = get("GEMINI_API_BASE")
            .map(|value| value.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());
        let imagen_api_base = get("IMAGEN_API_BASE")
            .map(|value| value.trim_end_matches('/').to_string())
            .unwrap_or_else(|| gemini_api_base.clone());

        Self {
            api_key,
            imagen_api_key,
            gemini_api_base,
            imagen_api_base,
            text_model: resolve_text_model(
                get("PLATING_TEXT_MODEL").as_deref().unwrap_or(DEFAULT_TEXT_MODEL),
            ),
            image_model: resolve_image_model(
                get("PLATING_IMAGE_MODEL").as_deref().unwrap_or(DEFAULT_IMAGE_MODEL),
            ),
            system_instruction: DEFAULT_SYSTEM_INSTRUCTION.to_string(),
        }
    }

    pub fn with_text_model(mut self, model: Option<&str>) -> Self {
        if let Some(model) = model.map(str::trim).filter(|value| !value.is_empty()) {
            self.text_model = resolve_text_model(model);
        }
        self
    }

    pub fn with_image_model(mut self, model: Option<&str>) -> Self {
        if let Some(model) = model.map(str::trim).filter(|value| !value.is_empty()) {
            self.image_model = resolve_image_model(model);
        }
        self
    }

    pub fn with_system_instruction_file(mut self, path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("failed reading system instruction {}", path.display()))?;
            if !raw.trim().is_empty() {
                self.system_instruction = raw;
            }
        }
        Ok(self)
    }
}

impl fmt::Debug for EngineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |key: &Option<String>| key.as_ref().map(|_| "<redacted>");
        f.debug_struct("EngineConfig")
            .field("api_key", &redact(&self.api_key))
            .field("imagen_api_key", &redact(&self.imagen_api_key))
            .field("gemini_api_base", &self.gemini_api_base)
            .field("imagen_api_base", &self.imagen_api_base)
            .field("text_model", &self.text_model)
            .field("image_model", &self.image_model)
            .field("system_instruction_chars", &self.system_instruction.chars().count())
            .finish()
    }
}

pub fn resolve_text_model(raw_model: &str) -> String {
    raw_model.trim().trim_start_matches("models/").to_string()
}

pub fn resolve_image_model(raw_model: &str) -> String {
    let trimmed = raw_model.trim().trim_start_matches("models/").to_string();
    let lower = trimmed.to_ascii_lowercase();
    match lower.as_str() {
        "imagen-4.0-ultra" | "imagen-4-ultra" => "imagen-4.0-ultra-generate-001".to_string(),
        "imagen-4.0-fast" | "imagen-4-fast" => "imagen-4.0-fast-generate-001".to_string(),
        "imagen-4" | "imagen-4.0" => DEFAULT_IMAGE_MODEL.to_string(),
        _ => trimmed,
    }
}
