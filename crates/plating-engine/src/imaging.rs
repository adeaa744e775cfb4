use std::time::Duration;

use anyhow::{bail, Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use image::codecs::jpeg::JpegEncoder;
use image::{Rgb, RgbImage};
use reqwest::blocking::Client as HttpClient;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

use crate::config::EngineConfig;
use crate::read_json_response;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRequest {
    pub prompt: String,
    pub count: u64,
    pub mime_type: String,
    pub aspect_ratio: String,
}

impl ImageRequest {
    /// One square JPEG, the only shape the chat asks for.
    pub fn square_jpeg(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            count: 1,
            mime_type: "image/jpeg".to_string(),
            aspect_ratio: "1:1".to_string(),
        }
    }
}

/// A still-encoded image as returned by a service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedImage {
    pub bytes_base64: String,
    pub mime_type: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ImageResponse {
    pub images: Vec<GeneratedImage>,
    pub warnings: Vec<String>,
}

pub trait ImageService: Send + Sync {
    fn name(&self) -> &str;
    fn model(&self) -> &str;
    fn generate(&self, request: &ImageRequest) -> Result<ImageResponse>;
}

pub struct ImagenProvider {
    api_base: String,
    api_key: String,
    model: String,
    http: HttpClient,
}

impl ImagenProvider {
    pub fn new(config: &EngineConfig) -> Result<Self> {
        let Some(api_key) = config.imagen_api_key.clone() else {
            bail!("IMAGEN_API_KEY, GEMINI_API_KEY or GOOGLE_API_KEY not set");
        };
        let http = HttpClient::builder()
            .timeout(None::<Duration>)
            .build()
            .context("failed to build Imagen HTTP client")?;
        Ok(Self {
            api_base: config.imagen_api_base.clone(),
            api_key,
            model: config.image_model.clone(),
            http,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:predict", self.api_base, self.model)
    }

    fn build_payload(request: &ImageRequest) -> Value {
        json!({
            "instances": [{
                "prompt": request.prompt,
            }],
            "parameters": {
                "sampleCount": request.count,
                "aspectRatio": request.aspect_ratio,
                "outputOptions": {
                    "mimeType": request.mime_type,
                },
            },
        })
    }

    /// Pulls the encoded images out of a `:predict` response. Safety-filtered
    /// predictions carry no bytes; their reasons become warnings.
    fn extract_predictions(
        response_payload: &Value,
        warnings: &mut Vec<String>,
    ) -> Vec<GeneratedImage> {
        let mut out = Vec::new();
        let predictions = response_payload
            .get("predictions")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        for row in predictions {
            let Some(obj) = row.as_object() else {
                continue;
            };
            if let Some(encoded) = obj
                .get("bytesBase64Encoded")
                .or_else(|| obj.get("bytes_base64_encoded"))
                .and_then(Value::as_str)
                .filter(|value| !value.trim().is_empty())
            {
                out.push(GeneratedImage {
                    bytes_base64: encoded.to_string(),
                    mime_type: obj
                        .get("mimeType")
                        .or_else(|| obj.get("mime_type"))
                        .and_then(Value::as_str)
                        .map(str::to_string),
                });
                continue;
            }
            if let Some(reason) = obj.get("raiFilteredReason").and_then(Value::as_str) {
                let warning = format!("Imagen filtered an image: {reason}");
                if !warnings.contains(&warning) {
                    warnings.push(warning);
                }
            }
        }
        out
    }
}

impl ImageService for ImagenProvider {
    fn name(&self) -> &str {
        "imagen"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn generate(&self, request: &ImageRequest) -> Result<ImageResponse> {
        let endpoint = self.endpoint();
        let response = self
            .http
            .post(&endpoint)
            .query(&[("key", self.api_key.as_str())])
            .json(&Self::build_payload(request))
            .send()
            .with_context(|| format!("Imagen request failed ({endpoint})"))?;
        let response_payload = read_json_response("Imagen", response)?;
        let mut warnings = Vec::new();
        let images = Self::extract_predictions(&response_payload, &mut warnings);
        Ok(ImageResponse { images, warnings })
    }
}

/// Offline stand-in that paints a solid JPEG whose color is derived from the
/// prompt, so the same prompt always yields the same image.
#[derive(Debug, Clone)]
pub struct DryrunImageService {
    size: u32,
}

impl DryrunImageService {
    pub fn new() -> Self {
        Self { size: 256 }
    }

    pub fn with_size(size: u32) -> Self {
        Self { size: size.max(1) }
    }
}

impl Default for DryrunImageService {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageService for DryrunImageService {
    fn name(&self) -> &str {
        "dryrun"
    }

    fn model(&self) -> &str {
        "dryrun-image-1"
    }

    fn generate(&self, request: &ImageRequest) -> Result<ImageResponse> {
        let mut images = Vec::new();
        for idx in 0..request.count.max(1) {
            let (r, g, b) = color_from_prompt(&request.prompt, idx);
            let image = RgbImage::from_pixel(self.size, self.size, Rgb([r, g, b]));
            let mut bytes = Vec::new();
            JpegEncoder::new_with_quality(&mut bytes, 90)
                .encode_image(&image)
                .context("dryrun JPEG encode failed")?;
            images.push(GeneratedImage {
                bytes_base64: BASE64.encode(bytes),
                mime_type: Some("image/jpeg".to_string()),
            });
        }
        Ok(ImageResponse {
            images,
            warnings: Vec::new(),
        })
    }
}

fn color_from_prompt(prompt: &str, seed: u64) -> (u8, u8, u8) {
    let mut hasher = Sha256::new();
    hasher.update(prompt.as_bytes());
    hasher.update(seed.to_be_bytes());
    let digest = hasher.finalize();
    (digest[0], digest[1], digest[2])
}
