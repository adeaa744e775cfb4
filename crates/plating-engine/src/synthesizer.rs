use std::io::Cursor;

use anyhow::{bail, Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use image::ImageReader;
use plating_contracts::resources::{ImageResource, ImageSource};

use crate::imaging::{GeneratedImage, ImageRequest, ImageService};

/// Turns an image prompt into a displayable image with exactly one call to
/// the image service.
pub struct ImageSynthesizer {
    service: Box<dyn ImageService>,
}

impl ImageSynthesizer {
    pub fn new(service: Box<dyn ImageService>) -> Self {
        Self { service }
    }

    pub fn service_name(&self) -> &str {
        self.service.name()
    }

    pub fn model(&self) -> &str {
        self.service.model()
    }

    pub fn synthesize(&self, prompt: &str) -> Result<ImageResource> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            bail!("image prompt is empty");
        }
        let request = ImageRequest::square_jpeg(prompt);
        let response = self
            .service
            .generate(&request)
            .with_context(|| format!("{} image generation failed", self.service.name()))?;
        for warning in &response.warnings {
            tracing::warn!(provider = self.service.name(), "{warning}");
        }

        let Some(first) = response.images.into_iter().next() else {
            if response.warnings.is_empty() {
                bail!("{} returned no images", self.service.name());
            }
            bail!(
                "{} returned no images ({})",
                self.service.name(),
                response.warnings.join("; ")
            );
        };
        let source = ImageSource {
            provider: self.service.name().to_string(),
            model: self.service.model().to_string(),
        };
        decode_generated_image(&first, Some(source))
    }
}

/// Decodes a base64 payload and checks that it really is an image, taking
/// the MIME type and dimensions from the bytes rather than the service's label.
pub fn decode_generated_image(
    image: &GeneratedImage,
    source: Option<ImageSource>,
) -> Result<ImageResource> {
    let bytes = BASE64
        .decode(image.bytes_base64.trim().as_bytes())
        .context("image payload is not valid base64")?;
    if bytes.is_empty() {
        bail!("image payload is empty");
    }
    let format = image::guess_format(&bytes).context("image payload is not a recognized format")?;
    let (width, height) = ImageReader::with_format(Cursor::new(bytes.as_slice()), format)
        .into_dimensions()
        .context("image payload could not be read")?;
    if let Some(declared) = image.mime_type.as_deref() {
        if !declared.eq_ignore_ascii_case(format.to_mime_type()) {
            tracing::debug!(
                declared,
                detected = format.to_mime_type(),
                "image MIME type differs from payload"
            );
        }
    }
    Ok(ImageResource::new(
        format.to_mime_type(),
        bytes,
        width,
        height,
        source,
    ))
}
