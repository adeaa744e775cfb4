use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSource {
    pub provider: String,
    pub model: String,
}

/// A decoded, displayable image held in memory. Cloning shares the bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageResource {
    mime_type: String,
    bytes: Arc<[u8]>,
    width: u32,
    height: u32,
    source: Option<ImageSource>,
}

impl ImageResource {
    pub fn new(
        mime_type: impl Into<String>,
        bytes: Vec<u8>,
        width: u32,
        height: u32,
        source: Option<ImageSource>,
    ) -> Self {
        Self {
            mime_type: mime_type.into(),
            bytes: Arc::from(bytes),
            width,
            height,
            source,
        }
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn source(&self) -> Option<&ImageSource> {
        self.source.as_ref()
    }

    pub fn data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, BASE64.encode(&self.bytes))
    }

    pub fn file_extension(&self) -> &'static str {
        match self.mime_type.trim().to_ascii_lowercase().as_str() {
            "image/jpeg" | "image/jpg" => "jpg",
            "image/webp" => "webp",
            "image/gif" => "gif",
            _ => "png",
        }
    }

    /// First eight hex chars of the SHA-256 of the bytes.
    pub fn short_id(&self) -> String {
        let digest = Sha256::digest(&self.bytes);
        hex::encode(&digest[..4])
    }

    pub fn sha256(&self) -> String {
        hex::encode(Sha256::digest(&self.bytes))
    }
}
