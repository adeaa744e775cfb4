use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::events::timestamp_now;
use crate::resources::ImageResource;

pub const RECEIPT_SCHEMA_VERSION: u64 = 1;
pub const DEFAULT_IMAGE_STEM: &str = "recipe-visualization";

/// Where a saved image and its receipt ended up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageArtifact {
    pub image_path: PathBuf,
    pub receipt_path: PathBuf,
}

/// Writes `<dir>/<stem>-<short id>.<ext>` plus a `.json` receipt beside it.
pub fn save_image_artifact(dir: &Path, stem: &str, image: &ImageResource) -> anyhow::Result<ImageArtifact> {
    let stem = if stem.trim().is_empty() {
        DEFAULT_IMAGE_STEM
    } else {
        stem.trim()
    };
    let file_name = format!("{}-{}.{}", stem, image.short_id(), image.file_extension());
    save_image_to(&dir.join(file_name), image)
}

/// Writes the image to an explicit path; the receipt takes the same name
/// with a `.json` extension.
pub fn save_image_to(image_path: &Path, image: &ImageResource) -> anyhow::Result<ImageArtifact> {
    if let Some(parent) = image_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    std::fs::write(image_path, image.bytes())
        .with_context(|| format!("failed to write {}", image_path.display()))?;

    let receipt_path = image_path.with_extension("json");
    let payload = build_receipt(image, image_path);
    write_receipt(&receipt_path, &payload)?;
    Ok(ImageArtifact {
        image_path: image_path.to_path_buf(),
        receipt_path,
    })
}

pub fn build_receipt(image: &ImageResource, image_path: &Path) -> Value {
    let mut root = Map::new();
    root.insert(
        "schema_version".to_string(),
        Value::Number(RECEIPT_SCHEMA_VERSION.into()),
    );
    root.insert(
        "image_path".to_string(),
        Value::String(image_path.to_string_lossy().to_string()),
    );
    root.insert(
        "mime_type".to_string(),
        Value::String(image.mime_type().to_string()),
    );
    root.insert("width".to_string(), Value::Number(image.width().into()));
    root.insert("height".to_string(), Value::Number(image.height().into()));
    root.insert(
        "byte_len".to_string(),
        Value::Number((image.bytes().len() as u64).into()),
    );
    root.insert("sha256".to_string(), Value::String(image.sha256()));
    root.insert(
        "source".to_string(),
        image
            .source()
            .and_then(|source| serde_json::to_value(source).ok())
            .unwrap_or(Value::Null),
    );
    root.insert("saved_at".to_string(), Value::String(timestamp_now()));
    Value::Object(root)
}

pub fn write_receipt(path: &Path, payload: &Value) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_json::to_string_pretty(payload)?)?;
    Ok(())
}
