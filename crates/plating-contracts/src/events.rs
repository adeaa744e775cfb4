use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::Context;
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::artifacts::ImageArtifact;
use crate::chat::DirectiveAction;
use crate::resources::{ImageResource, ImageSource};

/// Something worth recording about a chat session. Turn-scoped events carry
/// the 1-based turn number they belong to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    SessionStarted {
        text_model: String,
        image_provider: String,
        image_model: String,
    },
    SessionFailed {
        error: String,
    },
    TurnStarted {
        turn: u64,
        chars: usize,
    },
    ChatReply {
        turn: u64,
        chars: usize,
    },
    DirectiveDetected {
        turn: u64,
        action: DirectiveAction,
        prompt: String,
    },
    ImageGenerated {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        turn: Option<u64>,
        mime_type: String,
        width: u32,
        height: u32,
        byte_len: usize,
        source: Option<ImageSource>,
    },
    ImageFailed {
        turn: u64,
        error: String,
    },
    TurnFailed {
        turn: u64,
        error: String,
    },
    ImageSaved {
        image_path: PathBuf,
        receipt_path: PathBuf,
    },
}

impl SessionEvent {
    /// Image metadata only; the bytes never reach the log.
    pub fn image_generated(turn: Option<u64>, image: &ImageResource) -> Self {
        Self::ImageGenerated {
            turn,
            mime_type: image.mime_type().to_string(),
            width: image.width(),
            height: image.height(),
            byte_len: image.bytes().len(),
            source: image.source().cloned(),
        }
    }

    pub fn image_saved(artifact: &ImageArtifact) -> Self {
        Self::ImageSaved {
            image_path: artifact.image_path.clone(),
            receipt_path: artifact.receipt_path.clone(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::SessionStarted { .. } => "session_started",
            Self::SessionFailed { .. } => "session_failed",
            Self::TurnStarted { .. } => "turn_started",
            Self::ChatReply { .. } => "chat_reply",
            Self::DirectiveDetected { .. } => "directive_detected",
            Self::ImageGenerated { .. } => "image_generated",
            Self::ImageFailed { .. } => "image_failed",
            Self::TurnFailed { .. } => "turn_failed",
            Self::ImageSaved { .. } => "image_saved",
        }
    }
}

/// One line of the log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    pub session_id: String,
    pub seq: u64,
    pub ts: String,
    #[serde(flatten)]
    pub event: SessionEvent,
}

/// Append-only JSONL log for one chat session. Clones append to the same
/// file and share the sequence counter.
#[derive(Debug, Clone)]
pub struct SessionLog {
    inner: Arc<SessionLogInner>,
}

#[derive(Debug)]
struct SessionLogInner {
    path: PathBuf,
    session_id: String,
    next_seq: Mutex<u64>,
}

impl SessionLog {
    pub fn open(path: impl Into<PathBuf>, session_id: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(SessionLogInner {
                path: path.into(),
                session_id: session_id.into(),
                next_seq: Mutex::new(0),
            }),
        }
    }

    pub fn for_new_session(path: impl Into<PathBuf>) -> Self {
        Self::open(path, Uuid::new_v4().to_string())
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    pub fn session_id(&self) -> &str {
        &self.inner.session_id
    }

    /// Appends `event` under the next sequence number. The number is only
    /// consumed when the line was written.
    pub fn record(&self, event: SessionEvent) -> anyhow::Result<EventRecord> {
        let mut next_seq = self
            .inner
            .next_seq
            .lock()
            .map_err(|_| anyhow::anyhow!("session log lock poisoned"))?;
        let record = EventRecord {
            session_id: self.inner.session_id.clone(),
            seq: *next_seq,
            ts: timestamp_now(),
            event,
        };
        let line = serde_json::to_string(&record)?;

        let path = &self.inner.path;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("failed to open {}", path.display()))?;
        writeln!(file, "{line}").with_context(|| format!("failed to append to {}", path.display()))?;

        *next_seq += 1;
        Ok(record)
    }
}

pub(crate) fn timestamp_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false)
}
