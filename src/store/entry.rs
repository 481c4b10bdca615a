use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};

/// A snippet held by the store
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileEntry {
    /// Unique key, without extension
    pub name: String,
    /// Raw text; may be empty
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl FileEntry {
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
            created_at: Utc::now(),
        }
    }

    /// Content length in bytes
    pub fn size(&self) -> usize {
        self.content.len()
    }

    /// SHA-256 of the content, hex encoded
    pub fn digest(&self) -> String {
        content_digest(&self.content)
    }
}

pub fn content_digest(content: &str) -> String {
    hex::encode(Sha256::digest(content.as_bytes()))
}
