//! Ordered in-memory mapping from file name to snippet text.
//!
//! The store is the only place snippets live; nothing is written to disk
//! except through an explicit download or archive export. It knows nothing
//! about which file is selected in the editor.

mod archive;
mod entry;
mod error;

#[cfg(test)]
mod tests;

pub use entry::{content_digest, FileEntry};
pub use error::StoreError;

use crate::security::NameRules;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Key used when an uploaded file name has nothing left after stripping its extension
pub const DEFAULT_NAME: &str = "untitled";

/// Size bounds for stored content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreLimits {
    pub max_file_size: u64,
    pub max_total_size: u64,
}

impl Default for StoreLimits {
    fn default() -> Self {
        Self {
            max_file_size: 1024 * 1024,       // 1 MB per file
            max_total_size: 16 * 1024 * 1024, // 16 MB total
        }
    }
}

/// Result of an upload attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadOutcome {
    Inserted,
    Overwritten,
    /// The key existed and the overwrite was not confirmed
    Declined,
}

#[derive(Debug, Clone)]
pub struct FileStore {
    files: IndexMap<String, FileEntry>,
    limits: StoreLimits,
    default_name: String,
}

impl FileStore {
    /// Create an empty store with default limits
    pub fn new() -> Self {
        Self {
            files: IndexMap::new(),
            limits: StoreLimits::default(),
            default_name: DEFAULT_NAME.to_string(),
        }
    }

    pub fn with_limits(mut self, limits: StoreLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Set the fallback key used by uploads
    pub fn default_name(mut self, name: impl Into<String>) -> Self {
        self.default_name = name.into();
        self
    }

    pub fn limits(&self) -> StoreLimits {
        self.limits
    }

    /// Add a new file at the end of the listing
    ///
    /// Returns the stored key (surrounding whitespace removed).
    pub fn create(&mut self, name: &str, content: &str) -> Result<String, StoreError> {
        let name = NameRules::validate(name)?;
        if self.files.contains_key(&name) {
            return Err(StoreError::DuplicateName(name));
        }
        self.check_size(None, content.len())?;

        self.files
            .insert(name.clone(), FileEntry::new(name.clone(), content));
        tracing::debug!(name = %name, size = content.len(), "file created");
        Ok(name)
    }

    /// Remove `name` if `confirm` agrees. Absent names are a no-op and
    /// `confirm` is not consulted.
    ///
    /// Returns whether a file was removed.
    pub fn delete(&mut self, name: &str, confirm: impl FnOnce(&str) -> bool) -> bool {
        if !self.files.contains_key(name) {
            return false;
        }
        if !confirm(name) {
            tracing::debug!(name, "delete declined");
            return false;
        }
        self.files.shift_remove(name);
        tracing::debug!(name, "file deleted");
        true
    }

    /// Re-key `source` as `target`, silently replacing any file at `target`
    pub fn move_file(&mut self, source: &str, target: &str) -> Result<(), StoreError> {
        if !self.files.contains_key(source) {
            return Err(StoreError::NotFound(source.to_string()));
        }
        let target = NameRules::validate(target)?;
        if source == target {
            return Ok(());
        }

        let Some(mut entry) = self.files.shift_remove(source) else {
            return Err(StoreError::NotFound(source.to_string()));
        };
        entry.name = target.clone();
        let replaced = self.files.insert(target.clone(), entry).is_some();
        tracing::debug!(source, target = %target, replaced, "file moved");
        Ok(())
    }

    /// Store an uploaded file under its name minus the last extension.
    ///
    /// Bytes are decoded as UTF-8, replacing invalid sequences. When the key
    /// already exists `confirm` decides whether to overwrite it.
    pub fn upload(
        &mut self,
        file_name: &str,
        bytes: &[u8],
        confirm: impl FnOnce(&str) -> bool,
    ) -> Result<UploadOutcome, StoreError> {
        let stripped = NameRules::strip_extension(file_name);
        let key = if stripped.trim().is_empty() {
            self.default_name.clone()
        } else {
            stripped
        };
        let key = NameRules::validate(&key)?;
        let content = String::from_utf8_lossy(bytes).into_owned();
        self.check_size(Some(&key), content.len())?;

        let outcome = match self.files.get_mut(&key) {
            Some(existing) => {
                if !confirm(&key) {
                    tracing::debug!(name = %key, "upload overwrite declined");
                    return Ok(UploadOutcome::Declined);
                }
                existing.content = content;
                UploadOutcome::Overwritten
            }
            None => {
                self.files
                    .insert(key.clone(), FileEntry::new(key.clone(), content));
                UploadOutcome::Inserted
            }
        };
        tracing::debug!(file_name, name = %key, ?outcome, "file uploaded");
        Ok(outcome)
    }

    /// Names in insertion order
    pub fn list(&self) -> Vec<&str> {
        self.files.keys().map(|k| k.as_str()).collect()
    }

    pub fn entries(&self) -> impl Iterator<Item = &FileEntry> {
        self.files.values()
    }

    /// A file's content
    pub fn get(&self, name: &str) -> Option<&str> {
        self.files.get(name).map(|e| e.content.as_str())
    }

    pub fn entry(&self, name: &str) -> Option<&FileEntry> {
        self.files.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.files.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Sum of content sizes in bytes
    pub fn total_size(&self) -> usize {
        self.files.values().map(FileEntry::size).sum()
    }

    /// Enforce limits for content of `size` bytes, optionally replacing `replacing`
    fn check_size(&self, replacing: Option<&str>, size: usize) -> Result<(), StoreError> {
        let size = size as u64;
        if size > self.limits.max_file_size {
            return Err(StoreError::FileTooLarge {
                size,
                max: self.limits.max_file_size,
            });
        }

        let freed = replacing
            .and_then(|name| self.files.get(name))
            .map_or(0, |e| e.size() as u64);
        let new_total = self.total_size() as u64 - freed + size;
        if new_total > self.limits.max_total_size {
            return Err(StoreError::FileTooLarge {
                size: new_total,
                max: self.limits.max_total_size,
            });
        }
        Ok(())
    }
}

impl Default for FileStore {
    fn default() -> Self {
        Self::new()
    }
}
