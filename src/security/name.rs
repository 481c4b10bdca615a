use crate::store::StoreError;
use std::path::Path;

/// Longest accepted file name, in characters
const MAX_NAME_LEN: usize = 255;

pub struct NameRules;

impl NameRules {
    /// Validate a store key and return it trimmed.
    ///
    /// Keys are flat names: no path separators, no control characters, not
    /// `.` or `..`, and not empty once surrounding whitespace is removed.
    pub fn validate(raw: &str) -> Result<String, StoreError> {
        let name = raw.trim();

        // Reject empty names
        if name.is_empty() {
            return Err(StoreError::InvalidName("name must not be empty".to_string()));
        }

        if name == "." || name == ".." {
            return Err(StoreError::InvalidName(format!("reserved name: {}", name)));
        }

        if let Some(c) = name.chars().find(|c| matches!(c, '/' | '\\') || c.is_control()) {
            return Err(StoreError::InvalidName(format!(
                "invalid character {:?} in name: {}",
                c, name
            )));
        }

        let len = name.chars().count();
        if len > MAX_NAME_LEN {
            return Err(StoreError::InvalidName(format!(
                "name is {} characters long (max: {})",
                len, MAX_NAME_LEN
            )));
        }

        Ok(name.to_string())
    }

    /// Store key for an uploaded file: the final path component with its last
    /// extension removed (`dir/a.b.ts` → `a.b`).
    ///
    /// Names without a dot, and names whose only dot is the leading one,
    /// yield an empty string.
    pub fn strip_extension(file_name: &str) -> String {
        let base = Path::new(file_name)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(file_name);
        match base.rsplit_once('.') {
            Some((stem, _)) => stem.to_string(),
            None => String::new(),
        }
    }

    /// File name used when exporting `name` with `extension`
    pub fn with_extension(name: &str, extension: &str) -> String {
        let extension = extension.trim_start_matches('.');
        if extension.is_empty() {
            name.to_string()
        } else {
            format!("{}.{}", name, extension)
        }
    }
}
