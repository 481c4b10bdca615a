//! The editor side of the playground.
//!
//! Selecting a file copies its content into the editor; edits stay in the
//! editor and never flow back into the store. Saving is done by download or
//! by re-uploading.

use crate::store::{content_digest, FileStore};

/// Snippet shown when the session starts
pub const INITIAL_TEXT: &str = "console.log(\"Hello, world!\");";

/// A text editing surface
pub trait Editor {
    fn value(&self) -> String;
    fn set_value(&mut self, text: &str);
}

/// Plain in-memory editor
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextBuffer {
    text: String,
}

impl TextBuffer {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

impl Editor for TextBuffer {
    fn value(&self) -> String {
        self.text.clone()
    }

    fn set_value(&mut self, text: &str) {
        self.text = text.to_string();
    }
}

/// Tracks which file was last loaded into the editor
#[derive(Debug)]
pub struct ActiveBuffer<E: Editor> {
    editor: E,
    selection: Option<String>,
}

impl<E: Editor> ActiveBuffer<E> {
    pub fn new(editor: E) -> Self {
        Self {
            editor,
            selection: None,
        }
    }

    /// Load `name` from the store into the editor.
    ///
    /// Returns false (and leaves the editor untouched) when the store has no
    /// such file.
    pub fn select(&mut self, store: &FileStore, name: &str) -> bool {
        let Some(content) = store.get(name) else {
            return false;
        };
        self.editor.set_value(content);
        self.selection = Some(name.to_string());
        tracing::debug!(name, "file selected");
        true
    }

    /// Name of the last selected file, if it still exists in `store`
    pub fn selection<'a>(&'a self, store: &FileStore) -> Option<&'a str> {
        self.selection
            .as_deref()
            .filter(|name| store.contains(name))
    }

    /// Whether the editor text differs from the selected file's stored content
    pub fn is_modified(&self, store: &FileStore) -> bool {
        match self.selection.as_deref().and_then(|name| store.entry(name)) {
            Some(entry) => content_digest(&self.editor.value()) != entry.digest(),
            None => false,
        }
    }

    pub fn text(&self) -> String {
        self.editor.value()
    }

    pub fn set_text(&mut self, text: &str) {
        self.editor.set_value(text);
    }

    pub fn editor(&self) -> &E {
        &self.editor
    }

    pub fn editor_mut(&mut self) -> &mut E {
        &mut self.editor
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> FileStore {
        let mut store = FileStore::new();
        store.create("a", "alpha").unwrap();
        store.create("b", "beta").unwrap();
        store
    }

    #[test]
    fn test_select_loads_content() {
        let store = store();
        let mut buffer = ActiveBuffer::new(TextBuffer::new(INITIAL_TEXT));
        assert!(buffer.select(&store, "b"));
        assert_eq!(buffer.text(), "beta");
        assert_eq!(buffer.selection(&store), Some("b"));
    }

    #[test]
    fn test_select_missing_keeps_editor() {
        let store = store();
        let mut buffer = ActiveBuffer::new(TextBuffer::new(INITIAL_TEXT));
        assert!(!buffer.select(&store, "zzz"));
        assert_eq!(buffer.text(), INITIAL_TEXT);
        assert_eq!(buffer.selection(&store), None);
    }

    #[test]
    fn test_edits_do_not_write_back() {
        let store = store();
        let mut buffer = ActiveBuffer::new(TextBuffer::default());
        buffer.select(&store, "a");
        buffer.set_text("changed");
        assert_eq!(store.get("a"), Some("alpha"));
        assert!(buffer.is_modified(&store));

        buffer.select(&store, "a");
        assert_eq!(buffer.text(), "alpha");
        assert!(!buffer.is_modified(&store));
    }

    #[test]
    fn test_selection_of_deleted_file_is_gone() {
        let mut store = store();
        let mut buffer = ActiveBuffer::new(TextBuffer::default());
        buffer.select(&store, "a");
        store.delete("a", |_| true);
        assert_eq!(buffer.selection(&store), None);
        assert_eq!(buffer.text(), "alpha");
    }
}
