use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    /// Decoded as text.
    Text,
    /// Text extracted from a PDF or Word document.
    Document,
    /// Tagged base64 blob.
    Binary,
}

/// A normalized upload, ready to be quoted in a prompt.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct FileContextUnit {
    pub name: String,
    pub mime_type: String,
    pub content: String,
    pub size_bytes: u64,
    pub kind: ContentKind,
}

/// Accumulated file context. Grows across uploads until [`FileContextStore::clear`];
/// same-named units are kept side by side.
#[derive(Debug, Default)]
pub struct FileContextStore {
    units: Vec<FileContextUnit>,
}

impl FileContextStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_many(&mut self, units: impl IntoIterator<Item = FileContextUnit>) {
        self.units.extend(units);
    }

    pub fn clear(&mut self) {
        self.units.clear();
    }

    /// Units in the order they were added, oldest first.
    pub fn snapshot(&self) -> &[FileContextUnit] {
        &self.units
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}
