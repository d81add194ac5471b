use std::fs;
use std::io;
use std::path::Path;

use super::Advisory;

/// Cap on the files picked in one selection (10 MiB).
pub const MAX_SELECTION_SIZE: u64 = 10 * 1024 * 1024;

const ALLOWED_CONTENT_TYPES: [&str; 8] = [
    "image/jpeg",
    "image/png",
    "application/pdf",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "application/vnd.ms-excel",
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    "text/plain",
];

const ALLOWED_EXTENSIONS: [&str; 9] = [
    "jpg", "jpeg", "png", "pdf", "doc", "docx", "xls", "xlsx", "txt",
];

/// A file picked for upload, with the content type the picker reported.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SelectedFile {
    pub name: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

impl SelectedFile {
    pub fn new(name: impl Into<String>, content_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            data,
        }
    }

    /// Read a file from disk, guessing its type from the extension the way
    /// a browser file picker does.
    pub fn from_path(path: &Path) -> io::Result<Self> {
        let data = fs::read(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let content_type = mime_guess::from_path(path)
            .first_or_octet_stream()
            .essence_str()
            .to_string();
        Ok(Self::new(name, content_type, data))
    }

    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }

    fn is_allowed(&self) -> bool {
        if ALLOWED_CONTENT_TYPES.contains(&self.content_type.as_str()) {
            return true;
        }
        self.name
            .rsplit_once('.')
            .map(|(_, ext)| ALLOWED_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
            .unwrap_or(false)
    }
}

/// Files currently chosen in a form's file input.
#[derive(Debug, Default)]
pub struct FileSelection {
    files: Vec<SelectedFile>,
    total_size: u64,
}

impl FileSelection {
    /// Replace the selection. On the first offending file the whole
    /// selection is cleared and the reason returned.
    pub fn select(&mut self, files: Vec<SelectedFile>) -> Result<(), Advisory> {
        self.clear();

        let mut total_size = 0u64;
        for file in &files {
            if !file.is_allowed() {
                return Err(Advisory::FileTypeNotAllowed(file.name.clone()));
            }
            total_size += file.size();
            if total_size > MAX_SELECTION_SIZE {
                return Err(Advisory::TotalSizeExceeded);
            }
        }

        self.files = files;
        self.total_size = total_size;
        Ok(())
    }

    pub fn clear(&mut self) {
        self.files.clear();
        self.total_size = 0;
    }

    pub fn files(&self) -> &[SelectedFile] {
        &self.files
    }

    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Running count and size shown next to the file input.
    pub fn summary(&self) -> String {
        if self.files.is_empty() {
            return "No file selected".to_string();
        }
        let names: Vec<&str> = self.files.iter().map(|f| f.name.as_str()).collect();
        format!(
            "{} files selected ({:.2} MB): {}",
            self.files.len(),
            self.total_size as f64 / 1024.0 / 1024.0,
            names.join(", ")
        )
    }
}
