//! Strongly-typed domain structures for submitted files.
use std::fmt;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use thiserror::Error;
use uuid::Uuid;

pub mod sniff;

/// Extensions accepted by default, in the order they are reported to users.
pub const DEFAULT_EXTENSIONS: [&str; 9] = [
    "jpg", "jpeg", "png", "pdf", "doc", "docx", "xls", "xlsx", "txt",
];

/// Default cap on the cumulative size of one request's attachments (10 MiB).
pub const DEFAULT_MAX_TOTAL_SIZE: u64 = 10 * 1024 * 1024;

/// File name restricted to `[A-Za-z0-9._-]`, never empty.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct SafeName(String);

impl SafeName {
    /// Strip every character outside the allowed set. An empty result is
    /// replaced by a generated `file<token>` placeholder (which carries no
    /// extension and is therefore rejected by the extension check).
    pub fn sanitize(raw: &str) -> Self {
        let kept: String = raw
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
            .collect();

        Self::try_new(kept).unwrap_or_else(|_| Self(format!("file{}", Uuid::new_v4().simple())))
    }

    pub fn try_new(value: String) -> Result<Self, TypeConstraintError> {
        if value.is_empty()
            || !value
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        {
            return Err(TypeConstraintError::InvalidFileName);
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Lowercased text after the last dot, if any.
    pub fn extension(&self) -> Option<String> {
        self.0
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
    }
}

impl fmt::Display for SafeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// One entry of the content-type allow-list.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AllowedType {
    pub mime: String,
    pub extension: String,
}

impl AllowedType {
    pub fn new(mime: &str, extension: &str) -> Self {
        Self {
            mime: mime.to_string(),
            extension: extension.to_string(),
        }
    }
}

/// Rules every attachment of a request is checked against.
#[derive(Clone, Debug)]
pub struct AttachmentPolicy {
    /// Accepted extensions (lowercase).
    pub extensions: Vec<String>,
    /// Sniffed content type paired with an extension it may carry.
    pub types: Vec<AllowedType>,
    /// Cap on the running total of attachment bytes.
    pub max_total_size: u64,
}

impl Default for AttachmentPolicy {
    fn default() -> Self {
        Self {
            extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            types: vec![
                AllowedType::new("image/jpeg", "jpg"),
                AllowedType::new("image/jpeg", "jpeg"),
                AllowedType::new("image/png", "png"),
                AllowedType::new("application/pdf", "pdf"),
                AllowedType::new("application/msword", "doc"),
                AllowedType::new(
                    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
                    "docx",
                ),
                AllowedType::new("application/vnd.ms-excel", "xls"),
                AllowedType::new(
                    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
                    "xlsx",
                ),
                AllowedType::new("text/plain", "txt"),
            ],
            max_total_size: DEFAULT_MAX_TOTAL_SIZE,
        }
    }
}

impl AttachmentPolicy {
    pub fn with_max_total_size(mut self, max_total_size: u64) -> Self {
        self.max_total_size = max_total_size;
        self
    }

    pub fn allows_extension(&self, extension: &str) -> bool {
        self.extensions.iter().any(|e| e == extension)
    }

    /// Whether a file sniffed as `mime` may be named with `extension`.
    pub fn type_matches(&self, mime: &str, extension: &str) -> bool {
        self.types
            .iter()
            .any(|t| t.mime == mime && t.extension == extension)
    }

    pub fn allowed_list(&self) -> String {
        self.extensions.join(", ")
    }

    /// The cap in megabytes with two decimals, e.g. `10.00MB`.
    pub fn max_total_size_label(&self) -> String {
        format!("{:.2}MB", self.max_total_size as f64 / (1024.0 * 1024.0))
    }
}

/// Condition reported by the multipart reader for one file part.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TransportFault {
    None,
    NoFile,
    SizeExceeded,
    /// The part pushed the request past its total upload size.
    TotalExceeded,
    Partial,
    Other(u16),
}

impl TransportFault {
    /// User-facing description, `None` for conditions that are not errors.
    pub fn describe(&self) -> Option<String> {
        let detail = match self {
            TransportFault::None | TransportFault::NoFile => return None,
            TransportFault::SizeExceeded => "File is too large.".to_string(),
            TransportFault::TotalExceeded => "The upload is too large.".to_string(),
            TransportFault::Partial => "The uploaded file was only partially uploaded.".to_string(),
            TransportFault::Other(code) => format!("Error code: {code}"),
        };
        Some(format!("File upload error: {detail}"))
    }
}

/// A file part as received, spooled by the transport layer.
#[derive(Debug)]
pub struct RawUpload {
    pub original_name: String,
    /// Spool file; `None` when the part carried no usable content.
    pub temp: Option<NamedTempFile>,
    pub declared_size: u64,
    pub fault: TransportFault,
}

impl RawUpload {
    pub fn temp_path(&self) -> Option<&Path> {
        self.temp.as_ref().map(|t| t.path())
    }
}

/// An upload that passed every check and now lives in staging storage.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ValidatedAttachment {
    pub sanitized_name: SafeName,
    pub extension: String,
    pub sniffed_mime_type: String,
    pub size_bytes: u64,
    pub stored_path: PathBuf,
}

/// Directory holding staged attachments between intake and mail delivery.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StagingDir(PathBuf);

impl StagingDir {
    pub fn new(path: PathBuf) -> Self {
        Self(path)
    }

    pub fn as_path(&self) -> &Path {
        &self.0
    }

    /// Fresh collision-free path for a staged copy of `name`.
    pub fn unique_path(&self, name: &SafeName) -> PathBuf {
        self.0
            .join(format!("file_{}_{}", Uuid::new_v4().simple(), name.as_str()))
    }
}

impl From<PathBuf> for StagingDir {
    fn from(value: PathBuf) -> Self {
        Self::new(value)
    }
}

#[derive(Debug, Error)]
pub enum TypeConstraintError {
    #[error("invalid file name")]
    InvalidFileName,
}
