//! Browser-side submission agent, usable from Rust programs and the
//! `form-submit` binary. Its checks are advisory; the server repeats them.
use thiserror::Error;

pub mod agent;
pub mod profile;
pub mod selection;

pub use agent::{FormData, SubmissionAgent, SubmitOutcome, interpret_response};
pub use profile::{ClientProfile, validate_fields};
pub use selection::{FileSelection, SelectedFile};

/// Problems caught before anything is sent.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum Advisory {
    #[error("Please fill in all required fields (marked with *).")]
    MissingFields,
    #[error("Please enter a valid email address.")]
    InvalidEmail,
    #[error("File type not allowed: {0}. Allowed types: JPG, PNG, PDF, DOC, DOCX, XLS, XLSX, TXT")]
    FileTypeNotAllowed(String),
    #[error("Total file size exceeds 10MB. Please select fewer files or reduce their size.")]
    TotalSizeExceeded,
}

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("{0}")]
    Advisory(#[from] Advisory),
    #[error("a submission is already in progress")]
    Busy,
    #[error("{0}")]
    Network(#[from] reqwest::Error),
    #[error("invalid attachment content type: {0}")]
    ContentType(String),
}
