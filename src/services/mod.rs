//! Application services orchestrating domain logic and side effects.
use std::path::PathBuf;

use crate::mail::MailError;

pub mod staging;
pub mod submission;

/// Convenience alias for service results.
pub type ServiceResult<T> = Result<T, SubmissionError>;

/// Failures that end a submission. The `Display` text is for operators;
/// callers get [`SubmissionError::user_message`].
#[derive(Debug, thiserror::Error)]
pub enum SubmissionError {
    #[error("a required field is empty")]
    MissingField,
    #[error("email address is malformed")]
    InvalidEmail,
    #[error("staging directory unavailable")]
    StagingUnavailable(#[source] StagingFault),
    #[error("upload transport error: {0}")]
    UploadTransport(String),
    #[error("extension not allowed for {name}")]
    DisallowedExtension { name: String, allowed: String },
    #[error("content of {name} sniffed as {sniffed}")]
    ContentTypeMismatch { name: String, sniffed: String },
    #[error("attachments exceed the {limit} cap")]
    SizeCapExceeded { limit: String },
    #[error("mail delivery failed")]
    DeliveryFailed(#[source] MailError),
    #[error("request processing aborted: {0}")]
    Internal(String),
}

#[derive(Debug, thiserror::Error)]
pub enum StagingFault {
    #[error("failed to create staging directory")]
    Create(#[source] std::io::Error),
    #[error("staging directory is not writable")]
    NotWritable(#[source] std::io::Error),
}

impl SubmissionError {
    /// Text returned to the browser. Never carries paths or io details.
    pub fn user_message(&self) -> String {
        match self {
            SubmissionError::MissingField => "Please fill in all required fields.".to_string(),
            SubmissionError::InvalidEmail => "Please enter a valid email address.".to_string(),
            SubmissionError::StagingUnavailable(StagingFault::Create(_))
            | SubmissionError::Internal(_) => "Server error. Please try again later.".to_string(),
            SubmissionError::StagingUnavailable(StagingFault::NotWritable(_)) => {
                "Server configuration error. Please contact support.".to_string()
            }
            SubmissionError::UploadTransport(message) => message.clone(),
            SubmissionError::DisallowedExtension { name, allowed } => {
                format!("File type not allowed: {name}. Allowed types: {allowed}")
            }
            SubmissionError::ContentTypeMismatch { name, .. } => {
                format!("Invalid file type or content: {name}")
            }
            SubmissionError::SizeCapExceeded { limit } => {
                format!("Total file size exceeds the {limit} limit.")
            }
            SubmissionError::DeliveryFailed(_) => {
                "An error occurred while sending the message. Please try again later.".to_string()
            }
        }
    }

    /// Validation failures are the caller's fault; everything else is ours.
    pub fn is_client_error(&self) -> bool {
        !matches!(
            self,
            SubmissionError::StagingUnavailable(_)
                | SubmissionError::DeliveryFailed(_)
                | SubmissionError::Internal(_)
        )
    }
}

/// Conditions recovered from locally: logged, never reported to the caller.
#[derive(Debug, thiserror::Error)]
pub enum Anomaly {
    #[error("possible file upload attack: {name}")]
    SuspectedSpoofedUpload { name: String },
    #[error("failed to move uploaded file: {name}")]
    AttachmentMoveFailed {
        name: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to delete uploaded file: {path:?}")]
    CleanupFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Anomaly {
    pub fn log(&self) {
        match self {
            Anomaly::SuspectedSpoofedUpload { .. } => log::warn!("{self}"),
            Anomaly::AttachmentMoveFailed { source, .. }
            | Anomaly::CleanupFailed { source, .. } => log::error!("{self}: {source}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_side_messages_hide_details() {
        let err = SubmissionError::StagingUnavailable(StagingFault::Create(
            std::io::Error::other("/srv/www/uploads: permission denied"),
        ));
        assert!(!err.is_client_error());
        assert_eq!(err.user_message(), "Server error. Please try again later.");
    }

    #[test]
    fn validation_messages_name_the_problem() {
        let err = SubmissionError::SizeCapExceeded {
            limit: "10.00MB".to_string(),
        };
        assert!(err.is_client_error());
        assert_eq!(
            err.user_message(),
            "Total file size exceeds the 10.00MB limit."
        );
    }
}
