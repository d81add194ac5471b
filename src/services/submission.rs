//! The submission pipeline: validate, stage, compose, deliver, clean up.
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use crate::domain::sniff::sniff_path;
use crate::domain::{AttachmentPolicy, RawUpload, SafeName, TransportFault, ValidatedAttachment};
use crate::forms::submission::{ContactDetails, FormError, FormKind};
use crate::intake::{SubmissionRequest, UploadLedger};
use crate::mail::{self, MailTransport};
use crate::services::staging::{StagedAttachments, StagingArea};
use crate::services::{Anomaly, ServiceResult, SubmissionError};

/// Where a submission currently is. Every stage after `Receiving` may end in
/// failure, and `CleaningUp` runs on both outcomes.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Stage {
    Receiving,
    FieldValidating,
    FileValidating,
    Composing,
    Delivering,
    CleaningUp,
    Responded,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Stage bookkeeping for a single request.
struct Run {
    kind: FormKind,
    stage: Stage,
}

impl Run {
    fn new(kind: FormKind) -> Self {
        Self {
            kind,
            stage: Stage::Receiving,
        }
    }

    fn advance(&mut self, next: Stage) {
        log::debug!("{} submission: {} -> {}", self.kind.label(), self.stage, next);
        self.stage = next;
    }

    fn fail(&self, err: &SubmissionError) {
        if err.is_client_error() {
            log::info!(
                "{} submission rejected during {}: {err}",
                self.kind.label(),
                self.stage
            );
        } else {
            let cause = std::error::Error::source(err)
                .map(|s| s.to_string())
                .unwrap_or_default();
            log::error!(
                "{} submission failed during {}: {err}: {cause}",
                self.kind.label(),
                self.stage
            );
        }
    }
}

/// Relays validated submissions to a fixed recipient list.
#[derive(Clone)]
pub struct SubmissionService {
    policy: AttachmentPolicy,
    staging: StagingArea,
    recipients: Vec<String>,
    transport: Arc<dyn MailTransport>,
}

impl SubmissionService {
    pub fn new(
        policy: AttachmentPolicy,
        staging: StagingArea,
        recipients: Vec<String>,
        transport: Arc<dyn MailTransport>,
    ) -> Self {
        Self {
            policy,
            staging,
            recipients,
            transport,
        }
    }

    /// Run the whole pipeline for one request. Staged files are gone by the
    /// time this returns, whatever the outcome.
    pub fn process(&self, kind: FormKind, request: SubmissionRequest) -> ServiceResult<()> {
        let mut run = Run::new(kind);
        let mut staged = StagedAttachments::default();

        let outcome = self.relay(&mut run, &mut staged, request);
        if let Err(err) = &outcome {
            run.fail(err);
        }

        run.advance(Stage::CleaningUp);
        let failures = staged.cleanup();
        if !failures.is_empty() {
            for anomaly in &failures {
                anomaly.log();
            }
            if outcome.is_ok() {
                log::error!(
                    "Message sent but failed to delete {} staged file(s)",
                    failures.len()
                );
            }
        }

        run.advance(Stage::Responded);
        outcome
    }

    fn relay(
        &self,
        run: &mut Run,
        staged: &mut StagedAttachments,
        request: SubmissionRequest,
    ) -> ServiceResult<()> {
        let kind = run.kind;
        let SubmissionRequest {
            fields,
            uploads,
            ledger,
        } = request;

        run.advance(Stage::FieldValidating);
        let details = kind.extract(&fields).map_err(|e| match e {
            FormError::MissingField => SubmissionError::MissingField,
            FormError::InvalidEmail => SubmissionError::InvalidEmail,
        })?;

        run.advance(Stage::FileValidating);
        self.staging.ensure_ready()?;
        let attachments = self.accept_uploads(uploads, &ledger, staged)?;

        run.advance(Stage::Composing);
        let email = mail::compose(kind, &details, &attachments, &self.recipients)
            .map_err(SubmissionError::DeliveryFailed)?;

        run.advance(Stage::Delivering);
        self.deliver(&details, &email)
    }

    fn deliver(&self, details: &ContactDetails, email: &mail::ComposedEmail) -> ServiceResult<()> {
        self.transport
            .send(email)
            .map_err(SubmissionError::DeliveryFailed)?;
        log::info!(
            "Relayed submission from {} with {} attachment(s)",
            details.email,
            email.parts.len().saturating_sub(1)
        );
        Ok(())
    }

    /// Check uploads in submission order, staging the ones that pass.
    fn accept_uploads(
        &self,
        uploads: Vec<RawUpload>,
        ledger: &UploadLedger,
        staged: &mut StagedAttachments,
    ) -> ServiceResult<Vec<ValidatedAttachment>> {
        let mut attachments = Vec::new();
        let mut total_size = 0u64;

        for upload in uploads {
            if let Some(attachment) = self.accept_upload(upload, ledger, &mut total_size, staged)? {
                attachments.push(attachment);
            }
        }
        Ok(attachments)
    }

    fn accept_upload(
        &self,
        mut upload: RawUpload,
        ledger: &UploadLedger,
        total_size: &mut u64,
        staged: &mut StagedAttachments,
    ) -> ServiceResult<Option<ValidatedAttachment>> {
        if upload.fault == TransportFault::NoFile {
            return Ok(None);
        }
        if upload.fault == TransportFault::TotalExceeded {
            return Err(SubmissionError::SizeCapExceeded {
                limit: self.policy.max_total_size_label(),
            });
        }
        if let Some(message) = upload.fault.describe() {
            return Err(SubmissionError::UploadTransport(message));
        }

        let original_name = upload.original_name.clone();
        let name = SafeName::sanitize(&original_name);
        let extension = name.extension().unwrap_or_default();
        if !self.policy.allows_extension(&extension) {
            return Err(SubmissionError::DisallowedExtension {
                name: original_name,
                allowed: self.policy.allowed_list(),
            });
        }

        if !ledger.attests(&upload) {
            Anomaly::SuspectedSpoofedUpload {
                name: original_name,
            }
            .log();
            return Ok(None);
        }
        let Some(temp) = upload.temp.take() else {
            return Ok(None);
        };

        let sniffed = sniff_upload(temp.path(), &original_name)?;
        if !self.policy.type_matches(&sniffed, &extension) {
            return Err(SubmissionError::ContentTypeMismatch {
                name: original_name,
                sniffed,
            });
        }

        *total_size += upload.declared_size;
        if *total_size > self.policy.max_total_size {
            return Err(SubmissionError::SizeCapExceeded {
                limit: self.policy.max_total_size_label(),
            });
        }

        match self.staging.stage(temp, &name) {
            Ok(stored_path) => {
                staged.track(stored_path.clone());
                Ok(Some(ValidatedAttachment {
                    sanitized_name: name,
                    extension,
                    sniffed_mime_type: sniffed,
                    size_bytes: upload.declared_size,
                    stored_path,
                }))
            }
            Err(source) => {
                Anomaly::AttachmentMoveFailed {
                    name: original_name,
                    source,
                }
                .log();
                Ok(None)
            }
        }
    }
}

/// An unreadable spool file is our failure, not the submitter's.
fn sniff_upload(path: &Path, name: &str) -> ServiceResult<String> {
    sniff_path(path).map_err(|e| {
        log::error!("Could not inspect upload {name:?}: {e}");
        SubmissionError::Internal(format!("failed to inspect upload {name}"))
    })
}
