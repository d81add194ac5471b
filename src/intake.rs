//! Multipart intake: turns the request stream into a [`SubmissionRequest`].
use std::collections::HashSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use actix_multipart::{Field, Multipart, MultipartError};
use futures_util::StreamExt;

use crate::domain::{RawUpload, TransportFault};
use crate::forms::submission::{FieldMap, FormKind};
use crate::services::SubmissionError;

/// Codes reported through [`TransportFault::Other`].
const FAULT_NO_SPOOL_DIR: u16 = 6;
const FAULT_CANT_WRITE: u16 = 7;
const FAULT_STREAM: u16 = 8;

/// Limits and locations used while reading a submission.
#[derive(Clone, Debug)]
pub struct IntakeLimits {
    pub spool_dir: PathBuf,
    pub max_file_size: u64,
    /// Bytes spooled per request across all file parts.
    pub max_total_size: u64,
    pub max_field_size: usize,
}

/// Everything one POST carried.
#[derive(Debug, Default)]
pub struct SubmissionRequest {
    pub fields: FieldMap,
    pub uploads: Vec<RawUpload>,
    pub ledger: UploadLedger,
}

/// Spool files created while reading the current request.
#[derive(Debug, Default)]
pub struct UploadLedger {
    spooled: HashSet<PathBuf>,
}

impl UploadLedger {
    pub fn record(&mut self, path: &Path) {
        self.spooled.insert(path.to_path_buf());
    }

    /// True only for a regular file this request's intake produced.
    pub fn attests(&self, upload: &RawUpload) -> bool {
        upload.temp_path().is_some_and(|path| {
            self.spooled.contains(path)
                && fs::symlink_metadata(path)
                    .map(|m| m.file_type().is_file())
                    .unwrap_or(false)
        })
    }
}

fn malformed() -> SubmissionError {
    SubmissionError::UploadTransport("File upload error: Invalid form submission.".to_string())
}

/// Read every part of `payload`. Text parts become fields, file parts of the
/// form's file field are spooled to disk, other file parts are discarded.
///
/// Spooling stops at the first file that pushes the request past
/// `max_total_size`; later file parts are drained unread. A part broken
/// mid-stream fails the whole request, since nothing after it can be read.
pub async fn read_submission(
    mut payload: Multipart,
    kind: FormKind,
    limits: &IntakeLimits,
) -> Result<SubmissionRequest, SubmissionError> {
    let mut request = SubmissionRequest::default();
    let mut spooled = 0u64;
    let mut spooling = true;

    while let Some(item) = payload.next().await {
        let mut field = item.map_err(|e| {
            log::warn!("Rejected multipart stream: {e}");
            malformed()
        })?;

        let name = field.name().unwrap_or_default().to_string();
        let file_name = field
            .content_disposition()
            .and_then(|cd| cd.get_filename())
            .map(str::to_string);

        match file_name {
            Some(file_name) if spooling && kind.is_files_field(&name) => {
                let budget = limits.max_total_size.saturating_sub(spooled);
                let upload =
                    spool_file(&mut field, file_name, limits, budget, &mut request.ledger).await;
                match upload.fault {
                    TransportFault::Partial | TransportFault::Other(FAULT_STREAM) => {
                        return Err(SubmissionError::UploadTransport(
                            upload.fault.describe().unwrap_or_default(),
                        ));
                    }
                    TransportFault::TotalExceeded => {
                        log::info!("Upload total passed {} bytes", limits.max_total_size);
                        spooling = false;
                    }
                    TransportFault::None => spooled += upload.declared_size,
                    _ => {}
                }
                request.uploads.push(upload);
            }
            Some(file_name) => {
                log::debug!("Discarding file {file_name:?} sent in field {name:?}");
                drain(&mut field).await?;
            }
            None => {
                let value = read_text(&mut field, limits.max_field_size).await?;
                request.fields.insert(name, value);
            }
        }
    }

    log::debug!(
        "Read {} field(s) and {} upload(s)",
        request.fields.len(),
        request.uploads.len()
    );
    Ok(request)
}

async fn drain(field: &mut Field) -> Result<(), SubmissionError> {
    while let Some(chunk) = field.next().await {
        chunk.map_err(|_| malformed())?;
    }
    Ok(())
}

async fn read_text(field: &mut Field, limit: usize) -> Result<String, SubmissionError> {
    let mut buf = Vec::new();
    while let Some(chunk) = field.next().await {
        let chunk = chunk.map_err(|e| {
            log::warn!("Failed to read form field: {e}");
            malformed()
        })?;
        if buf.len() + chunk.len() > limit {
            return Err(SubmissionError::UploadTransport(
                "File upload error: A form field is too large.".to_string(),
            ));
        }
        buf.extend_from_slice(&chunk);
    }
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

async fn spool_file(
    field: &mut Field,
    original_name: String,
    limits: &IntakeLimits,
    budget: u64,
    ledger: &mut UploadLedger,
) -> RawUpload {
    let mut temp = match tempfile::Builder::new()
        .prefix("upload-")
        .tempfile_in(&limits.spool_dir)
    {
        Ok(temp) => Some(temp),
        Err(e) => {
            log::error!("Cannot create spool file in {:?}: {e}", limits.spool_dir);
            None
        }
    };
    let mut fault = if temp.is_some() {
        TransportFault::None
    } else {
        TransportFault::Other(FAULT_NO_SPOOL_DIR)
    };
    let mut size = 0u64;

    while let Some(chunk) = field.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(e) => {
                log::warn!("Upload of {original_name:?} interrupted: {e}");
                fault = stream_fault(&e);
                break;
            }
        };
        // Keep draining after a fault so the following parts stay readable.
        if fault != TransportFault::None {
            continue;
        }
        size += chunk.len() as u64;
        if size > limits.max_file_size {
            fault = TransportFault::SizeExceeded;
            continue;
        }
        if size > budget {
            fault = TransportFault::TotalExceeded;
            continue;
        }
        if let Some(file) = temp.as_mut() {
            if let Err(e) = file.write_all(&chunk) {
                log::error!("Cannot write spool file for {original_name:?}: {e}");
                fault = TransportFault::Other(FAULT_CANT_WRITE);
            }
        }
    }

    if fault == TransportFault::None && original_name.is_empty() && size == 0 {
        fault = TransportFault::NoFile;
    }
    if fault != TransportFault::None {
        temp = None;
    }
    if let Some(file) = temp.as_ref() {
        ledger.record(file.path());
    }

    RawUpload {
        original_name,
        temp,
        declared_size: size,
        fault,
    }
}

fn stream_fault(err: &MultipartError) -> TransportFault {
    match err {
        MultipartError::Incomplete | MultipartError::Payload(_) => TransportFault::Partial,
        _ => TransportFault::Other(FAULT_STREAM),
    }
}
