#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use form_relay::domain::{AttachmentPolicy, StagingDir};
use form_relay::intake::IntakeLimits;
use form_relay::mail::{ComposedEmail, MailError, MailTransport};
use form_relay::routes::AppState;
use form_relay::services::staging::StagingArea;
use form_relay::services::submission::SubmissionService;
use tempfile::{TempDir, tempdir};

pub const PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a, 0, 0, 0, 0x0d];

/// Mail transport that keeps what it was asked to send.
#[derive(Default)]
pub struct Recorder {
    pub sent: Mutex<Vec<ComposedEmail>>,
    pub fail: bool,
}

impl MailTransport for Recorder {
    fn send(&self, email: &ComposedEmail) -> Result<(), MailError> {
        if self.fail {
            return Err(MailError::Write(std::io::Error::other("relay refused")));
        }
        self.sent.lock().unwrap().push(email.clone());
        Ok(())
    }
}

pub struct Fixture {
    pub dir: TempDir,
    pub recorder: Arc<Recorder>,
}

impl Fixture {
    pub fn new(fail: bool) -> Self {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("spool")).unwrap();
        Self {
            dir,
            recorder: Arc::new(Recorder {
                fail,
                ..Default::default()
            }),
        }
    }

    pub fn state(&self, policy: AttachmentPolicy) -> AppState {
        let policy_cap = policy.max_total_size;
        AppState {
            service: SubmissionService::new(
                policy,
                StagingArea::new(StagingDir::from(self.staging_dir())),
                vec!["contact@example.com".to_string()],
                self.recorder.clone(),
            ),
            limits: IntakeLimits {
                spool_dir: self.spool_dir(),
                max_file_size: 10 * 1024 * 1024,
                max_total_size: policy_cap,
                max_field_size: 64 * 1024,
            },
        }
    }

    pub fn staging_dir(&self) -> PathBuf {
        self.dir.path().join("staging")
    }

    pub fn spool_dir(&self) -> PathBuf {
        self.dir.path().join("spool")
    }

    pub fn sent(&self) -> Vec<ComposedEmail> {
        self.recorder.sent.lock().unwrap().clone()
    }
}

pub fn file_count(dir: &Path) -> usize {
    fs::read_dir(dir).map(|entries| entries.count()).unwrap_or(0)
}

pub fn bytes_on_disk(dir: &Path) -> u64 {
    fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok()?.metadata().ok())
                .map(|m| m.len())
                .sum()
        })
        .unwrap_or(0)
}

/// Hand-built `multipart/form-data` body.
pub struct MultipartBody {
    boundary: String,
    buf: Vec<u8>,
}

impl MultipartBody {
    pub fn new() -> Self {
        Self {
            boundary: "----relaytestboundary7MA4YWxkTrZu0gW".to_string(),
            buf: Vec::new(),
        }
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.buf.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n",
                self.boundary
            )
            .as_bytes(),
        );
        self
    }

    pub fn file(mut self, field: &str, file_name: &str, content: &[u8]) -> Self {
        self.buf.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
                self.boundary
            )
            .as_bytes(),
        );
        self.buf.extend_from_slice(content);
        self.buf.extend_from_slice(b"\r\n");
        self
    }

    pub fn contact_fields(self, email: &str) -> Self {
        self.text("name", "Jane Doe")
            .text("email", email)
            .text("subject", "Quote")
            .text("message", "Hello")
    }

    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    /// Body cut off without the closing boundary.
    pub fn unfinished(self) -> (String, Vec<u8>) {
        (self.content_type(), self.buf)
    }

    pub fn finish(mut self) -> (String, Vec<u8>) {
        self.buf
            .extend_from_slice(format!("--{}--\r\n", self.boundary).as_bytes());
        (self.content_type(), self.buf)
    }
}
