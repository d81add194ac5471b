//! Configuration model loaded from external sources.

use std::path::PathBuf;

use serde::Deserialize;

use crate::domain::{AttachmentPolicy, DEFAULT_MAX_TOTAL_SIZE, StagingDir};

#[derive(Clone, Debug, Deserialize)]
/// Settings shared across handlers.
pub struct ServerConfig {
    pub address: String,
    pub port: u16,
    /// Directory staged attachments are moved into before mailing.
    pub staging_dir: String,
    /// Directory the multipart reader spools uploads into.
    #[serde(default)]
    pub transport_dir: Option<String>,
    #[serde(default = "default_max_total_size")]
    pub max_total_size: u64,
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
    #[serde(default = "default_max_field_size")]
    pub max_field_size: usize,
    pub recipients: Vec<String>,
    #[serde(default)]
    pub allowed_origins: Vec<String>,
    pub mail: MailConfig,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MailTransportKind {
    Sendmail,
    Pickup,
}

#[derive(Clone, Debug, Deserialize)]
pub struct MailConfig {
    pub transport: MailTransportKind,
    #[serde(default = "default_sendmail_path")]
    pub sendmail_path: String,
    #[serde(default)]
    pub pickup_dir: Option<String>,
}

fn default_max_total_size() -> u64 {
    DEFAULT_MAX_TOTAL_SIZE
}

fn default_max_file_size() -> u64 {
    DEFAULT_MAX_TOTAL_SIZE
}

fn default_max_field_size() -> usize {
    64 * 1024
}

fn default_sendmail_path() -> String {
    "/usr/sbin/sendmail".to_string()
}

impl ServerConfig {
    pub fn staging_dir(&self) -> StagingDir {
        StagingDir::from(PathBuf::from(&self.staging_dir))
    }

    pub fn transport_dir(&self) -> PathBuf {
        self.transport_dir
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(std::env::temp_dir)
    }

    /// Fixed allow-lists with the configured size cap.
    pub fn attachment_policy(&self) -> AttachmentPolicy {
        AttachmentPolicy::default().with_max_total_size(self.max_total_size)
    }
}

#[cfg(test)]
mod tests {
    use config::{Config, File, FileFormat};

    use super::*;

    #[test]
    fn deserializes_with_defaults() {
        let yaml = r#"
address: 127.0.0.1
port: 8080
staging_dir: ./uploads
recipients:
  - contact@example.com
mail:
  transport: pickup
  pickup_dir: ./outbox
"#;
        let config: ServerConfig = Config::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.max_total_size, 10 * 1024 * 1024);
        assert_eq!(config.max_field_size, 64 * 1024);
        assert!(config.allowed_origins.is_empty());
        assert!(matches!(config.mail.transport, MailTransportKind::Pickup));
        assert_eq!(config.mail.sendmail_path, "/usr/sbin/sendmail");
        assert_eq!(config.transport_dir(), std::env::temp_dir());
        assert_eq!(config.attachment_policy().max_total_size_label(), "10.00MB");
    }
}
