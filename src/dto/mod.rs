use serde::Serialize;

use crate::domain::ValidatedAttachment;
use crate::forms::submission::{ContactDetails, FormKind};

/// Serializable values for the mail body template, HTML-escaped.
#[derive(Clone, Debug, Serialize)]
pub struct MessageContext {
    pub kind_label: &'static str,
    pub form_label: &'static str,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub topic_label: &'static str,
    pub topic: String,
    pub message: String,
    pub attachments: Vec<String>,
}

impl MessageContext {
    pub fn new(
        kind: FormKind,
        details: &ContactDetails,
        attachments: &[ValidatedAttachment],
    ) -> Self {
        let details = details.escaped();
        Self {
            kind_label: kind.submission_label(),
            form_label: kind.label(),
            name: details.name,
            email: details.email,
            phone: details
                .phone
                .unwrap_or_else(|| "Not provided".to_string()),
            topic_label: kind.topic_label(),
            topic: details.topic,
            message: details.message,
            attachments: attachments
                .iter()
                .map(|a| a.sanitized_name.to_string())
                .collect(),
        }
    }
}
