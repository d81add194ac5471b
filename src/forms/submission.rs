use std::collections::HashMap;

use tera::escape_html;
use thiserror::Error;
use validator::{Validate, ValidationErrors};

/// Text fields of a multipart submission, keyed by field name.
pub type FieldMap = HashMap<String, String>;

/// Which form a submission came from.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum FormKind {
    Contact,
    Quote,
}

#[derive(Debug, Error, Eq, PartialEq)]
pub enum FormError {
    #[error("a required field is empty")]
    MissingField,
    #[error("email address is malformed")]
    InvalidEmail,
}

/// Trimmed, validated contact details as submitted. Header values come from
/// here; the mail body uses [`ContactDetails::escaped`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ContactDetails {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    /// Subject for contact messages, requested service for quotes.
    pub topic: String,
    pub message: String,
}

#[derive(Debug, Validate)]
pub struct ContactForm {
    #[validate(length(min = 1))]
    pub name: String,
    #[validate(length(min = 1), email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub subject: String,
    #[validate(length(min = 1))]
    pub message: String,
    pub phone: String,
}

#[derive(Debug, Validate)]
pub struct QuoteForm {
    #[validate(length(min = 1))]
    pub service: String,
    #[validate(length(min = 1))]
    pub name: String,
    #[validate(length(min = 1), email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub phone: String,
    #[validate(length(min = 1))]
    pub message: String,
}

impl FormKind {
    pub fn label(&self) -> &'static str {
        match self {
            FormKind::Contact => "contact",
            FormKind::Quote => "quote",
        }
    }

    /// Base name of the file-array field (`contactFiles`, `quoteFiles`).
    pub fn files_field(&self) -> &'static str {
        match self {
            FormKind::Contact => "contactFiles",
            FormKind::Quote => "quoteFiles",
        }
    }

    /// Browsers send the array field either bare or with a `[]` suffix.
    pub fn is_files_field(&self, name: &str) -> bool {
        let base = self.files_field();
        name == base || name.strip_suffix("[]") == Some(base)
    }

    /// What the mail body calls the submission.
    pub fn submission_label(&self) -> &'static str {
        match self {
            FormKind::Contact => "message",
            FormKind::Quote => "quote request",
        }
    }

    pub fn topic_label(&self) -> &'static str {
        match self {
            FormKind::Contact => "Subject",
            FormKind::Quote => "Service",
        }
    }

    pub fn mail_subject(&self, topic: &str) -> String {
        match self {
            FormKind::Contact => format!("Contact Form: {topic}"),
            FormKind::Quote => format!("Quote Request: {topic}"),
        }
    }

    /// Trim and validate the fields this form requires.
    pub fn extract(&self, fields: &FieldMap) -> Result<ContactDetails, FormError> {
        let field = |name: &str| {
            fields
                .get(name)
                .map(|v| v.trim().to_string())
                .unwrap_or_default()
        };

        let details = match self {
            FormKind::Contact => {
                let form = ContactForm {
                    name: field("name"),
                    email: field("email"),
                    subject: field("subject"),
                    message: field("message"),
                    phone: field("phone"),
                };
                form.validate().map_err(classify)?;
                ContactDetails {
                    name: form.name,
                    email: form.email,
                    phone: Some(form.phone).filter(|p| !p.is_empty()),
                    topic: form.subject,
                    message: form.message,
                }
            }
            FormKind::Quote => {
                let form = QuoteForm {
                    service: field("service"),
                    name: field("name"),
                    email: field("email"),
                    phone: field("phone"),
                    message: field("message"),
                };
                form.validate().map_err(classify)?;
                ContactDetails {
                    name: form.name,
                    email: form.email,
                    phone: Some(form.phone),
                    topic: form.service,
                    message: form.message,
                }
            }
        };

        Ok(details)
    }
}

impl ContactDetails {
    /// Copy safe for inclusion in text and HTML contexts.
    pub fn escaped(&self) -> Self {
        Self {
            name: escape_html(&self.name),
            email: escape_html(&self.email),
            phone: self.phone.as_deref().map(escape_html),
            topic: escape_html(&self.topic),
            message: escape_html(&self.message),
        }
    }
}

/// Empty fields win over a malformed email.
fn classify(errors: ValidationErrors) -> FormError {
    let missing = errors
        .field_errors()
        .values()
        .flat_map(|errs| errs.iter())
        .any(|e| e.code == "length");

    if missing {
        FormError::MissingField
    } else {
        FormError::InvalidEmail
    }
}
