//! Composition of the relayed email and the transports that deliver it.
use std::fs;
use std::path::PathBuf;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use lazy_static::lazy_static;
use tera::{Context, Tera};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::ValidatedAttachment;
use crate::dto::MessageContext;
use crate::forms::submission::{ContactDetails, FormKind};

pub mod pickup;
pub mod sendmail;

pub use pickup::PickupDirTransport;
pub use sendmail::SendmailTransport;

const BODY_TEMPLATE: &str = "submission.txt";
const BASE64_LINE_LEN: usize = 76;
const MAILER: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

lazy_static! {
    static ref TEMPLATES: Tera = {
        let mut tera = Tera::default();
        if let Err(e) = tera.add_raw_template(
            BODY_TEMPLATE,
            include_str!("../../templates/email/submission.txt"),
        ) {
            println!("Parsing error(s): {}", e);
            ::std::process::exit(1);
        }
        tera
    };
}

#[derive(Debug, Error)]
pub enum MailError {
    #[error("failed to render mail body")]
    Template(#[from] tera::Error),
    #[error("failed to read attachment {path:?}")]
    Attachment {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not spawn sendmail process")]
    Spawn(#[source] std::io::Error),
    #[error("couldn't write message to transport")]
    Write(#[source] std::io::Error),
    #[error("sendmail exited with {0}")]
    Exit(std::process::ExitStatus),
}

/// Delivers one composed email. Implementations decide how (pipe, spool, queue).
pub trait MailTransport: Send + Sync {
    fn send(&self, email: &ComposedEmail) -> Result<(), MailError>;
}

/// One section of a multipart body.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MimePart {
    pub headers: Vec<(String, String)>,
    pub content: String,
}

#[derive(Clone, Debug)]
pub struct ComposedEmail {
    pub recipients: Vec<String>,
    pub subject: String,
    pub body_text: String,
    pub boundary: String,
    pub headers: Vec<(String, String)>,
    pub parts: Vec<MimePart>,
}

impl ComposedEmail {
    /// Message headers (without To and Subject), CRLF separated.
    pub fn header_block(&self) -> String {
        self.headers
            .iter()
            .map(|(name, value)| format!("{name}: {value}\r\n"))
            .collect()
    }

    /// The multipart body, closed by the final boundary marker.
    pub fn mime_body(&self) -> String {
        let mut body = String::new();
        for part in &self.parts {
            body.push_str(&format!("--{}\r\n", self.boundary));
            for (name, value) in &part.headers {
                body.push_str(&format!("{name}: {value}\r\n"));
            }
            body.push_str("\r\n");
            body.push_str(&part.content);
            body.push_str("\r\n");
        }
        body.push_str(&format!("--{}--", self.boundary));
        body
    }

    /// Full RFC 5322 message as handed to a transport.
    pub fn to_message(&self) -> String {
        format!(
            "To: {}\r\nSubject: {}\r\n{}\r\n{}",
            self.recipients.join(", "),
            encode_word(&header_value(&self.subject)),
            self.header_block(),
            self.mime_body()
        )
    }
}

/// Build the relayed email: a plain-text section followed by one base64
/// section per attachment.
pub fn compose(
    kind: FormKind,
    details: &ContactDetails,
    attachments: &[ValidatedAttachment],
    recipients: &[String],
) -> Result<ComposedEmail, MailError> {
    let context = MessageContext::new(kind, details, attachments);
    let body_text = TEMPLATES
        .render(BODY_TEMPLATE, &Context::from_serialize(&context)?)?
        .trim_end()
        .to_string();

    let boundary = format!("=_Part_{}", Uuid::new_v4().simple());

    let mut parts = vec![MimePart {
        headers: vec![
            (
                "Content-Type".to_string(),
                "text/plain; charset=UTF-8".to_string(),
            ),
            ("Content-Transfer-Encoding".to_string(), "8bit".to_string()),
        ],
        content: body_text.clone(),
    }];

    for attachment in attachments {
        let content = fs::read(&attachment.stored_path).map_err(|source| {
            MailError::Attachment {
                path: attachment.stored_path.clone(),
                source,
            }
        })?;
        let file_name = attachment.sanitized_name.as_str();
        parts.push(MimePart {
            headers: vec![
                (
                    "Content-Type".to_string(),
                    format!("application/octet-stream; name=\"{file_name}\""),
                ),
                ("Content-Transfer-Encoding".to_string(), "base64".to_string()),
                (
                    "Content-Disposition".to_string(),
                    format!("attachment; filename=\"{file_name}\""),
                ),
            ],
            content: encode_base64_wrapped(&content),
        });
    }

    let name = encode_word(&header_value(&details.name));
    let email = header_value(&details.email);
    let headers = vec![
        ("From".to_string(), format!("{name} <{email}>")),
        ("Reply-To".to_string(), email.clone()),
        ("X-Mailer".to_string(), MAILER.to_string()),
        ("MIME-Version".to_string(), "1.0".to_string()),
        (
            "Content-Type".to_string(),
            format!("multipart/mixed; boundary=\"{boundary}\""),
        ),
    ];

    Ok(ComposedEmail {
        recipients: recipients.to_vec(),
        subject: kind.mail_subject(&details.topic),
        body_text,
        boundary,
        headers,
        parts,
    })
}

/// Base64 with a CRLF after every 76 characters, including the last line.
fn encode_base64_wrapped(raw: &[u8]) -> String {
    let encoded = STANDARD.encode(raw);
    let mut wrapped = String::with_capacity(encoded.len() + encoded.len() / 38 + 2);
    for line in encoded.as_bytes().chunks(BASE64_LINE_LEN) {
        wrapped.push_str(&String::from_utf8_lossy(line));
        wrapped.push_str("\r\n");
    }
    wrapped
}

/// Header values never carry line breaks.
fn header_value(value: &str) -> String {
    value
        .chars()
        .map(|c| if c == '\r' || c == '\n' { ' ' } else { c })
        .collect()
}

/// RFC 2047 B-encoding for non-ASCII header text.
fn encode_word(value: &str) -> String {
    if value.is_ascii() {
        value.to_string()
    } else {
        format!("=?utf-8?B?{}?=", STANDARD.encode(value))
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use tempfile::tempdir;

    use super::*;
    use crate::domain::SafeName;
    use crate::forms::submission::FieldMap;

    fn details() -> ContactDetails {
        ContactDetails {
            name: "Jane Doe".to_string(),
            email: "jane@example.com".to_string(),
            phone: None,
            topic: "Quote".to_string(),
            message: "Hello".to_string(),
        }
    }

    fn attachment(dir: &Path, name: &str, content: &[u8]) -> ValidatedAttachment {
        let stored_path = dir.join(format!("file_token_{name}"));
        fs::write(&stored_path, content).unwrap();
        ValidatedAttachment {
            sanitized_name: SafeName::try_new(name.to_string()).unwrap(),
            extension: "txt".to_string(),
            sniffed_mime_type: "text/plain".to_string(),
            size_bytes: content.len() as u64,
            stored_path,
        }
    }

    /// Pull the base64 payload of the section announcing `file_name`.
    fn decode_section(email: &ComposedEmail, file_name: &str) -> Vec<u8> {
        let body = email.mime_body();
        let marker = format!("filename=\"{file_name}\"\r\n\r\n");
        let start = body.find(&marker).unwrap() + marker.len();
        let end = start + body[start..].find("--").unwrap();
        let payload: String = body[start..end]
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();
        STANDARD.decode(payload).unwrap()
    }

    #[test]
    fn body_lists_contact_details() {
        let email = compose(
            FormKind::Contact,
            &details(),
            &[],
            &["contact@example.com".to_string()],
        )
        .unwrap();

        assert!(
            email
                .body_text
                .starts_with("You have received a new message from the contact form.")
        );
        assert!(email.body_text.contains("Name: Jane Doe\n"));
        assert!(email.body_text.contains("Phone: Not provided\n"));
        assert!(email.body_text.contains("Subject: Quote\n"));
        assert!(email.body_text.ends_with("Attached Files: No files attached"));
        assert_eq!(email.subject, "Contact Form: Quote");
        assert_eq!(email.parts.len(), 1);
    }

    #[test]
    fn headers_carry_sender_and_boundary() {
        let email = compose(FormKind::Contact, &details(), &[], &[]).unwrap();
        let headers = email.header_block();

        assert!(headers.contains("From: Jane Doe <jane@example.com>\r\n"));
        assert!(headers.contains("Reply-To: jane@example.com\r\n"));
        assert!(headers.contains("MIME-Version: 1.0\r\n"));
        assert!(headers.contains(&format!(
            "Content-Type: multipart/mixed; boundary=\"{}\"\r\n",
            email.boundary
        )));
        assert!(email.mime_body().ends_with(&format!("--{}--", email.boundary)));
    }

    #[test]
    fn attachments_round_trip_through_base64() {
        let dir = tempdir().unwrap();
        let binary: Vec<u8> = (0..=255u8).cycle().take(1000).collect();
        let attachments = vec![
            attachment(dir.path(), "notes.txt", b"first file\n"),
            attachment(dir.path(), "data.pdf", &binary),
        ];

        let email = compose(FormKind::Contact, &details(), &attachments, &[]).unwrap();

        assert_eq!(email.parts.len(), 3);
        assert_eq!(decode_section(&email, "notes.txt"), b"first file\n");
        assert_eq!(decode_section(&email, "data.pdf"), binary);
        assert!(
            email
                .body_text
                .ends_with("Attached Files: \n- notes.txt\n- data.pdf")
        );
    }

    #[test]
    fn base64_lines_are_wrapped() {
        let wrapped = encode_base64_wrapped(&[7u8; 200]);
        let lines: Vec<&str> = wrapped.split("\r\n").collect();

        assert!(lines.iter().all(|l| l.len() <= BASE64_LINE_LEN));
        assert_eq!(lines[0].len(), BASE64_LINE_LEN);
        assert_eq!(lines.last(), Some(&""));
    }

    #[test]
    fn header_injection_is_neutralised() {
        let mut details = details();
        details.name = "Eve\r\nBcc: victim@example.com".to_string();
        let email = compose(FormKind::Contact, &details, &[], &[]).unwrap();

        assert!(!email.header_block().contains("\r\nBcc:"));
    }

    #[test]
    fn headers_use_the_address_as_submitted() {
        let mut fields = FieldMap::from([
            ("name".to_string(), "Sean O'Brien".to_string()),
            ("email".to_string(), "sean.o'brien@example.com".to_string()),
            ("subject".to_string(), "Fish & chips".to_string()),
            ("message".to_string(), "Hello".to_string()),
        ]);
        fields.insert("phone".to_string(), String::new());
        let details = FormKind::Contact.extract(&fields).unwrap();

        let email = compose(FormKind::Contact, &details, &[], &[]).unwrap();
        let headers = email.header_block();

        assert!(headers.contains("From: Sean O'Brien <sean.o'brien@example.com>\r\n"));
        assert!(headers.contains("Reply-To: sean.o'brien@example.com\r\n"));
        assert_eq!(email.subject, "Contact Form: Fish & chips");
        assert!(email.body_text.contains("Email: sean.o&#x27;brien@example.com\n"));
    }

    #[test]
    fn non_ascii_values_are_encoded() {
        let mut details = details();
        details.name = "Zoë".to_string();
        details.topic = "Café".to_string();
        let email = compose(FormKind::Contact, &details, &[], &[]).unwrap();

        assert!(email.header_block().starts_with("From: =?utf-8?B?"));
        assert!(email.to_message().contains("Subject: =?utf-8?B?"));
    }

    #[test]
    fn missing_attachment_file_fails_composition() {
        let dir = tempdir().unwrap();
        let mut gone = attachment(dir.path(), "gone.txt", b"x");
        gone.stored_path = dir.path().join("does-not-exist");

        let err = compose(FormKind::Contact, &details(), &[gone], &[]).unwrap_err();
        assert!(matches!(err, MailError::Attachment { .. }));
    }
}
