use lazy_static::lazy_static;
use regex::Regex;

use super::Advisory;
use super::agent::FormData;

lazy_static! {
    static ref EMAIL_PATTERN: Regex = Regex::new(
        r"^[a-zA-Z0-9._%+\-]+@[a-zA-Z0-9.\-]+\.[a-zA-Z]{2,}$"
    )
    .unwrap_or_else(|e| panic!("invalid email pattern: {e}"));
}

/// How one form variant talks to the relay.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ClientProfile {
    /// Path appended to the relay base URL.
    pub endpoint: &'static str,
    pub required_fields: &'static [&'static str],
    pub files_field: &'static str,
    pub success_notice: &'static str,
    pub error_prefix: &'static str,
}

impl ClientProfile {
    pub const CONTACT: ClientProfile = ClientProfile {
        endpoint: "contact",
        required_fields: &["name", "email", "subject", "message"],
        files_field: "contactFiles[]",
        success_notice: "Your message has been sent successfully! We will contact you soon.",
        error_prefix: "Error sending message: ",
    };

    pub const QUOTE: ClientProfile = ClientProfile {
        endpoint: "quote",
        required_fields: &["service", "name", "email", "phone", "message"],
        files_field: "quoteFiles[]",
        success_notice: "Your quote request has been sent successfully! We will contact you soon.",
        error_prefix: "Error sending request: ",
    };
}

/// Required fields present and email shaped like an address.
pub fn validate_fields(profile: &ClientProfile, form: &FormData) -> Result<(), Advisory> {
    let missing = profile
        .required_fields
        .iter()
        .any(|field| form.get(field).is_none_or(str::is_empty));
    if missing {
        return Err(Advisory::MissingFields);
    }

    if !EMAIL_PATTERN.is_match(form.get("email").unwrap_or_default()) {
        return Err(Advisory::InvalidEmail);
    }
    Ok(())
}
