use std::sync::atomic::{AtomicBool, Ordering};

use reqwest::multipart::{Form, Part};

use super::profile::{ClientProfile, validate_fields};
use super::selection::FileSelection;
use super::AgentError;

/// Text fields of a form, in entry order.
#[derive(Clone, Debug, Default)]
pub struct FormData {
    fields: Vec<(String, String)>,
}

impl FormData {
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some((_, existing)) => *existing = value,
            None => self.fields.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn clear(&mut self) {
        self.fields.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }
}

/// What the relay said about a submission.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SubmitOutcome {
    Sent { notice: &'static str },
    Rejected { message: String },
}

impl SubmitOutcome {
    /// Text to show the user.
    pub fn notification(&self, profile: &ClientProfile) -> String {
        match self {
            SubmitOutcome::Sent { notice } => notice.to_string(),
            SubmitOutcome::Rejected { message } => format!("{}{message}", profile.error_prefix),
        }
    }
}

/// Only the exact body `success` means the message went out.
pub fn interpret_response(profile: &ClientProfile, body: &str) -> SubmitOutcome {
    if body == crate::routes::SUCCESS_BODY {
        SubmitOutcome::Sent {
            notice: profile.success_notice,
        }
    } else if body.is_empty() {
        SubmitOutcome::Rejected {
            message: "Unknown error".to_string(),
        }
    } else {
        SubmitOutcome::Rejected {
            message: body.to_string(),
        }
    }
}

/// Marks a submission in flight; released on drop.
struct BusyGuard<'a>(&'a AtomicBool);

impl<'a> BusyGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Sends one form's submissions to the relay, one at a time.
#[derive(Debug)]
pub struct SubmissionAgent {
    http: reqwest::Client,
    base_url: String,
    profile: ClientProfile,
    busy: AtomicBool,
}

impl SubmissionAgent {
    pub fn new(base_url: impl Into<String>, profile: ClientProfile) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            profile,
            busy: AtomicBool::new(false),
        }
    }

    pub fn profile(&self) -> &ClientProfile {
        &self.profile
    }

    pub fn endpoint(&self) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            self.profile.endpoint
        )
    }

    /// Whether a submission is in flight (the submit control is disabled).
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Validate and send the form with the selected files as one multipart
    /// request. A second call while one is in flight fails with
    /// [`AgentError::Busy`].
    pub async fn submit(
        &self,
        form: &FormData,
        selection: &FileSelection,
    ) -> Result<SubmitOutcome, AgentError> {
        validate_fields(&self.profile, form)?;
        let _busy = BusyGuard::acquire(&self.busy).ok_or(AgentError::Busy)?;

        let mut multipart = Form::new();
        for (name, value) in form.iter() {
            multipart = multipart.text(name.to_string(), value.to_string());
        }
        for file in selection.files() {
            let part = Part::bytes(file.data.clone())
                .file_name(file.name.clone())
                .mime_str(&file.content_type)
                .map_err(|_| AgentError::ContentType(file.content_type.clone()))?;
            multipart = multipart.part(self.profile.files_field, part);
        }

        let response = self
            .http
            .post(self.endpoint())
            .multipart(multipart)
            .send()
            .await?;
        let body = response.text().await?;

        Ok(interpret_response(&self.profile, &body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_exact_success_counts() {
        let profile = ClientProfile::CONTACT;
        assert_eq!(
            interpret_response(&profile, "success"),
            SubmitOutcome::Sent {
                notice: profile.success_notice
            }
        );
        assert_eq!(
            interpret_response(&profile, "success\n"),
            SubmitOutcome::Rejected {
                message: "success\n".to_string()
            }
        );
        assert_eq!(
            interpret_response(&profile, "").notification(&profile),
            "Error sending message: Unknown error"
        );
    }

    #[test]
    fn rejection_is_shown_verbatim() {
        let profile = ClientProfile::QUOTE;
        let outcome = interpret_response(&profile, "Please enter a valid email address.");
        assert_eq!(
            outcome.notification(&profile),
            "Error sending request: Please enter a valid email address."
        );
    }

    #[test]
    fn busy_guard_allows_one_holder() {
        let flag = AtomicBool::new(false);
        let first = BusyGuard::acquire(&flag);
        assert!(first.is_some());
        assert!(BusyGuard::acquire(&flag).is_none());

        drop(first);
        assert!(!flag.load(Ordering::Acquire));
        assert!(BusyGuard::acquire(&flag).is_some());
    }

    #[test]
    fn form_data_overwrites_existing_values() {
        let mut form = FormData::default();
        form.set("name", "Jane");
        form.set("name", "Jane Doe");
        form.set("email", "jane@example.com");

        assert_eq!(form.get("name"), Some("Jane Doe"));
        assert_eq!(form.iter().count(), 2);
        form.clear();
        assert_eq!(form.get("name"), None);
    }

    #[test]
    fn endpoint_joins_base_url() {
        let agent = SubmissionAgent::new("http://localhost:8080/", ClientProfile::QUOTE);
        assert_eq!(agent.endpoint(), "http://localhost:8080/quote");
        assert!(!agent.is_busy());
    }

    #[actix_web::test]
    async fn advisory_failure_does_not_mark_busy() {
        let agent = SubmissionAgent::new("http://127.0.0.1:9", ClientProfile::CONTACT);
        let err = agent
            .submit(&FormData::default(), &FileSelection::default())
            .await
            .unwrap_err();

        assert!(matches!(err, AgentError::Advisory(_)));
        assert!(!agent.is_busy());
    }
}
