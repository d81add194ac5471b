//! Submitted form payloads and their validation rules.
pub mod submission;
