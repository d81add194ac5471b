//! Configuration models.
pub mod config;
