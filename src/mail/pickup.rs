use std::fs;
use std::path::PathBuf;

use uuid::Uuid;

use super::{ComposedEmail, MailError, MailTransport};

/// Writes each message as an `.eml` file into a pickup directory.
#[derive(Clone, Debug)]
pub struct PickupDirTransport {
    dir: PathBuf,
}

impl PickupDirTransport {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl MailTransport for PickupDirTransport {
    fn send(&self, email: &ComposedEmail) -> Result<(), MailError> {
        fs::create_dir_all(&self.dir).map_err(MailError::Write)?;
        let path = self.dir.join(format!("{}.eml", Uuid::new_v4().simple()));
        fs::write(&path, email.to_message()).map_err(MailError::Write)?;
        log::info!("Queued message in pickup directory: {path:?}");
        Ok(())
    }
}
