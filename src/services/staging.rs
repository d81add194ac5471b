//! Handler-owned staging storage for attachments awaiting delivery.
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::domain::{SafeName, StagingDir};
use crate::services::{Anomaly, ServiceResult, StagingFault, SubmissionError};

#[derive(Clone, Debug)]
pub struct StagingArea {
    dir: StagingDir,
}

impl StagingArea {
    pub fn new(dir: StagingDir) -> Self {
        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        self.dir.as_path()
    }

    /// Create the directory if needed and prove it accepts new files.
    pub fn ensure_ready(&self) -> ServiceResult<()> {
        let dir = self.dir.as_path();
        if !dir.is_dir() {
            fs::create_dir_all(dir)
                .map_err(|e| SubmissionError::StagingUnavailable(StagingFault::Create(e)))?;
        }
        tempfile::tempfile_in(dir)
            .map_err(|e| SubmissionError::StagingUnavailable(StagingFault::NotWritable(e)))?;
        Ok(())
    }

    /// Move a spooled upload into staging under a fresh unique name.
    pub fn stage(&self, temp: NamedTempFile, name: &SafeName) -> io::Result<PathBuf> {
        let target = self.dir.unique_path(name);

        if let Err(err) = temp.persist_noclobber(&target) {
            // Rename fails across filesystems; fall back to a copy.
            if let Err(copy_err) = fs::copy(err.file.path(), &target) {
                let _ = fs::remove_file(&target);
                return Err(copy_err);
            }
        }

        if let Err(e) = restrict_permissions(&target) {
            log::warn!("Failed to set permissions on {target:?}: {e}");
        }
        Ok(target)
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o644))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> io::Result<()> {
    Ok(())
}

/// Every file staged for one request. Whatever is still tracked when the
/// value goes away is deleted, so no exit path can orphan a staged file.
#[derive(Debug, Default)]
pub struct StagedAttachments {
    paths: Vec<PathBuf>,
}

impl StagedAttachments {
    pub fn track(&mut self, path: PathBuf) {
        self.paths.push(path);
    }

    /// Delete all staged files, returning the deletions that failed.
    pub fn cleanup(&mut self) -> Vec<Anomaly> {
        self.paths
            .drain(..)
            .filter_map(|path| match fs::remove_file(&path) {
                Ok(()) => None,
                Err(e) if e.kind() == io::ErrorKind::NotFound => None,
                Err(source) => Some(Anomaly::CleanupFailed { path, source }),
            })
            .collect()
    }
}

impl Drop for StagedAttachments {
    fn drop(&mut self) {
        for anomaly in self.cleanup() {
            anomaly.log();
        }
    }
}
