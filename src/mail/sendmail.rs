use std::io::Write;
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};

use super::{ComposedEmail, MailError, MailTransport};

/// Pipes the message into a local `sendmail` binary.
#[derive(Clone, Debug)]
pub struct SendmailTransport {
    program: PathBuf,
}

impl SendmailTransport {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl MailTransport for SendmailTransport {
    fn send(&self, email: &ComposedEmail) -> Result<(), MailError> {
        let mut child = Command::new(&self.program)
            // -i: a lone dot does not end the message
            .arg("-i")
            .arg("--")
            .args(&email.recipients)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(MailError::Spawn)?;

        let status = feed(&mut child, email.to_message().as_bytes())?;
        if status.success() {
            Ok(())
        } else {
            Err(MailError::Exit(status))
        }
    }
}

/// Write `message` to the child's stdin and wait for it. The child is reaped
/// on every path.
fn feed(child: &mut Child, message: &[u8]) -> Result<ExitStatus, MailError> {
    if let Some(mut stdin) = child.stdin.take() {
        if let Err(e) = stdin.write_all(message) {
            drop(stdin);
            let _ = child.kill();
            let _ = child.wait();
            return Err(MailError::Write(e));
        }
    }
    child.wait().map_err(MailError::Write)
}
