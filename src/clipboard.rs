//! Best-effort clipboard relay for the device user code.
//!
//! Clipboard access is a convenience, not a correctness requirement of the
//! authorization flow: every failure here is logged and swallowed.

use std::io::Write as _;
use std::process::{Command, Stdio};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use thiserror::Error;
use tokio::task::JoinHandle;

/// How long a successful copy stays acknowledged.
const ACK_WINDOW: Duration = Duration::from_secs(2);

/// Clipboard failures. Never surfaced to the user.
#[derive(Debug, Error)]
pub enum ClipboardError {
    #[error("clipboard unavailable: {0}")]
    Unavailable(String),
    #[error("copy command failed: {0}")]
    Command(String),
}

/// Write-only clipboard seam, so tests can observe copy attempts.
pub trait ClipboardBackend: Send + Sync {
    fn write(&self, text: &str) -> Result<(), ClipboardError>;
}

/// Production backend: `arboard` first, then a platform copy command.
///
/// Either path may be absent or unsupported (headless CI, Wayland without a
/// portal, ...) without being treated as an error by the relay.
#[derive(Debug, Default)]
pub struct SystemClipboard;

impl SystemClipboard {
    pub fn new() -> Self {
        Self
    }

    fn write_primary(&self, text: &str) -> Result<(), ClipboardError> {
        let mut clipboard = arboard::Clipboard::new()
            .map_err(|e| ClipboardError::Unavailable(e.to_string()))?;
        clipboard
            .set_text(text.to_string())
            .map_err(|e| ClipboardError::Unavailable(e.to_string()))
    }

    fn write_fallback(&self, text: &str) -> Result<(), ClipboardError> {
        let mut last_error = ClipboardError::Command("no copy command available".to_string());
        for command in copy_commands() {
            match pipe_to_command(command, text) {
                Ok(()) => return Ok(()),
                Err(error) => last_error = error,
            }
        }
        Err(last_error)
    }
}

impl ClipboardBackend for SystemClipboard {
    fn write(&self, text: &str) -> Result<(), ClipboardError> {
        match self.write_primary(text) {
            Ok(()) => Ok(()),
            Err(primary) => {
                tracing::debug!(error = %primary, "primary clipboard write failed, trying fallback");
                self.write_fallback(text)
            }
        }
    }
}

#[cfg(target_os = "macos")]
fn copy_commands() -> &'static [&'static [&'static str]] {
    &[&["pbcopy"]]
}

#[cfg(target_os = "windows")]
fn copy_commands() -> &'static [&'static [&'static str]] {
    &[&["clip"]]
}

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
fn copy_commands() -> &'static [&'static [&'static str]] {
    &[&["wl-copy"], &["xclip", "-selection", "clipboard"]]
}

fn pipe_to_command(command: &[&str], text: &str) -> Result<(), ClipboardError> {
    let mut child = Command::new(command[0])
        .args(&command[1..])
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| ClipboardError::Command(format!("{}: {e}", command[0])))?;
    if let Some(stdin) = child.stdin.as_mut() {
        stdin
            .write_all(text.as_bytes())
            .map_err(|e| ClipboardError::Command(format!("{}: {e}", command[0])))?;
    }
    let status = child
        .wait()
        .map_err(|e| ClipboardError::Command(format!("{}: {e}", command[0])))?;
    if status.success() {
        Ok(())
    } else {
        Err(ClipboardError::Command(format!(
            "{} exited with {status}",
            command[0]
        )))
    }
}

/// Result of the most recent copy attempt.
///
/// `acknowledged` auto-clears two seconds after a successful copy. The
/// window is wall-clock, not code-scoped: any later successful copy
/// (automatic or manual) restarts it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClipboardAttempt {
    pub copied: bool,
    pub acknowledged: bool,
}

struct RelayInner {
    last_code: Option<String>,
    attempt: ClipboardAttempt,
    /// Single-slot acknowledgment timer; aborted before being replaced.
    ack_task: Option<JoinHandle<()>>,
}

/// Copies the user code to the system clipboard, once per distinct code.
///
/// Must be used within a tokio runtime (the acknowledgment window is a
/// spawned timer task).
///
/// # Example
///
/// ```ignore
/// let relay = Arc::new(ClipboardRelay::new(Arc::new(SystemClipboard::new())));
/// let controller = DeviceFlowController::new(transport).with_on_code({
///     let relay = relay.clone();
///     Arc::new(move |code| relay.on_code_available(code))
/// });
/// ```
pub struct ClipboardRelay {
    backend: Arc<dyn ClipboardBackend>,
    ack_window: Duration,
    inner: Arc<Mutex<RelayInner>>,
}

impl ClipboardRelay {
    pub fn new(backend: Arc<dyn ClipboardBackend>) -> Self {
        Self {
            backend,
            ack_window: ACK_WINDOW,
            inner: Arc::new(Mutex::new(RelayInner {
                last_code: None,
                attempt: ClipboardAttempt::default(),
                ack_task: None,
            })),
        }
    }

    /// Override the acknowledgment window (tests).
    pub fn with_ack_window(mut self, window: Duration) -> Self {
        self.ack_window = window;
        self
    }

    /// Automatic copy: fires at most once per distinct code value.
    pub fn on_code_available(&self, code: &str) {
        {
            let Ok(mut inner) = self.inner.lock() else {
                return;
            };
            if inner.last_code.as_deref() == Some(code) {
                return;
            }
            inner.last_code = Some(code.to_string());
        }
        self.copy_and_ack(code);
    }

    /// Manual copy (the "Copy" button): always attempts, independent of
    /// whether an automatic copy already ran for this code.
    pub fn copy_now(&self, code: &str) {
        self.copy_and_ack(code);
    }

    /// The most recent copy attempt.
    pub fn attempt(&self) -> ClipboardAttempt {
        self.inner
            .lock()
            .map(|inner| inner.attempt)
            .unwrap_or_default()
    }

    /// Whether a successful copy is still inside its acknowledgment window.
    pub fn acknowledged(&self) -> bool {
        self.attempt().acknowledged
    }

    fn copy_and_ack(&self, code: &str) {
        match self.backend.write(code) {
            Ok(()) => {
                let Ok(mut inner) = self.inner.lock() else {
                    return;
                };
                inner.attempt.copied = true;
                inner.attempt.acknowledged = true;
                self.restart_ack_window(&mut inner);
            }
            Err(error) => {
                tracing::warn!(error = %error, "clipboard copy failed");
                if let Ok(mut inner) = self.inner.lock() {
                    inner.attempt.copied = false;
                }
            }
        }
    }

    fn restart_ack_window(&self, inner: &mut RelayInner) {
        if let Some(task) = inner.ack_task.take() {
            task.abort();
        }
        let shared = Arc::clone(&self.inner);
        let window = self.ack_window;
        inner.ack_task = Some(tokio::spawn(async move {
            tokio::time::sleep(window).await;
            if let Ok(mut inner) = shared.lock() {
                inner.attempt.acknowledged = false;
                inner.ack_task = None;
            }
        }));
    }
}

impl Drop for ClipboardRelay {
    fn drop(&mut self) {
        if let Ok(mut inner) = self.inner.lock() {
            if let Some(task) = inner.ack_task.take() {
                task.abort();
            }
        }
    }
}
