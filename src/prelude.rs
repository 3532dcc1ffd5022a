//! Convenience re-exports for common use.

pub use crate::clipboard::{ClipboardAttempt, ClipboardRelay, SystemClipboard};
pub use crate::controller::{ControllerState, DeviceFlowController};
pub use crate::error::{AuthError, Result};
pub use crate::github::GitHubDeviceFlow;
pub use crate::outcome::PollOutcome;
pub use crate::session::{DeviceSession, PollSignal};
pub use crate::transport::DeviceFlowTransport;
