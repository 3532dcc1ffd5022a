//! Transport seam between the controller and the authorization service.

use async_trait::async_trait;

use crate::error::AuthError;
use crate::session::{DeviceSession, PollSignal};

/// The two operations the device-flow state machine needs from the
/// authorization service.
///
/// [`GitHubDeviceFlow`](crate::github::GitHubDeviceFlow) is the production
/// implementation; tests script their own.
#[async_trait]
pub trait DeviceFlowTransport: Send + Sync {
    /// Exchange a client id for a fresh device-code session.
    async fn start_device_flow(&self) -> Result<DeviceSession, AuthError>;

    /// Ask the server whether the user has completed the flow.
    ///
    /// Implementations return a typed [`PollSignal`] when they can decode
    /// the response, and an error otherwise; the raw error message is still
    /// classified by the controller's outcome table.
    async fn poll_device_flow(&self, session: &DeviceSession) -> Result<PollSignal, AuthError>;
}
