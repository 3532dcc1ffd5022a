//! Device-code session descriptor and transport poll signals.

use chrono::{DateTime, Utc};

/// One in-flight device-authorization attempt.
///
/// Created by a successful initiation call; discarded on any terminal
/// outcome or explicit cancellation. At most one session is active per
/// [`DeviceFlowController`](crate::controller::DeviceFlowController).
///
/// # Example
/// ```no_run
/// use kanri::session::DeviceSession;
/// use chrono::{DateTime, Utc};
///
/// let session = DeviceSession {
///     verification_uri: "https://github.com/login/device".to_string(),
///     user_code: "ABCD-EFGH".to_string(),
///     device_code: "device-auth-id".to_string(),
///     interval_secs: 5,
///     expires_at: DateTime::<Utc>::from(std::time::SystemTime::now()),
/// };
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceSession {
    /// URL the user must open in a browser.
    pub verification_uri: String,
    /// Short code the user types into the verification page.
    pub user_code: String,
    /// Opaque token identifying the attempt server-side; never rendered.
    pub device_code: String,
    /// Server-dictated minimum spacing between polls, in seconds (>= 1).
    /// Mutable: a slow-down outcome increases it for the rest of the session.
    pub interval_secs: u64,
    /// Server deadline after which the device code is dead.
    pub expires_at: DateTime<Utc>,
}

/// Decoded result of a single poll call, as reported by the transport.
///
/// Transports that cannot produce a typed signal return an error instead;
/// the raw message is then classified by
/// [`outcome::classify`](crate::outcome::classify).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollSignal {
    /// User completed the flow; authentication succeeded.
    Authorized,
    /// User has not finished the flow yet.
    Pending,
    /// Server asked for a larger polling interval.
    SlowDown,
    /// User explicitly rejected the request.
    Denied,
    /// The device code expired before the user authorized.
    Expired,
}
