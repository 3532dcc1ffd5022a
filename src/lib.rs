//! Kanri — GitHub device-flow login core
//!
//! Client side of the OAuth 2.0 Device Authorization Grant (RFC 8628) as
//! used by the Kanri onboarding wizard: a cancellable polling state machine
//! ([`DeviceFlowController`](controller::DeviceFlowController)) over a
//! pluggable transport, plus a best-effort clipboard relay for the user
//! code ([`ClipboardRelay`](clipboard::ClipboardRelay)).
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use kanri::controller::DeviceFlowController;
//! use kanri::github::GitHubDeviceFlow;
//!
//! # async fn example() {
//! let transport = Arc::new(GitHubDeviceFlow::from_env());
//! let controller = DeviceFlowController::new(transport)
//!     .with_on_authenticated(Arc::new(|| println!("logged in")));
//!
//! let mut state = controller.watch_state();
//! controller.start().await;
//! while state.changed().await.is_ok() {
//!     println!("{:?}", *state.borrow());
//! }
//! # }
//! ```

pub mod clipboard;
pub mod controller;
pub mod error;
pub mod github;
pub mod outcome;
pub mod prelude;
pub mod session;
pub mod transport;
