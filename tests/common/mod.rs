//! Scripted transport for driving the controller without HTTP.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use tokio::time::Instant;

use kanri::error::AuthError;
use kanri::session::{DeviceSession, PollSignal};
use kanri::transport::DeviceFlowTransport;

/// What the next poll call should do.
pub enum PollScript {
    Signal(PollSignal),
    Fail(AuthError),
    /// Never resolve: models a poll call still in flight when the session
    /// is superseded.
    Hang,
}

/// Transport that hands out generated sessions and replays scripted poll
/// results, recording when each poll call arrives (in paused tokio time).
pub struct ScriptedTransport {
    interval_secs: u64,
    session_counter: AtomicU64,
    polls: Mutex<VecDeque<PollScript>>,
    poll_log: Mutex<Vec<(Instant, String)>>,
}

impl ScriptedTransport {
    pub fn new(interval_secs: u64) -> Self {
        Self {
            interval_secs,
            session_counter: AtomicU64::new(0),
            polls: Mutex::new(VecDeque::new()),
            poll_log: Mutex::new(Vec::new()),
        }
    }

    pub fn push_poll(&self, script: PollScript) {
        self.polls.lock().unwrap().push_back(script);
    }

    /// `(instant, device_code)` for every poll call received so far.
    pub fn poll_log(&self) -> Vec<(Instant, String)> {
        self.poll_log.lock().unwrap().clone()
    }

    pub fn poll_count(&self) -> usize {
        self.poll_log.lock().unwrap().len()
    }
}

#[async_trait]
impl DeviceFlowTransport for ScriptedTransport {
    async fn start_device_flow(&self) -> Result<DeviceSession, AuthError> {
        let n = self.session_counter.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(DeviceSession {
            verification_uri: "https://github.com/login/device".to_string(),
            user_code: format!("CODE-{n}"),
            device_code: format!("device-{n}"),
            interval_secs: self.interval_secs,
            expires_at: Utc::now() + ChronoDuration::minutes(15),
        })
    }

    async fn poll_device_flow(&self, session: &DeviceSession) -> Result<PollSignal, AuthError> {
        self.poll_log
            .lock()
            .unwrap()
            .push((Instant::now(), session.device_code.clone()));
        let script = self.polls.lock().unwrap().pop_front();
        match script {
            Some(PollScript::Signal(signal)) => Ok(signal),
            Some(PollScript::Fail(error)) => Err(error),
            Some(PollScript::Hang) => std::future::pending().await,
            None => Ok(PollSignal::Pending),
        }
    }
}
