#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use keeper_core::model::{ConfirmationOutcome, RemoteState};
use keeper_core::RemoteError;
use keeper_daemon::chain::RemoteStateClient;
use keeper_daemon::keeper::KeeperSettings;
use keeper_daemon::status::Clock;

/// How the fake node answers `await_confirmation`.
#[derive(Debug, Clone, Copy)]
pub enum Confirmation {
    /// Resolve with `outcome` after `delay` (or `TimedOut` if the caller's timeout is shorter).
    After(Duration, ConfirmationOutcome),
    /// Never resolve, ignoring the timeout it was given.
    Hang,
    /// Fail with a transport error immediately.
    Fail,
}

/// Scripted stand-in for the contract client.
///
/// Like the real contract, a confirmed upkeep flips the due predicate to false.
pub struct ScriptedClient {
    pub due: AtomicBool,
    pub due_fails: AtomicBool,
    fields: Mutex<Result<RemoteState, RemoteError>>,
    submit_results: Mutex<VecDeque<Result<String, RemoteError>>>,
    confirmation: Mutex<Confirmation>,

    pub is_due_calls: AtomicUsize,
    pub read_calls: AtomicUsize,
    pub submits: AtomicUsize,
    pub confirm_requests: Mutex<Vec<(String, Duration)>>,
}

impl ScriptedClient {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            due: AtomicBool::new(false),
            due_fails: AtomicBool::new(false),
            fields: Mutex::new(Err(RemoteError::unavailable("no fields scripted"))),
            submit_results: Mutex::new(VecDeque::new()),
            confirmation: Mutex::new(Confirmation::After(
                Duration::from_secs(1),
                ConfirmationOutcome::Confirmed,
            )),
            is_due_calls: AtomicUsize::new(0),
            read_calls: AtomicUsize::new(0),
            submits: AtomicUsize::new(0),
            confirm_requests: Mutex::new(Vec::new()),
        })
    }

    pub fn set_due(&self, due: bool) {
        self.due.store(due, Ordering::SeqCst);
    }

    pub fn set_fields(&self, fields: Result<RemoteState, RemoteError>) {
        *self.fields.lock().unwrap() = fields;
    }

    /// Queue the result of the next `submit`. Unscripted submits return `tx<N>`.
    pub fn push_submit(&self, result: Result<String, RemoteError>) {
        self.submit_results.lock().unwrap().push_back(result);
    }

    pub fn set_confirmation(&self, confirmation: Confirmation) {
        *self.confirmation.lock().unwrap() = confirmation;
    }

    pub fn submit_count(&self) -> usize {
        self.submits.load(Ordering::SeqCst)
    }

    pub fn is_due_count(&self) -> usize {
        self.is_due_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteStateClient for ScriptedClient {
    async fn read_fields(&self) -> Result<RemoteState, RemoteError> {
        self.read_calls.fetch_add(1, Ordering::SeqCst);
        self.fields.lock().unwrap().clone()
    }

    async fn is_due(&self) -> Result<bool, RemoteError> {
        self.is_due_calls.fetch_add(1, Ordering::SeqCst);
        if self.due_fails.load(Ordering::SeqCst) {
            return Err(RemoteError::unavailable("connection refused"));
        }
        Ok(self.due.load(Ordering::SeqCst))
    }

    async fn submit(&self) -> Result<String, RemoteError> {
        let n = self.submits.fetch_add(1, Ordering::SeqCst) + 1;
        let scripted = self.submit_results.lock().unwrap().pop_front();
        scripted.unwrap_or_else(|| Ok(format!("tx{n}")))
    }

    async fn await_confirmation(
        &self,
        tx: &str,
        timeout: Duration,
    ) -> Result<ConfirmationOutcome, RemoteError> {
        self.confirm_requests
            .lock()
            .unwrap()
            .push((tx.to_string(), timeout));
        let plan = *self.confirmation.lock().unwrap();
        match plan {
            Confirmation::After(delay, outcome) => {
                if delay > timeout {
                    tokio::time::sleep(timeout).await;
                    return Ok(ConfirmationOutcome::TimedOut);
                }
                tokio::time::sleep(delay).await;
                if outcome == ConfirmationOutcome::Confirmed {
                    self.set_due(false);
                }
                Ok(outcome)
            }
            Confirmation::Hang => std::future::pending().await,
            Confirmation::Fail => Err(RemoteError::unavailable("receipt endpoint down")),
        }
    }
}

pub fn settings() -> KeeperSettings {
    KeeperSettings {
        poll_interval: Duration::from_secs(60),
        confirmation_timeout: Duration::from_secs(120),
        cooldown: Duration::from_secs(30),
    }
}

/// Manually advanced wall clock for the status projector.
pub fn manual_clock(start: u64) -> (Arc<AtomicU64>, Clock) {
    let now = Arc::new(AtomicU64::new(start));
    let handle = Arc::clone(&now);
    let clock: Clock = Arc::new(move || handle.load(Ordering::SeqCst));
    (now, clock)
}

/// Let spawned tasks run without moving the paused clock meaningfully.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}
