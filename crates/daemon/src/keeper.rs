//! The keeper loop: poll `checkUpkeep`, submit at most one `performUpkeep`
//! at a time, and back off when an attempt does not land.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use keeper_core::model::{ConfirmationOutcome, KeeperPhase, SubmissionAttempt, SubmissionStatus};
use keeper_core::{new_ulid, now_secs};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};
use ulid::Ulid;

use crate::chain::RemoteStateClient;
use crate::config::KeeperConfig;

/// Timing of the keeper loop.
#[derive(Debug, Clone)]
pub struct KeeperSettings {
    pub poll_interval: Duration,
    pub confirmation_timeout: Duration,
    pub cooldown: Duration,
}

impl From<&KeeperConfig> for KeeperSettings {
    fn from(cfg: &KeeperConfig) -> Self {
        Self {
            poll_interval: cfg.poll_interval,
            confirmation_timeout: cfg.confirmation_timeout,
            cooldown: cfg.cooldown,
        }
    }
}

/// What a single tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Predicate evaluated to false.
    NotDue,
    /// Predicate could not be evaluated; nothing else happened.
    CheckFailed,
    /// A new submission sequence was started.
    Started,
    /// An attempt is already in flight; the tick was a no-op.
    InFlight,
    /// Still backing off after a failed confirmation.
    Cooling,
}

#[derive(Debug)]
struct GuardState {
    phase: KeeperPhase,
    attempt: Option<SubmissionAttempt>,
    last_attempt: Option<SubmissionAttempt>,
    cooling_until: Option<Instant>,
}

/// Polls the remote due predicate and drives the submit/confirm sequence.
///
/// Cloning is cheap and every clone shares the same single-flight guard.
#[derive(Clone)]
pub struct KeeperLoop {
    client: Arc<dyn RemoteStateClient>,
    settings: KeeperSettings,
    state: Arc<Mutex<GuardState>>,
    inflight: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl KeeperLoop {
    pub fn new(client: Arc<dyn RemoteStateClient>, settings: KeeperSettings) -> Self {
        Self {
            client,
            settings,
            state: Arc::new(Mutex::new(GuardState {
                phase: KeeperPhase::Idle,
                attempt: None,
                last_attempt: None,
                cooling_until: None,
            })),
            inflight: Arc::new(Mutex::new(None)),
        }
    }

    pub fn phase(&self) -> KeeperPhase {
        self.lock().phase
    }

    /// The attempt currently in flight, if any.
    pub fn current_attempt(&self) -> Option<SubmissionAttempt> {
        self.lock().attempt.clone()
    }

    /// The most recently resolved attempt, with its final status.
    pub fn last_attempt(&self) -> Option<SubmissionAttempt> {
        self.lock().last_attempt.clone()
    }

    fn lock(&self) -> MutexGuard<'_, GuardState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// One polling cycle. The submission itself runs on its own task so that
    /// later ticks still fire, and are turned away by the guard, while it is
    /// in flight.
    pub async fn tick(&self) -> TickOutcome {
        {
            let mut state = self.lock();
            match state.phase {
                KeeperPhase::Submitting | KeeperPhase::AwaitingConfirmation => {
                    debug!("upkeep already in flight; skipping tick");
                    return TickOutcome::InFlight;
                }
                KeeperPhase::Cooling => {
                    if state.cooling_until.is_some_and(|until| Instant::now() < until) {
                        debug!("cooling down; skipping tick");
                        return TickOutcome::Cooling;
                    }
                    info!("cooldown over; resuming polling");
                    state.phase = KeeperPhase::Idle;
                    state.cooling_until = None;
                }
                KeeperPhase::Idle => {}
            }
        }

        debug!("checking whether a draw is due");
        match self.client.is_due().await {
            Ok(true) => {}
            Ok(false) => {
                debug!("draw not due yet");
                return TickOutcome::NotDue;
            }
            Err(e) => {
                warn!(error = %e, "checkUpkeep failed");
                return TickOutcome::CheckFailed;
            }
        }

        let attempt_id = {
            let mut state = self.lock();
            if state.attempt.is_some() || state.phase != KeeperPhase::Idle {
                return TickOutcome::InFlight;
            }
            let attempt = SubmissionAttempt::pending(new_ulid(), now_secs());
            let id = attempt.id;
            state.attempt = Some(attempt);
            state.phase = KeeperPhase::Submitting;
            id
        };

        info!(attempt = %attempt_id, "draw is due; submitting upkeep");
        let this = self.clone();
        let handle = tokio::spawn(async move {
            let release = GuardRelease {
                keeper: &this,
                attempt_id,
            };
            this.drive_attempt(attempt_id).await;
            drop(release);
        });
        *self.inflight.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
        TickOutcome::Started
    }

    /// Wait for the in-flight sequence, if any, to resolve. After
    /// `confirmation_timeout` it is aborted, which releases the guard.
    pub async fn drain(&self) {
        let handle = self
            .inflight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(mut handle) = handle else {
            return;
        };
        if handle.is_finished() {
            return;
        }
        info!("waiting for in-flight upkeep to resolve");
        if tokio::time::timeout(self.settings.confirmation_timeout, &mut handle)
            .await
            .is_err()
        {
            warn!("in-flight upkeep did not resolve in time; abandoning it");
            handle.abort();
            let _ = handle.await;
        }
    }

    async fn drive_attempt(&self, attempt_id: Ulid) {
        let tx = match self.client.submit().await {
            Ok(tx) => tx,
            Err(e) => {
                warn!(attempt = %attempt_id, error = %e, "upkeep submission failed; will retry on a later tick");
                self.resolve(attempt_id, SubmissionStatus::Failed, None);
                return;
            }
        };

        info!(attempt = %attempt_id, tx = %tx, "upkeep submitted; awaiting confirmation");
        {
            let mut state = self.lock();
            state.phase = KeeperPhase::AwaitingConfirmation;
            if let Some(attempt) = state.attempt.as_mut() {
                attempt.tx_identifier = Some(tx.clone());
            }
        }

        let limit = self.settings.confirmation_timeout;
        let outcome = match tokio::time::timeout(limit, self.client.await_confirmation(&tx, limit)).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => {
                warn!(attempt = %attempt_id, tx = %tx, error = %e, "confirmation wait failed");
                ConfirmationOutcome::TimedOut
            }
            Err(_) => ConfirmationOutcome::TimedOut,
        };

        match outcome {
            ConfirmationOutcome::Confirmed => {
                info!(attempt = %attempt_id, tx = %tx, "draw confirmed");
                self.resolve(attempt_id, SubmissionStatus::Confirmed, None);
            }
            ConfirmationOutcome::TimedOut | ConfirmationOutcome::Reverted => {
                warn!(
                    attempt = %attempt_id,
                    tx = %tx,
                    ?outcome,
                    cooldown_secs = self.settings.cooldown.as_secs(),
                    "upkeep abandoned; cooling down"
                );
                let until = Instant::now() + self.settings.cooldown;
                self.resolve(attempt_id, SubmissionStatus::Failed, Some(until));
            }
        }
    }

    /// Drop the attempt and leave the in-flight phases. `cooling_until` moves
    /// the loop to `Cooling` instead of straight back to `Idle`.
    fn resolve(&self, attempt_id: Ulid, status: SubmissionStatus, cooling_until: Option<Instant>) {
        let mut state = self.lock();
        if state.attempt.as_ref().map(|a| a.id) != Some(attempt_id) {
            return;
        }
        if let Some(mut attempt) = state.attempt.take() {
            attempt.status = status;
            debug!(?attempt, "attempt resolved");
            state.last_attempt = Some(attempt);
        }
        match cooling_until {
            Some(until) => {
                state.phase = KeeperPhase::Cooling;
                state.cooling_until = Some(until);
            }
            None => state.phase = KeeperPhase::Idle,
        }
    }
}

/// Clears the guard if the submission task ends without resolving its attempt.
struct GuardRelease<'a> {
    keeper: &'a KeeperLoop,
    attempt_id: Ulid,
}

impl Drop for GuardRelease<'_> {
    fn drop(&mut self) {
        let mut state = self.keeper.lock();
        if state.attempt.as_ref().map(|a| a.id) == Some(self.attempt_id) {
            warn!(attempt = %self.attempt_id, "submission task ended without resolving; releasing guard");
            if let Some(mut attempt) = state.attempt.take() {
                attempt.status = SubmissionStatus::Failed;
                state.last_attempt = Some(attempt);
            }
            state.phase = KeeperPhase::Idle;
        }
    }
}

/// Run the keeper on its own task until `shutdown` flips. The returned task
/// only completes once any in-flight attempt has resolved or been abandoned.
pub fn spawn_keeper(keeper: KeeperLoop, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut tick = interval(keeper.settings.poll_interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(
            poll_secs = keeper.settings.poll_interval.as_secs(),
            confirmation_timeout_secs = keeper.settings.confirmation_timeout.as_secs(),
            "keeper loop started"
        );
        loop {
            tokio::select! {
                _ = tick.tick() => {
                    let outcome = keeper.tick().await;
                    debug!(?outcome, "keeper tick");
                }
                _ = shutdown.changed() => {
                    info!("keeper loop stopping");
                    keeper.drain().await;
                    break;
                }
            }
        }
    })
}
