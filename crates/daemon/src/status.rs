use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use keeper_core::model::{EpochSecs, StatusSnapshot};
use keeper_core::{now_secs, project, RemoteError};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::chain::RemoteStateClient;

pub type Clock = Arc<dyn Fn() -> EpochSecs + Send + Sync>;

/// Last good snapshot, shared between the refresher and the HTTP handlers.
#[derive(Clone, Default)]
pub struct StatusCache {
    inner: Arc<RwLock<Option<StatusSnapshot>>>,
}

impl StatusCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// `None` until the first successful read.
    pub fn latest(&self) -> Option<StatusSnapshot> {
        *self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn replace(&self, snapshot: StatusSnapshot) {
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = Some(snapshot);
    }
}

/// Reads the contract fields and turns them into the countdown snapshot.
#[derive(Clone)]
pub struct StatusProjector {
    client: Arc<dyn RemoteStateClient>,
    cache: StatusCache,
    clock: Clock,
}

impl StatusProjector {
    pub fn new(client: Arc<dyn RemoteStateClient>, cache: StatusCache) -> Self {
        Self::with_clock(client, cache, Arc::new(now_secs))
    }

    pub fn with_clock(client: Arc<dyn RemoteStateClient>, cache: StatusCache, clock: Clock) -> Self {
        Self { client, cache, clock }
    }

    /// Read, project and publish. On failure the previous snapshot stays in place.
    pub async fn refresh(&self) -> Result<StatusSnapshot, RemoteError> {
        let state = self.client.read_fields().await?;
        let snapshot = project(&state, (self.clock)());
        self.cache.replace(snapshot);
        Ok(snapshot)
    }
}

/// Refresh the snapshot every `period` until `shutdown` flips.
pub fn spawn_status_refresher(
    projector: StatusProjector,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut tick = interval(period);
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(refresh_secs = period.as_secs(), "status refresher started");
        loop {
            tokio::select! {
                _ = tick.tick() => {
                    match projector.refresh().await {
                        Ok(snap) => debug!(time_left = snap.time_left_seconds, is_drawing = snap.is_drawing, "status refreshed"),
                        Err(e) => warn!(error = %e, "status refresh failed; serving last snapshot"),
                    }
                }
                _ = shutdown.changed() => {
                    info!("status refresher stopping");
                    break;
                }
            }
        }
    })
}
