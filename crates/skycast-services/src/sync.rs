//! Background reconciliation of saved places with the weather provider.
//!
//! Each saved place is refreshed independently with bounded retry. Outcomes
//! are aggregated into a [`SyncResult`]; provider failures never escape as
//! errors, only storage faults do.

use std::sync::Arc;
use std::time::Duration;

use skycast_weather::{ConnectivityObserver, Place};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::error::{WeatherError, WeatherResult};
use crate::freshness::CacheState;
use crate::repository::WeatherRepository;
use crate::retry::{with_retry, RetryError, RetryPolicy};

/// How often a periodic sync re-checks connectivity while offline
pub const OFFLINE_PROBE_INTERVAL: Duration = Duration::from_secs(5);

const CANCELLED_REASON: &str = "Sync cancelled";

/// Aggregate result of a sync pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncResult {
    /// Connectivity reported offline; nothing attempted
    NoNetwork,
    /// No saved places
    NoPlaces,
    /// Every place was fresh
    NoDataToSync,
    Success(usize),
    PartialSuccess { success: usize, failure: usize },
    /// Every attempted place failed or was cancelled; carries the last cause
    Failure(String),
}

/// Outcome for one place.
#[derive(Debug)]
pub enum PlaceOutcome {
    Success,
    /// Cache still fresh
    Skipped,
    Failure(WeatherError),
    /// Sync was cancelled before this place finished
    Cancelled,
}

/// Run state of the sync service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Idle,
    Running,
    Completed,
    Aborted,
}

pub struct SyncService {
    repository: WeatherRepository,
    connectivity: Arc<dyn ConnectivityObserver>,
    retry: RetryPolicy,
    cancel: CancellationToken,
    state: watch::Sender<SyncState>,
}

impl std::fmt::Debug for SyncService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncService")
            .field("retry", &self.retry)
            .field("state", &*self.state.borrow())
            .finish_non_exhaustive()
    }
}

impl SyncService {
    pub fn new(repository: WeatherRepository, connectivity: Arc<dyn ConnectivityObserver>) -> Self {
        let (state, _) = watch::channel(SyncState::Idle);
        Self {
            repository,
            connectivity,
            retry: RetryPolicy::default(),
            cancel: CancellationToken::new(),
            state,
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Use `token` to cancel in-flight syncs.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn state(&self) -> SyncState {
        *self.state.borrow()
    }

    /// Child of the service token, for [`SyncService::run_periodic`].
    pub fn child_token(&self) -> CancellationToken {
        self.cancel.child_token()
    }

    /// Stop in-flight and future syncs.
    pub fn cancel(&self) {
        tracing::info!("Sync cancellation requested");
        self.cancel.cancel();
    }

    /// Sync every saved place. `force` ignores cache freshness.
    pub async fn sync_all(&self, force: bool) -> WeatherResult<SyncResult> {
        self.sync_all_with(force, &self.cancel).await
    }

    async fn sync_all_with(&self, force: bool, cancel: &CancellationToken) -> WeatherResult<SyncResult> {
        if !self.connectivity.is_connected().await {
            tracing::info!("Sync skipped: no network");
            return Ok(SyncResult::NoNetwork);
        }

        let places = self.repository.saved_places().await?;
        if places.is_empty() {
            tracing::info!("Sync skipped: no saved places");
            return Ok(SyncResult::NoPlaces);
        }

        self.state.send_replace(SyncState::Running);
        tracing::info!("Syncing {} places", places.len());

        let mut success = 0;
        let mut failures = Vec::new();
        let mut aborted = false;

        for saved in &places {
            let outcome = match self.sync_place_with(&saved.place, force, cancel).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    self.state.send_replace(SyncState::Aborted);
                    return Err(e);
                }
            };

            match outcome {
                PlaceOutcome::Success => success += 1,
                PlaceOutcome::Skipped => {}
                PlaceOutcome::Failure(e) => failures.push(e.to_string()),
                PlaceOutcome::Cancelled => {
                    failures.push(CANCELLED_REASON.to_string());
                    aborted = true;
                    break;
                }
            }
        }

        self.state.send_replace(if aborted {
            SyncState::Aborted
        } else {
            SyncState::Completed
        });

        let result = aggregate(success, failures);
        tracing::info!("Sync finished: {:?}", result);
        Ok(result)
    }

    /// Sync a single place with the same freshness and retry rules.
    pub async fn sync_place(&self, place: &Place, force: bool) -> WeatherResult<PlaceOutcome> {
        self.sync_place_with(place, force, &self.cancel).await
    }

    async fn sync_place_with(
        &self,
        place: &Place,
        force: bool,
        cancel: &CancellationToken,
    ) -> WeatherResult<PlaceOutcome> {
        if !force && self.repository.cache_state(&place.id).await? == CacheState::Fresh {
            tracing::debug!("Sync skipped fresh place {}", place.id);
            return Ok(PlaceOutcome::Skipped);
        }

        let repository = &self.repository;
        let result = with_retry(&self.retry, cancel, move |attempt| {
            tracing::debug!("Fetching {} (attempt {})", place.id, attempt);
            repository.refresh(place)
        })
        .await;

        match result {
            Ok(_) => Ok(PlaceOutcome::Success),
            Err(RetryError::Cancelled { .. }) => Ok(PlaceOutcome::Cancelled),
            Err(RetryError::Failed { last, attempts }) => match last {
                WeatherError::Storage(_) => Err(last),
                last => {
                    tracing::warn!("Sync of {} failed after {} attempts: {}", place.id, attempts, last);
                    Ok(PlaceOutcome::Failure(last))
                }
            },
        }
    }

    /// Sync on `interval` until `token` is cancelled.
    ///
    /// `token` also cancels the retry loop of an in-flight pass, so pass a
    /// child of the service token to have [`SyncService::cancel`] stop it too.
    /// While offline, connectivity is re-checked every
    /// [`OFFLINE_PROBE_INTERVAL`] and on every change the observer pushes,
    /// so a pass runs soon after the network returns.
    pub async fn run_periodic(&self, interval: Duration, token: CancellationToken) {
        let mut connectivity = self.connectivity.subscribe();
        tracing::info!("Periodic sync started (every {:?})", interval);

        while !token.is_cancelled() {
            let offline = match self.sync_all_with(false, &token).await {
                Ok(SyncResult::NoNetwork) => true,
                Ok(result) => {
                    tracing::debug!("Periodic sync result: {:?}", result);
                    false
                }
                Err(e) => {
                    tracing::error!("Periodic sync failed: {}", e);
                    false
                }
            };
            let wait = if offline {
                interval.min(OFFLINE_PROBE_INTERVAL)
            } else {
                interval
            };

            tokio::select! {
                _ = token.cancelled() => break,
                _ = tokio::time::sleep(wait) => {}
                _ = connectivity_restored(&mut connectivity) => {
                    tracing::info!("Connectivity restored, syncing");
                }
            }
        }

        self.state.send_replace(SyncState::Idle);
        tracing::info!("Periodic sync stopped");
    }
}

/// Resolves on an offline to online transition.
async fn connectivity_restored(rx: &mut watch::Receiver<bool>) {
    let mut online = *rx.borrow_and_update();
    loop {
        if rx.changed().await.is_err() {
            // Observer dropped
            std::future::pending::<()>().await;
        }
        let now_online = *rx.borrow_and_update();
        if now_online && !online {
            return;
        }
        online = now_online;
    }
}

fn aggregate(success: usize, failures: Vec<String>) -> SyncResult {
    match (success, failures.len()) {
        (0, 0) => SyncResult::NoDataToSync,
        (n, 0) => SyncResult::Success(n),
        (0, _) => SyncResult::Failure(failures.last().cloned().unwrap_or_default()),
        (success, failure) => SyncResult::PartialSuccess { success, failure },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skycast_weather::ProviderError;

    #[test]
    fn test_aggregate() {
        assert_eq!(aggregate(0, Vec::new()), SyncResult::NoDataToSync);
        assert_eq!(aggregate(3, Vec::new()), SyncResult::Success(3));
        assert_eq!(
            aggregate(2, vec![WeatherError::from(ProviderError::Timeout).to_string()]),
            SyncResult::PartialSuccess { success: 2, failure: 1 }
        );
        assert!(matches!(
            aggregate(0, vec![WeatherError::from(ProviderError::InvalidCredential).to_string()]),
            SyncResult::Failure(reason) if reason.contains("Invalid credential")
        ));
    }

    #[test]
    fn test_cancelled_place_is_not_nothing_to_sync() {
        assert_eq!(
            aggregate(0, vec![CANCELLED_REASON.to_string()]),
            SyncResult::Failure(CANCELLED_REASON.to_string())
        );
        assert_eq!(
            aggregate(1, vec![CANCELLED_REASON.to_string()]),
            SyncResult::PartialSuccess { success: 1, failure: 1 }
        );
    }
}
