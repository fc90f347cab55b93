//! Reactive reads of cached weather.

use std::sync::Arc;

use skycast_weather::WeatherBundle;
use tokio::sync::broadcast;

/// Capacity of the cache write notification channel
pub const UPDATE_CHANNEL_CAPACITY: usize = 64;

/// A cache change for one place. `None` when its weather was removed.
#[derive(Debug, Clone)]
pub struct WeatherUpdate {
    pub place_id: String,
    pub bundle: Option<Arc<WeatherBundle>>,
}

/// Stream of the cached bundle for a single place.
///
/// Yields the current value first (`None` when nothing is cached), then the
/// value after every cache write or removal. Consecutive equal values are
/// yielded once.
#[derive(Debug)]
pub struct WeatherWatch {
    place_id: String,
    pending: Option<Option<WeatherBundle>>,
    last: Option<Option<WeatherBundle>>,
    rx: broadcast::Receiver<WeatherUpdate>,
}

impl WeatherWatch {
    pub(crate) fn new(
        place_id: String,
        initial: Option<WeatherBundle>,
        rx: broadcast::Receiver<WeatherUpdate>,
    ) -> Self {
        Self {
            place_id,
            pending: Some(initial),
            last: None,
            rx,
        }
    }

    pub fn place_id(&self) -> &str {
        &self.place_id
    }

    /// Wait for the next distinct value. `None` once the repository is gone.
    pub async fn next(&mut self) -> Option<Option<WeatherBundle>> {
        if let Some(initial) = self.pending.take() {
            self.last = Some(initial.clone());
            return Some(initial);
        }

        loop {
            match self.rx.recv().await {
                Ok(update) => {
                    if update.place_id != self.place_id {
                        continue;
                    }
                    let value = update.bundle.map(|b| b.as_ref().clone());
                    if self.last.as_ref() == Some(&value) {
                        continue;
                    }
                    self.last = Some(value.clone());
                    return Some(value);
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!("Weather watch for {} skipped {} updates", self.place_id, skipped);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}
