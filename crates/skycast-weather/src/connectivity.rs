//! Network reachability signal.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tokio::sync::watch;

const PROBE_TIMEOUT_SECS: u64 = 3;

#[async_trait]
pub trait ConnectivityObserver: Send + Sync {
    /// Current reachability.
    async fn is_connected(&self) -> bool;

    /// Stream of reachability changes.
    fn subscribe(&self) -> watch::Receiver<bool>;
}

/// Reachability driven by the host (platform callbacks, tests).
#[derive(Debug)]
pub struct WatchConnectivity {
    tx: watch::Sender<bool>,
}

impl WatchConnectivity {
    pub fn new(connected: bool) -> Self {
        let (tx, _rx) = watch::channel(connected);
        Self { tx }
    }

    pub fn set_connected(&self, connected: bool) {
        self.tx.send_if_modified(|current| {
            let changed = *current != connected;
            *current = connected;
            changed
        });
    }
}

#[async_trait]
impl ConnectivityObserver for WatchConnectivity {
    async fn is_connected(&self) -> bool {
        *self.tx.borrow()
    }

    fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

/// Reachability probed with a HEAD request; any HTTP response counts as online.
#[derive(Debug)]
pub struct HttpConnectivity {
    client: Client,
    probe_url: String,
    tx: watch::Sender<bool>,
}

impl HttpConnectivity {
    pub fn new(probe_url: impl Into<String>) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(PROBE_TIMEOUT_SECS))
            .build()?;
        let (tx, _rx) = watch::channel(true);
        Ok(Self {
            client,
            probe_url: probe_url.into(),
            tx,
        })
    }
}

#[async_trait]
impl ConnectivityObserver for HttpConnectivity {
    async fn is_connected(&self) -> bool {
        let connected = match self.client.head(&self.probe_url).send().await {
            Ok(_) => true,
            Err(e) => {
                tracing::debug!("Connectivity probe failed: {}", e);
                false
            }
        };

        self.tx.send_if_modified(|current| {
            let changed = *current != connected;
            *current = connected;
            changed
        });
        connected
    }

    fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_watch_connectivity_notifies_changes() {
        let connectivity = WatchConnectivity::new(false);
        let mut rx = connectivity.subscribe();
        assert!(!connectivity.is_connected().await);

        connectivity.set_connected(true);
        rx.changed().await.unwrap();
        assert!(*rx.borrow());
        assert!(connectivity.is_connected().await);
    }

    #[tokio::test]
    async fn test_http_probe_counts_any_response_as_online() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let connectivity = HttpConnectivity::new(server.uri()).unwrap();
        assert!(connectivity.is_connected().await);
    }

    #[tokio::test]
    async fn test_http_probe_unreachable_is_offline() {
        // Port 9 (discard) on localhost is not listening in test environments
        let connectivity = HttpConnectivity::new("http://127.0.0.1:9").unwrap();
        let rx = connectivity.subscribe();
        assert!(!connectivity.is_connected().await);
        assert!(!*rx.borrow());
    }
}
