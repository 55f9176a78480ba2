//! Connectivity-edge reconnect fan-out.

use std::sync::{Arc, Mutex, PoisonError};

use futures_util::future::join_all;

use crate::eventbus::{BusError, EventBus};
use crate::events::{ConnectionState, ConnectionStateEvent};
use crate::net::Reconnectable;
use crate::observability::metrics;

/// Reconnects every registered client when the node goes online or offline.
///
/// Only `NotConnected` and `Connected` observations are tracked; the
/// intermediate `Connecting` and `Disconnecting` states are ignored, so a
/// blip such as Connected → Connecting → Connected never triggers.
pub struct ReconnectWatcher {
    clients: Vec<Arc<dyn Reconnectable>>,
    latest: Mutex<Option<ConnectionState>>,
}

impl ReconnectWatcher {
    /// Watcher that uses its first tracked observation as the baseline.
    pub fn new(clients: Vec<Arc<dyn Reconnectable>>) -> Self {
        Self {
            clients,
            latest: Mutex::new(None),
        }
    }

    /// Watcher with a known baseline state.
    pub fn starting_from(state: ConnectionState, clients: Vec<Arc<dyn Reconnectable>>) -> Self {
        Self {
            clients,
            latest: Mutex::new(Some(state)),
        }
    }

    pub fn subscribe(self: &Arc<Self>, bus: &EventBus) -> Result<(), BusError> {
        let watcher = self.clone();
        bus.subscribe_async(move |event: ConnectionStateEvent| {
            let watcher = watcher.clone();
            async move {
                watcher.observe(event.state).await;
            }
        })
    }

    /// Feed one observation. Returns true when it caused a fan-out.
    pub async fn observe(&self, state: ConnectionState) -> bool {
        if !self.is_edge(state) {
            return false;
        }

        tracing::info!(
            state = %state,
            clients = self.clients.len(),
            "Connectivity changed, reconnecting clients"
        );
        metrics::record_reconnect_fanout();
        self.fan_out().await;
        true
    }

    pub fn latest_state(&self) -> Option<ConnectionState> {
        *self.latest.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_edge(&self, state: ConnectionState) -> bool {
        if !matches!(state, ConnectionState::NotConnected | ConnectionState::Connected) {
            return false;
        }

        let mut latest = self.latest.lock().unwrap_or_else(PoisonError::into_inner);
        let previous = latest.replace(state);
        let became_connected =
            previous == Some(ConnectionState::NotConnected) && state == ConnectionState::Connected;
        let became_disconnected =
            previous == Some(ConnectionState::Connected) && state == ConnectionState::NotConnected;
        became_connected || became_disconnected
    }

    async fn fan_out(&self) {
        let results = join_all(self.clients.iter().map(|client| async move {
            (client.name(), client.reconnect().await)
        }))
        .await;

        for (name, result) in results {
            if let Err(e) = result {
                tracing::warn!(client = name, error = %e, "Client reconnect failed");
                metrics::record_reconnect_failure(name);
            }
        }
    }
}

impl std::fmt::Debug for ReconnectWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReconnectWatcher")
            .field("clients", &self.clients.iter().map(|c| c.name()).collect::<Vec<_>>())
            .field("latest", &self.latest_state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::ReconnectError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting {
        name: &'static str,
        calls: AtomicUsize,
        fail: bool,
    }

    fn clients(list: &[&Arc<Counting>]) -> Vec<Arc<dyn Reconnectable>> {
        list.iter().map(|c| (*c).clone() as Arc<dyn Reconnectable>).collect()
    }

    impl Counting {
        fn new(name: &'static str, fail: bool) -> Arc<Self> {
            Arc::new(Self {
                name,
                calls: AtomicUsize::new(0),
                fail,
            })
        }
    }

    #[async_trait]
    impl Reconnectable for Counting {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn reconnect(&self) -> Result<(), ReconnectError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(ReconnectError {
                    client: self.name,
                    reason: "refused".to_string(),
                })
            } else {
                Ok(())
            }
        }
    }

    #[tokio::test]
    async fn test_edges_trigger_fan_out() {
        use ConnectionState::*;

        let client = Counting::new("http", false);
        let watcher = ReconnectWatcher::new(clients(&[&client]));

        let mut triggered = Vec::new();
        for state in [NotConnected, Connecting, Connected, Connecting, NotConnected] {
            triggered.push(watcher.observe(state).await);
        }
        assert_eq!(triggered, vec![false, false, true, false, true]);
        assert_eq!(client.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_repeated_state_is_not_an_edge() {
        let client = Counting::new("http", false);
        let watcher = ReconnectWatcher::new(clients(&[&client]));

        watcher.observe(ConnectionState::Connected).await;
        watcher.observe(ConnectionState::Connected).await;
        assert_eq!(client.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_blip_does_not_retrigger() {
        let client = Counting::new("http", false);
        let watcher =
            ReconnectWatcher::starting_from(ConnectionState::Connected, clients(&[&client]));

        watcher.observe(ConnectionState::Disconnecting).await;
        watcher.observe(ConnectionState::Connecting).await;
        watcher.observe(ConnectionState::Connected).await;
        assert_eq!(client.calls.load(Ordering::SeqCst), 0);
        assert_eq!(watcher.latest_state(), Some(ConnectionState::Connected));
    }

    #[tokio::test]
    async fn test_one_failure_does_not_stop_others() {
        let failing = Counting::new("broker", true);
        let healthy = Counting::new("chain", false);
        let watcher = ReconnectWatcher::starting_from(
            ConnectionState::NotConnected,
            clients(&[&failing, &healthy]),
        );

        assert!(watcher.observe(ConnectionState::Connected).await);
        assert_eq!(failing.calls.load(Ordering::SeqCst), 1);
        assert_eq!(healthy.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_bus_delivery() {
        let client = Counting::new("http", false);
        let bus = EventBus::new();
        let watcher = Arc::new(ReconnectWatcher::starting_from(
            ConnectionState::NotConnected,
            clients(&[&client]),
        ));
        watcher.subscribe(&bus).unwrap();

        bus.publish(ConnectionStateEvent::bare(ConnectionState::Connected));

        for _ in 0..50 {
            if client.calls.load(Ordering::SeqCst) == 1 {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        panic!("reconnect was not triggered through the bus");
    }
}
