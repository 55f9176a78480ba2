//! Core node runtime.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::api::server::ApiError;
use crate::api::ApiServer;
use crate::eventbus::EventBus;
use crate::events::{NodeEvent, NodeStatus};

/// Owns the API surface and announces node start and stop.
pub struct Node {
    api: Arc<dyn ApiServer>,
    bus: EventBus,
    running: AtomicBool,
}

impl Node {
    pub fn new(api: Arc<dyn ApiServer>, bus: EventBus) -> Self {
        Self {
            api,
            bus,
            running: AtomicBool::new(false),
        }
    }

    pub fn start(&self) -> Result<(), ApiError> {
        self.api.start()?;
        self.running.store(true, Ordering::SeqCst);
        self.bus.publish(NodeEvent {
            status: NodeStatus::Started,
        });
        tracing::info!(api = ?self.api.local_addr(), "Node started");
        Ok(())
    }

    /// Stop the API and announce it. Killing a node that never started only releases the API.
    pub async fn kill(&self) -> Result<(), ApiError> {
        let result = self.api.stop().await;
        if self.running.swap(false, Ordering::SeqCst) {
            self.bus.publish(NodeEvent {
                status: NodeStatus::Stopped,
            });
            tracing::info!("Node stopped");
        }
        result
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn api_address(&self) -> Option<SocketAddr> {
        self.api.local_addr()
    }
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("api", &self.api_address())
            .field("running", &self.is_running())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::NoopApiServer;
    use std::sync::Mutex;

    #[tokio::test]
    async fn test_start_and_kill_publish_status() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = seen.clone();
        bus.subscribe(move |e: NodeEvent| s.lock().unwrap().push(e.status)).unwrap();

        let node = Node::new(Arc::new(NoopApiServer), bus);
        node.start().unwrap();
        assert!(node.is_running());
        node.kill().await.unwrap();
        node.kill().await.unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![NodeStatus::Started, NodeStatus::Stopped]);
        assert_eq!(node.api_address(), None);
    }
}
