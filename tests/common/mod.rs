//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use relay_node::config::{
    DirectoryOptions, LocationProvider, NetworkPreset, NodeOptions, QualityTransportKind,
};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

/// Options that bootstrap without any remote service: local network preset,
/// fixed location, no telemetry transport, API on an ephemeral port.
pub fn offline_options(root: &Path) -> NodeOptions {
    let mut options = NodeOptions::default();
    options.directories = DirectoryOptions::under(root);
    options.network.preset = NetworkPreset::Localnet;
    options.location.provider = LocationProvider::Manual;
    options.location.country = "LT".to_string();
    options.quality.transport = QualityTransportKind::None;
    options.api.port = 0;
    options.shutdown.step_timeout_secs = 2;
    options
}

/// Poll `condition` until it holds or `timeout` passes.
pub async fn eventually<F>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

/// Counts events at one level.
#[derive(Clone)]
pub struct LevelCounter {
    level: Level,
    count: Arc<AtomicUsize>,
}

impl LevelCounter {
    pub fn new(level: Level) -> Self {
        Self {
            level,
            count: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }
}

impl<S: Subscriber> Layer<S> for LevelCounter {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        if *event.metadata().level() == self.level {
            self.count.fetch_add(1, Ordering::SeqCst);
        }
    }
}
