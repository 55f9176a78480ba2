//! Cached location lookups.

use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};

use crate::eventbus::{BusError, EventBus};
use crate::events::{ConnectionState, ConnectionStateEvent, NodeEvent, NodeStatus};
use crate::location::{Location, LocationError, LocationResolver, OriginResolver};

#[derive(Debug, Default)]
struct Cached {
    /// Location before any connection was established.
    origin: Option<Location>,
    current: Option<(Location, Instant)>,
}

/// Keeps the origin and current location fresh.
pub struct LocationCache {
    resolver: Arc<dyn LocationResolver>,
    ttl: Duration,
    cached: RwLock<Cached>,
}

impl LocationCache {
    pub fn new(resolver: Arc<dyn LocationResolver>, ttl: Duration) -> Self {
        Self {
            resolver,
            ttl,
            cached: RwLock::new(Cached::default()),
        }
    }

    /// Refresh on node start and whenever the connection settles.
    pub fn subscribe(self: &Arc<Self>, bus: &EventBus) -> Result<(), BusError> {
        let cache = self.clone();
        bus.subscribe_async(move |event: NodeEvent| {
            let cache = cache.clone();
            async move {
                if event.status == NodeStatus::Started {
                    cache.refresh_logged(true).await;
                }
            }
        })?;

        let cache = self.clone();
        bus.subscribe_async(move |event: ConnectionStateEvent| {
            let cache = cache.clone();
            async move {
                match event.state {
                    ConnectionState::NotConnected => cache.refresh_logged(true).await,
                    ConnectionState::Connected => cache.refresh_logged(false).await,
                    _ => {}
                }
            }
        })
    }

    /// Resolve again. With `as_origin`, the result also replaces the origin.
    pub async fn refresh(&self, as_origin: bool) -> Result<Location, LocationError> {
        let location = self.resolver.detect_location().await?;

        let mut cached = self.cached.write().unwrap_or_else(PoisonError::into_inner);
        if as_origin {
            cached.origin = Some(location.clone());
        }
        cached.current = Some((location.clone(), Instant::now()));
        Ok(location)
    }

    /// Current location, resolved again once the cached one is older than the TTL.
    pub async fn location(&self) -> Result<Location, LocationError> {
        if let Some(location) = self.fresh_current() {
            return Ok(location);
        }
        self.refresh(false).await
    }

    fn fresh_current(&self) -> Option<Location> {
        let cached = self.cached.read().unwrap_or_else(PoisonError::into_inner);
        cached
            .current
            .as_ref()
            .filter(|(_, at)| at.elapsed() < self.ttl)
            .map(|(location, _)| location.clone())
    }

    async fn refresh_logged(&self, as_origin: bool) {
        if let Err(e) = self.refresh(as_origin).await {
            tracing::warn!(resolver = self.resolver.name(), error = %e, "Location refresh failed");
        }
    }
}

impl OriginResolver for LocationCache {
    fn origin(&self) -> Result<Location, LocationError> {
        self.cached
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .origin
            .clone()
            .ok_or(LocationError::Unresolved)
    }
}

impl std::fmt::Debug for LocationCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocationCache")
            .field("resolver", &self.resolver.name())
            .field("ttl", &self.ttl)
            .finish()
    }
}
