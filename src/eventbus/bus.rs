//! Event bus implementation.

use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use futures_util::FutureExt;
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::sync::mpsc;

use crate::observability::metrics;

/// An event that travels on a fixed topic.
pub trait Event: Clone + Send + Sync + 'static {
    const TOPIC: &'static str;
}

/// Errors returned when registering a subscriber.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BusError {
    #[error("event bus is closed, cannot subscribe to {0}")]
    Closed(&'static str),

    #[error("no async runtime available to deliver {0} events")]
    NoRuntime(&'static str),
}

type Payload = Arc<dyn Any + Send + Sync>;
type InlineHandler = Arc<dyn Fn(&Payload) + Send + Sync>;

#[derive(Clone)]
enum Subscriber {
    Inline(InlineHandler),
    Queued(mpsc::UnboundedSender<Payload>),
}

#[derive(Default)]
struct BusInner {
    topics: RwLock<HashMap<&'static str, Vec<Subscriber>>>,
    closed: AtomicBool,
}

/// Cheaply cloneable handle to a shared bus.
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver `event` to every subscriber of its topic.
    pub fn publish<E: Event>(&self, event: E) {
        metrics::record_bus_event(E::TOPIC);

        let subscribers = {
            let topics = self.inner.topics.read().unwrap_or_else(PoisonError::into_inner);
            topics.get(E::TOPIC).cloned().unwrap_or_default()
        };
        if subscribers.is_empty() {
            return;
        }

        let payload: Payload = Arc::new(event);
        for subscriber in subscribers {
            match subscriber {
                Subscriber::Inline(handler) => {
                    if catch_unwind(AssertUnwindSafe(|| handler(&payload))).is_err() {
                        tracing::error!(topic = E::TOPIC, "Event subscriber panicked");
                    }
                }
                Subscriber::Queued(tx) => {
                    // A closed channel means the subscription task is gone.
                    let _ = tx.send(payload.clone());
                }
            }
        }
    }

    /// Register a handler that runs on the publisher's task.
    pub fn subscribe<E, F>(&self, handler: F) -> Result<(), BusError>
    where
        E: Event,
        F: Fn(E) + Send + Sync + 'static,
    {
        let handler: InlineHandler = Arc::new(move |payload: &Payload| {
            if let Some(event) = payload.downcast_ref::<E>() {
                handler(event.clone());
            }
        });
        self.register(E::TOPIC, Subscriber::Inline(handler))
    }

    /// Register a handler served by its own task.
    ///
    /// Deliveries to one subscription never overlap; different subscriptions
    /// run independently of each other and of the publisher.
    pub fn subscribe_async<E, F, Fut>(&self, handler: F) -> Result<(), BusError>
    where
        E: Event,
        F: Fn(E) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let runtime = Handle::try_current().map_err(|_| BusError::NoRuntime(E::TOPIC))?;
        let (tx, mut rx) = mpsc::unbounded_channel::<Payload>();
        self.register(E::TOPIC, Subscriber::Queued(tx))?;

        runtime.spawn(async move {
            while let Some(payload) = rx.recv().await {
                let Some(event) = payload.downcast_ref::<E>().cloned() else {
                    continue;
                };
                let handler = &handler;
                let delivery = AssertUnwindSafe(async move { handler(event).await }).catch_unwind();
                if delivery.await.is_err() {
                    tracing::error!(topic = E::TOPIC, "Async event subscriber panicked");
                }
            }
        });

        Ok(())
    }

    /// Drop every subscription and reject new ones.
    pub fn close(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);
        self.inner
            .topics
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Number of subscriptions on `topic`.
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.inner
            .topics
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(topic)
            .map_or(0, Vec::len)
    }

    fn register(&self, topic: &'static str, subscriber: Subscriber) -> Result<(), BusError> {
        if self.is_closed() {
            return Err(BusError::Closed(topic));
        }
        self.inner
            .topics
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(topic)
            .or_default()
            .push(subscriber);
        Ok(())
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let topics = self.inner.topics.read().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("EventBus")
            .field("topics", &topics.keys().collect::<Vec<_>>())
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    #[derive(Debug, Clone, PartialEq)]
    struct Ping(u32);

    impl Event for Ping {
        const TOPIC: &'static str = "test-ping";
    }

    #[derive(Debug, Clone)]
    struct Other;

    impl Event for Other {
        const TOPIC: &'static str = "test-other";
    }

    #[test]
    fn test_inline_delivery_by_topic() {
        let bus = EventBus::new();
        let seen = Arc::new(AtomicUsize::new(0));
        let s = seen.clone();
        bus.subscribe(move |p: Ping| {
            s.fetch_add(p.0 as usize, Ordering::SeqCst);
        })
        .unwrap();

        bus.publish(Ping(2));
        bus.publish(Other);
        bus.publish(Ping(3));

        assert_eq!(seen.load(Ordering::SeqCst), 5);
    }

    #[test]
    fn test_inline_panic_is_isolated() {
        let bus = EventBus::new();
        let seen = Arc::new(AtomicUsize::new(0));
        bus.subscribe(|_: Ping| panic!("subscriber failure")).unwrap();
        let s = seen.clone();
        bus.subscribe(move |_: Ping| {
            s.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

        bus.publish(Ping(1));
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_async_delivery_is_ordered() {
        let bus = EventBus::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        bus.subscribe_async(move |p: Ping| {
            let tx = tx.clone();
            async move {
                // Later events must wait for earlier ones even when they finish faster.
                tokio::time::sleep(Duration::from_millis(10 * (3 - p.0 as u64))).await;
                let _ = tx.send(p.0);
            }
        })
        .unwrap();

        for i in 0..3 {
            bus.publish(Ping(i));
        }

        let mut received = Vec::new();
        for _ in 0..3 {
            received.push(
                tokio::time::timeout(Duration::from_secs(1), rx.recv())
                    .await
                    .unwrap()
                    .unwrap(),
            );
        }
        assert_eq!(received, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_async_panic_does_not_stop_subscription() {
        let bus = EventBus::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        bus.subscribe_async(move |p: Ping| {
            let tx = tx.clone();
            async move {
                if p.0 == 0 {
                    panic!("first delivery fails");
                }
                let _ = tx.send(p.0);
            }
        })
        .unwrap();

        bus.publish(Ping(0));
        bus.publish(Ping(7));

        let got = tokio::time::timeout(Duration::from_secs(1), rx.recv()).await.unwrap();
        assert_eq!(got, Some(7));
    }

    #[test]
    fn test_async_subscribe_requires_runtime() {
        let bus = EventBus::new();
        let err = bus.subscribe_async(|_: Ping| async {}).unwrap_err();
        assert_eq!(err, BusError::NoRuntime("test-ping"));
    }

    #[test]
    fn test_closed_bus_rejects_subscriptions() {
        let bus = EventBus::new();
        bus.subscribe(|_: Ping| {}).unwrap();
        bus.close();

        assert_eq!(bus.subscriber_count(Ping::TOPIC), 0);
        assert_eq!(bus.subscribe(|_: Ping| {}).unwrap_err(), BusError::Closed("test-ping"));
    }
}
