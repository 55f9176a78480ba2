//! Telemetry delivery through a pluggable transport.

mod common;

use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use relay_node::events::{ConnectionStatistics, ConnectionStatisticsEvent, SessionInfo};
use relay_node::location::{Location, LocationError, OriginResolver};
use relay_node::telemetry::envelope::SESSION_DATA;
use relay_node::telemetry::{AppInfo, Envelope, TelemetryBridge, TelemetryTransport, TransportError};
use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;

use common::LevelCounter;

#[derive(Default)]
struct Recording {
    sent: Mutex<Vec<Envelope>>,
}

#[async_trait]
impl TelemetryTransport for Recording {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn send_event(&self, envelope: &Envelope) -> Result<(), TransportError> {
        self.sent.lock().unwrap().push(envelope.clone());
        Ok(())
    }
}

struct Failing;

#[async_trait]
impl TelemetryTransport for Failing {
    fn name(&self) -> &'static str {
        "failing"
    }

    async fn send_event(&self, _: &Envelope) -> Result<(), TransportError> {
        Err(TransportError::NotRunning)
    }
}

struct Origin;

impl OriginResolver for Origin {
    fn origin(&self) -> Result<Location, LocationError> {
        Ok(Location {
            country: "DE".to_string(),
            ..Default::default()
        })
    }
}

fn bridge(transport: Arc<dyn TelemetryTransport>) -> TelemetryBridge {
    TelemetryBridge::new(transport, AppInfo::current("test"), Arc::new(Origin))
}

fn statistics(session_id: &str) -> ConnectionStatisticsEvent {
    ConnectionStatisticsEvent {
        stats: ConnectionStatistics {
            bytes_received: 2048,
            bytes_sent: 512,
        },
        session_info: SessionInfo {
            session_id: session_id.to_string(),
            consumer_id: "0xconsumer".to_string(),
            ..Default::default()
        },
    }
}

fn unix_now() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs() as i64
}

#[tokio::test]
async fn test_inactive_session_sends_nothing() {
    let transport = Arc::new(Recording::default());
    let bridge = bridge(transport.clone());

    bridge.send_session_data(&statistics("")).await;

    assert!(transport.sent.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_active_session_sends_one_envelope() {
    let transport = Arc::new(Recording::default());
    let bridge = bridge(transport.clone());

    let before = unix_now();
    bridge.send_session_data(&statistics("session-1")).await;
    let after = unix_now();

    let sent = transport.sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].event_name, SESSION_DATA);
    assert!(sent[0].created_at >= before - 1 && sent[0].created_at <= after + 1);

    let json = serde_json::to_value(&sent[0]).unwrap();
    assert_eq!(json["eventName"], "session_data");
    assert_eq!(json["context"]["Rx"], 2048);
    assert_eq!(json["context"]["ConsumerCountry"], "DE");
}

#[tokio::test(flavor = "current_thread")]
async fn test_failed_send_logs_one_warning_each() {
    let warnings = LevelCounter::new(Level::WARN);
    let subscriber = tracing_subscriber::registry().with(warnings.clone());
    let _guard = tracing::subscriber::set_default(subscriber);

    let bridge = bridge(Arc::new(Failing));
    bridge.send_session_data(&statistics("session-1")).await;
    bridge.send_session_data(&statistics("session-2")).await;
    bridge.send_session_data(&statistics("")).await;

    assert_eq!(warnings.count(), 2);
}
