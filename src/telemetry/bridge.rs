//! Domain event to telemetry conversion.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;

use crate::eventbus::{BusError, EventBus};
use crate::events::{
    ConnectionSessionEvent, ConnectionStateEvent, ConnectionStatisticsEvent, NodeEvent,
    ServiceProposal, SessionInfo,
};
use crate::location::OriginResolver;
use crate::observability::metrics;
use crate::telemetry::envelope::{
    self, NatMappingContext, SessionContext, SessionDataContext, SessionEventContext,
};
use crate::telemetry::{AppInfo, Envelope, EventContext, TelemetryTransport};

/// Call sites for NAT mapping outcomes.
#[async_trait]
pub trait NatEventReporter: Send + Sync {
    async fn report_mapping_success(&self, stage: &str, gateways: Vec<HashMap<String, String>>);

    async fn report_mapping_failure(
        &self,
        stage: &str,
        gateways: Vec<HashMap<String, String>>,
        error: &(dyn fmt::Display + Sync),
    );
}

/// Forwards domain events to the quality transport.
pub struct TelemetryBridge {
    transport: Arc<dyn TelemetryTransport>,
    app: AppInfo,
    origin: Arc<dyn OriginResolver>,
}

impl TelemetryBridge {
    pub fn new(
        transport: Arc<dyn TelemetryTransport>,
        app: AppInfo,
        origin: Arc<dyn OriginResolver>,
    ) -> Self {
        Self {
            transport,
            app,
            origin,
        }
    }

    /// Register on the five forwarded topics.
    pub fn subscribe(self: &Arc<Self>, bus: &EventBus) -> Result<(), BusError> {
        let bridge = self.clone();
        bus.subscribe_async(move |event: ConnectionStateEvent| {
            let bridge = bridge.clone();
            async move { bridge.send_connection_state(&event).await }
        })?;

        let bridge = self.clone();
        bus.subscribe_async(move |event: ConnectionSessionEvent| {
            let bridge = bridge.clone();
            async move { bridge.send_session_event(&event).await }
        })?;

        let bridge = self.clone();
        bus.subscribe_async(move |event: ConnectionStatisticsEvent| {
            let bridge = bridge.clone();
            async move { bridge.send_session_data(&event).await }
        })?;

        let bridge = self.clone();
        bus.subscribe_async(move |proposal: ServiceProposal| {
            let bridge = bridge.clone();
            async move { bridge.send_proposal(proposal).await }
        })?;

        let bridge = self.clone();
        bus.subscribe_async(move |event: NodeEvent| {
            let bridge = bridge.clone();
            async move { bridge.send_startup(&event).await }
        })
    }

    pub async fn send_session_data(&self, event: &ConnectionStatisticsEvent) {
        if !event.session_info.is_active() {
            return;
        }
        let context = SessionDataContext {
            rx: event.stats.bytes_received,
            tx: event.stats.bytes_sent,
            session: self.session_context(&event.session_info),
        };
        self.send(envelope::SESSION_DATA, EventContext::SessionData(context))
            .await;
    }

    pub async fn send_connection_state(&self, event: &ConnectionStateEvent) {
        if !event.session_info.is_active() {
            return;
        }
        let context = SessionEventContext {
            event: event.state.to_string(),
            session: self.session_context(&event.session_info),
        };
        self.send(envelope::SESSION_EVENT, EventContext::SessionEvent(context))
            .await;
    }

    pub async fn send_session_event(&self, event: &ConnectionSessionEvent) {
        if !event.session_info.is_active() {
            return;
        }
        let context = SessionEventContext {
            event: event.status.clone(),
            session: self.session_context(&event.session_info),
        };
        self.send(envelope::SESSION_EVENT, EventContext::SessionEvent(context))
            .await;
    }

    pub async fn send_startup(&self, event: &NodeEvent) {
        self.send(
            envelope::STARTUP,
            EventContext::Startup(event.status.as_str().to_string()),
        )
        .await;
    }

    pub async fn send_proposal(&self, proposal: ServiceProposal) {
        self.send(envelope::PROPOSAL_EVENT, EventContext::Proposal(proposal))
            .await;
    }

    fn session_context(&self, info: &SessionInfo) -> SessionContext {
        SessionContext {
            id: info.session_id.clone(),
            consumer: info.consumer_id.clone(),
            provider: info.provider_id().to_string(),
            service_type: info.service_type().to_string(),
            provider_country: info.provider_country().to_string(),
            consumer_country: self.origin_country(),
        }
    }

    fn origin_country(&self) -> String {
        match self.origin.origin() {
            Ok(location) => location.country,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to get consumer origin country");
                String::new()
            }
        }
    }

    async fn send(&self, event_name: &'static str, context: EventContext) {
        let envelope = Envelope {
            application: self.app.clone(),
            event_name,
            created_at: unix_now(),
            context,
        };

        let delivered = match self.transport.send_event(&envelope).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(
                    event = event_name,
                    transport = self.transport.name(),
                    error = %e,
                    "Failed to send telemetry event"
                );
                false
            }
        };
        metrics::record_telemetry_event(event_name, delivered);
    }
}

#[async_trait]
impl NatEventReporter for TelemetryBridge {
    async fn report_mapping_success(&self, stage: &str, gateways: Vec<HashMap<String, String>>) {
        let context = NatMappingContext {
            stage: stage.to_string(),
            successful: true,
            error_message: None,
            gateways,
        };
        self.send(envelope::NAT_MAPPING, EventContext::NatMapping(context))
            .await;
    }

    async fn report_mapping_failure(
        &self,
        stage: &str,
        gateways: Vec<HashMap<String, String>>,
        error: &(dyn fmt::Display + Sync),
    ) {
        let context = NatMappingContext {
            stage: stage.to_string(),
            successful: false,
            error_message: Some(error.to_string()),
            gateways,
        };
        self.send(envelope::NAT_MAPPING, EventContext::NatMapping(context))
            .await;
    }
}

impl fmt::Debug for TelemetryBridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelemetryBridge")
            .field("transport", &self.transport.name())
            .field("app", &self.app)
            .finish()
    }
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{ConnectionState, ConnectionStatistics, NodeStatus};
    use crate::location::{Location, LocationError};
    use crate::telemetry::TransportError;
    use std::sync::Mutex;

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

    struct FixedOrigin(Option<&'static str>);

    impl OriginResolver for FixedOrigin {
        fn origin(&self) -> Result<Location, LocationError> {
            self.0
                .map(|country| Location {
                    country: country.to_string(),
                    ..Default::default()
                })
                .ok_or(LocationError::Unresolved)
        }
    }

    fn bridge(origin: Option<&'static str>) -> (Arc<Recording>, TelemetryBridge) {
        let transport = Arc::new(Recording::default());
        let bridge = TelemetryBridge::new(
            transport.clone(),
            AppInfo::current("0.0.0-test"),
            Arc::new(FixedOrigin(origin)),
        );
        (transport, bridge)
    }

    fn active_session() -> SessionInfo {
        let mut info = SessionInfo {
            session_id: "session-1".to_string(),
            consumer_id: "0xconsumer".to_string(),
            ..Default::default()
        };
        info.proposal.provider_id = "0xprovider".to_string();
        info.proposal.service_type = "wireguard".to_string();
        info.proposal.location.country = "DE".to_string();
        info
    }

    #[tokio::test]
    async fn test_inactive_sessions_are_dropped() {
        let (transport, bridge) = bridge(Some("LT"));
        bridge
            .send_session_data(&ConnectionStatisticsEvent {
                stats: ConnectionStatistics::default(),
                session_info: SessionInfo::default(),
            })
            .await;
        bridge
            .send_connection_state(&ConnectionStateEvent::bare(ConnectionState::Connected))
            .await;
        assert!(transport.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_session_event_carries_origin_country() {
        let (transport, bridge) = bridge(Some("LT"));
        bridge
            .send_session_event(&ConnectionSessionEvent {
                status: ConnectionSessionEvent::CREATED.to_string(),
                session_info: active_session(),
            })
            .await;

        let sent = transport.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].event_name, "session_event");
        match &sent[0].context {
            EventContext::SessionEvent(context) => {
                assert_eq!(context.event, "Created");
                assert_eq!(context.session.consumer_country, "LT");
                assert_eq!(context.session.provider_country, "DE");
            }
            other => panic!("unexpected context: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_origin_sends_empty_country() {
        let (transport, bridge) = bridge(None);
        bridge
            .send_connection_state(&ConnectionStateEvent {
                state: ConnectionState::Connected,
                session_info: active_session(),
            })
            .await;

        let sent = transport.sent.lock().unwrap();
        match &sent[0].context {
            EventContext::SessionEvent(context) => {
                assert_eq!(context.event, "Connected");
                assert!(context.session.consumer_country.is_empty());
            }
            other => panic!("unexpected context: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_mapping_failure_carries_error_text() {
        let (transport, bridge) = bridge(Some("LT"));
        let gateways = vec![HashMap::from([("ip".to_string(), "10.0.0.1".to_string())])];
        bridge
            .report_mapping_failure("port_mapping", gateways, &"no gateway found")
            .await;

        let sent = transport.sent.lock().unwrap();
        assert_eq!(sent[0].event_name, "nat_mapping");
        assert_eq!(
            sent[0].context,
            EventContext::NatMapping(NatMappingContext {
                stage: "port_mapping".to_string(),
                successful: false,
                error_message: Some("no gateway found".to_string()),
                gateways: vec![HashMap::from([("ip".to_string(), "10.0.0.1".to_string())])],
            })
        );
    }

    #[tokio::test]
    async fn test_subscribed_bridge_forwards_startup() {
        let (transport, bridge) = bridge(Some("LT"));
        let bus = EventBus::new();
        Arc::new(bridge).subscribe(&bus).unwrap();

        bus.publish(NodeEvent {
            status: NodeStatus::Started,
        });

        for _ in 0..50 {
            if let Some(envelope) = transport.sent.lock().unwrap().first() {
                assert_eq!(envelope.event_name, "startup");
                assert_eq!(envelope.context, EventContext::Startup("Started".to_string()));
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        panic!("startup event was not forwarded");
    }
}
