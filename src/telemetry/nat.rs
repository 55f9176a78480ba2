//! NAT outcome reporting.

use std::sync::Arc;

use crate::eventbus::{BusError, EventBus};
use crate::events::NatEvent;
use crate::nat::GatewayLoader;
use crate::telemetry::NatEventReporter;

/// Turns NAT events from the bus into mapping reports with gateway details.
pub struct NatEventSender {
    reporter: Arc<dyn NatEventReporter>,
    gateways: Arc<GatewayLoader>,
}

impl NatEventSender {
    pub fn new(reporter: Arc<dyn NatEventReporter>, gateways: Arc<GatewayLoader>) -> Self {
        Self { reporter, gateways }
    }

    pub fn subscribe(self: &Arc<Self>, bus: &EventBus) -> Result<(), BusError> {
        let sender = self.clone();
        bus.subscribe_async(move |event: NatEvent| {
            let sender = sender.clone();
            async move { sender.consume(&event).await }
        })
    }

    pub async fn consume(&self, event: &NatEvent) {
        let gateways = self.gateways.descriptors().await;
        if event.successful {
            self.reporter
                .report_mapping_success(&event.stage, gateways)
                .await;
        } else {
            let error = event.error.as_deref().unwrap_or("unknown error");
            self.reporter
                .report_mapping_failure(&event.stage, gateways, &error)
                .await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::fmt;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        reports: Mutex<Vec<(String, bool, Option<String>)>>,
    }

    #[async_trait]
    impl NatEventReporter for Recorder {
        async fn report_mapping_success(
            &self,
            stage: &str,
            _gateways: Vec<HashMap<String, String>>,
        ) {
            self.reports.lock().unwrap().push((stage.to_string(), true, None));
        }

        async fn report_mapping_failure(
            &self,
            stage: &str,
            _gateways: Vec<HashMap<String, String>>,
            error: &(dyn fmt::Display + Sync),
        ) {
            self.reports
                .lock()
                .unwrap()
                .push((stage.to_string(), false, Some(error.to_string())));
        }
    }

    #[tokio::test]
    async fn test_events_map_to_reports() {
        let recorder = Arc::new(Recorder::default());
        let sender = NatEventSender::new(
            recorder.clone(),
            Arc::new(GatewayLoader::with_source("/nonexistent")),
        );

        sender.consume(&NatEvent::success("port_mapping")).await;
        sender.consume(&NatEvent::failure("hole_punching", "timeout")).await;

        let reports = recorder.reports.lock().unwrap();
        assert_eq!(
            *reports,
            vec![
                ("port_mapping".to_string(), true, None),
                ("hole_punching".to_string(), false, Some("timeout".to_string())),
            ]
        );
    }
}
