//! NAT read models.

use std::sync::{Arc, PoisonError, RwLock};

use serde::Serialize;

use crate::eventbus::{BusError, EventBus};
use crate::events::NatEvent;

/// Remembers the most recent NAT event.
#[derive(Debug, Default)]
pub struct NatTracker {
    last: RwLock<Option<NatEvent>>,
}

impl NatTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(self: &Arc<Self>, bus: &EventBus) -> Result<(), BusError> {
        let tracker = self.clone();
        bus.subscribe(move |event: NatEvent| tracker.consume(event))
    }

    pub fn consume(&self, event: NatEvent) {
        *self.last.write().unwrap_or_else(PoisonError::into_inner) = Some(event);
    }

    pub fn last_event(&self) -> Option<NatEvent> {
        self.last.read().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NatStatus {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl NatStatus {
    pub const NOT_FINISHED: &'static str = "not_finished";
    pub const SUCCESSFUL: &'static str = "successful";
    pub const FAILURE: &'static str = "failure";

    fn not_finished() -> Self {
        Self {
            status: Self::NOT_FINISHED,
            stage: None,
            error: None,
        }
    }
}

/// Traversal status as reported by the API, derived from the last stage outcome.
#[derive(Debug, Default)]
pub struct NatStatusTracker {
    status: RwLock<Option<NatStatus>>,
}

impl NatStatusTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(self: &Arc<Self>, bus: &EventBus) -> Result<(), BusError> {
        let tracker = self.clone();
        bus.subscribe(move |event: NatEvent| tracker.consume(&event))
    }

    pub fn consume(&self, event: &NatEvent) {
        let status = NatStatus {
            status: if event.successful {
                NatStatus::SUCCESSFUL
            } else {
                NatStatus::FAILURE
            },
            stage: Some(event.stage.clone()),
            error: event.error.clone(),
        };
        *self.status.write().unwrap_or_else(PoisonError::into_inner) = Some(status);
    }

    pub fn status(&self) -> NatStatus {
        self.status
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .unwrap_or_else(NatStatus::not_finished)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_follows_last_stage() {
        let bus = EventBus::new();
        let tracker = Arc::new(NatTracker::new());
        let status = Arc::new(NatStatusTracker::new());
        tracker.subscribe(&bus).unwrap();
        status.subscribe(&bus).unwrap();

        assert_eq!(status.status().status, NatStatus::NOT_FINISHED);

        bus.publish(NatEvent::failure(NatEvent::STAGE_PORT_MAPPING, "no gateway found"));
        assert_eq!(status.status().status, NatStatus::FAILURE);

        bus.publish(NatEvent::success(NatEvent::STAGE_HOLE_PUNCHING));
        let current = status.status();
        assert_eq!(current.status, NatStatus::SUCCESSFUL);
        assert_eq!(current.stage.as_deref(), Some("hole_punching"));
        assert!(tracker.last_event().unwrap().successful);
    }
}
