//! Consumer session history.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::eventbus::{BusError, EventBus};
use crate::events::{ConnectionSessionEvent, ConnectionStatisticsEvent};
use crate::storage::store::PersistentStore;
use crate::storage::StorageError;

const BUCKET: &str = "session-history";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub session_id: String,
    pub consumer_id: String,
    pub provider_id: String,
    pub service_type: String,
    pub provider_country: String,
    pub status: SessionStatus,
    pub started_at: u64,
    pub ended_at: Option<u64>,
    pub bytes_received: u64,
    pub bytes_sent: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionStatus {
    New,
    Completed,
}

/// Persists sessions as they are created, updated and destroyed.
pub struct SessionStorage {
    store: Arc<dyn PersistentStore>,
}

impl SessionStorage {
    pub fn new(store: Arc<dyn PersistentStore>) -> Self {
        Self { store }
    }

    pub fn subscribe(self: &Arc<Self>, bus: &EventBus) -> Result<(), BusError> {
        let storage = self.clone();
        bus.subscribe_async(move |event: ConnectionSessionEvent| {
            let storage = storage.clone();
            async move { storage.handle_session_event(&event) }
        })?;

        let storage = self.clone();
        bus.subscribe_async(move |event: ConnectionStatisticsEvent| {
            let storage = storage.clone();
            async move { storage.handle_statistics_event(&event) }
        })
    }

    pub fn handle_session_event(&self, event: &ConnectionSessionEvent) {
        let info = &event.session_info;
        if !info.is_active() {
            return;
        }

        let result = match event.status.as_str() {
            ConnectionSessionEvent::CREATED => self.save(&SessionRecord {
                session_id: info.session_id.clone(),
                consumer_id: info.consumer_id.clone(),
                provider_id: info.provider_id().to_string(),
                service_type: info.service_type().to_string(),
                provider_country: info.provider_country().to_string(),
                status: SessionStatus::New,
                started_at: unix_now(),
                ended_at: None,
                bytes_received: 0,
                bytes_sent: 0,
            }),
            ConnectionSessionEvent::DESTROYED => self.update(&info.session_id, |record| {
                record.status = SessionStatus::Completed;
                record.ended_at = Some(unix_now());
            }),
            _ => Ok(()),
        };

        if let Err(e) = result {
            tracing::warn!(session_id = %info.session_id, error = %e, "Failed to persist session");
        }
    }

    pub fn handle_statistics_event(&self, event: &ConnectionStatisticsEvent) {
        if !event.session_info.is_active() {
            return;
        }
        let stats = event.stats;
        let result = self.update(&event.session_info.session_id, |record| {
            record.bytes_received = stats.bytes_received;
            record.bytes_sent = stats.bytes_sent;
        });
        if let Err(e) = result {
            tracing::warn!(error = %e, "Failed to persist session statistics");
        }
    }

    pub fn get(&self, session_id: &str) -> Result<Option<SessionRecord>, StorageError> {
        self.store
            .get(BUCKET, session_id)?
            .map(serde_json::from_value)
            .transpose()
            .map_err(StorageError::from)
    }

    pub fn all(&self) -> Result<Vec<SessionRecord>, StorageError> {
        self.store
            .get_all(BUCKET)?
            .into_iter()
            .map(|(_, value)| serde_json::from_value(value).map_err(StorageError::from))
            .collect()
    }

    fn save(&self, record: &SessionRecord) -> Result<(), StorageError> {
        self.store
            .put(BUCKET, &record.session_id, serde_json::to_value(record)?)
    }

    fn update(
        &self,
        session_id: &str,
        change: impl FnOnce(&mut SessionRecord),
    ) -> Result<(), StorageError> {
        match self.get(session_id)? {
            Some(mut record) => {
                change(&mut record);
                self.save(&record)
            }
            None => Ok(()),
        }
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{ConnectionStatistics, SessionInfo};
    use crate::storage::JsonStore;

    fn session(id: &str) -> SessionInfo {
        SessionInfo {
            session_id: id.to_string(),
            consumer_id: "0xconsumer".to_string(),
            ..Default::default()
        }
    }

    fn storage() -> (tempfile::TempDir, SessionStorage) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(JsonStore::open(dir.path()).unwrap());
        (dir, SessionStorage::new(store))
    }

    #[test]
    fn test_session_lifecycle_is_recorded() {
        let (_dir, storage) = storage();
        storage.handle_session_event(&ConnectionSessionEvent {
            status: ConnectionSessionEvent::CREATED.to_string(),
            session_info: session("s1"),
        });
        storage.handle_statistics_event(&ConnectionStatisticsEvent {
            stats: ConnectionStatistics {
                bytes_received: 10,
                bytes_sent: 4,
            },
            session_info: session("s1"),
        });
        storage.handle_session_event(&ConnectionSessionEvent {
            status: ConnectionSessionEvent::DESTROYED.to_string(),
            session_info: session("s1"),
        });

        let record = storage.get("s1").unwrap().unwrap();
        assert_eq!(record.status, SessionStatus::Completed);
        assert_eq!(record.bytes_received, 10);
        assert!(record.ended_at.is_some());
    }

    #[test]
    fn test_inactive_session_is_ignored() {
        let (_dir, storage) = storage();
        storage.handle_session_event(&ConnectionSessionEvent {
            status: ConnectionSessionEvent::CREATED.to_string(),
            session_info: SessionInfo::default(),
        });
        assert!(storage.all().unwrap().is_empty());
    }
}
