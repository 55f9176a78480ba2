//! Schema migrations.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::storage::store::{write_file, Buckets, JsonStore};
use crate::storage::StorageError;

const META_BUCKET: &str = "migrations";

/// A named, run-once change to the stored data.
#[derive(Clone, Copy)]
pub struct Migration {
    pub name: &'static str,
    pub apply: fn(&mut Buckets) -> Result<(), String>,
}

impl std::fmt::Debug for Migration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Migration").field("name", &self.name).finish()
    }
}

/// Every migration ever shipped, oldest first. Never reorder.
pub const HISTORY: &[Migration] = &[
    Migration {
        name: "0001-session-history-bucket",
        apply: create_session_history,
    },
    Migration {
        name: "0002-drop-identity-cache",
        apply: drop_identity_cache,
    },
];

fn create_session_history(buckets: &mut Buckets) -> Result<(), String> {
    buckets.entry("session-history".to_string()).or_default();
    Ok(())
}

fn drop_identity_cache(buckets: &mut Buckets) -> Result<(), String> {
    buckets.remove("identity-cache");
    Ok(())
}

impl JsonStore {
    /// Apply every migration not yet recorded. Returns how many ran.
    pub fn run_migrations(&self, migrations: &[Migration]) -> Result<usize, StorageError> {
        self.with_buckets(|buckets| {
            let mut applied = 0;
            for migration in migrations {
                let done = buckets
                    .get(META_BUCKET)
                    .is_some_and(|meta| meta.contains_key(migration.name));
                if done {
                    continue;
                }

                (migration.apply)(buckets).map_err(|reason| StorageError::Migration {
                    name: migration.name,
                    reason,
                })?;
                buckets
                    .entry(META_BUCKET.to_string())
                    .or_insert_with(BTreeMap::new)
                    .insert(migration.name.to_string(), Value::Bool(true));
                tracing::info!(migration = migration.name, "Storage migration applied");
                applied += 1;
            }
            if applied > 0 {
                write_file(self.path(), buckets)?;
            }
            Ok(applied)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::store::PersistentStore;

    fn failing(_: &mut Buckets) -> Result<(), String> {
        Err("boom".to_string())
    }

    #[test]
    fn test_history_runs_once() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::open(dir.path()).unwrap();
        store.put("identity-cache", "x", Value::Null).unwrap();

        assert_eq!(store.run_migrations(HISTORY).unwrap(), HISTORY.len());
        assert_eq!(store.get_all("identity-cache").unwrap().len(), 0);
        store.close().unwrap();

        let reopened = JsonStore::open(dir.path()).unwrap();
        assert_eq!(reopened.run_migrations(HISTORY).unwrap(), 0);
    }

    #[test]
    fn test_failed_migration_reports_name() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::open(dir.path()).unwrap();
        let broken = [Migration { name: "0099-broken", apply: failing }];

        match store.run_migrations(&broken) {
            Err(StorageError::Migration { name, reason }) => {
                assert_eq!(name, "0099-broken");
                assert_eq!(reason, "boom");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
