use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;

use parcel_core::TransferRecord;
use parcel_registry::error::RegistryError;
use parcel_registry::store::{DownloadGrant, TransferRegistry};

/// In-memory [`TransferRegistry`] backed by a [`DashMap`].
///
/// Expired entries read as absent but stay in the map until deleted, so
/// the reaper can enumerate them via [`scan_expired`] and pair each
/// metadata removal with a blob removal. Per-id atomicity comes from
/// DashMap's entry-level locking; unrelated ids live on different shards
/// and never contend.
///
/// [`scan_expired`]: TransferRegistry::scan_expired
#[derive(Debug, Default)]
pub struct MemoryTransferRegistry {
    records: DashMap<String, TransferRecord>,
}

impl MemoryTransferRegistry {
    /// Create a new, empty in-memory registry.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TransferRegistry for MemoryTransferRegistry {
    async fn put(&self, record: TransferRecord) -> Result<(), RegistryError> {
        self.records.insert(record.id.clone(), record);
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<TransferRecord>, RegistryError> {
        let Some(entry) = self.records.get(id) else {
            return Ok(None);
        };
        if entry.is_expired(Utc::now()) {
            return Ok(None);
        }
        Ok(Some(entry.clone()))
    }

    async fn begin_download(&self, id: &str) -> Result<DownloadGrant, RegistryError> {
        // `get_mut` holds the entry lock for the whole check-and-increment,
        // which is what makes concurrent grants on the same id serialize.
        let Some(mut entry) = self.records.get_mut(id) else {
            return Ok(DownloadGrant::NotFound);
        };
        if entry.is_expired(Utc::now()) {
            return Ok(DownloadGrant::NotFound);
        }
        if entry.is_exhausted() {
            return Ok(DownloadGrant::Exhausted);
        }

        entry.download_count += 1;
        let consumed_budget = entry
            .max_downloads
            .is_some_and(|max| entry.download_count >= max);

        Ok(DownloadGrant::Granted {
            record: entry.clone(),
            consumed_budget,
        })
    }

    async fn cancel_download(&self, id: &str) -> Result<(), RegistryError> {
        if let Some(mut entry) = self.records.get_mut(id) {
            entry.download_count = entry.download_count.saturating_sub(1);
        }
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<bool, RegistryError> {
        Ok(self.records.remove(id).is_some())
    }

    async fn list_active(&self) -> Result<Vec<TransferRecord>, RegistryError> {
        let now = Utc::now();
        Ok(self
            .records
            .iter()
            .filter(|entry| !entry.value().is_expired(now))
            .map(|entry| entry.value().clone())
            .collect())
    }

    async fn scan_expired(&self, now: DateTime<Utc>) -> Result<Vec<String>, RegistryError> {
        Ok(self
            .records
            .iter()
            .filter(|entry| entry.value().is_expired(now))
            .map(|entry| entry.key().clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Duration;
    use parcel_core::new_transfer_id;

    use super::*;

    fn record(ttl: Duration, max_downloads: Option<u32>) -> TransferRecord {
        let now = Utc::now();
        TransferRecord {
            id: new_transfer_id(),
            filename: "notes.txt".into(),
            size_bytes: 64,
            sender: None,
            password_hash: None,
            wrapped_key: "ENC[AES256-GCM,data:AAAA,iv:AAAA,tag:AAAA]".into(),
            created_at: now,
            expires_at: now + ttl,
            max_downloads,
            download_count: 0,
        }
    }

    #[tokio::test]
    async fn put_then_get() {
        let registry = MemoryTransferRegistry::new();
        let r = record(Duration::hours(1), None);
        let id = r.id.clone();
        registry.put(r).await.unwrap();

        let found = registry.get(&id).await.unwrap().unwrap();
        assert_eq!(found.id, id);
        assert_eq!(found.filename, "notes.txt");
    }

    #[tokio::test]
    async fn get_missing_returns_none() {
        let registry = MemoryTransferRegistry::new();
        assert!(registry.get("no-such-id").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn expired_record_reads_as_absent_but_scans() {
        let registry = MemoryTransferRegistry::new();
        let r = record(Duration::seconds(-1), None);
        let id = r.id.clone();
        registry.put(r).await.unwrap();

        assert!(registry.get(&id).await.unwrap().is_none());
        assert!(matches!(
            registry.begin_download(&id).await.unwrap(),
            DownloadGrant::NotFound
        ));
        assert!(registry.list_active().await.unwrap().is_empty());

        let expired = registry.scan_expired(Utc::now()).await.unwrap();
        assert_eq!(expired, vec![id.clone()]);

        // Physical removal is the reaper's job, via delete.
        assert!(registry.delete(&id).await.unwrap());
        assert!(registry.scan_expired(Utc::now()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn begin_download_increments_until_exhausted() {
        let registry = MemoryTransferRegistry::new();
        let r = record(Duration::hours(1), Some(2));
        let id = r.id.clone();
        registry.put(r).await.unwrap();

        let grant = registry.begin_download(&id).await.unwrap();
        let DownloadGrant::Granted {
            record,
            consumed_budget,
        } = grant
        else {
            panic!("expected grant");
        };
        assert_eq!(record.download_count, 1);
        assert!(!consumed_budget);

        let grant = registry.begin_download(&id).await.unwrap();
        let DownloadGrant::Granted {
            record,
            consumed_budget,
        } = grant
        else {
            panic!("expected grant");
        };
        assert_eq!(record.download_count, 2);
        assert!(consumed_budget);

        assert!(matches!(
            registry.begin_download(&id).await.unwrap(),
            DownloadGrant::Exhausted
        ));
    }

    #[tokio::test]
    async fn unbounded_budget_never_exhausts() {
        let registry = MemoryTransferRegistry::new();
        let r = record(Duration::hours(1), None);
        let id = r.id.clone();
        registry.put(r).await.unwrap();

        for n in 1..=50u32 {
            let DownloadGrant::Granted {
                record,
                consumed_budget,
            } = registry.begin_download(&id).await.unwrap()
            else {
                panic!("expected grant");
            };
            assert_eq!(record.download_count, n);
            assert!(!consumed_budget);
        }
    }

    #[tokio::test]
    async fn cancel_download_releases_a_slot() {
        let registry = MemoryTransferRegistry::new();
        let r = record(Duration::hours(1), Some(1));
        let id = r.id.clone();
        registry.put(r).await.unwrap();

        assert!(matches!(
            registry.begin_download(&id).await.unwrap(),
            DownloadGrant::Granted { .. }
        ));
        assert!(matches!(
            registry.begin_download(&id).await.unwrap(),
            DownloadGrant::Exhausted
        ));

        registry.cancel_download(&id).await.unwrap();
        assert!(matches!(
            registry.begin_download(&id).await.unwrap(),
            DownloadGrant::Granted { .. }
        ));
    }

    #[tokio::test]
    async fn concurrent_grants_on_single_slot_yield_one_winner() {
        let registry = Arc::new(MemoryTransferRegistry::new());
        let r = record(Duration::hours(1), Some(1));
        let id = r.id.clone();
        registry.put(r).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..16 {
            let registry = Arc::clone(&registry);
            let id = id.clone();
            handles.push(tokio::spawn(async move {
                registry.begin_download(&id).await.unwrap()
            }));
        }

        let mut granted = 0;
        for handle in handles {
            if let DownloadGrant::Granted { .. } = handle.await.unwrap() {
                granted += 1;
            }
        }
        assert_eq!(granted, 1, "exactly one concurrent grant may win");
    }

    #[tokio::test]
    async fn delete_returns_false_for_missing() {
        let registry = MemoryTransferRegistry::new();
        assert!(!registry.delete("never-stored").await.unwrap());
    }

    #[tokio::test]
    async fn list_active_skips_expired() {
        let registry = MemoryTransferRegistry::new();
        let live = record(Duration::hours(1), None);
        let dead = record(Duration::seconds(-5), None);
        let live_id = live.id.clone();
        registry.put(live).await.unwrap();
        registry.put(dead).await.unwrap();

        let active = registry.list_active().await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, live_id);
    }
}
