//! In-process record store.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use contractscan_core::{AnalysisRecord, OwnerId, RecordId};
use tracing::debug;

use crate::{RecordStore, StoreError};

/// Volatile store backed by a `HashMap`. Used in tests and for one-shot runs
/// that do not need records to outlive the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<RecordId, AnalysisRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of records across all owners.
    pub fn len(&self) -> usize {
        self.read().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<RecordId, AnalysisRecord>>, StoreError> {
        self.records
            .read()
            .map_err(|e| StoreError::Other(format!("lock poisoned: {e}")))
    }

    fn write(
        &self,
    ) -> Result<RwLockWriteGuard<'_, HashMap<RecordId, AnalysisRecord>>, StoreError> {
        self.records
            .write()
            .map_err(|e| StoreError::Other(format!("lock poisoned: {e}")))
    }
}

impl RecordStore for MemoryStore {
    fn create(&self, record: AnalysisRecord) -> Result<AnalysisRecord, StoreError> {
        let mut records = self.write()?;
        if records.contains_key(&record.id) {
            return Err(StoreError::Duplicate(record.id));
        }
        debug!(id = %record.id, owner = %record.owner_id, "record created");
        records.insert(record.id, record.clone());
        Ok(record)
    }

    fn find_by_id(
        &self,
        owner: &OwnerId,
        id: &RecordId,
    ) -> Result<Option<AnalysisRecord>, StoreError> {
        let records = self.read()?;
        Ok(records.get(id).filter(|r| r.is_owned_by(owner)).cloned())
    }

    fn find_all_by_owner(&self, owner: &OwnerId) -> Result<Vec<AnalysisRecord>, StoreError> {
        let records = self.read()?;
        let mut owned: Vec<AnalysisRecord> = records
            .values()
            .filter(|r| r.is_owned_by(owner))
            .cloned()
            .collect();
        owned.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(owned)
    }

    fn delete_by_id(&self, owner: &OwnerId, id: &RecordId) -> Result<bool, StoreError> {
        let mut records = self.write()?;
        match records.get(id) {
            Some(r) if r.is_owned_by(owner) => {
                records.remove(id);
                debug!(id = %id, owner = %owner, "record deleted");
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use contractscan_core::{AnalysisResult, Jurisdiction, RequestMeta, assemble};

    fn record(owner: &str) -> AnalysisRecord {
        let analysis = AnalysisResult {
            risk_score: 50,
            summary: "s".into(),
            clauses: vec![],
            missing_clauses: vec![],
            compliance_alerts: vec![],
        };
        assemble(
            analysis,
            RequestMeta {
                owner_id: OwnerId::new(owner),
                file_name: "lease.txt".into(),
                jurisdiction: Jurisdiction::Global,
                source_text: "The tenant shall pay rent monthly.".into(),
            },
        )
    }

    #[test]
    fn create_then_find() {
        let store = MemoryStore::new();
        let rec = store.create(record("alice")).unwrap();
        let found = store
            .find_by_id(&OwnerId::new("alice"), &rec.id)
            .unwrap()
            .expect("record should exist");
        assert_eq!(found, rec);
    }

    #[test]
    fn duplicate_id_rejected() {
        let store = MemoryStore::new();
        let rec = store.create(record("alice")).unwrap();
        let err = store.create(rec.clone()).unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(id) if id == rec.id));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn other_owner_cannot_read_or_delete() {
        let store = MemoryStore::new();
        let rec = store.create(record("alice")).unwrap();
        let bob = OwnerId::new("bob");

        assert!(store.find_by_id(&bob, &rec.id).unwrap().is_none());
        assert!(!store.delete_by_id(&bob, &rec.id).unwrap());
        assert!(store.find_all_by_owner(&bob).unwrap().is_empty());
        // Still there for the owner.
        assert!(
            store
                .find_by_id(&OwnerId::new("alice"), &rec.id)
                .unwrap()
                .is_some()
        );
    }

    #[test]
    fn delete_is_hard_and_idempotent() {
        let store = MemoryStore::new();
        let alice = OwnerId::new("alice");
        let rec = store.create(record("alice")).unwrap();

        assert!(store.delete_by_id(&alice, &rec.id).unwrap());
        assert!(store.find_by_id(&alice, &rec.id).unwrap().is_none());
        assert!(!store.delete_by_id(&alice, &rec.id).unwrap());
        assert!(store.is_empty());
    }

    #[test]
    fn list_is_newest_first_and_owner_scoped() {
        let store = MemoryStore::new();
        let mut older = record("alice");
        older.created_at = Utc::now() - Duration::hours(1);
        let older = store.create(older).unwrap();
        let newer = store.create(record("alice")).unwrap();
        store.create(record("bob")).unwrap();

        let list = store.find_all_by_owner(&OwnerId::new("alice")).unwrap();
        let ids: Vec<_> = list.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![newer.id, older.id]);
    }
}
