//! Storage layer for analysis records: in-memory and DuckDB backends.
//!
//! Every read and delete is scoped by owner. A record that belongs to someone
//! else is reported exactly like a record that does not exist, so callers can
//! never probe for other tenants' ids.

mod error;
mod memory;
pub use error::StoreError;
pub use memory::MemoryStore;

#[cfg(feature = "duckdb")]
mod duck;
#[cfg(feature = "duckdb")]
pub use duck::DuckStore;

use contractscan_core::{AnalysisRecord, OwnerId, RecordId};

/// Persistence collaborator for [`AnalysisRecord`]s.
///
/// Records are append-only: there is no update path, only create and
/// hard delete.
pub trait RecordStore: Send + Sync {
    /// Persist a new record. Fails with [`StoreError::Duplicate`] if the id is taken.
    fn create(&self, record: AnalysisRecord) -> Result<AnalysisRecord, StoreError>;

    /// Fetch a record by id, only if it is owned by `owner`.
    fn find_by_id(
        &self,
        owner: &OwnerId,
        id: &RecordId,
    ) -> Result<Option<AnalysisRecord>, StoreError>;

    /// All records owned by `owner`, newest first.
    fn find_all_by_owner(&self, owner: &OwnerId) -> Result<Vec<AnalysisRecord>, StoreError>;

    /// Delete a record owned by `owner`. Returns `false` if nothing was deleted.
    fn delete_by_id(&self, owner: &OwnerId, id: &RecordId) -> Result<bool, StoreError>;
}

impl<S: RecordStore + ?Sized> RecordStore for std::sync::Arc<S> {
    fn create(&self, record: AnalysisRecord) -> Result<AnalysisRecord, StoreError> {
        (**self).create(record)
    }

    fn find_by_id(
        &self,
        owner: &OwnerId,
        id: &RecordId,
    ) -> Result<Option<AnalysisRecord>, StoreError> {
        (**self).find_by_id(owner, id)
    }

    fn find_all_by_owner(&self, owner: &OwnerId) -> Result<Vec<AnalysisRecord>, StoreError> {
        (**self).find_all_by_owner(owner)
    }

    fn delete_by_id(&self, owner: &OwnerId, id: &RecordId) -> Result<bool, StoreError> {
        (**self).delete_by_id(owner, id)
    }
}
