//! DuckDB-backed record store.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, SecondsFormat, Utc};
use contractscan_core::{AnalysisRecord, Jurisdiction, OwnerId, RecordId};
use duckdb::{Connection, params};
use tracing::{debug, info};

use crate::{RecordStore, StoreError};

const CREATE_TABLE: &str = "CREATE TABLE IF NOT EXISTS analysis_records (
    id             VARCHAR PRIMARY KEY,
    owner_id       VARCHAR NOT NULL,
    file_name      VARCHAR NOT NULL,
    jurisdiction   VARCHAR NOT NULL,
    source_text    VARCHAR NOT NULL,
    analysis       VARCHAR NOT NULL,
    created_at     VARCHAR NOT NULL
)";

const SELECT_COLUMNS: &str =
    "SELECT id, owner_id, file_name, jurisdiction, source_text, analysis, created_at \
     FROM analysis_records";

/// DuckDB store for analysis records.
///
/// One row per record; the validated analysis is stored as JSON text and
/// `created_at` as a fixed-width RFC 3339 string so that string order is
/// chronological order.
///
/// Supports both in-memory (ephemeral) and persistent (file-backed) modes.
pub struct DuckStore {
    conn: Mutex<Connection>,
}

/// Column values as read from DuckDB, before decoding.
struct RawRecord {
    id: String,
    owner_id: String,
    file_name: String,
    jurisdiction: String,
    source_text: String,
    analysis: String,
    created_at: String,
}

impl DuckStore {
    /// Open an in-memory DuckDB database.
    pub fn open() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    /// Open or create a persistent DuckDB database at the given path.
    pub fn open_persistent(path: &Path) -> Result<Self, StoreError> {
        let store = Self::init(Connection::open(path)?)?;
        info!(path = %path.display(), "opened record store");
        Ok(store)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(CREATE_TABLE)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Number of stored records across all owners.
    pub fn count(&self) -> Result<usize, StoreError> {
        let conn = self.lock()?;
        let n: i64 =
            conn.query_row("SELECT count(*)::BIGINT FROM analysis_records", [], |row| {
                row.get(0)
            })?;
        Ok(n as usize)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|e| StoreError::Other(format!("mutex poisoned: {e}")))
    }

    fn query_records(
        conn: &Connection,
        sql: &str,
        args: &[&str],
    ) -> Result<Vec<AnalysisRecord>, StoreError> {
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(duckdb::params_from_iter(args.iter()), |row| {
            Ok(RawRecord {
                id: row.get(0)?,
                owner_id: row.get(1)?,
                file_name: row.get(2)?,
                jurisdiction: row.get(3)?,
                source_text: row.get(4)?,
                analysis: row.get(5)?,
                created_at: row.get(6)?,
            })
        })?;

        let mut records = Vec::new();
        for raw in rows {
            records.push(decode(raw?)?);
        }
        Ok(records)
    }
}

fn decode(raw: RawRecord) -> Result<AnalysisRecord, StoreError> {
    let id: RecordId = raw
        .id
        .parse()
        .map_err(|e| StoreError::Other(format!("invalid record id {:?}: {e}", raw.id)))?;
    let jurisdiction = Jurisdiction::from_id(&raw.jurisdiction)
        .ok_or_else(|| StoreError::Other(format!("unknown jurisdiction {:?}", raw.jurisdiction)))?;
    let created_at = DateTime::parse_from_rfc3339(&raw.created_at)
        .map_err(|e| StoreError::Other(format!("invalid created_at {:?}: {e}", raw.created_at)))?
        .with_timezone(&Utc);

    Ok(AnalysisRecord {
        id,
        owner_id: OwnerId::new(raw.owner_id),
        file_name: raw.file_name,
        jurisdiction,
        source_text: raw.source_text,
        analysis: serde_json::from_str(&raw.analysis)?,
        created_at,
    })
}

fn encode_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

impl RecordStore for DuckStore {
    fn create(&self, record: AnalysisRecord) -> Result<AnalysisRecord, StoreError> {
        let conn = self.lock()?;
        let id = record.id.to_string();

        let existing: i64 = conn.query_row(
            "SELECT count(*)::BIGINT FROM analysis_records WHERE id = ?",
            [&id],
            |row| row.get(0),
        )?;
        if existing > 0 {
            return Err(StoreError::Duplicate(record.id));
        }

        let analysis = serde_json::to_string(&record.analysis)?;
        conn.execute(
            "INSERT INTO analysis_records
                (id, owner_id, file_name, jurisdiction, source_text, analysis, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
            params![
                id,
                record.owner_id.as_str(),
                record.file_name,
                record.jurisdiction.as_str(),
                record.source_text,
                analysis,
                encode_timestamp(&record.created_at),
            ],
        )?;
        debug!(id = %record.id, owner = %record.owner_id, "record created");
        Ok(record)
    }

    fn find_by_id(
        &self,
        owner: &OwnerId,
        id: &RecordId,
    ) -> Result<Option<AnalysisRecord>, StoreError> {
        let conn = self.lock()?;
        let sql = format!("{SELECT_COLUMNS} WHERE id = ? AND owner_id = ?");
        let id = id.to_string();
        let mut records = Self::query_records(&conn, &sql, &[&id, owner.as_str()])?;
        Ok(records.pop())
    }

    fn find_all_by_owner(&self, owner: &OwnerId) -> Result<Vec<AnalysisRecord>, StoreError> {
        let conn = self.lock()?;
        let sql = format!("{SELECT_COLUMNS} WHERE owner_id = ? ORDER BY created_at DESC, id");
        Self::query_records(&conn, &sql, &[owner.as_str()])
    }

    fn delete_by_id(&self, owner: &OwnerId, id: &RecordId) -> Result<bool, StoreError> {
        let conn = self.lock()?;
        let deleted = conn.execute(
            "DELETE FROM analysis_records WHERE id = ? AND owner_id = ?",
            params![id.to_string(), owner.as_str()],
        )?;
        if deleted > 0 {
            debug!(id = %id, owner = %owner, "record deleted");
        }
        Ok(deleted > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use contractscan_core::{
        AnalysisResult, Clause, ClauseStatus, MissingClauseFinding, RequestMeta, RiskLevel,
        assemble,
    };

    fn record(owner: &str) -> AnalysisRecord {
        let analysis = AnalysisResult {
            risk_score: 64,
            summary: "Employment agreement with a broad non-compete.".into(),
            clauses: vec![Clause {
                title: "Non-Compete".into(),
                text: "For 24 months after termination...".into(),
                risk: RiskLevel::High,
                explanation: "Void under Section 27.".into(),
            }],
            missing_clauses: vec![MissingClauseFinding {
                clause_name: "Arbitration".into(),
                status: ClauseStatus::Missing,
                risk_score: 80,
                recommendation: "Add an arbitration clause.".into(),
            }],
            compliance_alerts: vec!["No Stamp Duty reference found.".into()],
        };
        assemble(
            analysis,
            RequestMeta {
                owner_id: OwnerId::new(owner),
                file_name: "employment.txt".into(),
                jurisdiction: Jurisdiction::India,
                source_text: "For 24 months after termination the Employee shall not...".into(),
            },
        )
    }

    #[test]
    fn open_in_memory_creates_table() {
        let store = DuckStore::open().unwrap();
        assert_eq!(store.count().unwrap(), 0);
    }

    #[test]
    fn create_and_find_roundtrip() {
        let store = DuckStore::open().unwrap();
        let rec = store.create(record("alice")).unwrap();
        let found = store
            .find_by_id(&OwnerId::new("alice"), &rec.id)
            .unwrap()
            .expect("record should exist");
        assert_eq!(found.id, rec.id);
        assert_eq!(found.jurisdiction, Jurisdiction::India);
        assert_eq!(found.analysis, rec.analysis);
        assert_eq!(
            encode_timestamp(&found.created_at),
            encode_timestamp(&rec.created_at)
        );
    }

    #[test]
    fn duplicate_id_rejected() {
        let store = DuckStore::open().unwrap();
        let rec = store.create(record("alice")).unwrap();
        assert!(matches!(
            store.create(rec.clone()),
            Err(StoreError::Duplicate(id)) if id == rec.id
        ));
    }

    #[test]
    fn ownership_enforced_on_read_and_delete() {
        let store = DuckStore::open().unwrap();
        let rec = store.create(record("alice")).unwrap();
        let bob = OwnerId::new("bob");

        assert!(store.find_by_id(&bob, &rec.id).unwrap().is_none());
        assert!(!store.delete_by_id(&bob, &rec.id).unwrap());
        assert_eq!(store.count().unwrap(), 1);

        assert!(store.delete_by_id(&OwnerId::new("alice"), &rec.id).unwrap());
        assert_eq!(store.count().unwrap(), 0);
    }

    #[test]
    fn list_newest_first() {
        let store = DuckStore::open().unwrap();
        let mut older = record("alice");
        older.created_at = Utc::now() - Duration::days(2);
        let older = store.create(older).unwrap();
        let newer = store.create(record("alice")).unwrap();
        store.create(record("bob")).unwrap();

        let ids: Vec<_> = store
            .find_all_by_owner(&OwnerId::new("alice"))
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec![newer.id, older.id]);
    }

    #[test]
    fn persistent_store_survives_reopen() {
        let tmp = tempfile::TempDir::new().unwrap();
        let db_path = tmp.path().join("records.duckdb");

        let store = DuckStore::open_persistent(&db_path).unwrap();
        let rec = store.create(record("alice")).unwrap();
        drop(store);

        let store = DuckStore::open_persistent(&db_path).unwrap();
        assert!(
            store
                .find_by_id(&OwnerId::new("alice"), &rec.id)
                .unwrap()
                .is_some()
        );
    }
}
