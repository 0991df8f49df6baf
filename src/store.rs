//! Record store boundary. Stores hand back validated `ContactRecord`s, newest first.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::FetchError;
use crate::metrics::ContactRecord;

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Full current snapshot of contact records ordered by `created_at` descending.
    async fn fetch_contact_records(&self) -> Result<Vec<ContactRecord>, FetchError>;
}

/// Outcome of validating a raw payload: accepted records plus the number of rejected rows.
#[derive(Debug, Clone, Default)]
pub struct ParsedRows {
    pub records: Vec<ContactRecord>,
    pub rejected: usize,
}

/// Validate every row of a JSON array payload. Rows that fail validation are skipped and
/// logged; a payload that is not an array is malformed as a whole.
pub fn parse_rows(payload: &Value) -> Result<ParsedRows, FetchError> {
    let rows = match payload {
        Value::Array(rows) => rows,
        // tolerate a {"data": [...]} envelope
        Value::Object(obj) => match obj.get("data") {
            Some(Value::Array(rows)) => rows,
            _ => return Err(FetchError::Malformed("expected an array of rows or a 'data' array".into())),
        },
        other => return Err(FetchError::Malformed(format!("expected an array of rows, got {}", type_name(other)))),
    };
    let mut out = ParsedRows { records: Vec::with_capacity(rows.len()), rejected: 0 };
    for (i, row) in rows.iter().enumerate() {
        match ContactRecord::from_row(row) {
            Ok(rec) => out.records.push(rec),
            Err(e) => {
                out.rejected += 1;
                warn!(target: "store", row = i, error = %e, "rejected contact row");
            }
        }
    }
    Ok(out)
}

fn type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn newest_first(records: &mut [ContactRecord]) {
    records.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
}

/// Reads the snapshot from a JSON file on every fetch.
pub struct JsonFileRecordStore {
    path: PathBuf,
}

impl JsonFileRecordStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self { Self { path: path.as_ref().to_path_buf() } }

    pub fn path(&self) -> &Path { &self.path }
}

#[async_trait]
impl RecordStore for JsonFileRecordStore {
    async fn fetch_contact_records(&self) -> Result<Vec<ContactRecord>, FetchError> {
        let bytes = tokio::fs::read(&self.path).await?;
        let payload: Value = serde_json::from_slice(&bytes).map_err(|e| FetchError::Malformed(e.to_string()))?;
        let parsed = parse_rows(&payload)?;
        let mut records = parsed.records;
        newest_first(&mut records);
        debug!(target: "store", path = %self.path.display(), accepted = records.len(), rejected = parsed.rejected, "fetched contact records");
        Ok(records)
    }
}

/// Serves a fixed snapshot held in memory.
#[derive(Default)]
pub struct MemoryRecordStore {
    records: parking_lot::RwLock<Vec<ContactRecord>>,
}

impl MemoryRecordStore {
    pub fn new(mut records: Vec<ContactRecord>) -> Self {
        newest_first(&mut records);
        Self { records: parking_lot::RwLock::new(records) }
    }

    pub fn replace(&self, mut records: Vec<ContactRecord>) {
        newest_first(&mut records);
        *self.records.write() = records;
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn fetch_contact_records(&self) -> Result<Vec<ContactRecord>, FetchError> {
        Ok(self.records.read().clone())
    }
}
