//! Contact record shape and validation of raw store rows.
//!
//! The record store serves loosely-typed JSON rows. `ContactRecord::from_row` is the single
//! place where a row becomes a typed record, so the aggregator only ever sees well-formed input.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// Serializes with the store's column names; rows are read only through `from_row`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContactRecord {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    #[serde(rename = "nombre_cliente")]
    pub client_name: String,
    #[serde(rename = "motivo_contacto")]
    pub contact_reason: String,
    #[serde(rename = "tipo_requerimiento")]
    pub requirement_type: String,
    /// Expected in 1..=10. `None` when the store had no integer value.
    #[serde(rename = "nivel_satisfaccion")]
    pub satisfaction_level: Option<i64>,
    pub client_id: Option<String>,
    pub business_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    #[error("row is not a JSON object")]
    NotAnObject,
    #[error("missing field '{0}'")]
    MissingField(&'static str),
    #[error("invalid field '{field}': {reason}")]
    InvalidField { field: &'static str, reason: String },
}

/// Column names as served by the store, followed by accepted aliases.
const ID: &[&str] = &["id"];
const CREATED_AT: &[&str] = &["created_at", "createdAt"];
const CLIENT_NAME: &[&str] = &["nombre_cliente", "client_name", "clientName"];
const CONTACT_REASON: &[&str] = &["motivo_contacto", "contact_reason", "contactReason"];
const REQUIREMENT_TYPE: &[&str] = &["tipo_requerimiento", "requirement_type", "requirementType"];
const SATISFACTION: &[&str] = &["nivel_satisfaccion", "satisfaction_level", "satisfactionLevel"];
const CLIENT_ID: &[&str] = &["client_id", "clientId"];
const BUSINESS_ID: &[&str] = &["business_id", "businessId"];

fn field<'a>(obj: &'a serde_json::Map<String, Value>, names: &[&str]) -> Option<&'a Value> {
    names.iter().filter_map(|n| obj.get(*n)).find(|v| !v.is_null())
}

fn opt_text(obj: &serde_json::Map<String, Value>, names: &[&str]) -> Option<String> {
    match field(obj, names)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn as_integer(v: &Value) -> Option<i64> {
    match v {
        Value::Number(n) => n.as_i64().or_else(|| {
            // 5.0 counts as level 5; 5.5 matches no integer level
            n.as_f64().filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64).map(|f| f as i64)
        }),
        _ => None,
    }
}

impl ContactRecord {
    /// Validate one raw store row.
    ///
    /// `id`, `created_at` and `tipo_requerimiento` are required. A satisfaction level that is
    /// missing, null, textual or fractional is kept as `None` rather than rejecting the row.
    pub fn from_row(row: &Value) -> Result<ContactRecord, RecordError> {
        let Value::Object(obj) = row else { return Err(RecordError::NotAnObject); };

        let id = match field(obj, ID) {
            None => return Err(RecordError::MissingField("id")),
            Some(Value::String(s)) => s.trim().parse::<i64>().map_err(|e| RecordError::InvalidField { field: "id", reason: e.to_string() })?,
            Some(v) => as_integer(v).ok_or_else(|| RecordError::InvalidField { field: "id", reason: format!("expected integer, got {}", v) })?,
        };

        let created_at = match field(obj, CREATED_AT) {
            None => return Err(RecordError::MissingField("created_at")),
            Some(Value::String(s)) => parse_timestamp(s).ok_or_else(|| RecordError::InvalidField { field: "created_at", reason: format!("unrecognised timestamp '{}'", s) })?,
            Some(v) => return Err(RecordError::InvalidField { field: "created_at", reason: format!("expected string, got {}", v) }),
        };

        let requirement_type = match field(obj, REQUIREMENT_TYPE) {
            None => return Err(RecordError::MissingField("tipo_requerimiento")),
            Some(Value::String(s)) => s.clone(),
            Some(v) => return Err(RecordError::InvalidField { field: "tipo_requerimiento", reason: format!("expected string, got {}", v) }),
        };

        Ok(ContactRecord {
            id,
            created_at,
            client_name: opt_text(obj, CLIENT_NAME).unwrap_or_default(),
            contact_reason: opt_text(obj, CONTACT_REASON).unwrap_or_default(),
            requirement_type,
            satisfaction_level: field(obj, SATISFACTION).and_then(as_integer),
            client_id: opt_text(obj, CLIENT_ID),
            business_id: field(obj, BUSINESS_ID).and_then(as_integer),
        })
    }
}

/// Parse the timestamp shapes a store may emit. Naive values are taken as UTC.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    // Postgres text output: "2024-05-01 10:00:00.123+00"
    if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f%#z") {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(ndt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(ndt.and_utc());
    }
    if let Ok(ndt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return Some(ndt.and_utc());
    }
    if let Ok(nd) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return nd.and_hms_opt(0, 0, 0).map(|ndt| ndt.and_utc());
    }
    None
}
