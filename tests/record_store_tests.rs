//! JSON file record store against real files on disk.

use anyhow::Result;
use tempfile::tempdir;

use contactdesk::error::FetchError;
use contactdesk::store::{JsonFileRecordStore, RecordStore};

#[tokio::test]
async fn reads_rows_newest_first_and_skips_invalid_ones() -> Result<()> {
    let tmp = tempdir()?;
    let path = tmp.path().join("clientes.json");
    std::fs::write(
        &path,
        r#"[
            {"id": 1, "created_at": "2024-05-11 10:00:00+00", "nombre_cliente": "Ana", "motivo_contacto": "factura", "tipo_requerimiento": "facturación", "nivel_satisfaccion": 7, "client_id": "c-1", "business_id": 3},
            {"id": 2, "created_at": "2024-05-13T08:15:00.123Z", "tipo_requerimiento": "soporte", "nivel_satisfaccion": "8"},
            {"id": 3, "created_at": "not a date", "tipo_requerimiento": "ventas"},
            {"id": 4, "created_at": "2024-05-12", "tipo_requerimiento": "ventas", "nivel_satisfaccion": 5.0}
        ]"#,
    )?;

    let store = JsonFileRecordStore::new(&path);
    let records = store.fetch_contact_records().await?;
    let ids: Vec<i64> = records.iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![2, 4, 1]);
    assert_eq!(records[0].satisfaction_level, None);
    assert_eq!(records[1].satisfaction_level, Some(5));
    assert_eq!(records[2].client_name, "Ana");
    assert_eq!(records[2].client_id.as_deref(), Some("c-1"));
    Ok(())
}

#[tokio::test]
async fn missing_file_is_an_io_error() -> Result<()> {
    let tmp = tempdir()?;
    let store = JsonFileRecordStore::new(tmp.path().join("missing.json"));
    assert!(matches!(store.fetch_contact_records().await, Err(FetchError::Io(_))));
    Ok(())
}

#[tokio::test]
async fn garbage_file_is_malformed() -> Result<()> {
    let tmp = tempdir()?;
    let path = tmp.path().join("broken.json");
    std::fs::write(&path, "{ not json")?;
    let store = JsonFileRecordStore::new(&path);
    assert!(matches!(store.fetch_contact_records().await, Err(FetchError::Malformed(_))));
    Ok(())
}
