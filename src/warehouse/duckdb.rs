//! Embedded DuckDB warehouse
//!
//! A single connection guarded by a mutex. Every call runs on the blocking
//! thread pool.

use super::{catalog_columns, CatalogColumn, Warehouse};
use crate::error::{Error, Result};
use crate::sql::{copy_from_file, select_columns, Dialect, TableRef};
use crate::staging::{StagedLocation, StagedObject};
use crate::types::{JsonObject, JsonValue};
use async_trait::async_trait;
use duckdb::Connection;
use std::sync::{Arc, Mutex};

/// DuckDB database file (or in-memory database)
#[derive(Clone)]
pub struct DuckDbWarehouse {
    conn: Arc<Mutex<Connection>>,
    path: String,
}

impl std::fmt::Debug for DuckDbWarehouse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DuckDbWarehouse")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl DuckDbWarehouse {
    /// Open a database file, or an in-memory database for `:memory:`
    pub fn open(path: &str) -> Result<Self> {
        let conn = if path == ":memory:" {
            Connection::open_in_memory()
        } else {
            Connection::open(path)
        }
        .map_err(|e| Error::config(format!("Failed to open DuckDB database {path}: {e}")))?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: path.to_string(),
        })
    }

    /// Open a fresh in-memory database
    pub fn in_memory() -> Result<Self> {
        Self::open(":memory:")
    }

    async fn with_connection<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|_| Error::warehouse("DuckDB connection lock poisoned"))?;
            f(&mut guard)
        })
        .await
        .map_err(|e| Error::warehouse(format!("DuckDB blocking task failed: {e}")))?
    }

    /// Run a query and return rows as JSON objects keyed by column name
    pub async fn query(&self, sql: &str) -> Result<Vec<JsonObject>> {
        let sql = sql.to_string();
        self.with_connection(move |conn| {
            tracing::debug!("Executing query: {}", sql);
            let mut stmt = conn
                .prepare(&sql)
                .map_err(|e| Error::warehouse(format!("Failed to prepare query: {e}")))?;
            let mut rows = stmt
                .query([])
                .map_err(|e| Error::warehouse(format!("Failed to execute query: {e}")))?;

            let names: Vec<String> = rows
                .as_ref()
                .map(|s| s.column_names())
                .unwrap_or_default();

            let mut records = Vec::new();
            while let Some(row) = rows
                .next()
                .map_err(|e| Error::warehouse(format!("Failed to read row: {e}")))?
            {
                let mut record = JsonObject::new();
                for (idx, name) in names.iter().enumerate() {
                    let value: duckdb::types::Value = row
                        .get(idx)
                        .map_err(|e| Error::warehouse(format!("Failed to read {name}: {e}")))?;
                    record.insert(name.clone(), duckdb_value_to_json(value));
                }
                records.push(record);
            }
            Ok(records)
        })
        .await
    }
}

#[async_trait]
impl Warehouse for DuckDbWarehouse {
    fn dialect(&self) -> Dialect {
        Dialect::DuckDb
    }

    async fn execute(&self, sql: &str) -> Result<()> {
        let sql = sql.to_string();
        self.with_connection(move |conn| {
            tracing::debug!("Executing: {}", sql);
            conn.execute_batch(&sql)
                .map_err(|e| Error::warehouse(e.to_string()))
        })
        .await
    }

    async fn execute_in_transaction(&self, statements: &[String]) -> Result<()> {
        let statements = statements.to_vec();
        self.with_connection(move |conn| {
            let tx = conn
                .transaction()
                .map_err(|e| Error::warehouse(format!("Failed to begin transaction: {e}")))?;
            for sql in &statements {
                tracing::debug!("Executing in transaction: {}", sql);
                tx.execute_batch(sql)
                    .map_err(|e| Error::warehouse(e.to_string()))?;
            }
            tx.commit()
                .map_err(|e| Error::warehouse(format!("Failed to commit: {e}")))
        })
        .await
    }

    async fn columns(&self, schemas: &[String], table: Option<&str>) -> Result<Vec<CatalogColumn>> {
        if schemas.is_empty() {
            return Ok(Vec::new());
        }
        let sql = select_columns(schemas, table);
        let rows = self
            .with_connection(move |conn| {
                let mut stmt = conn
                    .prepare(&sql)
                    .map_err(|e| Error::warehouse(format!("Failed to prepare query: {e}")))?;
                let rows = stmt
                    .query_map([], |row| {
                        Ok([row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?])
                    })
                    .map_err(|e| Error::warehouse(format!("Failed to read catalog: {e}")))?;
                rows.collect::<std::result::Result<Vec<[String; 4]>, _>>()
                    .map_err(|e| Error::warehouse(format!("Failed to read catalog: {e}")))
            })
            .await?;

        Ok(catalog_columns(Dialect::DuckDb, rows))
    }

    async fn copy_into(
        &self,
        table: &TableRef,
        _columns: &[String],
        object: &StagedObject,
    ) -> Result<u64> {
        let StagedLocation::Local(path) = &object.location else {
            return Err(Error::load(
                table.to_string(),
                format!("DuckDB can only load local files, got {}", object.location),
            ));
        };

        let sql = copy_from_file(table, &path.to_string_lossy());
        let loaded = self
            .with_connection(move |conn| {
                tracing::debug!("Executing: {}", sql);
                conn.execute(&sql, [])
                    .map_err(|e| Error::warehouse(e.to_string()))
            })
            .await?;
        Ok(loaded as u64)
    }
}

/// Convert DuckDB Value to JSON Value
fn duckdb_value_to_json(value: duckdb::types::Value) -> JsonValue {
    use duckdb::types::Value;

    match value {
        Value::Null => JsonValue::Null,
        Value::Boolean(b) => JsonValue::Bool(b),
        Value::TinyInt(i) => JsonValue::from(i),
        Value::SmallInt(i) => JsonValue::from(i),
        Value::Int(i) => JsonValue::from(i),
        Value::BigInt(i) => JsonValue::from(i),
        Value::UTinyInt(i) => JsonValue::from(i),
        Value::USmallInt(i) => JsonValue::from(i),
        Value::UInt(i) => JsonValue::from(i),
        Value::UBigInt(i) => JsonValue::from(i),
        Value::HugeInt(i) => i64::try_from(i).map_or_else(|_| JsonValue::String(i.to_string()), JsonValue::from),
        Value::Float(f) => {
            serde_json::Number::from_f64(f64::from(f)).map_or(JsonValue::Null, JsonValue::Number)
        }
        Value::Double(f) => serde_json::Number::from_f64(f).map_or(JsonValue::Null, JsonValue::Number),
        Value::Decimal(d) => {
            let text = d.to_string();
            match text.parse::<serde_json::Number>() {
                Ok(n) => JsonValue::Number(n),
                Err(_) => JsonValue::String(text),
            }
        }
        Value::Text(s) => JsonValue::String(s),
        Value::Timestamp(_, micros) => {
            let secs = micros.div_euclid(1_000_000);
            let nsecs = (micros.rem_euclid(1_000_000) * 1000) as u32;
            chrono::DateTime::from_timestamp(secs, nsecs)
                .map(|dt| JsonValue::String(dt.format("%Y-%m-%d %H:%M:%S%.6f").to_string()))
                .unwrap_or(JsonValue::from(micros))
        }
        other => JsonValue::String(format!("{other:?}")),
    }
}
