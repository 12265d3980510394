//! Warehouse connections
//!
//! The loader talks to the warehouse through the [`Warehouse`] trait:
//! plain statements, transactions, catalog lookups and bulk loads.
//!
//! - Redshift and PostgreSQL via `tokio-postgres`
//! - DuckDB (embedded) via `duckdb`

mod duckdb;
mod postgres;

pub use self::duckdb::DuckDbWarehouse;
pub use self::postgres::PostgresWarehouse;

use crate::config::LoaderConfig;
use crate::error::Result;
use crate::schema::ColumnType;
use crate::sql::{Dialect, TableRef};
use crate::staging::StagedObject;
use crate::types::WarehouseType;
use async_trait::async_trait;
use std::sync::Arc;

/// One column as reported by the warehouse catalog
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogColumn {
    pub schema_name: String,
    pub table_name: String,
    pub column_name: String,
    pub column_type: ColumnType,
}

/// Connection to a warehouse
#[async_trait]
pub trait Warehouse: Send + Sync {
    /// SQL dialect spoken by the warehouse
    fn dialect(&self) -> Dialect;

    /// Run one or more statements outside a transaction
    async fn execute(&self, sql: &str) -> Result<()>;

    /// Run statements in order inside one transaction
    async fn execute_in_transaction(&self, statements: &[String]) -> Result<()>;

    /// Catalog columns of tables in `schemas`, optionally for one table only
    async fn columns(&self, schemas: &[String], table: Option<&str>) -> Result<Vec<CatalogColumn>>;

    /// Bulk-load a staged CSV file into `table`, returning the row count
    async fn copy_into(
        &self,
        table: &TableRef,
        columns: &[String],
        object: &StagedObject,
    ) -> Result<u64>;
}

/// Connect to the configured warehouse
pub async fn connect(config: &LoaderConfig) -> Result<Arc<dyn Warehouse>> {
    tracing::info!("Connecting to {} warehouse", config.warehouse_type);
    match config.warehouse_type {
        WarehouseType::Duckdb => {
            let path = config.dbname.as_deref().unwrap_or(":memory:");
            Ok(Arc::new(DuckDbWarehouse::open(path)?))
        }
        WarehouseType::Postgres | WarehouseType::Redshift => {
            Ok(Arc::new(PostgresWarehouse::from_config(config)?))
        }
    }
}

/// Convert catalog rows into columns, parsing types for `dialect`
pub(crate) fn catalog_columns(dialect: Dialect, rows: Vec<[String; 4]>) -> Vec<CatalogColumn> {
    rows.into_iter()
        .map(|[schema_name, table_name, column_name, data_type]| CatalogColumn {
            schema_name,
            table_name,
            column_name,
            column_type: dialect.parse_type(&data_type),
        })
        .collect()
}
