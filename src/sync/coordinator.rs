//! Per-stream table sync: schema, staging, bulk load, merge

use super::cache::TableCache;
use super::diff::{diff_columns, version_suffix};
use super::types::{FlushReport, StreamSchema, SyncPhase};
use crate::config::{LoaderConfig, TargetSchema};
use crate::error::{Error, Result};
use crate::schema::{resolve_column_type, ColumnType};
use crate::sql::{create_schema, create_table, drop_table, grant_schema, grant_table, merge_statements, TableRef};
use crate::staging::{StagedObject, StagingStore};
use crate::warehouse::Warehouse;
use bytes::Bytes;
use chrono::Utc;
use std::sync::Arc;

/// Moves batches of one stream at a time into the warehouse
pub struct TableSyncCoordinator {
    warehouse: Arc<dyn Warehouse>,
    staging: StagingStore,
    cache: Arc<TableCache>,
    config: Arc<LoaderConfig>,
}

impl TableSyncCoordinator {
    /// Create a new coordinator
    pub fn new(
        warehouse: Arc<dyn Warehouse>,
        staging: StagingStore,
        cache: Arc<TableCache>,
        config: Arc<LoaderConfig>,
    ) -> Self {
        Self {
            warehouse,
            staging,
            cache,
            config,
        }
    }

    /// Load `rows` (CSV lines in column order) of `stream` into its table
    pub async fn flush(&self, stream: &StreamSchema, rows: &[String]) -> Result<FlushReport> {
        let target = self.config.target_schema(&stream.stream)?;
        let table = TableRef::for_stream(&target.name, &stream.stream);
        let mut phase = SyncPhase::Idle;

        match self.sync(stream, rows, &target, &table, &mut phase).await {
            Ok(report) => {
                tracing::info!(
                    "Loaded {} row(s) into {} ({} DDL statement(s))",
                    report.rows,
                    report.table,
                    report.ddl_statements
                );
                Ok(report)
            }
            Err(e) => {
                tracing::error!(
                    "Sync of stream {} into {} failed after phase {}: {}",
                    stream.stream,
                    table,
                    phase,
                    e
                );
                Err(e)
            }
        }
    }

    async fn sync(
        &self,
        stream: &StreamSchema,
        rows: &[String],
        target: &TargetSchema,
        table: &TableRef,
        phase: &mut SyncPhase,
    ) -> Result<FlushReport> {
        if stream.flatten_schema.is_empty() {
            return Err(Error::ddl(table.to_string(), "Stream schema has no columns"));
        }

        let ddl_statements = self.ensure_schema(stream, target, table).await?;
        *phase = SyncPhase::SchemaEnsured;

        let mut data = rows.join("\n");
        data.push('\n');
        let staged = self.staging.put(&stream.stream, Bytes::from(data)).await?;
        *phase = SyncPhase::Staged;

        let stage = table.stage();
        let result = self.load_and_merge(stream, table, &stage, &staged, phase).await;
        self.cleanup(&stage, &staged).await;
        result?;

        Ok(FlushReport {
            table: table.to_string(),
            rows: rows.len(),
            ddl_statements,
        })
    }

    /// Create schema and table, or bring the table's columns up to date.
    ///
    /// Returns the number of DDL statements run against the table.
    async fn ensure_schema(
        &self,
        stream: &StreamSchema,
        target: &TargetSchema,
        table: &TableRef,
    ) -> Result<usize> {
        let dialect = self.warehouse.dialect();

        if !self.cache.knows_schema(&table.schema) {
            self.run_ddl(table, &create_schema(table)).await?;
            if let (true, Some(permission)) = (dialect.supports_grants(), &target.select_permission) {
                for sql in grant_schema(table, permission) {
                    self.run_ddl(table, &sql).await?;
                }
            }
            self.cache.mark_schema(&table.schema);
        }

        let existing = self
            .warehouse
            .columns(std::slice::from_ref(&table.schema), Some(&table.table))
            .await
            .map_err(|e| Error::ddl(table.to_string(), e.to_string()))?;

        if existing.is_empty() {
            tracing::info!("Table {} does not exist, creating it", table);
            let sql = create_table(dialect, table, &column_types(stream), &stream.key_properties);
            self.run_ddl(table, &sql).await?;
            if let (true, Some(permission)) = (dialect.supports_grants(), &target.select_permission) {
                for sql in grant_table(table, permission) {
                    self.run_ddl(table, &sql).await?;
                }
            }
            return Ok(1);
        }

        let actions = diff_columns(
            &stream.flatten_schema,
            &existing,
            dialect,
            &version_suffix(Utc::now()),
        );
        let mut applied = 0;
        for action in &actions {
            tracing::info!("Updating table {}: {:?}", table, action);
            for sql in action.statements(dialect, table) {
                self.run_ddl(table, &sql).await?;
                applied += 1;
            }
        }
        Ok(applied)
    }

    async fn run_ddl(&self, table: &TableRef, sql: &str) -> Result<()> {
        self.warehouse.execute(sql).await.map_err(|e| {
            self.cache.invalidate_schema(&table.schema);
            Error::ddl(table.to_string(), e.to_string())
        })
    }

    async fn load_and_merge(
        &self,
        stream: &StreamSchema,
        table: &TableRef,
        stage: &TableRef,
        staged: &StagedObject,
        phase: &mut SyncPhase,
    ) -> Result<()> {
        let dialect = self.warehouse.dialect();
        let columns = stream.column_names();

        let prepare = format!(
            "{}; {}",
            drop_table(stage),
            create_table(dialect, stage, &column_types(stream), &[])
        );
        self.warehouse
            .execute(&prepare)
            .await
            .map_err(|e| Error::load(table.to_string(), e.to_string()))?;

        let loaded = self
            .warehouse
            .copy_into(stage, &columns, staged)
            .await
            .map_err(|e| Error::load(table.to_string(), e.to_string()))?;
        tracing::debug!("Copied {} row(s) into {}", loaded, stage);
        *phase = SyncPhase::Loaded;

        let statements = merge_statements(
            table,
            stage,
            &columns,
            &stream.key_properties,
            self.config.skip_updates,
            self.config.hard_delete,
        );
        self.warehouse
            .execute_in_transaction(&statements)
            .await
            .map_err(|e| Error::merge(table.to_string(), e.to_string()))?;
        *phase = SyncPhase::Merged;

        Ok(())
    }

    async fn cleanup(&self, stage: &TableRef, staged: &StagedObject) {
        if let Err(e) = self.warehouse.execute(&drop_table(stage)).await {
            tracing::warn!("Failed to drop staging table {}: {}", stage, e);
        }
        if let Err(e) = self.staging.delete(staged).await {
            tracing::warn!("Failed to delete staged file: {}", e);
        }
    }
}

fn column_types(stream: &StreamSchema) -> Vec<(String, ColumnType)> {
    stream
        .flatten_schema
        .iter()
        .map(|(name, schema)| (name.clone(), resolve_column_type(schema)))
        .collect()
}
