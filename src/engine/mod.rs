//! Execution engine module
//!
//! Main read loop: decodes messages, buffers rows per stream, decides when to
//! flush and emits checkpoints once their data is merged.
//!
//! # Overview
//!
//! - `StreamDispatchLoop` - Reads the input and drives flushes
//! - `Message` - Inbound protocol messages
//! - `RecordBatch` - Deduplicated rows of one stream
//! - `LoadStats` - Counters for a run

mod types;

pub use types::{LoadStats, Message, RecordBatch, BATCHED_AT_COLUMN, EXTRACTED_AT_COLUMN};

use crate::config::LoaderConfig;
use crate::error::{Error, Result};
use crate::schema::{
    flatten_record, flatten_schema, validate_record, ColumnSchema, JsonType, FORMAT_DATE_TIME,
};
use crate::sql::DELETED_AT_COLUMN;
use crate::state::{CheckpointTracker, StateEmitter};
use crate::sync::{
    record_primary_key_string, record_to_csv_line, FlushReport, StreamSchema, TableSyncCoordinator,
};
use crate::types::{InvalidRecordStrategy, JsonObject, JsonValue};
use chrono::{SecondsFormat, Utc};
use futures::stream::{self, StreamExt};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

/// Reads messages and loads their records stream by stream
pub struct StreamDispatchLoop {
    /// Table sync for every flush
    coordinator: Arc<TableSyncCoordinator>,
    /// Loader configuration
    config: Arc<LoaderConfig>,
    /// Checkpoint output
    emitter: StateEmitter,
    /// Latest schema per stream
    schemas: BTreeMap<String, StreamSchema>,
    /// Buffered rows per stream
    batches: BTreeMap<String, RecordBatch>,
    /// Latest and flushed checkpoints
    checkpoints: CheckpointTracker,
    /// Time of the last flush of all streams
    last_flush: Instant,
    /// Statistics
    stats: LoadStats,
}

impl StreamDispatchLoop {
    /// Create a new dispatch loop
    pub fn new(
        coordinator: TableSyncCoordinator,
        config: Arc<LoaderConfig>,
        emitter: StateEmitter,
    ) -> Self {
        Self {
            coordinator: Arc::new(coordinator),
            config,
            emitter,
            schemas: BTreeMap::new(),
            batches: BTreeMap::new(),
            checkpoints: CheckpointTracker::new(),
            last_flush: Instant::now(),
            stats: LoadStats::default(),
        }
    }

    /// Get statistics
    pub fn stats(&self) -> &LoadStats {
        &self.stats
    }

    /// Get the checkpoints
    pub fn checkpoints(&self) -> &CheckpointTracker {
        &self.checkpoints
    }

    /// Number of rows currently buffered for `stream`
    pub fn buffered_rows(&self, stream: &str) -> usize {
        self.batches.get(stream).map_or(0, RecordBatch::len)
    }

    /// Consume `reader` line by line, then flush everything
    pub async fn run<R>(&mut self, reader: R) -> Result<LoadStats>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut lines = reader.lines();
        let mut line_number = 0;

        while let Some(line) = lines.next_line().await? {
            line_number += 1;
            if line.trim().is_empty() {
                continue;
            }
            let message = Message::parse(&line, line_number)?;
            self.handle(message, line_number).await?;
        }

        self.flush_all().await?;

        tracing::info!(
            "Loaded {} record(s) in {} flush(es), emitted {} state message(s)",
            self.stats.records,
            self.stats.flushes,
            self.stats.states_emitted
        );
        Ok(self.stats.clone())
    }

    /// Process one message
    pub async fn handle(&mut self, message: Message, line_number: usize) -> Result<()> {
        self.stats.messages += 1;
        tracing::trace!("Line {}: {} message", line_number, message.kind());

        match message {
            Message::Schema {
                stream,
                schema,
                key_properties,
            } => self.handle_schema(stream, schema, key_properties).await,
            Message::Record {
                stream,
                record,
                time_extracted,
            } => {
                self.handle_record(&stream, record, time_extracted, line_number)
                    .await
            }
            Message::State { value } => self.handle_state(value).await,
            Message::ActivateVersion { stream, version } => {
                tracing::debug!(
                    "Ignoring ACTIVATE_VERSION message for stream {} (version {:?})",
                    stream,
                    version
                );
                Ok(())
            }
        }
    }

    /// Flush every stream with buffered rows
    pub async fn flush_all(&mut self) -> Result<()> {
        let streams: Vec<String> = self.batches.keys().cloned().collect();
        self.flush_streams(streams, true).await
    }

    async fn handle_schema(
        &mut self,
        stream: String,
        mut schema: ColumnSchema,
        key_properties: Vec<String>,
    ) -> Result<()> {
        if self.config.primary_key_required && key_properties.is_empty() {
            return Err(Error::MissingPrimaryKey { stream });
        }

        if self.config.metadata_columns_enabled() {
            add_metadata_properties(&mut schema);
        }

        let flatten_schema = flatten_schema(&schema, self.config.data_flattening_max_level)?;
        let incoming = StreamSchema {
            stream: stream.clone(),
            schema,
            flatten_schema,
            key_properties,
        };

        let changed = self.schemas.get(&stream).is_some_and(|s| *s != incoming);
        if changed && self.buffered_rows(&stream) > 0 {
            tracing::info!("Schema of stream {} changed, flushing buffered rows", stream);
            self.flush_streams(vec![stream.clone()], false).await?;
        }

        tracing::debug!(
            "Stream {} has {} column(s)",
            stream,
            incoming.flatten_schema.len()
        );
        self.schemas.insert(stream.clone(), incoming);
        self.batches.entry(stream).or_default();
        Ok(())
    }

    async fn handle_record(
        &mut self,
        stream: &str,
        mut record: JsonObject,
        time_extracted: Option<String>,
        line_number: usize,
    ) -> Result<()> {
        let Some(schema) = self.schemas.get(stream) else {
            return Err(Error::protocol(
                line_number,
                format!(
                    "A record for stream {stream} was encountered before a corresponding schema"
                ),
            ));
        };

        if self.config.validate_records {
            if let Err(violations) = validate_record(&record, &schema.schema) {
                let message = violations
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join("; ");
                match self.config.invalid_record_strategy {
                    InvalidRecordStrategy::Fail => return Err(Error::validation(stream, message)),
                    InvalidRecordStrategy::Skip => {
                        tracing::warn!("Skipping invalid record of stream {}: {}", stream, message);
                        self.stats.skipped_records += 1;
                        return Ok(());
                    }
                }
            }
        }

        if self.config.metadata_columns_enabled() {
            add_metadata_values(&mut record, time_extracted);
        }

        let flat = flatten_record(
            &record,
            Some(&schema.flatten_schema),
            self.config.data_flattening_max_level,
        );
        let key = if schema.has_primary_key() {
            Some(record_primary_key_string(&flat, &schema.key_properties)?)
        } else {
            None
        };
        let row = record_to_csv_line(&flat, &schema.flatten_schema);

        let batch = self.batches.entry(stream.to_string()).or_default();
        batch.push(row, key);
        let buffered = batch.len();
        self.stats.records += 1;

        if buffered >= self.config.batch_size_rows {
            tracing::debug!("Stream {} reached {} buffered row(s)", stream, buffered);
            if self.config.flush_all_streams {
                self.flush_all().await?;
            } else {
                self.flush_streams(vec![stream.to_string()], false).await?;
            }
        } else if self.wait_limit_reached() {
            tracing::debug!("Batch wait limit reached, flushing all streams");
            self.flush_all().await?;
        }
        Ok(())
    }

    async fn handle_state(&mut self, value: JsonValue) -> Result<()> {
        self.checkpoints.record_latest(value);
        if self.batches.values().all(RecordBatch::is_empty) {
            self.checkpoints.promote_latest();
            self.emit_state().await?;
        }
        Ok(())
    }

    fn wait_limit_reached(&self) -> bool {
        self.config
            .batch_wait_limit_seconds
            .is_some_and(|secs| self.last_flush.elapsed() >= Duration::from_secs(secs))
    }

    /// Flush the given streams concurrently and advance the checkpoint.
    ///
    /// Every started flush runs to completion before the first error, if any,
    /// is returned.
    async fn flush_streams(&mut self, streams: Vec<String>, all: bool) -> Result<()> {
        let mut work = Vec::new();
        for name in &streams {
            let (Some(batch), Some(schema)) = (self.batches.get_mut(name), self.schemas.get(name))
            else {
                continue;
            };
            if batch.is_empty() {
                continue;
            }
            work.push((schema.clone(), batch.take()));
        }

        if !work.is_empty() {
            let parallelism = self.config.effective_parallelism(work.len());
            tracing::info!(
                "Flushing {} stream(s) with parallelism {}",
                work.len(),
                parallelism
            );

            let results: Vec<Result<FlushReport>> = stream::iter(work)
                .map(|(schema, rows)| {
                    let coordinator = Arc::clone(&self.coordinator);
                    async move { coordinator.flush(&schema, &rows).await }
                })
                .buffer_unordered(parallelism)
                .collect()
                .await;

            let mut first_error = None;
            for result in results {
                match result {
                    Ok(report) => {
                        self.stats.flushes += 1;
                        self.stats.rows_loaded += report.rows;
                    }
                    Err(e) if first_error.is_none() => first_error = Some(e),
                    Err(e) => tracing::error!("Additional flush failure: {}", e),
                }
            }
            if let Some(e) = first_error {
                return Err(e);
            }
        }

        if all {
            self.checkpoints.promote_latest();
            self.last_flush = Instant::now();
        } else {
            self.checkpoints.promote_streams(&streams);
        }
        self.emit_state().await
    }

    async fn emit_state(&mut self) -> Result<()> {
        if let Some(state) = self.checkpoints.take_emittable() {
            self.emitter.emit(&state).await?;
            self.stats.states_emitted += 1;
        }
        Ok(())
    }
}

/// Force the `_sdc_*` properties onto a stream schema
fn add_metadata_properties(schema: &mut ColumnSchema) {
    let properties = schema.properties.get_or_insert_with(BTreeMap::new);
    for name in [EXTRACTED_AT_COLUMN, BATCHED_AT_COLUMN, DELETED_AT_COLUMN] {
        properties.insert(
            name.to_string(),
            ColumnSchema::with_types(&[JsonType::Null, JsonType::String])
                .with_format(FORMAT_DATE_TIME),
        );
    }
}

/// Set the `_sdc_*` values of a record
fn add_metadata_values(record: &mut JsonObject, time_extracted: Option<String>) {
    record.insert(
        EXTRACTED_AT_COLUMN.to_string(),
        time_extracted.map_or(JsonValue::Null, JsonValue::String),
    );
    record.insert(
        BATCHED_AT_COLUMN.to_string(),
        JsonValue::String(Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)),
    );
    let deleted_at = record
        .get(DELETED_AT_COLUMN)
        .cloned()
        .unwrap_or(JsonValue::Null);
    record.insert(DELETED_AT_COLUMN.to_string(), deleted_at);
}
