//! Snapshot of schemas known to exist in the warehouse

use crate::error::Result;
use crate::warehouse::Warehouse;
use std::collections::HashSet;
use std::sync::Mutex;

/// Schemas seen in the warehouse catalog.
///
/// Loaded once per session and consulted only to skip `CREATE SCHEMA`. Table
/// columns are always read fresh.
#[derive(Debug, Default)]
pub struct TableCache {
    schemas: Mutex<HashSet<String>>,
}

impl TableCache {
    /// An empty cache
    pub fn empty() -> Self {
        Self::default()
    }

    /// Load the schemas that already contain tables
    pub async fn load(warehouse: &dyn Warehouse, schemas: &[String]) -> Result<Self> {
        let columns = warehouse.columns(schemas, None).await?;
        let known: HashSet<String> = columns
            .into_iter()
            .map(|c| c.schema_name.to_lowercase())
            .collect();
        tracing::info!("Table cache loaded with {} schema(s)", known.len());

        Ok(Self {
            schemas: Mutex::new(known),
        })
    }

    /// Whether `schema` is known to exist
    pub fn knows_schema(&self, schema: &str) -> bool {
        self.schemas
            .lock()
            .map(|s| s.contains(&schema.to_lowercase()))
            .unwrap_or(false)
    }

    /// Record that `schema` exists
    pub fn mark_schema(&self, schema: &str) {
        if let Ok(mut schemas) = self.schemas.lock() {
            schemas.insert(schema.to_lowercase());
        }
    }

    /// Forget `schema`
    pub fn invalidate_schema(&self, schema: &str) {
        if let Ok(mut schemas) = self.schemas.lock() {
            schemas.remove(&schema.to_lowercase());
        }
    }
}
