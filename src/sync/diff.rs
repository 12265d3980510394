//! Schema drift detection between a flattened schema and a live table

use crate::schema::{resolve_column_type, truncate_bytes, ColumnType, FlattenedSchema, MAX_IDENTIFIER_LENGTH};
use crate::sql::{add_column, column_name_key, rename_column, Dialect, TableRef};
use crate::warehouse::CatalogColumn;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};

/// A change needed to make a table match its stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DdlAction {
    /// Add a missing column
    AddColumn { name: String, column_type: ColumnType },
    /// Rename an incompatible column out of the way and add it again
    VersionColumn {
        name: String,
        renamed_to: String,
        column_type: ColumnType,
    },
}

impl DdlAction {
    /// Statements applying this action, in order
    pub fn statements(&self, dialect: Dialect, table: &TableRef) -> Vec<String> {
        match self {
            DdlAction::AddColumn { name, column_type } => {
                vec![add_column(dialect, table, name, column_type)]
            }
            DdlAction::VersionColumn {
                name,
                renamed_to,
                column_type,
            } => vec![
                rename_column(table, name, renamed_to),
                add_column(dialect, table, name, column_type),
            ],
        }
    }
}

/// Suffix appended to versioned columns
pub fn version_suffix(now: DateTime<Utc>) -> String {
    now.format("%Y%m%d_%H%M").to_string()
}

/// Actions turning the live `existing` columns into the `desired` column set.
///
/// Extra live columns are kept. A column whose type changed is renamed to
/// `<name>_<suffix>` and added again with the new type, except when the new
/// type is a timestamp or super, which are left as they are.
pub fn diff_columns(
    desired: &FlattenedSchema,
    existing: &[CatalogColumn],
    dialect: Dialect,
    suffix: &str,
) -> Vec<DdlAction> {
    let live: HashMap<String, &ColumnType> = existing
        .iter()
        .map(|c| (column_name_key(&c.column_name), &c.column_type))
        .collect();
    let mut taken: HashSet<String> = live.keys().cloned().collect();

    let mut actions = Vec::new();
    for (name, schema) in desired {
        let column_type = resolve_column_type(schema);
        let Some(current) = live.get(&column_name_key(name)) else {
            actions.push(DdlAction::AddColumn {
                name: name.clone(),
                column_type,
            });
            continue;
        };

        if dialect.stored_type(&column_type).same_kind(current) {
            continue;
        }

        if column_type.is_unversioned() {
            tracing::warn!(
                "Column {} is {} in the warehouse but {} in the stream, not versioning",
                name,
                current,
                column_type
            );
            continue;
        }

        let renamed_to = versioned_name(name, suffix, &taken);
        taken.insert(column_name_key(&renamed_to));
        actions.push(DdlAction::VersionColumn {
            name: name.clone(),
            renamed_to,
            column_type,
        });
    }

    actions
}

fn versioned_name(name: &str, suffix: &str, taken: &HashSet<String>) -> String {
    let mut attempt = 1;
    loop {
        let tail = if attempt == 1 {
            format!("_{suffix}")
        } else {
            format!("_{suffix}_{attempt}")
        };
        let head = truncate_bytes(name, (MAX_IDENTIFIER_LENGTH - 1).saturating_sub(tail.len()));
        let candidate = format!("{head}{tail}");
        if !taken.contains(&column_name_key(&candidate)) {
            return candidate;
        }
        attempt += 1;
    }
}
