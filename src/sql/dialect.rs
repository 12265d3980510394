//! Per-warehouse differences in type names and DDL support

use crate::schema::ColumnType;
use crate::types::WarehouseType;

/// SQL dialect of a warehouse
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Redshift,
    Postgres,
    DuckDb,
}

impl From<WarehouseType> for Dialect {
    fn from(kind: WarehouseType) -> Self {
        match kind {
            WarehouseType::Redshift => Dialect::Redshift,
            WarehouseType::Postgres => Dialect::Postgres,
            WarehouseType::Duckdb => Dialect::DuckDb,
        }
    }
}

impl Dialect {
    /// Type name used in CREATE/ALTER TABLE
    pub fn render_type(&self, column_type: &ColumnType) -> String {
        match self {
            Dialect::Redshift => column_type.sql_name(true),
            Dialect::Postgres => match column_type {
                ColumnType::Super => "jsonb".to_string(),
                other => other.sql_name(true),
            },
            Dialect::DuckDb => match column_type {
                ColumnType::Varchar(_) | ColumnType::Super => "VARCHAR".to_string(),
                ColumnType::Timestamp => "TIMESTAMP".to_string(),
                ColumnType::Numeric => "DECIMAL(38,0)".to_string(),
                ColumnType::DoublePrecision => "DOUBLE".to_string(),
                ColumnType::Boolean => "BOOLEAN".to_string(),
                ColumnType::Other(raw) => raw.clone(),
            },
        }
    }

    /// The type the catalog reports for a column created as `column_type`
    pub fn stored_type(&self, column_type: &ColumnType) -> ColumnType {
        self.parse_type(&self.render_type(column_type))
    }

    /// Parse a type name reported by the catalog
    pub fn parse_type(&self, raw: &str) -> ColumnType {
        let lower = raw.trim().to_lowercase();
        match self {
            Dialect::Redshift | Dialect::Postgres => {
                if let Some(rest) = lower.strip_prefix("character varying") {
                    ColumnType::Varchar(parse_length(rest))
                } else {
                    match lower.as_str() {
                        "timestamp without time zone" | "timestamp" => ColumnType::Timestamp,
                        "numeric" => ColumnType::Numeric,
                        "double precision" => ColumnType::DoublePrecision,
                        "boolean" => ColumnType::Boolean,
                        "super" => ColumnType::Super,
                        _ if lower.starts_with("numeric(") => ColumnType::Numeric,
                        _ => ColumnType::Other(lower),
                    }
                }
            }
            Dialect::DuckDb => {
                if lower.starts_with("varchar") {
                    ColumnType::Varchar(None)
                } else if lower.starts_with("decimal") {
                    ColumnType::Numeric
                } else {
                    match lower.as_str() {
                        "timestamp" => ColumnType::Timestamp,
                        "double" => ColumnType::DoublePrecision,
                        "boolean" => ColumnType::Boolean,
                        _ => ColumnType::Other(lower),
                    }
                }
            }
        }
    }

    /// Whether tables get a PRIMARY KEY constraint
    pub fn supports_primary_key(&self) -> bool {
        !matches!(self, Dialect::DuckDb)
    }

    /// Whether GRANT statements are issued
    pub fn supports_grants(&self) -> bool {
        !matches!(self, Dialect::DuckDb)
    }
}

fn parse_length(rest: &str) -> Option<u32> {
    rest.trim()
        .strip_prefix('(')
        .and_then(|r| r.strip_suffix(')'))
        .and_then(|len| len.trim().parse().ok())
}
