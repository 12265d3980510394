//! SQL builders for schema sync and batch merges

use super::dialect::Dialect;
use super::identifiers::{quote_identifier, quote_literal, safe_column_name, TableRef};
use crate::config::SelectPermission;
use crate::schema::ColumnType;

/// Column carrying the soft-delete timestamp
pub const DELETED_AT_COLUMN: &str = "_sdc_deleted_at";

/// Credentials clause of a Redshift COPY
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CopyCredentials {
    /// `IAM_ROLE '<arn>'`
    IamRole(String),
    /// Static keys
    Keys {
        access_key_id: String,
        secret_access_key: String,
        session_token: Option<String>,
    },
}

impl CopyCredentials {
    fn clause(&self) -> String {
        match self {
            CopyCredentials::IamRole(arn) => format!("IAM_ROLE {}", quote_literal(arn)),
            CopyCredentials::Keys {
                access_key_id,
                secret_access_key,
                session_token,
            } => {
                let mut creds =
                    format!("aws_access_key_id={access_key_id};aws_secret_access_key={secret_access_key}");
                if let Some(token) = session_token {
                    creds.push_str(&format!(";token={token}"));
                }
                format!("CREDENTIALS {}", quote_literal(&creds))
            }
        }
    }
}

pub fn create_schema(table: &TableRef) -> String {
    format!("CREATE SCHEMA IF NOT EXISTS {}", table.quoted_schema())
}

pub fn drop_table(table: &TableRef) -> String {
    format!("DROP TABLE IF EXISTS {table}")
}

/// CREATE TABLE with the given columns in order
pub fn create_table(
    dialect: Dialect,
    table: &TableRef,
    columns: &[(String, ColumnType)],
    primary_key: &[String],
) -> String {
    let mut clauses: Vec<String> = columns
        .iter()
        .map(|(name, column_type)| {
            format!(
                "{} {}",
                safe_column_name(name),
                dialect.render_type(column_type)
            )
        })
        .collect();

    if !primary_key.is_empty() && dialect.supports_primary_key() {
        clauses.push(format!("PRIMARY KEY ({})", column_list(primary_key)));
    }

    format!("CREATE TABLE IF NOT EXISTS {table} ({})", clauses.join(", "))
}

pub fn add_column(dialect: Dialect, table: &TableRef, name: &str, column_type: &ColumnType) -> String {
    format!(
        "ALTER TABLE {table} ADD COLUMN {} {}",
        safe_column_name(name),
        dialect.render_type(column_type)
    )
}

pub fn rename_column(table: &TableRef, from: &str, to: &str) -> String {
    format!(
        "ALTER TABLE {table} RENAME COLUMN {} TO {}",
        safe_column_name(from),
        safe_column_name(to)
    )
}

/// GRANT statements for a schema
pub fn grant_schema(table: &TableRef, permission: &SelectPermission) -> Vec<String> {
    let schema = table.quoted_schema();
    permission
        .grantees()
        .flat_map(|grantee| {
            [
                format!("GRANT USAGE ON SCHEMA {schema} TO {grantee}"),
                format!("GRANT SELECT ON ALL TABLES IN SCHEMA {schema} TO {grantee}"),
            ]
        })
        .collect()
}

/// GRANT statements for a single table
pub fn grant_table(table: &TableRef, permission: &SelectPermission) -> Vec<String> {
    permission
        .grantees()
        .map(|grantee| format!("GRANT SELECT ON TABLE {table} TO {grantee}"))
        .collect()
}

/// Statements moving staged rows into the target, run in one transaction.
///
/// With a primary key, target rows matching a staged key are deleted before
/// all staged rows are inserted. `skip_updates` instead inserts only staged
/// rows whose key is not in the target yet.
pub fn merge_statements(
    target: &TableRef,
    stage: &TableRef,
    columns: &[String],
    primary_key: &[String],
    skip_updates: bool,
    hard_delete: bool,
) -> Vec<String> {
    let mut statements = Vec::new();
    let column_names = column_list(columns);

    if primary_key.is_empty() {
        statements.push(format!(
            "INSERT INTO {target} ({column_names}) SELECT {column_names} FROM {stage}"
        ));
    } else if skip_updates {
        let join = key_join(primary_key, "s", "t");
        let first_key = safe_column_name(&primary_key[0]);
        let staged: Vec<String> = columns
            .iter()
            .map(|c| format!("s.{}", safe_column_name(c)))
            .collect();
        statements.push(format!(
            "INSERT INTO {target} ({column_names}) SELECT {} FROM {stage} s \
             LEFT JOIN {target} t ON {join} WHERE t.{first_key} IS NULL",
            staged.join(", ")
        ));
    } else {
        let matches: Vec<String> = primary_key
            .iter()
            .map(|k| {
                let column = safe_column_name(k);
                format!("{target}.{column} = s.{column}")
            })
            .collect();
        statements.push(format!(
            "DELETE FROM {target} USING {stage} s WHERE {}",
            matches.join(" AND ")
        ));
        statements.push(format!(
            "INSERT INTO {target} ({column_names}) SELECT {column_names} FROM {stage}"
        ));
    }

    if hard_delete {
        statements.push(format!(
            "DELETE FROM {target} WHERE {} IS NOT NULL",
            safe_column_name(DELETED_AT_COLUMN)
        ));
    }

    statements
}

/// Redshift COPY from an S3 object
pub fn copy_from_s3(
    stage: &TableRef,
    columns: &[String],
    bucket: &str,
    key: &str,
    credentials: &CopyCredentials,
    copy_options: &str,
) -> String {
    format!(
        "COPY {stage} ({}) FROM {} {} FORMAT AS CSV {}",
        column_list(columns),
        quote_literal(&format!("s3://{bucket}/{key}")),
        credentials.clause(),
        copy_options
    )
    .trim_end()
    .to_string()
}

/// PostgreSQL COPY fed through the client connection
pub fn copy_from_stdin(stage: &TableRef, columns: &[String]) -> String {
    format!(
        "COPY {stage} ({}) FROM STDIN WITH (FORMAT csv)",
        column_list(columns)
    )
}

/// DuckDB COPY from a file readable by the database process
pub fn copy_from_file(stage: &TableRef, path: &str) -> String {
    format!(
        "COPY {stage} FROM {} (FORMAT CSV, HEADER false, DELIMITER ',', QUOTE '\"', ESCAPE '\"')",
        quote_literal(path)
    )
}

/// Catalog lookup of columns in the given schemas, optionally for one table
pub fn select_columns(schemas: &[String], table: Option<&str>) -> String {
    let schema_list: Vec<String> = schemas
        .iter()
        .map(|s| quote_literal(&s.to_lowercase()))
        .collect();

    let mut sql = format!(
        "SELECT CAST(table_schema AS VARCHAR), CAST(table_name AS VARCHAR), \
         CAST(column_name AS VARCHAR), CAST(data_type AS VARCHAR) \
         FROM information_schema.columns \
         WHERE lower(table_schema) IN ({})",
        schema_list.join(", ")
    );
    if let Some(table) = table {
        sql.push_str(&format!(
            " AND lower(table_name) = {}",
            quote_literal(&table.to_lowercase())
        ));
    }
    sql.push_str(" ORDER BY table_schema, table_name, ordinal_position");
    sql
}

fn column_list(columns: &[String]) -> String {
    columns
        .iter()
        .map(|c| safe_column_name(c))
        .collect::<Vec<_>>()
        .join(", ")
}

fn key_join(primary_key: &[String], left: &str, right: &str) -> String {
    primary_key
        .iter()
        .map(|k| {
            let column = safe_column_name(k);
            format!("{left}.{column} = {right}.{column}")
        })
        .collect::<Vec<_>>()
        .join(" AND ")
}

/// Grantee clause for a user or group
pub(crate) fn grantee(name: &str, group: bool) -> String {
    if group {
        format!("GROUP {}", quote_identifier(name))
    } else {
        quote_identifier(name)
    }
}
