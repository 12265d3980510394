//! SQL generation
//!
//! Identifier quoting, per-warehouse type names, and the DDL/DML statements
//! needed to keep a table in sync with a stream.

mod dialect;
pub mod identifiers;
mod statements;

pub use dialect::Dialect;
pub use identifiers::{
    column_name_key, primary_column_names, quote_identifier, quote_literal, safe_column_name,
    stream_name_to_dict, table_name, StreamName, TableRef, STAGE_TABLE_MARKER,
    STREAM_NAME_SEPARATOR,
};
pub(crate) use statements::grantee;
pub use statements::{
    add_column, copy_from_file, copy_from_s3, copy_from_stdin, create_schema, create_table,
    drop_table, grant_schema, grant_table, merge_statements, rename_column, select_columns,
    CopyCredentials, DELETED_AT_COLUMN,
};

#[cfg(test)]
mod tests;
