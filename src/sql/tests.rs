//! SQL generation tests

use super::*;
use crate::config::SelectPermission;
use crate::schema::ColumnType;
use pretty_assertions::assert_eq;

fn users() -> TableRef {
    TableRef::for_stream("Analytics", "tap_pg-users")
}

// ============================================================================
// Identifiers
// ============================================================================

#[test]
fn test_safe_column_name() {
    assert_eq!(safe_column_name("my_column"), "\"MY_COLUMN\"");
    assert_eq!(safe_column_name("my-column"), "\"MY-COLUMN\"");
    assert_eq!(safe_column_name("my column"), "\"MY COLUMN\"");
    assert_eq!(safe_column_name("say \"hi\""), "\"SAY \"\"HI\"\"\"");
}

#[test]
fn test_primary_column_names() {
    assert_eq!(
        primary_column_names(&["user_id".to_string(), "product_id".to_string()]),
        vec!["\"USER_ID\"", "\"PRODUCT_ID\""]
    );
}

#[test]
fn test_stream_name_to_dict() {
    assert_eq!(
        stream_name_to_dict("my_table", STREAM_NAME_SEPARATOR),
        StreamName {
            catalog_name: None,
            schema_name: None,
            table_name: "my_table".to_string(),
        }
    );
    assert_eq!(
        stream_name_to_dict("my_schema-my_table", STREAM_NAME_SEPARATOR),
        StreamName {
            catalog_name: None,
            schema_name: Some("my_schema".to_string()),
            table_name: "my_table".to_string(),
        }
    );
    assert_eq!(
        stream_name_to_dict("my_catalog-my_schema-my_table", STREAM_NAME_SEPARATOR),
        StreamName {
            catalog_name: Some("my_catalog".to_string()),
            schema_name: Some("my_schema".to_string()),
            table_name: "my_table".to_string(),
        }
    );
    assert_eq!(
        stream_name_to_dict("my_catalog.my_schema.my_table", '.'),
        StreamName {
            catalog_name: Some("my_catalog".to_string()),
            schema_name: Some("my_schema".to_string()),
            table_name: "my_table".to_string(),
        }
    );
}

#[test]
fn test_stream_name_extra_segments_join_into_table() {
    let parts = stream_name_to_dict("cat-sch-tab-le-x", STREAM_NAME_SEPARATOR);
    assert_eq!(parts.table_name, "tab_le_x");
}

#[test]
fn test_table_name() {
    assert_eq!(table_name("tap_pg-users", ""), "USERS");
    assert_eq!(table_name("public-my.table", ""), "MY_TABLE");
    assert_eq!(table_name("users", "_temp"), "USERS_TEMP");
    assert!(table_name(&"x".repeat(300), "").len() < 127);
}

#[test]
fn test_table_ref() {
    let table = users();
    assert_eq!(table.to_string(), "\"analytics\".\"USERS\"");
    assert_eq!(table.stage_with("A1").to_string(), "\"analytics\".\"USERS-STAGE-A1\"");
    assert_eq!(table.quoted_schema(), "\"analytics\"");
}

#[test]
fn test_stage_table_never_aliases_a_target() {
    let orders = TableRef::for_stream("analytics", "orders");
    let orders_temp = TableRef::for_stream("analytics", "orders_temp");
    let orders_stage = TableRef::for_stream("analytics", "orders-stage-x");

    let stage = orders.stage();
    assert!(stage.table.starts_with("ORDERS-STAGE-"));
    assert_ne!(stage, orders_temp);
    assert_ne!(stage.table, orders_stage.table);
    assert!(!table_name("a-orders-stage-x", "").contains('-'));
    assert_ne!(orders.stage(), orders.stage());
}

#[test]
fn test_stage_table_keeps_token_when_truncated() {
    let long = TableRef::for_stream("analytics", &"x".repeat(300));
    let stage = long.stage_with("A1");
    assert!(stage.table.len() < 127);
    assert!(stage.table.ends_with("-STAGE-A1"));
}

#[test]
fn test_quote_literal() {
    assert_eq!(quote_literal("it's"), "'it''s'");
}

// ============================================================================
// Dialects
// ============================================================================

#[test]
fn test_render_and_parse_types() {
    let all = [
        ColumnType::Varchar(Some(10000)),
        ColumnType::Timestamp,
        ColumnType::Numeric,
        ColumnType::DoublePrecision,
        ColumnType::Boolean,
    ];

    for dialect in [Dialect::Redshift, Dialect::Postgres, Dialect::DuckDb] {
        for column_type in &all {
            let stored = dialect.stored_type(column_type);
            assert!(
                stored.same_kind(column_type),
                "{dialect:?} stores {column_type} as {stored}"
            );
        }
    }

    assert_eq!(Dialect::Redshift.render_type(&ColumnType::Super), "super");
    assert_eq!(Dialect::Postgres.render_type(&ColumnType::Super), "jsonb");
    assert_eq!(Dialect::DuckDb.render_type(&ColumnType::Numeric), "DECIMAL(38,0)");
    assert_eq!(
        Dialect::Postgres.parse_type("character varying(256)"),
        ColumnType::Varchar(Some(256))
    );
    assert_eq!(
        Dialect::DuckDb.parse_type("DECIMAL(18,3)"),
        ColumnType::Numeric
    );
    assert_eq!(
        Dialect::Postgres.parse_type("date"),
        ColumnType::Other("date".to_string())
    );
}

// ============================================================================
// Statements
// ============================================================================

#[test]
fn test_create_table() {
    let columns = vec![
        ("id".to_string(), ColumnType::Numeric),
        ("name".to_string(), ColumnType::Varchar(Some(10000))),
    ];
    let pk = vec!["id".to_string()];

    assert_eq!(
        create_table(Dialect::Redshift, &users(), &columns, &pk),
        "CREATE TABLE IF NOT EXISTS \"analytics\".\"USERS\" \
         (\"ID\" numeric, \"NAME\" character varying(10000), PRIMARY KEY (\"ID\"))"
    );
    assert_eq!(
        create_table(Dialect::DuckDb, &users(), &columns, &pk),
        "CREATE TABLE IF NOT EXISTS \"analytics\".\"USERS\" (\"ID\" DECIMAL(38,0), \"NAME\" VARCHAR)"
    );
}

#[test]
fn test_alter_statements() {
    assert_eq!(
        add_column(
            Dialect::Redshift,
            &users(),
            "age",
            &ColumnType::Numeric
        ),
        "ALTER TABLE \"analytics\".\"USERS\" ADD COLUMN \"AGE\" numeric"
    );
    assert_eq!(
        rename_column(&users(), "age", "age_20240101_1200"),
        "ALTER TABLE \"analytics\".\"USERS\" RENAME COLUMN \"AGE\" TO \"AGE_20240101_1200\""
    );
}

#[test]
fn test_merge_with_primary_key() {
    let table = users();
    let statements = merge_statements(
        &table,
        &table.stage_with("A1"),
        &["id".to_string(), "name".to_string()],
        &["id".to_string()],
        false,
        false,
    );

    assert_eq!(
        statements,
        vec![
            "DELETE FROM \"analytics\".\"USERS\" USING \"analytics\".\"USERS-STAGE-A1\" s \
             WHERE \"analytics\".\"USERS\".\"ID\" = s.\"ID\""
                .to_string(),
            "INSERT INTO \"analytics\".\"USERS\" (\"ID\", \"NAME\") \
             SELECT \"ID\", \"NAME\" FROM \"analytics\".\"USERS-STAGE-A1\""
                .to_string(),
        ]
    );
}

#[test]
fn test_merge_skip_updates_and_hard_delete() {
    let table = users();
    let statements = merge_statements(
        &table,
        &table.stage_with("A1"),
        &["id".to_string()],
        &["id".to_string()],
        true,
        true,
    );

    assert_eq!(statements.len(), 2);
    assert!(statements[0].contains("LEFT JOIN \"analytics\".\"USERS\" t ON s.\"ID\" = t.\"ID\""));
    assert!(statements[0].ends_with("WHERE t.\"ID\" IS NULL"));
    assert_eq!(
        statements[1],
        "DELETE FROM \"analytics\".\"USERS\" WHERE \"_SDC_DELETED_AT\" IS NOT NULL"
    );
}

#[test]
fn test_merge_without_primary_key_appends() {
    let table = users();
    let statements = merge_statements(
        &table,
        &table.stage_with("A1"),
        &["a".to_string()],
        &[],
        false,
        false,
    );
    assert_eq!(statements.len(), 1);
    assert!(statements[0].starts_with("INSERT INTO"));
}

#[test]
fn test_copy_statements() {
    let stage = users().stage_with("A1");
    let sql = copy_from_s3(
        &stage,
        &["id".to_string()],
        "bucket",
        "prefix/users.csv",
        &CopyCredentials::IamRole("arn:role".to_string()),
        "EMPTYASNULL",
    );
    assert_eq!(
        sql,
        "COPY \"analytics\".\"USERS-STAGE-A1\" (\"ID\") FROM 's3://bucket/prefix/users.csv' \
         IAM_ROLE 'arn:role' FORMAT AS CSV EMPTYASNULL"
    );

    let keys = CopyCredentials::Keys {
        access_key_id: "AK".to_string(),
        secret_access_key: "SK".to_string(),
        session_token: Some("TOK".to_string()),
    };
    let sql = copy_from_s3(&stage, &["id".to_string()], "b", "k", &keys, "");
    assert!(sql.contains(
        "CREDENTIALS 'aws_access_key_id=AK;aws_secret_access_key=SK;token=TOK'"
    ));
    assert!(sql.ends_with("FORMAT AS CSV"));

    assert_eq!(
        copy_from_stdin(&stage, &["id".to_string()]),
        "COPY \"analytics\".\"USERS-STAGE-A1\" (\"ID\") FROM STDIN WITH (FORMAT csv)"
    );
    assert_eq!(
        copy_from_file(&stage, "/tmp/it's.csv"),
        "COPY \"analytics\".\"USERS-STAGE-A1\" FROM '/tmp/it''s.csv' \
         (FORMAT CSV, HEADER false, DELIMITER ',', QUOTE '\"', ESCAPE '\"')"
    );
}

#[test]
fn test_grants() {
    let permission = SelectPermission::Grantees {
        users: vec!["bi".to_string()],
        groups: vec!["readers".to_string()],
    };

    let schema_grants = grant_schema(&users(), &permission);
    assert_eq!(schema_grants.len(), 4);
    assert_eq!(
        schema_grants[0],
        "GRANT USAGE ON SCHEMA \"analytics\" TO \"bi\""
    );
    assert_eq!(
        schema_grants[3],
        "GRANT SELECT ON ALL TABLES IN SCHEMA \"analytics\" TO GROUP \"readers\""
    );

    assert_eq!(
        grant_table(&users(), &SelectPermission::User("bi".to_string())),
        vec!["GRANT SELECT ON TABLE \"analytics\".\"USERS\" TO \"bi\""]
    );
}

#[test]
fn test_select_columns() {
    let sql = select_columns(&["Analytics".to_string()], Some("USERS"));
    assert!(sql.contains("WHERE lower(table_schema) IN ('analytics')"));
    assert!(sql.contains("AND lower(table_name) = 'users'"));
}
