//! Loader configuration
//!
//! The configuration is a single JSON object. It is validated as raw JSON
//! first so every problem is reported at once, then deserialized.

use crate::error::{Error, Result};
use crate::sql::{grantee, stream_name_to_dict, CopyCredentials, STREAM_NAME_SEPARATOR};
use crate::types::{InvalidRecordStrategy, JsonValue, OptionStringExt, WarehouseType};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Copy options used when none are configured
pub const DEFAULT_COPY_OPTIONS: &str =
    "EMPTYASNULL BLANKSASNULL TIMEFORMAT 'auto' COMPUPDATE OFF STATUPDATE OFF";

// ============================================================================
// Loader Config
// ============================================================================

/// Complete loader configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoaderConfig {
    /// Warehouse to load into
    #[serde(default)]
    pub warehouse_type: WarehouseType,

    // Connection
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default, deserialize_with = "deserialize_port")]
    pub port: Option<u16>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    /// Database name, or the database file for DuckDB
    #[serde(default)]
    pub dbname: Option<String>,

    // Staging
    #[serde(default)]
    pub s3_bucket: Option<String>,
    #[serde(default)]
    pub s3_key_prefix: Option<String>,
    #[serde(default)]
    pub aws_access_key_id: Option<String>,
    #[serde(default)]
    pub aws_secret_access_key: Option<String>,
    #[serde(default)]
    pub aws_session_token: Option<String>,
    #[serde(default)]
    pub aws_redshift_copy_role_arn: Option<String>,
    #[serde(default)]
    pub aws_region: Option<String>,
    #[serde(default)]
    pub copy_options: Option<String>,
    /// Stage batches in a local directory instead of S3
    #[serde(default)]
    pub use_local_copy: bool,
    #[serde(default)]
    pub temp_dir: Option<PathBuf>,

    // Target schemas
    #[serde(default)]
    pub default_target_schema: Option<String>,
    #[serde(default)]
    pub default_target_schema_select_permission: Option<SelectPermission>,
    #[serde(default)]
    pub schema_mapping: BTreeMap<String, SchemaMapping>,

    // Batching
    #[serde(default = "default_batch_size_rows")]
    pub batch_size_rows: usize,
    #[serde(default)]
    pub batch_wait_limit_seconds: Option<u64>,
    #[serde(default)]
    pub flush_all_streams: bool,
    /// Concurrent stream flushes, 0 for automatic
    #[serde(default)]
    pub parallelism: usize,
    #[serde(default = "default_max_parallelism")]
    pub max_parallelism: usize,

    // Behaviour
    #[serde(default)]
    pub disable_table_cache: bool,
    #[serde(default)]
    pub add_metadata_columns: bool,
    #[serde(default)]
    pub hard_delete: bool,
    #[serde(default)]
    pub data_flattening_max_level: usize,
    #[serde(default = "default_true")]
    pub primary_key_required: bool,
    #[serde(default)]
    pub validate_records: bool,
    #[serde(default)]
    pub invalid_record_strategy: InvalidRecordStrategy,
    #[serde(default)]
    pub skip_updates: bool,
}

fn default_batch_size_rows() -> usize {
    100_000
}

fn default_max_parallelism() -> usize {
    16
}

fn default_true() -> bool {
    true
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            warehouse_type: WarehouseType::default(),
            host: None,
            port: None,
            user: None,
            password: None,
            dbname: None,
            s3_bucket: None,
            s3_key_prefix: None,
            aws_access_key_id: None,
            aws_secret_access_key: None,
            aws_session_token: None,
            aws_redshift_copy_role_arn: None,
            aws_region: None,
            copy_options: None,
            use_local_copy: false,
            temp_dir: None,
            default_target_schema: None,
            default_target_schema_select_permission: None,
            schema_mapping: BTreeMap::new(),
            batch_size_rows: default_batch_size_rows(),
            batch_wait_limit_seconds: None,
            flush_all_streams: false,
            parallelism: 0,
            max_parallelism: default_max_parallelism(),
            disable_table_cache: false,
            add_metadata_columns: false,
            hard_delete: false,
            data_flattening_max_level: 0,
            primary_key_required: true,
            validate_records: false,
            invalid_record_strategy: InvalidRecordStrategy::default(),
            skip_updates: false,
        }
    }
}

/// Ports are accepted both as numbers and as strings
fn deserialize_port<'de, D>(deserializer: D) -> std::result::Result<Option<u16>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Port {
        Number(u16),
        Text(String),
    }

    match Option::<Port>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Port::Number(port)) => Ok(Some(port)),
        Some(Port::Text(text)) => text
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| serde::de::Error::custom(format!("invalid port '{text}'"))),
    }
}

// ============================================================================
// Target Schemas
// ============================================================================

/// Target of one source schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaMapping {
    pub target_schema: String,
    #[serde(default)]
    pub target_schema_select_permission: Option<SelectPermission>,
}

/// Who gets SELECT on loaded schemas and tables
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SelectPermission {
    /// A single user
    User(String),
    /// Several users
    Users(Vec<String>),
    /// Users and groups
    Grantees {
        #[serde(default)]
        users: Vec<String>,
        #[serde(default)]
        groups: Vec<String>,
    },
}

impl SelectPermission {
    /// Grantee clauses (`"user"` or `GROUP "group"`)
    pub fn grantees(&self) -> impl Iterator<Item = String> + '_ {
        let (users, groups): (Vec<&String>, Vec<&String>) = match self {
            SelectPermission::User(user) => (vec![user], Vec::new()),
            SelectPermission::Users(users) => (users.iter().collect(), Vec::new()),
            SelectPermission::Grantees { users, groups } => {
                (users.iter().collect(), groups.iter().collect())
            }
        };
        users
            .into_iter()
            .map(|u| grantee(u, false))
            .chain(groups.into_iter().map(|g| grantee(g, true)))
    }
}

/// Resolved destination schema of a stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetSchema {
    pub name: String,
    pub select_permission: Option<SelectPermission>,
}

impl LoaderConfig {
    /// Load and validate configuration from a JSON file
    pub async fn from_file(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            Error::config(format!("Failed to read config {}: {e}", path.display()))
        })?;
        let value: JsonValue = serde_json::from_str(&content)
            .map_err(|e| Error::config(format!("Config is not valid JSON: {e}")))?;
        Self::from_value(&value)
    }

    /// Validate and deserialize configuration
    pub fn from_value(value: &JsonValue) -> Result<Self> {
        let errors = validate_config(value);
        if !errors.is_empty() {
            return Err(Error::config(format!(
                "Invalid configuration:\n  {}",
                errors.join("\n  ")
            )));
        }

        serde_json::from_value(value.clone()).map_err(|e| Error::InvalidConfigValue {
            field: "config".to_string(),
            message: e.to_string(),
        })
    }

    /// All target schemas named in the configuration
    pub fn schema_names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        let configured = self
            .default_target_schema
            .iter()
            .chain(self.schema_mapping.values().map(|m| &m.target_schema));
        for name in configured {
            if !names.contains(name) {
                names.push(name.clone());
            }
        }
        names
    }

    /// Destination schema of a stream.
    ///
    /// The stream's source schema is looked up in `schema_mapping` first, then
    /// `default_target_schema` applies.
    pub fn target_schema(&self, stream_name: &str) -> Result<TargetSchema> {
        let source_schema = stream_name_to_dict(stream_name, STREAM_NAME_SEPARATOR).schema_name;

        if let Some(mapping) = source_schema
            .as_ref()
            .and_then(|s| self.schema_mapping.get(s))
        {
            return Ok(TargetSchema {
                name: mapping.target_schema.clone(),
                select_permission: mapping.target_schema_select_permission.clone(),
            });
        }

        match self.default_target_schema.clone().none_if_empty() {
            Some(name) => Ok(TargetSchema {
                name,
                select_permission: self.default_target_schema_select_permission.clone(),
            }),
            None => Err(Error::config(format!(
                "Target schema name not defined in config. Neither 'default_target_schema' \
                 (string) nor 'schema_mapping' (object) defines target schema for {stream_name} stream."
            ))),
        }
    }

    /// Number of stream flushes to run at once
    pub fn effective_parallelism(&self, streams: usize) -> usize {
        let limit = if self.parallelism == 0 {
            streams.min(self.max_parallelism)
        } else {
            self.parallelism
        };
        limit.max(1)
    }

    /// Whether the `_sdc_*` columns are added to every stream
    pub fn metadata_columns_enabled(&self) -> bool {
        self.add_metadata_columns || self.hard_delete
    }

    /// Copy options for Redshift COPY
    pub fn copy_options(&self) -> String {
        self.copy_options
            .clone()
            .none_if_empty()
            .unwrap_or_else(|| DEFAULT_COPY_OPTIONS.to_string())
    }

    /// Credentials clause for Redshift COPY
    pub fn copy_credentials(&self) -> Result<CopyCredentials> {
        if let Some(arn) = self.aws_redshift_copy_role_arn.clone().none_if_empty() {
            return Ok(CopyCredentials::IamRole(arn));
        }

        let access_key_id = self
            .aws_access_key_id
            .clone()
            .or_else(|| std::env::var("AWS_ACCESS_KEY_ID").ok())
            .none_if_empty()
            .ok_or_else(|| Error::missing_field("aws_access_key_id"))?;
        let secret_access_key = self
            .aws_secret_access_key
            .clone()
            .or_else(|| std::env::var("AWS_SECRET_ACCESS_KEY").ok())
            .none_if_empty()
            .ok_or_else(|| Error::missing_field("aws_secret_access_key"))?;
        let session_token = self
            .aws_session_token
            .clone()
            .or_else(|| std::env::var("AWS_SESSION_TOKEN").ok())
            .none_if_empty();

        Ok(CopyCredentials::Keys {
            access_key_id,
            secret_access_key,
            session_token,
        })
    }
}

// ============================================================================
// Validation
// ============================================================================

const CONNECTION_KEYS: [&str; 5] = ["host", "port", "user", "password", "dbname"];

/// Validate raw configuration, returning every problem found
pub fn validate_config(config: &JsonValue) -> Vec<String> {
    let mut errors = Vec::new();

    let Some(object) = config.as_object() else {
        return vec!["Config must be a JSON object".to_string()];
    };

    let warehouse_type = match object.get("warehouse_type") {
        None | Some(JsonValue::Null) => WarehouseType::default(),
        Some(value) => match serde_json::from_value::<WarehouseType>(value.clone()) {
            Ok(kind) => kind,
            Err(_) => {
                errors.push(format!(
                    "Invalid warehouse_type {value}, expected one of redshift, postgres, duckdb"
                ));
                WarehouseType::default()
            }
        },
    };

    let required: &[&str] = match warehouse_type {
        WarehouseType::Redshift | WarehouseType::Postgres => &CONNECTION_KEYS,
        WarehouseType::Duckdb => &["dbname"],
    };
    for key in required {
        if is_blank(object.get(*key)) {
            errors.push(format!("Required key is missing from config: [{key}]"));
        }
    }

    let use_local_copy = object
        .get("use_local_copy")
        .and_then(JsonValue::as_bool)
        .unwrap_or(false);
    match warehouse_type {
        WarehouseType::Redshift if use_local_copy => {
            errors.push("use_local_copy is not supported by the redshift warehouse".to_string());
        }
        WarehouseType::Duckdb if !use_local_copy => {
            errors.push("The duckdb warehouse requires use_local_copy".to_string());
        }
        _ => {}
    }
    if !use_local_copy && is_blank(object.get("s3_bucket")) {
        errors.push("Required key is missing from config: [s3_bucket]".to_string());
    }

    let has_default_schema = !is_blank(object.get("default_target_schema"));
    match object.get("schema_mapping") {
        None | Some(JsonValue::Null) if !has_default_schema => errors.push(
            "Neither 'default_target_schema' (string) nor 'schema_mapping' (object) keys set in config."
                .to_string(),
        ),
        None | Some(JsonValue::Null) => {}
        Some(JsonValue::Object(mapping)) => {
            for (source, target) in mapping {
                if is_blank(target.get("target_schema")) {
                    errors.push(format!(
                        "schema_mapping.{source} has no 'target_schema' string"
                    ));
                }
            }
        }
        Some(_) => errors.push("'schema_mapping' must be an object".to_string()),
    }

    if let Some(strategy) = object.get("invalid_record_strategy") {
        if serde_json::from_value::<InvalidRecordStrategy>(strategy.clone()).is_err() {
            errors.push(format!(
                "Invalid invalid_record_strategy {strategy}, expected fail or skip"
            ));
        }
    }

    errors
}

fn is_blank(value: Option<&JsonValue>) -> bool {
    match value {
        None | Some(JsonValue::Null) => true,
        Some(JsonValue::String(s)) => s.trim().is_empty(),
        Some(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn minimal_config() -> JsonValue {
        json!({
            "host": "localhost",
            "port": 5439,
            "user": "loader",
            "password": "secret",
            "dbname": "dev",
            "s3_bucket": "staging-bucket",
            "default_target_schema": "analytics"
        })
    }

    #[tokio::test]
    async fn test_from_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("config.json");
        tokio::fs::write(&path, minimal_config().to_string()).await.unwrap();

        let config = LoaderConfig::from_file(&path).await.unwrap();
        assert_eq!(config.default_target_schema.as_deref(), Some("analytics"));

        let missing = LoaderConfig::from_file(&temp_dir.path().join("nope.json")).await;
        assert!(matches!(missing, Err(Error::Config { .. })));

        tokio::fs::write(&path, "{not json").await.unwrap();
        let invalid = LoaderConfig::from_file(&path).await;
        assert!(matches!(invalid, Err(Error::Config { .. })));
    }

    #[test]
    fn test_minimal_config_is_valid() {
        assert!(validate_config(&minimal_config()).is_empty());

        let config = LoaderConfig::from_value(&minimal_config()).unwrap();
        assert_eq!(config.warehouse_type, WarehouseType::Redshift);
        assert_eq!(config.port, Some(5439));
        assert_eq!(config.batch_size_rows, 100_000);
        assert_eq!(config.max_parallelism, 16);
        assert!(config.primary_key_required);
        assert!(!config.hard_delete);
    }

    #[test]
    fn test_missing_required_keys() {
        let mut config = minimal_config();
        let object = config.as_object_mut().unwrap();
        object.remove("host");
        object.remove("s3_bucket");

        let errors = validate_config(&config);
        assert_eq!(
            errors,
            vec![
                "Required key is missing from config: [host]".to_string(),
                "Required key is missing from config: [s3_bucket]".to_string(),
            ]
        );
        assert!(LoaderConfig::from_value(&config)
            .unwrap_err()
            .is_fatal_before_start());
    }

    #[test]
    fn test_target_schema_required() {
        let mut config = minimal_config();
        config.as_object_mut().unwrap().remove("default_target_schema");
        assert_eq!(validate_config(&config).len(), 1);

        config["schema_mapping"] = json!({"tap_mysql": {"target_schema": "mysql_data"}});
        assert!(validate_config(&config).is_empty());
    }

    #[test]
    fn test_local_copy_rules() {
        let mut config = minimal_config();
        config["use_local_copy"] = json!(true);
        assert_eq!(validate_config(&config).len(), 1);

        config["warehouse_type"] = json!("postgres");
        assert!(validate_config(&config).is_empty());

        let duckdb = json!({
            "warehouse_type": "duckdb",
            "dbname": ":memory:",
            "default_target_schema": "main"
        });
        assert_eq!(
            validate_config(&duckdb),
            vec![
                "The duckdb warehouse requires use_local_copy".to_string(),
                "Required key is missing from config: [s3_bucket]".to_string(),
            ]
        );
    }

    #[test]
    fn test_port_as_string() {
        let mut config = minimal_config();
        config["port"] = json!("5432");
        let config = LoaderConfig::from_value(&config).unwrap();
        assert_eq!(config.port, Some(5432));
    }

    #[test]
    fn test_schema_names() {
        assert!(LoaderConfig::default().schema_names().is_empty());

        let mut config = minimal_config();
        config["schema_mapping"] = json!({
            "tap_mysql": {"target_schema": "mysql_data"},
            "tap_pg": {"target_schema": "analytics"}
        });
        let config = LoaderConfig::from_value(&config).unwrap();
        assert_eq!(config.schema_names(), vec!["analytics", "mysql_data"]);
    }

    #[test]
    fn test_target_schema_resolution() {
        let mut config = minimal_config();
        config["schema_mapping"] = json!({
            "tap_mysql": {
                "target_schema": "mysql_data",
                "target_schema_select_permission": {"groups": ["readers"]}
            }
        });
        let config = LoaderConfig::from_value(&config).unwrap();

        let mapped = config.target_schema("tap_mysql-orders").unwrap();
        assert_eq!(mapped.name, "mysql_data");
        assert_eq!(
            mapped.select_permission,
            Some(SelectPermission::Grantees {
                users: Vec::new(),
                groups: vec!["readers".to_string()]
            })
        );

        let fallback = config.target_schema("other-orders").unwrap();
        assert_eq!(fallback.name, "analytics");
        assert_eq!(config.target_schema("orders").unwrap().name, "analytics");

        let no_default = LoaderConfig {
            default_target_schema: None,
            ..config
        };
        assert!(no_default.target_schema("orders").is_err());
    }

    #[test]
    fn test_select_permission_grantees() {
        let single: SelectPermission = serde_json::from_value(json!("bi_user")).unwrap();
        assert_eq!(single.grantees().collect::<Vec<_>>(), vec!["\"bi_user\""]);

        let split: SelectPermission =
            serde_json::from_value(json!({"users": ["a"], "groups": ["g"]})).unwrap();
        assert_eq!(
            split.grantees().collect::<Vec<_>>(),
            vec!["\"a\"".to_string(), "GROUP \"g\"".to_string()]
        );
    }

    #[test]
    fn test_effective_parallelism() {
        let mut config = LoaderConfig::default();
        assert_eq!(config.effective_parallelism(3), 3);
        assert_eq!(config.effective_parallelism(40), 16);
        assert_eq!(config.effective_parallelism(0), 1);

        config.parallelism = 2;
        assert_eq!(config.effective_parallelism(40), 2);
    }

    #[test]
    fn test_copy_options_default() {
        let mut config = LoaderConfig::default();
        assert_eq!(config.copy_options(), DEFAULT_COPY_OPTIONS);

        config.copy_options = Some("EMPTYASNULL".to_string());
        assert_eq!(config.copy_options(), "EMPTYASNULL");
    }

    #[test]
    fn test_copy_credentials_prefers_role() {
        let config = LoaderConfig {
            aws_redshift_copy_role_arn: Some("arn:aws:iam::1:role/copy".to_string()),
            ..LoaderConfig::default()
        };
        assert_eq!(
            config.copy_credentials().unwrap(),
            CopyCredentials::IamRole("arn:aws:iam::1:role/copy".to_string())
        );
    }
}
