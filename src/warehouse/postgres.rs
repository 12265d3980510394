//! Redshift and PostgreSQL warehouse over the PostgreSQL wire protocol
//!
//! Each call opens its own connection, so concurrent stream flushes never
//! share a session.

use super::{catalog_columns, CatalogColumn, Warehouse};
use crate::config::LoaderConfig;
use crate::error::{Error, Result};
use crate::sql::{copy_from_s3, copy_from_stdin, select_columns, CopyCredentials, Dialect, TableRef};
use crate::staging::{StagedLocation, StagedObject};
use crate::types::WarehouseType;
use async_trait::async_trait;
use bytes::Bytes;
use futures::SinkExt;
use tokio_postgres::{Client, NoTls};

/// Connection settings for a Redshift or PostgreSQL warehouse
#[derive(Clone)]
pub struct PostgresWarehouse {
    config: tokio_postgres::Config,
    dialect: Dialect,
    copy_credentials: Option<CopyCredentials>,
    copy_options: String,
}

impl std::fmt::Debug for PostgresWarehouse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresWarehouse")
            .field("hosts", &self.config.get_hosts())
            .field("dbname", &self.config.get_dbname())
            .field("dialect", &self.dialect)
            .finish_non_exhaustive()
    }
}

impl PostgresWarehouse {
    /// Build connection settings from the loader config
    pub fn from_config(config: &LoaderConfig) -> Result<Self> {
        let mut pg = tokio_postgres::Config::new();
        pg.host(config.host.as_deref().ok_or_else(|| Error::missing_field("host"))?)
            .port(config.port.ok_or_else(|| Error::missing_field("port"))?)
            .user(config.user.as_deref().ok_or_else(|| Error::missing_field("user"))?)
            .password(config.password.as_deref().unwrap_or_default())
            .dbname(config.dbname.as_deref().ok_or_else(|| Error::missing_field("dbname"))?)
            .application_name("redshift-loader");

        let dialect = Dialect::from(config.warehouse_type);
        let copy_credentials = if config.warehouse_type == WarehouseType::Redshift {
            Some(config.copy_credentials()?)
        } else {
            None
        };

        Ok(Self {
            config: pg,
            dialect,
            copy_credentials,
            copy_options: config.copy_options(),
        })
    }

    /// Build connection settings from a connection URL (`postgresql://...`)
    pub fn from_url(url: &str, dialect: Dialect) -> Result<Self> {
        let config: tokio_postgres::Config = url
            .parse()
            .map_err(|e| Error::config(format!("Invalid connection URL: {e}")))?;
        Ok(Self {
            config,
            dialect,
            copy_credentials: None,
            copy_options: String::new(),
        })
    }

    async fn connect(&self) -> Result<Client> {
        let (client, connection) = self
            .config
            .connect(NoTls)
            .await
            .map_err(|e| Error::warehouse(format!("Failed to connect: {e}")))?;

        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::error!("Warehouse connection error: {}", e);
            }
        });

        Ok(client)
    }
}

#[async_trait]
impl Warehouse for PostgresWarehouse {
    fn dialect(&self) -> Dialect {
        self.dialect
    }

    async fn execute(&self, sql: &str) -> Result<()> {
        let client = self.connect().await?;
        tracing::debug!("Executing: {}", sql);
        client
            .batch_execute(sql)
            .await
            .map_err(|e| Error::warehouse(e.to_string()))
    }

    async fn execute_in_transaction(&self, statements: &[String]) -> Result<()> {
        let mut client = self.connect().await?;
        let tx = client
            .transaction()
            .await
            .map_err(|e| Error::warehouse(format!("Failed to begin transaction: {e}")))?;

        for sql in statements {
            tracing::debug!("Executing in transaction: {}", sql);
            tx.batch_execute(sql)
                .await
                .map_err(|e| Error::warehouse(e.to_string()))?;
        }

        tx.commit()
            .await
            .map_err(|e| Error::warehouse(format!("Failed to commit: {e}")))
    }

    async fn columns(&self, schemas: &[String], table: Option<&str>) -> Result<Vec<CatalogColumn>> {
        if schemas.is_empty() {
            return Ok(Vec::new());
        }

        let client = self.connect().await?;
        let sql = select_columns(schemas, table);
        tracing::debug!("Executing query: {}", sql);
        let rows = client
            .query(sql.as_str(), &[])
            .await
            .map_err(|e| Error::warehouse(format!("Failed to read catalog: {e}")))?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            let entry: [String; 4] = [
                row.try_get(0).map_err(|e| Error::warehouse(e.to_string()))?,
                row.try_get(1).map_err(|e| Error::warehouse(e.to_string()))?,
                row.try_get(2).map_err(|e| Error::warehouse(e.to_string()))?,
                row.try_get(3).map_err(|e| Error::warehouse(e.to_string()))?,
            ];
            entries.push(entry);
        }

        Ok(catalog_columns(self.dialect, entries))
    }

    async fn copy_into(
        &self,
        table: &TableRef,
        columns: &[String],
        object: &StagedObject,
    ) -> Result<u64> {
        let client = self.connect().await?;

        match (self.dialect, &object.location) {
            (Dialect::Redshift, StagedLocation::S3 { bucket, key }) => {
                let credentials = self
                    .copy_credentials
                    .as_ref()
                    .ok_or_else(|| Error::load(table.to_string(), "No COPY credentials configured"))?;
                let sql = copy_from_s3(table, columns, bucket, key, credentials, &self.copy_options);
                tracing::debug!("Executing COPY from {}", object.location);
                client
                    .execute(sql.as_str(), &[])
                    .await
                    .map_err(|e| Error::warehouse(e.to_string()))
            }
            (Dialect::Redshift, StagedLocation::Local(_)) => Err(Error::load(
                table.to_string(),
                "Redshift can only load from S3",
            )),
            _ => {
                let sql = copy_from_stdin(table, columns);
                tracing::debug!("Executing: {}", sql);
                let sink = client
                    .copy_in::<_, Bytes>(sql.as_str())
                    .await
                    .map_err(|e| Error::warehouse(e.to_string()))?;
                futures::pin_mut!(sink);
                sink.send(object.data.clone())
                    .await
                    .map_err(|e| Error::warehouse(e.to_string()))?;
                sink.as_mut()
                    .finish()
                    .await
                    .map_err(|e| Error::warehouse(e.to_string()))
            }
        }
    }
}
