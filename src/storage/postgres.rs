//! PostgreSQL result store
//!
//! Reports and metrics are stored as JSONB. Tables are created on connect.

use super::{MetricsRecord, StorageBackend, StorageError};
use crate::analysis::types::AnalysisReport;
use crate::config::DatabaseConfig;
use async_trait::async_trait;
use deadpool_postgres::{Config, ManagerConfig, Pool, PoolConfig, RecyclingMethod, Runtime, Timeouts};
use serde_json::Value;
use tracing::info;

pub struct PostgresStorage {
    pool: Pool,
}

impl PostgresStorage {
    /// Create the pool, verify the connection and make sure the tables exist
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, StorageError> {
        let pool = create_pool(config)?;
        let storage = Self { pool };
        storage.initialize().await?;

        info!(
            host = %config.host,
            database = %config.database,
            tls = config.require_tls,
            "PostgreSQL result storage ready"
        );
        Ok(storage)
    }

    async fn initialize(&self) -> Result<(), StorageError> {
        let client = self.pool.get().await?;

        client
            .batch_execute(
                "CREATE TABLE IF NOT EXISTS analysis_results (
                    session_id VARCHAR(255) PRIMARY KEY,
                    result JSONB NOT NULL,
                    created_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP
                );
                CREATE TABLE IF NOT EXISTS analysis_metrics (
                    id SERIAL PRIMARY KEY,
                    timestamp TIMESTAMPTZ NOT NULL,
                    metrics JSONB NOT NULL
                );",
            )
            .await?;

        Ok(())
    }
}

fn create_pool(config: &DatabaseConfig) -> Result<Pool, StorageError> {
    let mut cfg = Config::new();
    cfg.host = Some(config.host.clone());
    cfg.port = Some(config.port);
    cfg.user = Some(config.user.clone());
    cfg.password = Some(config.password.clone());
    cfg.dbname = Some(config.database.clone());
    cfg.manager = Some(ManagerConfig {
        recycling_method: RecyclingMethod::Fast,
    });
    cfg.connect_timeout = Some(config.connect_timeout());

    // an unreachable server must fail a checkout instead of stalling it
    let mut timeouts = Timeouts::new();
    timeouts.wait = Some(config.connect_timeout());
    timeouts.create = Some(config.connect_timeout());
    timeouts.recycle = Some(config.connect_timeout());

    let mut pool_config = PoolConfig::new(config.max_pool_size);
    pool_config.timeouts = timeouts;
    cfg.pool = Some(pool_config);

    let pool = if config.require_tls {
        let certs = rustls_native_certs::load_native_certs();
        let mut root_store = rustls::RootCertStore::empty();
        for cert in certs.certs {
            root_store.add(cert).ok();
        }

        let tls_config = rustls::ClientConfig::builder()
            .with_root_certificates(root_store)
            .with_no_client_auth();

        let tls = tokio_postgres_rustls::MakeRustlsConnect::new(tls_config);
        cfg.create_pool(Some(Runtime::Tokio1), tls)?
    } else {
        cfg.create_pool(Some(Runtime::Tokio1), tokio_postgres::NoTls)?
    };

    Ok(pool)
}

#[async_trait]
impl StorageBackend for PostgresStorage {
    async fn store_result(&self, session_id: &str, report: &AnalysisReport) -> Result<(), StorageError> {
        let result = serde_json::to_value(report)?;
        let client = self.pool.get().await?;

        client
            .execute(
                "INSERT INTO analysis_results (session_id, result)
                 VALUES ($1, $2)
                 ON CONFLICT (session_id) DO UPDATE SET result = $2",
                &[&session_id, &result],
            )
            .await?;

        Ok(())
    }

    async fn retrieve_result(&self, session_id: &str) -> Result<Option<AnalysisReport>, StorageError> {
        let client = self.pool.get().await?;

        let row = client
            .query_opt(
                "SELECT result FROM analysis_results WHERE session_id = $1",
                &[&session_id],
            )
            .await?;

        match row {
            Some(row) => {
                let value: Value = row.get(0);
                Ok(Some(serde_json::from_value(value)?))
            }
            None => Ok(None),
        }
    }

    async fn store_metrics(&self, record: &MetricsRecord) -> Result<(), StorageError> {
        let metrics = serde_json::to_value(record)?;
        let client = self.pool.get().await?;

        client
            .execute(
                "INSERT INTO analysis_metrics (timestamp, metrics) VALUES ($1, $2)",
                &[&record.timestamp, &metrics],
            )
            .await?;

        Ok(())
    }
}
