//! PostgreSQL-backed stores for the service's own (local) database.
//!
//! ## Configuration
//!
//! All settings can be configured via environment variables:
//! - `DATABASE_URL`: PostgreSQL connection string (required)
//! - `DB_MAX_CONNECTIONS`: Maximum pool size (default: 10)
//! - `DB_MIN_CONNECTIONS`: Minimum idle connections (default: 2)
//! - `DB_CONNECT_TIMEOUT_SECS`: Connection timeout (default: 10)
//! - `DB_IDLE_TIMEOUT_SECS`: Idle connection timeout (default: 300)
//! - `DB_MAX_LIFETIME_SECS`: Max connection lifetime (default: 1800)

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Row;
use uuid::Uuid;

use crate::hash::Digest;
use crate::types::{
    AttributeValue, ConnectionDescriptor, ConnectionStatus, Dataset, DatasetId, Diff, DiffId, DiffType,
    EncryptPreference, Finding, FindingId, FindingSummary, ReviewStatus, Snapshot, SnapshotId,
};

use super::{DatasetStore, DiffFilter, DiffStore, FindingStore, SnapshotStore};

/// Connection-pool configuration, loaded once from the environment via
/// `PostgresConfig::from_env()`.
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_secs: u64,
    pub idle_timeout_secs: u64,
    pub max_lifetime_secs: u64,
}

impl PostgresConfig {
    pub fn from_env() -> Self {
        Self {
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "postgresql://localhost/geowatch".to_string()),
            max_connections: std::env::var("DB_MAX_CONNECTIONS").ok().and_then(|s| s.parse().ok()).unwrap_or(10),
            min_connections: std::env::var("DB_MIN_CONNECTIONS").ok().and_then(|s| s.parse().ok()).unwrap_or(2),
            connect_timeout_secs: std::env::var("DB_CONNECT_TIMEOUT_SECS").ok().and_then(|s| s.parse().ok()).unwrap_or(10),
            idle_timeout_secs: std::env::var("DB_IDLE_TIMEOUT_SECS").ok().and_then(|s| s.parse().ok()).unwrap_or(300),
            max_lifetime_secs: std::env::var("DB_MAX_LIFETIME_SECS").ok().and_then(|s| s.parse().ok()).unwrap_or(1800),
        }
    }
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

/// Error type shared by every PostgreSQL-backed store.
#[derive(Debug, thiserror::Error)]
pub enum PostgresStoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("stored attribute value for column {0} could not be decoded")]
    BadAttributeValue(String),
}

/// All four entity stores share one connection pool; this mirrors the
/// teacher's single `PostgresGraphStore` wrapping one `PgPool`.
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub async fn new(config: PostgresConfig) -> Result<Self, sqlx::Error> {
        tracing::info!(
            max_connections = config.max_connections,
            min_connections = config.min_connections,
            "initializing PostgreSQL connection pool"
        );

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
            .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
            .max_lifetime(Duration::from_secs(config.max_lifetime_secs))
            .test_before_acquire(true)
            .connect(&config.database_url)
            .await?;

        Ok(Self { pool })
    }

    pub async fn from_env() -> Result<Self, sqlx::Error> {
        Self::new(PostgresConfig::from_env()).await
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn is_healthy(&self) -> bool {
        sqlx::query("SELECT 1").fetch_one(&self.pool).await.is_ok()
    }

    /// Ensure the service's own schema and the `postgis` extension exist.
    /// Idempotent; safe to call on every boot ahead of
    /// [`crate::lifecycle::LifecycleManager`]'s restart pass.
    pub async fn bootstrap(&self) -> Result<(), sqlx::Error> {
        sqlx::query("CREATE EXTENSION IF NOT EXISTS postgis").execute(&self.pool).await?;
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS datasets (
                id uuid PRIMARY KEY,
                name text NOT NULL,
                host text NOT NULL,
                port integer NOT NULL,
                database text NOT NULL,
                schema_name text NOT NULL,
                table_name text NOT NULL,
                geometry_column text NOT NULL,
                encrypt text NOT NULL,
                check_interval_minutes bigint NOT NULL,
                active boolean NOT NULL,
                created_at timestamptz NOT NULL,
                last_check_at timestamptz,
                connection_status text NOT NULL,
                connection_error text,
                last_connection_test timestamptz
            )
            "#,
        )
        .execute(&self.pool)
        .await?;
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS snapshots (
                id uuid PRIMARY KEY,
                dataset_id uuid NOT NULL REFERENCES datasets(id),
                source_row_id text,
                geometry_hash text NOT NULL,
                attributes_hash text NOT NULL,
                composite_hash text NOT NULL,
                geometry_wkb bytea NOT NULL,
                attributes jsonb NOT NULL,
                created_at timestamptz NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS snapshots_dataset_geometry_hash_idx ON snapshots (dataset_id, geometry_hash)")
            .execute(&self.pool)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS snapshots_dataset_composite_hash_idx ON snapshots (dataset_id, composite_hash)")
            .execute(&self.pool)
            .await?;
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS diffs (
                id uuid PRIMARY KEY,
                dataset_id uuid NOT NULL REFERENCES datasets(id),
                diff_type text NOT NULL,
                old_snapshot_id uuid,
                new_snapshot_id uuid,
                geometry_hash text NOT NULL,
                geometry_changed boolean NOT NULL,
                attributes_changed boolean NOT NULL,
                confidence_score double precision NOT NULL,
                review_status text NOT NULL,
                reviewer text,
                reviewed_at timestamptz,
                created_at timestamptz NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS findings (
                id uuid PRIMARY KEY,
                dataset_id uuid NOT NULL REFERENCES datasets(id),
                snapshot_id uuid NOT NULL,
                category text NOT NULL,
                result text NOT NULL,
                message text NOT NULL,
                detail jsonb NOT NULL,
                created_at timestamptz NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    fn parse_dataset_row(row: &sqlx::postgres::PgRow) -> Result<Dataset, sqlx::Error> {
        let encrypt: String = row.try_get("encrypt")?;
        let connection_status: String = row.try_get("connection_status")?;
        Ok(Dataset {
            id: DatasetId::new(row.try_get("id")?),
            name: row.try_get("name")?,
            connection: ConnectionDescriptor {
                host: row.try_get("host")?,
                port: row.try_get::<i32, _>("port")? as u16,
                database: row.try_get("database")?,
                schema: row.try_get("schema_name")?,
                table: row.try_get("table_name")?,
                geometry_column: row.try_get("geometry_column")?,
                encrypt: match encrypt.as_str() {
                    "disable" => EncryptPreference::Disable,
                    "require" => EncryptPreference::Require,
                    _ => EncryptPreference::Prefer,
                },
            },
            check_interval_minutes: row.try_get("check_interval_minutes")?,
            active: row.try_get("active")?,
            created_at: row.try_get("created_at")?,
            last_check_at: row.try_get("last_check_at")?,
            connection_status: match connection_status.as_str() {
                "ok" => ConnectionStatus::Ok,
                "failed" => ConnectionStatus::Failed,
                _ => ConnectionStatus::Unknown,
            },
            connection_error: row.try_get("connection_error")?,
            last_connection_test: row.try_get("last_connection_test")?,
        })
    }

    fn parse_snapshot_row(row: &sqlx::postgres::PgRow) -> Result<Snapshot, sqlx::Error> {
        let attrs_json: serde_json::Value = row.try_get("attributes")?;
        let attributes: BTreeMap<String, AttributeValue> =
            serde_json::from_value(attrs_json).unwrap_or_default();
        let geometry_hash: String = row.try_get("geometry_hash")?;
        let attributes_hash: String = row.try_get("attributes_hash")?;
        let composite_hash: String = row.try_get("composite_hash")?;
        Ok(Snapshot {
            id: SnapshotId::new(row.try_get("id")?),
            dataset_id: DatasetId::new(row.try_get("dataset_id")?),
            source_row_id: row.try_get("source_row_id")?,
            geometry_hash: geometry_hash.parse().unwrap_or_else(|_| Digest::of_bytes(b"")),
            attributes_hash: attributes_hash.parse().unwrap_or_else(|_| Digest::of_bytes(b"")),
            composite_hash: composite_hash.parse().unwrap_or_else(|_| Digest::of_bytes(b"")),
            geometry_wkb: row.try_get("geometry_wkb")?,
            attributes,
            created_at: row.try_get("created_at")?,
        })
    }

    fn parse_diff_row(row: &sqlx::postgres::PgRow) -> Result<Diff, sqlx::Error> {
        let diff_type: String = row.try_get("diff_type")?;
        let review_status: String = row.try_get("review_status")?;
        let geometry_hash: String = row.try_get("geometry_hash")?;
        Ok(Diff {
            id: DiffId::new(row.try_get("id")?),
            dataset_id: DatasetId::new(row.try_get("dataset_id")?),
            diff_type: diff_type.parse().unwrap_or(DiffType::Updated),
            old_snapshot_id: row.try_get::<Option<Uuid>, _>("old_snapshot_id")?.map(SnapshotId::new),
            new_snapshot_id: row.try_get::<Option<Uuid>, _>("new_snapshot_id")?.map(SnapshotId::new),
            geometry_hash: geometry_hash.parse().unwrap_or_else(|_| Digest::of_bytes(b"")),
            geometry_changed: row.try_get("geometry_changed")?,
            attributes_changed: row.try_get("attributes_changed")?,
            confidence_score: row.try_get("confidence_score")?,
            review_status: match review_status.as_str() {
                "ACCEPTED" => ReviewStatus::Accepted,
                "REJECTED" => ReviewStatus::Rejected,
                _ => ReviewStatus::Pending,
            },
            reviewer: row.try_get("reviewer")?,
            reviewed_at: row.try_get("reviewed_at")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

#[async_trait]
impl DatasetStore for PostgresStore {
    type Error = PostgresStoreError;

    async fn create(&self, dataset: Dataset) -> Result<Dataset, Self::Error> {
        sqlx::query(
            r#"
            INSERT INTO datasets (
                id, name, host, port, database, schema_name, table_name, geometry_column,
                encrypt, check_interval_minutes, active, created_at, last_check_at,
                connection_status, connection_error, last_connection_test
            ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15,$16)
            "#,
        )
        .bind(dataset.id.as_uuid())
        .bind(&dataset.name)
        .bind(&dataset.connection.host)
        .bind(dataset.connection.port as i32)
        .bind(&dataset.connection.database)
        .bind(&dataset.connection.schema)
        .bind(&dataset.connection.table)
        .bind(&dataset.connection.geometry_column)
        .bind(encrypt_str(dataset.connection.encrypt))
        .bind(dataset.check_interval_minutes)
        .bind(dataset.active)
        .bind(dataset.created_at)
        .bind(dataset.last_check_at)
        .bind(connection_status_str(dataset.connection_status))
        .bind(&dataset.connection_error)
        .bind(dataset.last_connection_test)
        .execute(&self.pool)
        .await?;
        Ok(dataset)
    }

    async fn get(&self, id: &DatasetId) -> Result<Option<Dataset>, Self::Error> {
        let row = sqlx::query("SELECT * FROM datasets WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::parse_dataset_row).transpose().map_err(PostgresStoreError::from)
    }

    async fn list_active(&self) -> Result<Vec<Dataset>, Self::Error> {
        let rows = sqlx::query("SELECT * FROM datasets WHERE active = true ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(Self::parse_dataset_row).collect::<Result<Vec<_>, _>>().map_err(PostgresStoreError::from)
    }

    async fn list_all(&self) -> Result<Vec<Dataset>, Self::Error> {
        let rows = sqlx::query("SELECT * FROM datasets ORDER BY id").fetch_all(&self.pool).await?;
        rows.iter().map(Self::parse_dataset_row).collect::<Result<Vec<_>, _>>().map_err(PostgresStoreError::from)
    }

    async fn update(&self, dataset: Dataset) -> Result<Dataset, Self::Error> {
        sqlx::query(
            r#"
            UPDATE datasets SET
                name = $2, host = $3, port = $4, database = $5, schema_name = $6,
                table_name = $7, geometry_column = $8, encrypt = $9,
                check_interval_minutes = $10, active = $11, last_check_at = $12,
                connection_status = $13, connection_error = $14, last_connection_test = $15
            WHERE id = $1
            "#,
        )
        .bind(dataset.id.as_uuid())
        .bind(&dataset.name)
        .bind(&dataset.connection.host)
        .bind(dataset.connection.port as i32)
        .bind(&dataset.connection.database)
        .bind(&dataset.connection.schema)
        .bind(&dataset.connection.table)
        .bind(&dataset.connection.geometry_column)
        .bind(encrypt_str(dataset.connection.encrypt))
        .bind(dataset.check_interval_minutes)
        .bind(dataset.active)
        .bind(dataset.last_check_at)
        .bind(connection_status_str(dataset.connection_status))
        .bind(&dataset.connection_error)
        .bind(dataset.last_connection_test)
        .execute(&self.pool)
        .await?;
        Ok(dataset)
    }

    async fn deactivate(&self, id: &DatasetId) -> Result<(), Self::Error> {
        sqlx::query("UPDATE datasets SET active = false WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl SnapshotStore for PostgresStore {
    type Error = PostgresStoreError;

    async fn insert(&self, snapshot: Snapshot) -> Result<Snapshot, Self::Error> {
        let attrs_json = serde_json::to_value(&snapshot.attributes).unwrap_or(serde_json::Value::Null);
        sqlx::query(
            r#"
            INSERT INTO snapshots (
                id, dataset_id, source_row_id, geometry_hash, attributes_hash,
                composite_hash, geometry_wkb, attributes, created_at
            ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9)
            "#,
        )
        .bind(snapshot.id.as_uuid())
        .bind(snapshot.dataset_id.as_uuid())
        .bind(&snapshot.source_row_id)
        .bind(snapshot.geometry_hash.to_string())
        .bind(snapshot.attributes_hash.to_string())
        .bind(snapshot.composite_hash.to_string())
        .bind(&snapshot.geometry_wkb)
        .bind(attrs_json)
        .bind(snapshot.created_at)
        .execute(&self.pool)
        .await?;
        Ok(snapshot)
    }

    async fn list_by_dataset(&self, dataset_id: &DatasetId) -> Result<Vec<Snapshot>, Self::Error> {
        let rows = sqlx::query("SELECT * FROM snapshots WHERE dataset_id = $1 ORDER BY id")
            .bind(dataset_id.as_uuid())
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(Self::parse_snapshot_row).collect::<Result<Vec<_>, _>>().map_err(PostgresStoreError::from)
    }

    async fn find_by_geometry_hash(&self, dataset_id: &DatasetId, hash: Digest) -> Result<Vec<Snapshot>, Self::Error> {
        let rows = sqlx::query("SELECT * FROM snapshots WHERE dataset_id = $1 AND geometry_hash = $2 ORDER BY id")
            .bind(dataset_id.as_uuid())
            .bind(hash.to_string())
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(Self::parse_snapshot_row).collect::<Result<Vec<_>, _>>().map_err(PostgresStoreError::from)
    }

    async fn find_by_composite_hash(&self, dataset_id: &DatasetId, hash: Digest) -> Result<Vec<Snapshot>, Self::Error> {
        let rows = sqlx::query("SELECT * FROM snapshots WHERE dataset_id = $1 AND composite_hash = $2 ORDER BY id")
            .bind(dataset_id.as_uuid())
            .bind(hash.to_string())
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(Self::parse_snapshot_row).collect::<Result<Vec<_>, _>>().map_err(PostgresStoreError::from)
    }

    async fn get(&self, id: &SnapshotId) -> Result<Option<Snapshot>, Self::Error> {
        let row = sqlx::query("SELECT * FROM snapshots WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::parse_snapshot_row).transpose().map_err(PostgresStoreError::from)
    }

    async fn count(&self, dataset_id: &DatasetId) -> Result<u64, Self::Error> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM snapshots WHERE dataset_id = $1")
            .bind(dataset_id.as_uuid())
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get::<i64, _>("n")? as u64)
    }

    async fn delete_all(&self, dataset_id: &DatasetId) -> Result<(), Self::Error> {
        sqlx::query("DELETE FROM snapshots WHERE dataset_id = $1")
            .bind(dataset_id.as_uuid())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl DiffStore for PostgresStore {
    type Error = PostgresStoreError;

    async fn insert(&self, diff: Diff) -> Result<Diff, Self::Error> {
        sqlx::query(
            r#"
            INSERT INTO diffs (
                id, dataset_id, diff_type, old_snapshot_id, new_snapshot_id, geometry_hash,
                geometry_changed, attributes_changed, confidence_score, review_status,
                reviewer, reviewed_at, created_at
            ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13)
            "#,
        )
        .bind(diff.id.as_uuid())
        .bind(diff.dataset_id.as_uuid())
        .bind(diff.diff_type.to_string())
        .bind(diff.old_snapshot_id.map(|id| *id.as_uuid()))
        .bind(diff.new_snapshot_id.map(|id| *id.as_uuid()))
        .bind(diff.geometry_hash.to_string())
        .bind(diff.geometry_changed)
        .bind(diff.attributes_changed)
        .bind(diff.confidence_score)
        .bind(diff.review_status.to_string())
        .bind(&diff.reviewer)
        .bind(diff.reviewed_at)
        .bind(diff.created_at)
        .execute(&self.pool)
        .await?;
        Ok(diff)
    }

    async fn list(&self, filter: DiffFilter) -> Result<Vec<Diff>, Self::Error> {
        // Built with a fixed set of optional predicates (never string-built
        // from caller-supplied identifiers) -- see ExternalSourceReader for
        // the one place identifiers are validated and spliced.
        let mut sql = String::from("SELECT * FROM diffs WHERE 1=1");
        if filter.dataset_id.is_some() {
            sql.push_str(" AND dataset_id = $1");
        }
        sql.push_str(" ORDER BY id");
        if filter.limit > 0 {
            sql.push_str(&format!(" LIMIT {} OFFSET {}", filter.limit, filter.offset));
        } else if filter.offset > 0 {
            sql.push_str(&format!(" OFFSET {}", filter.offset));
        }

        let rows = if let Some(dataset_id) = filter.dataset_id {
            sqlx::query(&sql).bind(dataset_id.as_uuid()).fetch_all(&self.pool).await?
        } else {
            sqlx::query(&sql).fetch_all(&self.pool).await?
        };

        let mut diffs = rows.iter().map(Self::parse_diff_row).collect::<Result<Vec<_>, _>>()?;
        if let Some(status) = filter.review_status {
            diffs.retain(|d| d.review_status == status);
        }
        if let Some(diff_type) = filter.diff_type {
            diffs.retain(|d| d.diff_type == diff_type);
        }
        Ok(diffs)
    }

    async fn get(&self, id: &DiffId) -> Result<Option<Diff>, Self::Error> {
        let row = sqlx::query("SELECT * FROM diffs WHERE id = $1").bind(id.as_uuid()).fetch_optional(&self.pool).await?;
        row.as_ref().map(Self::parse_diff_row).transpose().map_err(PostgresStoreError::from)
    }

    async fn update_review(&self, id: &DiffId, status: ReviewStatus, reviewer: String) -> Result<Diff, Self::Error> {
        let row = sqlx::query(
            r#"
            UPDATE diffs SET review_status = $2, reviewer = $3, reviewed_at = now()
            WHERE id = $1 AND review_status = 'PENDING'
            RETURNING *
            "#,
        )
        .bind(id.as_uuid())
        .bind(status.to_string())
        .bind(reviewer)
        .fetch_one(&self.pool)
        .await?;
        Self::parse_diff_row(&row).map_err(PostgresStoreError::from)
    }

    async fn count_pending(&self, dataset_id: &DatasetId) -> Result<u64, Self::Error> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM diffs WHERE dataset_id = $1 AND review_status = 'PENDING'")
            .bind(dataset_id.as_uuid())
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get::<i64, _>("n")? as u64)
    }

    async fn exists_pending_for_geometry(&self, dataset_id: &DatasetId, geometry_hash: Digest) -> Result<bool, Self::Error> {
        let row = sqlx::query(
            "SELECT EXISTS(SELECT 1 FROM diffs WHERE dataset_id = $1 AND geometry_hash = $2 AND review_status = 'PENDING') AS e",
        )
        .bind(dataset_id.as_uuid())
        .bind(geometry_hash.to_string())
        .fetch_one(&self.pool)
        .await?;
        Ok(row.try_get("e")?)
    }

    async fn delete_by_dataset(&self, dataset_id: &DatasetId) -> Result<(), Self::Error> {
        sqlx::query("DELETE FROM diffs WHERE dataset_id = $1")
            .bind(dataset_id.as_uuid())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl FindingStore for PostgresStore {
    type Error = PostgresStoreError;

    async fn insert_many(&self, findings: Vec<Finding>) -> Result<(), Self::Error> {
        for f in findings {
            let detail = serde_json::to_value(&f.detail).unwrap_or(serde_json::Value::Null);
            sqlx::query(
                r#"
                INSERT INTO findings (id, dataset_id, snapshot_id, category, result, message, detail, created_at)
                VALUES ($1,$2,$3,$4,$5,$6,$7,$8)
                "#,
            )
            .bind(f.id.as_uuid())
            .bind(f.dataset_id.as_uuid())
            .bind(f.snapshot_id.as_uuid())
            .bind(f.category.to_string())
            .bind(f.result.to_string())
            .bind(&f.message)
            .bind(detail)
            .bind(f.created_at)
            .execute(&self.pool)
            .await?;
        }
        Ok(())
    }

    async fn delete_by_dataset(&self, dataset_id: &DatasetId) -> Result<(), Self::Error> {
        sqlx::query("DELETE FROM findings WHERE dataset_id = $1")
            .bind(dataset_id.as_uuid())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn summarise(&self, dataset_id: &DatasetId) -> Result<FindingSummary, Self::Error> {
        let rows = sqlx::query(
            "SELECT category, result, COUNT(*) AS n FROM findings WHERE dataset_id = $1 GROUP BY category, result",
        )
        .bind(dataset_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        let mut summary = FindingSummary::new();
        for row in rows {
            let category: String = row.try_get("category")?;
            let result: String = row.try_get("result")?;
            let n: i64 = row.try_get("n")?;
            if let (Ok(category), Ok(result)) = (category.parse(), result.parse()) {
                summary.insert((category, result), n as u64);
            }
        }
        Ok(summary)
    }
}

fn encrypt_str(e: EncryptPreference) -> &'static str {
    match e {
        EncryptPreference::Disable => "disable",
        EncryptPreference::Prefer => "prefer",
        EncryptPreference::Require => "require",
    }
}

fn connection_status_str(s: ConnectionStatus) -> &'static str {
    match s {
        ConnectionStatus::Unknown => "unknown",
        ConnectionStatus::Ok => "ok",
        ConnectionStatus::Failed => "failed",
    }
}
