//! Reads feature rows, geometry, and server-derived geometric scalars from
//! the remote PostGIS table a dataset points at.

use std::collections::BTreeMap;

use async_trait::async_trait;
use regex_lite::Regex;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Row;
use std::time::Duration;

use crate::types::{AttributeValue, ConnectionDescriptor, EncryptPreference};

/// One row pulled from the remote source, with the server-derived scalars
/// the quality engine and change detector both depend on.
#[derive(Debug, Clone)]
pub struct FeatureRow {
    pub source_row_id: Option<String>,
    pub attributes: BTreeMap<String, AttributeValue>,
    pub geometry_wkb: Vec<u8>,
    pub is_valid: bool,
    pub validity_reason: Option<String>,
    pub is_simple: bool,
    pub geom_area: f64,
    pub geom_length: f64,
    pub num_points: i64,
    pub geom_type: String,
    pub is_ccw_oriented: Option<bool>,
    pub is_topologically_clean: bool,
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
}

/// Error validating an identifier or reading from the remote source.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("identifier {0:?} is not a safe SQL identifier")]
    InvalidIdentifier(String),
    #[error("remote database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Identifiers taken from user-controlled dataset registrations must match
/// this pattern before being spliced into a query string.
fn identifier_pattern() -> &'static Regex {
    static PATTERN: std::sync::OnceLock<Regex> = std::sync::OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap())
}

/// Validate and double-quote an identifier for safe interpolation.
pub fn quote_identifier(name: &str) -> Result<String, SourceError> {
    if !identifier_pattern().is_match(name) {
        return Err(SourceError::InvalidIdentifier(name.to_string()));
    }
    Ok(format!("\"{name}\""))
}

fn sslmode(e: EncryptPreference) -> &'static str {
    match e {
        EncryptPreference::Disable => "disable",
        EncryptPreference::Prefer => "prefer",
        EncryptPreference::Require => "require",
    }
}

/// Reads features from one dataset's remote table over a short-lived
/// connection, released on every exit path including cancellation.
pub struct ExternalSourceReader;

#[async_trait]
pub trait SourceReader: Send + Sync {
    async fn read_all(&self, connection: &ConnectionDescriptor) -> Result<Vec<FeatureRow>, SourceError>;
}

#[async_trait]
impl SourceReader for ExternalSourceReader {
    async fn read_all(&self, connection: &ConnectionDescriptor) -> Result<Vec<FeatureRow>, SourceError> {
        let schema = quote_identifier(&connection.schema)?;
        let table = quote_identifier(&connection.table)?;
        let geom = quote_identifier(&connection.geometry_column)?;

        let dsn = format!(
            "postgres://{host}:{port}/{database}?sslmode={sslmode}",
            host = connection.host,
            port = connection.port,
            database = connection.database,
            sslmode = sslmode(connection.encrypt),
        );

        let pool: PgPool = PgPoolOptions::new()
            .max_connections(1)
            .acquire_timeout(Duration::from_secs(10))
            .connect(&dsn)
            .await?;

        let query = format!(
            r#"
            SELECT
                to_jsonb(t.*) - '{geom_col}' AS attributes,
                ST_AsBinary({geom}) AS geometry_wkb,
                ST_IsValid({geom}) AS is_valid,
                ST_IsValidReason({geom}) AS validity_reason,
                ST_IsSimple({geom}) AS is_simple,
                COALESCE(ST_Area({geom}), 0) AS geom_area,
                COALESCE(ST_Length({geom}), 0) AS geom_length,
                ST_NPoints({geom}) AS num_points,
                GeometryType({geom}) AS geom_type,
                CASE WHEN GeometryType({geom}) = 'POLYGON'
                     THEN ST_IsPolygonCCW({geom}) ELSE NULL END AS is_ccw_oriented,
                (ST_IsValid({geom}) AND ST_IsSimple({geom})) AS is_topologically_clean,
                ST_XMin({geom}) AS min_x,
                ST_XMax({geom}) AS max_x,
                ST_YMin({geom}) AS min_y,
                ST_YMax({geom}) AS max_y
            FROM {schema}.{table} t
            WHERE {geom} IS NOT NULL
            "#,
            geom_col = connection.geometry_column,
        );

        let rows = sqlx::query(&query).fetch_all(&pool).await?;
        pool.close().await;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let attrs_json: serde_json::Value = row.try_get("attributes").unwrap_or(serde_json::Value::Null);
            let mut attributes: BTreeMap<String, AttributeValue> = BTreeMap::new();
            let mut source_row_id = None;
            if let serde_json::Value::Object(map) = attrs_json {
                for (k, v) in map {
                    let value = json_to_attribute(&v);
                    if (k == "id" || k == "gid") && source_row_id.is_none() {
                        source_row_id = Some(value.to_hash_string());
                    }
                    attributes.insert(k, value);
                }
            }

            out.push(FeatureRow {
                source_row_id,
                attributes,
                geometry_wkb: row.try_get("geometry_wkb").unwrap_or_default(),
                is_valid: row.try_get("is_valid").unwrap_or(false),
                validity_reason: row.try_get("validity_reason").ok(),
                is_simple: row.try_get("is_simple").unwrap_or(false),
                geom_area: row.try_get("geom_area").unwrap_or(0.0),
                geom_length: row.try_get("geom_length").unwrap_or(0.0),
                num_points: row.try_get("num_points").unwrap_or(0),
                geom_type: row.try_get("geom_type").unwrap_or_default(),
                is_ccw_oriented: row.try_get("is_ccw_oriented").ok(),
                is_topologically_clean: row.try_get("is_topologically_clean").unwrap_or(false),
                min_x: row.try_get("min_x").unwrap_or(0.0),
                max_x: row.try_get("max_x").unwrap_or(0.0),
                min_y: row.try_get("min_y").unwrap_or(0.0),
                max_y: row.try_get("max_y").unwrap_or(0.0),
            });
        }

        Ok(out)
    }
}

fn json_to_attribute(v: &serde_json::Value) -> AttributeValue {
    match v {
        serde_json::Value::Null => AttributeValue::Null,
        serde_json::Value::Bool(b) => AttributeValue::Bool(*b),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                AttributeValue::Integer(i)
            } else {
                AttributeValue::Float(n.as_f64().unwrap_or(0.0))
            }
        }
        serde_json::Value::String(s) => AttributeValue::Text(s.clone()),
        other => AttributeValue::Text(other.to_string()),
    }
}
