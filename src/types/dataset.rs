//! Dataset registrations: a remote PostGIS table the service monitors.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::DatasetId;

/// SSL/TLS posture for the remote connection, modelled after libpq's
/// `sslmode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncryptPreference {
    Disable,
    Prefer,
    Require,
}

impl Default for EncryptPreference {
    fn default() -> Self {
        EncryptPreference::Prefer
    }
}

/// Everything needed to open a connection to the remote table and locate
/// the rows within it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionDescriptor {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub schema: String,
    pub table: String,
    pub geometry_column: String,
    pub encrypt: EncryptPreference,
}

/// Connection health as last observed by the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Unknown,
    Ok,
    Failed,
}

impl Default for ConnectionStatus {
    fn default() -> Self {
        ConnectionStatus::Unknown
    }
}

/// A registered dataset: the unit the scheduler iterates over and the API
/// exposes CRUD for.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dataset {
    pub id: DatasetId,
    pub name: String,
    pub connection: ConnectionDescriptor,
    /// Minutes between change-detection runs.
    pub check_interval_minutes: i64,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub last_check_at: Option<DateTime<Utc>>,
    pub connection_status: ConnectionStatus,
    pub connection_error: Option<String>,
    pub last_connection_test: Option<DateTime<Utc>>,
}

impl Dataset {
    /// Construct a freshly registered, never-yet-checked dataset.
    pub fn register(name: String, connection: ConnectionDescriptor, check_interval_minutes: i64) -> Self {
        Dataset {
            id: DatasetId::generate(),
            name,
            connection,
            check_interval_minutes,
            active: true,
            created_at: Utc::now(),
            last_check_at: None,
            connection_status: ConnectionStatus::Unknown,
            connection_error: None,
            last_connection_test: None,
        }
    }

    /// Whether this dataset is due for a change-detection run given `now`.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        match self.last_check_at {
            None => true,
            Some(last) => now >= last + chrono::Duration::minutes(self.check_interval_minutes),
        }
    }

    /// True iff this dataset has never completed a change-detection run,
    /// which disqualifies it from quality-check dispatch.
    pub fn has_no_baseline(&self) -> bool {
        self.last_check_at.is_none()
    }

    /// Null out every field the Lifecycle Manager's smart restart clears,
    /// leaving the registration itself untouched.
    pub fn clear_monitoring_fields(&mut self) {
        self.last_check_at = None;
        self.connection_status = ConnectionStatus::Unknown;
        self.connection_error = None;
        self.last_connection_test = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn desc() -> ConnectionDescriptor {
        ConnectionDescriptor {
            host: "db.example.com".to_string(),
            port: 5432,
            database: "gis".to_string(),
            schema: "public".to_string(),
            table: "parcels".to_string(),
            geometry_column: "geom".to_string(),
            encrypt: EncryptPreference::Prefer,
        }
    }

    #[test]
    fn new_dataset_is_due_immediately() {
        let ds = Dataset::register("parcels".to_string(), desc(), 60);
        assert!(ds.is_due(Utc::now()));
        assert!(ds.has_no_baseline());
    }

    #[test]
    fn dataset_not_due_before_interval_elapses() {
        let mut ds = Dataset::register("parcels".to_string(), desc(), 60);
        ds.last_check_at = Some(Utc::now());
        assert!(!ds.is_due(Utc::now()));
        assert!(ds.is_due(Utc::now() + chrono::Duration::minutes(61)));
    }

    #[test]
    fn clear_monitoring_fields_preserves_registration() {
        let mut ds = Dataset::register("parcels".to_string(), desc(), 60);
        ds.last_check_at = Some(Utc::now());
        ds.connection_status = ConnectionStatus::Ok;
        ds.connection_error = Some("boom".to_string());
        let name_before = ds.name.clone();
        ds.clear_monitoring_fields();
        assert_eq!(ds.name, name_before);
        assert!(ds.last_check_at.is_none());
        assert_eq!(ds.connection_status, ConnectionStatus::Unknown);
        assert!(ds.connection_error.is_none());
    }
}
