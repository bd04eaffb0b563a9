//! Geowatch Control API
//!
//! Exposes dataset registration, the diff review queue, on-demand quality
//! checks, and dataset reset as a REST service over whichever store backend
//! [`ServiceState`] is built with.
//!
//! ## Endpoints
//!
//! - `POST /api/datasets` / `GET /api/datasets` - register / list datasets
//! - `PATCH /api/datasets/:id` / `GET /api/datasets/:id` - update / fetch one
//! - `POST /api/datasets/:id/deactivate` - stop monitoring a dataset
//! - `POST /api/datasets/:id/reset` - clear a dataset's monitoring history
//! - `GET /api/diffs` / `GET /api/diffs/:id` - list / inspect classified changes
//! - `POST /api/diffs/:id/review` / `POST /api/diffs/review/batch` - record review decisions
//! - `POST /api/datasets/:id/quality-check` - dispatch a quality check
//! - `GET /api/datasets/:id/quality-check/status` - poll its status
//! - `GET /health` - detailed health check
//! - `GET /health/live` - liveness probe
//! - `GET /health/ready` - readiness probe

pub mod middleware;
pub mod routes;
pub mod state;

pub use middleware::{metrics_middleware, record_connection_test, record_quality_check_dispatch};
pub use routes::{create_router, AppState, ErrorResponse};
pub use state::ServiceState;
