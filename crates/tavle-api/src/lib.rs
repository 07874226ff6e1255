//! # tavle-api
//!
//! HTTP layer for the tavle event platform: the public query endpoints,
//! the submission intake pipeline, and the admin console surface. The
//! binary in `main.rs` wires these services to the axum router; the
//! library target exists so integration tests can drive the service
//! layer directly.

pub mod services;
