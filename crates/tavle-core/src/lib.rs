//! # tavle-core
//!
//! Core types, traits, and write-time rules for the tavle event platform.
//!
//! This crate provides the foundational data structures, the error
//! taxonomy, and the trait definitions that the db, jobs, and api crates
//! depend on.

pub mod defaults;
pub mod error;
pub mod logging;
pub mod models;
pub mod normalize;
pub mod sanitize;
pub mod slug;
pub mod traits;
pub mod validation;

// Re-export commonly used types at crate root
pub use error::{Error, Result};
pub use models::*;
pub use normalize::{apply_write_rules, coerce_toggles};
pub use sanitize::sanitize_html;
pub use slug::slugify;
pub use traits::*;
pub use validation::{is_http_url, is_valid_email, validate_submission};
