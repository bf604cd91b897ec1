//! Comment-history query functions for a lean issue tracker.
//!
//! `lastCommentator` and `lastCommented` expand to lists of issue ids. They
//! read projects, permissions, issues and comments through the traits in
//! [`host`]; [`db::Database`] is a SQLite-backed implementation.

pub mod config;
pub mod db;
pub mod duration;
pub mod error;
pub mod functions;
pub mod host;
pub mod logging;
pub mod models;
pub mod validation;

pub use error::{DurationError, ValidationError};
pub use functions::{QueryContext, QueryFunction, QueryLiteral};
