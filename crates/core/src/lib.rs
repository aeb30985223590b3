//! Core domain models and the timesheet reconciliation engine.

pub mod errors;
pub mod sync;
pub mod timesheet;

pub use errors::{Error, Result};
