//! Typed client for the remote resource-management service.
//!
//! The remote service is the organization's system of record for billed
//! hours. This crate wraps its REST API and classifies every non-success
//! response into a typed error before callers see it.

mod client;
mod error;
mod types;

pub use client::RemoteClient;
pub use error::{RemoteError, RemoteErrorKind, Result};
pub use types::*;
