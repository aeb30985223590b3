//! SQLite persistence for hourbook: connection pool, migrations, and
//! diesel implementations of the core repository traits.

pub mod db;
pub mod errors;
pub mod schema;
pub mod sync;
pub mod timesheet;

pub use db::{create_pool, get_connection, init, run_migrations, spawn_writer, WriteHandle};
