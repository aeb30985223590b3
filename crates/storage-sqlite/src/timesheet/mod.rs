//! SQLite persistence for raw time entries.

mod model;
mod repository;

pub use model::TimeEntryDB;
pub use repository::TimeEntryRepository;
