//! SQLite storage implementation for sync state (connections, mappings,
//! synced units, and run records).

mod model;
mod repository;

pub use model::{ProjectMappingDB, RemoteConnectionDB, SyncRunDB, SyncedUnitDB};
pub use repository::{
    ConnectionRepository, ProjectMappingRepository, SyncRunRepository, SyncedUnitRepository,
};
