//! Dedicated writer that serializes all mutations through one connection.
//!
//! SQLite allows only one writer at a time; funneling every mutation through
//! this actor keeps repository code free of busy-retry loops and wraps each
//! job in an immediate transaction.

use diesel::sqlite::SqliteConnection;
use diesel::Connection;
use tokio::sync::{mpsc, oneshot};

use hourbook_core::errors::{DatabaseError, Error, Result};

use super::DbPool;
use crate::errors::StorageError;

type WriteJob = Box<dyn FnOnce(&mut SqliteConnection) + Send>;

/// Handle used by repositories to submit write jobs.
#[derive(Clone)]
pub struct WriteHandle {
    tx: mpsc::UnboundedSender<WriteJob>,
}

/// Transaction error wrapper so rollback works for both domain failures
/// and raw diesel failures.
enum WriterError {
    Domain(Error),
    Db(diesel::result::Error),
}

impl From<diesel::result::Error> for WriterError {
    fn from(err: diesel::result::Error) -> Self {
        Self::Db(err)
    }
}

/// Spawn the writer thread. Diesel connections are blocking, so the actor
/// runs on a plain thread and jobs are bridged back via oneshot channels.
pub fn spawn_writer(pool: DbPool) -> WriteHandle {
    let (tx, mut rx) = mpsc::unbounded_channel::<WriteJob>();
    std::thread::spawn(move || {
        while let Some(job) = rx.blocking_recv() {
            match pool.get() {
                Ok(mut conn) => job(&mut conn),
                Err(err) => log::error!("Writer could not acquire a connection: {}", err),
            }
        }
    });
    WriteHandle { tx }
}

impl WriteHandle {
    /// Run a write job inside an immediate transaction and await its result.
    pub async fn exec<T, F>(&self, job: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut SqliteConnection) -> Result<T> + Send + 'static,
    {
        let (done_tx, done_rx) = oneshot::channel();
        let wrapped: WriteJob = Box::new(move |conn| {
            let outcome = conn
                .immediate_transaction::<T, WriterError, _>(|tx| {
                    job(tx).map_err(WriterError::Domain)
                })
                .map_err(|err| match err {
                    WriterError::Domain(domain) => domain,
                    WriterError::Db(db) => Error::from(StorageError::from(db)),
                });
            let _ = done_tx.send(outcome);
        });

        self.tx.send(wrapped).map_err(|_| {
            Error::Database(DatabaseError::Internal(
                "Writer task is no longer running".to_string(),
            ))
        })?;
        done_rx.await.map_err(|_| {
            Error::Database(DatabaseError::Internal(
                "Writer dropped the job before completion".to_string(),
            ))
        })?
    }
}
