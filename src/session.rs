//! Scoped database sessions backed by a pool of SQLite connections.
//!
//! A [SessionFactory] is created once at start-up and stored in the
//! [AppState](crate::AppState). Request handlers receive a [Session] by
//! declaring it as an argument, and the session is released when the handler
//! returns, whether it succeeded or not.

use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{Connection, OpenFlags};

use crate::{Error, db::initialize};

/// Runtime tunables for SQLite connection behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DbSettings {
    /// Busy timeout for SQLite connections, in milliseconds.
    pub busy_timeout_ms: u64,

    /// Maximum number of pooled SQLite connections.
    pub pool_max_size: u32,
}

impl Default for DbSettings {
    fn default() -> Self {
        Self {
            busy_timeout_ms: 5_000,
            pool_max_size: 8,
        }
    }
}

/// Hands out a fresh [Session] for each unit of work.
#[derive(Clone)]
pub struct SessionFactory {
    pool: Pool<SqliteConnectionManager>,
}

impl std::fmt::Debug for SessionFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.pool.state();

        f.debug_struct("SessionFactory")
            .field("max_size", &self.pool.max_size())
            .field("connections", &state.connections)
            .field("idle_connections", &state.idle_connections)
            .finish()
    }
}

impl SessionFactory {
    /// Open the SQLite database at `db_path`, creating it if needed, and
    /// create the application tables.
    ///
    /// Connections use WAL mode, enforce foreign keys and wait up to
    /// `settings.busy_timeout_ms` for locks held by other connections.
    ///
    /// # Errors
    /// Returns an error if the pool cannot be built or the tables cannot be created.
    pub fn new(db_path: &str, settings: DbSettings) -> Result<Self, Error> {
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_FULL_MUTEX;

        let manager = SqliteConnectionManager::file(db_path)
            .with_flags(flags)
            .with_init(move |conn| configure_connection(conn, settings.busy_timeout_ms));

        let pool = Pool::builder()
            .max_size(settings.pool_max_size)
            .build(manager)?;

        Self::from_pool(pool)
    }

    /// Create a factory over a private in-memory database.
    ///
    /// Every SQLite in-memory connection is its own database, so the pool is
    /// limited to a single connection.
    ///
    /// # Errors
    /// Returns an error if the pool cannot be built or the tables cannot be created.
    pub fn in_memory() -> Result<Self, Error> {
        let manager = SqliteConnectionManager::memory()
            .with_init(|conn| configure_connection(conn, DbSettings::default().busy_timeout_ms));

        let pool = Pool::builder().max_size(1).build(manager)?;

        Self::from_pool(pool)
    }

    fn from_pool(pool: Pool<SqliteConnectionManager>) -> Result<Self, Error> {
        initialize(&*pool.get()?)?;

        Ok(Self { pool })
    }

    /// Acquire a session with exclusive use of one pooled connection.
    ///
    /// # Errors
    /// Returns [Error::PoolError] if no connection becomes available before
    /// the pool's timeout.
    pub fn session(&self) -> Result<Session, Error> {
        let connection = self.pool.get()?;
        tracing::debug!("opened database session");

        Ok(Session { connection })
    }

    /// Acquire a session from async code.
    ///
    /// Waiting for a free connection happens on tokio's blocking thread pool,
    /// so a drained pool never stalls the runtime's worker threads.
    ///
    /// # Errors
    /// Returns [Error::PoolError] if no connection becomes available before
    /// the pool's timeout, or if the blocking task could not be run.
    pub async fn acquire(&self) -> Result<Session, Error> {
        let factory = self.clone();

        tokio::task::spawn_blocking(move || factory.session())
            .await
            .map_err(|error| Error::PoolError(error.to_string()))?
    }
}

fn configure_connection(conn: &mut Connection, busy_timeout_ms: u64) -> Result<(), rusqlite::Error> {
    // In-memory databases report "memory", which is expected.
    let journal_mode: String = conn.query_row("PRAGMA journal_mode = WAL;", [], |row| row.get(0))?;
    if journal_mode != "wal" && journal_mode != "memory" {
        return Err(rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_ERROR),
            Some(format!("failed to set WAL journal mode, got: {journal_mode}")),
        ));
    }

    conn.execute_batch(&format!(
        "PRAGMA foreign_keys = ON;
         PRAGMA busy_timeout = {busy_timeout_ms};"
    ))
}

/// A unit of work against the database.
///
/// Sessions do not autocommit. The first call to [Session::connection] opens
/// a SQL transaction which is only persisted by [Session::commit]. When the
/// session is dropped any uncommitted changes are rolled back and the
/// connection goes back to the pool.
pub struct Session {
    connection: PooledConnection<SqliteConnectionManager>,
}

impl Session {
    /// Get the connection for this session, opening a SQL transaction if one
    /// is not already in progress.
    ///
    /// # Errors
    /// Returns [Error::SqlError] if the transaction cannot be started.
    pub fn connection(&self) -> Result<&Connection, Error> {
        if self.connection.is_autocommit() {
            self.connection.execute_batch("BEGIN DEFERRED")?;
        }

        Ok(&*self.connection)
    }

    /// Persist the changes made since the last commit.
    ///
    /// The session remains usable, the next call to [Session::connection]
    /// starts a new SQL transaction.
    ///
    /// # Errors
    /// Returns [Error::SqlError] if the commit fails, e.g. the database is locked.
    pub fn commit(&self) -> Result<(), Error> {
        if !self.connection.is_autocommit() {
            self.connection.execute_batch("COMMIT")?;
        }

        Ok(())
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if !self.connection.is_autocommit() {
            if let Err(error) = self.connection.execute_batch("ROLLBACK") {
                tracing::error!("could not roll back uncommitted session changes: {error}");
            }
        }

        tracing::debug!("closed database session");
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("in_transaction", &!self.connection.is_autocommit())
            .finish()
    }
}

/// Handlers that also read a request body should take `State<SessionFactory>`
/// and call [SessionFactory::acquire] once the body has been parsed, otherwise
/// the connection is held while the client sends the body.
impl<S> FromRequestParts<S> for Session
where
    SessionFactory: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(_: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        SessionFactory::from_ref(state).acquire().await
    }
}
