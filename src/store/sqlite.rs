//! SQLite-backed record store.

use std::{
    fmt, fs,
    ops::{Deref, DerefMut},
    path::{Path, PathBuf},
    sync::{Mutex, MutexGuard},
    time::Duration,
};

use rusqlite::{params_from_iter, Connection, OptionalExtension, TransactionBehavior};

use crate::error::StoreError;
use crate::record::{Batch, Field, Record};

use super::RecordStore;

/// Bound parameter ceiling of SQLite builds since 3.32. Bulk inserts are split
/// into statements that stay below it.
pub const SQLITE_MAX_PARAMETERS: usize = 32_766;

const COLUMNS_PER_ROW: usize = Field::ALL.len();
const ROWS_PER_STATEMENT: usize = SQLITE_MAX_PARAMETERS / COLUMNS_PER_ROW;

const SCHEMA_SQL: &str = "
    CREATE TABLE IF NOT EXISTS geolocations (
        id            INTEGER PRIMARY KEY,
        ip            TEXT NOT NULL,
        country_code  TEXT NOT NULL,
        country       TEXT NOT NULL,
        city          TEXT NOT NULL,
        latitude      TEXT NOT NULL,
        longitude     TEXT NOT NULL,
        mystery_value TEXT NOT NULL,
        created_at    TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
    );
    CREATE INDEX IF NOT EXISTS geolocations_ip_idx ON geolocations (ip);
";

const INSERT_PREFIX: &str = "INSERT INTO geolocations \
    (ip, country_code, country, city, latitude, longitude, mystery_value) VALUES ";
const ROW_PLACEHOLDERS: &str = "(?, ?, ?, ?, ?, ?, ?)";

/// Connection tuning for [`SqliteStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SqliteOptions {
    /// How long a writer waits on a locked database before giving up.
    pub busy_timeout: Duration,
}

impl Default for SqliteOptions {
    fn default() -> Self {
        Self {
            busy_timeout: Duration::from_secs(30),
        }
    }
}

/// Record store writing to a `geolocations` table in a SQLite file.
///
/// Each concurrent `persist_batch` call checks out its own connection, so
/// in-flight batches never share a transaction. SQLite still serialises the
/// commits; the busy timeout covers the wait.
pub struct SqliteStore {
    path: PathBuf,
    options: SqliteOptions,
    pool: Mutex<Vec<Connection>>,
}

impl fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteStore")
            .field("path", &self.path)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl SqliteStore {
    /// Open (creating if needed) the database at `path` and ensure the schema.
    pub fn open(path: impl AsRef<Path>, options: SqliteOptions) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|source| StoreError::CreateDirectory {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        let connection = open_connection(&path, &options)?;
        connection
            .pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0))
            .map_err(|source| StoreError::Schema { source })?;
        connection
            .execute_batch(SCHEMA_SQL)
            .map_err(|source| StoreError::Schema { source })?;

        tracing::debug!(path = %path.display(), "opened SQLite store");
        Ok(Self {
            path,
            options,
            pool: Mutex::new(vec![connection]),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Delete every stored record.
    pub fn truncate(&self) -> Result<usize, StoreError> {
        let connection = self.checkout()?;
        connection
            .execute("DELETE FROM geolocations", [])
            .map_err(|source| StoreError::Query {
                what: "truncate geolocations",
                source,
            })
    }

    /// First stored record for `ip`, if any.
    pub fn find_by_ip(&self, ip: &str) -> Result<Option<Record>, StoreError> {
        let connection = self.checkout()?;
        connection
            .query_row(
                "SELECT ip, country_code, country, city, latitude, longitude, mystery_value \
                 FROM geolocations WHERE ip = ?1 ORDER BY id LIMIT 1",
                [ip],
                |row| {
                    Ok(Record {
                        ip: row.get(0)?,
                        country_code: row.get(1)?,
                        country: row.get(2)?,
                        city: row.get(3)?,
                        latitude: row.get(4)?,
                        longitude: row.get(5)?,
                        mystery_value: row.get(6)?,
                    })
                },
            )
            .optional()
            .map_err(|source| StoreError::Query {
                what: "find geolocation by ip",
                source,
            })
    }

    pub fn count(&self) -> Result<u64, StoreError> {
        let connection = self.checkout()?;
        let count: i64 = connection
            .query_row("SELECT COUNT(*) FROM geolocations", [], |row| row.get(0))
            .map_err(|source| StoreError::Query {
                what: "count geolocations",
                source,
            })?;
        Ok(count.max(0) as u64)
    }

    fn lock_pool(&self) -> MutexGuard<'_, Vec<Connection>> {
        match self.pool.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn checkout(&self) -> Result<PooledConnection<'_>, StoreError> {
        let idle = self.lock_pool().pop();
        let connection = match idle {
            Some(connection) => connection,
            None => open_connection(&self.path, &self.options)?,
        };
        Ok(PooledConnection {
            store: self,
            connection: Some(connection),
        })
    }
}

impl RecordStore for SqliteStore {
    fn persist_batch(&self, batch: &Batch) -> Result<(), StoreError> {
        if batch.is_empty() {
            return Ok(());
        }
        let batch_id = batch.id;
        let mut connection = self.checkout()?;
        let tx = connection
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|source| StoreError::BeginTransaction { batch_id, source })?;

        for rows in batch.records().chunks(ROWS_PER_STATEMENT) {
            let sql = insert_sql(rows.len());
            let mut statement = tx
                .prepare_cached(&sql)
                .map_err(|source| StoreError::Prepare { batch_id, source })?;
            let values = rows
                .iter()
                .flat_map(|record| Field::ALL.map(|field| record.get(field)));
            statement
                .execute(params_from_iter(values))
                .map_err(|source| StoreError::Insert { batch_id, source })?;
        }

        tx.commit()
            .map_err(|source| StoreError::Commit { batch_id, source })
    }
}

fn open_connection(path: &Path, options: &SqliteOptions) -> Result<Connection, StoreError> {
    let connection = Connection::open(path).map_err(|source| StoreError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    connection
        .busy_timeout(options.busy_timeout)
        .map_err(|source| StoreError::Open {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(connection)
}

fn insert_sql(rows: usize) -> String {
    let mut sql = String::with_capacity(INSERT_PREFIX.len() + rows * (ROW_PLACEHOLDERS.len() + 2));
    sql.push_str(INSERT_PREFIX);
    for i in 0..rows {
        if i > 0 {
            sql.push_str(", ");
        }
        sql.push_str(ROW_PLACEHOLDERS);
    }
    sql
}

/// Connection on loan from the store's pool; returned on drop.
struct PooledConnection<'a> {
    store: &'a SqliteStore,
    connection: Option<Connection>,
}

impl Deref for PooledConnection<'_> {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        // Only taken in Drop.
        self.connection.as_ref().unwrap_or_else(|| unreachable!())
    }
}

impl DerefMut for PooledConnection<'_> {
    fn deref_mut(&mut self) -> &mut Connection {
        self.connection.as_mut().unwrap_or_else(|| unreachable!())
    }
}

impl Drop for PooledConnection<'_> {
    fn drop(&mut self) {
        if let Some(connection) = self.connection.take() {
            self.store.lock_pool().push(connection);
        }
    }
}
