//! # sqlconf-sqlite
//!
//! SQLite gateway for `sqlconf-core`, built on `sqlx`.
//!
//! `sqlx` is async while the tree builder is not, so the gateway owns a
//! current-thread `tokio` runtime and blocks on every call. Connections
//! are opened read-only.
//!
//! # Database location
//!
//! The file is taken from the URI:
//!
//! - `sql:///var/lib/proftpd/conf.db` - an absolute path in the host
//!   position is used as-is ([SQLite URI filenames] are not involved).
//! - `sql://localhost/conf.db` or `sql://localhost?database=conf.db` -
//!   otherwise the database name is used as a path relative to the
//!   working directory.
//!
//! [SQLite URI filenames]: https://www.sqlite.org/uri.html
//!
//! ## Example
//!
//! ```rust,no_run
//! use sqlconf_core::ConfigSource;
//! use sqlconf_sqlite::SqliteGateway;
//!
//! let mut source = ConfigSource::new(SqliteGateway::new());
//! for line in source.open("sql:///etc/proftpd/conf.db?driver=sqlite").unwrap() {
//!     println!("{line}");
//! }
//! ```

use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection};
use sqlx::{ConnectOptions, Connection, Row};
use tokio::runtime::{Builder, Runtime};
use tracing::{debug, trace};

use sqlconf_core::gateway::{ConnectTarget, RowSet, SqlGateway};
use sqlconf_core::query::Query;
use sqlconf_core::GatewayError;

/// Canonical backend name.
pub const SQLITE_DRIVER: &str = "sqlite3";

/// A blocking [`SqlGateway`] over a single SQLite connection.
#[derive(Default)]
pub struct SqliteGateway {
    // Dropped before the runtime.
    conn: Option<SqliteConnection>,
    runtime: Option<Runtime>,
}

impl SqliteGateway {
    /// Creates a gateway; the runtime is started on first use.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            conn: None,
            runtime: None,
        }
    }

    /// Whether a connection is open.
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        self.conn.is_some()
    }

    fn runtime(&mut self) -> Result<&Runtime, GatewayError> {
        if self.runtime.is_none() {
            let runtime = Builder::new_current_thread()
                .enable_all()
                .build()
                .map_err(GatewayError::backend)?;
            self.runtime = Some(runtime);
        }
        self.runtime
            .as_ref()
            .ok_or_else(|| GatewayError::message("runtime unavailable"))
    }
}

/// Picks the database file for `target`.
#[must_use]
pub fn database_path(target: &ConnectTarget) -> &str {
    let server = target.server.as_str();
    if server.starts_with('/') || server.starts_with('.') {
        return server;
    }
    target.database.as_deref().unwrap_or(server)
}

impl SqlGateway for SqliteGateway {
    /// # Errors
    ///
    /// Returns [`GatewayError::UnsupportedDriver`] for anything but
    /// `sqlite3` (or `sqlite`).
    fn load_backend(&mut self, driver: Option<&str>) -> Result<(), GatewayError> {
        match driver {
            None => Ok(()),
            Some(d) if d.eq_ignore_ascii_case(SQLITE_DRIVER) || d.eq_ignore_ascii_case("sqlite") => {
                Ok(())
            }
            Some(other) => Err(GatewayError::UnsupportedDriver(other.to_string())),
        }
    }

    /// # Errors
    ///
    /// Returns an error if the async runtime cannot be started.
    fn prepare(&mut self) -> Result<(), GatewayError> {
        self.runtime().map(|_| ())
    }

    /// # Errors
    ///
    /// Fails if a connection is already open or the file cannot be
    /// opened.
    fn open_connection(&mut self, target: &ConnectTarget) -> Result<(), GatewayError> {
        if self.conn.is_some() {
            return Err(GatewayError::AlreadyConnected);
        }
        let path = database_path(target).to_string();
        debug!(path = %path, "Opening SQLite database");

        let options = SqliteConnectOptions::new().filename(&path).read_only(true);
        let conn = self
            .runtime()?
            .block_on(options.connect())
            .map_err(GatewayError::backend)?;
        self.conn = Some(conn);
        Ok(())
    }

    /// # Errors
    ///
    /// Returns [`GatewayError::NotConnected`] without an open connection.
    fn close_connection(&mut self) -> Result<(), GatewayError> {
        let conn = self.conn.take().ok_or(GatewayError::NotConnected)?;
        self.runtime()?
            .block_on(conn.close())
            .map_err(GatewayError::backend)
    }

    /// # Errors
    ///
    /// Returns [`GatewayError::NotConnected`] without an open connection,
    /// or the driver error if the statement fails.
    fn select(&mut self, query: &Query) -> Result<RowSet, GatewayError> {
        let (sql, params) = query.build();
        let field_count = query.selected().len();
        trace!(sql = %sql, params = ?params, "sqlite select");

        let Some(runtime) = self.runtime.as_ref() else {
            return Err(GatewayError::NotConnected);
        };
        let conn = self.conn.as_mut().ok_or(GatewayError::NotConnected)?;

        let rows = runtime
            .block_on(async {
                let mut q = sqlx::query(&sql);
                for param in params {
                    q = q.bind(param);
                }
                q.fetch_all(&mut *conn).await
            })
            .map_err(GatewayError::backend)?;

        // Cells are read as text whatever their storage class, so
        // INTEGER ids come back as decimal strings.
        let mut data = Vec::with_capacity(rows.len() * field_count);
        for row in &rows {
            for i in 0..field_count {
                let cell: Option<String> = row
                    .try_get_unchecked(i)
                    .map_err(GatewayError::backend)?;
                data.push(cell);
            }
        }
        RowSet::new(rows.len(), field_count, data)
    }
}
