#![allow(dead_code)]

use std::path::{Path, PathBuf};

use sqlx::sqlite::SqliteConnectOptions;
use sqlx::{ConnectOptions, Connection};
use tempfile::TempDir;

pub const SCHEMA: &str = "
    CREATE TABLE ftpconf_ctx (
        id INTEGER PRIMARY KEY,
        parent_id INTEGER,
        key TEXT,
        value TEXT
    );
    CREATE TABLE ftpconf_conf (
        id INTEGER PRIMARY KEY,
        key TEXT NOT NULL,
        value TEXT
    );
    CREATE TABLE ftpconf_map (
        conf_id INTEGER NOT NULL,
        ctx_id INTEGER NOT NULL
    );
";

/// A SQLite file inside a temporary directory.
pub struct TestDb {
    dir: TempDir,
    path: PathBuf,
}

impl TestDb {
    /// Creates the database and runs `sql` against it.
    pub fn new(sql: &str) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("proftpd.db");
        execute(&path, sql);
        Self { dir, path }
    }

    /// The default three tables plus `inserts`.
    pub fn with_default_tables(inserts: &str) -> Self {
        Self::new(&format!("{SCHEMA}{inserts}"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `sql://<absolute path>` followed by `query`, if any.
    pub fn uri(&self, query: &str) -> String {
        let mut uri = format!("sql://{}", self.path.display());
        if !query.is_empty() {
            uri.push('?');
            uri.push_str(query);
        }
        uri
    }

    pub fn execute(&self, sql: &str) {
        execute(&self.path, sql);
    }
}

fn execute(path: &Path, sql: &str) {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("tokio runtime");
    rt.block_on(async {
        let mut conn = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .connect()
            .await
            .expect("open test database");
        sqlx::raw_sql(sql)
            .execute(&mut conn)
            .await
            .expect("seed test database");
        conn.close().await.expect("close test database");
    });
}
