//! # sqlconf-core
//!
//! Loads an FTP server configuration from relational tables instead of a
//! flat file.
//!
//! A `sql://` URI names the database and three tables:
//! - a self-referencing **context** tree (`<VirtualHost ...>`, `<Directory ...>`)
//! - a **directive** table of key/value lines
//! - a **mapping** table linking directives to contexts
//!
//! The tree builder walks the contexts depth-first and emits the nested,
//! block-structured text the server would otherwise read from disk.
//!
//! ## URI format
//!
//! ```text
//! sql://[user[:pass]@]host[:port][/path]?[database=name&]
//!     ctx=<table>[:id,parent_id,key,value][:where=<clause>]&
//!     conf=<table>[:id,key,value][:where=<clause>]&
//!     map=<table>[:conf_id,ctx_id][:where=<clause>]
//!     [&base_id=<id>][&driver=<name>][&tracing=<bool>]
//! ```
//!
//! ## Example
//!
//! ```rust
//! use sqlconf_core::prelude::*;
//!
//! fn row(cells: &[Option<&str>]) -> Vec<Option<String>> {
//!     cells.iter().map(|c| c.map(String::from)).collect()
//! }
//!
//! let gateway = MemoryGateway::new()
//!     .with_table(
//!         "ftpconf_ctx",
//!         &["id", "parent_id", "key", "value"],
//!         vec![
//!             row(&[Some("1"), None, None, None]),
//!             row(&[Some("2"), Some("1"), Some("VirtualHost"), Some("1.2.3.4")]),
//!         ],
//!     )
//!     .with_table("ftpconf_conf", &["id", "key", "value"], vec![row(&[Some("1"), Some("Port"), Some("21")])])
//!     .with_table("ftpconf_map", &["conf_id", "ctx_id"], vec![row(&[Some("1"), Some("2")])]);
//!
//! let mut source = ConfigSource::new(gateway);
//! let lines: Vec<String> = source.open("sql://localhost").unwrap().collect();
//! assert_eq!(lines, ["<VirtualHost 1.2.3.4>", "Port 21", "</VirtualHost>"]);
//! ```

pub mod builder;
pub mod error;
pub mod gateway;
pub mod loader;
pub mod memory;
pub mod params;
pub mod query;
pub mod schema;
pub mod source;
pub mod uri;

pub use builder::{load, Document, LoadState, TreeBuilder};
pub use error::{ConfError, ErrorKind, GatewayError, ParseError, Result};
pub use gateway::{ConnectTarget, ConnectionGuard, RowSet, SqlGateway};
pub use loader::LoaderState;
pub use source::{ConfigReader, ConfigSource};
pub use uri::{is_sql_uri, url_decode, ConnectionSpec, QueryParams};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::builder::{load, Document, LoadState, TreeBuilder};
    pub use crate::error::{ConfError, ErrorKind, GatewayError, ParseError, Result};
    pub use crate::gateway::{ConnectTarget, ConnectionGuard, RowSet, SqlGateway};
    pub use crate::loader::LoaderState;
    pub use crate::memory::MemoryGateway;
    pub use crate::query::{Predicate, Query, Select};
    pub use crate::schema::{ContextTable, DirectiveTable, MappingTable, Schema};
    pub use crate::source::{ConfigReader, ConfigSource};
    pub use crate::uri::{is_sql_uri, ConnectionSpec, QueryParams};
}
