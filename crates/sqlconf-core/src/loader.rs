//! Per-load state derived from a `sql://` URI.

use serde::Serialize;
use tracing::{trace, warn};

use crate::error::ParseError;
use crate::gateway::ConnectTarget;
use crate::schema::Schema;
use crate::uri::ConnectionSpec;

/// Everything one load needs, parsed from a single URI.
///
/// Built fresh for every open; nothing is shared between loads.
#[derive(Debug, Clone, Serialize)]
pub struct LoaderState {
    connection: ConnectionSpec,
    target: ConnectTarget,
    schema: Schema,
    driver: Option<String>,
    tracing: bool,
}

impl LoaderState {
    /// Parses `uri` and resolves the table specifications.
    pub fn from_uri(uri: &str) -> Result<Self, ParseError> {
        let connection = ConnectionSpec::parse(uri)?;
        let params = connection.params();

        let tracing = params.get("tracing").is_some_and(|value| {
            parse_bool(value).unwrap_or_else(|| {
                warn!(value, "Ignoring unrecognised 'tracing' value");
                false
            })
        });
        let driver = params.get("driver").map(normalize_driver);

        let target = ConnectTarget::from_spec(&connection);
        trace!(
            username = target.username.as_deref().unwrap_or("(none)"),
            server = %target.server,
            database = target.database.as_deref().unwrap_or("(none)"),
            driver = driver.as_deref().unwrap_or("(default)"),
            "db"
        );

        let schema = Schema::from_params(params)?;

        Ok(Self {
            connection,
            target,
            schema,
            driver,
            tracing,
        })
    }

    /// The parsed URI.
    #[must_use]
    pub const fn connection(&self) -> &ConnectionSpec {
        &self.connection
    }

    /// Where to connect.
    #[must_use]
    pub const fn target(&self) -> &ConnectTarget {
        &self.target
    }

    /// Resolved table specifications.
    #[must_use]
    pub const fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Backend driver name, if one was requested.
    #[must_use]
    pub fn driver(&self) -> Option<&str> {
        self.driver.as_deref()
    }

    /// Whether the URI asked for load tracing on stderr.
    #[must_use]
    pub const fn tracing(&self) -> bool {
        self.tracing
    }
}

/// Maps driver aliases to their canonical name.
#[must_use]
pub fn normalize_driver(driver: &str) -> String {
    if driver.eq_ignore_ascii_case("sqlite") {
        "sqlite3".to_string()
    } else {
        driver.to_ascii_lowercase()
    }
}

/// Parses `on/off`, `yes/no`, `true/false` and `1/0`, ignoring case.
#[must_use]
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "on" | "yes" | "true" | "1" => Some(true),
        "off" | "no" | "false" | "0" => Some(false),
        _ => None,
    }
}
