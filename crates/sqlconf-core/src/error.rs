//! Error types for parsing `sql://` URIs and rebuilding configuration.

/// Malformed URI or table descriptor syntax.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// The URI does not start with `sql://`.
    #[error("unknown/unsupported scheme in URI '{0}'")]
    UnsupportedScheme(String),

    /// Nothing is left where the host should be.
    #[error("missing host in URI '{0}'")]
    MissingHost(String),

    /// A `[` opened an IPv6 literal that never closes.
    #[error("badly formatted IPv6 address in host info '{0}'")]
    UnterminatedIpv6(String),

    /// Text after the host that is neither a port nor a path.
    #[error("unexpected text '{text}' after host in URI '{uri}'")]
    UnexpectedText {
        /// The full URI.
        uri: String,
        /// The offending remainder.
        text: String,
    },

    /// Port is empty, non-numeric, zero, or above 65535.
    #[error("invalid port specification '{0}'")]
    InvalidPort(String),

    /// A query segment has no `=`.
    #[error("query parameter '{0}' has no value")]
    MissingParamValue(String),

    /// An empty query segment, e.g. a trailing `&`.
    #[error("empty query parameter in '{0}'")]
    EmptyParam(String),

    /// A `ctx`, `conf` or `map` descriptor that does not follow
    /// `table[:col,...][:where=<clause>]`.
    #[error("badly formatted '{param}' parameter '{value}': {reason}")]
    BadDescriptor {
        /// Parameter name (`ctx`, `conf`, `map`).
        param: &'static str,
        /// The raw parameter value.
        value: String,
        /// What was wrong with it.
        reason: String,
    },

    /// `base_id` is not an integer.
    #[error("invalid base_id '{0}': expected an integer context ID")]
    InvalidBaseId(String),
}

/// Failure reported by a [`SqlGateway`](crate::gateway::SqlGateway).
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// No backend is registered under the requested driver name.
    #[error("unsupported SQL backend '{0}'")]
    UnsupportedDriver(String),

    /// A query was issued before a connection was opened.
    #[error("no open database connection")]
    NotConnected,

    /// `open_connection` was called twice without a close in between.
    #[error("database connection already open")]
    AlreadyConnected,

    /// A query referenced a table the backend does not know.
    #[error("unknown table '{0}'")]
    UnknownTable(String),

    /// A query referenced a column the backend does not know.
    #[error("unknown column '{0}'")]
    UnknownColumn(String),

    /// Any other backend failure.
    #[error("backend error: {message}")]
    Backend {
        /// Human-readable description.
        message: String,
        /// The underlying driver error, when there is one.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
    },
}

impl GatewayError {
    /// Wraps a driver error.
    pub fn backend<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Backend {
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }

    /// A backend failure with only a message.
    pub fn message(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
            source: None,
        }
    }
}

/// Coarse category of a [`ConfError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed URI or descriptor.
    Parse,
    /// Missing unique root, or an ambiguous per-ID lookup.
    Schema,
    /// Query or connection failure.
    Gateway,
    /// Referenced row missing, or inconsistent row contents.
    Data,
}

/// Errors that abort a configuration load.
#[derive(Debug, thiserror::Error)]
pub enum ConfError {
    /// Malformed URI or descriptor.
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// Root context is ambiguous, or a context ID matches several rows.
    #[error("schema error: {0}")]
    Schema(String),

    /// The SQL gateway failed.
    #[error("gateway error: {0}")]
    Gateway(#[from] GatewayError),

    /// A referenced row is missing or holds unusable data.
    #[error("data error: {0}")]
    Data(String),
}

impl ConfError {
    /// Returns the coarse category of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Parse(_) => ErrorKind::Parse,
            Self::Schema(_) => ErrorKind::Schema,
            Self::Gateway(_) => ErrorKind::Gateway,
            Self::Data(_) => ErrorKind::Data,
        }
    }
}

/// Result type for configuration loading.
pub type Result<T> = std::result::Result<T, ConfError>;
