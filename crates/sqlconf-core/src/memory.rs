//! In-memory SQL gateway.
//!
//! Holds named tables of nullable text cells and evaluates [`Query`]
//! values directly. Raw predicates are limited to conjunctions of
//! `column = literal` terms. Every rendered statement is recorded so
//! callers can check what was sent.

use std::collections::HashMap;

use tracing::trace;

use crate::error::GatewayError;
use crate::gateway::{ConnectTarget, RowSet, SqlGateway};
use crate::query::{Predicate, Query};

/// Driver name accepted by [`MemoryGateway::load_backend`].
pub const MEMORY_DRIVER: &str = "memory";

#[derive(Debug, Clone, Default)]
struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Option<String>>>,
    // Set when a seeded row does not match the column list.
    malformed: Option<String>,
}

impl Table {
    fn position(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }
}

/// A [`SqlGateway`] backed by in-memory tables.
#[derive(Debug, Default)]
pub struct MemoryGateway {
    tables: HashMap<String, Table>,
    connected: bool,
    backend: Option<String>,
    prepared: bool,
    open_count: usize,
    close_count: usize,
    fail_on: Option<String>,
    queries: Vec<String>,
    last_target: Option<ConnectTarget>,
}

impl MemoryGateway {
    /// Creates an empty gateway.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds (or replaces) a table.
    ///
    /// A row whose width differs from `columns` marks the table as
    /// malformed, and every query touching it fails.
    #[must_use]
    pub fn with_table<R>(mut self, name: &str, columns: &[&str], rows: R) -> Self
    where
        R: IntoIterator<Item = Vec<Option<String>>>,
    {
        let rows: Vec<_> = rows.into_iter().collect();
        let malformed = rows
            .iter()
            .position(|row| row.len() != columns.len())
            .map(|i| {
                format!(
                    "table '{name}' has {} columns, row {i} has {}",
                    columns.len(),
                    rows[i].len()
                )
            });
        let table = Table {
            columns: columns.iter().map(|c| (*c).to_string()).collect(),
            rows,
            malformed,
        };
        self.tables.insert(name.to_string(), table);
        self
    }

    /// Appends a row to an existing table.
    pub fn insert(&mut self, table: &str, row: Vec<Option<String>>) -> Result<(), GatewayError> {
        let t = self
            .tables
            .get_mut(table)
            .ok_or_else(|| GatewayError::UnknownTable(table.to_string()))?;
        if row.len() != t.columns.len() {
            return Err(GatewayError::message(format!(
                "table '{table}' has {} columns, row has {}",
                t.columns.len(),
                row.len()
            )));
        }
        t.rows.push(row);
        Ok(())
    }

    /// Makes every query touching `table` fail.
    #[must_use]
    pub fn fail_on(mut self, table: &str) -> Self {
        self.fail_on = Some(table.to_string());
        self
    }

    /// Statements run so far, rendered as SQL.
    #[must_use]
    pub fn queries(&self) -> &[String] {
        &self.queries
    }

    /// Forgets the recorded statements.
    pub fn clear_queries(&mut self) {
        self.queries.clear();
    }

    /// Number of successful `open_connection` calls.
    #[must_use]
    pub const fn open_count(&self) -> usize {
        self.open_count
    }

    /// Number of `close_connection` calls.
    #[must_use]
    pub const fn close_count(&self) -> usize {
        self.close_count
    }

    /// Whether a connection is currently open.
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        self.connected
    }

    /// Driver passed to the last `load_backend` call.
    #[must_use]
    pub fn backend(&self) -> Option<&str> {
        self.backend.as_deref()
    }

    /// Whether `prepare` has been called.
    #[must_use]
    pub const fn is_prepared(&self) -> bool {
        self.prepared
    }

    /// Target of the last `open_connection` call.
    #[must_use]
    pub const fn last_target(&self) -> Option<&ConnectTarget> {
        self.last_target.as_ref()
    }

    fn table(&self, name: &str) -> Result<&Table, GatewayError> {
        if self.fail_on.as_deref() == Some(name) {
            return Err(GatewayError::message(format!("injected failure on '{name}'")));
        }
        let table = self
            .tables
            .get(name)
            .ok_or_else(|| GatewayError::UnknownTable(name.to_string()))?;
        match table.malformed {
            Some(ref reason) => Err(GatewayError::message(reason.clone())),
            None => Ok(table),
        }
    }

    fn evaluate(&self, query: &Query) -> Result<RowSet, GatewayError> {
        let from_name = query.table();
        let from = self.table(from_name)?;
        let mut scope = Scope {
            tables: vec![(from_name, from)],
        };

        // Each candidate holds one row index per table in scope.
        let mut candidates: Vec<Vec<usize>> = (0..from.rows.len()).map(|i| vec![i]).collect();

        if let Some(join) = query.joined() {
            let joined = self.table(&join.table)?;
            scope.tables.push((join.table.as_str(), joined));
            let left = scope.resolve(&join.left)?;
            let right = scope.resolve(&join.right)?;

            let mut next = Vec::new();
            for candidate in &candidates {
                for j in 0..joined.rows.len() {
                    let mut row = candidate.clone();
                    row.push(j);
                    let l = scope.cell(&row, left);
                    let r = scope.cell(&row, right);
                    if l.is_some() && l == r {
                        next.push(row);
                    }
                }
            }
            candidates = next;
        }

        let mut filters = Vec::new();
        for predicate in query.predicates() {
            match predicate {
                Predicate::Eq { column, value } => {
                    filters.push(Filter::Int(scope.resolve(column)?, *value));
                }
                Predicate::IsNull(column) => filters.push(Filter::Null(scope.resolve(column)?)),
                Predicate::Raw(raw) => {
                    for (column, literal) in parse_conjunction(raw)? {
                        filters.push(Filter::Text(scope.resolve(column)?, literal));
                    }
                }
            }
        }
        candidates.retain(|row| filters.iter().all(|f| f.matches(&scope, row)));

        let projection = query
            .selected()
            .iter()
            .map(|c| scope.resolve(c))
            .collect::<Result<Vec<_>, _>>()?;

        RowSet::from_rows(
            projection.len(),
            candidates.iter().map(|row| {
                projection
                    .iter()
                    .map(|&at| scope.cell(row, at).map(String::from))
                    .collect()
            }),
        )
    }
}

/// (table index in scope, column index in that table)
type ColumnRef = (usize, usize);

struct Scope<'a> {
    tables: Vec<(&'a str, &'a Table)>,
}

impl Scope<'_> {
    fn resolve(&self, column: &str) -> Result<ColumnRef, GatewayError> {
        let unknown = || GatewayError::UnknownColumn(column.to_string());
        if let Some((table, name)) = column.split_once('.') {
            let t = self
                .tables
                .iter()
                .position(|(n, _)| *n == table)
                .ok_or_else(unknown)?;
            let c = self.tables[t].1.position(name).ok_or_else(unknown)?;
            return Ok((t, c));
        }
        self.tables
            .iter()
            .enumerate()
            .find_map(|(t, (_, table))| table.position(column).map(|c| (t, c)))
            .ok_or_else(unknown)
    }

    fn cell(&self, row: &[usize], (t, c): ColumnRef) -> Option<&str> {
        let (_, table) = self.tables.get(t)?;
        table.rows.get(*row.get(t)?)?.get(c)?.as_deref()
    }
}

enum Filter {
    Int(ColumnRef, i64),
    Null(ColumnRef),
    Text(ColumnRef, String),
}

impl Filter {
    fn matches(&self, scope: &Scope<'_>, row: &[usize]) -> bool {
        match self {
            Self::Int(at, value) => scope
                .cell(row, *at)
                .and_then(|v| v.trim().parse::<i64>().ok())
                == Some(*value),
            Self::Null(at) => scope.cell(row, *at).is_none(),
            Self::Text(at, literal) => scope.cell(row, *at) == Some(literal.as_str()),
        }
    }
}

/// Parses `a = 1 AND b = 'x'` into `(column, literal)` pairs.
fn parse_conjunction(raw: &str) -> Result<Vec<(&str, String)>, GatewayError> {
    let unsupported = || GatewayError::message(format!("unsupported predicate '{raw}'"));
    let upper = raw.to_ascii_uppercase();

    let mut terms = Vec::new();
    let mut start = 0;
    while let Some(offset) = upper[start..].find(" AND ") {
        terms.push(&raw[start..start + offset]);
        start += offset + " AND ".len();
    }
    terms.push(&raw[start..]);

    terms
        .into_iter()
        .map(|term| {
            let (column, literal) = term.split_once('=').ok_or_else(unsupported)?;
            let column = column.trim();
            let literal = literal.trim();
            if column.is_empty() || literal.is_empty() {
                return Err(unsupported());
            }
            let literal = literal
                .strip_prefix('\'')
                .and_then(|l| l.strip_suffix('\''))
                .unwrap_or(literal);
            Ok((column, literal.to_string()))
        })
        .collect()
}

impl SqlGateway for MemoryGateway {
    fn load_backend(&mut self, driver: Option<&str>) -> Result<(), GatewayError> {
        match driver {
            None | Some(MEMORY_DRIVER) => {
                self.backend = driver.map(String::from);
                Ok(())
            }
            Some(other) => Err(GatewayError::UnsupportedDriver(other.to_string())),
        }
    }

    fn prepare(&mut self) -> Result<(), GatewayError> {
        self.prepared = true;
        Ok(())
    }

    fn open_connection(&mut self, target: &ConnectTarget) -> Result<(), GatewayError> {
        if self.connected {
            return Err(GatewayError::AlreadyConnected);
        }
        self.connected = true;
        self.open_count += 1;
        self.last_target = Some(target.clone());
        Ok(())
    }

    fn close_connection(&mut self) -> Result<(), GatewayError> {
        self.close_count += 1;
        if !self.connected {
            return Err(GatewayError::NotConnected);
        }
        self.connected = false;
        Ok(())
    }

    fn select(&mut self, query: &Query) -> Result<RowSet, GatewayError> {
        if !self.connected {
            return Err(GatewayError::NotConnected);
        }
        let (sql, params) = query.build();
        trace!(sql = %sql, params = ?params, "memory select");
        self.queries.push(sql);
        self.evaluate(query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::Select;
    use crate::uri::ConnectionSpec;

    fn row(cells: &[Option<&str>]) -> Vec<Option<String>> {
        cells.iter().map(|c| c.map(String::from)).collect()
    }

    fn gateway() -> MemoryGateway {
        let mut gw = MemoryGateway::new()
            .with_table(
                "conf",
                &["id", "key", "value"],
                vec![
                    row(&[Some("1"), Some("Port"), Some("21")]),
                    row(&[Some("2"), Some("User"), Some("ftp")]),
                    row(&[Some("3"), Some("Umask"), None]),
                ],
            )
            .with_table(
                "map",
                &["conf_id", "ctx_id"],
                vec![
                    row(&[Some("1"), Some("10")]),
                    row(&[Some("3"), Some("10")]),
                    row(&[Some("2"), Some("20")]),
                ],
            );
        let target = ConnectTarget::from_spec(&ConnectionSpec::parse("sql://mem").unwrap());
        gw.open_connection(&target).unwrap();
        gw
    }

    fn cells(rows: &RowSet) -> Vec<Vec<Option<String>>> {
        rows.rows().map(<[Option<String>]>::to_vec).collect()
    }

    #[test]
    fn test_projection_and_filter() {
        let mut gw = gateway();
        let query = Select::new()
            .columns(&["key", "value"])
            .from("conf")
            .filter(Predicate::eq("id", 2));
        let rows = gw.select(&query).unwrap();
        assert_eq!(cells(&rows), vec![row(&[Some("User"), Some("ftp")])]);
        assert_eq!(gw.queries(), ["SELECT key, value FROM conf WHERE id = ?"]);
    }

    #[test]
    fn test_join_preserves_order() {
        let mut gw = gateway();
        let query = Select::new()
            .columns(&["conf.key", "conf.value"])
            .from("conf")
            .join("map", "conf.id", "map.conf_id")
            .filter(Predicate::eq("map.ctx_id", 10));
        let rows = gw.select(&query).unwrap();
        assert_eq!(
            cells(&rows),
            vec![row(&[Some("Port"), Some("21")]), row(&[Some("Umask"), None])]
        );
    }

    #[test]
    fn test_is_null_and_raw() {
        let mut gw = gateway();
        let query = Select::new()
            .columns(&["key"])
            .from("conf")
            .filter(Predicate::is_null("value"));
        assert_eq!(cells(&gw.select(&query).unwrap()), vec![row(&[Some("Umask")])]);

        let query = Select::new()
            .columns(&["id"])
            .from("conf")
            .filter_raw(Some("key = 'User' and value = ftp"));
        assert_eq!(cells(&gw.select(&query).unwrap()), vec![row(&[Some("2")])]);

        let query = Select::new()
            .columns(&["id"])
            .from("conf")
            .filter_raw(Some("key LIKE 'P%'"));
        assert!(gw.select(&query).is_err());
    }

    #[test]
    fn test_unknown_table_and_column() {
        let mut gw = gateway();
        let query = Select::new().columns(&["id"]).from("nope");
        assert!(matches!(gw.select(&query), Err(GatewayError::UnknownTable(_))));

        let query = Select::new().columns(&["nope"]).from("conf");
        assert!(matches!(gw.select(&query), Err(GatewayError::UnknownColumn(_))));
    }

    #[test]
    fn test_connection_state() {
        let mut gw = gateway();
        let target = gw.last_target().cloned().unwrap();
        assert!(matches!(
            gw.open_connection(&target),
            Err(GatewayError::AlreadyConnected)
        ));
        gw.close_connection().unwrap();
        assert!(!gw.is_connected());

        let query = Select::new().columns(&["id"]).from("conf");
        assert!(matches!(gw.select(&query), Err(GatewayError::NotConnected)));
        assert_eq!((gw.open_count(), gw.close_count()), (1, 1));
    }

    #[test]
    fn test_backend_selection() {
        let mut gw = MemoryGateway::new();
        gw.load_backend(None).unwrap();
        gw.load_backend(Some("memory")).unwrap();
        assert_eq!(gw.backend(), Some("memory"));
        assert!(matches!(
            gw.load_backend(Some("oracle")),
            Err(GatewayError::UnsupportedDriver(d)) if d == "oracle"
        ));
    }

    #[test]
    fn test_fail_on_and_insert() {
        let mut gw = gateway().fail_on("map");
        let query = Select::new()
            .columns(&["conf.key"])
            .from("conf")
            .join("map", "conf.id", "map.conf_id");
        assert!(matches!(gw.select(&query), Err(GatewayError::Backend { .. })));

        gw.insert("conf", row(&[Some("4"), Some("Group"), Some("ftp")]))
            .unwrap();
        assert!(gw.insert("conf", row(&[Some("5")])).is_err());
        assert!(gw.insert("missing", row(&[])).is_err());
    }

    #[test]
    fn test_short_seeded_row_fails_queries() {
        let target = ConnectTarget::from_spec(&ConnectionSpec::parse("sql://mem").unwrap());
        let mut gw = MemoryGateway::new()
            .with_table("ctx", &["id", "parent_id", "key", "value"], vec![row(&[Some("1")])])
            .with_table("conf", &["id"], vec![row(&[Some("1")])]);
        gw.open_connection(&target).unwrap();

        let query = Select::new()
            .columns(&["id"])
            .from("ctx")
            .filter(Predicate::is_null("parent_id"));
        let err = gw.select(&query).unwrap_err();
        assert!(err.to_string().contains("row 0 has 1"), "{err}");

        let query = Select::new()
            .columns(&["conf.id"])
            .from("conf")
            .join("ctx", "conf.id", "ctx.id");
        assert!(matches!(gw.select(&query), Err(GatewayError::Backend { .. })));

        let query = Select::new().columns(&["id"]).from("conf");
        assert_eq!(gw.select(&query).unwrap().row_count(), 1);
    }
}
