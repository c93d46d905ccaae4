//! Rebuilds the nested configuration document from the context,
//! directive and mapping tables.
//!
//! Starting at the root context, each node is emitted as
//!
//! ```text
//! <key value>
//! directive value
//! ...child nodes...
//! </key>
//! ```
//!
//! The root itself contributes only its directives and children. Any
//! query failure or inconsistent row aborts the whole build; partial
//! output is never returned. Nesting is capped at [`MAX_DEPTH`] levels
//! below the root.

use std::collections::HashSet;

use tracing::{debug, info, trace};

use crate::error::{ConfError, Result};
use crate::gateway::{ConnectionGuard, RowSet, SqlGateway};
use crate::loader::LoaderState;
use crate::params::where_predicate;
use crate::query::{Predicate, Query, Select};
use crate::schema::Schema;

/// Deepest nesting accepted below the root context.
pub const MAX_DEPTH: usize = 64;

/// Progress of a single load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadState {
    /// Nothing loaded yet, or reset by a reload.
    #[default]
    Idle,
    /// Looking up the root context.
    RootResolving,
    /// Walking the context tree.
    Traversing,
    /// Finished successfully.
    Done,
    /// Aborted; no output was produced.
    Failed,
}

/// The rebuilt configuration text, one entry per line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document {
    lines: Vec<String>,
}

impl Document {
    /// Wraps already rendered lines.
    #[must_use]
    pub const fn new(lines: Vec<String>) -> Self {
        Self { lines }
    }

    /// The lines, without terminators.
    #[must_use]
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Returns line `index`.
    #[must_use]
    pub fn line(&self, index: usize) -> Option<&str> {
        self.lines.get(index).map(String::as_str)
    }

    /// Number of lines.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Returns `true` for an empty configuration.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// The whole document, each line newline-terminated.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::new();
        for line in &self.lines {
            out.push_str(line);
            out.push('\n');
        }
        out
    }
}

/// Depth-first walk over the context tree.
pub struct TreeBuilder<'s> {
    schema: &'s Schema,
    state: LoadState,
    lines: Vec<String>,
    visited: HashSet<i64>,
}

impl<'s> TreeBuilder<'s> {
    /// Creates an idle builder for `schema`.
    #[must_use]
    pub fn new(schema: &'s Schema) -> Self {
        Self {
            schema,
            state: LoadState::Idle,
            lines: Vec::new(),
            visited: HashSet::new(),
        }
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> LoadState {
        self.state
    }

    /// Returns to [`LoadState::Idle`] so the builder can run again.
    pub fn reset(&mut self) {
        self.state = LoadState::Idle;
        self.lines.clear();
        self.visited.clear();
    }

    /// Runs the whole build over an open connection.
    pub fn build<G: SqlGateway + ?Sized>(
        &mut self,
        conn: &mut ConnectionGuard<'_, G>,
    ) -> Result<Document> {
        self.reset();
        match self.run(conn) {
            Ok(()) => {
                self.state = LoadState::Done;
                Ok(Document::new(std::mem::take(&mut self.lines)))
            }
            Err(e) => {
                self.state = LoadState::Failed;
                self.lines.clear();
                debug!(error = %e, "Discarding partial configuration");
                Err(e)
            }
        }
    }

    fn run<G: SqlGateway + ?Sized>(&mut self, conn: &mut ConnectionGuard<'_, G>) -> Result<()> {
        self.state = LoadState::RootResolving;
        let Some(root) = self.resolve_root(conn)? else {
            info!("No root context found, configuration is empty");
            return Ok(());
        };

        self.state = LoadState::Traversing;
        debug!(root, "Resolved root context");
        self.visit(conn, root, 0)
    }

    /// Finds the root context ID; `None` means an empty configuration.
    fn resolve_root<G: SqlGateway + ?Sized>(
        &self,
        conn: &mut ConnectionGuard<'_, G>,
    ) -> Result<Option<i64>> {
        let ctx = &self.schema.context;
        let query = Select::new().columns(&[ctx.id_column.as_str()]).from(&ctx.table);
        let query = match ctx.base_id {
            Some(base) => query.filter(Predicate::eq(&ctx.id_column, base)),
            None => query.filter(Predicate::is_null(&ctx.parent_id_column)),
        };

        let rows = conn.select(&query)?;
        match rows.row_count() {
            0 => Ok(None),
            1 => {
                let id = rows.get(0, 0).ok_or_else(|| {
                    ConfError::Schema(format!("root context in '{}' has a NULL id", ctx.table))
                })?;
                parse_id(&ctx.table, id).map(Some)
            }
            n => Err(ConfError::Schema(format!(
                "{n} root contexts found in '{}', expected one",
                ctx.table
            ))),
        }
    }

    fn visit<G: SqlGateway + ?Sized>(
        &mut self,
        conn: &mut ConnectionGuard<'_, G>,
        id: i64,
        depth: usize,
    ) -> Result<()> {
        if !self.visited.insert(id) {
            return Err(ConfError::Data(format!(
                "context {id} is its own ancestor in '{}'",
                self.schema.context.table
            )));
        }
        if depth > MAX_DEPTH {
            return Err(ConfError::Data(format!(
                "context {id} in '{}' is nested deeper than {MAX_DEPTH} levels",
                self.schema.context.table
            )));
        }

        let block = self.context(conn, id)?;
        // The root contributes no block of its own.
        let block = if depth == 0 { None } else { block };
        if let Some((ref key, ref value)) = block {
            self.lines.push(match value {
                Some(value) => format!("<{key} {value}>"),
                None => format!("<{key}>"),
            });
        }

        self.directives(conn, id)?;

        for child in self.children(conn, id)? {
            self.visit(conn, child, depth + 1)?;
        }

        if let Some((key, _)) = block {
            self.lines.push(format!("</{key}>"));
        }
        Ok(())
    }

    /// Looks up the block name and argument of context `id`.
    fn context<G: SqlGateway + ?Sized>(
        &self,
        conn: &mut ConnectionGuard<'_, G>,
        id: i64,
    ) -> Result<Option<(String, Option<String>)>> {
        let ctx = &self.schema.context;
        let query = Select::new()
            .columns(&[ctx.key_column.as_str(), ctx.value_column.as_str()])
            .from(&ctx.table)
            .filter(Predicate::eq(&ctx.id_column, id))
            .filter_raw(ctx.where_clause.as_deref().and_then(where_predicate));

        let rows = conn.select(&query)?;
        match rows.row_count() {
            0 => Err(ConfError::Data(format!(
                "no context with id {id} in '{}'",
                ctx.table
            ))),
            1 => {
                trace!(id, key = ?rows.get(0, 0), value = ?rows.get(0, 1), "context");
                Ok(rows
                    .get(0, 0)
                    .map(|key| (key.to_string(), rows.get(0, 1).map(String::from))))
            }
            n => Err(ConfError::Schema(format!(
                "{n} contexts with id {id} in '{}'",
                ctx.table
            ))),
        }
    }

    /// Emits the directives mapped to context `id`.
    fn directives<G: SqlGateway + ?Sized>(
        &mut self,
        conn: &mut ConnectionGuard<'_, G>,
        id: i64,
    ) -> Result<()> {
        let rows = conn.select(&self.directive_query(id))?;
        for row in rows.rows() {
            let key = row.first().and_then(Option::as_deref).ok_or_else(|| {
                ConfError::Data(format!(
                    "directive mapped to context {id} in '{}' has a NULL key",
                    self.schema.directive.table
                ))
            })?;
            let line = match row.get(1).and_then(Option::as_deref) {
                Some(value) => format!("{key} {value}"),
                None => key.to_string(),
            };
            self.lines.push(line);
        }
        Ok(())
    }

    fn directive_query(&self, id: i64) -> Query {
        let (conf, map) = (&self.schema.directive, &self.schema.mapping);
        let key = format!("{}.{}", conf.table, conf.key_column);
        let value = format!("{}.{}", conf.table, conf.value_column);
        let conf_id = format!("{}.{}", conf.table, conf.id_column);
        let map_conf_id = format!("{}.{}", map.table, map.conf_id_column);
        let map_ctx_id = format!("{}.{}", map.table, map.ctx_id_column);

        Select::new()
            .columns(&[key.as_str(), value.as_str()])
            .from(&conf.table)
            .join(&map.table, &conf_id, &map_conf_id)
            .filter(Predicate::eq(map_ctx_id, id))
            .filter_raw(conf.where_clause.as_deref().and_then(where_predicate))
            .filter_raw(map.where_clause.as_deref().and_then(where_predicate))
    }

    /// IDs of the contexts whose parent is `id`, in query order.
    fn children<G: SqlGateway + ?Sized>(
        &self,
        conn: &mut ConnectionGuard<'_, G>,
        id: i64,
    ) -> Result<Vec<i64>> {
        let ctx = &self.schema.context;
        let query = Select::new()
            .columns(&[ctx.id_column.as_str()])
            .from(&ctx.table)
            .filter(Predicate::eq(&ctx.parent_id_column, id))
            .filter_raw(ctx.where_clause.as_deref().and_then(where_predicate));

        let rows = conn.select(&query)?;
        ids(&ctx.table, &rows)
    }
}

fn ids(table: &str, rows: &RowSet) -> Result<Vec<i64>> {
    rows.rows()
        .map(|row| {
            let id = row.first().and_then(Option::as_deref).ok_or_else(|| {
                ConfError::Data(format!("child context in '{table}' has a NULL id"))
            })?;
            parse_id(table, id)
        })
        .collect()
}

fn parse_id(table: &str, id: &str) -> Result<i64> {
    id.trim()
        .parse()
        .map_err(|_| ConfError::Data(format!("non-integer context id '{id}' in '{table}'")))
}

/// Loads the document described by `state` through `gateway`.
///
/// The backend is selected and prepared, then a single connection is
/// held for the whole walk and closed before returning, on success and
/// on failure alike.
pub fn load<G: SqlGateway + ?Sized>(state: &LoaderState, gateway: &mut G) -> Result<Document> {
    gateway.load_backend(state.driver())?;
    gateway.prepare()?;

    let mut conn = ConnectionGuard::open(gateway, state.target())?;
    let document = TreeBuilder::new(state.schema()).build(&mut conn)?;
    conn.close()?;

    info!(
        lines = document.len(),
        dsn = %state.target().dsn(),
        "Loaded configuration"
    );
    Ok(document)
}
