//! SELECT statement builder using the typestate pattern.
//!
//! Queries are kept structured rather than rendered straight to a string
//! so that a gateway can either render them to `?`-parameterised SQL
//! ([`Select::build`]) or evaluate them directly, as the in-memory
//! gateway does.

use std::fmt;
use std::marker::PhantomData;

// Typestate markers (zero-sized types)

/// Marker: No columns specified yet.
pub struct NoColumns;
/// Marker: Columns have been specified.
pub struct HasColumns;
/// Marker: No FROM clause specified yet.
pub struct NoFrom;
/// Marker: FROM clause has been specified.
pub struct HasFrom;

/// A complete, executable query.
pub type Query = Select<HasColumns, HasFrom>;

/// One condition of a WHERE clause; conditions are ANDed together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    /// `column = ?` bound to an integer ID.
    Eq {
        /// Column name, optionally table-qualified.
        column: String,
        /// Bound value.
        value: i64,
    },
    /// `column IS NULL`.
    IsNull(String),
    /// A caller-supplied SQL fragment, rendered in parentheses.
    Raw(String),
}

impl Predicate {
    /// Creates an equality predicate.
    pub fn eq(column: impl Into<String>, value: i64) -> Self {
        Self::Eq {
            column: column.into(),
            value,
        }
    }

    /// Creates an `IS NULL` predicate.
    pub fn is_null(column: impl Into<String>) -> Self {
        Self::IsNull(column.into())
    }

    /// Creates a raw SQL predicate.
    pub fn raw(sql: impl Into<String>) -> Self {
        Self::Raw(sql.into())
    }
}

/// `INNER JOIN table ON left = right`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Join {
    /// Joined table.
    pub table: String,
    /// Column on the FROM side of the equality.
    pub left: String,
    /// Column on the joined side of the equality.
    pub right: String,
}

/// A SELECT builder.
///
/// `build()` and `filter()` are only available once both the columns and
/// the FROM table are known.
pub struct Select<Cols, From> {
    columns: Vec<String>,
    from: Option<String>,
    join: Option<Join>,
    predicates: Vec<Predicate>,
    _state: PhantomData<(Cols, From)>,
}

impl Select<NoColumns, NoFrom> {
    /// Creates a new SELECT builder.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            columns: Vec::new(),
            from: None,
            join: None,
            predicates: Vec::new(),
            _state: PhantomData,
        }
    }
}

impl Default for Select<NoColumns, NoFrom> {
    fn default() -> Self {
        Self::new()
    }
}

// Transition: NoColumns -> HasColumns
impl<From> Select<NoColumns, From> {
    /// Specifies the columns to select.
    #[must_use]
    pub fn columns(self, cols: &[&str]) -> Select<HasColumns, From> {
        Select {
            columns: cols.iter().map(|s| String::from(*s)).collect(),
            from: self.from,
            join: self.join,
            predicates: self.predicates,
            _state: PhantomData,
        }
    }
}

// Transition: NoFrom -> HasFrom
impl<Cols> Select<Cols, NoFrom> {
    /// Specifies the table to select from.
    #[must_use]
    pub fn from(self, table: &str) -> Select<Cols, HasFrom> {
        Select {
            columns: self.columns,
            from: Some(String::from(table)),
            join: self.join,
            predicates: self.predicates,
            _state: PhantomData,
        }
    }
}

// Methods available after FROM
impl<Cols> Select<Cols, HasFrom> {
    /// Adds an INNER JOIN on `left = right`.
    #[must_use]
    pub fn join(mut self, table: &str, left: &str, right: &str) -> Self {
        self.join = Some(Join {
            table: table.to_string(),
            left: left.to_string(),
            right: right.to_string(),
        });
        self
    }

    /// ANDs a predicate onto the WHERE clause.
    #[must_use]
    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    /// ANDs a raw predicate if one is given.
    #[must_use]
    pub fn filter_raw(self, sql: Option<&str>) -> Self {
        match sql {
            Some(sql) => self.filter(Predicate::raw(sql)),
            None => self,
        }
    }
}

impl Select<HasColumns, HasFrom> {
    /// Selected column names.
    #[must_use]
    pub fn selected(&self) -> &[String] {
        &self.columns
    }

    /// The FROM table.
    #[must_use]
    pub fn table(&self) -> &str {
        self.from.as_deref().unwrap_or_default()
    }

    /// The INNER JOIN, if any.
    #[must_use]
    pub const fn joined(&self) -> Option<&Join> {
        self.join.as_ref()
    }

    /// WHERE conditions, to be ANDed.
    #[must_use]
    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    /// Renders the statement; integer values become `?` parameters.
    #[must_use]
    pub fn build(&self) -> (String, Vec<i64>) {
        let mut sql = String::from("SELECT ");
        let mut params = vec![];

        sql.push_str(&self.columns.join(", "));
        sql.push_str(" FROM ");
        sql.push_str(self.table());

        if let Some(ref join) = self.join {
            sql.push_str(&format!(
                " INNER JOIN {} ON {} = {}",
                join.table, join.left, join.right
            ));
        }

        for (i, predicate) in self.predicates.iter().enumerate() {
            sql.push_str(if i == 0 { " WHERE " } else { " AND " });
            match predicate {
                Predicate::Eq { column, value } => {
                    sql.push_str(column);
                    sql.push_str(" = ?");
                    params.push(*value);
                }
                Predicate::IsNull(column) => {
                    sql.push_str(column);
                    sql.push_str(" IS NULL");
                }
                Predicate::Raw(raw) => {
                    sql.push('(');
                    sql.push_str(raw);
                    sql.push(')');
                }
            }
        }

        (sql, params)
    }
}

impl fmt::Display for Select<HasColumns, HasFrom> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (sql, params) = self.build();
        write!(f, "{sql}")?;
        if !params.is_empty() {
            write!(f, " {params:?}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Select<HasColumns, HasFrom> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Select")
            .field("columns", &self.columns)
            .field("from", &self.from)
            .field("join", &self.join)
            .field("predicates", &self.predicates)
            .finish()
    }
}
