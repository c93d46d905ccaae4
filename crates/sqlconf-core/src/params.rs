//! Table descriptor parameters.
//!
//! The `ctx`, `conf` and `map` query parameters each describe one table:
//!
//! ```text
//! ctx=<table>[:id,parent_id,key,value][:where=<clause>]
//! conf=<table>[:id,key,value][:where=<clause>]
//! map=<table>[:conf_id,ctx_id][:where=<clause>]
//! ```
//!
//! Column names are taken literally. The WHERE clause is URL-decoded and
//! stored together with the literal `where=` prefix it was written with,
//! e.g. `WHERE=foo%20bar` is stored as `WHERE=foo bar`.

use crate::error::ParseError;
use crate::uri::{url_decode, QueryParams};

const WHERE_PREFIX: &str = "where=";

/// Which of the three tables a descriptor describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptorKind {
    /// The self-referencing context tree (`ctx`).
    Context,
    /// The directive key/value table (`conf`).
    Directive,
    /// The directive-to-context mapping table (`map`).
    Mapping,
}

impl DescriptorKind {
    /// Name of the query parameter carrying this descriptor.
    #[must_use]
    pub const fn param_name(self) -> &'static str {
        match self {
            Self::Context => "ctx",
            Self::Directive => "conf",
            Self::Mapping => "map",
        }
    }

    /// Number of columns a column list must name.
    #[must_use]
    pub const fn column_count(self) -> usize {
        match self {
            Self::Context => 4,
            Self::Directive => 3,
            Self::Mapping => 2,
        }
    }
}

/// Overrides parsed from a single descriptor; `None` means "use the
/// default".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Descriptor {
    /// Table name.
    pub table: Option<String>,
    /// Column names, exactly [`DescriptorKind::column_count`] of them.
    pub columns: Option<Vec<String>>,
    /// WHERE clause including its literal `where=` prefix.
    pub where_clause: Option<String>,
}

impl Descriptor {
    /// Returns column `index` if a column list was given.
    #[must_use]
    pub fn column(&self, index: usize) -> Option<&str> {
        self.columns.as_ref()?.get(index).map(String::as_str)
    }
}

/// Reads and parses the descriptor of `kind` from `params`.
pub fn parse_param(kind: DescriptorKind, params: &QueryParams) -> Result<Descriptor, ParseError> {
    parse_descriptor(kind, params.get(kind.param_name()))
}

/// Parses a descriptor value.
///
/// An absent or empty value yields an all-`None` descriptor.
pub fn parse_descriptor(kind: DescriptorKind, value: Option<&str>) -> Result<Descriptor, ParseError> {
    let value = match value {
        Some(v) if !v.is_empty() => v,
        _ => return Ok(Descriptor::default()),
    };

    let bad = |reason: &str| ParseError::BadDescriptor {
        param: kind.param_name(),
        value: value.to_string(),
        reason: reason.to_string(),
    };

    let Some((table, rest)) = value.split_once(':') else {
        return Ok(Descriptor {
            table: Some(value.to_string()),
            ..Descriptor::default()
        });
    };

    if table.is_empty() {
        return Err(bad("missing table name"));
    }

    let mut descriptor = Descriptor {
        table: Some(table.to_string()),
        ..Descriptor::default()
    };

    // The WHERE clause may itself contain ':', so once it starts it runs
    // to the end of the value.
    if let Some(clause) = where_clause(rest) {
        descriptor.where_clause = Some(clause);
        return Ok(descriptor);
    }

    let (columns, trailing) = match rest.split_once(':') {
        Some((columns, trailing)) => (columns, Some(trailing)),
        None => (rest, None),
    };

    if !columns.is_empty() {
        let names: Vec<&str> = columns.split(',').collect();
        if names.len() != kind.column_count() || names.iter().any(|n| n.is_empty()) {
            return Err(bad("missing column names"));
        }
        descriptor.columns = Some(names.into_iter().map(String::from).collect());
    }

    if let Some(trailing) = trailing {
        match where_clause(trailing) {
            Some(clause) => descriptor.where_clause = Some(clause),
            None => return Err(bad("bad WHERE clause")),
        }
    }

    Ok(descriptor)
}

/// Recognises `where=<clause>` (prefix matched case-insensitively) and
/// returns the prefix as written followed by the decoded clause.
fn where_clause(segment: &str) -> Option<String> {
    let prefix = segment.get(..WHERE_PREFIX.len())?;
    if !prefix.eq_ignore_ascii_case(WHERE_PREFIX) {
        return None;
    }
    let clause = &segment[WHERE_PREFIX.len()..];
    Some(format!("{prefix}{}", url_decode(clause)))
}

/// Strips the stored `where=` prefix, leaving the bare SQL predicate.
///
/// Returns `None` when nothing but whitespace remains.
#[must_use]
pub fn where_predicate(stored: &str) -> Option<&str> {
    let predicate = match stored.get(..WHERE_PREFIX.len()) {
        Some(prefix) if prefix.eq_ignore_ascii_case(WHERE_PREFIX) => &stored[WHERE_PREFIX.len()..],
        _ => stored,
    };
    let predicate = predicate.trim();
    if predicate.is_empty() {
        None
    } else {
        Some(predicate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(kind: DescriptorKind, value: &str) -> Descriptor {
        parse_descriptor(kind, Some(value))
            .unwrap_or_else(|e| panic!("Failed to parse {value}: {e}"))
    }

    fn parse_err(kind: DescriptorKind, value: &str) -> ParseError {
        parse_descriptor(kind, Some(value)).expect_err(&format!("Expected error for: {value}"))
    }

    #[test]
    fn test_absent_and_empty() {
        for kind in [DescriptorKind::Context, DescriptorKind::Directive, DescriptorKind::Mapping] {
            assert_eq!(parse_descriptor(kind, None).unwrap(), Descriptor::default());
            assert_eq!(parse(kind, ""), Descriptor::default());
        }
    }

    #[test]
    fn test_table_only() {
        let d = parse(DescriptorKind::Directive, "table");
        assert_eq!(d.table.as_deref(), Some("table"));
        assert!(d.columns.is_none());
        assert!(d.where_clause.is_none());
    }

    #[test]
    fn test_table_and_where_without_columns() {
        for kind in [DescriptorKind::Context, DescriptorKind::Directive, DescriptorKind::Mapping] {
            let d = parse(kind, "table::WHERE=x");
            assert_eq!(d.table.as_deref(), Some("table"));
            assert!(d.columns.is_none());
            assert_eq!(d.where_clause.as_deref(), Some("WHERE=x"));
        }
    }

    #[test]
    fn test_where_directly_after_table() {
        let d = parse(DescriptorKind::Mapping, "table:where=a:b");
        assert!(d.columns.is_none());
        assert_eq!(d.where_clause.as_deref(), Some("where=a:b"));
    }

    #[test]
    fn test_columns_and_where() {
        let d = parse(DescriptorKind::Directive, "t:a,b,c:WHERE=y");
        assert_eq!(d.table.as_deref(), Some("t"));
        assert_eq!(
            d.columns,
            Some(vec!["a".to_string(), "b".to_string(), "c".to_string()])
        );
        assert_eq!(d.where_clause.as_deref(), Some("WHERE=y"));

        let d = parse(
            DescriptorKind::Context,
            "my_table:my_id_col,my_parentid_col,my_key_col,my_val_col:WHERE=barbaz",
        );
        assert_eq!(d.column(0), Some("my_id_col"));
        assert_eq!(d.column(1), Some("my_parentid_col"));
        assert_eq!(d.column(2), Some("my_key_col"));
        assert_eq!(d.column(3), Some("my_val_col"));
        assert_eq!(d.where_clause.as_deref(), Some("WHERE=barbaz"));

        let d = parse(DescriptorKind::Mapping, "table:my_conf_id,my_ctx_id");
        assert_eq!(d.column(0), Some("my_conf_id"));
        assert_eq!(d.column(1), Some("my_ctx_id"));
        assert!(d.where_clause.is_none());
    }

    #[test]
    fn test_where_is_decoded_prefix_kept() {
        let d = parse(
            DescriptorKind::Directive,
            "my_table:my_id_col,my_key_col,my_val_col:WHERE=foo%20%3D%201%20AND%20bar%20%3D%20%27baz%27",
        );
        assert_eq!(d.where_clause.as_deref(), Some("WHERE=foo = 1 AND bar = 'baz'"));

        let d = parse(
            DescriptorKind::Context,
            "my_table:a,b,c,d:WHERE=foo+%3D+1+AND+bar+%3D+%27baz%27",
        );
        assert_eq!(d.where_clause.as_deref(), Some("WHERE=foo = 1 AND bar = 'baz'"));

        let d = parse(DescriptorKind::Mapping, "t::wHeRe=foo%20bar");
        assert_eq!(d.where_clause.as_deref(), Some("wHeRe=foo bar"));
    }

    #[test]
    fn test_malformed() {
        for kind in [DescriptorKind::Context, DescriptorKind::Directive, DescriptorKind::Mapping] {
            for value in ["foo:bar", "foo::bar", "foo:a,,b:", ":a,b", "foo::"] {
                assert!(
                    matches!(parse_err(kind, value), ParseError::BadDescriptor { .. }),
                    "expected {value} to be rejected for {kind:?}"
                );
            }
        }
    }

    #[test]
    fn test_column_count_must_match() {
        assert!(parse_descriptor(DescriptorKind::Mapping, Some("t:a,b,c")).is_err());
        assert!(parse_descriptor(DescriptorKind::Context, Some("t:a,b,c")).is_err());
        assert!(parse_descriptor(DescriptorKind::Directive, Some("t:a,b,c,d")).is_err());
    }

    #[test]
    fn test_error_names_param() {
        let err = parse_err(DescriptorKind::Mapping, "foo:bar");
        assert!(err.to_string().contains("'map'"));
    }

    #[test]
    fn test_where_predicate() {
        assert_eq!(where_predicate("WHERE=foo = 1"), Some("foo = 1"));
        assert_eq!(where_predicate("where= x "), Some("x"));
        assert_eq!(where_predicate("WHERE="), None);
        assert_eq!(where_predicate("a = 1"), Some("a = 1"));
    }
}
