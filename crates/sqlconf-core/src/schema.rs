//! Table specifications: built-in defaults merged with descriptor
//! overrides.

use serde::Serialize;
use tracing::trace;

use crate::error::ParseError;
use crate::params::{parse_param, Descriptor, DescriptorKind};
use crate::uri::QueryParams;

/// Default context table name.
pub const DEFAULT_CTX_TABLE: &str = "ftpconf_ctx";
/// Default directive table name.
pub const DEFAULT_CONF_TABLE: &str = "ftpconf_conf";
/// Default mapping table name.
pub const DEFAULT_MAP_TABLE: &str = "ftpconf_map";

/// The self-referencing context tree table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContextTable {
    /// Table name.
    pub table: String,
    /// Context ID column.
    pub id_column: String,
    /// Parent context ID column; NULL marks the implicit root.
    pub parent_id_column: String,
    /// Block name column, e.g. `VirtualHost`.
    pub key_column: String,
    /// Block argument column, e.g. `1.2.3.4`.
    pub value_column: String,
    /// Extra filter, stored with its `where=` prefix.
    pub where_clause: Option<String>,
    /// Explicit root context, replacing the `parent_id IS NULL` lookup.
    pub base_id: Option<i64>,
}

impl Default for ContextTable {
    fn default() -> Self {
        Self {
            table: DEFAULT_CTX_TABLE.to_string(),
            id_column: "id".to_string(),
            parent_id_column: "parent_id".to_string(),
            key_column: "key".to_string(),
            value_column: "value".to_string(),
            where_clause: None,
            base_id: None,
        }
    }
}

/// The directive key/value table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirectiveTable {
    /// Table name.
    pub table: String,
    /// Directive ID column.
    pub id_column: String,
    /// Directive name column.
    pub key_column: String,
    /// Directive arguments column.
    pub value_column: String,
    /// Extra filter, stored with its `where=` prefix.
    pub where_clause: Option<String>,
}

impl Default for DirectiveTable {
    fn default() -> Self {
        Self {
            table: DEFAULT_CONF_TABLE.to_string(),
            id_column: "id".to_string(),
            key_column: "key".to_string(),
            value_column: "value".to_string(),
            where_clause: None,
        }
    }
}

/// The many-to-many table linking directives to contexts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MappingTable {
    /// Table name.
    pub table: String,
    /// Column referencing the directive ID.
    pub conf_id_column: String,
    /// Column referencing the context ID.
    pub ctx_id_column: String,
    /// Extra filter, stored with its `where=` prefix.
    pub where_clause: Option<String>,
}

impl Default for MappingTable {
    fn default() -> Self {
        Self {
            table: DEFAULT_MAP_TABLE.to_string(),
            conf_id_column: "conf_id".to_string(),
            ctx_id_column: "ctx_id".to_string(),
            where_clause: None,
        }
    }
}

/// All three table specifications for one load.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Schema {
    /// Context tree table.
    pub context: ContextTable,
    /// Directive table.
    pub directive: DirectiveTable,
    /// Mapping table.
    pub mapping: MappingTable,
}

impl Schema {
    /// Parses the `ctx`, `conf`, `map` and `base_id` parameters and merges
    /// them over the defaults.
    pub fn from_params(params: &QueryParams) -> Result<Self, ParseError> {
        let ctx = parse_param(DescriptorKind::Context, params)?;
        let conf = parse_param(DescriptorKind::Directive, params)?;
        let map = parse_param(DescriptorKind::Mapping, params)?;

        let base_id = params
            .get("base_id")
            .map(|v| {
                v.trim()
                    .parse::<i64>()
                    .map_err(|_| ParseError::InvalidBaseId(v.to_string()))
            })
            .transpose()?;

        let schema = Self::resolve(&ctx, &conf, &map, base_id);
        schema.trace();
        Ok(schema)
    }

    /// Merges descriptor overrides over the built-in defaults.
    #[must_use]
    pub fn resolve(
        ctx: &Descriptor,
        conf: &Descriptor,
        map: &Descriptor,
        base_id: Option<i64>,
    ) -> Self {
        let mut schema = Self::default();

        let c = &mut schema.context;
        overwrite(&mut c.table, ctx.table.as_deref());
        overwrite(&mut c.id_column, ctx.column(0));
        overwrite(&mut c.parent_id_column, ctx.column(1));
        overwrite(&mut c.key_column, ctx.column(2));
        overwrite(&mut c.value_column, ctx.column(3));
        c.where_clause.clone_from(&ctx.where_clause);
        c.base_id = base_id;

        let d = &mut schema.directive;
        overwrite(&mut d.table, conf.table.as_deref());
        overwrite(&mut d.id_column, conf.column(0));
        overwrite(&mut d.key_column, conf.column(1));
        overwrite(&mut d.value_column, conf.column(2));
        d.where_clause.clone_from(&conf.where_clause);

        let m = &mut schema.mapping;
        overwrite(&mut m.table, map.table.as_deref());
        overwrite(&mut m.conf_id_column, map.column(0));
        overwrite(&mut m.ctx_id_column, map.column(1));
        m.where_clause.clone_from(&map.where_clause);

        schema
    }

    fn trace(&self) {
        let (c, d, m) = (&self.context, &self.directive, &self.mapping);
        trace!(
            table = %c.table,
            id_col = %c.id_column,
            parent_id_col = %c.parent_id_column,
            key_col = %c.key_column,
            value_col = %c.value_column,
            where_clause = c.where_clause.as_deref().unwrap_or("(none)"),
            base_id = ?c.base_id,
            "ctx"
        );
        trace!(
            table = %d.table,
            id_col = %d.id_column,
            key_col = %d.key_column,
            value_col = %d.value_column,
            where_clause = d.where_clause.as_deref().unwrap_or("(none)"),
            "conf"
        );
        trace!(
            table = %m.table,
            conf_id_col = %m.conf_id_column,
            ctx_id_col = %m.ctx_id_column,
            where_clause = m.where_clause.as_deref().unwrap_or("(none)"),
            "map"
        );
    }
}

fn overwrite(field: &mut String, value: Option<&str>) {
    if let Some(value) = value {
        *field = value.to_string();
    }
}
