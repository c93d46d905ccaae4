#![allow(dead_code)]

use sqlconf_core::prelude::*;

pub fn cells(cells: &[Option<&str>]) -> Vec<Option<String>> {
    cells.iter().map(|c| c.map(String::from)).collect()
}

pub fn spec(uri: &str) -> ConnectionSpec {
    ConnectionSpec::parse(uri).unwrap_or_else(|e| panic!("Failed to parse: {uri}\nError: {e:?}"))
}

pub fn spec_err(uri: &str) -> ParseError {
    ConnectionSpec::parse(uri).expect_err(&format!("Expected parse error for: {uri}"))
}

/// A gateway over the three default tables.
pub struct Fixture {
    pub ctx: Vec<Vec<Option<String>>>,
    pub conf: Vec<Vec<Option<String>>>,
    pub map: Vec<Vec<Option<String>>>,
}

impl Fixture {
    pub fn new() -> Self {
        Self {
            ctx: Vec::new(),
            conf: Vec::new(),
            map: Vec::new(),
        }
    }

    /// The implicit root, id 1.
    pub fn with_root() -> Self {
        Self::new().ctx(1, None, None, None)
    }

    pub fn ctx(mut self, id: i64, parent: Option<i64>, key: Option<&str>, value: Option<&str>) -> Self {
        let id = id.to_string();
        let parent = parent.map(|p| p.to_string());
        self.ctx.push(cells(&[Some(id.as_str()), parent.as_deref(), key, value]));
        self
    }

    /// Adds directive `id` and maps it to context `ctx_id`.
    pub fn directive(mut self, id: i64, ctx_id: i64, key: &str, value: Option<&str>) -> Self {
        let id = id.to_string();
        let ctx_id = ctx_id.to_string();
        self.conf.push(cells(&[Some(id.as_str()), Some(key), value]));
        self.map.push(cells(&[Some(id.as_str()), Some(ctx_id.as_str())]));
        self
    }

    pub fn gateway(self) -> MemoryGateway {
        MemoryGateway::new()
            .with_table("ftpconf_ctx", &["id", "parent_id", "key", "value"], self.ctx)
            .with_table("ftpconf_conf", &["id", "key", "value"], self.conf)
            .with_table("ftpconf_map", &["conf_id", "ctx_id"], self.map)
    }

    pub fn source(self) -> ConfigSource<MemoryGateway> {
        ConfigSource::new(self.gateway())
    }
}

pub fn read_all(source: &mut ConfigSource<MemoryGateway>, uri: &str) -> Vec<String> {
    source
        .open(uri)
        .unwrap_or_else(|e| panic!("Failed to load: {uri}\nError: {e}"))
        .collect()
}
