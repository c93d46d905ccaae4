//! File-like access to a database-backed configuration.
//!
//! [`ConfigSource`] stands in for the host's file hooks: `open` parses the
//! URI and builds the document on first use, and every later open reads
//! the cached copy until [`ConfigSource::reload`] drops it.

use std::sync::Arc;

use tracing::{info, Level};

use crate::builder::{load, Document};
use crate::error::Result;
use crate::gateway::SqlGateway;
use crate::loader::LoaderState;

/// Lazily built, cached configuration document.
pub struct ConfigSource<G> {
    gateway: G,
    document: Option<Arc<Document>>,
}

impl<G: SqlGateway> ConfigSource<G> {
    /// Creates a source that loads through `gateway`.
    pub const fn new(gateway: G) -> Self {
        Self {
            gateway,
            document: None,
        }
    }

    /// Opens `uri` for reading, building the document if none is cached.
    ///
    /// The URI is always parsed, so a malformed URI fails even when a
    /// document is cached. With `tracing=on` in the URI, parse and build
    /// are traced to stderr.
    pub fn open(&mut self, uri: &str) -> Result<ConfigReader> {
        let state = LoaderState::from_uri(uri)?;
        if !state.tracing() {
            return self.open_state(&state);
        }

        let subscriber = tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_max_level(Level::TRACE)
            .finish();
        tracing::subscriber::with_default(subscriber, || {
            // Parse again so the parse itself shows up in the trace.
            let state = LoaderState::from_uri(uri)?;
            self.open_state(&state)
        })
    }

    fn open_state(&mut self, state: &LoaderState) -> Result<ConfigReader> {
        let document = match self.document {
            Some(ref document) => Arc::clone(document),
            None => {
                let document = Arc::new(load(state, &mut self.gateway)?);
                self.document = Some(Arc::clone(&document));
                document
            }
        };
        Ok(ConfigReader::new(document))
    }

    /// Drops the cached document; the next `open` rebuilds it.
    pub fn reload(&mut self) {
        if self.document.take().is_some() {
            info!("Configuration cache cleared");
        }
    }

    /// Whether a document is cached.
    #[must_use]
    pub const fn is_loaded(&self) -> bool {
        self.document.is_some()
    }

    /// The cached document, if any.
    #[must_use]
    pub fn document(&self) -> Option<&Document> {
        self.document.as_deref()
    }

    /// The underlying gateway.
    #[must_use]
    pub const fn gateway(&self) -> &G {
        &self.gateway
    }

    /// The underlying gateway, mutably.
    pub fn gateway_mut(&mut self) -> &mut G {
        &mut self.gateway
    }

    /// Consumes the source, returning the gateway.
    pub fn into_inner(self) -> G {
        self.gateway
    }
}

/// Sequential, non-seekable reader over a [`Document`].
#[derive(Debug, Clone)]
pub struct ConfigReader {
    document: Arc<Document>,
    next: usize,
}

impl ConfigReader {
    /// Creates a reader positioned at the first line.
    #[must_use]
    pub const fn new(document: Arc<Document>) -> Self {
        Self { document, next: 0 }
    }

    /// Appends the next line, newline-terminated, to `buf`.
    ///
    /// Returns the number of bytes appended; 0 means end of document.
    pub fn read_line(&mut self, buf: &mut String) -> usize {
        let Some(line) = self.document.line(self.next) else {
            return 0;
        };
        self.next += 1;
        buf.push_str(line);
        buf.push('\n');
        line.len() + 1
    }

    /// Number of lines not yet read.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.document.len().saturating_sub(self.next)
    }

    /// The document being read.
    #[must_use]
    pub fn document(&self) -> &Document {
        &self.document
    }
}

impl Iterator for ConfigReader {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        let line = self.document.line(self.next)?.to_string();
        self.next += 1;
        Some(line)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.remaining();
        (n, Some(n))
    }
}

impl ExactSizeIterator for ConfigReader {}

#[cfg(test)]
mod tests {
    use super::*;

    fn reader(lines: &[&str]) -> ConfigReader {
        ConfigReader::new(Arc::new(Document::new(
            lines.iter().map(|l| (*l).to_string()).collect(),
        )))
    }

    #[test]
    fn test_read_line_one_per_call() {
        let mut r = reader(&["<Global>", "Umask 022", "</Global>"]);
        let mut buf = String::new();
        assert_eq!(r.read_line(&mut buf), 9);
        assert_eq!(buf, "<Global>\n");

        buf.clear();
        assert_eq!(r.read_line(&mut buf), 10);
        assert_eq!(buf, "Umask 022\n");
        assert_eq!(r.remaining(), 1);

        buf.clear();
        r.read_line(&mut buf);
        assert_eq!(r.read_line(&mut buf), 0);
        assert_eq!(r.read_line(&mut buf), 0);
        assert_eq!(buf, "</Global>\n");
    }

    #[test]
    fn test_iterator() {
        let r = reader(&["a b", "c d"]);
        assert_eq!(r.len(), 2);
        assert_eq!(r.collect::<Vec<_>>(), ["a b", "c d"]);
        assert_eq!(reader(&[]).next(), None);
    }

    #[test]
    fn test_readers_are_independent() {
        let mut first = reader(&["x 1", "y 2"]);
        let second = first.clone();
        first.next();
        assert_eq!(first.remaining(), 1);
        assert_eq!(second.remaining(), 2);
    }
}
