//! Source-to-destination routing and link rewriting.
//!
//! Every file of a run is registered in a [`RouteTable`] before any
//! document is transformed. [`Router::routed_url`] then rewrites a relative
//! reference found in one source document so that it points at the
//! destination of its target, relative to the destination of the document
//! it appears in.

mod check;
pub mod path;
mod url;

use std::collections::HashMap;

pub use check::{FallbackBase, LinkChecker, LinkStatus};
pub use url::{UrlKind, UrlRef, url_kind};

use crate::error::{Error, Result};
use path::{decode_path, dirname, encode_path, join, normalize_path, relpath};

/// Normalized source path to normalized destination path, in registration order.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    map: HashMap<String, String>,
    order: Vec<String>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a route, returning the destination it replaces, if any.
    ///
    /// A re-registered source keeps its original position.
    pub fn register(&mut self, source: &str, destination: &str) -> Option<String> {
        let key = route_key(source);
        let value = normalize_path(destination);
        let previous = self.map.insert(key.clone(), value);
        if previous.is_none() {
            self.order.push(key);
        }
        previous
    }

    /// Destination of a source path.
    pub fn get(&self, source: &str) -> Option<&str> {
        self.map.get(&route_key(source)).map(String::as_str)
    }

    pub fn contains(&self, source: &str) -> bool {
        self.map.contains_key(&route_key(source))
    }

    /// Routes in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.order
            .iter()
            .filter_map(|k| self.map.get(k).map(|v| (k.as_str(), v.as_str())))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Resolve `reference`, found inside `filepath`, against the table.
    ///
    /// Pure: no I/O and no mutation. A missing route for `filepath` itself
    /// is an error because the table must be complete before rewriting.
    pub fn resolve(&self, filepath: &str, reference: &str) -> Result<Resolution> {
        let url = UrlRef::parse(reference);
        if url.kind() != UrlKind::Relative {
            return Ok(Resolution::Passthrough);
        }

        let link_path = decode_path(url.path);
        let current = self
            .get(filepath)
            .ok_or_else(|| Error::MissingRoute(filepath.to_string()))?;
        let current_dir = dirname(current);

        let target = normalize_path(&join(dirname(filepath), &link_path));
        let Some(destination) = self.get(&target) else {
            return Ok(Resolution::Unrouted {
                routed_dir: current_dir.to_string(),
                link_path: link_path.into_owned(),
            });
        };

        let rel = relpath(destination, current_dir);
        if normalize_path(&link_path) == rel {
            return Ok(Resolution::Unchanged);
        }

        let encoded = encode_path(&rel);
        Ok(Resolution::Rewritten(url.with_path(&encoded).to_string()))
    }
}

fn route_key(source: &str) -> String {
    normalize_path(&decode_path(source))
}

/// Outcome of resolving one reference against a [`RouteTable`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Not a relative reference; left alone.
    Passthrough,
    /// Already points at the right place.
    Unchanged,
    /// The reference as it must now be written.
    Rewritten(String),
    /// The target is not part of the run.
    Unrouted {
        /// Directory of the routed current document.
        routed_dir: String,
        /// The decoded link path as written.
        link_path: String,
    },
}

/// A frozen route table together with the checker used for unrouted links.
#[derive(Debug)]
pub struct Router {
    table: RouteTable,
    checker: LinkChecker,
}

impl Router {
    pub fn new(table: RouteTable, checker: LinkChecker) -> Self {
        Self { table, checker }
    }

    pub fn table(&self) -> &RouteTable {
        &self.table
    }

    pub fn checker(&self) -> &LinkChecker {
        &self.checker
    }

    /// Destination of `source`, or a `MissingRoute` error.
    pub fn destination(&self, source: &str) -> Result<&str> {
        self.table
            .get(source)
            .ok_or_else(|| Error::MissingRoute(source.to_string()))
    }

    /// Link from the destination of `from` to the destination of `to`.
    pub fn relative_link(&self, from: &str, to: &str) -> Result<String> {
        let from_dir = dirname(self.destination(from)?);
        let rel = relpath(self.destination(to)?, from_dir);
        Ok(encode_path(&rel).into_owned())
    }

    /// The rewritten reference, or `None` when it stays as written.
    ///
    /// Unrouted links are checked on disk and against the fallback; a link
    /// nobody can confirm is reported and left alone.
    pub fn routed_url(&self, filepath: &str, reference: &str) -> Result<Option<String>> {
        match self.table.resolve(filepath, reference)? {
            Resolution::Passthrough | Resolution::Unchanged => Ok(None),
            Resolution::Rewritten(new) => {
                log::debug!("Routed {reference} to {new}.");
                Ok(Some(new))
            }
            Resolution::Unrouted {
                routed_dir,
                link_path,
            } => {
                if !self.checker.check_relative(&routed_dir, &link_path).exists() {
                    log::warn!("Broken and unfixable link found: {reference} (in {filepath})");
                }
                Ok(None)
            }
        }
    }
}
