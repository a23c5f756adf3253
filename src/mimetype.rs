//! Media type dispatch: which destination and which handler chain a file gets.
//!
//! Keys are media types or ranges (`image/*`, `*/*`). A lookup picks the
//! most specific matching key; ties go to the key declared first.

use std::collections::HashSet;
use std::rc::Rc;

use mime::Mime;

use crate::error::{Error, Result};
use crate::pipeline::Chain;
use crate::route::path::{basename, join, normalize_path};

/// The catch-all key every table must declare.
pub const CATCH_ALL: &str = "*/*";

/// How a source path becomes a destination path.
#[derive(Debug, Clone)]
pub enum DestRule {
    /// Place the file under a directory, keeping its basename.
    Prefix(String),
    /// Compute the destination from the source path.
    Compute(fn(&str) -> String),
    /// The destination is the source path itself.
    Keep,
}

impl DestRule {
    pub fn destination(&self, src: &str) -> String {
        let dest = match self {
            DestRule::Prefix(prefix) => join(prefix, basename(src)),
            DestRule::Compute(f) => f(src),
            DestRule::Keep => src.to_string(),
        };
        normalize_path(&dest)
    }
}

/// A table value: a rule and chain, or a pointer to another key.
#[derive(Debug, Clone)]
pub enum MimeEntry {
    Direct { rule: DestRule, chain: Rc<Chain> },
    Alias(String),
}

#[derive(Debug, Clone)]
struct Pattern {
    type_: String,
    subtype: String,
}

impl Pattern {
    fn parse(key: &str) -> Option<Self> {
        let mime: Mime = key.trim().parse().ok()?;
        Some(Self {
            type_: mime.type_().as_str().to_ascii_lowercase(),
            subtype: mime.subtype().as_str().to_ascii_lowercase(),
        })
    }

    /// 2 for an exact match, 1 for `type/*`, 0 for `*/*`.
    fn score(&self, query: Option<&Mime>) -> Option<u8> {
        if self.type_ == "*" {
            return Some(0);
        }
        let query = query?;
        if !query.type_().as_str().eq_ignore_ascii_case(&self.type_) {
            return None;
        }
        if self.subtype == "*" {
            return Some(1);
        }
        query
            .subtype()
            .as_str()
            .eq_ignore_ascii_case(&self.subtype)
            .then_some(2)
    }
}

/// Ordered media type table.
#[derive(Debug, Clone, Default)]
pub struct MimeTable {
    entries: Vec<(String, Pattern, MimeEntry)>,
}

impl MimeTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry with its own rule and chain.
    pub fn direct(self, key: &str, rule: DestRule, chain: Rc<Chain>) -> Result<Self> {
        self.push(key, MimeEntry::Direct { rule, chain })
    }

    /// Add an entry that resolves like `target`.
    pub fn alias(self, key: &str, target: &str) -> Result<Self> {
        self.push(key, MimeEntry::Alias(target.to_string()))
    }

    fn push(mut self, key: &str, entry: MimeEntry) -> Result<Self> {
        let pattern = Pattern::parse(key)
            .ok_or_else(|| Error::Config(format!("'{key}' is not a media type or range")))?;
        self.entries.push((key.to_string(), pattern, entry));
        Ok(self)
    }

    /// Check the table is usable: a catch-all exists and every alias
    /// reaches a direct entry.
    pub fn validate(&self) -> Result<()> {
        if !self.entries.iter().any(|(key, _, _)| key == CATCH_ALL) {
            return Err(Error::Config(format!(
                "media type table has no '{CATCH_ALL}' entry"
            )));
        }
        for (key, _, _) in &self.entries {
            self.resolve(key)?;
        }
        Ok(())
    }

    /// The destination rule and chain for a file of type `mimetype`.
    ///
    /// Types that do not parse only match the catch-all.
    pub fn classify(&self, mimetype: &str) -> Result<(&DestRule, &Rc<Chain>)> {
        let query: Option<Mime> = mimetype.trim().parse().ok();

        let mut best: Option<(u8, &str)> = None;
        for (key, pattern, _) in &self.entries {
            if let Some(score) = pattern.score(query.as_ref())
                && best.is_none_or(|(top, _)| score > top)
            {
                best = Some((score, key));
            }
        }

        let (_, key) = best.ok_or_else(|| {
            Error::Config(format!("no media type entry matches '{mimetype}'"))
        })?;
        log::trace!("{mimetype} dispatched to '{key}'");
        self.resolve(key)
    }

    /// Follow aliases starting at `key` until a direct entry.
    fn resolve(&self, key: &str) -> Result<(&DestRule, &Rc<Chain>)> {
        let mut seen = HashSet::new();
        let mut current = key;
        loop {
            if !seen.insert(current) {
                return Err(Error::Config(format!(
                    "media type alias cycle through '{current}'"
                )));
            }
            let entry = self
                .entries
                .iter()
                .find(|(k, _, _)| k == current)
                .map(|(_, _, entry)| entry)
                .ok_or_else(|| {
                    Error::Config(format!("media type alias points at unknown '{current}'"))
                })?;
            match entry {
                MimeEntry::Direct { rule, chain } => return Ok((rule, chain)),
                MimeEntry::Alias(target) => current = target,
            }
        }
    }
}
