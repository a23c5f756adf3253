//! Splitting link references into their components.
//!
//! Links in documents are kept as written: a reference is only rebuilt
//! when its path changes, and then every other component is carried over
//! byte for byte.

use std::fmt;

/// How the router treats a reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrlKind {
    /// No scheme, no host, a non-empty path that does not start at the root.
    Relative,
    /// No scheme, no host, a path starting with `/`.
    Absolute,
    /// Anything else: external URLs, fragment-only and empty references.
    Other,
}

/// A reference split the way `scheme://netloc/path?query#fragment` reads.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UrlRef<'a> {
    pub scheme: Option<&'a str>,
    pub netloc: Option<&'a str>,
    pub path: &'a str,
    pub query: Option<&'a str>,
    pub fragment: Option<&'a str>,
}

impl<'a> UrlRef<'a> {
    pub fn parse(input: &'a str) -> Self {
        let mut rest = input;
        let mut url = UrlRef::default();

        if let Some((before, fragment)) = rest.split_once('#') {
            url.fragment = Some(fragment);
            rest = before;
        }
        if let Some((before, query)) = rest.split_once('?') {
            url.query = Some(query);
            rest = before;
        }

        if let Some(colon) = rest.find(':') {
            let candidate = &rest[..colon];
            let valid = candidate
                .chars()
                .next()
                .is_some_and(|c| c.is_ascii_alphabetic())
                && candidate
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
            if valid {
                url.scheme = Some(candidate);
                rest = &rest[colon + 1..];
            }
        }

        if let Some(after) = rest.strip_prefix("//") {
            let end = after.find('/').unwrap_or(after.len());
            url.netloc = Some(&after[..end]);
            rest = &after[end..];
        }

        url.path = rest;
        url
    }

    pub fn kind(&self) -> UrlKind {
        let is_path = self.scheme.is_none()
            && self.netloc.is_none_or(str::is_empty)
            && !self.path.is_empty();
        match (is_path, self.path.starts_with('/')) {
            (true, true) => UrlKind::Absolute,
            (true, false) => UrlKind::Relative,
            (false, _) => UrlKind::Other,
        }
    }

    /// The same reference with a different path.
    pub fn with_path<'b>(&self, path: &'b str) -> UrlRef<'b>
    where
        'a: 'b,
    {
        UrlRef {
            scheme: self.scheme,
            netloc: self.netloc,
            path,
            query: self.query,
            fragment: self.fragment,
        }
    }
}

impl fmt::Display for UrlRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(scheme) = self.scheme {
            write!(f, "{scheme}:")?;
        }
        if let Some(netloc) = self.netloc {
            write!(f, "//{netloc}")?;
        }
        f.write_str(self.path)?;
        if let Some(query) = self.query {
            write!(f, "?{query}")?;
        }
        if let Some(fragment) = self.fragment {
            write!(f, "#{fragment}")?;
        }
        Ok(())
    }
}

/// Classify a raw reference.
pub fn url_kind(input: &str) -> UrlKind {
    UrlRef::parse(input).kind()
}
