//! Slash-separated path arithmetic.
//!
//! Route keys and link targets are archive paths, not OS paths, so these
//! helpers work on `/`-separated strings regardless of platform. A
//! backslash is treated as a separator.

use std::borrow::Cow;

use percent_encoding::{AsciiSet, CONTROLS, percent_decode_str, utf8_percent_encode};

/// Characters escaped when a routed path is written back into a URL.
const PATH_ESCAPES: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`');

/// Collapse `.`, `..` and duplicate separators.
///
/// Leading `..` components of a relative path are kept; on an absolute path
/// they are dropped. An empty result is `.`.
pub fn normalize_path(path: &str) -> String {
    let path = path.replace('\\', "/");
    let absolute = path.starts_with('/');

    let mut parts: Vec<&str> = Vec::new();
    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => match parts.last() {
                Some(&last) if last != ".." => {
                    parts.pop();
                }
                _ if absolute => {}
                _ => parts.push(".."),
            },
            other => parts.push(other),
        }
    }

    let joined = parts.join("/");
    match (absolute, joined.is_empty()) {
        (true, _) => format!("/{joined}"),
        (false, true) => ".".to_string(),
        (false, false) => joined,
    }
}

/// Everything before the last separator; `""` for a bare file name.
pub fn dirname(path: &str) -> &str {
    match path.rfind(['/', '\\']) {
        Some(0) => "/",
        Some(i) => path[..i].trim_end_matches('/'),
        None => "",
    }
}

/// Everything after the last separator.
pub fn basename(path: &str) -> &str {
    match path.rfind(['/', '\\']) {
        Some(i) => &path[i + 1..],
        None => path,
    }
}

/// File name without its last extension.
pub fn file_stem(path: &str) -> &str {
    let name = basename(path);
    match name.rfind('.') {
        Some(0) | None => name,
        Some(i) => &name[..i],
    }
}

/// Join two paths; an absolute `tail` replaces `base`.
pub fn join(base: &str, tail: &str) -> String {
    if tail.starts_with('/') || base.is_empty() {
        tail.to_string()
    } else if base.ends_with('/') {
        format!("{base}{tail}")
    } else {
        format!("{base}/{tail}")
    }
}

/// Relative path from directory `start` to `path`.
///
/// Both are normalized first. When exactly one of them is absolute there is
/// no relative answer and the normalized `path` is returned.
pub fn relpath(path: &str, start: &str) -> String {
    let path = normalize_path(path);
    let start = normalize_path(if start.is_empty() { "." } else { start });

    if path.starts_with('/') != start.starts_with('/') {
        return path;
    }

    let components = |p: &str| -> Vec<String> {
        p.split('/')
            .filter(|c| !c.is_empty() && *c != ".")
            .map(str::to_string)
            .collect()
    };
    let path_parts = components(&path);
    let start_parts = components(&start);

    let common = path_parts
        .iter()
        .zip(&start_parts)
        .take_while(|(a, b)| a == b)
        .count();

    let mut rel: Vec<&str> = vec![".."; start_parts.len() - common];
    rel.extend(path_parts[common..].iter().map(String::as_str));

    if rel.is_empty() {
        ".".to_string()
    } else {
        rel.join("/")
    }
}

/// Decode `%XX` escapes in a link path. Invalid UTF-8 is replaced.
pub fn decode_path(path: &str) -> Cow<'_, str> {
    percent_decode_str(path).decode_utf8_lossy()
}

/// Escape a path for use in an `href`.
pub fn encode_path(path: &str) -> Cow<'_, str> {
    utf8_percent_encode(path, PATH_ESCAPES).into()
}
