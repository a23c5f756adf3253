//! Routing for runs over files that are already published.

use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::error::{Error, Result};
use crate::mimetype::MimeTable;
use crate::pipeline::{FileContext, Job};
use crate::route::RouteTable;
use crate::route::path::{basename, dirname, join};
use crate::util::guess_media_type;

/// Published files to work on, and where their links think they live.
#[derive(Debug, Clone, Default)]
pub struct FileSet {
    pub files: Vec<PathBuf>,
    /// Pretend every file sits in this subdirectory of the files' common
    /// root directory.
    pub basedir: String,
    /// Extra `(source, destination)` routes, applied last.
    pub routes: Vec<(String, String)>,
}

impl FileSet {
    /// Route every file from where its links expect it to its real path.
    ///
    /// Every route is also a file to process: it is read from, and written
    /// back to, its destination.
    pub fn routes(&self) -> Result<RouteTable> {
        if self.files.is_empty() {
            return Err(Error::Config("No input files given".to_string()));
        }

        let paths = self
            .files
            .iter()
            .map(|path| real_path(path))
            .collect::<Result<Vec<_>>>()?;
        let root = common_dir(&paths);
        let base = join(&root, &self.basedir);
        log::debug!("Common root directory: {root}");

        let mut table = RouteTable::new();
        for path in &paths {
            table.register(&join(&base, basename(path)), path);
        }
        for (src, dst) in &self.routes {
            if let Some(previous) = table.register(src, dst) {
                log::info!("Custom route for {src} replaces {previous}");
            }
        }
        Ok(table)
    }
}

/// One job per route, dispatched on the guessed media type.
pub(crate) fn jobs(routes: &RouteTable, table: &MimeTable) -> Result<Vec<Job>> {
    routes
        .iter()
        .map(|(src, dst)| {
            let media_type = guess_media_type(dst);
            let (_, chain) = table.classify(media_type)?;
            Ok(Job {
                file: FileContext {
                    src: src.to_string(),
                    dst: dst.to_string(),
                    media_type: media_type.to_string(),
                    input_path: Some(PathBuf::from(dst)),
                    ..FileContext::default()
                },
                chain: Rc::clone(chain),
            })
        })
        .collect()
}

/// Absolute, symlink-free path with `/` separators.
fn real_path(path: &Path) -> Result<String> {
    let real = fs::canonicalize(path).map_err(|e| {
        Error::Config(format!("Cannot read {}: {e}", path.display()))
    })?;
    Ok(real.to_string_lossy().replace('\\', "/"))
}

/// Deepest directory containing every path.
fn common_dir(paths: &[String]) -> String {
    let mut common: Option<Vec<&str>> = None;
    for path in paths {
        let parts: Vec<&str> = dirname(path).split('/').collect();
        common = Some(match common {
            None => parts,
            Some(prev) => prev
                .iter()
                .zip(&parts)
                .take_while(|(a, b)| a == b)
                .map(|(a, _)| *a)
                .collect(),
        });
    }
    let joined = common.unwrap_or_default().join("/");
    if joined.is_empty() {
        "/".to_string()
    } else {
        joined
    }
}
