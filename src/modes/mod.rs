//! The three ways of running the pipeline.
//!
//! - [`convert`]: publish an EPUB as a tree of HTML pages
//! - [`linkfix`]: re-route and repair links of published files
//! - [`crossref`]: link citations in published files
//!
//! Each mode builds its route table and job list up front, freezes them in
//! a [`RunContext`](crate::pipeline::RunContext) and then runs every job.

pub mod convert;
pub mod crossref;
mod files;
pub mod linkfix;

use std::path::PathBuf;
use std::time::Duration;

pub use convert::{ConvertOptions, convert};
pub use crossref::{CrossRefOptions, crossref};
pub use files::FileSet;
pub use linkfix::{FixOptions, linkfix};

use crate::error::Result;
use crate::pipeline::WriteOptions;
use crate::route::{FallbackBase, LinkChecker};
use crate::ui::{Interaction, TerminalPrompt};

/// Settings every mode shares.
#[derive(Debug, Clone, Default)]
pub struct CommonOptions {
    /// Run every handler but write nothing.
    pub dry_run: bool,
    pub overwrite: bool,
    /// Where links outside the run are checked.
    pub fallback: Option<FallbackBase>,
    /// Timeout for HTTP checks against a URL fallback.
    pub timeout: Option<Duration>,
    /// Ask on the terminal; otherwise every prompt takes its default.
    pub interactive: bool,
}

impl CommonOptions {
    pub fn interaction(&self) -> Interaction {
        if self.interactive {
            Interaction::new(Box::new(TerminalPrompt))
        } else {
            Interaction::non_interactive()
        }
    }

    fn checker(&self, root: impl Into<PathBuf>) -> Result<LinkChecker> {
        LinkChecker::new(root, self.fallback.clone(), self.timeout)
    }

    fn write_options(&self, suffix: Option<&str>) -> WriteOptions {
        if self.dry_run {
            log::warn!("Dry run; no files will be written");
        }
        WriteOptions {
            dry_run: self.dry_run,
            overwrite: self.overwrite,
            suffix: suffix.map(str::to_string),
        }
    }
}
