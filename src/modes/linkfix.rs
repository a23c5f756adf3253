//! Re-route and repair the links of already published files.

use std::path::PathBuf;

use super::files::{FileSet, jobs};
use super::CommonOptions;
use crate::error::Result;
use crate::mimetype::{CATCH_ALL, DestRule, MimeTable};
use crate::pipeline::handlers::{
    GuardDryRun, GuardOverwrite, GuardUnchanged, ParseHtml, ReadInput, Serialize, WriteOut,
};
use crate::pipeline::{Chain, RunContext, Source, Stats, Summary, run_jobs};
use crate::route::Router;
use crate::transform::{FixLinks, RewriteCssUrls};
use crate::ui::Interaction;

/// Appended to output paths when the inputs are not overwritten.
pub const NEW_SUFFIX: &str = ".new";

#[derive(Debug, Clone)]
pub struct FixOptions {
    pub files: FileSet,
    /// Relative destinations are written below this directory.
    pub output_dir: PathBuf,
    pub common: CommonOptions,
}

/// Media types the link fixer handles; anything else is left alone.
pub fn linkfix_table() -> Result<MimeTable> {
    let table = MimeTable::new()
        .direct(
            "text/html",
            DestRule::Keep,
            Chain::new(
                "fix-html",
                vec![
                    Box::new(ReadInput),
                    Box::new(ParseHtml),
                    Box::new(FixLinks),
                    Box::new(GuardUnchanged),
                    Box::new(GuardDryRun),
                    Box::new(GuardOverwrite),
                    Box::new(Serialize),
                    Box::new(WriteOut),
                ],
            ),
        )?
        .alias("application/xhtml+xml", "text/html")?
        .direct(
            "text/css",
            DestRule::Keep,
            Chain::new(
                "fix-css",
                vec![
                    Box::new(ReadInput),
                    Box::new(RewriteCssUrls),
                    Box::new(GuardUnchanged),
                    Box::new(GuardDryRun),
                    Box::new(GuardOverwrite),
                    Box::new(WriteOut),
                ],
            ),
        )?
        .direct(CATCH_ALL, DestRule::Keep, Chain::empty("ignore"))?;
    table.validate()?;
    Ok(table)
}

/// Fix links among `options.files`, asking on the terminal when configured.
pub fn linkfix(options: &FixOptions) -> Result<Summary> {
    linkfix_with(options, options.common.interaction())
}

pub fn linkfix_with(options: &FixOptions, interaction: Interaction) -> Result<Summary> {
    let routes = options.files.routes()?;
    let jobs = jobs(&routes, &linkfix_table()?)?;
    let suffix = (!options.common.overwrite).then_some(NEW_SUFFIX);

    let ctx = RunContext::new(
        Router::new(routes, options.common.checker(&options.output_dir)?),
        &options.output_dir,
        Source::Filesystem,
    )
    .with_write_options(options.common.write_options(suffix))
    .with_interaction(interaction);

    let mut stats = Stats::new();
    run_jobs(&ctx, jobs, &mut stats)?;
    Ok(stats.summary())
}
