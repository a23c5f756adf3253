//! Link citations in already published files.

use std::path::PathBuf;

use super::CommonOptions;
use super::files::{FileSet, jobs};
use super::linkfix::NEW_SUFFIX;
use crate::citation::CitationTable;
use crate::error::Result;
use crate::mimetype::{CATCH_ALL, DestRule, MimeTable};
use crate::pipeline::handlers::{
    GuardDryRun, GuardOverwrite, GuardUnchanged, ParseHtml, ReadInput, Serialize, WriteOut,
};
use crate::pipeline::{Chain, RunContext, Source, Stats, Summary, run_jobs};
use crate::route::Router;
use crate::transform::CrossReference;
use crate::ui::Interaction;

#[derive(Debug, Clone)]
pub struct CrossRefOptions {
    pub files: FileSet,
    pub output_dir: PathBuf,
    pub common: CommonOptions,
}

/// Only HTML pages are scanned.
pub fn crossref_table() -> Result<MimeTable> {
    let table = MimeTable::new()
        .direct(
            "text/html",
            DestRule::Keep,
            Chain::new(
                "cross-reference",
                vec![
                    Box::new(ReadInput),
                    Box::new(ParseHtml),
                    Box::new(CrossReference),
                    Box::new(GuardUnchanged),
                    Box::new(GuardDryRun),
                    Box::new(GuardOverwrite),
                    Box::new(Serialize),
                    Box::new(WriteOut),
                ],
            ),
        )?
        .alias("application/xhtml+xml", "text/html")?
        .direct(CATCH_ALL, DestRule::Keep, Chain::empty("ignore"))?;
    table.validate()?;
    Ok(table)
}

pub fn crossref(options: &CrossRefOptions) -> Result<Summary> {
    crossref_with(options, CitationTable::standard()?, options.common.interaction())
}

/// Cross-reference with a custom citation table.
pub fn crossref_with(
    options: &CrossRefOptions,
    citations: CitationTable,
    interaction: Interaction,
) -> Result<Summary> {
    let routes = options.files.routes()?;
    let jobs = jobs(&routes, &crossref_table()?)?;
    let suffix = (!options.common.overwrite).then_some(NEW_SUFFIX);

    let ctx = RunContext::new(
        Router::new(routes, options.common.checker(&options.output_dir)?),
        &options.output_dir,
        Source::Filesystem,
    )
    .with_write_options(options.common.write_options(suffix))
    .with_citations(citations)
    .with_interaction(interaction);

    let mut stats = Stats::new();
    run_jobs(&ctx, jobs, &mut stats)?;
    Ok(stats.summary())
}
