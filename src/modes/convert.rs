//! Publish an EPUB as a directory of linked HTML pages.

use std::collections::{HashMap, HashSet};
use std::io::{Read, Seek};
use std::path::PathBuf;
use std::rc::Rc;

use super::CommonOptions;
use crate::citation::CitationTable;
use crate::epub::{EpubArchive, ManifestItem, TocEntry};
use crate::error::Result;
use crate::mimetype::{CATCH_ALL, DestRule, MimeTable};
use crate::order::{OrderSpec, reorder};
use crate::pipeline::handlers::{
    CopyOut, GuardDryRun, GuardOverwrite, ParseHtml, ReadInput, Serialize, WriteOut,
};
use crate::pipeline::{Chain, FileContext, Job, RunContext, Source, Stats, Summary, run_jobs};
use crate::route::path::{decode_path, dirname, file_stem, join, normalize_path};
use crate::route::{RouteTable, Router};
use crate::transform::{BuildToc, PageTemplate, RenderTemplate, RewriteCssUrls, TransformDocument};
use crate::ui::Interaction;

/// Where the generated contents page goes.
pub const CONTENTS_PAGE: &str = "Contents.html";

/// Section title of the contents page.
pub const CONTENTS_TITLE: &str = "Contents";

#[derive(Debug, Clone)]
pub struct ConvertOptions {
    pub epub: PathBuf,
    pub output_dir: PathBuf,
    /// Page template; `None` looks for `default_template.html`, then uses
    /// the bundled one.
    pub template: Option<PathBuf>,
    /// Order of the spine, index 0 being the contents page.
    pub spine_order: OrderSpec,
    /// Order of the top level of the contents page; defaults to the spine
    /// order.
    pub toc_order: Option<OrderSpec>,
    pub common: CommonOptions,
}

impl ConvertOptions {
    pub fn new(epub: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            epub: epub.into(),
            output_dir: output_dir.into(),
            template: None,
            spine_order: OrderSpec::natural(),
            toc_order: None,
            common: CommonOptions {
                overwrite: true,
                ..CommonOptions::default()
            },
        }
    }
}

fn html_destination(src: &str) -> String {
    format!("./{}.html", file_stem(src))
}

fn contents_destination(_src: &str) -> String {
    CONTENTS_PAGE.to_string()
}

/// Placement and handling of every manifest media type.
pub fn epub_table() -> Result<MimeTable> {
    let copy = Chain::new(
        "copy",
        vec![Box::new(GuardDryRun), Box::new(GuardOverwrite), Box::new(CopyOut)],
    );
    let table = MimeTable::new()
        .direct(
            "text/html",
            DestRule::Compute(html_destination),
            Chain::new(
                "document",
                vec![
                    Box::new(ReadInput),
                    Box::new(ParseHtml),
                    Box::new(TransformDocument),
                    Box::new(RenderTemplate),
                    Box::new(GuardDryRun),
                    Box::new(GuardOverwrite),
                    Box::new(Serialize),
                    Box::new(WriteOut),
                ],
            ),
        )?
        .alias("application/xhtml+xml", "text/html")?
        .direct(
            "application/x-dtbncx+xml",
            DestRule::Compute(contents_destination),
            Chain::new(
                "contents",
                vec![
                    Box::new(BuildToc),
                    Box::new(RenderTemplate),
                    Box::new(GuardDryRun),
                    Box::new(GuardOverwrite),
                    Box::new(Serialize),
                    Box::new(WriteOut),
                ],
            ),
        )?
        .direct(
            "text/css",
            DestRule::Prefix("./css/".to_string()),
            Chain::new(
                "stylesheet",
                vec![
                    Box::new(ReadInput),
                    Box::new(RewriteCssUrls),
                    Box::new(GuardDryRun),
                    Box::new(GuardOverwrite),
                    Box::new(WriteOut),
                ],
            ),
        )?
        .direct("image/*", DestRule::Prefix("./img/".to_string()), Rc::clone(&copy))?
        .direct(CATCH_ALL, DestRule::Prefix("./etc/".to_string()), copy)?;
    table.validate()?;
    Ok(table)
}

/// Convert the EPUB at `options.epub`.
pub fn convert(options: &ConvertOptions) -> Result<Summary> {
    let epub = EpubArchive::open(&options.epub)?;
    convert_archive(epub, options, options.common.interaction())
}

/// Convert an EPUB read from memory or any other seekable source.
pub fn convert_reader<R: Read + Seek + 'static>(
    reader: R,
    options: &ConvertOptions,
    interaction: Interaction,
) -> Result<Summary> {
    convert_archive(EpubArchive::from_reader(reader)?, options, interaction)
}

fn convert_archive(
    epub: EpubArchive,
    options: &ConvertOptions,
    interaction: Interaction,
) -> Result<Summary> {
    let package = epub.package()?;
    let toc_item = package.toc_item()?;
    let toc_src = route_key(&toc_item.href);
    let toc = epub.toc(&toc_item.href)?;
    let template = PageTemplate::load(options.template.as_deref())?;
    let table = epub_table()?;

    log::info!(
        "Converting \"{}\" from {}",
        package.metadata.title,
        options.epub.display()
    );

    // The contents page comes first, then the spine, then everything else.
    let mut ordered: Vec<&ManifestItem> = vec![toc_item];
    for idref in &package.spine {
        match package.item(idref) {
            Some(item) => ordered.push(item),
            None => log::warn!(
                "Couldn't find item in manifest for reference {idref} in spine section."
            ),
        }
    }
    let spine_len = ordered.len();
    ordered.extend(&package.manifest);

    let mut routes = RouteTable::new();
    let mut jobs = Vec::new();
    let mut spine = Vec::new();
    let mut planned = HashSet::new();
    for (i, item) in ordered.into_iter().enumerate() {
        if !planned.insert(item.id.as_str()) {
            continue;
        }
        let job = plan(&table, item, &mut routes)?;
        if i < spine_len {
            spine.push(job.file.src.clone());
        }
        jobs.push(job);
    }

    let spine = reorder(spine, options.spine_order.indices())?;
    let toc_order = options
        .toc_order
        .clone()
        .unwrap_or_else(|| options.spine_order.clone());
    let titles = section_titles(&toc_src, &toc);

    let ctx = RunContext::new(
        Router::new(routes, options.common.checker(&options.output_dir)?),
        &options.output_dir,
        Source::Archive(epub),
    )
    .with_write_options(options.common.write_options(None))
    .with_spine(spine, toc_src)
    .with_titles(titles)
    .with_metadata(package.metadata.clone())
    .with_template(template)
    .with_toc(toc, toc_order)
    .with_citations(CitationTable::standard()?)
    .with_interaction(interaction);

    let mut stats = Stats::new();
    run_jobs(&ctx, jobs, &mut stats)?;
    Ok(stats.summary())
}

fn route_key(href: &str) -> String {
    normalize_path(&decode_path(href))
}

/// Route one manifest item and build its job.
fn plan(table: &MimeTable, item: &ManifestItem, routes: &mut RouteTable) -> Result<Job> {
    let (rule, chain) = table.classify(&item.media_type)?;
    let src = route_key(&item.href);
    let dst = rule.destination(&src);
    if let Some(previous) = routes.register(&src, &dst) {
        log::warn!("{src} is listed twice in the manifest (was routed to {previous})");
    }
    log::trace!("Route {src} -> {dst} ({})", chain.name());

    Ok(Job {
        file: FileContext {
            src,
            dst,
            media_type: item.media_type.clone(),
            ..FileContext::default()
        },
        chain: Rc::clone(chain),
    })
}

/// Section title of every document the navigation points at.
///
/// Navigation hrefs are relative to the navigation document; the first
/// entry pointing at a document names it.
fn section_titles(toc_src: &str, toc: &[TocEntry]) -> HashMap<String, String> {
    let mut titles = HashMap::from([(toc_src.to_string(), CONTENTS_TITLE.to_string())]);
    for entry in toc.iter().flat_map(TocEntry::walk) {
        let path = entry.href.split('#').next().unwrap_or_default();
        if path.is_empty() {
            continue;
        }
        let key = normalize_path(&join(dirname(toc_src), &decode_path(path)));
        titles.entry(key).or_insert_with(|| entry.title.clone());
    }
    titles
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_destinations() {
        let table = epub_table().unwrap();
        let dest = |media: &str, src: &str| table.classify(media).unwrap().0.destination(src);

        assert_eq!(dest("application/xhtml+xml", "Text/ch1.xhtml"), "ch1.html");
        assert_eq!(dest("text/html", "a/b/index.htm"), "index.html");
        assert_eq!(dest("application/x-dtbncx+xml", "toc.ncx"), "Contents.html");
        assert_eq!(dest("text/css", "Styles/main.css"), "css/main.css");
        assert_eq!(dest("image/jpeg", "Images/cover.jpg"), "img/cover.jpg");
        assert_eq!(dest("font/woff2", "Fonts/a.woff2"), "etc/a.woff2");
    }

    #[test]
    fn test_xhtml_shares_the_html_chain() {
        let table = epub_table().unwrap();
        let (_, html) = table.classify("text/html").unwrap();
        let (_, xhtml) = table.classify("application/xhtml+xml").unwrap();
        assert!(Rc::ptr_eq(html, xhtml));
        assert_eq!(
            html.handler_names(),
            vec![
                "read-input",
                "parse-html",
                "transform-document",
                "render-template",
                "guard-dry-run",
                "guard-overwrite",
                "serialize",
                "write-out"
            ]
        );
    }

    #[test]
    fn test_section_titles() {
        let mut part = TocEntry::new("Part", "Text/part.xhtml");
        part.children.push(TocEntry::new("Chapter", "Text/ch%201.xhtml#x"));
        part.children.push(TocEntry::new("Later", "Text/part.xhtml#later"));
        let titles = section_titles("nav/toc.ncx", &[part]);

        assert_eq!(titles["nav/toc.ncx"], "Contents");
        assert_eq!(titles["nav/Text/part.xhtml"], "Part");
        assert_eq!(titles["nav/Text/ch 1.xhtml"], "Chapter");
    }
}
