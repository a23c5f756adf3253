//! State shared by every handler of a run, and state of the current file.

use std::cell::{RefCell, RefMut};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::citation::CitationTable;
use crate::epub::{EpubArchive, PackageMetadata, TocEntry};
use crate::error::{Error, Result};
use crate::order::OrderSpec;
use crate::route::Router;
use crate::route::path::{decode_path, normalize_path};
use crate::transform::PageTemplate;
use crate::ui::Interaction;

/// Where input files are read from.
#[derive(Debug)]
pub enum Source {
    /// Manifest items of an EPUB, read by source path.
    Archive(EpubArchive),
    /// Files on disk, read from each job's input path.
    Filesystem,
}

impl Source {
    pub fn read(&self, file: &FileContext) -> Result<Vec<u8>> {
        match (self, &file.input_path) {
            (Source::Archive(epub), _) => epub.read(&file.src),
            (Source::Filesystem, Some(path)) => Ok(std::fs::read(path)?),
            (Source::Filesystem, None) => Ok(std::fs::read(&file.src)?),
        }
    }
}

/// How output files are written.
#[derive(Debug, Clone, Default)]
pub struct WriteOptions {
    pub dry_run: bool,
    pub overwrite: bool,
    /// Appended to every output path, e.g. `.new` to write next to the input.
    pub suffix: Option<String>,
}

/// Everything a handler may read, fixed before the first file runs.
///
/// Fields only some runs provide are optional; handlers ask for them
/// through accessors that name the handler in the error.
#[derive(Debug)]
pub struct RunContext {
    router: Router,
    output_dir: PathBuf,
    source: Source,
    write: WriteOptions,
    spine: Option<Vec<String>>,
    toc_src: Option<String>,
    titles: Option<HashMap<String, String>>,
    metadata: Option<PackageMetadata>,
    template: Option<PageTemplate>,
    toc: Option<Vec<TocEntry>>,
    toc_order: Option<OrderSpec>,
    citations: Option<CitationTable>,
    interaction: RefCell<Interaction>,
}

impl RunContext {
    pub fn new(router: Router, output_dir: impl Into<PathBuf>, source: Source) -> Self {
        Self {
            router,
            output_dir: output_dir.into(),
            source,
            write: WriteOptions::default(),
            spine: None,
            toc_src: None,
            titles: None,
            metadata: None,
            template: None,
            toc: None,
            toc_order: None,
            citations: None,
            interaction: RefCell::new(Interaction::non_interactive()),
        }
    }

    pub fn with_write_options(mut self, write: WriteOptions) -> Self {
        self.write = write;
        self
    }

    pub fn with_spine(mut self, spine: Vec<String>, toc_src: String) -> Self {
        self.spine = Some(spine);
        self.toc_src = Some(toc_src);
        self
    }

    pub fn with_titles(mut self, titles: HashMap<String, String>) -> Self {
        self.titles = Some(titles);
        self
    }

    pub fn with_metadata(mut self, metadata: PackageMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn with_template(mut self, template: PageTemplate) -> Self {
        self.template = Some(template);
        self
    }

    pub fn with_toc(mut self, toc: Vec<TocEntry>, order: OrderSpec) -> Self {
        self.toc = Some(toc);
        self.toc_order = Some(order);
        self
    }

    pub fn with_citations(mut self, citations: CitationTable) -> Self {
        self.citations = Some(citations);
        self
    }

    pub fn with_interaction(mut self, interaction: Interaction) -> Self {
        self.interaction = RefCell::new(interaction);
        self
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn source(&self) -> &Source {
        &self.source
    }

    pub fn write_options(&self) -> &WriteOptions {
        &self.write
    }

    /// Where the current file ends up on disk.
    pub fn output_path(&self, file: &FileContext) -> PathBuf {
        let mut path = self.output_dir.join(&file.dst).into_os_string();
        if let Some(suffix) = &self.write.suffix {
            path.push(suffix);
        }
        PathBuf::from(path)
    }

    /// The prompt, for handlers that need to ask the user.
    pub fn interaction(&self) -> RefMut<'_, Interaction> {
        self.interaction.borrow_mut()
    }

    pub fn spine(&self, handler: &'static str) -> Result<&[String]> {
        require(&self.spine, handler, "spine").map(Vec::as_slice)
    }

    pub fn toc_src(&self, handler: &'static str) -> Result<&str> {
        require(&self.toc_src, handler, "toc_src").map(String::as_str)
    }

    /// Section title of `src`, when the run knows titles.
    pub fn title_for(&self, src: &str) -> Option<&str> {
        let key = normalize_path(&decode_path(src));
        self.titles.as_ref()?.get(&key).map(String::as_str)
    }

    pub fn metadata(&self, handler: &'static str) -> Result<&PackageMetadata> {
        require(&self.metadata, handler, "metadata")
    }

    pub fn template(&self, handler: &'static str) -> Result<&PageTemplate> {
        require(&self.template, handler, "template")
    }

    pub fn toc(&self, handler: &'static str) -> Result<(&[TocEntry], &OrderSpec)> {
        let toc = require(&self.toc, handler, "toc")?;
        let order = require(&self.toc_order, handler, "toc_order")?;
        Ok((toc, order))
    }

    pub fn citations(&self, handler: &'static str) -> Result<&CitationTable> {
        require(&self.citations, handler, "citations")
    }
}

fn require<'a, T>(
    value: &'a Option<T>,
    handler: &'static str,
    field: &'static str,
) -> Result<&'a T> {
    value
        .as_ref()
        .ok_or(Error::MissingContext { handler, field })
}

/// Per-file state, created fresh for every file.
#[derive(Debug, Clone, Default)]
pub struct FileContext {
    /// Route key of the file.
    pub src: String,
    /// Routed destination, relative to the output directory.
    pub dst: String,
    pub media_type: String,
    /// Where to read the file from when it does not come from an archive.
    pub input_path: Option<PathBuf>,
    pub section_title: String,
    /// Set by handlers that modified the document.
    pub changed: bool,
    /// Set by handlers that wrote to disk.
    pub written: bool,
}

impl FileContext {
    pub fn mark_changed(&mut self) {
        self.changed = true;
    }
}
