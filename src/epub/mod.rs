//! Reading EPUB archives: container, package document and NCX.

mod parser;
mod reader;

pub use parser::{ManifestItem, Package, PackageMetadata, parse_container_xml, parse_ncx, parse_opf};
pub use reader::{EpubArchive, ReadSeek};

/// An entry of the table of contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TocEntry {
    pub title: String,
    /// Target as written in the navigation document, fragment included.
    pub href: String,
    pub children: Vec<TocEntry>,
}

impl TocEntry {
    pub fn new(title: impl Into<String>, href: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            href: href.into(),
            children: Vec::new(),
        }
    }

    /// This entry and all its descendants, depth first.
    pub fn walk(&self) -> Vec<&TocEntry> {
        let mut out = vec![self];
        for child in &self.children {
            out.extend(child.walk());
        }
        out
    }
}
