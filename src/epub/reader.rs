use std::cell::RefCell;
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;

use zip::ZipArchive;

use super::parser::{Package, parse_container_xml, parse_ncx, parse_opf, strip_bom};
use super::TocEntry;
use crate::error::{Error, Result};
use crate::route::path::{dirname, join};
use crate::util::decode_document;

/// Anything a zip archive can be read from.
pub trait ReadSeek: Read + Seek {}

impl<T: Read + Seek> ReadSeek for T {}

/// An opened EPUB: the zip archive plus the location of its package document.
///
/// Entries are read on demand. Manifest hrefs are relative to the package
/// document, so every read goes through the package directory.
pub struct EpubArchive {
    zip: RefCell<ZipArchive<Box<dyn ReadSeek>>>,
    opf_path: String,
}

impl std::fmt::Debug for EpubArchive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EpubArchive")
            .field("opf_path", &self.opf_path)
            .finish_non_exhaustive()
    }
}

impl EpubArchive {
    /// Open an EPUB file from disk.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file))
    }

    /// Open an EPUB from any [`Read`] + [`Seek`] source.
    ///
    /// Fails if `META-INF/container.xml` does not name a package document.
    pub fn from_reader<R: Read + Seek + 'static>(reader: R) -> Result<Self> {
        let boxed: Box<dyn ReadSeek> = Box::new(reader);
        let mut zip = ZipArchive::new(boxed)?;
        let container = read_entry(&mut zip, "META-INF/container.xml")?;
        let opf_path = parse_container_xml(&container)?;

        Ok(Self {
            zip: RefCell::new(zip),
            opf_path,
        })
    }

    /// Path of the package document inside the archive.
    pub fn opf_path(&self) -> &str {
        &self.opf_path
    }

    /// Directory manifest hrefs are relative to.
    pub fn root_dir(&self) -> &str {
        dirname(&self.opf_path)
    }

    /// Read and parse the package document.
    pub fn package(&self) -> Result<Package> {
        let bytes = self.read_archive_path(&self.opf_path)?;
        parse_opf(&decode_document(strip_bom(&bytes)))
    }

    /// Read and parse the NCX document at `href`.
    pub fn toc(&self, href: &str) -> Result<Vec<TocEntry>> {
        let bytes = self.read(href)?;
        parse_ncx(&decode_document(strip_bom(&bytes)))
    }

    /// Read a manifest item by its package-relative href.
    pub fn read(&self, href: &str) -> Result<Vec<u8>> {
        self.read_archive_path(&join(self.root_dir(), href))
    }

    fn read_archive_path(&self, path: &str) -> Result<Vec<u8>> {
        let mut zip = self.zip.borrow_mut();
        read_entry(&mut zip, path)
    }
}

fn read_entry<R: Read + Seek>(archive: &mut ZipArchive<R>, path: &str) -> Result<Vec<u8>> {
    // Try direct lookup first
    match archive.by_name(path) {
        Ok(mut file) => {
            let mut contents = Vec::new();
            file.read_to_end(&mut contents)?;
            return Ok(contents);
        }
        Err(zip::result::ZipError::FileNotFound) => {}
        Err(e) => return Err(e.into()),
    }

    // Fallback: hrefs are URL-encoded, zip entry names usually are not
    let decoded = percent_encoding::percent_decode_str(path)
        .decode_utf8()
        .map_err(|_| Error::InvalidEpub(format!("Invalid UTF-8 in path: {path}")))?;

    let mut file = archive.by_name(&decoded)?;
    let mut contents = Vec::new();
    file.read_to_end(&mut contents)?;
    Ok(contents)
}
