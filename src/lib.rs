//! # webbook
//!
//! Publish EPUB books as linked, navigable static HTML, and keep the links
//! of published pages healthy.
//!
//! ## Modes
//!
//! - [`convert`]: every manifest item of an EPUB is routed to its place in
//!   an output tree (pages at the top, `css/`, `img/`, `etc/`), its links
//!   are rewritten for the new layout, citations are linked and each page
//!   is merged into a template with previous/next navigation. The NCX
//!   becomes `Contents.html`.
//! - [`linkfix`]: re-route relative links among published files and let
//!   the user repair broken absolute links.
//! - [`crossref`]: link scripture citations found in published pages.
//!
//! ## Quick Start
//!
//! ```no_run
//! use webbook::{ConvertOptions, convert};
//!
//! let summary = convert(&ConvertOptions::new("book.epub", "_result")).unwrap();
//! println!("{summary}");
//! ```
//!
//! ## Pipeline
//!
//! Every file runs through a [`Chain`](pipeline::Chain) of
//! [`Handler`](pipeline::Handler)s picked by its media type from a
//! [`MimeTable`]. Guards stop a chain without failing the run; an `Err`
//! stops the whole run.

pub mod citation;
pub mod dom;
pub mod epub;
pub mod error;
pub mod mimetype;
pub mod modes;
pub mod order;
pub mod pipeline;
pub mod route;
pub mod transform;
pub mod ui;
pub(crate) mod util;

pub use citation::{Citation, CitationTable, UrlRule};
pub use error::{Error, Result};
pub use mimetype::{DestRule, MimeTable};
pub use modes::{
    CommonOptions, ConvertOptions, CrossRefOptions, FileSet, FixOptions, convert, crossref,
    linkfix,
};
pub use order::{OrderSpec, reorder};
pub use pipeline::Summary;
pub use route::{FallbackBase, RouteTable, Router};
