//! Handlers that rewrite documents and stylesheets.
//!
//! - [`TransformDocument`]: strip the title, route links, link citations
//! - [`RenderTemplate`]: merge a document into the page template
//! - [`BuildToc`]: generate the contents page
//! - [`RewriteCssUrls`]: route `url(...)` and `@import` references
//! - [`FixLinks`], [`CrossReference`]: the same passes on published pages

mod crossref;
mod css;
mod document;
mod links;
mod template;
mod toc;

pub use crossref::{CrossReference, cross_reference};
pub use css::{RewriteCssUrls, extract_css_urls, rewrite_css_urls};
pub use document::TransformDocument;
pub use links::{FixLinks, route_links};
pub use template::{CONTENT_ID, PageTemplate, RenderTemplate};
pub use toc::{BuildToc, TOC_TITLE};
