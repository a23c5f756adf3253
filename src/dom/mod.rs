//! In-memory HTML documents.
//!
//! Content documents, the page template and previously published pages are
//! all parsed with html5ever into an [`ArenaDom`], edited in place by the
//! pipeline handlers, and written back with [`serialize_document`].

mod arena;
mod serialize;
mod tree_sink;

pub use arena::{ArenaDom, ArenaNode, ArenaNodeData, ArenaNodeId, Attribute, html_name};
pub use serialize::{serialize_document, serialize_node};
pub use tree_sink::ArenaSink;

use html5ever::driver::ParseOpts;
use html5ever::parse_document;
use html5ever::tendril::TendrilSink;

use crate::util::decode_document;

/// Parse an HTML string into an arena DOM.
///
/// Parsing never fails: html5ever recovers from malformed markup the way a
/// browser would.
pub fn parse_html(html: &str) -> ArenaDom {
    parse_document(ArenaSink::new(), ParseOpts::default())
        .from_utf8()
        .one(html.as_bytes())
        .into_dom()
}

/// Decode raw document bytes and parse them.
pub fn parse_html_bytes(bytes: &[u8]) -> ArenaDom {
    parse_html(&decode_document(bytes))
}
