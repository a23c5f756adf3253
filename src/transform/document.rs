//! Preparing a content document for its page.

use super::crossref::cross_reference;
use super::links::route_links;
use crate::dom::ArenaDom;
use crate::error::Result;
use crate::pipeline::handlers::unexpected;
use crate::pipeline::{FileContext, Handler, Outcome, Payload, RunContext};

/// Prepare a content document for its page: drop its title, route its
/// links and link its citations.
pub struct TransformDocument;

impl Handler for TransformDocument {
    fn name(&self) -> &'static str {
        "transform-document"
    }

    fn handle(&self, ctx: &RunContext, file: &mut FileContext, input: Payload) -> Result<Outcome> {
        let mut dom = match input {
            Payload::Document(dom) => dom,
            other => return Err(unexpected(self.name(), &other)),
        };
        let citations = ctx.citations(self.name())?;

        // The page title is rebuilt from the book metadata.
        strip_titles(&mut dom);

        let root = dom.document();
        let mut changed = route_links(ctx, file, &mut dom, root)?;
        if let Some(body) = dom.find_by_tag("body") {
            changed |= cross_reference(ctx, citations, &mut dom, body)?;
        }
        if changed {
            file.mark_changed();
        }
        Ok(Outcome::Continue(Payload::Document(dom)))
    }
}

fn strip_titles(dom: &mut ArenaDom) {
    let titles: Vec<_> = dom
        .descendants(dom.document())
        .into_iter()
        .filter(|&id| dom.is_tag(id, "title"))
        .collect();
    for title in titles {
        dom.detach(title);
    }
}
