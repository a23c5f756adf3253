//! Linking citations found in running text.

use crate::citation::{Citation, CitationTable, Target};
use crate::dom::{ArenaDom, ArenaNodeId};
use crate::error::Result;
use crate::pipeline::handlers::unexpected;
use crate::pipeline::{FileContext, Handler, Outcome, Payload, RunContext};
use crate::route::{LinkStatus, UrlKind, UrlRef, url_kind};
use crate::ui::{Choice, Menu};

/// Elements whose text is never scanned, nor that of their descendants.
const IGNORED_ELEMENTS: &[&str] = &[
    "a", "h1", "h2", "h3", "h4", "h5", "h6", "script", "style",
];

const CITATION_NOT_FOUND: Menu = Menu {
    name: "citation",
    question: "Citation target not found, what should I do?",
    choices: &[
        Choice {
            key: "cont",
            description: "continue without inserting a link",
        },
        Choice {
            key: "ins",
            description: "insert the broken link anyway",
        },
        Choice {
            key: "manual",
            description: "insert a different link manually",
        },
    ],
};

/// Link every citation in the text below `root`. Returns whether anything
/// was linked.
pub fn cross_reference(
    ctx: &RunContext,
    table: &CitationTable,
    dom: &mut ArenaDom,
    root: ArenaNodeId,
) -> Result<bool> {
    let mut changed = false;
    let children: Vec<_> = dom.children(root).collect();
    for child in children {
        if dom.is_text(child) {
            changed |= link_text(ctx, table, dom, child)?;
        } else if dom.is_element(child)
            && !dom
                .element_name(child)
                .is_some_and(|tag| IGNORED_ELEMENTS.contains(&tag.as_ref()))
        {
            changed |= cross_reference(ctx, table, dom, child)?;
        }
    }
    Ok(changed)
}

/// Split one text node around its citations.
///
/// Linked citations become `<a class="sutta-ref">` siblings placed before
/// the node; the node keeps whatever text follows the last link.
fn link_text(
    ctx: &RunContext,
    table: &CitationTable,
    dom: &mut ArenaDom,
    node: ArenaNodeId,
) -> Result<bool> {
    let Some(text) = dom.text_content(node).map(str::to_string) else {
        return Ok(false);
    };
    let matches = table.find(&text);
    if matches.is_empty() {
        return Ok(false);
    }

    let mut changed = false;
    let mut pending = String::new();
    let mut cursor = 0;

    for found in matches {
        pending.push_str(&text[cursor..found.start]);
        cursor = found.end;

        let Some(url) = resolve(ctx, table, &found.citation)? else {
            pending.push_str(&found.citation.full_match);
            continue;
        };

        if !pending.is_empty() {
            let before = dom.create_text(std::mem::take(&mut pending));
            dom.insert_before(node, before);
        }
        let link = dom.create_html_element("a", &[("href", url.as_str()), ("class", "sutta-ref")]);
        dom.append_text(link, &found.citation.full_match);
        dom.insert_before(node, link);
        changed = true;
    }

    if changed {
        pending.push_str(&text[cursor..]);
        if pending.is_empty() {
            dom.detach(node);
        } else {
            dom.set_text(node, pending);
        }
    }
    Ok(changed)
}

/// Decide the link for one citation, asking the user when needed.
fn resolve(ctx: &RunContext, table: &CitationTable, citation: &Citation) -> Result<Option<String>> {
    let mut url = match table.target(citation)? {
        Target::Skip => return Ok(None),
        Target::Url(url) => url,
        Target::Manual => match ask_for_link(ctx, citation)? {
            Some(url) => url,
            None => return Ok(None),
        },
    };

    let checker = ctx.router().checker();
    loop {
        if url_kind(&url) == UrlKind::Other {
            return Ok(Some(url));
        }
        let checked = match checker.check_fallback(UrlRef::parse(&url).path) {
            LinkStatus::Missing { checked } => checked,
            LinkStatus::Exists | LinkStatus::Unverifiable => return Ok(Some(url)),
        };
        log::warn!("Citation link not found: {checked} (for \"{}\")", citation.full_match);

        let choice = ctx.interaction().choose(&CITATION_NOT_FOUND)?;
        match choice.key {
            "ins" => return Ok(Some(url)),
            "manual" => match ask_for_link(ctx, citation)? {
                Some(manual) => url = manual,
                None => return Ok(None),
            },
            _ => return Ok(None),
        }
    }
}

fn ask_for_link(ctx: &RunContext, citation: &Citation) -> Result<Option<String>> {
    let link = ctx.interaction().input(&format!(
        "Enter cross reference link to \"{}\"",
        citation.full_match
    ))?;
    Ok((!link.is_empty()).then_some(link))
}

/// Link citations in the body of a published page.
pub struct CrossReference;

impl Handler for CrossReference {
    fn name(&self) -> &'static str {
        "cross-reference"
    }

    fn handle(&self, ctx: &RunContext, file: &mut FileContext, input: Payload) -> Result<Outcome> {
        let mut dom = match input {
            Payload::Document(dom) => dom,
            other => return Err(unexpected(self.name(), &other)),
        };
        let table = ctx.citations(self.name())?;
        let Some(body) = dom.find_by_tag("body") else {
            return Ok(Outcome::skip(Payload::Document(dom), "no body"));
        };
        if cross_reference(ctx, table, &mut dom, body)? {
            file.mark_changed();
        }
        Ok(Outcome::Continue(Payload::Document(dom)))
    }
}
