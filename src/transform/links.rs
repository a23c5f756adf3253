//! Rewriting `href`/`src` attributes and repairing broken absolute links.

use crate::dom::{ArenaDom, ArenaNodeId};
use crate::error::Result;
use crate::pipeline::handlers::unexpected;
use crate::pipeline::{FileContext, Handler, Outcome, Payload, RunContext};
use crate::route::{LinkStatus, UrlKind, UrlRef, url_kind};
use crate::ui::{Choice, Menu};

const BROKEN_LINK: Menu = Menu {
    name: "broken-link",
    question: "What should I do?",
    choices: &[
        Choice {
            key: "keep",
            description: "keep the (broken) link",
        },
        Choice {
            key: "rm",
            description: "remove the link, keeping its text",
        },
        Choice {
            key: "subst",
            description: "substitute a different link",
        },
    ],
};

/// The attribute holding an element's link: `href` wins over `src`.
fn link_attr(dom: &ArenaDom, id: ArenaNodeId) -> Option<(&'static str, String)> {
    ["href", "src"]
        .into_iter()
        .find_map(|attr| dom.get_attr(id, attr).map(|v| (attr, v.to_string())))
}

/// Rewrite every link below `root`.
///
/// Relative links go through the router; absolute links are checked
/// against the fallback and, when broken, repaired interactively. Returns
/// whether the document changed.
pub fn route_links(
    ctx: &RunContext,
    file: &FileContext,
    dom: &mut ArenaDom,
    root: ArenaNodeId,
) -> Result<bool> {
    let mut changed = false;
    let elements: Vec<_> = dom
        .descendants(root)
        .into_iter()
        .filter(|&id| dom.is_element(id))
        .collect();

    for id in elements {
        let Some((attr, value)) = link_attr(dom, id) else {
            continue;
        };
        match url_kind(&value) {
            UrlKind::Relative => {
                if let Some(routed) = ctx.router().routed_url(&file.src, &value)? {
                    dom.set_attr(id, attr, routed);
                    changed = true;
                }
            }
            UrlKind::Absolute => {
                changed |= fix_absolute(ctx, file, dom, id, attr, &value)?;
            }
            UrlKind::Other => {}
        }
    }
    Ok(changed)
}

/// Check one absolute link and let the user repair it if it is broken.
///
/// Without a fallback there is nothing to check against and the link is
/// left alone.
fn fix_absolute(
    ctx: &RunContext,
    file: &FileContext,
    dom: &mut ArenaDom,
    id: ArenaNodeId,
    attr: &str,
    original: &str,
) -> Result<bool> {
    let checker = ctx.router().checker();
    let mut link = original.to_string();
    let mut message = "Broken link found";

    loop {
        let checked = match checker.check_fallback(UrlRef::parse(&link).path) {
            LinkStatus::Missing { checked } => checked,
            LinkStatus::Exists | LinkStatus::Unverifiable => break,
        };
        log::warn!("{message}: {link} (checked {checked}, in {})", file.src);

        let choice = ctx.interaction().choose(&BROKEN_LINK)?;
        match choice.key {
            "rm" => {
                dom.unwrap_element(id);
                return Ok(true);
            }
            "subst" => {
                let replacement = ctx.interaction().input("Enter new link")?;
                if replacement.is_empty() {
                    break;
                }
                link = replacement;
                if url_kind(&link) != UrlKind::Absolute {
                    break;
                }
                message = "That link is also broken";
            }
            _ => break,
        }
    }

    if link == original {
        return Ok(false);
    }
    dom.set_attr(id, attr, link);
    Ok(true)
}

/// Re-route and repair links of an already published page.
pub struct FixLinks;

impl Handler for FixLinks {
    fn name(&self) -> &'static str {
        "fix-links"
    }

    fn handle(&self, ctx: &RunContext, file: &mut FileContext, input: Payload) -> Result<Outcome> {
        let mut dom = match input {
            Payload::Document(dom) => dom,
            other => return Err(unexpected(self.name(), &other)),
        };
        let root = dom.document();
        if route_links(ctx, file, &mut dom, root)? {
            file.mark_changed();
        }
        Ok(Outcome::Continue(Payload::Document(dom)))
    }
}
