//! The generated table of contents page.

use crate::dom::{ArenaDom, ArenaNodeId};
use crate::epub::TocEntry;
use crate::error::Result;
use crate::order::reorder;
use crate::pipeline::{FileContext, Handler, Outcome, Payload, RunContext};

/// Title of the entry that points at the contents page itself.
pub const TOC_TITLE: &str = "Table of Contents";

/// Marks the outermost list of the contents page.
const TOP_LIST_CLASS: &str = "no-ind";

/// Build the contents page skeleton from the run's navigation entries.
///
/// The result is a bare document holding one stylesheet link per routed
/// stylesheet and a `div#contents` with the heading and the nested lists;
/// the page template is applied afterwards.
pub struct BuildToc;

impl Handler for BuildToc {
    fn name(&self) -> &'static str {
        "build-toc"
    }

    fn handle(&self, ctx: &RunContext, file: &mut FileContext, _input: Payload) -> Result<Outcome> {
        let (entries, order) = ctx.toc(self.name())?;
        let toc_src = ctx.toc_src(self.name())?;
        let router = ctx.router();

        let mut top = vec![TocEntry::new(TOC_TITLE, router.relative_link(toc_src, toc_src)?)];
        for entry in entries {
            top.push(route_entry(ctx, toc_src, entry)?);
        }
        let top = reorder(top, order.indices())?;

        let mut dom = ArenaDom::new();
        let html = dom.create_html_element("html", &[]);
        let head = dom.create_html_element("head", &[]);
        let body = dom.create_html_element("body", &[]);
        let root = dom.document();
        dom.append(root, html);
        dom.append(html, head);
        dom.append(html, body);

        for (src, dst) in router.table().iter() {
            if !dst.ends_with(".css") {
                continue;
            }
            let href = router.relative_link(toc_src, src)?;
            let link = dom.create_html_element(
                "link",
                &[("href", href.as_str()), ("rel", "stylesheet"), ("type", "text/css")],
            );
            dom.append(head, link);
        }

        let contents = dom.create_html_element("div", &[("id", "contents")]);
        dom.append(body, contents);
        let heading = dom.create_html_element("h1", &[]);
        dom.append_text(heading, &file.section_title);
        dom.append(contents, heading);

        let list = render_list(&mut dom, &top, true);
        dom.append(contents, list);
        indent(&mut dom, contents, 0);

        file.mark_changed();
        Ok(Outcome::Continue(Payload::Document(dom)))
    }
}

/// Copy of `entry` whose hrefs point at routed destinations.
///
/// Navigation hrefs are relative to the navigation document.
fn route_entry(ctx: &RunContext, toc_src: &str, entry: &TocEntry) -> Result<TocEntry> {
    let href = ctx
        .router()
        .routed_url(toc_src, &entry.href)?
        .unwrap_or_else(|| entry.href.clone());
    let children = entry
        .children
        .iter()
        .map(|child| route_entry(ctx, toc_src, child))
        .collect::<Result<Vec<_>>>()?;
    Ok(TocEntry {
        title: entry.title.clone(),
        href,
        children,
    })
}

fn render_list(dom: &mut ArenaDom, entries: &[TocEntry], top: bool) -> ArenaNodeId {
    let list = if top {
        dom.create_html_element("ul", &[("class", TOP_LIST_CLASS)])
    } else {
        dom.create_html_element("ul", &[])
    };
    for entry in entries {
        let item = dom.create_html_element("li", &[]);
        let anchor = dom.create_html_element("a", &[("href", entry.href.as_str())]);
        dom.append_text(anchor, &entry.title);
        dom.append(item, anchor);
        if !entry.children.is_empty() {
            let nested = render_list(dom, &entry.children, false);
            dom.append(item, nested);
        }
        dom.append(list, item);
    }
    list
}

fn indentation(level: usize) -> String {
    format!("\n{}", "  ".repeat(level))
}

fn is_blank_text(dom: &ArenaDom, id: ArenaNodeId) -> bool {
    dom.text_content(id)
        .is_some_and(|text| text.trim().is_empty())
}

/// Pretty-print the element children of `element`, two spaces per level.
///
/// Only missing or whitespace-only text between elements is touched.
fn indent(dom: &mut ArenaDom, element: ArenaNodeId, level: usize) {
    let children: Vec<_> = dom
        .children(element)
        .filter(|&child| dom.is_element(child))
        .collect();
    let Some(&first) = children.first() else {
        return;
    };

    set_whitespace_before(dom, first, level + 1);
    for (i, &child) in children.iter().enumerate() {
        indent(dom, child, level + 1);
        let after = if i + 1 == children.len() { level } else { level + 1 };
        set_whitespace_after(dom, element, child, after);
    }
}

fn set_whitespace_before(dom: &mut ArenaDom, node: ArenaNodeId, level: usize) {
    match dom.prev_sibling(node) {
        Some(prev) if is_blank_text(dom, prev) => dom.set_text(prev, indentation(level)),
        Some(prev) if dom.is_text(prev) => {}
        _ => {
            let text = dom.create_text(indentation(level));
            dom.insert_before(node, text);
        }
    }
}

fn set_whitespace_after(dom: &mut ArenaDom, parent: ArenaNodeId, node: ArenaNodeId, level: usize) {
    match dom.next_sibling(node) {
        Some(next) if is_blank_text(dom, next) => dom.set_text(next, indentation(level)),
        Some(next) if dom.is_text(next) => {}
        Some(next) => {
            let text = dom.create_text(indentation(level));
            dom.insert_before(next, text);
        }
        None => {
            let text = dom.create_text(indentation(level));
            dom.append(parent, text);
        }
    }
}
