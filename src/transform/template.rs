//! The page template every published document is merged into.

use std::fs;
use std::path::Path;

use minijinja::{AutoEscape, Environment, context};

use crate::dom::{ArenaDom, ArenaNodeId, parse_html};
use crate::epub::PackageMetadata;
use crate::error::{Error, Result};
use crate::pipeline::handlers::unexpected;
use crate::pipeline::{FileContext, Handler, Outcome, Payload, RunContext};
use crate::route::path::{decode_path, normalize_path};

const BUNDLED: &str = include_str!("../../templates/default.html");

/// Id of the element document bodies are moved into.
pub const CONTENT_ID: &str = "content";

const PREV_IMAGE: &str = "/images/actions/go-next-button2.png";
const NEXT_IMAGE: &str = "/images/actions/go-next-button2.png";
const TOC_IMAGE: &str = "/images/actions/ToC_button.png";

/// A page template: minijinja source plus the name it was loaded under.
#[derive(Debug, Clone)]
pub struct PageTemplate {
    name: String,
    source: String,
}

impl PageTemplate {
    /// File looked up in the working directory when no template is given.
    pub const DEFAULT_NAME: &'static str = "default_template.html";

    /// Template compiled into the binary.
    pub fn bundled() -> Self {
        Self {
            name: "<bundled>".to_string(),
            source: BUNDLED.to_string(),
        }
    }

    /// Check `source` for syntax errors and wrap it.
    pub fn from_source(name: impl Into<String>, source: impl Into<String>) -> Result<Self> {
        let source = source.into();
        Environment::new().template_from_str(&source)?;
        Ok(Self {
            name: name.into(),
            source,
        })
    }

    /// Load the template at `path`, or `default_template.html` from the
    /// working directory, or the bundled one.
    ///
    /// A path the user gave that does not exist is a configuration error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) if !path.is_file() => {
                return Err(Error::Config(format!(
                    "Template {} not found",
                    path.display()
                )));
            }
            Some(path) => path,
            None if Path::new(Self::DEFAULT_NAME).is_file() => Path::new(Self::DEFAULT_NAME),
            None => {
                log::debug!("Using the bundled page template");
                return Ok(Self::bundled());
            }
        };
        log::debug!("Using page template {}", path.display());
        Self::from_source(path.display().to_string(), fs::read_to_string(path)?)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Render with HTML auto-escaping.
    pub fn render(&self, vars: minijinja::Value) -> Result<String> {
        let mut env = Environment::new();
        env.set_auto_escape_callback(|_| AutoEscape::Html);
        Ok(env.render_str(&self.source, vars)?)
    }
}

/// Links from the current page to its neighbours and the contents page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Navigation {
    prev: Option<String>,
    next: Option<String>,
    toc: String,
}

fn navigation(ctx: &RunContext, file: &FileContext, handler: &'static str) -> Result<Navigation> {
    let spine = ctx.spine(handler)?;
    let toc_src = ctx.toc_src(handler)?;
    let router = ctx.router();

    let key = normalize_path(&decode_path(&file.src));
    let position = spine
        .iter()
        .position(|src| normalize_path(&decode_path(src)) == key);

    let mut nav = Navigation {
        toc: router.relative_link(&file.src, toc_src)?,
        ..Navigation::default()
    };
    if let Some(index) = position {
        if let Some(prev) = index.checked_sub(1).and_then(|i| spine.get(i)) {
            nav.prev = Some(router.relative_link(&file.src, prev)?);
        }
        if let Some(next) = spine.get(index + 1) {
            nav.next = Some(router.relative_link(&file.src, next)?);
        }
    }
    Ok(nav)
}

/// Merge the current document into the page template.
///
/// The document's head children go to the end of the template's head, its
/// body children into the content element. The page title, the description
/// meta and the navigation buttons are then generated.
pub struct RenderTemplate;

impl Handler for RenderTemplate {
    fn name(&self) -> &'static str {
        "render-template"
    }

    fn handle(&self, ctx: &RunContext, file: &mut FileContext, input: Payload) -> Result<Outcome> {
        let dom = match input {
            Payload::Document(dom) => dom,
            other => return Err(unexpected(self.name(), &other)),
        };
        let template = ctx.template(self.name())?;
        let metadata = ctx.metadata(self.name())?;
        let nav = navigation(ctx, file, self.name())?;

        let rendered = template.render(context! {
            prev_url => &nav.prev,
            next_url => &nav.next,
            toc_url => &nav.toc,
            src => &file.src,
            meta_title => &metadata.title,
            meta_author => &metadata.author,
            section_title => &file.section_title,
        })?;
        let mut page = parse_html(&rendered);

        let content = page.get_by_id(CONTENT_ID).ok_or_else(|| {
            Error::Config(format!(
                "Template {} has no element with id=\"{CONTENT_ID}\"",
                template.name()
            ))
        })?;
        let head = page
            .find_by_tag("head")
            .ok_or_else(|| Error::MissingElement("head".to_string()))?;

        if let Some(doc_head) = dom.find_by_tag("head") {
            import_children(&mut page, &dom, doc_head, head);
        }
        if let Some(doc_body) = dom.find_by_tag("body") {
            import_children(&mut page, &dom, doc_body, content);
        }

        insert_meta(&mut page, head, &file.section_title, metadata);
        insert_prev_next(&mut page, content, &nav);

        Ok(Outcome::Continue(Payload::Document(page)))
    }
}

fn import_children(page: &mut ArenaDom, dom: &ArenaDom, from: ArenaNodeId, to: ArenaNodeId) {
    for child in dom.children(from) {
        let copy = page.import(dom, child);
        page.append(to, copy);
    }
}

/// Put a fresh `<title>` and description `<meta>` at the top of `head`.
fn insert_meta(page: &mut ArenaDom, head: ArenaNodeId, section: &str, metadata: &PackageMetadata) {
    let stale: Vec<_> = page
        .descendants(head)
        .into_iter()
        .filter(|&id| {
            page.is_tag(id, "title")
                || (page.is_tag(id, "meta") && page.get_attr(id, "name") == Some("description"))
        })
        .collect();
    for id in stale {
        page.detach(id);
    }

    let title_text = if section.is_empty() {
        metadata.title.clone()
    } else {
        format!("{section} | {}", metadata.title)
    };
    let description = match &metadata.author {
        Some(author) => format!("{} by {author}", metadata.title),
        None => metadata.title.clone(),
    };

    let title = page.create_html_element("title", &[]);
    page.append_text(title, &title_text);
    let meta = page.create_html_element(
        "meta",
        &[("name", "description"), ("content", description.as_str())],
    );

    let first = page.children(head).next();
    match first {
        Some(first) => {
            page.insert_before(first, title);
            page.insert_before(first, meta);
        }
        None => {
            page.append(head, title);
            page.append(head, meta);
        }
    }
}

/// Append the previous/contents/next buttons to the content element.
fn insert_prev_next(page: &mut ArenaDom, content: ArenaNodeId, nav: &Navigation) {
    let container = page.create_html_element("div", &[("id", "nextbutton")]);
    let buttons = [
        (nav.prev.as_deref(), PREV_IMAGE, "Previous page"),
        (Some(nav.toc.as_str()), TOC_IMAGE, "Table of Contents"),
        (nav.next.as_deref(), NEXT_IMAGE, "Next page"),
    ];
    for (href, image, title) in buttons {
        let Some(href) = href else {
            continue;
        };
        let link = page.create_html_element("a", &[("href", href), ("class", "next")]);
        let img = page.create_html_element("img", &[("src", image), ("title", title)]);
        page.append(link, img);
        page.append(container, link);
    }
    page.append(content, container);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::serialize_document;
    use crate::pipeline::Source;
    use crate::route::{LinkChecker, RouteTable, Router};

    const TEMPLATE: &str = r#"<html><head><meta charset="utf-8"><title>x</title></head>
<body><h1>{{ meta_title }}</h1><div id="content"></div><p>{{ section_title }}</p></body></html>"#;

    fn ctx(template: &str) -> RunContext {
        let mut table = RouteTable::new();
        table.register("toc.ncx", "Contents.html");
        table.register("Text/ch1.xhtml", "ch1.html");
        table.register("Text/ch2.xhtml", "ch2.html");
        table.register("Text/ch3.xhtml", "part/ch3.html");
        let spine = ["toc.ncx", "Text/ch1.xhtml", "Text/ch2.xhtml", "Text/ch3.xhtml"]
            .map(String::from)
            .to_vec();
        RunContext::new(
            Router::new(table, LinkChecker::local("out")),
            "out",
            Source::Filesystem,
        )
        .with_spine(spine, "toc.ncx".into())
        .with_metadata(PackageMetadata {
            title: "Book & Co".into(),
            author: Some("Ann".into()),
        })
        .with_template(PageTemplate::from_source("test", template).unwrap())
    }

    fn render(ctx: &RunContext, src: &str, html: &str) -> Result<String> {
        let mut file = FileContext {
            src: src.into(),
            section_title: "Chapter".into(),
            ..FileContext::default()
        };
        match RenderTemplate.handle(ctx, &mut file, Payload::Document(parse_html(html)))? {
            Outcome::Continue(Payload::Document(dom)) => Ok(serialize_document(&dom)),
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[test]
    fn test_document_merged_into_template() {
        let out = render(
            &ctx(TEMPLATE),
            "Text/ch2.xhtml",
            r#"<html><head><link rel="stylesheet" href="css/a.css"></head><body><p>Hi</p></body></html>"#,
        )
        .unwrap();

        assert!(out.contains(
            r#"<head><title>Chapter | Book &amp; Co</title><meta name="description" content="Book &amp; Co by Ann"><meta charset="utf-8"><link rel="stylesheet" href="css/a.css"></head>"#
        ));
        assert!(out.contains("<h1>Book &amp; Co</h1>"));
        assert!(out.contains(r#"<div id="content"><p>Hi</p><div id="nextbutton">"#));
        assert!(out.contains(
            r#"<a href="ch1.html" class="next"><img src="/images/actions/go-next-button2.png" title="Previous page"></a>"#
        ));
        assert!(out.contains(
            r#"<a href="Contents.html" class="next"><img src="/images/actions/ToC_button.png" title="Table of Contents"></a>"#
        ));
        assert!(out.contains(r#"<a href="part/ch3.html" class="next">"#));
        assert!(out.contains("<p>Chapter</p>"));
    }

    #[test]
    fn test_last_page_has_no_next_button() {
        let out = render(&ctx(TEMPLATE), "Text/ch3.xhtml", "<p>end</p>").unwrap();
        assert!(out.contains(r#"<a href="../ch2.html" class="next">"#));
        assert!(out.contains(r#"<a href="../Contents.html" class="next">"#));
        assert!(!out.contains("Next page"));
    }

    #[test]
    fn test_first_page_has_no_previous_button() {
        let out = render(&ctx(TEMPLATE), "toc.ncx", "<p>toc</p>").unwrap();
        assert!(!out.contains("Previous page"));
        assert!(out.contains(r#"<a href="ch1.html" class="next">"#));
    }

    #[test]
    fn test_template_without_content_is_error() {
        let ctx = ctx("<html><body><main></main></body></html>");
        assert!(matches!(
            render(&ctx, "Text/ch1.xhtml", "<p>x</p>"),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_bundled_template_has_content() {
        let rendered = PageTemplate::bundled()
            .render(context! { toc_url => "Contents.html", meta_title => "T" })
            .unwrap();
        assert!(parse_html(&rendered).get_by_id(CONTENT_ID).is_some());
    }

    #[test]
    fn test_missing_template_file() {
        let missing = Path::new("/nonexistent/template.html");
        assert!(matches!(PageTemplate::load(Some(missing)), Err(Error::Config(_))));
    }

    #[test]
    fn test_syntax_error_rejected() {
        assert!(PageTemplate::from_source("bad", "{% if %}").is_err());
    }
}
