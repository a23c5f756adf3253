//! Stylesheet URL rewriting using cssparser.
//!
//! Only the URL tokens are replaced; everything else in the stylesheet is
//! copied through byte for byte.

use cssparser::{ParseError, Parser, ParserInput, Token};

use crate::error::Result;
use crate::pipeline::handlers::unexpected;
use crate::pipeline::{FileContext, Handler, Outcome, Payload, RunContext};
use crate::util::decode_document;

type CssParseError<'i> = ParseError<'i, ()>;

/// A URL token and its byte span in the source.
#[derive(Debug, Clone, PartialEq, Eq)]
struct UrlSpan {
    start: usize,
    end: usize,
    url: String,
    /// The span is a quoted string rather than a whole `url(...)`.
    quoted: bool,
}

/// Every `url(...)` and `@import "..."` reference in `css`, in source order.
pub fn extract_css_urls(css: &str) -> Vec<String> {
    url_spans(css).into_iter().map(|s| s.url).collect()
}

/// Rewrite URLs in a stylesheet.
///
/// `rewrite` returns the new URL, or `None` to keep the original spelling.
/// Returns `None` when nothing changed.
pub fn rewrite_css_urls<F>(css: &str, mut rewrite: F) -> Result<Option<String>>
where
    F: FnMut(&str) -> Result<Option<String>>,
{
    let mut out = String::with_capacity(css.len());
    let mut last = 0;
    let mut changed = false;

    for span in url_spans(css) {
        let Some(new_url) = rewrite(&span.url)? else {
            continue;
        };
        out.push_str(&css[last..span.start]);
        if span.quoted {
            let quote = if css[span.start..].starts_with('\'') { '\'' } else { '"' };
            write_quoted(&mut out, &new_url, quote);
        } else if new_url.contains(|c: char| c.is_whitespace() || "\"'()\\".contains(c)) {
            out.push_str("url(");
            write_quoted(&mut out, &new_url, '"');
            out.push(')');
        } else {
            out.push_str("url(");
            out.push_str(&new_url);
            out.push(')');
        }
        last = span.end;
        changed = true;
    }

    if !changed {
        return Ok(None);
    }
    out.push_str(&css[last..]);
    Ok(Some(out))
}

fn write_quoted(out: &mut String, value: &str, quote: char) {
    out.push(quote);
    for c in value.chars() {
        if c == quote || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push(quote);
}

fn url_spans(css: &str) -> Vec<UrlSpan> {
    let mut spans = Vec::new();
    let mut input = ParserInput::new(css);
    let mut parser = Parser::new(&mut input);
    collect_urls(&mut parser, &mut spans);
    spans
}

fn collect_urls(parser: &mut Parser, spans: &mut Vec<UrlSpan>) {
    let mut after_import = false;

    loop {
        let start = parser.position().byte_index();
        let token = match parser.next_including_whitespace_and_comments() {
            Ok(token) => token.clone(),
            Err(_) => break,
        };

        match &token {
            Token::UnquotedUrl(url) => spans.push(UrlSpan {
                start,
                end: parser.position().byte_index(),
                url: url.to_string(),
                quoted: false,
            }),
            Token::QuotedString(url) if after_import => spans.push(UrlSpan {
                start,
                end: parser.position().byte_index(),
                url: url.to_string(),
                quoted: true,
            }),
            Token::Function(name) if name.eq_ignore_ascii_case("url") => {
                let _ = parser.parse_nested_block(|p| {
                    p.skip_whitespace();
                    let start = p.position().byte_index();
                    if let Ok(Token::QuotedString(url)) = p.next_including_whitespace_and_comments().cloned() {
                        spans.push(UrlSpan {
                            start,
                            end: p.position().byte_index(),
                            url: url.to_string(),
                            quoted: true,
                        });
                    }
                    while p.next_including_whitespace_and_comments().is_ok() {}
                    Ok::<_, CssParseError>(())
                });
            }
            Token::Function(_)
            | Token::ParenthesisBlock
            | Token::SquareBracketBlock
            | Token::CurlyBracketBlock => {
                let _ = parser.parse_nested_block(|p| {
                    collect_urls(p, spans);
                    Ok::<_, CssParseError>(())
                });
            }
            _ => {}
        }

        after_import = match &token {
            Token::AtKeyword(name) => name.eq_ignore_ascii_case("import"),
            Token::WhiteSpace(_) | Token::Comment(_) => after_import,
            _ => false,
        };
    }
}

/// Route every URL of a stylesheet.
pub struct RewriteCssUrls;

impl Handler for RewriteCssUrls {
    fn name(&self) -> &'static str {
        "rewrite-css-urls"
    }

    fn handle(&self, ctx: &RunContext, file: &mut FileContext, input: Payload) -> Result<Outcome> {
        let css = match input {
            Payload::Bytes(bytes) => decode_document(&bytes).into_owned(),
            Payload::Text(text) => text,
            other => return Err(unexpected(self.name(), &other)),
        };

        let rewritten = rewrite_css_urls(&css, |url| ctx.router().routed_url(&file.src, url))?;
        Ok(Outcome::Continue(Payload::Text(match rewritten {
            Some(new) => {
                file.mark_changed();
                new
            }
            None => css,
        })))
    }
}
