//! Handlers for reading, guarding and writing files.

use std::fs;

use super::{FileContext, Handler, Outcome, Payload, RunContext};
use crate::dom::{parse_html_bytes, serialize_document};
use crate::error::{Error, Result};

/// Load the current file's bytes from the run's source.
pub struct ReadInput;

impl Handler for ReadInput {
    fn name(&self) -> &'static str {
        "read-input"
    }

    fn handle(&self, ctx: &RunContext, file: &mut FileContext, _input: Payload) -> Result<Outcome> {
        Ok(Outcome::Continue(Payload::Bytes(ctx.source().read(file)?)))
    }
}

/// Parse bytes or text into a document.
pub struct ParseHtml;

impl Handler for ParseHtml {
    fn name(&self) -> &'static str {
        "parse-html"
    }

    fn handle(&self, _ctx: &RunContext, _file: &mut FileContext, input: Payload) -> Result<Outcome> {
        let dom = match input {
            Payload::Bytes(bytes) => parse_html_bytes(&bytes),
            Payload::Text(text) => crate::dom::parse_html(&text),
            Payload::Document(dom) => dom,
            Payload::Empty => return Err(unexpected(self.name(), &Payload::Empty)),
        };
        Ok(Outcome::Continue(Payload::Document(dom)))
    }
}

/// Turn a document into text.
pub struct Serialize;

impl Handler for Serialize {
    fn name(&self) -> &'static str {
        "serialize"
    }

    fn handle(&self, _ctx: &RunContext, _file: &mut FileContext, input: Payload) -> Result<Outcome> {
        match input {
            Payload::Document(dom) => Ok(Outcome::Continue(Payload::Text(serialize_document(&dom)))),
            other => Err(unexpected(self.name(), &other)),
        }
    }
}

/// Stop before writing anything in a dry run.
pub struct GuardDryRun;

impl Handler for GuardDryRun {
    fn name(&self) -> &'static str {
        "guard-dry-run"
    }

    fn handle(&self, ctx: &RunContext, file: &mut FileContext, input: Payload) -> Result<Outcome> {
        if ctx.write_options().dry_run {
            return Ok(Outcome::abort(format!(
                "dry run, not writing {}",
                ctx.output_path(file).display()
            )));
        }
        Ok(Outcome::Continue(input))
    }
}

/// Stop when the output exists and overwriting is off.
pub struct GuardOverwrite;

impl Handler for GuardOverwrite {
    fn name(&self) -> &'static str {
        "guard-overwrite"
    }

    fn handle(&self, ctx: &RunContext, file: &mut FileContext, input: Payload) -> Result<Outcome> {
        let path = ctx.output_path(file);
        if !ctx.write_options().overwrite && path.exists() {
            return Ok(Outcome::abort(format!(
                "{} already exists, not overwriting",
                path.display()
            )));
        }
        Ok(Outcome::Continue(input))
    }
}

/// Stop when no earlier handler changed the document.
pub struct GuardUnchanged;

impl Handler for GuardUnchanged {
    fn name(&self) -> &'static str {
        "guard-unchanged"
    }

    fn handle(&self, _ctx: &RunContext, file: &mut FileContext, input: Payload) -> Result<Outcome> {
        if !file.changed {
            return Ok(Outcome::abort("unchanged, nothing to write"));
        }
        Ok(Outcome::Continue(input))
    }
}

/// Write the current value to the output path.
pub struct WriteOut;

impl Handler for WriteOut {
    fn name(&self) -> &'static str {
        "write-out"
    }

    fn handle(&self, ctx: &RunContext, file: &mut FileContext, input: Payload) -> Result<Outcome> {
        let path = ctx.output_path(file);
        let bytes: &[u8] = match &input {
            Payload::Bytes(bytes) => bytes,
            Payload::Text(text) => text.as_bytes(),
            other => return Err(unexpected(self.name(), other)),
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, bytes)?;
        file.written = true;
        log::debug!("Wrote {}", path.display());
        Ok(Outcome::Continue(input))
    }
}

/// Copy the source file to the output path unchanged.
pub struct CopyOut;

impl Handler for CopyOut {
    fn name(&self) -> &'static str {
        "copy-out"
    }

    fn handle(&self, ctx: &RunContext, file: &mut FileContext, input: Payload) -> Result<Outcome> {
        let bytes = ctx.source().read(file)?;
        let path = ctx.output_path(file);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, bytes)?;
        file.written = true;
        log::debug!("Copied {} to {}", file.src, path.display());
        Ok(Outcome::Continue(input))
    }
}

pub(crate) fn unexpected(handler: &str, input: &Payload) -> Error {
    Error::Config(format!("'{handler}' cannot work on {}", input.kind()))
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::pipeline::WriteOptions;
    use crate::route::{LinkChecker, RouteTable, Router};

    fn ctx(dir: &Path, write: WriteOptions) -> RunContext {
        let router = Router::new(RouteTable::new(), LinkChecker::local(dir));
        RunContext::new(router, dir, crate::pipeline::Source::Filesystem).with_write_options(write)
    }

    fn file(dst: &str) -> FileContext {
        FileContext {
            src: dst.to_string(),
            dst: dst.to_string(),
            ..FileContext::default()
        }
    }

    #[test]
    fn test_write_out_creates_directories() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ctx(dir.path(), WriteOptions::default());
        let mut f = file("css/main.css");

        WriteOut
            .handle(&ctx, &mut f, Payload::Text("body {}".into()))
            .unwrap();

        assert!(f.written);
        assert_eq!(fs::read_to_string(dir.path().join("css/main.css")).unwrap(), "body {}");
    }

    #[test]
    fn test_guard_overwrite_aborts_on_existing_output() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("page.html"), "old").unwrap();
        let ctx = ctx(dir.path(), WriteOptions::default());

        let outcome = GuardOverwrite
            .handle(&ctx, &mut file("page.html"), Payload::Empty)
            .unwrap();
        assert!(matches!(outcome, Outcome::Abort(_)));

        let outcome = GuardOverwrite
            .handle(&ctx, &mut file("fresh.html"), Payload::Empty)
            .unwrap();
        assert!(matches!(outcome, Outcome::Continue(_)));
    }

    #[test]
    fn test_guard_dry_run() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ctx(
            dir.path(),
            WriteOptions {
                dry_run: true,
                ..WriteOptions::default()
            },
        );
        let outcome = GuardDryRun
            .handle(&ctx, &mut file("page.html"), Payload::Empty)
            .unwrap();
        assert!(matches!(outcome, Outcome::Abort(_)));
    }

    #[test]
    fn test_guard_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ctx(dir.path(), WriteOptions::default());
        let mut f = file("page.html");
        assert!(matches!(
            GuardUnchanged.handle(&ctx, &mut f, Payload::Empty).unwrap(),
            Outcome::Abort(_)
        ));
        f.mark_changed();
        assert!(matches!(
            GuardUnchanged.handle(&ctx, &mut f, Payload::Empty).unwrap(),
            Outcome::Continue(_)
        ));
    }

    #[test]
    fn test_serialize_rejects_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ctx(dir.path(), WriteOptions::default());
        assert!(
            Serialize
                .handle(&ctx, &mut file("x.html"), Payload::Bytes(vec![]))
                .is_err()
        );
    }
}
