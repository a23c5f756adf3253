//! Per-file handler chains.
//!
//! A run is a list of [`Job`]s, each naming a file and the [`Chain`] of
//! handlers to run on it. Handlers pass a [`Payload`] along the chain and
//! steer it with an [`Outcome`]: continue with a new value, skip their own
//! effect, or stop the chain for this file. Only a returned `Err` ends the
//! whole run.

mod context;
pub mod handlers;
mod stats;

use std::rc::Rc;

pub use context::{FileContext, RunContext, Source, WriteOptions};
pub use stats::{FileScope, Stat, Stats, Summary};

use crate::dom::ArenaDom;
use crate::error::Result;
use crate::util::count_noun;

/// The value flowing through a chain.
#[derive(Debug, Default)]
pub enum Payload {
    /// Nothing produced yet.
    #[default]
    Empty,
    Bytes(Vec<u8>),
    Text(String),
    Document(ArenaDom),
}

impl Payload {
    pub fn kind(&self) -> &'static str {
        match self {
            Payload::Empty => "nothing",
            Payload::Bytes(_) => "bytes",
            Payload::Text(_) => "text",
            Payload::Document(_) => "a document",
        }
    }
}

/// What a handler tells the executor.
#[derive(Debug)]
pub enum Outcome {
    /// The value for the next handler.
    Continue(Payload),
    /// This handler did nothing; the next one gets `input` back unchanged.
    Skip { input: Payload, reason: String },
    /// Stop the chain for this file. Not a failure.
    Abort(String),
}

impl Outcome {
    pub fn skip(input: Payload, reason: impl Into<String>) -> Self {
        Outcome::Skip {
            input,
            reason: reason.into(),
        }
    }

    pub fn abort(reason: impl Into<String>) -> Self {
        Outcome::Abort(reason.into())
    }
}

/// One step of a chain.
///
/// Handlers read what they need from the [`RunContext`] through its
/// accessors, so a chain used in a run that lacks a field fails with a
/// configuration error naming the handler.
pub trait Handler {
    fn name(&self) -> &'static str;

    fn handle(&self, ctx: &RunContext, file: &mut FileContext, input: Payload) -> Result<Outcome>;
}

/// An ordered list of handlers, shared by every file it applies to.
pub struct Chain {
    name: &'static str,
    handlers: Vec<Box<dyn Handler>>,
}

impl std::fmt::Debug for Chain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chain")
            .field("name", &self.name)
            .field(
                "handlers",
                &self.handlers.iter().map(|h| h.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl Chain {
    pub fn new(name: &'static str, handlers: Vec<Box<dyn Handler>>) -> Rc<Self> {
        Rc::new(Self { name, handlers })
    }

    /// A chain that does nothing with its files.
    pub fn empty(name: &'static str) -> Rc<Self> {
        Self::new(name, Vec::new())
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn handler_names(&self) -> Vec<&'static str> {
        self.handlers.iter().map(|h| h.name()).collect()
    }
}

/// A file and the chain to run on it.
#[derive(Debug, Clone)]
pub struct Job {
    pub file: FileContext,
    pub chain: Rc<Chain>,
}

/// Run every job, grouped by chain.
///
/// Groups come in the order their chain is first seen; inside a group jobs
/// keep their given order. Each file is recorded as processed or failed
/// exactly once.
pub fn run_jobs(ctx: &RunContext, jobs: Vec<Job>, stats: &mut Stats) -> Result<()> {
    let mut groups: Vec<(Rc<Chain>, Vec<FileContext>)> = Vec::new();
    for job in jobs {
        match groups.iter_mut().find(|(chain, _)| Rc::ptr_eq(chain, &job.chain)) {
            Some((_, files)) => files.push(job.file),
            None => groups.push((job.chain, vec![job.file])),
        }
    }

    for (chain, files) in groups {
        log::debug!(
            "Running '{}' on {}",
            chain.name(),
            count_noun(files.len(), "file")
        );
        for file in files {
            run_file(ctx, &chain, file, stats)?;
        }
    }
    Ok(())
}

/// Run one chain on one file.
pub fn run_file(ctx: &RunContext, chain: &Chain, mut file: FileContext, stats: &mut Stats) -> Result<()> {
    let mut scope = stats.scope(&file.src);
    log::debug!("Start handling {}", file.src);
    if file.section_title.is_empty()
        && let Some(title) = ctx.title_for(&file.src)
    {
        file.section_title = title.to_string();
    }

    let mut current = Payload::Empty;
    for handler in &chain.handlers {
        log::trace!(" - {} ({})", handler.name(), current.kind());
        match handler.handle(ctx, &mut file, current)? {
            Outcome::Continue(next) => current = next,
            Outcome::Skip { input, reason } => {
                log::info!("{}: skipped {}: {reason}", file.src, handler.name());
                current = input;
            }
            Outcome::Abort(reason) => {
                log::info!("{}: {reason}", file.src);
                break;
            }
        }
    }

    scope.set_changed(file.changed);
    scope.set_written(file.written);
    scope.finish();
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::error::Error;
    use crate::route::{LinkChecker, RouteTable, Router};

    type Log = Rc<RefCell<Vec<String>>>;

    struct Record {
        name: &'static str,
        log: Log,
        outcome: fn(Payload) -> Result<Outcome>,
    }

    impl Handler for Record {
        fn name(&self) -> &'static str {
            self.name
        }

        fn handle(&self, _ctx: &RunContext, file: &mut FileContext, input: Payload) -> Result<Outcome> {
            let seen = match &input {
                Payload::Text(t) => t.clone(),
                other => other.kind().to_string(),
            };
            self.log
                .borrow_mut()
                .push(format!("{}:{}:{}", self.name, file.src, seen));
            (self.outcome)(input)
        }
    }

    fn record(name: &'static str, log: &Log, outcome: fn(Payload) -> Result<Outcome>) -> Box<dyn Handler> {
        Box::new(Record {
            name,
            log: Rc::clone(log),
            outcome,
        })
    }

    fn ctx() -> RunContext {
        let router = Router::new(RouteTable::new(), LinkChecker::local("."));
        RunContext::new(router, ".", Source::Filesystem)
    }

    fn job(src: &str, chain: &Rc<Chain>) -> Job {
        Job {
            file: FileContext {
                src: src.to_string(),
                ..FileContext::default()
            },
            chain: Rc::clone(chain),
        }
    }

    #[test]
    fn test_continue_feeds_next_handler() {
        let log = Log::default();
        let chain = Chain::new(
            "c",
            vec![
                record("one", &log, |_| Ok(Outcome::Continue(Payload::Text("x".into())))),
                record("two", &log, |p| Ok(Outcome::Continue(p))),
            ],
        );
        let mut stats = Stats::new();
        run_jobs(&ctx(), vec![job("a", &chain)], &mut stats).unwrap();
        assert_eq!(*log.borrow(), vec!["one:a:nothing", "two:a:x"]);
        assert!(stats.contains(Stat::Processed, "a"));
    }

    #[test]
    fn test_skip_keeps_previous_value() {
        let log = Log::default();
        let chain = Chain::new(
            "c",
            vec![
                record("one", &log, |_| Ok(Outcome::Continue(Payload::Text("kept".into())))),
                record("skipper", &log, |p| Ok(Outcome::skip(p, "not needed"))),
                record("three", &log, |p| Ok(Outcome::Continue(p))),
            ],
        );
        let mut stats = Stats::new();
        run_jobs(&ctx(), vec![job("a", &chain)], &mut stats).unwrap();
        assert_eq!(log.borrow()[2], "three:a:kept");
    }

    #[test]
    fn test_abort_stops_chain_but_counts_processed() {
        let log = Log::default();
        let chain = Chain::new(
            "c",
            vec![
                record("guard", &log, |_| Ok(Outcome::abort("dry run"))),
                record("write", &log, |p| Ok(Outcome::Continue(p))),
            ],
        );
        let mut stats = Stats::new();
        run_jobs(&ctx(), vec![job("a", &chain)], &mut stats).unwrap();
        assert_eq!(log.borrow().len(), 1);
        assert!(stats.contains(Stat::Processed, "a"));
        assert!(!stats.contains(Stat::Failed, "a"));
    }

    #[test]
    fn test_error_is_fatal_and_counts_failed() {
        let log = Log::default();
        let chain = Chain::new(
            "c",
            vec![record("boom", &log, |_| Err(Error::Config("bad".into())))],
        );
        let mut stats = Stats::new();
        let result = run_jobs(&ctx(), vec![job("a", &chain), job("b", &chain)], &mut stats);
        assert!(result.is_err());
        assert!(stats.contains(Stat::Failed, "a"));
        // The run stopped before the second file.
        assert!(!stats.contains(Stat::Processed, "b"));
        assert!(!stats.contains(Stat::Failed, "b"));
    }

    #[test]
    fn test_grouping_by_chain_identity() {
        let log = Log::default();
        let first = Chain::new("first", vec![record("f", &log, |p| Ok(Outcome::Continue(p)))]);
        let second = Chain::new("second", vec![record("s", &log, |p| Ok(Outcome::Continue(p)))]);
        let jobs = vec![
            job("1", &first),
            job("2", &second),
            job("3", &first),
            job("4", &second),
        ];
        let mut stats = Stats::new();
        run_jobs(&ctx(), jobs, &mut stats).unwrap();
        assert_eq!(
            *log.borrow(),
            vec!["f:1:nothing", "f:3:nothing", "s:2:nothing", "s:4:nothing"]
        );
        assert_eq!(stats.count(Stat::Processed), 4);
    }
}
