//! Per-run file statistics.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::util::count_noun;

/// What can be recorded about a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stat {
    Processed,
    Changed,
    Failed,
    Written,
}

impl Stat {
    pub fn label(self) -> &'static str {
        match self {
            Stat::Processed => "processed",
            Stat::Changed => "changed",
            Stat::Failed => "failed",
            Stat::Written => "written",
        }
    }
}

/// Sets of file paths per statistic, for one run.
#[derive(Debug, Default)]
pub struct Stats {
    files: BTreeMap<Stat, BTreeSet<String>>,
}

impl Stats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, stat: Stat, path: &str) {
        self.files.entry(stat).or_default().insert(path.to_string());
    }

    pub fn contains(&self, stat: Stat, path: &str) -> bool {
        self.files.get(&stat).is_some_and(|s| s.contains(path))
    }

    pub fn count(&self, stat: Stat) -> usize {
        self.files.get(&stat).map_or(0, BTreeSet::len)
    }

    /// Start recording one file. The returned guard records exactly one of
    /// processed or failed: processed on [`FileScope::finish`], failed when
    /// dropped unfinished.
    pub fn scope(&mut self, path: &str) -> FileScope<'_> {
        FileScope {
            stats: self,
            path: path.to_string(),
            changed: false,
            written: false,
            finished: false,
        }
    }

    pub fn summary(&self) -> Summary {
        Summary {
            processed: self.count(Stat::Processed),
            changed: self.count(Stat::Changed),
            failed: self.count(Stat::Failed),
            written: self.count(Stat::Written),
        }
    }
}

/// Statistics of one file while its chain runs.
#[derive(Debug)]
pub struct FileScope<'a> {
    stats: &'a mut Stats,
    path: String,
    changed: bool,
    written: bool,
    finished: bool,
}

impl FileScope<'_> {
    pub fn set_changed(&mut self, changed: bool) {
        self.changed |= changed;
    }

    pub fn set_written(&mut self, written: bool) {
        self.written |= written;
    }

    /// The chain ran to completion or was cut short on purpose.
    pub fn finish(mut self) {
        self.finished = true;
    }
}

impl Drop for FileScope<'_> {
    fn drop(&mut self) {
        if self.changed {
            self.stats.add(Stat::Changed, &self.path);
        }
        if self.written {
            self.stats.add(Stat::Written, &self.path);
        }
        let outcome = if self.finished {
            Stat::Processed
        } else {
            Stat::Failed
        };
        self.stats.add(outcome, &self.path);
    }
}

/// Counts printed at the end of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "cli", derive(serde::Serialize))]
pub struct Summary {
    pub processed: usize,
    pub changed: usize,
    pub failed: usize,
    pub written: usize,
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts = [
            (self.processed, Stat::Processed),
            (self.changed, Stat::Changed),
            (self.failed, Stat::Failed),
            (self.written, Stat::Written),
        ]
        .map(|(count, stat)| format!("{} {}", count_noun(count, "file"), stat.label()));
        f.write_str(&parts.join(", "))
    }
}
