//! Batch progress reporting.

use console::Term;

/// Observer for batch-level progress.
pub trait ProgressReporter: Send + Sync + std::fmt::Debug {
    /// A batch of `count` jobs is starting.
    fn batch_started(&self, count: usize);
    /// The overall percentage advanced enough to be worth showing.
    fn progress(&self, pct: u8);
    /// The batch drained its queue.
    fn batch_finished(&self);
}

/// Terminal reporter honoring quiet/progress flags.
#[derive(Debug)]
pub struct ConsoleReporter {
    term: Term,
    quiet: bool,
    show_progress: bool,
}

impl ConsoleReporter {
    /// Create a reporter writing to stderr.
    #[must_use]
    pub fn new(quiet: bool, show_progress: bool) -> Self {
        Self {
            term: Term::stderr(),
            quiet,
            show_progress,
        }
    }
}

impl ProgressReporter for ConsoleReporter {
    fn batch_started(&self, count: usize) {
        if self.quiet {
            return;
        }
        let _ = self.term.write_line(&format!("Prefetching {count} packages"));
        if self.show_progress {
            let _ = self.term.write_str("  - Downloading (0%)");
        } else {
            let _ = self.term.write_str("  - Downloading");
        }
    }

    fn progress(&self, pct: u8) {
        if self.quiet || !self.show_progress {
            return;
        }
        let _ = self.term.clear_line();
        let _ = self.term.write_str(&format!("  - Downloading ({pct}%)"));
    }

    fn batch_finished(&self) {
        if self.quiet {
            return;
        }
        if self.show_progress {
            let _ = self.term.clear_line();
        }
        let _ = self.term.write_line("  - Downloading (100%)");
    }
}

/// Reporter that discards everything; used when embedding the prefetcher.
#[derive(Debug, Default)]
pub struct NullReporter;

impl ProgressReporter for NullReporter {
    fn batch_started(&self, _count: usize) {}
    fn progress(&self, _pct: u8) {}
    fn batch_finished(&self) {}
}
