//! Multi-book scheduler.
//!
//! Runs every book's dispatch phase first, keeping the books that still
//! own scheduled tasks, then enters the poll loop: each round polls every
//! tracked book once, drops the ones whose jobs have all resolved, sleeps
//! the configured delay, and reports cumulative wait time on a single
//! progress line. A failed job flags its book and stops being polled; it
//! never stalls a sibling book. The loop ends when no book has unresolved
//! work, and the run verdict is `Completed` or `CompletedWithErrors` —
//! partial failure is loud, never silent.

use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use crate::backend::SpeechBackend;
use crate::book::Book;
use crate::clock::Clock;
use crate::error::ReaderError;

/// Aggregate verdict of one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,
    CompletedWithErrors,
}

pub struct Scheduler<'a> {
    backend: &'a dyn SpeechBackend,
    clock: &'a dyn Clock,
    check_delay: Duration,
}

impl<'a> Scheduler<'a> {
    pub fn new(
        backend: &'a dyn SpeechBackend,
        clock: &'a dyn Clock,
        check_delay: Duration,
    ) -> Self {
        Self { backend, clock, check_delay }
    }

    /// Drive every book end-to-end.
    ///
    /// A book whose digest store is corrupt is skipped (recorded as an
    /// error); config-level failures abort the whole run. Only
    /// [`ReaderError::UnknownJobStatus`] escapes the poll loop.
    pub fn run(&self, book_configs: &[PathBuf]) -> Result<RunOutcome, ReaderError> {
        let mut errors = false;
        let mut waiting: Vec<Book> = Vec::new();

        for config_path in book_configs {
            println!("\nProcessing audiobook defined in file {}", config_path.display());
            let mut book = match Book::load(config_path) {
                Ok(book) => book,
                Err(err @ ReaderError::DigestStoreCorrupt { .. }) => {
                    tracing::debug!("[{}] {err}", config_path.display());
                    println!("[ERROR] {err}");
                    errors = true;
                    continue;
                }
                Err(err) => return Err(err),
            };

            book.plan();
            book.print_plan();
            let has_pending = book.dispatch(self.backend);
            if let Err(err) = book.prune() {
                tracing::debug!("[{}] {err}", book.label());
                println!("[ERROR] {err}");
                errors = true;
            }
            if has_pending {
                waiting.push(book);
            } else {
                errors |= book.had_errors();
            }
        }

        if !waiting.is_empty() {
            errors |= self.await_pending(&mut waiting)?;
        }

        Ok(if errors { RunOutcome::CompletedWithErrors } else { RunOutcome::Completed })
    }

    /// Poll loop over the shrinking set of books with unresolved tasks.
    /// Returns whether any of them recorded an error.
    fn await_pending(&self, waiting: &mut Vec<Book>) -> Result<bool, ReaderError> {
        println!("\nWaiting for generation of files.");
        let total = waiting.len();
        let mut errors = false;
        let mut waited = 0u64;

        while !waiting.is_empty() {
            print!(
                "\rWaiting {waited} seconds. Still {}/{total} books to process.  ",
                waiting.len()
            );
            let _ = std::io::stdout().flush();

            let mut still_waiting = Vec::new();
            for mut book in waiting.drain(..) {
                if book.poll_pending(self.backend)? {
                    errors |= book.had_errors();
                } else {
                    still_waiting.push(book);
                }
            }
            *waiting = still_waiting;

            if waiting.is_empty() {
                break;
            }
            self.clock.sleep(self.check_delay);
            waited += self.check_delay.as_secs();
        }
        println!();
        Ok(errors)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
