//! # bookvox
//!
//! Incremental audiobook narrator: turns marked-up book text into a set of
//! tagged MP3s, regenerating only the fragments whose text changed since
//! the last run.
//!
//! A book file carries one fragment per output file, separated by `@@`:
//!
//! ```text
//! 001-intro.mp3@Welcome! This part reads in the book's main language.
//! A section can switch voice inline: @PL Dzień dobry@ and back.@@
//! 002-outro.mp3@Closing words.@@
//! ```
//!
//! Every fragment is hashed (SHA-256 over the raw block); a per-book
//! digest store remembers what was already narrated, so an unchanged
//! fragment costs nothing on the next run. Changed fragments are
//! synthesized through one of two HTTP backends, small payloads
//! immediately and large ones as backend-managed tasks polled across all
//! books at once. Files that vanished from the book text are pruned from
//! the result directory.
//!
//! ## Quick start
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use bookvox::clock::SystemClock;
//! use bookvox::config::GlobalConfig;
//! use bookvox::{RunOutcome, Scheduler};
//!
//! let config = GlobalConfig::load(std::path::Path::new("run.yaml")).unwrap();
//! let clock = Arc::new(SystemClock);
//! let backend = config.build_backend(clock.clone()).unwrap();
//! let scheduler =
//!     Scheduler::new(backend.as_ref(), &*clock, Duration::from_secs(config.check_delay));
//! match scheduler.run(&config.audiobooks).unwrap() {
//!     RunOutcome::Completed => println!("finished."),
//!     RunOutcome::CompletedWithErrors => println!("finished with ERRORS. See log above."),
//! }
//! ```
//!
//! ## Pipeline
//! 1. **Parse** — split the book text into ordered, independently hashed
//!    fragments ([`fragment`]).
//! 2. **Filter** — compare each digest against the persisted store
//!    ([`digest`]); unchanged fragments are only bookkept.
//! 3. **Normalize** — rewrite the embedded `@LANG … @` markers into the
//!    backend's payload shape ([`markup`]).
//! 4. **Dispatch** — immediate synthesis or a scheduled backend task
//!    ([`job`], [`ssml`], [`chunked`]).
//! 5. **Post-process** — write ID3 tags, commit the digest, prune stale
//!    audio ([`tags`], [`book`]).
//! 6. **Poll** — all books' outstanding tasks, every round, until done
//!    ([`scheduler`]).

pub mod backend;
pub mod book;
pub mod chunked;
pub mod clock;
pub mod config;
pub mod digest;
pub mod error;
pub mod fragment;
pub mod job;
pub mod language;
pub mod markup;
pub mod retry;
pub mod scheduler;
pub mod ssml;
pub mod tags;

// ─── Re-exports for convenience ─────────────────────────────────────────────

pub use error::ReaderError;
pub use language::Language;
pub use scheduler::{RunOutcome, Scheduler};
