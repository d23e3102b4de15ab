//! Book orchestrator — one document end-to-end.
//!
//! parse → digest filter → dispatch (sync or scheduled) → prune stale
//! outputs → poll until the scheduled jobs resolve. Fragment-scoped
//! errors (bad names, bad markup, one backend refusal) are logged with the
//! fragment identity and flag the book, but never stop sibling fragments;
//! the run-level verdict is aggregated by the scheduler.
//!
//! `expected_files` collects the declared file name of *every* fragment
//! seen this run, regenerated or not; pruning deletes any other `.mp3` in
//! the result directory. Pruning runs once, right after dispatch — a file
//! belonging to a still-pending task is in `expected_files` and therefore
//! safe.

use std::collections::HashSet;
use std::path::Path;

use crate::backend::SpeechBackend;
use crate::config::BookConfig;
use crate::digest::{content_digest, DigestStore};
use crate::error::ReaderError;
use crate::fragment::{fragments, normalize_source};
use crate::job::{JobState, SynthesisJob};
use crate::language::Language;

#[derive(Debug)]
pub struct Book {
    config: BookConfig,
    /// Book-config path, used to label log lines.
    label: String,
    source: String,
    default_language: Language,
    digests: DigestStore,
    jobs: Vec<SynthesisJob>,
    expected_files: Vec<String>,
    errors: bool,
}

impl Book {
    /// Read the book config, its digest store, and the (normalized) book
    /// text. Config problems are [`ReaderError::Config`]; a present but
    /// unreadable digest store is [`ReaderError::DigestStoreCorrupt`].
    pub fn load(config_path: &Path) -> Result<Self, ReaderError> {
        let config = BookConfig::load(config_path)?;
        let default_language = config.default_language()?;
        let digests = DigestStore::load(&config.hash_file)?;
        let text = std::fs::read_to_string(&config.book_file).map_err(|err| {
            ReaderError::config_with(
                format!(
                    "cant open for reading file containing text of book: {}",
                    config.book_file.display()
                ),
                err,
            )
        })?;
        Ok(Self {
            config,
            label: config_path.display().to_string(),
            source: normalize_source(&text),
            default_language,
            digests,
            jobs: Vec::new(),
            expected_files: Vec::new(),
            errors: false,
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// True when any fragment of this book failed.
    pub fn had_errors(&self) -> bool {
        self.errors
    }

    pub fn jobs(&self) -> &[SynthesisJob] {
        &self.jobs
    }

    pub fn has_pending(&self) -> bool {
        self.jobs.iter().any(SynthesisJob::is_pending)
    }

    fn record_fragment_error(&mut self, err: &ReaderError) {
        tracing::debug!("[{}] {err}", self.label);
        println!("[ERROR] {err}");
        self.errors = true;
    }

    /// Parse the source and decide, per fragment, whether it needs
    /// regeneration. Populates `expected_files` for every parsed fragment.
    pub fn plan(&mut self) {
        let mut seen_keys: HashSet<String> = HashSet::new();
        let mut planned = Vec::new();
        let mut failures = Vec::new();

        let Self { source, digests, expected_files, .. } = self;
        for parsed in fragments(source) {
            match parsed {
                Err(err) => failures.push(err),
                Ok(frag) => {
                    if !seen_keys.insert(frag.key.clone()) {
                        failures.push(ReaderError::DuplicateFragmentKey { key: frag.key });
                        continue;
                    }
                    expected_files.push(frag.file_name.clone());
                    let digest = content_digest(&frag.raw);
                    if digests.needs_regeneration(&frag.key, &digest) {
                        planned.push(SynthesisJob::new(frag, digest));
                    }
                }
            }
        }

        for err in failures {
            self.record_fragment_error(&err);
        }
        self.jobs = planned;
    }

    /// Print which files this run will regenerate.
    pub fn print_plan(&self) {
        print!("Files to be regenerated:");
        if self.jobs.is_empty() {
            println!(" none");
            return;
        }
        for job in &self.jobs {
            print!(" {}", job.fragment.file_name);
        }
        println!();
    }

    /// Dispatch every planned job. Returns true when at least one job went
    /// through the scheduled path and needs polling.
    pub fn dispatch(&mut self, backend: &dyn SpeechBackend) -> bool {
        let Self { config, default_language, digests, jobs, label, errors, .. } = self;
        for job in jobs.iter_mut() {
            print!("Processing: {} ... ", job.fragment.key);
            match job.dispatch(backend, config, *default_language, digests) {
                Ok(()) => match &job.state {
                    JobState::Completed => println!("finished."),
                    JobState::Pending { .. } => println!("started asynchronous generation."),
                    _ => println!(),
                },
                Err(err) => {
                    println!();
                    tracing::debug!("[{label}] {err}");
                    println!("[ERROR] {err}");
                    *errors = true;
                }
            }
        }
        self.has_pending()
    }

    /// Delete stale `.mp3` files from the result directory.
    ///
    /// Runs once per run, after dispatch: everything declared in the book
    /// text this run (pending tasks included) is kept, anything else goes.
    pub fn prune(&self) -> Result<(), ReaderError> {
        let dir = &self.config.result_dir;
        if !dir.is_dir() {
            return Ok(());
        }
        if self.expected_files.is_empty() {
            tracing::warn!(
                "[{}] book text declares no fragments, removing all audio in {}",
                self.label,
                dir.display()
            );
        }

        let keep: HashSet<&str> = self.expected_files.iter().map(String::as_str).collect();
        let entries = std::fs::read_dir(dir).map_err(|err| {
            ReaderError::io(format!("cannot list result directory {}", dir.display()), err)
        })?;
        for entry in entries {
            let entry = entry.map_err(|err| {
                ReaderError::io(format!("cannot list result directory {}", dir.display()), err)
            })?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if !name.to_ascii_lowercase().ends_with(".mp3") || keep.contains(name) {
                continue;
            }
            println!("Removing not used file {} from {}", name, dir.display());
            std::fs::remove_file(entry.path()).map_err(|err| {
                ReaderError::io(format!("cannot remove stale file {name}"), err)
            })?;
        }
        Ok(())
    }

    /// Poll every pending job once. Returns true when nothing is pending
    /// anymore. Synthesis failures are recorded and polling of that job
    /// stops; an unknown status escalates (fatal for the run).
    pub fn poll_pending(&mut self, backend: &dyn SpeechBackend) -> Result<bool, ReaderError> {
        let Self { config, digests, jobs, label, errors, .. } = self;
        let mut all_resolved = true;
        for job in jobs.iter_mut().filter(|job| job.is_pending()) {
            match job.check(backend, config, digests) {
                Ok(resolved) => all_resolved &= resolved,
                Err(err @ ReaderError::UnknownJobStatus { .. }) => return Err(err),
                Err(err) => {
                    tracing::debug!("[{label}] {err}");
                    println!("[ERROR] {err}");
                    *errors = true;
                }
            }
        }
        Ok(all_resolved)
    }

}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::testing::MockBackend;
    use crate::backend::PollStatus;
    use std::path::PathBuf;

    const BOOK_TEXT: &str = "001-intro.mp3@PL hello@ world@@002-outro.mp3@FR adieu@";

    /// Write a complete book layout into `dir` and return the config path.
    fn write_book(dir: &Path, text: &str) -> PathBuf {
        std::fs::write(dir.join("tale.book"), text).unwrap();
        let yaml = format!(
            "BookFile: {base}/tale.book\nHashFile: {base}/tale.hsh\nResultDir: {base}/out\n\
             MainLanguage: PL\nAlbum: A Tale\nArtist: Narrator\nAlbumArtist: Author\n\
             AlbumDate: \"2021\"\n",
            base = dir.display()
        );
        let config_path = dir.join("tale.yaml");
        std::fs::write(&config_path, yaml).unwrap();
        config_path
    }

    fn loaded(dir: &Path, text: &str) -> Book {
        let mut book = Book::load(&write_book(dir, text)).unwrap();
        book.plan();
        book
    }

    #[test]
    fn test_end_to_end_first_run_then_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let backend = MockBackend::immediate_only();

        // first run: empty digest table, both fragments regenerate
        let mut book = loaded(dir.path(), BOOK_TEXT);
        assert_eq!(book.jobs().len(), 2);
        let pending = book.dispatch(&backend);
        assert!(!pending);
        assert!(!book.had_errors());
        assert!(dir.path().join("out/001-intro.mp3").exists());
        assert!(dir.path().join("out/002-outro.mp3").exists());
        assert_eq!(backend.synthesized_count(), 2);

        let digests = DigestStore::load(&dir.path().join("tale.hsh")).unwrap();
        assert!(digests.contains("intro"));
        assert!(digests.contains("outro"));

        // second run over identical text: zero jobs
        let book = loaded(dir.path(), BOOK_TEXT);
        assert!(book.jobs().is_empty());
    }

    #[test]
    fn test_single_character_change_regenerates_one_fragment() {
        let dir = tempfile::tempdir().unwrap();
        let backend = MockBackend::immediate_only();

        loaded(dir.path(), BOOK_TEXT).dispatch(&backend);

        let changed = BOOK_TEXT.replace("adieu", "Adieu");
        let book = loaded(dir.path(), &changed);
        let keys: Vec<_> = book.jobs().iter().map(|j| j.fragment.key.as_str()).collect();
        assert_eq!(keys, vec!["outro"]);
    }

    #[test]
    fn test_fragment_error_does_not_stop_siblings() {
        let dir = tempfile::tempdir().unwrap();
        let backend = MockBackend::immediate_only();

        // middle fragment has a malformed name, the others are fine
        let text = "001-a.mp3@first@@badname@oops@@003-c.mp3@third";
        let mut book = loaded(dir.path(), text);
        assert!(book.had_errors());
        assert_eq!(book.jobs().len(), 2);

        book.dispatch(&backend);
        assert!(dir.path().join("out/001-a.mp3").exists());
        assert!(dir.path().join("out/003-c.mp3").exists());
    }

    #[test]
    fn test_duplicate_key_rejects_second_fragment_only() {
        let dir = tempfile::tempdir().unwrap();
        let text = "001-intro.mp3@one@@002-intro.mp3@two";
        let mut book = loaded(dir.path(), text);
        assert!(book.had_errors());
        assert_eq!(book.jobs().len(), 1);
        assert_eq!(book.jobs()[0].fragment.file_name, "001-intro.mp3");

        let backend = MockBackend::immediate_only();
        book.dispatch(&backend);
        assert!(dir.path().join("out/001-intro.mp3").exists());
    }

    #[test]
    fn test_backend_failure_flags_book_but_continues() {
        let dir = tempfile::tempdir().unwrap();
        let backend = MockBackend::failing_on("boom");

        let text = "001-a.mp3@goes boom@@002-b.mp3@stays fine";
        let mut book = loaded(dir.path(), text);
        book.dispatch(&backend);

        assert!(book.had_errors());
        assert!(!dir.path().join("out/001-a.mp3").exists());
        assert!(dir.path().join("out/002-b.mp3").exists());

        // only the healthy fragment committed its digest
        let digests = DigestStore::load(&dir.path().join("tale.hsh")).unwrap();
        assert!(!digests.contains("a"));
        assert!(digests.contains("b"));
    }

    #[test]
    fn test_prune_deletes_stale_keeps_declared() {
        let dir = tempfile::tempdir().unwrap();
        let backend = MockBackend::immediate_only();

        let mut book = loaded(dir.path(), BOOK_TEXT);
        book.dispatch(&backend);

        // a leftover from an earlier version of the book
        std::fs::write(dir.path().join("out/003-old.mp3"), b"stale").unwrap();
        // non-mp3 files are not bookvox's business
        std::fs::write(dir.path().join("out/notes.txt"), b"keep").unwrap();

        book.prune().unwrap();
        assert!(!dir.path().join("out/003-old.mp3").exists());
        assert!(dir.path().join("out/001-intro.mp3").exists());
        assert!(dir.path().join("out/002-outro.mp3").exists());
        assert!(dir.path().join("out/notes.txt").exists());
    }

    #[test]
    fn test_prune_spares_file_of_pending_job() {
        let dir = tempfile::tempdir().unwrap();
        // everything scheduled: sync limit zero
        let backend = MockBackend::with_sync_limit(0);

        let mut book = loaded(dir.path(), BOOK_TEXT);
        let pending = book.dispatch(&backend);
        assert!(pending);

        // pretend an earlier run already produced intro's audio
        std::fs::create_dir_all(dir.path().join("out")).unwrap();
        std::fs::write(dir.path().join("out/001-intro.mp3"), b"previous audio").unwrap();
        std::fs::write(dir.path().join("out/999-gone.mp3"), b"stale").unwrap();

        book.prune().unwrap();
        assert!(
            dir.path().join("out/001-intro.mp3").exists(),
            "a declared fragment's file must survive pruning while its task is pending"
        );
        assert!(!dir.path().join("out/999-gone.mp3").exists());
    }

    #[test]
    fn test_poll_loop_resolves_jobs_incrementally() {
        let dir = tempfile::tempdir().unwrap();
        let backend = MockBackend::with_sync_limit(0);

        let mut book = loaded(dir.path(), BOOK_TEXT);
        book.dispatch(&backend);
        assert!(book.has_pending());

        assert!(!book.poll_pending(&backend).unwrap());

        backend.script_poll("task-1", PollStatus::Completed {
            location: "https://audio.test/task-1.mp3".to_string(),
        });
        assert!(!book.poll_pending(&backend).unwrap(), "task-2 still runs");

        backend.script_poll("task-2", PollStatus::Completed {
            location: "https://audio.test/task-2.mp3".to_string(),
        });
        assert!(book.poll_pending(&backend).unwrap());
        assert!(!book.has_pending());
        assert!(!book.had_errors());

        let digests = DigestStore::load(&dir.path().join("tale.hsh")).unwrap();
        assert_eq!(digests.len(), 2);
    }

    #[test]
    fn test_corrupt_digest_store_fails_load() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = write_book(dir.path(), BOOK_TEXT);
        std::fs::write(dir.path().join("tale.hsh"), "intro: [oops").unwrap();

        let err = Book::load(&config_path).unwrap_err();
        assert!(matches!(err, ReaderError::DigestStoreCorrupt { .. }));
    }

    #[test]
    fn test_newline_wrapping_does_not_regenerate() {
        let dir = tempfile::tempdir().unwrap();
        let backend = MockBackend::immediate_only();

        loaded(dir.path(), "001-a.mp3@hello  wrapped  line").dispatch(&backend);

        // same words, wrapped differently: newline becomes double space
        let book = loaded(dir.path(), "001-a.mp3@hello\nwrapped\nline");
        assert!(book.jobs().is_empty());
    }
}
