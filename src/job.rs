//! Synthesis job — one fragment's path to a finished audio file.
//!
//! ```text
//!            payload ≤ sync limit                payload > sync limit
//! Created ──► Submitted ──► Completed    Created ──► Pending(task) ──► Completed
//!                  │                                      │   ▲
//!                  ▼                                      ▼   │ poll: in-progress
//!                Failed                                 Failed
//! ```
//!
//! Completion means all of: audio written to the target path, ID3 tags
//! written, digest committed and persisted. A job that failed anywhere in
//! that sequence commits nothing, so the next run regenerates the fragment
//! (at-least-once semantics). A `Pending` job that the backend reports
//! `failed` stops being polled; a status string outside the documented set
//! escalates as [`ReaderError::UnknownJobStatus`] instead of looping
//! forever.

use std::path::{Path, PathBuf};

use crate::backend::{PollStatus, SpeechBackend};
use crate::config::BookConfig;
use crate::digest::DigestStore;
use crate::error::ReaderError;
use crate::fragment::Fragment;
use crate::language::Language;
use crate::tags;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobState {
    Created,
    /// Immediate synthesis in flight.
    Submitted,
    /// Backend-managed task, waiting for poll results.
    Pending { task_id: String },
    Completed,
    Failed,
}

#[derive(Debug)]
pub struct SynthesisJob {
    pub fragment: Fragment,
    pub digest: String,
    pub state: JobState,
}

impl SynthesisJob {
    pub fn new(fragment: Fragment, digest: String) -> Self {
        Self { fragment, digest, state: JobState::Created }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.state, JobState::Pending { .. })
    }

    pub fn target_path(&self, result_dir: &Path) -> PathBuf {
        result_dir.join(&self.fragment.file_name)
    }

    /// Encode and either synthesize immediately (payload within the sync
    /// limit) or schedule a backend task. On any error the job is left
    /// `Failed` and nothing was committed.
    pub fn dispatch(
        &mut self,
        backend: &dyn SpeechBackend,
        config: &BookConfig,
        default_lang: Language,
        digests: &mut DigestStore,
    ) -> Result<(), ReaderError> {
        let payload = match backend.encode(&self.fragment, default_lang) {
            Ok(payload) => payload,
            Err(err) => {
                self.state = JobState::Failed;
                return Err(err);
            }
        };

        if payload.char_len() <= backend.sync_limit() {
            self.state = JobState::Submitted;
            let target = self.target_path(&config.result_dir);
            if let Err(err) = backend.synthesize_now(&payload, &target) {
                self.state = JobState::Failed;
                return Err(ReaderError::synthesis(self.fragment.file_name.clone(), err));
            }
            self.finalize(&target, config, digests)?;
            self.state = JobState::Completed;
        } else {
            match backend.schedule(&payload) {
                Ok(task_id) => {
                    print!("scheduled task: {task_id} ... ");
                    self.state = JobState::Pending { task_id };
                }
                Err(err) => {
                    self.state = JobState::Failed;
                    return Err(ReaderError::synthesis(self.fragment.file_name.clone(), err));
                }
            }
        }
        Ok(())
    }

    /// Poll a `Pending` job once.
    ///
    /// Returns `Ok(true)` when the job is resolved (this call may have just
    /// completed it), `Ok(false)` while the backend is still working. Backend
    /// failures resolve the job as `Failed` and surface as errors; an
    /// unrecognized status is [`ReaderError::UnknownJobStatus`] and the job
    /// is failed so it cannot be polled again.
    pub fn check(
        &mut self,
        backend: &dyn SpeechBackend,
        config: &BookConfig,
        digests: &mut DigestStore,
    ) -> Result<bool, ReaderError> {
        let task_id = match &self.state {
            JobState::Pending { task_id } => task_id.clone(),
            _ => return Ok(true),
        };
        let file = self.fragment.file_name.clone();

        let status = match backend.poll(&task_id) {
            Ok(status) => status,
            Err(err) => {
                self.state = JobState::Failed;
                return Err(ReaderError::synthesis(file, err));
            }
        };

        match status {
            PollStatus::InProgress => Ok(false),
            PollStatus::Failed { reason } => {
                self.state = JobState::Failed;
                Err(ReaderError::synthesis(
                    file,
                    anyhow::anyhow!("backend reported a failed task: {reason}"),
                ))
            }
            PollStatus::Completed { location } => {
                let target = self.target_path(&config.result_dir);
                if let Err(err) = backend.fetch(&location, &target) {
                    self.state = JobState::Failed;
                    return Err(ReaderError::synthesis(file, err));
                }
                println!("Downloaded file: {} ... ", target.display());
                self.finalize(&target, config, digests)?;
                self.state = JobState::Completed;
                Ok(true)
            }
            PollStatus::Unknown { status } => {
                self.state = JobState::Failed;
                Err(ReaderError::UnknownJobStatus { file, status })
            }
        }
    }

    /// Post-processing shared by both paths: tags, then digest commit.
    fn finalize(
        &mut self,
        target: &Path,
        config: &BookConfig,
        digests: &mut DigestStore,
    ) -> Result<(), ReaderError> {
        let result = tags::write_tags(
            target,
            &config.album_tags(),
            self.fragment.ordinal.parse().ok(),
            &self.fragment.key,
        )
        .and_then(|()| digests.record(&self.fragment.key, &self.digest));
        if result.is_err() {
            self.state = JobState::Failed;
        }
        result
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::testing::MockBackend;
    use crate::digest::content_digest;
    use crate::fragment;

    fn book_config(dir: &Path) -> BookConfig {
        BookConfig {
            book_file: dir.join("tale.book"),
            hash_file: dir.join("tale.hsh"),
            result_dir: dir.join("out"),
            main_language: "PL".to_string(),
            album: "A Tale".to_string(),
            artist: "Narrator".to_string(),
            album_artist: "Author".to_string(),
            album_date: "2021".to_string(),
        }
    }

    fn job(body: &str) -> SynthesisJob {
        let frag = fragment::fragments(&format!("001-intro.mp3@{body}"))
            .next()
            .unwrap()
            .unwrap();
        let digest = content_digest(&frag.raw);
        SynthesisJob::new(frag, digest)
    }

    #[test]
    fn test_immediate_path_completes_and_commits() {
        let dir = tempfile::tempdir().unwrap();
        let config = book_config(dir.path());
        let mut digests = DigestStore::load(&config.hash_file).unwrap();
        let backend = MockBackend::immediate_only();

        let mut job = job("hello there");
        job.dispatch(&backend, &config, Language::Pl, &mut digests).unwrap();

        assert_eq!(job.state, JobState::Completed);
        assert!(job.target_path(&config.result_dir).exists());
        assert!(digests.contains("intro"));
        assert_eq!(backend.synthesized_count(), 1);
    }

    #[test]
    fn test_immediate_failure_commits_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let config = book_config(dir.path());
        let mut digests = DigestStore::load(&config.hash_file).unwrap();
        let backend = MockBackend::failing_on("boom");

        let mut job = job("this goes boom");
        let err = job.dispatch(&backend, &config, Language::Pl, &mut digests).unwrap_err();

        assert!(matches!(err, ReaderError::Synthesis { .. }));
        assert_eq!(job.state, JobState::Failed);
        assert!(digests.is_empty());
        assert!(!job.target_path(&config.result_dir).exists());
    }

    #[test]
    fn test_large_payload_is_scheduled() {
        let dir = tempfile::tempdir().unwrap();
        let config = book_config(dir.path());
        let mut digests = DigestStore::load(&config.hash_file).unwrap();
        let backend = MockBackend::with_sync_limit(10);

        let mut job = job("this body is clearly longer than ten characters");
        job.dispatch(&backend, &config, Language::Pl, &mut digests).unwrap();

        assert!(job.is_pending());
        assert!(digests.is_empty(), "scheduling must not commit digests");
        assert_eq!(backend.scheduled.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_poll_cycle_in_progress_then_completed() {
        let dir = tempfile::tempdir().unwrap();
        let config = book_config(dir.path());
        let mut digests = DigestStore::load(&config.hash_file).unwrap();
        let backend = MockBackend::with_sync_limit(0);

        let mut job = job("scheduled body");
        job.dispatch(&backend, &config, Language::Pl, &mut digests).unwrap();

        // still running: state unchanged, nothing committed
        assert!(!job.check(&backend, &config, &mut digests).unwrap());
        assert!(job.is_pending());

        backend.script_poll("task-1", PollStatus::Completed {
            location: "https://audio.test/task-1.mp3".to_string(),
        });
        assert!(job.check(&backend, &config, &mut digests).unwrap());
        assert_eq!(job.state, JobState::Completed);
        assert!(job.target_path(&config.result_dir).exists());
        assert!(digests.contains("intro"));
        assert_eq!(
            backend.fetched.lock().unwrap().as_slice(),
            ["https://audio.test/task-1.mp3"]
        );
    }

    #[test]
    fn test_poll_failed_resolves_job_and_stops_polling() {
        let dir = tempfile::tempdir().unwrap();
        let config = book_config(dir.path());
        let mut digests = DigestStore::load(&config.hash_file).unwrap();
        let backend = MockBackend::with_sync_limit(0);

        let mut job = job("doomed body");
        job.dispatch(&backend, &config, Language::Pl, &mut digests).unwrap();
        backend.script_poll("task-1", PollStatus::Failed { reason: "voice on fire".to_string() });

        let err = job.check(&backend, &config, &mut digests).unwrap_err();
        assert!(matches!(err, ReaderError::Synthesis { .. }));
        assert_eq!(job.state, JobState::Failed);

        // resolved jobs answer true without touching the backend again
        assert!(job.check(&backend, &config, &mut digests).unwrap());
        assert!(digests.is_empty());
    }

    #[test]
    fn test_unknown_status_is_fatal_and_named() {
        let dir = tempfile::tempdir().unwrap();
        let config = book_config(dir.path());
        let mut digests = DigestStore::load(&config.hash_file).unwrap();
        let backend = MockBackend::with_sync_limit(0);

        let mut job = job("body");
        job.dispatch(&backend, &config, Language::Pl, &mut digests).unwrap();
        backend.script_poll("task-1", PollStatus::Unknown { status: "vanished".to_string() });

        let err = job.check(&backend, &config, &mut digests).unwrap_err();
        assert!(matches!(
            err,
            ReaderError::UnknownJobStatus { ref status, .. } if status == "vanished"
        ));
        assert_eq!(job.state, JobState::Failed);
    }
}
