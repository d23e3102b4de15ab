//! Speech-backend capability interface.
//!
//! Everything the pipeline needs from a synthesis service, abstracted from
//! any concrete provider: normalize a fragment into the backend's payload
//! shape, synthesize small payloads immediately, schedule large ones as
//! backend-managed tasks, poll those tasks, and download finished audio.
//! The concrete backend is chosen once per run from configuration
//! ([`crate::ssml`], [`crate::chunked`]); nothing deeper in the pipeline
//! branches on backend identity.

use std::path::Path;

use crate::error::ReaderError;
use crate::fragment::Fragment;
use crate::language::Language;

/// A fragment body normalized into the shape one backend consumes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// One inline-markup document plus the voice that narrates it.
    Document { text: String, voice: &'static str },
    /// Ordered per-language plain-text segments, markers removed.
    Segments(Vec<(Language, String)>),
}

impl Payload {
    /// Character count measured against the backend's synchronous limit.
    ///
    /// Segment payloads report 0: they are synthesized piecewise and never
    /// hit a whole-document ceiling.
    pub fn char_len(&self) -> usize {
        match self {
            Payload::Document { text, .. } => text.chars().count(),
            Payload::Segments(_) => 0,
        }
    }
}

/// Status of one backend-managed synthesis task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollStatus {
    /// Still queued or running; poll again later.
    InProgress,
    /// Finished; the audio waits at `location`.
    Completed { location: String },
    /// The backend gave up; `reason` is its diagnostic.
    Failed { reason: String },
    /// A status string outside the documented set. The caller escalates
    /// this to a fatal error rather than polling forever.
    Unknown { status: String },
}

pub trait SpeechBackend: std::fmt::Debug {
    fn name(&self) -> &'static str;

    /// Largest payload (in characters) the immediate path accepts.
    fn sync_limit(&self) -> usize;

    /// Normalize one fragment's markup into this backend's payload.
    fn encode(&self, fragment: &Fragment, default_lang: Language)
        -> Result<Payload, ReaderError>;

    /// Immediate synthesis: write finished audio to `target`.
    fn synthesize_now(&self, payload: &Payload, target: &Path) -> anyhow::Result<()>;

    /// Start a backend-managed task and return its opaque id.
    fn schedule(&self, payload: &Payload) -> anyhow::Result<String>;

    /// Query one task's status. No side effects.
    fn poll(&self, task_id: &str) -> anyhow::Result<PollStatus>;

    /// Download finished audio from `location` to `target`.
    fn fetch(&self, location: &str, target: &Path) -> anyhow::Result<()>;
}

/// Write audio bytes to `target`, creating the parent directory on demand.
pub(crate) fn write_audio(target: &Path, bytes: &[u8]) -> anyhow::Result<()> {
    use anyhow::Context;

    if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("cannot create result directory {}", parent.display()))?;
    }
    std::fs::write(target, bytes)
        .with_context(|| format!("cannot write audio file {}", target.display()))
}

// ─────────────────────────────────────────────────────────────────────────────
// Test backend
// ─────────────────────────────────────────────────────────────────────────────


// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
