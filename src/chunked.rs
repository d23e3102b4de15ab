//! Segment-splitting HTTP backend (`reading_engine: plain`).
//!
//! For services that take short plain-text requests instead of a marked-up
//! document: the fragment body is split into per-language segments, each
//! segment into pieces of at most [`PIECE_MAX_CHARS`] characters, and every
//! piece becomes one `GET {endpoint}/api/tts?lang={code}&q={text}` request
//! returning MP3 bytes. Pieces are synthesized in order under a bounded
//! retry policy and their audio is concatenated into the fragment's single
//! output file — the job counts as done only when every piece succeeded.
//!
//! There is no whole-document size ceiling, so every job runs on the
//! immediate path; task scheduling is not supported here.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::backend::{write_audio, Payload, PollStatus, SpeechBackend};
use crate::clock::Clock;
use crate::error::ReaderError;
use crate::fragment::Fragment;
use crate::language::Language;
use crate::markup::split_segments;
use crate::retry::RetryPolicy;

/// Longest text one request may carry, in characters.
pub const PIECE_MAX_CHARS: usize = 100;

/// When a clause must be broken at a space, the space is searched from this
/// character index on, so pieces stay reasonably sized.
const PIECE_MIN_SPLIT: usize = 60;

const HTTP_TIMEOUT: Duration = Duration::from_secs(60);

static RE_SPACE_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r" +").unwrap());

/// Request language code per token.
fn lang_code(lang: Language) -> &'static str {
    match lang {
        Language::Pl => "pl",
        Language::Eng => "en-GB",
        Language::Us => "en",
        Language::Ger => "de",
        Language::Fr => "fr",
        Language::Es => "es",
        Language::It => "it",
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Piece splitting
// ─────────────────────────────────────────────────────────────────────────────

/// Split one segment's text into request-sized pieces.
///
/// Clause boundaries come first (after `.,:;!?`), then any clause still
/// over [`PIECE_MAX_CHARS`] breaks at a space at index ≥ [`PIECE_MIN_SPLIT`].
/// Pieces without a single letter are dropped. A clause that cannot be
/// broken is an error naming the string.
pub fn split_into_pieces(text: &str) -> anyhow::Result<Vec<String>> {
    let collapsed = RE_SPACE_RUNS.replace_all(text.trim(), " ");
    let mut pieces = Vec::new();

    for clause in collapsed.split_inclusive(['.', ',', ':', ';', '!', '?']) {
        let mut rest: Vec<char> = clause.trim().chars().collect();
        if !rest.iter().any(|c| c.is_alphabetic()) {
            continue;
        }
        while rest.len() > PIECE_MAX_CHARS {
            let split_at = rest
                .iter()
                .enumerate()
                .skip(PIECE_MIN_SPLIT)
                .find(|(_, c)| **c == ' ')
                .map(|(i, _)| i);
            let clause_text: String = rest.iter().collect();
            match split_at {
                None => anyhow::bail!(
                    "string {clause_text:?} is longer than {PIECE_MAX_CHARS} characters \
                     and contains no space to divide it"
                ),
                Some(at) if at > PIECE_MAX_CHARS => anyhow::bail!(
                    "string {clause_text:?} is longer than {PIECE_MAX_CHARS} characters \
                     and contains no space in its first {PIECE_MAX_CHARS} characters"
                ),
                Some(at) => {
                    let head: String = rest[..at].iter().collect();
                    pieces.push(head.trim().to_string());
                    rest.drain(..=at);
                }
            }
        }
        let tail: String = rest.iter().collect();
        let tail = tail.trim();
        if !tail.is_empty() {
            pieces.push(tail.to_string());
        }
    }

    Ok(pieces)
}

// ─────────────────────────────────────────────────────────────────────────────
// Backend
// ─────────────────────────────────────────────────────────────────────────────

pub struct ChunkedHttpBackend {
    client: reqwest::blocking::Client,
    endpoint: String,
    retry: RetryPolicy,
    clock: Arc<dyn Clock>,
}

impl ChunkedHttpBackend {
    pub fn new(
        endpoint: impl Into<String>,
        retry: RetryPolicy,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ReaderError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|err| ReaderError::config_with("cannot build HTTP client", err))?;
        Ok(Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            retry,
            clock,
        })
    }

    fn speak_piece(&self, lang: Language, text: &str) -> anyhow::Result<Vec<u8>> {
        let response = self
            .client
            .get(format!("{}/api/tts", self.endpoint))
            .query(&[("lang", lang_code(lang)), ("q", text)])
            .send()
            .context("tts request failed")?
            .error_for_status()
            .context("tts service rejected the request")?;
        let bytes = response.bytes().context("reading audio response failed")?;
        if bytes.is_empty() {
            anyhow::bail!("the tts service returned no audio");
        }
        Ok(bytes.to_vec())
    }
}

impl std::fmt::Debug for ChunkedHttpBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkedHttpBackend")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

impl SpeechBackend for ChunkedHttpBackend {
    fn name(&self) -> &'static str {
        "plain"
    }

    fn sync_limit(&self) -> usize {
        usize::MAX
    }

    fn encode(
        &self,
        fragment: &Fragment,
        default_lang: Language,
    ) -> Result<Payload, ReaderError> {
        Ok(Payload::Segments(split_segments(&fragment.body, default_lang)))
    }

    fn synthesize_now(&self, payload: &Payload, target: &Path) -> anyhow::Result<()> {
        let Payload::Segments(segments) = payload else {
            anyhow::bail!("plain backend requires a segment payload");
        };

        let mut audio: Vec<u8> = Vec::new();
        for (index, (lang, text)) in segments.iter().enumerate() {
            for piece in split_into_pieces(text)? {
                let label = format!("segment {} piece {piece:?}", index + 1);
                let bytes = self
                    .retry
                    .run(self.clock.as_ref(), &label, || self.speak_piece(*lang, &piece))?;
                audio.extend_from_slice(&bytes);
            }
        }
        if audio.is_empty() {
            anyhow::bail!("the fragment produced no narratable text");
        }
        write_audio(target, &audio)
    }

    fn schedule(&self, _payload: &Payload) -> anyhow::Result<String> {
        anyhow::bail!("asynchronous generation is not supported by the plain backend")
    }

    fn poll(&self, _task_id: &str) -> anyhow::Result<PollStatus> {
        anyhow::bail!("asynchronous generation is not supported by the plain backend")
    }

    fn fetch(&self, _location: &str, _target: &Path) -> anyhow::Result<()> {
        anyhow::bail!("asynchronous generation is not supported by the plain backend")
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
