//! Inline-markup HTTP backend (`reading_engine: ssml`).
//!
//! Speaks a small JSON speech API with bearer-key auth:
//!
//! | call                                | request                         | response            |
//! |-------------------------------------|---------------------------------|---------------------|
//! | `POST {endpoint}/v1/speech`         | `{text, voice, format}`         | MP3 bytes           |
//! | `POST {endpoint}/v1/speech/tasks`   | `{text, voice, format, bucket}` | `{task_id}`         |
//! | `GET  {endpoint}/v1/speech/tasks/ID`| —                               | `{status, location, reason}` |
//! | `GET  {location}`                   | —                               | MP3 bytes           |
//!
//! Fragments are rewritten into an SSML document: each `@TOKEN` becomes
//! `<lang xml:lang="…">`, each closing `@` becomes `</lang>`, and the
//! whole body is wrapped in `<speak>…</speak>`. The immediate endpoint
//! caps the document at [`SYNC_LIMIT_CEILING`] characters; anything larger
//! goes through the task path.

use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::backend::{write_audio, Payload, PollStatus, SpeechBackend};
use crate::error::ReaderError;
use crate::fragment::Fragment;
use crate::language::Language;
use crate::markup::{render_inline, InlineSyntax};

/// Hard ceiling of the immediate synthesis endpoint, in characters.
/// `max_sync` may tighten it but never exceed it.
pub const SYNC_LIMIT_CEILING: usize = 3000;

const HTTP_TIMEOUT: Duration = Duration::from_secs(300);

// ─────────────────────────────────────────────────────────────────────────────
// Language tables (this backend's view of the fixed token set)
// ─────────────────────────────────────────────────────────────────────────────

/// SSML locale per language token.
fn locale(lang: Language) -> &'static str {
    match lang {
        Language::Pl => "pl-PL",
        Language::Eng => "en-GB",
        Language::Us => "en-US",
        Language::Ger => "de-DE",
        Language::Fr => "fr-FR",
        Language::Es => "es-ES",
        Language::It => "it-IT",
    }
}

/// Narration voice per language token.
pub fn voice(lang: Language) -> &'static str {
    match lang {
        Language::Pl => "Jacek",
        Language::Eng => "Brian",
        Language::Us => "Joey",
        Language::Ger => "Hans",
        Language::Fr => "Mathieu",
        Language::Es => "Miguel",
        Language::It => "Giorgio",
    }
}

const SSML_SYNTAX: InlineSyntax = InlineSyntax {
    open: |lang| format!(r#"<lang xml:lang="{}">"#, locale(lang)),
    close: "</lang>",
    envelope: |body| format!("<speak>{body}</speak>"),
};

// ─────────────────────────────────────────────────────────────────────────────
// Wire types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct SpeechRequest<'a> {
    text: &'a str,
    voice: &'a str,
    format: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    bucket: Option<&'a str>,
}

#[derive(Deserialize)]
struct TaskCreated {
    task_id: String,
}

#[derive(Deserialize)]
struct TaskState {
    status: String,
    #[serde(default)]
    location: Option<String>,
    #[serde(default)]
    reason: Option<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Backend
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct SsmlHttpBackend {
    client: reqwest::blocking::Client,
    endpoint: String,
    api_key: String,
    bucket: Option<String>,
    sync_limit: usize,
}

impl SsmlHttpBackend {
    /// `max_sync` is validated against [`SYNC_LIMIT_CEILING`].
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        bucket: Option<String>,
        max_sync: usize,
    ) -> Result<Self, ReaderError> {
        if max_sync > SYNC_LIMIT_CEILING {
            return Err(ReaderError::config(format!(
                "max_sync {max_sync} exceeds the {SYNC_LIMIT_CEILING}-character synchronous limit"
            )));
        }
        let client = reqwest::blocking::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|err| ReaderError::config_with("cannot build HTTP client", err))?;
        Ok(Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            bucket,
            sync_limit: max_sync,
        })
    }

    fn document<'a>(payload: &'a Payload) -> anyhow::Result<(&'a str, &'a str)> {
        match payload {
            Payload::Document { text, voice } => Ok((text.as_str(), *voice)),
            Payload::Segments(_) => {
                anyhow::bail!("ssml backend requires an inline-markup payload")
            }
        }
    }

    fn download(&self, url: &str) -> anyhow::Result<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .bearer_auth(&self.api_key)
            .send()
            .with_context(|| format!("request to {url} failed"))?
            .error_for_status()
            .context("speech service rejected the request")?;
        let bytes = response.bytes().context("reading audio response failed")?;
        if bytes.is_empty() {
            anyhow::bail!("the response contained no audio data");
        }
        Ok(bytes.to_vec())
    }
}

impl SpeechBackend for SsmlHttpBackend {
    fn name(&self) -> &'static str {
        "ssml"
    }

    fn sync_limit(&self) -> usize {
        self.sync_limit
    }

    fn encode(
        &self,
        fragment: &Fragment,
        default_lang: Language,
    ) -> Result<Payload, ReaderError> {
        let text = render_inline(&SSML_SYNTAX, &fragment.file_name, &fragment.body)?;
        Ok(Payload::Document { text, voice: voice(default_lang) })
    }

    fn synthesize_now(&self, payload: &Payload, target: &Path) -> anyhow::Result<()> {
        let (text, voice) = Self::document(payload)?;
        let response = self
            .client
            .post(format!("{}/v1/speech", self.endpoint))
            .bearer_auth(&self.api_key)
            .json(&SpeechRequest { text, voice, format: "mp3", bucket: None })
            .send()
            .context("speech request failed")?
            .error_for_status()
            .context("speech service rejected the request")?;
        let bytes = response.bytes().context("reading audio response failed")?;
        if bytes.is_empty() {
            anyhow::bail!("the response contained no audio data");
        }
        write_audio(target, &bytes)
    }

    fn schedule(&self, payload: &Payload) -> anyhow::Result<String> {
        let (text, voice) = Self::document(payload)?;
        let created: TaskCreated = self
            .client
            .post(format!("{}/v1/speech/tasks", self.endpoint))
            .bearer_auth(&self.api_key)
            .json(&SpeechRequest {
                text,
                voice,
                format: "mp3",
                bucket: self.bucket.as_deref(),
            })
            .send()
            .context("task request failed")?
            .error_for_status()
            .context("speech service rejected the task")?
            .json()
            .context("task response is not valid JSON")?;
        Ok(created.task_id)
    }

    fn poll(&self, task_id: &str) -> anyhow::Result<PollStatus> {
        let state: TaskState = self
            .client
            .get(format!("{}/v1/speech/tasks/{task_id}", self.endpoint))
            .bearer_auth(&self.api_key)
            .send()
            .with_context(|| format!("status request for task {task_id} failed"))?
            .error_for_status()
            .context("speech service rejected the status request")?
            .json()
            .context("status response is not valid JSON")?;

        Ok(match state.status.as_str() {
            "scheduled" | "inProgress" => PollStatus::InProgress,
            "completed" => {
                let location = state
                    .location
                    .context("completed task is missing its audio location")?;
                PollStatus::Completed { location }
            }
            "failed" => PollStatus::Failed {
                reason: state.reason.unwrap_or_else(|| "no reason given".to_string()),
            },
            _ => PollStatus::Unknown { status: state.status },
        })
    }

    fn fetch(&self, location: &str, target: &Path) -> anyhow::Result<()> {
        let bytes = self.download(location)?;
        write_audio(target, &bytes)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
