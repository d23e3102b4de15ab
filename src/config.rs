//! YAML configuration: one global run file plus one file per book.
//!
//! ```yaml
//! # run.yaml
//! reading_engine: ssml        # or: plain
//! endpoint: https://speech.example.com
//! api_key: s3cret             # or env BOOKVOX_API_KEY
//! bucket: my-audio-drop       # optional, forwarded on task scheduling
//! max_sync: 2800              # ssml only, ≤ 3000
//! check_delay: 10             # seconds between poll rounds
//! audiobooks:
//!   - books/tale.yaml
//! ```
//!
//! ```yaml
//! # books/tale.yaml — key names are part of the on-disk contract
//! BookFile: books/tale.book
//! HashFile: books/tale.hsh
//! ResultDir: out/tale
//! MainLanguage: PL
//! Album: A Tale
//! Artist: Jacek
//! AlbumArtist: The Author
//! AlbumDate: "2021"
//! ```
//!
//! All values are explicit constructor inputs downstream — no global
//! mutable state anywhere.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;

use crate::backend::SpeechBackend;
use crate::chunked::ChunkedHttpBackend;
use crate::clock::Clock;
use crate::error::ReaderError;
use crate::language::Language;
use crate::retry::RetryPolicy;
use crate::ssml::SsmlHttpBackend;
use crate::tags::AlbumTags;

/// Env var consulted when the config file carries no `api_key`.
pub const API_KEY_ENV: &str = "BOOKVOX_API_KEY";

fn default_max_sync() -> usize {
    3000
}

fn default_check_delay() -> u64 {
    10
}

/// Which synthesis backend a run uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadingEngine {
    Ssml,
    Plain,
}

/// The whole-run configuration.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GlobalConfig {
    pub reading_engine: ReadingEngine,
    pub endpoint: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub bucket: Option<String>,
    #[serde(default = "default_max_sync")]
    pub max_sync: usize,
    #[serde(default = "default_check_delay")]
    pub check_delay: u64,
    pub audiobooks: Vec<PathBuf>,
}

impl GlobalConfig {
    pub fn load(path: &Path) -> Result<Self, ReaderError> {
        let text = std::fs::read_to_string(path).map_err(|err| {
            ReaderError::config_with(
                format!("not able to open config file {}", path.display()),
                err,
            )
        })?;
        serde_yaml::from_str(&text).map_err(|err| {
            ReaderError::config_with(
                format!("not able to correctly parse config file {}", path.display()),
                err,
            )
        })
    }

    /// Config value first, then the environment.
    fn resolve_api_key(&self) -> Result<String, ReaderError> {
        self.api_key
            .clone()
            .or_else(|| std::env::var(API_KEY_ENV).ok())
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                ReaderError::config(format!(
                    "the ssml engine needs an api_key (config) or {API_KEY_ENV} (environment)"
                ))
            })
    }

    /// Build the configured backend. Selection happens exactly once here;
    /// nothing downstream branches on engine identity again.
    pub fn build_backend(
        &self,
        clock: Arc<dyn Clock>,
    ) -> Result<Box<dyn SpeechBackend>, ReaderError> {
        Ok(match self.reading_engine {
            ReadingEngine::Ssml => Box::new(SsmlHttpBackend::new(
                self.endpoint.clone(),
                self.resolve_api_key()?,
                self.bucket.clone(),
                self.max_sync,
            )?),
            ReadingEngine::Plain => Box::new(ChunkedHttpBackend::new(
                self.endpoint.clone(),
                RetryPolicy::default(),
                clock,
            )?),
        })
    }
}

/// One book's configuration. The PascalCase key names are the on-disk
/// contract carried over from existing book files.
#[derive(Debug, Clone, Deserialize)]
pub struct BookConfig {
    #[serde(rename = "BookFile")]
    pub book_file: PathBuf,
    #[serde(rename = "HashFile")]
    pub hash_file: PathBuf,
    #[serde(rename = "ResultDir")]
    pub result_dir: PathBuf,
    #[serde(rename = "MainLanguage")]
    pub main_language: String,
    #[serde(rename = "Album")]
    pub album: String,
    #[serde(rename = "Artist")]
    pub artist: String,
    #[serde(rename = "AlbumArtist")]
    pub album_artist: String,
    #[serde(rename = "AlbumDate")]
    pub album_date: String,
}

impl BookConfig {
    pub fn load(path: &Path) -> Result<Self, ReaderError> {
        let text = std::fs::read_to_string(path).map_err(|err| {
            ReaderError::config_with(
                format!("not able to open book config {}", path.display()),
                err,
            )
        })?;
        serde_yaml::from_str(&text).map_err(|err| {
            ReaderError::config_with(
                format!("not able to correctly parse book config {}", path.display()),
                err,
            )
        })
    }

    pub fn default_language(&self) -> Result<Language, ReaderError> {
        Language::from_token(&self.main_language)
    }

    pub fn album_tags(&self) -> AlbumTags {
        AlbumTags {
            album: self.album.clone(),
            artist: self.artist.clone(),
            album_artist: self.album_artist.clone(),
            date: self.album_date.clone(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
