//! Error taxonomy for the narration pipeline.
//!
//! Variants map 1:1 onto failure scopes:
//!
//! | scope            | variants                                              |
//! |------------------|-------------------------------------------------------|
//! | whole run        | [`Config`], [`UnknownJobStatus`]                      |
//! | one book         | [`DigestStoreCorrupt`]                                |
//! | one fragment     | [`MalformedFragmentName`], [`DuplicateFragmentKey`], [`MarkupSyntax`], [`UnsupportedLanguage`], [`Synthesis`], [`Tagging`] |
//!
//! Fragment-scoped errors are caught at the book orchestrator, logged with
//! the fragment identity, and flagged on the book; they never abort sibling
//! fragments or sibling books. The CLI prints every recognized variant as a
//! two-part message: what failed, then the underlying cause chain.
//!
//! [`Config`]: ReaderError::Config
//! [`UnknownJobStatus`]: ReaderError::UnknownJobStatus
//! [`DigestStoreCorrupt`]: ReaderError::DigestStoreCorrupt
//! [`MalformedFragmentName`]: ReaderError::MalformedFragmentName
//! [`DuplicateFragmentKey`]: ReaderError::DuplicateFragmentKey
//! [`MarkupSyntax`]: ReaderError::MarkupSyntax
//! [`UnsupportedLanguage`]: ReaderError::UnsupportedLanguage
//! [`Synthesis`]: ReaderError::Synthesis
//! [`Tagging`]: ReaderError::Tagging

use std::path::PathBuf;

use thiserror::Error;

/// Boxed cause attached to variants that wrap a lower-level failure.
pub type Cause = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum ReaderError {
    /// Bad or missing settings. Aborts the whole run.
    #[error("configuration error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Cause>,
    },

    /// Declared fragment name does not follow `{ordinal}-{name}.{ext}`.
    #[error("fragment name {name:?} does not match '{{ordinal}}-{{name}}.{{ext}}'")]
    MalformedFragmentName { name: String },

    /// Two fragments in one book resolved to the same digest key.
    #[error("duplicate fragment key {key:?} in book text")]
    DuplicateFragmentKey { key: String },

    /// Unbalanced or unconsumed `@` markers in a fragment body.
    #[error("markup syntax error in text for file {file}: {detail}")]
    MarkupSyntax { file: String, detail: String },

    /// A language token outside the supported set.
    #[error("unsupported language token {token:?}")]
    UnsupportedLanguage { token: String },

    /// The speech backend failed while generating one fragment's audio.
    #[error("speech synthesis failed for file {file}")]
    Synthesis {
        file: String,
        #[source]
        source: Cause,
    },

    /// The digest store exists but cannot be parsed. Fatal for its book:
    /// proceeding would either regenerate everything or lose committed
    /// digests.
    #[error("digest store {} is corrupt, refusing to continue", path.display())]
    DigestStoreCorrupt {
        path: PathBuf,
        #[source]
        source: Cause,
    },

    /// The backend reported a job status outside its documented set.
    #[error("backend returned unknown job status {status:?} for file {file}")]
    UnknownJobStatus { file: String, status: String },

    /// Writing ID3 tags to a finished file failed.
    #[error("updating ID3 tags for file {} failed", path.display())]
    Tagging {
        path: PathBuf,
        #[source]
        source: Cause,
    },

    /// Filesystem failure outside the cases above.
    #[error("{context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl ReaderError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config { message: message.into(), source: None }
    }

    pub fn config_with(message: impl Into<String>, source: impl Into<Cause>) -> Self {
        Self::Config { message: message.into(), source: Some(source.into()) }
    }

    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io { context: context.into(), source }
    }

    pub fn synthesis(file: impl Into<String>, source: anyhow::Error) -> Self {
        Self::Synthesis { file: file.into(), source: source.into() }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
