//! Content digest store — the memory that makes regeneration incremental.
//!
//! Maps fragment keys to SHA-256 digests of their raw block text. On every
//! run a fragment is regenerated only when its current digest differs from
//! the stored one (or the key is new). Digests are committed one fragment
//! at a time, *after* that fragment's audio has been fully written and
//! tagged, and the table is persisted to disk on every commit — a crash
//! between fragments never loses earlier commits.
//!
//! On-disk format is a YAML mapping, one `key: hexdigest` line per entry.
//! A missing file is a first run (empty table); an existing file that fails
//! to parse is fatal for its book — silently discarding digests would mass-
//! regenerate or, worse, mask real changes.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::error::ReaderError;

/// Digest of a fragment's raw block.
///
/// SHA-256 over the UTF-8 bytes, lowercase hex. The byte encoding is part
/// of the contract: digests computed under a different encoding are not
/// comparable and will simply trigger one full regeneration.
pub fn content_digest(raw: &str) -> String {
    format!("{:x}", Sha256::digest(raw.as_bytes()))
}

/// Persistent `fragment_key → digest` table for one book.
#[derive(Debug)]
pub struct DigestStore {
    path: PathBuf,
    table: BTreeMap<String, String>,
}

impl DigestStore {
    /// Load the table from `path`. Missing or empty file → empty table;
    /// unparseable file → [`ReaderError::DigestStoreCorrupt`].
    pub fn load(path: &Path) -> Result<Self, ReaderError> {
        let table = match std::fs::read_to_string(path) {
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(err) => {
                return Err(ReaderError::io(
                    format!("cannot read digest store {}", path.display()),
                    err,
                ));
            }
            Ok(text) if text.trim().is_empty() => BTreeMap::new(),
            Ok(text) => serde_yaml::from_str(&text).map_err(|err| {
                ReaderError::DigestStoreCorrupt { path: path.to_path_buf(), source: err.into() }
            })?,
        };
        Ok(Self { path: path.to_path_buf(), table })
    }

    /// True when `key` is absent or stored with a different digest.
    /// Exact string equality only.
    pub fn needs_regeneration(&self, key: &str, digest: &str) -> bool {
        self.table.get(key).map(|stored| stored != digest).unwrap_or(true)
    }

    /// Update the in-memory table only.
    pub fn commit(&mut self, key: &str, digest: &str) {
        self.table.insert(key.to_string(), digest.to_string());
    }

    /// Write the whole table to disk.
    ///
    /// Writes into a temp file next to the target and renames it into
    /// place, so a failed write never leaves a truncated store behind.
    pub fn persist(&self) -> Result<(), ReaderError> {
        let text = serde_yaml::to_string(&self.table).map_err(|err| {
            ReaderError::io(
                format!("cannot serialize digest store {}", self.path.display()),
                std::io::Error::new(std::io::ErrorKind::InvalidData, err),
            )
        })?;

        let dir = self.path.parent().filter(|p| !p.as_os_str().is_empty());
        if let Some(dir) = dir {
            std::fs::create_dir_all(dir).map_err(|err| {
                ReaderError::io(format!("cannot create directory {}", dir.display()), err)
            })?;
        }

        let context = |what: &str| format!("cannot {what} digest store {}", self.path.display());
        let mut tmp = tempfile::NamedTempFile::new_in(dir.unwrap_or(Path::new(".")))
            .map_err(|err| ReaderError::io(context("stage"), err))?;
        tmp.write_all(text.as_bytes())
            .map_err(|err| ReaderError::io(context("write"), err))?;
        tmp.persist(&self.path)
            .map_err(|err| ReaderError::io(context("replace"), err.error))?;
        Ok(())
    }

    /// Commit one entry and persist immediately.
    pub fn record(&mut self, key: &str, digest: &str) -> Result<(), ReaderError> {
        self.commit(key, digest);
        self.persist()
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.table.contains_key(key)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
