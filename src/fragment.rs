//! Book-text fragment parser.
//!
//! A book file is one UTF-8 document carrying every audio-file-to-be as a
//! fragment block:
//!
//! ```text
//! 001-intro.mp3@Welcome text with an embedded @PL przełącznik@ inside@@
//! 002-outro.mp3@Closing words@@
//! ```
//!
//! Blocks are separated by `@@`. Inside a block the first `@` separates the
//! declared file name from the narration body; the name itself is
//! `{ordinal}-{name}.{ext}` and `{name}` is the stable key used for digest
//! lookups. Parsing is a pure, lazy iterator: no I/O, restartable, yields
//! fragments in document order.
//!
//! Tolerated noise (silently skipped, per the source-document conventions):
//! blocks without a name/body delimiter and blocks with an empty body —
//! both show up routinely as trailing separators or stray whitespace.
//! A block that *has* a body but whose name lacks the ordinal/extension
//! structure is a caller error, yielded as `Err`.

use crate::error::ReaderError;

/// Separates fragment blocks in the source document.
pub const BLOCK_SEPARATOR: &str = "@@";

/// Separates the declared file name from the narration body (first hit only).
pub const NAME_BODY_DELIMITER: char = '@';

/// Separates the ordinal prefix from the file name proper.
pub const NAME_FIELD_SEPARATOR: char = '-';

/// One addressable piece of a book, destined for one audio file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    /// Ordering prefix exactly as written, e.g. `001`. All digits; becomes
    /// the ID3 track number.
    pub ordinal: String,
    /// Declared output file name as written, e.g. `001-intro.mp3`.
    pub file_name: String,
    /// Digest key: the name without ordinal and extension, e.g. `intro`.
    /// Must be unique within one document.
    pub key: String,
    /// Narration body — everything after the first `@`, may contain
    /// embedded language markers.
    pub body: String,
    /// The whole raw block, name included. This is the digest input, so a
    /// renamed fragment also counts as changed.
    pub raw: String,
}

/// Replace every newline with two spaces.
///
/// Line-wrap differences in the source text must not change fragment
/// digests, so normalization happens once per document, before splitting.
pub fn normalize_source(text: &str) -> String {
    text.replace("\r\n", "  ").replace(['\n', '\r'], "  ")
}

/// Lazily parse a normalized document into fragments, in document order.
pub fn fragments(normalized: &str) -> impl Iterator<Item = Result<Fragment, ReaderError>> + '_ {
    normalized.split(BLOCK_SEPARATOR).filter_map(parse_block)
}

/// `None` for tolerated noise, `Some(Err)` for a malformed declared name.
fn parse_block(block: &str) -> Option<Result<Fragment, ReaderError>> {
    let (name, body) = block.split_once(NAME_BODY_DELIMITER)?;
    if body.is_empty() {
        return None;
    }
    Some(parse_named(name, body, block))
}

fn parse_named(name: &str, body: &str, raw: &str) -> Result<Fragment, ReaderError> {
    let malformed = || ReaderError::MalformedFragmentName { name: name.to_string() };

    let (ordinal, rest) = name.split_once(NAME_FIELD_SEPARATOR).ok_or_else(malformed)?;
    let (key, ext) = rest.split_once('.').ok_or_else(malformed)?;
    if ordinal.is_empty()
        || !ordinal.chars().all(|c| c.is_ascii_digit())
        || key.is_empty()
        || ext.is_empty()
    {
        return Err(malformed());
    }

    Ok(Fragment {
        ordinal: ordinal.to_string(),
        file_name: name.to_string(),
        key: key.to_string(),
        body: body.to_string(),
        raw: raw.to_string(),
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
