//! ID3 tag writing for finished MP3s.
//!
//! Every generated file gets the album-level values from its book config
//! plus a per-fragment track number (the ordinal) and title (the fragment
//! key, underscores to spaces, Title Case). Tagging runs after the audio
//! is written and before the digest commit — a fragment whose tags failed
//! is regenerated next run.

use std::path::Path;

use id3::{Tag, TagLike, Version};

use crate::error::ReaderError;

/// Album-level tag values shared by every file of one book.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlbumTags {
    pub album: String,
    pub artist: String,
    pub album_artist: String,
    /// Recording date, `YYYY` or `YYYY-MM-DD`.
    pub date: String,
}

/// Write the full tag set to `path`.
pub fn write_tags(
    path: &Path,
    album: &AlbumTags,
    track: Option<u32>,
    title_key: &str,
) -> Result<(), ReaderError> {
    let tagging_err = |source: Box<dyn std::error::Error + Send + Sync>| {
        ReaderError::Tagging { path: path.to_path_buf(), source }
    };

    let timestamp: id3::Timestamp = album.date.parse().map_err(|err| {
        tagging_err(format!("AlbumDate {:?} is not a valid date: {err}", album.date).into())
    })?;

    let mut tag = Tag::new();
    tag.set_album(&album.album);
    tag.set_artist(&album.artist);
    tag.set_album_artist(&album.album_artist);
    tag.set_date_recorded(timestamp);
    tag.set_title(title_case(title_key));
    if let Some(track) = track {
        tag.set_track(track);
    }
    tag.write_to_path(path, Version::Id3v24).map_err(|err| tagging_err(err.into()))
}

/// `the_first_chapter` → `The First Chapter`.
pub fn title_case(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    let mut start_of_word = true;
    for c in key.chars() {
        if c == '_' || c.is_whitespace() {
            out.push(' ');
            start_of_word = true;
        } else if start_of_word {
            out.extend(c.to_uppercase());
            start_of_word = false;
        } else {
            out.extend(c.to_lowercase());
        }
    }
    out
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
