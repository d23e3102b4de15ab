//! Language tokens recognized in book markup.
//!
//! A book fragment switches narration language mid-text with `@TOKEN … @`
//! sections, and every book declares a default language in its config. The
//! token set here is fixed; the per-backend voice and locale tables live
//! next to the backend that owns them ([`crate::ssml`], [`crate::chunked`]),
//! so adding a language is a table edit, never an algorithm change.

use crate::error::ReaderError;

/// One recognized narration language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    Pl,
    Eng,
    Us,
    Ger,
    Fr,
    Es,
    It,
}

impl Language {
    /// Every recognized language, in the order tokens are matched.
    pub const ALL: [Language; 7] = [
        Language::Pl,
        Language::Eng,
        Language::Us,
        Language::Ger,
        Language::Fr,
        Language::Es,
        Language::It,
    ];

    /// The marker token as written in book text (always uppercase).
    pub fn token(self) -> &'static str {
        match self {
            Language::Pl => "PL",
            Language::Eng => "ENG",
            Language::Us => "US",
            Language::Ger => "GER",
            Language::Fr => "FR",
            Language::Es => "ES",
            Language::It => "IT",
        }
    }

    /// Parse a token, case-insensitively. Unknown tokens are rejected.
    pub fn from_token(token: &str) -> Result<Self, ReaderError> {
        let upper = token.trim().to_ascii_uppercase();
        Self::ALL
            .into_iter()
            .find(|lang| lang.token() == upper)
            .ok_or(ReaderError::UnsupportedLanguage { token: token.trim().to_string() })
    }

    /// Space-separated token list, e.g. for CLI usage text.
    pub fn supported_tokens() -> String {
        Self::ALL.map(Language::token).join(" ")
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.token())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_round_trip() {
        for lang in Language::ALL {
            assert_eq!(Language::from_token(lang.token()).unwrap(), lang);
        }
    }

    #[test]
    fn test_from_token_is_case_insensitive() {
        assert_eq!(Language::from_token("pl").unwrap(), Language::Pl);
        assert_eq!(Language::from_token(" eng ").unwrap(), Language::Eng);
    }

    #[test]
    fn test_unknown_token_is_rejected() {
        let err = Language::from_token("KLINGON").unwrap_err();
        assert!(matches!(err, ReaderError::UnsupportedLanguage { token } if token == "KLINGON"));
    }

    #[test]
    fn test_supported_tokens_listing() {
        assert_eq!(Language::supported_tokens(), "PL ENG US GER FR ES IT");
    }
}
