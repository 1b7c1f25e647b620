use std::collections::BTreeSet;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Scripts the counter knows how to tokenize. Character-counting scripts
/// treat every matching character as a word of its own, the rest count
/// maximal letter/digit runs.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Latin,
    Cyrillic,
    Greek,
    Korean,
    Arabic,
    Hebrew,
    Devanagari,
    Cjk,
    Japanese,
}

impl Language {
    fn counts_characters(self) -> bool {
        matches!(self, Language::Cjk | Language::Japanese)
    }

    fn char_class(self) -> &'static str {
        match self {
            Language::Latin => r"\p{Latin}",
            Language::Cyrillic => r"\p{Cyrillic}",
            Language::Greek => r"\p{Greek}",
            Language::Korean => r"\p{Hangul}",
            Language::Arabic => r"\p{Arabic}",
            Language::Hebrew => r"\p{Hebrew}",
            Language::Devanagari => r"\p{Devanagari}",
            Language::Cjk => r"\p{Han}",
            Language::Japanese => r"\p{Hiragana}\p{Katakana}",
        }
    }

    pub fn default_set() -> BTreeSet<Language> {
        BTreeSet::from([Language::Latin])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Counts {
    pub words: i64,
    /// Code-unit length of the text (utf-16, the host editor's notion of
    /// length). No normalization.
    pub chars: i64,
}

/// Language-aware word counter. The matcher is assembled once per enabled
/// language set; counting itself is pure, so the same (text, languages)
/// always yields the same result.
pub struct WordCounter {
    matcher: Option<Regex>,
}

impl WordCounter {
    pub fn new(languages: &BTreeSet<Language>) -> Self {
        let matcher = match build_matcher(languages) {
            Ok(v) => v,
            Err(e) => {
                warn!("Failed to build word matcher for {languages:?}: {e}");
                None
            }
        };
        Self { matcher }
    }

    pub fn count(&self, text: &str) -> Counts {
        if text.trim().is_empty() {
            return Counts::default();
        }
        let chars = text.encode_utf16().count() as i64;
        let Some(matcher) = &self.matcher else {
            return Counts { words: 0, chars };
        };
        Counts {
            words: matcher.find_iter(text).count() as i64,
            chars,
        }
    }
}

fn build_matcher(languages: &BTreeSet<Language>) -> Result<Option<Regex>, regex::Error> {
    let char_counted: String = languages
        .iter()
        .filter(|l| l.counts_characters())
        .map(|l| l.char_class())
        .collect();
    let letters: String = languages
        .iter()
        .filter(|l| !l.counts_characters())
        .map(|l| l.char_class())
        .collect();

    let mut alternatives = vec![];
    if !char_counted.is_empty() {
        alternatives.push(format!("[{char_counted}]"));
    }
    // Standalone numbers with ./, as internal separators count as one word.
    alternatives.push(r"[0-9]+(?:[.,][0-9]+)*".to_string());
    if !letters.is_empty() {
        // A run of letters/digits, with internal -/_ joining further runs
        // into the same word.
        alternatives.push(format!("[{letters}0-9]+(?:[-_][{letters}0-9]+)*"));
    }

    if alternatives.is_empty() {
        return Ok(None);
    }
    Ok(Some(Regex::new(&alternatives.join("|"))?))
}
