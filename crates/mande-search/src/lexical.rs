//! Lexical relevance scoring.
//!
//! | Signal | Score |
//! |--------|-------|
//! | content contains the whole query | +0.8 |
//! | each whole-word occurrence of a query word | +0.1, capped at 0.3 |
//! | title contains the query | +0.4 |
//! | filename contains the query | +0.2 |
//!
//! All comparisons are case-insensitive.

use regex::Regex;
use serde::{Deserialize, Serialize};

use mande_core::defaults::{
    SCORE_CONTENT_PHRASE, SCORE_FILENAME, SCORE_TITLE, SCORE_WORD_CAP, SCORE_WORD_HIT,
};

/// How the word-match cap applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WordCapMode {
    /// Each query word contributes at most the cap; contributions are summed.
    #[default]
    PerWord,
    /// The summed contribution of all query words is capped once.
    Total,
}

/// Fields of a candidate that lexical scoring looks at.
#[derive(Debug, Clone, Copy)]
pub struct Candidate<'a> {
    pub content: &'a str,
    pub title: &'a str,
    /// Filename for knowledge items, URL for scraped entries.
    pub filename: Option<&'a str>,
}

/// A query compiled for repeated scoring.
#[derive(Debug, Clone)]
pub struct PreparedQuery {
    phrase: String,
    words: Vec<Regex>,
    cap_mode: WordCapMode,
}

impl PreparedQuery {
    /// Compile `query`. Returns `None` when it has no searchable text.
    pub fn new(query: &str, cap_mode: WordCapMode) -> Option<Self> {
        let phrase = query.trim().to_lowercase();
        if phrase.is_empty() {
            return None;
        }

        let mut seen: Vec<&str> = Vec::new();
        let mut words = Vec::new();
        for word in phrase.split_whitespace() {
            let word = word.trim_matches(|c: char| !c.is_alphanumeric());
            if word.is_empty() || seen.contains(&word) {
                continue;
            }
            seen.push(word);
            if let Ok(re) = Regex::new(&format!(r"\b{}\b", regex::escape(word))) {
                words.push(re);
            }
        }

        Some(Self {
            phrase,
            words,
            cap_mode,
        })
    }

    pub fn phrase(&self) -> &str {
        &self.phrase
    }

    /// Score one candidate.
    pub fn score(&self, candidate: Candidate<'_>) -> f32 {
        let content = candidate.content.to_lowercase();
        let mut score = 0.0;

        if content.contains(&self.phrase) {
            score += SCORE_CONTENT_PHRASE;
        }
        score += self.word_score(&content);

        if candidate.title.to_lowercase().contains(&self.phrase) {
            score += SCORE_TITLE;
        }
        if candidate
            .filename
            .is_some_and(|f| f.to_lowercase().contains(&self.phrase))
        {
            score += SCORE_FILENAME;
        }
        score
    }

    fn word_score(&self, content: &str) -> f32 {
        let per_word = self
            .words
            .iter()
            .map(|re| re.find_iter(content).count() as f32 * SCORE_WORD_HIT);

        match self.cap_mode {
            WordCapMode::PerWord => per_word.map(|s| s.min(SCORE_WORD_CAP)).sum(),
            WordCapMode::Total => per_word.sum::<f32>().min(SCORE_WORD_CAP),
        }
    }
}
