//! Application-level configuration loading, including the Wordle dictionary.

use std::{collections::HashSet, env, fs, io::ErrorKind, path::PathBuf};

use tracing::{info, warn};

/// Default location on disk where the server looks for the word list.
const DEFAULT_WORDS_PATH: &str = "config/5-letter-words.txt";
/// Environment variable that overrides [`DEFAULT_WORDS_PATH`].
const WORDS_PATH_ENV: &str = "PAIRLINK_WORDS_PATH";

/// Baked-in dictionary used when no word list file can be read. Deliberately
/// small; deployments ship a full list file.
const DEFAULT_WORDS: &str = include_str!("default_words.txt");

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    words: HashSet<String>,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to the
    /// baked-in word list.
    pub fn load() -> Self {
        let path = resolve_words_path();
        match fs::read_to_string(&path) {
            Ok(contents) => {
                let config = Self::from_word_list(&contents);
                info!(
                    path = %path.display(),
                    count = config.words.len(),
                    "loaded word dictionary"
                );
                config
            }
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "word list not found; using built-in dictionary"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read word list; falling back to built-in dictionary"
                );
                Self::default()
            }
        }
    }

    /// Build a dictionary from newline-separated words, keeping only
    /// five-letter entries.
    pub fn from_word_list(contents: &str) -> Self {
        let words = contents
            .lines()
            .map(|word| word.trim().to_lowercase())
            .filter(|word| word.len() == 5)
            .collect();
        Self { words }
    }

    /// Whether `word` is a valid five-letter dictionary word. Input is
    /// trimmed and lowercased before the lookup.
    pub fn is_valid_word(&self, word: &str) -> bool {
        let normalized = word.trim().to_lowercase();
        normalized.len() == 5 && self.words.contains(&normalized)
    }

    /// Number of words in the dictionary.
    pub fn word_count(&self) -> usize {
        self.words.len()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::from_word_list(DEFAULT_WORDS)
    }
}

/// Resolve the word list path taking the environment override into account.
fn resolve_words_path() -> PathBuf {
    env::var_os(WORDS_PATH_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_WORDS_PATH))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filters_non_five_letter_entries() {
        let config = AppConfig::from_word_list("crane\ncat\nplanet\nloyal\n");
        assert_eq!(config.word_count(), 2);
        assert!(config.is_valid_word("crane"));
        assert!(!config.is_valid_word("cat"));
    }

    #[test]
    fn lookup_normalizes_case_and_whitespace() {
        let config = AppConfig::from_word_list("alloy\n");
        assert!(config.is_valid_word(" ALLOY "));
        assert!(!config.is_valid_word("aloys"));
    }

    #[test]
    fn default_dictionary_contains_common_words() {
        let config = AppConfig::default();
        assert!(config.is_valid_word("crane"));
        assert!(config.is_valid_word("alloy"));
        assert!(config.is_valid_word("loyal"));
    }
}
