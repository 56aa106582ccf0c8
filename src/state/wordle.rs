//! Authoritative word-guessing state machine with duplicate-letter-aware
//! scoring.

use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::state::channels::couple_key;

/// Number of letters in every secret word and guess.
pub const WORD_LENGTH: usize = 5;
/// Guesses allowed before the game is lost.
pub const MAX_ATTEMPTS: usize = 6;

/// Per-letter feedback for one guess position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum LetterScore {
    /// Right letter in the right position.
    Correct,
    /// Letter occurs elsewhere in the secret word.
    Present,
    /// Letter does not occur (or its occurrences are all claimed).
    Absent,
}

/// Feedback for a single guess cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct LetterResult {
    /// The guessed letter.
    pub letter: char,
    /// How the letter scored against the secret word.
    pub score: LetterScore,
}

/// One scored guess.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuessRecord {
    /// The normalized guessed word.
    pub word: String,
    /// Per-position feedback, always [`WORD_LENGTH`] entries.
    pub result: Vec<LetterResult>,
    /// When the guess was accepted.
    pub at: SystemTime,
}

/// Lifecycle status of a Wordle game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum WordleStatus {
    /// Created, no guess yet.
    Pending,
    /// At least one guess made.
    InProgress,
    /// The guesser found the word.
    Won,
    /// Attempts exhausted without a match.
    Lost,
}

impl WordleStatus {
    /// Whether no further guesses are accepted.
    pub fn is_terminal(self) -> bool {
        matches!(self, WordleStatus::Won | WordleStatus::Lost)
    }
}

/// A guess rejected by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GuessError {
    /// The game already reached a terminal status.
    #[error("game is already complete")]
    TerminalState,
    /// Only the challenged partner may guess.
    #[error("only the challenged partner can guess")]
    NotTheGuesser,
    /// The guess is not five letters long.
    #[error("guess must be exactly 5 letters")]
    WrongLength,
    /// No attempts remain.
    #[error("maximum attempts reached")]
    AttemptsExhausted,
}

/// Outcome of an accepted guess.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuessOutcome {
    /// Feedback for the accepted guess.
    pub result: Vec<LetterResult>,
    /// Whether the guess matched the secret word.
    pub is_correct: bool,
    /// Whether the game reached a terminal status with this guess.
    pub game_complete: bool,
    /// Attempts still available after this guess.
    pub attempts_remaining: usize,
}

/// Authoritative state of one Wordle game: the creator sets the secret word,
/// the partner guesses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WordleGame {
    /// Unique game id.
    pub id: Uuid,
    /// Sorted-pair key identifying the couple.
    pub couple_key: String,
    /// User who set the secret word.
    pub creator_id: Uuid,
    /// The designated guesser.
    pub partner_id: Uuid,
    /// Lowercased five-letter secret. Never serialized onto the wire for the
    /// guesser while the game is live; see the view layer.
    pub secret_word: String,
    /// Lifecycle status.
    pub status: WordleStatus,
    /// Scored guesses in order, at most [`MAX_ATTEMPTS`].
    pub guesses: Vec<GuessRecord>,
    /// Attempt ceiling, fixed at [`MAX_ATTEMPTS`].
    pub max_attempts: usize,
    /// The guesser's id once the game is won.
    pub winner_id: Option<Uuid>,
    /// Creation time.
    pub created_at: SystemTime,
    /// Set when the game reaches a terminal status.
    pub completed_at: Option<SystemTime>,
}

impl WordleGame {
    /// Start a new game. The secret word must already be validated against
    /// the dictionary by the caller; this only normalizes it.
    pub fn new(creator_id: Uuid, partner_id: Uuid, secret_word: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            couple_key: couple_key(creator_id, partner_id),
            creator_id,
            partner_id,
            secret_word: secret_word.trim().to_lowercase(),
            status: WordleStatus::Pending,
            guesses: Vec::new(),
            max_attempts: MAX_ATTEMPTS,
            winner_id: None,
            created_at: SystemTime::now(),
            completed_at: None,
        }
    }

    /// Whether `user_id` is one of the two players.
    pub fn is_player(&self, user_id: Uuid) -> bool {
        self.creator_id == user_id || self.partner_id == user_id
    }

    /// Whether the secret word may be shown to `user_id` right now: always
    /// for the creator, only post-game for the guesser.
    pub fn secret_visible_to(&self, user_id: Uuid) -> bool {
        self.creator_id == user_id || self.status.is_terminal()
    }

    /// Validate and apply a guess by `acting_user_id`.
    ///
    /// A dictionary check is the caller's responsibility (the engine has no
    /// dictionary); everything else is enforced here. A rejected guess
    /// leaves the game untouched.
    pub fn submit_guess(
        &mut self,
        acting_user_id: Uuid,
        guess: &str,
    ) -> Result<GuessOutcome, GuessError> {
        if self.status.is_terminal() {
            return Err(GuessError::TerminalState);
        }
        if acting_user_id != self.partner_id {
            return Err(GuessError::NotTheGuesser);
        }
        let normalized = guess.trim().to_lowercase();
        if normalized.chars().count() != WORD_LENGTH {
            return Err(GuessError::WrongLength);
        }
        if self.guesses.len() >= self.max_attempts {
            return Err(GuessError::AttemptsExhausted);
        }

        let result = score_guess(&normalized, &self.secret_word);
        let is_correct = normalized == self.secret_word;

        self.guesses.push(GuessRecord {
            word: normalized,
            result: result.clone(),
            at: SystemTime::now(),
        });

        if self.status == WordleStatus::Pending {
            self.status = WordleStatus::InProgress;
        }

        let game_complete = if is_correct {
            self.status = WordleStatus::Won;
            self.winner_id = Some(self.partner_id);
            self.completed_at = Some(SystemTime::now());
            true
        } else if self.guesses.len() >= self.max_attempts {
            self.status = WordleStatus::Lost;
            self.completed_at = Some(SystemTime::now());
            true
        } else {
            false
        };

        Ok(GuessOutcome {
            result,
            is_correct,
            game_complete,
            attempts_remaining: self.max_attempts - self.guesses.len(),
        })
    }
}

/// Score a guess against the secret word with standard Wordle semantics.
///
/// Two passes over a per-letter count of the secret: pass one claims exact
/// position matches, pass two hands out `Present` only while a letter still
/// has unclaimed occurrences. This keeps repeated letters from being counted
/// twice against a single secret letter.
pub fn score_guess(guess: &str, secret: &str) -> Vec<LetterResult> {
    let guess_letters: Vec<char> = guess.chars().collect();
    let secret_letters: Vec<char> = secret.chars().collect();

    let mut remaining: std::collections::HashMap<char, usize> = std::collections::HashMap::new();
    for &letter in &secret_letters {
        *remaining.entry(letter).or_insert(0) += 1;
    }

    let mut scores: Vec<Option<LetterScore>> = vec![None; guess_letters.len()];
    for (i, &letter) in guess_letters.iter().enumerate() {
        if secret_letters.get(i) == Some(&letter) {
            scores[i] = Some(LetterScore::Correct);
            if let Some(count) = remaining.get_mut(&letter) {
                *count -= 1;
            }
        }
    }

    for (i, &letter) in guess_letters.iter().enumerate() {
        if scores[i].is_some() {
            continue;
        }
        scores[i] = Some(match remaining.get_mut(&letter) {
            Some(count) if *count > 0 => {
                *count -= 1;
                LetterScore::Present
            }
            _ => LetterScore::Absent,
        });
    }

    guess_letters
        .into_iter()
        .zip(scores)
        .map(|(letter, score)| LetterResult {
            letter,
            score: score.unwrap_or(LetterScore::Absent),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scores(guess: &str, secret: &str) -> Vec<LetterScore> {
        score_guess(guess, secret)
            .into_iter()
            .map(|cell| cell.score)
            .collect()
    }

    #[test]
    fn exact_match_is_all_correct() {
        assert_eq!(scores("crane", "crane"), vec![LetterScore::Correct; 5]);
    }

    #[test]
    fn disjoint_letters_are_all_absent() {
        assert_eq!(scores("crane", "odium"), vec![LetterScore::Absent; 5]);
    }

    #[test]
    fn repeated_letters_are_not_double_counted() {
        // Secret LOYAL has two Ls. Guess ALLOY: A present, first L present,
        // second L present (both Ls claim one secret L each), O present,
        // Y present. Nothing lines up positionally.
        use LetterScore::*;
        assert_eq!(scores("alloy", "loyal"), vec![Present; 5]);

        // Secret ROBIN has one O. Guess OOZES: positional O at index 1 wins
        // the single O; the leading O must come up absent.
        assert_eq!(scores("oozes", "robin"), vec![Absent, Correct, Absent, Absent, Absent]);
    }

    #[test]
    fn correct_position_claims_letter_before_present() {
        use LetterScore::*;
        // Secret ABBEY: guess BABES -> B present, A present, B correct,
        // E correct, S absent.
        assert_eq!(scores("babes", "abbey"), vec![Present, Present, Correct, Correct, Absent]);
    }

    fn game() -> (WordleGame, Uuid, Uuid) {
        let creator = Uuid::new_v4();
        let partner = Uuid::new_v4();
        (WordleGame::new(creator, partner, "loyal"), creator, partner)
    }

    #[test]
    fn creator_cannot_guess() {
        let (mut game, creator, _) = game();
        assert_eq!(
            game.submit_guess(creator, "crane"),
            Err(GuessError::NotTheGuesser)
        );
    }

    #[test]
    fn wrong_length_guess_rejected_without_mutation() {
        let (mut game, _, partner) = game();
        assert_eq!(
            game.submit_guess(partner, "lion"),
            Err(GuessError::WrongLength)
        );
        assert!(game.guesses.is_empty());
        assert_eq!(game.status, WordleStatus::Pending);
    }

    #[test]
    fn correct_guess_wins_and_locks_the_game() {
        let (mut game, _, partner) = game();
        let outcome = game.submit_guess(partner, "LOYAL ").unwrap();

        assert!(outcome.is_correct);
        assert!(outcome.game_complete);
        assert_eq!(game.status, WordleStatus::Won);
        assert_eq!(game.winner_id, Some(partner));
        assert!(game.completed_at.is_some());

        assert_eq!(
            game.submit_guess(partner, "crane"),
            Err(GuessError::TerminalState)
        );
    }

    #[test]
    fn six_misses_lose_the_game() {
        let (mut game, _, partner) = game();
        for attempt in 0..MAX_ATTEMPTS {
            let outcome = game.submit_guess(partner, "crane").unwrap();
            assert!(!outcome.is_correct);
            assert_eq!(outcome.attempts_remaining, MAX_ATTEMPTS - attempt - 1);
        }

        assert_eq!(game.status, WordleStatus::Lost);
        assert_eq!(game.winner_id, None);
        assert_eq!(
            game.submit_guess(partner, "crane"),
            Err(GuessError::TerminalState)
        );
    }

    #[test]
    fn first_guess_moves_pending_to_in_progress() {
        let (mut game, _, partner) = game();
        game.submit_guess(partner, "crane").unwrap();
        assert_eq!(game.status, WordleStatus::InProgress);
        assert_eq!(game.guesses.len(), 1);
    }

    #[test]
    fn secret_visibility_follows_role_and_status() {
        let (mut game, creator, partner) = game();
        assert!(game.secret_visible_to(creator));
        assert!(!game.secret_visible_to(partner));

        game.submit_guess(partner, "loyal").unwrap();
        assert!(game.secret_visible_to(partner));
    }
}
