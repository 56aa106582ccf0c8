//! Authoritative TicTacToe state machine for a couple's turn-based game.

use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::state::channels::couple_key;

/// The eight winning lines on a 3x3 board: rows, columns, diagonals.
const WIN_LINES: [[usize; 3]; 8] = [
    [0, 1, 2],
    [3, 4, 5],
    [6, 7, 8],
    [0, 3, 6],
    [1, 4, 7],
    [2, 5, 8],
    [0, 4, 8],
    [2, 4, 6],
];

/// Marker symbol assigned to one side of the game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
pub enum Symbol {
    /// Crosses.
    X,
    /// Noughts.
    O,
}

impl Symbol {
    /// The complementary symbol.
    pub fn opposite(self) -> Self {
        match self {
            Symbol::X => Symbol::O,
            Symbol::O => Symbol::X,
        }
    }
}

/// Which side of the couple acts next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Turn {
    /// The user who created the game.
    Creator,
    /// The challenged partner.
    Partner,
}

impl Turn {
    /// The other side.
    pub fn flipped(self) -> Self {
        match self {
            Turn::Creator => Turn::Partner,
            Turn::Partner => Turn::Creator,
        }
    }
}

/// Lifecycle status of a TicTacToe game. Terminal statuses are immutable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TicTacToeStatus {
    /// Created but no move accepted yet.
    Pending,
    /// At least one move accepted, no result yet.
    InProgress,
    /// The creator completed a winning line.
    WonCreator,
    /// The partner completed a winning line.
    WonPartner,
    /// All nine cells filled without a winning line.
    Draw,
}

impl TicTacToeStatus {
    /// Whether no further moves are accepted.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TicTacToeStatus::WonCreator | TicTacToeStatus::WonPartner | TicTacToeStatus::Draw
        )
    }
}

/// One accepted move, kept for replay and auditing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoveRecord {
    /// Board cell the symbol was placed in (0..=8).
    pub position: usize,
    /// Symbol that was placed.
    pub symbol: Symbol,
    /// Player who made the move.
    pub player_id: Uuid,
    /// When the move was accepted.
    pub at: SystemTime,
}

/// A move rejected by the engine. Validation order is load-bearing and
/// covered by tests: terminal status, position range, cell occupancy,
/// party membership, then turn ownership.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MoveError {
    /// The game already reached a terminal status.
    #[error("game is already complete")]
    TerminalState,
    /// The cell index is outside 0..=8.
    #[error("invalid position: must be 0-8")]
    InvalidPosition,
    /// The cell already holds a symbol.
    #[error("cell is already occupied")]
    CellOccupied,
    /// The acting user is neither player.
    #[error("you are not a player in this game")]
    NotAPlayer,
    /// It is the other side's turn.
    #[error("it's not your turn")]
    WrongTurn,
}

/// Outcome of an accepted move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    /// Game continues; the turn has flipped.
    Continue,
    /// The acting player completed a line.
    Won,
    /// The board filled with no winner.
    Draw,
}

/// Authoritative state of one TicTacToe game between a couple.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicTacToeGame {
    /// Unique game id.
    pub id: Uuid,
    /// Sorted-pair key identifying the couple.
    pub couple_key: String,
    /// User who created the game.
    pub creator_id: Uuid,
    /// Challenged partner.
    pub partner_id: Uuid,
    /// 3x3 board, row-major. `None` is an empty cell.
    pub board: [Option<Symbol>; 9],
    /// Side whose move is accepted next.
    pub current_turn: Turn,
    /// Symbol played by the creator.
    pub creator_symbol: Symbol,
    /// Symbol played by the partner, always the complement.
    pub partner_symbol: Symbol,
    /// Lifecycle status.
    pub status: TicTacToeStatus,
    /// Winning user once the status is a win.
    pub winner_id: Option<Uuid>,
    /// Every accepted move in order.
    pub move_history: Vec<MoveRecord>,
    /// Number of accepted moves, always `move_history.len()`.
    pub move_count: usize,
    /// Creation time.
    pub created_at: SystemTime,
    /// Set when the game reaches a terminal status.
    pub completed_at: Option<SystemTime>,
}

impl TicTacToeGame {
    /// Start a new game. When `first_move` is supplied the creator's opening
    /// move is applied immediately and the turn passes to the partner.
    pub fn new(
        creator_id: Uuid,
        partner_id: Uuid,
        creator_symbol: Symbol,
        first_move: Option<usize>,
    ) -> Result<Self, MoveError> {
        let mut game = Self {
            id: Uuid::new_v4(),
            couple_key: couple_key(creator_id, partner_id),
            creator_id,
            partner_id,
            board: [None; 9],
            current_turn: Turn::Creator,
            creator_symbol,
            partner_symbol: creator_symbol.opposite(),
            status: TicTacToeStatus::Pending,
            winner_id: None,
            move_history: Vec::new(),
            move_count: 0,
            created_at: SystemTime::now(),
            completed_at: None,
        };

        if let Some(position) = first_move {
            game.apply_move(creator_id, position)?;
        }

        Ok(game)
    }

    /// Whether `user_id` is one of the two players.
    pub fn is_player(&self, user_id: Uuid) -> bool {
        self.creator_id == user_id || self.partner_id == user_id
    }

    /// The side `user_id` plays, if they are a player.
    pub fn role_of(&self, user_id: Uuid) -> Option<Turn> {
        if self.creator_id == user_id {
            Some(Turn::Creator)
        } else if self.partner_id == user_id {
            Some(Turn::Partner)
        } else {
            None
        }
    }

    /// Validate and apply a move by `acting_user_id` at `position`.
    ///
    /// On success the symbol is written, the move recorded, and all eight
    /// win lines are evaluated before a draw can be declared. A rejected
    /// move leaves the game untouched.
    pub fn apply_move(
        &mut self,
        acting_user_id: Uuid,
        position: usize,
    ) -> Result<MoveOutcome, MoveError> {
        if self.status.is_terminal() {
            return Err(MoveError::TerminalState);
        }
        if position > 8 {
            return Err(MoveError::InvalidPosition);
        }
        if self.board[position].is_some() {
            return Err(MoveError::CellOccupied);
        }
        let role = self.role_of(acting_user_id).ok_or(MoveError::NotAPlayer)?;
        if role != self.current_turn {
            return Err(MoveError::WrongTurn);
        }

        let symbol = match role {
            Turn::Creator => self.creator_symbol,
            Turn::Partner => self.partner_symbol,
        };

        self.board[position] = Some(symbol);
        self.move_history.push(MoveRecord {
            position,
            symbol,
            player_id: acting_user_id,
            at: SystemTime::now(),
        });
        self.move_count += 1;

        if self.status == TicTacToeStatus::Pending {
            self.status = TicTacToeStatus::InProgress;
        }

        if let Some(winning_symbol) = winning_symbol(&self.board) {
            self.status = if winning_symbol == self.creator_symbol {
                self.winner_id = Some(self.creator_id);
                TicTacToeStatus::WonCreator
            } else {
                self.winner_id = Some(self.partner_id);
                TicTacToeStatus::WonPartner
            };
            self.completed_at = Some(SystemTime::now());
            Ok(MoveOutcome::Won)
        } else if self.board.iter().all(|cell| cell.is_some()) {
            self.status = TicTacToeStatus::Draw;
            self.completed_at = Some(SystemTime::now());
            Ok(MoveOutcome::Draw)
        } else {
            self.current_turn = self.current_turn.flipped();
            Ok(MoveOutcome::Continue)
        }
    }
}

/// Scan all eight win lines and report a three-in-a-row symbol, if any.
/// The scan is exhaustive by construction; a draw is only declared by the
/// caller after this returns `None`.
fn winning_symbol(board: &[Option<Symbol>; 9]) -> Option<Symbol> {
    let mut winner = None;
    for [a, b, c] in WIN_LINES {
        if let Some(symbol) = board[a] {
            if board[b] == Some(symbol) && board[c] == Some(symbol) {
                winner = Some(symbol);
            }
        }
    }
    winner
}

#[cfg(test)]
mod tests {
    use super::*;

    fn players() -> (Uuid, Uuid) {
        (Uuid::new_v4(), Uuid::new_v4())
    }

    #[test]
    fn create_without_first_move_is_pending() {
        let (creator, partner) = players();
        let game = TicTacToeGame::new(creator, partner, Symbol::X, None).unwrap();

        assert_eq!(game.status, TicTacToeStatus::Pending);
        assert_eq!(game.current_turn, Turn::Creator);
        assert_eq!(game.partner_symbol, Symbol::O);
        assert_eq!(game.move_count, 0);
        assert_eq!(game.couple_key, couple_key(partner, creator));
    }

    #[test]
    fn create_with_first_move_applies_it_and_flips_turn() {
        let (creator, partner) = players();
        let game = TicTacToeGame::new(creator, partner, Symbol::X, Some(4)).unwrap();

        assert_eq!(game.board[4], Some(Symbol::X));
        assert_eq!(game.status, TicTacToeStatus::InProgress);
        assert_eq!(game.current_turn, Turn::Partner);
        assert_eq!(game.move_count, 1);
        assert_eq!(game.move_history.len(), 1);
    }

    #[test]
    fn move_count_tracks_history_and_board() {
        let (creator, partner) = players();
        let mut game = TicTacToeGame::new(creator, partner, Symbol::X, Some(4)).unwrap();
        game.apply_move(partner, 0).unwrap();
        game.apply_move(creator, 8).unwrap();

        assert_eq!(game.move_count, game.move_history.len());
        let filled = game.board.iter().filter(|cell| cell.is_some()).count();
        assert_eq!(filled, game.move_count);
    }

    #[test]
    fn turn_alternates_after_each_accepted_move() {
        let (creator, partner) = players();
        let mut game = TicTacToeGame::new(creator, partner, Symbol::X, None).unwrap();

        game.apply_move(creator, 0).unwrap();
        assert_eq!(game.current_turn, Turn::Partner);
        game.apply_move(partner, 1).unwrap();
        assert_eq!(game.current_turn, Turn::Creator);
    }

    #[test]
    fn rejected_move_does_not_flip_turn_or_mutate() {
        let (creator, partner) = players();
        let mut game = TicTacToeGame::new(creator, partner, Symbol::X, Some(4)).unwrap();
        let before = game.clone();

        assert_eq!(game.apply_move(creator, 0), Err(MoveError::WrongTurn));
        assert_eq!(game.current_turn, before.current_turn);
        assert_eq!(game.board, before.board);
        assert_eq!(game.move_count, before.move_count);
    }

    #[test]
    fn occupied_cell_check_precedes_turn_check() {
        let (creator, partner) = players();
        let mut game = TicTacToeGame::new(creator, partner, Symbol::X, Some(4)).unwrap();
        game.apply_move(partner, 0).unwrap();
        game.apply_move(creator, 8).unwrap();

        // Creator replays onto their own occupied cell while it is the
        // partner's turn: occupancy fires first per the documented order.
        assert_eq!(game.apply_move(creator, 0), Err(MoveError::CellOccupied));
        // A free cell out of turn trips the turn check instead.
        assert_eq!(game.apply_move(creator, 1), Err(MoveError::WrongTurn));
    }

    #[test]
    fn position_out_of_range_rejected_before_occupancy() {
        let (creator, partner) = players();
        let mut game = TicTacToeGame::new(creator, partner, Symbol::X, None).unwrap();
        assert_eq!(game.apply_move(creator, 9), Err(MoveError::InvalidPosition));
    }

    #[test]
    fn outsider_cannot_move() {
        let (creator, partner) = players();
        let mut game = TicTacToeGame::new(creator, partner, Symbol::X, None).unwrap();
        assert_eq!(
            game.apply_move(Uuid::new_v4(), 0),
            Err(MoveError::NotAPlayer)
        );
    }

    #[test]
    fn every_win_line_is_detected_for_both_sides() {
        for line in WIN_LINES {
            let (creator, partner) = players();
            let mut game = TicTacToeGame::new(creator, partner, Symbol::X, None).unwrap();

            // Feed the creator the target line; the partner plays filler
            // cells outside it.
            let filler: Vec<usize> = (0..9).filter(|cell| !line.contains(cell)).collect();
            for (i, &cell) in line.iter().enumerate() {
                game.apply_move(creator, cell).unwrap();
                if i < 2 {
                    game.apply_move(partner, filler[i]).unwrap();
                }
            }

            assert_eq!(game.status, TicTacToeStatus::WonCreator, "line {line:?}");
            assert_eq!(game.winner_id, Some(creator));
            assert!(game.completed_at.is_some());
        }
    }

    #[test]
    fn partner_win_is_attributed_to_partner() {
        let (creator, partner) = players();
        let mut game = TicTacToeGame::new(creator, partner, Symbol::X, None).unwrap();

        // O takes the middle row (3, 4, 5) while X scatters.
        game.apply_move(creator, 0).unwrap();
        game.apply_move(partner, 3).unwrap();
        game.apply_move(creator, 1).unwrap();
        game.apply_move(partner, 4).unwrap();
        game.apply_move(creator, 8).unwrap();
        game.apply_move(partner, 5).unwrap();

        assert_eq!(game.status, TicTacToeStatus::WonPartner);
        assert_eq!(game.winner_id, Some(partner));
    }

    #[test]
    fn full_board_without_line_is_a_draw() {
        let (creator, partner) = players();
        let mut game = TicTacToeGame::new(creator, partner, Symbol::X, None).unwrap();

        // X X O / O O X / X O X: no line for either side.
        for position in [0, 2, 1, 4, 5, 3, 6, 7, 8] {
            let actor = if game.current_turn == Turn::Creator {
                creator
            } else {
                partner
            };
            game.apply_move(actor, position).unwrap();
        }

        assert_eq!(game.status, TicTacToeStatus::Draw);
        assert_eq!(game.winner_id, None);
    }

    #[test]
    fn terminal_game_rejects_further_moves() {
        let (creator, partner) = players();
        let mut game = TicTacToeGame::new(creator, partner, Symbol::X, None).unwrap();
        game.apply_move(creator, 0).unwrap();
        game.apply_move(partner, 3).unwrap();
        game.apply_move(creator, 1).unwrap();
        game.apply_move(partner, 4).unwrap();
        game.apply_move(creator, 2).unwrap();

        assert_eq!(game.status, TicTacToeStatus::WonCreator);
        assert_eq!(game.apply_move(partner, 5), Err(MoveError::TerminalState));
    }

    #[test]
    fn opening_move_at_center_passes_turn_to_partner() {
        let (creator, partner) = players();
        let mut game = TicTacToeGame::new(creator, partner, Symbol::X, Some(4)).unwrap();

        let mut expected = [None; 9];
        expected[4] = Some(Symbol::X);
        assert_eq!(game.board, expected);
        assert_eq!(game.status, TicTacToeStatus::InProgress);
        assert_eq!(game.current_turn, Turn::Partner);

        game.apply_move(partner, 0).unwrap();
        game.apply_move(creator, 8).unwrap();

        // Position 0 is occupied, which outranks the turn violation.
        assert_eq!(game.apply_move(creator, 0), Err(MoveError::CellOccupied));
    }
}
