//! Core session state machine.
//!
//! `GameState` is the authoritative state of one match: it serializes
//! placements, skill activation/resolution, and restart votes, and is
//! the only place board state mutates. Callers drive it with
//! [`GameState::handle_click`], [`GameState::activate_skill`], and
//! [`GameState::vote_restart`]; every successful action yields the
//! events that occurred, in order.

use crate::board::{Board, MoveRecord, PerSeat, Pos, Seat, BOARD_SIZE};
use crate::skills::{self, Skill};
use crate::win::check_win;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// Errors that can occur when applying actions.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum GameError {
    #[error("Not your turn")]
    NotYourTurn,

    #[error("The game is already over")]
    GameAlreadyOver,

    #[error("Position is outside the board")]
    OutOfBounds,

    #[error("That cell is occupied")]
    CellOccupied,

    #[error("That cell is blocked for you this turn")]
    CellBlocked,

    #[error("Finish your pending skill first")]
    SkillAlreadyActive,

    #[error("That skill has already been used")]
    SkillAlreadyUsed,
}

/// Events emitted by successful actions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameEvent {
    /// A stone was placed on the board.
    StonePlaced { seat: Seat, pos: Pos },
    /// A seat's queued skip was consumed and its turn forfeited.
    TurnSkipped { seat: Seat },
    /// A skill was activated and now awaits its resolving click.
    SkillActivated { seat: Seat, skill: Skill },
    /// A pending skill resolved (its effect may have been a no-op).
    SkillResolved { seat: Seat, skill: Skill },
    /// The match was won.
    GameWon { seat: Seat },
    /// A seat voted to restart.
    RestartVoted { seat: Seat },
    /// Both seats agreed; the match was reset in place.
    MatchRestarted,
}

/// Per-seat mutable state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeatState {
    /// Display name, fixed for the lifetime of the session.
    pub username: String,
    /// The activated-but-unresolved skill, at most one.
    pub skill_active: Option<Skill>,
    /// Skills consumed this match; monotonic until a restart.
    pub skills_used: HashSet<Skill>,
    /// Whether this seat's next turn is forfeited.
    pub skip_next_turn: bool,
}

impl SeatState {
    fn new(username: String) -> Self {
        Self {
            username,
            ..Default::default()
        }
    }

    fn reset(&mut self) {
        self.skill_active = None;
        self.skills_used.clear();
        self.skip_next_turn = false;
    }
}

/// The complete state of one match.
#[derive(Debug)]
pub struct GameState {
    /// The 11x11 grid.
    pub board: Board,
    /// One record per currently occupied placement. At every quiescent
    /// point this matches the board cell-for-cell.
    pub moves: Vec<MoveRecord>,
    /// Both seats' state.
    pub seats: PerSeat<SeatState>,
    /// Whose turn it is.
    pub current_player: Seat,
    /// Cells a specific seat may not place on during its next turn.
    pub blocked: HashMap<Pos, Seat>,
    /// Occupied cells excluded from win-line counting.
    pub cold_palace: HashSet<Pos>,
    /// Set once a line is completed; only Time Rewind clears it.
    pub winner: Option<Seat>,
    /// Human-readable summary of the match state.
    pub status: String,
    /// Seats that voted for a restart; both together trigger the reset.
    pub restart_votes: HashSet<Seat>,
    /// Process-scoped randomness for the skill effects; seedable so
    /// tests can replay a match deterministically.
    pub(crate) rng: StdRng,
}

impl GameState {
    /// Create a fresh match between the two named players.
    pub fn new(usernames: PerSeat<String>) -> Self {
        Self::from_rng(usernames, StdRng::from_entropy())
    }

    /// Create a match with deterministic randomness.
    pub fn with_seed(usernames: PerSeat<String>, seed: u64) -> Self {
        Self::from_rng(usernames, StdRng::seed_from_u64(seed))
    }

    fn from_rng(usernames: PerSeat<String>, rng: StdRng) -> Self {
        let seats = PerSeat::new(
            SeatState::new(usernames.one),
            SeatState::new(usernames.two),
        );
        let status = format!("{} to move", seats.one.username);
        Self {
            board: Board::new(),
            moves: Vec::new(),
            seats,
            current_player: Seat::One,
            blocked: HashMap::new(),
            cold_palace: HashSet::new(),
            winner: None,
            status,
            restart_votes: HashSet::new(),
            rng,
        }
    }

    pub fn username(&self, seat: Seat) -> &str {
        &self.seats[seat].username
    }

    pub fn is_over(&self) -> bool {
        self.winner.is_some()
    }

    /// Handle a board click from `seat`.
    ///
    /// A click is either a placement or, when the seat has a pending
    /// skill activation, that skill's resolving target. A queued skip
    /// is acknowledged by the click instead: the flag clears, the turn
    /// passes, and nothing is placed.
    pub fn handle_click(&mut self, seat: Seat, pos: Pos) -> Result<Vec<GameEvent>, GameError> {
        if !Board::contains(pos.row, pos.col) {
            return Err(GameError::OutOfBounds);
        }
        if self.winner.is_some() {
            return Err(GameError::GameAlreadyOver);
        }
        if seat != self.current_player {
            return Err(GameError::NotYourTurn);
        }

        // A skip flag on the acting seat itself cannot arise from the
        // catalog (Time Freeze flags the opponent, and the advance path
        // consumes flags as the turn lands). Handled anyway: the click
        // acknowledges the skip and forfeits the turn.
        if self.seats[seat].skip_next_turn {
            self.seats[seat].skip_next_turn = false;
            let mut events = vec![GameEvent::TurnSkipped { seat }];
            let chained = self.pass_turn();
            events.extend(chained.iter().map(|&s| GameEvent::TurnSkipped { seat: s }));
            self.set_turn_status(&chained);
            return Ok(events);
        }

        if let Some(skill) = self.seats[seat].skill_active {
            return Ok(self.resolve_skill(seat, skill, pos));
        }

        // Validation precedes every mutation: a rejected placement must
        // leave the blocked records (and everything else) untouched.
        if !self.board.is_empty(pos) {
            return Err(GameError::CellOccupied);
        }
        if self.blocked.get(&pos) == Some(&seat) {
            return Err(GameError::CellBlocked);
        }

        self.expire_blocked(seat);
        self.board.place(pos, seat);
        self.moves.push(MoveRecord { pos, seat });
        self.restart_votes.clear();

        let mut events = vec![GameEvent::StonePlaced { seat, pos }];
        if check_win(&self.board, &self.cold_palace, seat, pos) {
            self.winner = Some(seat);
            self.status = format!("{} wins!", self.username(seat));
            events.push(GameEvent::GameWon { seat });
        } else {
            let skipped = self.pass_turn();
            events.extend(skipped.iter().map(|&s| GameEvent::TurnSkipped { seat: s }));
            self.set_turn_status(&skipped);
        }
        Ok(events)
    }

    /// Activate a skill for `seat`. The activation does not consume the
    /// turn; the seat's next board click resolves it.
    pub fn activate_skill(&mut self, seat: Seat, skill: Skill) -> Result<Vec<GameEvent>, GameError> {
        if self.winner.is_some() {
            return Err(GameError::GameAlreadyOver);
        }
        if seat != self.current_player {
            return Err(GameError::NotYourTurn);
        }
        if self.seats[seat].skill_active.is_some() {
            return Err(GameError::SkillAlreadyActive);
        }
        if self.seats[seat].skills_used.contains(&skill) {
            return Err(GameError::SkillAlreadyUsed);
        }

        self.seats[seat].skill_active = Some(skill);
        self.status = format!(
            "{} activated {}: {} {}",
            self.username(seat),
            skill.display_name(),
            skill.description(),
            skill.prompt(),
        );
        Ok(vec![GameEvent::SkillActivated { seat, skill }])
    }

    /// Resolve the pending activation with the clicked target.
    ///
    /// Consumption is unconditional: the skill is marked used and the
    /// activation cleared before the effect applies, so a missed target
    /// still spends both the resource and the turn.
    fn resolve_skill(&mut self, seat: Seat, skill: Skill, target: Pos) -> Vec<GameEvent> {
        self.seats[seat].skill_active = None;
        self.seats[seat].skills_used.insert(skill);
        self.expire_blocked(seat);
        self.restart_votes.clear();

        skills::apply_effect(self, seat, skill, target);

        let mut events = vec![GameEvent::SkillResolved { seat, skill }];
        if skill == Skill::TimeRewind {
            // The rewind recomputed `current_player` itself; the normal
            // opponent handoff does not apply.
            self.set_turn_status(&[]);
        } else {
            let skipped = self.pass_turn();
            events.extend(skipped.iter().map(|&s| GameEvent::TurnSkipped { seat: s }));
            self.set_turn_status(&skipped);
        }
        events
    }

    /// Record a restart vote. One vote only reports; both seats voting
    /// resets the match in place, keeping seats and usernames.
    pub fn vote_restart(&mut self, seat: Seat) -> Result<Vec<GameEvent>, GameError> {
        self.restart_votes.insert(seat);
        let mut events = vec![GameEvent::RestartVoted { seat }];

        if Seat::ALL.iter().all(|s| self.restart_votes.contains(s)) {
            self.reset();
            events.push(GameEvent::MatchRestarted);
        } else {
            self.status = format!("{} wants a rematch", self.username(seat));
        }
        Ok(events)
    }

    /// Reset to the initial state, preserving usernames and the RNG.
    fn reset(&mut self) {
        self.board = Board::new();
        self.moves.clear();
        self.seats.one.reset();
        self.seats.two.reset();
        self.current_player = Seat::One;
        self.blocked.clear();
        self.cold_palace.clear();
        self.winner = None;
        self.restart_votes.clear();
        self.status = format!("{} to move", self.seats.one.username);
    }

    /// Advance the turn to the opponent, consuming queued skips as the
    /// turn lands on a flagged seat. Returns the seats skipped over.
    /// The loop is bounded: each pass clears a flag, and only two exist.
    fn pass_turn(&mut self) -> Vec<Seat> {
        let mut skipped = Vec::new();
        self.current_player = self.current_player.opponent();
        while self.seats[self.current_player].skip_next_turn {
            self.seats[self.current_player].skip_next_turn = false;
            skipped.push(self.current_player);
            self.current_player = self.current_player.opponent();
        }
        skipped
    }

    /// Drop the acting seat's blocked records: they last exactly one
    /// turn and expire once the seat completes a real action, whether
    /// or not it ever aimed at a blocked cell.
    fn expire_blocked(&mut self, seat: Seat) {
        self.blocked.retain(|_, owner| *owner != seat);
    }

    fn set_turn_status(&mut self, skipped: &[Seat]) {
        let current = self.username(self.current_player).to_string();
        self.status = match skipped {
            [] => format!("{} to move", current),
            seats => {
                let skipped_names: Vec<&str> =
                    seats.iter().map(|&s| self.username(s)).collect();
                format!("{} skipped a turn. {} to move", skipped_names.join(", "), current)
            }
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn new_game() -> GameState {
        GameState::with_seed(PerSeat::new("Ming".into(), "Hua".into()), 7)
    }

    fn click(game: &mut GameState, seat: Seat, row: usize, col: usize) -> Vec<GameEvent> {
        game.handle_click(seat, Pos::new(row, col)).unwrap()
    }

    /// The board/move-log invariant from the data model.
    fn assert_consistency(game: &GameState) {
        assert_eq!(game.board.occupied_count(), game.moves.len());
        for record in &game.moves {
            assert_eq!(game.board.owner(record.pos), Some(record.seat));
        }
    }

    #[test]
    fn turn_order_is_enforced() {
        let mut game = new_game();
        assert_eq!(
            game.handle_click(Seat::Two, Pos::new(0, 0)),
            Err(GameError::NotYourTurn)
        );
        click(&mut game, Seat::One, 0, 0);
        assert_eq!(game.current_player, Seat::Two);
        assert_eq!(
            game.handle_click(Seat::One, Pos::new(0, 1)),
            Err(GameError::NotYourTurn)
        );
        assert_consistency(&game);
    }

    #[test]
    fn occupied_cell_is_rejected() {
        let mut game = new_game();
        click(&mut game, Seat::One, 5, 5);
        assert_eq!(
            game.handle_click(Seat::Two, Pos::new(5, 5)),
            Err(GameError::CellOccupied)
        );
        // The failed click did not consume the turn.
        assert_eq!(game.current_player, Seat::Two);
        assert_consistency(&game);
    }

    #[test]
    fn out_of_bounds_is_rejected() {
        let mut game = new_game();
        assert_eq!(
            game.handle_click(Seat::One, Pos::new(0, BOARD_SIZE)),
            Err(GameError::OutOfBounds)
        );
        assert_eq!(game.moves.len(), 0);
    }

    #[test]
    fn placement_emits_events_and_advances() {
        let mut game = new_game();
        let events = click(&mut game, Seat::One, 3, 3);
        assert_eq!(
            events,
            vec![GameEvent::StonePlaced {
                seat: Seat::One,
                pos: Pos::new(3, 3)
            }]
        );
        assert_eq!(game.current_player, Seat::Two);
        assert_eq!(game.status, "Hua to move");
    }

    #[test]
    fn fifth_in_a_row_wins_through_the_action_path() {
        let mut game = new_game();
        for col in 0..4 {
            click(&mut game, Seat::One, 5, col);
            click(&mut game, Seat::Two, 9, col);
        }
        let events = click(&mut game, Seat::One, 5, 4);
        assert!(events.contains(&GameEvent::GameWon { seat: Seat::One }));
        assert_eq!(game.winner, Some(Seat::One));
        assert_eq!(game.status, "Ming wins!");
        assert_eq!(
            game.handle_click(Seat::Two, Pos::new(9, 4)),
            Err(GameError::GameAlreadyOver)
        );
    }

    #[test]
    fn cold_palace_stone_does_not_complete_a_line() {
        let mut game = new_game();
        for col in 0..4 {
            click(&mut game, Seat::One, 0, col);
            click(&mut game, Seat::Two, 9, col);
        }
        game.cold_palace.insert(Pos::new(0, 2));

        let events = click(&mut game, Seat::One, 0, 4);
        assert!(!events.contains(&GameEvent::GameWon { seat: Seat::One }));
        assert_eq!(game.winner, None);
        assert_eq!(game.current_player, Seat::Two);
    }

    #[test]
    fn skill_activation_does_not_consume_the_turn() {
        let mut game = new_game();
        let events = game.activate_skill(Seat::One, Skill::TimeFreeze).unwrap();
        assert_eq!(
            events,
            vec![GameEvent::SkillActivated {
                seat: Seat::One,
                skill: Skill::TimeFreeze
            }]
        );
        assert_eq!(game.current_player, Seat::One);
        assert_eq!(game.seats.one.skill_active, Some(Skill::TimeFreeze));
        assert!(game.status.contains("Time Freeze"));
    }

    #[test]
    fn second_activation_waits_for_resolution() {
        let mut game = new_game();
        game.activate_skill(Seat::One, Skill::SandStorm).unwrap();
        assert_eq!(
            game.activate_skill(Seat::One, Skill::TimeFreeze),
            Err(GameError::SkillAlreadyActive)
        );
    }

    #[test]
    fn consumed_skill_cannot_be_reused() {
        let mut game = new_game();
        game.activate_skill(Seat::One, Skill::SandStorm).unwrap();
        // Resolve on an empty cell: a miss, but the skill is spent.
        click(&mut game, Seat::One, 4, 4);
        click(&mut game, Seat::Two, 9, 9);
        assert_eq!(
            game.activate_skill(Seat::One, Skill::SandStorm),
            Err(GameError::SkillAlreadyUsed)
        );
        assert_consistency(&game);
    }

    #[test]
    fn sand_storm_miss_spends_skill_and_turn() {
        let mut game = new_game();
        click(&mut game, Seat::One, 5, 5);
        click(&mut game, Seat::Two, 6, 6);

        game.activate_skill(Seat::One, Skill::SandStorm).unwrap();
        let events = click(&mut game, Seat::One, 0, 0); // empty cell
        assert_eq!(
            events,
            vec![GameEvent::SkillResolved {
                seat: Seat::One,
                skill: Skill::SandStorm
            }]
        );
        assert!(game.seats.one.skills_used.contains(&Skill::SandStorm));
        assert_eq!(game.current_player, Seat::Two);
        assert_eq!(game.moves.len(), 2);
        assert!(game.blocked.is_empty());
        assert_consistency(&game);
    }

    #[test]
    fn sand_storm_hit_removes_and_blocks() {
        let mut game = new_game();
        click(&mut game, Seat::One, 5, 5);
        click(&mut game, Seat::Two, 6, 6);

        game.activate_skill(Seat::One, Skill::SandStorm).unwrap();
        click(&mut game, Seat::One, 6, 6);

        assert!(game.board.is_empty(Pos::new(6, 6)));
        assert_eq!(game.blocked.get(&Pos::new(6, 6)), Some(&Seat::Two));
        assert_eq!(game.moves.len(), 1);
        assert_consistency(&game);

        // The stone's owner cannot replace it this turn...
        assert_eq!(
            game.handle_click(Seat::Two, Pos::new(6, 6)),
            Err(GameError::CellBlocked)
        );
        // ...but may play elsewhere, which expires the block.
        click(&mut game, Seat::Two, 7, 7);
        assert!(game.blocked.is_empty());
        click(&mut game, Seat::One, 1, 1);
        click(&mut game, Seat::Two, 6, 6);
        assert_eq!(game.board.owner(Pos::new(6, 6)), Some(Seat::Two));
        assert_consistency(&game);
    }

    #[test]
    fn time_freeze_costs_the_opponent_a_turn() {
        let mut game = new_game();
        click(&mut game, Seat::One, 5, 5);
        click(&mut game, Seat::Two, 6, 6);

        game.activate_skill(Seat::One, Skill::TimeFreeze).unwrap();
        let events = click(&mut game, Seat::One, 0, 0);

        assert!(events.contains(&GameEvent::TurnSkipped { seat: Seat::Two }));
        assert_eq!(game.current_player, Seat::One);
        assert!(!game.seats.two.skip_next_turn);
        assert!(game.status.contains("Hua skipped a turn"));
    }

    #[test]
    fn earth_shatter_preserves_the_log_invariant() {
        let mut game = new_game();
        for col in 0..5 {
            click(&mut game, Seat::One, 2, col);
            click(&mut game, Seat::Two, 8, col);
        }
        assert_eq!(game.moves.len(), 10);

        game.activate_skill(Seat::One, Skill::EarthShatter).unwrap();
        click(&mut game, Seat::One, 0, 0);

        assert!(game.moves.len() <= 10);
        assert_eq!(game.current_player, Seat::Two);
        assert_consistency(&game);
    }

    #[test]
    fn cold_palace_exiles_to_an_edge() {
        let mut game = new_game();
        click(&mut game, Seat::One, 5, 5);
        click(&mut game, Seat::Two, 5, 6);

        game.activate_skill(Seat::One, Skill::ColdPalace).unwrap();
        click(&mut game, Seat::One, 5, 6);

        assert!(game.board.is_empty(Pos::new(5, 6)));
        let exiled = game.board.stones_of(Seat::Two);
        assert_eq!(exiled.len(), 1);
        assert!(exiled[0].is_edge());
        assert!(game.cold_palace.contains(&exiled[0]));
        // The exile appended a fresh log entry owned by the opponent.
        assert_eq!(game.moves.last().unwrap().seat, Seat::Two);
        assert_consistency(&game);
    }

    #[test]
    fn time_rewind_restores_three_moves() {
        let mut game = new_game();
        click(&mut game, Seat::One, 0, 0);
        click(&mut game, Seat::Two, 1, 1);
        click(&mut game, Seat::One, 2, 2);
        click(&mut game, Seat::Two, 3, 3);
        click(&mut game, Seat::One, 4, 4);

        game.activate_skill(Seat::Two, Skill::TimeRewind).unwrap();
        click(&mut game, Seat::Two, 0, 0);

        assert_eq!(game.moves.len(), 2);
        assert!(game.board.is_empty(Pos::new(2, 2)));
        assert!(game.board.is_empty(Pos::new(3, 3)));
        assert!(game.board.is_empty(Pos::new(4, 4)));
        assert_eq!(game.winner, None);
        // Last surviving move is Hua's at (1,1), so Ming is up.
        assert_eq!(game.current_player, Seat::One);
        assert_consistency(&game);
    }

    #[test]
    fn time_rewind_on_a_short_log_empties_the_board() {
        let mut game = new_game();
        click(&mut game, Seat::One, 0, 0);
        click(&mut game, Seat::Two, 1, 1);

        game.activate_skill(Seat::One, Skill::TimeRewind).unwrap();
        click(&mut game, Seat::One, 0, 0);

        assert_eq!(game.moves.len(), 0);
        assert_eq!(game.board.occupied_count(), 0);
        assert_eq!(game.current_player, Seat::One);
        assert_consistency(&game);
    }

    #[test]
    fn fortune_swap_trades_one_stone_each_way() {
        let mut game = new_game();
        click(&mut game, Seat::One, 2, 2);
        click(&mut game, Seat::Two, 8, 8);

        game.activate_skill(Seat::One, Skill::FortuneSwap).unwrap();
        click(&mut game, Seat::One, 0, 0);

        // With one stone per side the pick is forced.
        assert_eq!(game.board.owner(Pos::new(2, 2)), Some(Seat::Two));
        assert_eq!(game.board.owner(Pos::new(8, 8)), Some(Seat::One));
        assert_consistency(&game);
    }

    #[test]
    fn fortune_swap_with_no_own_stones_is_a_noop() {
        let mut game = new_game();
        game.activate_skill(Seat::One, Skill::FortuneSwap).unwrap();
        click(&mut game, Seat::One, 0, 0);

        assert_eq!(game.board.occupied_count(), 0);
        assert!(game.seats.one.skills_used.contains(&Skill::FortuneSwap));
        assert_eq!(game.current_player, Seat::Two);
    }

    #[test]
    fn restart_needs_both_votes() {
        let mut game = new_game();
        click(&mut game, Seat::One, 5, 5);

        let events = game.vote_restart(Seat::Two).unwrap();
        assert_eq!(events, vec![GameEvent::RestartVoted { seat: Seat::Two }]);
        assert_eq!(game.moves.len(), 1);
        assert_eq!(game.status, "Hua wants a rematch");

        let events = game.vote_restart(Seat::One).unwrap();
        assert!(events.contains(&GameEvent::MatchRestarted));
        assert_eq!(game.board.occupied_count(), 0);
        assert_eq!(game.moves.len(), 0);
        assert_eq!(game.current_player, Seat::One);
        assert_eq!(game.winner, None);
        assert!(game.restart_votes.is_empty());
        assert_eq!(game.username(Seat::One), "Ming");
    }

    #[test]
    fn a_real_move_clears_a_pending_vote() {
        let mut game = new_game();
        game.vote_restart(Seat::One).unwrap();
        assert_eq!(game.restart_votes.len(), 1);

        click(&mut game, Seat::One, 4, 4);
        assert!(game.restart_votes.is_empty());

        // The earlier vote no longer counts toward consensus.
        game.vote_restart(Seat::Two).unwrap();
        assert_eq!(game.moves.len(), 1);
    }

    #[test]
    fn restart_clears_consumed_skills() {
        let mut game = new_game();
        game.activate_skill(Seat::One, Skill::TimeFreeze).unwrap();
        click(&mut game, Seat::One, 0, 0);

        game.vote_restart(Seat::One).unwrap();
        game.vote_restart(Seat::Two).unwrap();

        assert!(game.seats.one.skills_used.is_empty());
        assert!(game
            .activate_skill(Seat::One, Skill::TimeFreeze)
            .is_ok());
    }
}
