//! The six one-shot skills and their effect resolvers.
//!
//! Each skill is usable at most once per seat per match and follows a
//! two-phase protocol: activation declares intent, the next board click
//! resolves the effect. Resolution always consumes the skill, even when
//! the effect turns out to be a no-op (a missed target).

use crate::board::{MoveRecord, Pos, Seat};
use crate::game::GameState;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The fixed skill catalog.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Skill {
    /// Remove an opposing stone and block its cell for one turn.
    SandStorm,
    /// Every stone on the board falls off with probability 1/2.
    EarthShatter,
    /// The opponent loses their next turn.
    TimeFreeze,
    /// Banish an opposing stone to a random empty edge cell, where it
    /// no longer counts toward a winning line.
    ColdPalace,
    /// Undo the last three moves; the only effect that can revert a win.
    TimeRewind,
    /// Swap one random stone of each side in place.
    FortuneSwap,
}

impl Skill {
    /// All skills, in catalog order.
    pub const ALL: [Skill; 6] = [
        Skill::SandStorm,
        Skill::EarthShatter,
        Skill::TimeFreeze,
        Skill::ColdPalace,
        Skill::TimeRewind,
        Skill::FortuneSwap,
    ];

    /// The snake_case name used on the wire.
    pub fn wire_name(self) -> &'static str {
        match self {
            Skill::SandStorm => "sand_storm",
            Skill::EarthShatter => "earth_shatter",
            Skill::TimeFreeze => "time_freeze",
            Skill::ColdPalace => "cold_palace",
            Skill::TimeRewind => "time_rewind",
            Skill::FortuneSwap => "fortune_swap",
        }
    }

    /// Parse a wire name; unknown names are a caller-side validation error.
    pub fn from_wire(name: &str) -> Option<Skill> {
        Skill::ALL.into_iter().find(|s| s.wire_name() == name)
    }

    /// Human-readable name for status text.
    pub fn display_name(self) -> &'static str {
        match self {
            Skill::SandStorm => "Sand Storm",
            Skill::EarthShatter => "Earth Shatter",
            Skill::TimeFreeze => "Time Freeze",
            Skill::ColdPalace => "Cold Palace",
            Skill::TimeRewind => "Time Rewind",
            Skill::FortuneSwap => "Fortune Swap",
        }
    }

    /// What the skill does, shown when it is activated.
    pub fn description(self) -> &'static str {
        match self {
            Skill::SandStorm => {
                "Removes one opposing stone and blocks that cell for the opponent's next turn."
            }
            Skill::EarthShatter => {
                "Upends the board; every stone has a coin-flip chance of falling off."
            }
            Skill::TimeFreeze => "Freezes time, costing the opponent their next turn.",
            Skill::ColdPalace => {
                "Banishes an opposing stone to the board edge, where it cannot join a winning line."
            }
            Skill::TimeRewind => "Turns back time, undoing the last three moves.",
            Skill::FortuneSwap => "Swaps one random stone of yours with one of your opponent's.",
        }
    }

    /// Next-step prompt appended to the activation status.
    pub fn prompt(self) -> &'static str {
        match self {
            Skill::SandStorm => "Select an opposing stone to remove.",
            Skill::EarthShatter => "Click anywhere on the board to unleash it.",
            Skill::TimeFreeze => "Click anywhere on the board to freeze your opponent.",
            Skill::ColdPalace => "Select an opposing stone to banish.",
            Skill::TimeRewind => "Click anywhere on the board to rewind.",
            Skill::FortuneSwap => "Click anywhere on the board to swap.",
        }
    }
}

impl fmt::Display for Skill {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Apply a resolved skill effect to the game state.
///
/// Preconditions (turn order, availability) were checked at activation;
/// resolution itself never fails. `target` is only meaningful for the
/// targeted skills and is otherwise an arbitrary in-bounds click. Every
/// effect leaves the board/move-log invariant intact.
pub(crate) fn apply_effect(state: &mut GameState, seat: Seat, skill: Skill, target: Pos) {
    let opponent = seat.opponent();
    match skill {
        Skill::SandStorm => sand_storm(state, opponent, target),
        Skill::EarthShatter => earth_shatter(state),
        Skill::TimeFreeze => state.seats[opponent].skip_next_turn = true,
        Skill::ColdPalace => cold_palace(state, opponent, target),
        Skill::TimeRewind => time_rewind(state),
        Skill::FortuneSwap => fortune_swap(state, seat),
    }
}

/// Remove the opposing stone at `target` (if any) and block the cell
/// for the opponent's next turn. A miss changes nothing.
fn sand_storm(state: &mut GameState, opponent: Seat, target: Pos) {
    if state.board.owner(target) == Some(opponent) {
        remove_stone(state, target);
        state.blocked.insert(target, opponent);
    }
}

/// Independent Bernoulli(1/2) trial per stone, row-major order so a
/// seeded RNG replays deterministically.
fn earth_shatter(state: &mut GameState) {
    for pos in state.board.occupied() {
        if state.rng.gen_bool(0.5) {
            remove_stone(state, pos);
        }
    }
}

/// Banish the opposing stone at `target` to a uniformly random empty
/// edge cell and mark it cold-palace. With no empty edge cell left the
/// stone is simply lost. A miss changes nothing.
fn cold_palace(state: &mut GameState, opponent: Seat, target: Pos) {
    if state.board.owner(target) != Some(opponent) {
        return;
    }
    remove_stone(state, target);

    let edges = state.board.empty_edge_cells();
    if edges.is_empty() {
        return;
    }
    let dest = edges[state.rng.gen_range(0..edges.len())];
    state.board.place(dest, opponent);
    state.cold_palace.insert(dest);
    state.moves.push(MoveRecord {
        pos: dest,
        seat: opponent,
    });
}

/// Pop up to three moves, then recompute whose turn it is from the new
/// log tail. Unconditionally clears the winner; this is the only path
/// that can revert a finished game to active play.
fn time_rewind(state: &mut GameState) {
    for _ in 0..3 {
        let Some(record) = state.moves.pop() else {
            break;
        };
        state.board.clear(record.pos);
        state.cold_palace.remove(&record.pos);
    }

    state.current_player = match state.moves.last() {
        Some(last) => last.seat.opponent(),
        None => Seat::One,
    };
    state.winner = None;
}

/// Swap one uniformly chosen stone of each side in place: board owners,
/// cold-palace markers, and move-log ownership all follow the swap.
fn fortune_swap(state: &mut GameState, seat: Seat) {
    let opponent = seat.opponent();
    let mine = state.board.stones_of(seat);
    let theirs = state.board.stones_of(opponent);
    if mine.is_empty() || theirs.is_empty() {
        return;
    }

    let own_pos = mine[state.rng.gen_range(0..mine.len())];
    let opp_pos = theirs[state.rng.gen_range(0..theirs.len())];

    state.board.place(own_pos, opponent);
    state.board.place(opp_pos, seat);

    let own_cold = state.cold_palace.remove(&own_pos);
    let opp_cold = state.cold_palace.remove(&opp_pos);
    if own_cold {
        state.cold_palace.insert(opp_pos);
    }
    if opp_cold {
        state.cold_palace.insert(own_pos);
    }

    retarget_move(state, own_pos, opponent);
    retarget_move(state, opp_pos, seat);
}

/// Remove a stone from the board, the move log, and the cold-palace set.
fn remove_stone(state: &mut GameState, pos: Pos) {
    state.board.clear(pos);
    state.cold_palace.remove(&pos);
    if let Some(idx) = state.moves.iter().position(|m| m.pos == pos) {
        state.moves.remove(idx);
    }
}

fn retarget_move(state: &mut GameState, pos: Pos, seat: Seat) {
    if let Some(record) = state.moves.iter_mut().find(|m| m.pos == pos) {
        record.seat = seat;
    }
}
