//! Full-state snapshots sent to clients after every mutation.

use crate::board::{PerSeat, Seat, BOARD_SIZE};
use crate::game::GameState;
use crate::skills::Skill;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per-seat public profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerProfile {
    pub username: String,
}

/// The complete client-facing view of one match.
///
/// Field names and shapes are the wire contract: per-seat maps use
/// `"1"`/`"2"` keys, positions in maps and lists use the `"row,col"`
/// string form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateSnapshot {
    pub board_size: usize,
    /// Row-major grid of cell owners: 0 empty, 1/2 the owning seat.
    pub board: Vec<Vec<u8>>,
    pub current_player: Seat,
    pub skill_active: PerSeat<Option<Skill>>,
    pub skill_used: PerSeat<BTreeMap<Skill, bool>>,
    pub blocked_positions: BTreeMap<String, Seat>,
    pub skip_next_turn: PerSeat<bool>,
    pub cold_palace_positions: Vec<String>,
    pub players: PerSeat<PlayerProfile>,
    pub status: String,
    pub winner: Option<Seat>,
}

impl From<&GameState> for StateSnapshot {
    fn from(game: &GameState) -> Self {
        let mut cold: Vec<String> = game.cold_palace.iter().map(|p| p.to_string()).collect();
        cold.sort();

        Self {
            board_size: BOARD_SIZE,
            board: game.board.to_grid(),
            current_player: game.current_player,
            skill_active: PerSeat::from_fn(|seat| game.seats[seat].skill_active),
            skill_used: PerSeat::from_fn(|seat| {
                Skill::ALL
                    .into_iter()
                    .map(|s| (s, game.seats[seat].skills_used.contains(&s)))
                    .collect()
            }),
            blocked_positions: game
                .blocked
                .iter()
                .map(|(pos, seat)| (pos.to_string(), *seat))
                .collect(),
            skip_next_turn: PerSeat::from_fn(|seat| game.seats[seat].skip_next_turn),
            cold_palace_positions: cold,
            players: PerSeat::from_fn(|seat| PlayerProfile {
                username: game.seats[seat].username.clone(),
            }),
            status: game.status.clone(),
            winner: game.winner,
        }
    }
}

impl GameState {
    /// Snapshot the current state for broadcasting.
    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot::from(self)
    }
}
