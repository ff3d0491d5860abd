//! Wuzi - five-in-a-row with one-shot martial skills
//!
//! This crate provides the authoritative game engine for Wuzi:
//! - Board and move-log data model on a fixed 11x11 grid
//! - Win detection with the cold-palace positional exclusion
//! - The six single-use skill effects and their two-phase
//!   activate/resolve protocol
//! - The per-match session state machine (placement, skills, skip
//!   turns, consensus restart)
//!
//! The engine is transport-agnostic and fully synchronous; the server
//! crate layers matchmaking and WebSocket delivery on top. Randomness
//! is drawn from a single seedable source per match so tests can
//! replay effects deterministically.
//!
//! # Modules
//!
//! - [`board`]: grid, seats, positions, and the move log
//! - [`win`]: line detection honoring cold-palace exclusions
//! - [`skills`]: the skill catalog and effect resolvers
//! - [`game`]: the session state machine
//! - [`snapshot`]: client-facing full-state snapshots

pub mod board;
pub mod game;
pub mod skills;
pub mod snapshot;
pub mod win;

// Re-export commonly used types
pub use board::{Board, MoveRecord, PerSeat, Pos, Seat, BOARD_SIZE, WIN_LENGTH};
pub use game::{GameError, GameEvent, GameState, SeatState};
pub use skills::Skill;
pub use snapshot::{PlayerProfile, StateSnapshot};
pub use win::check_win;
