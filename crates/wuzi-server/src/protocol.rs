//! WebSocket protocol messages.
//!
//! Every frame is a JSON object with a `type` discriminator and the
//! payload fields inlined, e.g. `{"type":"board_click","row":3,"col":4}`.

use serde::{Deserialize, Serialize};
use wuzi_core::{PerSeat, PlayerProfile, Seat, StateSnapshot};

/// Messages sent from client to server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Pick a display name; required before matchmaking.
    Login { username: String },

    /// Join the matchmaking queue.
    FindMatch,

    /// Leave the matchmaking queue.
    CancelQueue,

    /// Declare intent to use a skill; the next board click resolves it.
    /// The skill name is validated server-side so unknown names get a
    /// proper error instead of a parse failure.
    ActivateSkill { skill: String },

    /// Click a board cell: a placement, a skill target, or the
    /// acknowledgement of a skipped turn, depending on session state.
    BoardClick { row: i64, col: i64 },

    /// Vote to restart the current match.
    Restart,
}

/// Messages sent from server to client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    LoginSuccess {
        username: String,
    },

    QueueUpdate {
        status: QueueStatus,
    },

    /// A match was found; `seat` is the receiver's own seat.
    MatchFound {
        seat: Seat,
        players: PerSeat<PlayerProfile>,
        state: StateSnapshot,
    },

    /// Full snapshot, broadcast to both seats after every mutation.
    State {
        state: StateSnapshot,
    },

    /// The opponent disconnected and the session was torn down.
    OpponentLeft,

    /// Informational, not an error (e.g. a pending rematch vote).
    Info {
        message: String,
    },

    Error {
        message: String,
    },
}

/// Matchmaking queue status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueStatus {
    /// Entered the queue by request.
    Queued,
    /// Re-queued automatically after the opponent left.
    Waiting,
    /// Removed from the queue by request.
    Cancelled,
}
