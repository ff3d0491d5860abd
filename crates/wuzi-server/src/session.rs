//! Session hosting: one live match bound to two connections.

use uuid::Uuid;
use wuzi_core::{GameError, GameEvent, GameState, PerSeat, Pos, Seat, Skill, StateSnapshot};

/// A live match between two connected clients.
///
/// All mutation goes through the owned [`GameState`]; exclusive access
/// via the server's session map is the per-session serialization point.
pub struct GameSession {
    pub id: Uuid,
    /// Connection ids, by seat.
    pub clients: PerSeat<Uuid>,
    pub game: GameState,
}

impl GameSession {
    pub fn new(id: Uuid, clients: PerSeat<Uuid>, usernames: PerSeat<String>) -> Self {
        Self {
            id,
            clients,
            game: GameState::new(usernames),
        }
    }

    /// Which seat a connection occupies, if any.
    pub fn seat_of(&self, client_id: Uuid) -> Option<Seat> {
        Seat::ALL
            .into_iter()
            .find(|&seat| self.clients[seat] == client_id)
    }

    /// The other connection in this session.
    pub fn other_client(&self, client_id: Uuid) -> Option<Uuid> {
        self.seat_of(client_id)
            .map(|seat| self.clients[seat.opponent()])
    }

    pub fn handle_click(
        &mut self,
        client_id: Uuid,
        pos: Pos,
    ) -> Result<Vec<GameEvent>, SessionError> {
        let seat = self.seat_of(client_id).ok_or(SessionError::NotSeated)?;
        Ok(self.game.handle_click(seat, pos)?)
    }

    pub fn activate_skill(
        &mut self,
        client_id: Uuid,
        skill: Skill,
    ) -> Result<Vec<GameEvent>, SessionError> {
        let seat = self.seat_of(client_id).ok_or(SessionError::NotSeated)?;
        Ok(self.game.activate_skill(seat, skill)?)
    }

    pub fn vote_restart(&mut self, client_id: Uuid) -> Result<Vec<GameEvent>, SessionError> {
        let seat = self.seat_of(client_id).ok_or(SessionError::NotSeated)?;
        Ok(self.game.vote_restart(seat)?)
    }

    pub fn snapshot(&self) -> StateSnapshot {
        self.game.snapshot()
    }
}

/// Errors from routing an action into a session.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("You are not seated in this match")]
    NotSeated,

    #[error(transparent)]
    Game(#[from] GameError),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_session() -> (GameSession, Uuid, Uuid) {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let session = GameSession::new(
            Uuid::new_v4(),
            PerSeat::new(a, b),
            PerSeat::new("Ming".into(), "Hua".into()),
        );
        (session, a, b)
    }

    #[test]
    fn clients_map_to_their_seats() {
        let (session, a, b) = new_session();
        assert_eq!(session.seat_of(a), Some(Seat::One));
        assert_eq!(session.seat_of(b), Some(Seat::Two));
        assert_eq!(session.seat_of(Uuid::new_v4()), None);
        assert_eq!(session.other_client(a), Some(b));
        assert_eq!(session.other_client(b), Some(a));
    }

    #[test]
    fn actions_route_by_connection() {
        let (mut session, a, b) = new_session();

        session.handle_click(a, Pos::new(5, 5)).unwrap();
        assert_eq!(session.game.current_player, Seat::Two);

        assert_eq!(
            session.handle_click(a, Pos::new(5, 6)),
            Err(SessionError::Game(GameError::NotYourTurn))
        );
        assert_eq!(
            session.handle_click(Uuid::new_v4(), Pos::new(5, 6)),
            Err(SessionError::NotSeated)
        );

        session.handle_click(b, Pos::new(5, 6)).unwrap();
        let snap = session.snapshot();
        assert_eq!(snap.board[5][5], 1);
        assert_eq!(snap.board[5][6], 2);
    }
}
