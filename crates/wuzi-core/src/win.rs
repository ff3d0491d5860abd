//! Five-in-a-row detection with the cold-palace exclusion.

use crate::board::{Board, Pos, Seat, WIN_LENGTH};
use std::collections::HashSet;

/// The four undirected line axes: horizontal, vertical, two diagonals.
const AXES: [(isize, isize); 4] = [(0, 1), (1, 0), (1, 1), (1, -1)];

/// Does the stone just placed at `pos` complete a line of at least
/// [`WIN_LENGTH`] for `seat`?
///
/// A cold-palace cell breaks the chain even when it is owned by `seat`;
/// boundaries, empty cells, and opposing stones end the walk as usual.
pub fn check_win(board: &Board, cold_palace: &HashSet<Pos>, seat: Seat, pos: Pos) -> bool {
    AXES.iter().any(|&(dr, dc)| {
        let count = 1
            + count_direction(board, cold_palace, seat, pos, dr, dc)
            + count_direction(board, cold_palace, seat, pos, -dr, -dc);
        count >= WIN_LENGTH
    })
}

fn count_direction(
    board: &Board,
    cold_palace: &HashSet<Pos>,
    seat: Seat,
    from: Pos,
    dr: isize,
    dc: isize,
) -> usize {
    let mut count = 0;
    let mut cursor = from;
    while let Some(next) = cursor.step(dr, dc) {
        if board.owner(next) != Some(seat) || cold_palace.contains(&next) {
            break;
        }
        count += 1;
        cursor = next;
    }
    count
}
