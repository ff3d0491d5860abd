//! Board representation and the move log.
//!
//! This module contains:
//! - `Seat`: the two match participants (serialized as 1/2 on the wire)
//! - `PerSeat`: a pair container indexed by seat
//! - `Pos`: a structural (row, col) board coordinate
//! - `Board`: the fixed 11x11 grid of cell owners
//! - `MoveRecord`: one entry per currently occupied placement

use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Index, IndexMut};

/// Side length of the (square) board.
pub const BOARD_SIZE: usize = 11;

/// Number of consecutive stones needed to win.
pub const WIN_LENGTH: usize = 5;

/// One of the two match participants.
///
/// Seats are numbered 1 and 2 on the wire, seat 1 always moves first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Seat {
    One,
    Two,
}

impl Seat {
    /// Both seats, in order.
    pub const ALL: [Seat; 2] = [Seat::One, Seat::Two];

    /// The other seat.
    pub fn opponent(self) -> Seat {
        match self {
            Seat::One => Seat::Two,
            Seat::Two => Seat::One,
        }
    }

    /// Wire number for this seat (1 or 2).
    pub fn number(self) -> u8 {
        match self {
            Seat::One => 1,
            Seat::Two => 2,
        }
    }

    /// Parse a wire number back into a seat.
    pub fn from_number(n: u8) -> Option<Seat> {
        match n {
            1 => Some(Seat::One),
            2 => Some(Seat::Two),
            _ => None,
        }
    }
}

impl fmt::Display for Seat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.number())
    }
}

impl Serialize for Seat {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.number())
    }
}

impl<'de> Deserialize<'de> for Seat {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let n = u8::deserialize(deserializer)?;
        Seat::from_number(n).ok_or_else(|| de::Error::custom(format!("invalid seat: {}", n)))
    }
}

/// A pair of values, one per seat.
///
/// Serializes as an object with keys `"1"` and `"2"`, the shape the
/// client expects for per-seat maps in the state snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerSeat<T> {
    #[serde(rename = "1")]
    pub one: T,
    #[serde(rename = "2")]
    pub two: T,
}

impl<T> PerSeat<T> {
    pub fn new(one: T, two: T) -> Self {
        Self { one, two }
    }

    /// Build a pair by evaluating `f` for each seat.
    pub fn from_fn(mut f: impl FnMut(Seat) -> T) -> Self {
        Self {
            one: f(Seat::One),
            two: f(Seat::Two),
        }
    }
}

impl<T> Index<Seat> for PerSeat<T> {
    type Output = T;

    fn index(&self, seat: Seat) -> &T {
        match seat {
            Seat::One => &self.one,
            Seat::Two => &self.two,
        }
    }
}

impl<T> IndexMut<Seat> for PerSeat<T> {
    fn index_mut(&mut self, seat: Seat) -> &mut T {
        match seat {
            Seat::One => &mut self.one,
            Seat::Two => &mut self.two,
        }
    }
}

/// A board coordinate.
///
/// Used as the key type for blocked-position and cold-palace lookups.
/// `Display` renders the `"row,col"` form used for JSON map keys.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Pos {
    pub row: usize,
    pub col: usize,
}

impl Pos {
    pub fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }

    /// Step by a signed offset, returning `None` when leaving the board.
    pub fn step(self, dr: isize, dc: isize) -> Option<Pos> {
        let row = self.row as isize + dr;
        let col = self.col as isize + dc;
        if (0..BOARD_SIZE as isize).contains(&row) && (0..BOARD_SIZE as isize).contains(&col) {
            Some(Pos::new(row as usize, col as usize))
        } else {
            None
        }
    }

    /// Whether this position lies on the outer edge of the board.
    pub fn is_edge(self) -> bool {
        self.row == 0 || self.col == 0 || self.row == BOARD_SIZE - 1 || self.col == BOARD_SIZE - 1
    }
}

impl fmt::Display for Pos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.row, self.col)
    }
}

/// One entry of the move log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveRecord {
    pub pos: Pos,
    pub seat: Seat,
}

/// The 11x11 grid of cell owners.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Board {
    cells: [[Option<Seat>; BOARD_SIZE]; BOARD_SIZE],
}

impl Board {
    /// An empty board.
    pub fn new() -> Self {
        Self {
            cells: [[None; BOARD_SIZE]; BOARD_SIZE],
        }
    }

    /// Whether (row, col) is inside the board.
    pub fn contains(row: usize, col: usize) -> bool {
        row < BOARD_SIZE && col < BOARD_SIZE
    }

    /// Owner of the cell, `None` when empty.
    pub fn owner(&self, pos: Pos) -> Option<Seat> {
        self.cells[pos.row][pos.col]
    }

    pub fn is_empty(&self, pos: Pos) -> bool {
        self.owner(pos).is_none()
    }

    pub fn place(&mut self, pos: Pos, seat: Seat) {
        self.cells[pos.row][pos.col] = Some(seat);
    }

    pub fn clear(&mut self, pos: Pos) {
        self.cells[pos.row][pos.col] = None;
    }

    /// All occupied positions, row-major.
    pub fn occupied(&self) -> Vec<Pos> {
        self.matching(|_, owner| owner.is_some())
    }

    /// All positions occupied by `seat`, row-major.
    pub fn stones_of(&self, seat: Seat) -> Vec<Pos> {
        self.matching(|_, owner| owner == Some(seat))
    }

    /// All empty cells on the outer edge, row-major.
    pub fn empty_edge_cells(&self) -> Vec<Pos> {
        self.matching(|pos, owner| pos.is_edge() && owner.is_none())
    }

    pub fn occupied_count(&self) -> usize {
        self.occupied().len()
    }

    /// The raw grid as wire numbers (0 empty, 1/2 owner), row-major.
    pub fn to_grid(&self) -> Vec<Vec<u8>> {
        self.cells
            .iter()
            .map(|row| row.iter().map(|c| c.map_or(0, Seat::number)).collect())
            .collect()
    }

    fn matching(&self, mut pred: impl FnMut(Pos, Option<Seat>) -> bool) -> Vec<Pos> {
        let mut out = Vec::new();
        for row in 0..BOARD_SIZE {
            for col in 0..BOARD_SIZE {
                let pos = Pos::new(row, col);
                if pred(pos, self.cells[row][col]) {
                    out.push(pos);
                }
            }
        }
        out
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}
