//! Rules engine for a single 3x3 game.
//!
//! [`Board`] is a pure state machine: it knows nothing about players or
//! connections, only markers, cells and turn order. All legality checks for
//! a move happen in [`Board::apply`].

use crate::error::MoveError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the two symbols placed on the board. `X` always moves first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Marker {
  X,
  O,
}

impl Marker {
  /// The opposing marker.
  pub fn other(self) -> Self {
    match self {
      Marker::X => Marker::O,
      Marker::O => Marker::X,
    }
  }
}

impl fmt::Display for Marker {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Marker::X => write!(f, "x"),
      Marker::O => write!(f, "o"),
    }
  }
}

/// A board position, row-major from 0 (top-left) to 8 (bottom-right).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Cell(u8);

impl Cell {
  pub const ALL: [Cell; 9] = [
    Cell(0),
    Cell(1),
    Cell(2),
    Cell(3),
    Cell(4),
    Cell(5),
    Cell(6),
    Cell(7),
    Cell(8),
  ];

  /// Returns `None` for anything outside 0..=8.
  pub fn new(index: usize) -> Option<Self> {
    if index < 9 {
      Some(Cell(index as u8))
    } else {
      None
    }
  }

  pub fn index(self) -> usize {
    self.0 as usize
  }
}

impl TryFrom<u8> for Cell {
  type Error = String;

  fn try_from(value: u8) -> Result<Self, Self::Error> {
    Cell::new(value as usize).ok_or_else(|| format!("cell {} is outside 0..=8", value))
  }
}

impl From<Cell> for u8 {
  fn from(cell: Cell) -> Self {
    cell.0
  }
}

impl fmt::Display for Cell {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

pub type Line = [Cell; 3];

/// Rows, then columns, then diagonals. Scan order decides which line is
/// reported if more than one is complete.
pub const WINNING_LINES: [Line; 8] = [
  [Cell(0), Cell(1), Cell(2)],
  [Cell(3), Cell(4), Cell(5)],
  [Cell(6), Cell(7), Cell(8)],
  [Cell(0), Cell(3), Cell(6)],
  [Cell(1), Cell(4), Cell(7)],
  [Cell(2), Cell(5), Cell(8)],
  [Cell(0), Cell(4), Cell(8)],
  [Cell(2), Cell(4), Cell(6)],
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
  Waiting,
  Playing,
  Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Winner {
  Marker(Marker),
  Draw,
}

// Serialized flat: "x", "o" or "draw".
impl Serialize for Winner {
  fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    match self {
      Winner::Marker(marker) => marker.serialize(serializer),
      Winner::Draw => serializer.serialize_str("draw"),
    }
  }
}

/// Result of an accepted move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
  Continue,
  Win { marker: Marker, line: Line },
  Draw,
}

impl Outcome {
  /// Win or draw.
  pub fn is_terminal(&self) -> bool {
    !matches!(self, Outcome::Continue)
  }
}

/// An accepted move: the validated cell and what it led to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Played {
  pub cell: Cell,
  pub outcome: Outcome,
}

/// Serializable view of a board.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardSnapshot {
  pub cells: [Option<Marker>; 9],
  pub current_turn: Marker,
  pub status: Status,
  pub winner: Option<Winner>,
  pub winning_line: Option<Line>,
}

#[derive(Debug, Clone)]
pub struct Board {
  cells: [Option<Marker>; 9],
  current_turn: Marker,
  status: Status,
  winner: Option<Winner>,
  winning_line: Option<Line>,
}

impl Board {
  /// Empty board, waiting for players, X to move.
  pub fn new() -> Self {
    Self {
      cells: [None; 9],
      current_turn: Marker::X,
      status: Status::Waiting,
      winner: None,
      winning_line: None,
    }
  }

  /// Moves a waiting board into play. No effect in any other status.
  pub fn start(&mut self) {
    if self.status == Status::Waiting {
      self.status = Status::Playing;
    }
  }

  /// Validates and applies `marker` playing `cell`.
  ///
  /// Preconditions are checked in a fixed order: game active, marker's turn,
  /// cell in range, cell empty. A rejected move leaves the board untouched.
  ///
  /// On a win or draw the board finishes and `current_turn` keeps pointing at
  /// the marker that made the final move.
  pub fn apply(&mut self, marker: Marker, cell: usize) -> Result<Played, MoveError> {
    if self.status != Status::Playing {
      return Err(MoveError::InactiveGame);
    }
    if marker != self.current_turn {
      return Err(MoveError::OutOfTurn);
    }
    let cell = Cell::new(cell).ok_or(MoveError::InvalidCell)?;
    if self.cells[cell.index()].is_some() {
      return Err(MoveError::CellOccupied);
    }

    self.cells[cell.index()] = Some(marker);

    let outcome = self.evaluate();
    match outcome {
      Outcome::Continue => self.current_turn = self.current_turn.other(),
      Outcome::Win { marker, line } => {
        self.status = Status::Finished;
        self.winner = Some(Winner::Marker(marker));
        self.winning_line = Some(line);
      }
      Outcome::Draw => {
        self.status = Status::Finished;
        self.winner = Some(Winner::Draw);
      }
    }
    Ok(Played { cell, outcome })
  }

  fn evaluate(&self) -> Outcome {
    for line in WINNING_LINES {
      let [a, b, c] = line;
      if let Some(marker) = self.cells[a.index()] {
        if self.cells[b.index()] == Some(marker) && self.cells[c.index()] == Some(marker) {
          return Outcome::Win { marker, line };
        }
      }
    }

    if self.is_full() {
      Outcome::Draw
    } else {
      Outcome::Continue
    }
  }

  /// Marker occupying `cell`, if any.
  pub fn get(&self, cell: Cell) -> Option<Marker> {
    self.cells[cell.index()]
  }

  pub fn is_full(&self) -> bool {
    self.cells.iter().all(Option::is_some)
  }

  pub fn current_turn(&self) -> Marker {
    self.current_turn
  }

  pub fn status(&self) -> Status {
    self.status
  }

  pub fn winner(&self) -> Option<Winner> {
    self.winner
  }

  pub fn winning_line(&self) -> Option<Line> {
    self.winning_line
  }

  /// Copy of the full board state for serialization.
  pub fn snapshot(&self) -> BoardSnapshot {
    BoardSnapshot {
      cells: self.cells,
      current_turn: self.current_turn,
      status: self.status,
      winner: self.winner,
      winning_line: self.winning_line,
    }
  }
}

impl Default for Board {
  fn default() -> Self {
    Self::new()
  }
}
