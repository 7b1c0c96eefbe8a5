//! Playfield: frozen cells and line clearing.

use crate::pieces::ActivePiece;

/// Empty cell sentinel; 1..=7 are frozen palette indices.
pub const EMPTY: u8 = 0;

/// Grid of frozen cells. Row 0 is the top (spawn) row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Board {
    pub width: usize,
    pub height: usize,
    /// rows[row][col]
    rows: Vec<Vec<u8>>,
}

impl Board {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            rows: vec![vec![EMPTY; width]; height],
        }
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> Option<u8> {
        self.rows.get(row).and_then(|r| r.get(col)).copied()
    }

    /// Writes a cell; out-of-range coordinates and colours above 7 are ignored.
    #[inline]
    pub fn set(&mut self, row: usize, col: usize, color_id: u8) {
        if color_id > 7 {
            return;
        }
        if let Some(cell) = self.rows.get_mut(row).and_then(|r| r.get_mut(col)) {
            *cell = color_id;
        }
    }

    pub fn rows(&self) -> &[Vec<u8>] {
        &self.rows
    }

    fn blocked(&self, row: i32, col: i32) -> bool {
        if row < 0 || col < 0 {
            return true;
        }
        self.get(row as usize, col as usize) != Some(EMPTY)
    }

    /// True if any piece cell is outside the grid or on a frozen cell.
    /// All four cells are checked.
    pub fn intersects(&self, piece: &ActivePiece) -> bool {
        piece
            .absolute_cells()
            .iter()
            .fold(false, |hit, &(row, col)| self.blocked(row, col) | hit)
    }

    /// Writes the piece's colour into every cell it covers.
    pub fn freeze(&mut self, piece: &ActivePiece) {
        for (row, col) in piece.absolute_cells() {
            if row >= 0 && col >= 0 {
                self.set(row as usize, col as usize, piece.color_id);
            }
        }
    }

    pub fn is_row_full(&self, row: usize) -> bool {
        self.rows
            .get(row)
            .is_some_and(|r| r.iter().all(|&c| c != EMPTY))
    }

    /// Clears full rows from row 1 downward and returns how many were cleared.
    ///
    /// Row 0 is never scanned. Each clear copies row r-1 into row r for r down to 2,
    /// so rows 0 and 1 are never overwritten and row 1 ends up duplicated into row 2.
    /// A full row 1 counts as cleared without moving anything.
    pub fn clear_completed_lines(&mut self) -> u32 {
        let mut cleared = 0;
        for row in 1..self.height {
            if !self.is_row_full(row) {
                continue;
            }
            cleared += 1;
            for r in (2..=row).rev() {
                let above = self.rows[r - 1].clone();
                self.rows[r] = above;
            }
        }
        cleared
    }
}

#[cfg(test)]
pub(crate) fn board_from_rows(width: usize, rows: &[&str]) -> Board {
    // '.' is empty, digits are colour ids
    let mut board = Board::new(width, rows.len());
    for (r, line) in rows.iter().enumerate() {
        for (c, ch) in line.chars().enumerate() {
            if let Some(d) = ch.to_digit(10) {
                board.set(r, c, d as u8);
            }
        }
    }
    board
}
