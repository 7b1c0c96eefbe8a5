//! Piece catalog and the falling piece.
//!
//! Every orientation is four cell indices into a 4x4 window, `index = row * 4 + col`.
//! Collision and drawing decode them back with `(index / 4, index % 4)`.

/// One orientation: four occupied indices in the 4x4 window.
pub type RotationVariant = [u8; 4];

/// The seven piece types, in palette order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PieceType {
    Line,
    Z,
    S,
    ReverseL,
    L,
    T,
    Square,
}

impl PieceType {
    pub const ALL: [Self; 7] = [
        Self::Line,
        Self::Z,
        Self::S,
        Self::ReverseL,
        Self::L,
        Self::T,
        Self::Square,
    ];

    /// Ordered rotation variants; rotation indices cycle modulo their count.
    pub fn variants(self) -> &'static [RotationVariant] {
        match self {
            Self::Line => &[[1, 5, 9, 13], [4, 5, 6, 7]],
            Self::Z => &[[4, 5, 9, 10], [2, 6, 5, 9]],
            Self::S => &[[6, 7, 9, 10], [1, 5, 6, 10]],
            Self::ReverseL => &[[1, 2, 5, 9], [0, 4, 5, 6], [1, 5, 9, 8], [4, 5, 6, 10]],
            Self::L => &[[1, 2, 6, 10], [5, 6, 7, 9], [2, 6, 10, 11], [3, 5, 6, 7]],
            Self::T => &[[1, 4, 5, 6], [1, 4, 5, 9], [4, 5, 6, 9], [1, 5, 6, 9]],
            Self::Square => &[[1, 2, 5, 6]],
        }
    }

    /// Position in [`PieceType::ALL`].
    pub fn ordinal(self) -> usize {
        self as usize
    }

    /// Palette index 1..=7; 0 is reserved for empty board cells.
    pub fn color_id(self) -> u8 {
        self.ordinal() as u8 + 1
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Line => "Line",
            Self::Z => "Z",
            Self::S => "S",
            Self::ReverseL => "Reverse L",
            Self::L => "L",
            Self::T => "T",
            Self::Square => "Square",
        }
    }
}

/// Rotation command. No kicks: a blocked rotation is rejected outright.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rotation {
    Left,
    Right,
    /// 180 degrees.
    Half,
}

/// The piece currently falling. `row`/`col` place the top-left of its 4x4 window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActivePiece {
    pub kind: PieceType,
    pub rotation: usize,
    pub row: i32,
    pub col: i32,
    pub color_id: u8,
}

impl ActivePiece {
    pub fn spawn(kind: PieceType, row: i32, col: i32) -> Self {
        Self {
            kind,
            rotation: 0,
            row,
            col,
            color_id: kind.color_id(),
        }
    }

    pub fn variant(&self) -> &'static RotationVariant {
        let variants = self.kind.variants();
        &variants[self.rotation % variants.len()]
    }

    /// (row, col) offsets inside the 4x4 window for the current orientation.
    pub fn cells(&self) -> [(i32, i32); 4] {
        let variant = *self.variant();
        variant.map(|index| (i32::from(index / 4), i32::from(index % 4)))
    }

    /// Board coordinates (row, col) covered by the piece.
    pub fn absolute_cells(&self) -> [(i32, i32); 4] {
        self.cells().map(|(r, c)| (r + self.row, c + self.col))
    }

    fn variant_count(&self) -> usize {
        self.kind.variants().len()
    }

    pub fn rotate_left(&mut self) {
        self.rotation = (self.rotation + 1) % self.variant_count();
    }

    /// Steps back one variant; 0 wraps to the last variant.
    pub fn rotate_right(&mut self) {
        let n = self.variant_count();
        self.rotation = (self.rotation + n - 1) % n;
    }

    pub fn rotate_180(&mut self) {
        self.rotation = (self.rotation + 2) % self.variant_count();
    }

    pub fn rotate(&mut self, rotation: Rotation) {
        match rotation {
            Rotation::Left => self.rotate_left(),
            Rotation::Right => self.rotate_right(),
            Rotation::Half => self.rotate_180(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn any_kind() -> impl Strategy<Value = PieceType> {
        prop::sample::select(PieceType::ALL.to_vec())
    }

    #[test]
    fn variant_counts_match_catalog() {
        let counts: Vec<usize> = PieceType::ALL.iter().map(|k| k.variants().len()).collect();
        assert_eq!(counts, vec![2, 2, 2, 4, 4, 4, 1]);
    }

    #[test]
    fn every_variant_has_four_distinct_cells_in_window() {
        for kind in PieceType::ALL {
            for variant in kind.variants() {
                let mut sorted = *variant;
                sorted.sort_unstable();
                assert!(sorted.windows(2).all(|w| w[0] != w[1]), "{kind:?} {variant:?}");
                assert!(sorted.iter().all(|&i| i < 16));
            }
        }
    }

    #[test]
    fn spawn_assigns_color_from_ordinal() {
        let ids: Vec<u8> = PieceType::ALL
            .iter()
            .map(|&k| ActivePiece::spawn(k, 0, 3).color_id)
            .collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5, 6, 7]);
        assert_eq!(ActivePiece::spawn(PieceType::T, 0, 3).rotation, 0);
    }

    #[test]
    fn cells_decode_row_major_indices() {
        let p = ActivePiece::spawn(PieceType::Line, 0, 0);
        assert_eq!(p.cells(), [(0, 1), (1, 1), (2, 1), (3, 1)]);
        let p = ActivePiece::spawn(PieceType::Square, 2, 5);
        assert_eq!(p.absolute_cells(), [(2, 6), (2, 7), (3, 6), (3, 7)]);
    }

    #[test]
    fn rotate_right_from_zero_wraps_to_last() {
        let mut p = ActivePiece::spawn(PieceType::T, 0, 3);
        p.rotate_right();
        assert_eq!(p.rotation, 3);
        let mut sq = ActivePiece::spawn(PieceType::Square, 0, 3);
        sq.rotate_right();
        assert_eq!(sq.rotation, 0);
    }

    #[test]
    fn rotate_180_on_two_variant_piece_is_identity() {
        let mut p = ActivePiece::spawn(PieceType::Z, 0, 3);
        p.rotate_180();
        assert_eq!(p.rotation, 0);
        p.rotate_left();
        p.rotate_180();
        assert_eq!(p.rotation, 1);
    }

    proptest! {
        #[test]
        fn rotate_left_cycles_back(kind in any_kind(), start in 0usize..4) {
            let mut p = ActivePiece::spawn(kind, 0, 3);
            p.rotation = start % kind.variants().len();
            let original = p.rotation;
            for _ in 0..kind.variants().len() {
                p.rotate_left();
            }
            prop_assert_eq!(p.rotation, original);
        }

        #[test]
        fn rotate_right_undoes_rotate_left(kind in any_kind(), start in 0usize..4) {
            let mut p = ActivePiece::spawn(kind, 0, 3);
            p.rotation = start % kind.variants().len();
            let original = p.rotation;
            p.rotate_left();
            p.rotate_right();
            prop_assert_eq!(p.rotation, original);
            p.rotate(Rotation::Right);
            p.rotate(Rotation::Left);
            prop_assert_eq!(p.rotation, original);
        }
    }
}
