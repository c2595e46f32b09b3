use derive_more::{Display, Error, From};
use std::{fmt, str::FromStr};

use super::{File, ParseFileError, ParseRankError, Rank};

/// A square on the chess board.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[cfg_attr(test, derive(test_strategy::Arbitrary))]
#[repr(i8)]
#[rustfmt::skip]
pub enum Square {
    A1, B1, C1, D1, E1, F1, G1, H1,
    A2, B2, C2, D2, E2, F2, G2, H2,
    A3, B3, C3, D3, E3, F3, G3, H3,
    A4, B4, C4, D4, E4, F4, G4, H4,
    A5, B5, C5, D5, E5, F5, G5, H5,
    A6, B6, C6, D6, E6, F6, G6, H6,
    A7, B7, C7, D7, E7, F7, G7, H7,
    A8, B8, C8, D8, E8, F8, G8, H8,
}

#[rustfmt::skip]
const SQUARES: [Square; 64] = {
    use Square::*;
    [
        A1, B1, C1, D1, E1, F1, G1, H1,
        A2, B2, C2, D2, E2, F2, G2, H2,
        A3, B3, C3, D3, E3, F3, G3, H3,
        A4, B4, C4, D4, E4, F4, G4, H4,
        A5, B5, C5, D5, E5, F5, G5, H5,
        A6, B6, C6, D6, E6, F6, G6, H6,
        A7, B7, C7, D7, E7, F7, G7, H7,
        A8, B8, C8, D8, E8, F8, G8, H8,
    ]
};

impl Square {
    pub const ALL: [Square; 64] = SQUARES;

    /// Constructs [`Square`] from a pair of [`File`] and [`Rank`].
    pub fn new(f: File, r: Rank) -> Self {
        SQUARES[(f.index() | r.index() << 3) as usize]
    }

    /// This square's index in the range `0..64`.
    pub fn index(&self) -> i8 {
        *self as i8
    }

    /// This square's [`File`].
    pub fn file(&self) -> File {
        File::new(self.index() & 0b111)
    }

    /// This square's [`Rank`].
    pub fn rank(&self) -> Rank {
        Rank::new(self.index() >> 3)
    }

    /// The square offset by the given number of files and ranks, if on the board.
    pub fn shift(&self, df: i8, dr: i8) -> Option<Square> {
        let f = self.file().index() + df;
        let r = self.rank().index() + dr;

        if (0..8).contains(&f) && (0..8).contains(&r) {
            Some(Square::new(File::new(f), Rank::new(r)))
        } else {
            None
        }
    }
}

impl fmt::Display for Square {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.file(), f)?;
        fmt::Display::fmt(&self.rank(), f)?;
        Ok(())
    }
}

/// The reason why parsing [`Square`] failed.
#[derive(Debug, Display, Clone, Eq, PartialEq, Error, From)]
pub enum ParseSquareError {
    #[display(fmt = "failed to parse square")]
    InvalidFile(ParseFileError),
    #[display(fmt = "failed to parse square")]
    InvalidRank(ParseRankError),
}

impl FromStr for Square {
    type Err = ParseSquareError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let i = s.char_indices().nth(1).map_or_else(|| s.len(), |(i, _)| i);
        Ok(Square::new(s[..i].parse()?, s[i..].parse()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_strategy::proptest;

    #[proptest]
    fn new_constructs_square_from_pair_of_file_and_rank(sq: Square) {
        assert_eq!(Square::new(sq.file(), sq.rank()), sq);
    }

    #[proptest]
    fn square_has_an_index(sq: Square) {
        assert_eq!(Square::ALL[sq.index() as usize], sq);
    }

    #[proptest]
    fn shifting_by_zero_is_an_identity(sq: Square) {
        assert_eq!(sq.shift(0, 0), Some(sq));
    }

    #[proptest]
    fn shifting_off_the_board_returns_none(sq: Square) {
        assert_eq!(sq.shift(8, 0), None);
        assert_eq!(sq.shift(0, -8), None);
    }

    #[proptest]
    fn shifting_within_the_board_preserves_distance(
        sq: Square,
        #[strategy(-7i8..=7)] df: i8,
        #[strategy(-7i8..=7)] dr: i8,
    ) {
        if let Some(other) = sq.shift(df, dr) {
            assert_eq!(other.file().index() - sq.file().index(), df);
            assert_eq!(other.rank().index() - sq.rank().index(), dr);
        }
    }

    #[proptest]
    fn parsing_printed_square_is_an_identity(sq: Square) {
        assert_eq!(sq.to_string().parse(), Ok(sq));
    }

    #[proptest]
    fn parsing_square_fails_if_file_is_invalid(#[strategy("[^a-h].*")] s: String) {
        use ParseSquareError::*;
        assert_eq!(s.parse::<Square>(), Err(InvalidFile(ParseFileError)));
    }

    #[proptest]
    fn parsing_square_fails_if_rank_is_invalid(#[strategy("[a-h][^1-8]*")] s: String) {
        use ParseSquareError::*;
        assert_eq!(s.parse::<Square>(), Err(InvalidRank(ParseRankError)));
    }
}
