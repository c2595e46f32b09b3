use derive_more::{Display, Error};
use std::{fmt, str::FromStr};

use super::{Color, Square};

/// The castling rights in a chess [`Position`][`super::Position`].
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
#[cfg_attr(test, derive(test_strategy::Arbitrary))]
pub struct Castles(#[cfg_attr(test, strategy(0u8..16))] u8);

const WHITE_SHORT: u8 = 0b0001;
const WHITE_LONG: u8 = 0b0010;
const BLACK_SHORT: u8 = 0b0100;
const BLACK_LONG: u8 = 0b1000;

fn short(side: Color) -> u8 {
    match side {
        Color::White => WHITE_SHORT,
        Color::Black => BLACK_SHORT,
    }
}

fn long(side: Color) -> u8 {
    match side {
        Color::White => WHITE_LONG,
        Color::Black => BLACK_LONG,
    }
}

impl Castles {
    /// No castling rights.
    pub fn none() -> Self {
        Castles(0)
    }

    /// All castling rights.
    pub fn all() -> Self {
        Castles(WHITE_SHORT | WHITE_LONG | BLACK_SHORT | BLACK_LONG)
    }

    /// Whether the given side has kingside castling rights.
    pub fn has_short(&self, side: Color) -> bool {
        self.0 & short(side) != 0
    }

    /// Whether the given side has queenside castling rights.
    pub fn has_long(&self, side: Color) -> bool {
        self.0 & long(side) != 0
    }

    /// Revokes whichever rights depend on a piece standing on the given square.
    ///
    /// Moving to or from the square of a king or a rook forfeits the
    /// corresponding rights.
    pub fn discard(&mut self, sq: Square) {
        self.0 &= match sq {
            Square::E1 => !(WHITE_SHORT | WHITE_LONG),
            Square::H1 => !WHITE_SHORT,
            Square::A1 => !WHITE_LONG,
            Square::E8 => !(BLACK_SHORT | BLACK_LONG),
            Square::H8 => !BLACK_SHORT,
            Square::A8 => !BLACK_LONG,
            _ => return,
        }
    }
}

impl Default for Castles {
    fn default() -> Self {
        Castles::all()
    }
}

impl fmt::Display for Castles {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Castles::none() {
            return f.write_str("-");
        }

        for (right, c) in [
            (WHITE_SHORT, 'K'),
            (WHITE_LONG, 'Q'),
            (BLACK_SHORT, 'k'),
            (BLACK_LONG, 'q'),
        ] {
            if self.0 & right != 0 {
                write!(f, "{c}")?;
            }
        }

        Ok(())
    }
}

/// The reason why parsing [`Castles`] failed.
#[derive(Debug, Display, Clone, Eq, PartialEq, Error)]
#[display(fmt = "failed to parse castling rights")]
pub struct ParseCastlesError;

impl FromStr for Castles {
    type Err = ParseCastlesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "-" {
            return Ok(Castles::none());
        }

        let mut castles = Castles::none();
        for c in s.chars() {
            let right = match c {
                'K' => WHITE_SHORT,
                'Q' => WHITE_LONG,
                'k' => BLACK_SHORT,
                'q' => BLACK_LONG,
                _ => return Err(ParseCastlesError),
            };

            if castles.0 & right != 0 {
                return Err(ParseCastlesError);
            }

            castles.0 |= right;
        }

        if castles == Castles::none() {
            return Err(ParseCastlesError);
        }

        Ok(castles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_strategy::proptest;

    #[proptest]
    fn no_side_castles_without_rights(c: Color) {
        assert!(!Castles::none().has_short(c));
        assert!(!Castles::none().has_long(c));
    }

    #[proptest]
    fn every_side_castles_with_all_rights(c: Color) {
        assert!(Castles::all().has_short(c));
        assert!(Castles::all().has_long(c));
    }

    #[proptest]
    fn discarding_king_square_revokes_both_rights(c: Color) {
        let mut castles = Castles::all();
        castles.discard(match c {
            Color::White => Square::E1,
            Color::Black => Square::E8,
        });

        assert!(!castles.has_short(c));
        assert!(!castles.has_long(c));
        assert!(castles.has_short(!c));
        assert!(castles.has_long(!c));
    }

    #[proptest]
    fn discarding_rook_square_revokes_one_right(c: Color) {
        let mut castles = Castles::all();
        castles.discard(match c {
            Color::White => Square::H1,
            Color::Black => Square::H8,
        });

        assert!(!castles.has_short(c));
        assert!(castles.has_long(c));
    }

    #[proptest]
    fn discarding_unrelated_square_preserves_rights(
        cr: Castles,
        #[filter(![Square::A1, Square::E1, Square::H1, Square::A8, Square::E8, Square::H8]
            .contains(&#sq))]
        sq: Square,
    ) {
        let mut castles = cr;
        castles.discard(sq);
        assert_eq!(castles, cr);
    }

    #[proptest]
    fn parsing_printed_castles_is_an_identity(cr: Castles) {
        assert_eq!(cr.to_string().parse(), Ok(cr));
    }

    #[proptest]
    fn parsing_castles_fails_if_right_is_duplicated(
        #[strategy("KK|QQ|kk|qq")] s: String,
    ) {
        assert_eq!(Castles::from_str(&s), Err(ParseCastlesError));
    }

    #[test]
    fn parsing_empty_string_fails() {
        assert_eq!(Castles::from_str(""), Err(ParseCastlesError));
    }
}
