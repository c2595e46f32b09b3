use derive_more::{Display, Error};
use std::{fmt, str::FromStr};

use super::{Color, Role};

/// A chess [piece][`Role`] of a certain [`Color`].
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[cfg_attr(test, derive(test_strategy::Arbitrary))]
pub struct Piece(pub Role, pub Color);

impl Piece {
    /// This piece's [`Role`].
    pub fn role(&self) -> Role {
        self.0
    }

    /// This piece's [`Color`].
    pub fn color(&self) -> Color {
        self.1
    }

    /// A piece of the same [`Role`] and opposite [`Color`].
    pub fn flip(&self) -> Self {
        Piece(self.0, !self.1)
    }
}

impl fmt::Display for Piece {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let c = match self.role() {
            Role::Pawn => 'p',
            Role::Knight => 'n',
            Role::Bishop => 'b',
            Role::Rook => 'r',
            Role::Queen => 'q',
            Role::King => 'k',
        };

        match self.color() {
            Color::White => write!(f, "{}", c.to_ascii_uppercase()),
            Color::Black => write!(f, "{c}"),
        }
    }
}

/// The reason why parsing [`Piece`] failed.
#[derive(Debug, Display, Clone, Eq, PartialEq, Error)]
#[display(fmt = "failed to parse piece")]
pub struct ParsePieceError;

impl FromStr for Piece {
    type Err = ParsePieceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.chars();

        let (c, None) = (chars.next().ok_or(ParsePieceError)?, chars.next()) else {
            return Err(ParsePieceError);
        };

        let role = match c.to_ascii_lowercase() {
            'p' => Role::Pawn,
            'n' => Role::Knight,
            'b' => Role::Bishop,
            'r' => Role::Rook,
            'q' => Role::Queen,
            'k' => Role::King,
            _ => return Err(ParsePieceError),
        };

        let color = match c.is_ascii_uppercase() {
            true => Color::White,
            false => Color::Black,
        };

        Ok(Piece(role, color))
    }
}
