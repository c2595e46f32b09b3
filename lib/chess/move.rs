use derive_more::{Deref, Display, Error, From};
use std::{fmt, str::FromStr};

use super::{ParsePromotionError, ParseSquareError, Promotion, Role, Square};

/// A chess move in [pure coordinate notation].
///
/// [pure coordinate notation]: https://www.chessprogramming.org/Algebraic_Chess_Notation#Pure_coordinate_notation
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[cfg_attr(test, derive(test_strategy::Arbitrary))]
pub struct Move(pub Square, pub Square, pub Promotion);

impl Move {
    /// The square this move starts from.
    pub fn whence(&self) -> Square {
        self.0
    }

    /// The square this move ends on.
    pub fn whither(&self) -> Square {
        self.1
    }

    /// The promotion specified by this move.
    pub fn promotion(&self) -> Promotion {
        self.2
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.whence(), self.whither(), self.promotion())
    }
}

/// The reason why parsing [`Move`] failed.
#[derive(Debug, Display, Clone, Eq, PartialEq, Error, From)]
pub enum ParseMoveError {
    #[display(fmt = "failed to parse move")]
    InvalidSquare(ParseSquareError),
    #[display(fmt = "failed to parse move")]
    InvalidPromotion(ParsePromotionError),
}

impl FromStr for Move {
    type Err = ParseMoveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut indices = s.char_indices().map(|(i, _)| i);
        let i = indices.nth(2).unwrap_or(s.len());
        let j = indices.nth(1).unwrap_or(s.len());

        Ok(Move(s[..i].parse()?, s[i..j].parse()?, s[j..].parse()?))
    }
}

/// A [`Move`] annotated with the context it was generated in.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Deref)]
pub struct MoveContext(#[deref] pub Move, pub Role, pub Option<(Role, Square)>);

impl MoveContext {
    /// The [`Role`] of the piece moved.
    pub fn role(&self) -> Role {
        self.1
    }

    /// The [`Role`] and [`Square`] of the piece captured.
    pub fn capture(&self) -> Option<(Role, Square)> {
        self.2
    }

    /// Whether this is a capture move.
    pub fn is_capture(&self) -> bool {
        self.capture().is_some()
    }

    /// Whether this is a promotion move.
    pub fn is_promotion(&self) -> bool {
        self.promotion() != Promotion::None
    }

    /// Whether this is a castling move.
    pub fn is_castling(&self) -> bool {
        self.role() == Role::King && (self.whence().file().index() - self.whither().file().index()).abs() > 1
    }

    /// Whether this is an en passant capture move.
    pub fn is_en_passant(&self) -> bool {
        self.capture().is_some_and(|(_, sq)| self.whither() != sq)
    }

    /// Whether this is a pawn move of two squares from its starting rank.
    pub fn is_double_push(&self) -> bool {
        self.role() == Role::Pawn
            && (self.whence().rank().index() - self.whither().rank().index()).abs() == 2
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_strategy::proptest;

    #[proptest]
    fn move_exposes_whence_whither_and_promotion(m: Move) {
        assert_eq!(Move(m.whence(), m.whither(), m.promotion()), m);
    }

    #[proptest]
    fn parsing_printed_move_is_an_identity(m: Move) {
        assert_eq!(m.to_string().parse(), Ok(m));
    }

    #[proptest]
    fn parsing_move_fails_if_whence_is_invalid(#[strategy("[^a-h].*")] s: String) {
        assert!(matches!(
            s.parse::<Move>(),
            Err(ParseMoveError::InvalidSquare(_))
        ));
    }

    #[proptest]
    fn en_passant_implies_capture(ctx: (Move, Role, Option<(Role, Square)>)) {
        let ctx = MoveContext(ctx.0, ctx.1, ctx.2);
        assert!(!ctx.is_en_passant() || ctx.is_capture());
    }

    #[proptest]
    fn only_the_king_castles(m: Move, #[filter(#r != Role::King)] r: Role) {
        assert!(!MoveContext(m, r, None).is_castling());
    }
}
