use derive_more::Display;
use serde::{Deserialize, Serialize};

use super::Color;

/// One of the possible outcomes of a chess game.
#[derive(Debug, Display, Copy, Clone, Eq, PartialEq, Hash)]
#[derive(Serialize, Deserialize)]
#[cfg_attr(test, derive(test_strategy::Arbitrary))]
#[serde(tag = "outcome", content = "side", rename_all = "snake_case")]
pub enum Outcome {
    /// The given side delivered checkmate.
    #[display(fmt = "checkmate by the {_0} player")]
    Checkmate(Color),

    /// The given side ran out of time.
    #[display(fmt = "the {_0} player lost on time")]
    LossOnTime(Color),

    /// The given side resigned.
    #[display(fmt = "the {_0} player resigned")]
    Resignation(Color),

    #[display(fmt = "stalemate")]
    Stalemate,

    #[display(fmt = "draw by agreement")]
    DrawByAgreement,

    #[display(fmt = "draw by insufficient material")]
    DrawByInsufficientMaterial,

    #[display(fmt = "draw by threefold repetition")]
    DrawByRepetition,

    #[display(fmt = "draw by the 50-move rule")]
    DrawBy50MoveRule,
}

impl Outcome {
    /// Whether the outcome is a [draw] and neither side has won.
    ///
    /// [draw]: https://www.chessprogramming.org/Draw
    pub fn is_draw(&self) -> bool {
        !self.is_decisive()
    }

    /// Whether the outcome is decisive and one of the sides has won.
    pub fn is_decisive(&self) -> bool {
        use Outcome::*;
        matches!(self, Checkmate(_) | LossOnTime(_) | Resignation(_))
    }

    /// The winning side, if the outcome is [decisive](`Self::is_decisive`).
    pub fn winner(&self) -> Option<Color> {
        match *self {
            Outcome::Checkmate(c) => Some(c),
            Outcome::LossOnTime(c) => Some(!c),
            Outcome::Resignation(c) => Some(!c),
            _ => None,
        }
    }
}
