use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::Reject;
use crate::chess::{Color, Move, Outcome, Position};

/// A unique identifier for a [`Game`].
#[derive(Debug, Display, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[derive(Serialize, Deserialize)]
#[serde(transparent)]
pub struct GameId(pub u64);

/// A paired game between two players.
///
/// Holds the authoritative [`Position`] along with the move history needed to
/// judge threefold repetition, and reaches exactly one terminal [`Outcome`].
#[derive(Debug, Clone)]
pub struct Game {
    id: GameId,
    players: [String; 2],
    position: Position,
    moves: Vec<Move>,
    repetitions: HashMap<u64, u32>,
    draw_offer: Option<Color>,
    outcome: Option<Outcome>,
}

impl Game {
    /// Starts a game between the two players from the standard position.
    pub fn new(id: GameId, white: String, black: String) -> Self {
        let position = Position::default();
        let mut repetitions = HashMap::new();
        repetitions.insert(position.signature(), 1);

        Game {
            id,
            players: [white, black],
            position,
            moves: Vec::new(),
            repetitions,
            draw_offer: None,
            outcome: None,
        }
    }

    pub fn id(&self) -> GameId {
        self.id
    }

    /// The player of the given color.
    pub fn player(&self, side: Color) -> &str {
        match side {
            Color::White => &self.players[0],
            Color::Black => &self.players[1],
        }
    }

    /// The color the given player plays, if they participate at all.
    pub fn color_of(&self, username: &str) -> Option<Color> {
        Color::iter().find(|&c| self.player(c) == username)
    }

    /// The current position.
    pub fn position(&self) -> &Position {
        &self.position
    }

    /// The moves played so far.
    pub fn moves(&self) -> &[Move] {
        &self.moves
    }

    /// The terminal outcome, once reached.
    pub fn outcome(&self) -> Option<Outcome> {
        self.outcome
    }

    /// The side whose draw offer is outstanding.
    pub fn draw_offer(&self) -> Option<Color> {
        self.draw_offer
    }

    fn ongoing(&self) -> Result<(), Reject> {
        match self.outcome {
            None => Ok(()),
            Some(_) => Err(Reject::GameNotFound),
        }
    }

    /// Plays a move for the given side.
    ///
    /// Rejected requests leave the game untouched; a successful move retires
    /// any outstanding draw offer and may end the game.
    pub fn play(&mut self, side: Color, m: Move) -> Result<(), Reject> {
        self.ongoing()?;

        if side != self.position.turn() {
            return Err(Reject::NotYourTurn);
        }

        let (next, _) = self.position.play(m).map_err(|_| Reject::IllegalMove)?;

        let seen = self.repetitions.entry(next.signature()).or_insert(0);
        *seen += 1;

        self.outcome = if *seen >= 3 {
            Some(Outcome::DrawByRepetition)
        } else {
            next.outcome()
        };

        self.position = next;
        self.moves.push(m);
        self.draw_offer = None;
        Ok(())
    }

    /// Ends the game by resignation of the given side.
    pub fn resign(&mut self, side: Color) -> Result<Outcome, Reject> {
        self.ongoing()?;
        let outcome = Outcome::Resignation(side);
        self.outcome = Some(outcome);
        Ok(outcome)
    }

    /// Records a draw offer by the given side.
    pub fn offer_draw(&mut self, side: Color) -> Result<(), Reject> {
        self.ongoing()?;
        self.draw_offer = Some(side);
        Ok(())
    }

    /// Accepts the opponent's outstanding draw offer.
    pub fn accept_draw(&mut self, side: Color) -> Result<Outcome, Reject> {
        self.ongoing()?;

        if self.draw_offer != Some(!side) {
            return Err(Reject::NoDrawOffer);
        }

        self.outcome = Some(Outcome::DrawByAgreement);
        Ok(Outcome::DrawByAgreement)
    }

    /// Ends the game on time against the given side.
    pub fn flag(&mut self, side: Color) -> Result<Outcome, Reject> {
        self.ongoing()?;
        let outcome = Outcome::LossOnTime(side);
        self.outcome = Some(outcome);
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn game() -> Game {
        Game::new(GameId(1), "alice".to_string(), "bob".to_string())
    }

    fn m(s: &str) -> Move {
        s.parse().unwrap()
    }

    #[test]
    fn colors_are_assigned_on_pairing() {
        let game = game();
        assert_eq!(game.color_of("alice"), Some(Color::White));
        assert_eq!(game.color_of("bob"), Some(Color::Black));
        assert_eq!(game.color_of("carol"), None);
    }

    #[test]
    fn moves_alternate_between_sides() {
        let mut game = game();
        game.play(Color::White, m("e2e4")).unwrap();
        assert_eq!(game.play(Color::White, m("d2d4")), Err(Reject::NotYourTurn));
        game.play(Color::Black, m("e7e5")).unwrap();
        assert_eq!(game.moves().len(), 2);
    }

    #[test]
    fn rejected_moves_leave_the_position_untouched() {
        let mut game = game();
        let before = game.position().clone();

        assert_eq!(game.play(Color::Black, m("e7e5")), Err(Reject::NotYourTurn));
        assert_eq!(game.play(Color::White, m("e2e5")), Err(Reject::IllegalMove));
        assert_eq!(game.position(), &before);
        assert!(game.moves().is_empty());
    }

    #[test]
    fn fools_mate_terminates_the_game() {
        let mut game = game();
        game.play(Color::White, m("f2f3")).unwrap();
        game.play(Color::Black, m("e7e5")).unwrap();
        game.play(Color::White, m("g2g4")).unwrap();
        game.play(Color::Black, m("d8h4")).unwrap();

        assert_eq!(game.outcome(), Some(Outcome::Checkmate(Color::Black)));
        assert_eq!(
            game.play(Color::White, m("a2a3")),
            Err(Reject::GameNotFound)
        );
    }

    #[test]
    fn threefold_repetition_draws_the_game() {
        let mut game = game();

        for _ in 0..2 {
            game.play(Color::White, m("g1f3")).unwrap();
            game.play(Color::Black, m("g8f6")).unwrap();
            game.play(Color::White, m("f3g1")).unwrap();
            game.play(Color::Black, m("f6g8")).unwrap();
        }

        assert_eq!(game.outcome(), Some(Outcome::DrawByRepetition));
    }

    #[test]
    fn resignation_loses_the_game() {
        let mut game = game();
        assert_eq!(
            game.resign(Color::White),
            Ok(Outcome::Resignation(Color::White))
        );
        assert_eq!(game.outcome().and_then(|o| o.winner()), Some(Color::Black));
    }

    #[test]
    fn accepted_draw_offer_ends_the_game() {
        let mut game = game();
        game.offer_draw(Color::White).unwrap();
        assert_eq!(
            game.accept_draw(Color::Black),
            Ok(Outcome::DrawByAgreement)
        );
    }

    #[test]
    fn accepting_without_an_offer_is_rejected() {
        let mut game = game();
        assert_eq!(game.accept_draw(Color::Black), Err(Reject::NoDrawOffer));
    }

    #[test]
    fn accepting_ones_own_offer_is_rejected() {
        let mut game = game();
        game.offer_draw(Color::White).unwrap();
        assert_eq!(game.accept_draw(Color::White), Err(Reject::NoDrawOffer));
    }

    #[test]
    fn a_move_retires_an_outstanding_draw_offer() {
        let mut game = game();
        game.offer_draw(Color::White).unwrap();
        game.play(Color::White, m("e2e4")).unwrap();
        assert_eq!(game.accept_draw(Color::Black), Err(Reject::NoDrawOffer));
    }

    #[test]
    fn flagging_loses_on_time() {
        let mut game = game();
        assert_eq!(game.flag(Color::White), Ok(Outcome::LossOnTime(Color::White)));
        assert_eq!(game.outcome().and_then(|o| o.winner()), Some(Color::Black));
    }

    #[test]
    fn terminal_games_reject_every_mutation() {
        let mut game = game();
        game.resign(Color::White).unwrap();

        assert_eq!(game.play(Color::White, m("e2e4")), Err(Reject::GameNotFound));
        assert_eq!(game.offer_draw(Color::Black), Err(Reject::GameNotFound));
        assert_eq!(game.resign(Color::Black), Err(Reject::GameNotFound));
        assert_eq!(game.flag(Color::Black), Err(Reject::GameNotFound));
    }
}
