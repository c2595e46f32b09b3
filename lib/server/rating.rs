use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::chess::{Color, Outcome};

/// The rating every player starts out with.
const INITIAL_RATING: i32 = 1000;

/// The K factor applied to a player of the given rating.
///
/// Ratings below 1300 move faster so newcomers converge quickly.
fn k_factor(rating: i32) -> f64 {
    if rating < 1300 {
        24.0
    } else {
        32.0
    }
}

/// Both players' new ratings after a game scoring `score` for the first.
///
/// `score` is 1 for a win, 0.5 for a draw, and 0 for a loss; each player's
/// adjustment uses their own K factor.
fn exchange(a: i32, b: i32, score: f64) -> (i32, i32) {
    let expected = 1.0 / (1.0 + 10f64.powf(f64::from(b - a) / 400.0));

    let new_a = f64::from(a) + k_factor(a) * (score - expected);
    let new_b = f64::from(b) + k_factor(b) * ((1.0 - score) - (1.0 - expected));

    (new_a.round() as i32, new_b.round() as i32)
}

/// One row of the leaderboard.
#[derive(Debug, Clone, Eq, PartialEq)]
#[derive(Serialize, Deserialize)]
pub struct Standing {
    pub username: String,
    pub rating: i32,
    pub wins: u32,
    pub losses: u32,
    pub draws: u32,
}

#[derive(Debug, Clone)]
struct Record {
    rating: i32,
    wins: u32,
    losses: u32,
    draws: u32,
}

impl Default for Record {
    fn default() -> Self {
        Record {
            rating: INITIAL_RATING,
            wins: 0,
            losses: 0,
            draws: 0,
        }
    }
}

/// The rating registry backing the leaderboard.
#[derive(Debug, Default)]
pub struct Standings {
    records: HashMap<String, Record>,
}

impl Standings {
    /// Enrolls a player at the initial rating, unless already enrolled.
    pub fn enroll(&mut self, username: &str) {
        self.records.entry(username.to_string()).or_default();
    }

    /// The current rating of the given player.
    pub fn rating(&self, username: &str) -> Option<i32> {
        self.records.get(username).map(|r| r.rating)
    }

    /// Settles a finished game between the white and the black player.
    ///
    /// Adjusts both ratings and tallies the result.
    pub fn settle(&mut self, white: &str, black: &str, outcome: Outcome) {
        self.enroll(white);
        self.enroll(black);

        let (a, b) = match (self.rating(white), self.rating(black)) {
            (Some(a), Some(b)) => (a, b),
            _ => return,
        };

        let winner = outcome.winner();
        let score = match winner {
            Some(Color::White) => 1.0,
            Some(Color::Black) => 0.0,
            None => 0.5,
        };

        let (new_a, new_b) = exchange(a, b, score);

        if let Some(r) = self.records.get_mut(white) {
            r.rating = new_a;
            match winner {
                Some(Color::White) => r.wins += 1,
                Some(Color::Black) => r.losses += 1,
                None => r.draws += 1,
            }
        }

        if let Some(r) = self.records.get_mut(black) {
            r.rating = new_b;
            match winner {
                Some(Color::Black) => r.wins += 1,
                Some(Color::White) => r.losses += 1,
                None => r.draws += 1,
            }
        }
    }

    /// The full standings, highest rated first, ties broken by username.
    pub fn table(&self) -> Vec<Standing> {
        let mut table: Vec<_> = self
            .records
            .iter()
            .map(|(username, r)| Standing {
                username: username.clone(),
                rating: r.rating,
                wins: r.wins,
                losses: r.losses,
                draws: r.draws,
            })
            .collect();

        table.sort_by(|x, y| {
            y.rating
                .cmp(&x.rating)
                .then_with(|| x.username.cmp(&y.username))
        });

        table
    }
}
