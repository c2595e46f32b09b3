use derive_more::{Display, Error};
use serde::{Deserialize, Serialize};

use super::{GameId, Standing};
use crate::chess::{Color, Outcome};

/// The reason why the service rejected a request.
///
/// Every variant maps to a stable wire code; none is fatal to the server, and
/// a rejected request never has side effects.
#[derive(Debug, Display, Copy, Clone, Eq, PartialEq, Hash, Error)]
#[derive(Serialize, Deserialize)]
#[cfg_attr(test, derive(test_strategy::Arbitrary))]
#[serde(rename_all = "snake_case")]
pub enum Reject {
    #[display(fmt = "the request carries no valid session token")]
    Unauthenticated,

    #[display(fmt = "the session token has expired")]
    SessionExpired,

    #[display(fmt = "the requester does not participate in this game")]
    Forbidden,

    #[display(fmt = "no such game")]
    GameNotFound,

    #[display(fmt = "it is the opponent's turn")]
    NotYourTurn,

    #[display(fmt = "the move is illegal in the current position")]
    IllegalMove,

    #[display(fmt = "there is no draw offer to accept")]
    NoDrawOffer,

    #[display(fmt = "the username is already taken")]
    UsernameTaken,

    #[display(fmt = "the credentials do not match")]
    InvalidCredentials,

    #[display(fmt = "the request could not be understood")]
    MalformedRequest,
}

impl Reject {
    /// The stable code identifying this rejection on the wire.
    pub fn code(&self) -> &'static str {
        match self {
            Reject::Unauthenticated => "unauthenticated",
            Reject::SessionExpired => "session_expired",
            Reject::Forbidden => "forbidden",
            Reject::GameNotFound => "game_not_found",
            Reject::NotYourTurn => "not_your_turn",
            Reject::IllegalMove => "illegal_move",
            Reject::NoDrawOffer => "no_draw_offer",
            Reject::UsernameTaken => "username_taken",
            Reject::InvalidCredentials => "invalid_credentials",
            Reject::MalformedRequest => "malformed_request",
        }
    }
}

/// A request from a client to the service.
#[derive(Debug, Clone, Eq, PartialEq)]
#[derive(Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    Register {
        username: String,
        password: String,
    },

    Login {
        username: String,
        password: String,
    },

    Players {
        token: String,
    },

    Seek {
        token: String,
    },

    Move {
        token: String,
        game: GameId,
        from: String,
        to: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        promotion: Option<String>,
    },

    Resign {
        token: String,
        game: GameId,
    },

    OfferDraw {
        token: String,
        game: GameId,
    },

    AcceptDraw {
        token: String,
        game: GameId,
    },

    Status {
        token: String,
        game: GameId,
    },

    Leaderboard {
        token: String,
    },

    Replay {
        token: String,
        game: GameId,
    },
}

/// A reply or pushed event from the service to a client.
#[derive(Debug, Clone, Eq, PartialEq)]
#[derive(Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Reply {
    Registered,

    LoggedIn {
        token: String,
    },

    Players {
        players: Vec<String>,
    },

    Seeking,

    GameStarted {
        game: GameId,
        white: String,
        black: String,
        fen: String,
    },

    Played {
        game: GameId,
        by: Color,
        #[serde(rename = "move")]
        played: String,
        fen: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        outcome: Option<Outcome>,
    },

    DrawOffered {
        game: GameId,
        by: Color,
    },

    GameOver {
        game: GameId,
        outcome: Outcome,
    },

    Status {
        game: GameId,
        fen: String,
        turn: Color,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        outcome: Option<Outcome>,
    },

    Leaderboard {
        standings: Vec<Standing>,
    },

    Replay {
        game: GameId,
        moves: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        outcome: Option<Outcome>,
    },

    Error {
        code: Reject,
        reason: String,
    },
}

impl From<Reject> for Reply {
    fn from(r: Reject) -> Self {
        Reply::Error {
            code: r,
            reason: r.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_strategy::proptest;

    #[proptest]
    fn reject_code_is_its_wire_representation(r: Reject) {
        assert_eq!(serde_json::to_value(r)?, serde_json::json!(r.code()));
    }

    #[proptest]
    fn reject_embeds_into_an_error_reply(r: Reject) {
        let Reply::Error { code, reason } = Reply::from(r) else {
            panic!("expected an error reply");
        };

        assert_eq!(code, r);
        assert_eq!(reason, r.to_string());
    }

    #[test]
    fn requests_deserialize_from_tagged_json() {
        let req: Request = serde_json::from_str(
            r#"{"type":"move","token":"t","game":7,"from":"e2","to":"e4"}"#,
        )
        .unwrap();

        assert_eq!(
            req,
            Request::Move {
                token: "t".to_string(),
                game: GameId(7),
                from: "e2".to_string(),
                to: "e4".to_string(),
                promotion: None,
            }
        );
    }

    #[test]
    fn replies_serialize_with_a_stable_tag() {
        let json = serde_json::to_value(Reply::Seeking).unwrap();
        assert_eq!(json, serde_json::json!({ "type": "seeking" }));
    }

    #[test]
    fn leaderboard_and_replay_requests_deserialize_from_tagged_json() {
        let req: Request =
            serde_json::from_str(r#"{"type":"leaderboard","token":"t"}"#).unwrap();
        assert_eq!(
            req,
            Request::Leaderboard {
                token: "t".to_string()
            }
        );

        let req: Request =
            serde_json::from_str(r#"{"type":"replay","token":"t","game":7}"#).unwrap();
        assert_eq!(
            req,
            Request::Replay {
                token: "t".to_string(),
                game: GameId(7),
            }
        );
    }
}
