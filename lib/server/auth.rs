use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

use super::Reject;

#[derive(Debug, Clone)]
struct Session {
    username: String,
    expires: Instant,
}

/// The account registry and session token issuer.
///
/// Tokens are opaque 128-bit random hex strings bound to a username; they are
/// owned here and never leak into the game state.
#[derive(Debug)]
pub struct Auth {
    ttl: Duration,
    rng: StdRng,
    users: HashMap<String, String>,
    sessions: HashMap<String, Session>,
}

impl Auth {
    /// Constructs an empty registry whose tokens expire after `ttl`.
    pub fn new(ttl: Duration) -> Self {
        Auth {
            ttl,
            rng: StdRng::from_entropy(),
            users: HashMap::new(),
            sessions: HashMap::new(),
        }
    }

    /// Registers a new account.
    pub fn register(&mut self, username: &str, password: &str) -> Result<(), Reject> {
        if username.is_empty() || self.users.contains_key(username) {
            return Err(Reject::UsernameTaken);
        }

        self.users.insert(username.to_string(), password.to_string());
        debug!(username, "account registered");
        Ok(())
    }

    /// Verifies a credential and issues a fresh session token.
    pub fn login(&mut self, username: &str, password: &str) -> Result<String, Reject> {
        if self.users.get(username).map(String::as_str) != Some(password) {
            return Err(Reject::InvalidCredentials);
        }

        let token = format!("{:032x}", self.rng.gen::<u128>());

        self.sessions.insert(
            token.clone(),
            Session {
                username: username.to_string(),
                expires: Instant::now() + self.ttl,
            },
        );

        debug!(username, "session opened");
        Ok(token)
    }

    /// Resolves a token to the username it is bound to.
    ///
    /// Distinguishes tokens that were never issued from tokens past their
    /// expiry; neither resolves.
    pub fn identify(&self, token: &str) -> Result<&str, Reject> {
        let session = self.sessions.get(token).ok_or(Reject::Unauthenticated)?;

        if session.expires <= Instant::now() {
            return Err(Reject::SessionExpired);
        }

        Ok(&session.username)
    }

    /// Drops every expired session.
    pub fn sweep(&mut self) {
        let now = Instant::now();
        self.sessions.retain(|_, s| s.expires > now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn auth() -> Auth {
        Auth::new(Duration::from_secs(60))
    }

    #[tokio::test]
    async fn register_then_login_issues_a_token() {
        let mut auth = auth();
        auth.register("alice", "hunter2").unwrap();

        let token = auth.login("alice", "hunter2").unwrap();
        assert_eq!(auth.identify(&token), Ok("alice"));
    }

    #[tokio::test]
    async fn duplicate_registration_is_rejected() {
        let mut auth = auth();
        auth.register("alice", "hunter2").unwrap();
        assert_eq!(auth.register("alice", "other"), Err(Reject::UsernameTaken));
    }

    #[tokio::test]
    async fn login_with_wrong_password_is_rejected() {
        let mut auth = auth();
        auth.register("alice", "hunter2").unwrap();
        assert_eq!(
            auth.login("alice", "letmein"),
            Err(Reject::InvalidCredentials)
        );
    }

    #[tokio::test]
    async fn login_with_unknown_username_is_rejected() {
        assert_eq!(
            auth().login("nobody", "pw"),
            Err(Reject::InvalidCredentials)
        );
    }

    #[tokio::test]
    async fn unknown_token_is_unauthenticated() {
        assert_eq!(auth().identify("bogus"), Err(Reject::Unauthenticated));
    }

    #[tokio::test(start_paused = true)]
    async fn token_expires_after_its_ttl() {
        let mut auth = auth();
        auth.register("alice", "hunter2").unwrap();
        let token = auth.login("alice", "hunter2").unwrap();

        tokio::time::advance(Duration::from_secs(61)).await;
        assert_eq!(auth.identify(&token), Err(Reject::SessionExpired));
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_forgets_expired_sessions() {
        let mut auth = auth();
        auth.register("alice", "hunter2").unwrap();
        let token = auth.login("alice", "hunter2").unwrap();

        tokio::time::advance(Duration::from_secs(61)).await;
        auth.sweep();

        assert_eq!(auth.identify(&token), Err(Reject::Unauthenticated));
    }

    #[tokio::test]
    async fn every_login_issues_a_distinct_token() {
        let mut auth = auth();
        auth.register("alice", "hunter2").unwrap();

        let a = auth.login("alice", "hunter2").unwrap();
        let b = auth.login("alice", "hunter2").unwrap();
        assert_ne!(a, b);
    }
}
