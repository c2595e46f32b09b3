use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};

use super::{Auth, Game, GameId, Reject, Reply, Request, Standings};
use crate::chess::{Color, Move, Outcome, Promotion, Square};

/// Knobs of the [`Service`].
#[derive(Debug, Copy, Clone)]
pub struct Config {
    /// How long a session token remains valid.
    pub session_ttl: Duration,
    /// How long the side to move may idle before losing on time.
    pub move_clock: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            session_ttl: Duration::from_secs(1800),
            move_clock: Duration::from_secs(300),
        }
    }
}

/// A read-only view of a game, refreshed after every mutation.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub fen: String,
    pub turn: Color,
    pub moves: Vec<String>,
    pub outcome: Option<Outcome>,
}

impl Snapshot {
    fn of(game: &Game) -> Self {
        Snapshot {
            fen: game.position().to_string(),
            turn: game.position().turn(),
            moves: game.moves().iter().map(Move::to_string).collect(),
            outcome: game.outcome(),
        }
    }
}

enum Command {
    Play(Color, Move, oneshot::Sender<Result<Reply, Reject>>),
    Resign(Color, oneshot::Sender<Result<Reply, Reject>>),
    OfferDraw(Color, oneshot::Sender<Result<Reply, Reject>>),
    AcceptDraw(Color, oneshot::Sender<Result<Reply, Reject>>),
}

struct Table {
    players: [String; 2],
    commands: mpsc::UnboundedSender<Command>,
    status: watch::Receiver<Snapshot>,
}

/// The authoritative game service.
///
/// Owns accounts, the matchmaking queue, and one task per paired game; every
/// state-mutating request for a game is queued to its task and processed in
/// receipt order, while status queries read a snapshot concurrently.
pub struct Service {
    config: Config,
    auth: Mutex<Auth>,
    seeker: Mutex<Option<String>>,
    games: Mutex<HashMap<GameId, Table>>,
    outboxes: Mutex<HashMap<String, mpsc::UnboundedSender<Reply>>>,
    standings: Arc<Mutex<Standings>>,
    next_id: AtomicU64,
}

impl Service {
    pub fn new(config: Config) -> Self {
        Service {
            config,
            auth: Mutex::new(Auth::new(config.session_ttl)),
            seeker: Mutex::new(None),
            games: Mutex::new(HashMap::new()),
            outboxes: Mutex::new(HashMap::new()),
            standings: Arc::new(Mutex::new(Standings::default())),
            next_id: AtomicU64::new(1),
        }
    }

    /// Routes a request to its handler and folds rejections into error replies.
    pub async fn handle(&self, req: Request, outbox: &mpsc::UnboundedSender<Reply>) -> Reply {
        let result = match req {
            Request::Register { username, password } => self.register(&username, &password),
            Request::Login { username, password } => self.login(&username, &password, outbox),
            Request::Players { token } => self.players(&token),
            Request::Seek { token } => self.seek(&token),
            Request::Move {
                token,
                game,
                from,
                to,
                promotion,
            } => self.play(&token, game, &from, &to, promotion.as_deref()).await,
            Request::Resign { token, game } => {
                self.table_command(&token, game, Command::Resign).await
            }
            Request::OfferDraw { token, game } => {
                self.table_command(&token, game, Command::OfferDraw).await
            }
            Request::AcceptDraw { token, game } => {
                self.table_command(&token, game, Command::AcceptDraw).await
            }
            Request::Status { token, game } => self.status(&token, game),
            Request::Leaderboard { token } => self.leaderboard(&token),
            Request::Replay { token, game } => self.replay(&token, game),
        };

        result.unwrap_or_else(Reply::from)
    }

    fn register(&self, username: &str, password: &str) -> Result<Reply, Reject> {
        self.auth.lock().unwrap().register(username, password)?;
        self.standings.lock().unwrap().enroll(username);
        Ok(Reply::Registered)
    }

    fn login(
        &self,
        username: &str,
        password: &str,
        outbox: &mpsc::UnboundedSender<Reply>,
    ) -> Result<Reply, Reject> {
        let token = self.auth.lock().unwrap().login(username, password)?;

        self.outboxes
            .lock()
            .unwrap()
            .insert(username.to_string(), outbox.clone());

        info!(username, "player logged in");
        Ok(Reply::LoggedIn { token })
    }

    fn identify(&self, token: &str) -> Result<String, Reject> {
        Ok(self.auth.lock().unwrap().identify(token)?.to_string())
    }

    fn players(&self, token: &str) -> Result<Reply, Reject> {
        self.identify(token)?;

        let mut players: Vec<_> = self.outboxes.lock().unwrap().keys().cloned().collect();
        players.sort();
        Ok(Reply::Players { players })
    }

    fn seek(&self, token: &str) -> Result<Reply, Reject> {
        let username = self.identify(token)?;

        let opponent = {
            let mut seeker = self.seeker.lock().unwrap();
            match seeker.take() {
                Some(waiting) if waiting != username => waiting,
                _ => {
                    *seeker = Some(username);
                    return Ok(Reply::Seeking);
                }
            }
        };

        let id = GameId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let game = Game::new(id, opponent.clone(), username.clone());
        let started = Reply::GameStarted {
            game: id,
            white: opponent.clone(),
            black: username.clone(),
            fen: game.position().to_string(),
        };

        let (commands, inbox) = mpsc::unbounded_channel();
        let (publish, status) = watch::channel(Snapshot::of(&game));

        let table = Table {
            players: [opponent.clone(), username],
            commands,
            status,
        };

        let outboxes = {
            let registry = self.outboxes.lock().unwrap();
            table.players.clone().map(|p| registry.get(&p).cloned())
        };

        self.games.lock().unwrap().insert(id, table);

        info!(game = %id, white = %opponent, "game paired");

        if let Some(white) = &outboxes[0] {
            let _ = white.send(started.clone());
        }

        tokio::spawn(run(
            game,
            inbox,
            publish,
            outboxes,
            Arc::clone(&self.standings),
            self.config.move_clock,
        ));

        Ok(started)
    }

    /// Resolves a game the requester participates in.
    fn table(
        &self,
        token: &str,
        id: GameId,
    ) -> Result<(Color, mpsc::UnboundedSender<Command>), Reject> {
        let username = self.identify(token)?;
        let games = self.games.lock().unwrap();
        let table = games.get(&id).ok_or(Reject::GameNotFound)?;

        let side = Color::iter()
            .find(|&c| table.players[c as usize] == username)
            .ok_or(Reject::Forbidden)?;

        if table.status.borrow().outcome.is_some() {
            return Err(Reject::GameNotFound);
        }

        Ok((side, table.commands.clone()))
    }

    async fn play(
        &self,
        token: &str,
        id: GameId,
        from: &str,
        to: &str,
        promotion: Option<&str>,
    ) -> Result<Reply, Reject> {
        let from: Square = from.parse().map_err(|_| Reject::MalformedRequest)?;
        let to: Square = to.parse().map_err(|_| Reject::MalformedRequest)?;
        let promotion: Promotion = promotion
            .unwrap_or_default()
            .parse()
            .map_err(|_| Reject::MalformedRequest)?;

        let (side, commands) = self.table(token, id)?;
        let (reply, response) = oneshot::channel();

        commands
            .send(Command::Play(side, Move(from, to, promotion), reply))
            .map_err(|_| Reject::GameNotFound)?;

        response.await.map_err(|_| Reject::GameNotFound)?
    }

    async fn table_command(
        &self,
        token: &str,
        id: GameId,
        command: fn(Color, oneshot::Sender<Result<Reply, Reject>>) -> Command,
    ) -> Result<Reply, Reject> {
        let (side, commands) = self.table(token, id)?;
        let (reply, response) = oneshot::channel();

        commands
            .send(command(side, reply))
            .map_err(|_| Reject::GameNotFound)?;

        response.await.map_err(|_| Reject::GameNotFound)?
    }

    /// Answers a status query from the latest snapshot.
    ///
    /// Never waits on the game task, so it may proceed while a move is being
    /// processed.
    fn status(&self, token: &str, id: GameId) -> Result<Reply, Reject> {
        let username = self.identify(token)?;
        let games = self.games.lock().unwrap();
        let table = games.get(&id).ok_or(Reject::GameNotFound)?;

        if !table.players.contains(&username) {
            return Err(Reject::Forbidden);
        }

        let snapshot = table.status.borrow().clone();
        Ok(Reply::Status {
            game: id,
            fen: snapshot.fen,
            turn: snapshot.turn,
            outcome: snapshot.outcome,
        })
    }

    /// Answers with the rating standings, highest rated first.
    fn leaderboard(&self, token: &str) -> Result<Reply, Reject> {
        self.identify(token)?;

        Ok(Reply::Leaderboard {
            standings: self.standings.lock().unwrap().table(),
        })
    }

    /// Answers with the moves played in a game the requester participates in.
    ///
    /// Like [`Self::status`], reads the latest snapshot and also answers for
    /// archived games.
    fn replay(&self, token: &str, id: GameId) -> Result<Reply, Reject> {
        let username = self.identify(token)?;
        let games = self.games.lock().unwrap();
        let table = games.get(&id).ok_or(Reject::GameNotFound)?;

        if !table.players.contains(&username) {
            return Err(Reject::Forbidden);
        }

        let snapshot = table.status.borrow().clone();
        Ok(Reply::Replay {
            game: id,
            moves: snapshot.moves,
            outcome: snapshot.outcome,
        })
    }

    /// Forgets a player's outbox and pending seek once their connection closes.
    pub fn disconnect(&self, username: &str) {
        self.outboxes.lock().unwrap().remove(username);

        let mut seeker = self.seeker.lock().unwrap();
        if seeker.as_deref() == Some(username) {
            *seeker = None;
        }

        debug!(username, "player disconnected");
    }

    /// Drops expired sessions.
    pub fn sweep(&self) {
        self.auth.lock().unwrap().sweep();
    }
}

/// The task owning a [`Game`].
///
/// Commands are processed strictly in receipt order; a command arriving while
/// another is being processed waits in the queue. The side to move forfeits on
/// time if no command arrives before the move clock runs out.
async fn run(
    mut game: Game,
    mut inbox: mpsc::UnboundedReceiver<Command>,
    publish: watch::Sender<Snapshot>,
    outboxes: [Option<mpsc::UnboundedSender<Reply>>; 2],
    standings: Arc<Mutex<Standings>>,
    move_clock: Duration,
) {
    let id = game.id();
    let mut deadline = Instant::now() + move_clock;

    let notify = |side: Color, reply: &Reply| {
        if let Some(outbox) = &outboxes[side as usize] {
            if outbox.send(reply.clone()).is_err() {
                warn!(game = %id, player = %side, "undeliverable event");
            }
        }
    };

    while game.outcome().is_none() {
        let command = tokio::select! {
            command = inbox.recv() => match command {
                Some(command) => command,
                None => break,
            },

            _ = sleep_until(deadline) => {
                let flagged = game.position().turn();
                if let Ok(outcome) = game.flag(flagged) {
                    info!(game = %id, player = %flagged, "flag fell");
                    let over = Reply::GameOver { game: id, outcome };
                    notify(Color::White, &over);
                    notify(Color::Black, &over);
                }

                publish.send_replace(Snapshot::of(&game));
                continue;
            }
        };

        match command {
            Command::Play(side, m, reply) => {
                let result = game.play(side, m).map(|()| {
                    deadline = Instant::now() + move_clock;

                    let played = Reply::Played {
                        game: id,
                        by: side,
                        played: m.to_string(),
                        fen: game.position().to_string(),
                        outcome: game.outcome(),
                    };

                    notify(!side, &played);
                    played
                });

                let _ = reply.send(result);
            }

            Command::Resign(side, reply) => {
                let result = game.resign(side).map(|outcome| {
                    let over = Reply::GameOver { game: id, outcome };
                    notify(!side, &over);
                    over
                });

                let _ = reply.send(result);
            }

            Command::OfferDraw(side, reply) => {
                let result = game.offer_draw(side).map(|()| {
                    let offered = Reply::DrawOffered { game: id, by: side };
                    notify(!side, &offered);
                    offered
                });

                let _ = reply.send(result);
            }

            Command::AcceptDraw(side, reply) => {
                let result = game.accept_draw(side).map(|outcome| {
                    let over = Reply::GameOver { game: id, outcome };
                    notify(!side, &over);
                    over
                });

                let _ = reply.send(result);
            }
        }

        publish.send_replace(Snapshot::of(&game));
    }

    if let Some(outcome) = game.outcome() {
        standings.lock().unwrap().settle(
            game.player(Color::White),
            game.player(Color::Black),
            outcome,
        );

        info!(game = %id, %outcome, "game over");
    }
}
