use anyhow::{Context, Error as Anyhow};
use clap::Parser;
use lib::server::{Config, Reject, Reply, Request, Service};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};

/// Runs the game server.
#[derive(Debug, Parser)]
pub struct Serve {
    /// The address to listen on.
    #[clap(long, default_value = "127.0.0.1:9432")]
    bind: SocketAddr,

    /// How long a session token remains valid, in seconds.
    #[clap(long, default_value_t = 1800)]
    session_ttl: u64,

    /// How long the side to move may idle before losing on time, in seconds.
    #[clap(long, default_value_t = 300)]
    move_clock: u64,
}

impl Serve {
    #[instrument(level = "trace", skip(self), err)]
    pub async fn execute(self) -> Result<(), Anyhow> {
        let service = Arc::new(Service::new(Config {
            session_ttl: Duration::from_secs(self.session_ttl),
            move_clock: Duration::from_secs(self.move_clock),
        }));

        let listener = TcpListener::bind(self.bind)
            .await
            .context("failed to bind the listener")?;

        info!(bind = %self.bind, "listening");

        listen(service, listener).await
    }
}

async fn listen(service: Arc<Service>, listener: TcpListener) -> Result<(), Anyhow> {
    loop {
        let (stream, peer) = listener
            .accept()
            .await
            .context("failed to accept a connection")?;

        debug!(%peer, "connection accepted");
        tokio::spawn(connect(Arc::clone(&service), stream));
    }
}

/// The username this connection becomes bound to by a request and its reply.
///
/// Only a successful login binds; a rejected one leaves the connection
/// anonymous, so its hangup never disconnects the named player.
fn bound_user(req: &Request, reply: &Reply) -> Option<String> {
    match (req, reply) {
        (Request::Login { username, .. }, Reply::LoggedIn { .. }) => Some(username.clone()),
        _ => None,
    }
}

/// Serves one client over a duplex stream of JSON lines.
///
/// All writes funnel through the client's outbox, so direct replies and
/// pushed events never interleave mid-line.
async fn connect(service: Arc<Service>, stream: TcpStream) {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();
    let (outbox, mut deliveries) = mpsc::unbounded_channel::<Reply>();

    let sink = tokio::spawn(async move {
        while let Some(reply) = deliveries.recv().await {
            let mut line = match serde_json::to_vec(&reply) {
                Ok(line) => line,
                Err(e) => {
                    warn!("undeliverable reply: {e}");
                    continue;
                }
            };

            line.push(b'\n');

            if writer.write_all(&line).await.is_err() {
                break;
            }
        }
    });

    let mut username = None;

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                debug!("connection lost: {e}");
                break;
            }
        };

        if line.trim().is_empty() {
            continue;
        }

        let reply = match serde_json::from_str::<Request>(&line) {
            Err(_) => Reply::from(Reject::MalformedRequest),
            Ok(req) => {
                let reply = service.handle(req.clone(), &outbox).await;

                if let Some(user) = bound_user(&req, &reply) {
                    username = Some(user);
                }

                reply
            }
        };

        if outbox.send(reply).is_err() {
            break;
        }
    }

    if let Some(username) = username {
        service.disconnect(&username);
    }

    drop(outbox);
    let _ = sink.await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use tokio::io::Lines;
    use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};

    struct Client {
        lines: Lines<BufReader<OwnedReadHalf>>,
        writer: OwnedWriteHalf,
    }

    impl Client {
        async fn connect(addr: SocketAddr) -> Self {
            let stream = TcpStream::connect(addr).await.unwrap();
            let (reader, writer) = stream.into_split();

            Client {
                lines: BufReader::new(reader).lines(),
                writer,
            }
        }

        async fn send(&mut self, line: &str) {
            self.writer.write_all(line.as_bytes()).await.unwrap();
            self.writer.write_all(b"\n").await.unwrap();
        }

        async fn recv(&mut self) -> Value {
            let line = self.lines.next_line().await.unwrap().unwrap();
            serde_json::from_str(&line).unwrap()
        }
    }

    async fn serve() -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let service = Arc::new(Service::new(Config::default()));

        tokio::spawn(async move {
            let _ = listen(service, listener).await;
        });

        addr
    }

    async fn login(addr: SocketAddr, username: &str) -> (Client, String) {
        let mut client = Client::connect(addr).await;

        client
            .send(&format!(
                r#"{{"type":"register","username":"{username}","password":"pw"}}"#
            ))
            .await;
        assert_eq!(client.recv().await["type"], "registered");

        client
            .send(&format!(
                r#"{{"type":"login","username":"{username}","password":"pw"}}"#
            ))
            .await;

        let reply = client.recv().await;
        assert_eq!(reply["type"], "logged_in");

        (client, reply["token"].as_str().unwrap().to_string())
    }

    #[test]
    fn connections_bind_to_a_user_only_on_successful_login() {
        let login = Request::Login {
            username: "alice".to_string(),
            password: "pw".to_string(),
        };

        let granted = Reply::LoggedIn {
            token: "t".to_string(),
        };

        assert_eq!(bound_user(&login, &granted), Some("alice".to_string()));
        assert_eq!(
            bound_user(&login, &Reply::from(Reject::InvalidCredentials)),
            None
        );

        let other = Request::Players {
            token: "t".to_string(),
        };

        assert_eq!(bound_user(&other, &granted), None);
    }

    #[tokio::test]
    async fn failed_login_and_hangup_does_not_evict_the_victim() {
        let addr = serve().await;

        let (mut alice, token) = login(addr, "alice").await;
        alice
            .send(&format!(r#"{{"type":"seek","token":"{token}"}}"#))
            .await;
        assert_eq!(alice.recv().await["type"], "seeking");

        // A stranger fails a login as alice and hangs up.
        let mut mallory = Client::connect(addr).await;
        mallory
            .send(r#"{"type":"login","username":"alice","password":"wrong"}"#)
            .await;
        assert_eq!(mallory.recv().await["code"], "invalid_credentials");
        drop(mallory);
        tokio::time::sleep(Duration::from_millis(50)).await;

        // Alice still waits in the queue and gets paired.
        let (mut bob, token) = login(addr, "bob").await;
        bob.send(&format!(r#"{{"type":"seek","token":"{token}"}}"#))
            .await;

        let reply = bob.recv().await;
        assert_eq!(reply["type"], "game_started");
        assert_eq!(reply["white"], "alice");
        assert_eq!(reply["black"], "bob");

        assert_eq!(alice.recv().await["type"], "game_started");
    }
}
