use anyhow::{Context, Error as Anyhow};
use clap::Parser;
use lib::chess::Position;
use tracing::instrument;

/// Enumerates the legal moves in a position.
#[derive(Debug, Parser)]
pub struct Moves {
    /// The position to analyze, in FEN.
    #[clap(default_value_t = Position::default().to_string())]
    fen: String,
}

impl Moves {
    #[instrument(level = "trace", skip(self), err)]
    pub fn execute(self) -> Result<(), Anyhow> {
        let pos: Position = self.fen.parse().context("failed to parse the position")?;

        for ctx in pos.moves() {
            println!("{}", ctx.0);
        }

        if let Some(outcome) = pos.outcome() {
            println!("{outcome}");
        }

        Ok(())
    }
}
