use anyhow::Error as Anyhow;
use clap::Subcommand;
use derive_more::From;

mod moves;
mod serve;

#[derive(From, Subcommand)]
pub enum Applet {
    Serve(serve::Serve),
    Moves(moves::Moves),
}

impl Applet {
    pub async fn execute(self) -> Result<(), Anyhow> {
        match self {
            Applet::Serve(a) => Ok(a.execute().await?),
            Applet::Moves(a) => Ok(a.execute()?),
        }
    }
}
