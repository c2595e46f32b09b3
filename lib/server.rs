mod auth;
mod game;
mod protocol;
mod rating;
mod service;

pub use auth::*;
pub use game::*;
pub use protocol::*;
pub use rating::*;
pub use service::*;
