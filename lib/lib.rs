/// Chess domain types and the rules engine.
pub mod chess;
/// The authoritative game session service.
pub mod server;
