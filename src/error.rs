//! Error taxonomy
//!
//! Content bugs (unknown definition ids) and invariant breaches (bad slots, an
//! exhausted id space) surface as [`SimError`]. Transport failures are
//! [`SendError`] and never leave the broadcast stage.

use thiserror::Error;

use crate::sim::ObjectId;

/// Errors raised by the simulation core
#[derive(Debug, Error)]
pub enum SimError {
    #[error("unknown {kind} definition `{id}`")]
    MissingReference { kind: &'static str, id: String },

    #[error("invalid inventory slot {0}")]
    InvalidSlot(usize),

    #[error("object id space exhausted")]
    IdsExhausted,

    #[error("no player with id {0}")]
    UnknownPlayer(ObjectId),

    #[error("game is full")]
    GameFull,

    #[error("game no longer accepts players")]
    JoinClosed,

    #[error("game {0} is no longer running")]
    GameStopped(u32),
}

impl SimError {
    pub fn missing(kind: &'static str, id: impl Into<String>) -> Self {
        SimError::MissingReference { kind, id: id.into() }
    }
}

/// Errors while loading startup configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Errors while pushing a packet to a client
#[derive(Debug, Error)]
pub enum SendError {
    #[error("client disconnected")]
    Disconnected,

    #[error("encode error: {0}")]
    Encode(#[from] serde_json::Error),
}
