//! Error types shared by the transport, entity and configuration layers

use thiserror::Error;

/// Failures while framing, compressing or moving messages over a connection
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("socket error: {0}")]
    Io(#[from] std::io::Error),

    #[error("frame of {len} bytes exceeds the {max} byte limit")]
    FrameTooLarge { len: usize, max: usize },

    #[error("failed to decompress frame: {0}")]
    Decompress(#[from] lz4_flex::block::DecompressError),

    #[error("failed to decode message: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("failed to encode message: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("could not connect to {addr} after {attempts} attempts")]
    ConnectFailed { addr: String, attempts: u32 },

    #[error("connection closed")]
    Closed,
}

/// Failures while parsing a `target.stat.valuetype` effect descriptor
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EffectError {
    #[error("effect '{0}' must have the form 'target.stat.valuetype'")]
    Malformed(String),

    #[error("unknown effect target '{0}'")]
    UnknownTarget(String),

    #[error("unknown stat '{0}'")]
    UnknownStat(String),

    #[error("unknown value type '{0}'")]
    UnknownValueType(String),
}

/// Failures while loading the archetype and powerup data tables
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read data table {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid data table: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("data table '{0}' is empty")]
    Empty(&'static str),

    #[error("unknown shape archetype '{0}'")]
    UnknownArchetype(String),

    #[error("unknown powerup '{name}' of rarity {rarity}")]
    UnknownPowerup { rarity: String, name: String },
}
