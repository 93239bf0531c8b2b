use thiserror::Error;

use crate::traffic::network::EdgeKey;

pub mod config;
pub mod events;
pub mod io;
pub mod logging;
pub mod network;
pub mod router;
pub mod system;

/// All recoverable failure conditions of the core. None of these should ever
/// terminate the process; callers decide how to report them.
#[derive(Debug, Error)]
pub enum TrafficError {
    #[error("unknown vertex '{0}'")]
    UnknownVertex(String),
    #[error("vertex '{0}' already exists")]
    DuplicateVertex(String),
    #[error("no edge {0} in the network")]
    UnknownEdge(EdgeKey),
    #[error("edge {0} already exists")]
    DuplicateEdge(EdgeKey),
    #[error("edge {0} not found")]
    EdgeNotFound(EdgeKey),
    #[error("base weight must be positive, got {0}")]
    InvalidWeight(f64),
    #[error("impact {delta} on edge {edge} would drive its weight of {current} to zero or below")]
    InvalidImpact {
        edge: EdgeKey,
        delta: f64,
        current: f64,
    },
    #[error("no event with id {0}")]
    EventNotFound(u64),
    #[error("no route from '{from}' to '{to}'")]
    UnreachableDestination { from: String, to: String },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("parse error in line {line}: {reason}")]
    Parse { line: usize, reason: String },
}

pub type Result<T> = std::result::Result<T, TrafficError>;
