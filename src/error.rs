//! Crate-wide error taxonomy (spec.md §7).
//!
//! Every public operation returns either a success value or exactly one of
//! these. Nothing here is recoverable by retrying inside the crate itself;
//! retry policy is the caller's, per spec.md §4.6.

use crate::codec::CodecError;
use crate::transport::TransportError;

#[derive(Debug, thiserror::Error)]
pub enum E2Error {
  #[error("transport error: {0}")]
  Transport(#[from] TransportError),

  #[error("codec error: {0}")]
  Codec(#[from] CodecError),

  #[error("protocol error: {0}")]
  Protocol(String),

  #[error("validation error: {0}")]
  Validation(String),

  #[error("operation timed out")]
  Timeout,

  #[error("capacity exceeded: {0}")]
  Capacity(String),

  #[error("node unreachable")]
  NodeUnreachable,
}

impl E2Error {
  /// Coarse kind used for metric labeling, matching spec.md §7's taxonomy.
  pub fn kind(&self) -> &'static str {
    match self {
      E2Error::Transport(_) => "transport",
      E2Error::Codec(_) => "codec",
      E2Error::Protocol(_) => "protocol",
      E2Error::Validation(_) => "validation",
      E2Error::Timeout => "timeout",
      E2Error::Capacity(_) => "capacity",
      E2Error::NodeUnreachable => "node_unreachable",
    }
  }
}

pub type E2Result<T> = Result<T, E2Error>;
