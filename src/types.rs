//! Core identifiers and small value types shared across the crate.
//!
//! These mirror the identifiers named in the data model: a node is addressed
//! by an opaque [`GlobalE2NodeId`], functions are addressed by
//! [`RanFunctionId`] + revision, subscriptions are addressed by both a local
//! [`SubscriptionId`] and a wire-level [`RicRequestId`], and every outbound
//! initiating message gets a per-node [`TransactionId`].

use std::fmt;

use bytes::Bytes;
use speedy::{Readable, Writable};

/// Opaque, peer-assigned identity of an E2 Node. Compared and hashed as raw
/// bytes; the core never interprets its structure.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Readable, Writable)]
pub struct GlobalE2NodeId(pub Bytes);

impl fmt::Display for GlobalE2NodeId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "0x")?;
    for b in &self.0 {
      write!(f, "{b:02X}")?;
    }
    Ok(())
  }
}

/// Kind of E2 Node, as declared in `E2SetupRequest`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Readable, Writable)]
pub enum NodeType {
  Gnb,
  Enb,
  EnGnb,
  NgEnb,
  NtnGnb,
}

/// Identifies a RAN Function within a node. Stable across revisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Readable, Writable)]
pub struct RanFunctionId(pub u16);

/// Revision counter for a RAN Function definition. A higher revision
/// supersedes a lower one once the node has acknowledged it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Readable, Writable)]
pub struct RanFunctionRevision(pub u8);

/// Identifies the calling xApp for the purposes of subscription ownership
/// and `ric-request-id` allocation. A subscription is a relation on
/// (xApp, E2Node, function-id), not just (E2Node, function-id) — two
/// different xApps against the same node and function get distinct
/// subscriptions (data model, §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct XAppId(pub u32);

/// Wire-level correlation pair for a subscription, distinct from the local
/// [`SubscriptionId`] used for in-process indexing (spec data model, I2).
/// `requestor_id` is the allocating xApp's [`XAppId`]; uniqueness is only
/// promised within a (xApp, node) pair, not globally (I2) — delivery must
/// never match on `RicRequestId` alone across nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Readable, Writable)]
pub struct RicRequestId {
  pub requestor_id: u32,
  pub instance_id: u32,
}

/// Locally-unique 64-bit subscription identifier, never reused while the
/// subscription (or a pending successor from a Modify) lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Readable, Writable)]
pub struct SubscriptionId(pub u64);

/// Per-node transaction identifier, allocated from the node's outbound
/// counter and wrapping at 2^16 (spec §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Readable, Writable)]
pub struct TransactionId(pub u16);

/// Action kind within a subscription's action list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Readable, Writable)]
pub enum ActionType {
  Report,
  Insert,
  Policy,
}

/// One requested (or admitted) action within a subscription.
#[derive(Debug, Clone, PartialEq, Eq, Readable, Writable)]
pub struct Action {
  pub action_id: u16,
  pub action_type: ActionType,
  pub subsequent_action: Option<SubsequentAction>,
  pub action_definition: Option<Bytes>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Readable, Writable)]
pub struct SubsequentAction {
  pub kind: SubsequentActionKind,
  pub time_to_wait_ms: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Readable, Writable)]
pub enum SubsequentActionKind {
  Continue,
  Wait,
}

/// Cause reported in failures, resets, and error indications. Enumerated
/// rather than left as a bare string so callers can branch on it without
/// string-matching.
#[derive(Debug, Clone, PartialEq, Eq, Readable, Writable, thiserror::Error)]
pub enum Cause {
  #[error("RAN function id is not known to the peer")]
  RanFunctionIdInvalid,
  #[error("request timed out")]
  Timeout,
  #[error("node became unreachable")]
  NodeUnreachable,
  #[error("protocol was violated: {0}")]
  Protocol(String),
  #[error("persistent protocol violation, association terminated")]
  ProtocolPersistent,
  #[error("service was withdrawn by the node")]
  ServiceWithdrawn,
  #[error("core is shutting down")]
  CoreShutdown,
  #[error("{0}")]
  Other(String),
}
