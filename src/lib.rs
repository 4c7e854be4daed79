//! E2 Termination Core: a protocol engine for the O-RAN E2 interface.
//!
//! Terminates E2AP associations from E2 Nodes (gNB/eNB/en-gNB/ng-eNB, and
//! non-terrestrial variants), manages RIC subscriptions and their
//! indication delivery, and round-trips RIC Control requests — the pieces
//! an xApp host process needs underneath it, without being an xApp itself.
//!
//! Six pieces, bottom to top:
//! - [`codec`] — the E2AP envelope codec (C1)
//! - [`transport`] — per-association framed delivery, SCTP or TCP (C2)
//! - [`registry`] — the service-model handler table (C3)
//! - [`txn`] — per-node outstanding-request bookkeeping (C4)
//! - [`subscription`] — subscription lifecycle and indication sinks (C5)
//! - [`router`] — indication dispatch and control round-trips (C6)
//!
//! [`core::E2TerminationCore`] wires all six together behind the public API
//! most callers actually want.

pub mod codec;
pub mod config;
pub mod core;
pub mod error;
pub mod metrics;
pub mod node;
pub mod registry;
pub mod router;
pub mod subscription;
pub mod transport;
pub mod txn;
pub mod types;

pub use config::{Config, ConfigBuilder, Framing};
pub use core::E2TerminationCore;
pub use error::{E2Error, E2Result};
pub use metrics::Metrics;
pub use registry::{Registry, RegistryBuilder, ServiceModelHandler};
pub use subscription::{
  IndicationPayload, Next, Subscription, SubscriptionFilter, SubscriptionState,
};
pub use types::{
  Action, ActionType, Cause, GlobalE2NodeId, NodeType, RanFunctionId, RanFunctionRevision,
  RicRequestId, SubscriptionId, TransactionId, XAppId,
};
