//! Configuration for an [`crate::core::E2TerminationCore`].
//!
//! Follows the teacher crate's `QosPolicyBuilder` convention: a plain data
//! struct with sensible defaults and a fluent builder, not a config-file
//! loader. Every key named in spec.md §6 has a field here.

use std::time::Duration;

use crate::subscription::SinkPolicy;

/// Transport framing selection (spec.md §6, key `framing`).
///
/// Only [`Framing::TcpLengthPrefixed`] is accepted by
/// [`crate::core::E2TerminationCore::start`]: its accept loop binds a
/// listening socket and waits for peers to connect in, which is the TCP
/// model but not SCTP's — `webrtc_sctp::Association::client`/`::server`
/// instead take an already-connected datagram transport the caller must
/// establish itself. `Framing::Sctp` is for embedders driving
/// `transport::sctp::{client, server}` directly and handing the resulting
/// [`crate::transport::Association`] to
/// [`crate::core::E2TerminationCore::accept_association`]; `start` rejects
/// it rather than silently falling back to TCP.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
  /// 4-byte big-endian length-prefixed TCP, always available.
  TcpLengthPrefixed,
  /// A real SCTP association (requires the `sctp` feature), established by
  /// the caller outside of `Core::start`'s accept loop.
  Sctp,
}

#[derive(Debug, Clone)]
pub struct Config {
  pub bind_addr: String,
  pub heartbeat_interval: Duration,
  pub heartbeat_misses_to_dead: u32,
  pub t_sub: Duration,
  pub t_del: Duration,
  pub t_ctl_max: Duration,
  pub sink_capacity: usize,
  pub sink_policy: SinkPolicy,
  pub t_sink_wait: Duration,
  pub deadline_tick: Duration,
  pub max_subs_per_node: usize,
  pub framing: Framing,
  /// Upper bound on live entries in a single node's Transaction Table before
  /// `TransactionIdExhausted` starts being a real risk (spec.md §4.4; the
  /// hard ceiling is 2^16, this is the table's working size, e.g. for
  /// sweeper tuning).
  pub max_txn_per_node: usize,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      bind_addr: "0.0.0.0:36421".to_owned(),
      heartbeat_interval: Duration::from_secs(30),
      heartbeat_misses_to_dead: 3,
      t_sub: Duration::from_secs(5),
      t_del: Duration::from_secs(3),
      t_ctl_max: Duration::from_secs(2),
      sink_capacity: 1024,
      sink_policy: SinkPolicy::DropOldest,
      t_sink_wait: Duration::from_millis(10),
      deadline_tick: Duration::from_millis(100),
      max_subs_per_node: 4096,
      framing: Framing::TcpLengthPrefixed,
      max_txn_per_node: 1024,
    }
  }
}

/// Fluent builder mirroring the teacher's `QosPolicyBuilder` pattern.
#[derive(Debug, Clone, Default)]
pub struct ConfigBuilder {
  config: Config,
}

impl ConfigBuilder {
  pub fn new() -> Self {
    Self {
      config: Config::default(),
    }
  }

  pub fn bind_addr(mut self, addr: impl Into<String>) -> Self {
    self.config.bind_addr = addr.into();
    self
  }

  pub fn heartbeat_interval(mut self, d: Duration) -> Self {
    self.config.heartbeat_interval = d;
    self
  }

  pub fn heartbeat_misses_to_dead(mut self, n: u32) -> Self {
    self.config.heartbeat_misses_to_dead = n;
    self
  }

  pub fn t_sub(mut self, d: Duration) -> Self {
    self.config.t_sub = d;
    self
  }

  pub fn t_del(mut self, d: Duration) -> Self {
    self.config.t_del = d;
    self
  }

  pub fn t_ctl_max(mut self, d: Duration) -> Self {
    self.config.t_ctl_max = d;
    self
  }

  pub fn sink_capacity(mut self, n: usize) -> Self {
    self.config.sink_capacity = n;
    self
  }

  pub fn sink_policy(mut self, p: SinkPolicy) -> Self {
    self.config.sink_policy = p;
    self
  }

  pub fn t_sink_wait(mut self, d: Duration) -> Self {
    self.config.t_sink_wait = d;
    self
  }

  pub fn deadline_tick(mut self, d: Duration) -> Self {
    self.config.deadline_tick = d;
    self
  }

  pub fn max_subs_per_node(mut self, n: usize) -> Self {
    self.config.max_subs_per_node = n;
    self
  }

  pub fn framing(mut self, f: Framing) -> Self {
    self.config.framing = f;
    self
  }

  pub fn build(self) -> Config {
    self.config
  }
}
