//! Transaction Table (C4, spec.md §4.4).
//!
//! One table per E2 Node. Every outbound initiating message (Subscription
//! Request/Delete, Control Request, Configuration Update) allocates a
//! [`TransactionId`] from a wrapping 16-bit counter and registers a waiter;
//! the matching response (or a sweep timeout) resolves it exactly once.
//! Modeled on the teacher's discrete-event "outstanding request" bookkeeping
//! (its reliable-writer `sent_instances` map), swapped from a retransmission
//! timer to the spec's `complete`/`fail`/`sweep` trio.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::time::Instant;

use crate::codec::pdu::Pdu;
use crate::types::{Cause, TransactionId};

/// What a pending transaction ultimately resolves to: the peer's response
/// PDU, or a locally- or peer-reported cause (including a sweep timeout).
#[derive(Debug)]
pub enum TxnOutcome {
  Success(Pdu),
  Failure(Cause),
}

/// Coarse kind for logging/metrics, not interpreted by the table itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxnKind {
  Subscribe,
  SubscriptionDelete,
  Control,
  ConfigurationUpdate,
  Reset,
}

struct PendingTxn {
  kind: TxnKind,
  deadline: Instant,
  waiter: oneshot::Sender<TxnOutcome>,
}

#[derive(Debug, thiserror::Error)]
pub enum TxnError {
  #[error("transaction table is full ({0} entries outstanding)")]
  TableFull(usize),
  #[error("transaction id {0:?} is not outstanding")]
  Unknown(TransactionId),
}

/// A single waiter handed back from [`TransactionTable::register`].
pub type Waiter = oneshot::Receiver<TxnOutcome>;

pub struct TransactionTable {
  next: u16,
  pending: HashMap<TransactionId, PendingTxn>,
  max_outstanding: usize,
}

impl TransactionTable {
  pub fn new(max_outstanding: usize) -> Self {
    Self {
      next: 0,
      pending: HashMap::new(),
      max_outstanding,
    }
  }

  pub fn outstanding(&self) -> usize {
    self.pending.len()
  }

  /// Allocate the next free id and register a waiter for it, failing it at
  /// `now + deadline` unless [`Self::complete`] or [`Self::fail`] runs
  /// first. Wraps at 2^16 (spec.md §4.4); returns [`TxnError::TableFull`]
  /// once every one of the 65536 ids is live, which in practice means the
  /// table's working-size limit has already been breached well before that
  /// (see SPEC_FULL.md §11.3's 80% warning, raised by the caller around
  /// `outstanding()`).
  pub fn register(
    &mut self,
    kind: TxnKind,
    deadline: Duration,
    now: Instant,
  ) -> Result<(TransactionId, Waiter), TxnError> {
    if self.pending.len() >= self.max_outstanding.min(u16::MAX as usize + 1) {
      return Err(TxnError::TableFull(self.pending.len()));
    }

    let start = self.next;
    loop {
      let candidate = TransactionId(self.next);
      self.next = self.next.wrapping_add(1);
      if !self.pending.contains_key(&candidate) {
        let (tx, rx) = oneshot::channel();
        self.pending.insert(
          candidate,
          PendingTxn {
            kind,
            deadline: now + deadline,
            waiter: tx,
          },
        );
        return Ok((candidate, rx));
      }
      if self.next == start {
        // Scanned the full id space without finding a free slot; the
        // max_outstanding check above should make this unreachable, but
        // stay total rather than spin forever.
        return Err(TxnError::TableFull(self.pending.len()));
      }
    }
  }

  /// Resolve a pending transaction successfully. Silently a no-op if the
  /// id is not outstanding (it already timed out, or the response is a
  /// duplicate) — callers that need to know should check the return value.
  pub fn complete(&mut self, id: TransactionId, payload: Pdu) -> Result<TxnKind, TxnError> {
    let entry = self.pending.remove(&id).ok_or(TxnError::Unknown(id))?;
    let kind = entry.kind;
    let _ = entry.waiter.send(TxnOutcome::Success(payload));
    Ok(kind)
  }

  /// Drop a transaction with no response expected (spec.md §4.6
  /// `RICcontrolRequest` with `ack_request = NoAck`): remove the entry
  /// without resolving anything, since nothing is waiting on it.
  pub fn cancel(&mut self, id: TransactionId) {
    self.pending.remove(&id);
  }

  pub fn fail(&mut self, id: TransactionId, cause: Cause) -> Result<TxnKind, TxnError> {
    let entry = self.pending.remove(&id).ok_or(TxnError::Unknown(id))?;
    let kind = entry.kind;
    let _ = entry.waiter.send(TxnOutcome::Failure(cause));
    Ok(kind)
  }

  /// Fail every transaction past its deadline with `Cause::Timeout`.
  /// Returns the ids that were swept, for logging.
  pub fn sweep(&mut self, now: Instant) -> Vec<(TransactionId, TxnKind)> {
    let expired: Vec<TransactionId> = self
      .pending
      .iter()
      .filter(|(_, t)| now >= t.deadline)
      .map(|(id, _)| *id)
      .collect();

    let mut swept = Vec::with_capacity(expired.len());
    for id in expired {
      if let Some(entry) = self.pending.remove(&id) {
        swept.push((id, entry.kind));
        let _ = entry.waiter.send(TxnOutcome::Failure(Cause::Timeout));
      }
    }
    swept
  }

  /// Fail every outstanding transaction, e.g. on association loss
  /// (spec.md §4.4: "all outstanding transactions for that node fail with
  /// the association's close cause").
  pub fn fail_all(&mut self, cause: Cause) {
    for (_, entry) in self.pending.drain() {
      let _ = entry.waiter.send(TxnOutcome::Failure(cause.clone()));
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn register_then_complete_resolves_waiter() {
    let mut table = TransactionTable::new(16);
    let now = Instant::now();
    let (id, waiter) = table
      .register(TxnKind::Control, Duration::from_secs(1), now)
      .expect("register");
    table
      .complete(id, Pdu::ResetResponse(crate::codec::pdu::ResetResponse))
      .expect("complete");
    match waiter.await.expect("waiter resolved") {
      TxnOutcome::Success(Pdu::ResetResponse(_)) => {}
      other => panic!("expected ResetResponse, got {other:?}"),
    }
  }

  #[tokio::test]
  async fn sweep_times_out_past_deadline() {
    let mut table = TransactionTable::new(16);
    let now = Instant::now();
    let (_id, waiter) = table
      .register(TxnKind::Subscribe, Duration::from_millis(0), now)
      .expect("register");
    let swept = table.sweep(now + Duration::from_millis(1));
    assert_eq!(swept.len(), 1);
    match waiter.await.expect("waiter resolved") {
      TxnOutcome::Failure(Cause::Timeout) => {}
      other => panic!("expected timeout, got {other:?}"),
    }
  }

  #[test]
  fn table_full_rejects_new_registrations() {
    let mut table = TransactionTable::new(2);
    let now = Instant::now();
    table
      .register(TxnKind::Control, Duration::from_secs(1), now)
      .expect("first");
    table
      .register(TxnKind::Control, Duration::from_secs(1), now)
      .expect("second");
    assert!(matches!(
      table.register(TxnKind::Control, Duration::from_secs(1), now),
      Err(TxnError::TableFull(2))
    ));
  }

  #[tokio::test]
  async fn fail_all_resolves_every_waiter() {
    let mut table = TransactionTable::new(16);
    let now = Instant::now();
    let (_id1, w1) = table
      .register(TxnKind::Control, Duration::from_secs(1), now)
      .expect("register 1");
    let (_id2, w2) = table
      .register(TxnKind::Subscribe, Duration::from_secs(1), now)
      .expect("register 2");
    table.fail_all(Cause::NodeUnreachable);
    assert!(matches!(
      w1.await.expect("resolved"),
      TxnOutcome::Failure(Cause::NodeUnreachable)
    ));
    assert!(matches!(
      w2.await.expect("resolved"),
      TxnOutcome::Failure(Cause::NodeUnreachable)
    ));
  }
}
