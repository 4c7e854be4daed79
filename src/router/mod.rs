//! Indication/Control Router (C6, spec.md §4.6).
//!
//! One [`Router`] is shared (via `Arc`) across every association task. It
//! has no per-association state of its own — everything it touches lives
//! on the [`crate::node::E2Node`] (transaction table, function list) or the
//! [`crate::subscription::SubscriptionManager`] (sink delivery) — so an
//! association's reader task can call `handle_inbound` directly without any
//! further locking at this layer, mirroring the teacher's dispatch-by-type
//! match in its own submessage reader loop.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;

use crate::codec::pdu::{
  self, ControlAckRequest, Pdu, RicControlRequest,
};
use crate::codec::{self, NO_TRANSACTION};
use crate::config::Config;
use crate::error::{E2Error, E2Result};
use crate::metrics::Metrics;
use crate::node::E2Node;
use crate::registry::Registry;
use crate::subscription::{IndicationPayload, SubscriptionManager};
use crate::txn::{TxnKind, TxnOutcome};
use crate::types::{Cause, RanFunctionId, RicRequestId, TransactionId};

/// Consecutive malformed PDUs tolerated before an association is torn down
/// (spec.md §4.2/§4.6 persistent-violation rule).
const MAX_CONSECUTIVE_BAD_PDUS: u32 = 3;

pub struct Router {
  registry: Arc<Registry>,
  subscriptions: Arc<SubscriptionManager>,
  metrics: Metrics,
  config: Config,
}

/// The outcome of processing one inbound frame, telling the association's
/// reader task whether to keep going.
pub enum InboundOutcome {
  Continue,
  TerminateAssociation(Cause),
}

impl Router {
  pub fn new(
    registry: Arc<Registry>,
    subscriptions: Arc<SubscriptionManager>,
    metrics: Metrics,
    config: Config,
  ) -> Self {
    Self {
      registry,
      subscriptions,
      metrics,
      config,
    }
  }

  /// Decode and dispatch one inbound frame from `node`'s association.
  pub async fn handle_inbound(&self, node: &Arc<E2Node>, raw: Bytes) -> InboundOutcome {
    node.note_activity();
    match codec::decode(&raw) {
      Err(e) => {
        self.metrics.record_error(&E2Error::Codec(e));
        let misses = node.consecutive_bad_pdus.fetch_add(1, Ordering::Relaxed) + 1;
        if misses >= MAX_CONSECUTIVE_BAD_PDUS {
          InboundOutcome::TerminateAssociation(Cause::ProtocolPersistent)
        } else {
          // Recovered locally: tell the peer something was wrong without
          // tearing the association down (spec.md §4.6 failure semantics).
          self
            .send_error_indication(node, Cause::Protocol("malformed E2AP envelope".into()))
            .await;
          InboundOutcome::Continue
        }
      }
      Ok((txn_id, pdu)) => {
        node.consecutive_bad_pdus.store(0, Ordering::Relaxed);
        self.dispatch(node, txn_id, pdu).await;
        InboundOutcome::Continue
      }
    }
  }

  async fn dispatch(&self, node: &Arc<E2Node>, txn_id: TransactionId, pdu: Pdu) {
    match pdu {
      Pdu::RicIndication(ind) => self.deliver_indication(node, ind).await,
      Pdu::RicServiceUpdate(update) => self.apply_function_update(node, update).await,
      Pdu::E2NodeConfigurationUpdate(update) => {
        self.acknowledge_configuration_update(node, txn_id, update).await
      }
      Pdu::ErrorIndication(ei) => {
        log::warn!(
          "[{}] peer reported ErrorIndication: {}",
          node.global_id,
          ei.cause
        );
        self.metrics.record_error(&E2Error::Protocol(ei.cause.to_string()));
      }
      Pdu::ResetRequest(req) => self.handle_reset_request(node, txn_id, req.cause).await,
      Pdu::ResetResponse(_) => self.handle_reset_response(node).await,
      // Everything else is a response to something *we* sent; resolve the
      // matching transaction (or count it as late if none is outstanding).
      other => self.resolve_transaction(node, txn_id, other).await,
    }
  }

  async fn deliver_indication(&self, node: &Arc<E2Node>, ind: pdu::RicIndication) {
    let ric_request_id = ind.ric_request_id;
    let payload = IndicationPayload {
      action_id: ind.action_id,
      indication_header: ind.indication_header,
      indication_message: ind.indication_message,
      call_process_id: ind.call_process_id,
      sequence: ind.sequence,
    };
    if !self
      .subscriptions
      .deliver(&node.global_id, ric_request_id, payload)
      .await
    {
      self
        .metrics
        .indications_dropped_unknown
        .with_label_values(&[&node.global_id.to_string()])
        .inc();
    }
  }

  async fn apply_function_update(&self, node: &Arc<E2Node>, update: pdu::RicServiceUpdate) {
    node.apply_configuration_update(&update.added_functions, &update.removed_functions);
    for function_id in &update.removed_functions {
      self
        .subscriptions
        .on_service_withdrawn(&node.global_id, *function_id);
    }
  }

  async fn acknowledge_configuration_update(
    &self,
    node: &Arc<E2Node>,
    txn_id: TransactionId,
    update: pdu::E2NodeConfigurationUpdate,
  ) {
    node.apply_configuration_update(&update.added_functions, &update.removed_functions);
    let accepted_additions: Vec<RanFunctionId> = update
      .added_functions
      .iter()
      .map(|f| f.function_id)
      .collect();
    let accepted_removals = update.removed_functions.clone();
    for function_id in &update.removed_functions {
      self
        .subscriptions
        .on_service_withdrawn(&node.global_id, *function_id);
    }

    let ack = Pdu::E2NodeConfigurationUpdateAcknowledge(pdu::E2NodeConfigurationUpdateAcknowledge {
      accepted_additions,
      accepted_removals,
    });
    match codec::encode(&ack, txn_id) {
      Ok(wire) => {
        if let Err(e) = node.association.send(wire).await {
          log::warn!(
            "[{}] failed to send E2NodeConfigurationUpdateAcknowledge: {e}",
            node.global_id
          );
        }
      }
      Err(e) => self.metrics.record_error(&E2Error::Codec(e)),
    }
  }

  async fn handle_reset_request(&self, node: &Arc<E2Node>, txn_id: TransactionId, cause: Cause) {
    log::info!("[{}] peer requested reset: {cause}", node.global_id);
    node.txns.lock().await.fail_all(cause);
    let response = Pdu::ResetResponse(pdu::ResetResponse);
    match codec::encode(&response, txn_id) {
      Ok(wire) => {
        if let Err(e) = node.association.send(wire).await {
          log::warn!("[{}] failed to send ResetResponse: {e}", node.global_id);
        }
      }
      Err(e) => self.metrics.record_error(&E2Error::Codec(e)),
    }
  }

  async fn send_error_indication(&self, node: &Arc<E2Node>, cause: Cause) {
    let ei = Pdu::ErrorIndication(pdu::ErrorIndication {
      ric_request_id: None,
      cause,
    });
    match codec::encode(&ei, NO_TRANSACTION) {
      Ok(wire) => {
        if let Err(e) = node.association.send(wire).await {
          log::warn!("[{}] failed to send ErrorIndication: {e}", node.global_id);
        }
      }
      Err(e) => self.metrics.record_error(&E2Error::Codec(e)),
    }
  }

  async fn handle_reset_response(&self, node: &Arc<E2Node>) {
    if let Some(tx) = node.pending_reset.lock().await.take() {
      let _ = tx.send(());
    }
  }

  async fn resolve_transaction(&self, node: &Arc<E2Node>, txn_id: TransactionId, pdu: Pdu) {
    let procedure = pdu.procedure_name();
    let cause = extract_cause(&pdu);
    let mut txns = node.txns.lock().await;
    let result = match cause {
      Some(cause) => txns.fail(txn_id, cause),
      None => txns.complete(txn_id, pdu),
    };
    drop(txns);
    if result.is_err() {
      self
        .metrics
        .late_responses_discarded
        .with_label_values(&[procedure])
        .inc();
    }
  }

  /// Issue a `RICcontrolRequest` and await its acknowledgement (spec.md
  /// §4.6 control round trip).
  pub async fn control(
    &self,
    node: &Arc<E2Node>,
    function_id: RanFunctionId,
    control_header: Bytes,
    control_message: Bytes,
    ack_request: ControlAckRequest,
  ) -> E2Result<Option<Bytes>> {
    if !self.registry.contains(function_id) || !node.has_function(function_id) {
      return Err(E2Error::Validation(format!(
        "function {function_id:?} is not known on node {}",
        node.global_id
      )));
    }

    let requestor_id = node.global_id.0.len() as u32; // stable per-node salt, any value works
    let (txn_id, waiter) = {
      let mut txns = node.txns.lock().await;
      txns
        .register(TxnKind::Control, self.config.t_ctl_max, tokio::time::Instant::now())
        .map_err(|e| E2Error::Capacity(e.to_string()))?
    };
    let ric_request_id = RicRequestId {
      requestor_id,
      instance_id: txn_id.0 as u32,
    };
    let request = Pdu::RicControlRequest(RicControlRequest {
      ric_request_id,
      function_id,
      control_header,
      control_message,
      ack_request,
    });

    if matches!(ack_request, ControlAckRequest::NoAck) {
      // Fire-and-forget: send, but don't block on a response that will
      // never come. Complete the transaction locally so it doesn't sit
      // around until the sweeper times it out.
      let wire = codec::encode(&request, txn_id)?;
      node.association.send(wire).await?;
      node.txns.lock().await.cancel(txn_id);
      return Ok(None);
    }

    let wire = codec::encode(&request, txn_id)?;
    node.association.send(wire).await?;
    match waiter.await.map_err(|_| E2Error::Timeout)? {
      TxnOutcome::Success(Pdu::RicControlAcknowledge(ack)) => Ok(Some(ack.outcome)),
      TxnOutcome::Success(Pdu::RicControlFailure(fail)) => {
        Err(E2Error::Protocol(fail.cause.to_string()))
      }
      TxnOutcome::Success(_) => Err(E2Error::Protocol(
        "unexpected PDU in response to RICcontrolRequest".into(),
      )),
      TxnOutcome::Failure(cause) => Err(E2Error::Protocol(cause.to_string())),
    }
  }

  /// Send a `ResetRequest` to `node` and await its `ResetResponse`
  /// (SPEC_FULL.md §11.2's `Core::reset_node`). ResetRequest/Response carry
  /// no RIC Request ID, so correlation is a one-shot stashed on the node
  /// rather than routed through the transaction table.
  pub async fn reset_node(&self, node: &Arc<E2Node>, cause: Cause, timeout: Duration) -> E2Result<()> {
    let (tx, rx) = tokio::sync::oneshot::channel();
    {
      let mut pending = node.pending_reset.lock().await;
      if pending.is_some() {
        return Err(E2Error::Validation("a reset is already outstanding".into()));
      }
      *pending = Some(tx);
    }
    node.txns.lock().await.fail_all(cause.clone());
    let request = Pdu::ResetRequest(pdu::ResetRequest { cause });
    let wire = codec::encode(&request, NO_TRANSACTION)?;
    node.association.send(wire).await?;

    match tokio::time::timeout(timeout, rx).await {
      Ok(Ok(())) => Ok(()),
      _ => {
        node.pending_reset.lock().await.take();
        Err(E2Error::Timeout)
      }
    }
  }
}

/// PDUs that represent a peer-reported failure map straight to their
/// `Cause`; everything else resolves the transaction as a success payload.
fn extract_cause(pdu: &Pdu) -> Option<Cause> {
  match pdu {
    Pdu::E2SetupFailure(f) => Some(f.cause.clone()),
    Pdu::RicSubscriptionFailure(f) => Some(f.cause.clone()),
    Pdu::RicSubscriptionDeleteFailure(f) => Some(f.cause.clone()),
    Pdu::RicControlFailure(f) => Some(f.cause.clone()),
    _ => None,
  }
}
