//! Subscription Manager (C5, spec.md §3 I1-I4, §4.5).
//!
//! Owns every [`Subscription`] regardless of which node it belongs to, and
//! drives the Create/Modify/Delete/List/OnNodeLost/OnServiceWithdrawn state
//! machine. Grounded in the teacher's reader/writer matching discipline
//! (`SimpleDataReader` pairing instances to their writer by GUID): here a
//! subscription is matched to exactly one node + function pair, and the
//! manager is the only place allowed to move it between states.

pub mod sink;
pub mod state;

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::RwLock;
use tokio::time::Instant;

pub use sink::{PushOutcome, Sink, SinkPolicy};
pub use state::SubscriptionState;

use crate::codec::pdu::{
  self, Pdu, RicSubscriptionDeleteRequest, RicSubscriptionRequest,
};
use crate::config::Config;
use crate::error::{E2Error, E2Result};
use crate::metrics::Metrics;
use crate::node::NodeTable;
use crate::registry::Registry;
use crate::txn::{TxnKind, TxnOutcome};
use crate::types::{
  Action, Cause, GlobalE2NodeId, RanFunctionId, RicRequestId, SubscriptionId, XAppId,
};

/// Result of polling a subscription's sink (spec.md §6, `Next()`).
#[derive(Debug, Clone)]
pub enum Next {
  /// One indication, in wire arrival order.
  Item(IndicationPayload),
  /// The `DropOldest` policy discarded `n` envelopes since the last `next()`
  /// call; delivered once, ahead of the item that follows it.
  Lagged(u64),
  /// The subscription is `Dead` and its sink has been fully drained.
  Eof,
}

/// One delivered `RICindication`, stripped of its E2AP envelope.
#[derive(Debug, Clone)]
pub struct IndicationPayload {
  pub action_id: u16,
  pub indication_header: Bytes,
  pub indication_message: Bytes,
  pub call_process_id: Option<Bytes>,
  pub sequence: u32,
}

struct Mutable {
  ric_request_id: RicRequestId,
  actions: Vec<Action>,
  state: SubscriptionState,
}

/// A live (or formerly live) subscription handle. `id`/`node_id`/
/// `function_id`/`xapp_id` are fixed for the subscription's whole life (I4);
/// the request id, admitted actions, and state move as Modify/Delete run.
pub struct Subscription {
  pub id: SubscriptionId,
  pub node_id: GlobalE2NodeId,
  pub function_id: RanFunctionId,
  pub xapp_id: XAppId,
  mutable: RwLock<Mutable>,
  pub sink: Arc<Sink<IndicationPayload>>,
}

impl Subscription {
  pub fn state(&self) -> SubscriptionState {
    self.mutable.read().state
  }

  pub fn ric_request_id(&self) -> RicRequestId {
    self.mutable.read().ric_request_id
  }

  pub fn actions(&self) -> Vec<Action> {
    self.mutable.read().actions.clone()
  }

  /// Pull the next indication, blocking until one arrives or the
  /// subscription is torn down.
  pub async fn recv(&self) -> Option<IndicationPayload> {
    self.sink.recv().await
  }

  /// The xApp-facing sink iterator (spec.md §6): surfaces a `Lagged(n)`
  /// signal ahead of the next item whenever `DropOldest` has evicted
  /// anything since the last call, then falls back to [`Self::recv`].
  pub async fn next(&self) -> Next {
    let lagged = self.sink.take_lagged();
    if lagged > 0 {
      return Next::Lagged(lagged);
    }
    match self.recv().await {
      Some(item) => Next::Item(item),
      None => Next::Eof,
    }
  }
}

/// Selects a subset of subscriptions for `SubscriptionManager::list`
/// (SPEC_FULL.md §11.4). All set predicates are ANDed together; an unset
/// predicate matches everything.
#[derive(Debug, Clone, Default)]
pub struct SubscriptionFilter {
  node_id: Option<GlobalE2NodeId>,
  function_id: Option<RanFunctionId>,
  xapp_id: Option<XAppId>,
  state: Option<SubscriptionState>,
}

impl SubscriptionFilter {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn node(mut self, id: GlobalE2NodeId) -> Self {
    self.node_id = Some(id);
    self
  }

  pub fn function(mut self, id: RanFunctionId) -> Self {
    self.function_id = Some(id);
    self
  }

  pub fn xapp(mut self, id: XAppId) -> Self {
    self.xapp_id = Some(id);
    self
  }

  pub fn state(mut self, state: SubscriptionState) -> Self {
    self.state = Some(state);
    self
  }

  fn matches(&self, sub: &Subscription) -> bool {
    if let Some(node_id) = &self.node_id {
      if &sub.node_id != node_id {
        return false;
      }
    }
    if let Some(function_id) = self.function_id {
      if sub.function_id != function_id {
        return false;
      }
    }
    if let Some(xapp_id) = self.xapp_id {
      if sub.xapp_id != xapp_id {
        return false;
      }
    }
    if let Some(state) = self.state {
      if sub.state() != state {
        return false;
      }
    }
    true
  }
}

pub struct SubscriptionManager {
  subscriptions: RwLock<HashMap<SubscriptionId, Arc<Subscription>>>,
  by_node: RwLock<HashMap<GlobalE2NodeId, HashSet<SubscriptionId>>>,
  next_id: AtomicU64,
  config: Config,
  metrics: Metrics,
}

impl SubscriptionManager {
  pub fn new(config: Config, metrics: Metrics) -> Self {
    Self {
      subscriptions: RwLock::new(HashMap::new()),
      by_node: RwLock::new(HashMap::new()),
      next_id: AtomicU64::new(1),
      config,
      metrics,
    }
  }

  /// Allocate a fresh outbound transaction on `node` (spec.md §4.4). The
  /// returned [`RicRequestId`] is a *new* application-level identity,
  /// `requestor_id` set to the calling xApp (I2: unique per (xApp, node),
  /// never globally); for a Delete, which must instead echo the
  /// subscription's original RIC Request ID, build that PDU field
  /// separately and pass just the transaction id down to
  /// [`crate::codec::encode`].
  async fn register_txn(
    &self,
    node: &crate::node::E2Node,
    xapp_id: XAppId,
    kind: TxnKind,
    deadline: std::time::Duration,
  ) -> E2Result<(crate::types::TransactionId, RicRequestId, crate::txn::Waiter)> {
    let mut txns = node.txns.lock().await;
    let (txn_id, waiter) = txns
      .register(kind, deadline, Instant::now())
      .map_err(|e| E2Error::Capacity(e.to_string()))?;
    Ok((
      txn_id,
      RicRequestId {
        requestor_id: xapp_id.0,
        instance_id: txn_id.0 as u32,
      },
      waiter,
    ))
  }

  fn subs_for_node(&self, node_id: &GlobalE2NodeId) -> usize {
    self
      .by_node
      .read()
      .get(node_id)
      .map(HashSet::len)
      .unwrap_or(0)
  }

  /// Validate event trigger + actions against the registered handler,
  /// splitting requested actions into admitted vs. rejected (spec.md §4.5
  /// Create steps 2-3).
  fn validate(
    registry: &Registry,
    function_id: RanFunctionId,
    event_trigger_definition: &Bytes,
    requested: &[Action],
  ) -> Result<(Vec<Action>, Vec<(u16, Cause)>), Cause> {
    let handler = registry
      .get(function_id)
      .ok_or(Cause::RanFunctionIdInvalid)?;
    handler.validate_event_trigger(event_trigger_definition)?;

    let mut admitted = Vec::with_capacity(requested.len());
    let mut rejected = Vec::new();
    for action in requested {
      let def = action.action_definition.clone().unwrap_or_default();
      match handler.validate_action_def(&def) {
        Ok(()) => admitted.push(action.clone()),
        Err(cause) => rejected.push((action.action_id, cause)),
      }
    }
    Ok((admitted, rejected))
  }

  /// Create a new subscription against `node_id`/`function_id` (spec.md
  /// §4.5 Create). Idempotent on a byte-identical duplicate request against
  /// an already-`Active`/`Pending` subscription for the same node+function:
  /// the existing handle is returned rather than a second one created
  /// (SPEC_FULL.md §11.4 tie-break).
  pub async fn create(
    &self,
    nodes: &NodeTable,
    registry: &Registry,
    xapp_id: XAppId,
    node_id: &GlobalE2NodeId,
    function_id: RanFunctionId,
    event_trigger_definition: Bytes,
    actions: Vec<Action>,
  ) -> E2Result<Arc<Subscription>> {
    if let Some(existing) = self.find_duplicate(xapp_id, node_id, function_id, &actions) {
      return Ok(existing);
    }

    if self.subs_for_node(node_id) >= self.config.max_subs_per_node {
      return Err(E2Error::Capacity(format!(
        "node {node_id} already has {} subscriptions",
        self.config.max_subs_per_node
      )));
    }

    let node = nodes
      .get(node_id)
      .ok_or(E2Error::NodeUnreachable)?;

    let (admitted, _rejected) =
      Self::validate(registry, function_id, &event_trigger_definition, &actions)
        .map_err(|c| E2Error::Validation(c.to_string()))?;
    if admitted.is_empty() {
      return Err(E2Error::Validation(
        "no requested action was admitted by the service model".into(),
      ));
    }

    let (txn_id, ric_request_id, waiter) = self
      .register_txn(&node, xapp_id, TxnKind::Subscribe, self.config.t_sub)
      .await?;
    let request = Pdu::RicSubscriptionRequest(RicSubscriptionRequest {
      ric_request_id,
      function_id,
      event_trigger_definition,
      actions: admitted.clone(),
    });
    let wire = crate::codec::encode(&request, txn_id)?;
    node.association.send(wire).await?;
    let outcome = waiter.await.map_err(|_| E2Error::Timeout)?;

    let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
    match outcome {
      TxnOutcome::Success(Pdu::RicSubscriptionResponse(resp)) => {
        let admitted_ids: HashSet<u16> = resp.admitted_actions.into_iter().collect();
        let final_actions: Vec<Action> = admitted
          .into_iter()
          .filter(|a| admitted_ids.contains(&a.action_id))
          .collect();
        let sub = Arc::new(Subscription {
          id,
          node_id: node_id.clone(),
          function_id,
          xapp_id,
          mutable: RwLock::new(Mutable {
            ric_request_id,
            actions: final_actions,
            state: SubscriptionState::Active,
          }),
          sink: Arc::new(Sink::new(
            self.config.sink_capacity,
            self.config.sink_policy,
            self.config.t_sink_wait,
          )),
        });
        self.subscriptions.write().insert(id, sub.clone());
        self
          .by_node
          .write()
          .entry(node_id.clone())
          .or_default()
          .insert(id);
        Ok(sub)
      }
      TxnOutcome::Success(Pdu::RicSubscriptionFailure(fail)) => {
        Err(E2Error::Protocol(fail.cause.to_string()))
      }
      TxnOutcome::Success(_) => Err(E2Error::Protocol(
        "unexpected PDU in response to RICsubscriptionRequest".into(),
      )),
      TxnOutcome::Failure(cause) => Err(E2Error::Protocol(cause.to_string())),
    }
  }

  fn find_duplicate(
    &self,
    xapp_id: XAppId,
    node_id: &GlobalE2NodeId,
    function_id: RanFunctionId,
    actions: &[Action],
  ) -> Option<Arc<Subscription>> {
    let ids = self.by_node.read().get(node_id).cloned().unwrap_or_default();
    let subs = self.subscriptions.read();
    ids.into_iter().find_map(|id| {
      let sub = subs.get(&id)?;
      if sub.xapp_id == xapp_id
        && sub.function_id == function_id
        && matches!(sub.state(), SubscriptionState::Active | SubscriptionState::Pending)
        && sub.actions() == actions
      {
        Some(sub.clone())
      } else {
        None
      }
    })
  }

  /// Modify an existing subscription. The wire protocol here has no native
  /// `RICsubscriptionModification` procedure, so a Modify is carried out as
  /// a Delete of the old terms followed by a Create of the new ones,
  /// reusing the same [`SubscriptionId`] and [`Sink`] so a caller holding
  /// the `Arc<Subscription>` sees it keep delivering (I3) rather than
  /// having to re-acquire a new handle (SPEC_FULL.md §12.3).
  pub async fn modify(
    &self,
    nodes: &NodeTable,
    registry: &Registry,
    xapp_id: XAppId,
    id: SubscriptionId,
    event_trigger_definition: Bytes,
    actions: Vec<Action>,
  ) -> E2Result<Arc<Subscription>> {
    let sub = self
      .subscriptions
      .read()
      .get(&id)
      .cloned()
      .ok_or_else(|| E2Error::Validation(format!("no such subscription {id:?}")))?;

    if sub.xapp_id != xapp_id {
      return Err(E2Error::Validation(format!(
        "subscription {id:?} does not belong to this xApp"
      )));
    }
    if sub.state().is_terminal() {
      return Err(E2Error::Validation("subscription already deleted".into()));
    }
    sub.mutable.write().state = SubscriptionState::Modifying;

    let node = match nodes.get(&sub.node_id) {
      Some(n) => n,
      None => {
        sub.mutable.write().state = SubscriptionState::Dead;
        return Err(E2Error::NodeUnreachable);
      }
    };

    let (admitted, _rejected) =
      Self::validate(registry, sub.function_id, &event_trigger_definition, &actions).map_err(
        |c| {
          sub.mutable.write().state = SubscriptionState::Active;
          E2Error::Validation(c.to_string())
        },
      )?;
    if admitted.is_empty() {
      sub.mutable.write().state = SubscriptionState::Active;
      return Err(E2Error::Validation(
        "no requested action was admitted by the service model".into(),
      ));
    }

    let old_request_id = sub.ric_request_id();
    if let Err(e) = self
      .send_delete(&node, xapp_id, sub.function_id, old_request_id)
      .await
    {
      sub.mutable.write().state = SubscriptionState::Active;
      return Err(e);
    }

    let (txn_id, new_request_id, waiter) = match self
      .register_txn(&node, xapp_id, TxnKind::Subscribe, self.config.t_sub)
      .await
    {
      Ok(v) => v,
      Err(e) => {
        sub.mutable.write().state = SubscriptionState::Active;
        return Err(e);
      }
    };
    let request = Pdu::RicSubscriptionRequest(RicSubscriptionRequest {
      ric_request_id: new_request_id,
      function_id: sub.function_id,
      event_trigger_definition,
      actions: admitted.clone(),
    });
    let wire = crate::codec::encode(&request, txn_id)?;
    node.association.send(wire).await?;
    let outcome = waiter.await.map_err(|_| E2Error::Timeout)?;

    match outcome {
      TxnOutcome::Success(Pdu::RicSubscriptionResponse(resp)) => {
        let admitted_ids: HashSet<u16> = resp.admitted_actions.into_iter().collect();
        let final_actions: Vec<Action> = admitted
          .into_iter()
          .filter(|a| admitted_ids.contains(&a.action_id))
          .collect();
        let mut mutable = sub.mutable.write();
        mutable.ric_request_id = new_request_id;
        mutable.actions = final_actions;
        mutable.state = SubscriptionState::Active;
        drop(mutable);
        Ok(sub)
      }
      TxnOutcome::Success(Pdu::RicSubscriptionFailure(fail)) => {
        sub.mutable.write().state = SubscriptionState::Dead;
        self.forget(&sub);
        Err(E2Error::Protocol(fail.cause.to_string()))
      }
      TxnOutcome::Success(_) => {
        sub.mutable.write().state = SubscriptionState::Active;
        Err(E2Error::Protocol(
          "unexpected PDU in response to RICsubscriptionRequest".into(),
        ))
      }
      TxnOutcome::Failure(cause) => {
        sub.mutable.write().state = SubscriptionState::Dead;
        self.forget(&sub);
        Err(E2Error::Protocol(cause.to_string()))
      }
    }
  }

  /// `ric_request_id` here is the *original* subscription's identity, sent
  /// unchanged so the node knows which subscription to delete; a fresh
  /// transaction id correlates the response rather than the (already
  /// resolved, possibly even reused by another request by now) original
  /// one.
  async fn send_delete(
    &self,
    node: &crate::node::E2Node,
    xapp_id: XAppId,
    function_id: RanFunctionId,
    ric_request_id: RicRequestId,
  ) -> E2Result<()> {
    let request = Pdu::RicSubscriptionDeleteRequest(RicSubscriptionDeleteRequest {
      ric_request_id,
      function_id,
    });
    let (txn_id, _fresh_request_id, waiter) = self
      .register_txn(node, xapp_id, TxnKind::SubscriptionDelete, self.config.t_del)
      .await?;
    let outcome = {
      let wire = crate::codec::encode(&request, txn_id)?;
      node.association.send(wire).await?;
      waiter.await.map_err(|_| E2Error::Timeout)?
    };
    match outcome {
      TxnOutcome::Success(Pdu::RicSubscriptionDeleteResponse(_)) => Ok(()),
      TxnOutcome::Success(Pdu::RicSubscriptionDeleteFailure(fail)) => {
        Err(E2Error::Protocol(fail.cause.to_string()))
      }
      TxnOutcome::Success(_) => Err(E2Error::Protocol(
        "unexpected PDU in response to RICsubscriptionDeleteRequest".into(),
      )),
      TxnOutcome::Failure(cause) => Err(E2Error::Protocol(cause.to_string())),
    }
  }

  /// Delete a subscription (spec.md §4.5 Delete). Always moves the
  /// subscription to `Dead` and removes it from the manager's tables, even
  /// if the node rejects or never answers the delete request — a
  /// terminated subscription never comes back (I4).
  pub async fn delete(&self, nodes: &NodeTable, xapp_id: XAppId, id: SubscriptionId) -> E2Result<()> {
    let sub = self
      .subscriptions
      .read()
      .get(&id)
      .cloned()
      .ok_or_else(|| E2Error::Validation(format!("no such subscription {id:?}")))?;

    if sub.xapp_id != xapp_id {
      return Err(E2Error::Validation(format!(
        "subscription {id:?} does not belong to this xApp"
      )));
    }
    if sub.state().is_terminal() {
      return Ok(());
    }
    sub.mutable.write().state = SubscriptionState::Deleting;

    let result = match nodes.get(&sub.node_id) {
      Some(node) => {
        self
          .send_delete(&node, xapp_id, sub.function_id, sub.ric_request_id())
          .await
      }
      None => Err(E2Error::NodeUnreachable),
    };

    sub.mutable.write().state = SubscriptionState::Dead;
    sub.sink.close();
    self.forget(&sub);
    result
  }

  fn forget(&self, sub: &Subscription) {
    self.subscriptions.write().remove(&sub.id);
    if let Some(set) = self.by_node.write().get_mut(&sub.node_id) {
      set.remove(&sub.id);
    }
  }

  pub fn list(&self, filter: &SubscriptionFilter) -> Vec<Arc<Subscription>> {
    self
      .subscriptions
      .read()
      .values()
      .filter(|s| filter.matches(s))
      .cloned()
      .collect()
  }

  pub fn get(&self, id: SubscriptionId) -> Option<Arc<Subscription>> {
    self.subscriptions.read().get(&id).cloned()
  }

  /// Deliver one indication to its subscription's sink. Called by the
  /// router (spec.md §4.6); returns `false` if the subscription is unknown
  /// or not currently accepting indications, so the caller can count it
  /// against `indications_dropped_unknown`.
  ///
  /// Looked up through the per-node index first: `ric_request_id` is only
  /// unique within a (xApp, node) pair (I2), so two different nodes can
  /// hand back bit-identical `RicRequestId`s, and matching on
  /// `ric_request_id` alone across the whole subscription table would
  /// misdeliver one node's indications to another node's subscription.
  pub async fn deliver(
    &self,
    node_id: &GlobalE2NodeId,
    ric_request_id: RicRequestId,
    payload: IndicationPayload,
  ) -> bool {
    let sub = {
      let ids = self.by_node.read().get(node_id).cloned().unwrap_or_default();
      let subs = self.subscriptions.read();
      ids
        .into_iter()
        .find_map(|id| subs.get(&id).filter(|s| s.ric_request_id() == ric_request_id).cloned())
    };
    let Some(sub) = sub else {
      return false;
    };
    if !sub.state().accepts_indications() {
      return false;
    }
    let outcome = sub.sink.push(payload).await;
    if !matches!(outcome, PushOutcome::Enqueued) {
      let policy = match sub.sink.policy() {
        SinkPolicy::DropOldest => "drop_oldest",
        SinkPolicy::DropNewest => "drop_newest",
        SinkPolicy::Block => "block",
      };
      self
        .metrics
        .indications_dropped_backpressure
        .with_label_values(&[&sub.id.0.to_string(), policy])
        .inc();
    }
    true
  }

  /// Fail over every subscription belonging to a node that just went away
  /// (spec.md §5, association loss cascades to subscriptions).
  pub fn on_node_lost(&self, node_id: &GlobalE2NodeId) {
    let ids = self
      .by_node
      .write()
      .remove(node_id)
      .unwrap_or_default();
    let mut subs = self.subscriptions.write();
    for id in ids {
      if let Some(sub) = subs.remove(&id) {
        sub.mutable.write().state = SubscriptionState::Dead;
        sub.sink.close();
      }
    }
  }

  /// Cascade-delete every subscription for a function a node just withdrew
  /// via `RICserviceUpdate` (SPEC_FULL.md §11.1).
  pub fn on_service_withdrawn(&self, node_id: &GlobalE2NodeId, function_id: RanFunctionId) {
    let victims: Vec<SubscriptionId> = self
      .subscriptions
      .read()
      .values()
      .filter(|s| &s.node_id == node_id && s.function_id == function_id)
      .map(|s| s.id)
      .collect();
    let mut subs = self.subscriptions.write();
    let mut by_node = self.by_node.write();
    for id in victims {
      if let Some(sub) = subs.remove(&id) {
        sub.mutable.write().state = SubscriptionState::Dead;
        sub.sink.close();
        if let Some(set) = by_node.get_mut(node_id) {
          set.remove(&id);
        }
      }
    }
  }
}

// Re-exported so callers can build a `RanFunctionItem` without reaching
// into `codec::pdu` directly when wiring up a registry.
pub use pdu::RanFunctionItem;

#[cfg(test)]
mod tests {
  use super::*;
  use crate::types::{ActionType, RanFunctionId};

  fn sample_action(id: u16) -> Action {
    Action {
      action_id: id,
      action_type: ActionType::Report,
      subsequent_action: None,
      action_definition: Some(Bytes::from_static(b"def")),
    }
  }

  #[test]
  fn filter_matches_on_every_set_predicate() {
    let sub = Subscription {
      id: SubscriptionId(1),
      node_id: GlobalE2NodeId(Bytes::from_static(b"node-a")),
      function_id: RanFunctionId(7),
      xapp_id: XAppId(42),
      mutable: RwLock::new(Mutable {
        ric_request_id: RicRequestId {
          requestor_id: 1,
          instance_id: 1,
        },
        actions: vec![sample_action(1)],
        state: SubscriptionState::Active,
      }),
      sink: Arc::new(Sink::new(4, SinkPolicy::DropOldest, std::time::Duration::from_millis(1))),
    };

    let match_all = SubscriptionFilter::new()
      .node(GlobalE2NodeId(Bytes::from_static(b"node-a")))
      .function(RanFunctionId(7))
      .state(SubscriptionState::Active);
    assert!(match_all.matches(&sub));

    let wrong_function = SubscriptionFilter::new().function(RanFunctionId(8));
    assert!(!wrong_function.matches(&sub));

    let wrong_xapp = SubscriptionFilter::new().xapp(XAppId(99));
    assert!(!wrong_xapp.matches(&sub));
    assert!(SubscriptionFilter::new().xapp(XAppId(42)).matches(&sub));
  }
}
