//! E2 Node table (spec.md §3, §5).
//!
//! Reads (the Router's hot path: "which node owns this association", "is
//! function 7 known to node X") must never block on a writer. Following the
//! teacher's discussion-group / participant-table pattern of handing out
//! `Arc` snapshots rather than locking a shared map per read, [`NodeTable`]
//! keeps a single writer (the core's main task) and publishes copy-on-write
//! snapshots that association tasks and the router read through an
//! `arc-swap`-free `parking_lot::RwLock<Arc<...>>` — cheap clones, no
//! writer starvation under read-heavy load.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::time::Instant;

use crate::codec::pdu::RanFunctionItem;
use crate::transport::Association;
use crate::txn::TransactionTable;
use crate::types::{GlobalE2NodeId, NodeType, RanFunctionId, RanFunctionRevision};

#[derive(Debug, Clone)]
pub struct RanFunction {
  pub revision: RanFunctionRevision,
  pub oid: String,
  pub definition: bytes::Bytes,
}

impl RanFunction {
  pub fn from_item(item: &RanFunctionItem) -> Self {
    Self {
      revision: item.revision,
      oid: item.oid.clone(),
      definition: item.definition.clone(),
    }
  }
}

/// A connected, set-up E2 Node. Owns its [`Association`] and
/// [`TransactionTable`]; the latter is behind a lock because both the
/// association's reader task and the public API (registering an outbound
/// transaction) touch it.
pub struct E2Node {
  pub global_id: GlobalE2NodeId,
  pub node_type: NodeType,
  pub association: Arc<Association>,
  pub functions: RwLock<HashMap<RanFunctionId, RanFunction>>,
  pub txns: tokio::sync::Mutex<TransactionTable>,
  pub last_seen: RwLock<Instant>,
  /// Set while a `Core::reset_node` call is outstanding against this node;
  /// fired the moment its `ResetResponse` arrives (ResetRequest/Response
  /// carry no RIC Request ID to correlate by, unlike every other
  /// procedure, so there can only ever be one in flight per node).
  pub pending_reset: tokio::sync::Mutex<Option<tokio::sync::oneshot::Sender<()>>>,
  /// Consecutive malformed PDUs received on this association. Reset to 0
  /// on every PDU that decodes cleanly; three in a row tears the
  /// association down with `Cause::ProtocolPersistent` (spec.md §4.2/§4.6
  /// persistent-violation rule).
  pub consecutive_bad_pdus: std::sync::atomic::AtomicU32,
}

impl E2Node {
  pub fn new(
    global_id: GlobalE2NodeId,
    node_type: NodeType,
    association: Arc<Association>,
    functions: HashMap<RanFunctionId, RanFunction>,
    max_txn: usize,
  ) -> Self {
    Self {
      global_id,
      node_type,
      association,
      functions: RwLock::new(functions),
      txns: tokio::sync::Mutex::new(TransactionTable::new(max_txn)),
      last_seen: RwLock::new(Instant::now()),
      pending_reset: tokio::sync::Mutex::new(None),
      consecutive_bad_pdus: std::sync::atomic::AtomicU32::new(0),
    }
  }

  pub fn has_function(&self, id: RanFunctionId) -> bool {
    self.functions.read().contains_key(&id)
  }

  pub fn note_activity(&self) {
    *self.last_seen.write() = Instant::now();
  }

  pub fn apply_configuration_update(
    &self,
    added: &[RanFunctionItem],
    removed: &[RanFunctionId],
  ) {
    let mut functions = self.functions.write();
    for item in added {
      functions.insert(item.function_id, RanFunction::from_item(item));
    }
    for id in removed {
      functions.remove(id);
    }
  }
}

/// Copy-on-write snapshot of every live node, keyed by its global id. The
/// core owns the single writer handle; the router and public API clone
/// `Arc<E2Node>`s out of a snapshot and never hold the table lock while
/// awaiting I/O (spec.md §5: "no lock is ever held across an await point").
#[derive(Default)]
pub struct NodeTable {
  inner: RwLock<HashMap<GlobalE2NodeId, Arc<E2Node>>>,
}

impl NodeTable {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn insert(&self, node: Arc<E2Node>) {
    self.inner.write().insert(node.global_id.clone(), node);
  }

  pub fn remove(&self, id: &GlobalE2NodeId) -> Option<Arc<E2Node>> {
    self.inner.write().remove(id)
  }

  pub fn get(&self, id: &GlobalE2NodeId) -> Option<Arc<E2Node>> {
    self.inner.read().get(id).cloned()
  }

  pub fn contains(&self, id: &GlobalE2NodeId) -> bool {
    self.inner.read().contains_key(id)
  }

  /// Snapshot of every connected node, for listing/iteration APIs. Cheap:
  /// `Arc` clones only.
  pub fn snapshot(&self) -> Vec<Arc<E2Node>> {
    self.inner.read().values().cloned().collect()
  }

  pub fn len(&self) -> usize {
    self.inner.read().len()
  }

  pub fn is_empty(&self) -> bool {
    self.inner.read().is_empty()
  }
}
