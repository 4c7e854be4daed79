//! `E2TerminationCore`: the public entry point wiring Transport, Registry,
//! Node Table, Subscription Manager, and Router together (spec.md §2, §4.6).
//!
//! Mirrors the teacher's top-level `DomainParticipant`: one long-lived
//! object owns every background task (accept loop, per-association reader/
//! writer pairs, the deadline sweeper) and hands out cheap `Arc` clones of
//! itself to xApp-facing callers.

use std::sync::Arc;

use bytes::Bytes;
use prometheus::Registry as MetricsRegistry;
use tokio::sync::watch;

use crate::codec::pdu::{ControlAckRequest, E2SetupResponse, Pdu};
use crate::codec;
use crate::config::Config;
use crate::error::{E2Error, E2Result};
use crate::metrics::Metrics;
use crate::node::{E2Node, NodeTable, RanFunction};
use crate::registry::Registry;
use crate::router::{InboundOutcome, Router};
use crate::subscription::{Subscription, SubscriptionFilter, SubscriptionManager};
use crate::transport::tcp::TcpAcceptor;
use crate::transport::{Association, CloseCause};
use crate::types::{Action, Cause, GlobalE2NodeId, RanFunctionId, XAppId};

pub struct E2TerminationCore {
  config: Config,
  nodes: Arc<NodeTable>,
  registry: Arc<Registry>,
  subscriptions: Arc<SubscriptionManager>,
  router: Arc<Router>,
  metrics: Metrics,
  local_addr: std::net::SocketAddr,
  shutdown_tx: watch::Sender<bool>,
  accept_task: tokio::task::JoinHandle<()>,
  sweeper_task: tokio::task::JoinHandle<()>,
}

impl E2TerminationCore {
  /// Bind and start accepting associations. Every `RicRequestId` allocated
  /// afterwards is keyed by the calling xApp's [`XAppId`], passed per-call
  /// to `subscribe`/`modify_subscription`/`delete_subscription` — the core
  /// itself carries no fixed requestor identity.
  pub async fn start(
    config: Config,
    registry: Registry,
    metrics_registry: &MetricsRegistry,
  ) -> std::io::Result<Arc<Self>> {
    if config.framing != crate::config::Framing::TcpLengthPrefixed {
      return Err(std::io::Error::new(
        std::io::ErrorKind::Unsupported,
        "Core::start only binds Framing::TcpLengthPrefixed; establish an SCTP \
         association via transport::sctp::{client, server} and hand it to \
         Core::accept_association instead",
      ));
    }

    let metrics = Metrics::new(metrics_registry).unwrap_or_else(|_| Metrics::detached());
    let registry = Arc::new(registry);
    let nodes = Arc::new(NodeTable::new());
    let subscriptions = Arc::new(SubscriptionManager::new(config.clone(), metrics.clone()));
    let router = Arc::new(Router::new(
      registry.clone(),
      subscriptions.clone(),
      metrics.clone(),
      config.clone(),
    ));

    let acceptor = TcpAcceptor::bind(
      &config.bind_addr,
      config.heartbeat_interval,
      config.heartbeat_misses_to_dead,
    )
    .await?;
    let local_addr = acceptor.local_addr()?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let accept_task = {
      let nodes = nodes.clone();
      let registry = registry.clone();
      let subscriptions = subscriptions.clone();
      let router = router.clone();
      let config = config.clone();
      let metrics = metrics.clone();
      let mut shutdown_rx = shutdown_rx.clone();
      tokio::spawn(async move {
        loop {
          tokio::select! {
            _ = shutdown_rx.changed() => {
              if *shutdown_rx.borrow() {
                log::info!("[e2tc] accept loop shutting down");
                break;
              }
            }
            accepted = acceptor.accept() => {
              match accepted {
                Ok(association) => {
                  spawn_association_handshake(
                    Arc::new(association),
                    nodes.clone(),
                    registry.clone(),
                    subscriptions.clone(),
                    router.clone(),
                    config.clone(),
                    metrics.clone(),
                    shutdown_rx.clone(),
                  );
                }
                Err(e) => log::warn!("[e2tc] accept failed: {e}"),
              }
            }
          }
        }
      })
    };

    let sweeper_task = {
      let nodes = nodes.clone();
      let tick = config.deadline_tick;
      let mut shutdown_rx = shutdown_rx.clone();
      tokio::spawn(async move {
        let mut ticker = tokio::time::interval(tick);
        loop {
          tokio::select! {
            _ = shutdown_rx.changed() => {
              if *shutdown_rx.borrow() {
                break;
              }
            }
            _ = ticker.tick() => {
              let now = tokio::time::Instant::now();
              for node in nodes.snapshot() {
                let swept = node.txns.lock().await.sweep(now);
                for (id, kind) in swept {
                  log::debug!(
                    "[{}] transaction {id:?} ({kind:?}) timed out",
                    node.global_id
                  );
                }
              }
            }
          }
        }
      })
    };

    Ok(Arc::new(Self {
      config,
      nodes,
      registry,
      subscriptions,
      router,
      metrics,
      local_addr,
      shutdown_tx,
      accept_task,
      sweeper_task,
    }))
  }

  pub fn metrics(&self) -> &Metrics {
    &self.metrics
  }

  /// The address actually bound, useful when `config.bind_addr` asked for
  /// an ephemeral port (e.g. `127.0.0.1:0` in tests).
  pub fn local_addr(&self) -> std::net::SocketAddr {
    self.local_addr
  }

  pub fn nodes(&self) -> Vec<Arc<E2Node>> {
    self.nodes.snapshot()
  }

  pub fn node(&self, id: &GlobalE2NodeId) -> Option<Arc<E2Node>> {
    self.nodes.get(id)
  }

  /// Run the E2 Setup handshake over an association the caller already
  /// established (spec.md §6 `Framing::Sctp`: `transport::sctp::{client,
  /// server}` need a pre-connected datagram transport, which `start`'s own
  /// accept loop has no way to obtain). Behaves exactly like an association
  /// that arrived through the TCP listener.
  pub fn accept_association(&self, association: Association) {
    spawn_association_handshake(
      Arc::new(association),
      self.nodes.clone(),
      self.registry.clone(),
      self.subscriptions.clone(),
      self.router.clone(),
      self.config.clone(),
      self.metrics.clone(),
      self.shutdown_tx.subscribe(),
    );
  }

  pub async fn subscribe(
    &self,
    xapp_id: XAppId,
    node_id: &GlobalE2NodeId,
    function_id: RanFunctionId,
    event_trigger_definition: Bytes,
    actions: Vec<Action>,
  ) -> E2Result<Arc<Subscription>> {
    self
      .subscriptions
      .create(
        &self.nodes,
        &self.registry,
        xapp_id,
        node_id,
        function_id,
        event_trigger_definition,
        actions,
      )
      .await
  }

  pub async fn modify_subscription(
    &self,
    xapp_id: XAppId,
    id: crate::types::SubscriptionId,
    event_trigger_definition: Bytes,
    actions: Vec<Action>,
  ) -> E2Result<Arc<Subscription>> {
    self
      .subscriptions
      .modify(
        &self.nodes,
        &self.registry,
        xapp_id,
        id,
        event_trigger_definition,
        actions,
      )
      .await
  }

  pub async fn delete_subscription(
    &self,
    xapp_id: XAppId,
    id: crate::types::SubscriptionId,
  ) -> E2Result<()> {
    self.subscriptions.delete(&self.nodes, xapp_id, id).await
  }

  pub fn list_subscriptions(&self, filter: &SubscriptionFilter) -> Vec<Arc<Subscription>> {
    self.subscriptions.list(filter)
  }

  /// Issue a `RICcontrolRequest` against `node_id` (spec.md §4.6).
  pub async fn control(
    &self,
    node_id: &GlobalE2NodeId,
    function_id: RanFunctionId,
    control_header: Bytes,
    control_message: Bytes,
    ack_request: ControlAckRequest,
  ) -> E2Result<Option<Bytes>> {
    let node = self.nodes.get(node_id).ok_or(E2Error::NodeUnreachable)?;
    self
      .router
      .control(&node, function_id, control_header, control_message, ack_request)
      .await
  }

  /// Send `ResetRequest` to `node_id` and await `ResetResponse`
  /// (SPEC_FULL.md §11.2).
  pub async fn reset_node(&self, node_id: &GlobalE2NodeId, cause: Cause) -> E2Result<()> {
    let node = self.nodes.get(node_id).ok_or(E2Error::NodeUnreachable)?;
    self
      .router
      .reset_node(&node, cause, self.config.t_ctl_max)
      .await
  }

  /// Gracefully stop accepting new associations and tear down the
  /// background tasks (SPEC_FULL.md §11.5). Existing associations are left
  /// to close on their own (peer-initiated or transport-level); this does
  /// not forcibly disconnect them.
  pub async fn shutdown(&self) {
    log::info!("[e2tc] shutting down");
    let _ = self.shutdown_tx.send(true);
    self.accept_task.abort();
    self.sweeper_task.abort();
  }
}

#[allow(clippy::too_many_arguments)]
fn spawn_association_handshake(
  association: Arc<Association>,
  nodes: Arc<NodeTable>,
  registry: Arc<Registry>,
  subscriptions: Arc<SubscriptionManager>,
  router: Arc<Router>,
  config: Config,
  metrics: Metrics,
  shutdown_rx: watch::Receiver<bool>,
) {
  tokio::spawn(async move {
    let peer = association.peer_addr().to_owned();
    let raw = match association.recv().await {
      Some(raw) => raw,
      None => {
        log::debug!("[{peer}] association closed before E2SetupRequest arrived");
        return;
      }
    };

    let (txn_id, pdu) = match codec::decode(&raw) {
      Ok(v) => v,
      Err(e) => {
        log::warn!("[{peer}] malformed E2SetupRequest: {e}");
        return;
      }
    };

    let setup = match pdu {
      Pdu::E2SetupRequest(req) => req,
      other => {
        log::warn!(
          "[{peer}] expected E2SetupRequest, got {}",
          other.procedure_name()
        );
        return;
      }
    };

    let mut accepted_functions = Vec::new();
    let mut rejected_functions = Vec::new();
    let mut functions = std::collections::HashMap::new();
    for item in &setup.ran_functions {
      if registry.contains(item.function_id) {
        accepted_functions.push(item.function_id);
        functions.insert(item.function_id, RanFunction::from_item(item));
      } else {
        rejected_functions.push((item.function_id, Cause::RanFunctionIdInvalid));
      }
    }

    let response = Pdu::E2SetupResponse(E2SetupResponse {
      global_ric_id: Bytes::from_static(b"e2tc-ric"),
      accepted_functions,
      rejected_functions,
    });
    let wire = match codec::encode(&response, txn_id) {
      Ok(wire) => wire,
      Err(e) => {
        log::warn!("[{peer}] failed to encode E2SetupResponse: {e}");
        return;
      }
    };
    if association.send(wire).await.is_err() {
      log::warn!("[{peer}] failed to send E2SetupResponse");
      return;
    }

    let node = Arc::new(E2Node::new(
      setup.global_node_id.clone(),
      setup.node_type,
      association,
      functions,
      config.max_txn_per_node,
    ));
    nodes.insert(node.clone());
    log::info!("[{}] E2 Node set up from {peer}", node.global_id);

    run_association_loop(node, nodes, subscriptions, router, metrics, shutdown_rx).await;
  });
}

async fn run_association_loop(
  node: Arc<E2Node>,
  nodes: Arc<NodeTable>,
  subscriptions: Arc<SubscriptionManager>,
  router: Arc<Router>,
  metrics: Metrics,
  mut shutdown_rx: watch::Receiver<bool>,
) {
  let close_cause = loop {
    tokio::select! {
      _ = shutdown_rx.changed() => {
        if *shutdown_rx.borrow() {
          break CloseCause::LocalClosed;
        }
      }
      frame = node.association.recv() => {
        match frame {
          Some(raw) => match router.handle_inbound(&node, raw).await {
            InboundOutcome::Continue => {}
            InboundOutcome::TerminateAssociation(cause) => {
              metrics.record_error(&E2Error::Protocol(cause.to_string()));
              break transport_cause_for(cause);
            }
          },
          None => break CloseCause::PeerClosed,
        }
      }
      cause = node.association.closed() => {
        break cause;
      }
    }
  };

  log::info!("[{}] association closed: {close_cause:?}", node.global_id);
  nodes.remove(&node.global_id);
  node.txns.lock().await.fail_all(cause_for(&close_cause));
  subscriptions.on_node_lost(&node.global_id);
}

fn transport_cause_for(cause: Cause) -> CloseCause {
  match cause {
    Cause::ProtocolPersistent => CloseCause::ProtocolPersistent,
    other => CloseCause::NetworkError(other.to_string()),
  }
}

fn cause_for(close: &CloseCause) -> Cause {
  match close {
    CloseCause::PeerClosed | CloseCause::LocalClosed => Cause::NodeUnreachable,
    CloseCause::HeartbeatTimeout => Cause::Timeout,
    CloseCause::NetworkError(msg) => Cause::Other(msg.clone()),
    CloseCause::ProtocolPersistent => Cause::ProtocolPersistent,
  }
}
