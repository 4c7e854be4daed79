//! Shared scaffolding for the scenario tests (spec.md §8, S1-S6): a fake E2
//! Node peer speaking the wire codec directly over a loopback TCP socket,
//! plus the config/registry wiring every scenario starts from.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_util::codec::{Framed, LengthDelimitedCodec};

use e2tc::codec::{self, pdu};
use e2tc::{
  Action, ActionType, Cause, Config, ConfigBuilder, E2TerminationCore, GlobalE2NodeId, NodeType,
  RanFunctionId, RanFunctionRevision, Registry, ServiceModelHandler, TransactionId, XAppId,
};

/// A minimal always-admitting service model, standing in for a real xApp's
/// handler in every scenario that doesn't care about validation specifics.
pub struct TestHandler;

impl ServiceModelHandler for TestHandler {
  fn oid(&self) -> &str {
    "1.3.6.1.4.1.53148.1.1.2.2"
  }

  fn name(&self) -> &str {
    "test-kpm"
  }

  fn schema_version(&self) -> u8 {
    1
  }
}

pub fn test_registry() -> Registry {
  Registry::builder()
    .register(RanFunctionId(1), Arc::new(TestHandler))
    .register(RanFunctionId(2), Arc::new(TestHandler))
    .build()
}

/// Fast timeouts and an ephemeral bind address, so scenario tests run in
/// milliseconds rather than exercising production-sized deadlines.
pub fn test_config() -> Config {
  ConfigBuilder::new()
    .bind_addr("127.0.0.1:0")
    .heartbeat_interval(Duration::from_millis(200))
    .heartbeat_misses_to_dead(3)
    .t_sub(Duration::from_secs(2))
    .t_del(Duration::from_secs(2))
    .t_ctl_max(Duration::from_secs(2))
    .build()
}

pub async fn start_core(config: Config, registry: Registry) -> (Arc<E2TerminationCore>, prometheus::Registry) {
  let metrics_registry = prometheus::Registry::new();
  let core = E2TerminationCore::start(config, registry, &metrics_registry)
    .await
    .expect("core failed to bind/start");
  (core, metrics_registry)
}

/// Stand-in xApp identity for scenarios that only ever call in as one xApp.
pub fn xapp_a() -> XAppId {
  XAppId(1)
}

/// A second, distinct xApp identity for tests asserting isolation between
/// callers.
pub fn xapp_b() -> XAppId {
  XAppId(2)
}

pub fn kpm_function(id: u16) -> pdu::RanFunctionItem {
  pdu::RanFunctionItem {
    function_id: RanFunctionId(id),
    revision: RanFunctionRevision(1),
    oid: "1.3.6.1.4.1.53148.1.1.2.2".to_owned(),
    definition: Bytes::from_static(b"kpm-def"),
  }
}

pub fn report_action(id: u16) -> Action {
  Action {
    action_id: id,
    action_type: ActionType::Report,
    subsequent_action: None,
    action_definition: Some(Bytes::from_static(b"action-def")),
  }
}

/// A hand-rolled E2 Node, speaking the codec directly over a TCP socket so
/// scenario tests can drive the wire protocol from the peer's side without
/// a second copy of this crate.
pub struct FakePeer {
  framed: Framed<TcpStream, LengthDelimitedCodec>,
}

impl FakePeer {
  pub async fn connect(addr: SocketAddr) -> Self {
    let stream = TcpStream::connect(addr).await.expect("connect to core");
    Self {
      framed: Framed::new(stream, LengthDelimitedCodec::new()),
    }
  }

  pub async fn send_pdu(&mut self, pdu: &pdu::Pdu, txn: TransactionId) {
    let wire = codec::encode(pdu, txn).expect("encode outbound pdu");
    self.framed.send(wire).await.expect("send outbound frame");
  }

  /// Send a frame whose bytes are already on the wire, bypassing the codec
  /// entirely — the only way to hand the core something malformed.
  pub async fn send_raw(&mut self, bytes: Bytes) {
    self.framed.send(bytes).await.expect("send raw frame");
  }

  async fn next_frame(&mut self) -> Option<BytesMut> {
    match self.framed.next().await {
      Some(Ok(frame)) => Some(frame),
      Some(Err(e)) => panic!("framing error: {e}"),
      None => None,
    }
  }

  pub async fn recv_pdu(&mut self) -> (TransactionId, pdu::Pdu) {
    let frame = self
      .next_frame()
      .await
      .expect("expected a frame, association closed instead");
    codec::decode(&frame).expect("decode inbound frame")
  }

  pub async fn try_recv_pdu(&mut self, within: Duration) -> Option<(TransactionId, pdu::Pdu)> {
    match tokio::time::timeout(within, self.next_frame()).await {
      Ok(Some(frame)) => Some(codec::decode(&frame).expect("decode inbound frame")),
      Ok(None) | Err(_) => None,
    }
  }

  /// `true` once the core has closed its end within `within`.
  pub async fn wait_closed(&mut self, within: Duration) -> bool {
    matches!(tokio::time::timeout(within, self.next_frame()).await, Ok(None))
  }

  /// Run the E2 Setup handshake to completion, returning the node id it
  /// declared.
  pub async fn setup(&mut self, node_id: &[u8], functions: Vec<pdu::RanFunctionItem>) -> GlobalE2NodeId {
    let global_id = GlobalE2NodeId(Bytes::copy_from_slice(node_id));
    let request = pdu::Pdu::E2SetupRequest(pdu::E2SetupRequest {
      global_node_id: global_id.clone(),
      node_type: NodeType::Gnb,
      ran_functions: functions,
    });
    self.send_pdu(&request, TransactionId(1)).await;
    let (_, response) = self.recv_pdu().await;
    match response {
      pdu::Pdu::E2SetupResponse(_) => {}
      other => panic!("expected E2SetupResponse, got {}", other.procedure_name()),
    }
    global_id
  }

  /// Read one `RICsubscriptionRequest` and admit every requested action.
  pub async fn answer_subscription_request(&mut self) -> pdu::RicSubscriptionRequest {
    let (txn, req) = self.recv_pdu().await;
    let request = match req {
      pdu::Pdu::RicSubscriptionRequest(r) => r,
      other => panic!("expected RICsubscriptionRequest, got {}", other.procedure_name()),
    };
    let response = pdu::Pdu::RicSubscriptionResponse(pdu::RicSubscriptionResponse {
      ric_request_id: request.ric_request_id,
      function_id: request.function_id,
      admitted_actions: request.actions.iter().map(|a| a.action_id).collect(),
      not_admitted_actions: Vec::new(),
    });
    self.send_pdu(&response, txn).await;
    request
  }

  pub async fn answer_subscription_delete(&mut self) -> pdu::RicSubscriptionDeleteRequest {
    let (txn, req) = self.recv_pdu().await;
    let request = match req {
      pdu::Pdu::RicSubscriptionDeleteRequest(r) => r,
      other => panic!("expected RICsubscriptionDeleteRequest, got {}", other.procedure_name()),
    };
    let response = pdu::Pdu::RicSubscriptionDeleteResponse(pdu::RicSubscriptionDeleteResponse {
      ric_request_id: request.ric_request_id,
      function_id: request.function_id,
    });
    self.send_pdu(&response, txn).await;
    request
  }

  pub async fn send_indication(
    &mut self,
    ric_request_id: e2tc::RicRequestId,
    function_id: RanFunctionId,
    action_id: u16,
    sequence: u32,
    message: &[u8],
  ) {
    let ind = pdu::Pdu::RicIndication(pdu::RicIndication {
      ric_request_id,
      function_id,
      action_id,
      indication_header: Bytes::from_static(b"hdr"),
      indication_message: Bytes::copy_from_slice(message),
      call_process_id: None,
      sequence,
    });
    self.send_pdu(&ind, codec::NO_TRANSACTION).await;
  }

  pub async fn answer_control_request(&mut self, outcome: &[u8]) -> pdu::RicControlRequest {
    let (txn, req) = self.recv_pdu().await;
    let request = match req {
      pdu::Pdu::RicControlRequest(r) => r,
      other => panic!("expected RICcontrolRequest, got {}", other.procedure_name()),
    };
    let ack = pdu::Pdu::RicControlAcknowledge(pdu::RicControlAcknowledge {
      ric_request_id: request.ric_request_id,
      function_id: request.function_id,
      outcome: Bytes::copy_from_slice(outcome),
    });
    self.send_pdu(&ack, txn).await;
    request
  }
}

/// An envelope whose declared body length doesn't match what's actually on
/// the wire — the simplest way to trip `CodecError::LengthMismatch`
/// (mirrors `codec::tests::rejects_length_mismatch`).
pub fn malformed_frame() -> Bytes {
  use bytes::BufMut;
  let mut buf = BytesMut::new();
  buf.put_u8(1); // E2SetupRequest procedure code; the value doesn't matter past this point
  buf.put_u16(999);
  buf.put_u32(50); // claims 50 bytes of body
  buf.put_slice(&[0u8; 3]); // only 3 actually present
  buf.freeze()
}

pub fn assert_protocol_cause(cause: &Cause) {
  assert!(matches!(cause, Cause::Protocol(_)), "expected Cause::Protocol, got {cause:?}");
}
