//! S6 (spec.md §8, §4.6): the first two malformed PDUs in a row draw an
//! `ErrorIndication` each and leave the association standing; the third
//! crosses the persistent-violation threshold and the core tears it down.

mod common;

use std::time::Duration;

use common::*;
use e2tc::codec::pdu;

#[tokio::test]
async fn three_consecutive_malformed_pdus_tear_down_the_association() {
  let (core, _metrics) = start_core(test_config(), test_registry()).await;
  let mut peer = FakePeer::connect(core.local_addr()).await;
  let node_id = peer.setup(b"node-s6", vec![kpm_function(1)]).await;

  for _ in 0..2 {
    peer.send_raw(malformed_frame()).await;
    let (_, pdu) = peer.recv_pdu().await;
    match pdu {
      pdu::Pdu::ErrorIndication(ei) => assert_protocol_cause(&ei.cause),
      other => panic!("expected ErrorIndication, got {}", other.procedure_name()),
    }
  }
  assert!(core.node(&node_id).is_some(), "two strikes must not tear down the association");

  peer.send_raw(malformed_frame()).await;
  assert!(
    peer.wait_closed(Duration::from_millis(500)).await,
    "third consecutive malformed pdu should close the association"
  );

  tokio::time::sleep(Duration::from_millis(50)).await;
  assert!(core.node(&node_id).is_none(), "node should be removed after persistent protocol violation");
}
