//! S4 (spec.md §8): a `RICcontrolRequest` round-trips to an acknowledgement
//! carrying the node's reported outcome.

mod common;

use bytes::Bytes;

use common::*;
use e2tc::codec::pdu::ControlAckRequest;
use e2tc::RanFunctionId;

#[tokio::test]
async fn control_round_trip_returns_the_acknowledged_outcome() {
  let (core, _metrics) = start_core(test_config(), test_registry()).await;
  let mut peer = FakePeer::connect(core.local_addr()).await;
  let node_id = peer.setup(b"node-s4", vec![kpm_function(2)]).await;

  let core_for_ctl = core.clone();
  let node_id_for_ctl = node_id.clone();
  let ctl_task = tokio::spawn(async move {
    core_for_ctl
      .control(
        &node_id_for_ctl,
        RanFunctionId(2),
        Bytes::from_static(b"ctl-header"),
        Bytes::from_static(b"ctl-message"),
        ControlAckRequest::Ack,
      )
      .await
  });

  let request = peer.answer_control_request(b"applied").await;
  assert_eq!(request.control_message, Bytes::from_static(b"ctl-message"));

  let outcome = ctl_task.await.expect("join").expect("control succeeds");
  assert_eq!(outcome, Some(Bytes::from_static(b"applied")));
}

#[tokio::test]
async fn control_against_unknown_function_is_rejected_locally() {
  let (core, _metrics) = start_core(test_config(), test_registry()).await;
  let mut peer = FakePeer::connect(core.local_addr()).await;
  // Node only advertises function 1; control against function 2 must fail
  // without ever reaching the wire.
  let node_id = peer.setup(b"node-s4b", vec![kpm_function(1)]).await;

  let result = core
    .control(
      &node_id,
      RanFunctionId(2),
      Bytes::from_static(b"h"),
      Bytes::from_static(b"m"),
      ControlAckRequest::Ack,
    )
    .await;
  assert!(result.is_err());
  assert!(peer.try_recv_pdu(std::time::Duration::from_millis(50)).await.is_none());
}
