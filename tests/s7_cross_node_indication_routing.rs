//! Two nodes, each taking out the very first subscription ever allocated on
//! their own per-node transaction table, end up with bit-identical
//! `RicRequestId`s (the same xApp, instance id 0 on both): delivery must
//! still land each node's indications on its own subscription only, never
//! the other's (data model invariant I2 — unique per (xApp, node), not
//! globally).

mod common;

use bytes::Bytes;

use common::*;
use e2tc::RanFunctionId;

#[tokio::test]
async fn indications_from_different_nodes_never_cross_subscriptions() {
  let (core, _metrics) = start_core(test_config(), test_registry()).await;

  let mut peer_a = FakePeer::connect(core.local_addr()).await;
  let node_a = peer_a.setup(b"node-a", vec![kpm_function(1)]).await;

  let mut peer_b = FakePeer::connect(core.local_addr()).await;
  let node_b = peer_b.setup(b"node-b", vec![kpm_function(1)]).await;

  let core_a = core.clone();
  let node_a_id = node_a.clone();
  let sub_a_task = tokio::spawn(async move {
    core_a
      .subscribe(
        xapp_a(),
        &node_a_id,
        RanFunctionId(1),
        Bytes::from_static(b"trigger"),
        vec![report_action(1)],
      )
      .await
  });
  let request_a = peer_a.answer_subscription_request().await;
  let sub_a = sub_a_task.await.expect("join").expect("subscribe a succeeds");

  let core_b = core.clone();
  let node_b_id = node_b.clone();
  let sub_b_task = tokio::spawn(async move {
    core_b
      .subscribe(
        xapp_a(),
        &node_b_id,
        RanFunctionId(1),
        Bytes::from_static(b"trigger"),
        vec![report_action(1)],
      )
      .await
  });
  let request_b = peer_b.answer_subscription_request().await;
  let sub_b = sub_b_task.await.expect("join").expect("subscribe b succeeds");

  // Both are the first-ever subscribe on their own node: same requestor
  // (xApp) and the same freshly-wrapped instance id, hence the collision.
  assert_eq!(
    request_a.ric_request_id, request_b.ric_request_id,
    "test setup assumption broken: expected both nodes' first subscribe to collide"
  );

  peer_a
    .send_indication(request_a.ric_request_id, request_a.function_id, 1, 0, b"from-a")
    .await;
  peer_b
    .send_indication(request_b.ric_request_id, request_b.function_id, 1, 0, b"from-b")
    .await;

  let item_a = sub_a.recv().await.expect("node a's subscription should receive its indication");
  assert_eq!(item_a.indication_message, Bytes::from_static(b"from-a"));

  let item_b = sub_b.recv().await.expect("node b's subscription should receive its indication");
  assert_eq!(item_b.indication_message, Bytes::from_static(b"from-b"));
}
