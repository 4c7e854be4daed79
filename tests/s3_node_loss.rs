//! S3 (spec.md §8): the association drops mid-subscription. The node must
//! disappear from the node table and every subscription it owned must move
//! to `Dead` with its sink closed (spec.md §5 cascade).

mod common;

use std::time::Duration;

use bytes::Bytes;

use common::*;
use e2tc::{Next, RanFunctionId, SubscriptionState};

#[tokio::test]
async fn dropping_the_association_cascades_to_subscriptions() {
  let (core, _metrics) = start_core(test_config(), test_registry()).await;
  let mut peer = FakePeer::connect(core.local_addr()).await;
  let node_id = peer.setup(b"node-s3", vec![kpm_function(1)]).await;

  let core_for_sub = core.clone();
  let node_id_for_sub = node_id.clone();
  let sub_task = tokio::spawn(async move {
    core_for_sub
      .subscribe(
        xapp_a(),
        &node_id_for_sub,
        RanFunctionId(1),
        Bytes::from_static(b"trigger"),
        vec![report_action(1)],
      )
      .await
  });
  peer.answer_subscription_request().await;
  let sub = sub_task.await.expect("join").expect("subscribe succeeds");
  assert_eq!(sub.state(), SubscriptionState::Active);

  drop(peer); // abrupt peer-side close, no ResetRequest, no delete

  // Give the reader task a moment to observe EOF and the core a moment to
  // react: remove the node, fail outstanding transactions, cascade the
  // subscription to Dead.
  tokio::time::sleep(Duration::from_millis(150)).await;

  assert!(core.node(&node_id).is_none(), "node should be removed once its association closes");
  assert_eq!(sub.state(), SubscriptionState::Dead);
  assert!(matches!(sub.next().await, Next::Eof));
}
