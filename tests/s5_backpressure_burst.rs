//! S5 (spec.md §8): a burst of indications outruns a small sink and the
//! default `DropOldest` policy kicks in — the xApp sees a `Lagged(n)` signal
//! (spec.md §6) and the drop is visible on the backpressure metric.

mod common;

use std::time::Duration;

use bytes::Bytes;

use common::*;
use e2tc::{Next, RanFunctionId};

#[tokio::test]
async fn drop_oldest_surfaces_lagged_and_increments_metric() {
  let mut config = test_config();
  config.sink_capacity = 4;
  let (core, metrics_registry) = start_core(config, test_registry()).await;

  let mut peer = FakePeer::connect(core.local_addr()).await;
  let node_id = peer.setup(b"node-s5", vec![kpm_function(1)]).await;

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
  let request = peer.answer_subscription_request().await;
  let sub = sub_task.await.expect("join").expect("subscribe succeeds");

  // Nobody drains the sink while this runs: 10 indications into a
  // capacity-4 sink must evict at least 6.
  for seq in 0..10u32 {
    peer
      .send_indication(request.ric_request_id, request.function_id, 1, seq, b"burst")
      .await;
  }

  // Give the router time to drain the association socket and push every
  // indication through the sink before we inspect it.
  tokio::time::sleep(Duration::from_millis(200)).await;

  match sub.next().await {
    Next::Lagged(n) => assert!(n >= 6, "expected at least 6 dropped, got {n}"),
    other => panic!("expected Next::Lagged, got {other:?}"),
  }

  let families = metrics_registry.gather();
  let dropped: f64 = families
    .iter()
    .find(|f| f.get_name() == "e2tc_indications_dropped_backpressure_total")
    .map(|f| f.get_metric().iter().map(|m| m.get_counter().get_value()).sum())
    .unwrap_or(0.0);
  assert!(dropped > 0.0, "backpressure metric should have recorded at least one drop");
}
