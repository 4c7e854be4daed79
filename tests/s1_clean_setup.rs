//! S1 (spec.md §8): a node connects, completes E2 Setup cleanly, and shows
//! up in the core's node table with the functions it advertised.

mod common;

use common::*;

#[tokio::test]
async fn clean_e2_setup_registers_the_node() {
  let (core, _metrics) = start_core(test_config(), test_registry()).await;

  let mut peer = FakePeer::connect(core.local_addr()).await;
  let node_id = peer.setup(b"node-s1", vec![kpm_function(1), kpm_function(2)]).await;

  let node = core.node(&node_id).expect("node should be registered after setup");
  assert!(node.has_function(e2tc::RanFunctionId(1)));
  assert!(node.has_function(e2tc::RanFunctionId(2)));
  assert_eq!(core.nodes().len(), 1);
}

#[tokio::test]
async fn setup_rejects_unknown_ran_functions() {
  let (core, _metrics) = start_core(test_config(), test_registry()).await;

  let mut peer = FakePeer::connect(core.local_addr()).await;
  // Function 99 isn't in `test_registry()`, so setup must still succeed but
  // only function 1 ends up accepted.
  let node_id = peer.setup(b"node-s1b", vec![kpm_function(1), kpm_function(99)]).await;

  let node = core.node(&node_id).expect("node should still be registered");
  assert!(node.has_function(e2tc::RanFunctionId(1)));
  assert!(!node.has_function(e2tc::RanFunctionId(99)));
}
