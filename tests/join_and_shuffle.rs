mod common;

use common::{config, peer, Harness};
use hyparview_core::Engine;

#[test]
fn two_node_join_ends_with_symmetric_active_views() {
  let n1 = peer(7001);
  let n2 = peer(7002);

  let mut harness = Harness::new();
  harness.add(n1, vec![n1]);
  harness.add(n2, vec![n1]);
  harness.drain(20);

  let node1 = &harness.nodes[&n1];
  let node2 = &harness.nodes[&n2];

  assert!(node1.engine.active_view().contains(&n2));
  assert!(node2.engine.active_view().contains(&n1));
  assert!(node1.engine.check_invariants().is_ok());
  assert!(node2.engine.check_invariants().is_ok());
}

#[test]
fn three_node_forward_join_reaches_the_third_node() {
  let n1 = peer(7101);
  let n2 = peer(7102);
  let n3 = peer(7103);

  let mut harness = Harness::new();
  harness.add(n1, vec![n1]);
  harness.add(n2, vec![n1]);
  harness.drain(20);

  harness.add(n3, vec![n1]);
  harness.drain(20);

  let node3 = &harness.nodes[&n3];
  assert!(node3.engine.active_view().size() >= 1);
  for node in harness.nodes.values() {
    assert!(node.engine.check_invariants().is_ok());
  }
}

#[test]
fn active_view_overflow_demotes_one_peer_to_passive() {
  let n1 = peer(7201);
  let n2 = peer(7202);
  let n3 = peer(7203);
  let n4 = peer(7204);

  let mut harness = Harness::new();
  let mut cfg = config(n1, vec![n1]);
  cfg.active_view_capacity = 2;
  harness.nodes.insert(
    n1,
    common::Node {
      engine: Engine::new(cfg),
      transport: Default::default(),
    },
  );
  harness.add(n2, vec![n1]);
  harness.add(n3, vec![n1]);
  harness.add(n4, vec![n1]);
  harness.drain(40);

  let node1 = &harness.nodes[&n1];
  assert!(node1.engine.active_view().size() <= 2);
  assert!(node1.engine.check_invariants().is_ok());
}

#[test]
fn shuffle_round_trip_populates_passive_views_without_corrupting_active_views() {
  let n1 = peer(7301);
  let n2 = peer(7302);
  let n3 = peer(7303);
  let n4 = peer(7304);

  let mut harness = Harness::new();
  harness.add(n1, vec![n1]);
  harness.add(n2, vec![n1]);
  harness.add(n3, vec![n1]);
  harness.add(n4, vec![n1]);
  harness.drain(40);

  for id in [n1, n2, n3, n4] {
    let node = harness.nodes.get_mut(&id).unwrap();
    node.engine.handle_timer(&mut node.transport, hyparview_core::Timer::Shuffle).unwrap();
  }
  harness.drain(40);

  for node in harness.nodes.values() {
    assert!(node.engine.check_invariants().is_ok());
  }
}
