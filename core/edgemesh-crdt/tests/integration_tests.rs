use edgemesh_crdt::{ObservedRemoveSet, PnCounter};
use edgemesh_crdt::LwwRegister;
use edgemesh_types::NodeId;

fn node(id: &str) -> NodeId {
    NodeId::new(id).unwrap()
}

/// Integration test: node state fragment with a status (LWW) and tags (ORSet)
#[test]
fn node_state_fragment_integration() {
    let n1 = node("relay-1");
    let n2 = node("relay-2");

    let mut status1 = LwwRegister::new();
    status1.set("draft".to_string(), n1.clone());
    let mut tags1: ObservedRemoveSet<String> = ObservedRemoveSet::new();
    tags1.add("work".to_string(), n1.clone());

    let mut status2 = status1.clone();
    let mut tags2 = tags1.clone();

    status1.set("final".to_string(), n1.clone());
    tags1.add("important".to_string(), n1.clone());

    status2.set("revised".to_string(), n2.clone());
    tags2.add("review".to_string(), n2);
    tags2.remove(&"work".to_string());

    status1.merge(&status2);
    tags1.merge(&tags2);

    assert!(status1.value() == Some(&"final".to_string()) || status1.value() == Some(&"revised".to_string()));
    assert!(tags1.lookup(&"important".to_string()));
    assert!(tags1.lookup(&"review".to_string()));
}

/// Integration test: a resource reading tracked as a PNCounter converges
/// across two replicas that each apply increments and decrements locally.
#[test]
fn resource_counter_convergence() {
    let n1 = node("depot-1");
    let n2 = node("depot-2");

    let mut c1 = PnCounter::new();
    c1.increment(n1.clone(), 10).unwrap();

    let mut c2 = c1.clone();
    c2.decrement(n2.clone(), 4).unwrap();
    c1.increment(n1, 5).unwrap();

    c1.merge(&c2);
    c2.merge(&c1);

    assert_eq!(c1.value(), c2.value());
    assert_eq!(c1.value(), 15 - 4);
}
