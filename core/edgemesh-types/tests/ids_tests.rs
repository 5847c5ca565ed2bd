use edgemesh_types::{EventId, NodeId};

#[test]
fn node_id_rejects_empty() {
    assert!(NodeId::new("").is_err());
}

#[test]
fn node_id_accepts_non_empty() {
    let id = NodeId::new("edge-node-1").unwrap();
    assert_eq!(id.as_str(), "edge-node-1");
}

#[test]
fn node_id_display_round_trips_through_string() {
    let id = NodeId::new("edge-node-7").unwrap();
    assert_eq!(id.to_string(), "edge-node-7");
}

#[test]
fn node_id_gateway_is_stable() {
    assert_eq!(NodeId::gateway().as_str(), "gateway");
}

#[test]
fn node_id_ordering_is_lexicographic() {
    let a = NodeId::new("node-a").unwrap();
    let b = NodeId::new("node-b").unwrap();
    assert!(a < b);
}

#[test]
fn event_id_generate_produces_distinct_ids() {
    let a = EventId::generate();
    let b = EventId::generate();
    assert_ne!(a, b);
}

#[test]
fn event_id_wraps_caller_supplied_string_verbatim() {
    let id = EventId::new("client-chosen-id-42");
    assert_eq!(id.as_str(), "client-chosen-id-42");
}

#[test]
fn event_id_serializes_as_bare_string() {
    let id = EventId::new("abc");
    let json = serde_json::to_string(&id).unwrap();
    assert_eq!(json, "\"abc\"");
}
