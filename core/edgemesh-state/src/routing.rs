//! Structured routing keys for composite state sub-mappings.
//!
//! Keys are built once at event-recording time and never reparsed; they
//! are opaque strings from every other component's point of view.

pub fn event_count(event_type: &str) -> String {
    format!("event_count:{event_type}")
}

pub fn sensor(location: &str, event_type: &str) -> String {
    format!("sensor:{location}:{event_type}")
}

pub fn resource(location: &str, event_type: &str) -> String {
    format!("resource:{location}:{event_type}")
}

pub fn hazards(event_type: &str) -> String {
    format!("hazards:{event_type}")
}

pub fn infra(location: &str, event_type: &str) -> String {
    format!("infra:{location}:{event_type}")
}

pub fn general(location: &str, event_type: &str) -> String {
    format!("general:{location}:{event_type}")
}
