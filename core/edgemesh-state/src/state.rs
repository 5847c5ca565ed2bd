//! Composite per-node state: routes events to the appropriate sub-CRDT and
//! computes the convergent fingerprint over all of them.

use crate::{fingerprint, routing, Error};
use edgemesh_crdt::{GCounter, LwwRegister, ObservedRemoveSet, PnCounter};
use edgemesh_types::{Category, Event, EventId, NodeId, Operation, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The routing keys touched while recording one event, returned to the
/// caller (e.g. the node's `POST /event` handler) as a `stored_in` descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredIn {
    pub category: Category,
    pub keys: Vec<String>,
}

/// Composite convergent state owned by a single node (or, for the gateway,
/// its aggregate across all edge nodes).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeState {
    node_id: NodeId,
    version: u64,
    updated_at: Timestamp,
    counters: BTreeMap<String, GCounter>,
    registers: BTreeMap<String, LwwRegister<serde_json::Value>>,
    pn_counters: BTreeMap<String, PnCounter>,
    sets: BTreeMap<String, ObservedRemoveSet<String>>,
    event_ids: Vec<EventId>,
}

impl NodeState {
    #[must_use]
    pub fn new(node_id: NodeId) -> Self {
        Self {
            node_id,
            version: 0,
            updated_at: Timestamp::now(),
            counters: BTreeMap::new(),
            registers: BTreeMap::new(),
            pn_counters: BTreeMap::new(),
            sets: BTreeMap::new(),
            event_ids: Vec::new(),
        }
    }

    #[must_use]
    pub fn node_id(&self) -> &NodeId {
        &self.node_id
    }

    #[must_use]
    pub fn version(&self) -> u64 {
        self.version
    }

    #[must_use]
    pub fn updated_at(&self) -> Timestamp {
        self.updated_at
    }

    #[must_use]
    pub fn event_count(&self, event_type: Option<&str>) -> u64 {
        match event_type {
            Some(t) => self
                .counters
                .get(&routing::event_count(t))
                .map_or(0, GCounter::value),
            None => self.counters.values().map(GCounter::value).sum(),
        }
    }

    /// Records an event, routing it to the sub-CRDT its category names.
    pub fn record_event(&mut self, event: &Event) -> Result<StoredIn, Error> {
        let keys = match event.category {
            Category::Sensor => self.record_sensor(event)?,
            Category::Resource => self.record_resource(event)?,
            Category::Infrastructure => self.record_infrastructure(event)?,
            Category::General => self.record_general(event),
        };

        if !self.event_ids.contains(&event.id) {
            self.event_ids.push(event.id.clone());
        }
        self.version += 1;
        self.updated_at = Timestamp::now();

        Ok(StoredIn {
            category: event.category,
            keys,
        })
    }

    fn record_sensor(&mut self, event: &Event) -> Result<Vec<String>, Error> {
        let count_key = routing::event_count(&event.event_type);
        self.counters
            .entry(count_key.clone())
            .or_insert_with(GCounter::new)
            .increment(self.node_id.clone(), 1)?;
        let mut keys = vec![count_key];

        if let Some(location) = &event.location {
            let key = routing::sensor(location, &event.event_type);
            let payload = serde_json::json!({
                "value": event.value,
                "unit": event.metadata.get("unit"),
                "severity": event.metadata.get("severity"),
                "event_id": event.id.as_str(),
                "event_type": event.event_type,
                "category": "sensor",
            });
            self.registers
                .entry(key.clone())
                .or_insert_with(LwwRegister::new)
                .set(payload, self.node_id.clone());
            keys.push(key);
        }
        Ok(keys)
    }

    fn record_resource(&mut self, event: &Event) -> Result<Vec<String>, Error> {
        let count_key = routing::event_count(&event.event_type);
        self.counters
            .entry(count_key.clone())
            .or_insert_with(GCounter::new)
            .increment(self.node_id.clone(), 1)?;
        let mut keys = vec![count_key];

        if let Some(location) = &event.location {
            let key = routing::resource(location, &event.event_type);
            match numeric_amount(&event.value) {
                Some(amount) => {
                    let pnc = self
                        .pn_counters
                        .entry(key.clone())
                        .or_insert_with(PnCounter::new);
                    if matches!(event.operation, Some(Operation::Decrement)) {
                        pnc.decrement(self.node_id.clone(), amount)?;
                    } else {
                        pnc.increment(self.node_id.clone(), amount)?;
                    }
                    keys.push(key);
                }
                None => {
                    tracing::warn!(
                        event_type = %event.event_type,
                        "resource event value is not numeric; counted event only"
                    );
                }
            }
        }
        Ok(keys)
    }

    fn record_infrastructure(&mut self, event: &Event) -> Result<Vec<String>, Error> {
        let count_key = routing::event_count(&event.event_type);
        self.counters
            .entry(count_key.clone())
            .or_insert_with(GCounter::new)
            .increment(self.node_id.clone(), 1)?;
        let mut keys = vec![count_key];

        if let Some(location) = &event.location {
            let hazard_key = routing::hazards(&event.event_type);
            let set = self
                .sets
                .entry(hazard_key.clone())
                .or_insert_with(ObservedRemoveSet::new);
            if matches!(event.operation, Some(Operation::Remove)) {
                set.remove(location);
            } else {
                set.add(location.clone(), self.node_id.clone());
            }
            keys.push(hazard_key);

            let infra_key = routing::infra(location, &event.event_type);
            let payload = serde_json::json!({
                "value": event.value,
                "cause": event.metadata.get("cause"),
                "estimated_restore": event.metadata.get("estimated_restore"),
                "event_id": event.id.as_str(),
                "event_type": event.event_type,
                "category": "infrastructure",
            });
            self.registers
                .entry(infra_key.clone())
                .or_insert_with(LwwRegister::new)
                .set(payload, self.node_id.clone());
            keys.push(infra_key);
        }
        Ok(keys)
    }

    fn record_general(&mut self, event: &Event) -> Vec<String> {
        let count_key = routing::event_count(&event.event_type);
        // General events never fail validation, so an InvalidAmount here is
        // unreachable; a fresh GCounter increment(1) cannot be negative.
        self.counters
            .entry(count_key.clone())
            .or_insert_with(GCounter::new)
            .increment(self.node_id.clone(), 1)
            .expect("incrementing by 1 never produces InvalidAmount");
        let mut keys = vec![count_key];

        if let Some(location) = &event.location {
            if !event.value.is_null() {
                let key = routing::general(location, &event.event_type);
                self.registers
                    .entry(key.clone())
                    .or_insert_with(LwwRegister::new)
                    .set(event.value.clone(), self.node_id.clone());
                keys.push(key);
            }
        }
        keys
    }

    /// Merges `other`'s sub-CRDTs into this state. Bumps `version` only if
    /// the fingerprint actually changed, so a no-op merge leaves convergence
    /// detection and stale-skip logic undisturbed.
    pub fn merge(&mut self, other: &NodeState) {
        let before = self.fingerprint();

        for (key, counter) in &other.counters {
            self.counters
                .entry(key.clone())
                .or_insert_with(GCounter::new)
                .merge(counter);
        }
        for (key, register) in &other.registers {
            self.registers
                .entry(key.clone())
                .or_insert_with(LwwRegister::new)
                .merge(register);
        }
        for (key, pnc) in &other.pn_counters {
            self.pn_counters
                .entry(key.clone())
                .or_insert_with(PnCounter::new)
                .merge(pnc);
        }
        for (key, set) in &other.sets {
            self.sets
                .entry(key.clone())
                .or_insert_with(ObservedRemoveSet::new)
                .merge(set);
        }
        for id in &other.event_ids {
            if !self.event_ids.contains(id) {
                self.event_ids.push(id.clone());
            }
        }

        if self.fingerprint() != before {
            self.version += 1;
            self.updated_at = Timestamp::now();
        }
    }

    /// The Merkle-style fingerprint over convergent content only: never
    /// `node_id`, `version`, or `updated_at`.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let mut leaves = Vec::new();

        for (key, counter) in &self.counters {
            leaves.push(fingerprint::leaf("c", key, counter.counts()));
        }

        for (key, register) in &self.registers {
            if let Some(value) = register.value() {
                let payload = serde_json::json!({
                    "v": value,
                    "t": register.timestamp().map(|t| t.to_iso8601()),
                    "w": register.writer(),
                });
                leaves.push(fingerprint::leaf("r", key, &payload));
            }
        }

        for (key, pnc) in &self.pn_counters {
            let payload = serde_json::json!({
                "p": pnc.positive().counts(),
                "n": pnc.negative().counts(),
            });
            leaves.push(fingerprint::leaf("pn", key, &payload));
        }

        for (key, set) in &self.sets {
            let mut elements: BTreeMap<String, Vec<String>> = BTreeMap::new();
            for element in set.value() {
                let mut tags: Vec<String> = set
                    .tags_for(element)
                    .map(|tags| tags.iter().map(ToString::to_string).collect())
                    .unwrap_or_default();
                tags.sort();
                elements.insert(element.clone(), tags);
            }
            if !elements.is_empty() {
                leaves.push(fingerprint::leaf("s", key, &elements));
            }
        }

        fingerprint::reduce(leaves)
    }

    /// Human-readable counts per sub-type category.
    #[must_use]
    pub fn state_summary(&self) -> serde_json::Value {
        serde_json::json!({
            "counters": self.counters.len(),
            "registers": self.registers.len(),
            "pn_counters": self.pn_counters.len(),
            "sets": self.sets.len(),
            "events": self.event_ids.len(),
        })
    }

    /// Serializes to the stable wire form: all fields plus the computed
    /// `merkle_root` and `state_summary`.
    #[must_use]
    pub fn serialize(&self) -> serde_json::Value {
        let mut value = serde_json::to_value(self).expect("NodeState always serializes");
        if let serde_json::Value::Object(map) = &mut value {
            map.insert(
                "merkle_root".to_string(),
                serde_json::Value::String(self.fingerprint()),
            );
            map.insert("state_summary".to_string(), self.state_summary());
        }
        value
    }

    /// Deserializes from the wire form. Unknown fields (`merkle_root`,
    /// `state_summary`) are ignored; they are recomputed, not trusted.
    pub fn deserialize(value: serde_json::Value) -> Result<Self, Error> {
        serde_json::from_value(value).map_err(|e| Error::StateDecodeError(e.to_string()))
    }
}

fn numeric_amount(value: &serde_json::Value) -> Option<i64> {
    if let Some(i) = value.as_i64() {
        Some(i)
    } else {
        value.as_f64().map(|f| f.round() as i64)
    }
}
