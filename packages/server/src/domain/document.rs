//! Shared editable circuit document.
//!
//! Components and wires are opaque records. Only their `id` is interpreted;
//! every other field is carried through untouched.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::value_object::Timestamp;

/// One element of the circuit graph, identified by `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphRecord {
    pub id: String,
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl GraphRecord {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            attributes: Map::new(),
        }
    }

    /// Shallow-merge `changes` into this record. An `id` key is ignored.
    pub fn merge(&mut self, changes: &Map<String, Value>) {
        for (key, value) in changes {
            if key == "id" {
                continue;
            }
            self.attributes.insert(key.clone(), value.clone());
        }
    }
}

pub type Component = GraphRecord;
pub type Wire = GraphRecord;

/// Pointer position of a participant on the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Cursor {
    pub x: f64,
    pub y: f64,
}

/// The versioned circuit graph.
///
/// Every mutation is last-write-wins and bumps `version` by exactly one.
/// The version is an ordering hint for clients, not a conflict resolver.
#[derive(Debug, Clone, PartialEq)]
pub struct SharedDocument {
    components: Vec<Component>,
    wires: Vec<Wire>,
    version: u64,
    last_modified: Timestamp,
}

impl SharedDocument {
    pub fn new(created_at: Timestamp) -> Self {
        Self {
            components: Vec::new(),
            wires: Vec::new(),
            version: 0,
            last_modified: created_at,
        }
    }

    pub fn components(&self) -> &[Component] {
        &self.components
    }

    pub fn wires(&self) -> &[Wire] {
        &self.wires
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn last_modified(&self) -> Timestamp {
        self.last_modified
    }

    /// Append a component and return the new version.
    pub fn add_component(&mut self, component: Component, now: Timestamp) -> u64 {
        self.components.push(component);
        self.touch(now)
    }

    /// Remove every component with `id` and return the new version.
    pub fn remove_component(&mut self, id: &str, now: Timestamp) -> u64 {
        self.components.retain(|component| component.id != id);
        self.touch(now)
    }

    /// Merge `changes` into the first component with `id` and return the new
    /// version. An unknown id leaves the components untouched.
    pub fn update_component(
        &mut self,
        id: &str,
        changes: &Map<String, Value>,
        now: Timestamp,
    ) -> u64 {
        if let Some(component) = self.components.iter_mut().find(|c| c.id == id) {
            component.merge(changes);
        }
        self.touch(now)
    }

    pub fn add_wire(&mut self, wire: Wire, now: Timestamp) -> u64 {
        self.wires.push(wire);
        self.touch(now)
    }

    pub fn remove_wire(&mut self, id: &str, now: Timestamp) -> u64 {
        self.wires.retain(|wire| wire.id != id);
        self.touch(now)
    }

    fn touch(&mut self, now: Timestamp) -> u64 {
        self.version += 1;
        self.last_modified = now;
        self.version
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> GraphRecord {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_new_document_starts_at_version_zero() {
        // テスト項目: 新しいドキュメントはバージョン 0 で空
        // given (前提条件):
        let created_at = Timestamp::new(1000);

        // when (操作):
        let document = SharedDocument::new(created_at);

        // then (期待する結果):
        assert_eq!(document.version(), 0);
        assert!(document.components().is_empty());
        assert!(document.wires().is_empty());
        assert_eq!(document.last_modified(), created_at);
    }

    #[test]
    fn test_version_equals_number_of_mutations() {
        // テスト項目: N 回の変更後のバージョンは N になる
        // given (前提条件):
        let mut document = SharedDocument::new(Timestamp::new(0));

        // when (操作):
        document.add_component(GraphRecord::new("c1"), Timestamp::new(1));
        document.add_wire(GraphRecord::new("w1"), Timestamp::new(2));
        document.update_component("c1", &Map::new(), Timestamp::new(3));
        document.remove_wire("w1", Timestamp::new(4));
        let version = document.remove_component("c1", Timestamp::new(5));

        // then (期待する結果):
        assert_eq!(version, 5);
        assert_eq!(document.version(), 5);
        assert_eq!(document.last_modified(), Timestamp::new(5));
    }

    #[test]
    fn test_update_unknown_component_still_bumps_version() {
        // テスト項目: 存在しない id の更新は内容を変えないがバージョンは進む
        // given (前提条件):
        let mut document = SharedDocument::new(Timestamp::new(0));
        document.add_component(GraphRecord::new("c1"), Timestamp::new(1));
        let before = document.components().to_vec();

        // when (操作):
        let changes = json!({"value": 10}).as_object().cloned().unwrap();
        let version = document.update_component("missing", &changes, Timestamp::new(2));

        // then (期待する結果):
        assert_eq!(version, 2);
        assert_eq!(document.components(), before.as_slice());
    }

    #[test]
    fn test_update_merges_into_first_match_only() {
        // テスト項目: 同じ id が複数ある場合、最初の一件だけがマージされる
        // given (前提条件):
        let mut document = SharedDocument::new(Timestamp::new(0));
        document.add_component(record(json!({"id": "r1", "ohms": 100})), Timestamp::new(1));
        document.add_component(record(json!({"id": "r1", "ohms": 100})), Timestamp::new(2));

        // when (操作):
        let changes = json!({"ohms": 220, "label": "R1"}).as_object().cloned().unwrap();
        document.update_component("r1", &changes, Timestamp::new(3));

        // then (期待する結果):
        assert_eq!(document.components()[0].attributes["ohms"], json!(220));
        assert_eq!(document.components()[0].attributes["label"], json!("R1"));
        assert_eq!(document.components()[1].attributes["ohms"], json!(100));
    }

    #[test]
    fn test_last_write_wins_on_concurrent_updates() {
        // テスト項目: 同じフィールドへの連続更新は後勝ちになる（マージしない）
        // given (前提条件):
        let mut document = SharedDocument::new(Timestamp::new(0));
        document.add_component(record(json!({"id": "led", "color": "red"})), Timestamp::new(1));

        // when (操作):
        let first = json!({"color": "green", "x": 1}).as_object().cloned().unwrap();
        let second = json!({"color": "blue"}).as_object().cloned().unwrap();
        document.update_component("led", &first, Timestamp::new(2));
        document.update_component("led", &second, Timestamp::new(3));

        // then (期待する結果):
        let led = &document.components()[0];
        assert_eq!(led.attributes["color"], json!("blue"));
        assert_eq!(led.attributes["x"], json!(1));
        assert_eq!(document.version(), 3);
    }

    #[test]
    fn test_merge_ignores_id_key() {
        // テスト項目: changes に含まれる id は無視され、識別子は変わらない
        // given (前提条件):
        let mut component = GraphRecord::new("c1");

        // when (操作):
        let changes = json!({"id": "c2", "rotation": 90}).as_object().cloned().unwrap();
        component.merge(&changes);

        // then (期待する結果):
        assert_eq!(component.id, "c1");
        assert!(!component.attributes.contains_key("id"));
        assert_eq!(component.attributes["rotation"], json!(90));
    }

    #[test]
    fn test_graph_record_round_trips_unknown_fields() {
        // テスト項目: id 以外のフィールドは解釈されずにそのまま保持される
        // given (前提条件):
        let raw = json!({"id": "bat", "kind": "battery", "pins": [1, 2], "volts": 9.0});

        // when (操作):
        let parsed = record(raw.clone());

        // then (期待する結果):
        assert_eq!(parsed.id, "bat");
        assert_eq!(serde_json::to_value(&parsed).unwrap(), raw);
    }
}
