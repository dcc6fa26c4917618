use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Field holding the record's identity key.
pub const ID_FIELD: &str = "_id";
/// Set while the record's state has not been confirmed by the server.
pub const OFFLINE_FIELD: &str = "_isOffline";
/// Soft-delete marker for deletes waiting in the queue.
pub const DELETED_FIELD: &str = "_deleted";
pub const CREATED_AT_FIELD: &str = "_createdAt";
pub const UPDATED_AT_FIELD: &str = "_updatedAt";

/// An entity document (customer, order, employee or suit type).
///
/// The data layer does not interpret the shape of the document beyond its
/// `_id` key and the bookkeeping fields it attaches itself.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(Map<String, Value>);

impl Record {
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Builds a record from a JSON value. Non-object values yield `None`.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            _ => None,
        }
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    pub fn id(&self) -> Option<&str> {
        self.0.get(ID_FIELD).and_then(Value::as_str)
    }

    pub fn set_id(&mut self, id: impl Into<String>) {
        self.0.insert(ID_FIELD.to_string(), Value::String(id.into()));
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn insert(&mut self, field: impl Into<String>, value: Value) {
        self.0.insert(field.into(), value);
    }

    pub fn is_offline(&self) -> bool {
        self.flag(OFFLINE_FIELD)
    }

    pub fn is_deleted(&self) -> bool {
        self.flag(DELETED_FIELD)
    }

    /// Marks an optimistic record created while the server was unreachable.
    pub fn mark_created_offline(&mut self, now_millis: i64) {
        self.0.insert(OFFLINE_FIELD.to_string(), Value::Bool(true));
        self.0
            .insert(CREATED_AT_FIELD.to_string(), Value::from(now_millis));
    }

    pub fn mark_updated_offline(&mut self, now_millis: i64) {
        self.0.insert(OFFLINE_FIELD.to_string(), Value::Bool(true));
        self.0
            .insert(UPDATED_AT_FIELD.to_string(), Value::from(now_millis));
    }

    pub fn mark_deleted_offline(&mut self) {
        self.0.insert(DELETED_FIELD.to_string(), Value::Bool(true));
        self.0.insert(OFFLINE_FIELD.to_string(), Value::Bool(true));
    }

    /// A copy without the bookkeeping fields this layer attaches, suitable
    /// for sending to the server.
    pub fn without_local_fields(&self) -> Record {
        let mut map = self.0.clone();
        for field in [OFFLINE_FIELD, DELETED_FIELD, CREATED_AT_FIELD, UPDATED_AT_FIELD] {
            map.remove(field);
        }
        Record(map)
    }

    /// Copies every field of `other` over this record.
    pub fn merge(&mut self, other: &Record) {
        for (key, value) in &other.0 {
            self.0.insert(key.clone(), value.clone());
        }
    }

    fn flag(&self, field: &str) -> bool {
        self.0.get(field).and_then(Value::as_bool).unwrap_or(false)
    }
}

impl From<Map<String, Value>> for Record {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_value_rejects_non_objects() {
        assert!(Record::from_value(json!([1, 2])).is_none());
        assert!(Record::from_value(json!("x")).is_none());
        assert!(Record::from_value(json!({"_id": "a"})).is_some());
    }

    #[test]
    fn test_id_requires_string() {
        let record = Record::from_value(json!({"_id": 42})).unwrap();
        assert_eq!(record.id(), None);

        let record = Record::from_value(json!({"_id": "c1"})).unwrap();
        assert_eq!(record.id(), Some("c1"));
    }

    #[test]
    fn test_offline_markers() {
        let mut record = Record::from_value(json!({"_id": "c1", "name": "Ali"})).unwrap();
        assert!(!record.is_offline());
        assert!(!record.is_deleted());

        record.mark_created_offline(1_700_000_000_000);
        assert!(record.is_offline());
        assert_eq!(
            record.get(CREATED_AT_FIELD),
            Some(&json!(1_700_000_000_000i64))
        );

        record.mark_deleted_offline();
        assert!(record.is_deleted());
        assert!(record.is_offline());
    }

    #[test]
    fn test_merge_overwrites_fields() {
        let mut base = Record::from_value(json!({"_id": "c1", "name": "Ali", "phone": "1"})).unwrap();
        let patch = Record::from_value(json!({"phone": "2"})).unwrap();
        base.merge(&patch);
        assert_eq!(base.get("phone"), Some(&json!("2")));
        assert_eq!(base.get("name"), Some(&json!("Ali")));
    }

    #[test]
    fn test_without_local_fields_keeps_id_and_data() {
        let mut record = Record::from_value(json!({"_id": "c1", "name": "Ali"})).unwrap();
        record.mark_updated_offline(7);
        record.mark_deleted_offline();

        let clean = record.without_local_fields();
        assert_eq!(clean.into_value(), json!({"_id": "c1", "name": "Ali"}));
    }

    #[test]
    fn test_serializes_as_plain_object() {
        let record = Record::from_value(json!({"_id": "c1"})).unwrap();
        assert_eq!(serde_json::to_string(&record).unwrap(), r#"{"_id":"c1"}"#);
    }
}
