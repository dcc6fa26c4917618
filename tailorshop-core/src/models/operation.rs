use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use super::EntityKind;

/// Kind of a queued remote mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OperationKind {
    Create,
    Update,
    Delete,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Create => "CREATE",
            OperationKind::Update => "UPDATE",
            OperationKind::Delete => "DELETE",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CREATE" => Ok(OperationKind::Create),
            "UPDATE" => Ok(OperationKind::Update),
            "DELETE" => Ok(OperationKind::Delete),
            other => Err(format!("Unknown operation kind '{}'", other)),
        }
    }
}

/// A mutation to append to the operation queue.
#[derive(Debug, Clone, PartialEq)]
pub struct NewOperation {
    pub kind: OperationKind,
    pub entity: EntityKind,
    pub url: String,
    pub payload: Option<Value>,
    /// Placeholder key of the optimistic record (CREATE only).
    pub temporary_id: Option<String>,
    /// Key of the targeted record (UPDATE and DELETE).
    pub record_id: Option<String>,
}

impl NewOperation {
    pub fn create(entity: EntityKind, url: &str, payload: Value, temporary_id: String) -> Self {
        Self {
            kind: OperationKind::Create,
            entity,
            url: url.to_string(),
            payload: Some(payload),
            temporary_id: Some(temporary_id),
            record_id: None,
        }
    }

    pub fn update(entity: EntityKind, url: &str, payload: Value, record_id: String) -> Self {
        Self {
            kind: OperationKind::Update,
            entity,
            url: url.to_string(),
            payload: Some(payload),
            temporary_id: None,
            record_id: Some(record_id),
        }
    }

    pub fn delete(entity: EntityKind, url: &str, record_id: String) -> Self {
        Self {
            kind: OperationKind::Delete,
            entity,
            url: url.to_string(),
            payload: None,
            temporary_id: None,
            record_id: Some(record_id),
        }
    }
}

/// A persisted queue entry. `id` is assigned by the store and increases
/// monotonically, so ordering by id is the intended replay order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuedOperation {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: OperationKind,
    pub entity: EntityKind,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temporary_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record_id: Option<String>,
    pub retries: u32,
    /// Enqueue time in epoch milliseconds.
    pub timestamp: i64,
}
