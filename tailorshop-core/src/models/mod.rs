mod entity_kind;
mod operation;
mod record;

pub use entity_kind::EntityKind;
pub use operation::{NewOperation, OperationKind, QueuedOperation};
pub use record::{
    Record, CREATED_AT_FIELD, DELETED_FIELD, ID_FIELD, OFFLINE_FIELD, UPDATED_AT_FIELD,
};
