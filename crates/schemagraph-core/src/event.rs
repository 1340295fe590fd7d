//! Change notifications raised by every mutation of the model.
//!
//! The set of events is closed: observers and the cascade engine match on
//! [`ChangeEvent`] exhaustively instead of registering per-kind listeners.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ids::{ColumnId, IndexId, RelationshipId, TableId};
use crate::index::IndexEntry;
use crate::relationship::ColumnMapping;
use crate::types::{Cardinality, DataType, Deferrability, FkAction, Nullability};

/// Identifies one compound operation.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CompoundId(Uuid);

impl CompoundId {
    pub(crate) fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Debug for CompoundId {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(fmt, "CompoundId({})", self.0)
    }
}

impl fmt::Display for CompoundId {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(fmt)
    }
}

/// An object, or a value owned by an object, that an event is about.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ObjectRef {
    Schema,
    Table(TableId),
    Column(ColumnId),
    Index(IndexId),
    Relationship(RelationshipId),
    Entry(IndexEntry),
    Mapping(ColumnMapping),
}

/// Property names carried by [`ChangeEvent::PropertyChanged`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Property {
    Name,
    PhysicalName,
    Remarks,
    DataType,
    Precision,
    Scale,
    Nullability,
    Default,
    AutoIncrement,
    SequenceName,
    ReferenceCount,
    Identifying,
    UpdateRule,
    DeleteRule,
    Deferrability,
    ParentCardinality,
    ChildCardinality,
    Unique,
    Clustered,
    IndexType,
    Qualifier,
}

/// Old or new value of a changed property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum PropertyValue {
    Null,
    Text(String),
    Number(u64),
    Bool(bool),
    DataType(DataType),
    Nullability(Nullability),
    Action(FkAction),
    Deferrability(Deferrability),
    Cardinality(Cardinality),
}

impl PropertyValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            PropertyValue::Text(text) => Some(text),
            _ => None,
        }
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        PropertyValue::Text(value)
    }
}

impl From<Option<String>> for PropertyValue {
    fn from(value: Option<String>) -> Self {
        value.map_or(PropertyValue::Null, PropertyValue::Text)
    }
}

impl From<Option<u32>> for PropertyValue {
    fn from(value: Option<u32>) -> Self {
        value.map_or(PropertyValue::Null, |n| PropertyValue::Number(u64::from(n)))
    }
}

impl From<usize> for PropertyValue {
    fn from(value: usize) -> Self {
        PropertyValue::Number(value as u64)
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        PropertyValue::Bool(value)
    }
}

impl From<DataType> for PropertyValue {
    fn from(value: DataType) -> Self {
        PropertyValue::DataType(value)
    }
}

impl From<Nullability> for PropertyValue {
    fn from(value: Nullability) -> Self {
        PropertyValue::Nullability(value)
    }
}

impl From<FkAction> for PropertyValue {
    fn from(value: FkAction) -> Self {
        PropertyValue::Action(value)
    }
}

impl From<Deferrability> for PropertyValue {
    fn from(value: Deferrability) -> Self {
        PropertyValue::Deferrability(value)
    }
}

impl From<Cardinality> for PropertyValue {
    fn from(value: Cardinality) -> Self {
        PropertyValue::Cardinality(value)
    }
}

/// A single structural or property change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ChangeEvent {
    ChildAdded {
        parent: ObjectRef,
        child: ObjectRef,
        index: usize,
    },
    ChildRemoved {
        parent: ObjectRef,
        child: ObjectRef,
        index: usize,
    },
    ChildMoved {
        parent: ObjectRef,
        child: ObjectRef,
        from: usize,
        to: usize,
    },
    PropertyChanged {
        source: ObjectRef,
        property: Property,
        old: PropertyValue,
        new: PropertyValue,
    },
    CompoundStarted {
        id: CompoundId,
        message: String,
    },
    CompoundEnded {
        id: CompoundId,
    },
}

impl ChangeEvent {
    /// True for the bracket events of compound operations.
    pub fn is_bracket(&self) -> bool {
        matches!(
            self,
            ChangeEvent::CompoundStarted { .. } | ChangeEvent::CompoundEnded { .. }
        )
    }
}

/// An event as delivered to observers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    /// Monotonic sequence number, starting at 1 for each schema.
    pub seq: u64,
    /// Outermost compound operation open when the event was raised.
    pub compound: Option<CompoundId>,
    /// Number of compound brackets open when the event was raised.
    pub depth: usize,
    pub event: ChangeEvent,
}
