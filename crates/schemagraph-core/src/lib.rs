//! Consistency engine for an in-memory relational schema model.
//!
//! A [`Schema`] owns tables, columns, indices and relationships. Every edit
//! raises [`ChangeEvent`]s and cascades synchronously, so foreign key columns,
//! primary keys and indices stay consistent after each call returns.

mod cascade;
mod edit;

pub mod column;
pub mod error;
pub mod event;
pub mod graph;
pub mod ids;
pub mod index;
pub mod naming;
pub mod notify;
pub mod relationship;
pub mod schema;
pub mod settings;
pub mod snapshot;
pub mod table;
pub mod types;
pub mod validation;

pub use column::{Column, ColumnDef};
pub use error::{Error, Result};
pub use event::{ChangeEvent, CompoundId, Notification, ObjectRef, Property, PropertyValue};
pub use graph::{FkGraphReport, FkGraphSummary, build_fk_graph_report};
pub use ids::{ColumnId, IndexId, RelationshipId, TableId};
pub use index::{Index, IndexDef, IndexEntry, IndexEntryDef, IndexTarget};
pub use notify::{ChangeObserver, CompoundGuard, EventLog, ObserverId};
pub use relationship::{ColumnMapping, Relationship, RelationshipOptions};
pub use schema::Schema;
pub use settings::EngineSettings;
pub use snapshot::{
    ColumnSnapshot, IndexEntrySnapshot, IndexSnapshot, MappingSnapshot, RelationshipSnapshot,
    SchemaSnapshot, TableSnapshot,
};
pub use table::{Table, TableBuilder};
pub use types::{Cardinality, DataType, Deferrability, FkAction, Nullability};
pub use validation::{IssueSeverity, ValidationIssue, ValidationReport, validate_schema};

/// Current contract version for exported snapshots.
pub const SNAPSHOT_VERSION: &str = "0.1";
