use std::collections::{HashMap, HashSet};

use tracing::trace;

use crate::cascade::ReusedColumn;
use crate::column::{Column, ColumnDef};
use crate::error::{Error, Result};
use crate::event::{ChangeEvent, ObjectRef, Property, PropertyValue};
use crate::ids::{ColumnId, IndexId, RelationshipId, TableId};
use crate::index::{Index, IndexEntry};
use crate::naming::names_match;
use crate::notify::{ChangeNotifier, ChangeObserver, CompoundGuard, ObserverId};
use crate::relationship::Relationship;
use crate::settings::EngineSettings;
use crate::table::Table;

/// In-memory, mutable model of a relational schema.
///
/// Tables, columns, indices and relationships live in arenas owned by the
/// schema and refer to each other through handles. Objects are never
/// dropped from their arena, so handles stay valid after an object is
/// detached and notifications can keep referring to it.
///
/// Accessors that take a handle index the arenas directly and panic on a
/// handle issued by another schema. The `get_*` variants return `None`, and
/// every mutator reports [`Error::UnknownObject`] instead.
pub struct Schema {
    pub(crate) tables: Vec<Table>,
    pub(crate) columns: Vec<Column>,
    pub(crate) indices: Vec<Index>,
    pub(crate) relationships: Vec<Relationship>,
    pub(crate) table_order: Vec<TableId>,
    pub(crate) notifier: ChangeNotifier,
    pub(crate) settings: EngineSettings,
    /// Relationships whose cascade is currently running.
    pub(crate) cascading: HashSet<RelationshipId>,
    /// Where reused child columns sat before a mapping pulled them into the
    /// child key.
    pub(crate) reused: HashMap<(RelationshipId, ColumnId), ReusedColumn>,
}

impl Default for Schema {
    fn default() -> Self {
        Self::new()
    }
}

impl Schema {
    pub fn new() -> Self {
        Self::with_settings(EngineSettings::default())
    }

    pub fn with_settings(settings: EngineSettings) -> Self {
        Self {
            tables: Vec::new(),
            columns: Vec::new(),
            indices: Vec::new(),
            relationships: Vec::new(),
            table_order: Vec::new(),
            notifier: ChangeNotifier::default(),
            settings,
            cascading: HashSet::new(),
            reused: HashMap::new(),
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Turn cascading on or off, e.g. around a bulk load.
    pub fn set_cascade_enabled(&mut self, enabled: bool) {
        self.settings.cascade_enabled = enabled;
    }

    pub fn subscribe(&mut self, observer: Box<dyn ChangeObserver>) -> ObserverId {
        self.notifier.subscribe(observer)
    }

    pub fn unsubscribe(&mut self, observer: ObserverId) -> bool {
        self.notifier.unsubscribe(observer)
    }

    /// Open a compound operation; it closes when the guard is dropped.
    pub fn begin_compound(&mut self, message: &str) -> CompoundGuard<'_> {
        CompoundGuard::new(self, message)
    }

    /// Run `edit` inside a compound operation.
    pub fn compound<T>(
        &mut self,
        message: &str,
        edit: impl FnOnce(&mut Schema) -> Result<T>,
    ) -> Result<T> {
        let mut guard = self.begin_compound(message);
        edit(&mut *guard)
    }

    /// Number of compound operations currently open.
    pub fn compound_depth(&self) -> usize {
        self.notifier.depth()
    }

    /// Attached tables in schema order.
    pub fn tables(&self) -> impl Iterator<Item = &Table> + '_ {
        self.table_order.iter().map(|id| &self.tables[id.0])
    }

    /// # Panics
    ///
    /// Panics if `id` was not issued by this schema; see [`Schema::get_table`].
    pub fn table(&self, id: TableId) -> &Table {
        &self.tables[id.0]
    }

    pub fn get_table(&self, id: TableId) -> Option<&Table> {
        self.tables.get(id.0)
    }

    /// Attached table with the given name, compared case-insensitively.
    pub fn table_by_name(&self, name: &str) -> Option<&Table> {
        self.tables()
            .find(|table| names_match(&table.name, name))
    }

    /// # Panics
    ///
    /// Panics if `id` was not issued by this schema; see [`Schema::get_column`].
    pub fn column(&self, id: ColumnId) -> &Column {
        &self.columns[id.0]
    }

    pub fn get_column(&self, id: ColumnId) -> Option<&Column> {
        self.columns.get(id.0)
    }

    pub fn table_columns(&self, table: TableId) -> impl Iterator<Item = &Column> + '_ {
        self.tables[table.0]
            .columns
            .iter()
            .map(|id| &self.columns[id.0])
    }

    /// Column of `table` with the given name, compared case-insensitively.
    pub fn column_by_name(&self, table: TableId, name: &str) -> Option<&Column> {
        self.table_columns(table)
            .find(|column| names_match(&column.name, name))
    }

    /// # Panics
    ///
    /// Panics if `id` was not issued by this schema; see [`Schema::get_index`].
    pub fn index(&self, id: IndexId) -> &Index {
        &self.indices[id.0]
    }

    pub fn get_index(&self, id: IndexId) -> Option<&Index> {
        self.indices.get(id.0)
    }

    /// # Panics
    ///
    /// Panics if `id` was not issued by this schema; see [`Schema::get_relationship`].
    pub fn relationship(&self, id: RelationshipId) -> &Relationship {
        &self.relationships[id.0]
    }

    pub fn get_relationship(&self, id: RelationshipId) -> Option<&Relationship> {
        self.relationships.get(id.0)
    }

    /// Attached relationships, in creation order.
    pub fn relationships(&self) -> impl Iterator<Item = &Relationship> + '_ {
        self.relationships.iter().filter(|rel| rel.attached)
    }

    /// Number of primary key columns of `table`.
    pub fn pk_size(&self, table: TableId) -> usize {
        self.indices[self.tables[table.0].primary_key.0].entries.len()
    }

    /// Primary key columns of `table`, in key order.
    pub fn primary_key_columns(&self, table: TableId) -> Vec<ColumnId> {
        self.indices[self.tables[table.0].primary_key.0]
            .entries
            .iter()
            .filter_map(IndexEntry::column_id)
            .collect()
    }

    pub fn is_primary_key(&self, column: ColumnId) -> bool {
        match self.columns[column.0].table {
            Some(table) => self.pk_position(table, column).is_some(),
            None => false,
        }
    }

    pub(crate) fn pk_position(&self, table: TableId, column: ColumnId) -> Option<usize> {
        self.indices[self.tables[table.0].primary_key.0]
            .entries
            .iter()
            .position(|entry| entry.column_id() == Some(column))
    }

    /// Create a detached column; it joins a table through [`Schema::add_column`].
    pub fn create_column(&mut self, def: ColumnDef) -> ColumnId {
        let id = ColumnId(self.columns.len());
        self.columns.push(Column::from_def(id, def));
        id
    }

    pub(crate) fn push_column(&mut self, column: Column) -> ColumnId {
        let id = column.id;
        debug_assert_eq!(id.0, self.columns.len());
        self.columns.push(column);
        id
    }

    pub(crate) fn next_column_id(&self) -> ColumnId {
        ColumnId(self.columns.len())
    }

    /// Add an empty table with an empty primary key.
    pub fn add_table(&mut self, name: impl Into<String>) -> Result<TableId> {
        let name = name.into();
        self.compound(&format!("add table {name}"), |schema| {
            let id = TableId(schema.tables.len());
            let pk = IndexId(schema.indices.len());
            schema
                .indices
                .push(Index::primary_key(pk, id, format!("{name}_pk")));
            let mut table = Table::new(id, name, pk);
            table.attached = true;
            schema.tables.push(table);
            let position = schema.table_order.len();
            schema.table_order.push(id);
            let event = schema.emit(ChangeEvent::ChildAdded {
                parent: ObjectRef::Schema,
                child: ObjectRef::Table(id),
                index: position,
            });
            schema.react(&event)?;
            Ok(id)
        })
    }

    pub(crate) fn table_mut(&mut self, id: TableId) -> &mut Table {
        &mut self.tables[id.0]
    }

    pub(crate) fn check_table(&self, id: TableId) -> Result<&Table> {
        match self.tables.get(id.0) {
            Some(table) if table.attached => Ok(table),
            _ => Err(Error::UnknownObject(format!("{id:?}"))),
        }
    }

    pub(crate) fn check_column(&self, id: ColumnId) -> Result<&Column> {
        self.columns
            .get(id.0)
            .ok_or_else(|| Error::UnknownObject(format!("{id:?}")))
    }

    pub(crate) fn check_index(&self, id: IndexId) -> Result<&Index> {
        match self.indices.get(id.0) {
            Some(index) if index.table.is_some() => Ok(index),
            _ => Err(Error::UnknownObject(format!("{id:?}"))),
        }
    }

    pub(crate) fn check_relationship(&self, id: RelationshipId) -> Result<&Relationship> {
        match self.relationships.get(id.0) {
            Some(rel) if rel.attached => Ok(rel),
            _ => Err(Error::UnknownObject(format!("{id:?}"))),
        }
    }

    /// Ensure `column` currently sits in `table`, returning its position.
    pub(crate) fn check_member(&self, table: TableId, column: ColumnId) -> Result<usize> {
        self.check_column(column)?;
        let table = self.check_table(table)?;
        table
            .position_of(column)
            .ok_or_else(|| Error::ColumnNotInTable {
                column: self.columns[column.0].name.clone(),
                table: table.name.clone(),
            })
    }

    pub(crate) fn qualified_name(&self, column: ColumnId) -> String {
        let column = &self.columns[column.0];
        match column.table {
            Some(table) => format!("{}.{}", self.tables[table.0].name, column.name),
            None => column.name.clone(),
        }
    }

    pub(crate) fn emit(&mut self, event: ChangeEvent) -> ChangeEvent {
        trace!(?event, "schema change");
        self.notifier.emit(&event);
        event
    }

    // Primitive edits. Each performs exactly one structural step and emits
    // its event; callers run `react` once the model is consistent again.

    pub(crate) fn insert_column_raw(
        &mut self,
        table: TableId,
        column: ColumnId,
        position: usize,
    ) -> ChangeEvent {
        self.tables[table.0].columns.insert(position, column);
        let col = &mut self.columns[column.0];
        col.table = Some(table);
        col.reference_count = 1;
        self.emit(ChangeEvent::ChildAdded {
            parent: ObjectRef::Table(table),
            child: ObjectRef::Column(column),
            index: position,
        })
    }

    pub(crate) fn remove_column_raw(&mut self, table: TableId, position: usize) -> ChangeEvent {
        let column = self.tables[table.0].columns.remove(position);
        let col = &mut self.columns[column.0];
        col.table = None;
        col.reference_count = 0;
        self.emit(ChangeEvent::ChildRemoved {
            parent: ObjectRef::Table(table),
            child: ObjectRef::Column(column),
            index: position,
        })
    }

    pub(crate) fn move_column_raw(&mut self, table: TableId, from: usize, to: usize) -> ChangeEvent {
        let columns = &mut self.tables[table.0].columns;
        let column = columns.remove(from);
        columns.insert(to, column);
        self.emit(ChangeEvent::ChildMoved {
            parent: ObjectRef::Table(table),
            child: ObjectRef::Column(column),
            from,
            to,
        })
    }

    pub(crate) fn insert_entry_raw(
        &mut self,
        index: IndexId,
        entry: IndexEntry,
        position: usize,
    ) -> ChangeEvent {
        self.indices[index.0].entries.insert(position, entry.clone());
        self.emit(ChangeEvent::ChildAdded {
            parent: ObjectRef::Index(index),
            child: ObjectRef::Entry(entry),
            index: position,
        })
    }

    pub(crate) fn remove_entry_raw(&mut self, index: IndexId, position: usize) -> ChangeEvent {
        let entry = self.indices[index.0].entries.remove(position);
        self.emit(ChangeEvent::ChildRemoved {
            parent: ObjectRef::Index(index),
            child: ObjectRef::Entry(entry),
            index: position,
        })
    }

    pub(crate) fn move_entry_raw(&mut self, index: IndexId, from: usize, to: usize) -> ChangeEvent {
        let entries = &mut self.indices[index.0].entries;
        let entry = entries.remove(from);
        entries.insert(to, entry.clone());
        self.emit(ChangeEvent::ChildMoved {
            parent: ObjectRef::Index(index),
            child: ObjectRef::Entry(entry),
            from,
            to,
        })
    }

    /// Replace one property value, emitting a change event and cascading.
    /// Does nothing when the value is unchanged.
    pub(crate) fn update_property<T, F>(
        &mut self,
        source: ObjectRef,
        property: Property,
        slot: F,
        value: T,
    ) -> Result<()>
    where
        T: PartialEq + Clone + Into<PropertyValue>,
        F: FnOnce(&mut Schema) -> &mut T,
    {
        let current = slot(self);
        if *current == value {
            return Ok(());
        }
        let old = std::mem::replace(current, value.clone());
        let event = self.emit(ChangeEvent::PropertyChanged {
            source,
            property,
            old: old.into(),
            new: value.into(),
        });
        self.react(&event)
    }

    pub(crate) fn add_reference(&mut self, column: ColumnId) -> Result<()> {
        let count = self.columns[column.0].reference_count + 1;
        self.update_property(
            ObjectRef::Column(column),
            Property::ReferenceCount,
            |schema| &mut schema.columns[column.0].reference_count,
            count,
        )
    }
}
