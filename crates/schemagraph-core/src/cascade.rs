//! Reactions that keep relationships, foreign key columns and indices
//! consistent after every structural or property change.
//!
//! Every edit funnels its events through [`Schema::react`]. Reactions run
//! synchronously and recursively, so a change to a parent key ripples through
//! any number of identifying levels before the outer call returns. A
//! relationship whose cascade is already running ignores further events
//! until it finishes, which keeps self-references from feeding on themselves.

use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::event::{ChangeEvent, ObjectRef, Property, PropertyValue};
use crate::ids::{ColumnId, IndexId, RelationshipId, TableId};
use crate::index::IndexEntry;
use crate::naming::{foreign_key_column_name, names_match};
use crate::relationship::ColumnMapping;
use crate::schema::Schema;
use crate::types::Nullability;

/// Original place of a child column that a mapping reused and moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ReusedColumn {
    pub(crate) position: usize,
    pub(crate) in_key: bool,
}

impl Schema {
    /// Bring the model back in line after `event`.
    pub(crate) fn react(&mut self, event: &ChangeEvent) -> Result<()> {
        match event {
            ChangeEvent::ChildAdded {
                parent: ObjectRef::Index(index),
                child: ObjectRef::Entry(entry),
                ..
            } => self.on_key_entry_added(*index, entry),
            ChangeEvent::ChildRemoved { parent, child, .. } => match (parent, child) {
                (ObjectRef::Index(index), ObjectRef::Entry(entry)) => {
                    self.on_key_entry_removed(*index, entry)
                }
                (ObjectRef::Table(table), ObjectRef::Column(column)) => {
                    self.on_column_removed(*table, *column)
                }
                (ObjectRef::Schema, ObjectRef::Table(table)) => self.on_table_removed(*table),
                _ => Ok(()),
            },
            ChangeEvent::ChildMoved {
                parent: ObjectRef::Index(index),
                child: ObjectRef::Entry(entry),
                ..
            } => self.on_key_entry_moved(*index, entry),
            ChangeEvent::PropertyChanged {
                source: ObjectRef::Column(column),
                property,
                old,
                ..
            } => self.on_column_changed(*column, *property, old),
            _ => Ok(()),
        }
    }

    /// Run `cascade` for `relationship` unless its cascade is already running.
    pub(crate) fn with_cascade_guard(
        &mut self,
        relationship: RelationshipId,
        cascade: impl FnOnce(&mut Schema) -> Result<()>,
    ) -> Result<()> {
        if !self.cascading.insert(relationship) {
            trace!(
                relationship = %self.relationships[relationship.0].name,
                "reentrant cascade suppressed"
            );
            return Ok(());
        }
        let result = cascade(self);
        self.cascading.remove(&relationship);
        result
    }

    /// Table whose primary key is `index`, if `index` is a primary key.
    fn key_owner(&self, index: IndexId) -> Option<TableId> {
        let index = &self.indices[index.0];
        if index.primary_key { index.table } else { None }
    }

    fn exported_relationships(&self, table: TableId) -> Vec<RelationshipId> {
        self.tables[table.0].exported.clone()
    }

    fn on_key_entry_added(&mut self, index: IndexId, entry: &IndexEntry) -> Result<()> {
        if !self.settings.cascade_enabled {
            return Ok(());
        }
        let (Some(table), Some(column)) = (self.key_owner(index), entry.column_id()) else {
            return Ok(());
        };
        for relationship in self.exported_relationships(table) {
            self.with_cascade_guard(relationship, |schema| {
                schema.map_parent_column(relationship, column)
            })?;
        }
        Ok(())
    }

    fn on_key_entry_removed(&mut self, index: IndexId, entry: &IndexEntry) -> Result<()> {
        if !self.settings.cascade_enabled {
            return Ok(());
        }
        let (Some(table), Some(column)) = (self.key_owner(index), entry.column_id()) else {
            return Ok(());
        };
        for relationship in self.exported_relationships(table) {
            self.with_cascade_guard(relationship, |schema| {
                match schema.relationships[relationship.0].parent_mapping_position(column) {
                    Some(position) => schema.unmap(relationship, position),
                    None => Ok(()),
                }
            })?;
        }
        Ok(())
    }

    fn on_key_entry_moved(&mut self, index: IndexId, entry: &IndexEntry) -> Result<()> {
        if !self.settings.cascade_enabled {
            return Ok(());
        }
        let (Some(table), Some(column)) = (self.key_owner(index), entry.column_id()) else {
            return Ok(());
        };
        for relationship in self.exported_relationships(table) {
            self.with_cascade_guard(relationship, |schema| {
                schema.follow_key_order(relationship, column)
            })?;
        }
        Ok(())
    }

    fn on_column_removed(&mut self, table: TableId, column: ColumnId) -> Result<()> {
        self.drop_column_from_indices(table, column)?;

        let release = self.settings.cascade_enabled;
        for relationship in self.exported_relationships(table) {
            let Some(position) =
                self.relationships[relationship.0].parent_mapping_position(column)
            else {
                continue;
            };
            if release {
                self.unmap(relationship, position)?;
            } else {
                self.remove_mapping_raw(relationship, position)?;
            }
        }

        // The child column is already gone, so these mappings are dropped
        // without releasing anything.
        for relationship in self.tables[table.0].imported.clone() {
            while let Some(position) = self.relationships[relationship.0]
                .mappings
                .iter()
                .position(|mapping| mapping.child_column == column)
            {
                self.remove_mapping_raw(relationship, position)?;
            }
        }
        Ok(())
    }

    fn on_table_removed(&mut self, table: TableId) -> Result<()> {
        let mut relationships = self.tables[table.0].exported.clone();
        for relationship in self.tables[table.0].imported.clone() {
            if !relationships.contains(&relationship) {
                relationships.push(relationship);
            }
        }
        for relationship in relationships {
            let rel = &self.relationships[relationship.0];
            if !rel.attached {
                continue;
            }
            // Child columns are only cleaned up in a child that survives.
            let release = self.settings.cascade_enabled && rel.child != table;
            self.detach_relationship(relationship, release)?;
        }
        Ok(())
    }

    fn on_column_changed(
        &mut self,
        column: ColumnId,
        property: Property,
        old: &PropertyValue,
    ) -> Result<()> {
        if !self.settings.cascade_enabled {
            return Ok(());
        }
        let propagates = match property {
            Property::Name | Property::PhysicalName => self.settings.propagate_renames,
            Property::DataType | Property::Precision | Property::Scale => true,
            _ => false,
        };
        let Some(table) = self.columns[column.0].table else {
            return Ok(());
        };
        if !propagates {
            return Ok(());
        }

        for relationship in self.exported_relationships(table) {
            self.with_cascade_guard(relationship, |schema| {
                let children: Vec<ColumnId> = schema.relationships[relationship.0]
                    .mappings
                    .iter()
                    .filter(|mapping| mapping.parent_column == column)
                    .map(|mapping| mapping.child_column)
                    .collect();
                for child in children {
                    schema.propagate_property(column, child, property, old)?;
                }
                Ok(())
            })?;
        }
        Ok(())
    }

    fn propagate_property(
        &mut self,
        parent: ColumnId,
        child: ColumnId,
        property: Property,
        old: &PropertyValue,
    ) -> Result<()> {
        let source = self.columns[parent.0].clone();
        let target = &self.columns[child.0];
        match property {
            Property::Name => {
                // Only children still carrying the parent's previous name
                // follow a rename.
                if old.as_text() != Some(target.name.as_str()) {
                    return Ok(());
                }
                debug!(
                    column = %self.qualified_name(child),
                    name = %source.name,
                    "propagating rename"
                );
                self.update_property(
                    ObjectRef::Column(child),
                    Property::Name,
                    |s| &mut s.columns[child.0].name,
                    source.name,
                )
            }
            Property::PhysicalName => {
                if PropertyValue::from(target.physical_name.clone()) != *old {
                    return Ok(());
                }
                self.update_property(
                    ObjectRef::Column(child),
                    Property::PhysicalName,
                    |s| &mut s.columns[child.0].physical_name,
                    source.physical_name,
                )
            }
            Property::DataType => self.update_property(
                ObjectRef::Column(child),
                Property::DataType,
                |s| &mut s.columns[child.0].data_type,
                source.data_type,
            ),
            // Precision and scale only ever grow along a relationship.
            Property::Precision if source.precision > target.precision => self.update_property(
                ObjectRef::Column(child),
                Property::Precision,
                |s| &mut s.columns[child.0].precision,
                source.precision,
            ),
            Property::Scale if source.scale > target.scale => self.update_property(
                ObjectRef::Column(child),
                Property::Scale,
                |s| &mut s.columns[child.0].scale,
                source.scale,
            ),
            _ => Ok(()),
        }
    }

    /// Map a parent key column into the child of `relationship`, reusing a
    /// compatible child column where possible and generating one otherwise.
    /// Already mapped columns are left alone.
    pub(crate) fn map_parent_column(
        &mut self,
        relationship: RelationshipId,
        parent_column: ColumnId,
    ) -> Result<()> {
        let rel = &self.relationships[relationship.0];
        if !rel.attached || rel.mapping_for_parent(parent_column).is_some() {
            return Ok(());
        }
        let (parent, child, identifying) = (rel.parent, rel.child, rel.identifying);
        if self.columns[parent_column.0].table != Some(parent) {
            return Err(Error::InconsistentMapping(format!(
                "{} is not a column of parent table {}",
                self.qualified_name(parent_column),
                self.tables[parent.0].name
            )));
        }

        let position = self.mapping_slot(relationship, parent_column);
        let child_column = match self.hijack_candidate(relationship, parent_column) {
            Some(existing) => {
                debug!(
                    relationship = %self.relationships[relationship.0].name,
                    parent = %self.qualified_name(parent_column),
                    child = %self.qualified_name(existing),
                    "reusing existing child column"
                );
                self.add_reference(existing)?;
                if identifying {
                    if let Some(position) = self.tables[child.0].position_of(existing) {
                        let in_key = self.pk_position(child, existing).is_some();
                        self.reused
                            .insert((relationship, existing), ReusedColumn { position, in_key });
                    }
                    let target = self.child_key_slot(relationship, position, existing);
                    self.place_in_key(child, existing, target)?;
                }
                existing
            }
            None => self.generate_child_column(relationship, parent_column, position)?,
        };

        let mapping = ColumnMapping {
            parent_column,
            child_column,
        };
        self.relationships[relationship.0]
            .mappings
            .insert(position, mapping);
        let event = self.emit(ChangeEvent::ChildAdded {
            parent: ObjectRef::Relationship(relationship),
            child: ObjectRef::Mapping(mapping),
            index: position,
        });
        self.react(&event)
    }

    /// Remove the mapping at `position` and release its child column. A
    /// reused column that survives goes back to where it was found.
    pub(crate) fn unmap(&mut self, relationship: RelationshipId, position: usize) -> Result<()> {
        let child_column = self.relationships[relationship.0].mappings[position].child_column;
        let origin = self.reused.remove(&(relationship, child_column));
        let mapping = self.remove_mapping_raw(relationship, position)?;
        debug!(
            relationship = %self.relationships[relationship.0].name,
            child = %self.qualified_name(mapping.child_column),
            "releasing child column"
        );
        self.release_column(mapping.child_column)?;

        let child = self.relationships[relationship.0].child;
        match origin {
            Some(origin) if self.columns[child_column.0].table == Some(child) => {
                self.restore_reused_column(child, child_column, origin)
            }
            _ => Ok(()),
        }
    }

    fn restore_reused_column(
        &mut self,
        table: TableId,
        column: ColumnId,
        origin: ReusedColumn,
    ) -> Result<()> {
        if !origin.in_key && self.pk_position(table, column).is_some() {
            self.demote(table, column)?;
        }
        let Some(current) = self.tables[table.0].position_of(column) else {
            return Ok(());
        };
        let key_size = self.pk_size(table);
        let in_key = current < key_size;
        if in_key != origin.in_key {
            return Ok(());
        }
        let last = self.tables[table.0].columns.len() - 1;
        let target = if in_key {
            origin.position.min(key_size - 1)
        } else {
            origin.position.clamp(key_size, last)
        };
        if target == current {
            return Ok(());
        }
        debug!(
            column = %self.qualified_name(column),
            from = current,
            to = target,
            "restoring reused column"
        );
        self.move_column(table, current, target)
    }

    pub(crate) fn remove_mapping_raw(
        &mut self,
        relationship: RelationshipId,
        position: usize,
    ) -> Result<ColumnMapping> {
        let mapping = self.relationships[relationship.0].mappings.remove(position);
        self.reused.remove(&(relationship, mapping.child_column));
        let event = self.emit(ChangeEvent::ChildRemoved {
            parent: ObjectRef::Relationship(relationship),
            child: ObjectRef::Mapping(mapping),
            index: position,
        });
        self.react(&event)?;
        Ok(mapping)
    }

    /// Drop one reference to `column`, detaching it from its table when it
    /// was the last one.
    pub(crate) fn release_column(&mut self, column: ColumnId) -> Result<()> {
        let col = &self.columns[column.0];
        let Some(table) = col.table else {
            return Ok(());
        };
        if col.reference_count > 1 {
            let count = col.reference_count - 1;
            return self.update_property(
                ObjectRef::Column(column),
                Property::ReferenceCount,
                |s| &mut s.columns[column.0].reference_count,
                count,
            );
        }
        self.detach_column(table, column)
    }

    /// Position at which a mapping for `parent_column` keeps the mappings in
    /// parent key order.
    fn mapping_slot(&self, relationship: RelationshipId, parent_column: ColumnId) -> usize {
        let rel = &self.relationships[relationship.0];
        let Some(key_position) = self.pk_position(rel.parent, parent_column) else {
            return rel.mappings.len();
        };
        rel.mappings
            .iter()
            .position(|mapping| {
                self.pk_position(rel.parent, mapping.parent_column)
                    .is_none_or(|other| other > key_position)
            })
            .unwrap_or(rel.mappings.len())
    }

    /// Child key position for the column of mapping `position`: right after
    /// the previous mapped key column, else before the next one, else at the
    /// end of the child key.
    pub(crate) fn child_key_slot(
        &self,
        relationship: RelationshipId,
        position: usize,
        placing: ColumnId,
    ) -> usize {
        let rel = &self.relationships[relationship.0];
        let previous = rel.mappings[..position]
            .iter()
            .rev()
            .filter(|mapping| mapping.child_column != placing)
            .find_map(|mapping| self.pk_position(rel.child, mapping.child_column));
        if let Some(previous) = previous {
            return previous + 1;
        }
        rel.mappings[position..]
            .iter()
            .filter(|mapping| mapping.child_column != placing)
            .find_map(|mapping| self.pk_position(rel.child, mapping.child_column))
            .unwrap_or_else(|| self.pk_size(rel.child))
    }

    /// Put `column` at key position `target` of `table`, whether or not it is
    /// already part of the key.
    pub(crate) fn place_in_key(&mut self, table: TableId, column: ColumnId, target: usize) -> Result<()> {
        match self.pk_position(table, column) {
            Some(current) => {
                let target = if current < target { target - 1 } else { target };
                if current == target {
                    return Ok(());
                }
                let pk = self.tables[table.0].primary_key;
                let moved = self.move_column_raw(table, current, target);
                let reordered = self.move_entry_raw(pk, current, target);
                self.react(&moved)?;
                self.react(&reordered)
            }
            None => self.promote(table, column, target),
        }
    }

    fn hijack_candidate(&self, relationship: RelationshipId, parent_column: ColumnId) -> Option<ColumnId> {
        if !self.settings.hijack_columns {
            return None;
        }
        let rel = &self.relationships[relationship.0];
        let source = &self.columns[parent_column.0];
        self.tables[rel.child.0].columns.iter().copied().find(|candidate| {
            let column = &self.columns[candidate.0];
            *candidate != parent_column
                && names_match(&column.name, &source.name)
                && column.data_type.is_compatible_with(&source.data_type)
                && !rel.mappings.iter().any(|mapping| {
                    mapping.child_column == *candidate || mapping.parent_column == *candidate
                })
        })
    }

    fn generate_child_column(
        &mut self,
        relationship: RelationshipId,
        parent_column: ColumnId,
        position: usize,
    ) -> Result<ColumnId> {
        let rel = &self.relationships[relationship.0];
        let (parent, child, identifying) = (rel.parent, rel.child, rel.identifying);
        let name = foreign_key_column_name(
            &self.tables[parent.0].name,
            &self.columns[parent_column.0].name,
            &self.settings.name_separator,
            |candidate| self.has_column_named(child, candidate),
        );

        let id = self.next_column_id();
        let mut column = self.columns[parent_column.0].derive(id, name);
        if identifying {
            column.nullability = Nullability::NotNull;
        }
        self.push_column(column);
        debug!(
            relationship = %self.relationships[relationship.0].name,
            parent = %self.qualified_name(parent_column),
            column = %self.columns[id.0].name,
            identifying,
            "generating child column"
        );

        if identifying {
            let target = self.child_key_slot(relationship, position, id);
            let pk = self.tables[child.0].primary_key;
            let added = self.insert_column_raw(child, id, target);
            let keyed = self.insert_entry_raw(pk, IndexEntry::column(id), target);
            self.react(&added)?;
            self.react(&keyed)?;
        } else {
            let end = self.tables[child.0].columns.len();
            let added = self.insert_column_raw(child, id, end);
            self.react(&added)?;
        }
        Ok(id)
    }

    /// Reposition the mapping of `parent_column` after its parent key entry
    /// moved, dragging an identifying child key column along.
    fn follow_key_order(&mut self, relationship: RelationshipId, parent_column: ColumnId) -> Result<()> {
        let Some(from) = self.relationships[relationship.0].parent_mapping_position(parent_column)
        else {
            return Ok(());
        };
        let mapping = self.relationships[relationship.0].mappings.remove(from);
        let to = self.mapping_slot(relationship, parent_column);
        self.relationships[relationship.0].mappings.insert(to, mapping);
        if from == to {
            return Ok(());
        }
        let event = self.emit(ChangeEvent::ChildMoved {
            parent: ObjectRef::Relationship(relationship),
            child: ObjectRef::Mapping(mapping),
            from,
            to,
        });
        self.react(&event)?;

        let rel = &self.relationships[relationship.0];
        let child = rel.child;
        if rel.identifying && self.pk_position(child, mapping.child_column).is_some() {
            let target = self.child_key_slot(relationship, to, mapping.child_column);
            self.place_in_key(child, mapping.child_column, target)?;
        }
        Ok(())
    }
}
