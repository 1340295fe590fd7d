//! Structural and property edits on tables and columns.
//!
//! Every public operation opens a compound, applies primitive steps and lets
//! [`Schema::react`] cascade once the model is consistent again. The primary
//! key stays positional throughout: promoting a column moves it into the
//! first `k` slots, demoting moves it right behind them.

use tracing::debug;

use crate::column::ColumnDef;
use crate::error::{Error, Result};
use crate::event::{ChangeEvent, ObjectRef, Property};
use crate::ids::{ColumnId, RelationshipId, TableId};
use crate::index::IndexEntry;
use crate::schema::Schema;
use crate::types::{DataType, Nullability};

impl Schema {
    /// Insert `column` into `table` at `position`.
    ///
    /// A position inside the primary key makes the column a key column.
    /// Adding a column the table already holds only adds a reference.
    pub fn add_column(&mut self, table: TableId, column: ColumnId, position: usize) -> Result<()> {
        let table_name = self.check_table(table)?.name.clone();
        let current = self.check_column(column)?.table;
        match current {
            Some(owner) if owner == table => {
                self.compound("add column reference", |schema| schema.add_reference(column))
            }
            Some(owner) => Err(Error::ColumnInUse {
                column: self.columns[column.0].name.clone(),
                table: self.tables[owner.0].name.clone(),
            }),
            None => {
                let len = self.tables[table.0].columns.len();
                if position > len {
                    return Err(Error::InvalidSchema(format!(
                        "column position {position} is out of range for {table_name}"
                    )));
                }
                self.compound(&format!("add column to {table_name}"), |schema| {
                    let keyed = position < schema.pk_size(table);
                    let added = schema.insert_column_raw(table, column, position);
                    if keyed {
                        let pk = schema.tables[table.0].primary_key;
                        let entry = schema.insert_entry_raw(pk, IndexEntry::column(column), position);
                        schema.react(&added)?;
                        schema.react(&entry)
                    } else {
                        schema.react(&added)
                    }
                })
            }
        }
    }

    /// Create a column from `def` and append it to `table`.
    pub fn append_column(&mut self, table: TableId, def: ColumnDef) -> Result<ColumnId> {
        let len = self.check_table(table)?.columns.len();
        let column = self.create_column(def);
        self.add_column(table, column, len)?;
        Ok(column)
    }

    /// Remove `column` from `table`.
    ///
    /// Columns that still carry other references only lose one. Columns
    /// mapped as the child side of a relationship are locked and can only go
    /// away by removing the mapping or relationship.
    pub fn remove_column(&mut self, table: TableId, column: ColumnId) -> Result<()> {
        self.check_member(table, column)?;
        if self.settings.cascade_enabled {
            if let Some(relationship) = self.locking_relationship(table, column) {
                return Err(Error::LockedColumn {
                    column: self.qualified_name(column),
                    relationship: self.relationships[relationship.0].name.clone(),
                });
            }
        }
        let message = format!("remove column {}", self.qualified_name(column));
        self.compound(&message, |schema| schema.release_column(column))
    }

    /// Relationship whose mappings use `column` as a child column.
    pub fn locking_relationship(&self, table: TableId, column: ColumnId) -> Option<RelationshipId> {
        self.get_table(table)?.imported.iter().copied().find(|relationship| {
            self.relationships[relationship.0]
                .mapping_for_child(column)
                .is_some()
        })
    }

    /// Move the column at `from` to `to`, promoting or demoting it when it
    /// crosses the primary key boundary.
    pub fn move_column(&mut self, table: TableId, from: usize, to: usize) -> Result<()> {
        let (name, len) = {
            let t = self.check_table(table)?;
            (t.name.clone(), t.columns.len())
        };
        if from >= len || to >= len {
            return Err(Error::InvalidSchema(format!(
                "cannot move column {from} to {to} in {name} with {len} columns"
            )));
        }
        if from == to {
            return Ok(());
        }
        self.compound(&format!("move column in {name}"), |schema| {
            let key_size = schema.pk_size(table);
            let column = schema.tables[table.0].columns[from];
            match (from < key_size, to < key_size) {
                (true, true) => {
                    let pk = schema.tables[table.0].primary_key;
                    let moved = schema.move_column_raw(table, from, to);
                    let reordered = schema.move_entry_raw(pk, from, to);
                    schema.react(&moved)?;
                    schema.react(&reordered)
                }
                (true, false) => {
                    schema.demote(table, column)?;
                    let current = schema.tables[table.0]
                        .position_of(column)
                        .unwrap_or(to);
                    if current == to {
                        return Ok(());
                    }
                    let moved = schema.move_column_raw(table, current, to);
                    schema.react(&moved)
                }
                (false, true) => schema.promote(table, column, to),
                (false, false) => {
                    let moved = schema.move_column_raw(table, from, to);
                    schema.react(&moved)
                }
            }
        })
    }

    /// Append `column` to the primary key of `table`.
    pub fn add_to_pk(&mut self, table: TableId, column: ColumnId) -> Result<()> {
        self.check_member(table, column)?;
        if self.pk_position(table, column).is_some() {
            return Ok(());
        }
        let message = format!("add {} to primary key", self.qualified_name(column));
        self.compound(&message, |schema| {
            let key_size = schema.pk_size(table);
            schema.promote(table, column, key_size)
        })
    }

    /// Move `column` to the first position after the primary key, demoting
    /// it if it is a key column.
    pub fn move_after_pk(&mut self, table: TableId, column: ColumnId) -> Result<()> {
        let position = self.check_member(table, column)?;
        let message = format!("move {} after primary key", self.qualified_name(column));
        self.compound(&message, |schema| {
            if schema.pk_position(table, column).is_some() {
                return schema.demote(table, column);
            }
            let key_size = schema.pk_size(table);
            if position == key_size {
                return Ok(());
            }
            let moved = schema.move_column_raw(table, position, key_size);
            schema.react(&moved)
        })
    }

    /// Make a non-key column the key column at `position`.
    pub(crate) fn promote(&mut self, table: TableId, column: ColumnId, position: usize) -> Result<()> {
        let Some(current) = self.tables[table.0].position_of(column) else {
            return Err(Error::ColumnNotInTable {
                column: self.columns[column.0].name.clone(),
                table: self.tables[table.0].name.clone(),
            });
        };
        let key_size = self.pk_size(table);
        if position > key_size {
            return Err(Error::InvalidPrimaryKey(format!(
                "key position {position} is out of range for {}",
                self.tables[table.0].name
            )));
        }
        let pk = self.tables[table.0].primary_key;
        let moved = (current != position).then(|| self.move_column_raw(table, current, position));
        let keyed = self.insert_entry_raw(pk, IndexEntry::column(column), position);
        if let Some(moved) = moved {
            self.react(&moved)?;
        }
        self.react(&keyed)
    }

    /// Take a key column out of the primary key, leaving it right after the
    /// remaining key columns.
    pub(crate) fn demote(&mut self, table: TableId, column: ColumnId) -> Result<()> {
        let Some(current) = self.pk_position(table, column) else {
            return Ok(());
        };
        let last = self.pk_size(table) - 1;
        let pk = self.tables[table.0].primary_key;
        let moved = (current != last).then(|| self.move_column_raw(table, current, last));
        let unkeyed = self.remove_entry_raw(pk, current);
        if let Some(moved) = moved {
            self.react(&moved)?;
        }
        self.react(&unkeyed)
    }

    /// Make the primary key of `table` exactly `columns`, in order.
    pub(crate) fn reorganize_primary_key(&mut self, table: TableId, columns: &[ColumnId]) -> Result<()> {
        let dropped: Vec<ColumnId> = self
            .primary_key_columns(table)
            .into_iter()
            .filter(|column| !columns.contains(column))
            .collect();
        for column in dropped.into_iter().rev() {
            self.demote(table, column)?;
        }
        for (target, column) in columns.iter().copied().enumerate() {
            self.place_in_key(table, column, target)?;
        }
        Ok(())
    }

    /// Physically remove `column` from `table`, together with its key entry.
    pub(crate) fn detach_column(&mut self, table: TableId, column: ColumnId) -> Result<()> {
        let Some(position) = self.tables[table.0].position_of(column) else {
            return Ok(());
        };
        let unkeyed = self.pk_position(table, column).map(|key_position| {
            let pk = self.tables[table.0].primary_key;
            self.remove_entry_raw(pk, key_position)
        });
        let removed = self.remove_column_raw(table, position);
        debug!(
            table = %self.tables[table.0].name,
            column = %self.columns[column.0].name,
            "column detached"
        );
        if let Some(unkeyed) = unkeyed {
            self.react(&unkeyed)?;
        }
        self.react(&removed)
    }

    pub fn set_column_name(&mut self, column: ColumnId, name: impl Into<String>) -> Result<()> {
        self.check_column(column)?;
        let name = name.into();
        self.compound("rename column", |schema| {
            schema.update_property(
                ObjectRef::Column(column),
                Property::Name,
                |s| &mut s.columns[column.0].name,
                name,
            )
        })
    }

    pub fn set_column_physical_name(&mut self, column: ColumnId, name: Option<String>) -> Result<()> {
        self.check_column(column)?;
        self.compound("set column physical name", |schema| {
            schema.update_property(
                ObjectRef::Column(column),
                Property::PhysicalName,
                |s| &mut s.columns[column.0].physical_name,
                name,
            )
        })
    }

    pub fn set_column_type(&mut self, column: ColumnId, data_type: DataType) -> Result<()> {
        self.check_column(column)?;
        self.compound("set column type", |schema| {
            schema.update_property(
                ObjectRef::Column(column),
                Property::DataType,
                |s| &mut s.columns[column.0].data_type,
                data_type,
            )
        })
    }

    pub fn set_column_precision(&mut self, column: ColumnId, precision: Option<u32>) -> Result<()> {
        self.check_column(column)?;
        self.compound("set column precision", |schema| {
            schema.update_property(
                ObjectRef::Column(column),
                Property::Precision,
                |s| &mut s.columns[column.0].precision,
                precision,
            )
        })
    }

    pub fn set_column_scale(&mut self, column: ColumnId, scale: Option<u32>) -> Result<()> {
        self.check_column(column)?;
        self.compound("set column scale", |schema| {
            schema.update_property(
                ObjectRef::Column(column),
                Property::Scale,
                |s| &mut s.columns[column.0].scale,
                scale,
            )
        })
    }

    pub fn set_column_nullability(&mut self, column: ColumnId, nullability: Nullability) -> Result<()> {
        self.check_column(column)?;
        self.compound("set column nullability", |schema| {
            schema.update_property(
                ObjectRef::Column(column),
                Property::Nullability,
                |s| &mut s.columns[column.0].nullability,
                nullability,
            )
        })
    }

    pub fn set_column_default(&mut self, column: ColumnId, default: Option<String>) -> Result<()> {
        self.check_column(column)?;
        self.compound("set column default", |schema| {
            schema.update_property(
                ObjectRef::Column(column),
                Property::Default,
                |s| &mut s.columns[column.0].default,
                default,
            )
        })
    }

    pub fn set_column_auto_increment(&mut self, column: ColumnId, auto_increment: bool) -> Result<()> {
        self.check_column(column)?;
        self.compound("set column auto increment", |schema| {
            schema.update_property(
                ObjectRef::Column(column),
                Property::AutoIncrement,
                |s| &mut s.columns[column.0].auto_increment,
                auto_increment,
            )
        })
    }

    pub fn set_column_sequence_name(&mut self, column: ColumnId, sequence: Option<String>) -> Result<()> {
        self.check_column(column)?;
        self.compound("set column sequence", |schema| {
            schema.update_property(
                ObjectRef::Column(column),
                Property::SequenceName,
                |s| &mut s.columns[column.0].sequence_name,
                sequence,
            )
        })
    }

    pub fn set_column_remarks(&mut self, column: ColumnId, remarks: Option<String>) -> Result<()> {
        self.check_column(column)?;
        self.compound("set column remarks", |schema| {
            schema.update_property(
                ObjectRef::Column(column),
                Property::Remarks,
                |s| &mut s.columns[column.0].remarks,
                remarks,
            )
        })
    }

    /// Remove `table` from the schema along with every relationship it takes
    /// part in. Foreign key columns in surviving child tables are released.
    pub fn remove_table(&mut self, table: TableId) -> Result<()> {
        let name = self.check_table(table)?.name.clone();
        self.compound(&format!("remove table {name}"), |schema| {
            let Some(position) = schema.table_order.iter().position(|id| *id == table) else {
                return Err(Error::UnknownObject(format!("{table:?}")));
            };
            schema.table_order.remove(position);
            schema.tables[table.0].attached = false;
            let event = schema.emit(ChangeEvent::ChildRemoved {
                parent: ObjectRef::Schema,
                child: ObjectRef::Table(table),
                index: position,
            });
            debug!(table = %name, "table removed");
            schema.react(&event)
        })
    }

    pub fn rename_table(&mut self, table: TableId, name: impl Into<String>) -> Result<()> {
        self.check_table(table)?;
        let name = name.into();
        self.compound("rename table", |schema| {
            schema.update_property(
                ObjectRef::Table(table),
                Property::Name,
                |s| &mut s.tables[table.0].name,
                name,
            )
        })
    }

    pub fn set_table_physical_name(&mut self, table: TableId, name: Option<String>) -> Result<()> {
        self.check_table(table)?;
        self.compound("set table physical name", |schema| {
            schema.update_property(
                ObjectRef::Table(table),
                Property::PhysicalName,
                |s| &mut s.tables[table.0].physical_name,
                name,
            )
        })
    }

    pub fn set_table_remarks(&mut self, table: TableId, remarks: Option<String>) -> Result<()> {
        self.check_table(table)?;
        self.compound("set table remarks", |schema| {
            schema.update_property(
                ObjectRef::Table(table),
                Property::Remarks,
                |s| &mut s.tables[table.0].remarks,
                remarks,
            )
        })
    }

    /// Copy every column of `source` into `dest` starting at `position`.
    /// Copies are renamed when `dest` already uses the name and join the
    /// primary key when they land inside it.
    pub fn inherit_columns(
        &mut self,
        dest: TableId,
        source: TableId,
        position: usize,
    ) -> Result<Vec<ColumnId>> {
        let source_name = self.check_table(source)?.name.clone();
        let (dest_name, len) = {
            let t = self.check_table(dest)?;
            (t.name.clone(), t.columns.len())
        };
        if position > len {
            return Err(Error::InvalidSchema(format!(
                "column position {position} is out of range for {dest_name}"
            )));
        }
        let originals = self.tables[source.0].columns.clone();
        self.compound(&format!("inherit {source_name} into {dest_name}"), |schema| {
            let mut copies = Vec::with_capacity(originals.len());
            for (offset, original) in originals.into_iter().enumerate() {
                let name = schema.unique_column_name(dest, &schema.columns[original.0].name);
                let id = schema.next_column_id();
                let copy = schema.columns[original.0].derive(id, name);
                schema.push_column(copy);
                schema.add_column(dest, id, position + offset)?;
                copies.push(id);
            }
            Ok(copies)
        })
    }
}
