use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::event::{ChangeEvent, ObjectRef, Property};
use crate::ids::{ColumnId, IndexId, TableId};
use crate::schema::Schema;

/// What an index entry points at.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexTarget {
    Column(ColumnId),
    /// Opaque expression; never allowed in a primary key.
    Expression(String),
}

/// One entry of an index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndexEntry {
    pub target: IndexTarget,
    /// `Some(true)` ascending, `Some(false)` descending, `None` unspecified.
    #[serde(default)]
    pub ascending: Option<bool>,
}

impl IndexEntry {
    pub fn column(column: ColumnId) -> Self {
        Self {
            target: IndexTarget::Column(column),
            ascending: None,
        }
    }

    pub fn expression(expression: impl Into<String>) -> Self {
        Self {
            target: IndexTarget::Expression(expression.into()),
            ascending: None,
        }
    }

    /// Column referenced by the entry, if it is not an expression.
    pub fn column_id(&self) -> Option<ColumnId> {
        match &self.target {
            IndexTarget::Column(column) => Some(*column),
            IndexTarget::Expression(_) => None,
        }
    }
}

/// An index of a table. Every table has exactly one primary key index.
#[derive(Debug, Clone)]
pub struct Index {
    pub(crate) id: IndexId,
    pub(crate) table: Option<TableId>,
    pub(crate) name: String,
    pub(crate) entries: Vec<IndexEntry>,
    pub(crate) unique: bool,
    pub(crate) clustered: bool,
    pub(crate) index_type: Option<String>,
    pub(crate) qualifier: Option<String>,
    pub(crate) primary_key: bool,
}

impl Index {
    pub(crate) fn primary_key(id: IndexId, table: TableId, name: String) -> Self {
        Self {
            id,
            table: Some(table),
            name,
            entries: Vec::new(),
            unique: true,
            clustered: false,
            index_type: None,
            qualifier: None,
            primary_key: true,
        }
    }

    pub fn id(&self) -> IndexId {
        self.id
    }

    /// Owning table, `None` once the index has been removed.
    pub fn table(&self) -> Option<TableId> {
        self.table
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    pub fn is_unique(&self) -> bool {
        self.unique
    }

    pub fn is_clustered(&self) -> bool {
        self.clustered
    }

    pub fn index_type(&self) -> Option<&str> {
        self.index_type.as_deref()
    }

    pub fn qualifier(&self) -> Option<&str> {
        self.qualifier.as_deref()
    }

    pub fn is_primary_key(&self) -> bool {
        self.primary_key
    }

    pub fn columns(&self) -> impl Iterator<Item = ColumnId> + '_ {
        self.entries.iter().filter_map(IndexEntry::column_id)
    }
}

/// Index entry by column name, as written in fixtures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexEntryDef {
    Column(String),
    Expression(String),
}

/// Definition of a secondary index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDef {
    pub name: String,
    pub entries: Vec<IndexEntryDef>,
    #[serde(default)]
    pub unique: bool,
    #[serde(default)]
    pub clustered: bool,
    #[serde(default)]
    pub index_type: Option<String>,
    #[serde(default)]
    pub qualifier: Option<String>,
}

impl IndexDef {
    pub fn new<I, S>(name: impl Into<String>, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            entries: columns
                .into_iter()
                .map(|column| IndexEntryDef::Column(column.into()))
                .collect(),
            unique: false,
            clustered: false,
            index_type: None,
            qualifier: None,
        }
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }
}

impl Schema {
    /// Add a secondary index to `table`. Column entries are resolved by name.
    pub fn create_index(&mut self, table: TableId, def: IndexDef) -> Result<IndexId> {
        let table_name = self.check_table(table)?.name.clone();
        if def.entries.is_empty() {
            return Err(Error::InvalidSchema(format!(
                "index {} on {table_name} has no entries",
                def.name
            )));
        }
        let mut entries = Vec::with_capacity(def.entries.len());
        for entry in &def.entries {
            entries.push(match entry {
                IndexEntryDef::Column(name) => {
                    let column = self.column_by_name(table, name).ok_or_else(|| {
                        Error::ColumnNotInTable {
                            column: name.clone(),
                            table: table_name.clone(),
                        }
                    })?;
                    IndexEntry::column(column.id)
                }
                IndexEntryDef::Expression(expr) => IndexEntry::expression(expr.clone()),
            });
        }

        self.compound(&format!("create index {}", def.name), |schema| {
            let id = IndexId(schema.indices.len());
            schema.indices.push(Index {
                id,
                table: Some(table),
                name: def.name,
                entries: Vec::new(),
                unique: def.unique,
                clustered: def.clustered,
                index_type: def.index_type,
                qualifier: def.qualifier,
                primary_key: false,
            });
            let position = schema.tables[table.0].indices.len();
            schema.tables[table.0].indices.push(id);
            let event = schema.emit(ChangeEvent::ChildAdded {
                parent: ObjectRef::Table(table),
                child: ObjectRef::Index(id),
                index: position,
            });
            schema.react(&event)?;
            for (position, entry) in entries.into_iter().enumerate() {
                let event = schema.insert_entry_raw(id, entry, position);
                schema.react(&event)?;
            }
            Ok(id)
        })
    }

    /// Add an entry to an index.
    ///
    /// On the primary key index a column entry promotes that column into the
    /// key at `position` (default: end of the key), and an expression entry is
    /// rejected with [`Error::InvalidPrimaryKey`].
    pub fn add_index_entry(
        &mut self,
        index: IndexId,
        entry: IndexEntry,
        position: Option<usize>,
    ) -> Result<()> {
        let (table, primary_key, len) = {
            let index = self.check_index(index)?;
            (index.table, index.primary_key, index.entries.len())
        };
        let Some(table) = table else {
            return Err(Error::UnknownObject(format!("{index:?}")));
        };
        let position = position.unwrap_or(len);
        if position > len {
            return Err(Error::InvalidSchema(format!(
                "entry position {position} is out of range for {}",
                self.indices[index.0].name
            )));
        }

        match entry.column_id() {
            None if primary_key => Err(Error::InvalidPrimaryKey(format!(
                "expression entries cannot be part of the primary key of {}",
                self.tables[table.0].name
            ))),
            Some(column) if primary_key => {
                self.check_member(table, column)?;
                if self.pk_position(table, column).is_some() {
                    return Ok(());
                }
                self.compound("add primary key column", |schema| {
                    schema.promote(table, column, position)
                })
            }
            column => {
                if let Some(column) = column {
                    self.check_member(table, column)?;
                }
                self.compound("add index entry", |schema| {
                    let event = schema.insert_entry_raw(index, entry, position);
                    schema.react(&event)
                })
            }
        }
    }

    /// Remove the entry at `position`. A secondary index left empty is
    /// removed from its table; on the primary key index the column is demoted.
    pub fn remove_index_entry(&mut self, index: IndexId, position: usize) -> Result<()> {
        let (table, primary_key, entry) = {
            let idx = self.check_index(index)?;
            let entry = idx.entries.get(position).cloned().ok_or_else(|| {
                Error::InvalidSchema(format!(
                    "entry position {position} is out of range for {}",
                    idx.name
                ))
            })?;
            (idx.table, idx.primary_key, entry)
        };
        let Some(table) = table else {
            return Err(Error::UnknownObject(format!("{index:?}")));
        };

        self.compound("remove index entry", |schema| {
            match (primary_key, entry.column_id()) {
                (true, Some(column)) => schema.demote(table, column),
                _ => {
                    let event = schema.remove_entry_raw(index, position);
                    schema.react(&event)?;
                    schema.drop_if_empty(index)
                }
            }
        })
    }

    /// Remove a secondary index from its table.
    pub fn remove_index(&mut self, index: IndexId) -> Result<()> {
        if self.check_index(index)?.primary_key {
            return Err(Error::InvalidPrimaryKey(
                "the primary key index cannot be removed".to_string(),
            ));
        }
        let Some(table) = self.indices[index.0].table else {
            return Err(Error::UnknownObject(format!("{index:?}")));
        };
        self.compound("remove index", |schema| {
            let event = schema.remove_index_raw(table, index);
            schema.react(&event)
        })
    }

    /// Make `index` mirror `source`: same entries in the same order and the
    /// same properties (the name is kept). Columns of another table are
    /// resolved by name in this index's table.
    pub fn update_to_match(&mut self, index: IndexId, source: IndexId) -> Result<()> {
        let (table, primary_key) = {
            let idx = self.check_index(index)?;
            (idx.table, idx.primary_key)
        };
        let Some(table) = table else {
            return Err(Error::UnknownObject(format!("{index:?}")));
        };
        let source_index = self
            .get_index(source)
            .ok_or_else(|| Error::UnknownObject(format!("{source:?}")))?
            .clone();

        let mut entries = Vec::with_capacity(source_index.entries.len());
        for entry in &source_index.entries {
            let target = match &entry.target {
                IndexTarget::Column(column) => IndexTarget::Column(self.resolve_column(table, *column)?),
                IndexTarget::Expression(expr) if primary_key => {
                    return Err(Error::InvalidPrimaryKey(format!(
                        "expression '{expr}' cannot be part of the primary key of {}",
                        self.tables[table.0].name
                    )));
                }
                IndexTarget::Expression(expr) => IndexTarget::Expression(expr.clone()),
            };
            entries.push(IndexEntry {
                target,
                ascending: entry.ascending,
            });
        }

        self.compound("update index to match", |schema| {
            schema.update_property(
                ObjectRef::Index(index),
                Property::Unique,
                |s| &mut s.indices[index.0].unique,
                source_index.unique,
            )?;
            schema.update_property(
                ObjectRef::Index(index),
                Property::Clustered,
                |s| &mut s.indices[index.0].clustered,
                source_index.clustered,
            )?;
            schema.update_property(
                ObjectRef::Index(index),
                Property::IndexType,
                |s| &mut s.indices[index.0].index_type,
                source_index.index_type.clone(),
            )?;
            schema.update_property(
                ObjectRef::Index(index),
                Property::Qualifier,
                |s| &mut s.indices[index.0].qualifier,
                source_index.qualifier.clone(),
            )?;
            if primary_key {
                let columns: Vec<ColumnId> =
                    entries.iter().filter_map(IndexEntry::column_id).collect();
                schema.reorganize_primary_key(table, &columns)
            } else {
                schema.replace_entries(index, entries)
            }
        })
    }

    /// Replace the entries of `index` with `columns`, in order. Every column
    /// must belong to the index's table.
    pub fn make_columns_like(&mut self, index: IndexId, columns: &[ColumnId]) -> Result<()> {
        let (table, primary_key) = {
            let idx = self.check_index(index)?;
            (idx.table, idx.primary_key)
        };
        let Some(table) = table else {
            return Err(Error::UnknownObject(format!("{index:?}")));
        };
        for (i, column) in columns.iter().enumerate() {
            self.check_member(table, *column)?;
            if columns[..i].contains(column) {
                let message = format!("duplicate column {}", self.qualified_name(*column));
                return Err(if primary_key {
                    Error::InvalidPrimaryKey(message)
                } else {
                    Error::InvalidSchema(message)
                });
            }
        }

        self.compound("make index columns like", |schema| {
            if primary_key {
                schema.reorganize_primary_key(table, columns)
            } else {
                let entries = columns.iter().copied().map(IndexEntry::column).collect();
                schema.replace_entries(index, entries)
            }
        })
    }

    pub fn set_index_name(&mut self, index: IndexId, name: impl Into<String>) -> Result<()> {
        self.check_index(index)?;
        let name = name.into();
        self.compound("rename index", |schema| {
            schema.update_property(
                ObjectRef::Index(index),
                Property::Name,
                |s| &mut s.indices[index.0].name,
                name,
            )
        })
    }

    pub fn set_index_unique(&mut self, index: IndexId, unique: bool) -> Result<()> {
        self.check_index(index)?;
        self.compound("set index uniqueness", |schema| {
            schema.update_property(
                ObjectRef::Index(index),
                Property::Unique,
                |s| &mut s.indices[index.0].unique,
                unique,
            )
        })
    }

    pub fn set_index_clustered(&mut self, index: IndexId, clustered: bool) -> Result<()> {
        self.check_index(index)?;
        self.compound("set index clustering", |schema| {
            schema.update_property(
                ObjectRef::Index(index),
                Property::Clustered,
                |s| &mut s.indices[index.0].clustered,
                clustered,
            )
        })
    }

    pub fn set_index_type(&mut self, index: IndexId, index_type: Option<String>) -> Result<()> {
        self.check_index(index)?;
        self.compound("set index type", |schema| {
            schema.update_property(
                ObjectRef::Index(index),
                Property::IndexType,
                |s| &mut s.indices[index.0].index_type,
                index_type,
            )
        })
    }

    pub fn set_index_qualifier(&mut self, index: IndexId, qualifier: Option<String>) -> Result<()> {
        self.check_index(index)?;
        self.compound("set index qualifier", |schema| {
            schema.update_property(
                ObjectRef::Index(index),
                Property::Qualifier,
                |s| &mut s.indices[index.0].qualifier,
                qualifier,
            )
        })
    }

    /// Drop every secondary index entry that references `column`, removing
    /// indices that end up empty.
    pub(crate) fn drop_column_from_indices(&mut self, table: TableId, column: ColumnId) -> Result<()> {
        let indices = self.tables[table.0].indices.clone();
        for index in indices {
            let positions: Vec<usize> = self.indices[index.0]
                .entries
                .iter()
                .enumerate()
                .filter(|(_, entry)| entry.column_id() == Some(column))
                .map(|(position, _)| position)
                .collect();
            if positions.is_empty() {
                continue;
            }
            for position in positions.into_iter().rev() {
                let event = self.remove_entry_raw(index, position);
                self.react(&event)?;
            }
            self.drop_if_empty(index)?;
        }
        Ok(())
    }

    pub(crate) fn remove_index_raw(&mut self, table: TableId, index: IndexId) -> ChangeEvent {
        self.indices[index.0].table = None;
        let indices = &mut self.tables[table.0].indices;
        let position = indices.iter().position(|id| *id == index).unwrap_or(indices.len());
        if position < indices.len() {
            indices.remove(position);
        }
        self.emit(ChangeEvent::ChildRemoved {
            parent: ObjectRef::Table(table),
            child: ObjectRef::Index(index),
            index: position,
        })
    }

    fn drop_if_empty(&mut self, index: IndexId) -> Result<()> {
        let idx = &self.indices[index.0];
        let Some(table) = idx.table else {
            return Ok(());
        };
        if idx.primary_key || !idx.entries.is_empty() {
            return Ok(());
        }
        let event = self.remove_index_raw(table, index);
        self.react(&event)
    }

    fn replace_entries(&mut self, index: IndexId, entries: Vec<IndexEntry>) -> Result<()> {
        while let Some(last) = self.indices[index.0].entries.len().checked_sub(1) {
            let event = self.remove_entry_raw(index, last);
            self.react(&event)?;
        }
        for (position, entry) in entries.into_iter().enumerate() {
            let event = self.insert_entry_raw(index, entry, position);
            self.react(&event)?;
        }
        self.drop_if_empty(index)
    }

    /// Map a column onto `table`: itself if it already belongs there,
    /// otherwise the table's column with the same name.
    fn resolve_column(&self, table: TableId, column: ColumnId) -> Result<ColumnId> {
        let col = self.check_column(column)?;
        if col.table == Some(table) {
            return Ok(column);
        }
        self.column_by_name(table, &col.name)
            .map(|found| found.id)
            .ok_or_else(|| Error::ColumnNotInTable {
                column: self.qualified_name(column),
                table: self.tables[table.0].name.clone(),
            })
    }
}
