use serde::{Deserialize, Serialize};

use crate::column::ColumnDef;
use crate::error::{Error, Result};
use crate::ids::{ColumnId, IndexId, RelationshipId, TableId};
use crate::index::{IndexDef, IndexEntry, IndexEntryDef};
use crate::naming::names_match;
use crate::schema::Schema;

/// A table of the schema model.
///
/// The primary key is positional: it is always the first `k` columns of
/// [`Table::columns`], where `k` is the number of entries of the primary key
/// index.
#[derive(Debug, Clone)]
pub struct Table {
    pub(crate) id: TableId,
    pub(crate) attached: bool,
    pub(crate) name: String,
    pub(crate) physical_name: Option<String>,
    pub(crate) remarks: Option<String>,
    pub(crate) columns: Vec<ColumnId>,
    pub(crate) primary_key: IndexId,
    pub(crate) indices: Vec<IndexId>,
    pub(crate) exported: Vec<RelationshipId>,
    pub(crate) imported: Vec<RelationshipId>,
}

impl Table {
    pub(crate) fn new(id: TableId, name: String, primary_key: IndexId) -> Self {
        Self {
            id,
            attached: false,
            name,
            physical_name: None,
            remarks: None,
            columns: Vec::new(),
            primary_key,
            indices: Vec::new(),
            exported: Vec::new(),
            imported: Vec::new(),
        }
    }

    pub fn id(&self) -> TableId {
        self.id
    }

    /// False once the table has been removed from its schema.
    pub fn is_attached(&self) -> bool {
        self.attached
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn physical_name(&self) -> Option<&str> {
        self.physical_name.as_deref()
    }

    pub fn remarks(&self) -> Option<&str> {
        self.remarks.as_deref()
    }

    /// Columns in table order, primary key columns first.
    pub fn columns(&self) -> &[ColumnId] {
        &self.columns
    }

    pub fn primary_key(&self) -> IndexId {
        self.primary_key
    }

    /// Secondary indices, excluding the primary key index.
    pub fn indices(&self) -> &[IndexId] {
        &self.indices
    }

    /// Relationships where this table is the parent.
    pub fn exported(&self) -> &[RelationshipId] {
        &self.exported
    }

    /// Relationships where this table is the child.
    pub fn imported(&self) -> &[RelationshipId] {
        &self.imported
    }

    pub fn position_of(&self, column: ColumnId) -> Option<usize> {
        self.columns.iter().position(|id| *id == column)
    }
}

/// Bulk constructor for a table, used by schema loaders.
///
/// Primary key columns are moved to the front in key order; the remaining
/// columns keep their declared order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableBuilder {
    pub name: String,
    #[serde(default)]
    pub physical_name: Option<String>,
    #[serde(default)]
    pub remarks: Option<String>,
    #[serde(default)]
    pub columns: Vec<ColumnDef>,
    #[serde(default)]
    pub primary_key: Vec<IndexEntryDef>,
    #[serde(default)]
    pub indices: Vec<IndexDef>,
}

impl TableBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn column(mut self, column: ColumnDef) -> Self {
        self.columns.push(column);
        self
    }

    pub fn primary_key<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.primary_key = columns
            .into_iter()
            .map(|name| IndexEntryDef::Column(name.into()))
            .collect();
        self
    }

    pub fn primary_key_entries(mut self, entries: Vec<IndexEntryDef>) -> Self {
        self.primary_key = entries;
        self
    }

    pub fn index(mut self, index: IndexDef) -> Self {
        self.indices.push(index);
        self
    }

    /// Validate the definition and add the table to `schema`.
    ///
    /// Fails with [`Error::InvalidPrimaryKey`] if the primary key names an
    /// expression, an unknown column, or the same column twice. Nothing is
    /// added to the schema on failure.
    pub fn build(self, schema: &mut Schema) -> Result<TableId> {
        let mut pk_order = Vec::with_capacity(self.primary_key.len());
        for entry in &self.primary_key {
            match entry {
                IndexEntryDef::Expression(expr) => {
                    return Err(Error::InvalidPrimaryKey(format!(
                        "expression '{expr}' cannot be part of the primary key of {}",
                        self.name
                    )));
                }
                IndexEntryDef::Column(name) => {
                    let position = self
                        .columns
                        .iter()
                        .position(|column| names_match(&column.name, name))
                        .ok_or_else(|| {
                            Error::InvalidPrimaryKey(format!(
                                "primary key column not found: {}.{name}",
                                self.name
                            ))
                        })?;
                    if pk_order.contains(&position) {
                        return Err(Error::InvalidPrimaryKey(format!(
                            "duplicate primary key column: {}.{name}",
                            self.name
                        )));
                    }
                    pk_order.push(position);
                }
            }
        }

        for index in &self.indices {
            if index.entries.is_empty() {
                return Err(Error::InvalidSchema(format!(
                    "index {} on {} has no entries",
                    index.name, self.name
                )));
            }
            for entry in &index.entries {
                if let IndexEntryDef::Column(name) = entry {
                    if !self.columns.iter().any(|column| names_match(&column.name, name)) {
                        return Err(Error::ColumnNotInTable {
                            column: name.clone(),
                            table: self.name.clone(),
                        });
                    }
                }
            }
        }

        let TableBuilder {
            name,
            physical_name,
            remarks,
            columns,
            primary_key: _,
            indices,
        } = self;

        schema.compound(&format!("create table {name}"), |schema| {
            let table = schema.add_table(name)?;
            schema.table_mut(table).physical_name = physical_name;
            schema.table_mut(table).remarks = remarks;

            let mut ordered: Vec<(usize, ColumnDef)> = columns.into_iter().enumerate().collect();
            ordered.sort_by_key(|(position, _)| {
                pk_order
                    .iter()
                    .position(|pk| pk == position)
                    .unwrap_or(pk_order.len() + position)
            });

            let mut ids = Vec::with_capacity(ordered.len());
            for (slot, (_, def)) in ordered.into_iter().enumerate() {
                let column = schema.create_column(def);
                schema.add_column(table, column, slot)?;
                ids.push(column);
            }
            for (slot, column) in ids.iter().take(pk_order.len()).enumerate() {
                let pk = schema.table(table).primary_key;
                let event = schema.insert_entry_raw(pk, IndexEntry::column(*column), slot);
                schema.react(&event)?;
            }

            for index in indices {
                schema.create_index(table, index)?;
            }
            Ok(table)
        })
    }
}
