use serde::{Deserialize, Serialize};

use crate::ids::{ColumnId, TableId};
use crate::types::{DataType, Nullability};

/// A named, typed attribute of a table.
///
/// A column sits in at most one table at a time. Its reference count tracks
/// how many structural slots currently need it: the table slot itself plus
/// every mapping onto the column that it did not create. The column is only
/// detached from its table when the count drops to zero.
#[derive(Debug, Clone)]
pub struct Column {
    pub(crate) id: ColumnId,
    pub(crate) table: Option<TableId>,
    pub(crate) name: String,
    pub(crate) physical_name: Option<String>,
    pub(crate) data_type: DataType,
    pub(crate) precision: Option<u32>,
    pub(crate) scale: Option<u32>,
    pub(crate) nullability: Nullability,
    pub(crate) default: Option<String>,
    pub(crate) auto_increment: bool,
    pub(crate) sequence_name: Option<String>,
    pub(crate) remarks: Option<String>,
    pub(crate) reference_count: usize,
    pub(crate) source_column: Option<ColumnId>,
}

impl Column {
    pub(crate) fn from_def(id: ColumnId, def: ColumnDef) -> Self {
        Self {
            id,
            table: None,
            name: def.name,
            physical_name: def.physical_name,
            data_type: def.data_type,
            precision: def.precision,
            scale: def.scale,
            nullability: def.nullability,
            default: def.default,
            auto_increment: def.auto_increment,
            sequence_name: def.sequence_name,
            remarks: def.remarks,
            reference_count: 0,
            source_column: None,
        }
    }

    /// Copy of this column's type information under a new identity, used for
    /// derived foreign-key and inherited columns.
    pub(crate) fn derive(&self, id: ColumnId, name: String) -> Self {
        Self {
            id,
            table: None,
            name,
            physical_name: None,
            data_type: self.data_type.clone(),
            precision: self.precision,
            scale: self.scale,
            nullability: self.nullability,
            default: None,
            auto_increment: false,
            sequence_name: None,
            remarks: None,
            reference_count: 0,
            source_column: Some(self.id),
        }
    }

    pub fn id(&self) -> ColumnId {
        self.id
    }

    /// Table currently holding the column, `None` once detached.
    pub fn table(&self) -> Option<TableId> {
        self.table
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn physical_name(&self) -> Option<&str> {
        self.physical_name.as_deref()
    }

    pub fn data_type(&self) -> &DataType {
        &self.data_type
    }

    pub fn precision(&self) -> Option<u32> {
        self.precision
    }

    pub fn scale(&self) -> Option<u32> {
        self.scale
    }

    pub fn nullability(&self) -> Nullability {
        self.nullability
    }

    pub fn default_value(&self) -> Option<&str> {
        self.default.as_deref()
    }

    pub fn is_auto_increment(&self) -> bool {
        self.auto_increment
    }

    pub fn sequence_name(&self) -> Option<&str> {
        self.sequence_name.as_deref()
    }

    pub fn remarks(&self) -> Option<&str> {
        self.remarks.as_deref()
    }

    /// Number of structural slots pointing at this column.
    pub fn reference_count(&self) -> usize {
        self.reference_count
    }

    /// Column this one was derived from, if the engine created it.
    pub fn source_column(&self) -> Option<ColumnId> {
        self.source_column
    }
}

/// Definition used to create columns in bulk or from fixtures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    pub data_type: DataType,
    #[serde(default)]
    pub physical_name: Option<String>,
    #[serde(default)]
    pub precision: Option<u32>,
    #[serde(default)]
    pub scale: Option<u32>,
    #[serde(default)]
    pub nullability: Nullability,
    #[serde(default)]
    pub default: Option<String>,
    #[serde(default)]
    pub auto_increment: bool,
    #[serde(default)]
    pub sequence_name: Option<String>,
    #[serde(default)]
    pub remarks: Option<String>,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            physical_name: None,
            precision: None,
            scale: None,
            nullability: Nullability::default(),
            default: None,
            auto_increment: false,
            sequence_name: None,
            remarks: None,
        }
    }

    pub fn precision(mut self, precision: u32) -> Self {
        self.precision = Some(precision);
        self
    }

    pub fn scale(mut self, scale: u32) -> Self {
        self.scale = Some(scale);
        self
    }

    pub fn not_null(mut self) -> Self {
        self.nullability = Nullability::NotNull;
        self
    }

    pub fn default_value(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self
    }
}
