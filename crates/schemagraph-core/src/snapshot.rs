use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::index::{Index, IndexTarget};
use crate::schema::Schema;
use crate::types::{Cardinality, DataType, Deferrability, FkAction, Nullability};

/// Read-only export of a schema model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SchemaSnapshot {
    /// Contract version for this snapshot format.
    pub snapshot_version: String,
    pub tables: Vec<TableSnapshot>,
    pub relationships: Vec<RelationshipSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TableSnapshot {
    pub name: String,
    pub physical_name: Option<String>,
    pub remarks: Option<String>,
    /// Columns in table order; key columns come first.
    pub columns: Vec<ColumnSnapshot>,
    pub primary_key: Vec<String>,
    pub indices: Vec<IndexSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ColumnSnapshot {
    pub name: String,
    pub physical_name: Option<String>,
    pub data_type: DataType,
    pub precision: Option<u32>,
    pub scale: Option<u32>,
    pub nullability: Nullability,
    pub default: Option<String>,
    pub auto_increment: bool,
    pub primary_key: bool,
    pub reference_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct IndexSnapshot {
    pub name: String,
    pub unique: bool,
    pub clustered: bool,
    pub index_type: Option<String>,
    pub qualifier: Option<String>,
    pub entries: Vec<IndexEntrySnapshot>,
}

/// Exactly one of `column` and `expression` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct IndexEntrySnapshot {
    pub column: Option<String>,
    pub expression: Option<String>,
    pub ascending: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RelationshipSnapshot {
    pub name: String,
    pub parent: String,
    pub child: String,
    pub identifying: bool,
    pub update_rule: FkAction,
    pub delete_rule: FkAction,
    pub deferrability: Deferrability,
    pub parent_cardinality: Cardinality,
    pub child_cardinality: Cardinality,
    pub mappings: Vec<MappingSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MappingSnapshot {
    pub parent_column: String,
    pub child_column: String,
}

impl TableSnapshot {
    pub fn column(&self, name: &str) -> Option<&ColumnSnapshot> {
        self.columns.iter().find(|column| column.name == name)
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|column| column.name.as_str()).collect()
    }
}

impl SchemaSnapshot {
    pub fn table(&self, name: &str) -> Option<&TableSnapshot> {
        self.tables.iter().find(|table| table.name == name)
    }

    pub fn relationship(&self, name: &str) -> Option<&RelationshipSnapshot> {
        self.relationships.iter().find(|rel| rel.name == name)
    }
}

impl Schema {
    /// Export the attached part of the model.
    pub fn snapshot(&self) -> SchemaSnapshot {
        let tables = self
            .tables()
            .map(|table| {
                let columns = self
                    .table_columns(table.id)
                    .map(|column| ColumnSnapshot {
                        name: column.name.clone(),
                        physical_name: column.physical_name.clone(),
                        data_type: column.data_type.clone(),
                        precision: column.precision,
                        scale: column.scale,
                        nullability: column.nullability,
                        default: column.default.clone(),
                        auto_increment: column.auto_increment,
                        primary_key: self.pk_position(table.id, column.id).is_some(),
                        reference_count: column.reference_count,
                    })
                    .collect();
                TableSnapshot {
                    name: table.name.clone(),
                    physical_name: table.physical_name.clone(),
                    remarks: table.remarks.clone(),
                    columns,
                    primary_key: self
                        .primary_key_columns(table.id)
                        .into_iter()
                        .map(|column| self.columns[column.0].name.clone())
                        .collect(),
                    indices: table
                        .indices
                        .iter()
                        .map(|index| self.index_snapshot(&self.indices[index.0]))
                        .collect(),
                }
            })
            .collect();

        let relationships = self
            .relationships()
            .map(|rel| RelationshipSnapshot {
                name: rel.name.clone(),
                parent: self.tables[rel.parent.0].name.clone(),
                child: self.tables[rel.child.0].name.clone(),
                identifying: rel.identifying,
                update_rule: rel.update_rule,
                delete_rule: rel.delete_rule,
                deferrability: rel.deferrability,
                parent_cardinality: rel.parent_cardinality,
                child_cardinality: rel.child_cardinality,
                mappings: rel
                    .mappings
                    .iter()
                    .map(|mapping| MappingSnapshot {
                        parent_column: self.columns[mapping.parent_column.0].name.clone(),
                        child_column: self.columns[mapping.child_column.0].name.clone(),
                    })
                    .collect(),
            })
            .collect();

        SchemaSnapshot {
            snapshot_version: crate::SNAPSHOT_VERSION.to_string(),
            tables,
            relationships,
        }
    }

    fn index_snapshot(&self, index: &Index) -> IndexSnapshot {
        IndexSnapshot {
            name: index.name.clone(),
            unique: index.unique,
            clustered: index.clustered,
            index_type: index.index_type.clone(),
            qualifier: index.qualifier.clone(),
            entries: index
                .entries
                .iter()
                .map(|entry| {
                    let (column, expression) = match &entry.target {
                        IndexTarget::Column(column) => (Some(self.columns[column.0].name.clone()), None),
                        IndexTarget::Expression(expr) => (None, Some(expr.clone())),
                    };
                    IndexEntrySnapshot {
                        column,
                        expression,
                        ascending: entry.ascending,
                    }
                })
                .collect(),
        }
    }
}
