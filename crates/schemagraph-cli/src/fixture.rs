//! TOML fixtures: a schema model plus an optional script of edits.
//!
//! ```toml
//! [settings]
//! hijack_columns = false
//!
//! [[tables]]
//! name = "parent"
//! primary_key = [{ column = "id" }]
//! columns = [{ name = "id", data_type = "integer" }]
//!
//! [[relationships]]
//! parent = "parent"
//! child = "child"
//! identifying = true
//! auto_map = true
//!
//! [[edits]]
//! op = "rename_column"
//! table = "parent"
//! column = "id"
//! name = "parent_id"
//! ```

use schemagraph_core::{
    ColumnDef, ColumnId, DataType, EngineSettings, IndexDef, Nullability, RelationshipId,
    RelationshipOptions, Schema, TableBuilder, TableId,
};
use schemagraph_core::naming::names_match;
use serde::Deserialize;
use tracing::{debug, info};

use crate::CliError;

/// A schema model as written in a fixture file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Fixture {
    /// Overrides the engine settings given on the command line.
    #[serde(default)]
    pub settings: Option<EngineSettings>,
    #[serde(default)]
    pub tables: Vec<TableBuilder>,
    #[serde(default)]
    pub relationships: Vec<RelationshipDef>,
    #[serde(default)]
    pub edits: Vec<Edit>,
}

/// Edits applied after the model is loaded.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Script {
    #[serde(default)]
    pub edits: Vec<Edit>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RelationshipDef {
    pub parent: String,
    pub child: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub identifying: Option<bool>,
    /// Map every parent key column, generating child columns as needed.
    #[serde(default)]
    pub auto_map: bool,
    #[serde(default)]
    pub mappings: Vec<MappingDef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MappingDef {
    pub parent: String,
    pub child: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Edit {
    AddTable {
        table: TableBuilder,
    },
    RemoveTable {
        table: String,
    },
    RenameTable {
        table: String,
        name: String,
    },
    AddColumn {
        table: String,
        column: ColumnDef,
        position: Option<usize>,
    },
    RemoveColumn {
        table: String,
        column: String,
    },
    MoveColumn {
        table: String,
        from: usize,
        to: usize,
    },
    AddToPk {
        table: String,
        column: String,
    },
    MoveAfterPk {
        table: String,
        column: String,
    },
    RenameColumn {
        table: String,
        column: String,
        name: String,
    },
    SetType {
        table: String,
        column: String,
        data_type: DataType,
    },
    SetPrecision {
        table: String,
        column: String,
        precision: Option<u32>,
    },
    SetScale {
        table: String,
        column: String,
        scale: Option<u32>,
    },
    SetNullability {
        table: String,
        column: String,
        nullability: Nullability,
    },
    CreateIndex {
        table: String,
        index: IndexDef,
    },
    RemoveIndex {
        table: String,
        index: String,
    },
    AttachRelationship {
        relationship: RelationshipDef,
    },
    RemoveRelationship {
        relationship: String,
    },
    SetIdentifying {
        relationship: String,
        identifying: bool,
    },
}

impl Fixture {
    pub fn from_toml(content: &str) -> Result<Self, CliError> {
        Ok(toml::from_str(content)?)
    }

    /// Build the model with cascades paused, restoring the configured
    /// setting afterwards.
    pub fn load(&self, schema: &mut Schema) -> Result<(), CliError> {
        let cascade_enabled = schema.settings().cascade_enabled;
        schema.set_cascade_enabled(false);
        let result = self.load_model(schema);
        schema.set_cascade_enabled(cascade_enabled);
        result
    }

    fn load_model(&self, schema: &mut Schema) -> Result<(), CliError> {
        for table in &self.tables {
            let id = table.clone().build(schema)?;
            debug!(table = %schema.table(id).name(), "table loaded");
        }
        for relationship in &self.relationships {
            attach(schema, relationship)?;
        }
        info!(
            tables = self.tables.len(),
            relationships = self.relationships.len(),
            "fixture loaded"
        );
        Ok(())
    }
}

impl Script {
    pub fn from_toml(content: &str) -> Result<Self, CliError> {
        Ok(toml::from_str(content)?)
    }
}

fn attach(schema: &mut Schema, def: &RelationshipDef) -> Result<RelationshipId, CliError> {
    let parent = table_id(schema, &def.parent)?;
    let child = table_id(schema, &def.child)?;
    let options = RelationshipOptions {
        name: def.name.clone(),
        identifying: def.identifying,
        ..RelationshipOptions::default()
    };
    let relationship = schema.attach_relationship(parent, child, options, def.auto_map)?;
    for mapping in &def.mappings {
        let parent_column = column_id(schema, parent, &mapping.parent)?;
        let child_column = column_id(schema, child, &mapping.child)?;
        schema.add_mapping(relationship, parent_column, child_column)?;
    }
    Ok(relationship)
}

fn table_id(schema: &Schema, name: &str) -> Result<TableId, CliError> {
    schema
        .table_by_name(name)
        .map(|table| table.id())
        .ok_or_else(|| CliError::InvalidFixture(format!("unknown table: {name}")))
}

fn column_id(schema: &Schema, table: TableId, name: &str) -> Result<ColumnId, CliError> {
    schema
        .column_by_name(table, name)
        .map(|column| column.id())
        .ok_or_else(|| {
            CliError::InvalidFixture(format!(
                "unknown column: {}.{name}",
                schema.table(table).name()
            ))
        })
}

fn relationship_id(schema: &Schema, name: &str) -> Result<RelationshipId, CliError> {
    schema
        .relationships()
        .find(|rel| names_match(rel.name(), name))
        .map(|rel| rel.id())
        .ok_or_else(|| CliError::InvalidFixture(format!("unknown relationship: {name}")))
}

/// Resolve the names in `edit` and apply it to `schema`.
pub fn apply_edit(schema: &mut Schema, edit: &Edit) -> Result<(), CliError> {
    match edit {
        Edit::AddTable { table } => {
            table.clone().build(schema)?;
        }
        Edit::RemoveTable { table } => {
            let table = table_id(schema, table)?;
            schema.remove_table(table)?;
        }
        Edit::RenameTable { table, name } => {
            let table = table_id(schema, table)?;
            schema.rename_table(table, name.clone())?;
        }
        Edit::AddColumn {
            table,
            column,
            position,
        } => {
            let table = table_id(schema, table)?;
            let position = position.unwrap_or_else(|| schema.table(table).columns().len());
            let column = schema.create_column(column.clone());
            schema.add_column(table, column, position)?;
        }
        Edit::RemoveColumn { table, column } => {
            let table = table_id(schema, table)?;
            let column = column_id(schema, table, column)?;
            schema.remove_column(table, column)?;
        }
        Edit::MoveColumn { table, from, to } => {
            let table = table_id(schema, table)?;
            schema.move_column(table, *from, *to)?;
        }
        Edit::AddToPk { table, column } => {
            let table = table_id(schema, table)?;
            let column = column_id(schema, table, column)?;
            schema.add_to_pk(table, column)?;
        }
        Edit::MoveAfterPk { table, column } => {
            let table = table_id(schema, table)?;
            let column = column_id(schema, table, column)?;
            schema.move_after_pk(table, column)?;
        }
        Edit::RenameColumn {
            table,
            column,
            name,
        } => {
            let table = table_id(schema, table)?;
            let column = column_id(schema, table, column)?;
            schema.set_column_name(column, name.clone())?;
        }
        Edit::SetType {
            table,
            column,
            data_type,
        } => {
            let table = table_id(schema, table)?;
            let column = column_id(schema, table, column)?;
            schema.set_column_type(column, data_type.clone())?;
        }
        Edit::SetPrecision {
            table,
            column,
            precision,
        } => {
            let table = table_id(schema, table)?;
            let column = column_id(schema, table, column)?;
            schema.set_column_precision(column, *precision)?;
        }
        Edit::SetScale {
            table,
            column,
            scale,
        } => {
            let table = table_id(schema, table)?;
            let column = column_id(schema, table, column)?;
            schema.set_column_scale(column, *scale)?;
        }
        Edit::SetNullability {
            table,
            column,
            nullability,
        } => {
            let table = table_id(schema, table)?;
            let column = column_id(schema, table, column)?;
            schema.set_column_nullability(column, *nullability)?;
        }
        Edit::CreateIndex { table, index } => {
            let table = table_id(schema, table)?;
            schema.create_index(table, index.clone())?;
        }
        Edit::RemoveIndex { table, index } => {
            let table = table_id(schema, table)?;
            let found = schema
                .table(table)
                .indices()
                .iter()
                .copied()
                .find(|id| names_match(schema.index(*id).name(), index))
                .ok_or_else(|| CliError::InvalidFixture(format!("unknown index: {index}")))?;
            schema.remove_index(found)?;
        }
        Edit::AttachRelationship { relationship } => {
            attach(schema, relationship)?;
        }
        Edit::RemoveRelationship { relationship } => {
            let relationship = relationship_id(schema, relationship)?;
            schema.remove_relationship(relationship)?;
        }
        Edit::SetIdentifying {
            relationship,
            identifying,
        } => {
            let relationship = relationship_id(schema, relationship)?;
            schema.set_identifying(relationship, *identifying)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const WORKED_EXAMPLE: &str = r#"
[[tables]]
name = "parent"
primary_key = [{ column = "pk1" }, { column = "pk2" }]
columns = [
  { name = "pk1", data_type = "integer" },
  { name = "pk2", data_type = "integer" },
  { name = "attr", data_type = "varchar" },
]

[[tables]]
name = "child"
columns = [{ name = "child_attr", data_type = "varchar" }]

[[relationships]]
parent = "parent"
child = "child"
identifying = true
auto_map = true

[[edits]]
op = "add_column"
table = "parent"
column = { name = "pk3", data_type = "integer" }

[[edits]]
op = "add_to_pk"
table = "parent"
column = "pk3"
"#;

    fn column_names(schema: &Schema, table: &str) -> Vec<String> {
        let snapshot = schema.snapshot();
        snapshot
            .table(table)
            .expect("table")
            .column_names()
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn worked_example_fixture_cascades() {
        let fixture = Fixture::from_toml(WORKED_EXAMPLE).expect("parse fixture");
        let mut schema = Schema::new();
        fixture.load(&mut schema).expect("load");
        assert!(schema.settings().cascade_enabled);
        assert_eq!(column_names(&schema, "child"), ["pk1", "pk2", "child_attr"]);

        for edit in &fixture.edits {
            apply_edit(&mut schema, edit).expect("apply edit");
        }

        assert_eq!(column_names(&schema, "parent"), ["pk1", "pk2", "pk3", "attr"]);
        assert_eq!(column_names(&schema, "child"), ["pk1", "pk2", "pk3", "child_attr"]);
        let snapshot = schema.snapshot();
        let child = snapshot.table("child").expect("child");
        assert_eq!(child.primary_key, ["pk1", "pk2", "pk3"]);
        assert_eq!(snapshot.relationships[0].mappings.len(), 3);
    }

    #[test]
    fn explicit_mappings_are_loaded() {
        let fixture = Fixture::from_toml(
            r#"
[[tables]]
name = "customer"
primary_key = [{ column = "id" }]
columns = [{ name = "id", data_type = "integer" }]

[[tables]]
name = "orders"
columns = [{ name = "customer_ref", data_type = "integer" }]

[[relationships]]
parent = "customer"
child = "orders"
name = "orders_customer_fk"
mappings = [{ parent = "id", child = "customer_ref" }]
"#,
        )
        .expect("parse fixture");
        let mut schema = Schema::new();
        fixture.load(&mut schema).expect("load");

        let snapshot = schema.snapshot();
        let rel = snapshot.relationship("orders_customer_fk").expect("relationship");
        assert_eq!(rel.mappings[0].child_column, "customer_ref");
        assert_eq!(column_names(&schema, "orders"), ["customer_ref"]);
    }

    #[test]
    fn fixture_settings_are_partial() {
        let fixture = Fixture::from_toml(
            r#"
[settings]
name_separator = "__"
"#,
        )
        .expect("parse fixture");
        let settings = fixture.settings.expect("settings");
        assert_eq!(settings.name_separator, "__");
        assert!(settings.hijack_columns);
    }

    #[test]
    fn unknown_names_are_reported() {
        let script = Script::from_toml(
            r#"
[[edits]]
op = "remove_column"
table = "missing"
column = "id"
"#,
        )
        .expect("parse script");
        let mut schema = Schema::new();
        let err = apply_edit(&mut schema, &script.edits[0]).expect_err("unknown table");
        assert!(matches!(err, CliError::InvalidFixture(_)));
    }
}
