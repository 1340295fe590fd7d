use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::event::{ChangeEvent, ObjectRef, Property};
use crate::ids::{ColumnId, RelationshipId, TableId};
use crate::schema::Schema;
use crate::types::{Cardinality, Deferrability, FkAction};

/// Pairs a parent column with the child column referencing it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColumnMapping {
    pub parent_column: ColumnId,
    pub child_column: ColumnId,
}

/// A foreign key between a parent and a child table.
#[derive(Debug, Clone)]
pub struct Relationship {
    pub(crate) id: RelationshipId,
    pub(crate) attached: bool,
    pub(crate) name: String,
    pub(crate) parent: TableId,
    pub(crate) child: TableId,
    pub(crate) mappings: Vec<ColumnMapping>,
    pub(crate) identifying: bool,
    pub(crate) update_rule: FkAction,
    pub(crate) delete_rule: FkAction,
    pub(crate) deferrability: Deferrability,
    pub(crate) parent_cardinality: Cardinality,
    pub(crate) child_cardinality: Cardinality,
}

impl Relationship {
    pub fn id(&self) -> RelationshipId {
        self.id
    }

    /// False once the relationship has been removed from its tables.
    pub fn is_attached(&self) -> bool {
        self.attached
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> TableId {
        self.parent
    }

    pub fn child(&self) -> TableId {
        self.child
    }

    pub fn is_self_reference(&self) -> bool {
        self.parent == self.child
    }

    /// Mappings in parent primary key order.
    pub fn mappings(&self) -> &[ColumnMapping] {
        &self.mappings
    }

    pub fn is_identifying(&self) -> bool {
        self.identifying
    }

    pub fn update_rule(&self) -> FkAction {
        self.update_rule
    }

    pub fn delete_rule(&self) -> FkAction {
        self.delete_rule
    }

    pub fn deferrability(&self) -> Deferrability {
        self.deferrability
    }

    pub fn parent_cardinality(&self) -> Cardinality {
        self.parent_cardinality
    }

    pub fn child_cardinality(&self) -> Cardinality {
        self.child_cardinality
    }

    pub fn mapping_for_parent(&self, column: ColumnId) -> Option<&ColumnMapping> {
        self.mappings
            .iter()
            .find(|mapping| mapping.parent_column == column)
    }

    pub fn mapping_for_child(&self, column: ColumnId) -> Option<&ColumnMapping> {
        self.mappings
            .iter()
            .find(|mapping| mapping.child_column == column)
    }

    pub(crate) fn parent_mapping_position(&self, column: ColumnId) -> Option<usize> {
        self.mappings
            .iter()
            .position(|mapping| mapping.parent_column == column)
    }
}

/// Options for [`Schema::attach_relationship`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelationshipOptions {
    /// Defaults to `<parent>_<child>_fk`.
    pub name: Option<String>,
    /// Defaults to [`EngineSettings::identifying_by_default`] between two
    /// tables and to `false` for self-references.
    ///
    /// [`EngineSettings::identifying_by_default`]: crate::EngineSettings::identifying_by_default
    pub identifying: Option<bool>,
    pub update_rule: FkAction,
    pub delete_rule: FkAction,
    pub deferrability: Deferrability,
    pub parent_cardinality: Cardinality,
    pub child_cardinality: Cardinality,
}

impl Default for RelationshipOptions {
    fn default() -> Self {
        Self {
            name: None,
            identifying: None,
            update_rule: FkAction::default(),
            delete_rule: FkAction::default(),
            deferrability: Deferrability::default(),
            parent_cardinality: Cardinality::One,
            child_cardinality: Cardinality::ZeroOrMore,
        }
    }
}

impl RelationshipOptions {
    pub fn identifying() -> Self {
        Self {
            identifying: Some(true),
            ..Self::default()
        }
    }

    pub fn non_identifying() -> Self {
        Self {
            identifying: Some(false),
            ..Self::default()
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

impl Schema {
    /// Create a relationship from `parent` to `child`.
    ///
    /// With `auto_map`, every current primary key column of the parent is
    /// mapped to a child column, reusing a compatible existing column where
    /// one exists and generating one otherwise. Both tables must already hold
    /// their columns.
    pub fn attach_relationship(
        &mut self,
        parent: TableId,
        child: TableId,
        options: RelationshipOptions,
        auto_map: bool,
    ) -> Result<RelationshipId> {
        let parent_name = self.check_table(parent)?.name.clone();
        let child_name = self.check_table(child)?.name.clone();
        let identifying = options
            .identifying
            .unwrap_or(parent != child && self.settings.identifying_by_default);
        let name = options
            .name
            .unwrap_or_else(|| format!("{parent_name}_{child_name}_fk"));

        self.compound(&format!("attach relationship {name}"), |schema| {
            let id = RelationshipId(schema.relationships.len());
            schema.relationships.push(Relationship {
                id,
                attached: true,
                name,
                parent,
                child,
                mappings: Vec::new(),
                identifying,
                update_rule: options.update_rule,
                delete_rule: options.delete_rule,
                deferrability: options.deferrability,
                parent_cardinality: options.parent_cardinality,
                child_cardinality: options.child_cardinality,
            });

            let exported = schema.tables[parent.0].exported.len();
            schema.tables[parent.0].exported.push(id);
            let imported = schema.tables[child.0].imported.len();
            schema.tables[child.0].imported.push(id);
            let export_event = schema.emit(ChangeEvent::ChildAdded {
                parent: ObjectRef::Table(parent),
                child: ObjectRef::Relationship(id),
                index: exported,
            });
            let import_event = schema.emit(ChangeEvent::ChildAdded {
                parent: ObjectRef::Table(child),
                child: ObjectRef::Relationship(id),
                index: imported,
            });
            schema.react(&export_event)?;
            schema.react(&import_event)?;

            debug!(
                relationship = %schema.relationships[id.0].name,
                parent = %parent_name,
                child = %child_name,
                identifying,
                auto_map,
                "relationship attached"
            );

            if auto_map {
                // Only the key as it stands now is mapped; columns generated
                // while mapping are not picked up again.
                let key = schema.primary_key_columns(parent);
                schema.with_cascade_guard(id, |schema| {
                    for column in key {
                        schema.map_parent_column(id, column)?;
                    }
                    Ok(())
                })?;
            }
            Ok(id)
        })
    }

    /// Map `parent_column` to an existing `child_column`.
    ///
    /// The child column gains a reference held by the mapping, so removing the
    /// mapping or the relationship leaves the column in its table.
    pub fn add_mapping(
        &mut self,
        relationship: RelationshipId,
        parent_column: ColumnId,
        child_column: ColumnId,
    ) -> Result<()> {
        let (parent, child) = {
            let rel = self.check_relationship(relationship)?;
            (rel.parent, rel.child)
        };
        self.check_column(parent_column)?;
        self.check_column(child_column)?;
        for (column, table, side) in [(parent_column, parent, "parent"), (child_column, child, "child")] {
            if self.columns[column.0].table != Some(table) {
                return Err(Error::InconsistentMapping(format!(
                    "{} is not a column of {side} table {}",
                    self.qualified_name(column),
                    self.tables[table.0].name
                )));
            }
        }
        let mapping = ColumnMapping {
            parent_column,
            child_column,
        };
        if self.relationships[relationship.0].mappings.contains(&mapping) {
            return Ok(());
        }

        self.compound("add column mapping", |schema| {
            schema.add_reference(child_column)?;
            let position = schema.relationships[relationship.0].mappings.len();
            schema.relationships[relationship.0].mappings.push(mapping);
            let event = schema.emit(ChangeEvent::ChildAdded {
                parent: ObjectRef::Relationship(relationship),
                child: ObjectRef::Mapping(mapping),
                index: position,
            });
            schema.react(&event)
        })
    }

    /// Remove the mapping of `parent_column`, releasing its child column.
    pub fn remove_mapping(
        &mut self,
        relationship: RelationshipId,
        parent_column: ColumnId,
    ) -> Result<()> {
        let position = self
            .check_relationship(relationship)?
            .parent_mapping_position(parent_column)
            .ok_or_else(|| {
                Error::InconsistentMapping(format!(
                    "{} is not mapped by {}",
                    self.qualified_name(parent_column),
                    self.relationships[relationship.0].name
                ))
            })?;
        self.compound("remove column mapping", |schema| {
            schema.unmap(relationship, position)
        })
    }

    /// Detach a relationship from both tables, releasing child columns that
    /// only existed for it.
    pub fn remove_relationship(&mut self, relationship: RelationshipId) -> Result<()> {
        let name = self.check_relationship(relationship)?.name.clone();
        self.compound(&format!("remove relationship {name}"), |schema| {
            let release = schema.settings.cascade_enabled;
            schema.detach_relationship(relationship, release)
        })
    }

    /// Switch the identifying flag.
    ///
    /// Turning it on moves the mapped child columns into the child's primary
    /// key as one block in mapping order; turning it off demotes them.
    pub fn set_identifying(&mut self, relationship: RelationshipId, identifying: bool) -> Result<()> {
        if self.check_relationship(relationship)?.identifying == identifying {
            return Ok(());
        }
        self.compound("set identifying", |schema| {
            schema.update_property(
                ObjectRef::Relationship(relationship),
                Property::Identifying,
                |s| &mut s.relationships[relationship.0].identifying,
                identifying,
            )?;
            if !schema.settings.cascade_enabled {
                return Ok(());
            }
            schema.with_cascade_guard(relationship, |schema| {
                if identifying {
                    schema.pull_mappings_into_key(relationship)
                } else {
                    schema.push_mappings_out_of_key(relationship)
                }
            })
        })
    }

    /// Whether the relationship ought to be identifying: every mapped child
    /// column is part of the child's primary key. Never applied
    /// automatically; a relationship without mappings reports `false`.
    pub fn should_be_identifying(&self, relationship: RelationshipId) -> bool {
        let Some(rel) = self.get_relationship(relationship) else {
            return false;
        };
        !rel.mappings.is_empty()
            && rel
                .mappings
                .iter()
                .all(|mapping| self.pk_position(rel.child, mapping.child_column).is_some())
    }

    pub fn set_relationship_name(
        &mut self,
        relationship: RelationshipId,
        name: impl Into<String>,
    ) -> Result<()> {
        self.check_relationship(relationship)?;
        let name = name.into();
        self.compound("rename relationship", |schema| {
            schema.update_property(
                ObjectRef::Relationship(relationship),
                Property::Name,
                |s| &mut s.relationships[relationship.0].name,
                name,
            )
        })
    }

    pub fn set_update_rule(&mut self, relationship: RelationshipId, rule: FkAction) -> Result<()> {
        self.check_relationship(relationship)?;
        self.compound("set update rule", |schema| {
            schema.update_property(
                ObjectRef::Relationship(relationship),
                Property::UpdateRule,
                |s| &mut s.relationships[relationship.0].update_rule,
                rule,
            )
        })
    }

    pub fn set_delete_rule(&mut self, relationship: RelationshipId, rule: FkAction) -> Result<()> {
        self.check_relationship(relationship)?;
        self.compound("set delete rule", |schema| {
            schema.update_property(
                ObjectRef::Relationship(relationship),
                Property::DeleteRule,
                |s| &mut s.relationships[relationship.0].delete_rule,
                rule,
            )
        })
    }

    pub fn set_deferrability(
        &mut self,
        relationship: RelationshipId,
        deferrability: Deferrability,
    ) -> Result<()> {
        self.check_relationship(relationship)?;
        self.compound("set deferrability", |schema| {
            schema.update_property(
                ObjectRef::Relationship(relationship),
                Property::Deferrability,
                |s| &mut s.relationships[relationship.0].deferrability,
                deferrability,
            )
        })
    }

    pub fn set_cardinality(
        &mut self,
        relationship: RelationshipId,
        parent: Cardinality,
        child: Cardinality,
    ) -> Result<()> {
        self.check_relationship(relationship)?;
        self.compound("set cardinality", |schema| {
            schema.update_property(
                ObjectRef::Relationship(relationship),
                Property::ParentCardinality,
                |s| &mut s.relationships[relationship.0].parent_cardinality,
                parent,
            )?;
            schema.update_property(
                ObjectRef::Relationship(relationship),
                Property::ChildCardinality,
                |s| &mut s.relationships[relationship.0].child_cardinality,
                child,
            )
        })
    }

    /// Remove the relationship from both endpoint tables. With `release`,
    /// every mapping is removed first and its child column released.
    pub(crate) fn detach_relationship(
        &mut self,
        relationship: RelationshipId,
        release: bool,
    ) -> Result<()> {
        if release {
            while let Some(last) = self.relationships[relationship.0].mappings.len().checked_sub(1) {
                self.unmap(relationship, last)?;
            }
        }

        let (parent, child) = {
            let rel = &mut self.relationships[relationship.0];
            rel.attached = false;
            (rel.parent, rel.child)
        };
        let mut events = Vec::with_capacity(2);
        if let Some(position) = self.tables[parent.0]
            .exported
            .iter()
            .position(|id| *id == relationship)
        {
            self.tables[parent.0].exported.remove(position);
            events.push(self.emit(ChangeEvent::ChildRemoved {
                parent: ObjectRef::Table(parent),
                child: ObjectRef::Relationship(relationship),
                index: position,
            }));
        }
        if let Some(position) = self.tables[child.0]
            .imported
            .iter()
            .position(|id| *id == relationship)
        {
            self.tables[child.0].imported.remove(position);
            events.push(self.emit(ChangeEvent::ChildRemoved {
                parent: ObjectRef::Table(child),
                child: ObjectRef::Relationship(relationship),
                index: position,
            }));
        }
        debug!(
            relationship = %self.relationships[relationship.0].name,
            release,
            "relationship detached"
        );
        for event in &events {
            self.react(event)?;
        }
        Ok(())
    }

    fn pull_mappings_into_key(&mut self, relationship: RelationshipId) -> Result<()> {
        let child = self.relationships[relationship.0].child;
        for position in 0..self.relationships[relationship.0].mappings.len() {
            let column = self.relationships[relationship.0].mappings[position].child_column;
            let target = self.child_key_slot(relationship, position, column);
            self.place_in_key(child, column, target)?;
        }
        Ok(())
    }

    fn push_mappings_out_of_key(&mut self, relationship: RelationshipId) -> Result<()> {
        let child = self.relationships[relationship.0].child;
        let columns: Vec<ColumnId> = self.relationships[relationship.0]
            .mappings
            .iter()
            .map(|mapping| mapping.child_column)
            .collect();
        for column in columns.into_iter().rev() {
            if self.pk_position(child, column).is_some() {
                self.demote(child, column)?;
            }
        }
        Ok(())
    }
}
