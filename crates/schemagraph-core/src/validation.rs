use std::collections::BTreeSet;

use serde::Serialize;

use crate::index::IndexTarget;
use crate::schema::Schema;
use crate::table::Table;

/// Severity level for validation issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueSeverity {
    Error,
    Warning,
}

/// Structured validation issue with location and hint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    pub severity: IssueSeverity,
    pub code: String,
    pub path: String,
    pub message: String,
    pub hint: Option<String>,
}

impl ValidationIssue {
    pub fn new(
        severity: IssueSeverity,
        code: impl Into<String>,
        path: impl Into<String>,
        message: impl Into<String>,
        hint: Option<String>,
    ) -> Self {
        Self {
            severity,
            code: code.into(),
            path: path.into(),
            message: message.into(),
            hint,
        }
    }
}

/// Aggregated validation report with errors and warnings.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
}

impl ValidationReport {
    /// Returns true when there are no errors.
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn push_error(&mut self, issue: ValidationIssue) {
        self.errors.push(issue);
    }

    pub fn push_warning(&mut self, issue: ValidationIssue) {
        self.warnings.push(issue);
    }

    fn error(&mut self, code: &str, path: String, message: String, hint: Option<&str>) {
        self.push_error(ValidationIssue::new(
            IssueSeverity::Error,
            code,
            path,
            message,
            hint.map(str::to_string),
        ));
    }

    fn warning(&mut self, code: &str, path: String, message: String, hint: Option<&str>) {
        self.push_warning(ValidationIssue::new(
            IssueSeverity::Warning,
            code,
            path,
            message,
            hint.map(str::to_string),
        ));
    }
}

/// Check the structural invariants of a schema model.
///
/// Errors:
/// - primary key columns are not the leading columns of their table
/// - columns, index entries or mappings pointing at the wrong table
/// - relationships missing from one of their tables' lists
///
/// Warnings:
/// - duplicate column names within a table
/// - identifying relationships whose child columns left the primary key
pub fn validate_schema(schema: &Schema) -> ValidationReport {
    let mut report = ValidationReport::default();
    for table in schema.tables() {
        check_columns(schema, table, &mut report);
        check_primary_key(schema, table, &mut report);
        check_indices(schema, table, &mut report);
        check_relationship_lists(schema, table, &mut report);
    }
    check_relationships(schema, &mut report);
    report
}

fn check_columns(schema: &Schema, table: &Table, report: &mut ValidationReport) {
    let mut seen = BTreeSet::new();
    for id in &table.columns {
        let column = schema.column(*id);
        let path = format!("tables.{}.columns.{}", table.name, column.name);
        if column.table != Some(table.id) {
            report.error(
                "column_owner_mismatch",
                path.clone(),
                format!("column {} does not point back at {}", column.name, table.name),
                None,
            );
        }
        if column.reference_count == 0 {
            report.error(
                "unreferenced_column",
                path.clone(),
                format!("column {} has no references", column.name),
                None,
            );
        }
        if !seen.insert(column.name.to_lowercase()) {
            report.warning(
                "duplicate_column_name",
                path,
                format!("duplicate column name: {}.{}", table.name, column.name),
                Some("rename one of the columns"),
            );
        }
    }
}

fn check_primary_key(schema: &Schema, table: &Table, report: &mut ValidationReport) {
    let pk = schema.index(table.primary_key);
    let path = format!("tables.{}.primary_key", table.name);
    for (position, entry) in pk.entries.iter().enumerate() {
        match &entry.target {
            IndexTarget::Expression(expr) => report.error(
                "pk_expression",
                path.clone(),
                format!("primary key entry {position} is the expression '{expr}'"),
                None,
            ),
            IndexTarget::Column(column) if table.columns.get(position) != Some(column) => {
                report.error(
                    "pk_not_prefix",
                    path.clone(),
                    format!(
                        "primary key column {} is not column {position} of {}",
                        schema.column(*column).name,
                        table.name
                    ),
                    Some("key columns must lead the column list in key order"),
                )
            }
            IndexTarget::Column(_) => {}
        }
    }
}

fn check_indices(schema: &Schema, table: &Table, report: &mut ValidationReport) {
    for id in &table.indices {
        let index = schema.index(*id);
        let path = format!("tables.{}.indices.{}", table.name, index.name);
        if index.table != Some(table.id) {
            report.error(
                "index_owner_mismatch",
                path.clone(),
                format!("index {} does not point back at {}", index.name, table.name),
                None,
            );
        }
        if index.entries.is_empty() {
            report.error(
                "empty_index",
                path.clone(),
                format!("index {} has no entries", index.name),
                Some("remove the index"),
            );
        }
        for column in index.columns() {
            if schema.column(column).table != Some(table.id) {
                report.error(
                    "index_foreign_column",
                    path.clone(),
                    format!(
                        "index {} references {}, which is not a column of {}",
                        index.name,
                        schema.qualified_name(column),
                        table.name
                    ),
                    None,
                );
            }
        }
    }
}

fn check_relationship_lists(schema: &Schema, table: &Table, report: &mut ValidationReport) {
    let lists = [("exported", &table.exported), ("imported", &table.imported)];
    for (list, ids) in lists {
        for id in ids.iter() {
            let rel = schema.relationship(*id);
            let endpoint = if list == "exported" { rel.parent } else { rel.child };
            if !rel.attached || endpoint != table.id {
                report.error(
                    "dangling_relationship",
                    format!("tables.{}.{list}", table.name),
                    format!("{} lists relationship {} it does not take part in", table.name, rel.name),
                    None,
                );
            }
        }
    }
}

fn check_relationships(schema: &Schema, report: &mut ValidationReport) {
    for rel in schema.relationships() {
        let path = format!("relationships.{}", rel.name);
        let parent = schema.table(rel.parent);
        let child = schema.table(rel.child);
        if !parent.attached || !child.attached {
            report.error(
                "detached_endpoint",
                path.clone(),
                format!("relationship {} connects a removed table", rel.name),
                None,
            );
        }
        if !parent.exported.contains(&rel.id) || !child.imported.contains(&rel.id) {
            report.error(
                "relationship_not_listed",
                path.clone(),
                format!("relationship {} is missing from its tables", rel.name),
                None,
            );
        }
        for mapping in &rel.mappings {
            if schema.column(mapping.parent_column).table != Some(rel.parent)
                || schema.column(mapping.child_column).table != Some(rel.child)
            {
                report.error(
                    "mapping_endpoint",
                    path.clone(),
                    format!(
                        "mapping {} -> {} does not connect {} to {}",
                        schema.qualified_name(mapping.parent_column),
                        schema.qualified_name(mapping.child_column),
                        parent.name,
                        child.name
                    ),
                    None,
                );
            }
        }
        if rel.identifying && !rel.mappings.is_empty() && !schema.should_be_identifying(rel.id) {
            report.warning(
                "identifying_outside_key",
                path,
                format!(
                    "identifying relationship {} maps columns outside the primary key of {}",
                    rel.name, child.name
                ),
                Some("add the columns to the key or make the relationship non-identifying"),
            );
        }
    }
}
