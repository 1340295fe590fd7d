#![allow(dead_code)]

use schemagraph_core::{ColumnDef, ColumnId, DataType, Schema, TableBuilder, TableId};

pub fn int(name: &str) -> ColumnDef {
    ColumnDef::new(name, DataType::Integer)
}

pub fn text(name: &str) -> ColumnDef {
    ColumnDef::new(name, DataType::Varchar)
}

/// Table with the given integer key columns followed by varchar attributes.
pub fn table(schema: &mut Schema, name: &str, key: &[&str], attributes: &[&str]) -> TableId {
    let mut builder = TableBuilder::new(name);
    for column in key {
        builder = builder.column(int(column));
    }
    for column in attributes {
        builder = builder.column(text(column));
    }
    builder
        .primary_key(key.iter().copied())
        .build(schema)
        .expect("build table")
}

pub fn column_names(schema: &Schema, table: TableId) -> Vec<String> {
    schema
        .table_columns(table)
        .map(|column| column.name().to_string())
        .collect()
}

pub fn key_names(schema: &Schema, table: TableId) -> Vec<String> {
    schema
        .primary_key_columns(table)
        .into_iter()
        .map(|column| schema.column(column).name().to_string())
        .collect()
}

pub fn column(schema: &Schema, table: TableId, name: &str) -> ColumnId {
    schema
        .column_by_name(table, name)
        .unwrap_or_else(|| panic!("missing column {name}"))
        .id()
}

/// Asserts that the key columns are exactly the leading columns, in order.
pub fn assert_key_is_prefix(schema: &Schema, table: TableId) {
    let key = schema.primary_key_columns(table);
    let leading = &schema.table(table).columns()[..key.len()];
    assert_eq!(key.as_slice(), leading, "key of {}", schema.table(table).name());
}
