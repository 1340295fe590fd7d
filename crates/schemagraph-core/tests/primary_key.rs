mod common;

use common::{assert_key_is_prefix, column, column_names, int, key_names, table, text};
use schemagraph_core::{ColumnDef, DataType, Error, IndexEntry, IndexEntryDef, Schema, TableBuilder};

#[test]
fn builder_moves_key_columns_first() {
    let mut schema = Schema::new();
    let t = TableBuilder::new("account")
        .column(text("name"))
        .column(int("region"))
        .column(int("id"))
        .primary_key(["id", "region"])
        .build(&mut schema)
        .expect("account");

    assert_eq!(column_names(&schema, t), ["id", "region", "name"]);
    assert_eq!(key_names(&schema, t), ["id", "region"]);
}

#[test]
fn builder_rejects_invalid_keys_without_side_effects() {
    let mut schema = Schema::new();
    let expression = TableBuilder::new("bad")
        .column(int("id"))
        .primary_key_entries(vec![IndexEntryDef::Expression("lower(id)".to_string())])
        .build(&mut schema);
    assert!(matches!(expression, Err(Error::InvalidPrimaryKey(_))));

    let unknown = TableBuilder::new("bad")
        .column(int("id"))
        .primary_key(["missing"])
        .build(&mut schema);
    assert!(matches!(unknown, Err(Error::InvalidPrimaryKey(_))));

    let duplicate = TableBuilder::new("bad")
        .column(int("id"))
        .primary_key(["id", "ID"])
        .build(&mut schema);
    assert!(matches!(duplicate, Err(Error::InvalidPrimaryKey(_))));

    assert_eq!(schema.tables().count(), 0);
}

#[test]
fn moving_across_the_key_boundary_changes_membership() {
    let mut schema = Schema::new();
    let t = table(&mut schema, "t", &["a", "b"], &["c", "d"]);

    schema.move_column(t, 0, 3).expect("demote a");
    assert_eq!(column_names(&schema, t), ["b", "c", "d", "a"]);
    assert_eq!(key_names(&schema, t), ["b"]);

    schema.move_column(t, 2, 0).expect("promote d");
    assert_eq!(column_names(&schema, t), ["d", "b", "c", "a"]);
    assert_eq!(key_names(&schema, t), ["d", "b"]);

    schema.move_column(t, 3, 2).expect("plain move");
    assert_eq!(column_names(&schema, t), ["d", "b", "a", "c"]);
    assert_eq!(key_names(&schema, t), ["d", "b"]);
    assert_key_is_prefix(&schema, t);
}

#[test]
fn add_to_pk_and_move_after_pk() {
    let mut schema = Schema::new();
    let t = table(&mut schema, "t", &["id"], &["x", "y"]);
    let y = column(&schema, t, "y");

    schema.add_to_pk(t, y).expect("promote y");
    assert_eq!(column_names(&schema, t), ["id", "y", "x"]);
    assert_eq!(key_names(&schema, t), ["id", "y"]);

    let id = column(&schema, t, "id");
    schema.move_after_pk(t, id).expect("demote id");
    assert_eq!(column_names(&schema, t), ["y", "id", "x"]);
    assert_eq!(key_names(&schema, t), ["y"]);

    let x = column(&schema, t, "x");
    schema.move_after_pk(t, x).expect("move x");
    assert_eq!(column_names(&schema, t), ["y", "x", "id"]);
    assert_key_is_prefix(&schema, t);
}

#[test]
fn inserting_inside_the_key_joins_it() {
    let mut schema = Schema::new();
    let t = table(&mut schema, "t", &["a", "b"], &["c"]);

    let z = schema.create_column(int("z"));
    schema.add_column(t, z, 1).expect("insert z");

    assert_eq!(column_names(&schema, t), ["a", "z", "b", "c"]);
    assert_eq!(key_names(&schema, t), ["a", "z", "b"]);
    assert_eq!(schema.column(z).reference_count(), 1);
}

#[test]
fn columns_belong_to_one_table() {
    let mut schema = Schema::new();
    let a = table(&mut schema, "a", &["id"], &[]);
    let b = table(&mut schema, "b", &["id"], &[]);

    let id = column(&schema, a, "id");
    let err = schema.add_column(b, id, 0).expect_err("owned elsewhere");
    assert!(matches!(err, Error::ColumnInUse { .. }));

    let err = schema.add_to_pk(b, id).expect_err("not a member");
    assert!(matches!(err, Error::ColumnNotInTable { .. }));
}

#[test]
fn extra_references_delay_removal() {
    let mut schema = Schema::new();
    let t = table(&mut schema, "t", &["id"], &["x"]);
    let x = column(&schema, t, "x");

    schema.add_column(t, x, 0).expect("second reference");
    assert_eq!(schema.column(x).reference_count(), 2);

    schema.remove_column(t, x).expect("drop a reference");
    assert_eq!(column_names(&schema, t), ["id", "x"]);
    schema.remove_column(t, x).expect("remove");
    assert_eq!(column_names(&schema, t), ["id"]);
    assert!(schema.column(x).table().is_none());
}

#[test]
fn expressions_never_enter_the_key() {
    let mut schema = Schema::new();
    let t = table(&mut schema, "t", &["id"], &[]);
    let pk = schema.table(t).primary_key();
    let before = schema.snapshot();

    let err = schema
        .add_index_entry(pk, IndexEntry::expression("upper(id)"), None)
        .expect_err("expression");
    assert!(matches!(err, Error::InvalidPrimaryKey(_)));
    assert_eq!(schema.snapshot(), before);
}

#[test]
fn key_index_edits_reposition_columns() {
    let mut schema = Schema::new();
    let t = table(&mut schema, "t", &["a"], &["b", "c"]);
    let pk = schema.table(t).primary_key();
    let a = column(&schema, t, "a");
    let b = column(&schema, t, "b");
    let c = column(&schema, t, "c");

    schema
        .add_index_entry(pk, IndexEntry::column(c), Some(0))
        .expect("add c");
    assert_eq!(column_names(&schema, t), ["c", "a", "b"]);

    schema.make_columns_like(pk, &[b, a]).expect("reorganize");
    assert_eq!(key_names(&schema, t), ["b", "a"]);
    assert_eq!(column_names(&schema, t), ["b", "a", "c"]);

    schema.remove_index_entry(pk, 0).expect("remove b");
    assert_eq!(key_names(&schema, t), ["a"]);
    assert_eq!(column_names(&schema, t), ["a", "b", "c"]);
    assert_key_is_prefix(&schema, t);
}

#[test]
fn empty_primary_key_index_persists() {
    let mut schema = Schema::new();
    let t = table(&mut schema, "t", &["id"], &["x"]);
    let pk = schema.table(t).primary_key();
    let id = column(&schema, t, "id");

    schema.remove_column(t, id).expect("remove key column");

    assert_eq!(schema.pk_size(t), 0);
    assert_eq!(schema.index(pk).table(), Some(t));
    assert_eq!(schema.table(t).primary_key(), pk);
    assert!(matches!(schema.remove_index(pk), Err(Error::InvalidPrimaryKey(_))));
}

#[test]
fn inherited_columns_are_renamed_on_collision() {
    let mut schema = Schema::new();
    let base = TableBuilder::new("base")
        .column(int("id"))
        .column(ColumnDef::new("created", DataType::Timestamp).not_null())
        .primary_key(["id"])
        .build(&mut schema)
        .expect("base");
    let derived = table(&mut schema, "derived", &["id"], &["note"]);

    let copies = schema.inherit_columns(derived, base, 2).expect("inherit");

    assert_eq!(copies.len(), 2);
    assert_eq!(column_names(&schema, derived), ["id", "note", "id_1", "created"]);
    assert_eq!(key_names(&schema, derived), ["id"]);
    let created = column(&schema, derived, "created");
    assert_eq!(schema.column(created).data_type(), &DataType::Timestamp);
    assert_eq!(
        schema.column(created).source_column(),
        Some(column(&schema, base, "created"))
    );
}
