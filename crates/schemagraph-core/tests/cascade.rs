mod common;

use common::{assert_key_is_prefix, column, column_names, int, key_names, table, text};
use schemagraph_core::{
    ColumnDef, DataType, EngineSettings, Error, Nullability, RelationshipOptions, Schema,
    TableBuilder,
};

#[test]
fn new_parent_key_column_reaches_identifying_child() {
    let mut schema = Schema::new();
    let parent = table(&mut schema, "parent", &["pk1", "pk2"], &["attr"]);
    let child = TableBuilder::new("child")
        .column(text("child_attr"))
        .build(&mut schema)
        .expect("child");
    let rel = schema
        .attach_relationship(parent, child, RelationshipOptions::identifying(), true)
        .expect("relationship");
    assert_eq!(column_names(&schema, child), ["pk1", "pk2", "child_attr"]);
    assert_eq!(key_names(&schema, child), ["pk1", "pk2"]);

    let pk3 = schema
        .append_column(parent, ColumnDef::new("pk3", DataType::Integer))
        .expect("append pk3");
    schema.add_to_pk(parent, pk3).expect("promote pk3");

    assert_eq!(column_names(&schema, parent), ["pk1", "pk2", "pk3", "attr"]);
    assert_eq!(column_names(&schema, child), ["pk1", "pk2", "pk3", "child_attr"]);
    assert_eq!(key_names(&schema, child), ["pk1", "pk2", "pk3"]);
    assert_key_is_prefix(&schema, parent);
    assert_key_is_prefix(&schema, child);

    let mappings = schema.relationship(rel).mappings();
    assert_eq!(mappings.len(), 3);
    let child_pk3 = column(&schema, child, "pk3");
    assert_eq!(mappings[2].parent_column, pk3);
    assert_eq!(mappings[2].child_column, child_pk3);
    assert_eq!(schema.column(child_pk3).nullability(), Nullability::NotNull);
    assert_eq!(schema.column(child_pk3).source_column(), Some(pk3));
    assert!(schema.should_be_identifying(rel));
}

#[test]
fn removing_a_new_key_column_restores_the_child() {
    let mut schema = Schema::new();
    let parent = table(&mut schema, "parent", &["pk1", "pk2"], &["attr"]);
    let child = table(&mut schema, "child", &[], &["child_attr"]);
    schema
        .attach_relationship(parent, child, RelationshipOptions::identifying(), true)
        .expect("relationship");
    let before = schema.snapshot();

    let pk3 = schema.append_column(parent, int("pk3")).expect("append");
    schema.add_to_pk(parent, pk3).expect("promote");
    assert_eq!(schema.pk_size(child), 3);

    schema.remove_column(parent, pk3).expect("remove pk3");
    assert_eq!(schema.snapshot(), before);
}

#[test]
fn removing_a_new_key_column_returns_a_reused_column() {
    let mut schema = Schema::new();
    let parent = table(&mut schema, "parent", &["pk1"], &[]);
    let child = TableBuilder::new("child")
        .column(int("cid"))
        .column(text("note"))
        .column(int("pk2"))
        .primary_key(["cid"])
        .build(&mut schema)
        .expect("child");
    schema
        .attach_relationship(parent, child, RelationshipOptions::identifying(), true)
        .expect("relationship");
    assert_eq!(column_names(&schema, child), ["cid", "pk1", "note", "pk2"]);
    let before = schema.snapshot();

    let pk2 = schema.append_column(parent, int("pk2")).expect("append");
    schema.add_to_pk(parent, pk2).expect("promote");
    let reused = column(&schema, child, "pk2");
    assert_eq!(column_names(&schema, child), ["cid", "pk1", "pk2", "note"]);
    assert_eq!(key_names(&schema, child), ["cid", "pk1", "pk2"]);
    assert_eq!(schema.column(reused).reference_count(), 2);

    schema.remove_column(parent, pk2).expect("remove pk2");
    assert_eq!(column_names(&schema, child), ["cid", "pk1", "note", "pk2"]);
    assert_eq!(key_names(&schema, child), ["cid", "pk1"]);
    assert_eq!(schema.snapshot(), before);
}

#[test]
fn demoting_a_parent_column_unmaps_it() {
    let mut schema = Schema::new();
    let parent = table(&mut schema, "parent", &["a", "b"], &[]);
    let child = table(&mut schema, "child", &["line"], &[]);
    let rel = schema
        .attach_relationship(parent, child, RelationshipOptions::identifying(), true)
        .expect("relationship");
    assert_eq!(column_names(&schema, child), ["line", "a", "b"]);
    assert_eq!(key_names(&schema, child), ["line", "a", "b"]);

    let b = column(&schema, parent, "b");
    schema.move_after_pk(parent, b).expect("demote b");

    assert_eq!(key_names(&schema, parent), ["a"]);
    assert_eq!(column_names(&schema, parent), ["a", "b"]);
    assert_eq!(column_names(&schema, child), ["line", "a"]);
    assert_eq!(key_names(&schema, child), ["line", "a"]);
    assert_eq!(schema.relationship(rel).mappings().len(), 1);
}

#[test]
fn reordering_parent_key_reorders_child_key() {
    let mut schema = Schema::new();
    let parent = table(&mut schema, "parent", &["a", "b"], &[]);
    let child = table(&mut schema, "child", &[], &["note"]);
    let rel = schema
        .attach_relationship(parent, child, RelationshipOptions::identifying(), true)
        .expect("relationship");

    schema.move_column(parent, 1, 0).expect("swap key");

    assert_eq!(key_names(&schema, parent), ["b", "a"]);
    assert_eq!(key_names(&schema, child), ["b", "a"]);
    assert_key_is_prefix(&schema, child);
    let order: Vec<_> = schema
        .relationship(rel)
        .mappings()
        .iter()
        .map(|mapping| schema.column(mapping.parent_column).name().to_string())
        .collect();
    assert_eq!(order, ["b", "a"]);
}

#[test]
fn self_reference_on_empty_key_maps_once() {
    let mut schema = Schema::new();
    let node = table(&mut schema, "node", &[], &["label"]);
    let rel = schema
        .attach_relationship(node, node, RelationshipOptions::identifying(), true)
        .expect("self reference");
    assert!(schema.relationship(rel).mappings().is_empty());

    let id = schema.append_column(node, int("id")).expect("append");
    schema.add_to_pk(node, id).expect("promote");

    let mappings = schema.relationship(rel).mappings();
    assert_eq!(mappings.len(), 1);
    assert_eq!(mappings[0].parent_column, id);
    assert_eq!(column_names(&schema, node), ["id", "node_id", "label"]);
    assert_eq!(key_names(&schema, node), ["id", "node_id"]);
}

#[test]
fn non_identifying_self_reference_appends_column() {
    let mut schema = Schema::new();
    let emp = table(&mut schema, "emp", &["emp_id"], &["name"]);
    let rel = schema
        .attach_relationship(emp, emp, RelationshipOptions::default(), true)
        .expect("self reference");

    assert!(!schema.relationship(rel).is_identifying());
    assert_eq!(column_names(&schema, emp), ["emp_id", "name", "emp_emp_id"]);
    assert_eq!(key_names(&schema, emp), ["emp_id"]);
}

#[test]
fn existing_child_column_is_reused() {
    let mut schema = Schema::new();
    let customer = table(&mut schema, "customer", &["customer_id"], &[]);
    let orders = TableBuilder::new("orders")
        .column(int("order_id"))
        .column(ColumnDef::new("CUSTOMER_ID", DataType::BigInt))
        .primary_key(["order_id"])
        .build(&mut schema)
        .expect("orders");
    let existing = column(&schema, orders, "customer_id");

    let rel = schema
        .attach_relationship(customer, orders, RelationshipOptions::default(), true)
        .expect("relationship");

    assert_eq!(column_names(&schema, orders), ["order_id", "CUSTOMER_ID"]);
    assert_eq!(schema.relationship(rel).mappings()[0].child_column, existing);
    assert_eq!(schema.column(existing).reference_count(), 2);

    // The reused column survives the relationship, back at one reference.
    schema.remove_relationship(rel).expect("remove relationship");
    assert_eq!(column_names(&schema, orders), ["order_id", "CUSTOMER_ID"]);
    assert_eq!(schema.column(existing).reference_count(), 1);
}

#[test]
fn name_matching_ignores_case_beyond_ascii() {
    let mut schema = Schema::new();
    let parent = TableBuilder::new("Übung")
        .column(int("ärger_id"))
        .primary_key(["ÄRGER_ID"])
        .build(&mut schema)
        .expect("parent");
    assert_eq!(key_names(&schema, parent), ["ärger_id"]);
    assert_eq!(schema.table_by_name("ÜBUNG").map(|t| t.id()), Some(parent));

    let child = table(&mut schema, "child", &["line"], &[]);
    let existing = schema.append_column(child, int("ÄRGER_ID")).expect("append");
    schema
        .attach_relationship(parent, child, RelationshipOptions::default(), true)
        .expect("relationship");

    assert_eq!(column_names(&schema, child), ["line", "ÄRGER_ID"]);
    assert_eq!(schema.column(existing).reference_count(), 2);
}

#[test]
fn reuse_can_be_disabled() {
    let settings = EngineSettings {
        hijack_columns: false,
        ..EngineSettings::default()
    };
    let mut schema = Schema::with_settings(settings);
    let customer = table(&mut schema, "customer", &["customer_id"], &[]);
    let orders = table(&mut schema, "orders", &["order_id"], &["customer_id"]);

    schema
        .attach_relationship(customer, orders, RelationshipOptions::default(), true)
        .expect("relationship");

    assert_eq!(
        column_names(&schema, orders),
        ["order_id", "customer_id", "customer_customer_id"]
    );
}

#[test]
fn rename_follows_only_untouched_children() {
    let mut schema = Schema::new();
    let parent = table(&mut schema, "parent", &["id"], &[]);
    let child = table(&mut schema, "child", &["line"], &[]);
    let other = table(&mut schema, "other", &["line"], &[]);
    schema
        .attach_relationship(parent, child, RelationshipOptions::default(), true)
        .expect("child relationship");
    schema
        .attach_relationship(parent, other, RelationshipOptions::default(), true)
        .expect("other relationship");
    let id = column(&schema, parent, "id");

    let renamed = column(&schema, other, "id");
    schema.set_column_name(renamed, "owner").expect("manual rename");
    schema.set_column_name(id, "parent_id").expect("rename parent");

    assert_eq!(column_names(&schema, child), ["line", "parent_id"]);
    assert_eq!(column_names(&schema, other), ["line", "owner"]);
}

#[test]
fn rename_propagates_through_identifying_levels() {
    let mut schema = Schema::new();
    let a = table(&mut schema, "a", &["id"], &[]);
    let b = table(&mut schema, "b", &[], &["x"]);
    let c = table(&mut schema, "c", &[], &["y"]);
    schema
        .attach_relationship(a, b, RelationshipOptions::identifying(), true)
        .expect("a -> b");
    schema
        .attach_relationship(b, c, RelationshipOptions::identifying(), true)
        .expect("b -> c");
    assert_eq!(column_names(&schema, c), ["id", "y"]);

    let id = column(&schema, a, "id");
    schema.set_column_name(id, "code").expect("rename");

    assert_eq!(column_names(&schema, b), ["code", "x"]);
    assert_eq!(column_names(&schema, c), ["code", "y"]);
}

#[test]
fn renames_stay_local_when_disabled() {
    let settings = EngineSettings {
        propagate_renames: false,
        ..EngineSettings::default()
    };
    let mut schema = Schema::with_settings(settings);
    let parent = table(&mut schema, "parent", &["id"], &[]);
    let child = table(&mut schema, "child", &["line"], &[]);
    schema
        .attach_relationship(parent, child, RelationshipOptions::default(), true)
        .expect("relationship");

    let id = column(&schema, parent, "id");
    schema.set_column_name(id, "parent_id").expect("rename");

    assert_eq!(column_names(&schema, child), ["line", "id"]);
}

#[test]
fn precision_only_grows_in_children() {
    let mut schema = Schema::new();
    let parent = TableBuilder::new("parent")
        .column(ColumnDef::new("code", DataType::Decimal).precision(10).scale(2))
        .primary_key(["code"])
        .build(&mut schema)
        .expect("parent");
    let child = table(&mut schema, "child", &["line"], &[]);
    schema
        .attach_relationship(parent, child, RelationshipOptions::default(), true)
        .expect("relationship");
    let code = column(&schema, parent, "code");
    let child_code = column(&schema, child, "code");
    assert_eq!(schema.column(child_code).precision(), Some(10));

    schema.set_column_precision(code, Some(12)).expect("grow");
    assert_eq!(schema.column(child_code).precision(), Some(12));

    schema.set_column_precision(code, Some(8)).expect("shrink");
    assert_eq!(schema.column(code).precision(), Some(8));
    assert_eq!(schema.column(child_code).precision(), Some(12));

    schema.set_column_scale(code, Some(4)).expect("grow scale");
    assert_eq!(schema.column(child_code).scale(), Some(4));
}

#[test]
fn type_changes_always_propagate() {
    let mut schema = Schema::new();
    let parent = table(&mut schema, "parent", &["id"], &[]);
    let child = table(&mut schema, "child", &["line"], &[]);
    schema
        .attach_relationship(parent, child, RelationshipOptions::default(), true)
        .expect("relationship");

    let id = column(&schema, parent, "id");
    schema.set_column_type(id, DataType::BigInt).expect("retype");

    let child_id = column(&schema, child, "id");
    assert_eq!(schema.column(child_id).data_type(), &DataType::BigInt);
}

#[test]
fn mapped_child_columns_are_locked() {
    let mut schema = Schema::new();
    let parent = table(&mut schema, "parent", &["id"], &[]);
    let child = table(&mut schema, "child", &["line"], &[]);
    schema
        .attach_relationship(parent, child, RelationshipOptions::default(), true)
        .expect("relationship");
    let before = schema.snapshot();

    let fk = column(&schema, child, "id");
    let err = schema.remove_column(child, fk).expect_err("locked");
    assert!(matches!(err, Error::LockedColumn { .. }));
    assert_eq!(schema.snapshot(), before);
}

#[test]
fn removing_child_table_detaches_its_relationships() {
    let mut schema = Schema::new();
    let parent = table(&mut schema, "parent", &["id"], &[]);
    let child = table(&mut schema, "child", &["line"], &[]);
    let keep = table(&mut schema, "keep", &["line"], &[]);
    let rel = schema
        .attach_relationship(parent, child, RelationshipOptions::identifying(), true)
        .expect("relationship");
    let kept = schema
        .attach_relationship(parent, keep, RelationshipOptions::default(), true)
        .expect("kept relationship");

    schema.remove_table(child).expect("remove child");

    assert!(!schema.relationship(rel).is_attached());
    assert_eq!(schema.table(parent).exported(), [kept]);
    assert_eq!(column_names(&schema, parent), ["id"]);
    assert!(schema.table_by_name("child").is_none());
}

#[test]
fn removing_parent_table_orphans_children() {
    let mut schema = Schema::new();
    let parent = table(&mut schema, "parent", &["id"], &[]);
    let child = table(&mut schema, "child", &["line"], &["note"]);
    let rel = schema
        .attach_relationship(parent, child, RelationshipOptions::default(), true)
        .expect("relationship");
    assert_eq!(column_names(&schema, child), ["line", "note", "id"]);

    schema.remove_table(parent).expect("remove parent");

    assert!(!schema.relationship(rel).is_attached());
    assert!(schema.table(child).imported().is_empty());
    assert_eq!(column_names(&schema, child), ["line", "note"]);
    assert_eq!(schema.relationships().count(), 0);
}

#[test]
fn removing_self_referencing_table_does_not_loop() {
    let mut schema = Schema::new();
    let node = table(&mut schema, "node", &["id"], &[]);
    schema
        .attach_relationship(node, node, RelationshipOptions::identifying(), true)
        .expect("self reference");

    schema.remove_table(node).expect("remove");
    assert_eq!(schema.tables().count(), 0);
    assert_eq!(schema.relationships().count(), 0);
}

#[test]
fn identifying_flag_moves_child_columns() {
    let mut schema = Schema::new();
    let parent = table(&mut schema, "parent", &["a", "b"], &[]);
    let child = table(&mut schema, "child", &["line"], &["note"]);
    let rel = schema
        .attach_relationship(parent, child, RelationshipOptions::default(), true)
        .expect("relationship");
    assert_eq!(column_names(&schema, child), ["line", "note", "a", "b"]);
    assert!(!schema.should_be_identifying(rel));

    schema.set_identifying(rel, true).expect("identifying");
    assert_eq!(key_names(&schema, child), ["line", "a", "b"]);
    assert_eq!(column_names(&schema, child), ["line", "a", "b", "note"]);
    assert_key_is_prefix(&schema, child);
    assert!(schema.should_be_identifying(rel));

    schema.set_identifying(rel, false).expect("non-identifying");
    assert_eq!(key_names(&schema, child), ["line"]);
    assert_key_is_prefix(&schema, child);
}

#[test]
fn shared_child_column_counts_each_mapping() {
    let mut schema = Schema::new();
    let left = table(&mut schema, "left", &["id"], &[]);
    let right = table(&mut schema, "right", &["id"], &[]);
    let child = table(&mut schema, "child", &["line"], &["shared"]);
    let shared = column(&schema, child, "shared");
    let left_id = column(&schema, left, "id");
    let right_id = column(&schema, right, "id");

    let first = schema
        .attach_relationship(left, child, RelationshipOptions::default(), false)
        .expect("left");
    let second = schema
        .attach_relationship(right, child, RelationshipOptions::default(), false)
        .expect("right");
    schema.add_mapping(first, left_id, shared).expect("map left");
    schema.add_mapping(second, right_id, shared).expect("map right");
    assert_eq!(schema.column(shared).reference_count(), 3);

    schema.remove_mapping(first, left_id).expect("unmap left");
    assert_eq!(schema.column(shared).reference_count(), 2);

    schema.remove_mapping(second, right_id).expect("unmap right");
    assert_eq!(column_names(&schema, child), ["line", "shared"]);
    assert_eq!(schema.column(shared).reference_count(), 1);

    schema.remove_column(child, shared).expect("unlocked once unmapped");
    assert_eq!(column_names(&schema, child), ["line"]);
}

#[test]
fn mapped_columns_the_child_owned_outlive_the_relationship() {
    let mut schema = Schema::new();
    let parent = table(&mut schema, "parent", &["id"], &[]);
    let explicit = table(&mut schema, "explicit", &["cid"], &["parent_ref"]);
    let reused = TableBuilder::new("reused")
        .column(int("cid"))
        .column(int("id"))
        .primary_key(["cid"])
        .build(&mut schema)
        .expect("reused");
    let generated = table(&mut schema, "generated", &["cid"], &[]);
    let parent_id = column(&schema, parent, "id");

    let by_mapping = schema
        .attach_relationship(parent, explicit, RelationshipOptions::default(), false)
        .expect("explicit");
    let parent_ref = column(&schema, explicit, "parent_ref");
    schema.add_mapping(by_mapping, parent_id, parent_ref).expect("mapping");
    let by_reuse = schema
        .attach_relationship(parent, reused, RelationshipOptions::default(), true)
        .expect("reused");
    let reused_id = column(&schema, reused, "id");
    let by_generation = schema
        .attach_relationship(parent, generated, RelationshipOptions::default(), true)
        .expect("generated");
    assert_eq!(column_names(&schema, generated), ["cid", "id"]);

    assert_eq!(schema.column(parent_ref).reference_count(), 2);
    assert_eq!(schema.column(reused_id).reference_count(), 2);
    assert_eq!(schema.column(column(&schema, generated, "id")).reference_count(), 1);

    for relationship in [by_mapping, by_reuse, by_generation] {
        schema.remove_relationship(relationship).expect("remove relationship");
    }

    assert_eq!(column_names(&schema, explicit), ["cid", "parent_ref"]);
    assert_eq!(schema.column(parent_ref).reference_count(), 1);
    assert_eq!(column_names(&schema, reused), ["cid", "id"]);
    assert_eq!(schema.column(reused_id).reference_count(), 1);
    assert_eq!(column_names(&schema, generated), ["cid"]);
}

#[test]
fn mapping_outside_endpoint_tables_is_rejected() {
    let mut schema = Schema::new();
    let parent = table(&mut schema, "parent", &["id"], &[]);
    let child = table(&mut schema, "child", &["line"], &[]);
    let stranger = table(&mut schema, "stranger", &["id"], &[]);
    let rel = schema
        .attach_relationship(parent, child, RelationshipOptions::default(), false)
        .expect("relationship");

    let err = schema
        .add_mapping(rel, column(&schema, stranger, "id"), column(&schema, child, "line"))
        .expect_err("parent column of another table");
    assert!(matches!(err, Error::InconsistentMapping(_)));
}

#[test]
fn bulk_load_skips_cascades() {
    let mut schema = Schema::new();
    schema.set_cascade_enabled(false);
    let parent = table(&mut schema, "parent", &["id"], &[]);
    let child = table(&mut schema, "child", &["line"], &["parent_ref"]);
    let rel = schema
        .attach_relationship(parent, child, RelationshipOptions::identifying(), false)
        .expect("relationship");
    schema
        .add_mapping(rel, column(&schema, parent, "id"), column(&schema, child, "parent_ref"))
        .expect("mapping");

    let extra = schema.append_column(parent, int("extra")).expect("append");
    schema.add_to_pk(parent, extra).expect("promote");
    assert_eq!(column_names(&schema, child), ["line", "parent_ref"]);

    schema.set_cascade_enabled(true);
    let extra2 = schema.append_column(parent, int("extra2")).expect("append");
    schema.add_to_pk(parent, extra2).expect("promote");
    assert_eq!(column_names(&schema, child), ["line", "extra2", "parent_ref"]);
    assert_eq!(key_names(&schema, child), ["line", "extra2"]);
}

#[test]
fn handles_from_another_schema_are_answered_without_panicking() {
    let mut other = Schema::new();
    let parent = table(&mut other, "parent", &["id"], &[]);
    let child = table(&mut other, "child", &["line"], &[]);
    let rel = other
        .attach_relationship(parent, child, RelationshipOptions::identifying(), true)
        .expect("relationship");
    let fk = column(&other, child, "id");

    let schema = Schema::new();
    assert!(!schema.should_be_identifying(rel));
    assert!(schema.locking_relationship(child, fk).is_none());
    assert!(schema.get_table(child).is_none());
    assert!(schema.get_column(fk).is_none());
}
