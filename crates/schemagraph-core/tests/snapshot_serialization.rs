use schemagraph_core::{ColumnDef, DataType, Schema, SchemaSnapshot, TableBuilder};

#[test]
fn serializes_snapshot_deterministically() {
    let mut schema = Schema::new();
    TableBuilder::new("t")
        .column(ColumnDef::new("id", DataType::Integer).not_null())
        .primary_key(["id"])
        .build(&mut schema)
        .expect("table");

    let json = serde_json::to_string_pretty(&schema.snapshot()).expect("serialize snapshot");
    let expected = r#"{
  "snapshot_version": "0.1",
  "tables": [
    {
      "name": "t",
      "physical_name": null,
      "remarks": null,
      "columns": [
        {
          "name": "id",
          "physical_name": null,
          "data_type": "integer",
          "precision": null,
          "scale": null,
          "nullability": "not_null",
          "default": null,
          "auto_increment": false,
          "primary_key": true,
          "reference_count": 1
        }
      ],
      "primary_key": [
        "id"
      ],
      "indices": []
    }
  ],
  "relationships": []
}"#;
    assert_eq!(json, expected);

    let parsed: SchemaSnapshot = serde_json::from_str(&json).expect("parse snapshot");
    assert_eq!(parsed, schema.snapshot());
}
