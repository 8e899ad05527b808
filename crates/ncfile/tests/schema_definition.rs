//! Integration tests for declarative schema definition.

use serde_json::json;

use ncfile::{AttributeValue, DefineState, DimLength, FileWriter, MemoryBackend, NcError, PhysicalType, WriterOptions};
use test_utils::fixtures::{
    CHAR_GLOBAL_ATTRIBUTE_SCHEMA, CHAR_VARIABLE_ATTRIBUTE_SCHEMA, INVALID_TYPE_SCHEMA, OBSERVATION_SCHEMA,
    UNKNOWN_DIMENSION_SCHEMA,
};

fn writer() -> FileWriter<MemoryBackend> {
    FileWriter::from_backend(MemoryBackend::in_memory(), WriterOptions::default())
}

#[test]
fn test_observation_schema() {
    let mut file = writer();
    file.define_yaml(OBSERVATION_SCHEMA).unwrap();

    let time = file.dimension("time").unwrap();
    assert!(time.unlimited);
    assert_eq!(time.len, 0);
    assert_eq!(file.dimension("station").unwrap().len, 3);

    let temp = file.variable("temp").unwrap();
    assert_eq!(temp.ty, PhysicalType::Short);
    assert_eq!(temp.dims, vec!["time", "station"]);
    assert_eq!(temp.unlimited, vec![true, false]);
    let names: Vec<&str> = temp.attributes.names().collect();
    assert_eq!(names, vec!["units", "scale_factor", "add_offset", "_FillValue"]);

    let station = file.variable("station").unwrap();
    assert_eq!(station.ty, PhysicalType::Int);
    assert!(station.is_coordinate());

    assert_eq!(file.attribute(":title"), Some(&AttributeValue::Text("station observations".into())));
    assert_eq!(file.attribute("temp:_FillValue"), Some(&AttributeValue::Short(vec![-32767])));
}

#[test]
fn test_unknown_dimension_is_rejected_before_anything_is_defined() {
    let mut file = writer();
    let err = file.define_yaml(UNKNOWN_DIMENSION_SCHEMA).unwrap_err();
    match err {
        NcError::UnknownDimension { variable, dimension } => {
            assert_eq!(variable, "v");
            assert_eq!(dimension, "y");
        }
        other => panic!("unexpected error: {}", other),
    }
    assert!(file.dimension("x").is_none());
    assert_eq!(file.mode(), DefineState::Data);
}

#[test]
fn test_invalid_type() {
    let mut file = writer();
    match file.define_yaml(INVALID_TYPE_SCHEMA).unwrap_err() {
        NcError::InvalidType { variable, type_name } => {
            assert_eq!(variable, "v");
            assert_eq!(type_name, "int64");
        }
        other => panic!("unexpected error: {}", other),
    }
}

#[test]
fn test_char_tag_only_allowed_on_global_attributes() {
    let mut file = writer();
    assert!(matches!(
        file.define_yaml(CHAR_VARIABLE_ATTRIBUTE_SCHEMA).unwrap_err(),
        NcError::InvalidAttributeSpec { .. }
    ));

    let mut file = writer();
    let mapping_form = "dimensions:\n  x: 2\nvariables:\n  v:\n    type: float\n    dim: [x]\n    label: {char: abc}\n";
    assert!(matches!(
        file.define_yaml(mapping_form).unwrap_err(),
        NcError::InvalidAttributeSpec { .. }
    ));

    let mut file = writer();
    file.define_yaml(CHAR_GLOBAL_ATTRIBUTE_SCHEMA).unwrap();
    assert_eq!(file.attribute("label"), Some(&AttributeValue::Char(b"abc".to_vec())));
}

#[test]
fn test_literal_suffixes_pick_the_attribute_type() {
    let mut file = writer();
    file.define_yaml(
        r#"
attributes:
  b: 5b
  s: 5s
  i: "5"
  l: 5l
  f: 5.0f
  d: "5.0"
  e: 1e3
  hex: 0x10s
  text: degrees_north
  number: 7
  list: [1, 2.5]
"#,
    )
    .unwrap();

    let expect = [
        ("b", AttributeValue::Byte(vec![5])),
        ("s", AttributeValue::Short(vec![5])),
        ("i", AttributeValue::Int(vec![5])),
        ("l", AttributeValue::Int(vec![5])),
        ("f", AttributeValue::Float(vec![5.0])),
        ("d", AttributeValue::Double(vec![5.0])),
        ("e", AttributeValue::Double(vec![1000.0])),
        ("hex", AttributeValue::Short(vec![16])),
        ("text", AttributeValue::Text("degrees_north".into())),
        ("number", AttributeValue::Double(vec![7.0])),
        ("list", AttributeValue::Double(vec![1.0, 2.5])),
    ];
    for (name, value) in expect {
        assert_eq!(file.attribute(name), Some(&value), "attribute {}", name);
    }
}

#[test]
fn test_out_of_range_literal() {
    let mut file = writer();
    assert!(file.define_yaml("attributes:\n  b: 200b\n").is_err());
    assert_eq!(file.mode(), DefineState::Data);
}

#[test]
fn test_json_schema_with_mapping_variables() {
    let mut file = writer();
    file.define_json(&json!({
        "dimensions": {"lat": 2, "lon": "3"},
        "variables": {
            "grid": {"type": "double", "dim": ["lat", "lon"], "valid_range": {"double": [0, 10]}},
            "float lat(lat)": {"units": "degrees_north"}
        }
    }))
    .unwrap();

    let grid = file.variable("grid").unwrap();
    assert_eq!(grid.ty, PhysicalType::Double);
    assert_eq!(grid.shape, vec![2, 3]);
    assert_eq!(
        grid.attributes.get("valid_range"),
        Some(&AttributeValue::Double(vec![0.0, 10.0]))
    );
    assert!(file.variable("lat").unwrap().is_coordinate());
}

#[test]
fn test_definitions_accumulate_across_documents() {
    let mut file = writer();
    file.define_yaml("dimensions:\n  x: 2\n").unwrap();
    file.define_yaml("variables:\n  \"int a(x)\": {}\n").unwrap();
    file.new_dimension("t", DimLength::Unlimited).unwrap();
    file.new_variable("double b(t, x)").unwrap();

    let declarations: Vec<String> = file.catalog().variables.iter().map(|v| v.declaration()).collect();
    assert_eq!(declarations, vec!["int a(x)", "double b(t, x)"]);
    assert!(matches!(
        file.new_variable("double c(q)").unwrap_err(),
        NcError::UnknownDimension { .. }
    ));
}

#[test]
fn test_duplicate_dimension_is_a_backend_failure() {
    let mut file = writer();
    file.define_yaml("dimensions:\n  x: 2\n").unwrap();
    let err = file.define_yaml("dimensions:\n  x: 3\n").unwrap_err();
    assert!(matches!(err, NcError::BackendFailure(_)));
    assert!(err.to_string().contains("dimension"));
    assert_eq!(file.dimension("x").unwrap().len, 2);
}
