use serde_json::Value;
use mosaiq_error::{ErrorCode, ErrorContext, MosaiqError};

#[test]
fn test_json_serialization() {
    let error = MosaiqError::new(ErrorCode::UnresolvedTable, "Table 'order' not found")
        .with_context(ErrorContext::UnresolvedTable {
            table: "order".to_string(),
            known_tables: vec!["orders".to_string(), "users".to_string()],
        })
        .with_hint("Did you mean 'orders'?");

    let json = error.to_json();
    println!("JSON: {}", json);

    let v: Value = serde_json::from_str(&json).expect("valid json");

    assert_eq!(v["code"], "MOSAIQ-2003");
    assert_eq!(v["message"], "Table 'order' not found");
    assert_eq!(v["hint"], "Did you mean 'orders'?");
    assert_eq!(v["context"]["type"], "unresolved_table");
    assert_eq!(v["context"]["table"], "order");
}

#[test]
fn test_error_roundtrip_through_json() {
    let error = MosaiqError::new(ErrorCode::NoCapableSource, "No source supports the query")
        .with_context(ErrorContext::NoCapableSource {
            source_name: "warehouse".to_string(),
            required: vec!["select".to_string(), "geospatial".to_string()],
            missing: vec!["geospatial".to_string()],
        });

    let json = error.to_json();
    let back: MosaiqError = serde_json::from_str(&json).expect("valid error json");

    assert_eq!(back.code, ErrorCode::NoCapableSource);
    assert_eq!(back.message, error.message);
    match back.context {
        Some(ErrorContext::NoCapableSource { missing, .. }) => {
            assert_eq!(missing, vec!["geospatial".to_string()]);
        }
        other => panic!("unexpected context: {:?}", other),
    }
}

#[test]
fn test_error_code_parsing() {
    let code: ErrorCode = "MOSAIQ-1004".to_string().try_into().unwrap();
    assert_eq!(code, ErrorCode::AdapterMissing);
}
