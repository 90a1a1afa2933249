//! GRAPH handler: node/relationship expansion into uniform rows.
//!
//! Graph backends answer with either collection rows (`nodes` /
//! `relationships` arrays) or with one element per row. Both shapes expand
//! to one output row per element: nodes get `type=node` and their id,
//! relationships get `type=relationship` with endpoint ids; element
//! properties are dot-flattened alongside.

use crate::document;
use mosaiq_common::models::{QueryResult, Row};
use serde_json::Value;

pub(crate) fn combine(results: &[&QueryResult]) -> Vec<Row> {
    let mut out = Vec::new();
    for result in results {
        for row in &result.rows {
            expand_row(row, &mut out);
        }
    }
    out
}

fn expand_row(row: &Row, out: &mut Vec<Row>) {
    let nodes = row.get("nodes").and_then(Value::as_array);
    let relationships = row.get("relationships").and_then(Value::as_array);

    if nodes.is_none() && relationships.is_none() {
        out.push(element_row(row));
        return;
    }

    for node in nodes.into_iter().flatten() {
        if let Value::Object(map) = node {
            out.push(node_row(map));
        }
    }
    for rel in relationships.into_iter().flatten() {
        if let Value::Object(map) = rel {
            out.push(relationship_row(map));
        }
    }
}

/// A bare element is a relationship when it names both endpoints.
fn element_row(element: &Row) -> Row {
    if element.contains_key("start_id") && element.contains_key("end_id") {
        relationship_row(element)
    } else {
        node_row(element)
    }
}

fn node_row(node: &Row) -> Row {
    let mut out = Row::new();
    out.insert("type".to_string(), Value::String("node".to_string()));
    out.insert(
        "id".to_string(),
        node.get("id").cloned().unwrap_or(Value::Null),
    );
    expand_properties(node, &mut out);
    out
}

fn relationship_row(rel: &Row) -> Row {
    let mut out = Row::new();
    out.insert(
        "type".to_string(),
        Value::String("relationship".to_string()),
    );
    for key in ["start_id", "end_id", "relationship_type"] {
        out.insert(key.to_string(), rel.get(key).cloned().unwrap_or(Value::Null));
    }
    expand_properties(rel, &mut out);
    out
}

/// Flatten the element's payload: a `properties` object loses its prefix,
/// any other non-structural field flattens under its own name.
fn expand_properties(element: &Row, out: &mut Row) {
    for (key, value) in element {
        match key.as_str() {
            "id" | "start_id" | "end_id" | "relationship_type" | "type" => {}
            "properties" => match value {
                Value::Object(props) => {
                    for (prop, nested) in props {
                        document::flatten_into(out, prop, nested);
                    }
                }
                other => document::flatten_into(out, key, other),
            },
            _ => document::flatten_into(out, key, value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mosaiq_common::models::SourceKind;
    use serde_json::json;

    fn graph_result(rows: Value) -> QueryResult {
        let rows = match rows {
            Value::Array(items) => items
                .into_iter()
                .filter_map(|item| match item {
                    Value::Object(map) => Some(map),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        };
        QueryResult::ok("g1", SourceKind::Graph, rows)
    }

    #[test]
    fn test_collection_row_expands_nodes_and_relationships() {
        let result = graph_result(json!([{
            "nodes": [
                {"id": "n1", "properties": {"name": "alice"}},
                {"id": "n2", "properties": {"name": "bob"}},
            ],
            "relationships": [
                {"start_id": "n1", "end_id": "n2", "relationship_type": "KNOWS", "properties": {"since": 2019}},
            ],
        }]));

        let rows = combine(&[&result]);
        assert_eq!(rows.len(), 3);

        let nodes: Vec<_> = rows.iter().filter(|r| r["type"] == json!("node")).collect();
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0]["name"], json!("alice"));

        let rel = rows
            .iter()
            .find(|r| r["type"] == json!("relationship"))
            .unwrap();
        assert_eq!(rel["start_id"], json!("n1"));
        assert_eq!(rel["end_id"], json!("n2"));
        assert_eq!(rel["relationship_type"], json!("KNOWS"));
        assert_eq!(rel["since"], json!(2019));
    }

    #[test]
    fn test_bare_element_rows_classify_by_shape() {
        let result = graph_result(json!([
            {"id": "n1", "properties": {"kind": "person"}},
            {"start_id": "n1", "end_id": "n2"},
        ]));

        let rows = combine(&[&result]);
        assert_eq!(rows[0]["type"], json!("node"));
        assert_eq!(rows[0]["kind"], json!("person"));
        assert_eq!(rows[1]["type"], json!("relationship"));
        assert_eq!(rows[1]["relationship_type"], json!(null));
    }

    #[test]
    fn test_nested_properties_flatten() {
        let result = graph_result(json!([
            {"id": "n1", "properties": {"address": {"city": "berlin"}}},
        ]));

        let rows = combine(&[&result]);
        assert_eq!(rows[0]["address.city"], json!("berlin"));
    }
}
