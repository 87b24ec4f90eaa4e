//! Builders for workbook documents in their XML-shaped JSON form
#![allow(dead_code)]

use serde_json::{json, Value};

pub const DS: &str = "federated.1";

pub fn table(name: &str, table: &str) -> Value {
    json!({"@name": name, "@table": table, "@type": "table", "@connection": "sqlserver.1"})
}

pub fn join(kind: &str, left: Value, right: Value, on: Value) -> Value {
    json!({
        "@join": kind,
        "@type": "join",
        "clause": {"@type": "join", "expression": on},
        "relation": [left, right]
    })
}

pub fn equals(left: &str, right: &str) -> Value {
    json!({"@op": "=", "expression": [{"@op": left}, {"@op": right}]})
}

pub fn collection(relations: Vec<Value>) -> Value {
    json!({"@type": "collection", "relation": relations})
}

/// Metadata column record; `parent` is the owning relation's name.
pub fn record(remote: &str, parent: &str, local_type: &str) -> Value {
    json!({
        "@class": "column",
        "remote-name": remote,
        "local-name": format!("[{remote}]"),
        "parent-name": format!("[{parent}]"),
        "local-type": local_type
    })
}

pub fn datasource(caption: &str, relation: Value, records: Vec<Value>) -> Value {
    json!({
        "@name": DS,
        "@caption": caption,
        "connection": {
            "@class": "federated",
            "relation": relation,
            "metadata-records": {"metadata-record": records}
        }
    })
}

/// Object graph over `tables` (`(object id, relation node)`), relationships
/// given as `(first id, second id, expression)`.
pub fn object_graph(tables: &[(&str, Value)], relationships: Vec<(&str, &str, Value)>) -> Value {
    let objects: Vec<Value> = tables
        .iter()
        .map(|(id, relation)| json!({"@id": id, "@caption": id, "properties": {"@context": "", "relation": relation}}))
        .collect();
    let relationships: Vec<Value> = relationships
        .into_iter()
        .map(|(first, second, expression)| {
            json!({
                "expression": expression,
                "first-end-point": {"@object-id": first},
                "second-end-point": {"@object-id": second}
            })
        })
        .collect();
    json!({
        "objects": {"object": objects},
        "relationships": {"relationship": relationships}
    })
}

pub fn column_instance(column: &str, derivation: &str, name: &str, kind: &str) -> Value {
    json!({
        "@column": format!("[{column}]"),
        "@derivation": derivation,
        "@name": format!("[{name}]"),
        "@pivot": "key",
        "@type": kind
    })
}

pub fn role(column: &str, role: &str) -> Value {
    json!({"@name": format!("[{column}]"), "@role": role})
}

pub fn worksheet(name: &str, mark: &str, columns: Vec<Value>, instances: Vec<Value>, rows: &str, cols: &str) -> Value {
    json!({
        "@name": name,
        "table": {
            "view": {
                "datasource-dependencies": {
                    "@datasource": DS,
                    "column": columns,
                    "column-instance": instances
                }
            },
            "panes": {"pane": {"@id": "0", "mark": {"@class": mark}}},
            "rows": rows,
            "cols": cols
        }
    })
}

/// `[federated.1].[name]` shelf reference.
pub fn shelf(name: &str) -> String {
    format!("[{DS}].[{name}]")
}

pub fn dashboard(name: &str, sheets: &[&str]) -> Value {
    let zones: Vec<Value> = sheets.iter().map(|sheet| json!({"@name": sheet, "@id": "3"})).collect();
    json!({"@name": name, "zones": {"zone": {"@id": "1", "zone": zones}}})
}

pub fn document(datasources: Vec<Value>, worksheets: Vec<Value>, dashboards: Vec<Value>) -> Value {
    json!({
        "workbook": {
            "datasources": {"datasource": datasources},
            "worksheets": {"worksheet": worksheets},
            "dashboards": {"dashboard": dashboards}
        }
    })
}

/// One `orders` table with a few typed columns.
pub fn orders_datasource() -> Value {
    datasource(
        "Superstore",
        table("Orders", "[dbo].[Orders]"),
        vec![
            record("id", "Orders", "integer"),
            record("name", "Orders", "string"),
            record("amount", "Orders", "real"),
            record("Sales", "Orders", "real"),
            record("Region", "Orders", "string"),
            record("Order Date", "Orders", "date"),
        ],
    )
}
