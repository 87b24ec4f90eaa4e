//! Single parse pass from the workbook document to the source model

use std::collections::{HashMap, HashSet};

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};

use crate::gap::{GapKind, GapReport};
use crate::node::{attr, child, child_text, many, path, probe, probe_all, strip_brackets, text, unescape};
use crate::refs::{parse_qualified, parse_shelf, QualifiedRef, Rule};
use crate::workbook::{
    CalculatedField, CalculationId, ColumnId, ColumnInstance, Connection, DashboardLayout, Datasource, DatasourceId,
    FieldRole, FieldType, FieldUse, InstanceId, JoinExpression, LogicalTable, LogicalTableId, MetadataColumn,
    ObjectGraph, Pane, Parameter, Relation, RelationId, RelationKind, Relationship, Workbook, Worksheet,
    PARAMETERS_DATASOURCE,
};

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Syntax error: {0}")]
    Syntax(String),

    #[error("Pest error: {0}")]
    Pest(#[from] pest::error::Error<Rule>),

    #[error("Document has no 'workbook' root")]
    MissingWorkbook,
}

/// Parse a workbook document. `name` becomes the workbook (and project) name.
///
/// Only a missing root is an error; unresolvable references are recorded in
/// `gaps` and dropped.
pub fn parse_workbook(document: &Value, name: &str, gaps: &mut GapReport) -> Result<Workbook, ParseError> {
    let root = child(document, "workbook").ok_or(ParseError::MissingWorkbook)?;
    let mut parser = WorkbookParser {
        workbook: Workbook {
            name: name.to_string(),
            ..Workbook::default()
        },
        gaps,
        relation_nodes: Vec::new(),
    };

    for node in many(path(root, &["datasources", "datasource"])) {
        parser.datasource(node);
    }
    for node in many(path(root, &["worksheets", "worksheet"])) {
        parser.worksheet(node);
    }
    for node in many(path(root, &["dashboards", "dashboard"])) {
        parser.dashboard(node);
    }

    let workbook = parser.workbook;
    info!(
        workbook = %workbook.name,
        datasources = workbook.datasources.len(),
        relations = workbook.relations.len(),
        columns = workbook.columns.len(),
        worksheets = workbook.worksheets.len(),
        "Parsed workbook"
    );
    Ok(workbook)
}

struct WorkbookParser<'d, 'g> {
    workbook: Workbook,
    gaps: &'g mut GapReport,
    /// Document node of every parsed relation, indexed like `workbook.relations`
    relation_nodes: Vec<&'d Value>,
}

impl<'d> WorkbookParser<'d, '_> {
    fn datasource(&mut self, node: &'d Value) {
        let name = attr(node, "name").unwrap_or_default().to_string();
        if name == PARAMETERS_DATASOURCE {
            self.parameters(node);
            return;
        }

        let id = DatasourceId(self.workbook.datasources.len());
        self.workbook.datasources.push(Datasource {
            name,
            caption: attr(node, "caption").map(str::to_string),
            connection: Connection::default(),
            object_graph: None,
            calculations: Vec::new(),
        });
        info!(datasource = %self.workbook.datasource(id).label(), "Parsing datasource");

        if let Some(connection) = child(node, "connection") {
            let root = probe(connection, "relation")
                .and_then(|rel| many(Some(rel)).into_iter().next())
                .map(|rel| self.relation(rel, id, None));
            self.workbook.datasources[id.0].connection = Connection {
                class: attr(connection, "class").map(str::to_string),
                relation: root,
            };
            self.metadata_columns(connection, id);
        }

        if let Some(graph) = probe(node, "object-graph") {
            let graph = self.object_graph(graph, id);
            self.workbook.datasources[id.0].object_graph = Some(graph);
        }

        self.calculations(node, id);
    }

    fn relation(&mut self, node: &'d Value, datasource: DatasourceId, parent: Option<RelationId>) -> RelationId {
        let kind = RelationKind::parse(attr(node, "type").unwrap_or_default());
        let id = RelationId(self.workbook.relations.len());
        self.workbook.relations.push(Relation {
            name: attr(node, "name").map(str::to_string),
            kind: kind.clone(),
            join: attr(node, "join").map(str::to_string),
            connection: attr(node, "connection").map(str::to_string),
            table: attr(node, "table").map(str::to_string),
            sql: text(Some(node)).map(str::to_string),
            clause: None,
            datasource,
            parent,
            children: Vec::new(),
            columns: Vec::new(),
        });
        self.relation_nodes.push(node);

        if matches!(kind, RelationKind::Join | RelationKind::Union | RelationKind::Collection) {
            for child_node in probe_all(node, "relation") {
                let child_id = self.relation(child_node, datasource, Some(id));
                self.workbook.relations[id.0].children.push(child_id);
            }
        }
        if kind == RelationKind::Join {
            self.workbook.relations[id.0].clause = path(node, &["clause", "expression"]).map(join_expression);
        }
        id
    }

    fn metadata_columns(&mut self, connection: &'d Value, datasource: DatasourceId) {
        let relations = self.workbook.datasource_relations(datasource);
        for record in many(path(connection, &["metadata-records", "metadata-record"])) {
            if attr(record, "class") != Some("column") {
                continue;
            }
            let Some(remote_name) = child_text(record, "remote-name") else {
                debug!("Metadata record without remote-name skipped");
                continue;
            };
            let parent_name = child_text(record, "parent-name").map(strip_brackets).unwrap_or_default();
            let owner = relations
                .iter()
                .copied()
                .find(|rel| self.workbook.relation(*rel).name.as_deref() == Some(parent_name));

            let Some(owner) = owner else {
                self.gaps.record(
                    GapKind::LookupFailure,
                    format!("Column '{remote_name}'"),
                    format!("Parent relation '{parent_name}' not found, column dropped"),
                );
                continue;
            };

            let id = ColumnId(self.workbook.columns.len());
            self.workbook.columns.push(MetadataColumn {
                remote_name: remote_name.to_string(),
                local_name: child_text(record, "local-name").map(|n| strip_brackets(n).to_string()),
                remote_type: child_text(record, "remote-type").map(str::to_string),
                local_type: child_text(record, "local-type").map(str::to_string),
                object_id: text(probe(record, "object-id")).map(str::to_string),
                relation: owner,
                datasource,
                instances: Vec::new(),
            });
            self.workbook.relations[owner.0].columns.push(id);
            debug!(column = %remote_name, relation = %parent_name, "Attached metadata column");
        }
    }

    fn object_graph(&mut self, node: &'d Value, datasource: DatasourceId) -> ObjectGraph {
        let own_relations = self.workbook.datasource_relations(datasource);
        let mut graph = ObjectGraph::default();

        for object in many(path(node, &["objects", "object"])) {
            let object_id = attr(object, "id").unwrap_or_default().to_string();
            let relation = many(child(object, "properties"))
                .into_iter()
                .find_map(|props| child(props, "relation"))
                .and_then(|target| {
                    own_relations
                        .iter()
                        .copied()
                        .find(|rel| self.relation_nodes[rel.0] == target)
                });
            if relation.is_none() {
                self.gaps.record(
                    GapKind::LookupFailure,
                    format!("Logical table '{object_id}'"),
                    "Relation pointer does not match any relation of the connection",
                );
            }

            let id = LogicalTableId(self.workbook.logical_tables.len());
            self.workbook.logical_tables.push(LogicalTable {
                id: object_id,
                caption: attr(object, "caption").map(str::to_string),
                relation,
                datasource,
            });
            graph.tables.push(id);
        }

        for relationship in many(path(node, &["relationships", "relationship"])) {
            let first = attr_at(relationship, "first-end-point", "object-id");
            let second = attr_at(relationship, "second-end-point", "object-id");
            let lookup = |object_id: Option<&str>| {
                graph
                    .tables
                    .iter()
                    .copied()
                    .find(|lt| Some(self.workbook.logical_table(*lt).id.as_str()) == object_id)
            };
            match (lookup(first), lookup(second)) {
                (Some(first), Some(second)) => graph.relationships.push(Relationship {
                    first,
                    second,
                    expression: child(relationship, "expression").map(join_expression),
                }),
                _ => self.gaps.record(
                    GapKind::LookupFailure,
                    format!(
                        "Relationship '{}' - '{}'",
                        first.unwrap_or_default(),
                        second.unwrap_or_default()
                    ),
                    "Relationship endpoint is not a logical table of the object graph, relationship dropped",
                ),
            }
        }
        graph
    }

    fn calculations(&mut self, node: &'d Value, datasource: DatasourceId) {
        for column in many(child(node, "column")) {
            let Some(formula) = child(column, "calculation").and_then(|calc| attr(calc, "formula")) else {
                continue;
            };
            let id = CalculationId(self.workbook.calculations.len());
            self.workbook.calculations.push(CalculatedField {
                name: strip_brackets(attr(column, "name").unwrap_or_default()).to_string(),
                caption: attr(column, "caption").map(str::to_string),
                formula: formula.to_string(),
                datasource,
            });
            self.workbook.datasources[datasource.0].calculations.push(id);
        }
    }

    fn parameters(&mut self, node: &'d Value) {
        for column in many(child(node, "column")) {
            self.workbook.parameters.push(Parameter {
                name: strip_brackets(attr(column, "name").unwrap_or_default()).to_string(),
                caption: attr(column, "caption").map(str::to_string),
                datatype: attr(column, "datatype").map(str::to_string),
                value: attr(column, "value").map(str::to_string),
                domain: attr(column, "param-domain-type").map(str::to_string),
            });
        }
        info!(parameters = self.workbook.parameters.len(), "Parsed parameter table");
    }

    /// Metadata column of `datasource` named `name`: local name first, then remote name.
    fn find_column(&self, datasource: DatasourceId, name: &str) -> Option<ColumnId> {
        let candidates: Vec<ColumnId> = self
            .workbook
            .datasource_relations(datasource)
            .into_iter()
            .flat_map(|rel| self.workbook.relation(rel).columns.iter().copied())
            .collect();
        candidates
            .iter()
            .copied()
            .find(|c| self.workbook.column(*c).local_name.as_deref() == Some(name))
            .or_else(|| {
                candidates
                    .iter()
                    .copied()
                    .find(|c| self.workbook.column(*c).remote_name == name)
            })
    }

    fn instance(&mut self, column: ColumnId, node: &'d Value) -> InstanceId {
        let name = strip_brackets(attr(node, "name").unwrap_or_default());
        let existing = self
            .workbook
            .column(column)
            .instances
            .iter()
            .copied()
            .find(|id| self.workbook.instance(*id).name == name);
        if let Some(id) = existing {
            return id;
        }

        let id = InstanceId(self.workbook.instances.len());
        self.workbook.instances.push(ColumnInstance {
            name: name.to_string(),
            column,
            derivation: attr(node, "derivation").map(str::to_string),
            pivot: attr(node, "pivot").map(str::to_string),
            field_type: FieldType::parse(attr(node, "type")),
        });
        self.workbook.columns[column.0].instances.push(id);
        id
    }

    fn worksheet(&mut self, node: &'d Value) {
        let mut sheet = Worksheet {
            name: attr(node, "name").unwrap_or_default().to_string(),
            ..Worksheet::default()
        };
        info!(worksheet = %sheet.name, "Parsing worksheet");
        sheet.title = title(node, &sheet.name);

        let mut used: HashMap<QualifiedRef, FieldUse> = HashMap::new();
        let mut dropped: HashSet<QualifiedRef> = HashSet::new();

        for dependency in many(path(node, &["table", "view", "datasource-dependencies"])) {
            let ds_name = attr(dependency, "datasource").unwrap_or_default();
            if ds_name == PARAMETERS_DATASOURCE {
                for column in many(child(dependency, "column")) {
                    let name = attr(column, "caption")
                        .or_else(|| attr(column, "name").map(strip_brackets))
                        .unwrap_or_default();
                    if !sheet.parameters.iter().any(|p| p == name) {
                        sheet.parameters.push(name.to_string());
                    }
                }
                continue;
            }
            let Some(datasource) = self.workbook.datasource_by_name(ds_name) else {
                self.gaps.record(
                    GapKind::LookupFailure,
                    format!("Worksheet '{}'", sheet.name),
                    format!("Datasource '{ds_name}' not found"),
                );
                continue;
            };
            if !sheet.datasources.contains(&datasource) {
                sheet.datasources.push(datasource);
            }

            let roles: HashMap<&str, FieldRole> = many(child(dependency, "column"))
                .into_iter()
                .filter_map(|c| Some((attr(c, "name")?, FieldRole::parse(attr(c, "role")))))
                .collect();

            for instance_node in many(child(dependency, "column-instance")) {
                let column_ref = attr(instance_node, "column").unwrap_or_default();
                let column_name = strip_brackets(column_ref);
                let key = QualifiedRef::new(ds_name, strip_brackets(attr(instance_node, "name").unwrap_or_default()));

                if let Some(column) = self.find_column(datasource, column_name) {
                    let instance = self.instance(column, instance_node);
                    used.insert(
                        key,
                        FieldUse {
                            instance,
                            role: roles.get(column_ref).copied().unwrap_or_default(),
                            field_type: self.workbook.instance(instance).field_type,
                        },
                    );
                    continue;
                }

                let calculation = self
                    .workbook
                    .datasource(datasource)
                    .calculations
                    .iter()
                    .copied()
                    .find(|c| self.workbook.calculation(*c).name == column_name);
                match calculation {
                    Some(calc) => {
                        if !sheet.calculations.contains(&calc) {
                            sheet.calculations.push(calc);
                        }
                        self.gaps.record(
                            GapKind::Untranslated,
                            format!("Worksheet '{}'", sheet.name),
                            format!("Calculated field '{column_name}' is not translated, its usage is dropped"),
                        );
                    }
                    None => self.gaps.record(
                        GapKind::LookupFailure,
                        format!("Worksheet '{}'", sheet.name),
                        format!("Column '{column_name}' not found in datasource '{ds_name}'"),
                    ),
                }
                dropped.insert(key);
            }
        }

        for (keys, target) in [(&["table", "rows"], &mut sheet.rows), (&["table", "cols"], &mut sheet.cols)] {
            let Some(shelf) = text(path(node, keys)) else {
                continue;
            };
            match parse_shelf(shelf) {
                Ok(refs) => {
                    for r in refs {
                        if let Some(field) = used.get(&r) {
                            target.push(*field);
                        } else if !dropped.contains(&r) {
                            debug!(worksheet = %sheet.name, shelf = %shelf, "Shelf reference without column instance");
                        }
                    }
                }
                Err(err) => debug!(worksheet = %sheet.name, error = %err, "Unreadable shelf"),
            }
        }

        for pane_node in many(path(node, &["table", "panes", "pane"])) {
            let pane = self.pane(pane_node, &sheet.name);
            for (encoding, target) in [
                ("text", &mut sheet.pane_text),
                ("wedge-size", &mut sheet.pane_size),
                ("color", &mut sheet.pane_color),
            ] {
                for r in pane.encodings.get(encoding).into_iter().flatten() {
                    if let Some(field) = used.get(r) {
                        target.push(*field);
                    }
                }
            }
            sheet.panes.push(pane);
        }

        debug!(
            worksheet = %sheet.name,
            mark = %sheet.mark(),
            rows = sheet.rows.len(),
            cols = sheet.cols.len(),
            "Parsed worksheet"
        );
        self.workbook.worksheets.push(sheet);
    }

    fn pane(&mut self, node: &'d Value, worksheet: &str) -> Pane {
        let mut pane = Pane {
            id: attr(node, "id").map(str::to_string),
            mark: child(node, "mark").and_then(|m| attr(m, "class")).map(str::to_string),
            ..Pane::default()
        };
        if let Some(Value::Object(encodings)) = child(node, "encodings") {
            for (kind, entries) in encodings {
                for entry in many(Some(entries)) {
                    let Some(column) = attr(entry, "column") else {
                        continue;
                    };
                    match parse_qualified(column) {
                        Ok(r) => pane.encodings.entry(kind.clone()).or_default().push(r),
                        Err(err) => debug!(worksheet = %worksheet, error = %err, "Unreadable encoding reference"),
                    }
                }
            }
        }
        pane
    }

    fn dashboard(&mut self, node: &'d Value) {
        let name = attr(node, "name").unwrap_or_default().to_string();
        let mut sheets = Vec::new();
        let mut stack: Vec<&Value> = many(path(node, &["zones", "zone"]));
        stack.reverse();
        while let Some(zone) = stack.pop() {
            if let Some(sheet) = attr(zone, "name") {
                let known = self.workbook.worksheets.iter().any(|w| w.name == sheet);
                if known && !sheets.iter().any(|s| s == sheet) {
                    sheets.push(sheet.to_string());
                }
            }
            let mut nested = many(child(zone, "zone"));
            nested.reverse();
            stack.extend(nested);
        }
        debug!(dashboard = %name, sheets = sheets.len(), "Parsed dashboard layout");
        self.workbook.dashboards.push(DashboardLayout { name, sheets });
    }
}

fn attr_at<'a>(node: &'a Value, key: &str, name: &str) -> Option<&'a str> {
    child(node, key).and_then(|c| attr(c, name))
}

fn join_expression(node: &Value) -> JoinExpression {
    let op = attr(node, "op").map(unescape).unwrap_or_default();
    let children = many(child(node, "expression"));
    if op.eq_ignore_ascii_case("AND") {
        return JoinExpression::And(children.into_iter().map(join_expression).collect());
    }
    match children.as_slice() {
        [left, right] if child(left, "expression").is_none() && child(right, "expression").is_none() => {
            JoinExpression::Compare {
                left: attr(left, "op").unwrap_or_default().to_string(),
                right: attr(right, "op").unwrap_or_default().to_string(),
                op,
            }
        }
        _ => JoinExpression::Unsupported(op),
    }
}

/// Worksheet title from its formatted-text runs; `Æ` runs are line breaks.
fn title(node: &Value, sheet_name: &str) -> Option<String> {
    let parts: Vec<String> = many(path(node, &["layout-options", "title", "formatted-text", "run"]))
        .into_iter()
        .filter_map(|run| text(Some(run)))
        .filter(|t| t.trim() != "Æ")
        .map(|t| t.replace("<Sheet Name>", sheet_name))
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(" "))
    }
}
