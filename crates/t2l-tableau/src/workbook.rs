//! Source schema model
//!
//! Everything parsed from one workbook lives in flat arenas owned by
//! [`Workbook`]. Entities point at each other with the typed indices below;
//! children know their parent, parents list their children, nothing holds a
//! reference.

use std::collections::BTreeMap;

use crate::refs::QualifiedRef;

macro_rules! arena_id {
    ($($name:ident),+ $(,)?) => {
        $(
            #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
            pub struct $name(pub usize);
        )+
    };
}

arena_id!(DatasourceId, RelationId, ColumnId, InstanceId, LogicalTableId, CalculationId, WorksheetId);

/// Name of the pseudo-datasource holding workbook parameters
pub const PARAMETERS_DATASOURCE: &str = "Parameters";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelationKind {
    Table,
    Text,
    Union,
    Join,
    Collection,
    Other(String),
}

impl RelationKind {
    pub fn parse(text: &str) -> Self {
        match text {
            "table" => RelationKind::Table,
            "text" => RelationKind::Text,
            "union" => RelationKind::Union,
            "join" => RelationKind::Join,
            "collection" => RelationKind::Collection,
            other => RelationKind::Other(other.to_string()),
        }
    }

    /// Kinds that materialize as a view
    pub fn is_leaf(&self) -> bool {
        matches!(self, RelationKind::Table | RelationKind::Text | RelationKind::Union)
    }
}

/// Join predicate tree of a relation or relationship.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinExpression {
    And(Vec<JoinExpression>),
    /// `left op right`; operands are the raw operand strings
    Compare { op: String, left: String, right: String },
    /// Anything else, kept as its operator text
    Unsupported(String),
}

impl JoinExpression {
    /// Comparison leaves in order; `AND` nodes are flattened.
    pub fn comparisons(&self) -> Vec<(&str, &str, &str)> {
        let mut out = Vec::new();
        self.collect(&mut out);
        out
    }

    /// Operators of every node that is neither `AND` nor a comparison.
    pub fn unsupported(&self) -> Vec<&str> {
        match self {
            JoinExpression::And(children) => children.iter().flat_map(JoinExpression::unsupported).collect(),
            JoinExpression::Compare { .. } => Vec::new(),
            JoinExpression::Unsupported(op) => vec![op.as_str()],
        }
    }

    fn collect<'a>(&'a self, out: &mut Vec<(&'a str, &'a str, &'a str)>) {
        match self {
            JoinExpression::And(children) => children.iter().for_each(|c| c.collect(out)),
            JoinExpression::Compare { op, left, right } => out.push((left.as_str(), op.as_str(), right.as_str())),
            JoinExpression::Unsupported(_) => {}
        }
    }
}

#[derive(Debug, Clone)]
pub struct Relation {
    pub name: Option<String>,
    pub kind: RelationKind,
    /// `inner`, `left`, `right`, `full` for joins
    pub join: Option<String>,
    pub connection: Option<String>,
    /// Bracketed table path, e.g. `[dbo].[Orders]`
    pub table: Option<String>,
    /// Custom SQL body of `text` relations
    pub sql: Option<String>,
    pub clause: Option<JoinExpression>,
    pub datasource: DatasourceId,
    pub parent: Option<RelationId>,
    pub children: Vec<RelationId>,
    pub columns: Vec<ColumnId>,
}

impl Relation {
    pub fn display_name(&self) -> String {
        match &self.name {
            Some(name) => format!("Relation '{name}'"),
            None => format!("Relation <{}>", self.kind_name()),
        }
    }

    pub fn kind_name(&self) -> &str {
        match &self.kind {
            RelationKind::Table => "table",
            RelationKind::Text => "text",
            RelationKind::Union => "union",
            RelationKind::Join => "join",
            RelationKind::Collection => "collection",
            RelationKind::Other(other) => other,
        }
    }
}

/// A physical column from the connection's metadata records.
#[derive(Debug, Clone)]
pub struct MetadataColumn {
    pub remote_name: String,
    /// Local name with brackets stripped
    pub local_name: Option<String>,
    pub remote_type: Option<String>,
    pub local_type: Option<String>,
    pub object_id: Option<String>,
    pub relation: RelationId,
    pub datasource: DatasourceId,
    pub instances: Vec<InstanceId>,
}

impl MetadataColumn {
    pub fn name(&self) -> &str {
        self.local_name.as_deref().unwrap_or(&self.remote_name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FieldRole {
    Dimension,
    Measure,
    #[default]
    Unknown,
}

impl FieldRole {
    pub fn parse(text: Option<&str>) -> Self {
        match text {
            Some("dimension") => FieldRole::Dimension,
            Some("measure") => FieldRole::Measure,
            _ => FieldRole::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FieldType {
    Ordinal,
    Quantitative,
    Nominal,
    #[default]
    Unknown,
}

impl FieldType {
    pub fn parse(text: Option<&str>) -> Self {
        match text {
            Some("ordinal") => FieldType::Ordinal,
            Some("quantitative") => FieldType::Quantitative,
            Some("nominal") => FieldType::Nominal,
            _ => FieldType::Unknown,
        }
    }
}

/// Worksheet-level usage of a metadata column, e.g. `[sum:Sales:qk]`.
#[derive(Debug, Clone)]
pub struct ColumnInstance {
    /// Instance name with brackets stripped
    pub name: String,
    pub column: ColumnId,
    pub derivation: Option<String>,
    pub pivot: Option<String>,
    pub field_type: FieldType,
}

#[derive(Debug, Clone)]
pub struct LogicalTable {
    pub id: String,
    pub caption: Option<String>,
    pub relation: Option<RelationId>,
    pub datasource: DatasourceId,
}

#[derive(Debug, Clone)]
pub struct Relationship {
    pub first: LogicalTableId,
    pub second: LogicalTableId,
    pub expression: Option<JoinExpression>,
}

#[derive(Debug, Clone, Default)]
pub struct ObjectGraph {
    pub tables: Vec<LogicalTableId>,
    pub relationships: Vec<Relationship>,
}

#[derive(Debug, Clone, Default)]
pub struct Connection {
    pub class: Option<String>,
    pub relation: Option<RelationId>,
}

/// A datasource column defined by a formula.
#[derive(Debug, Clone)]
pub struct CalculatedField {
    /// Name with brackets stripped
    pub name: String,
    pub caption: Option<String>,
    pub formula: String,
    pub datasource: DatasourceId,
}

impl CalculatedField {
    pub fn display_name(&self) -> &str {
        self.caption.as_deref().unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone)]
pub struct Datasource {
    pub name: String,
    pub caption: Option<String>,
    pub connection: Connection,
    pub object_graph: Option<ObjectGraph>,
    pub calculations: Vec<CalculationId>,
}

impl Datasource {
    pub fn label(&self) -> &str {
        self.caption.as_deref().unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    pub name: String,
    pub caption: Option<String>,
    pub datatype: Option<String>,
    pub value: Option<String>,
    pub domain: Option<String>,
}

/// One usage of a column instance on a shelf or pane encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldUse {
    pub instance: InstanceId,
    pub role: FieldRole,
    pub field_type: FieldType,
}

#[derive(Debug, Clone, Default)]
pub struct Pane {
    pub id: Option<String>,
    pub mark: Option<String>,
    /// Encoding kind (`text`, `color`, ...) to referenced instances
    pub encodings: BTreeMap<String, Vec<QualifiedRef>>,
}

#[derive(Debug, Clone, Default)]
pub struct Worksheet {
    pub name: String,
    pub title: Option<String>,
    pub datasources: Vec<DatasourceId>,
    pub rows: Vec<FieldUse>,
    pub cols: Vec<FieldUse>,
    pub panes: Vec<Pane>,
    pub pane_text: Vec<FieldUse>,
    pub pane_size: Vec<FieldUse>,
    pub pane_color: Vec<FieldUse>,
    pub calculations: Vec<CalculationId>,
    pub parameters: Vec<String>,
}

impl Worksheet {
    /// Mark class of the first pane; `Automatic` when there are no panes
    pub fn mark(&self) -> &str {
        self.panes
            .first()
            .and_then(|pane| pane.mark.as_deref())
            .unwrap_or("Automatic")
    }
}

/// A workbook dashboard: the worksheets placed in its zones
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DashboardLayout {
    pub name: String,
    pub sheets: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct Workbook {
    pub name: String,
    pub datasources: Vec<Datasource>,
    pub relations: Vec<Relation>,
    pub columns: Vec<MetadataColumn>,
    pub instances: Vec<ColumnInstance>,
    pub logical_tables: Vec<LogicalTable>,
    pub calculations: Vec<CalculatedField>,
    pub parameters: Vec<Parameter>,
    pub worksheets: Vec<Worksheet>,
    pub dashboards: Vec<DashboardLayout>,
}

impl Workbook {
    pub fn datasource(&self, id: DatasourceId) -> &Datasource {
        &self.datasources[id.0]
    }

    pub fn relation(&self, id: RelationId) -> &Relation {
        &self.relations[id.0]
    }

    pub fn column(&self, id: ColumnId) -> &MetadataColumn {
        &self.columns[id.0]
    }

    pub fn instance(&self, id: InstanceId) -> &ColumnInstance {
        &self.instances[id.0]
    }

    pub fn logical_table(&self, id: LogicalTableId) -> &LogicalTable {
        &self.logical_tables[id.0]
    }

    pub fn calculation(&self, id: CalculationId) -> &CalculatedField {
        &self.calculations[id.0]
    }

    pub fn datasource_by_name(&self, name: &str) -> Option<DatasourceId> {
        self.datasources.iter().position(|ds| ds.name == name).map(DatasourceId)
    }

    pub fn datasource_ids(&self) -> impl Iterator<Item = DatasourceId> {
        (0..self.datasources.len()).map(DatasourceId)
    }

    pub fn worksheet_ids(&self) -> impl Iterator<Item = WorksheetId> {
        (0..self.worksheets.len()).map(WorksheetId)
    }

    pub fn worksheet(&self, id: WorksheetId) -> &Worksheet {
        &self.worksheets[id.0]
    }

    /// `root` and all relations below it, pre-order.
    pub fn subtree(&self, root: RelationId) -> Vec<RelationId> {
        let mut out = Vec::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            out.push(id);
            stack.extend(self.relation(id).children.iter().rev().copied());
        }
        out
    }

    /// Relations of a datasource's connection tree, pre-order.
    pub fn datasource_relations(&self, id: DatasourceId) -> Vec<RelationId> {
        self.datasource(id)
            .connection
            .relation
            .map(|root| self.subtree(root))
            .unwrap_or_default()
    }

    /// Closest enclosing union, if `id` sits inside one.
    pub fn enclosing_union(&self, id: RelationId) -> Option<RelationId> {
        let mut current = self.relation(id).parent;
        while let Some(parent) = current {
            if self.relation(parent).kind == RelationKind::Union {
                return Some(parent);
            }
            current = self.relation(parent).parent;
        }
        None
    }

    /// Datasource a column instance ultimately reads from
    pub fn instance_datasource(&self, id: InstanceId) -> DatasourceId {
        self.column(self.instance(id).column).datasource
    }
}
