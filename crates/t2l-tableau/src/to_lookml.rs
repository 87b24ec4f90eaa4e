//! Workbook → LookML project translation
//!
//! Every mapping is memoized by the arena index of its source node, so a
//! relation becomes at most one view and one explore no matter how many
//! places reach it. [`translate`] runs the mappings in dependency order:
//! models, views, base fields, explores, dashboard elements, dashboards.

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use t2l_lookml::{
    Aggregation, BaseField, Dashboard, DashboardElement, DerivedField, ElementField, ElementId, Explore, ExploreId,
    ExploreSide, Field, FieldId, FieldKind, FieldRef, Join, JoinKind, Model, ModelId, ParameterField, Predicate,
    Project, ProjectError, ProjectSettings, TimeDatatype, Timeframe, View, ViewId, ViewSource,
};
use tracing::{debug, info};

use crate::assess::{assess, formula_complexity, WorksheetAssessment};
use crate::classify::classify_worksheet;
use crate::gap::{GapKind, GapReport};
use crate::node::strip_brackets;
use crate::refs::parse_path;
use crate::workbook::{
    ColumnId, DatasourceId, InstanceId, JoinExpression, LogicalTableId, MetadataColumn, Relation, RelationId,
    RelationKind, Workbook, WorksheetId,
};

/// Result of translating one workbook.
#[derive(Debug, Clone)]
pub struct Translation {
    pub project: Project,
    pub gaps: GapReport,
    pub assessment: Vec<WorksheetAssessment>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub models: usize,
    pub views: usize,
    pub explores: usize,
    pub dashboards: usize,
    pub elements: usize,
    pub gaps: usize,
}

/// Serializable review report: gaps plus the migration assessment.
#[derive(Debug, Clone, Serialize)]
pub struct Report<'a> {
    pub project: &'a str,
    pub summary: Summary,
    pub gaps: &'a GapReport,
    pub assessment: &'a [WorksheetAssessment],
}

impl Translation {
    pub fn summary(&self) -> Summary {
        let models: Vec<&Model> = self.project.models().map(|(_, _, m)| m).collect();
        Summary {
            models: models.len(),
            views: models.iter().map(|m| m.views().count()).sum(),
            explores: models.iter().map(|m| m.named_explores().count()).sum(),
            dashboards: self.project.dashboards().count(),
            elements: self.project.elements().count(),
            gaps: self.gaps.len(),
        }
    }

    pub fn report(&self) -> Report<'_> {
        Report {
            project: self.project.name(),
            summary: self.summary(),
            gaps: &self.gaps,
            assessment: &self.assessment,
        }
    }
}

/// Source join kind to LookML join type; `None` for kinds without a counterpart.
///
/// `right` has no LookML equivalent and maps to a full outer join.
pub fn map_join_kind(join: &str) -> Option<JoinKind> {
    match join {
        "inner" => Some(JoinKind::Inner),
        "left" => Some(JoinKind::LeftOuter),
        "right" | "full" => Some(JoinKind::FullOuter),
        _ => None,
    }
}

/// Field kind for a column's local type; `None` when the type is not recognized.
pub fn map_field_kind(local_type: &str) -> Option<(FieldKind, Option<TimeDatatype>)> {
    match local_type {
        "string" => Some((FieldKind::String, None)),
        "integer" | "real" => Some((FieldKind::Number, None)),
        "boolean" => Some((FieldKind::YesNo, None)),
        "date" => Some((FieldKind::Time, Some(TimeDatatype::Date))),
        "datetime" => Some((FieldKind::Time, Some(TimeDatatype::Datetime))),
        _ => None,
    }
}

/// What a column-instance derivation turns into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Derivation {
    /// The base field itself
    Base,
    /// A measure over the base field
    Measure(Aggregation),
    /// A timeframe of a dimension group, referenced by name only
    Truncate(Timeframe),
    Unrecognized,
}

pub fn derivation(text: Option<&str>) -> Derivation {
    match text {
        None | Some("None") => Derivation::Base,
        Some("Sum") => Derivation::Measure(Aggregation::Sum),
        Some("Count") => Derivation::Measure(Aggregation::Count),
        Some("CountD") => Derivation::Measure(Aggregation::CountDistinct),
        Some("Avg") => Derivation::Measure(Aggregation::Average),
        Some("Year") | Some("Year-Trunc") => Derivation::Truncate(Timeframe::Year),
        Some("Month-Trunc") => Derivation::Truncate(Timeframe::Month),
        Some("Quarter-Trunc") => Derivation::Truncate(Timeframe::Quarter),
        Some(_) => Derivation::Unrecognized,
    }
}

/// Translate a parsed workbook. Parse-time gaps passed in are kept in the result.
pub fn translate(workbook: &Workbook, settings: ProjectSettings, gaps: GapReport) -> Translation {
    let mut translator = Translator::new(workbook, settings, gaps);
    translator.run();

    let translation = Translation {
        project: translator.project,
        gaps: translator.gaps,
        assessment: assess(workbook),
    };
    let summary = translation.summary();
    info!(
        project = %translation.project.name(),
        models = summary.models,
        views = summary.views,
        explores = summary.explores,
        dashboards = summary.dashboards,
        elements = summary.elements,
        gaps = summary.gaps,
        "Translation finished"
    );
    translation
}

struct Translator<'w> {
    workbook: &'w Workbook,
    project: Project,
    gaps: GapReport,
    models: Vec<Option<ModelId>>,
    views: HashMap<RelationId, Option<ViewId>>,
    base_fields: HashMap<ColumnId, Option<FieldRef>>,
    measures: HashMap<(ColumnId, Aggregation), FieldId>,
    explores: HashMap<RelationId, Option<ExploreId>>,
    top_explores: HashMap<DatasourceId, ExploreId>,
    element_fields: HashMap<InstanceId, Option<ElementField>>,
    elements: Vec<(WorksheetId, ElementId)>,
}

impl<'w> Translator<'w> {
    fn new(workbook: &'w Workbook, settings: ProjectSettings, gaps: GapReport) -> Self {
        Self {
            workbook,
            project: Project::new(&workbook.name, settings),
            gaps,
            models: Vec::new(),
            views: HashMap::new(),
            base_fields: HashMap::new(),
            measures: HashMap::new(),
            explores: HashMap::new(),
            top_explores: HashMap::new(),
            element_fields: HashMap::new(),
            elements: Vec::new(),
        }
    }

    fn run(&mut self) {
        let wb = self.workbook;

        for ds in wb.datasource_ids() {
            let label = wb.datasource(ds).label();
            let model = match self.project.add_model(label, Model::new()) {
                Ok(id) => Some(id),
                Err(err) => {
                    self.project_gap(format!("Datasource '{label}'"), err);
                    None
                }
            };
            self.models.push(model);
        }

        for idx in 0..wb.relations.len() {
            let rel = RelationId(idx);
            if wb.relation(rel).kind.is_leaf() && wb.enclosing_union(rel).is_none() {
                self.view(rel);
            }
        }
        for idx in 0..wb.columns.len() {
            self.base_field(ColumnId(idx));
        }

        for ds in wb.datasource_ids() {
            self.datasource_explore(ds);
        }
        self.parameters_view();
        self.calculations();

        for ws in wb.worksheet_ids() {
            self.element(ws);
        }
        self.dashboards();
    }

    fn project_gap(&mut self, subject: String, err: ProjectError) {
        let kind = match err {
            ProjectError::Naming(_) => GapKind::NamingExhaustion,
            ProjectError::UnknownModel(_) | ProjectError::UnknownDashboard(_) => GapKind::LookupFailure,
        };
        self.gaps.record(kind, subject, err.to_string());
    }

    fn model_of(&self, ds: DatasourceId) -> Option<ModelId> {
        self.models.get(ds.0).copied().flatten()
    }

    fn view_mut(&mut self, model: ModelId, view: ViewId) -> Option<&mut View> {
        self.project.model_mut(model)?.view_mut(view)
    }

    fn table_path(relation: &Relation) -> Vec<String> {
        let table = relation.table.as_deref().unwrap_or_default();
        match parse_path(table) {
            Ok(segments) => segments,
            Err(err) => {
                debug!(table = %table, error = %err, "Table reference is not bracketed, used as is");
                vec![strip_brackets(table).to_string()]
            }
        }
    }

    /// View of a `table`, `text` or `union` relation. Tables inside a union
    /// share the union's view.
    fn view(&mut self, rel: RelationId) -> Option<ViewId> {
        if let Some(memo) = self.views.get(&rel) {
            return *memo;
        }
        let wb = self.workbook;
        let result = match wb.enclosing_union(rel) {
            Some(union) => self.view(union),
            None => self.build_view(rel),
        };
        self.views.insert(rel, result);
        result
    }

    fn build_view(&mut self, rel: RelationId) -> Option<ViewId> {
        let wb = self.workbook;
        let relation = wb.relation(rel);
        let view = match relation.kind {
            RelationKind::Table => View::table(Self::table_path(relation)),
            RelationKind::Text => View::derived(relation.sql.clone().unwrap_or_default()),
            RelationKind::Union => {
                let first = relation
                    .children
                    .first()
                    .map(|child| wb.relation(*child))
                    .filter(|child| child.table.is_some());
                let Some(first) = first else {
                    self.gaps.record(
                        GapKind::UnsupportedConstruct,
                        relation.display_name(),
                        "Union has no table to read from, no view generated",
                    );
                    return None;
                };
                self.gaps.record(
                    GapKind::Approximation,
                    relation.display_name(),
                    "Union is translated from its first table only",
                );
                View::table(Self::table_path(first))
            }
            RelationKind::Join | RelationKind::Collection | RelationKind::Other(_) => return None,
        };

        let model = self.model_of(relation.datasource)?;
        let label = relation.name.as_deref().unwrap_or(relation.kind_name());
        match self.project.add_view(model, label, view) {
            Ok(id) => {
                info!(
                    view = %self.project.model(model).and_then(|m| m.view_name(id)).unwrap_or_default(),
                    relation = %relation.display_name(),
                    "Created view"
                );
                Some(id)
            }
            Err(err) => {
                self.project_gap(relation.display_name(), err);
                None
            }
        }
    }

    fn base_field(&mut self, col: ColumnId) -> Option<FieldRef> {
        if let Some(memo) = self.base_fields.get(&col) {
            return *memo;
        }
        let result = self.build_base_field(col);
        self.base_fields.insert(col, result);
        result
    }

    fn build_base_field(&mut self, col: ColumnId) -> Option<FieldRef> {
        let wb = self.workbook;
        let column = wb.column(col);
        let relation = wb.relation(column.relation);
        let Some(view) = self.view(column.relation) else {
            self.gaps.record(
                GapKind::LookupFailure,
                format!("Column '{}'", column.remote_name),
                format!("{} has no view, column dropped", relation.display_name()),
            );
            return None;
        };
        let model = self.model_of(column.datasource)?;

        let field = Self::base_field_for(wb, column, relation);
        let added = self
            .view_mut(model, view)?
            .add_field(&column.remote_name, Field::Base(field));
        match added {
            Ok(field) => Some(FieldRef::new(view, field)),
            Err(err) => {
                self.gaps.record(
                    GapKind::NamingExhaustion,
                    format!("Column '{}'", column.remote_name),
                    err.to_string(),
                );
                None
            }
        }
    }

    fn base_field_for(wb: &Workbook, column: &MetadataColumn, relation: &Relation) -> BaseField {
        let local_type = column.local_type.as_deref().unwrap_or_default();
        let mut field = match map_field_kind(local_type) {
            Some((_, Some(datatype))) => BaseField::time(column.remote_name.as_str(), datatype),
            Some((kind, None)) => BaseField::new(column.remote_name.as_str()).with_kind(kind),
            None => {
                debug!(column = %column.remote_name, local_type = %local_type, "Unrecognized column type, using string");
                BaseField::new(column.remote_name.as_str())
            }
        };
        if let Some(local) = &column.local_name {
            if *local != column.remote_name {
                field.label = Some(local.clone());
            }
        }
        field.description = Some(format!(
            "Metarecord parsed from Tableau datasource '{}', relation '{}'.",
            wb.datasource(column.datasource).label(),
            relation.name.as_deref().unwrap_or(relation.kind_name())
        ));
        field
    }

    fn explore(&mut self, rel: RelationId) -> Option<ExploreId> {
        if let Some(memo) = self.explores.get(&rel) {
            return *memo;
        }
        let result = self.build_explore(rel);
        self.explores.insert(rel, result);
        result
    }

    fn build_explore(&mut self, rel: RelationId) -> Option<ExploreId> {
        let wb = self.workbook;
        let relation = wb.relation(rel);
        let model = self.model_of(relation.datasource)?;
        let explore = match &relation.kind {
            kind if kind.is_leaf() => Explore::wrap(self.view(rel)?),
            RelationKind::Join => self.join_explore(rel)?,
            RelationKind::Collection => return None,
            RelationKind::Other(kind) => {
                self.gaps.record(
                    GapKind::UnsupportedConstruct,
                    relation.display_name(),
                    format!("Relation type '{kind}' is not supported, subtree skipped"),
                );
                return None;
            }
            _ => return None,
        };
        self.project.model_mut(model).map(|m| m.push_explore(explore))
    }

    fn join_explore(&mut self, rel: RelationId) -> Option<Explore> {
        let wb = self.workbook;
        let relation = wb.relation(rel);
        let (Some(&left), Some(&right)) = (relation.children.first(), relation.children.get(1)) else {
            self.gaps.record(
                GapKind::UnsupportedConstruct,
                relation.display_name(),
                "Join does not have two relations",
            );
            return None;
        };

        let join_text = relation.join.as_deref().unwrap_or_default();
        let Some(kind) = map_join_kind(join_text) else {
            self.gaps.record(
                GapKind::UnsupportedConstruct,
                relation.display_name(),
                format!("Join type '{join_text}' is not supported, subtree skipped"),
            );
            return None;
        };
        if join_text == "right" {
            self.gaps.record(
                GapKind::Approximation,
                relation.display_name(),
                "Right join converted to full outer join",
            );
        }

        let left_side = if wb.relation(left).kind.is_leaf() {
            ExploreSide::View(self.view(left)?)
        } else {
            ExploreSide::Explore(self.explore(left)?)
        };
        if !wb.relation(right).kind.is_leaf() {
            self.gaps.record(
                GapKind::UnsupportedConstruct,
                relation.display_name(),
                format!("Right side of the join is a {}, not a table", wb.relation(right).kind_name()),
            );
            return None;
        }
        let right_view = self.view(right)?;

        let mut join = Join::new(right_view, kind);
        if let Some(clause) = &relation.clause {
            join.predicates = self.predicates(clause, &relation.display_name(), |t, operand, _| {
                t.relation_operand(rel, operand)
            });
        }
        Some(Explore::joined(left_side, join))
    }

    /// Predicates of a join expression; unresolved comparisons and
    /// non-comparison nodes are dropped, one gap each.
    ///
    /// `resolve` gets each operand with its position, `true` for the left one.
    fn predicates<F>(&mut self, expression: &JoinExpression, subject: &str, resolve: F) -> Vec<Predicate>
    where
        F: Fn(&mut Self, &str, bool) -> Option<FieldRef>,
    {
        for op in expression.unsupported() {
            self.gaps.record(
                GapKind::UnsupportedConstruct,
                subject,
                format!("Join expression '{op}' is not a comparison, dropped from the join condition"),
            );
        }
        let mut predicates = Vec::new();
        for (left, op, right) in expression.comparisons() {
            match (resolve(self, left, true), resolve(self, right, false)) {
                (Some(l), Some(r)) => predicates.push(Predicate::new(l, op, r)),
                _ => self.gaps.record(
                    GapKind::LookupFailure,
                    subject,
                    format!("Join predicate '{left} {op} {right}' could not be resolved, predicate dropped"),
                ),
            }
        }
        predicates
    }

    /// `[relation].[column]` inside a relation join clause, by remote name.
    fn relation_operand(&mut self, rel: RelationId, operand: &str) -> Option<FieldRef> {
        let wb = self.workbook;
        let segments = parse_path(operand).ok()?;
        let [relation_name, column_name] = segments.as_slice() else {
            return None;
        };
        let column = wb
            .subtree(rel)
            .into_iter()
            .filter(|r| wb.relation(*r).name.as_deref() == Some(relation_name.as_str()))
            .flat_map(|r| wb.relation(r).columns.iter().copied())
            .find(|c| wb.column(*c).remote_name == *column_name)?;
        self.base_field(column)
    }

    /// Bare `[column]` of a relationship endpoint, by local name.
    fn relationship_operand(&mut self, table: LogicalTableId, operand: &str) -> Option<FieldRef> {
        let wb = self.workbook;
        let name = strip_brackets(operand);
        let root = wb.logical_table(table).relation?;
        let column = wb
            .subtree(root)
            .into_iter()
            .flat_map(|r| wb.relation(r).columns.iter().copied())
            .find(|c| wb.column(*c).local_name.as_deref() == Some(name))?;
        self.base_field(column)
    }

    /// First explore found walking the logical table's relation subtree.
    fn logical_table_explore(&mut self, table: LogicalTableId) -> Option<ExploreId> {
        let wb = self.workbook;
        let root = wb.logical_table(table).relation?;
        wb.subtree(root).into_iter().find_map(|rel| self.explore(rel))
    }

    /// Base view and joins of an explore chain, innermost first.
    fn flatten(&self, model: ModelId, explore: ExploreId) -> Option<(ViewId, Vec<Join>)> {
        let model = self.project.model(model)?;
        let mut joins = Vec::new();
        let mut current = model.explore(explore)?;
        loop {
            if let Some(join) = &current.join {
                joins.push(join.clone());
            }
            match current.left {
                ExploreSide::View(view) => {
                    joins.reverse();
                    return Some((view, joins));
                }
                ExploreSide::Explore(inner) => current = model.explore(inner)?,
            }
        }
    }

    fn push_level(&mut self, model: ModelId, head: ExploreSide, join: Join) -> Option<ExploreSide> {
        let id = self.project.model_mut(model)?.push_explore(Explore::joined(head, join));
        Some(ExploreSide::Explore(id))
    }

    /// Chain every relationship of the object graph onto one explore.
    fn object_graph_explore(&mut self, ds: DatasourceId) -> Option<ExploreId> {
        let wb = self.workbook;
        let graph = wb.datasource(ds).object_graph.as_ref()?;
        let model = self.model_of(ds)?;
        if graph.relationships.is_empty() {
            return graph.tables.first().and_then(|lt| self.logical_table_explore(*lt));
        }

        let mut head: Option<ExploreSide> = None;
        for relationship in &graph.relationships {
            let first = wb.logical_table(relationship.first);
            let second = wb.logical_table(relationship.second);
            let subject = format!("Relationship '{}' - '{}'", first.id, second.id);

            if head.is_none() {
                head = match first.relation {
                    Some(root) if wb.relation(root).kind.is_leaf() => self.view(root).map(ExploreSide::View),
                    _ => self.logical_table_explore(relationship.first).map(ExploreSide::Explore),
                };
            }
            let Some(current) = head else {
                self.gaps.record(
                    GapKind::LookupFailure,
                    subject,
                    format!("Logical table '{}' has no explore, relationship skipped", first.id),
                );
                continue;
            };
            let chain = self
                .logical_table_explore(relationship.second)
                .and_then(|explore| self.flatten(model, explore));
            let Some((base, joins)) = chain else {
                self.gaps.record(
                    GapKind::LookupFailure,
                    subject,
                    format!("Logical table '{}' has no explore, relationship skipped", second.id),
                );
                continue;
            };

            let mut join = Join::new(base, JoinKind::default());
            if let Some(expression) = &relationship.expression {
                let (first_id, second_id) = (relationship.first, relationship.second);
                join.predicates = self.predicates(expression, &subject, |t, text, left| {
                    t.relationship_operand(if left { first_id } else { second_id }, text)
                });
            }

            let mut level = self.push_level(model, current, join);
            for inner in joins {
                level = level.and_then(|side| self.push_level(model, side, inner));
            }
            head = level;
        }

        match head? {
            ExploreSide::Explore(id) => Some(id),
            ExploreSide::View(view) => self.project.model_mut(model).map(|m| m.push_explore(Explore::wrap(view))),
        }
    }

    /// Register the datasource's top-level explore, named after its base view.
    fn datasource_explore(&mut self, ds: DatasourceId) {
        let wb = self.workbook;
        let datasource = wb.datasource(ds);
        let Some(model) = self.model_of(ds) else {
            return;
        };

        let explore = if datasource.object_graph.is_some() {
            self.object_graph_explore(ds)
        } else {
            datasource
                .connection
                .relation
                .and_then(|root| wb.subtree(root).into_iter().find_map(|rel| self.explore(rel)))
        };
        let Some(explore) = explore else {
            self.gaps.record(
                GapKind::LookupFailure,
                format!("Datasource '{}'", datasource.label()),
                "No relation could be turned into an explore",
            );
            return;
        };

        let Some(m) = self.project.model_mut(model) else {
            return;
        };
        let label = m
            .base_view(explore)
            .and_then(|view| m.view_name(view))
            .unwrap_or(datasource.label())
            .to_string();
        match m.add_explore(&label, explore) {
            Ok(name) => {
                info!(explore = %name, datasource = %datasource.label(), "Created explore");
                self.top_explores.insert(ds, explore);
            }
            Err(err) => self.gaps.record(
                GapKind::NamingExhaustion,
                format!("Datasource '{}'", datasource.label()),
                err.to_string(),
            ),
        }
    }

    /// Workbook parameters as parameter fields of a `parameters` view in the first model.
    fn parameters_view(&mut self) {
        let wb = self.workbook;
        if wb.parameters.is_empty() {
            return;
        }
        let Some(model) = self.models.iter().flatten().next().copied() else {
            self.gaps.record(
                GapKind::LookupFailure,
                "Parameters",
                "No model to hold the parameter view, parameters dropped",
            );
            return;
        };

        let mut view = View::new(ViewSource::None);
        for parameter in &wb.parameters {
            let kind = parameter
                .datatype
                .as_deref()
                .and_then(map_field_kind)
                .map(|(kind, _)| if kind == FieldKind::Time { FieldKind::String } else { kind })
                .unwrap_or(FieldKind::String);
            let label = parameter.caption.as_deref().unwrap_or(&parameter.name);
            let field = ParameterField {
                kind,
                label: parameter.caption.clone(),
                default_value: parameter.value.clone(),
            };
            if let Err(err) = view.add_field(label, Field::Parameter(field)) {
                self.gaps
                    .record(GapKind::NamingExhaustion, format!("Parameter '{label}'"), err.to_string());
            }
        }
        if let Err(err) = self.project.add_view(model, "parameters", view) {
            self.project_gap("Parameters".to_string(), err);
        }
    }

    /// Calculated fields have no LookML counterpart yet; each is reported once.
    fn calculations(&mut self) {
        let wb = self.workbook;
        for calculation in &wb.calculations {
            let complexity = formula_complexity(&calculation.formula);
            self.gaps.record(
                GapKind::Untranslated,
                format!("Calculated field '{}'", calculation.display_name()),
                format!(
                    "{complexity:?} formula in datasource '{}' is not translated",
                    wb.datasource(calculation.datasource).label()
                ),
            );
        }
    }

    /// Field an element references for a column instance.
    fn element_field(&mut self, inst: InstanceId) -> Option<ElementField> {
        if let Some(memo) = self.element_fields.get(&inst) {
            return memo.clone();
        }
        let result = self.build_element_field(inst);
        self.element_fields.insert(inst, result.clone());
        result
    }

    fn build_element_field(&mut self, inst: InstanceId) -> Option<ElementField> {
        let wb = self.workbook;
        let instance = wb.instance(inst);
        let column = wb.column(instance.column);
        let base = self.base_field(instance.column)?;
        let model = self.model_of(column.datasource)?;

        let view = self.project.model(model)?.view(base.view)?;
        let name = view.field_name(base.field)?.to_string();
        let is_time = view
            .field(base.field)
            .and_then(Field::as_base)
            .is_some_and(BaseField::is_time);
        let base_reference = if is_time {
            format!("{name}_{}", Timeframe::Raw)
        } else {
            name.clone()
        };
        let subject = format!("Column instance '{}'", instance.name);

        let referenced = match derivation(instance.derivation.as_deref()) {
            Derivation::Base => base_reference,
            Derivation::Measure(aggregation) => self.measure(model, instance.column, base, aggregation, &name)?,
            Derivation::Truncate(timeframe) if is_time => format!("{name}_{timeframe}"),
            Derivation::Truncate(timeframe) => {
                self.gaps.record(
                    GapKind::Approximation,
                    subject,
                    format!("'{timeframe}' truncation of a non-date field, base field used"),
                );
                base_reference
            }
            Derivation::Unrecognized => {
                self.gaps.record(
                    GapKind::DerivationUnrecognized,
                    subject,
                    format!(
                        "Derivation '{}' is not recognized, base field used",
                        instance.derivation.as_deref().unwrap_or_default()
                    ),
                );
                base_reference
            }
        };
        Some(ElementField::new(model, base.view, referenced))
    }

    /// Measure `<parent>_<aggregation>` on the base field's view, created once.
    fn measure(
        &mut self,
        model: ModelId,
        column: ColumnId,
        base: FieldRef,
        aggregation: Aggregation,
        parent_name: &str,
    ) -> Option<String> {
        let existing = self.measures.get(&(column, aggregation)).copied();
        let field = match existing {
            Some(field) => field,
            None => {
                let label = format!("{parent_name}_{aggregation}");
                let added = self
                    .view_mut(model, base.view)?
                    .add_field(&label, Field::Derived(DerivedField::new(base.field, aggregation)));
                match added {
                    Ok(field) => {
                        self.measures.insert((column, aggregation), field);
                        field
                    }
                    Err(err) => {
                        self.gaps.record(GapKind::NamingExhaustion, label, err.to_string());
                        return None;
                    }
                }
            }
        };
        self.project
            .model(model)?
            .view(base.view)?
            .field_name(field)
            .map(str::to_string)
    }

    fn element(&mut self, ws: WorksheetId) {
        let wb = self.workbook;
        let sheet = wb.worksheet(ws);
        let subject = format!("Worksheet '{}'", sheet.name);

        let Some(classification) = classify_worksheet(sheet) else {
            self.gaps.record(
                GapKind::UnsupportedConstruct,
                subject,
                format!("Mark '{}' has no visualization counterpart, no element generated", sheet.mark()),
            );
            return;
        };
        debug!(worksheet = %sheet.name, kind = %classification.kind, "Classified worksheet");

        let source = sheet
            .rows
            .iter()
            .chain(&sheet.cols)
            .chain(&sheet.pane_size)
            .chain(&sheet.pane_text)
            .chain(&sheet.pane_color)
            .map(|field| wb.instance_datasource(field.instance))
            .next();
        let target = source.and_then(|ds| Some((self.model_of(ds)?, *self.top_explores.get(&ds)?)));
        let Some((model, explore)) = target else {
            self.gaps.record(
                GapKind::LookupFailure,
                subject,
                "Datasource of the worksheet has no explore, no element generated",
            );
            return;
        };

        let mut checked: HashMap<InstanceId, Option<ElementField>> = HashMap::new();
        let mut fields = Vec::new();
        for inst in &classification.fields {
            let field = self.reachable_field(*inst, model, explore, &subject);
            checked.insert(*inst, field.clone());
            if let Some(field) = field {
                if !fields.contains(&field) {
                    fields.push(field);
                }
            }
        }
        if fields.is_empty() {
            self.gaps.record(
                GapKind::LookupFailure,
                subject,
                "Worksheet has no translatable fields, no element generated",
            );
            return;
        }
        let pivots: Vec<ElementField> = classification
            .pivots
            .iter()
            .filter_map(|inst| match checked.get(inst) {
                Some(field) => field.clone(),
                None => self.reachable_field(*inst, model, explore, &subject),
            })
            .collect();

        let element = DashboardElement {
            title: sheet.title.clone(),
            fields,
            pivots,
            ..DashboardElement::new(model, explore, classification.kind)
        };
        match self.project.add_element(&sheet.name, element) {
            Ok(id) => self.elements.push((ws, id)),
            Err(err) => self.project_gap(subject, err),
        }
    }

    /// Element field of `inst` when its view is joined into `explore` of `model`.
    /// Checked before any measure is created for the instance.
    fn reachable_field(
        &mut self,
        inst: InstanceId,
        model: ModelId,
        explore: ExploreId,
        subject: &str,
    ) -> Option<ElementField> {
        let wb = self.workbook;
        let instance = wb.instance(inst);
        let base = self.base_field(instance.column)?;
        let reachable = self.model_of(wb.column(instance.column).datasource) == Some(model)
            && self.project.model(model).is_some_and(|m| {
                m.explore_name(explore)
                    .and_then(|name| m.layout(explore, name))
                    .is_some_and(|layout| layout.alias_of(base.view).is_some())
            });
        if !reachable {
            self.gaps.record(
                GapKind::LookupFailure,
                subject,
                format!(
                    "Column instance '{}' is not part of the worksheet's explore, field dropped",
                    instance.name
                ),
            );
            return None;
        }
        self.element_field(inst)
    }

    /// Workbook dashboards, plus a default dashboard for unplaced elements.
    fn dashboards(&mut self) {
        let wb = self.workbook;
        let mut placed: HashSet<ElementId> = HashSet::new();

        for layout in &wb.dashboards {
            let elements: Vec<ElementId> = layout
                .sheets
                .iter()
                .filter_map(|sheet| {
                    self.elements
                        .iter()
                        .find(|(ws, _)| wb.worksheet(*ws).name == *sheet)
                        .map(|(_, element)| *element)
                })
                .collect();
            if elements.is_empty() {
                debug!(dashboard = %layout.name, "Dashboard has no translated worksheets, skipped");
                continue;
            }
            placed.extend(elements.iter().copied());
            self.dashboard(&layout.name, elements);
        }

        let unplaced: Vec<ElementId> = self
            .elements
            .iter()
            .map(|(_, element)| *element)
            .filter(|element| !placed.contains(element))
            .collect();
        if !unplaced.is_empty() {
            let label = if wb.name.trim().is_empty() { "dashboard" } else { wb.name.as_str() };
            self.dashboard(label, unplaced);
        }
    }

    fn dashboard(&mut self, label: &str, elements: Vec<ElementId>) {
        let dashboard = match self.project.add_dashboard(label, Dashboard::new(label)) {
            Ok(id) => id,
            Err(err) => {
                self.project_gap(format!("Dashboard '{label}'"), err);
                return;
            }
        };
        for element in elements {
            if let Err(err) = self.project.attach_element(dashboard, element) {
                self.project_gap(format!("Dashboard '{label}'"), err);
            }
        }
        info!(dashboard = %label, "Created dashboard");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_kind_mapping() {
        assert_eq!(map_join_kind("inner"), Some(JoinKind::Inner));
        assert_eq!(map_join_kind("left"), Some(JoinKind::LeftOuter));
        assert_eq!(map_join_kind("right"), Some(JoinKind::FullOuter));
        assert_eq!(map_join_kind("full"), Some(JoinKind::FullOuter));
        assert_eq!(map_join_kind("cross"), None);
        assert_eq!(map_join_kind(""), None);
    }

    #[test]
    fn test_field_kind_mapping() {
        assert_eq!(map_field_kind("integer"), Some((FieldKind::Number, None)));
        assert_eq!(map_field_kind("real"), Some((FieldKind::Number, None)));
        assert_eq!(map_field_kind("boolean"), Some((FieldKind::YesNo, None)));
        assert_eq!(
            map_field_kind("datetime"),
            Some((FieldKind::Time, Some(TimeDatatype::Datetime)))
        );
        assert_eq!(map_field_kind("spatial"), None);
    }

    #[test]
    fn test_derivation_vocabulary() {
        assert_eq!(derivation(None), Derivation::Base);
        assert_eq!(derivation(Some("None")), Derivation::Base);
        assert_eq!(derivation(Some("CountD")), Derivation::Measure(Aggregation::CountDistinct));
        assert_eq!(derivation(Some("Year-Trunc")), Derivation::Truncate(Timeframe::Year));
        assert_eq!(derivation(Some("Day-Trunc")), Derivation::Unrecognized);
    }
}
