//! View fields

use std::collections::BTreeSet;

use crate::ids::FieldId;
use crate::settings::ProjectSettings;
use crate::text::{block, quoted};
use crate::types::{Aggregation, FieldKind, FieldStruct, TimeDatatype, Timeframe};

/// A physical column exposed as a dimension (or dimension group for time).
#[derive(Debug, Clone, PartialEq)]
pub struct BaseField {
    pub source_column: String,
    pub kind: FieldKind,
    pub timeframes: BTreeSet<Timeframe>,
    pub datatype: Option<TimeDatatype>,
    pub label: Option<String>,
    pub description: Option<String>,
}

impl BaseField {
    pub fn new(source_column: impl Into<String>) -> Self {
        Self {
            source_column: source_column.into(),
            kind: FieldKind::String,
            timeframes: BTreeSet::new(),
            datatype: None,
            label: None,
            description: None,
        }
    }

    /// Time field with the default granularity set
    pub fn time(source_column: impl Into<String>, datatype: TimeDatatype) -> Self {
        Self {
            kind: FieldKind::Time,
            timeframes: Timeframe::DEFAULT_SET.into_iter().collect(),
            datatype: Some(datatype),
            ..Self::new(source_column)
        }
    }

    pub fn with_kind(mut self, kind: FieldKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn structure(&self) -> FieldStruct {
        match self.kind {
            FieldKind::Time => FieldStruct::DimensionGroup,
            FieldKind::String | FieldKind::Number | FieldKind::YesNo => FieldStruct::Dimension,
        }
    }

    pub fn is_time(&self) -> bool {
        self.kind == FieldKind::Time
    }

    pub fn sql(&self, settings: &ProjectSettings) -> String {
        format!("${{TABLE}}.{} ;;", settings.quote(&self.source_column))
    }

    /// Name to use when referencing this field from `sql_on` or dashboards.
    ///
    /// Dimension groups are only addressable through a timeframe sub-field.
    pub fn reference_name(&self, name: &str) -> String {
        if self.is_time() {
            format!("{name}_{}", Timeframe::Raw)
        } else {
            name.to_string()
        }
    }

    fn render(&self, name: &str, settings: &ProjectSettings) -> String {
        let mut body = vec![format!("type: {}", self.kind)];
        if !self.timeframes.is_empty() {
            let frames: Vec<&str> = self.timeframes.iter().map(|t| t.as_str()).collect();
            body.push(format!("timeframes: [{}]", frames.join(", ")));
        }
        if let Some(datatype) = self.datatype {
            body.push(format!("datatype: {datatype}"));
        }
        body.push(format!("sql: {}", self.sql(settings)));
        if let Some(label) = &self.label {
            body.push(format!("label: {}", quoted(label)));
        }
        if let Some(description) = &self.description {
            body.push(format!("description: {}", quoted(description)));
        }
        block(self.structure().as_str(), name, &body)
    }
}

/// A measure aggregating a base field of the same view.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedField {
    pub parent: FieldId,
    pub aggregation: Aggregation,
    pub label: Option<String>,
    pub description: Option<String>,
}

impl DerivedField {
    pub fn new(parent: FieldId, aggregation: Aggregation) -> Self {
        Self {
            parent,
            aggregation,
            label: None,
            description: None,
        }
    }

    pub fn sql(&self, parent_name: &str) -> String {
        format!("${{{parent_name}}} ;;")
    }

    fn render(&self, name: &str, parent_name: &str) -> String {
        let mut body = vec![
            format!("type: {}", self.aggregation),
            format!("sql: {}", self.sql(parent_name)),
        ];
        if let Some(label) = &self.label {
            body.push(format!("label: {}", quoted(label)));
        }
        if let Some(description) = &self.description {
            body.push(format!("description: {}", quoted(description)));
        }
        block(FieldStruct::Measure.as_str(), name, &body)
    }
}

/// A user-selectable parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterField {
    pub kind: FieldKind,
    pub label: Option<String>,
    pub default_value: Option<String>,
}

impl ParameterField {
    fn render(&self, name: &str) -> String {
        let mut body = vec![format!("type: {}", self.kind)];
        if let Some(label) = &self.label {
            body.push(format!("label: {}", quoted(label)));
        }
        if let Some(value) = &self.default_value {
            body.push(format!("default_value: {}", quoted(value)));
        }
        block(FieldStruct::Parameter.as_str(), name, &body)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Field {
    Base(BaseField),
    Derived(DerivedField),
    Parameter(ParameterField),
}

impl Field {
    pub fn as_base(&self) -> Option<&BaseField> {
        match self {
            Field::Base(base) => Some(base),
            Field::Derived(_) | Field::Parameter(_) => None,
        }
    }

    /// Render the field block. `parent_name` resolves a derived field's parent;
    /// a derived field whose parent is unknown renders nothing.
    pub(crate) fn render<'a, F>(&self, name: &str, settings: &ProjectSettings, parent_name: F) -> Option<String>
    where
        F: Fn(FieldId) -> Option<&'a str>,
    {
        match self {
            Field::Base(base) => Some(base.render(name, settings)),
            Field::Derived(derived) => parent_name(derived.parent).map(|parent| derived.render(name, parent)),
            Field::Parameter(parameter) => Some(parameter.render(name)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_field_sql() {
        let settings = ProjectSettings::default();
        let field = BaseField::new("Customer Name");
        assert_eq!(field.sql(&settings), "${TABLE}.`Customer Name` ;;");
    }

    #[test]
    fn test_time_field_render() {
        let settings = ProjectSettings::default();
        let field = BaseField::time("Order Date", TimeDatatype::Date);
        let text = field.render("order_date", &settings);
        assert!(text.starts_with("dimension_group: order_date {"));
        assert!(text.contains("  timeframes: [raw, date, week, month, quarter, year]"));
        assert!(text.contains("  datatype: date"));
        assert_eq!(field.reference_name("order_date"), "order_date_raw");
    }

    #[test]
    fn test_derived_field_render() {
        let field = DerivedField::new(FieldId(0), Aggregation::Sum);
        assert_eq!(field.sql("sales"), "${sales} ;;");
        assert_eq!(
            field.render("sales_sum", "sales"),
            "measure: sales_sum {\n  type: sum\n  sql: ${sales} ;;\n}"
        );
    }

    #[test]
    fn test_derived_field_without_parent_renders_nothing() {
        let settings = ProjectSettings::default();
        let field = Field::Derived(DerivedField::new(FieldId(4), Aggregation::Count));
        assert_eq!(field.render("orphan_count", &settings, |_| None), None);
        assert_eq!(
            field.render("id_count", &settings, |_| Some("id")).as_deref(),
            Some("measure: id_count {\n  type: count\n  sql: ${id} ;;\n}")
        );
    }

    #[test]
    fn test_label_quotes_escaped() {
        let settings = ProjectSettings::default();
        let mut field = BaseField::new("x");
        field.label = Some("The \"X\"".to_string());
        assert!(field.render("x", &settings).contains("label: \"The 'X'\""));
    }
}
