//! LookML views

use t2l_registry::{Registry, RegistryError};
use tracing::warn;

use crate::field::Field;
use crate::ids::FieldId;
use crate::settings::ProjectSettings;
use crate::text::{indent, quoted};

/// Where a view reads its rows from.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewSource {
    /// Physical table path, one item per segment (`schema`, `table`)
    Table(Vec<String>),
    /// Raw SQL wrapped in a derived table
    Derived(String),
    /// No table at all (parameter-only views)
    None,
}

#[derive(Debug, Clone)]
pub struct View {
    pub source: ViewSource,
    pub extension: bool,
    pub label: Option<String>,
    fields: Registry<Field>,
}

impl View {
    pub fn new(source: ViewSource) -> Self {
        Self {
            source,
            extension: false,
            label: None,
            fields: Registry::new(),
        }
    }

    pub fn table<I, S>(path: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(ViewSource::Table(path.into_iter().map(Into::into).collect()))
    }

    pub fn derived(sql: impl Into<String>) -> Self {
        Self::new(ViewSource::Derived(sql.into()))
    }

    /// Register a field under the first free identifier derived from `label`.
    pub fn add_field(&mut self, label: &str, field: Field) -> Result<FieldId, RegistryError> {
        self.fields.insert(label, field).map(FieldId)
    }

    pub fn field(&self, id: FieldId) -> Option<&Field> {
        self.fields.get(id.0)
    }

    pub fn field_name(&self, id: FieldId) -> Option<&str> {
        self.fields.name(id.0)
    }

    pub fn field_by_name(&self, name: &str) -> Option<FieldId> {
        self.fields.lookup(name).map(FieldId)
    }

    /// Fields in insertion order
    pub fn fields(&self) -> impl Iterator<Item = (FieldId, &str, &Field)> {
        self.fields.iter().map(|(idx, name, field)| (FieldId(idx), name, field))
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    /// Dot-joined, quoted table path; `None` unless the view reads a table.
    pub fn sql_table_name(&self, settings: &ProjectSettings) -> Option<String> {
        match &self.source {
            ViewSource::Table(items) if !items.is_empty() => Some(
                items
                    .iter()
                    .map(|item| settings.quote(item))
                    .collect::<Vec<_>>()
                    .join("."),
            ),
            _ => None,
        }
    }

    /// Render the full `view:` block.
    pub fn render(&self, name: &str, settings: &ProjectSettings) -> String {
        let mut body = Vec::new();
        if self.extension {
            body.push("extension: required".to_string());
        }
        if let Some(table) = self.sql_table_name(settings) {
            body.push(format!("sql_table_name: {table} ;;"));
        } else if let ViewSource::Derived(sql) = &self.source {
            body.push(format!(
                "derived_table: {{\n  sql:\n{} ;;\n}}",
                indent(sql.trim_end(), "    ")
            ));
        }
        for (_, field_name, field) in self.fields() {
            match field.render(field_name, settings, |id| self.field_name(id)) {
                Some(text) => body.push(text),
                None => warn!(view = %name, field = %field_name, "Parent of derived field is not in the view, field skipped"),
            }
        }
        if let Some(label) = &self.label {
            body.push(format!("label: {}", quoted(label)));
        }
        format!("view: {name} {{\n{}\n}}", indent(&body.join("\n"), "  "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::{BaseField, DerivedField};
    use crate::types::{Aggregation, FieldKind};

    #[test]
    fn test_table_view_render() {
        let settings = ProjectSettings::default();
        let mut view = View::table(["dbo", "Orders"]);
        let id = view
            .add_field("Order ID", Field::Base(BaseField::new("Order ID").with_kind(FieldKind::Number)))
            .unwrap();
        view.add_field("order_id_sum", Field::Derived(DerivedField::new(id, Aggregation::Sum)))
            .unwrap();

        let text = view.render("orders", &settings);
        assert!(text.starts_with("view: orders {\n  sql_table_name: `dbo`.`Orders` ;;\n"));
        assert!(text.contains("  dimension: order_id {\n    type: number\n    sql: ${TABLE}.`Order ID` ;;\n  }"));
        assert!(text.contains("  measure: order_id_sum {\n    type: sum\n    sql: ${order_id} ;;\n  }"));
        assert!(text.ends_with("\n}"));
    }

    #[test]
    fn test_derived_table_render() {
        let settings = ProjectSettings::default();
        let mut view = View::derived("SELECT *\nFROM orders");
        view.extension = true;

        let text = view.render("custom_sql", &settings);
        assert!(text.contains("  extension: required\n"));
        assert!(text.contains("  derived_table: {\n    sql:\n      SELECT *\n      FROM orders ;;\n  }"));
        assert!(!text.contains("sql_table_name"));
    }

    #[test]
    fn test_orphan_measure_skipped() {
        let settings = ProjectSettings::default();
        let mut view = View::table(["orders"]);
        view.add_field("amount", Field::Base(BaseField::new("amount"))).unwrap();
        view.add_field("ghost_sum", Field::Derived(DerivedField::new(FieldId(9), Aggregation::Sum)))
            .unwrap();

        let text = view.render("orders", &settings);
        assert!(text.contains("dimension: amount {"));
        assert!(!text.contains("ghost_sum"));
        assert!(!text.contains("${ghost_sum}"));
    }

    #[test]
    fn test_field_names_unique_within_view() {
        let mut view = View::table(["t"]);
        let a = view.add_field("Amount", Field::Base(BaseField::new("Amount"))).unwrap();
        let b = view.add_field("amount", Field::Base(BaseField::new("amount"))).unwrap();
        assert_eq!(view.field_name(a), Some("amount"));
        assert_eq!(view.field_name(b), Some("amount_1"));
    }
}
