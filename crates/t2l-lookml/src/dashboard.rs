//! LookML dashboards and their elements

use crate::ids::{ElementId, ExploreId, ModelId, ViewId};
use crate::text::{indent, quoted};
use crate::types::VisualizationType;

/// A field shown by an element, addressed by its owning model and view and
/// the name it is queried under (a timeframe sub-field like
/// `order_date_month` included).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementField {
    pub model: ModelId,
    pub view: ViewId,
    pub name: String,
}

impl ElementField {
    pub fn new(model: ModelId, view: ViewId, name: impl Into<String>) -> Self {
        Self {
            model,
            view,
            name: name.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DashboardElement {
    pub model: ModelId,
    pub explore: ExploreId,
    pub kind: VisualizationType,
    pub title: Option<String>,
    pub fields: Vec<ElementField>,
    pub pivots: Vec<ElementField>,
}

impl DashboardElement {
    pub fn new(model: ModelId, explore: ExploreId, kind: VisualizationType) -> Self {
        Self {
            model,
            explore,
            kind,
            title: None,
            fields: Vec::new(),
            pivots: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dashboard {
    pub title: Option<String>,
    /// Falls back to the project's dashboard layout when unset
    pub layout: Option<String>,
    pub elements: Vec<ElementId>,
}

impl Dashboard {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }

    /// Attach an element once; repeated attachments are ignored.
    pub fn attach(&mut self, element: ElementId) {
        if !self.elements.contains(&element) {
            self.elements.push(element);
        }
    }
}

/// Element with every reference already resolved to a name.
#[derive(Debug, Clone)]
pub(crate) struct ResolvedElement<'a> {
    pub name: &'a str,
    pub model: &'a str,
    pub explore: &'a str,
    pub element: &'a DashboardElement,
    pub fields: Vec<String>,
    pub pivots: Vec<String>,
}

impl ResolvedElement<'_> {
    fn render(&self) -> String {
        let mut lines = vec![
            format!("- name: {}", self.name),
            format!("  model: {}", self.model),
            format!("  explore: {}", self.explore),
            format!("  type: {}", self.element.kind),
        ];
        if let Some(title) = &self.element.title {
            lines.push(format!("  title: {}", quoted(title)));
        }
        if !self.fields.is_empty() {
            lines.push(format!("  fields: [{}]", self.fields.join(", ")));
        }
        if !self.pivots.is_empty() {
            lines.push(format!("  pivots: [{}]", self.pivots.join(", ")));
        }
        lines.join("\n")
    }
}

pub(crate) fn render_dashboard(name: &str, dashboard: &Dashboard, layout: &str, elements: &[ResolvedElement<'_>]) -> String {
    let mut lines = vec![format!("- dashboard: {name}")];
    if let Some(title) = &dashboard.title {
        lines.push(format!("  title: {}", quoted(title)));
    }
    lines.push(format!("  layout: {}", dashboard.layout.as_deref().unwrap_or(layout)));
    if !elements.is_empty() {
        lines.push(String::new());
        lines.push("  elements:".to_string());
        for element in elements {
            lines.push(indent(&element.render(), "  "));
            lines.push(String::new());
        }
    }
    let mut text = lines.join("\n");
    if !text.ends_with('\n') {
        text.push('\n');
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_dashboard() {
        let element = DashboardElement {
            title: Some("Sales by Region".to_string()),
            ..DashboardElement::new(ModelId(0), ExploreId(0), VisualizationType::Column)
        };
        let resolved = ResolvedElement {
            name: "sales_by_region",
            model: "superstore",
            explore: "orders",
            element: &element,
            fields: vec!["orders.region".to_string(), "orders.sales_sum".to_string()],
            pivots: vec![],
        };
        let dashboard = Dashboard::new("Overview");

        let text = render_dashboard("overview", &dashboard, "newspaper", &[resolved]);
        assert!(text.starts_with("- dashboard: overview\n  title: \"Overview\"\n  layout: newspaper\n\n  elements:\n"));
        assert!(text.contains("  - name: sales_by_region\n    model: superstore\n    explore: orders\n    type: looker_column\n"));
        assert!(text.contains("    fields: [orders.region, orders.sales_sum]"));
        assert!(!text.contains("pivots"));
    }

    #[test]
    fn test_attach_is_idempotent() {
        let mut dashboard = Dashboard::default();
        dashboard.attach(ElementId(3));
        dashboard.attach(ElementId(3));
        dashboard.attach(ElementId(1));
        assert_eq!(dashboard.elements, vec![ElementId(3), ElementId(1)]);
    }
}
