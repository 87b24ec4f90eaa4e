//! The LookML project: models, dashboards and dashboard elements

use std::fs;
use std::path::{Path, PathBuf};

use t2l_registry::{Registry, RegistryError};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::dashboard::{render_dashboard, Dashboard, DashboardElement, ElementField, ResolvedElement};
use crate::ids::{DashboardId, ElementId, ModelId, ViewId};
use crate::model::Model;
use crate::settings::ProjectSettings;
use crate::view::View;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProjectError {
    #[error("Naming failed: {0}")]
    Naming(#[from] RegistryError),

    #[error("Unknown model: {0:?}")]
    UnknownModel(ModelId),

    #[error("Unknown dashboard: {0:?}")]
    UnknownDashboard(DashboardId),
}

#[derive(Debug, Error)]
pub enum WriteError {
    #[error("Failed to create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// One generated file, relative to the project directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedFile {
    pub path: PathBuf,
    pub contents: String,
}

#[derive(Debug, Clone)]
pub struct Project {
    pub settings: ProjectSettings,
    name: String,
    models: Registry<Model>,
    dashboards: Registry<Dashboard>,
    elements: Registry<DashboardElement>,
}

impl Project {
    /// Create an empty project; the directory name is the first candidate of `label`.
    pub fn new(label: &str, settings: ProjectSettings) -> Self {
        let label = if label.trim().is_empty() { "lookml_project" } else { label };
        let name = t2l_registry::candidates(label)
            .next()
            .unwrap_or_else(|| "lookml_project".to_string());
        Self {
            settings,
            name,
            models: Registry::new(),
            dashboards: Registry::new(),
            elements: Registry::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn add_model(&mut self, label: &str, model: Model) -> Result<ModelId, ProjectError> {
        Ok(ModelId(self.models.insert(label, model)?))
    }

    pub fn model(&self, id: ModelId) -> Option<&Model> {
        self.models.get(id.0)
    }

    pub fn model_mut(&mut self, id: ModelId) -> Option<&mut Model> {
        self.models.get_mut(id.0)
    }

    pub fn model_name(&self, id: ModelId) -> Option<&str> {
        self.models.name(id.0)
    }

    pub fn models(&self) -> impl Iterator<Item = (ModelId, &str, &Model)> {
        self.models.iter().map(|(idx, name, model)| (ModelId(idx), name, model))
    }

    /// Add a view to `model`. View identifiers are unique across the whole
    /// project since every view file lands in the same directory.
    pub fn add_view(&mut self, model: ModelId, label: &str, view: View) -> Result<ViewId, ProjectError> {
        let taken: Vec<String> = self
            .models
            .iter()
            .filter(|(idx, _, _)| *idx != model.0)
            .flat_map(|(_, _, m)| m.view_names().map(str::to_string))
            .collect();
        let target = self.models.get_mut(model.0).ok_or(ProjectError::UnknownModel(model))?;
        let id = target.add_view_with(label, view, |c| taken.iter().any(|t| t == c))?;
        debug!(view = %target.view_name(id).unwrap_or_default(), "Registered view");
        Ok(id)
    }

    pub fn add_dashboard(&mut self, label: &str, dashboard: Dashboard) -> Result<DashboardId, ProjectError> {
        Ok(DashboardId(self.dashboards.insert(label, dashboard)?))
    }

    pub fn dashboard(&self, id: DashboardId) -> Option<&Dashboard> {
        self.dashboards.get(id.0)
    }

    pub fn dashboard_name(&self, id: DashboardId) -> Option<&str> {
        self.dashboards.name(id.0)
    }

    pub fn dashboards(&self) -> impl Iterator<Item = (DashboardId, &str, &Dashboard)> {
        self.dashboards.iter().map(|(idx, name, d)| (DashboardId(idx), name, d))
    }

    pub fn add_element(&mut self, label: &str, element: DashboardElement) -> Result<ElementId, ProjectError> {
        Ok(ElementId(self.elements.insert(label, element)?))
    }

    pub fn element(&self, id: ElementId) -> Option<&DashboardElement> {
        self.elements.get(id.0)
    }

    pub fn element_name(&self, id: ElementId) -> Option<&str> {
        self.elements.name(id.0)
    }

    pub fn elements(&self) -> impl Iterator<Item = (ElementId, &str, &DashboardElement)> {
        self.elements.iter().map(|(idx, name, e)| (ElementId(idx), name, e))
    }

    pub fn attach_element(&mut self, dashboard: DashboardId, element: ElementId) -> Result<(), ProjectError> {
        self.dashboards
            .get_mut(dashboard.0)
            .ok_or(ProjectError::UnknownDashboard(dashboard))?
            .attach(element);
        Ok(())
    }

    fn resolve_element(&self, id: ElementId) -> Option<ResolvedElement<'_>> {
        let element = self.element(id)?;
        let model = self.model(element.model)?;
        let explore = model.explore_name(element.explore)?;
        let layout = model.layout(element.explore, explore)?;

        // only aliases the explore introduces are valid in its elements
        let qualify = |field: &ElementField| -> Option<String> {
            let alias = (field.model == element.model)
                .then(|| layout.alias_of(field.view))
                .flatten();
            match alias {
                Some(alias) => Some(format!("{alias}.{}", field.name)),
                None => {
                    warn!(explore = %explore, field = %field.name, "Field is not reachable from the element's explore, dropped");
                    None
                }
            }
        };

        Some(ResolvedElement {
            name: self.element_name(id)?,
            model: self.model_name(element.model)?,
            explore,
            element,
            fields: element.fields.iter().filter_map(qualify).collect(),
            pivots: element.pivots.iter().filter_map(qualify).collect(),
        })
    }

    /// Render every file of the project without touching the filesystem.
    pub fn render(&self) -> Vec<RenderedFile> {
        let mut files = Vec::new();
        for (_, model_name, model) in self.models.iter() {
            for (_, view_name, view) in model.views() {
                files.push(RenderedFile {
                    path: Path::new("views").join(format!("{view_name}.view.lkml")),
                    contents: format!("{}\n", view.render(view_name, &self.settings)),
                });
            }
            files.push(RenderedFile {
                path: Path::new("models").join(format!("{model_name}.model.lkml")),
                contents: model.render(&self.settings),
            });
        }

        for (_, dashboard_name, dashboard) in self.dashboards.iter() {
            let mut elements = Vec::with_capacity(dashboard.elements.len());
            for id in &dashboard.elements {
                match self.resolve_element(*id) {
                    Some(resolved) => elements.push(resolved),
                    None => warn!(dashboard = %dashboard_name, element = id.0, "Dashboard element could not be resolved"),
                }
            }
            files.push(RenderedFile {
                path: Path::new("dashboards").join(format!("{dashboard_name}.dashboard.lookml")),
                contents: render_dashboard(dashboard_name, dashboard, &self.settings.dashboard_layout, &elements),
            });
        }
        files
    }

    /// Write the project under `<root>/<project name>/` and return the written paths.
    pub fn write_to(&self, root: &Path) -> Result<Vec<PathBuf>, WriteError> {
        let project_dir = root.join(&self.name);
        let mut written = Vec::new();
        for file in self.render() {
            let path = project_dir.join(&file.path);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).map_err(|source| WriteError::CreateDir {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
            fs::write(&path, &file.contents).map_err(|source| WriteError::Write {
                path: path.clone(),
                source,
            })?;
            debug!(path = %path.display(), "Wrote file");
            written.push(path);
        }
        info!(
            project = %self.name,
            files = written.len(),
            dir = %project_dir.display(),
            "LookML project written"
        );
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_name_falls_back() {
        assert_eq!(Project::new("", ProjectSettings::default()).name(), "lookml_project");
        assert_eq!(Project::new("Sales Review", ProjectSettings::default()).name(), "sales_review");
    }

    #[test]
    fn test_view_names_unique_across_models() {
        let mut project = Project::new("p", ProjectSettings::default());
        let a = project.add_model("a", Model::new()).unwrap();
        let b = project.add_model("b", Model::new()).unwrap();
        let first = project.add_view(a, "Orders", View::table(["orders"])).unwrap();
        let second = project.add_view(b, "Orders", View::table(["orders"])).unwrap();

        assert_eq!(project.model(a).unwrap().view_name(first), Some("orders"));
        assert_eq!(project.model(b).unwrap().view_name(second), Some("orders_1"));
    }

    #[test]
    fn test_element_fields_outside_explore_dropped() {
        use crate::explore::Explore;
        use crate::field::{BaseField, Field};
        use crate::types::VisualizationType;

        let mut project = Project::new("p", ProjectSettings::default());
        let sales = project.add_model("sales", Model::new()).unwrap();
        let targets = project.add_model("targets", Model::new()).unwrap();

        let mut orders = View::table(["orders"]);
        orders.add_field("region", Field::Base(BaseField::new("region"))).unwrap();
        let orders = project.add_view(sales, "orders", orders).unwrap();
        let returns = project.add_view(sales, "returns", View::table(["returns"])).unwrap();
        let goals = project.add_view(targets, "goals", View::table(["goals"])).unwrap();
        assert_eq!(goals, orders);

        let m = project.model_mut(sales).unwrap();
        let explore = m.push_explore(Explore::wrap(orders));
        m.add_explore("orders", explore).unwrap();

        let mut element = DashboardElement::new(sales, explore, VisualizationType::Table);
        element.fields = vec![
            ElementField::new(sales, orders, "region"),
            ElementField::new(targets, goals, "goal_sum"),
            ElementField::new(sales, returns, "reason"),
        ];
        let element = project.add_element("Regions", element).unwrap();

        let resolved = project.resolve_element(element).unwrap();
        assert_eq!(resolved.fields, vec!["orders.region".to_string()]);
    }

    #[test]
    fn test_unknown_model_rejected() {
        let mut project = Project::new("p", ProjectSettings::default());
        assert_eq!(
            project.add_view(ModelId(4), "x", View::table(["x"])),
            Err(ProjectError::UnknownModel(ModelId(4)))
        );
    }
}
