//! LookML models: views plus the explores built on them

use t2l_registry::{allocate, Registry, RegistryError};
use tracing::warn;

use crate::explore::{Explore, ExploreLayout, ExploreSide, JoinLevel};
use crate::field::Field;
use crate::ids::{ExploreId, FieldRef, ViewId};
use crate::settings::ProjectSettings;
use crate::view::View;

#[derive(Debug, Clone, Default)]
pub struct Model {
    views: Registry<View>,
    explores: Vec<Explore>,
    named_explores: Registry<ExploreId>,
}

impl Model {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add_view_with<F>(&mut self, label: &str, view: View, also_taken: F) -> Result<ViewId, RegistryError>
    where
        F: Fn(&str) -> bool,
    {
        self.views.insert_with(label, view, also_taken).map(ViewId)
    }

    pub fn view(&self, id: ViewId) -> Option<&View> {
        self.views.get(id.0)
    }

    pub fn view_mut(&mut self, id: ViewId) -> Option<&mut View> {
        self.views.get_mut(id.0)
    }

    pub fn view_name(&self, id: ViewId) -> Option<&str> {
        self.views.name(id.0)
    }

    pub fn views(&self) -> impl Iterator<Item = (ViewId, &str, &View)> {
        self.views.iter().map(|(idx, name, view)| (ViewId(idx), name, view))
    }

    pub fn view_names(&self) -> impl Iterator<Item = &str> {
        self.views.names()
    }

    pub fn field(&self, field: FieldRef) -> Option<&Field> {
        self.view(field.view)?.field(field.field)
    }

    /// Store an explore node. Nodes are only named once registered with
    /// [`Model::add_explore`].
    pub fn push_explore(&mut self, explore: Explore) -> ExploreId {
        self.explores.push(explore);
        ExploreId(self.explores.len() - 1)
    }

    pub fn explore(&self, id: ExploreId) -> Option<&Explore> {
        self.explores.get(id.0)
    }

    /// Register a stored explore as a top-level `explore:` of this model.
    /// Registering the same node twice keeps its first name.
    pub fn add_explore(&mut self, label: &str, id: ExploreId) -> Result<String, RegistryError> {
        if let Some(name) = self.explore_name(id) {
            return Ok(name.to_string());
        }
        let idx = self.named_explores.insert(label, id)?;
        Ok(self.named_explores.name(idx).unwrap_or_default().to_string())
    }

    pub fn explore_name(&self, id: ExploreId) -> Option<&str> {
        self.named_explores
            .iter()
            .find(|(_, _, explore)| **explore == id)
            .map(|(_, name, _)| name)
    }

    /// Top-level explores in registration order
    pub fn named_explores(&self) -> impl Iterator<Item = (&str, ExploreId)> {
        self.named_explores.iter().map(|(_, name, id)| (name, *id))
    }

    /// Innermost view of an explore chain
    pub fn base_view(&self, id: ExploreId) -> Option<ViewId> {
        let mut current = self.explore(id)?;
        for _ in 0..=self.explores.len() {
            match current.left {
                ExploreSide::View(view) => return Some(view),
                ExploreSide::Explore(inner) => current = self.explore(inner)?,
            }
        }
        None
    }

    /// Flatten an explore chain innermost-first and assign join aliases.
    ///
    /// The base view is aliased by the explore name; each joined view gets
    /// the first free candidate of its view name within this explore.
    pub fn layout(&self, id: ExploreId, name: &str) -> Option<ExploreLayout<'_>> {
        let mut pending = Vec::new();
        let mut current = self.explore(id)?;
        let mut hops = 0;
        let base = loop {
            if let Some(join) = &current.join {
                pending.push(join);
            }
            match current.left {
                ExploreSide::View(view) => break view,
                ExploreSide::Explore(inner) => {
                    hops += 1;
                    if hops > self.explores.len() {
                        return None;
                    }
                    current = self.explore(inner)?;
                }
            }
        };
        pending.reverse();

        let mut aliases = vec![(name.to_string(), base)];
        let mut joins = Vec::with_capacity(pending.len());
        for join in pending {
            let Some(view_name) = self.view_name(join.view) else {
                warn!(explore = %name, "Joined view is not registered in the model, join skipped");
                continue;
            };
            match allocate(view_name, |c| aliases.iter().any(|(alias, _)| alias == c)) {
                Ok(alias) => {
                    aliases.push((alias.clone(), join.view));
                    joins.push(JoinLevel { alias, join });
                }
                Err(err) => warn!(explore = %name, view = %view_name, error = %err, "Join alias allocation failed"),
            }
        }

        Some(ExploreLayout { base, aliases, joins })
    }

    /// Name a field is referenced by inside `${alias.<name>}`
    pub fn reference_name(&self, field: FieldRef) -> Option<String> {
        let view = self.view(field.view)?;
        let name = view.field_name(field.field)?;
        Some(match view.field(field.field)? {
            Field::Base(base) => base.reference_name(name),
            Field::Derived(_) | Field::Parameter(_) => name.to_string(),
        })
    }

    /// Render one top-level `explore:` block.
    pub fn render_explore(&self, id: ExploreId, name: &str) -> Option<String> {
        let layout = self.layout(id, name)?;
        let mut lines = vec![format!("explore: {name} {{")];
        if let Some(base_name) = self.view_name(layout.base) {
            if base_name != name {
                lines.push(format!("  from: {base_name}"));
            }
        }

        for (level, join_level) in layout.joins.iter().enumerate() {
            let join = join_level.join;
            // aliases declared so far: base plus every join up to this one
            let declared = level + 2;
            lines.push(format!("  join: {} {{", join_level.alias));
            if let Some(view_name) = self.view_name(join.view) {
                if view_name != join_level.alias {
                    lines.push(format!("    from: {view_name}"));
                }
            }
            lines.push(format!("    type: {}", join.kind));
            lines.push(format!("    relationship: {}", join.cardinality));

            let mut clauses = Vec::new();
            for predicate in &join.predicates {
                let left = self.qualified(&layout, predicate.left, declared);
                let right = self.qualified(&layout, predicate.right, declared);
                match (left, right) {
                    (Some(left), Some(right)) => {
                        clauses.push(format!("(${{{left}}} {} ${{{right}}})", predicate.op));
                    }
                    _ => warn!(
                        explore = %name,
                        join = %join_level.alias,
                        "Predicate field is not reachable from the joined views, predicate dropped"
                    ),
                }
            }
            if !clauses.is_empty() {
                lines.push(format!("    sql_on: {} ;;", clauses.join("\n            AND ")));
            }
            lines.push("  }".to_string());
        }

        lines.push("}".to_string());
        Some(lines.join("\n"))
    }

    fn qualified(&self, layout: &ExploreLayout<'_>, field: FieldRef, upto: usize) -> Option<String> {
        let alias = layout.alias_for(field.view, upto)?;
        let name = self.reference_name(field)?;
        Some(format!("{alias}.{name}"))
    }

    /// Render the `.model.lkml` file contents.
    pub fn render(&self, settings: &ProjectSettings) -> String {
        let mut out = format!(
            "connection: \"{}\"\n\ninclude: \"../views/*.view.lkml\"\ninclude: \"../dashboards/*.dashboard.lookml\"\n",
            settings.connection_name
        );
        for (name, id) in self.named_explores() {
            match self.render_explore(id, name) {
                Some(text) => {
                    out.push('\n');
                    out.push_str(&text);
                    out.push('\n');
                }
                None => warn!(explore = %name, "Explore chain could not be resolved, explore skipped"),
            }
        }
        out
    }
}
