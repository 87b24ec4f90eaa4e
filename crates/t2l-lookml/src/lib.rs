//! LookML target model and text serialization
//!
//! A [`Project`] owns models, dashboards and dashboard elements. Models own
//! views and explores, views own fields. Everything is addressed by the typed
//! indices in [`ids`] and named through `t2l_registry` when inserted.

mod dashboard;
mod explore;
mod field;
pub mod ids;
mod model;
mod project;
mod settings;
mod text;
pub mod types;
mod view;

pub use dashboard::{Dashboard, DashboardElement, ElementField};
pub use explore::{Explore, ExploreLayout, ExploreSide, Join, JoinLevel, Predicate};
pub use field::{BaseField, DerivedField, Field, ParameterField};
pub use ids::*;
pub use model::Model;
pub use project::{Project, ProjectError, RenderedFile, WriteError};
pub use settings::ProjectSettings;
pub use t2l_registry::RegistryError;
pub use types::*;
pub use view::{View, ViewSource};
