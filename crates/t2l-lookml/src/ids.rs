//! Typed indices into the project registries

use serde::Serialize;

macro_rules! index_type {
    ($($name:ident),+ $(,)?) => {
        $(
            #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
            pub struct $name(pub usize);
        )+
    };
}

index_type!(ModelId, ViewId, FieldId, ExploreId, DashboardId, ElementId);

/// A field addressed through its owning view, within one model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct FieldRef {
    pub view: ViewId,
    pub field: FieldId,
}

impl FieldRef {
    pub fn new(view: ViewId, field: FieldId) -> Self {
        Self { view, field }
    }
}
