//! Explores: a base view plus a chain of joins
//!
//! An explore is stored as a binary node. The left side is either a view or a
//! previously stored explore, so a chain of `n` joins is `n` nested nodes whose
//! innermost left side is the base view.

use serde::Serialize;

use crate::ids::{ExploreId, FieldRef, ViewId};
use crate::types::{Cardinality, JoinKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExploreSide {
    View(ViewId),
    Explore(ExploreId),
}

/// `left op right` inside a join's `sql_on`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Predicate {
    pub left: FieldRef,
    pub op: String,
    pub right: FieldRef,
}

impl Predicate {
    pub fn new(left: FieldRef, op: impl Into<String>, right: FieldRef) -> Self {
        Self {
            left,
            op: op.into(),
            right,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Join {
    pub view: ViewId,
    pub kind: JoinKind,
    pub cardinality: Cardinality,
    pub predicates: Vec<Predicate>,
}

impl Join {
    pub fn new(view: ViewId, kind: JoinKind) -> Self {
        Self {
            view,
            kind,
            cardinality: Cardinality::default(),
            predicates: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Explore {
    pub left: ExploreSide,
    pub join: Option<Join>,
}

impl Explore {
    /// Explore over a single view
    pub fn wrap(view: ViewId) -> Self {
        Self {
            left: ExploreSide::View(view),
            join: None,
        }
    }

    pub fn joined(left: ExploreSide, join: Join) -> Self {
        Self {
            left,
            join: Some(join),
        }
    }

    pub fn is_wrapper(&self) -> bool {
        self.join.is_none() && matches!(self.left, ExploreSide::View(_))
    }
}

/// One emitted `join:` block
#[derive(Debug, Clone)]
pub struct JoinLevel<'a> {
    pub alias: String,
    pub join: &'a Join,
}

/// An explore chain flattened innermost-first with aliases assigned.
#[derive(Debug, Clone)]
pub struct ExploreLayout<'a> {
    pub base: ViewId,
    /// `(alias, view)` in declaration order; the base view comes first
    pub aliases: Vec<(String, ViewId)>,
    pub joins: Vec<JoinLevel<'a>>,
}

impl ExploreLayout<'_> {
    /// First alias bound to `view` among the first `upto` declared aliases.
    pub fn alias_for(&self, view: ViewId, upto: usize) -> Option<&str> {
        self.aliases
            .iter()
            .take(upto)
            .find(|(_, bound)| *bound == view)
            .map(|(alias, _)| alias.as_str())
    }

    /// First alias bound to `view` anywhere in the explore.
    pub fn alias_of(&self, view: ViewId) -> Option<&str> {
        self.alias_for(view, self.aliases.len())
    }
}
