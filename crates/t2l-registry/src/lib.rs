//! Identifier-keyed, insertion-ordered registries
//!
//! Every named LookML entity (model, view, field, explore, dashboard,
//! dashboard element) lives in a [`Registry`]. Inserting runs the label
//! through the [`allocator`] so that identifiers are unique within the
//! registry and assigned exactly once.

use std::collections::HashMap;
use thiserror::Error;

pub mod allocator;

pub use allocator::{allocate, candidates, Candidates, BLANK_LABEL, MAX_CANDIDATES, MAX_LABEL_CHARS};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("No free identifier for '{label}' after {attempts} candidates")]
    NamingExhausted { label: String, attempts: usize },
}

#[derive(Debug, Clone)]
pub struct Registry<T> {
    names: Vec<String>,
    items: Vec<T>,
    index: HashMap<String, usize>,
}

impl<T> Registry<T> {
    pub fn new() -> Self {
        Self {
            names: Vec::new(),
            items: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Insert `item` under the first free identifier derived from `label`.
    ///
    /// Returns the insertion index, which stays valid for the registry's lifetime.
    pub fn insert(&mut self, label: &str, item: T) -> Result<usize, RegistryError> {
        self.insert_with(label, item, |_| false)
    }

    /// Like [`Registry::insert`], but also refuses identifiers `also_taken` reports
    /// as used elsewhere (e.g. a namespace shared by several registries).
    pub fn insert_with<F>(&mut self, label: &str, item: T, also_taken: F) -> Result<usize, RegistryError>
    where
        F: Fn(&str) -> bool,
    {
        let name = allocate(label, |c| self.index.contains_key(c) || also_taken(c))?;
        let idx = self.items.len();
        self.index.insert(name.clone(), idx);
        self.names.push(name);
        self.items.push(item);
        Ok(idx)
    }

    pub fn name(&self, idx: usize) -> Option<&str> {
        self.names.get(idx).map(String::as_str)
    }

    pub fn get(&self, idx: usize) -> Option<&T> {
        self.items.get(idx)
    }

    pub fn get_mut(&mut self, idx: usize) -> Option<&mut T> {
        self.items.get_mut(idx)
    }

    pub fn lookup(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Entries in insertion order as `(index, identifier, item)`.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &str, &T)> {
        self.names
            .iter()
            .zip(&self.items)
            .enumerate()
            .map(|(idx, (name, item))| (idx, name.as_str(), item))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<T> Default for Registry<T> {
    fn default() -> Self {
        Self::new()
    }
}
