//! Effect library for managing available effect types
//!
//! The library holds every registered effect descriptor and answers
//! lookups by kind or category. Pipelines share descriptors through `Arc`.

use std::collections::HashMap;
use std::sync::Arc;

use super::builtin::register_builtin_effects;
use super::descriptor::{EffectDescriptor, EffectKind};
use crate::pipeline::PipelineError;

/// Library of available effect types
///
/// Descriptors are registered at startup and never change afterwards.
pub struct EffectLibrary {
    /// Descriptors by kind
    effects: HashMap<EffectKind, Arc<EffectDescriptor>>,
    /// Kinds grouped by category
    categories: HashMap<String, Vec<EffectKind>>,
    /// Ordered list of categories for UI display
    category_order: Vec<String>,
}

impl Default for EffectLibrary {
    fn default() -> Self {
        Self::new()
    }
}

impl EffectLibrary {
    /// Create a new empty library
    pub fn new() -> Self {
        Self {
            effects: HashMap::new(),
            categories: HashMap::new(),
            category_order: Vec::new(),
        }
    }

    /// Create a library with every built-in effect registered
    pub fn with_builtins() -> Self {
        let mut library = Self::new();
        register_builtin_effects(&mut library);
        library
    }

    /// Register a descriptor, replacing any previous one of the same kind
    pub fn register(&mut self, descriptor: EffectDescriptor) -> Result<(), PipelineError> {
        descriptor
            .validate()
            .map_err(PipelineError::InvalidDescriptor)?;

        let kind = descriptor.kind;
        let category = descriptor.category.clone();

        if self.effects.contains_key(&kind) {
            for kinds in self.categories.values_mut() {
                kinds.retain(|k| *k != kind);
            }
        }

        // Add to category index
        if !self.categories.contains_key(&category) {
            self.categories.insert(category.clone(), Vec::new());
            self.category_order.push(category.clone());
        }
        if let Some(kinds) = self.categories.get_mut(&category) {
            kinds.push(kind);
        }

        self.effects.insert(kind, Arc::new(descriptor));
        Ok(())
    }

    /// Get a descriptor by kind
    pub fn get(&self, kind: EffectKind) -> Option<Arc<EffectDescriptor>> {
        self.effects.get(&kind).cloned()
    }

    /// Check if a kind is registered
    pub fn contains(&self, kind: EffectKind) -> bool {
        self.effects.contains_key(&kind)
    }

    /// All registered kinds, in `EffectKind` order
    pub fn kinds(&self) -> Vec<EffectKind> {
        let mut kinds: Vec<_> = self.effects.keys().copied().collect();
        kinds.sort();
        kinds
    }

    /// Get the number of registered effects
    pub fn len(&self) -> usize {
        self.effects.len()
    }

    /// Check if the library is empty
    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    /// Get all category names in display order
    pub fn categories(&self) -> &[String] {
        &self.category_order
    }

    /// Get all kinds in a category
    pub fn effects_in_category(&self, category: &str) -> Option<&[EffectKind]> {
        self.categories.get(category).map(|v| v.as_slice())
    }

    /// Get all descriptors whose title, key or category matches `query`
    pub fn search(&self, query: &str) -> Vec<Arc<EffectDescriptor>> {
        let query_lower = query.to_lowercase();
        let mut results: Vec<_> = self
            .effects
            .values()
            .filter(|d| {
                d.title.to_lowercase().contains(&query_lower)
                    || d.kind.key().contains(&query_lower)
                    || d.category.to_lowercase().contains(&query_lower)
            })
            .cloned()
            .collect();
        results.sort_by_key(|d| d.kind);
        results
    }
}
