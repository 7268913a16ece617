//! # Category Registry
//!
//! Maps category type strings to their verifier. Categories are added
//! explicitly at construction; [`CategoryRegistry::with_defaults`] carries
//! the built-in Ethereum profile and Universal Profile categories.

use std::collections::BTreeMap;
use std::sync::Arc;

use super::category::{CategoryInfo, GatingCategory};
use super::errors::{GatingError, GatingResult};
use super::{ethereum, universal_profile};

/// Registry of gating categories keyed by type
#[derive(Clone, Default)]
pub struct CategoryRegistry {
    categories: BTreeMap<&'static str, Arc<dyn GatingCategory>>,
}

impl CategoryRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in categories
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.categories.insert(
            ethereum::CATEGORY_TYPE,
            Arc::new(ethereum::category()) as Arc<dyn GatingCategory>,
        );
        registry.categories.insert(
            universal_profile::CATEGORY_TYPE,
            Arc::new(universal_profile::category()) as Arc<dyn GatingCategory>,
        );
        registry
    }

    /// Add a category. A type can only be registered once.
    pub fn register(&mut self, category: Arc<dyn GatingCategory>) -> GatingResult<()> {
        let category_type = category.category_type();
        if self.categories.contains_key(category_type) {
            return Err(GatingError::DuplicateCategory(category_type.to_string()));
        }
        self.categories.insert(category_type, category);
        Ok(())
    }

    pub fn get(&self, category_type: &str) -> GatingResult<Arc<dyn GatingCategory>> {
        self.categories
            .get(category_type)
            .cloned()
            .ok_or_else(|| GatingError::UnknownCategory(category_type.to_string()))
    }

    pub fn contains(&self, category_type: &str) -> bool {
        self.categories.contains_key(category_type)
    }

    /// Registered categories in type order
    pub fn list(&self) -> Vec<CategoryInfo> {
        self.categories.values().map(|c| c.info()).collect()
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_registered() {
        let registry = CategoryRegistry::with_defaults();
        assert_eq!(registry.len(), 2);
        assert!(registry.contains("ethereum_profile"));
        assert!(registry.contains("universal_profile"));

        let types: Vec<_> = registry.list().iter().map(|i| i.category_type).collect();
        assert_eq!(types, vec!["ethereum_profile", "universal_profile"]);
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let mut registry = CategoryRegistry::with_defaults();
        let result = registry.register(Arc::new(ethereum::category()));
        assert!(matches!(result, Err(GatingError::DuplicateCategory(_))));
    }

    #[test]
    fn test_unknown_category_lookup() {
        let registry = CategoryRegistry::new();
        assert!(registry.is_empty());
        assert!(matches!(
            registry.get("lens_profile"),
            Err(GatingError::UnknownCategory(_))
        ));
    }
}
