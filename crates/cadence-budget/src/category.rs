//! Budget category registry.
//!
//! Category names are resolved to stable numeric ids by position in the
//! configured list. The numeric id is what the simulation kernel's budget
//! accessors take.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::BudgetError;

/// Categories used when the configuration names none.
pub const DEFAULT_CATEGORIES: [&str; 4] = ["movement", "interaction", "spawn", "layout"];

/// Stable numeric id of a budget category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CategoryId(pub u32);

impl core::fmt::Display for CategoryId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Bidirectional name <-> id lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryRegistry {
    by_name: BTreeMap<String, CategoryId>,
    names: Vec<String>,
}

impl CategoryRegistry {
    /// Build a registry; ids are assigned by position.
    ///
    /// # Errors
    ///
    /// Returns [`BudgetError::DuplicateCategory`] if a name repeats.
    pub fn new(names: &[String]) -> Result<Self, BudgetError> {
        let mut by_name = BTreeMap::new();
        for (index, name) in names.iter().enumerate() {
            let raw = u32::try_from(index).map_err(|_err| BudgetError::TooManyCategories {
                count: names.len(),
            })?;
            if by_name.insert(name.clone(), CategoryId(raw)).is_some() {
                return Err(BudgetError::DuplicateCategory(name.clone()));
            }
        }
        Ok(Self {
            by_name,
            names: names.to_vec(),
        })
    }

    /// Resolve a name. Unknown names resolve to `None`.
    pub fn resolve(&self, name: &str) -> Option<CategoryId> {
        self.by_name.get(name).copied()
    }

    /// The name registered under `id`.
    pub fn name(&self, id: CategoryId) -> Option<&str> {
        let index = usize::try_from(id.0).ok()?;
        self.names.get(index).map(String::as_str)
    }

    /// Every `(id, name)` pair in id order.
    pub fn iter(&self) -> impl Iterator<Item = (CategoryId, &str)> {
        self.names
            .iter()
            .zip(0_u32..)
            .map(|(name, raw)| (CategoryId(raw), name.as_str()))
    }

    /// Number of registered categories.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether no categories are registered.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl Default for CategoryRegistry {
    fn default() -> Self {
        let names: Vec<String> = DEFAULT_CATEGORIES.iter().map(|&n| n.to_owned()).collect();
        let by_name = names
            .iter()
            .zip(0_u32..)
            .map(|(name, raw)| (name.clone(), CategoryId(raw)))
            .collect();
        Self { by_name, names }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|&n| n.to_owned()).collect()
    }

    #[test]
    fn ids_follow_position() {
        let registry = CategoryRegistry::new(&names(&["a", "b", "c"])).ok();
        let registry = registry.unwrap_or_default();
        assert_eq!(registry.resolve("a"), Some(CategoryId(0)));
        assert_eq!(registry.resolve("c"), Some(CategoryId(2)));
        assert_eq!(registry.name(CategoryId(1)), Some("b"));
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn unknown_names_do_not_resolve() {
        let registry = CategoryRegistry::default();
        assert_eq!(registry.resolve("teleport"), None);
        assert_eq!(registry.name(CategoryId(99)), None);
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let result = CategoryRegistry::new(&names(&["a", "b", "a"]));
        assert_eq!(result, Err(BudgetError::DuplicateCategory("a".to_owned())));
    }

    #[test]
    fn default_registry_matches_constant() {
        let registry = CategoryRegistry::default();
        let listed: Vec<&str> = registry.iter().map(|(_, name)| name).collect();
        assert_eq!(listed, DEFAULT_CATEGORIES.to_vec());
    }
}
