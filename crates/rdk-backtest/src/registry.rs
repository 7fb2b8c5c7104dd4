//! Strategy registry: catalogue of available strategy factories.
//!
//! The pipeline resolves a request's `strategy_id` here and hands the factory
//! to every phase. Insertion order is preserved in `list()` output. Ids are
//! compared case-sensitively.

use std::sync::Arc;

use crate::StrategyFactory;

/// Errors returned by [`StrategyRegistry`] operations.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RegistryError {
    DuplicateName { name: String },
    UnknownStrategy { name: String },
    /// The id is empty or contains only whitespace.
    EmptyName,
}

impl std::fmt::Display for RegistryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicateName { name } => {
                write!(f, "strategy '{name}' is already registered")
            }
            Self::UnknownStrategy { name } => {
                write!(f, "no strategy named '{name}' is registered")
            }
            Self::EmptyName => write!(f, "strategy id must not be empty"),
        }
    }
}

impl std::error::Error for RegistryError {}

#[derive(Clone, Default)]
pub struct StrategyRegistry {
    entries: Vec<Arc<dyn StrategyFactory>>,
}

impl StrategyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// # Errors
    /// - [`RegistryError::EmptyName`] if the factory id is blank.
    /// - [`RegistryError::DuplicateName`] if the id is already registered.
    pub fn register(&mut self, factory: Arc<dyn StrategyFactory>) -> Result<(), RegistryError> {
        let id = factory.strategy_id();
        if id.trim().is_empty() {
            return Err(RegistryError::EmptyName);
        }
        if self.contains(id) {
            return Err(RegistryError::DuplicateName {
                name: id.to_string(),
            });
        }
        self.entries.push(factory);
        Ok(())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.iter().any(|f| f.strategy_id() == id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Registered ids in insertion order.
    pub fn list(&self) -> Vec<&str> {
        self.entries.iter().map(|f| f.strategy_id()).collect()
    }

    pub fn get(&self, id: &str) -> Result<Arc<dyn StrategyFactory>, RegistryError> {
        self.entries
            .iter()
            .find(|f| f.strategy_id() == id)
            .cloned()
            .ok_or_else(|| RegistryError::UnknownStrategy {
                name: id.to_string(),
            })
    }
}

impl std::fmt::Debug for StrategyRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StrategyRegistry")
            .field("strategies", &self.list())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::{BreakoutFactory, SmaCrossFactory};

    #[test]
    fn register_and_lookup_in_order() {
        let mut reg = StrategyRegistry::new();
        reg.register(Arc::new(SmaCrossFactory)).unwrap();
        reg.register(Arc::new(BreakoutFactory)).unwrap();
        assert_eq!(reg.list(), vec!["sma_cross", "breakout"]);
        assert_eq!(reg.get("breakout").unwrap().strategy_id(), "breakout");
    }

    #[test]
    fn duplicate_is_rejected() {
        let mut reg = StrategyRegistry::new();
        reg.register(Arc::new(SmaCrossFactory)).unwrap();
        assert_eq!(
            reg.register(Arc::new(SmaCrossFactory)),
            Err(RegistryError::DuplicateName {
                name: "sma_cross".to_string()
            })
        );
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn unknown_is_an_error() {
        let reg = StrategyRegistry::new();
        assert!(reg.is_empty());
        assert!(matches!(
            reg.get("nope"),
            Err(RegistryError::UnknownStrategy { .. })
        ));
    }
}
