//! Converter registry
//!
//! Maps implementation names to converters. Built once at startup.

use std::collections::HashMap;
use std::sync::Arc;

use contracts::{ContractError, Converter, ConverterConfig};
use tracing::debug;

use crate::{FloatToField, JsonFields, Lwt};

/// Implementation name → converter
#[derive(Clone, Default)]
pub struct ConverterRegistry {
    converters: HashMap<&'static str, Arc<dyn Converter>>,
}

impl ConverterRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in implementation
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(FloatToField));
        registry.register(Arc::new(Lwt));
        registry.register(Arc::new(JsonFields));
        registry
    }

    /// Register a converter under its implementation name
    ///
    /// Returns the converter previously registered under that name, if any.
    pub fn register(&mut self, converter: Arc<dyn Converter>) -> Option<Arc<dyn Converter>> {
        let name = converter.implementation();
        debug!(implementation = name, "converter registered");
        self.converters.insert(name, converter)
    }

    /// Look up an implementation by name
    pub fn get(&self, implementation: &str) -> Option<Arc<dyn Converter>> {
        self.converters.get(implementation).cloned()
    }

    /// Resolve the implementation a converter config asks for
    ///
    /// # Errors
    /// `ContractError::UnknownImplementation` when the name is not registered.
    pub fn resolve(&self, config: &ConverterConfig) -> Result<Arc<dyn Converter>, ContractError> {
        self.get(&config.implementation).ok_or_else(|| {
            ContractError::unknown_implementation(&config.name, &config.implementation)
        })
    }

    /// Registered implementation names, sorted
    pub fn implementations(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.converters.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

impl std::fmt::Debug for ConverterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConverterRegistry")
            .field("implementations", &self.implementations())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins_are_registered() {
        let registry = ConverterRegistry::with_builtins();
        assert_eq!(
            registry.implementations(),
            vec!["float-to-field", "json-fields", "lwt"]
        );
        assert_eq!(
            registry.get("lwt").map(|c| c.default_measurement()),
            Some("lwt")
        );
    }

    #[test]
    fn test_unknown_implementation_is_rejected() {
        let registry = ConverterRegistry::with_builtins();
        let config = ConverterConfig {
            name: "temp-conv".into(),
            implementation: "nope".into(),
            ..Default::default()
        };
        let err = registry.resolve(&config).err().unwrap();
        assert!(err.is_configuration());
        assert!(matches!(err, ContractError::UnknownImplementation { .. }));
    }

    #[test]
    fn test_register_replaces_existing() {
        let mut registry = ConverterRegistry::new();
        assert!(registry.register(Arc::new(Lwt)).is_none());
        assert!(registry.register(Arc::new(Lwt)).is_some());
        assert_eq!(registry.implementations().len(), 1);
    }
}
