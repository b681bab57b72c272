//! Fitting registry - module id → factory mapping
//!
//! Fitting specs name modules by id; the registry resolves those ids to
//! factories when workers come up.

use std::collections::HashMap;

use plumb_protocol::Arg;

use crate::{Fitting, FittingResult};

#[cfg(test)]
#[path = "registry_test.rs"]
mod tests;

/// Factory trait for fitting modules
///
/// One factory is registered per module id. The factory validates
/// arguments at pipeline-construction time and creates a fresh instance
/// for every worker.
pub trait FittingModule: Send + Sync {
    /// Create one instance for a worker
    ///
    /// # Errors
    ///
    /// Returns an error if the argument cannot be turned into a working
    /// instance. Worker startup reports this as an init failure.
    fn create(&self, arg: &Arg) -> FittingResult<Box<dyn Fitting>>;

    /// Module id this factory is known by
    fn name(&self) -> &'static str;

    /// Check an argument before any pipeline is built
    ///
    /// The default accepts everything; modules with argument requirements
    /// override this so misconfiguration fails at validation time instead
    /// of first-input time.
    fn validate_arg(&self, _arg: &Arg) -> Result<(), String> {
        Ok(())
    }
}

/// Registry of fitting module factories
pub struct FittingRegistry {
    factories: HashMap<String, Box<dyn FittingModule>>,
}

impl FittingRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Register a module factory
    ///
    /// # Panics
    ///
    /// Panics if a factory is already registered under this id.
    /// Use `try_register` for fallible registration.
    pub fn register<M: FittingModule + 'static>(&mut self, module_id: &str, module: M) {
        if self.factories.contains_key(module_id) {
            panic!("fitting module '{}' already registered", module_id);
        }
        self.factories.insert(module_id.to_string(), Box::new(module));
    }

    /// Try to register a module factory
    ///
    /// Returns `false` if a factory is already registered under this id.
    pub fn try_register<M: FittingModule + 'static>(&mut self, module_id: &str, module: M) -> bool {
        if self.factories.contains_key(module_id) {
            return false;
        }
        self.factories.insert(module_id.to_string(), Box::new(module));
        true
    }

    /// Create an instance of a module by id
    ///
    /// # Errors
    ///
    /// Fails if the id is unknown or the factory rejects the argument.
    pub fn create(&self, module_id: &str, arg: &Arg) -> FittingResult<Box<dyn Fitting>> {
        let factory = self.factories.get(module_id).ok_or_else(|| {
            crate::FittingError::failed(format!(
                "unknown fitting module '{}', available: [{}]",
                module_id,
                self.available().join(", ")
            ))
        })?;
        factory.create(arg)
    }

    /// Look up a factory by id
    pub fn get(&self, module_id: &str) -> Option<&dyn FittingModule> {
        self.factories.get(module_id).map(|f| f.as_ref())
    }

    /// Check if a module id is registered
    pub fn contains(&self, module_id: &str) -> bool {
        self.factories.contains_key(module_id)
    }

    /// Registered module ids, sorted for stable error messages
    pub fn available(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    /// Number of registered factories
    pub fn len(&self) -> usize {
        self.factories.len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl Default for FittingRegistry {
    fn default() -> Self {
        Self::new()
    }
}
