//! Configuration-key → constructor registries.
//!
//! The host fills these at startup; configuration can then only name
//! constructors the host chose to expose.

use crate::event_bus::EventBus;
use crate::module::{Host, ScreenModule};
use crate::service::Service;
use crate::settings::ModuleSettings;
use crate::ModuleError;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

type ModuleFactory<H> = Box<dyn Fn(&Value) -> crate::Result<Box<dyn ScreenModule<H>>> + Send + Sync>;
type ServiceFactory<H> = Box<dyn Fn(ServiceContext<H>) -> crate::Result<Box<dyn Service>> + Send + Sync>;

/// Builds screen modules from their settings payload.
pub struct ModuleFactories<H: Host> {
    factories: HashMap<String, ModuleFactory<H>>,
}

impl<H: Host> Default for ModuleFactories<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H: Host> ModuleFactories<H> {
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Register (or replace) the constructor for `key`.
    pub fn register<F>(&mut self, key: &str, factory: F)
    where
        F: Fn(&Value) -> crate::Result<Box<dyn ScreenModule<H>>> + Send + Sync + 'static,
    {
        self.factories.insert(key.to_string(), Box::new(factory));
    }

    pub fn contains(&self, key: &str) -> bool {
        self.factories.contains_key(key)
    }

    /// Registered keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.factories.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Instantiate the module named by `target` with `settings`.
    pub fn create(&self, target: &str, settings: &Value) -> crate::Result<Box<dyn ScreenModule<H>>> {
        if target.is_empty() {
            return Err(ModuleError::MissingTarget.into());
        }
        let factory = self
            .factories
            .get(target)
            .ok_or_else(|| ModuleError::UnknownTarget(target.to_string()))?;
        factory(settings)
    }

    pub fn create_from_config(&self, config: &ModuleSettings) -> crate::Result<Box<dyn ScreenModule<H>>> {
        self.create(&config.target, &config.settings)
    }
}

/// What a service constructor receives.
pub struct ServiceContext<H: Host> {
    pub app: Arc<H>,
    pub settings: Value,
    pub event_bus: Option<Arc<EventBus>>,
}

/// Builds background services from their context.
pub struct ServiceFactories<H: Host> {
    factories: HashMap<String, ServiceFactory<H>>,
}

impl<H: Host> Default for ServiceFactories<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H: Host> ServiceFactories<H> {
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    pub fn register<F>(&mut self, key: &str, factory: F)
    where
        F: Fn(ServiceContext<H>) -> crate::Result<Box<dyn Service>> + Send + Sync + 'static,
    {
        self.factories.insert(key.to_string(), Box::new(factory));
    }

    pub fn contains(&self, key: &str) -> bool {
        self.factories.contains_key(key)
    }

    pub fn create(&self, target: &str, cx: ServiceContext<H>) -> crate::Result<Box<dyn Service>> {
        if target.is_empty() {
            return Err(ModuleError::MissingTarget.into());
        }
        let factory = self
            .factories
            .get(target)
            .ok_or_else(|| ModuleError::UnknownTarget(target.to_string()))?;
        factory(cx)
    }
}
