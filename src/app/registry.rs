//! Entrypoint lookup
//!
//! Resolves an entry string (`module` or `module:attribute`) to an
//! entrypoint object. Without an explicit attribute, `app` is tried first and
//! then `application`.

use super::entrypoint::Entrypoint;
use crate::error::DevError;
use std::collections::BTreeMap;
use std::sync::Arc;

const DEFAULT_ATTRS: [&str; 2] = ["app", "application"];

/// Named attributes exported by one entrypoint module
#[derive(Default)]
pub struct Module {
    attrs: BTreeMap<String, Arc<dyn Entrypoint>>,
}

impl Module {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn export(mut self, name: &str, object: Arc<dyn Entrypoint>) -> Self {
        self.attrs.insert(name.to_string(), object);
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Entrypoint>> {
        self.attrs.get(name).cloned()
    }
}

/// A resolved entrypoint together with where it came from
pub struct LoadedEntry {
    pub module: String,
    pub attr: String,
    pub object: Arc<dyn Entrypoint>,
}

impl LoadedEntry {
    /// `module:attr`, as shown in diagnostics
    pub fn label(&self) -> String {
        format!("{}:{}", self.module, self.attr)
    }
}

#[derive(Default)]
pub struct Registry {
    modules: BTreeMap<String, Module>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn register(mut self, name: &str, module: Module) -> Self {
        self.modules.insert(name.to_string(), module);
        self
    }

    pub fn load(&self, entry: &str) -> Result<LoadedEntry, DevError> {
        let (module_name, attr) = match entry.split_once(':') {
            Some((module, attr)) => (module.trim(), Some(attr.trim())),
            None => (entry.trim(), None),
        };

        let module = self
            .modules
            .get(module_name)
            .ok_or_else(|| DevError::ModuleNotFound {
                module: module_name.to_string(),
            })?;

        let (attr, object) = match attr {
            Some(attr) => {
                let object = module.get(attr).ok_or_else(|| DevError::MissingAttribute {
                    module: module_name.to_string(),
                    attr: attr.to_string(),
                })?;
                (attr, object)
            }
            None => DEFAULT_ATTRS
                .iter()
                .find_map(|name| module.get(name).map(|object| (*name, object)))
                .ok_or_else(|| DevError::MissingApp {
                    module: module_name.to_string(),
                })?,
        };

        Ok(LoadedEntry {
            module: module_name.to_string(),
            attr: attr.to_string(),
            object,
        })
    }
}
