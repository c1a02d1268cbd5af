use std::collections::HashMap;
use std::sync::Arc;

use super::SttProvider;

pub type ProviderConstructor = Box<dyn Fn() -> Arc<dyn SttProvider> + Send + Sync>;

/// Maps a provider name to a constructor. Adding a provider is a
/// registration, never a change to the chunk driver.
#[derive(Default)]
pub struct ProviderRegistry {
    constructors: HashMap<String, ProviderConstructor>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        name: impl Into<String>,
        constructor: impl Fn() -> Arc<dyn SttProvider> + Send + Sync + 'static,
    ) {
        self.constructors.insert(name.into(), Box::new(constructor));
    }

    pub fn resolve(&self, name: &str) -> Option<Arc<dyn SttProvider>> {
        self.constructors.get(name).map(|build| build())
    }

    pub fn names(&self) -> Vec<&str> {
        self.constructors.keys().map(String::as_str).collect()
    }
}
