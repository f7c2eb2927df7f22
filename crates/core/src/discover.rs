//! Source discovery: turning installed assistants into registered stores.

use std::sync::Arc;

use crate::error::Result;
use crate::registry::StoreRegistry;
use crate::store::Store;
use crate::types::Source;

/// Constructs a [`Store`] for one source when that source is present on this
/// machine.
pub trait StoreFactory: Send + Sync {
    fn source(&self) -> Source;

    /// Cheap presence probe, typically a directory existence check. Called
    /// before [`StoreFactory::create`] to skip sources that are not
    /// installed.
    fn is_available(&self) -> bool;

    /// Build the store. `Ok(None)` means available but currently empty in a
    /// way that makes registration pointless.
    fn create(&self) -> Result<Option<Arc<dyn Store>>>;
}

/// Runs every known factory and assembles a registry from the survivors.
#[derive(Default)]
pub struct Discovery {
    factories: Vec<Box<dyn StoreFactory>>,
}

impl Discovery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, factory: Box<dyn StoreFactory>) {
        self.factories.push(factory);
    }

    /// Probe every factory and register each store that is present and has
    /// at least one project. A factory failure is logged and skipped so one
    /// broken installation never hides the others.
    pub fn discover(&self) -> StoreRegistry {
        let registry = StoreRegistry::new();
        for factory in &self.factories {
            let source = factory.source();
            if !factory.is_available() {
                tracing::debug!(%source, "source not present, skipping");
                continue;
            }
            let store = match factory.create() {
                Ok(Some(store)) => store,
                Ok(None) => continue,
                Err(err) => {
                    tracing::warn!(%source, error = %err, "source discovery failed, skipping");
                    continue;
                }
            };
            match store.list_projects() {
                Ok(projects) if projects.is_empty() => {
                    tracing::debug!(%source, "source has no projects, skipping");
                }
                Ok(_) => registry.register(store),
                Err(err) => {
                    tracing::warn!(%source, error = %err, "source listing failed, skipping");
                }
            }
        }
        registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::registry::tests::FakeStore;

    struct FakeFactory {
        source: &'static str,
        available: bool,
        fail: bool,
        projects: Vec<&'static str>,
    }

    impl StoreFactory for FakeFactory {
        fn source(&self) -> Source {
            Source::new(self.source)
        }

        fn is_available(&self) -> bool {
            self.available
        }

        fn create(&self) -> Result<Option<Arc<dyn Store>>> {
            if self.fail {
                return Err(StoreError::Io("probe failed".to_string()));
            }
            let mut store = FakeStore::new(self.source);
            for path in &self.projects {
                store = store.with_project(path, &[]);
            }
            Ok(Some(Arc::new(store)))
        }
    }

    #[test]
    fn discovers_only_populated_available_sources() {
        let mut discovery = Discovery::new();
        discovery.register(Box::new(FakeFactory {
            source: "claude",
            available: true,
            fail: false,
            projects: vec!["/a"],
        }));
        discovery.register(Box::new(FakeFactory {
            source: "codex",
            available: false,
            fail: false,
            projects: vec!["/b"],
        }));
        discovery.register(Box::new(FakeFactory {
            source: "empty",
            available: true,
            fail: false,
            projects: vec![],
        }));

        let registry = discovery.discover();
        assert_eq!(registry.sources(), vec![Source::new("claude")]);
    }

    #[test]
    fn factory_failure_does_not_abort_discovery() {
        let mut discovery = Discovery::new();
        discovery.register(Box::new(FakeFactory {
            source: "broken",
            available: true,
            fail: true,
            projects: vec![],
        }));
        discovery.register(Box::new(FakeFactory {
            source: "claude",
            available: true,
            fail: false,
            projects: vec!["/a"],
        }));

        let registry = discovery.discover();
        assert_eq!(registry.sources(), vec![Source::new("claude")]);
    }
}
