/*
 * Chooses between the real and the simulated backend for each resource kind.
 * `BackendRegistry` maps every kind to its {real, simulated} pair and selects
 * against an explicit `RuntimeConfig`, which keeps the choice testable on its own.
 * `BackendSelector` pairs the registry with the live `ConfigStore` and re-reads
 * the configuration on every `select`, so flipping `use_real_backend` applies to
 * the very next request.
 */
use crate::core::backend::ResourceBackendOperations;
use crate::core::config::{ConfigStore, RuntimeConfig};
use crate::core::http_backend::HttpBackend;
use crate::core::models::ResourceKind;
use crate::core::seed_data;
use crate::core::simulated_backend::SimulatedBackend;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Clone)]
pub struct BackendPair {
    pub real: Arc<dyn ResourceBackendOperations>,
    pub simulated: Arc<dyn ResourceBackendOperations>,
}

#[derive(Default, Clone)]
pub struct BackendRegistry {
    pairs: HashMap<ResourceKind, BackendPair>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /*
     * Registers both implementations for the kind they report. Registering a kind
     * twice replaces the earlier pair.
     */
    pub fn register(
        &mut self,
        real: Arc<dyn ResourceBackendOperations>,
        simulated: Arc<dyn ResourceBackendOperations>,
    ) -> &mut Self {
        assert_eq!(
            real.kind(),
            simulated.kind(),
            "BackendRegistry: real and simulated backends must serve the same kind"
        );
        let kind = real.kind();
        log::debug!(
            "BackendRegistry: Registered {kind} ({} / {})",
            real.name(),
            simulated.name()
        );
        self.pairs.insert(kind, BackendPair { real, simulated });
        self
    }

    /*
     * HTTP and simulated backends for all five kinds, the simulated ones seeded
     * with the demo dataset.
     */
    pub fn standard(config: Arc<ConfigStore>) -> Self {
        let mut registry = BackendRegistry::new();
        for kind in ResourceKind::ALL {
            registry.register(
                Arc::new(HttpBackend::new(kind, config.clone())),
                Arc::new(SimulatedBackend::with_entities(
                    kind,
                    config.clone(),
                    seed_data::demo_entities(kind),
                )),
            );
        }
        registry
    }

    pub fn contains(&self, kind: ResourceKind) -> bool {
        self.pairs.contains_key(&kind)
    }

    /*
     * Returns the implementation `config` asks for. A kind that was never
     * registered is a wiring bug and panics immediately.
     */
    pub fn select(
        &self,
        kind: ResourceKind,
        config: &RuntimeConfig,
    ) -> Arc<dyn ResourceBackendOperations> {
        let pair = self
            .pairs
            .get(&kind)
            .unwrap_or_else(|| panic!("BackendRegistry: no backend registered for {kind}"));
        if config.use_real_backend {
            pair.real.clone()
        } else {
            pair.simulated.clone()
        }
    }
}

#[derive(Clone)]
pub struct BackendSelector {
    registry: Arc<BackendRegistry>,
    config: Arc<ConfigStore>,
}

impl BackendSelector {
    pub fn new(registry: Arc<BackendRegistry>, config: Arc<ConfigStore>) -> Self {
        BackendSelector { registry, config }
    }

    pub fn select(&self, kind: ResourceKind) -> Arc<dyn ResourceBackendOperations> {
        self.registry.select(kind, &self.config.get_config())
    }

    pub fn config(&self) -> &Arc<ConfigStore> {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::{ConfigPatch, MemoryConfigStorage};

    fn store(use_real_backend: bool) -> Arc<ConfigStore> {
        Arc::new(ConfigStore::with_config(
            Arc::new(MemoryConfigStorage::default()),
            RuntimeConfig {
                use_real_backend,
                ..RuntimeConfig::default()
            },
        ))
    }

    #[test]
    fn test_registry_selects_by_config_flag() {
        let config = store(false);
        let registry = BackendRegistry::standard(config);

        let simulated = registry.select(ResourceKind::Media, &RuntimeConfig::default());
        let real = registry.select(
            ResourceKind::Media,
            &RuntimeConfig {
                use_real_backend: true,
                ..RuntimeConfig::default()
            },
        );

        assert_eq!(simulated.name(), "simulated");
        assert_eq!(real.name(), "http");
        assert_eq!(real.kind(), ResourceKind::Media);
    }

    #[test]
    fn test_standard_registry_covers_every_kind() {
        let registry = BackendRegistry::standard(store(false));
        for kind in ResourceKind::ALL {
            assert!(registry.contains(kind), "{kind} missing");
            assert_eq!(registry.select(kind, &RuntimeConfig::default()).kind(), kind);
        }
    }

    #[test]
    fn test_selector_follows_config_changes_without_rebuild() {
        let config = store(false);
        let selector = BackendSelector::new(
            Arc::new(BackendRegistry::standard(config.clone())),
            config.clone(),
        );
        assert_eq!(selector.select(ResourceKind::Folders).name(), "simulated");

        config
            .update_config(ConfigPatch {
                use_real_backend: Some(true),
                ..Default::default()
            })
            .unwrap();

        assert_eq!(selector.select(ResourceKind::Folders).name(), "http");
    }

    #[test]
    #[should_panic(expected = "no backend registered for tags")]
    fn test_selecting_unregistered_kind_panics() {
        let registry = BackendRegistry::new();
        registry.select(ResourceKind::Tags, &RuntimeConfig::default());
    }

    #[test]
    #[should_panic(expected = "must serve the same kind")]
    fn test_registering_mismatched_pair_panics() {
        let config = store(false);
        BackendRegistry::new().register(
            Arc::new(HttpBackend::new(ResourceKind::Tags, config.clone())),
            Arc::new(SimulatedBackend::new(ResourceKind::Users, config)),
        );
    }
}
