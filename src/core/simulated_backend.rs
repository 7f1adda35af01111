/*
 * An in-memory backend that behaves like an unreliable network service. Every
 * call first sleeps for a configured delay, then fails with a synthetic error
 * at the configured rate, and only otherwise mutates the held resource set.
 *
 * Delay bounds and error rate are read from the shared `ConfigStore` at the start
 * of each call, so changing them takes effect on the next request. Injected
 * errors use the same `ApiError` constructors as the HTTP mapping, which keeps
 * them indistinguishable from genuine backend failures.
 */
use crate::core::backend::{
    DeleteOptions, ListPage, ListQuery, PageMeta, ParentFilter, ResourceBackendOperations,
    unsupported_for_flat_kind,
};
use crate::core::config::ConfigStore;
use crate::core::errors::{ApiError, ApiResult};
use crate::core::models::{Entity, NodePatch, ResourceId, ResourceKind, ResourceNode, entity_id};
use crate::core::tree_engine::ResourceTree;
use async_trait::async_trait;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimulatedOperation {
    List,
    GetById,
    Create,
    Update,
    Delete,
    Move,
    AddItems,
    RemoveItems,
}

impl SimulatedOperation {
    pub fn name(self) -> &'static str {
        match self {
            SimulatedOperation::List => "list",
            SimulatedOperation::GetById => "getById",
            SimulatedOperation::Create => "create",
            SimulatedOperation::Update => "update",
            SimulatedOperation::Delete => "delete",
            SimulatedOperation::Move => "move",
            SimulatedOperation::AddItems => "addItems",
            SimulatedOperation::RemoveItems => "removeItems",
        }
    }

    /* The synthetic failure injected for this operation. Always the same kind. */
    pub fn injected_error(self, kind: ResourceKind) -> ApiError {
        let op = self.name();
        match self {
            SimulatedOperation::List => {
                ApiError::network(format!("Failed to reach the server while listing {kind}"))
            }
            SimulatedOperation::GetById => {
                ApiError::timeout(format!("Timed out while loading {kind}"))
            }
            SimulatedOperation::Create | SimulatedOperation::Update => ApiError::validation(
                vec!["name".to_string()],
                format!("The server rejected the {op} request for {kind}"),
            ),
            SimulatedOperation::Delete => {
                ApiError::permission(format!("Not allowed to delete from {kind}"))
            }
            SimulatedOperation::Move
            | SimulatedOperation::AddItems
            | SimulatedOperation::RemoveItems => {
                ApiError::server(format!("The server failed to {op} in {kind}"))
            }
        }
    }
}

/* Per-kind storage: hierarchical kinds use the tree engine, flat kinds a plain list. */
enum SimulatedStore {
    Tree(ResourceTree),
    Flat { entities: Vec<Entity>, next_id: u64 },
}

pub struct SimulatedBackend {
    kind: ResourceKind,
    config: Arc<ConfigStore>,
    store: Mutex<SimulatedStore>,
    rng: Mutex<StdRng>,
}

fn string_field<'a>(entity: &'a Entity, key: &str) -> Option<&'a str> {
    entity.get(key).and_then(Value::as_str)
}

/*
 * Reads an optional parent reference. Returns `Err` for a present but non-string,
 * non-null value.
 */
fn parent_field(entity: &Entity) -> ApiResult<Option<ResourceId>> {
    match entity.get("parentId") {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(ResourceId::new(s.clone()))),
        Some(_) => Err(ApiError::validation(
            vec!["parentId".to_string()],
            "parentId must be a string or null",
        )),
    }
}

fn matches_search(entity: &Entity, search: &str) -> bool {
    let needle = search.to_lowercase();
    string_field(entity, "name")
        .or_else(|| string_field(entity, "title"))
        .is_some_and(|name| name.to_lowercase().contains(&needle))
}

impl SimulatedBackend {
    pub fn new(kind: ResourceKind, config: Arc<ConfigStore>) -> Self {
        let store = if kind.is_hierarchical() {
            SimulatedStore::Tree(ResourceTree::new(kind))
        } else {
            SimulatedStore::Flat {
                entities: Vec::new(),
                next_id: 1,
            }
        };
        SimulatedBackend {
            kind,
            config,
            store: Mutex::new(store),
            rng: Mutex::new(StdRng::from_os_rng()),
        }
    }

    /*
     * Creates a backend pre-populated with `entities`. For hierarchical kinds,
     * entities that do not describe a valid node are skipped with a warning.
     */
    pub fn with_entities(kind: ResourceKind, config: Arc<ConfigStore>, entities: Vec<Entity>) -> Self {
        let backend = SimulatedBackend::new(kind, config);
        {
            let mut store = backend.store.lock();
            match &mut *store {
                SimulatedStore::Tree(tree) => {
                    let nodes = entities
                        .iter()
                        .filter_map(|e| match ResourceNode::from_entity(e) {
                            Ok(node) => Some(node),
                            Err(err) => {
                                log::warn!(
                                    "SimulatedBackend({kind}): Skipping malformed seed entity: {err}"
                                );
                                None
                            }
                        })
                        .collect();
                    tree.replace_all(nodes);
                }
                SimulatedStore::Flat {
                    entities: held,
                    next_id,
                } => {
                    *next_id = entities.len() as u64 + 1;
                    *held = entities;
                }
            }
        }
        backend
    }

    /* Replaces the random source so delays and failures become reproducible. */
    pub fn with_seed(self, seed: u64) -> Self {
        *self.rng.lock() = StdRng::seed_from_u64(seed);
        self
    }

    /* Sleeps for the configured latency, then rolls for an injected failure. */
    async fn simulate_network(&self, op: SimulatedOperation) -> ApiResult<()> {
        let config = self.config.get_config();
        let bounds = config.simulated_delay;
        let delay_ms = match bounds.fixed {
            Some(fixed) => fixed,
            None if bounds.min >= bounds.max => bounds.min,
            None => self.rng.lock().random_range(bounds.min..=bounds.max),
        };
        log::trace!(
            "SimulatedBackend({}): {} delayed by {delay_ms} ms",
            self.kind,
            op.name()
        );
        tokio::time::sleep(Duration::from_millis(delay_ms)).await;

        let roll: f64 = self.rng.lock().random();
        if roll < config.simulated_error_rate {
            let err = op.injected_error(self.kind);
            log::debug!("SimulatedBackend({}): Injected failure: {err}", self.kind);
            return Err(err);
        }
        Ok(())
    }

    fn tree_only<'a>(
        kind: ResourceKind,
        store: &'a mut SimulatedStore,
        op: SimulatedOperation,
    ) -> ApiResult<&'a mut ResourceTree> {
        match store {
            SimulatedStore::Tree(tree) => Ok(tree),
            SimulatedStore::Flat { .. } => Err(unsupported_for_flat_kind(kind, op.name())),
        }
    }

    /* A re-parent target must exist; `None` (root) always does. */
    fn require_target(tree: &ResourceTree, target: Option<&ResourceId>) -> ApiResult<()> {
        match target {
            Some(target) if !tree.contains(target) => Err(ApiError::not_found(format!(
                "Target parent {target} does not exist"
            ))),
            _ => Ok(()),
        }
    }

    fn not_found(&self, id: &ResourceId) -> ApiError {
        ApiError::not_found(format!("No {} with id {id}", self.kind))
    }
}

fn paginate(items: Vec<Entity>, query: &ListQuery) -> ApiResult<ListPage> {
    if query.page == 0 {
        return Err(ApiError::validation(
            vec!["page".to_string()],
            "page numbers start at 1",
        ));
    }
    if query.limit == 0 {
        return Err(ApiError::validation(
            vec!["limit".to_string()],
            "limit must be positive",
        ));
    }
    let meta = PageMeta::new(items.len(), query.page, query.limit);
    let page_items = items
        .into_iter()
        .skip((query.page - 1) * query.limit)
        .take(query.limit)
        .collect();
    Ok(ListPage {
        items: page_items,
        meta,
    })
}

#[async_trait]
impl ResourceBackendOperations for SimulatedBackend {
    fn kind(&self) -> ResourceKind {
        self.kind
    }

    fn name(&self) -> &'static str {
        "simulated"
    }

    async fn list(&self, query: &ListQuery) -> ApiResult<ListPage> {
        self.simulate_network(SimulatedOperation::List).await?;
        let matching: Vec<Entity> = {
            let store = self.store.lock();
            match &*store {
                SimulatedStore::Tree(tree) => tree
                    .nodes()
                    .iter()
                    .filter(|n| match &query.parent {
                        None => true,
                        Some(ParentFilter::Root) => n.parent_id.is_none(),
                        Some(ParentFilter::Parent(p)) => n.parent_id.as_ref() == Some(p),
                    })
                    .map(ResourceNode::to_entity)
                    .collect(),
                SimulatedStore::Flat { entities, .. } => entities.clone(),
            }
        };
        let filtered = match &query.search {
            Some(search) if !search.trim().is_empty() => matching
                .into_iter()
                .filter(|e| matches_search(e, search.trim()))
                .collect(),
            _ => matching,
        };
        paginate(filtered, query)
    }

    async fn get_by_id(&self, id: &ResourceId) -> ApiResult<Entity> {
        self.simulate_network(SimulatedOperation::GetById).await?;
        let store = self.store.lock();
        let found = match &*store {
            SimulatedStore::Tree(tree) => tree.get(id).map(ResourceNode::to_entity),
            SimulatedStore::Flat { entities, .. } => entities
                .iter()
                .find(|e| entity_id(e).as_ref() == Some(id))
                .cloned(),
        };
        found.ok_or_else(|| self.not_found(id))
    }

    async fn create(&self, entity: Entity) -> ApiResult<Entity> {
        self.simulate_network(SimulatedOperation::Create).await?;
        let mut store = self.store.lock();
        match &mut *store {
            SimulatedStore::Tree(tree) => {
                let name = string_field(&entity, "name")
                    .map(str::trim)
                    .filter(|n| !n.is_empty())
                    .ok_or_else(|| {
                        ApiError::validation(vec!["name".to_string()], "A name is required")
                    })?
                    .to_string();
                let parent_id = parent_field(&entity)?;
                if let Some(parent) = &parent_id
                    && !tree.contains(parent)
                {
                    return Err(ApiError::validation(
                        vec!["parentId".to_string()],
                        format!("Parent {parent} does not exist"),
                    ));
                }
                let created = tree.create(&name, parent_id);
                let patch = NodePatch {
                    name: None,
                    color: string_field(&entity, "color").map(str::to_string),
                };
                let node = tree.update(&created.id, &patch)?;
                log::debug!("SimulatedBackend({}): Created node {}", self.kind, node.id);
                Ok(node.to_entity())
            }
            SimulatedStore::Flat { entities, next_id } => {
                let mut entity = entity;
                let id = match entity_id(&entity) {
                    Some(id) => {
                        if entities.iter().any(|e| entity_id(e).as_ref() == Some(&id)) {
                            return Err(ApiError::validation(
                                vec!["id".to_string()],
                                format!("A {} with id {id} already exists", self.kind),
                            ));
                        }
                        id
                    }
                    None => loop {
                        let candidate =
                            ResourceId::new(format!("{}-{}", self.kind.id_prefix(), next_id));
                        *next_id += 1;
                        if !entities.iter().any(|e| entity_id(e).as_ref() == Some(&candidate)) {
                            break candidate;
                        }
                    },
                };
                entity.insert("id".to_string(), Value::String(id.0.clone()));
                entities.push(entity.clone());
                log::debug!("SimulatedBackend({}): Created entity {id}", self.kind);
                Ok(entity)
            }
        }
    }

    async fn update(&self, id: &ResourceId, partial: Entity) -> ApiResult<Entity> {
        self.simulate_network(SimulatedOperation::Update).await?;
        let mut store = self.store.lock();
        match &mut *store {
            SimulatedStore::Tree(tree) => {
                if !tree.contains(id) {
                    return Err(self.not_found(id));
                }
                let name = string_field(&partial, "name").map(str::trim);
                if name.is_some_and(str::is_empty) {
                    return Err(ApiError::validation(
                        vec!["name".to_string()],
                        "A name must not be empty",
                    ));
                }
                if partial.contains_key("parentId") {
                    let parent = parent_field(&partial)?;
                    Self::require_target(tree, parent.as_ref())?;
                    tree.move_node(id, parent.as_ref())?;
                }
                let patch = NodePatch {
                    name: name.map(str::to_string),
                    color: string_field(&partial, "color").map(str::to_string),
                };
                Ok(tree.update(id, &patch)?.to_entity())
            }
            SimulatedStore::Flat { entities, .. } => {
                let target = entities
                    .iter_mut()
                    .find(|e| entity_id(e).as_ref() == Some(id))
                    .ok_or_else(|| ApiError::not_found(format!("No {} with id {id}", self.kind)))?;
                for (key, value) in partial {
                    if key != "id" {
                        target.insert(key, value);
                    }
                }
                Ok(target.clone())
            }
        }
    }

    async fn delete(&self, id: &ResourceId, options: DeleteOptions) -> ApiResult<()> {
        self.simulate_network(SimulatedOperation::Delete).await?;
        let mut store = self.store.lock();
        match &mut *store {
            SimulatedStore::Tree(tree) => {
                let removed = tree.delete(id, options.cascade)?;
                log::debug!(
                    "SimulatedBackend({}): Deleted {} node(s) rooted at {id}",
                    self.kind,
                    removed.len()
                );
                Ok(())
            }
            SimulatedStore::Flat { entities, .. } => {
                let before = entities.len();
                entities.retain(|e| entity_id(e).as_ref() != Some(id));
                if entities.len() == before {
                    return Err(ApiError::not_found(format!("No {} with id {id}", self.kind)));
                }
                Ok(())
            }
        }
    }

    async fn move_node(
        &self,
        id: &ResourceId,
        target_parent_id: Option<&ResourceId>,
    ) -> ApiResult<Entity> {
        self.simulate_network(SimulatedOperation::Move).await?;
        let mut store = self.store.lock();
        let tree = Self::tree_only(self.kind, &mut store, SimulatedOperation::Move)?;
        Self::require_target(tree, target_parent_id)?;
        Ok(tree.move_node(id, target_parent_id)?.to_entity())
    }

    async fn add_items(
        &self,
        collection_id: &ResourceId,
        item_ids: &[ResourceId],
    ) -> ApiResult<Entity> {
        self.simulate_network(SimulatedOperation::AddItems).await?;
        let mut store = self.store.lock();
        let tree = Self::tree_only(self.kind, &mut store, SimulatedOperation::AddItems)?;
        Ok(tree.add_items(collection_id, item_ids)?.to_entity())
    }

    async fn remove_items(
        &self,
        collection_id: &ResourceId,
        item_ids: &[ResourceId],
    ) -> ApiResult<Entity> {
        self.simulate_network(SimulatedOperation::RemoveItems).await?;
        let mut store = self.store.lock();
        let tree = Self::tree_only(self.kind, &mut store, SimulatedOperation::RemoveItems)?;
        Ok(tree.remove_items(collection_id, item_ids)?.to_entity())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::{MemoryConfigStorage, RuntimeConfig, SimulatedDelay};
    use crate::core::errors::ApiErrorKind;
    use serde_json::json;
    use tokio::time::Instant;

    fn config_with(delay: SimulatedDelay, error_rate: f64) -> Arc<ConfigStore> {
        Arc::new(ConfigStore::with_config(
            Arc::new(MemoryConfigStorage::default()),
            RuntimeConfig {
                simulated_delay: delay,
                simulated_error_rate: error_rate,
                ..RuntimeConfig::default()
            },
        ))
    }

    fn instant_reliable() -> Arc<ConfigStore> {
        config_with(
            SimulatedDelay {
                min: 0,
                max: 0,
                fixed: Some(0),
            },
            0.0,
        )
    }

    fn obj(value: serde_json::Value) -> Entity {
        value.as_object().cloned().expect("test entity must be an object")
    }

    fn folder_backend(config: Arc<ConfigStore>) -> SimulatedBackend {
        SimulatedBackend::with_entities(
            ResourceKind::Folders,
            config,
            vec![
                obj(json!({"id": "folder-1", "name": "Travel", "parentId": null})),
                obj(json!({"id": "folder-2", "name": "Japan", "parentId": "folder-1"})),
                obj(json!({"id": "folder-3", "name": "Kyoto", "parentId": "folder-2"})),
            ],
        )
        .with_seed(7)
    }

    #[tokio::test(start_paused = true)]
    async fn test_fixed_delay_is_applied_to_every_call() {
        let backend = folder_backend(config_with(
            SimulatedDelay {
                min: 200,
                max: 800,
                fixed: Some(300),
            },
            0.0,
        ));

        let started = Instant::now();
        backend.list(&ListQuery::default()).await.unwrap();
        backend.get_by_id(&"folder-1".into()).await.unwrap();

        assert_eq!(started.elapsed(), Duration::from_millis(600));
    }

    #[tokio::test(start_paused = true)]
    async fn test_random_delay_stays_within_bounds() {
        let backend = folder_backend(config_with(
            SimulatedDelay {
                min: 200,
                max: 800,
                fixed: None,
            },
            0.0,
        ));

        for _ in 0..20 {
            let started = Instant::now();
            backend.list(&ListQuery::default()).await.unwrap();
            let elapsed = started.elapsed();
            assert!(elapsed >= Duration::from_millis(200), "too fast: {elapsed:?}");
            assert!(elapsed <= Duration::from_millis(800), "too slow: {elapsed:?}");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_observed_failure_rate_converges_to_configured_rate() {
        let config = config_with(
            SimulatedDelay {
                min: 0,
                max: 0,
                fixed: Some(0),
            },
            0.2,
        );
        let backend = SimulatedBackend::new(ResourceKind::Tags, config).with_seed(42);
        let calls = 2_000;

        let mut failures = 0;
        for _ in 0..calls {
            if backend.list(&ListQuery::default()).await.is_err() {
                failures += 1;
            }
        }

        // Four standard deviations of Binomial(2000, 0.2) is roughly 72 calls.
        let observed = failures as f64 / calls as f64;
        assert!(
            (observed - 0.2).abs() < 0.036,
            "observed failure rate {observed} too far from 0.2"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_injected_errors_are_deterministic_per_operation_and_skip_mutation() {
        let config = config_with(
            SimulatedDelay {
                min: 0,
                max: 0,
                fixed: Some(0),
            },
            1.0,
        );
        let backend = folder_backend(config.clone());

        let list = backend.list(&ListQuery::default()).await.unwrap_err();
        let get = backend.get_by_id(&"folder-1".into()).await.unwrap_err();
        let create = backend
            .create(obj(json!({"name": "Never"})))
            .await
            .unwrap_err();
        let delete = backend
            .delete(&"folder-3".into(), DeleteOptions::default())
            .await
            .unwrap_err();
        let moved = backend
            .move_node(&"folder-3".into(), None)
            .await
            .unwrap_err();

        assert_eq!(list.kind, ApiErrorKind::Network);
        assert_eq!(get.kind, ApiErrorKind::Timeout);
        assert!(matches!(create.kind, ApiErrorKind::Validation { .. }));
        assert_eq!(delete.kind, ApiErrorKind::Permission);
        assert_eq!(moved.kind, ApiErrorKind::Server);

        config
            .update_config(crate::core::config::ConfigPatch {
                simulated_error_rate: Some(0.0),
                ..Default::default()
            })
            .unwrap();
        let page = backend.list(&ListQuery::default()).await.unwrap();
        assert_eq!(page.meta.total, 3);
        let kyoto = backend.get_by_id(&"folder-3".into()).await.unwrap();
        assert_eq!(kyoto.get("parentId"), Some(&json!("folder-2")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_move_into_own_subtree_reports_cycle() {
        let backend = folder_backend(instant_reliable());

        let err = backend
            .move_node(&"folder-1".into(), Some(&"folder-3".into()))
            .await
            .unwrap_err();
        let moved = backend
            .move_node(&"folder-3".into(), Some(&"folder-1".into()))
            .await
            .unwrap();

        assert_eq!(err.kind, ApiErrorKind::Cycle);
        assert_eq!(err.status, Some(409));
        assert_eq!(moved.get("parentId"), Some(&json!("folder-1")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_move_to_unknown_parent_is_not_found() {
        let backend = folder_backend(instant_reliable());
        let err = backend
            .move_node(&"folder-3".into(), Some(&"folder-404".into()))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ApiErrorKind::NotFound);
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_validates_name_and_parent() {
        let backend = folder_backend(instant_reliable());

        let nameless = backend.create(obj(json!({"name": "  "}))).await.unwrap_err();
        let orphan = backend
            .create(obj(json!({"name": "Lost", "parentId": "folder-404"})))
            .await
            .unwrap_err();
        let created = backend
            .create(obj(json!({"name": "Osaka", "parentId": "folder-2", "color": "#f97316"})))
            .await
            .unwrap();

        assert_eq!(
            nameless.kind,
            ApiErrorKind::Validation {
                fields: vec!["name".to_string()]
            }
        );
        assert_eq!(
            orphan.kind,
            ApiErrorKind::Validation {
                fields: vec!["parentId".to_string()]
            }
        );
        assert_eq!(created.get("name"), Some(&json!("Osaka")));
        assert_eq!(created.get("color"), Some(&json!("#f97316")));
        assert_eq!(created.get("parentId"), Some(&json!("folder-2")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_respects_cascade_flag() {
        let backend = folder_backend(instant_reliable());

        let refused = backend
            .delete(&"folder-1".into(), DeleteOptions { cascade: false })
            .await
            .unwrap_err();
        backend
            .delete(&"folder-1".into(), DeleteOptions { cascade: true })
            .await
            .unwrap();

        assert!(matches!(refused.kind, ApiErrorKind::Validation { .. }));
        let page = backend.list(&ListQuery::default()).await.unwrap();
        assert!(page.items.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_returned_entities_are_detached_copies() {
        let backend = folder_backend(instant_reliable());

        let mut fetched = backend.get_by_id(&"folder-1".into()).await.unwrap();
        fetched.insert("name".to_string(), json!("Tampered"));

        let again = backend.get_by_id(&"folder-1".into()).await.unwrap();
        assert_eq!(again.get("name"), Some(&json!("Travel")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_list_filters_by_parent_and_search_and_paginates() {
        let backend = folder_backend(instant_reliable());

        let roots = backend
            .list(&ListQuery {
                parent: Some(ParentFilter::Root),
                ..Default::default()
            })
            .await
            .unwrap();
        let under_japan = backend
            .list(&ListQuery {
                parent: Some(ParentFilter::Parent("folder-2".into())),
                ..Default::default()
            })
            .await
            .unwrap();
        let searched = backend
            .list(&ListQuery {
                search: Some("JAP".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        let second_page = backend.list(&ListQuery::page(2, 2)).await.unwrap();
        let bad_page = backend.list(&ListQuery::page(0, 2)).await.unwrap_err();

        assert_eq!(roots.items.len(), 1);
        assert_eq!(under_japan.items[0].get("name"), Some(&json!("Kyoto")));
        assert_eq!(searched.meta.total, 1);
        assert_eq!(second_page.items.len(), 1);
        assert_eq!(second_page.meta.total_pages, 2);
        assert!(matches!(bad_page.kind, ApiErrorKind::Validation { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_flat_kind_crud_and_tree_operations_rejected() {
        let backend = SimulatedBackend::new(ResourceKind::Tags, instant_reliable());

        let created = backend.create(obj(json!({"name": "sunset"}))).await.unwrap();
        let id = entity_id(&created).expect("created entity carries an id");
        let updated = backend
            .update(&id, obj(json!({"id": "hijack", "color": "#ffaa00"})))
            .await
            .unwrap();
        let rejected = backend.move_node(&id, None).await.unwrap_err();
        backend.delete(&id, DeleteOptions::default()).await.unwrap();
        let gone = backend.get_by_id(&id).await.unwrap_err();

        assert_eq!(id, ResourceId::new("tag-1"));
        assert_eq!(entity_id(&updated), Some(id));
        assert_eq!(updated.get("color"), Some(&json!("#ffaa00")));
        assert_eq!(
            rejected.kind,
            ApiErrorKind::Validation {
                fields: vec!["kind".to_string()]
            }
        );
        assert_eq!(gone.kind, ApiErrorKind::NotFound);
    }

    #[tokio::test(start_paused = true)]
    async fn test_item_membership_on_collections() {
        let backend = SimulatedBackend::with_entities(
            ResourceKind::Collections,
            instant_reliable(),
            vec![obj(json!({"id": "collection-1", "name": "Favourites"}))],
        );
        let id = ResourceId::new("collection-1");

        backend
            .add_items(&id, &["media-1".into(), "media-2".into()])
            .await
            .unwrap();
        let after_remove = backend.remove_items(&id, &["media-1".into()]).await.unwrap();

        assert_eq!(after_remove.get("childItemIds"), Some(&json!(["media-2"])));
    }

    #[tokio::test(start_paused = true)]
    async fn test_update_with_parent_change_is_cycle_checked() {
        let backend = folder_backend(instant_reliable());
        let err = backend
            .update(&"folder-1".into(), obj(json!({"parentId": "folder-2"})))
            .await
            .unwrap_err();
        let renamed = backend
            .update(&"folder-2".into(), obj(json!({"name": "Nippon", "parentId": null})))
            .await
            .unwrap();
        assert_eq!(err.kind, ApiErrorKind::Cycle);
        assert_eq!(renamed.get("name"), Some(&json!("Nippon")));
        assert_eq!(renamed.get("parentId"), Some(&json!(null)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_update_to_unknown_parent_is_not_found_and_leaves_node() {
        let backend = folder_backend(instant_reliable());

        let err = backend
            .update(
                &"folder-3".into(),
                obj(json!({"name": "Osaka", "parentId": "folder-404"})),
            )
            .await
            .unwrap_err();
        let kyoto = backend.get_by_id(&"folder-3".into()).await.unwrap();

        assert_eq!(err.kind, ApiErrorKind::NotFound);
        assert_eq!(kyoto.get("parentId"), Some(&json!("folder-2")));
        assert_eq!(kyoto.get("name"), Some(&json!("Kyoto")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_item_membership_is_refused_on_folders() {
        let backend = folder_backend(instant_reliable());

        let added = backend
            .add_items(&"folder-1".into(), &["media-1".into()])
            .await
            .unwrap_err();
        let removed = backend
            .remove_items(&"folder-1".into(), &["media-1".into()])
            .await
            .unwrap_err();
        let folder = backend.get_by_id(&"folder-1".into()).await.unwrap();

        let kind_error = ApiErrorKind::Validation {
            fields: vec!["kind".to_string()],
        };
        assert_eq!(added.kind, kind_error);
        assert_eq!(removed.kind, kind_error);
        assert_eq!(folder.get("childItemIds"), Some(&json!([])));
    }
}
