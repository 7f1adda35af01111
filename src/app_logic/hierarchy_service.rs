use crate::core::backend::{DEFAULT_PAGE_LIMIT, DeleteOptions, ListQuery, ResourceBackendOperations};
use crate::core::tree_view::{self, OutlineRow};
use crate::core::{
    ApiError, ApiResult, BackendSelector, Entity, NodePatch, ResourceId, ResourceKind,
    ResourceNode, ResourceTree, TreeError,
};
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;

fn node_from_entity(entity: &Entity) -> ApiResult<ResourceNode> {
    ResourceNode::from_entity(entity)
        .map_err(|e| ApiError::server(format!("Backend returned a malformed node: {e}")))
}

/*
 * Manages the local snapshot of one hierarchical resource kind (folders or
 * collections) and keeps it in step with whichever backend the `BackendSelector`
 * currently picks. Each structural change is first validated against the local
 * tree, so a move into the node's own subtree or a non-cascading delete of a
 * parent is refused without any backend traffic. Successful responses are then
 * folded back into the snapshot.
 *
 * Several operations may be in flight at once. The tree lock is never held
 * across a backend call; instead each settlement re-checks the tree as it is at
 * that moment.
 */
pub struct HierarchyService {
    kind: ResourceKind,
    selector: BackendSelector,
    tree: Arc<Mutex<ResourceTree>>,
}

impl HierarchyService {
    pub fn new(kind: ResourceKind, selector: BackendSelector) -> Self {
        assert!(
            kind.is_hierarchical(),
            "HierarchyService: {kind} is not a hierarchical kind"
        );
        HierarchyService {
            kind,
            selector,
            tree: Arc::new(Mutex::new(ResourceTree::new(kind))),
        }
    }

    fn backend(&self) -> Arc<dyn ResourceBackendOperations> {
        self.selector.select(self.kind)
    }

    /* Snapshot copy of the local tree. */
    pub fn snapshot(&self) -> ResourceTree {
        self.tree.lock().clone()
    }

    pub fn get(&self, id: &ResourceId) -> Option<ResourceNode> {
        self.tree.lock().get(id).cloned()
    }

    /* Rows for rendering the tree, depth-first. */
    pub fn outline(&self) -> Vec<OutlineRow> {
        tree_view::outline(self.tree.lock().nodes())
    }

    pub fn breadcrumb(&self, id: &ResourceId) -> Vec<ResourceNode> {
        let tree = self.tree.lock();
        tree_view::breadcrumb(tree.nodes(), id)
            .into_iter()
            .cloned()
            .collect()
    }

    /* Whether dropping `id` onto `target` (or onto the root with `None`) is legal. */
    pub fn can_drop(&self, id: &ResourceId, target: Option<&ResourceId>) -> bool {
        self.tree.lock().can_move(id, target)
    }

    fn require_node(&self, id: &ResourceId) -> ApiResult<()> {
        if self.tree.lock().contains(id) {
            Ok(())
        } else {
            Err(TreeError::NodeNotFound(id.clone()).into())
        }
    }

    fn require_collection(&self) -> ApiResult<()> {
        if self.kind == ResourceKind::Collections {
            Ok(())
        } else {
            Err(TreeError::NotACollection(self.kind).into())
        }
    }

    /* Folds a node returned by the backend into the local tree. */
    fn absorb(&self, entity: &Entity) -> ApiResult<ResourceNode> {
        let node = node_from_entity(entity)?;
        self.tree.lock().upsert(node.clone())?;
        Ok(node)
    }

    /*
     * Replaces the local snapshot with the backend's full node set, following the
     * pagination until the last page. Returns the number of nodes loaded. On
     * failure the previous snapshot is kept.
     */
    pub async fn refresh(&self) -> ApiResult<usize> {
        let backend = self.backend();
        let mut nodes = Vec::new();
        let mut page = 1;
        loop {
            let result = backend
                .list(&ListQuery::page(page, DEFAULT_PAGE_LIMIT))
                .await?;
            for entity in &result.items {
                nodes.push(node_from_entity(entity)?);
            }
            if !result.meta.has_next() || result.items.is_empty() {
                break;
            }
            page += 1;
        }

        let count = nodes.len();
        self.tree.lock().replace_all(nodes);
        log::debug!(
            "HierarchyService({}): Refreshed {count} node(s) from {} backend in {page} page(s)",
            self.kind,
            backend.name()
        );
        Ok(count)
    }

    pub async fn create_node(
        &self,
        name: &str,
        parent_id: Option<&ResourceId>,
    ) -> ApiResult<ResourceNode> {
        if name.trim().is_empty() {
            return Err(ApiError::validation(
                vec!["name".to_string()],
                "Name must not be empty",
            ));
        }
        if let Some(parent) = parent_id {
            self.require_node(parent)?;
        }

        let mut entity = Entity::new();
        entity.insert("name".to_string(), Value::String(name.to_string()));
        entity.insert(
            "parentId".to_string(),
            parent_id.map_or(Value::Null, |p| Value::String(p.to_string())),
        );
        let created = self.backend().create(entity).await?;
        let node = self.absorb(&created)?;
        log::debug!(
            "HierarchyService({}): Created {} '{}'",
            self.kind,
            node.id,
            node.name
        );
        Ok(node)
    }

    async fn patch_node(&self, id: &ResourceId, patch: NodePatch) -> ApiResult<ResourceNode> {
        self.require_node(id)?;
        let partial = match serde_json::to_value(&patch) {
            Ok(Value::Object(map)) => map,
            _ => Entity::new(),
        };
        let updated = self.backend().update(id, partial).await?;
        self.absorb(&updated)
    }

    pub async fn rename_node(&self, id: &ResourceId, name: &str) -> ApiResult<ResourceNode> {
        if name.trim().is_empty() {
            return Err(ApiError::validation(
                vec!["name".to_string()],
                "Name must not be empty",
            ));
        }
        self.patch_node(
            id,
            NodePatch {
                name: Some(name.to_string()),
                color: None,
            },
        )
        .await
    }

    pub async fn recolor_node(&self, id: &ResourceId, color: &str) -> ApiResult<ResourceNode> {
        self.patch_node(
            id,
            NodePatch {
                name: None,
                color: Some(color.to_string()),
            },
        )
        .await
    }

    /*
     * Moves `id` under `target` (`None` makes it a root). Illegal moves are
     * refused before dispatch. If another change settled while this one was in
     * flight and the move is now illegal locally, the local tree is left as is
     * and the cycle is reported.
     */
    pub async fn move_node(
        &self,
        id: &ResourceId,
        target: Option<&ResourceId>,
    ) -> ApiResult<ResourceNode> {
        self.tree.lock().check_move(id, target)?;

        let moved = self.backend().move_node(id, target).await?;
        let node = node_from_entity(&moved)?;

        let mut tree = self.tree.lock();
        if let Err(e) = tree.check_move(&node.id, node.parent_id.as_ref()) {
            log::warn!(
                "HierarchyService({}): Move of {id} settled but is no longer legal locally: {e}",
                self.kind
            );
            return Err(e.into());
        }
        tree.upsert(node.clone())?;
        Ok(node)
    }

    /*
     * Deletes `id`. Without `cascade`, a node with children is refused locally.
     * Returns the ids removed from the local tree, deepest first.
     */
    pub async fn delete_node(&self, id: &ResourceId, cascade: bool) -> ApiResult<Vec<ResourceId>> {
        {
            let tree = self.tree.lock();
            if !tree.contains(id) {
                return Err(TreeError::NodeNotFound(id.clone()).into());
            }
            let child_count = tree.children_of(id).len();
            if !cascade && child_count > 0 {
                return Err(TreeError::HasChildren {
                    id: id.clone(),
                    child_count,
                }
                .into());
            }
        }

        self.backend().delete(id, DeleteOptions { cascade }).await?;

        // The backend has already removed the subtree, so mirror it unconditionally.
        match self.tree.lock().delete(id, true) {
            Ok(removed) => Ok(removed),
            Err(TreeError::NodeNotFound(_)) => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn add_items(
        &self,
        id: &ResourceId,
        item_ids: &[ResourceId],
    ) -> ApiResult<ResourceNode> {
        self.require_collection()?;
        self.require_node(id)?;
        let updated = self.backend().add_items(id, item_ids).await?;
        self.absorb(&updated)
    }

    pub async fn remove_items(
        &self,
        id: &ResourceId,
        item_ids: &[ResourceId],
    ) -> ApiResult<ResourceNode> {
        self.require_collection()?;
        self.require_node(id)?;
        let updated = self.backend().remove_items(id, item_ids).await?;
        self.absorb(&updated)
    }
}
