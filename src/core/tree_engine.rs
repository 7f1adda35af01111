/*
 * The hierarchical tree engine: owns a flat set of folder or collection nodes
 * linked by `parent_id` and keeps that set a forest. `move_node` is the single
 * place where the acyclic invariant is enforced; every other structural mutation
 * is unconstrained except that a non-cascading delete refuses to orphan children.
 *
 * All operations are all-or-nothing: an `Err` leaves the node set untouched.
 * There is no adjacency index; relationships are recomputed from `parent_id` on
 * each query, so the cycle check is always evaluated against the current set.
 */
use crate::core::errors::ApiError;
use crate::core::models::{NodePatch, ResourceId, ResourceKind, ResourceNode};
use crate::core::tree_view;
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeError {
    NodeNotFound(ResourceId),
    Cycle { id: ResourceId, target: ResourceId },
    HasChildren { id: ResourceId, child_count: usize },
    NotACollection(ResourceKind),
}

impl std::fmt::Display for TreeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TreeError::NodeNotFound(id) => write!(f, "Node not found: {id}"),
            TreeError::Cycle { id, target } => write!(
                f,
                "Cannot move {id} under {target}: the target is the node itself or one of its descendants"
            ),
            TreeError::HasChildren { id, child_count } => write!(
                f,
                "Cannot delete {id}: it still has {child_count} child node(s)"
            ),
            TreeError::NotACollection(kind) => {
                write!(f, "Item membership is only supported on collections, not {kind}")
            }
        }
    }
}

impl std::error::Error for TreeError {}

impl From<TreeError> for ApiError {
    fn from(err: TreeError) -> Self {
        let message = err.to_string();
        match err {
            TreeError::NodeNotFound(_) => ApiError::not_found(message),
            TreeError::Cycle { .. } => ApiError::cycle(message),
            TreeError::HasChildren { .. } => {
                ApiError::validation(vec!["cascade".to_string()], message)
            }
            TreeError::NotACollection(_) => ApiError::validation(vec!["kind".to_string()], message),
        }
    }
}

pub type Result<T> = std::result::Result<T, TreeError>;

#[derive(Debug, Clone)]
pub struct ResourceTree {
    kind: ResourceKind,
    nodes: Vec<ResourceNode>,
    next_local_id: u64,
}

impl ResourceTree {
    pub fn new(kind: ResourceKind) -> Self {
        ResourceTree {
            kind,
            nodes: Vec::new(),
            next_local_id: 1,
        }
    }

    pub fn from_nodes(kind: ResourceKind, nodes: Vec<ResourceNode>) -> Self {
        let mut tree = ResourceTree::new(kind);
        tree.replace_all(nodes);
        tree
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn nodes(&self) -> &[ResourceNode] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, id: &ResourceId) -> Option<&ResourceNode> {
        self.nodes.iter().find(|n| &n.id == id)
    }

    pub fn contains(&self, id: &ResourceId) -> bool {
        self.get(id).is_some()
    }

    fn get_mut(&mut self, id: &ResourceId) -> Result<&mut ResourceNode> {
        self.nodes
            .iter_mut()
            .find(|n| &n.id == id)
            .ok_or_else(|| TreeError::NodeNotFound(id.clone()))
    }

    fn generate_id(&mut self) -> ResourceId {
        loop {
            let candidate = ResourceId::new(format!(
                "{}-{}",
                self.kind.id_prefix(),
                self.next_local_id
            ));
            self.next_local_id += 1;
            if !self.contains(&candidate) {
                return candidate;
            }
        }
    }

    /*
     * Appends a new node. The parent is not required to exist; a backend that
     * cares about unknown parents rejects them before the node reaches here.
     */
    pub fn create(&mut self, name: &str, parent_id: Option<ResourceId>) -> ResourceNode {
        let id = self.generate_id();
        let node = ResourceNode::new(id, name, parent_id);
        log::trace!(
            "ResourceTree({}): Created node {} under {:?}",
            self.kind,
            node.id,
            node.parent_id
        );
        self.nodes.push(node.clone());
        node
    }

    /*
     * Inserts `node`, or replaces the node with the same id. A replacement that
     * would re-parent the node into its own subtree is refused like a move.
     */
    pub fn upsert(&mut self, node: ResourceNode) -> Result<()> {
        if self.contains(&node.id) {
            if let Some(parent) = &node.parent_id {
                self.check_move(&node.id, Some(parent))?;
            }
            let slot = self.get_mut(&node.id)?;
            *slot = node;
        } else {
            self.nodes.push(node);
        }
        Ok(())
    }

    /* Replaces the whole node set with an authoritative snapshot. */
    pub fn replace_all(&mut self, nodes: Vec<ResourceNode>) {
        self.nodes = nodes;
    }

    pub fn rename(&mut self, id: &ResourceId, name: &str) -> Result<()> {
        self.get_mut(id)?.name = name.to_string();
        Ok(())
    }

    pub fn update(&mut self, id: &ResourceId, patch: &NodePatch) -> Result<ResourceNode> {
        let node = self.get_mut(id)?;
        if let Some(name) = &patch.name {
            node.name = name.clone();
        }
        if let Some(color) = &patch.color {
            node.color = color.clone();
        }
        Ok(node.clone())
    }

    /*
     * All nodes below `id`, depth-first pre-order. `id` itself is not included.
     * The walk follows child links (nodes whose parent is the current node) and
     * skips anything already visited.
     */
    pub fn descendants(&self, id: &ResourceId) -> Vec<ResourceId> {
        let mut result = Vec::new();
        let mut visited: HashSet<ResourceId> = HashSet::new();
        visited.insert(id.clone());
        let mut stack: Vec<ResourceId> = tree_view::children_of(&self.nodes, id)
            .into_iter()
            .rev()
            .map(|n| n.id.clone())
            .collect();
        while let Some(current) = stack.pop() {
            if !visited.insert(current.clone()) {
                continue;
            }
            let children = tree_view::children_of(&self.nodes, &current);
            stack.extend(children.into_iter().rev().map(|n| n.id.clone()));
            result.push(current);
        }
        result
    }

    /* Parent chain of `id`, nearest first. Stops at a root or a dangling parent. */
    pub fn ancestors(&self, id: &ResourceId) -> Vec<ResourceId> {
        let mut result = Vec::new();
        let mut visited: HashSet<&ResourceId> = HashSet::new();
        visited.insert(id);
        let mut cursor = self.get(id).and_then(|n| n.parent_id.as_ref());
        while let Some(parent) = cursor {
            if !visited.insert(parent) {
                break;
            }
            let Some(parent_node) = self.get(parent) else {
                break;
            };
            result.push(parent.clone());
            cursor = parent_node.parent_id.as_ref();
        }
        result
    }

    /* `true` when `candidate` is `id` or lies anywhere below it. */
    pub fn is_descendant_or_self(&self, id: &ResourceId, candidate: &ResourceId) -> bool {
        id == candidate || self.descendants(id).contains(candidate)
    }

    pub fn check_move(&self, id: &ResourceId, new_parent_id: Option<&ResourceId>) -> Result<()> {
        if !self.contains(id) {
            return Err(TreeError::NodeNotFound(id.clone()));
        }
        if let Some(target) = new_parent_id
            && self.is_descendant_or_self(id, target)
        {
            return Err(TreeError::Cycle {
                id: id.clone(),
                target: target.clone(),
            });
        }
        Ok(())
    }

    /* Drop-target feedback for drags; never mutates. */
    pub fn can_move(&self, id: &ResourceId, new_parent_id: Option<&ResourceId>) -> bool {
        self.check_move(id, new_parent_id).is_ok()
    }

    pub fn move_node(
        &mut self,
        id: &ResourceId,
        new_parent_id: Option<&ResourceId>,
    ) -> Result<ResourceNode> {
        if let Err(e) = self.check_move(id, new_parent_id) {
            log::debug!("ResourceTree({}): Rejected move: {e}", self.kind);
            return Err(e);
        }
        let node = self.get_mut(id)?;
        node.parent_id = new_parent_id.cloned();
        Ok(node.clone())
    }

    /*
     * Removes `id`. With `cascade`, every descendant is removed first, deepest
     * nodes before their ancestors; the returned ids are in removal order and end
     * with `id`. Without `cascade`, a node that still has children is refused.
     */
    pub fn delete(&mut self, id: &ResourceId, cascade: bool) -> Result<Vec<ResourceId>> {
        if !self.contains(id) {
            return Err(TreeError::NodeNotFound(id.clone()));
        }
        let descendants = self.descendants(id);
        if !cascade && !descendants.is_empty() {
            let child_count = tree_view::children_of(&self.nodes, id).len();
            return Err(TreeError::HasChildren {
                id: id.clone(),
                child_count,
            });
        }

        let mut removal_order: Vec<ResourceId> = descendants.into_iter().rev().collect();
        removal_order.push(id.clone());
        for doomed in &removal_order {
            self.nodes.retain(|n| &n.id != doomed);
        }
        log::trace!(
            "ResourceTree({}): Deleted {} node(s) rooted at {id}",
            self.kind,
            removal_order.len()
        );
        Ok(removal_order)
    }

    fn require_collection(&self) -> Result<()> {
        if self.kind == ResourceKind::Collections {
            Ok(())
        } else {
            Err(TreeError::NotACollection(self.kind))
        }
    }

    /*
     * Adds media ids to a collection's item set; ids already present are ignored.
     * Folder membership comes only from snapshots, never from these calls.
     */
    pub fn add_items(&mut self, id: &ResourceId, item_ids: &[ResourceId]) -> Result<ResourceNode> {
        self.require_collection()?;
        let node = self.get_mut(id)?;
        node.child_item_ids.extend(item_ids.iter().cloned());
        Ok(node.clone())
    }

    pub fn remove_items(
        &mut self,
        id: &ResourceId,
        item_ids: &[ResourceId],
    ) -> Result<ResourceNode> {
        self.require_collection()?;
        let node = self.get_mut(id)?;
        for item in item_ids {
            node.child_item_ids.remove(item);
        }
        Ok(node.clone())
    }

    pub fn children_of(&self, id: &ResourceId) -> Vec<&ResourceNode> {
        tree_view::children_of(&self.nodes, id)
    }

    pub fn root_nodes(&self) -> Vec<&ResourceNode> {
        tree_view::root_nodes(&self.nodes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    // A -> B -> C, plus a second root D with child E.
    fn chain_tree() -> ResourceTree {
        let mut tree = ResourceTree::new(ResourceKind::Folders);
        let a = tree.create("A", None);
        let b = tree.create("B", Some(a.id.clone()));
        tree.create("C", Some(b.id.clone()));
        let d = tree.create("D", None);
        tree.create("E", Some(d.id.clone()));
        tree
    }

    fn id_of(tree: &ResourceTree, name: &str) -> ResourceId {
        tree.nodes()
            .iter()
            .find(|n| n.name == name)
            .map(|n| n.id.clone())
            .unwrap_or_else(|| panic!("no node named {name}"))
    }

    fn assert_forest(tree: &ResourceTree) {
        for node in tree.nodes() {
            let chain = tree.ancestors(&node.id);
            assert!(
                !chain.contains(&node.id),
                "node {} is its own ancestor",
                node.id
            );
            if let Some(parent) = &node.parent_id {
                assert!(tree.contains(parent), "node {} has dangling parent", node.id);
            }
        }
    }

    #[test]
    fn test_move_root_under_its_grandchild_is_a_cycle() {
        let mut tree = chain_tree();
        let (a, c) = (id_of(&tree, "A"), id_of(&tree, "C"));
        let before = tree.nodes().to_vec();

        let result = tree.move_node(&a, Some(&c));

        assert!(matches!(result, Err(TreeError::Cycle { .. })));
        assert_eq!(tree.nodes(), before.as_slice());
    }

    #[test]
    fn test_move_grandchild_under_root_succeeds() {
        let mut tree = chain_tree();
        let (a, c) = (id_of(&tree, "A"), id_of(&tree, "C"));

        let moved = tree.move_node(&c, Some(&a)).unwrap();

        assert_eq!(moved.parent_id.as_ref(), Some(&a));
        assert_eq!(tree.get(&c).unwrap().parent_id.as_ref(), Some(&a));
        assert_forest(&tree);
    }

    #[test]
    fn test_move_onto_itself_is_a_cycle() {
        let mut tree = chain_tree();
        let b = id_of(&tree, "B");
        assert!(matches!(
            tree.move_node(&b, Some(&b)),
            Err(TreeError::Cycle { .. })
        ));
    }

    #[test]
    fn test_move_is_rejected_exactly_for_descendants_or_self() {
        let names = ["A", "B", "C", "D", "E"];
        for moving in names {
            for target in names {
                let mut tree = chain_tree();
                let (id, target_id) = (id_of(&tree, moving), id_of(&tree, target));
                let forbidden = id == target_id || tree.descendants(&id).contains(&target_id);

                let result = tree.move_node(&id, Some(&target_id));

                if forbidden {
                    assert!(
                        matches!(result, Err(TreeError::Cycle { .. })),
                        "{moving} -> {target} should be a cycle"
                    );
                } else {
                    assert!(result.is_ok(), "{moving} -> {target} should be allowed");
                    assert_eq!(tree.get(&id).unwrap().parent_id.as_ref(), Some(&target_id));
                }
                assert_forest(&tree);
            }
        }
    }

    #[test]
    fn test_move_to_root_is_always_allowed() {
        let mut tree = chain_tree();
        let c = id_of(&tree, "C");
        let moved = tree.move_node(&c, None).unwrap();
        assert!(moved.is_root());
        assert!(tree.can_move(&c, None));
    }

    #[test]
    fn test_move_unknown_node_reports_not_found() {
        let mut tree = chain_tree();
        let a = id_of(&tree, "A");
        assert_eq!(
            tree.move_node(&"ghost".into(), Some(&a)),
            Err(TreeError::NodeNotFound("ghost".into()))
        );
    }

    #[test]
    fn test_delete_without_cascade_refuses_parent_and_keeps_set() {
        let mut tree = chain_tree();
        let a = id_of(&tree, "A");
        let before = tree.nodes().to_vec();

        let result = tree.delete(&a, false);

        assert_eq!(
            result,
            Err(TreeError::HasChildren {
                id: a,
                child_count: 1
            })
        );
        assert_eq!(tree.nodes(), before.as_slice());
    }

    #[test]
    fn test_delete_leaf_without_cascade_succeeds() {
        let mut tree = chain_tree();
        let c = id_of(&tree, "C");
        assert_eq!(tree.delete(&c, false).unwrap(), vec![c.clone()]);
        assert!(!tree.contains(&c));
    }

    #[test]
    fn test_create_then_cascade_delete_removes_whole_subtree() {
        let mut tree = ResourceTree::new(ResourceKind::Collections);
        let x = tree.create("X", None);
        let y = tree.create("Y", Some(x.id.clone()));

        let removed = tree.delete(&x.id, true).unwrap();

        assert_eq!(removed, vec![y.id.clone(), x.id.clone()]);
        assert!(tree.is_empty());
    }

    #[test]
    fn test_cascade_delete_removes_descendants_before_ancestors() {
        let mut tree = chain_tree();
        let (a, b, c) = (id_of(&tree, "A"), id_of(&tree, "B"), id_of(&tree, "C"));

        let removed = tree.delete(&a, true).unwrap();

        assert_eq!(removed, vec![c, b, a]);
        assert_eq!(tree.len(), 2);
        assert_forest(&tree);
    }

    #[test]
    fn test_random_create_and_cascade_delete_keeps_a_forest() {
        let mut rng = StdRng::seed_from_u64(0x5eed);
        let mut tree = ResourceTree::new(ResourceKind::Folders);
        for step in 0..500 {
            let delete = !tree.is_empty() && rng.random_bool(0.3);
            if delete {
                let victim = tree.nodes()[rng.random_range(0..tree.len())].id.clone();
                tree.delete(&victim, true).unwrap();
            } else {
                let parent = if tree.is_empty() || rng.random_bool(0.2) {
                    None
                } else {
                    Some(tree.nodes()[rng.random_range(0..tree.len())].id.clone())
                };
                tree.create(&format!("node {step}"), parent);
            }
            assert_forest(&tree);
        }
    }

    #[test]
    fn test_ancestors_and_descendants() {
        let tree = chain_tree();
        let (a, b, c) = (id_of(&tree, "A"), id_of(&tree, "B"), id_of(&tree, "C"));
        assert_eq!(tree.ancestors(&c), vec![b.clone(), a.clone()]);
        assert_eq!(tree.descendants(&a), vec![b.clone(), c.clone()]);
        assert!(tree.ancestors(&a).is_empty());
        assert!(tree.is_descendant_or_self(&a, &a));
        assert!(!tree.is_descendant_or_self(&c, &a));
    }

    #[test]
    fn test_upsert_replaces_by_id_and_refuses_cycles() {
        let mut tree = chain_tree();
        let (a, c) = (id_of(&tree, "A"), id_of(&tree, "C"));

        let mut renamed = tree.get(&a).unwrap().clone();
        renamed.name = "Alpha".to_string();
        tree.upsert(renamed).unwrap();

        let mut looped = tree.get(&a).unwrap().clone();
        looped.parent_id = Some(c.clone());

        assert_eq!(tree.get(&a).unwrap().name, "Alpha");
        assert!(matches!(tree.upsert(looped), Err(TreeError::Cycle { .. })));
        assert!(tree.get(&a).unwrap().is_root());

        let fresh = ResourceNode::new("folder-99".into(), "New", Some(c));
        tree.upsert(fresh).unwrap();
        assert_eq!(tree.len(), 6);
    }

    #[test]
    fn test_generated_ids_skip_ids_taken_by_snapshots() {
        let mut tree = ResourceTree::from_nodes(
            ResourceKind::Folders,
            vec![ResourceNode::new("folder-1".into(), "Existing", None)],
        );
        let created = tree.create("Second", None);
        assert_eq!(created.id, ResourceId::new("folder-2"));
    }

    #[test]
    fn test_rename_and_update_fields() {
        let mut tree = chain_tree();
        let b = id_of(&tree, "B");

        tree.rename(&b, "Beta").unwrap();
        let updated = tree
            .update(
                &b,
                &NodePatch {
                    name: None,
                    color: Some("#ff0000".to_string()),
                },
            )
            .unwrap();

        assert_eq!(updated.name, "Beta");
        assert_eq!(updated.color, "#ff0000");
        assert_eq!(
            tree.rename(&"ghost".into(), "x"),
            Err(TreeError::NodeNotFound("ghost".into()))
        );
    }

    #[test]
    fn test_tree_error_maps_onto_api_error_kinds() {
        use crate::core::errors::ApiErrorKind;
        let cycle: ApiError = TreeError::Cycle {
            id: "a".into(),
            target: "b".into(),
        }
        .into();
        let missing: ApiError = TreeError::NodeNotFound("a".into()).into();
        let busy: ApiError = TreeError::HasChildren {
            id: "a".into(),
            child_count: 2,
        }
        .into();
        assert_eq!(cycle.kind, ApiErrorKind::Cycle);
        assert_eq!(missing.kind, ApiErrorKind::NotFound);
        assert!(matches!(busy.kind, ApiErrorKind::Validation { .. }));
    }

    #[test]
    fn test_item_membership_on_collections_is_idempotent() {
        let mut tree = ResourceTree::new(ResourceKind::Collections);
        let c = tree.create("Portfolio", None).id;

        let with_items = tree
            .add_items(&c, &["m1".into(), "m2".into(), "m1".into()])
            .unwrap();
        let without = tree.remove_items(&c, &["m1".into(), "absent".into()]).unwrap();

        assert_eq!(with_items.child_item_ids.len(), 2);
        assert_eq!(
            without.child_item_ids.into_iter().collect::<Vec<_>>(),
            vec![ResourceId::new("m2")]
        );
    }

    #[test]
    fn test_item_membership_is_refused_on_folders() {
        let mut tree = chain_tree();
        let b = id_of(&tree, "B");

        let added = tree.add_items(&b, &["m1".into()]);
        let removed = tree.remove_items(&b, &["m1".into()]);

        assert_eq!(added, Err(TreeError::NotACollection(ResourceKind::Folders)));
        assert_eq!(removed, Err(TreeError::NotACollection(ResourceKind::Folders)));
        assert!(tree.get(&b).unwrap().child_item_ids.is_empty());
        let api: ApiError = TreeError::NotACollection(ResourceKind::Folders).into();
        assert_eq!(
            api.kind,
            crate::core::errors::ApiErrorKind::Validation {
                fields: vec!["kind".to_string()]
            }
        );
    }
}
