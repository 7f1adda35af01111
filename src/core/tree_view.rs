/*
 * Stateless read helpers over a flat slice of `ResourceNode`s, used to render the
 * folder and collection trees. Nothing here mutates or validates; the acyclic
 * invariant is owned by `tree_engine`. Every walk keeps a visited set so a
 * corrupt snapshot (e.g. straight from a misbehaving server) cannot loop forever.
 */
use crate::core::models::{ResourceId, ResourceNode};
use std::collections::HashSet;

/* One visible line of a rendered tree. */
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutlineRow {
    pub id: ResourceId,
    pub name: String,
    pub color: String,
    pub depth: usize,
    pub has_children: bool,
    pub item_count: usize,
}

pub fn children_of<'a>(nodes: &'a [ResourceNode], id: &ResourceId) -> Vec<&'a ResourceNode> {
    nodes
        .iter()
        .filter(|n| n.parent_id.as_ref() == Some(id))
        .collect()
}

pub fn root_nodes(nodes: &[ResourceNode]) -> Vec<&ResourceNode> {
    nodes.iter().filter(|n| n.parent_id.is_none()).collect()
}

fn sorted_for_display(mut level: Vec<&ResourceNode>) -> Vec<&ResourceNode> {
    level.sort_by(|a, b| {
        a.name
            .to_lowercase()
            .cmp(&b.name.to_lowercase())
            .then_with(|| a.id.cmp(&b.id))
    });
    level
}

fn outline_recursive(
    nodes: &[ResourceNode],
    node: &ResourceNode,
    depth: usize,
    visited: &mut HashSet<ResourceId>,
    rows: &mut Vec<OutlineRow>,
) {
    if !visited.insert(node.id.clone()) {
        return;
    }
    let children = sorted_for_display(children_of(nodes, &node.id));
    rows.push(OutlineRow {
        id: node.id.clone(),
        name: node.name.clone(),
        color: node.color.clone(),
        depth,
        has_children: !children.is_empty(),
        item_count: node.child_item_ids.len(),
    });
    for child in children {
        outline_recursive(nodes, child, depth + 1, visited, rows);
    }
}

/*
 * Flattens the forest into depth-first rows, siblings ordered by name. Nodes whose
 * parent is missing from the slice (dangling references) are rendered as
 * top-level rows so they stay reachable.
 */
pub fn outline(nodes: &[ResourceNode]) -> Vec<OutlineRow> {
    let known: HashSet<&ResourceId> = nodes.iter().map(|n| &n.id).collect();
    let top_level = nodes
        .iter()
        .filter(|n| match &n.parent_id {
            None => true,
            Some(parent) => !known.contains(parent),
        })
        .collect();

    let mut visited = HashSet::new();
    let mut rows = Vec::with_capacity(nodes.len());
    for node in sorted_for_display(top_level) {
        outline_recursive(nodes, node, 0, &mut visited, &mut rows);
    }
    rows
}

/*
 * The path from the outermost known ancestor down to `id`, inclusive. Empty when
 * `id` is not in the slice.
 */
pub fn breadcrumb<'a>(nodes: &'a [ResourceNode], id: &ResourceId) -> Vec<&'a ResourceNode> {
    let mut path = Vec::new();
    let mut visited = HashSet::new();
    let mut cursor = nodes.iter().find(|n| &n.id == id);
    while let Some(node) = cursor {
        if !visited.insert(&node.id) {
            break;
        }
        path.push(node);
        cursor = node
            .parent_id
            .as_ref()
            .and_then(|parent| nodes.iter().find(|n| &n.id == parent));
    }
    path.reverse();
    path
}
