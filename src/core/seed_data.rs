/*
 * A small demo dataset for the simulated backends, so a fresh install has
 * something to browse: a few nested folders and collections, media items filed
 * into them, tags and a single user.
 */
use crate::core::models::{Entity, ResourceKind};
use serde_json::{Value, json};

fn objects(values: Vec<Value>) -> Vec<Entity> {
    values
        .into_iter()
        .filter_map(|v| match v {
            Value::Object(map) => Some(map),
            _ => None,
        })
        .collect()
}

pub fn demo_entities(kind: ResourceKind) -> Vec<Entity> {
    match kind {
        ResourceKind::Folders => objects(vec![
            json!({"id": "folder-1", "name": "Photos", "parentId": null, "color": "#3b82f6", "childItemIds": []}),
            json!({"id": "folder-2", "name": "2024", "parentId": "folder-1", "color": "#3b82f6", "childItemIds": ["media-1", "media-2"]}),
            json!({"id": "folder-3", "name": "Holidays", "parentId": "folder-2", "color": "#22c55e", "childItemIds": ["media-3"]}),
            json!({"id": "folder-4", "name": "Videos", "parentId": null, "color": "#a855f7", "childItemIds": ["media-4"]}),
        ]),
        ResourceKind::Collections => objects(vec![
            json!({"id": "collection-1", "name": "Portfolio", "parentId": null, "color": "#f59e0b", "childItemIds": ["media-1", "media-3"]}),
            json!({"id": "collection-2", "name": "Landscapes", "parentId": "collection-1", "color": "#10b981", "childItemIds": ["media-3"]}),
            json!({"id": "collection-3", "name": "Client review", "parentId": null, "color": "#ef4444", "childItemIds": []}),
        ]),
        ResourceKind::Media => objects(vec![
            json!({"id": "media-1", "name": "harbour.jpg", "mimeType": "image/jpeg", "tagIds": ["tag-1"]}),
            json!({"id": "media-2", "name": "portrait.png", "mimeType": "image/png", "tagIds": []}),
            json!({"id": "media-3", "name": "glacier.jpg", "mimeType": "image/jpeg", "tagIds": ["tag-1", "tag-2"]}),
            json!({"id": "media-4", "name": "timelapse.mp4", "mimeType": "video/mp4", "tagIds": ["tag-2"]}),
        ]),
        ResourceKind::Tags => objects(vec![
            json!({"id": "tag-1", "name": "outdoor", "color": "#0ea5e9"}),
            json!({"id": "tag-2", "name": "favourite", "color": "#eab308"}),
        ]),
        ResourceKind::Users => objects(vec![
            json!({"id": "user-1", "name": "Demo User", "email": "demo@example.com", "role": "admin"}),
        ]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::{ResourceNode, entity_id};
    use crate::core::tree_engine::ResourceTree;

    #[test]
    fn test_every_kind_has_entities_with_unique_ids() {
        for kind in ResourceKind::ALL {
            let entities = demo_entities(kind);
            assert!(!entities.is_empty(), "{kind} has no demo data");
            let mut ids: Vec<_> = entities.iter().filter_map(entity_id).collect();
            let count = ids.len();
            ids.sort();
            ids.dedup();
            assert_eq!(ids.len(), count, "{kind} has duplicate or missing ids");
            assert_eq!(count, entities.len());
        }
    }

    #[test]
    fn test_hierarchical_demo_data_forms_a_forest() {
        for kind in [ResourceKind::Folders, ResourceKind::Collections] {
            let nodes: Vec<ResourceNode> = demo_entities(kind)
                .iter()
                .map(|e| ResourceNode::from_entity(e).unwrap())
                .collect();
            let tree = ResourceTree::from_nodes(kind, nodes);
            for node in tree.nodes() {
                assert!(!tree.ancestors(&node.id).contains(&node.id));
                if let Some(parent) = &node.parent_id {
                    assert!(tree.contains(parent));
                }
            }
        }
    }
}
