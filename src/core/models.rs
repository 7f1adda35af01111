use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/*
 * Opaque identifier of any resource. Backends decide the format; the engine only
 * compares identifiers for equality and ordering.
 */
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceId(pub String);

impl ResourceId {
    pub fn new(id: impl Into<String>) -> Self {
        ResourceId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ResourceId {
    fn from(value: &str) -> Self {
        ResourceId(value.to_string())
    }
}

/*
 * The five resource families the organizer knows about. Only folders and
 * collections are hierarchical; the remaining kinds are flat entity sets.
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Media,
    Folders,
    Collections,
    Tags,
    Users,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 5] = [
        ResourceKind::Media,
        ResourceKind::Folders,
        ResourceKind::Collections,
        ResourceKind::Tags,
        ResourceKind::Users,
    ];

    pub fn path_segment(self) -> &'static str {
        match self {
            ResourceKind::Media => "media",
            ResourceKind::Folders => "folders",
            ResourceKind::Collections => "collections",
            ResourceKind::Tags => "tags",
            ResourceKind::Users => "users",
        }
    }

    // Prefix used when a backend or the tree engine has to mint a new id.
    pub fn id_prefix(self) -> &'static str {
        match self {
            ResourceKind::Media => "media",
            ResourceKind::Folders => "folder",
            ResourceKind::Collections => "collection",
            ResourceKind::Tags => "tag",
            ResourceKind::Users => "user",
        }
    }

    pub fn is_hierarchical(self) -> bool {
        matches!(self, ResourceKind::Folders | ResourceKind::Collections)
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path_segment())
    }
}

/*
 * A server-shaped resource. Concrete schemas (media metadata, tag colors, ...)
 * belong to the presentation layer, so entities travel as JSON objects that
 * always carry an `"id"` string.
 */
pub type Entity = serde_json::Map<String, serde_json::Value>;

pub fn entity_id(entity: &Entity) -> Option<ResourceId> {
    entity
        .get("id")
        .and_then(|v| v.as_str())
        .map(ResourceId::new)
}

pub const DEFAULT_NODE_COLOR: &str = "#64748b";

/*
 * A folder or collection entry. The `parent_id` edges of all nodes in one tree
 * form a forest; `None` marks a root. `child_item_ids` lists the media items
 * filed directly under this node.
 */
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceNode {
    pub id: ResourceId,
    pub name: String,
    #[serde(default)]
    pub parent_id: Option<ResourceId>,
    #[serde(default = "default_color")]
    pub color: String,
    #[serde(default)]
    pub child_item_ids: BTreeSet<ResourceId>,
}

fn default_color() -> String {
    DEFAULT_NODE_COLOR.to_string()
}

impl ResourceNode {
    pub fn new(id: ResourceId, name: impl Into<String>, parent_id: Option<ResourceId>) -> Self {
        ResourceNode {
            id,
            name: name.into(),
            parent_id,
            color: default_color(),
            child_item_ids: BTreeSet::new(),
        }
    }

    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    pub fn to_entity(&self) -> Entity {
        match serde_json::to_value(self) {
            Ok(serde_json::Value::Object(map)) => map,
            // A struct of strings and sets always serializes to an object.
            _ => Entity::new(),
        }
    }

    pub fn from_entity(entity: &Entity) -> serde_json::Result<Self> {
        serde_json::from_value(serde_json::Value::Object(entity.clone()))
    }
}

/* Field-wise update for `rename`/recolor style mutations. */
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}
