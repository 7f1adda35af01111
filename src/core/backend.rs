/*
 * The backend call surface: the operations every resource backend (real HTTP or
 * simulated in-memory) offers for one resource kind. Callers never learn which
 * implementation they hold; both resolve with owned copies of the data and fail
 * with the same `ApiError` shapes.
 */
use crate::core::errors::{ApiError, ApiResult};
use crate::core::models::{Entity, ResourceId, ResourceKind};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE_LIMIT: usize = 50;

/* Restricts a listing of a hierarchical kind to one level of the tree. */
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParentFilter {
    Root,
    Parent(ResourceId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    /* 1-based page number. */
    pub page: usize,
    pub limit: usize,
    pub search: Option<String>,
    pub parent: Option<ParentFilter>,
}

impl Default for ListQuery {
    fn default() -> Self {
        ListQuery {
            page: 1,
            limit: DEFAULT_PAGE_LIMIT,
            search: None,
            parent: None,
        }
    }
}

impl ListQuery {
    pub fn page(page: usize, limit: usize) -> Self {
        ListQuery {
            page,
            limit,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMeta {
    pub total: usize,
    pub page: usize,
    pub limit: usize,
    pub total_pages: usize,
}

impl PageMeta {
    pub fn new(total: usize, page: usize, limit: usize) -> Self {
        let total_pages = if limit == 0 { 0 } else { total.div_ceil(limit) };
        PageMeta {
            total,
            page,
            limit,
            total_pages,
        }
    }

    pub fn has_next(&self) -> bool {
        self.page < self.total_pages
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListPage {
    pub items: Vec<Entity>,
    pub meta: PageMeta,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeleteOptions {
    pub cascade: bool,
}

/*
 * Operations against one resource kind. Tree operations (`move_node`,
 * `add_items`, `remove_items`) are only meaningful for hierarchical kinds; flat
 * kinds reject them with a validation error naming the `kind` field.
 */
#[async_trait]
pub trait ResourceBackendOperations: Send + Sync {
    fn kind(&self) -> ResourceKind;

    /* Human-readable implementation name for logs ("http", "simulated"). */
    fn name(&self) -> &'static str;

    async fn list(&self, query: &ListQuery) -> ApiResult<ListPage>;
    async fn get_by_id(&self, id: &ResourceId) -> ApiResult<Entity>;
    async fn create(&self, entity: Entity) -> ApiResult<Entity>;
    async fn update(&self, id: &ResourceId, partial: Entity) -> ApiResult<Entity>;
    async fn delete(&self, id: &ResourceId, options: DeleteOptions) -> ApiResult<()>;
    async fn move_node(
        &self,
        id: &ResourceId,
        target_parent_id: Option<&ResourceId>,
    ) -> ApiResult<Entity>;
    async fn add_items(&self, collection_id: &ResourceId, item_ids: &[ResourceId])
    -> ApiResult<Entity>;
    async fn remove_items(
        &self,
        collection_id: &ResourceId,
        item_ids: &[ResourceId],
    ) -> ApiResult<Entity>;
}

pub fn unsupported_for_flat_kind(kind: ResourceKind, operation: &str) -> ApiError {
    ApiError::validation(
        vec!["kind".to_string()],
        format!("Operation '{operation}' is not supported for {kind}"),
    )
}
