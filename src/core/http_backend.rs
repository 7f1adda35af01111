/*
 * The real backend: talks JSON over HTTP to the configured base endpoint.
 * Routes follow the usual REST shape (`/{kind}`, `/{kind}/{id}`, plus
 * `/{kind}/{id}/move` and `/{kind}/{id}/items` for tree operations).
 *
 * The base endpoint and request timeout are read from the `ConfigStore` on each
 * call. Transport failures become `Network`/`Timeout` errors; non-2xx responses
 * are mapped through `ApiError::from_status` using the server's error body.
 */
use crate::core::backend::{
    DeleteOptions, ListPage, ListQuery, ParentFilter, ResourceBackendOperations,
    unsupported_for_flat_kind,
};
use crate::core::config::ConfigStore;
use crate::core::errors::{ApiError, ApiResult, ErrorBody};
use crate::core::models::{Entity, ResourceId, ResourceKind};
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

const REQUEST_ID_HEADER: &str = "x-request-id";

pub struct HttpBackend {
    kind: ResourceKind,
    config: Arc<ConfigStore>,
    client: Client,
}

fn map_transport_error(err: reqwest::Error) -> ApiError {
    if err.is_timeout() {
        ApiError::timeout(format!("Request timed out: {err}"))
    } else {
        ApiError::network(format!("No response from server: {err}"))
    }
}

/*
 * Joins `segments` onto the base endpoint, percent-encoding each segment. The
 * base may or may not end with a slash.
 */
pub fn build_url(base: &str, segments: &[&str]) -> ApiResult<Url> {
    let invalid = || {
        ApiError::validation(
            vec!["baseEndpoint".to_string()],
            format!("Invalid base endpoint: {base}"),
        )
    };
    let mut url = Url::parse(base).map_err(|_| invalid())?;
    {
        let mut path = url.path_segments_mut().map_err(|_| invalid())?;
        path.pop_if_empty();
        path.extend(segments);
    }
    Ok(url)
}

impl HttpBackend {
    pub fn new(kind: ResourceKind, config: Arc<ConfigStore>) -> Self {
        HttpBackend::with_client(kind, config, Client::new())
    }

    pub fn with_client(kind: ResourceKind, config: Arc<ConfigStore>, client: Client) -> Self {
        HttpBackend {
            kind,
            config,
            client,
        }
    }

    fn request(&self, method: Method, segments: &[&str]) -> ApiResult<RequestBuilder> {
        let config = self.config.get_config();
        let mut full = vec![self.kind.path_segment()];
        full.extend_from_slice(segments);
        let url = build_url(&config.base_endpoint, &full)?;
        log::trace!("HttpBackend({}): {method} {url}", self.kind);
        Ok(self
            .client
            .request(method, url)
            .timeout(Duration::from_millis(config.request_timeout_ms)))
    }

    async fn send(&self, request: RequestBuilder) -> ApiResult<Response> {
        let response = request.send().await.map_err(map_transport_error)?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let header_request_id = response
            .headers()
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let text = response.text().await.unwrap_or_default();
        let mut body: ErrorBody = serde_json::from_str(&text).unwrap_or_default();
        if body.request_id.is_none() {
            body.request_id = header_request_id;
        }
        let err = ApiError::from_status(status.as_u16(), body);
        log::debug!("HttpBackend({}): Request failed: {err}", self.kind);
        Err(err)
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> ApiResult<T> {
        let response = self.send(request).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| ApiError::server(format!("Malformed response body: {e}")))
    }

    fn require_hierarchical(&self, operation: &str) -> ApiResult<()> {
        if self.kind.is_hierarchical() {
            Ok(())
        } else {
            Err(unsupported_for_flat_kind(self.kind, operation))
        }
    }
}

#[async_trait]
impl ResourceBackendOperations for HttpBackend {
    fn kind(&self) -> ResourceKind {
        self.kind
    }

    fn name(&self) -> &'static str {
        "http"
    }

    async fn list(&self, query: &ListQuery) -> ApiResult<ListPage> {
        let mut params: Vec<(&str, String)> = vec![
            ("page", query.page.to_string()),
            ("limit", query.limit.to_string()),
        ];
        if let Some(search) = &query.search {
            params.push(("search", search.clone()));
        }
        match &query.parent {
            Some(ParentFilter::Root) => params.push(("parentId", "null".to_string())),
            Some(ParentFilter::Parent(id)) => params.push(("parentId", id.0.clone())),
            None => {}
        }
        let request = self.request(Method::GET, &[])?.query(&params);
        self.send_json(request).await
    }

    async fn get_by_id(&self, id: &ResourceId) -> ApiResult<Entity> {
        let request = self.request(Method::GET, &[id.as_str()])?;
        self.send_json(request).await
    }

    async fn create(&self, entity: Entity) -> ApiResult<Entity> {
        let request = self.request(Method::POST, &[])?.json(&entity);
        self.send_json(request).await
    }

    async fn update(&self, id: &ResourceId, partial: Entity) -> ApiResult<Entity> {
        let request = self.request(Method::PATCH, &[id.as_str()])?.json(&partial);
        self.send_json(request).await
    }

    async fn delete(&self, id: &ResourceId, options: DeleteOptions) -> ApiResult<()> {
        let request = self
            .request(Method::DELETE, &[id.as_str()])?
            .query(&[("cascade", options.cascade)]);
        self.send(request).await?;
        Ok(())
    }

    async fn move_node(
        &self,
        id: &ResourceId,
        target_parent_id: Option<&ResourceId>,
    ) -> ApiResult<Entity> {
        self.require_hierarchical("move")?;
        let request = self
            .request(Method::POST, &[id.as_str(), "move"])?
            .json(&json!({ "parentId": target_parent_id }));
        self.send_json(request).await
    }

    async fn add_items(
        &self,
        collection_id: &ResourceId,
        item_ids: &[ResourceId],
    ) -> ApiResult<Entity> {
        self.require_hierarchical("addItems")?;
        let request = self
            .request(Method::POST, &[collection_id.as_str(), "items"])?
            .json(&json!({ "itemIds": item_ids }));
        self.send_json(request).await
    }

    async fn remove_items(
        &self,
        collection_id: &ResourceId,
        item_ids: &[ResourceId],
    ) -> ApiResult<Entity> {
        self.require_hierarchical("removeItems")?;
        let request = self
            .request(Method::DELETE, &[collection_id.as_str(), "items"])?
            .json(&json!({ "itemIds": item_ids }));
        self.send_json(request).await
    }
}
