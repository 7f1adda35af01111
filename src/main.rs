mod app_logic;
mod core;

use crate::app_logic::{APP_NAME, HierarchyService};
use crate::core::path_utils;
use crate::core::request_controller::fetcher;
use crate::core::{
    ApiResult, BackendRegistry, BackendSelector, ConfigStorageOperations, ConfigStore,
    DependencyKey, FileConfigStorage, ListPage, ListQuery, MemoryConfigStorage, ResourceId,
    ResourceKind, use_resource,
};
use serde_json::json;
use simplelog::{
    ColorChoice, CombinedLogger, LevelFilter, SharedLogger, TermLogger, TerminalMode, WriteLogger,
};
use std::fs::File;
use std::future::Future;
use std::sync::Arc;

const MAX_ATTEMPTS: u32 = 3;

/*
 * Logs to the terminal at `Info` and, when the config directory is usable, to
 * a log file at `Debug`.
 */
fn initialize_logging() {
    let mut loggers: Vec<Box<dyn SharedLogger>> = vec![TermLogger::new(
        LevelFilter::Info,
        simplelog::Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )];
    match path_utils::get_log_file_path(APP_NAME).map(|path| (File::create(&path), path)) {
        Some((Ok(file), _)) => loggers.push(WriteLogger::new(
            LevelFilter::Debug,
            simplelog::Config::default(),
            file,
        )),
        Some((Err(e), path)) => eprintln!("Main: Could not create log file {path:?}: {e}"),
        None => eprintln!("Main: No config directory available; logging to terminal only."),
    }
    if let Err(e) = CombinedLogger::init(loggers) {
        eprintln!("Main: Failed to initialize logging: {e}");
    }
}

/* Re-runs `op` while it fails with a retryable error, up to `MAX_ATTEMPTS` times. */
async fn with_retry<T, F, Fut>(label: &str, mut op: F) -> ApiResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ApiResult<T>>,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Err(e) if e.is_retryable() && attempt < MAX_ATTEMPTS => {
                log::warn!("Main: {label} failed on attempt {attempt}: {e}. Retrying.");
                attempt += 1;
            }
            outcome => return outcome,
        }
    }
}

fn log_outline(service: &HierarchyService) {
    for row in service.outline() {
        log::info!(
            "Main: {}{} [{}] ({} item(s))",
            "  ".repeat(row.depth),
            row.name,
            row.id,
            row.item_count
        );
    }
}

async fn demo_folders(selector: &BackendSelector) {
    let folders = HierarchyService::new(ResourceKind::Folders, selector.clone());
    let service = &folders;
    match with_retry("Refreshing folders", move || service.refresh()).await {
        Ok(count) => log::info!("Main: Loaded {count} folder(s)."),
        Err(e) => {
            log::error!("Main: Could not load folders: {e}");
            return;
        }
    }
    log_outline(&folders);

    let root = ResourceId::from("folder-1");
    let nested = ResourceId::from("folder-3");
    if !folders.can_drop(&root, Some(&nested)) {
        log::info!("Main: Dropping {root} onto {nested} is not allowed.");
    }
    if let Err(e) = folders.move_node(&root, Some(&nested)).await {
        log::info!("Main: Move refused as expected: {e}");
    }

    let inbox = match folders.create_node("Inbox", None).await {
        Ok(node) => node,
        Err(e) => {
            log::warn!("Main: Could not create folder: {e}");
            return;
        }
    };
    match selector.select(ResourceKind::Folders).get_by_id(&inbox.id).await {
        Ok(entity) => log::info!("Main: Backend reports new folder as {}", json!(entity)),
        Err(e) => log::warn!("Main: Could not read back {}: {e}", inbox.id),
    }

    let videos = ResourceId::from("folder-4");
    match folders.move_node(&inbox.id, Some(&videos)).await {
        Ok(node) => log::info!("Main: Moved {} under {videos}.", node.id),
        Err(e) => log::warn!("Main: Move failed: {e}"),
    }
    if let Err(e) = folders.recolor_node(&inbox.id, "#f97316").await {
        log::warn!("Main: Recolor failed: {e}");
    }
    log_outline(&folders);
}

async fn demo_collections(selector: &BackendSelector) {
    let collections = HierarchyService::new(ResourceKind::Collections, selector.clone());
    let service = &collections;
    if let Err(e) = with_retry("Refreshing collections", move || service.refresh()).await {
        log::error!("Main: Could not load collections: {e}");
        return;
    }
    let review = ResourceId::from("collection-3");
    match collections
        .add_items(&review, &[ResourceId::from("media-2")])
        .await
    {
        Ok(node) => log::info!(
            "Main: {} now holds {} item(s).",
            node.name,
            node.child_item_ids.len()
        ),
        Err(e) => log::warn!("Main: Adding items failed: {e}"),
    }
    match collections.delete_node(&ResourceId::from("collection-1"), false).await {
        Ok(removed) => log::info!("Main: Removed {removed:?}"),
        Err(e) => log::info!("Main: Delete refused: {e}"),
    }
    log_outline(&collections);
}

/* Drives a media listing through a request controller, as a browsing view would. */
async fn demo_media(selector: &BackendSelector) {
    let media_selector = selector.clone();
    let list_media = fetcher(move |query: ListQuery| {
        let backend = media_selector.select(ResourceKind::Media);
        async move { backend.list(&query).await }
    });
    let controller = use_resource(
        list_media,
        ListQuery::default(),
        DependencyKey::new(vec![json!("media"), json!(1)]),
        None::<ListPage>,
    );

    let mut updates = controller.subscribe();
    if updates.wait_for(|state| !state.loading).await.is_err() {
        return;
    }
    let state = controller.state();
    match (&state.data, &state.error) {
        (_, Some(e)) => log::warn!("Main: Media listing failed: {e}"),
        (Some(page), None) => log::info!("Main: Media page holds {} item(s).", page.meta.total),
        (None, None) => {}
    }

    let search = ListQuery {
        search: Some("jpg".to_string()),
        ..ListQuery::default()
    };
    let pending = controller.refetch(Some(search));
    let seq = controller.current_sequence();
    if let Err(e) = pending.await {
        log::error!("Main: Media search task failed: {e}");
        return;
    }
    if !controller.is_current(seq) {
        log::info!("Main: Media search #{seq} was superseded.");
        return;
    }
    let state = controller.state();
    log::info!(
        "Main: Media search #{seq} for {:?} settled in phase {:?} with {} match(es).",
        controller.params().search.unwrap_or_default(),
        state.phase(),
        state.data.map_or(0, |page| page.items.len())
    );
}

#[tokio::main]
async fn main() {
    initialize_logging();
    log::info!("Main: Starting {APP_NAME}.");

    let storage: Arc<dyn ConfigStorageOperations> = match FileConfigStorage::for_app(APP_NAME) {
        Ok(storage) => Arc::new(storage),
        Err(e) => {
            log::warn!("Main: {e}. Settings will not persist.");
            Arc::new(MemoryConfigStorage::default())
        }
    };
    let config = Arc::new(ConfigStore::load(storage));
    let registry = Arc::new(BackendRegistry::standard(config.clone()));
    let selector = BackendSelector::new(registry, config.clone());

    let active = config.get_config();
    log::info!(
        "Main: Using the {} backend (error rate {}, endpoint {}).",
        selector.select(ResourceKind::Folders).name(),
        active.simulated_error_rate,
        active.base_endpoint
    );

    demo_folders(&selector).await;
    demo_collections(&selector).await;
    demo_media(&selector).await;

    if let Err(e) = config.save() {
        log::warn!("Main: Could not persist configuration: {e}");
    }
    log::info!("Main: Done.");
}
