/*
 * This module consolidates the core, UI-agnostic logic of the application.
 * It re-exports the data model and the key abstractions (`ResourceBackendOperations`,
 * `ConfigStorageOperations`) together with the two backend implementations, the
 * backend selector, the runtime configuration store, the request controller and
 * the hierarchical tree engine used for folders and collections.
 */
pub mod backend;
pub mod backend_selector;
pub mod config;
pub mod errors;
pub mod http_backend;
pub mod models;
pub mod path_utils;
pub mod request_controller;
pub mod seed_data;
pub mod simulated_backend;
pub mod tree_engine;
pub mod tree_view;

// Re-export the data model
pub use models::{Entity, NodePatch, ResourceId, ResourceKind, ResourceNode};

pub use errors::{ApiError, ApiResult};

#[cfg(test)]
pub use errors::ApiErrorKind;

// Re-export backend related items
pub use backend::{ListPage, ListQuery};
pub use backend_selector::{BackendRegistry, BackendSelector};

#[cfg(test)]
pub use backend::{DeleteOptions, ResourceBackendOperations};

// Re-export config related items
pub use config::{ConfigStorageOperations, ConfigStore, FileConfigStorage, MemoryConfigStorage};

#[cfg(test)]
pub use config::RuntimeConfig;

pub use request_controller::{DependencyKey, use_resource};

pub use tree_engine::{ResourceTree, TreeError};
