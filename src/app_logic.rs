/*
 * This module provides the application logic layer on top of `core`, centered
 * around `HierarchyService`, which keeps a local folder or collection tree in
 * step with the selected backend. Unit tests for `HierarchyService` are in
 * `hierarchy_service_tests.rs`.
 */
pub mod hierarchy_service;


pub use hierarchy_service::HierarchyService;

pub const APP_NAME: &str = "MediaShelf";
