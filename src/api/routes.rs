use axum::{
    routing::{delete, get, post},
    Router,
};

use crate::api::handlers::{self, AppState};
use crate::store::traits::Store;

pub fn create_router<S: Store + 'static>() -> Router<AppState<S>> {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Timeline basics
        .route(
            "/v1/timemachine/timeline/:task_id",
            get(handlers::get_timeline::<S>),
        )
        .route("/v1/timemachine/diff", get(handlers::compare_versions::<S>))
        .route(
            "/v1/timemachine/rollback/:version_id",
            post(handlers::rollback_version::<S>),
        )
        .route(
            "/v1/timemachine/version/:version_id",
            get(handlers::get_version::<S>),
        )
        .route(
            "/v1/timemachine/version/:version_id",
            delete(handlers::delete_version::<S>),
        )
        // Tag management
        .route(
            "/v1/timemachine/version/:version_id/tag",
            post(handlers::add_tag::<S>),
        )
        .route(
            "/v1/timemachine/version/:version_id/tag",
            delete(handlers::remove_tag::<S>),
        )
        .route(
            "/v1/timemachine/task/:task_id/versions/by-tag",
            get(handlers::get_versions_by_tag::<S>),
        )
        .route(
            "/v1/timemachine/versions/batch-tag",
            post(handlers::batch_add_tag::<S>),
        )
        // Branching and code-level diff
        .route(
            "/v1/timemachine/version/:version_id/branch",
            post(handlers::create_branch::<S>),
        )
        .route(
            "/v1/timemachine/code-diff",
            get(handlers::get_code_level_diff::<S>),
        )
        // Search, bulk deletion, statistics
        .route(
            "/v1/timemachine/task/:task_id/search",
            get(handlers::search_versions::<S>),
        )
        .route(
            "/v1/timemachine/task/:task_id/versions/after/:after_number",
            delete(handlers::delete_versions_after::<S>),
        )
        .route(
            "/v1/timemachine/task/:task_id/statistics",
            get(handlers::get_statistics::<S>),
        )
        // Export, import, archive download
        .route(
            "/v1/timemachine/version/:version_id/export",
            get(handlers::export_version::<S>),
        )
        .route(
            "/v1/timemachine/task/:task_id/import",
            post(handlers::import_version::<S>),
        )
        .route(
            "/v1/timemachine/version/:version_id/download",
            get(handlers::download_version::<S>),
        )
        .route(
            "/v1/timemachine/task/:task_id/download-latest",
            get(handlers::download_latest_version::<S>),
        )
}
