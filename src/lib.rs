pub mod api;
pub mod config;
pub mod error;
pub mod logic;
pub mod model;
pub mod seed;
pub mod store;

// Export API types
pub use api::handlers;
pub use api::routes;

// Export the error taxonomy
pub use error::{Result, TimelineError};

// Export logic types
pub use logic::{
    ArchiveExporter, BatchTagOutcome, BranchOperations, BranchResult, ChangeType, CodeLevelDiff,
    DiffEngine, ExportOperations, FileDiff, SearchOperations, SnapshotCreator, SnapshotService,
    StatisticsOperations, TagOperations, TimelineService, VersionDiff, VersionExportData,
    VersionSearchParams, VersionStatistics,
};

// Export all model types
pub use model::*;

// Export seed module
pub use seed::*;

// Export store types
pub use store::{
    FsObjectStore, InMemoryStore, MemoryObjectStore, ObjectStore, PostgresStore, SortOrder, Store,
    TaskStore, VersionQuery, VersionStore,
};

// Function for integration testing
pub async fn run_server() -> anyhow::Result<()> {
    use axum::serve;
    use std::sync::Arc;
    use tokio::net::TcpListener;

    // Load environment variables from .env file if it exists
    dotenvy::dotenv().ok();

    // Initialize logging with INFO level only (suppress DEBUG logs)
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .try_init();

    // Load configuration
    let config = crate::config::AppConfig::load()?;

    // Connect to PostgreSQL
    let database_url = config.database_url()?;
    let postgres_store = crate::store::PostgresStore::new(&database_url).await?;

    // Run migrations
    postgres_store.migrate().await?;

    let store = Arc::new(postgres_store);
    let objects = Arc::new(crate::store::FsObjectStore::new(&config.archive.base_path));
    let service = Arc::new(crate::logic::TimelineService::new(store, objects));

    // Create router with state
    let app = crate::api::routes::create_router().with_state(service);

    let bind_address = config.server_address();
    let listener = TcpListener::bind(&bind_address).await?;

    serve(listener, app).await?;

    Ok(())
}
