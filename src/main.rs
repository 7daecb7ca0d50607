use axum::serve;
use codegen_timeline::api::routes::create_router;
use codegen_timeline::config::AppConfig;
use codegen_timeline::logic::TimelineService;
use codegen_timeline::seed;
use codegen_timeline::store::{FsObjectStore, PostgresStore};
use std::sync::Arc;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if it exists
    dotenvy::dotenv().ok();

    // Initialize logging with explicit filter to suppress sqlx debug logs
    use env_logger::Builder;
    use log::LevelFilter;

    Builder::new()
        .filter_level(LevelFilter::Info)
        .filter_module("sqlx", LevelFilter::Warn)
        .init();

    println!("Codegen Timeline: Version Timeline Server");

    // Load configuration
    let config = AppConfig::load()?;
    println!(
        "Configuration loaded: server={}:{}",
        config.server.host, config.server.port
    );

    println!("Connecting to PostgreSQL...");
    let database_url = config.database_url()?;
    let postgres_store = PostgresStore::new(&database_url).await?;

    println!("Running database migrations...");
    postgres_store.migrate().await?;
    println!("Database ready");

    let store = Arc::new(postgres_store);
    let objects = Arc::new(FsObjectStore::new(&config.archive.base_path));
    let service = Arc::new(TimelineService::new(store, objects));

    // Load seed data for demonstration (optional)
    if std::env::var("LOAD_SEED_DATA").unwrap_or_default() == "true" {
        println!("Loading seed data...");
        seed::load_seed_data(&service).await?;
        println!("Seed data loaded successfully");
    }

    run_server(create_router().with_state(service), &config).await?;

    Ok(())
}

async fn run_server(app: axum::Router, config: &AppConfig) -> anyhow::Result<()> {
    let bind_address = config.server_address();
    let listener = TcpListener::bind(&bind_address).await?;
    println!("Timeline server running on http://{}", bind_address);

    serve(listener, app).await?;

    Ok(())
}
