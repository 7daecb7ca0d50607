use anyhow::Result;
use chrono::Utc;
use serde_json::{json, Map};

use crate::logic::TimelineService;
use crate::model::{generate_id, SnapshotPayload, Task, VersionType};
use crate::store::traits::Store;

/// Load a small demonstration task with a realistic pipeline history:
/// plan, schema, code, a failed validation, a fix, and a passing run.
pub async fn load_seed_data<S: Store>(service: &TimelineService<S>) -> Result<()> {
    let now = Utc::now();
    let task = Task {
        id: generate_id(),
        tenant_id: "demo-tenant".to_string(),
        user_id: "demo-user".to_string(),
        task_name: Some("Demo bookstore".to_string()),
        user_requirement: Some("An online bookstore with carts and orders".to_string()),
        status: "running".to_string(),
        metadata: Map::new(),
        created_at: now,
        updated_at: now,
    };
    service.store().upsert_task(task.clone()).await?;

    let mut plan = SnapshotPayload::new();
    plan.insert("entity_count", json!(3));
    plan.insert(
        "entities",
        json!({
            "Book": "title, author, price",
            "Cart": "items, total",
            "Order": "lines, status"
        }),
    );
    service
        .create_snapshot(&task.id, &task.tenant_id, VersionType::Plan, plan)
        .await?;

    let mut schema = SnapshotPayload::new();
    schema.insert("table_count", json!(3));
    schema.insert(
        "migration_sql",
        json!("CREATE TABLE books (id SERIAL PRIMARY KEY, title TEXT NOT NULL);"),
    );
    service
        .create_snapshot(&task.id, &task.tenant_id, VersionType::Schema, schema)
        .await?;

    let mut code = SnapshotPayload::new();
    code.insert("file_count", json!(4));
    code.insert(
        "services",
        json!({
            "BookService": "class BookService {\n  list() {}\n}",
            "OrderService": "class OrderService {\n  place() {}\n}"
        }),
    );
    code.insert(
        "components",
        json!({
            "BookList.vue": "<template>\n  <ul/>\n</template>",
            "Cart.vue": "<template>\n  <div/>\n</template>"
        }),
    );
    let code_version = service
        .create_snapshot(&task.id, &task.tenant_id, VersionType::Code, code)
        .await?;

    let mut failed = SnapshotPayload::new();
    failed.insert("failure_reason", json!("OrderService.place is untested"));
    service
        .create_snapshot(&task.id, &task.tenant_id, VersionType::ValidationFailed, failed)
        .await?;

    let mut passed = SnapshotPayload::new();
    passed.insert("coverage", json!(87));
    service
        .create_snapshot(&task.id, &task.tenant_id, VersionType::ValidationSuccess, passed)
        .await?;

    service.add_tag(&code_version.id, "milestone").await?;

    log::info!("seeded demo task {}", task.id);
    Ok(())
}
