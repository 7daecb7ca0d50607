use anyhow::{Context, Result};
use serde_json::{Map, Value};
use sqlx::{postgres::PgPoolOptions, postgres::PgRow, PgPool, QueryBuilder, Row};

use crate::model::{Id, Task, Version, VersionType};
use crate::store::traits::{SortOrder, Store, TaskStore, VersionQuery, VersionStore};

const TASK_COLUMNS: &str =
    "id, tenant_id, user_id, task_name, user_requirement, status, metadata, created_at, updated_at";
const VERSION_COLUMNS: &str =
    "id, task_id, tenant_id, version_number, version_type, payload, parent_version_id, created_at";

#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Create a new PostgreSQL store with the given database URL
    pub async fn new(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(20)
            .connect(database_url)
            .await
            .context("Failed to create PostgreSQL connection pool")?;

        Ok(Self { pool })
    }

    /// Create the timeline tables if they do not exist yet. Idempotent.
    pub async fn migrate(&self) -> Result<()> {
        let statements = [
            r#"
            CREATE TABLE IF NOT EXISTS generation_tasks (
                id TEXT PRIMARY KEY,
                tenant_id TEXT NOT NULL,
                user_id TEXT NOT NULL,
                task_name TEXT,
                user_requirement TEXT,
                status TEXT NOT NULL,
                metadata JSONB NOT NULL DEFAULT '{}'::jsonb,
                created_at TIMESTAMPTZ NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS generation_versions (
                id TEXT PRIMARY KEY,
                task_id TEXT NOT NULL,
                tenant_id TEXT NOT NULL,
                version_number INTEGER NOT NULL,
                version_type TEXT NOT NULL,
                payload JSONB NOT NULL DEFAULT '{}'::jsonb,
                parent_version_id TEXT,
                created_at TIMESTAMPTZ NOT NULL,
                UNIQUE (task_id, version_number)
            )
            "#,
            r#"
            CREATE INDEX IF NOT EXISTS idx_generation_versions_task_created
                ON generation_versions (task_id, created_at DESC)
            "#,
        ];

        for statement in statements {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .context("Failed to run timeline migration")?;
        }

        Ok(())
    }

    /// Get a reference to the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn task_from_row(row: &PgRow) -> Result<Task> {
    let metadata: Value = row.get("metadata");
    let metadata: Map<String, Value> = match metadata {
        Value::Object(map) => map,
        _ => Map::new(),
    };

    Ok(Task {
        id: row.get("id"),
        tenant_id: row.get("tenant_id"),
        user_id: row.get("user_id"),
        task_name: row.get("task_name"),
        user_requirement: row.get("user_requirement"),
        status: row.get("status"),
        metadata,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

fn version_from_row(row: &PgRow) -> Result<Version> {
    let version_type: String = row.get("version_type");
    let version_type: VersionType = version_type
        .parse()
        .context("Stored version has an unknown version_type label")?;

    let payload: Value = row.get("payload");
    let payload = serde_json::from_value(payload).context("Stored payload is not a document")?;

    Ok(Version {
        id: row.get("id"),
        task_id: row.get("task_id"),
        tenant_id: row.get("tenant_id"),
        version_number: row.get("version_number"),
        version_type,
        payload,
        parent_version_id: row.get("parent_version_id"),
        created_at: row.get("created_at"),
    })
}

#[async_trait::async_trait]
impl TaskStore for PostgresStore {
    async fn get_task(&self, id: &Id) -> Result<Option<Task>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM generation_tasks WHERE id = $1",
            TASK_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch task")?;

        row.as_ref().map(task_from_row).transpose()
    }

    async fn upsert_task(&self, task: Task) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO generation_tasks
                (id, tenant_id, user_id, task_name, user_requirement, status, metadata, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (id) DO UPDATE SET
                task_name = EXCLUDED.task_name,
                user_requirement = EXCLUDED.user_requirement,
                status = EXCLUDED.status,
                metadata = EXCLUDED.metadata,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(&task.id)
        .bind(&task.tenant_id)
        .bind(&task.user_id)
        .bind(&task.task_name)
        .bind(&task.user_requirement)
        .bind(&task.status)
        .bind(Value::Object(task.metadata.clone()))
        .bind(task.created_at)
        .bind(task.updated_at)
        .execute(&self.pool)
        .await
        .context("Failed to upsert task")?;

        Ok(())
    }

    async fn delete_task(&self, id: &Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM generation_tasks WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete task")?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait::async_trait]
impl VersionStore for PostgresStore {
    async fn get_version(&self, id: &Id) -> Result<Option<Version>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM generation_versions WHERE id = $1",
            VERSION_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch version")?;

        row.as_ref().map(version_from_row).transpose()
    }

    async fn upsert_version(&self, version: Version) -> Result<()> {
        let payload =
            serde_json::to_value(&version.payload).context("Failed to serialize payload")?;

        sqlx::query(
            r#"
            INSERT INTO generation_versions
                (id, task_id, tenant_id, version_number, version_type, payload, parent_version_id, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (id) DO UPDATE SET
                payload = EXCLUDED.payload,
                parent_version_id = EXCLUDED.parent_version_id
            "#,
        )
        .bind(&version.id)
        .bind(&version.task_id)
        .bind(&version.tenant_id)
        .bind(version.version_number)
        .bind(version.version_type.as_str())
        .bind(payload)
        .bind(&version.parent_version_id)
        .bind(version.created_at)
        .execute(&self.pool)
        .await
        .context("Failed to upsert version")?;

        Ok(())
    }

    async fn delete_version(&self, id: &Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM generation_versions WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete version")?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_versions_for_task(&self, task_id: &Id, order: SortOrder) -> Result<Vec<Version>> {
        let direction = match order {
            SortOrder::Ascending => "ASC",
            SortOrder::Descending => "DESC",
        };

        let rows = sqlx::query(&format!(
            "SELECT {} FROM generation_versions WHERE task_id = $1 \
             ORDER BY created_at {}, version_number {}",
            VERSION_COLUMNS, direction, direction
        ))
        .bind(task_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list versions")?;

        rows.iter().map(version_from_row).collect()
    }

    async fn query_versions(&self, task_id: &Id, query: &VersionQuery) -> Result<Vec<Version>> {
        let mut builder: QueryBuilder<sqlx::Postgres> = QueryBuilder::new(format!(
            "SELECT {} FROM generation_versions WHERE task_id = ",
            VERSION_COLUMNS
        ));
        builder.push_bind(task_id);

        if let Some(types) = &query.types {
            if !types.is_empty() {
                let labels: Vec<String> = types.iter().map(|t| t.as_str().to_string()).collect();
                builder.push(" AND version_type = ANY(");
                builder.push_bind(labels);
                builder.push(")");
            }
        }
        if let Some(after) = query.created_after {
            builder.push(" AND created_at >= ");
            builder.push_bind(after);
        }
        if let Some(before) = query.created_before {
            builder.push(" AND created_at <= ");
            builder.push_bind(before);
        }
        if let Some(min) = query.min_number {
            builder.push(" AND version_number >= ");
            builder.push_bind(min);
        }
        if let Some(max) = query.max_number {
            builder.push(" AND version_number <= ");
            builder.push_bind(max);
        }

        builder.push(" ORDER BY created_at DESC, version_number DESC");

        let rows = builder
            .build()
            .fetch_all(&self.pool)
            .await
            .context("Failed to query versions")?;

        rows.iter().map(version_from_row).collect()
    }

    async fn latest_version_for_task(&self, task_id: &Id) -> Result<Option<Version>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM generation_versions WHERE task_id = $1 \
             ORDER BY version_number DESC LIMIT 1",
            VERSION_COLUMNS
        ))
        .bind(task_id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch latest version")?;

        row.as_ref().map(version_from_row).transpose()
    }
}

impl Store for PostgresStore {}
