//! Database schema migrations.
//!
//! Creates the `gql_documents` and `gql_schema_sdl` tables used by
//! [`crate::sqlite_store::SqliteVectorStore`]. Idempotent: safe to run on
//! every `gqlgen init`.

use anyhow::Result;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS gql_documents (
            namespace TEXT NOT NULL,
            id TEXT NOT NULL,
            doc_type TEXT NOT NULL,
            name TEXT NOT NULL,
            parent_type TEXT,
            field_type TEXT,
            is_root_operation_field INTEGER NOT NULL DEFAULT 0,
            root_operation_type TEXT,
            kind TEXT,
            chunk_index INTEGER,
            total_chunks INTEGER,
            document_json TEXT NOT NULL,
            embedding BLOB NOT NULL,
            PRIMARY KEY (namespace, id)
        )
        "#,
    )
    .execute(&pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS gql_schema_sdl (
            namespace TEXT PRIMARY KEY,
            sdl TEXT NOT NULL
        )
        "#,
    )
    .execute(&pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_gql_documents_namespace ON gql_documents(namespace)")
        .execute(&pool)
        .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_gql_documents_parent_type ON gql_documents(namespace, parent_type)",
    )
    .execute(&pool)
    .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_gql_documents_root_operation_type ON gql_documents(namespace, root_operation_type)",
    )
    .execute(&pool)
    .await?;

    pool.close().await;
    Ok(())
}
