//! SQLite-backed catalog.

use super::{Catalog, CatalogError, CatalogResult};
use crate::models::{
    bin::{Bin, DEFAULT_BIN_NAME},
    document::{Document, NewDocument},
    user::{NewUser, User},
};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{QueryBuilder, SqlitePool, sqlite::Sqlite};
use std::sync::Arc;
use tracing::debug;

const SCHEMA: &str = include_str!("../../migrations/0001_init.sql");

const DOCUMENT_COLUMNS: &str = "id, name, reference_name, bin_id, extract, language, created_at";

/// Run the embedded schema statement by statement.
pub async fn run_migrations(db: &SqlitePool) -> Result<(), sqlx::Error> {
    let statements = SCHEMA
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>();

    tracing::info!("Running {} migration statements...", statements.len());

    for stmt in statements {
        debug!("Executing migration SQL: {}", stmt);
        sqlx::query(stmt).execute(db).await?;
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct SqliteCatalog {
    db: Arc<SqlitePool>,
}

impl SqliteCatalog {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self { db }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.db
    }
}

/// Return true if SQLx error indicates a unique constraint violation.
fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Database(db_err) if db_err.message().to_ascii_lowercase().contains("unique")
    )
}

#[async_trait]
impl Catalog for SqliteCatalog {
    async fn ping(&self) -> CatalogResult<()> {
        sqlx::query_scalar::<_, i64>("SELECT 1")
            .fetch_one(&*self.db)
            .await?;
        Ok(())
    }

    async fn create_user(&self, user: &NewUser) -> CatalogResult<(User, Bin)> {
        let now = Utc::now();
        let mut tx = self.db.begin().await?;

        let created = sqlx::query_as::<_, User>(
            "INSERT INTO users (email, display_name, credential_hash, created_at)
             VALUES (?, ?, ?, ?)
             RETURNING id, email, display_name, credential_hash, created_at",
        )
        .bind(&user.email)
        .bind(&user.display_name)
        .bind(&user.credential_hash)
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .map_err(|err| {
            if is_unique_violation(&err) {
                CatalogError::Duplicate(format!("user `{}`", user.email))
            } else {
                CatalogError::Sqlx(err)
            }
        })?;

        let bin = sqlx::query_as::<_, Bin>(
            "INSERT INTO bins (name, owner_id, created_at) VALUES (?, ?, ?)
             RETURNING id, name, owner_id, created_at",
        )
        .bind(DEFAULT_BIN_NAME)
        .bind(created.id)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        debug!(user_id = created.id, bin_id = bin.id, "created user with default bin");
        Ok((created, bin))
    }

    async fn get_user(&self, id: i64) -> CatalogResult<Option<User>> {
        Ok(sqlx::query_as::<_, User>(
            "SELECT id, email, display_name, credential_hash, created_at FROM users WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&*self.db)
        .await?)
    }

    async fn create_bin(&self, owner_id: i64, name: &str) -> CatalogResult<Bin> {
        Ok(sqlx::query_as::<_, Bin>(
            "INSERT INTO bins (name, owner_id, created_at) VALUES (?, ?, ?)
             RETURNING id, name, owner_id, created_at",
        )
        .bind(name)
        .bind(owner_id)
        .bind(Utc::now())
        .fetch_one(&*self.db)
        .await?)
    }

    async fn get_bin(&self, id: i64) -> CatalogResult<Option<Bin>> {
        Ok(
            sqlx::query_as::<_, Bin>("SELECT id, name, owner_id, created_at FROM bins WHERE id = ?")
                .bind(id)
                .fetch_optional(&*self.db)
                .await?,
        )
    }

    async fn list_bins(&self, owner_id: i64) -> CatalogResult<Vec<Bin>> {
        Ok(sqlx::query_as::<_, Bin>(
            "SELECT id, name, owner_id, created_at FROM bins WHERE owner_id = ? ORDER BY id ASC",
        )
        .bind(owner_id)
        .fetch_all(&*self.db)
        .await?)
    }

    async fn count_bins(&self, owner_id: i64) -> CatalogResult<i64> {
        Ok(
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM bins WHERE owner_id = ?")
                .bind(owner_id)
                .fetch_one(&*self.db)
                .await?,
        )
    }

    async fn rename_bin(&self, id: i64, name: &str) -> CatalogResult<bool> {
        let result = sqlx::query("UPDATE bins SET name = ? WHERE id = ?")
            .bind(name)
            .bind(id)
            .execute(&*self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_bin(&self, id: i64) -> CatalogResult<bool> {
        let result = sqlx::query("DELETE FROM bins WHERE id = ?")
            .bind(id)
            .execute(&*self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn insert_document(&self, doc: &NewDocument) -> CatalogResult<Document> {
        let sql = format!(
            "INSERT INTO documents (name, reference_name, bin_id, language, created_at)
             VALUES (?, ?, ?, ?, ?)
             RETURNING {DOCUMENT_COLUMNS}"
        );
        sqlx::query_as::<_, Document>(&sql)
            .bind(&doc.name)
            .bind(&doc.reference_name)
            .bind(doc.bin_id)
            .bind(doc.language)
            .bind(Utc::now())
            .fetch_one(&*self.db)
            .await
            .map_err(|err| {
                if is_unique_violation(&err) {
                    CatalogError::Duplicate(format!(
                        "document with reference name `{}`",
                        doc.reference_name
                    ))
                } else {
                    CatalogError::Sqlx(err)
                }
            })
    }

    async fn get_document(&self, id: i64) -> CatalogResult<Option<Document>> {
        let sql = format!("SELECT {DOCUMENT_COLUMNS} FROM documents WHERE id = ?");
        Ok(sqlx::query_as::<_, Document>(&sql)
            .bind(id)
            .fetch_optional(&*self.db)
            .await?)
    }

    async fn document_owner(&self, id: i64) -> CatalogResult<Option<i64>> {
        Ok(sqlx::query_scalar::<_, i64>(
            "SELECT b.owner_id FROM documents d JOIN bins b ON d.bin_id = b.id WHERE d.id = ?",
        )
        .bind(id)
        .fetch_optional(&*self.db)
        .await?)
    }

    async fn reference_name_exists(&self, bin_id: i64, name: &str) -> CatalogResult<bool> {
        let found = sqlx::query_scalar::<_, i64>(
            "SELECT id FROM documents WHERE bin_id = ? AND reference_name = ?",
        )
        .bind(bin_id)
        .bind(name)
        .fetch_optional(&*self.db)
        .await?;
        Ok(found.is_some())
    }

    async fn list_documents(&self, bin_id: i64) -> CatalogResult<Vec<Document>> {
        let sql = format!("SELECT {DOCUMENT_COLUMNS} FROM documents WHERE bin_id = ? ORDER BY id ASC");
        Ok(sqlx::query_as::<_, Document>(&sql)
            .bind(bin_id)
            .fetch_all(&*self.db)
            .await?)
    }

    async fn update_reference_name(
        &self,
        id: i64,
        expected: &str,
        new_name: &str,
    ) -> CatalogResult<bool> {
        let result = sqlx::query(
            "UPDATE documents SET reference_name = ? WHERE id = ? AND reference_name = ?",
        )
        .bind(new_name)
        .bind(id)
        .bind(expected)
        .execute(&*self.db)
        .await
        .map_err(|err| {
            if is_unique_violation(&err) {
                CatalogError::Duplicate(format!("document with reference name `{new_name}`"))
            } else {
                CatalogError::Sqlx(err)
            }
        })?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_document(&self, id: i64) -> CatalogResult<bool> {
        let result = sqlx::query("DELETE FROM documents WHERE id = ?")
            .bind(id)
            .execute(&*self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn fetch_documents(&self, ids: &[i64], owner_id: i64) -> CatalogResult<Vec<Document>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut builder = QueryBuilder::<Sqlite>::new(
            "SELECT d.id, d.name, d.reference_name, d.bin_id, d.extract, d.language, d.created_at \
             FROM documents d JOIN bins b ON d.bin_id = b.id WHERE b.owner_id = ",
        );
        builder.push_bind(owner_id);
        builder.push(" AND d.id IN (");
        let mut separated = builder.separated(", ");
        for id in ids {
            separated.push_bind(*id);
        }
        separated.push_unseparated(")");

        Ok(builder.build_query_as::<Document>().fetch_all(&*self.db).await?)
    }
}
