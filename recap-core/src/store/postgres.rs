use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::SummaryStore;
use crate::error::RecapError;
use crate::models::{NewSummary, Summary, SummaryFilter};

const COLUMNS: &str = "id, title, url, summary_text, created_at, updated_at, user_id";

/// Postgres-backed store over the `summaries` table.
#[derive(Debug, Clone)]
pub struct PgSummaryStore {
    pool: PgPool,
}

impl PgSummaryStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Turn a search term into an ILIKE pattern, escaping wildcard characters.
pub(crate) fn like_pattern(search: &str) -> String {
    let mut escaped = String::with_capacity(search.len() + 2);
    escaped.push('%');
    for c in search.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

#[async_trait]
impl SummaryStore for PgSummaryStore {
    async fn create(&self, new: NewSummary) -> Result<Summary, RecapError> {
        let summary = sqlx::query_as::<_, Summary>(&format!(
            "INSERT INTO summaries (id, title, url, summary_text) \
             VALUES ($1, $2, $3, $4) RETURNING {}",
            COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(&new.title)
        .bind(&new.url)
        .bind(&new.summary_text)
        .fetch_one(&self.pool)
        .await?;

        tracing::info!(id = %summary.id, "Created summary");
        Ok(summary)
    }

    async fn list(&self, filter: &SummaryFilter) -> Result<Vec<Summary>, RecapError> {
        let summaries = sqlx::query_as::<_, Summary>(&format!(
            r#"
            SELECT {}
            FROM summaries
            WHERE ($1::timestamptz IS NULL OR created_at >= $1)
              AND ($2::timestamptz IS NULL OR created_at <= $2)
              AND ($3::text IS NULL
                   OR title ILIKE $3
                   OR summary_text ILIKE $3
                   OR url ILIKE $3)
            ORDER BY created_at DESC
            "#,
            COLUMNS
        ))
        .bind(filter.start_date)
        .bind(filter.end_date)
        .bind(filter.search.as_deref().map(like_pattern))
        .fetch_all(&self.pool)
        .await?;

        Ok(summaries)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Summary>, RecapError> {
        let summary = sqlx::query_as::<_, Summary>(&format!(
            "SELECT {} FROM summaries WHERE id = $1",
            COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(summary)
    }

    async fn delete(&self, id: Uuid) -> Result<Option<Summary>, RecapError> {
        let summary = sqlx::query_as::<_, Summary>(&format!(
            "DELETE FROM summaries WHERE id = $1 RETURNING {}",
            COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        if summary.is_some() {
            tracing::info!(id = %id, "Deleted summary");
        }
        Ok(summary)
    }

    async fn health(&self) -> Result<String, RecapError> {
        Ok(crate::db::health_check(&self.pool).await?)
    }

    fn name(&self) -> &str {
        "postgres"
    }
}
