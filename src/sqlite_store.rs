//! SQLite-backed [`DocumentRepository`] implementation.
//!
//! Maps each repository operation to one short statement against the
//! `documents` and `analyses` tables. Keyword and summary-point lists are
//! stored as JSON text. Every query filters by owner.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};

use doclens_core::models::{AnalysisDetail, DocumentItem, NewAnalysis, NewDocument, Scope};
use doclens_core::store::DocumentRepository;

/// SQLite implementation of the [`DocumentRepository`] trait.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn format_ts_iso(ts_millis: i64) -> String {
    chrono::DateTime::from_timestamp_millis(ts_millis)
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string())
        .unwrap_or_else(|| ts_millis.to_string())
}

fn parse_list(json: &str, column: &str) -> Result<Vec<String>> {
    serde_json::from_str(json).with_context(|| format!("corrupt {} column", column))
}

fn detail_from_row(row: &SqliteRow) -> Result<AnalysisDetail> {
    let keywords_json: String = row.get("keywords_json");
    let points_json: String = row.get("summary_points_json");
    let created_at: i64 = row.get("created_at");
    let analysis_id: String = row.get("analysis_id");
    let summary_points = parse_list(&points_json, "summary_points_json")
        .with_context(|| format!("analysis {}", analysis_id))?;
    let keywords = parse_list(&keywords_json, "keywords_json")
        .with_context(|| format!("analysis {}", analysis_id))?;
    Ok(AnalysisDetail {
        analysis_id,
        document_id: row.get("document_id"),
        file_name: row.get("file_name"),
        summary: row.get("summary"),
        summary_points,
        sentiment: row.get("sentiment"),
        keywords,
        collection_id: row.get("collection_id"),
        created_at: format_ts_iso(created_at),
        analysis_version: row.get("analysis_version"),
        batch_id: row.get("batch_id"),
        batch_size: row.get("batch_size"),
        full_text: row.get("full_text"),
    })
}

#[async_trait]
impl DocumentRepository for SqliteStore {
    async fn insert_document(&self, doc: &NewDocument) -> Result<String> {
        let id = uuid::Uuid::new_v4().to_string();
        let inserted = sqlx::query(
            r#"
            INSERT INTO documents (id, owner_id, collection_id, file_name, full_text,
                                   content_hash, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(&id)
        .bind(&doc.owner)
        .bind(doc.scope.collection_id())
        .bind(&doc.file_name)
        .bind(&doc.full_text)
        .bind(&doc.content_hash)
        .bind(chrono::Utc::now().timestamp_millis())
        .execute(&self.pool)
        .await?
        .rows_affected();

        if inserted == 1 {
            return Ok(id);
        }

        // Lost a race against an identical upload in the same scope.
        match self
            .find_document(&doc.owner, doc.scope, &doc.content_hash)
            .await?
        {
            Some(existing) => Ok(existing),
            None => bail!("document insert conflicted but no existing row was found"),
        }
    }

    async fn insert_analysis(&self, analysis: &NewAnalysis) -> Result<String> {
        let id = uuid::Uuid::new_v4().to_string();
        let inserted = sqlx::query(
            r#"
            INSERT INTO analyses (id, owner_id, document_id, summary, summary_points_json,
                                  keywords_json, sentiment, analysis_version, batch_id,
                                  batch_size, created_at)
            SELECT ?, ?, ?, ?, ?, ?, ?,
                   COALESCE((SELECT MAX(analysis_version) FROM analyses
                             WHERE document_id = ?), 0) + 1,
                   ?, ?, ?
            WHERE EXISTS (SELECT 1 FROM documents WHERE id = ? AND owner_id = ?)
            "#,
        )
        .bind(&id)
        .bind(&analysis.owner)
        .bind(&analysis.document_id)
        .bind(&analysis.summary)
        .bind(serde_json::to_string(&analysis.summary_points)?)
        .bind(serde_json::to_string(&analysis.keywords)?)
        .bind(&analysis.sentiment)
        .bind(&analysis.document_id)
        .bind(analysis.batch.as_ref().map(|b| b.id.clone()))
        .bind(analysis.batch.as_ref().map(|b| b.size as i64))
        .bind(chrono::Utc::now().timestamp_millis())
        .bind(&analysis.document_id)
        .bind(&analysis.owner)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if inserted == 0 {
            bail!("document not found: {}", analysis.document_id);
        }
        Ok(id)
    }

    async fn find_document(
        &self,
        owner: &str,
        scope: Scope,
        content_hash: &str,
    ) -> Result<Option<String>> {
        // `IS` matches NULL to NULL only, keeping the unscoped namespace disjoint.
        let id: Option<String> = sqlx::query_scalar(
            "SELECT id FROM documents WHERE owner_id = ? AND collection_id IS ? AND content_hash = ? LIMIT 1",
        )
        .bind(owner)
        .bind(scope.collection_id())
        .bind(content_hash)
        .fetch_optional(&self.pool)
        .await?;
        Ok(id)
    }

    async fn get_latest_analysis(
        &self,
        owner: &str,
        document_id: &str,
    ) -> Result<Option<AnalysisDetail>> {
        let row = sqlx::query(
            r#"
            SELECT a.id AS analysis_id, d.id AS document_id, d.file_name, a.summary,
                   a.summary_points_json, a.sentiment, a.keywords_json, d.collection_id,
                   a.created_at, d.full_text, a.analysis_version, a.batch_id, a.batch_size
            FROM analyses a
            JOIN documents d ON a.document_id = d.id AND a.owner_id = d.owner_id
            WHERE a.owner_id = ? AND d.id = ?
            ORDER BY a.created_at DESC, a.rowid DESC
            LIMIT 1
            "#,
        )
        .bind(owner)
        .bind(document_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(detail_from_row).transpose()
    }

    async fn list_documents(
        &self,
        owner: &str,
        scope: Option<Scope>,
    ) -> Result<Vec<DocumentItem>> {
        let base = r#"
            SELECT d.id, d.file_name, d.collection_id,
                   COUNT(a.id) AS analyses_count,
                   MAX(a.created_at) AS last_at
            FROM documents d
            LEFT JOIN analyses a ON a.document_id = d.id AND a.owner_id = d.owner_id
            WHERE d.owner_id = ?
        "#;
        let tail = "GROUP BY d.id ORDER BY last_at IS NULL, last_at DESC, d.created_at DESC";

        let rows = match scope {
            None => {
                sqlx::query(&format!("{} {}", base, tail))
                    .bind(owner)
                    .fetch_all(&self.pool)
                    .await?
            }
            Some(scope) => {
                sqlx::query(&format!("{} AND d.collection_id IS ? {}", base, tail))
                    .bind(owner)
                    .bind(scope.collection_id())
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        Ok(rows
            .iter()
            .map(|row| {
                let last_at: Option<i64> = row.get("last_at");
                DocumentItem {
                    id: row.get("id"),
                    file_name: row.get("file_name"),
                    analyses_count: row.get("analyses_count"),
                    last_analysis_at: last_at.map(format_ts_iso),
                    collection_id: row.get("collection_id"),
                }
            })
            .collect())
    }
}
