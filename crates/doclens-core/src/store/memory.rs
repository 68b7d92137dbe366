//! In-memory [`DocumentRepository`] implementation for tests.
//!
//! Uses `Vec`s behind `std::sync::RwLock` for thread safety and keeps call
//! counters so tests can assert which repository operations ran.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{AnalysisDetail, DocumentItem, NewAnalysis, NewDocument, Scope};

use super::DocumentRepository;

/// A stored document row.
#[derive(Debug, Clone)]
pub struct StoredDocument {
    pub id: String,
    pub owner: String,
    pub scope: Scope,
    pub file_name: String,
    pub full_text: String,
    pub content_hash: String,
}

/// A stored analysis row.
#[derive(Debug, Clone)]
pub struct StoredAnalysis {
    pub id: String,
    pub owner: String,
    pub document_id: String,
    pub summary: String,
    pub summary_points: Vec<String>,
    pub keywords: Vec<String>,
    pub sentiment: String,
    pub version: i64,
    pub batch_id: Option<String>,
    pub batch_size: Option<i64>,
    pub created_at: i64,
}

/// In-memory repository for tests.
#[derive(Default)]
pub struct InMemoryRepository {
    documents: RwLock<Vec<StoredDocument>>,
    analyses: RwLock<Vec<StoredAnalysis>>,
    find_calls: AtomicUsize,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn documents(&self) -> Vec<StoredDocument> {
        self.documents.read().unwrap().clone()
    }

    pub fn analyses(&self) -> Vec<StoredAnalysis> {
        self.analyses.read().unwrap().clone()
    }

    /// Number of [`find_document`](DocumentRepository::find_document) calls so far.
    pub fn find_calls(&self) -> usize {
        self.find_calls.load(Ordering::SeqCst)
    }
}

fn format_ts_iso(ts_millis: i64) -> String {
    chrono::DateTime::from_timestamp_millis(ts_millis)
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string())
        .unwrap_or_else(|| ts_millis.to_string())
}

#[async_trait]
impl DocumentRepository for InMemoryRepository {
    async fn insert_document(&self, doc: &NewDocument) -> Result<String> {
        let mut docs = self.documents.write().unwrap();
        if let Some(existing) = docs.iter().find(|d| {
            d.owner == doc.owner && d.scope == doc.scope && d.content_hash == doc.content_hash
        }) {
            return Ok(existing.id.clone());
        }
        let id = uuid::Uuid::new_v4().to_string();
        docs.push(StoredDocument {
            id: id.clone(),
            owner: doc.owner.clone(),
            scope: doc.scope,
            file_name: doc.file_name.clone(),
            full_text: doc.full_text.clone(),
            content_hash: doc.content_hash.clone(),
        });
        Ok(id)
    }

    async fn insert_analysis(&self, analysis: &NewAnalysis) -> Result<String> {
        let owns_document = self
            .documents
            .read()
            .unwrap()
            .iter()
            .any(|d| d.id == analysis.document_id && d.owner == analysis.owner);
        if !owns_document {
            anyhow::bail!("document not found: {}", analysis.document_id);
        }

        let mut analyses = self.analyses.write().unwrap();
        // Strictly increasing so "latest" is well defined even within one millisecond.
        let now = chrono::Utc::now().timestamp_millis();
        let created_at = analyses
            .iter()
            .map(|a| a.created_at + 1)
            .max()
            .map_or(now, |next| next.max(now));
        let version = analyses
            .iter()
            .filter(|a| a.document_id == analysis.document_id)
            .map(|a| a.version)
            .max()
            .unwrap_or(0)
            + 1;
        let id = uuid::Uuid::new_v4().to_string();
        analyses.push(StoredAnalysis {
            id: id.clone(),
            owner: analysis.owner.clone(),
            document_id: analysis.document_id.clone(),
            summary: analysis.summary.clone(),
            summary_points: analysis.summary_points.clone(),
            keywords: analysis.keywords.clone(),
            sentiment: analysis.sentiment.clone(),
            version,
            batch_id: analysis.batch.as_ref().map(|b| b.id.clone()),
            batch_size: analysis.batch.as_ref().map(|b| b.size as i64),
            created_at,
        });
        Ok(id)
    }

    async fn find_document(
        &self,
        owner: &str,
        scope: Scope,
        content_hash: &str,
    ) -> Result<Option<String>> {
        self.find_calls.fetch_add(1, Ordering::SeqCst);
        let docs = self.documents.read().unwrap();
        Ok(docs
            .iter()
            .find(|d| d.owner == owner && d.scope == scope && d.content_hash == content_hash)
            .map(|d| d.id.clone()))
    }

    async fn get_latest_analysis(
        &self,
        owner: &str,
        document_id: &str,
    ) -> Result<Option<AnalysisDetail>> {
        let docs = self.documents.read().unwrap();
        let Some(doc) = docs.iter().find(|d| d.id == document_id && d.owner == owner) else {
            return Ok(None);
        };
        let analyses = self.analyses.read().unwrap();
        let latest = analyses
            .iter()
            .filter(|a| a.document_id == document_id && a.owner == owner)
            .max_by_key(|a| a.created_at);

        Ok(latest.map(|a| AnalysisDetail {
            analysis_id: a.id.clone(),
            document_id: doc.id.clone(),
            file_name: doc.file_name.clone(),
            summary: a.summary.clone(),
            summary_points: a.summary_points.clone(),
            sentiment: a.sentiment.clone(),
            keywords: a.keywords.clone(),
            collection_id: doc.scope.collection_id(),
            created_at: format_ts_iso(a.created_at),
            analysis_version: a.version,
            batch_id: a.batch_id.clone(),
            batch_size: a.batch_size,
            full_text: doc.full_text.clone(),
        }))
    }

    async fn list_documents(
        &self,
        owner: &str,
        scope: Option<Scope>,
    ) -> Result<Vec<DocumentItem>> {
        let docs = self.documents.read().unwrap();
        let analyses = self.analyses.read().unwrap();
        let mut items: Vec<(i64, DocumentItem)> = docs
            .iter()
            .filter(|d| d.owner == owner && scope.map_or(true, |s| s == d.scope))
            .map(|d| {
                let rows: Vec<&StoredAnalysis> = analyses
                    .iter()
                    .filter(|a| a.document_id == d.id && a.owner == owner)
                    .collect();
                let last = rows.iter().map(|a| a.created_at).max();
                (
                    last.unwrap_or(i64::MIN),
                    DocumentItem {
                        id: d.id.clone(),
                        file_name: d.file_name.clone(),
                        analyses_count: rows.len() as i64,
                        last_analysis_at: last.map(format_ts_iso),
                        collection_id: d.scope.collection_id(),
                    },
                )
            })
            .collect();
        items.sort_by(|a, b| b.0.cmp(&a.0));
        Ok(items.into_iter().map(|(_, item)| item).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Batch;

    fn new_doc(owner: &str, scope: Scope, hash: &str) -> NewDocument {
        NewDocument {
            owner: owner.to_string(),
            scope,
            file_name: "a.txt".to_string(),
            full_text: "hello world".to_string(),
            content_hash: hash.to_string(),
        }
    }

    fn new_analysis(owner: &str, doc_id: &str, summary: &str) -> NewAnalysis {
        NewAnalysis {
            owner: owner.to_string(),
            document_id: doc_id.to_string(),
            summary: summary.to_string(),
            summary_points: vec![],
            keywords: vec!["x".to_string()],
            sentiment: "neutral".to_string(),
            batch: None,
        }
    }

    #[tokio::test]
    async fn test_find_is_scope_and_owner_isolated() {
        let repo = InMemoryRepository::new();
        let id = repo
            .insert_document(&new_doc("alice", Scope::Unscoped, "h1"))
            .await
            .unwrap();

        assert_eq!(
            repo.find_document("alice", Scope::Unscoped, "h1").await.unwrap(),
            Some(id)
        );
        assert!(repo
            .find_document("alice", Scope::Collection(1), "h1")
            .await
            .unwrap()
            .is_none());
        assert!(repo
            .find_document("bob", Scope::Unscoped, "h1")
            .await
            .unwrap()
            .is_none());
        assert_eq!(repo.find_calls(), 3);
    }

    #[tokio::test]
    async fn test_insert_document_resolves_duplicates() {
        let repo = InMemoryRepository::new();
        let first = repo
            .insert_document(&new_doc("alice", Scope::Collection(2), "h"))
            .await
            .unwrap();
        let second = repo
            .insert_document(&new_doc("alice", Scope::Collection(2), "h"))
            .await
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(repo.documents().len(), 1);

        let other_scope = repo
            .insert_document(&new_doc("alice", Scope::Unscoped, "h"))
            .await
            .unwrap();
        assert_ne!(first, other_scope);
        assert_eq!(repo.documents().len(), 2);
    }

    #[tokio::test]
    async fn test_latest_analysis_wins_and_is_owner_scoped() {
        let repo = InMemoryRepository::new();
        let doc_id = repo
            .insert_document(&new_doc("alice", Scope::Unscoped, "h"))
            .await
            .unwrap();
        assert!(repo
            .get_latest_analysis("alice", &doc_id)
            .await
            .unwrap()
            .is_none());

        repo.insert_analysis(&new_analysis("alice", &doc_id, "first"))
            .await
            .unwrap();
        let mut second = new_analysis("alice", &doc_id, "second");
        second.batch = Some(Batch {
            id: "b-1".to_string(),
            size: 2,
        });
        repo.insert_analysis(&second).await.unwrap();

        let latest = repo
            .get_latest_analysis("alice", &doc_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(latest.summary, "second");
        assert_eq!(latest.analysis_version, 2);
        assert_eq!(latest.batch_id.as_deref(), Some("b-1"));
        assert_eq!(latest.batch_size, Some(2));
        assert_eq!(latest.full_text, "hello world");

        assert!(repo
            .get_latest_analysis("mallory", &doc_id)
            .await
            .unwrap()
            .is_none());
        assert!(repo
            .insert_analysis(&new_analysis("mallory", &doc_id, "x"))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_list_documents_counts_analyses() {
        let repo = InMemoryRepository::new();
        let a = repo
            .insert_document(&new_doc("alice", Scope::Unscoped, "a"))
            .await
            .unwrap();
        let b = repo
            .insert_document(&new_doc("alice", Scope::Collection(9), "b"))
            .await
            .unwrap();
        repo.insert_analysis(&new_analysis("alice", &a, "s"))
            .await
            .unwrap();
        repo.insert_analysis(&new_analysis("alice", &b, "s"))
            .await
            .unwrap();
        repo.insert_analysis(&new_analysis("alice", &b, "s"))
            .await
            .unwrap();

        let all = repo.list_documents("alice", None).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, b);
        assert_eq!(all[0].analyses_count, 2);
        assert_eq!(all[0].collection_id, Some(9));

        let unscoped = repo
            .list_documents("alice", Some(Scope::Unscoped))
            .await
            .unwrap();
        assert_eq!(unscoped.len(), 1);
        assert_eq!(unscoped[0].id, a);
        assert!(repo.list_documents("bob", None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_versions_count_up_per_document() {
        let repo = InMemoryRepository::new();
        let a = repo
            .insert_document(&new_doc("alice", Scope::Unscoped, "a"))
            .await
            .unwrap();
        let b = repo
            .insert_document(&new_doc("alice", Scope::Unscoped, "b"))
            .await
            .unwrap();
        for doc in [&a, &b, &a, &a] {
            repo.insert_analysis(&new_analysis("alice", doc, "s"))
                .await
                .unwrap();
        }

        let versions = |doc: &str| -> Vec<i64> {
            repo.analyses()
                .iter()
                .filter(|row| row.document_id == doc)
                .map(|row| row.version)
                .collect()
        };
        assert_eq!(versions(a.as_str()), vec![1, 2, 3]);
        assert_eq!(versions(b.as_str()), vec![1]);
    }
}

