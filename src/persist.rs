//! Deduplication lookup and the persistence writer.
//!
//! Both sit on top of a shared [`DocumentRepository`]. Each call is one or
//! two short, independent statements; nothing here holds a lock or a
//! transaction across the remote engine call.

use anyhow::Result;
use std::sync::Arc;

use doclens_core::keywords::normalize_keywords;
use doclens_core::models::{AnalysisData, AnalysisDetail, Batch, NewAnalysis, NewDocument, Scope};
use doclens_core::store::DocumentRepository;

/// Find a prior analysis of `content_hash` in exactly `(owner, scope)`.
///
/// A document with no retrievable analysis counts as a miss, since its
/// result could not be reconstructed.
pub async fn find_reusable(
    repo: &dyn DocumentRepository,
    owner: &str,
    scope: Scope,
    content_hash: &str,
) -> Result<Option<AnalysisDetail>> {
    let Some(document_id) = repo.find_document(owner, scope, content_hash).await? else {
        return Ok(None);
    };
    repo.get_latest_analysis(owner, &document_id).await
}

/// What a write produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Persisted {
    /// A document (new or resolved) and an analysis row were written.
    Written {
        document_id: String,
        analysis_id: String,
    },
    /// The engine extracted no text; nothing was stored.
    SkippedEmptyText,
}

/// Writes document and analysis audit rows.
#[derive(Clone)]
pub struct PersistenceWriter {
    repo: Arc<dyn DocumentRepository>,
}

impl PersistenceWriter {
    pub fn new(repo: Arc<dyn DocumentRepository>) -> Self {
        Self { repo }
    }

    /// New-content path: insert the document, then its first analysis.
    ///
    /// Skipped entirely when the engine returned empty full text, since
    /// there would be nothing to deduplicate against later.
    pub async fn record_new(
        &self,
        owner: &str,
        scope: Scope,
        file_name: &str,
        content_hash: &str,
        data: &AnalysisData,
        batch: Option<&Batch>,
    ) -> Result<Persisted> {
        if data.full_text.is_empty() {
            return Ok(Persisted::SkippedEmptyText);
        }

        let document_id = self
            .repo
            .insert_document(&NewDocument {
                owner: owner.to_string(),
                scope,
                file_name: file_name.to_string(),
                full_text: data.full_text.clone(),
                content_hash: content_hash.to_string(),
            })
            .await?;

        let analysis_id = self
            .repo
            .insert_analysis(&NewAnalysis {
                owner: owner.to_string(),
                document_id: document_id.clone(),
                summary: data.summary.clone(),
                summary_points: data.summary_points.clone(),
                keywords: normalize_keywords(&data.keywords),
                sentiment: data.sentiment.clone(),
                batch: batch.cloned(),
            })
            .await?;

        Ok(Persisted::Written {
            document_id,
            analysis_id,
        })
    }

    /// Reuse path: append an audit row to the existing document, copying the
    /// previous results forward and stamping the current batch.
    pub async fn record_reuse(
        &self,
        owner: &str,
        previous: &AnalysisDetail,
        batch: Option<&Batch>,
    ) -> Result<Persisted> {
        let analysis_id = self
            .repo
            .insert_analysis(&NewAnalysis {
                owner: owner.to_string(),
                document_id: previous.document_id.clone(),
                summary: previous.summary.clone(),
                summary_points: previous.summary_points.clone(),
                keywords: normalize_keywords(&previous.keywords),
                sentiment: previous.sentiment.clone(),
                batch: batch.cloned(),
            })
            .await?;

        Ok(Persisted::Written {
            document_id: previous.document_id.clone(),
            analysis_id,
        })
    }
}
