//! Read-only views over the audit trail: latest analysis of a document and
//! the owner's document listing.

use anyhow::{bail, Result};

use doclens_core::models::{AnalysisDetail, DocumentItem, Scope};
use doclens_core::store::DocumentRepository;

/// Most recent analysis of `document_id` for `owner`.
///
/// Fails with a `not found` error when the document does not exist, belongs
/// to another owner, or has no analysis yet.
pub async fn latest_analysis(
    store: &dyn DocumentRepository,
    owner: &str,
    document_id: &str,
) -> Result<AnalysisDetail> {
    match store.get_latest_analysis(owner, document_id).await? {
        Some(detail) => Ok(detail),
        None => bail!("document not found: {}", document_id),
    }
}

/// The owner's documents, optionally restricted to one scope, most recently
/// analyzed first.
pub async fn list_documents(
    store: &dyn DocumentRepository,
    owner: &str,
    scope: Option<Scope>,
) -> Result<Vec<DocumentItem>> {
    store.list_documents(owner, scope).await
}
