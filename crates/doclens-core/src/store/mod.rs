//! Storage abstraction consumed by the orchestrator.
//!
//! The [`DocumentRepository`] trait is the whole contract the core needs
//! from the relational store, enabling pluggable backends (SQLite,
//! in-memory for tests).
//!
//! Implementations must be `Send + Sync`: a single instance is shared by
//! every concurrently running file unit.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{AnalysisDetail, DocumentItem, NewAnalysis, NewDocument, Scope};

/// Owner-scoped document and analysis storage.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`insert_document`](DocumentRepository::insert_document) | Insert a document, or resolve to the existing one for the same digest |
/// | [`insert_analysis`](DocumentRepository::insert_analysis) | Append an analysis audit row |
/// | [`find_document`](DocumentRepository::find_document) | Dedup lookup by `(owner, scope, digest)` |
/// | [`get_latest_analysis`](DocumentRepository::get_latest_analysis) | Newest analysis of a document |
/// | [`list_documents`](DocumentRepository::list_documents) | Owner's documents with analysis counts |
///
/// No operation may return or mutate another owner's rows.
#[async_trait]
pub trait DocumentRepository: Send + Sync {
    /// Insert a document and return its id.
    ///
    /// If a document with the same `(owner, scope, content_hash)` already
    /// exists (for example, a concurrent upload of the same bytes won the
    /// race), its id is returned instead and nothing is inserted.
    async fn insert_document(&self, doc: &NewDocument) -> Result<String>;

    /// Insert an analysis row and return its id. Keywords are stored as given;
    /// callers normalize them first.
    ///
    /// The row's version is assigned atomically with the insert as one past
    /// the document's highest version (1 for its first analysis), so
    /// concurrent writers on one document never share a version.
    async fn insert_analysis(&self, analysis: &NewAnalysis) -> Result<String>;

    /// Find the document holding `content_hash` in exactly this owner and scope.
    async fn find_document(
        &self,
        owner: &str,
        scope: Scope,
        content_hash: &str,
    ) -> Result<Option<String>>;

    /// Most recent analysis of `document_id`, if the document belongs to `owner`
    /// and has at least one analysis.
    async fn get_latest_analysis(
        &self,
        owner: &str,
        document_id: &str,
    ) -> Result<Option<AnalysisDetail>>;

    /// Owner's documents with analysis counts, most recently analyzed first.
    ///
    /// `scope = None` lists every document of the owner; `Some(scope)`
    /// restricts the listing to that scope.
    async fn list_documents(
        &self,
        owner: &str,
        scope: Option<Scope>,
    ) -> Result<Vec<DocumentItem>>;
}
