//! Core data models shared by the orchestrator, the repositories, and the
//! HTTP surface.
//!
//! [`NewDocument`] and [`NewAnalysis`] are the rows the persistence writer
//! produces; [`AnalysisDetail`] is what the dedup path reads back. The
//! ephemeral per-request values are [`Batch`] and [`AnalysisResult`].

use serde::{Deserialize, Serialize};

use crate::error::{ErrorCategory, FileError};

/// Ownership namespace below the owner: either no collection or one collection.
///
/// The two variants are disjoint for deduplication: a digest stored
/// unscoped never matches a lookup in a collection, and vice versa.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Scope {
    #[default]
    Unscoped,
    Collection(i64),
}

impl Scope {
    /// Builds a scope from an optional collection id.
    pub fn from_collection(collection_id: Option<i64>) -> Self {
        match collection_id {
            Some(id) => Scope::Collection(id),
            None => Scope::Unscoped,
        }
    }

    /// The collection id, or `None` when unscoped.
    pub fn collection_id(&self) -> Option<i64> {
        match self {
            Scope::Unscoped => None,
            Scope::Collection(id) => Some(*id),
        }
    }
}

/// Request-scoped grouping stamped onto every analysis row of a multi-file
/// request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    pub id: String,
    pub size: usize,
}

impl Batch {
    /// Returns a fresh batch for `file_count` files, or `None` for a
    /// single-file (or empty) request.
    pub fn for_request(file_count: usize) -> Option<Self> {
        if file_count > 1 {
            Some(Self {
                id: uuid::Uuid::new_v4().to_string(),
                size: file_count,
            })
        } else {
            None
        }
    }
}

/// Document row to insert on the first successful analysis of novel content.
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub owner: String,
    pub scope: Scope,
    pub file_name: String,
    pub full_text: String,
    pub content_hash: String,
}

/// Analysis audit row. One is written for every outcome that reaches the
/// persistence stage, reused or not. The repository numbers it: one past the
/// highest version already stored for the document.
#[derive(Debug, Clone)]
pub struct NewAnalysis {
    pub owner: String,
    pub document_id: String,
    pub summary: String,
    pub summary_points: Vec<String>,
    pub keywords: Vec<String>,
    pub sentiment: String,
    pub batch: Option<Batch>,
}

/// Most recent analysis of a document, joined with the document itself.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisDetail {
    pub analysis_id: String,
    pub document_id: String,
    pub file_name: String,
    pub summary: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub summary_points: Vec<String>,
    pub sentiment: String,
    pub keywords: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collection_id: Option<i64>,
    /// ISO-8601 creation time of the analysis row.
    pub created_at: String,
    pub analysis_version: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<i64>,
    pub full_text: String,
}

impl AnalysisDetail {
    /// The payload handed back to the caller on the reuse path.
    pub fn to_data(&self) -> AnalysisData {
        AnalysisData {
            summary: self.summary.clone(),
            summary_points: self.summary_points.clone(),
            keywords: self.keywords.clone(),
            sentiment: self.sentiment.clone(),
            full_text: self.full_text.clone(),
        }
    }
}

/// Listing entry for a stored document.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentItem {
    pub id: String,
    pub file_name: String,
    pub analyses_count: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_analysis_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collection_id: Option<i64>,
}

/// Analysis payload: the engine's success body and the `data` field of a
/// successful [`AnalysisResult`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisData {
    pub summary: String,
    #[serde(default, alias = "summary_points")]
    pub summary_points: Vec<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    pub sentiment: String,
    #[serde(default, alias = "full_text")]
    pub full_text: String,
}

/// Classified error attached to a failed [`AnalysisResult`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultError {
    pub code: ErrorCategory,
    pub message: String,
}

/// Outcome for one uploaded file. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub file_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<AnalysisData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ResultError>,
    pub reused: bool,
}

impl AnalysisResult {
    pub fn analyzed(file_name: impl Into<String>, data: AnalysisData) -> Self {
        Self {
            file_name: file_name.into(),
            data: Some(data),
            error: None,
            reused: false,
        }
    }

    pub fn reused(file_name: impl Into<String>, data: AnalysisData) -> Self {
        Self {
            file_name: file_name.into(),
            data: Some(data),
            error: None,
            reused: true,
        }
    }

    /// Builds a failed result carrying only the user-facing category.
    pub fn failed(file_name: impl Into<String>, err: &FileError) -> Self {
        Self::with_category(file_name, err.category())
    }

    pub fn with_category(file_name: impl Into<String>, category: ErrorCategory) -> Self {
        Self {
            file_name: file_name.into(),
            data: None,
            error: Some(ResultError {
                code: category,
                message: category.message().to_string(),
            }),
            reused: false,
        }
    }

    pub fn category(&self) -> Option<ErrorCategory> {
        self.error.as_ref().map(|e| e.code)
    }
}

/// A single generated quiz item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizQuestion {
    pub question: String,
    pub answer: String,
}

/// Engine response for `POST /generate-quiz`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuizResponse {
    #[serde(default, alias = "quiz")]
    pub questions: Vec<QuizQuestion>,
}
