//! Quiz generation pass-through.
//!
//! Bounds the input size, then forwards the text to the engine. No
//! persistence, no deduplication.

use thiserror::Error;
use tokio_util::sync::CancellationToken;

use doclens_core::error::{EngineError, ErrorCategory};
use doclens_core::models::QuizResponse;

use crate::engine::RemoteAnalysisClient;

#[derive(Debug, Error)]
pub enum QuizError {
    #[error("quiz text must not be empty")]
    EmptyText,
    #[error("quiz text exceeds {limit} characters")]
    TextTooLarge { limit: usize },
    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl QuizError {
    /// Category reported for engine failures; input errors have none.
    pub fn category(&self) -> Option<ErrorCategory> {
        match self {
            QuizError::EmptyText | QuizError::TextTooLarge { .. } => None,
            QuizError::Engine(e) => Some(e.category()),
        }
    }
}

/// Check `text` against `max_chars` (counted in characters, not bytes).
pub fn check_quiz_text(text: &str, max_chars: usize) -> Result<(), QuizError> {
    if text.trim().is_empty() {
        return Err(QuizError::EmptyText);
    }
    if text.chars().count() > max_chars {
        return Err(QuizError::TextTooLarge { limit: max_chars });
    }
    Ok(())
}

/// Validate `text` and forward it to the engine under `correlation_id`.
pub async fn generate_quiz(
    engine: &dyn RemoteAnalysisClient,
    text: &str,
    max_chars: usize,
    correlation_id: &str,
    cancel: &CancellationToken,
) -> Result<QuizResponse, QuizError> {
    check_quiz_text(text, max_chars)?;
    let quiz = engine.generate_quiz(text, correlation_id, cancel).await;
    if let Err(e) = &quiz {
        tracing::error!(cid = %correlation_id, error_kind = e.kind(), error = %e, "quiz generation failed");
    }
    Ok(quiz?)
}
