//! Document analysis orchestration.
//!
//! [`Analyzer::analyze_files`] fans a request's files out to one spawned
//! task each and joins them all before returning. Every task runs the
//! per-file state machine:
//!
//! ```text
//! Validating → Hashing → Deduping ─┬─ hit ──→ Reusing ──┐
//!                                  └─ miss ─→ Analyzing ┴→ Persisting → Done
//!
//! Validating / Hashing / Analyzing (incl. decode) ──failure──→ Error
//! ```
//!
//! Failures are terminal for that file only and are never retried. The
//! caller gets exactly one [`AnalysisResult`] per input file, in input
//! order, whatever the completion order.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

use doclens_core::error::{ErrorCategory, FileError};
use doclens_core::models::{AnalysisResult, Batch, Scope};
use doclens_core::store::DocumentRepository;
use doclens_core::validate::ExtensionAllowList;

use crate::engine::RemoteAnalysisClient;
use crate::persist::{find_reusable, Persisted, PersistenceWriter};
use crate::source::{read_and_hash, UploadedFile};

/// Per-request identity threaded explicitly through every call.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Propagated unchanged to every engine call and log line of the request.
    pub correlation_id: String,
    pub owner: String,
    pub scope: Scope,
}

/// Aggregate result of one analyze request.
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    /// One entry per input file, in input order.
    pub results: Vec<AnalysisResult>,
    /// True when every file failed with the service-unavailable category,
    /// which points at the engine being down rather than at bad files.
    pub degraded: bool,
}

impl BatchOutcome {
    fn from_results(results: Vec<AnalysisResult>) -> Self {
        let degraded = !results.is_empty()
            && results
                .iter()
                .all(|r| r.category() == Some(ErrorCategory::ServiceUnavailable));
        Self { results, degraded }
    }
}

/// Per-file processing stage, recorded in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Validating,
    Hashing,
    Deduping,
    Reusing,
    Analyzing,
    Persisting,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Validating => "validating",
            Stage::Hashing => "hashing",
            Stage::Deduping => "deduping",
            Stage::Reusing => "reusing",
            Stage::Analyzing => "analyzing",
            Stage::Persisting => "persisting",
        };
        f.write_str(name)
    }
}

struct StageError {
    stage: Stage,
    error: FileError,
}

fn at<E: Into<FileError>>(stage: Stage) -> impl FnOnce(E) -> StageError {
    move |e| StageError {
        stage,
        error: e.into(),
    }
}

/// The orchestrator. Cheap to clone; all collaborators are shared.
#[derive(Clone)]
pub struct Analyzer {
    repo: Arc<dyn DocumentRepository>,
    engine: Arc<dyn RemoteAnalysisClient>,
    writer: PersistenceWriter,
    allow_list: Arc<ExtensionAllowList>,
}

impl Analyzer {
    pub fn new(
        repo: Arc<dyn DocumentRepository>,
        engine: Arc<dyn RemoteAnalysisClient>,
        allow_list: ExtensionAllowList,
    ) -> Self {
        Self {
            writer: PersistenceWriter::new(repo.clone()),
            repo,
            engine,
            allow_list: Arc::new(allow_list),
        }
    }

    pub fn engine(&self) -> &Arc<dyn RemoteAnalysisClient> {
        &self.engine
    }

    /// Analyze every file of one request concurrently.
    ///
    /// The batch identity is computed once, before any task starts.
    /// Cancelling `cancel` makes in-flight reads and engine calls resolve
    /// early with a classified error; this still waits for every task.
    pub async fn analyze_files(
        &self,
        ctx: &RequestContext,
        files: Vec<UploadedFile>,
        cancel: &CancellationToken,
    ) -> BatchOutcome {
        let batch = Batch::for_request(files.len()).map(Arc::new);
        if let Some(batch) = &batch {
            tracing::info!(cid = %ctx.correlation_id, batch_id = %batch.id, batch_size = batch.size, "starting batch");
        }

        let ctx = Arc::new(ctx.clone());
        let mut file_names = Vec::with_capacity(files.len());
        let mut handles = Vec::with_capacity(files.len());
        for file in files {
            file_names.push(file.file_name.clone());
            let unit = self.clone();
            let ctx = ctx.clone();
            let batch = batch.clone();
            let cancel = cancel.clone();
            handles.push(tokio::spawn(async move {
                unit.analyze_file(&ctx, file, batch.as_deref(), &cancel).await
            }));
        }

        // Slot i belongs to input file i.
        let mut slots: Vec<Option<AnalysisResult>> = vec![None; handles.len()];
        for (index, handle) in handles.into_iter().enumerate() {
            let result = match handle.await {
                Ok(result) => result,
                Err(e) => {
                    tracing::error!(cid = %ctx.correlation_id, file = %file_names[index], error = %e, "file task failed");
                    AnalysisResult::failed(
                        file_names[index].clone(),
                        &FileError::Internal(e.to_string()),
                    )
                }
            };
            slots[index] = Some(result);
        }

        BatchOutcome::from_results(slots.into_iter().flatten().collect())
    }

    /// Run one file to a terminal state and log the outcome.
    async fn analyze_file(
        &self,
        ctx: &RequestContext,
        file: UploadedFile,
        batch: Option<&Batch>,
        cancel: &CancellationToken,
    ) -> AnalysisResult {
        let start = Instant::now();
        let file_name = file.file_name.clone();

        match self.run_file(ctx, file, batch, cancel).await {
            Ok(result) => {
                tracing::info!(
                    cid = %ctx.correlation_id,
                    file = %file_name,
                    reused = result.reused,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "analysis complete"
                );
                result
            }
            Err(StageError { stage, error }) => {
                if let FileError::UnsupportedFileType { extension } = &error {
                    tracing::info!(cid = %ctx.correlation_id, file = %file_name, ext = %extension, "skip unsupported file type");
                } else {
                    tracing::error!(
                        cid = %ctx.correlation_id,
                        file = %file_name,
                        stage = %stage,
                        error_kind = error.kind(),
                        error = %error,
                        duration_ms = start.elapsed().as_millis() as u64,
                        "file analysis failed"
                    );
                }
                AnalysisResult::failed(file_name, &error)
            }
        }
    }

    async fn run_file(
        &self,
        ctx: &RequestContext,
        file: UploadedFile,
        batch: Option<&Batch>,
        cancel: &CancellationToken,
    ) -> Result<AnalysisResult, StageError> {
        let UploadedFile { file_name, content } = file;

        self.allow_list
            .check(&file_name)
            .map_err(at(Stage::Validating))?;

        let reader = content.open().await.map_err(at(Stage::Hashing))?;
        let (bytes, content_hash) = read_and_hash(reader, cancel)
            .await
            .map_err(at(Stage::Hashing))?;

        let previous = match find_reusable(self.repo.as_ref(), &ctx.owner, ctx.scope, &content_hash)
            .await
        {
            Ok(previous) => previous,
            Err(e) => {
                tracing::warn!(cid = %ctx.correlation_id, file = %file_name, stage = %Stage::Deduping, error = %e, "dedup lookup failed, analyzing as new content");
                None
            }
        };

        if let Some(previous) = previous {
            if let Err(e) = self.writer.record_reuse(&ctx.owner, &previous, batch).await {
                tracing::warn!(cid = %ctx.correlation_id, file = %file_name, stage = %Stage::Reusing, error = %e, "failed to record reuse audit row");
            }
            return Ok(AnalysisResult::reused(file_name, previous.to_data()));
        }

        let data = self
            .engine
            .analyze(bytes, &file_name, &ctx.correlation_id, cancel)
            .await
            .map_err(at(Stage::Analyzing))?;

        match self
            .writer
            .record_new(&ctx.owner, ctx.scope, &file_name, &content_hash, &data, batch)
            .await
        {
            Ok(Persisted::SkippedEmptyText) => {
                tracing::debug!(cid = %ctx.correlation_id, file = %file_name, "empty extracted text, nothing persisted");
            }
            Ok(Persisted::Written { .. }) => {}
            Err(e) => {
                tracing::warn!(cid = %ctx.correlation_id, file = %file_name, stage = %Stage::Persisting, error = %e, "failed to persist analysis");
            }
        }

        Ok(AnalysisResult::analyzed(file_name, data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unavailable(name: &str) -> AnalysisResult {
        AnalysisResult::with_category(name, ErrorCategory::ServiceUnavailable)
    }

    #[test]
    fn test_degraded_only_when_all_unavailable() {
        let all_down = BatchOutcome::from_results(vec![unavailable("a"), unavailable("b")]);
        assert!(all_down.degraded);

        let mixed = BatchOutcome::from_results(vec![
            unavailable("a"),
            AnalysisResult::with_category("b", ErrorCategory::UnsupportedFileType),
        ]);
        assert!(!mixed.degraded);

        let empty = BatchOutcome::from_results(vec![]);
        assert!(!empty.degraded);
    }

    #[test]
    fn test_stage_names() {
        assert_eq!(Stage::Validating.to_string(), "validating");
        assert_eq!(Stage::Persisting.to_string(), "persisting");
    }
}
