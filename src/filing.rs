//! The orchestrator: sequence rendering, suggestion acquisition, and
//! conditional filing across single documents and batches.
//!
//! Each document runs a strict three-stage pipeline — render, suggest,
//! file — with no re-ordering. Stages are deliberately exposed as separate
//! calls because a human sits between the last two: the GUI or CLI shows the
//! suggestion and only calls [`FilingOrchestrator::confirm_and_file`] after
//! the user approves (possibly having edited the name).
//!
//! Batch runs process documents independently: one document's failure is
//! recorded in its own result and never aborts the rest of the batch.

use crate::config::FilerConfig;
use crate::error::FilerError;
use crate::output::{FileOperation, FilingOutcome, FilingResult, RenderedPage};
use crate::pipeline::{input::SourceDocument, render};
use crate::progress::ProgressCallback;
use crate::provider::SharedSuggestionProvider;
use crate::resolver::DestinationResolver;
use crate::suggestion::FilingSuggestion;
use futures::stream::{self, StreamExt};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

/// One unit of work for [`FilingOrchestrator::file_batch`]: a reviewed
/// suggestion plus the operation the user chose for it.
#[derive(Debug, Clone)]
pub struct FilingRequest {
    pub source: PathBuf,
    pub suggestion: FilingSuggestion,
    pub operation: FileOperation,
}

/// Coordinates the render → suggest → file pipeline.
///
/// # Example
/// ```no_run
/// # async fn demo() -> Result<(), docfiler::FilerError> {
/// use docfiler::{FilingOrchestrator, FilerConfig};
///
/// let config = FilerConfig::builder().base_dir("/archive").build()?;
/// let orchestrator = FilingOrchestrator::new(config);
///
/// let pages = orchestrator.analyze("/in/scan001.pdf").await?;
/// println!("rendered {} pages", pages.len());
/// # Ok(())
/// # }
/// ```
pub struct FilingOrchestrator {
    config: FilerConfig,
    resolver: DestinationResolver,
    provider: Option<SharedSuggestionProvider>,
    progress: Option<ProgressCallback>,
    cancelled: Arc<AtomicBool>,
}

impl FilingOrchestrator {
    pub fn new(config: FilerConfig) -> Self {
        let resolver = DestinationResolver::new(config.max_disambiguation_attempts);
        Self {
            config,
            resolver,
            provider: None,
            progress: None,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Attach the VLM provider used by [`suggest`](Self::suggest).
    pub fn with_provider(mut self, provider: SharedSuggestionProvider) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Attach a progress callback for batch runs.
    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn config(&self) -> &FilerConfig {
        &self.config
    }

    /// Stop issuing new per-document pipelines.
    ///
    /// Documents already past their filing point complete normally; a
    /// relocation in flight is never aborted mid-operation.
    pub fn request_cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Clear a previous cancellation before starting a new batch.
    pub fn reset_cancellation(&self) {
        self.cancelled.store(false, Ordering::SeqCst);
    }

    /// Render a document into normalized page images.
    ///
    /// Thin delegation to the rendering pipeline; failures propagate
    /// unchanged.
    pub async fn analyze(&self, path: impl AsRef<Path>) -> Result<Vec<RenderedPage>, FilerError> {
        let document = SourceDocument::open(path)?;
        render::render(&document, &self.config).await
    }

    /// Request a filing suggestion for already-rendered pages.
    ///
    /// The returned suggestion is validated: separator-laden filenames and
    /// traversal destinations are rejected here, before any user sees them.
    ///
    /// # Errors
    /// [`FilerError::Internal`] when no provider is attached or the provider
    /// call fails; [`FilerError::InvalidName`] / [`FilerError::PathTraversal`]
    /// for malformed suggestions.
    pub async fn suggest(
        &self,
        pages: &[RenderedPage],
        prompt: &str,
    ) -> Result<FilingSuggestion, FilerError> {
        let provider = self.provider.as_ref().ok_or_else(|| {
            FilerError::Internal("no suggestion provider configured".into())
        })?;

        let suggestion = provider.suggest(pages, prompt).await?;
        suggestion.validate()?;
        info!(
            "Suggestion: '{}' (confidence {:.2})",
            suggestion, suggestion.confidence
        );
        Ok(suggestion)
    }

    /// Execute a reviewed suggestion.
    ///
    /// `Skipped` is an explicit, successful no-op. `Rename` keeps the file in
    /// its current directory under the suggested name. `Move` relocates it to
    /// the suggested destination under the base directory, creating missing
    /// directories.
    pub async fn confirm_and_file(
        &self,
        source: impl AsRef<Path>,
        suggestion: &FilingSuggestion,
        operation: FileOperation,
    ) -> Result<FilingResult, FilerError> {
        let source = source.as_ref();

        match operation {
            FileOperation::Skipped => self.resolver.apply(source, source, operation).await,
            FileOperation::Rename => {
                suggestion.validate()?;
                let filename = self.resolver.sanitize_filename(&suggestion.filename)?;
                let parent = source.parent().ok_or_else(|| {
                    FilerError::Internal("source path has no parent directory".into())
                })?;
                self.resolver
                    .apply(source, &parent.join(filename), operation)
                    .await
            }
            FileOperation::Move => {
                suggestion.validate()?;
                let base = self.base_for(source)?;
                self.resolver
                    .resolve_and_apply(
                        source,
                        &suggestion.filename,
                        &suggestion.destination,
                        &base,
                        operation,
                    )
                    .await
            }
        }
    }

    /// Render a batch of documents, at most `config.concurrency` at a time.
    ///
    /// Returns one entry per input, in input order. A failed document yields
    /// its error in place; the rest of the batch is unaffected. Cancellation
    /// stops new documents from starting.
    pub async fn analyze_batch(
        &self,
        paths: &[PathBuf],
    ) -> Vec<Result<Vec<RenderedPage>, FilerError>> {
        let total = paths.len();
        if let Some(cb) = &self.progress {
            cb.on_batch_start(total);
        }

        let mut results: Vec<(usize, Result<Vec<RenderedPage>, FilerError>)> =
            stream::iter(paths.iter().enumerate())
                .map(|(i, path)| async move {
                    if self.is_cancelled() {
                        return (i, Err(FilerError::Internal("batch cancelled".into())));
                    }
                    if let Some(cb) = &self.progress {
                        cb.on_document_start(i, total, path);
                    }
                    let result = self.analyze(path).await;
                    match (&result, &self.progress) {
                        (Ok(_), Some(cb)) => cb.on_document_complete(i, total, path),
                        (Err(e), Some(cb)) => {
                            cb.on_document_error(i, total, path, &e.to_string())
                        }
                        _ => {}
                    }
                    (i, result)
                })
                .buffer_unordered(self.config.concurrency)
                .collect()
                .await;

        results.sort_by_key(|(i, _)| *i);
        let results: Vec<_> = results.into_iter().map(|(_, r)| r).collect();

        if let Some(cb) = &self.progress {
            cb.on_batch_complete(total, results.iter().filter(|r| r.is_ok()).count());
        }
        results
    }

    /// Execute a batch of reviewed filing requests.
    ///
    /// Returns one [`FilingResult`] per request, in request order. Failures
    /// are recorded as `failure` outcomes (with the source as target) rather
    /// than propagated, so a locked file or a vanished source never stops the
    /// remaining documents. Cancellation stops new requests from starting;
    /// already-started relocations run to completion.
    pub async fn file_batch(&self, requests: &[FilingRequest]) -> Vec<FilingResult> {
        let total = requests.len();
        if let Some(cb) = &self.progress {
            cb.on_batch_start(total);
        }

        let mut results: Vec<(usize, FilingResult)> =
            stream::iter(requests.iter().enumerate())
                .map(|(i, req)| async move {
                    if self.is_cancelled() {
                        return (
                            i,
                            failure_result(&req.source, req.operation, "batch cancelled"),
                        );
                    }
                    if let Some(cb) = &self.progress {
                        cb.on_document_start(i, total, &req.source);
                    }

                    let result = match self
                        .confirm_and_file(&req.source, &req.suggestion, req.operation)
                        .await
                    {
                        Ok(result) => result,
                        Err(e) => {
                            warn!("Filing failed for {}: {}", req.source.display(), e);
                            failure_result(&req.source, req.operation, &e.to_string())
                        }
                    };

                    if let Some(cb) = &self.progress {
                        match &result.outcome {
                            FilingOutcome::Success => {
                                cb.on_document_complete(i, total, &req.source)
                            }
                            FilingOutcome::Failure(reason) => {
                                cb.on_document_error(i, total, &req.source, reason)
                            }
                        }
                    }
                    (i, result)
                })
                .buffer_unordered(self.config.concurrency)
                .collect()
                .await;

        results.sort_by_key(|(i, _)| *i);
        let results: Vec<_> = results.into_iter().map(|(_, r)| r).collect();

        if let Some(cb) = &self.progress {
            cb.on_batch_complete(total, results.iter().filter(|r| r.is_success()).count());
        }
        results
    }

    /// Base directory for a given source: the configured one, or the source's
    /// own parent when none is set.
    fn base_for(&self, source: &Path) -> Result<PathBuf, FilerError> {
        match &self.config.base_dir {
            Some(base) => Ok(base.clone()),
            None => source
                .parent()
                .map(Path::to_path_buf)
                .ok_or_else(|| {
                    FilerError::Internal("source path has no parent directory".into())
                }),
        }
    }
}

/// A failure record keeping the source in place as the "target".
fn failure_result(source: &Path, operation: FileOperation, reason: &str) -> FilingResult {
    FilingResult {
        source: source.to_path_buf(),
        target: source.to_path_buf(),
        operation,
        outcome: FilingOutcome::Failure(reason.to_string()),
    }
}
