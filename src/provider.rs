//! The seam between this crate and the VLM that produces suggestions.
//!
//! The library never talks to a network itself. Callers implement
//! [`SuggestionProvider`] over whatever vision API they use (OpenAI,
//! Anthropic, a local model) and hand it to the orchestrator; everything on
//! this side of the trait is pure pipeline and filesystem work, which keeps
//! the whole crate testable with a canned provider.

use crate::error::FilerError;
use crate::output::RenderedPage;
use crate::suggestion::FilingSuggestion;
use async_trait::async_trait;
use std::sync::Arc;

/// Produces a [`FilingSuggestion`] from rendered page images and a prompt.
///
/// Implementations must be `Send + Sync`; the orchestrator calls them
/// concurrently across documents in a batch. No lock is held while a call
/// is in flight.
///
/// Provider failures are reported as [`FilerError::Internal`] with a
/// human-readable reason; the orchestrator treats them as per-document
/// failures that never abort a batch.
#[async_trait]
pub trait SuggestionProvider: Send + Sync {
    /// Request a suggestion for one document.
    ///
    /// `pages` is non-empty and already normalized; use
    /// [`RenderedPage::to_base64`] for APIs that take base64 attachments.
    async fn suggest(
        &self,
        pages: &[RenderedPage],
        prompt: &str,
    ) -> Result<FilingSuggestion, FilerError>;
}

/// Convenience alias matching the type stored by the orchestrator.
pub type SharedSuggestionProvider = Arc<dyn SuggestionProvider>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::RenderStrategyKind;

    struct CannedProvider;

    #[async_trait]
    impl SuggestionProvider for CannedProvider {
        async fn suggest(
            &self,
            pages: &[RenderedPage],
            _prompt: &str,
        ) -> Result<FilingSuggestion, FilerError> {
            FilingSuggestion::parse(&format!(
                r#"{{"filename": "doc-{}-pages.pdf", "destination": "unsorted", "confidence": 0.5, "reasoning": "test"}}"#,
                pages.len()
            ))
        }
    }

    fn page(index: usize) -> RenderedPage {
        RenderedPage {
            index,
            width: 10,
            height: 10,
            png: vec![0x89, b'P', b'N', b'G'],
            strategy: RenderStrategyKind::Primary,
        }
    }

    #[tokio::test]
    async fn provider_trait_object_is_callable() {
        let provider: SharedSuggestionProvider = Arc::new(CannedProvider);
        let suggestion = provider
            .suggest(&[page(0), page(1)], "prompt")
            .await
            .unwrap();
        assert_eq!(suggestion.filename, "doc-2-pages.pdf");
    }
}
