//! Filing suggestions: the structured answer a VLM gives for one document.
//!
//! VLMs are asked for a strict JSON object but routinely wrap it in
//! ```` ```json ```` fences or prepend a sentence of commentary.
//! [`FilingSuggestion::parse`] tolerates both, then [`validate`] enforces the
//! invariants the resolver depends on: no path separators in the filename and
//! no `..` segments in the destination. Validation happens here, at the trust
//! boundary, so everything downstream can assume a well-formed suggestion.
//!
//! [`validate`]: FilingSuggestion::validate

use crate::error::FilerError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Matches a fenced code block and captures its body.
static CODE_FENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)```(?:json)?\s*(.*?)\s*```").expect("static regex")
});

/// A candidate filename + destination produced by the VLM collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilingSuggestion {
    /// Candidate filename, extension included. Must not contain separators.
    #[serde(default = "default_filename")]
    pub filename: String,
    /// Relative destination path, forward-slash separated, no leading slash.
    #[serde(default = "default_destination")]
    pub destination: String,
    /// Model confidence in `[0, 1]`.
    #[serde(default)]
    pub confidence: f64,
    /// Free-text reasoning for display to the reviewing user.
    #[serde(default = "default_reasoning")]
    pub reasoning: String,
}

fn default_filename() -> String {
    "untitled.pdf".to_string()
}

fn default_destination() -> String {
    "unsorted".to_string()
}

fn default_reasoning() -> String {
    "No reasoning provided".to_string()
}

impl FilingSuggestion {
    /// Parse a raw VLM response into a suggestion.
    ///
    /// Accepts bare JSON, JSON inside a fenced code block, and JSON with
    /// surrounding prose. Missing fields fall back to safe defaults
    /// (`untitled.pdf` into `unsorted` at confidence 0).
    pub fn parse(response: &str) -> Result<Self, FilerError> {
        let text = response.trim();

        let candidate = if let Some(caps) = CODE_FENCE.captures(text) {
            caps.get(1).map(|m| m.as_str()).unwrap_or(text)
        } else {
            text
        };

        // Last resort: slice from the first '{' to the final '}' to drop
        // leading or trailing commentary.
        let parsed = serde_json::from_str::<Self>(candidate).or_else(|first_err| {
            match (candidate.find('{'), candidate.rfind('}')) {
                (Some(start), Some(end)) if start < end => {
                    serde_json::from_str::<Self>(&candidate[start..=end])
                }
                _ => Err(first_err),
            }
        });

        let mut suggestion = parsed.map_err(|e| {
            FilerError::Internal(format!("Suggestion response is not valid JSON: {e}"))
        })?;
        suggestion.confidence = suggestion.confidence.clamp(0.0, 1.0);
        Ok(suggestion)
    }

    /// Enforce the structural invariants the resolver depends on.
    ///
    /// # Errors
    /// - [`FilerError::InvalidName`] when the filename is empty or contains
    ///   path separators
    /// - [`FilerError::PathTraversal`] when the destination contains a `..`
    ///   segment or starts from the filesystem root
    pub fn validate(&self) -> Result<(), FilerError> {
        if self.filename.trim().is_empty() || self.filename.contains(['/', '\\']) {
            return Err(FilerError::InvalidName {
                suggested: self.filename.clone(),
            });
        }
        if self.destination.starts_with('/')
            || self.destination.split('/').any(|seg| seg == "..")
        {
            return Err(FilerError::PathTraversal {
                suggested: self.destination.clone(),
            });
        }
        Ok(())
    }
}

impl std::fmt::Display for FilingSuggestion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.destination, self.filename)
    }
}
