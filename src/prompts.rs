//! Prompt text sent alongside page images when requesting a suggestion.
//!
//! Centralising every prompt here serves two purposes:
//!
//! 1. **Single source of truth** — changing the default behaviour (adding a
//!    filing category, tweaking the naming convention) requires editing
//!    exactly one place.
//!
//! 2. **Testability** — unit tests can inspect the assembled prompt without
//!    calling a real VLM, so template regressions are easy to catch.
//!
//! Callers can substitute their own context (their real folder tree and
//! house rules) via [`build_prompt`]; [`describe_folder_tree`] builds that
//! context from a base directory. The constants here are used only when no
//! override is provided.

use crate::error::FilerError;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Default prompt template. `{context}` and `{extra_instructions}` are
/// replaced by [`build_prompt`].
pub const DEFAULT_PROMPT_TEMPLATE: &str = r#"You are an AI assistant helping to organize scanned documents.

Context: {context}

{extra_instructions}

Analyze the provided document image(s) and suggest:
1. A descriptive filename
2. An appropriate destination folder path

Respond with JSON:
{
  "filename": "YYYYMMDD Description.ext",
  "destination": "Category/Subcategory",
  "confidence": 0.95,
  "reasoning": "Brief explanation"
}
"#;

/// Default filing context used when the caller supplies none.
///
/// Describes a generic household filing tree; real deployments should pass
/// their actual folder structure so suggestions land in existing categories.
pub const DEFAULT_CONTEXT: &str = "\
This is a general document filing system. Common categories include:

- Finances/Bills (Utility bills, invoices)
- Finances/Statements (Bank statements, credit card statements)
- Medical/Records (Medical records, prescriptions)
- Medical/Insurance (Insurance documents)
- Legal/Contracts (Contracts, agreements)
- Personal/Correspondence (Letters, notices)
- Household/Manuals (Product manuals, warranties)
- Taxes/Receipts (Tax documents, receipts)

Use YYYYMMDD format for dates when visible in documents.
Use clear, descriptive names with Capitalized Words and spaces. Avoid underscores.";

/// Assemble the final prompt from the template and optional overrides.
///
/// `context` defaults to [`DEFAULT_CONTEXT`]; `extra_instructions` defaults
/// to nothing.
pub fn build_prompt(context: Option<&str>, extra_instructions: Option<&str>) -> String {
    DEFAULT_PROMPT_TEMPLATE
        .replace("{context}", context.unwrap_or(DEFAULT_CONTEXT))
        .replace("{extra_instructions}", extra_instructions.unwrap_or(""))
        .trim()
        .to_string()
}

/// Example filenames listed per folder in [`describe_folder_tree`].
const MAX_FILES_PER_DIR: usize = 5;

/// Describe an existing filing tree as prompt context.
///
/// Walks `base_dir` up to `max_depth` directory levels deep and lists each
/// folder with its file count and a few example filenames, so suggestions
/// land in folders that already exist rather than inventing new categories.
/// Output is deterministic (folders and files sorted); pass it as the
/// `context` argument of [`build_prompt`].
///
/// # Errors
/// Fails with the mapped I/O error when `base_dir` cannot be read.
pub fn describe_folder_tree(base_dir: &Path, max_depth: usize) -> Result<String, FilerError> {
    let mut folders: BTreeMap<String, Vec<String>> = BTreeMap::new();
    collect_files(base_dir, base_dir, max_depth, &mut folders)?;

    if folders.is_empty() {
        return Ok("Empty folder structure - no context available.".to_string());
    }

    let mut lines = vec!["Folder Structure:".to_string(), "=".repeat(50)];
    for (folder, files) in &folders {
        lines.push(String::new());
        lines.push(format!("{folder}/"));
        lines.push(format!("  ({} files)", files.len()));
        for file in files.iter().take(MAX_FILES_PER_DIR) {
            lines.push(format!("  - {file}"));
        }
        if files.len() > MAX_FILES_PER_DIR {
            lines.push(format!("  ... and {} more", files.len() - MAX_FILES_PER_DIR));
        }
    }
    Ok(lines.join("\n"))
}

/// Group filenames by their folder path relative to `base` ("root" for the
/// top level), descending at most `depth_left` further directory levels.
fn collect_files(
    base: &Path,
    dir: &Path,
    depth_left: usize,
    folders: &mut BTreeMap<String, Vec<String>>,
) -> Result<(), FilerError> {
    let entries = std::fs::read_dir(dir).map_err(|e| FilerError::from_io(dir, e))?;
    let mut paths: Vec<PathBuf> = entries.filter_map(|e| e.ok()).map(|e| e.path()).collect();
    paths.sort();

    for path in paths {
        if path.is_dir() {
            if depth_left > 0 {
                collect_files(base, &path, depth_left - 1, folders)?;
            }
        } else if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            let folder = path
                .parent()
                .and_then(|p| p.strip_prefix(base).ok())
                .filter(|rel| !rel.as_os_str().is_empty())
                .map(|rel| rel.to_string_lossy().replace('\\', "/"))
                .unwrap_or_else(|| "root".to_string());
            folders.entry(folder).or_default().push(name.to_string());
        }
    }
    Ok(())
}
