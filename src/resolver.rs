//! Destination resolution: turn a suggested name + directory into a safe,
//! collision-free filesystem change.
//!
//! ## Trust model
//!
//! Suggested names come from a network service and are treated as hostile
//! input: filenames are stripped of path separators, destinations are
//! rejected outright when any segment is `..` or the resolved path escapes
//! the base directory. Sanitisation failures are errors, never silent fixes
//! that would move a file somewhere the user did not review.
//!
//! ## Collision policy
//!
//! An occupied target gets a numeric disambiguator before the extension
//! (`name (1).ext`, `name (2).ext`, …). Resolution is a pure function of the
//! directory state, so repeated calls without an intervening change yield the
//! same name. The check-then-relocate sequence is serialized per destination
//! directory, never globally, so two documents filed into the same folder
//! cannot race each other into an overwrite while unrelated folders proceed
//! in parallel.

use crate::error::FilerError;
use crate::output::{FileOperation, FilingOutcome, FilingResult};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Computes safe target paths under a base directory and performs the
/// rename/move.
///
/// The resolver is stateless apart from its per-directory lock map, so one
/// instance can serve documents filed under different base directories.
pub struct DestinationResolver {
    max_attempts: u32,
    /// One async mutex per destination directory, created on first use.
    dir_locks: std::sync::Mutex<HashMap<PathBuf, Arc<tokio::sync::Mutex<()>>>>,
}

impl DestinationResolver {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            dir_locks: std::sync::Mutex::new(HashMap::new()),
        }
    }

    /// Strip path separators from a suggested filename.
    ///
    /// # Errors
    /// [`FilerError::InvalidName`] when nothing usable remains, or when the
    /// result is a relative-directory name (`.`/`..`).
    pub fn sanitize_filename(&self, suggested: &str) -> Result<String, FilerError> {
        let cleaned: String = suggested
            .chars()
            .filter(|c| !matches!(c, '/' | '\\' | '\0'))
            .collect();
        let cleaned = cleaned.trim().to_string();

        if cleaned.is_empty() || cleaned == "." || cleaned == ".." {
            return Err(FilerError::InvalidName {
                suggested: suggested.to_string(),
            });
        }
        Ok(cleaned)
    }

    /// Validate a suggested relative destination directory against `base_dir`.
    ///
    /// # Errors
    /// [`FilerError::PathTraversal`] for `..` segments, absolute paths, or
    /// anything else that would resolve outside the base directory.
    pub fn sanitize_destination(
        &self,
        base_dir: &Path,
        suggested: &str,
    ) -> Result<PathBuf, FilerError> {
        let traversal = || FilerError::PathTraversal {
            suggested: suggested.to_string(),
        };

        if suggested.starts_with('/') || suggested.starts_with('\\') {
            return Err(traversal());
        }

        let mut rel = PathBuf::new();
        for seg in suggested.split(['/', '\\']) {
            match seg {
                "" | "." => continue,
                ".." => return Err(traversal()),
                s => rel.push(s),
            }
        }

        // Belt-and-braces: the joined path must still sit under base_dir.
        let joined = base_dir.join(&rel);
        if !joined.starts_with(base_dir) {
            return Err(traversal());
        }
        Ok(rel)
    }

    /// Compute the absolute, collision-free target for a suggestion.
    ///
    /// Pure with respect to the filesystem: reads directory state, never
    /// writes. A target that exists but *is* the source file is not a
    /// collision (re-filing a file onto itself stays a no-op).
    ///
    /// # Errors
    /// [`FilerError::InvalidName`], [`FilerError::PathTraversal`], or
    /// [`FilerError::DestinationConflict`] when disambiguation exhausts
    /// the attempt limit.
    pub fn resolve(
        &self,
        source: &Path,
        suggested_filename: &str,
        suggested_dir: &str,
        base_dir: &Path,
    ) -> Result<PathBuf, FilerError> {
        let filename = self.sanitize_filename(suggested_filename)?;
        let rel_dir = self.sanitize_destination(base_dir, suggested_dir)?;
        let dest_dir = base_dir.join(rel_dir);

        self.disambiguate(source, &dest_dir, &filename)
    }

    /// Find the first free name for `filename` inside `dest_dir`.
    fn disambiguate(
        &self,
        source: &Path,
        dest_dir: &Path,
        filename: &str,
    ) -> Result<PathBuf, FilerError> {
        let candidate = dest_dir.join(filename);
        if is_free(&candidate, source) {
            return Ok(candidate);
        }

        let stem = Path::new(filename)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(filename);
        let ext = Path::new(filename).extension().and_then(|e| e.to_str());

        for n in 1..=self.max_attempts {
            let name = match ext {
                Some(ext) => format!("{stem} ({n}).{ext}"),
                None => format!("{stem} ({n})"),
            };
            let candidate = dest_dir.join(name);
            if is_free(&candidate, source) {
                debug!("Disambiguated '{}' -> '{}'", filename, candidate.display());
                return Ok(candidate);
            }
        }

        Err(FilerError::DestinationConflict {
            dir: dest_dir.to_path_buf(),
            filename: filename.to_string(),
            attempts: self.max_attempts,
        })
    }

    /// Perform the relocation, serialized per destination directory.
    ///
    /// If `target` got occupied between resolution and this call, the name is
    /// re-disambiguated under the directory lock instead of overwriting. The
    /// returned [`FilingResult`] carries the final target path.
    ///
    /// `Rename` requires `target` to share the source's parent and creates no
    /// directories. `Move` creates missing intermediate directories first;
    /// the file is guaranteed to remain at `source` if relocation fails.
    pub async fn apply(
        &self,
        source: &Path,
        target: &Path,
        mode: FileOperation,
    ) -> Result<FilingResult, FilerError> {
        let dest_dir = target
            .parent()
            .ok_or_else(|| FilerError::Internal("target path has no parent".into()))?
            .to_path_buf();

        match mode {
            FileOperation::Rename => {
                if source.parent() != Some(dest_dir.as_path()) {
                    return Err(FilerError::Internal(
                        "rename must keep the file in its current directory".into(),
                    ));
                }
            }
            FileOperation::Move => {}
            FileOperation::Skipped => {
                // Explicit no-op: reviewed and left in place.
                return Ok(FilingResult {
                    source: source.to_path_buf(),
                    target: source.to_path_buf(),
                    operation: FileOperation::Skipped,
                    outcome: FilingOutcome::Success,
                });
            }
        }

        let lock = self.lock_for(&dest_dir);
        let _guard = lock.lock().await;

        if !source.exists() {
            return Err(FilerError::SourceNotFound {
                path: source.to_path_buf(),
            });
        }

        if mode == FileOperation::Move {
            tokio::fs::create_dir_all(&dest_dir)
                .await
                .map_err(|e| FilerError::from_io(&dest_dir, e))?;
        }

        // Re-check under the lock; a concurrent filing may have taken the name.
        let filename = target
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| FilerError::Internal("target path has no filename".into()))?;
        let final_target = self.disambiguate(source, &dest_dir, filename)?;

        relocate(source, &final_target).await?;
        info!(
            "{:?}: {} -> {}",
            mode,
            source.display(),
            final_target.display()
        );

        Ok(FilingResult {
            source: source.to_path_buf(),
            target: final_target,
            operation: mode,
            outcome: FilingOutcome::Success,
        })
    }

    /// Resolve and relocate in one step.
    pub async fn resolve_and_apply(
        &self,
        source: &Path,
        suggested_filename: &str,
        suggested_dir: &str,
        base_dir: &Path,
        mode: FileOperation,
    ) -> Result<FilingResult, FilerError> {
        let target = self.resolve(source, suggested_filename, suggested_dir, base_dir)?;
        self.apply(source, &target, mode).await
    }

    fn lock_for(&self, dir: &Path) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self
            .dir_locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(
            locks
                .entry(dir.to_path_buf())
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(()))),
        )
    }
}

impl Default for DestinationResolver {
    fn default() -> Self {
        Self::new(1000)
    }
}

/// True when `candidate` is unoccupied, or occupied by the source file itself.
fn is_free(candidate: &Path, source: &Path) -> bool {
    if !candidate.exists() {
        return true;
    }
    match (std::fs::canonicalize(candidate), std::fs::canonicalize(source)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Relocate `source` to `target`: atomic rename where the filesystem
/// supports it, copy-then-verify-then-delete across devices.
///
/// The source is never removed until the copy is verified complete, so a
/// failure at any point leaves the original file in place.
async fn relocate(source: &Path, target: &Path) -> Result<(), FilerError> {
    match tokio::fs::rename(source, target).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::CrossesDevices => {
            copy_then_delete(source, target).await
        }
        Err(e) => Err(FilerError::from_io(source, e)),
    }
}

async fn copy_then_delete(source: &Path, target: &Path) -> Result<(), FilerError> {
    let expected = tokio::fs::metadata(source)
        .await
        .map_err(|e| FilerError::from_io(source, e))?
        .len();

    let copied = match tokio::fs::copy(source, target).await {
        Ok(n) => n,
        Err(e) => {
            let _ = tokio::fs::remove_file(target).await;
            return Err(FilerError::from_io(source, e));
        }
    };
    if copied != expected {
        let _ = tokio::fs::remove_file(target).await;
        return Err(FilerError::Internal(format!(
            "incomplete copy: {copied} of {expected} bytes for {}",
            source.display()
        )));
    }

    tokio::fs::remove_file(source)
        .await
        .map_err(|e| FilerError::from_io(source, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_filename_strips_separators() {
        let r = DestinationResolver::default();
        assert_eq!(r.sanitize_filename("a/b\\c.pdf").unwrap(), "abc.pdf");
        assert_eq!(r.sanitize_filename("  bill.pdf  ").unwrap(), "bill.pdf");
    }

    #[test]
    fn sanitize_filename_rejects_empty_and_dot_names() {
        let r = DestinationResolver::default();
        for bad in ["", "   ", "/", "\\//\\", "..", "."] {
            assert!(
                matches!(r.sanitize_filename(bad), Err(FilerError::InvalidName { .. })),
                "expected InvalidName for {bad:?}"
            );
        }
    }

    #[test]
    fn sanitize_destination_rejects_traversal() {
        let r = DestinationResolver::default();
        let base = Path::new("/archive");
        for bad in ["../../etc", "a/../../b", "..", "/etc", "\\windows"] {
            assert!(
                matches!(
                    r.sanitize_destination(base, bad),
                    Err(FilerError::PathTraversal { .. })
                ),
                "expected PathTraversal for {bad:?}"
            );
        }
    }

    #[test]
    fn sanitize_destination_normalises_benign_segments() {
        let r = DestinationResolver::default();
        let base = Path::new("/archive");
        assert_eq!(
            r.sanitize_destination(base, "Finances//Bills/./2024").unwrap(),
            PathBuf::from("Finances/Bills/2024")
        );
        assert_eq!(r.sanitize_destination(base, "").unwrap(), PathBuf::new());
    }

    #[test]
    fn resolve_without_collision_is_exact() {
        let dir = tempfile::tempdir().unwrap();
        let r = DestinationResolver::default();
        let source = dir.path().join("in.pdf");
        std::fs::write(&source, b"x").unwrap();

        let target = r
            .resolve(&source, "bill.pdf", "Finances/Bills", dir.path())
            .unwrap();
        assert_eq!(target, dir.path().join("Finances/Bills/bill.pdf"));
    }

    #[test]
    fn resolve_disambiguates_on_collision() {
        let dir = tempfile::tempdir().unwrap();
        let r = DestinationResolver::default();
        let source = dir.path().join("in.pdf");
        std::fs::write(&source, b"x").unwrap();

        let dest = dir.path().join("Bills");
        std::fs::create_dir_all(&dest).unwrap();
        std::fs::write(dest.join("a.pdf"), b"occupied").unwrap();
        std::fs::write(dest.join("a (1).pdf"), b"also occupied").unwrap();

        let target = r.resolve(&source, "a.pdf", "Bills", dir.path()).unwrap();
        assert_eq!(target, dest.join("a (2).pdf"));
    }

    #[test]
    fn resolve_is_idempotent_for_fixed_directory_state() {
        let dir = tempfile::tempdir().unwrap();
        let r = DestinationResolver::default();
        let source = dir.path().join("in.pdf");
        std::fs::write(&source, b"x").unwrap();
        std::fs::write(dir.path().join("a.pdf"), b"occupied").unwrap();

        let first = r.resolve(&source, "a.pdf", "", dir.path()).unwrap();
        let second = r.resolve(&source, "a.pdf", "", dir.path()).unwrap();
        assert_eq!(first, second);
        assert_eq!(first, dir.path().join("a (1).pdf"));
    }

    #[test]
    fn resolving_onto_the_source_itself_is_not_a_collision() {
        let dir = tempfile::tempdir().unwrap();
        let r = DestinationResolver::default();
        let source = dir.path().join("bill.pdf");
        std::fs::write(&source, b"x").unwrap();

        let target = r.resolve(&source, "bill.pdf", "", dir.path()).unwrap();
        assert_eq!(target, source);
    }

    #[test]
    fn exhausted_disambiguation_is_destination_conflict() {
        let dir = tempfile::tempdir().unwrap();
        let r = DestinationResolver::new(2);
        let source = dir.path().join("in.pdf");
        std::fs::write(&source, b"x").unwrap();
        std::fs::write(dir.path().join("a.pdf"), b"0").unwrap();
        std::fs::write(dir.path().join("a (1).pdf"), b"1").unwrap();
        std::fs::write(dir.path().join("a (2).pdf"), b"2").unwrap();

        let err = r.resolve(&source, "a.pdf", "", dir.path()).unwrap_err();
        assert!(matches!(
            err,
            FilerError::DestinationConflict { attempts: 2, .. }
        ));
    }

    #[test]
    fn traversal_resolve_performs_no_mutation() {
        let dir = tempfile::tempdir().unwrap();
        let r = DestinationResolver::default();
        let source = dir.path().join("in.pdf");
        std::fs::write(&source, b"x").unwrap();

        let before = std::fs::read_dir(dir.path()).unwrap().count();
        let err = r
            .resolve(&source, "in.pdf", "../../etc", dir.path())
            .unwrap_err();
        assert!(matches!(err, FilerError::PathTraversal { .. }));
        let after = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn move_creates_directories_and_relocates() {
        let dir = tempfile::tempdir().unwrap();
        let r = DestinationResolver::default();
        let source = dir.path().join("a.pdf");
        std::fs::write(&source, b"contents").unwrap();

        let target = dir.path().join("out/bills/a.pdf");
        let result = r.apply(&source, &target, FileOperation::Move).await.unwrap();

        assert!(result.is_success());
        assert_eq!(result.target, target);
        assert!(target.exists());
        assert!(!source.exists());
        assert_eq!(std::fs::read(&target).unwrap(), b"contents");
    }

    #[tokio::test]
    async fn rename_refuses_to_change_directory() {
        let dir = tempfile::tempdir().unwrap();
        let r = DestinationResolver::default();
        let source = dir.path().join("a.pdf");
        std::fs::write(&source, b"x").unwrap();

        let target = dir.path().join("elsewhere/b.pdf");
        let err = r.apply(&source, &target, FileOperation::Rename).await;
        assert!(err.is_err());
        assert!(source.exists(), "failed rename must leave the source intact");
    }

    #[tokio::test]
    async fn rename_in_place_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let r = DestinationResolver::default();
        let source = dir.path().join("scan001.pdf");
        std::fs::write(&source, b"x").unwrap();

        let target = dir.path().join("20240101 Bill.pdf");
        let result = r
            .apply(&source, &target, FileOperation::Rename)
            .await
            .unwrap();
        assert!(result.is_success());
        assert!(target.exists());
        assert!(!source.exists());
    }

    #[tokio::test]
    async fn skipped_is_a_successful_noop() {
        let dir = tempfile::tempdir().unwrap();
        let r = DestinationResolver::default();
        let source = dir.path().join("a.pdf");
        std::fs::write(&source, b"x").unwrap();

        let result = r
            .apply(&source, &source, FileOperation::Skipped)
            .await
            .unwrap();
        assert!(result.is_success());
        assert_eq!(result.operation, FileOperation::Skipped);
        assert_eq!(result.target, source);
        assert!(source.exists());
    }

    #[tokio::test]
    async fn vanished_source_is_source_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let r = DestinationResolver::default();
        let source = dir.path().join("gone.pdf");
        let target = dir.path().join("out/gone.pdf");

        let err = r
            .apply(&source, &target, FileOperation::Move)
            .await
            .unwrap_err();
        assert!(matches!(err, FilerError::SourceNotFound { .. }));
    }

    #[tokio::test]
    async fn second_move_with_same_name_disambiguates_not_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let r = DestinationResolver::default();
        let s1 = dir.path().join("first.pdf");
        let s2 = dir.path().join("second.pdf");
        std::fs::write(&s1, b"first").unwrap();
        std::fs::write(&s2, b"second").unwrap();

        let r1 = r
            .resolve_and_apply(&s1, "a.pdf", "bills", dir.path(), FileOperation::Move)
            .await
            .unwrap();
        let r2 = r
            .resolve_and_apply(&s2, "a.pdf", "bills", dir.path(), FileOperation::Move)
            .await
            .unwrap();

        assert_eq!(r1.target, dir.path().join("bills/a.pdf"));
        assert_eq!(r2.target, dir.path().join("bills/a (1).pdf"));
        assert_eq!(std::fs::read(&r1.target).unwrap(), b"first");
        assert_eq!(std::fs::read(&r2.target).unwrap(), b"second");
    }

    #[tokio::test]
    async fn concurrent_moves_into_one_directory_never_collide() {
        let dir = tempfile::tempdir().unwrap();
        let r = Arc::new(DestinationResolver::default());

        let mut handles = Vec::new();
        for i in 0..8 {
            let r = Arc::clone(&r);
            let base = dir.path().to_path_buf();
            let source = base.join(format!("src{i}.pdf"));
            std::fs::write(&source, format!("doc {i}")).unwrap();
            handles.push(tokio::spawn(async move {
                r.resolve_and_apply(&source, "report.pdf", "archive", &base, FileOperation::Move)
                    .await
                    .unwrap()
            }));
        }

        let mut targets = Vec::new();
        for h in handles {
            targets.push(h.await.unwrap().target);
        }
        targets.sort();
        targets.dedup();
        assert_eq!(targets.len(), 8, "every document must land on a unique name");
        for t in &targets {
            assert!(t.exists());
        }
    }
}
