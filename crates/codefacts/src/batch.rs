//! Batch extraction across many compilation units.
//!
//! Units are independent by construction, so extraction fans out across a
//! rayon worker pool. Determinism is preserved by buffering per-unit streams
//! and flushing them sequentially in input order: the concatenated output
//! for a fixed input list and classpath never depends on scheduling.
//!
//! A unit that fails (unreadable, syntax error) is logged and skipped; it
//! contributes no partial facts and does not abort the batch.

use std::fs;
use std::path::{Path, PathBuf};

use rayon::prelude::*;

use crate::classpath::TypeIndex;
use crate::emit::{emit_unit, FactSink};
use crate::extract::{extract_unit, UnitFacts};
use crate::Result;

/// Outcome counters for one batch run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchStats {
    /// Units successfully extracted
    pub extracted: usize,
    /// Units skipped after a read or extraction failure
    pub failed: usize,
    /// Total facts emitted across all extracted units
    pub facts: usize,
}

fn extract_path(path: &Path, index: &dyn TypeIndex) -> Result<UnitFacts> {
    let source = fs::read_to_string(path)?;
    extract_unit(&source, index)
}

/// Extract every file in `paths` and flush the streams to `sink` in input
/// order.
pub fn extract_paths(
    paths: &[PathBuf],
    index: &dyn TypeIndex,
    sink: &mut dyn FactSink,
) -> Result<BatchStats> {
    // Parallel extraction; collect preserves input order
    let results: Vec<(&PathBuf, Result<UnitFacts>)> = paths
        .par_iter()
        .map(|path| (path, extract_path(path, index)))
        .collect();

    // Sequential flush keeps the concatenated stream deterministic
    let mut stats = BatchStats::default();
    for (path, result) in results {
        match result {
            Ok(unit) => {
                stats.extracted += 1;
                stats.facts += unit.len();
                emit_unit(&unit.facts, sink)?;
            }
            Err(error) => {
                stats.failed += 1;
                tracing::warn!(path = %path.display(), %error, "skipping unit");
            }
        }
    }
    tracing::info!(
        extracted = stats.extracted,
        failed = stats.failed,
        facts = stats.facts,
        "batch extraction finished"
    );
    Ok(stats)
}

/// Extract in-memory sources (keyed by any label) in input order.
///
/// Mirrors [`extract_paths`] for callers that already hold the sources,
/// e.g. tests and pipeline stages reading from an object store.
pub fn extract_sources(
    sources: &[(String, String)],
    index: &dyn TypeIndex,
    sink: &mut dyn FactSink,
) -> Result<BatchStats> {
    let results: Vec<(&str, Result<UnitFacts>)> = sources
        .par_iter()
        .map(|(label, source)| (label.as_str(), extract_unit(source, index)))
        .collect();

    let mut stats = BatchStats::default();
    for (label, result) in results {
        match result {
            Ok(unit) => {
                stats.extracted += 1;
                stats.facts += unit.len();
                emit_unit(&unit.facts, sink)?;
            }
            Err(error) => {
                stats.failed += 1;
                tracing::warn!(unit = label, %error, "skipping unit");
            }
        }
    }
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classpath::InMemoryTypeIndex;
    use std::io::Write as _;

    fn write_file(dir: &tempfile::TempDir, name: &str, contents: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn batch_flushes_in_input_order() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_file(&dir, "A.java", "package p; class A {}");
        let b = write_file(&dir, "B.java", "package p; class B {}");
        let index = InMemoryTypeIndex::with_jdk_root();

        let mut lines: Vec<String> = Vec::new();
        let stats = extract_paths(&[a, b], &index, &mut lines).unwrap();
        assert_eq!(stats.extracted, 2);
        assert_eq!(stats.failed, 0);

        let a_pos = lines.iter().position(|l| l == "CLASS - p.A").unwrap();
        let b_pos = lines.iter().position(|l| l == "CLASS - p.B").unwrap();
        assert!(a_pos < b_pos);
    }

    #[test]
    fn failed_units_are_skipped_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let good = write_file(&dir, "Good.java", "package p; class Good {}");
        let bad = write_file(&dir, "Bad.java", "class Bad { void f( }");
        let missing = dir.path().join("Missing.java");
        let index = InMemoryTypeIndex::with_jdk_root();

        let mut lines: Vec<String> = Vec::new();
        let stats = extract_paths(&[bad, missing, good], &index, &mut lines).unwrap();
        assert_eq!(stats.extracted, 1);
        assert_eq!(stats.failed, 2);
        // The broken units left no partial facts behind
        assert!(lines.iter().all(|l| !l.contains("Bad")));
        assert!(lines.contains(&"CLASS - p.Good".to_string()));
    }

    #[test]
    fn repeated_runs_are_byte_identical() {
        let sources = vec![
            (
                "one".to_string(),
                "package p; class One { void f() { int x = 1; x++; } }".to_string(),
            ),
            (
                "two".to_string(),
                "package p; class Two extends One {}".to_string(),
            ),
        ];
        let index = InMemoryTypeIndex::with_jdk_root();

        let mut first: Vec<String> = Vec::new();
        extract_sources(&sources, &index, &mut first).unwrap();
        let mut second: Vec<String> = Vec::new();
        extract_sources(&sources, &index, &mut second).unwrap();
        assert_eq!(first, second);
        assert!(!first.is_empty());
    }

    #[test]
    fn stats_count_facts_across_units() {
        let sources = vec![
            ("a".to_string(), "package p; class A {}".to_string()),
            ("b".to_string(), "package p; class B {}".to_string()),
        ];
        let index = InMemoryTypeIndex::with_jdk_root();
        let mut lines: Vec<String> = Vec::new();
        let stats = extract_sources(&sources, &index, &mut lines).unwrap();
        assert_eq!(stats.facts, lines.len());
    }
}
