//! # Statistics Collection Module
//!
//! Questo modulo raccoglie gli esiti per-file e produce il report finale.
//!
//! ## Responsabilità:
//! - Accumula un `FileOutcome` per ogni job processato (append-only)
//! - Thread-safe: i worker registrano gli esiti concorrentemente
//! - Produce il report `stats.json` con chiave il path assoluto di input
//! - Calcola le statistiche aggregate per il riepilogo finale
//! - Verifica di integrità a fine run: il conteggio dei file regolari sotto
//!   input e output deve coincidere (un output per ogni input, niente perso,
//!   niente creato)
//!
//! ## Esiti tracciati:
//! - `Copied`: formato sconosciuto, copia verbatim
//! - `Compressed`: transcodifica riuscita e mantenuta
//! - `RevertedToCopy`: transcodifica riuscita ma più grande dell'originale,
//!   policy `copy_if_larger` ripristina i byte originali
//! - `FailedFallback`: transcodifica fallita (errore o timeout), copiato
//!   l'originale
//!
//! ## Esempio di record nel report:
//! ```json
//! {
//!   "/path/to/in/photo.png": {
//!     "in_size": 1048576,
//!     "out_size": 524288,
//!     "compression_ratio": 2.0,
//!     "status": "Compressed"
//!   }
//! }
//! ```

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use walkdir::WalkDir;

use crate::error::CompressError;
use crate::utils::format_size;

/// Outcome class of a single file job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutcomeStatus {
    Copied,
    Compressed,
    RevertedToCopy,
    FailedFallback,
}

/// Recorded result of one file job, immutable after creation
#[derive(Debug, Clone)]
pub struct FileOutcome {
    pub input_path: PathBuf,
    pub input_size: u64,
    /// Final output path, possibly revised by revert/fallback
    pub output_path: PathBuf,
    pub output_size: u64,
    pub status: OutcomeStatus,
}

/// Per-file entry of the serialized report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRecord {
    pub in_size: u64,
    pub out_size: u64,
    pub compression_ratio: f64,
    pub status: OutcomeStatus,
}

/// Final report, keyed by absolute input path
#[derive(Debug, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunReport {
    pub files: BTreeMap<String, FileRecord>,
}

impl RunReport {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Aggregate counters for the final log line
#[derive(Debug, Default, Clone)]
pub struct RunSummary {
    pub files_processed: usize,
    pub compressed: usize,
    pub copied: usize,
    pub reverted: usize,
    pub fallbacks: usize,
    pub errors: usize,
    pub total_input_bytes: u64,
    pub total_output_bytes: u64,
}

impl RunSummary {
    pub fn bytes_saved(&self) -> u64 {
        self.total_input_bytes.saturating_sub(self.total_output_bytes)
    }

    pub fn overall_reduction_percent(&self) -> f64 {
        if self.total_input_bytes > 0 {
            (self.bytes_saved() as f64 / self.total_input_bytes as f64) * 100.0
        } else {
            0.0
        }
    }

    pub fn format_summary(&self) -> String {
        format!(
            "Processed: {} files | Compressed: {} | Copied: {} | Reverted: {} | Fallbacks: {} | Errors: {} | Total saved: {} ({:.2}%)",
            self.files_processed,
            self.compressed,
            self.copied,
            self.reverted,
            self.fallbacks,
            self.errors,
            format_size(self.bytes_saved()),
            self.overall_reduction_percent()
        )
    }
}

#[derive(Default)]
struct CollectorState {
    outcomes: Vec<FileOutcome>,
    errors: usize,
}

/// Accumulates file outcomes for the run's lifetime.
///
/// The outcome set is the only shared mutable resource of a run; a mutation
/// lock keeps it safe under concurrent producers. Order is irrelevant.
#[derive(Default)]
pub struct StatsCollector {
    state: Mutex<CollectorState>,
}

impl StatsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one outcome to the run's set
    pub fn record(&self, outcome: FileOutcome) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.outcomes.push(outcome);
    }

    /// Count a job that could not produce any outcome (I/O failure even in
    /// the fallback path). Surfaces in the summary and, ultimately, in the
    /// integrity check.
    pub fn record_error(&self) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.errors += 1;
    }

    /// Build the serializable report, keyed by absolute input path
    pub fn report(&self) -> RunReport {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let files = state
            .outcomes
            .iter()
            .map(|outcome| {
                let ratio = if outcome.output_size > 0 {
                    outcome.input_size as f64 / outcome.output_size as f64
                } else {
                    0.0
                };
                (
                    outcome.input_path.to_string_lossy().into_owned(),
                    FileRecord {
                        in_size: outcome.input_size,
                        out_size: outcome.output_size,
                        compression_ratio: ratio,
                        status: outcome.status,
                    },
                )
            })
            .collect();
        RunReport { files }
    }

    /// Aggregate counters across the recorded outcomes
    pub fn summary(&self) -> RunSummary {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let mut summary = RunSummary {
            files_processed: state.outcomes.len() + state.errors,
            errors: state.errors,
            ..Default::default()
        };

        for outcome in &state.outcomes {
            match outcome.status {
                OutcomeStatus::Compressed => summary.compressed += 1,
                OutcomeStatus::Copied => summary.copied += 1,
                OutcomeStatus::RevertedToCopy => summary.reverted += 1,
                OutcomeStatus::FailedFallback => summary.fallbacks += 1,
            }
            summary.total_input_bytes += outcome.input_size;
            summary.total_output_bytes += outcome.output_size;
        }

        summary
    }

    /// Number of outcomes recorded so far
    pub fn len(&self) -> usize {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Count the regular files under a root, recursively
pub fn count_files(root: &Path) -> usize {
    WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .count()
}

/// Post-run integrity check: for every input file there must be exactly one
/// output file, with zero net creation or loss.
pub fn verify_integrity(input_root: &Path, output_data_root: &Path) -> Result<(), CompressError> {
    let input_count = count_files(input_root);
    let output_count = count_files(output_data_root);

    if input_count != output_count {
        return Err(CompressError::Integrity {
            input_count,
            output_count,
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn outcome(name: &str, in_size: u64, out_size: u64, status: OutcomeStatus) -> FileOutcome {
        FileOutcome {
            input_path: PathBuf::from(format!("/in/{}", name)),
            input_size: in_size,
            output_path: PathBuf::from(format!("/out/{}", name)),
            output_size: out_size,
            status,
        }
    }

    #[test]
    fn test_report_is_keyed_by_input_path_with_ratio() {
        let collector = StatsCollector::new();
        collector.record(outcome("a.png", 1000, 500, OutcomeStatus::Compressed));
        collector.record(outcome("b.xyz", 10, 10, OutcomeStatus::Copied));

        let report = collector.report();
        assert_eq!(report.files.len(), 2);

        let a = &report.files["/in/a.png"];
        assert_eq!(a.in_size, 1000);
        assert_eq!(a.out_size, 500);
        assert!((a.compression_ratio - 2.0).abs() < f64::EPSILON);
        assert_eq!(a.status, OutcomeStatus::Compressed);

        let b = &report.files["/in/b.xyz"];
        assert!((b.compression_ratio - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_zero_output_size_does_not_divide_by_zero() {
        let collector = StatsCollector::new();
        collector.record(outcome("empty.bin", 0, 0, OutcomeStatus::Copied));
        let report = collector.report();
        assert_eq!(report.files["/in/empty.bin"].compression_ratio, 0.0);
    }

    #[test]
    fn test_summary_counters() {
        let collector = StatsCollector::new();
        collector.record(outcome("a.png", 1000, 400, OutcomeStatus::Compressed));
        collector.record(outcome("b.png", 100, 100, OutcomeStatus::RevertedToCopy));
        collector.record(outcome("c.xyz", 50, 50, OutcomeStatus::Copied));
        collector.record(outcome("d.mov", 2000, 2000, OutcomeStatus::FailedFallback));
        collector.record_error();

        let summary = collector.summary();
        assert_eq!(summary.files_processed, 5);
        assert_eq!(summary.compressed, 1);
        assert_eq!(summary.reverted, 1);
        assert_eq!(summary.copied, 1);
        assert_eq!(summary.fallbacks, 1);
        assert_eq!(summary.errors, 1);
        assert_eq!(summary.bytes_saved(), 600);
    }

    #[test]
    fn test_concurrent_recording() {
        use std::sync::Arc;

        let collector = Arc::new(StatsCollector::new());
        let mut handles = Vec::new();
        for i in 0..8 {
            let collector = Arc::clone(&collector);
            handles.push(std::thread::spawn(move || {
                for j in 0..50 {
                    collector.record(outcome(
                        &format!("{}-{}.png", i, j),
                        100,
                        50,
                        OutcomeStatus::Compressed,
                    ));
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(collector.len(), 400);
    }

    #[test]
    fn test_verify_integrity_matches_counts() {
        let temp = TempDir::new().unwrap();
        let input = temp.path().join("in");
        let output = temp.path().join("out");
        fs::create_dir_all(input.join("sub")).unwrap();
        fs::create_dir_all(output.join("other")).unwrap();

        fs::write(input.join("a.png"), b"x").unwrap();
        fs::write(input.join("sub/b.xyz"), b"x").unwrap();
        fs::write(output.join("a.jpg"), b"x").unwrap();
        fs::write(output.join("other/b.xyz"), b"x").unwrap();

        assert!(verify_integrity(&input, &output).is_ok());

        fs::write(output.join("extra.jpg"), b"x").unwrap();
        let err = verify_integrity(&input, &output).unwrap_err();
        match err {
            CompressError::Integrity {
                input_count,
                output_count,
            } => {
                assert_eq!(input_count, 2);
                assert_eq!(output_count, 3);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_report_serializes_to_json() {
        let collector = StatsCollector::new();
        collector.record(outcome("a.png", 1000, 500, OutcomeStatus::Compressed));
        let json = collector.report().to_json().unwrap();
        assert!(json.contains("\"/in/a.png\""));
        assert!(json.contains("\"Compressed\""));
        assert!(json.contains("\"compression_ratio\": 2.0"));
    }
}
