//! # Run Orchestrator Module
//!
//! Questo è il modulo principale che coordina l'intero run di compressione.
//!
//! ## Responsabilità:
//! - Coordinamento di tutti gli altri moduli
//! - Gestione concorrenza con worker pool limitato da semaforo
//! - Orchestrazione del flusso: scaffold → plan → process → finalize
//! - Verifica dipendenze esterne richieste dal piano prima dell'avvio
//! - Cancellazione via Ctrl-C: niente nuovi job, quelli in volo terminano
//! - Report finale e verifica di integrità
//!
//! ## Flusso di esecuzione:
//! 1. **Validazione**: La config è già validata alla costruzione
//! 2. **Scaffold**: Crea il progetto timestamped e replica le directory
//! 3. **Planning**: Calcola tutte le coppie (input, output) con collision safety
//! 4. **Dependency check**: ffmpeg/dcraw solo se il piano li richiede
//! 5. **Parallel processing**: Distribuisce i job sul worker pool
//! 6. **Join barrier**: Attende che ogni job abbia prodotto il suo esito
//! 7. **Reporting**: Scrive `stats.json` e la copia della config risolta
//! 8. **Integrity check**: Conteggio file input == output
//!
//! ## Gestione errori:
//! - Errori di configurazione e scaffolding: fatali, prima di toccare file
//! - Errori per singolo file: assorbiti dal motore come `FailedFallback`
//! - Mismatch di integrità: riportato come fallimento finale, dopo che le
//!   statistiche sono state scritte
//!
//! ## Esempio:
//! ```rust,ignore
//! let compressor = BulkCompressor::new(config, true)?;
//! let layout = compressor.run().await?;
//! ```

use anyhow::Result;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Semaphore};
use tracing::{error, info, warn};

use crate::config::Config;
use crate::dtype::MediaCategory;
use crate::engine::CompressionEngine;
use crate::planner;
use crate::progress::ProgressManager;
use crate::project::{self, ProjectLayout};
use crate::stats::{self, OutcomeStatus, RunSummary, StatsCollector};
use crate::transcoder::CodecRegistry;
use crate::utils::format_size;

/// Main orchestrator for a bulk compression run
pub struct BulkCompressor {
    config: Config,
    show_progress: bool,
}

impl BulkCompressor {
    /// Create a new orchestrator. Validation failures abort here, before any
    /// filesystem mutation.
    pub fn new(config: Config, show_progress: bool) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            show_progress,
        })
    }

    /// Run the whole pipeline: scaffold, plan, process, finalize
    pub async fn run(&self) -> Result<ProjectLayout> {
        let input_root = self.config.resolved_in_path().canonicalize()?;
        info!("Starting bulk compression of: {}", input_root.display());
        info!(
            "🎯 Output rules: image -> {} ({}), video -> {} ({})",
            self.config.image_rule().fmt,
            self.config.image_rule().ext,
            self.config.video_rule().fmt,
            self.config.video_rule().ext
        );
        if self.config.copy_if_larger {
            info!("↩️  Policy: revert to original bytes when compression grows a file");
        }
        if self.config.apply_snake_case {
            info!("🐍 Policy: output names normalized to snake_case");
        }
        info!("👷 Workers: {}", self.config.workers);

        // Scaffolding completes fully before any job starts: jobs assume
        // their target directories already exist
        let layout = project::scaffold(&input_root, self.config.apply_snake_case)?;
        info!("📁 Project directory: {}", layout.project_root.display());

        let jobs = planner::plan(
            &input_root,
            &layout.data_root,
            self.config.image_rule(),
            self.config.video_rule(),
            self.config.apply_snake_case,
        )?;
        info!("Found {} files to process", jobs.len());

        let needs_ffmpeg = jobs
            .iter()
            .any(|j| j.input_descriptor.category == MediaCategory::Video);
        let needs_dcraw = jobs
            .iter()
            .any(|j| j.input_descriptor.category == MediaCategory::ImageRaw);
        CodecRegistry::check_dependencies(needs_ffmpeg, needs_dcraw).await?;

        let registry = Arc::new(CodecRegistry::new(
            self.config.image_rule().clone(),
            self.config.video_rule().clone(),
        ));
        let engine = Arc::new(CompressionEngine::new(
            registry,
            self.config.compress_params.clone(),
            self.config.copy_if_larger,
            Duration::from_secs(self.config.image_timeout_secs),
            Duration::from_secs(self.config.video_timeout_secs),
        ));
        let collector = Arc::new(StatsCollector::new());
        let progress = ProgressManager::new(jobs.len() as u64, self.show_progress);

        // Operator interrupt stops scheduling; in-flight jobs drain normally
        let (cancel_tx, cancel_rx) = watch::channel(false);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                let _ = cancel_tx.send(true);
            }
        });

        let semaphore = Arc::new(Semaphore::new(self.config.workers));
        let total_jobs = jobs.len();
        let mut scheduled = 0usize;
        let mut tasks = Vec::with_capacity(total_jobs);

        for job in jobs {
            if *cancel_rx.borrow() {
                warn!("Cancellation requested, not scheduling remaining jobs");
                break;
            }
            scheduled += 1;

            let permit = semaphore.clone().acquire_owned().await?;
            let engine = Arc::clone(&engine);
            let collector = Arc::clone(&collector);
            let progress = progress.clone();

            tasks.push(tokio::spawn(async move {
                let _permit = permit; // Keep permit alive

                let name = job
                    .input_path
                    .file_name()
                    .unwrap_or_default()
                    .to_string_lossy()
                    .into_owned();

                match engine.process(&job).await {
                    Ok(outcome) => {
                        let message = match outcome.status {
                            OutcomeStatus::Compressed => {
                                let saved = if outcome.input_size > 0 {
                                    100.0
                                        * (1.0
                                            - outcome.output_size as f64
                                                / outcome.input_size as f64)
                                } else {
                                    0.0
                                };
                                format!("✅ {}: {:.1}% saved", name, saved)
                            }
                            OutcomeStatus::Copied => format!("📄 {}: copied", name),
                            OutcomeStatus::RevertedToCopy => {
                                format!("⏩ {}: kept original", name)
                            }
                            OutcomeStatus::FailedFallback => {
                                format!("❌ {}: fallback copy", name)
                            }
                        };
                        collector.record(outcome);
                        progress.update(&message);
                    }
                    Err(e) => {
                        error!("Failed to process {}: {}", name, e);
                        collector.record_error();
                        progress.update(&format!("❌ {}: error", name));
                    }
                }
            }));
        }

        // Join barrier: the report is finalized only after every scheduled
        // job has produced exactly one outcome
        for join_result in join_all(tasks).await {
            if let Err(e) = join_result {
                error!("Worker task failed: {}", e);
                collector.record_error();
            }
        }
        let cancelled = *cancel_rx.borrow();

        let summary = collector.summary();
        progress.finish(&summary.format_summary());

        // Statistics and the resolved config are written even on a cancelled
        // or inconsistent run
        let stats_path = layout.summary_root.join("stats.json");
        tokio::fs::write(&stats_path, collector.report().to_json()?).await?;
        self.config
            .save_to_file(&layout.summary_root.join("config.yml"))
            .await?;
        info!("Report written to {}", stats_path.display());

        self.log_final_summary(&summary);

        if cancelled {
            warn!(
                "Run cancelled: {} of {} jobs scheduled, skipping integrity check",
                scheduled, total_jobs
            );
            return Err(anyhow::anyhow!("Run cancelled by operator"));
        }

        stats::verify_integrity(&input_root, &layout.data_root)?;
        info!("Integrity check passed: one output file per input file");

        Ok(layout)
    }

    fn log_final_summary(&self, summary: &RunSummary) {
        info!("=== Compression Complete ===");
        info!("Files processed: {}", summary.files_processed);
        info!(
            "Compressed: {} | Copied: {} | Reverted: {} | Fallbacks: {} | Errors: {}",
            summary.compressed,
            summary.copied,
            summary.reverted,
            summary.fallbacks,
            summary.errors
        );
        info!("Total input size: {}", format_size(summary.total_input_bytes));
        info!("Total output size: {}", format_size(summary.total_output_bytes));
        info!(
            "Bytes saved: {} ({:.2}%)",
            format_size(summary.bytes_saved()),
            summary.overall_reduction_percent()
        );
    }
}
