//! # Compression Engine Module
//!
//! Questo modulo contiene la logica di decisione per singolo file.
//!
//! ## Responsabilità:
//! - Dispatch di ogni job al transcoder della sua categoria, oppure copia
//!   verbatim per i formati sconosciuti
//! - Policy "don't grow the file": se la transcodifica non riduce la
//!   dimensione e `copy_if_larger` è attivo, l'artefatto viene scartato e
//!   vengono ripristinati i byte originali
//! - Fallback copy su qualsiasi errore di transcodifica o timeout: il
//!   fallimento non deve mai abortire il run
//! - Verifica indipendente dell'output: il motore controlla esistenza e
//!   dimensione dell'artefatto con una propria `metadata`, senza fidarsi del
//!   segnale di successo del codec
//!
//! ## Staging:
//! - La transcodifica scrive su un `NamedTempFile`; solo dopo la verifica
//!   l'artefatto viene promosso al path pianificato
//! - Su revert o fallback il path finale riprende l'estensione originale
//!   (lowercase) del file di input
//! - Esattamente un file sopravvive nell'albero di output per ogni job
//!
//! ## Timeout:
//! - Ogni job ha un timeout per categoria (immagini vs video)
//! - Allo scadere il job viene trattato come un fallimento di transcodifica
//!
//! ## Esempio:
//! ```rust,ignore
//! let engine = CompressionEngine::new(registry, params, true, image_t, video_t);
//! let outcome = engine.process(&job).await?;
//! ```

use anyhow::Result;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::NamedTempFile;
use tokio::task;
use tracing::{debug, warn};

use crate::config::CompressParams;
use crate::dtype::MediaCategory;
use crate::error::CompressError;
use crate::planner::FileJob;
use crate::stats::{FileOutcome, OutcomeStatus};
use crate::transcoder::TranscoderProvider;

/// Per-job compress-or-copy decision logic
pub struct CompressionEngine {
    registry: Arc<dyn TranscoderProvider>,
    params: CompressParams,
    revert_if_larger: bool,
    image_timeout: Duration,
    video_timeout: Duration,
}

impl CompressionEngine {
    pub fn new(
        registry: Arc<dyn TranscoderProvider>,
        params: CompressParams,
        revert_if_larger: bool,
        image_timeout: Duration,
        video_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            params,
            revert_if_larger,
            image_timeout,
            video_timeout,
        }
    }

    /// Process one job, producing exactly one output file and one outcome.
    ///
    /// Returns Err only when even the fallback copy cannot be written; codec
    /// errors and timeouts are absorbed into a `FailedFallback` outcome.
    pub async fn process(&self, job: &FileJob) -> Result<FileOutcome> {
        let input_size = tokio::fs::metadata(&job.input_path).await?.len();

        if job.input_descriptor.category == MediaCategory::Unknown {
            // Pure preservation copy, the planner already kept the original
            // (lower-cased) extension
            let output_size =
                tokio::fs::copy(&job.input_path, &job.planned_output_path).await?;
            debug!("Copied unknown format: {}", job.input_path.display());
            return Ok(FileOutcome {
                input_path: job.input_path.clone(),
                input_size,
                output_path: job.planned_output_path.clone(),
                output_size,
                status: OutcomeStatus::Copied,
            });
        }

        // Stage the transcoded artifact next to nothing: a temp file that
        // vanishes on drop, so a timed-out or failed transcode can never
        // leave a partial file in the output tree
        let staging = NamedTempFile::with_suffix(staging_suffix(&job.planned_output_path))?;
        let staging_path = staging.path().to_path_buf();

        let result = self.transcode(job, staging_path.clone()).await;

        let output_size = match result {
            Ok(reported) => match tokio::fs::metadata(&staging_path).await {
                Ok(meta) if meta.len() > 0 => {
                    if meta.len() != reported {
                        debug!(
                            "Transcoder reported {} bytes but artifact is {} bytes",
                            reported,
                            meta.len()
                        );
                    }
                    meta.len()
                }
                _ => {
                    return self
                        .fallback_copy(
                            job,
                            input_size,
                            CompressError::Transcode(format!(
                                "no artifact produced for {}",
                                job.input_path.display()
                            )),
                        )
                        .await
                }
            },
            Err(err) => return self.fallback_copy(job, input_size, err).await,
        };

        if self.revert_if_larger && output_size >= input_size {
            // Compression did not shrink the file: discard the artifact and
            // keep the original bytes under the original extension
            let revert_path = with_original_extension(&job.planned_output_path, &job.input_path);
            let copied = tokio::fs::copy(&job.input_path, &revert_path).await?;
            debug!(
                "Reverted to copy ({} -> {} bytes): {}",
                input_size,
                output_size,
                job.input_path.display()
            );
            return Ok(FileOutcome {
                input_path: job.input_path.clone(),
                input_size,
                output_path: revert_path,
                output_size: copied,
                status: OutcomeStatus::RevertedToCopy,
            });
        }

        tokio::fs::copy(&staging_path, &job.planned_output_path).await?;
        Ok(FileOutcome {
            input_path: job.input_path.clone(),
            input_size,
            output_path: job.planned_output_path.clone(),
            output_size,
            status: OutcomeStatus::Compressed,
        })
    }

    /// Run read + write on a blocking thread, bounded by the category timeout
    async fn transcode(&self, job: &FileJob, staging_path: PathBuf) -> Result<u64, CompressError> {
        let timeout = match job.input_descriptor.category {
            MediaCategory::Video => self.video_timeout,
            _ => self.image_timeout,
        };

        let registry = Arc::clone(&self.registry);
        let params = self.params.clone();
        let category = job.input_descriptor.category;
        let input_path = job.input_path.clone();

        let work = task::spawn_blocking(move || -> Result<u64, CompressError> {
            let transcoder = registry.transcoder_for(category).ok_or_else(|| {
                CompressError::Transcode(format!("no transcoder for category {:?}", category))
            })?;
            let handle = transcoder.read(&input_path)?;
            transcoder.write(handle, &staging_path, &params)
        });

        match tokio::time::timeout(timeout, work).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => Err(CompressError::Transcode(join_err.to_string())),
            Err(_) => Err(CompressError::Timeout),
        }
    }

    /// Failure path: remove any partial artifact and copy the original bytes
    async fn fallback_copy(
        &self,
        job: &FileJob,
        input_size: u64,
        err: CompressError,
    ) -> Result<FileOutcome> {
        warn!(
            "Transcoding failed for {}, falling back to copy: {}",
            job.input_path.display(),
            err
        );

        // The planned path should be untouched (staging is off-tree), but a
        // partial artifact must not survive under any circumstance
        let _ = tokio::fs::remove_file(&job.planned_output_path).await;

        let fallback_path = with_original_extension(&job.planned_output_path, &job.input_path);
        let output_size = tokio::fs::copy(&job.input_path, &fallback_path).await?;

        Ok(FileOutcome {
            input_path: job.input_path.clone(),
            input_size,
            output_path: fallback_path,
            output_size,
            status: OutcomeStatus::FailedFallback,
        })
    }
}

/// Temp-file suffix matching the planned extension, so tools that infer the
/// container format from the file name keep working
fn staging_suffix(planned: &Path) -> String {
    match planned.extension() {
        Some(ext) => format!(".{}", ext.to_string_lossy()),
        None => String::new(),
    }
}

/// Planned path with the input's original extension restored (lower-cased),
/// preserving any collision suffix in the stem
fn with_original_extension(planned: &Path, input: &Path) -> PathBuf {
    match input.extension() {
        Some(ext) => planned.with_extension(ext.to_string_lossy().to_lowercase()),
        None => planned.with_extension(""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dtype;
    use crate::transcoder::{MediaHandle, Transcoder};
    use std::fs;
    use tempfile::TempDir;

    enum MockBehavior {
        /// Write an artifact of the given size
        Produce(usize),
        /// Fail the write
        Fail,
        /// Sleep, then write an artifact
        Stall(Duration, usize),
    }

    struct MockTranscoder {
        behavior: MockBehavior,
    }

    impl Transcoder for MockTranscoder {
        fn read(&self, path: &Path) -> Result<MediaHandle, CompressError> {
            Ok(MediaHandle::Video(path.to_path_buf()))
        }

        fn write(
            &self,
            _handle: MediaHandle,
            path: &Path,
            _params: &CompressParams,
        ) -> Result<u64, CompressError> {
            match &self.behavior {
                MockBehavior::Produce(size) => {
                    fs::write(path, vec![0u8; *size])?;
                    Ok(*size as u64)
                }
                MockBehavior::Fail => Err(CompressError::FFmpeg("simulated failure".to_string())),
                MockBehavior::Stall(delay, size) => {
                    std::thread::sleep(*delay);
                    fs::write(path, vec![0u8; *size])?;
                    Ok(*size as u64)
                }
            }
        }
    }

    struct MockProvider {
        transcoder: MockTranscoder,
    }

    impl TranscoderProvider for MockProvider {
        fn transcoder_for(&self, category: MediaCategory) -> Option<&dyn Transcoder> {
            match category {
                MediaCategory::Unknown => None,
                _ => Some(&self.transcoder),
            }
        }
    }

    fn engine_with(behavior: MockBehavior, revert_if_larger: bool) -> CompressionEngine {
        CompressionEngine::new(
            Arc::new(MockProvider {
                transcoder: MockTranscoder { behavior },
            }),
            CompressParams::default(),
            revert_if_larger,
            Duration::from_millis(200),
            Duration::from_millis(200),
        )
    }

    fn job_in(temp: &TempDir, input_name: &str, content: &[u8], planned_name: &str) -> FileJob {
        let input_path = temp.path().join(input_name);
        fs::write(&input_path, content).unwrap();
        FileJob {
            input_path: input_path.clone(),
            planned_output_path: temp.path().join("out").join(planned_name),
            input_descriptor: dtype::classify(&input_path),
        }
    }

    #[tokio::test]
    async fn test_unknown_format_is_copied_verbatim() {
        let temp = TempDir::new().unwrap();
        fs::create_dir(temp.path().join("out")).unwrap();
        let job = job_in(&temp, "notes.xyz", b"ten bytes!", "notes.xyz");

        let engine = engine_with(MockBehavior::Produce(5), true);
        let outcome = engine.process(&job).await.unwrap();

        assert_eq!(outcome.status, OutcomeStatus::Copied);
        assert_eq!(outcome.output_size, 10);
        assert_eq!(fs::read(&outcome.output_path).unwrap(), b"ten bytes!");
    }

    #[tokio::test]
    async fn test_successful_compression_keeps_artifact() {
        let temp = TempDir::new().unwrap();
        fs::create_dir(temp.path().join("out")).unwrap();
        let job = job_in(&temp, "clip.mov", &[1u8; 100], "clip.mp4");

        let engine = engine_with(MockBehavior::Produce(40), true);
        let outcome = engine.process(&job).await.unwrap();

        assert_eq!(outcome.status, OutcomeStatus::Compressed);
        assert_eq!(outcome.output_path, temp.path().join("out/clip.mp4"));
        assert_eq!(outcome.output_size, 40);
        assert_eq!(fs::metadata(&outcome.output_path).unwrap().len(), 40);
    }

    #[tokio::test]
    async fn test_larger_artifact_reverts_to_copy() {
        let temp = TempDir::new().unwrap();
        fs::create_dir(temp.path().join("out")).unwrap();
        let job = job_in(&temp, "clip.mov", &[1u8; 100], "clip.mp4");

        let engine = engine_with(MockBehavior::Produce(150), true);
        let outcome = engine.process(&job).await.unwrap();

        assert_eq!(outcome.status, OutcomeStatus::RevertedToCopy);
        // Original bytes under the original extension
        assert_eq!(outcome.output_path, temp.path().join("out/clip.mov"));
        assert_eq!(fs::read(&outcome.output_path).unwrap(), vec![1u8; 100]);
        // The transcoded artifact did not survive
        assert!(!temp.path().join("out/clip.mp4").exists());
    }

    #[tokio::test]
    async fn test_larger_artifact_kept_when_policy_disabled() {
        let temp = TempDir::new().unwrap();
        fs::create_dir(temp.path().join("out")).unwrap();
        let job = job_in(&temp, "clip.mov", &[1u8; 100], "clip.mp4");

        let engine = engine_with(MockBehavior::Produce(150), false);
        let outcome = engine.process(&job).await.unwrap();

        assert_eq!(outcome.status, OutcomeStatus::Compressed);
        assert_eq!(outcome.output_size, 150);
        assert!(temp.path().join("out/clip.mp4").exists());
    }

    #[tokio::test]
    async fn test_failure_falls_back_to_copy() {
        let temp = TempDir::new().unwrap();
        fs::create_dir(temp.path().join("out")).unwrap();
        let job = job_in(&temp, "photo.png", &[7u8; 64], "photo.jpg");

        let engine = engine_with(MockBehavior::Fail, true);
        let outcome = engine.process(&job).await.unwrap();

        assert_eq!(outcome.status, OutcomeStatus::FailedFallback);
        assert_eq!(outcome.output_path, temp.path().join("out/photo.png"));
        assert_eq!(fs::read(&outcome.output_path).unwrap(), vec![7u8; 64]);
        assert!(!temp.path().join("out/photo.jpg").exists());
    }

    #[tokio::test]
    async fn test_timeout_is_treated_as_failure() {
        let temp = TempDir::new().unwrap();
        fs::create_dir(temp.path().join("out")).unwrap();
        let job = job_in(&temp, "clip.mov", &[9u8; 32], "clip.mp4");

        let engine = engine_with(
            MockBehavior::Stall(Duration::from_millis(500), 10),
            true,
        );
        let outcome = engine.process(&job).await.unwrap();

        assert_eq!(outcome.status, OutcomeStatus::FailedFallback);
        assert_eq!(fs::read(&outcome.output_path).unwrap(), vec![9u8; 32]);
    }

    #[tokio::test]
    async fn test_collision_suffix_survives_revert() {
        let temp = TempDir::new().unwrap();
        fs::create_dir(temp.path().join("out")).unwrap();
        let job = job_in(&temp, "photo.png", &[7u8; 64], "photo (1).jpg");

        let engine = engine_with(MockBehavior::Produce(100), true);
        let outcome = engine.process(&job).await.unwrap();

        assert_eq!(outcome.status, OutcomeStatus::RevertedToCopy);
        assert_eq!(outcome.output_path, temp.path().join("out/photo (1).png"));
    }
}
