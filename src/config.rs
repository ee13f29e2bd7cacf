//! # Configuration Management Module
//!
//! Questo modulo gestisce tutta la configurazione dell'applicazione.
//!
//! ## Responsabilità:
//! - Definisce la struct `Config` con tutti i parametri di compressione
//! - Fornisce validazione robusta dei parametri di input (fail fast)
//! - Supporta caricamento da file YAML e salvataggio della config risolta
//! - Fornisce valori di default sensati per tutti i parametri ambient
//!
//! ## Parametri di configurazione:
//! - `in_path`: Directory radice da comprimere (supporta `~`)
//! - `out_dtype`: Regole di output per categoria, esattamente `image` e `video`
//! - `compress_params`: Parametri codec per formato (JPEG, MP4)
//! - `copy_if_larger`: Ripristina la copia originale se la compressione ingrandisce
//! - `apply_snake_case`: Normalizza i nomi dei path di output in snake_case
//! - `workers`: Numero di worker paralleli (default: core logici)
//! - `image_timeout_secs` / `video_timeout_secs`: Timeout per singolo job
//!
//! ## Validazione:
//! - `out_dtype` deve contenere esattamente le chiavi `image` e `video`
//! - Ogni formato di output deve appartenere al set supportato (JPEG, MP4)
//! - Le estensioni di output devono iniziare con `.`
//! - Controlla che quality sia 1-100, crf sia 0-51, workers e timeout > 0
//!
//! ## Esempio di file YAML:
//! ```yaml
//! in_path: ~/photos
//! out_dtype:
//!   image: {fmt: JPEG, ext: .jpg}
//!   video: {fmt: MP4, ext: .mp4}
//! compress_params:
//!   JPEG: {quality: 80, optimize: true, subsampling: 0}
//!   MP4: {vcodec: libx264, crf: 26, preset: medium, pix_fmt: yuv420p, acodec: aac, audio_bitrate: 128k}
//! copy_if_larger: true
//! apply_snake_case: false
//! ```

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::dtype;

/// Output rule for a logical category: target format name and extension
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OutputRule {
    /// Target format name (e.g. "JPEG")
    pub fmt: String,
    /// Target extension, with leading dot (e.g. ".jpg")
    pub ext: String,
}

/// JPEG encoder parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JpegParams {
    /// JPEG quality (1-100)
    #[serde(default = "default_jpeg_quality")]
    pub quality: u8,
    /// Run an extra optimization pass when the encoder supports it
    #[serde(default = "default_true")]
    pub optimize: bool,
    /// Chroma subsampling mode (0 = 4:4:4, 1 = 4:2:2, 2 = 4:2:0)
    #[serde(default)]
    pub subsampling: u8,
}

impl Default for JpegParams {
    fn default() -> Self {
        Self {
            quality: default_jpeg_quality(),
            optimize: true,
            subsampling: 0,
        }
    }
}

/// MP4 encoder parameters, passed through to FFmpeg
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mp4Params {
    #[serde(default = "default_vcodec")]
    pub vcodec: String,
    /// CRF value (0-51, lower = better quality)
    #[serde(default = "default_crf")]
    pub crf: u8,
    #[serde(default = "default_preset")]
    pub preset: String,
    #[serde(default = "default_pix_fmt")]
    pub pix_fmt: String,
    #[serde(default = "default_acodec")]
    pub acodec: String,
    #[serde(default = "default_audio_bitrate")]
    pub audio_bitrate: String,
}

impl Default for Mp4Params {
    fn default() -> Self {
        Self {
            vcodec: default_vcodec(),
            crf: default_crf(),
            preset: default_preset(),
            pix_fmt: default_pix_fmt(),
            acodec: default_acodec(),
            audio_bitrate: default_audio_bitrate(),
        }
    }
}

/// Per-format codec settings, keyed by output format name in the YAML file
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CompressParams {
    #[serde(rename = "JPEG", default)]
    pub jpeg: JpegParams,
    #[serde(rename = "MP4", default)]
    pub mp4: Mp4Params,
}

/// Configuration for a bulk compression run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Root directory to process
    pub in_path: PathBuf,
    /// Output rules per logical category; must contain exactly `image` and `video`
    pub out_dtype: HashMap<String, OutputRule>,
    /// Codec settings per output format
    #[serde(default)]
    pub compress_params: CompressParams,
    /// Revert to a verbatim copy when compression grows the file
    #[serde(default = "default_true")]
    pub copy_if_larger: bool,
    /// Rewrite output path components to snake_case
    #[serde(default)]
    pub apply_snake_case: bool,
    /// Number of parallel workers (default: logical core count)
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Per-job timeout for image transcodes, in seconds
    #[serde(default = "default_image_timeout")]
    pub image_timeout_secs: u64,
    /// Per-job timeout for video transcodes, in seconds
    #[serde(default = "default_video_timeout")]
    pub video_timeout_secs: u64,
}

fn default_true() -> bool {
    true
}

fn default_jpeg_quality() -> u8 {
    80
}

fn default_vcodec() -> String {
    "libx264".to_string()
}

fn default_crf() -> u8 {
    26
}

fn default_preset() -> String {
    "medium".to_string()
}

fn default_pix_fmt() -> String {
    "yuv420p".to_string()
}

fn default_acodec() -> String {
    "aac".to_string()
}

fn default_audio_bitrate() -> String {
    "128k".to_string()
}

fn default_workers() -> usize {
    num_cpus::get()
}

fn default_image_timeout() -> u64 {
    180
}

fn default_video_timeout() -> u64 {
    900
}

impl Config {
    /// Validate configuration parameters.
    ///
    /// Any violation here is fatal and must abort the run before any file or
    /// directory is touched.
    pub fn validate(&self) -> Result<()> {
        let mut keys: Vec<&str> = self.out_dtype.keys().map(String::as_str).collect();
        keys.sort_unstable();
        if keys != ["image", "video"] {
            return Err(anyhow::anyhow!(
                "Invalid out_dtype keys. Expected [image, video], but found {:?}",
                keys
            ));
        }

        for (category, rule) in &self.out_dtype {
            if !dtype::output_format_supported(&rule.fmt) {
                return Err(anyhow::anyhow!(
                    "Invalid output format '{}' for category '{}'. Available output formats: {:?}",
                    rule.fmt,
                    category,
                    dtype::supported_output_formats()
                ));
            }
            if !rule.ext.starts_with('.') || rule.ext.len() < 2 {
                return Err(anyhow::anyhow!(
                    "Invalid output extension '{}' for category '{}': must start with '.'",
                    rule.ext,
                    category
                ));
            }
        }

        if self.compress_params.jpeg.quality == 0 || self.compress_params.jpeg.quality > 100 {
            return Err(anyhow::anyhow!("JPEG quality must be between 1 and 100"));
        }

        if self.compress_params.mp4.crf > 51 {
            return Err(anyhow::anyhow!("Video CRF must be between 0 and 51"));
        }

        if self.workers == 0 {
            return Err(anyhow::anyhow!("Number of workers must be greater than 0"));
        }

        if self.image_timeout_secs == 0 || self.video_timeout_secs == 0 {
            return Err(anyhow::anyhow!("Job timeouts must be greater than 0"));
        }

        let in_path = self.resolved_in_path();
        if !in_path.exists() {
            return Err(anyhow::anyhow!(
                "Input directory does not exist: {}",
                in_path.display()
            ));
        }
        if !in_path.is_dir() {
            return Err(anyhow::anyhow!(
                "Input path is not a directory: {}",
                in_path.display()
            ));
        }

        Ok(())
    }

    /// Input path with a leading `~` expanded to the user's home directory
    pub fn resolved_in_path(&self) -> PathBuf {
        expand_home(&self.in_path)
    }

    /// Output rule for the image category. Only valid after `validate()`.
    pub fn image_rule(&self) -> &OutputRule {
        &self.out_dtype["image"]
    }

    /// Output rule for the video category. Only valid after `validate()`.
    pub fn video_rule(&self) -> &OutputRule {
        &self.out_dtype["video"]
    }

    /// Load configuration from a YAML file
    pub async fn from_file(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            anyhow::anyhow!("Failed to read config file {}: {}", path.display(), e)
        })?;
        let config: Config = serde_yaml_ng::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Failed to parse config file {}: {}", path.display(), e))?;
        Ok(config)
    }

    /// Save the resolved configuration to a YAML file, for reproducibility
    pub async fn save_to_file(&self, path: &Path) -> Result<()> {
        let content = serde_yaml_ng::to_string(self)?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }
}

fn expand_home(path: &Path) -> PathBuf {
    if let Ok(stripped) = path.strip_prefix("~") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    path.to_path_buf()
}
