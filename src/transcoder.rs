//! # Transcoder Module
//!
//! Questo modulo incapsula la capacità di transcodifica consumata dal motore
//! di compressione.
//!
//! ## Responsabilità:
//! - Definisce il contratto `Transcoder`: `read` decodifica un file sorgente,
//!   `write` lo ricodifica nel formato di output con i parametri configurati
//! - Implementa le tre varianti: `ImageStandardCodec` (decodifica in-process),
//!   `ImageRawCodec` (sviluppo RAW via dcraw), `VideoCodec` (FFmpeg)
//! - `CodecRegistry` associa ogni categoria al codec corrispondente
//!
//! ## Pipeline video:
//! - Codec video configurabile (default libx264), CRF, preset, pixel format
//! - Audio ricodificato (default AAC) con bitrate configurabile
//! - Metadata mappati dal sorgente con `-map_metadata 0`
//!
//! ## Pipeline RAW:
//! - `dcraw -c -w` sviluppa il file RAW in PPM su stdout
//! - Il PPM viene decodificato in-process e ricodificato come JPEG
//!
//! ## Controllo qualità (CRF):
//! - 0-17: Visualmente lossless (file grandi)
//! - 18-23: Alta qualità (raccomandato per archivio)
//! - 24-28: Buona qualità (default, bilanciato)
//! - 29+: Qualità ridotta
//!
//! Ogni fallimento dei codec propaga come singolo errore al motore; il
//! motore verifica comunque esistenza e dimensione dell'output da solo,
//! senza fidarsi del solo segnale di successo del codec.

use image::DynamicImage;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;

use crate::args;
use crate::config::{CompressParams, JpegParams, OutputRule};
use crate::dtype::MediaCategory;
use crate::error::CompressError;
use crate::platform::PlatformCommands;

/// Decoded media, ready to be re-encoded
pub enum MediaHandle {
    /// In-memory decoded image
    Image(DynamicImage),
    /// Video source path; frames stay on disk and flow through FFmpeg
    Video(PathBuf),
}

/// Capability contract: decode a source file, re-encode it to the target
/// format with the given compression parameters. Both operations may fail.
pub trait Transcoder: Send + Sync {
    /// Read a media file into a decoded handle
    fn read(&self, path: &Path) -> Result<MediaHandle, CompressError>;

    /// Re-encode a decoded handle to `path`, returning the bytes written
    fn write(
        &self,
        handle: MediaHandle,
        path: &Path,
        params: &CompressParams,
    ) -> Result<u64, CompressError>;
}

/// Selects the transcoder variant for a category. The engine holds no
/// per-variant branching beyond this single lookup per job.
pub trait TranscoderProvider: Send + Sync {
    /// Transcoder bound to a category, or None for `Unknown`
    fn transcoder_for(&self, category: MediaCategory) -> Option<&dyn Transcoder>;
}

/// Registry of the concrete codecs, bound to the configured output rules
pub struct CodecRegistry {
    image_standard: ImageStandardCodec,
    image_raw: ImageRawCodec,
    video: VideoCodec,
}

impl CodecRegistry {
    pub fn new(image_rule: OutputRule, video_rule: OutputRule) -> Self {
        Self {
            image_standard: ImageStandardCodec {
                rule: image_rule.clone(),
            },
            image_raw: ImageRawCodec { rule: image_rule },
            video: VideoCodec { rule: video_rule },
        }
    }

    /// Check that the external tools required by the planned job set are
    /// installed. Called before any file is touched.
    pub async fn check_dependencies(needs_ffmpeg: bool, needs_dcraw: bool) -> Result<(), CompressError> {
        let platform = PlatformCommands::instance();

        if needs_ffmpeg && !platform.is_command_available("ffmpeg").await {
            return Err(CompressError::MissingDependency(
                "ffmpeg is required for video compression".to_string(),
            ));
        }

        if needs_dcraw && !platform.is_command_available("dcraw").await {
            return Err(CompressError::MissingDependency(
                "dcraw is required for RAW image decoding".to_string(),
            ));
        }

        Ok(())
    }
}

impl TranscoderProvider for CodecRegistry {
    fn transcoder_for(&self, category: MediaCategory) -> Option<&dyn Transcoder> {
        match category {
            MediaCategory::ImageStandard => Some(&self.image_standard),
            MediaCategory::ImageRaw => Some(&self.image_raw),
            MediaCategory::Video => Some(&self.video),
            MediaCategory::Unknown => None,
        }
    }
}

/// Codec for images the `image` crate can decode in-process
pub struct ImageStandardCodec {
    rule: OutputRule,
}

impl Transcoder for ImageStandardCodec {
    fn read(&self, path: &Path) -> Result<MediaHandle, CompressError> {
        debug!("Decoding image: {}", path.display());
        let image = image::open(path)?;
        Ok(MediaHandle::Image(image))
    }

    fn write(
        &self,
        handle: MediaHandle,
        path: &Path,
        params: &CompressParams,
    ) -> Result<u64, CompressError> {
        let image = match handle {
            MediaHandle::Image(image) => image,
            MediaHandle::Video(_) => {
                return Err(CompressError::Config(
                    "Image codec received a video handle".to_string(),
                ))
            }
        };

        match self.rule.fmt.as_str() {
            "JPEG" => encode_jpeg(&image, path, &params.jpeg),
            other => Err(CompressError::Config(format!(
                "Unsupported image output format: {}",
                other
            ))),
        }
    }
}

/// Codec for camera RAW files, developed through dcraw
pub struct ImageRawCodec {
    rule: OutputRule,
}

impl Transcoder for ImageRawCodec {
    fn read(&self, path: &Path) -> Result<MediaHandle, CompressError> {
        debug!("Developing RAW file: {}", path.display());

        let platform = PlatformCommands::instance();
        let output = Command::new(platform.get_command("dcraw"))
            // -c: PPM on stdout, -w: camera white balance
            .args(args!["-c", "-w"])
            .arg(path)
            .output()
            .map_err(|e| CompressError::RawDecode(format!("Failed to execute dcraw: {}", e)))?;

        if !output.status.success() {
            return Err(CompressError::RawDecode(
                String::from_utf8_lossy(&output.stderr).to_string(),
            ));
        }

        let image = image::load_from_memory_with_format(&output.stdout, image::ImageFormat::Pnm)?;
        Ok(MediaHandle::Image(image))
    }

    fn write(
        &self,
        handle: MediaHandle,
        path: &Path,
        params: &CompressParams,
    ) -> Result<u64, CompressError> {
        let image = match handle {
            MediaHandle::Image(image) => image,
            MediaHandle::Video(_) => {
                return Err(CompressError::Config(
                    "RAW codec received a video handle".to_string(),
                ))
            }
        };

        match self.rule.fmt.as_str() {
            "JPEG" => encode_jpeg(&image, path, &params.jpeg),
            other => Err(CompressError::Config(format!(
                "Unsupported image output format: {}",
                other
            ))),
        }
    }
}

/// Codec for videos, driven through FFmpeg
pub struct VideoCodec {
    rule: OutputRule,
}

impl Transcoder for VideoCodec {
    fn read(&self, path: &Path) -> Result<MediaHandle, CompressError> {
        // FFmpeg streams from disk; reading only binds and checks the source
        std::fs::metadata(path)?;
        Ok(MediaHandle::Video(path.to_path_buf()))
    }

    fn write(
        &self,
        handle: MediaHandle,
        path: &Path,
        params: &CompressParams,
    ) -> Result<u64, CompressError> {
        let source = match handle {
            MediaHandle::Video(source) => source,
            MediaHandle::Image(_) => {
                return Err(CompressError::Config(
                    "Video codec received an image handle".to_string(),
                ))
            }
        };

        if self.rule.fmt != "MP4" {
            return Err(CompressError::Config(format!(
                "Unsupported video output format: {}",
                self.rule.fmt
            )));
        }

        let mp4 = &params.mp4;
        debug!(
            "Compressing video: {} (CRF: {}, audio: {})",
            source.display(),
            mp4.crf,
            mp4.audio_bitrate
        );

        let platform = PlatformCommands::instance();
        let mut cmd = Command::new(platform.get_command("ffmpeg"));
        cmd.arg("-i").arg(&source).args(args![
            "-c:v",
            &mp4.vcodec,
            "-preset",
            &mp4.preset,
            "-crf",
            mp4.crf,
            "-pix_fmt",
            &mp4.pix_fmt,
            "-c:a",
            &mp4.acodec,
            "-b:a",
            &mp4.audio_bitrate,
            "-map_metadata",
            "0",
        ]);

        // Suppress FFmpeg output unless in debug mode
        if !tracing::enabled!(tracing::Level::DEBUG) {
            cmd.args(args!["-loglevel", "warning"]);
        }

        cmd.arg("-y").arg(path);

        let output = cmd
            .output()
            .map_err(|e| CompressError::FFmpeg(format!("Failed to execute ffmpeg: {}", e)))?;

        if !output.status.success() {
            return Err(CompressError::FFmpeg(
                String::from_utf8_lossy(&output.stderr).to_string(),
            ));
        }

        Ok(std::fs::metadata(path)?.len())
    }
}

/// Encode a decoded image as JPEG.
///
/// The in-process encoder exposes quality; `optimize` and `subsampling` are
/// accepted for config compatibility and treated as advisory.
fn encode_jpeg(image: &DynamicImage, path: &Path, params: &JpegParams) -> Result<u64, CompressError> {
    use std::io::Write;

    let rgb = image.to_rgb8();
    let file = std::fs::File::create(path)?;
    let mut writer = std::io::BufWriter::new(file);

    let mut encoder =
        image::codecs::jpeg::JpegEncoder::new_with_quality(&mut writer, params.quality);
    encoder.encode_image(&rgb)?;
    writer.flush()?;

    Ok(std::fs::metadata(path)?.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CompressParams;
    use image::RgbImage;
    use tempfile::TempDir;

    fn jpeg_rule() -> OutputRule {
        OutputRule {
            fmt: "JPEG".to_string(),
            ext: ".jpg".to_string(),
        }
    }

    fn mp4_rule() -> OutputRule {
        OutputRule {
            fmt: "MP4".to_string(),
            ext: ".mp4".to_string(),
        }
    }

    #[test]
    fn test_registry_dispatch() {
        let registry = CodecRegistry::new(jpeg_rule(), mp4_rule());
        assert!(registry.transcoder_for(MediaCategory::ImageStandard).is_some());
        assert!(registry.transcoder_for(MediaCategory::ImageRaw).is_some());
        assert!(registry.transcoder_for(MediaCategory::Video).is_some());
        assert!(registry.transcoder_for(MediaCategory::Unknown).is_none());
    }

    #[test]
    fn test_image_codec_transcodes_png_to_jpeg() {
        let temp = TempDir::new().unwrap();
        let input = temp.path().join("photo.png");
        let output = temp.path().join("photo.jpg");

        let mut source = RgbImage::new(16, 16);
        for (x, y, pixel) in source.enumerate_pixels_mut() {
            *pixel = image::Rgb([(x * 16) as u8, (y * 16) as u8, 128]);
        }
        source.save(&input).unwrap();

        let codec = ImageStandardCodec { rule: jpeg_rule() };
        let handle = codec.read(&input).unwrap();
        let written = codec
            .write(handle, &output, &CompressParams::default())
            .unwrap();

        assert!(written > 0);
        assert_eq!(std::fs::metadata(&output).unwrap().len(), written);
        // The artifact really is a JPEG
        let reloaded = image::open(&output).unwrap();
        assert_eq!(reloaded.width(), 16);
    }

    #[test]
    fn test_image_codec_fails_on_corrupt_input() {
        let temp = TempDir::new().unwrap();
        let input = temp.path().join("broken.png");
        std::fs::write(&input, b"not a png at all").unwrap();

        let codec = ImageStandardCodec { rule: jpeg_rule() };
        assert!(codec.read(&input).is_err());
    }

    #[test]
    fn test_video_codec_read_fails_on_missing_source() {
        let codec = VideoCodec { rule: mp4_rule() };
        assert!(codec.read(Path::new("/nonexistent/clip.mov")).is_err());
    }

    #[test]
    fn test_codec_rejects_mismatched_handle() {
        let temp = TempDir::new().unwrap();
        let codec = ImageStandardCodec { rule: jpeg_rule() };
        let result = codec.write(
            MediaHandle::Video(PathBuf::from("clip.mp4")),
            &temp.path().join("out.jpg"),
            &CompressParams::default(),
        );
        assert!(result.is_err());
    }
}
