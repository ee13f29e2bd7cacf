//! # Error Types Module
//!
//! Questo modulo definisce tutti i tipi di errore custom dell'applicazione.
//!
//! ## Responsabilità:
//! - Definisce `CompressError` enum per categorizzare tutti gli errori possibili
//! - Fornisce messaggi di errore descrittivi e strutturati
//! - Integra con `thiserror` per automatic error conversion
//! - Supporta error chaining per mantenere il contesto degli errori
//!
//! ## Categorie di errori:
//! - `Io`: Errori di I/O (file non trovati, permessi, etc.)
//! - `Image`: Errori di decodifica/codifica immagini (formati corrotti, etc.)
//! - `FFmpeg`: Errori di transcodifica video con FFmpeg
//! - `RawDecode`: Errori di sviluppo file RAW con dcraw
//! - `Config`: Errori di validazione della configurazione
//! - `MissingDependency`: Tool esterno mancante (ffmpeg, dcraw)
//! - `Timeout`: Transcodifica interrotta per timeout
//! - `Integrity`: Conteggio file input/output non coincidente a fine run
//!
//! ## Classificazione:
//! - Errori di configurazione e scaffolding sono fatali e fermano il run
//! - Errori per singolo file (codec, timeout) vengono recuperati localmente
//!   dal motore di compressione con una fallback copy
//!
//! ## Esempio:
//! ```rust,ignore
//! if !tool_exists {
//!     return Err(CompressError::MissingDependency("ffmpeg".to_string()));
//! }
//! ```

/// Custom error types for bulk media compression
#[derive(thiserror::Error, Debug)]
pub enum CompressError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    #[error("FFmpeg error: {0}")]
    FFmpeg(String),

    #[error("RAW decode error: {0}")]
    RawDecode(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Transcode failed: {0}")]
    Transcode(String),

    #[error("Dependency missing: {0}")]
    MissingDependency(String),

    #[error("Transcoding timed out")]
    Timeout,

    #[error("Integrity check failed: {input_count} input files but {output_count} output files")]
    Integrity {
        input_count: usize,
        output_count: usize,
    },
}
