//! # Bulk Media Compressor Library
//!
//! Questo è il modulo principale della libreria che espone tutte le API pubbliche.
//!
//! ## Responsabilità:
//! - Definisce la struttura modulare dell'applicazione
//! - Espone i tipi e le funzioni principali tramite re-exports
//! - Fornisce un'interfaccia pulita per il main.rs e per altri consumatori
//!
//! ## Architettura dei moduli:
//! - `config`: Gestione configurazione YAML e validazione parametri
//! - `error`: Tipi di errore custom per diverse operazioni
//! - `dtype`: Registry statico estensione → tipo di media
//! - `planner`: Pianificazione dei path di output con collision safety
//! - `project`: Scaffolding della directory di progetto timestamped
//! - `transcoder`: Capacità di transcodifica (immagini, RAW, video)
//! - `engine`: Logica compress-or-copy per singolo file
//! - `stats`: Raccolta esiti, report e verifica di integrità
//! - `orchestrator`: Coordinamento del run completo
//! - `progress`: Progress tracking con indicatif
//! - `platform`: Risoluzione cross-platform dei tool esterni
//!
//! ## Utilizzo:
//! ```rust,ignore
//! use bulk_media_compressor::{BulkCompressor, Config};
//!
//! let config = Config::from_file(&path).await?;
//! let compressor = BulkCompressor::new(config, true)?;
//! compressor.run().await?;
//! ```

pub mod config;
pub mod dtype;
pub mod engine;
pub mod error;
pub mod orchestrator;
pub mod planner;
pub mod platform;
pub mod progress;
pub mod project;
pub mod stats;
pub mod transcoder;
pub mod utils;

pub use config::{CompressParams, Config, OutputRule};
pub use error::CompressError;
pub use orchestrator::BulkCompressor;
pub use planner::FileJob;
pub use project::ProjectLayout;
pub use stats::{FileOutcome, OutcomeStatus, RunReport};
