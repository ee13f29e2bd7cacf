//! # Bulk Media Compressor - Main Entry Point
//!
//! Questo è il punto di ingresso principale dell'applicazione.
//!
//! ## Responsabilità:
//! - Parsing degli argomenti della command line con `clap`
//! - Inizializzazione del sistema di logging con `tracing`
//! - Caricamento della configurazione YAML
//! - Avvio dell'orchestratore
//!
//! ## Flusso di esecuzione:
//! 1. Parsa gli argomenti CLI (path config, workers, flags)
//! 2. Configura il logging (INFO o DEBUG a seconda del flag verbose)
//! 3. Carica e valida la configurazione
//! 4. Istanzia BulkCompressor e avvia il run
//!
//! Qualsiasi violazione di configurazione o precondizione termina il
//! processo con exit code non-zero prima che un file venga toccato; i
//! fallimenti per singolo file non interrompono mai il run.
//!
//! ## Esempio di utilizzo:
//! ```bash
//! media-compressor --path-config ./config.yml --workers 8 --verbose
//! ```

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

use bulk_media_compressor::{BulkCompressor, Config};

#[derive(Parser)]
#[command(name = "media-compressor")]
#[command(about = "Bulk-compress a media tree into a timestamped project directory")]
struct Args {
    /// Path of the YAML config file
    #[arg(short, long, default_value = "./config.yml")]
    path_config: PathBuf,

    /// Number of parallel workers (overrides the config file)
    #[arg(short, long)]
    workers: Option<usize>,

    /// Disable the progress bar
    #[arg(long)]
    no_progress_bar: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(if args.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let mut config = Config::from_file(&args.path_config).await?;
    if let Some(workers) = args.workers {
        config.workers = workers;
    }

    let compressor = BulkCompressor::new(config, !args.no_progress_bar)?;
    compressor.run().await?;

    Ok(())
}
