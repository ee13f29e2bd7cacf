//! # Progress Tracking Module
//!
//! Questo modulo gestisce il feedback visuale durante il run.
//!
//! ## Responsabilità:
//! - Progress bar con `indicatif` per feedback real-time
//! - Messaggio di stato per ogni file processato
//! - Modalità nascosta per uso non interattivo (`--no-progress-bar`)
//!
//! ## Visual feedback:
//! ```text
//! ⠋ [00:02:15] [========================================] 150/150 (100%) ✅ photo.jpg: 45.2% saved
//! ```

use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Manages progress reporting for a compression run
#[derive(Clone)]
pub struct ProgressManager {
    bar: ProgressBar,
}

impl ProgressManager {
    /// Create a new progress manager. When `enabled` is false the bar is
    /// hidden and updates become no-ops.
    pub fn new(total_files: u64, enabled: bool) -> Self {
        let bar = if enabled {
            ProgressBar::new(total_files)
        } else {
            ProgressBar::hidden()
        };

        if enabled {
            bar.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}")
                    .unwrap()
                    .progress_chars("=>-"),
            );
            bar.enable_steady_tick(Duration::from_millis(100));
        }

        Self { bar }
    }

    /// Update progress with a message
    pub fn update(&self, message: &str) {
        self.bar.inc(1);
        self.bar.set_message(message.to_string());
    }

    /// Finish with a final message
    pub fn finish(&self, message: &str) {
        self.bar.finish_with_message(message.to_string());
    }
}
