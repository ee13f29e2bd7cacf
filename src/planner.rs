//! # Path Planning Module
//!
//! Questo modulo calcola in anticipo tutte le coppie (input, output) del run.
//!
//! ## Responsabilità:
//! - Discovery ricorsiva di tutti i file regolari sotto la radice di input
//! - Calcolo del path di output pianificato per ogni file:
//!   estensione sostituita per immagini/video, preservata (lowercase) per
//!   i file sconosciuti
//! - Normalizzazione opzionale dei componenti del path relativo in snake_case
//! - Risoluzione delle collisioni con suffisso ` (n)` prima dell'estensione,
//!   confronto case-insensitive
//!
//! ## Invarianti:
//! - Il piano viene calcolato una sola volta, prima del processing
//! - Nessuna coppia di job punta allo stesso path di output, nemmeno su
//!   filesystem case-insensitive
//! - L'albero di input non viene mai modificato
//!
//! ## Esempio:
//! ```text
//! in/aa.png        -> data/aa.jpg
//! in/sub/AA.PNG    -> data/sub/aa.jpg      (con apply_snake_case)
//! in/notes.XYZ     -> data/notes.xyz       (copy, estensione preservata)
//! in/aa.nef        -> data/aa (1).jpg      (collisione con aa.png)
//! ```

use anyhow::Result;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::OutputRule;
use crate::dtype::{self, DataTypeDescriptor, MediaCategory};

/// Planned unit of work: one input file and its collision-safe output path
#[derive(Debug, Clone)]
pub struct FileJob {
    pub input_path: PathBuf,
    pub planned_output_path: PathBuf,
    pub input_descriptor: DataTypeDescriptor,
}

/// Compute the full set of file jobs for a run.
///
/// Enumeration order is deterministic within the run (sorted walk), which the
/// collision-resolution step relies on: the first occurrence of a colliding
/// path keeps its name, later ones get suffixed.
pub fn plan(
    input_root: &Path,
    data_root: &Path,
    image_rule: &OutputRule,
    video_rule: &OutputRule,
    normalize_names: bool,
) -> Result<Vec<FileJob>> {
    let mut jobs = Vec::new();

    for entry in WalkDir::new(input_root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
    {
        let input_path = entry.path().to_path_buf();
        let relative = input_path.strip_prefix(input_root)?.to_path_buf();
        let descriptor = dtype::classify(&input_path);

        let mut planned_relative = relative;
        match descriptor.category {
            MediaCategory::Unknown => {
                // Preservation copy: relocate, keep the original extension lower-cased
                if let Some(ext) = input_path.extension() {
                    planned_relative.set_extension(ext.to_string_lossy().to_lowercase());
                }
            }
            MediaCategory::ImageStandard | MediaCategory::ImageRaw => {
                planned_relative.set_extension(&image_rule.ext[1..]);
            }
            MediaCategory::Video => {
                planned_relative.set_extension(&video_rule.ext[1..]);
            }
        }

        if normalize_names {
            planned_relative = normalize_relative_path(&planned_relative);
        }

        jobs.push(FileJob {
            input_path,
            planned_output_path: data_root.join(planned_relative),
            input_descriptor: descriptor,
        });
    }

    resolve_collisions(&mut jobs);

    Ok(jobs)
}

/// Rewrite every component of a relative path to its normalized form
pub fn normalize_relative_path(relative: &Path) -> PathBuf {
    relative
        .components()
        .map(|c| normalize_component(&c.as_os_str().to_string_lossy()))
        .collect()
}

/// Normalize a single path component: lower-case, whitespace and hyphens
/// become underscores, runs of underscores collapse, leading/trailing
/// underscores are stripped. Dotfiles are left untouched.
pub fn normalize_component(name: &str) -> String {
    // A dotfile has a leading dot and exactly one dot overall
    if name.starts_with('.') && name.matches('.').count() == 1 {
        return name.to_string();
    }

    let lowered = name.to_lowercase();
    let mut normalized = String::with_capacity(lowered.len());
    let mut previous_underscore = false;

    for c in lowered.chars() {
        let c = if c.is_whitespace() || c == '-' { '_' } else { c };
        if c == '_' && previous_underscore {
            continue;
        }
        previous_underscore = c == '_';
        normalized.push(c);
    }

    let trimmed = normalized.trim_matches('_');
    if trimmed.is_empty() {
        // A name made only of separators would vanish; keep it addressable
        return lowered;
    }
    trimmed.to_string()
}

/// Suffix colliding planned paths with ` (n)` before the extension.
///
/// Paths are compared case-insensitively so that two outputs differing only
/// by case cannot overwrite each other on case-insensitive filesystems. The
/// counter is scoped per colliding path.
fn resolve_collisions(jobs: &mut [FileJob]) {
    let mut counters: HashMap<String, u32> = HashMap::new();

    for job in jobs.iter_mut() {
        let key = job
            .planned_output_path
            .to_string_lossy()
            .to_lowercase();

        match counters.entry(key) {
            Entry::Vacant(slot) => {
                slot.insert(0);
            }
            Entry::Occupied(mut slot) => {
                let seen = slot.get_mut();
                *seen += 1;
                let stem = job
                    .planned_output_path
                    .file_stem()
                    .unwrap_or_default()
                    .to_string_lossy()
                    .into_owned();
                let renamed = match job.planned_output_path.extension() {
                    Some(ext) => format!("{} ({}).{}", stem, seen, ext.to_string_lossy()),
                    None => format!("{} ({})", stem, seen),
                };
                job.planned_output_path = job.planned_output_path.with_file_name(renamed);
            }
        }
    }
}
