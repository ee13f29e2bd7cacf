//! # Project Scaffolding Module
//!
//! Questo modulo crea la struttura di output prima di processare qualsiasi file.
//!
//! ## Responsabilità:
//! - Crea la directory di progetto `<nome_input>_<timestamp>` accanto alla
//!   radice di input, con le sottodirectory `data/` e `summary/`
//! - Replica ogni sottodirectory dell'input dentro `data/`, applicando la
//!   stessa normalizzazione dei nomi del path planner
//! - Fallisce (hard error) se una directory target esiste già: indica una
//!   collisione di timestamp o di nomi che non deve fondere due run
//!
//! ## Layout prodotto:
//! ```text
//! photos_2024_03_01-18_30_00/
//! ├── data/        <- albero replicato, file compressi/copiati
//! └── summary/     <- stats.json + copia della config risolta
//! ```
//!
//! Lo scaffolding completa in modo sincrono prima dell'avvio dei job: ogni
//! job assume che la propria directory di destinazione esista già.

use anyhow::Result;
use chrono::Local;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

use crate::planner::normalize_relative_path;

/// Output locations of a run, created once at startup and read-only after
#[derive(Debug, Clone)]
pub struct ProjectLayout {
    pub project_root: PathBuf,
    pub data_root: PathBuf,
    pub summary_root: PathBuf,
}

/// Create the timestamped project directory next to the input root and
/// mirror the input's directory hierarchy into `data/`.
pub fn scaffold(input_root: &Path, normalize_names: bool) -> Result<ProjectLayout> {
    let input_name = input_root
        .file_name()
        .ok_or_else(|| anyhow::anyhow!("Invalid input directory: {}", input_root.display()))?
        .to_string_lossy();
    let timestamp = Local::now().format("%Y_%m_%d-%H_%M_%S");

    let project_root = input_root
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(format!("{}_{}", input_name, timestamp));

    scaffold_at(input_root, &project_root, normalize_names)
}

/// Scaffold into an explicit project root. Every directory creation is
/// non-idempotent: a pre-existing target aborts the run.
pub fn scaffold_at(
    input_root: &Path,
    project_root: &Path,
    normalize_names: bool,
) -> Result<ProjectLayout> {
    create_new_dir(project_root)?;

    let layout = ProjectLayout {
        project_root: project_root.to_path_buf(),
        data_root: project_root.join("data"),
        summary_root: project_root.join("summary"),
    };
    create_new_dir(&layout.data_root)?;
    create_new_dir(&layout.summary_root)?;

    // Pre-order walk: parents are always created before their children
    for entry in WalkDir::new(input_root)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_dir())
    {
        let relative = entry.path().strip_prefix(input_root)?;
        let mirrored = if normalize_names {
            normalize_relative_path(relative)
        } else {
            relative.to_path_buf()
        };
        create_new_dir(&layout.data_root.join(mirrored))?;
    }

    debug!("Scaffolded project at {}", layout.project_root.display());
    Ok(layout)
}

fn create_new_dir(path: &Path) -> Result<()> {
    fs::create_dir(path)
        .map_err(|e| anyhow::anyhow!("Failed to create directory {}: {}", path.display(), e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_scaffold_at_creates_layout_and_mirrors_directories() {
        let temp = TempDir::new().unwrap();
        let input = temp.path().join("in");
        fs::create_dir_all(input.join("a/b")).unwrap();
        fs::create_dir_all(input.join("c")).unwrap();
        fs::write(input.join("a/file.png"), b"x").unwrap();

        let project = temp.path().join("project");
        let layout = scaffold_at(&input, &project, false).unwrap();

        assert!(layout.data_root.join("a/b").is_dir());
        assert!(layout.data_root.join("c").is_dir());
        assert!(layout.summary_root.is_dir());
        // Files are not mirrored, only directories
        assert!(!layout.data_root.join("a/file.png").exists());
    }

    #[test]
    fn test_scaffold_at_normalizes_directory_names() {
        let temp = TempDir::new().unwrap();
        let input = temp.path().join("in");
        fs::create_dir_all(input.join("My Pics/Summer - 2021")).unwrap();

        let project = temp.path().join("project");
        let layout = scaffold_at(&input, &project, true).unwrap();

        assert!(layout.data_root.join("my_pics/summer_2021").is_dir());
        assert!(!layout.data_root.join("My Pics").exists());
    }

    #[test]
    fn test_scaffold_at_fails_on_existing_project_root() {
        let temp = TempDir::new().unwrap();
        let input = temp.path().join("in");
        fs::create_dir_all(&input).unwrap();

        let project = temp.path().join("project");
        fs::create_dir(&project).unwrap();

        assert!(scaffold_at(&input, &project, false).is_err());
    }

    #[test]
    fn test_scaffold_at_fails_when_normalized_directories_collide() {
        let temp = TempDir::new().unwrap();
        let input = temp.path().join("in");
        fs::create_dir_all(input.join("A B")).unwrap();
        fs::create_dir_all(input.join("a-b")).unwrap();

        let project = temp.path().join("project");
        assert!(scaffold_at(&input, &project, true).is_err());
    }

    #[test]
    fn test_scaffold_places_project_next_to_input() {
        let temp = TempDir::new().unwrap();
        let input = temp.path().join("photos");
        fs::create_dir_all(&input).unwrap();

        let layout = scaffold(&input, false).unwrap();
        assert_eq!(layout.project_root.parent().unwrap(), temp.path());

        let name = layout
            .project_root
            .file_name()
            .unwrap()
            .to_string_lossy()
            .into_owned();
        // photos_YYYY_MM_DD-HH_MM_SS
        assert!(name.starts_with("photos_"));
        assert_eq!(name.len(), "photos_".len() + 19);
    }
}
