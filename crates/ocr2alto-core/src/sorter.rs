//! Regroups staged per-page outputs into `<top>/<project>/` folders.
//!
//! The gate leaves its outputs in staging roots holding one sub-folder per
//! source directory. Each staged file is moved to
//! `<target>/<top>/<project>/<file>`, where `<project>` is the part of the
//! file name before its first hyphen and `<top>` comes from the staging
//! sub-folder name (see [`TopLevelNaming`]).

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, error, info, warn};

use crate::error::Result;
use crate::fs_util;
use crate::models::config::{PipelineConfig, TopLevelNaming};

/// One staging root and where its files go.
#[derive(Debug, Clone)]
pub struct SortRoute {
    /// Staging root holding one sub-folder per source directory.
    pub staging: PathBuf,
    /// Root receiving `<top>/<project>/` folders.
    pub target: PathBuf,
    /// Extensions of the files to move.
    pub extensions: Vec<String>,
}

/// Outcome of a sorting pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SortReport {
    /// Files moved to their project folder.
    pub moved: Vec<PathBuf>,
    /// Files that could not be moved.
    pub failed: Vec<PathBuf>,
    /// Staging sub-folders deleted after processing.
    pub folders_removed: Vec<PathBuf>,
    /// Staging sub-folders kept because something was left inside.
    pub folders_kept: Vec<PathBuf>,
}

impl SortReport {
    fn merge(&mut self, other: SortReport) {
        self.moved.extend(other.moved);
        self.failed.extend(other.failed);
        self.folders_removed.extend(other.folders_removed);
        self.folders_kept.extend(other.folders_kept);
    }
}

/// Project key of a staged file: its name before the first hyphen, trimmed.
pub fn project_key(file_name: &str) -> &str {
    file_name.split('-').next().unwrap_or(file_name).trim()
}

/// Top-level folder name derived from a staging sub-folder name.
pub fn top_level_name(sub_folder: &str, naming: TopLevelNaming) -> String {
    let base = match naming {
        TopLevelNaming::Full => sub_folder,
        TopLevelNaming::Prefix => sub_folder.split('-').next().unwrap_or(sub_folder),
    };
    base.replace(' ', "")
}

/// Moves staged documents, images and transcripts into their project folders.
#[derive(Debug, Clone)]
pub struct Sorter {
    routes: Vec<SortRoute>,
    naming: TopLevelNaming,
}

impl Sorter {
    /// Create a sorter for the document, image and transcript staging roots.
    pub fn new(config: &PipelineConfig) -> Self {
        let folders = &config.folders;
        let params = &config.parameters;
        Self {
            routes: vec![
                SortRoute {
                    staging: folders.json_sorter.clone(),
                    target: folders.json.clone(),
                    extensions: vec![params.document_extension.clone()],
                },
                SortRoute {
                    staging: folders.images_sorter.clone(),
                    target: folders.images.clone(),
                    extensions: params.image_extensions.clone(),
                },
                SortRoute {
                    staging: folders.text_sorter.clone(),
                    target: folders.text.clone(),
                    extensions: vec![params.transcript_extension.clone()],
                },
            ],
            naming: config.sorting.top_level_naming,
        }
    }

    /// Create a sorter over explicit routes.
    pub fn with_routes(routes: Vec<SortRoute>, naming: TopLevelNaming) -> Self {
        Self { routes, naming }
    }

    /// Whether any staging root holds a sub-folder.
    pub fn has_pending(&self) -> Result<bool> {
        for route in &self.routes {
            if fs_util::has_subdirectory(&route.staging)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Sort every staging root. Safe to call when there is nothing staged.
    pub fn start_sorting(&self) -> Result<SortReport> {
        let mut report = SortReport::default();
        for route in &self.routes {
            if !fs_util::has_subdirectory(&route.staging)? {
                debug!("Nothing staged in {}", route.staging.display());
                continue;
            }
            report.merge(self.sort_route(route)?);
        }
        if !report.moved.is_empty() {
            info!(
                "Sorted {} files ({} failed)",
                report.moved.len(),
                report.failed.len()
            );
        }
        Ok(report)
    }

    fn sort_route(&self, route: &SortRoute) -> Result<SortReport> {
        let mut report = SortReport::default();

        for sub_folder in fs_util::subdirectories(&route.staging)? {
            let staged_dir = route.staging.join(&sub_folder);
            let top = top_level_name(&sub_folder, self.naming);

            for file in fs_util::files_with_extensions(&staged_dir, &route.extensions)? {
                match self.move_file(&file, &route.target.join(&top)) {
                    Ok(dest) => report.moved.push(dest),
                    Err(e) => {
                        error!("Error moving file {}: {}", file.display(), e);
                        report.failed.push(file);
                    }
                }
            }

            if fs_util::remove_dir_if_empty(&staged_dir)? {
                report.folders_removed.push(staged_dir);
            } else {
                let leftovers = leftover_names(&staged_dir);
                warn!(
                    "Staging folder {} not removed, still holds: {}",
                    staged_dir.display(),
                    leftovers.join(", ")
                );
                report.folders_kept.push(staged_dir);
            }
        }

        Ok(report)
    }

    fn move_file(&self, file: &Path, top_dir: &Path) -> Result<PathBuf> {
        let name = fs_util::file_name(file);
        let project_dir = top_dir.join(project_key(&name));
        fs::create_dir_all(&project_dir).map_err(|e| fs_util::with_path(e, &project_dir))?;

        let dest = project_dir.join(&name);
        if dest.exists() {
            debug!("Deleting existing file {}", dest.display());
            fs::remove_file(&dest).map_err(|e| fs_util::with_path(e, &dest))?;
        }

        info!("Moving file from {} to {}", file.display(), project_dir.display());
        fs_util::move_path(file, &dest)?;
        Ok(dest)
    }
}

fn leftover_names(dir: &Path) -> Vec<String> {
    fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn setup() -> (tempfile::TempDir, PipelineConfig) {
        let dir = tempfile::tempdir().unwrap();
        let config = PipelineConfig::template(dir.path());
        config.ensure_folders().unwrap();
        (dir, config)
    }

    fn stage(root: &Path, sub_folder: &str, name: &str, content: &str) {
        let dir = root.join(sub_folder);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(name), content).unwrap();
    }

    #[test]
    fn test_project_key() {
        assert_eq!(project_key("ProjA-001-line1.json"), "ProjA");
        assert_eq!(project_key("Loose.json"), "Loose.json");
        assert_eq!(project_key(" P1 -x.png"), "P1");
    }

    #[test]
    fn test_top_level_name() {
        assert_eq!(top_level_name("ProjA-Session (1)", TopLevelNaming::Full), "ProjA-Session(1)");
        assert_eq!(top_level_name("Box 12-Letters", TopLevelNaming::Prefix), "Box12");
    }

    #[test]
    fn test_regroups_by_project_key() {
        let (_dir, config) = setup();
        stage(&config.folders.json_sorter, "ProjA-Session (1)", "ProjA-001-line1.json", "{}");

        let report = Sorter::new(&config).start_sorting().unwrap();

        let expected = config
            .folders
            .json
            .join("ProjA-Session(1)/ProjA/ProjA-001-line1.json");
        assert!(expected.exists());
        assert_eq!(report.moved, vec![expected]);
        assert!(!config.folders.json_sorter.join("ProjA-Session (1)").exists());
    }

    #[test]
    fn test_prefix_naming() {
        let (_dir, mut config) = setup();
        config.sorting.top_level_naming = TopLevelNaming::Prefix;
        stage(&config.folders.images_sorter, "ProjA-Session (1)", "ProjA-001.png", "img");

        Sorter::new(&config).start_sorting().unwrap();

        assert!(config.folders.images.join("ProjA/ProjA/ProjA-001.png").exists());
    }

    #[test]
    fn test_sorts_all_three_roots() {
        let (_dir, config) = setup();
        stage(&config.folders.json_sorter, "Box1", "P1-001.json", "{}");
        stage(&config.folders.images_sorter, "Box1", "P1-001.TIF", "img");
        stage(&config.folders.text_sorter, "Box1", "P1-001.txt", "text");

        let report = Sorter::new(&config).start_sorting().unwrap();

        assert_eq!(report.moved.len(), 3);
        assert!(config.folders.json.join("Box1/P1/P1-001.json").exists());
        assert!(config.folders.images.join("Box1/P1/P1-001.TIF").exists());
        assert!(config.folders.text.join("Box1/P1/P1-001.txt").exists());
    }

    #[test]
    fn test_last_writer_wins() {
        let (_dir, config) = setup();
        let existing = config.folders.json.join("Box1/P1/P1-001.json");
        fs::create_dir_all(existing.parent().unwrap()).unwrap();
        fs::write(&existing, "old").unwrap();
        stage(&config.folders.json_sorter, "Box1", "P1-001.json", "new");

        Sorter::new(&config).start_sorting().unwrap();

        assert_eq!(fs::read_to_string(&existing).unwrap(), "new");
    }

    #[test]
    fn test_keeps_folder_with_leftovers() {
        let (_dir, config) = setup();
        stage(&config.folders.json_sorter, "Box1", "P1-001.json", "{}");
        stage(&config.folders.json_sorter, "Box1", "stray.csv", "x");

        let report = Sorter::new(&config).start_sorting().unwrap();

        let staged = config.folders.json_sorter.join("Box1");
        assert_eq!(report.folders_kept, vec![staged.clone()]);
        assert!(staged.join("stray.csv").exists());
        assert!(!staged.join("P1-001.json").exists());
    }

    #[test]
    fn test_loose_files_are_not_staged_work() {
        let (_dir, config) = setup();
        fs::write(config.folders.json_sorter.join("P1-001.json"), "{}").unwrap();
        let sorter = Sorter::new(&config);

        assert!(!sorter.has_pending().unwrap());
        let report = sorter.start_sorting().unwrap();
        assert_eq!(report, SortReport::default());
        assert!(config.folders.json_sorter.join("P1-001.json").exists());
    }

    #[test]
    fn test_idempotent_on_empty_staging() {
        let (_dir, config) = setup();
        let sorter = Sorter::new(&config);
        assert_eq!(sorter.start_sorting().unwrap(), SortReport::default());
        assert_eq!(sorter.start_sorting().unwrap(), SortReport::default());
    }

    #[test]
    fn test_explicit_routes() {
        let dir = tempfile::tempdir().unwrap();
        let staging = dir.path().join("staging");
        let target = dir.path().join("target");
        stage(&staging, "Box 1", "A-1.xml", "x");

        let sorter = Sorter::with_routes(
            vec![SortRoute {
                staging,
                target: target.clone(),
                extensions: vec![".xml".to_string()],
            }],
            TopLevelNaming::Full,
        );
        sorter.start_sorting().unwrap();

        assert!(target.join("Box1/A/A-1.xml").exists());
    }
}
