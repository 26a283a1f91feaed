//! ALTO-XML generation for reconciled folders.
//!
//! One ALTO file is written per sub-folder to
//! `<archive>/<top>/<sub>/<name>.xml`, after which the consumed document,
//! image and transcript folders are moved next to it.

pub mod geometry;
pub mod writer;

pub use geometry::{PageSize, PixelBox, Space};
pub use writer::AltoWriter;

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{AltoError, Result};
use crate::fs_util;
use crate::models::config::{PageSizing, PipelineConfig};
use crate::ocr::OcrDocument;
use crate::reconcile::ReadyFolder;

/// File name (without extension) of the ALTO document for a sub-folder:
/// parentheses dropped, cut at the first hyphen, spaces removed.
pub fn output_name(sub_folder: &str) -> String {
    let stripped = sub_folder.replace(['(', ')'], "");
    stripped
        .split('-')
        .next()
        .unwrap_or_default()
        .replace(' ', "")
}

/// Generates ALTO files and archives the folders they were built from.
#[derive(Debug, Clone)]
pub struct AltoGenerator {
    archive_root: PathBuf,
    document_extension: String,
    image_extensions: Vec<String>,
    json_label: String,
    image_label: String,
    text_label: String,
    software_name: String,
    page_sizing: PageSizing,
    overwrite: bool,
}

impl AltoGenerator {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            archive_root: config.folders.archive.clone(),
            document_extension: config.parameters.document_extension.clone(),
            image_extensions: config.parameters.image_extensions.clone(),
            json_label: config.archive.json_label.clone(),
            image_label: config.archive.image_label.clone(),
            text_label: config.archive.text_label.clone(),
            software_name: config.archive.software_name.clone(),
            page_sizing: config.archive.page_sizing,
            overwrite: config.parameters.overwrite_files,
        }
    }

    /// Archive folder for a sub-folder.
    pub fn archive_dir(&self, folder: &ReadyFolder) -> PathBuf {
        self.archive_root.join(&folder.top_level).join(&folder.name)
    }

    /// Write the ALTO document for `folder` and archive its inputs.
    /// Returns the path of the written file.
    pub fn generate(&self, folder: &ReadyFolder) -> Result<PathBuf> {
        if folder.pages.is_empty() {
            return Err(AltoError::EmptyFolder(folder.json_dir.clone()).into());
        }

        let available = fs_util::files_with_extensions(&folder.image_dir, &self.image_extensions)?;
        let images = folder
            .pages
            .iter()
            .map(|page| self.find_image(&folder.image_dir, &available, page))
            .collect::<Result<Vec<_>>>()?;

        let out_dir = self.archive_dir(folder);
        let moves = self.archive_moves(folder, &out_dir)?;

        let mut alto = AltoWriter::start(Vec::new(), &self.software_name)?;
        let mut representative = None;
        for (page, image) in folder.pages.iter().zip(&images) {
            let size = match (self.page_sizing, representative) {
                (PageSizing::Representative, Some(size)) => size,
                _ => {
                    let (width, height) = image::image_dimensions(image)?;
                    debug!("{} is {}x{}", image.display(), width, height);
                    PageSize::new(width, height)
                }
            };
            if representative.is_none() {
                representative = Some(size);
            }

            let doc_path = folder
                .json_dir
                .join(format!("{}{}", page, self.document_extension));
            let document = OcrDocument::from_path(&doc_path)?;
            alto.write_page(page, size, &document)?;
        }
        let xml = alto.finish()?;

        fs::create_dir_all(&out_dir).map_err(|e| fs_util::with_path(e, &out_dir))?;
        let output = out_dir.join(format!("{}.xml", output_name(&folder.name)));
        fs::write(&output, xml).map_err(|e| fs_util::with_path(e, &output))?;
        info!(
            "Wrote {} ({} pages) for {}",
            output.display(),
            folder.pages.len(),
            folder.json_dir.display()
        );

        for (source, dest) in moves {
            if dest.exists() {
                debug!("Replacing {}", dest.display());
                fs::remove_dir_all(&dest).map_err(|e| fs_util::with_path(e, &dest))?;
            }
            fs_util::move_path(&source, &dest)?;
            debug!("Archived {} as {}", source.display(), dest.display());
        }

        Ok(output)
    }

    /// Image of `page` among `available`, preferring the earliest configured
    /// extension. Extensions match regardless of case.
    fn find_image(&self, image_dir: &Path, available: &[PathBuf], page: &str) -> Result<PathBuf> {
        available
            .iter()
            .filter(|path| fs_util::base_name(path) == page)
            .min_by_key(|path| {
                fs_util::matching_extension(&fs_util::file_name(path), &self.image_extensions)
            })
            .cloned()
            .ok_or_else(|| {
                AltoError::MissingImage {
                    folder: image_dir.to_path_buf(),
                    page: page.to_string(),
                }
                .into()
            })
    }

    /// Source and destination of every folder to archive. Fails before
    /// anything is written when a destination is taken and overwriting is
    /// off.
    fn archive_moves(&self, folder: &ReadyFolder, out_dir: &Path) -> Result<Vec<(PathBuf, PathBuf)>> {
        let mut moves = vec![
            (folder.json_dir.clone(), out_dir.join(&self.json_label)),
            (folder.image_dir.clone(), out_dir.join(&self.image_label)),
        ];
        if let Some(text_dir) = &folder.text_dir {
            moves.push((text_dir.clone(), out_dir.join(&self.text_label)));
        }

        if !self.overwrite {
            if let Some((_, taken)) = moves.iter().find(|(_, dest)| dest.exists()) {
                return Err(AltoError::ArchiveCollision(taken.clone()).into());
            }
        }
        Ok(moves)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;
    use crate::ocr::fixtures::single_line;
    use pretty_assertions::assert_eq;

    fn write_png(path: &Path, width: u32, height: u32) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        image::RgbImage::new(width, height).save(path).unwrap();
    }

    fn ready_folder(config: &PipelineConfig, pages: &[(&str, u32, u32)]) -> ReadyFolder {
        let json_dir = config.folders.json.join("Box1/ProjA-Letters (2)");
        let image_dir = config.folders.images.join("Box1/ProjA-Letters (2)");
        fs::create_dir_all(&json_dir).unwrap();
        for (page, width, height) in pages {
            single_line("Dear Sir", 91.0)
                .save(&json_dir.join(format!("{page}.json")))
                .unwrap();
            write_png(&image_dir.join(format!("{page}.png")), *width, *height);
        }
        ReadyFolder {
            top_level: "Box1".to_string(),
            name: "ProjA-Letters (2)".to_string(),
            json_dir,
            image_dir,
            text_dir: None,
            pages: pages.iter().map(|(p, _, _)| p.to_string()).collect(),
        }
    }

    fn setup() -> (tempfile::TempDir, PipelineConfig) {
        let dir = tempfile::tempdir().unwrap();
        let config = PipelineConfig::template(dir.path());
        config.ensure_folders().unwrap();
        (dir, config)
    }

    #[test]
    fn test_output_name() {
        assert_eq!(output_name("ProjA-Letters (2)"), "ProjA");
        assert_eq!(output_name("Box 12 (a)"), "Box12a");
        assert_eq!(output_name("Plain"), "Plain");
    }

    #[test]
    fn test_generate_writes_alto_and_archives() {
        let (_dir, config) = setup();
        let folder = ready_folder(&config, &[("p1", 200, 100), ("p2", 200, 100)]);

        let output = AltoGenerator::new(&config).generate(&folder).unwrap();

        let archive = config.folders.archive.join("Box1/ProjA-Letters (2)");
        assert_eq!(output, archive.join("ProjA.xml"));
        let xml = fs::read_to_string(&output).unwrap();
        assert!(xml.contains("ID=\"line_0\""));
        assert!(xml.contains("ID=\"line_1\""));
        assert!(xml.contains("WIDTH=\"200\" HEIGHT=\"100\""));

        assert!(!folder.json_dir.exists());
        assert!(!folder.image_dir.exists());
        assert!(archive.join("json/p1.json").exists());
        assert!(archive.join("images/p2.png").exists());
    }

    #[test]
    fn test_representative_size_applies_to_every_page() {
        let (_dir, config) = setup();
        let folder = ready_folder(&config, &[("p1", 200, 100), ("p2", 50, 40)]);

        let output = AltoGenerator::new(&config).generate(&folder).unwrap();
        let xml = fs::read_to_string(output).unwrap();
        assert_eq!(xml.matches("WIDTH=\"200\" HEIGHT=\"100\"").count(), 4);
        assert!(!xml.contains("WIDTH=\"50\" HEIGHT=\"40\""));
    }

    #[test]
    fn test_per_page_sizing() {
        let (_dir, mut config) = setup();
        config.archive.page_sizing = PageSizing::PerPage;
        let folder = ready_folder(&config, &[("p1", 200, 100), ("p2", 50, 40)]);

        let output = AltoGenerator::new(&config).generate(&folder).unwrap();
        let xml = fs::read_to_string(output).unwrap();
        assert!(xml.contains("WIDTH=\"50\" HEIGHT=\"40\""));
    }

    #[test]
    fn test_missing_image_is_error() {
        let (_dir, config) = setup();
        let mut folder = ready_folder(&config, &[("p1", 10, 10)]);
        folder.pages.push("p2".to_string());

        let err = AltoGenerator::new(&config).generate(&folder).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Alto(AltoError::MissingImage { ref page, .. }) if page == "p2"
        ));
        assert!(folder.json_dir.exists());
    }

    #[test]
    fn test_uppercase_extension_is_found() {
        let (_dir, config) = setup();
        let mut folder = ready_folder(&config, &[]);
        single_line("Dear Sir", 91.0)
            .save(&folder.json_dir.join("p1.json"))
            .unwrap();
        write_png(&folder.image_dir.join("p1.PNG"), 40, 20);
        folder.pages.push("p1".to_string());

        let output = AltoGenerator::new(&config).generate(&folder).unwrap();

        let xml = fs::read_to_string(output).unwrap();
        assert!(xml.contains("WIDTH=\"40\" HEIGHT=\"20\""));
        assert!(config
            .folders
            .archive
            .join("Box1/ProjA-Letters (2)/images/p1.PNG")
            .exists());
    }

    #[test]
    fn test_transcripts_are_archived() {
        let (_dir, config) = setup();
        let mut folder = ready_folder(&config, &[("p1", 10, 10)]);
        let text_dir = config.folders.text.join("Box1/ProjA-Letters (2)");
        fs::create_dir_all(&text_dir).unwrap();
        fs::write(text_dir.join("p1.txt"), "Dear Sir").unwrap();
        folder.text_dir = Some(text_dir.clone());

        AltoGenerator::new(&config).generate(&folder).unwrap();

        let archived = config.folders.archive.join("Box1/ProjA-Letters (2)/text/p1.txt");
        assert_eq!(fs::read_to_string(archived).unwrap(), "Dear Sir");
        assert!(!text_dir.exists());
    }

    #[test]
    fn test_collision_without_overwrite() {
        let (_dir, mut config) = setup();
        config.parameters.overwrite_files = false;
        let folder = ready_folder(&config, &[("p1", 10, 10)]);
        let generator = AltoGenerator::new(&config);
        fs::create_dir_all(generator.archive_dir(&folder).join("images")).unwrap();

        let err = generator.generate(&folder).unwrap_err();
        assert!(matches!(err, PipelineError::Alto(AltoError::ArchiveCollision(_))));
        assert!(folder.json_dir.exists());
        assert!(!generator.archive_dir(&folder).join("ProjA.xml").exists());
    }

    #[test]
    fn test_collision_with_overwrite_replaces() {
        let (_dir, config) = setup();
        let folder = ready_folder(&config, &[("p1", 10, 10)]);
        let generator = AltoGenerator::new(&config);
        let stale = generator.archive_dir(&folder).join("json");
        fs::create_dir_all(&stale).unwrap();
        fs::write(stale.join("old.json"), "{}").unwrap();

        generator.generate(&folder).unwrap();

        assert!(stale.join("p1.json").exists());
        assert!(!stale.join("old.json").exists());
    }

    #[test]
    fn test_empty_folder_is_error() {
        let (_dir, config) = setup();
        let mut folder = ready_folder(&config, &[("p1", 10, 10)]);
        folder.pages.clear();
        let err = AltoGenerator::new(&config).generate(&folder).unwrap_err();
        assert!(matches!(err, PipelineError::Alto(AltoError::EmptyFolder(_))));
    }
}
