//! Folder helpers shared by the pipeline stages.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::Local;
use tracing::debug;

/// Attach a path to an I/O error message.
pub fn with_path(err: io::Error, path: &Path) -> io::Error {
    io::Error::new(err.kind(), format!("{}: {}", path.display(), err))
}

/// Names of the immediate sub-directories of `dir`, sorted ascending.
///
/// A missing directory has no sub-directories.
pub fn subdirectories(dir: &Path) -> io::Result<Vec<String>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut names = Vec::new();
    for entry in fs::read_dir(dir).map_err(|e| with_path(e, dir))? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    names.sort();
    Ok(names)
}

/// Whether `dir` contains at least one directory.
pub fn has_subdirectory(dir: &Path) -> io::Result<bool> {
    Ok(!subdirectories(dir)?.is_empty())
}

/// Whether a file name ends with `extension`, ignoring ASCII case.
pub fn has_extension(file_name: &str, extension: &str) -> bool {
    file_name.len() > extension.len()
        && file_name
            .to_ascii_lowercase()
            .ends_with(&extension.to_ascii_lowercase())
}

/// Index of the first extension in `extensions` that `file_name` ends with.
pub fn matching_extension(file_name: &str, extensions: &[String]) -> Option<usize> {
    extensions.iter().position(|ext| has_extension(file_name, ext))
}

/// Regular files directly inside `dir` whose name ends with one of
/// `extensions`, sorted by file name. A missing directory yields nothing.
pub fn files_with_extensions(dir: &Path, extensions: &[String]) -> io::Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(|e| with_path(e, dir))? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name();
        if matching_extension(&name.to_string_lossy(), extensions).is_some() {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}

/// File name without its last extension.
pub fn base_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// File name of a path as a string.
pub fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Remove `dir` if it exists and is empty. Returns whether it was removed.
pub fn remove_dir_if_empty(dir: &Path) -> io::Result<bool> {
    if !dir.is_dir() {
        return Ok(false);
    }
    if fs::read_dir(dir)?.next().is_some() {
        return Ok(false);
    }
    fs::remove_dir(dir).map_err(|e| with_path(e, dir))?;
    debug!("Removed empty folder {}", dir.display());
    Ok(true)
}

/// Move a file or directory, falling back to copy and delete when a plain
/// rename is refused (for example across file systems).
pub fn move_path(src: &Path, dst: &Path) -> io::Result<()> {
    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent).map_err(|e| with_path(e, parent))?;
    }
    match fs::rename(src, dst) {
        Ok(()) => Ok(()),
        Err(rename_err) => {
            if !src.exists() || dst.exists() {
                return Err(with_path(rename_err, src));
            }
            debug!(
                "Rename of {} failed ({}), copying instead",
                src.display(),
                rename_err
            );
            if src.is_dir() {
                copy_dir(src, dst)?;
                fs::remove_dir_all(src).map_err(|e| with_path(e, src))
            } else {
                fs::copy(src, dst).map_err(|e| with_path(e, src))?;
                fs::remove_file(src).map_err(|e| with_path(e, src))
            }
        }
    }
}

fn copy_dir(src: &Path, dst: &Path) -> io::Result<()> {
    fs::create_dir_all(dst).map_err(|e| with_path(e, dst))?;
    for entry in fs::read_dir(src).map_err(|e| with_path(e, src))? {
        let entry = entry?;
        let target = dst.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir(&entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), &target).map_err(|e| with_path(e, &entry.path()))?;
        }
    }
    Ok(())
}

/// A path named `name` inside `dir` that does not exist yet.
///
/// A taken name gets a `_YYYYmmddHHMMSS` suffix, then a counter.
pub fn unique_destination(dir: &Path, name: &str) -> PathBuf {
    let candidate = dir.join(name);
    if !candidate.exists() {
        return candidate;
    }
    let stamped = format!("{}_{}", name, Local::now().format("%Y%m%d%H%M%S"));
    let candidate = dir.join(&stamped);
    if !candidate.exists() {
        return candidate;
    }
    (1..)
        .map(|n| dir.join(format!("{}_{}", stamped, n)))
        .find(|p| !p.exists())
        .unwrap_or(candidate)
}

/// Move `src` into `dir` under `name`, never replacing anything there.
/// Returns the final location.
pub fn move_into_unique(src: &Path, dir: &Path, name: &str) -> io::Result<PathBuf> {
    fs::create_dir_all(dir).map_err(|e| with_path(e, dir))?;
    let dst = unique_destination(dir, name);
    move_path(src, &dst)?;
    Ok(dst)
}
