use crate::error::{CommitGridError, Result};
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use tempfile::NamedTempFile;

/// New contents written and synced next to their destination, not yet
/// moved over it. Dropping a staged file removes the temp file.
pub struct StagedFile {
    path: PathBuf,
    tmp: NamedTempFile,
}

impl StagedFile {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Renames the temp file over the destination.
    pub fn commit(self) -> Result<()> {
        let path = self.path;
        self.tmp
            .persist(&path)
            .map_err(|e| CommitGridError::write(&path, e.error))?;
        Ok(())
    }
}

pub fn stage(path: &Path, contents: &[u8]) -> Result<StagedFile> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&parent).map_err(|e| CommitGridError::write(path, e))?;

    let mut tmp = NamedTempFile::new_in(&parent).map_err(|e| CommitGridError::write(path, e))?;
    tmp.write_all(contents).map_err(|e| CommitGridError::write(path, e))?;
    tmp.as_file().sync_all().map_err(|e| CommitGridError::write(path, e))?;
    Ok(StagedFile {
        path: path.to_path_buf(),
        tmp,
    })
}

/// Replaces every file in `files` so readers see either the old file or
/// the new one, never a partial write. All files are staged before the
/// first rename; if any of them cannot be staged nothing is replaced.
pub fn write_all_atomic(files: &[(&Path, &[u8])]) -> Result<()> {
    let staged = files
        .iter()
        .map(|(path, contents)| stage(path, contents))
        .collect::<Result<Vec<_>>>()?;
    for file in staged {
        file.commit()?;
    }
    Ok(())
}

/// Link to `target` as seen from a document stored at `from`.
pub fn relative_link(from: &Path, target: &Path) -> String {
    let from_dir = from.parent().unwrap_or_else(|| Path::new(""));
    if from_dir.has_root() != target.has_root() {
        return target.to_string_lossy().replace('\\', "/");
    }
    let from_dir = normalize(from_dir);
    let target = normalize(target);

    let common = from_dir
        .iter()
        .zip(target.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut link = PathBuf::new();
    for _ in common..from_dir.len() {
        link.push("..");
    }
    for part in &target[common..] {
        link.push(part);
    }
    link.to_string_lossy().replace('\\', "/")
}

fn normalize(path: &Path) -> Vec<std::ffi::OsString> {
    let mut parts = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                parts.pop();
            }
            other => parts.push(other.as_os_str().to_os_string()),
        }
    }
    parts
}
