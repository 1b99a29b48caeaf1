//! Discovery of unchecked files and transfer of clean ones.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.starts_with('.'))
}

/// All regular files below `root` in sorted order, hidden entries skipped.
pub fn walk_files(root: &Path) -> impl Iterator<Item = PathBuf> {
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| !is_hidden(entry))
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(DirEntry::into_path)
}

fn prepare_target(target: &Path) -> Result<()> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    Ok(())
}

/// Move a file, falling back to copy and remove across filesystems.
pub fn move_file(source: &Path, target: &Path) -> Result<()> {
    prepare_target(target)?;
    if fs::rename(source, target).is_ok() {
        return Ok(());
    }
    fs::copy(source, target).with_context(|| {
        format!(
            "Failed to move {} to {}",
            source.display(),
            target.display()
        )
    })?;
    fs::remove_file(source).with_context(|| format!("Failed to remove {}", source.display()))?;
    Ok(())
}

pub fn copy_file(source: &Path, target: &Path) -> Result<()> {
    prepare_target(target)?;
    fs::copy(source, target).with_context(|| {
        format!(
            "Failed to copy {} to {}",
            source.display(),
            target.display()
        )
    })?;
    Ok(())
}
