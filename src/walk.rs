//! Recursive directory listing with `parent_path` inheritance.
//!
//! A directory `foo/` that has a sibling file `foo.mdx` is "owned" by that
//! file: every file below `foo/` gets `foo.mdx` as its parent path, unless a
//! deeper directory has its own same-named sibling.

use anyhow::{Context, Result};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use docsync_core::models::FileRef;

/// List every regular file under `root`, sorted by full path.
///
/// # Errors
///
/// Any read or stat failure (including a missing `root`) aborts the walk.
pub fn walk(root: &Path, follow_symlinks: bool) -> Result<Vec<FileRef>> {
    walk_with_parent(root, None, follow_symlinks)
}

/// Like [`walk`], with `parent_path` inherited by files that no nearer
/// directory owns.
pub fn walk_with_parent(
    root: &Path,
    parent_path: Option<PathBuf>,
    follow_symlinks: bool,
) -> Result<Vec<FileRef>> {
    // parents[d] is the parent path for entries at depth d + 1
    let mut parents: Vec<Option<PathBuf>> = vec![parent_path];
    let mut files = Vec::new();

    let walker = WalkDir::new(root).min_depth(1).follow_links(follow_symlinks);
    for entry in walker {
        let entry = entry.with_context(|| format!("Failed to walk {}", root.display()))?;
        let depth = entry.depth();
        parents.truncate(depth);
        let inherited = parents.last().cloned().flatten();

        let file_type = entry.file_type();
        if file_type.is_dir() {
            let owner = owning_document(entry.path())?;
            parents.push(owner.or(inherited));
        } else if file_type.is_file() {
            files.push(FileRef {
                path: entry.into_path(),
                parent_path: inherited,
            });
        }
    }

    // byte order of the whole path, so `api.mdx` sorts before `api/…`
    files.sort_by(|a, b| a.path.as_os_str().cmp(b.path.as_os_str()));
    Ok(files)
}

/// `<dir>.mdx` next to `dir`, if it exists.
fn owning_document(dir: &Path) -> Result<Option<PathBuf>> {
    let Some(name) = dir.file_name() else {
        return Ok(None);
    };
    let mut sibling_name = name.to_os_string();
    sibling_name.push(".mdx");
    let sibling = dir.with_file_name(sibling_name);

    match std::fs::symlink_metadata(&sibling) {
        Ok(_) => Ok(Some(sibling)),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err).with_context(|| format!("Failed to stat {}", sibling.display())),
    }
}
