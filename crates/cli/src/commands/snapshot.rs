//! Loads a project directory into a [`FileSnapshot`].

use std::io;
use std::path::Path;

use codeweave_core::file::{FileSnapshot, ProjectFile};
use ignore::WalkBuilder;
use tracing::debug;

/// Directories never descended into, even without a `.gitignore` naming them.
const SKIPPED_DIRS: &[&str] = &[".git", "target", "node_modules", "dist", "build", ".next", "__pycache__"];

/// Files above this size are left out.
const MAX_FILE_BYTES: u64 = 512 * 1024;

/// Read every text file under `root`, with `/`-separated names relative to
/// it, sorted by name.
///
/// `.gitignore` rules are honoured. Hidden files such as `.env` are kept so
/// the protected-path policy can see them. Binary and oversized files are
/// skipped.
pub fn load_dir(root: &Path) -> io::Result<FileSnapshot> {
    if !root.is_dir() {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("{} is not a directory", root.display()),
        ));
    }

    let walker = WalkBuilder::new(root)
        .hidden(false)
        .require_git(false)
        .git_global(false)
        .filter_entry(|entry| {
            let is_dir = entry.file_type().is_some_and(|t| t.is_dir());
            !(is_dir && entry.file_name().to_str().is_some_and(|n| SKIPPED_DIRS.contains(&n)))
        })
        .build();

    let mut files = Vec::new();
    for entry in walker {
        let entry = entry.map_err(io::Error::other)?;
        if !entry.file_type().is_some_and(|t| t.is_file()) {
            continue;
        }
        if let Some(file) = read_text_file(root, entry.path())? {
            files.push(file);
        }
    }

    files.sort_by(|a, b| a.name.cmp(&b.name));
    debug!(root = %root.display(), files = files.len(), "Project loaded");
    Ok(FileSnapshot::new(files))
}

fn read_text_file(root: &Path, path: &Path) -> io::Result<Option<ProjectFile>> {
    if std::fs::metadata(path)?.len() > MAX_FILE_BYTES {
        debug!(file = %path.display(), "Skipping oversized file");
        return Ok(None);
    }

    let bytes = std::fs::read(path)?;
    if bytes.contains(&0) {
        debug!(file = %path.display(), "Skipping binary file");
        return Ok(None);
    }
    let Ok(content) = String::from_utf8(bytes) else {
        debug!(file = %path.display(), "Skipping non-UTF-8 file");
        return Ok(None);
    };

    let relative = path.strip_prefix(root).unwrap_or(path);
    let name = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/");
    Ok(Some(ProjectFile::new(name, content)))
}
