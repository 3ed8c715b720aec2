//! The single traversal over the Convex directory.
//!
//! Each source file is parsed once and handed to both the function extractor
//! and the definition index; the results accumulate in a [`ScanIndex`].

use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

use crate::ast::parse_file;
use crate::errors::ConfectTypegenError;
use crate::extract::extract_functions;
use crate::resolve::DefinitionIndex;
use crate::types::ExtractedFunction;

/// Directory names never descended into.
pub(crate) const EXCLUDED_DIRS: &[&str] = &["node_modules", "_generated", "_generated-types", ".git", "dist"];

/// Everything a scan learned about the tree.
#[derive(Debug, Default)]
pub(crate) struct ScanIndex
{
    /// Recognized functions, sorted by `full_key`.
    pub(crate) functions: Vec<ExtractedFunction>,
    pub(crate) definitions: DefinitionIndex,
    /// Files that failed to parse, relative to the root.
    pub(crate) skipped_files: Vec<PathBuf>,
}

/// Walks `root` and builds the scan index.
///
/// # Errors
/// Directory and read errors abort the scan. Files that fail to parse are
/// skipped with a warning.
pub(crate) fn scan(root: &Path) -> Result<ScanIndex, ConfectTypegenError>
{
    let mut index = ScanIndex::default();

    let walker = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| !is_excluded_dir(entry));

    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_file() || !is_source_file(entry.path()) {
            continue;
        }

        let relative = entry
            .path()
            .strip_prefix(root)
            .map_err(|_| ConfectTypegenError::InvalidPath(entry.path().display().to_string()))?;

        match parse_file(entry.path()) {
            Ok(file) => {
                let functions = extract_functions(&file, relative);
                debug!("{}: {} function(s)", relative.display(), functions.len());
                index.functions.extend(functions);
                index.definitions.index_file(&file, relative);
            }
            Err(ConfectTypegenError::ParsingFailed { file, details }) => {
                warn!("⚠️  Skipping {file}: {details}");
                index.skipped_files.push(relative.to_path_buf());
            }
            Err(other) => return Err(other),
        }
    }

    index.functions.sort_by(|a, b| a.full_key.cmp(&b.full_key));

    Ok(index)
}

/// `.ts` sources, excluding declaration files.
pub(crate) fn is_source_file(path: &Path) -> bool
{
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.ends_with(".ts") && !name.ends_with(".d.ts"))
}

/// Whether any component of `path` is an excluded directory.
pub(crate) fn in_excluded_dir(path: &Path) -> bool
{
    path.components()
        .any(|component| component.as_os_str().to_str().is_some_and(|name| EXCLUDED_DIRS.contains(&name)))
}

fn is_excluded_dir(entry: &DirEntry) -> bool
{
    entry.depth() > 0
        && entry.file_type().is_dir()
        && entry.file_name().to_str().is_some_and(|name| EXCLUDED_DIRS.contains(&name))
}
