//! `package.json` reading and monorepo discovery.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::Value as JsonValue;
use tracing::{debug, warn};

use crate::errors::ConfectTypegenError;

/// Substring that marks the companion framework package among dependencies.
pub(crate) const MODULE_MARKER: &str = "confect";

/// Augmented module used when no dependency carries the marker.
pub const DEFAULT_MODULE_NAME: &str = "@confect/core";

pub(crate) const MANIFEST_FILE: &str = "package.json";

/// The parts of a `package.json` the generator cares about.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PackageManifest
{
    pub(crate) name: Option<String>,
    #[serde(default)]
    pub(crate) workspaces: Option<JsonValue>,
    #[serde(default)]
    dependencies: BTreeMap<String, JsonValue>,
    #[serde(default)]
    dev_dependencies: BTreeMap<String, JsonValue>,
    #[serde(default)]
    peer_dependencies: BTreeMap<String, JsonValue>,
}

impl PackageManifest
{
    /// Reads `dir/package.json`; `Ok(None)` when the file does not exist.
    pub(crate) fn read_from_dir(dir: &Path) -> Result<Option<Self>, ConfectTypegenError>
    {
        let path = dir.join(MANIFEST_FILE);
        if !path.is_file() {
            return Ok(None);
        }

        let text = fs::read_to_string(&path).map_err(|error| ConfectTypegenError::IOError {
            file: path.display().to_string(),
            error,
        })?;

        serde_json::from_str(&text)
            .map(Some)
            .map_err(|e| ConfectTypegenError::InvalidManifest {
                file: path.display().to_string(),
                details: e.to_string(),
            })
    }

    /// Dependency names: dependencies, then devDependencies, then peerDependencies.
    pub(crate) fn dependency_names(&self) -> impl Iterator<Item = &str>
    {
        self.dependencies
            .keys()
            .chain(self.dev_dependencies.keys())
            .chain(self.peer_dependencies.keys())
            .map(String::as_str)
    }

    pub(crate) fn depends_on(&self, package: &str) -> bool
    {
        self.dependency_names().any(|name| name == package)
    }

    /// Glob patterns of a `workspaces` field (array or `{ packages: [...] }`).
    pub(crate) fn workspace_patterns(&self) -> Vec<String>
    {
        let patterns = match &self.workspaces {
            Some(JsonValue::Array(patterns)) => patterns,
            Some(JsonValue::Object(map)) => match map.get("packages") {
                Some(JsonValue::Array(patterns)) => patterns,
                _ => return Vec::new(),
            },
            _ => return Vec::new(),
        };

        patterns.iter().filter_map(|p| p.as_str().map(str::to_string)).collect()
    }
}

/// Picks the module to augment from the project's manifest.
///
/// The first dependency whose name contains [`MODULE_MARKER`] wins; otherwise
/// [`DEFAULT_MODULE_NAME`].
pub(crate) fn detect_module_name(project_root: &Path) -> String
{
    let manifest = match PackageManifest::read_from_dir(project_root) {
        Ok(manifest) => manifest,
        Err(e) => {
            warn!("⚠️  Could not read project manifest: {e}");
            None
        }
    };

    let detected = manifest
        .as_ref()
        .and_then(|m| m.dependency_names().find(|name| name.contains(MODULE_MARKER)))
        .map(str::to_string);

    match detected {
        Some(name) => {
            debug!("Augmenting detected module {name}");
            name
        }
        None => {
            debug!("No {MODULE_MARKER} dependency found, augmenting {DEFAULT_MODULE_NAME}");
            DEFAULT_MODULE_NAME.to_string()
        }
    }
}

/// Walks upward from `start` to the first manifest with a `workspaces` field.
pub(crate) fn find_workspace_root(start: &Path) -> Result<Option<(PathBuf, PackageManifest)>, ConfectTypegenError>
{
    for dir in start.ancestors() {
        if let Some(manifest) = PackageManifest::read_from_dir(dir)? {
            if manifest.workspaces.is_some() {
                return Ok(Some((dir.to_path_buf(), manifest)));
            }
        }
    }
    Ok(None)
}

/// Directories matched by the workspace globs that contain a manifest, canonicalized and sorted.
pub(crate) fn workspace_packages(root: &Path, manifest: &PackageManifest) -> Result<Vec<PathBuf>, ConfectTypegenError>
{
    let mut packages = Vec::new();

    for pattern in manifest.workspace_patterns() {
        let full = root.join(&pattern);
        let paths = glob::glob(&full.to_string_lossy()).map_err(|e| ConfectTypegenError::InvalidManifest {
            file: root.join(MANIFEST_FILE).display().to_string(),
            details: format!("invalid workspace pattern '{pattern}': {e}"),
        })?;

        for path in paths.filter_map(Result::ok) {
            if path.join(MANIFEST_FILE).is_file() {
                packages.push(path.canonicalize()?);
            }
        }
    }

    packages.sort();
    packages.dedup();
    Ok(packages)
}
