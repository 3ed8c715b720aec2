//! Housekeeping performed after the declaration file is written.
//!
//! Each [`PostStep`] is independent: a failing step is logged and the
//! remaining steps still run.

use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Component, Path};

use serde_json::{Map, Value as JsonValue};
use tracing::{debug, info, warn};

use crate::errors::ConfectTypegenError;
use crate::manifest::{find_workspace_root, workspace_packages, PackageManifest, MANIFEST_FILE};

/// Subpath export added to the backend manifest.
pub(crate) const EXPORT_SUBPATH: &str = "./confect-types";

/// Stub written into consuming workspace packages.
pub(crate) const REFERENCE_STUB_FILE: &str = "confect-env.d.ts";

const IGNORE_FILE: &str = ".gitignore";

/// What a step needs to know about the run.
#[derive(Debug)]
pub(crate) struct PostContext<'a>
{
    /// Absolute backend project directory (parent of the Convex directory).
    pub(crate) project_root: &'a Path,
    /// Absolute path of the generated file.
    pub(crate) out_file: &'a Path,
    /// Module augmented by the generated file.
    pub(crate) module_name: &'a str,
}

/// Post-processing steps, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PostStep
{
    /// Add the generated file to `.gitignore`.
    IgnoreGenerated,
    /// Write reference stubs into workspace packages that use the framework.
    ReferenceStubs,
    /// Expose the generated file as a subpath export.
    ManifestExport,
}

/// Result of a step that did not fail.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum StepOutcome
{
    Changed(String),
    Unchanged,
}

impl PostStep
{
    pub(crate) const ALL: [PostStep; 3] = [Self::IgnoreGenerated, Self::ReferenceStubs, Self::ManifestExport];

    pub(crate) fn run(self, ctx: &PostContext<'_>) -> Result<StepOutcome, ConfectTypegenError>
    {
        match self {
            Self::IgnoreGenerated => ignore_generated(ctx),
            Self::ReferenceStubs => write_reference_stubs(ctx),
            Self::ManifestExport => patch_manifest_export(ctx),
        }
    }
}

impl fmt::Display for PostStep
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        match self {
            Self::IgnoreGenerated => write!(f, "ignore-file update"),
            Self::ReferenceStubs => write!(f, "reference stubs"),
            Self::ManifestExport => write!(f, "manifest export"),
        }
    }
}

/// Runs every step, logging failures without stopping.
pub(crate) fn run_all(ctx: &PostContext<'_>)
{
    for step in PostStep::ALL {
        match step.run(ctx) {
            Ok(StepOutcome::Changed(message)) => info!("✅ {message}"),
            Ok(StepOutcome::Unchanged) => debug!("{step}: nothing to do"),
            Err(e) => warn!("⚠️  {step} failed: {e}"),
        }
    }
}

fn ignore_generated(ctx: &PostContext<'_>) -> Result<StepOutcome, ConfectTypegenError>
{
    let Some(pattern) = relative_to_project(ctx) else {
        return Ok(StepOutcome::Unchanged);
    };

    let ignore_path = ctx.project_root.join(IGNORE_FILE);
    let existing = match fs::read_to_string(&ignore_path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => return Err(ConfectTypegenError::from(e).with_file_context(ignore_path.display().to_string())),
    };

    if existing.lines().any(|line| line.trim() == pattern) {
        return Ok(StepOutcome::Unchanged);
    }

    let mut entry = String::new();
    if !existing.is_empty() && !existing.ends_with('\n') {
        entry.push('\n');
    }
    entry.push_str(&pattern);
    entry.push('\n');

    OpenOptions::new()
        .create(true)
        .append(true)
        .open(&ignore_path)
        .and_then(|mut file| file.write_all(entry.as_bytes()))
        .map_err(|e| ConfectTypegenError::from(e).with_file_context(ignore_path.display().to_string()))?;

    Ok(StepOutcome::Changed(format!("Added {pattern} to {IGNORE_FILE}")))
}

fn write_reference_stubs(ctx: &PostContext<'_>) -> Result<StepOutcome, ConfectTypegenError>
{
    let Some((workspace_root, workspace)) = find_workspace_root(ctx.project_root)? else {
        return Ok(StepOutcome::Unchanged);
    };

    let backend_name = PackageManifest::read_from_dir(ctx.project_root)?
        .and_then(|m| m.name)
        .ok_or_else(|| ConfectTypegenError::InvalidManifest {
            file: ctx.project_root.join(MANIFEST_FILE).display().to_string(),
            details: "backend package has no name".to_string(),
        })?;
    let stub = reference_stub(&backend_name);

    let mut written = Vec::new();
    for package_dir in workspace_packages(&workspace_root, &workspace)? {
        if package_dir == ctx.project_root {
            continue;
        }
        let Some(manifest) = PackageManifest::read_from_dir(&package_dir)? else {
            continue;
        };
        if !manifest.depends_on(ctx.module_name) {
            continue;
        }

        let stub_path = package_dir.join(REFERENCE_STUB_FILE);
        if fs::read_to_string(&stub_path).is_ok_and(|current| current == stub) {
            continue;
        }
        fs::write(&stub_path, &stub).map_err(|error| ConfectTypegenError::IOError {
            file: stub_path.display().to_string(),
            error,
        })?;
        written.push(manifest.name.unwrap_or_else(|| package_dir.display().to_string()));
    }

    if written.is_empty() {
        Ok(StepOutcome::Unchanged)
    } else {
        Ok(StepOutcome::Changed(format!("Wrote {REFERENCE_STUB_FILE} into {}", written.join(", "))))
    }
}

fn reference_stub(backend_name: &str) -> String
{
    format!(
        "// Generated by confect-generate. Loads the error types of {backend_name}.\n\
         /// <reference types=\"{backend_name}/confect-types\" />\n"
    )
}

fn patch_manifest_export(ctx: &PostContext<'_>) -> Result<StepOutcome, ConfectTypegenError>
{
    let manifest_path = ctx.project_root.join(MANIFEST_FILE);
    if !manifest_path.is_file() {
        return Ok(StepOutcome::Unchanged);
    }
    let relative = relative_to_project(ctx).ok_or_else(|| {
        ConfectTypegenError::InvalidPath(format!("{} is outside the project", ctx.out_file.display()))
    })?;
    let target = JsonValue::String(format!("./{relative}"));

    let text = fs::read_to_string(&manifest_path).map_err(|error| ConfectTypegenError::IOError {
        file: manifest_path.display().to_string(),
        error,
    })?;
    let invalid = |details: &str| ConfectTypegenError::InvalidManifest {
        file: manifest_path.display().to_string(),
        details: details.to_string(),
    };

    let mut manifest: JsonValue = serde_json::from_str(&text).map_err(|e| invalid(&e.to_string()))?;
    let fields = manifest.as_object_mut().ok_or_else(|| invalid("not a JSON object"))?;

    let exports = fields
        .entry("exports")
        .or_insert_with(|| JsonValue::Object(Map::new()));
    if let Some(main) = exports.as_str().map(str::to_string) {
        let mut map = Map::new();
        map.insert(".".to_string(), JsonValue::String(main));
        *exports = JsonValue::Object(map);
    }
    let exports = exports
        .as_object_mut()
        .ok_or_else(|| invalid("\"exports\" must be an object or a string"))?;

    if exports.get(EXPORT_SUBPATH) == Some(&target) {
        return Ok(StepOutcome::Unchanged);
    }
    exports.insert(EXPORT_SUBPATH.to_string(), target);

    let mut updated = serde_json::to_string_pretty(&manifest)?;
    updated.push('\n');
    fs::write(&manifest_path, updated).map_err(|error| ConfectTypegenError::IOError {
        file: manifest_path.display().to_string(),
        error,
    })?;

    Ok(StepOutcome::Changed(format!("Exported {EXPORT_SUBPATH} from {MANIFEST_FILE}")))
}

/// Output path relative to the project root, `/`-separated.
fn relative_to_project(ctx: &PostContext<'_>) -> Option<String>
{
    let relative = ctx.out_file.strip_prefix(ctx.project_root).ok()?;
    let parts: Vec<_> = relative
        .components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    (!parts.is_empty()).then(|| parts.join("/"))
}
