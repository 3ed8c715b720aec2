//! Generate TypeScript error types for Confect functions.
//!
//! This crate scans a Convex directory for functions defined with
//! `confectQuery`, `confectMutation`, and `confectAction`, parses each file
//! with [oxc](https://oxc.rs), and emits one declaration file containing:
//!
//! - **Imports** for every error type it could locate
//! - **A module augmentation** mapping each `<module>.<function>` key to its error union
//! - **A type alias** per function (`FunctionsInsertTodoErrors`)
//!
//! # Usage
//!
//! ```rust,no_run
//! use confect_typegen::{generate, Configuration};
//!
//! fn main() {
//!     let config = Configuration {
//!         convex_dir: std::path::PathBuf::from("convex"),
//!         ..Default::default()
//!     };
//!     generate(&config).expect("confect-typegen failed");
//! }
//! ```
//!
//! The `confect-generate` binary wraps [`generate`] and [`watch::watch`].

mod ast;
mod codegen;
pub mod errors;
mod extract;
mod manifest;
mod postprocess;
mod resolve;
mod scan;
pub mod schema;
pub mod types;
pub mod watch;

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use codegen::{generate_code, CodegenInput};
use errors::ConfectTypegenError;
pub use manifest::DEFAULT_MODULE_NAME;
use postprocess::PostContext;
use tracing::{debug, info, warn};
use types::ExtractedFunction;

/// Default Convex directory.
pub const DEFAULT_CONVEX_DIR: &str = "./convex";

/// Default output path.
pub const DEFAULT_OUT_FILE: &str = "./confect-generated-env.d.ts";

/// Configuration options for the type generator.
#[derive(Debug, Clone)]
pub struct Configuration
{
    /// Directory scanned for function definitions (default: "./convex")
    pub convex_dir: PathBuf,

    /// Declaration file to write (default: "./confect-generated-env.d.ts")
    pub out_file: PathBuf,

    /// Module to augment; detected from the project's `package.json` when `None`
    pub module_name: Option<String>,

    /// Also emit a `<Key>Returns` alias for every function with a `returns` schema
    pub emit_return_types: bool,

    /// Run the `.gitignore`, reference-stub, and manifest-export steps
    pub post_process: bool,
}

impl Default for Configuration
{
    fn default() -> Self
    {
        Self {
            convex_dir: PathBuf::from(DEFAULT_CONVEX_DIR),
            out_file: PathBuf::from(DEFAULT_OUT_FILE),
            module_name: None,
            emit_return_types: false,
            post_process: true,
        }
    }
}

/// Summary of one generation run.
#[derive(Debug)]
pub struct GenerationReport
{
    /// Absolute path of the written declaration file.
    pub out_file: PathBuf,
    /// Every recognized function, sorted by `full_key`.
    pub functions: Vec<ExtractedFunction>,
    /// Files skipped because they failed to parse, relative to the Convex directory.
    pub skipped_files: Vec<PathBuf>,
    /// The augmented module.
    pub module_name: String,
}

/// Scans the Convex directory and writes the error-type declaration file.
///
/// # Arguments
/// * `config` - Configuration options for the type generation process
///
/// # Errors
/// This function can fail for several reasons:
/// * Convex directory not found
/// * IO errors while walking, reading, or writing files
///
/// Files that fail to parse are skipped with a warning, and post-processing
/// failures are only logged.
pub fn generate(config: &Configuration) -> Result<GenerationReport, ConfectTypegenError>
{
    if !config.convex_dir.is_dir() {
        return Err(ConfectTypegenError::MissingConvexDir(config.convex_dir.clone()));
    }

    let root = config
        .convex_dir
        .canonicalize()
        .map_err(|e| ConfectTypegenError::from(e).with_file_context(config.convex_dir.display().to_string()))?;
    let project_root = root.parent().map(Path::to_path_buf).unwrap_or_else(|| root.clone());

    let scan_index = scan::scan(&root)?;
    debug!("Found {} function(s) in {}", scan_index.functions.len(), root.display());

    let mut names = BTreeSet::new();
    for function in &scan_index.functions {
        names.extend(function.error_type_names.iter().cloned());
        if config.emit_return_types {
            if let Some(schema) = &function.return_schema {
                schema.expr.referenced_names(&mut names);
            }
        }
    }
    let locations = resolve::resolve_locations(&names, &scan_index.definitions);

    let module_name = config
        .module_name
        .clone()
        .unwrap_or_else(|| manifest::detect_module_name(&project_root));

    let out_file = prepare_out_file(&config.out_file)?;
    let out_dir = out_file
        .parent()
        .ok_or_else(|| ConfectTypegenError::InvalidPath(out_file.display().to_string()))?;

    let code = generate_code(&CodegenInput {
        functions: &scan_index.functions,
        locations: &locations,
        module_name: &module_name,
        root: &root,
        out_dir,
        emit_return_types: config.emit_return_types,
    });

    let with_errors = scan_index.functions.iter().filter(|f| f.error_schema.is_some()).count();
    if fs::read_to_string(&out_file).is_ok_and(|existing| existing == code) {
        info!("✅ {} is up to date ({} functions, {} with error types)", out_file.display(), scan_index.functions.len(), with_errors);
    } else {
        fs::write(&out_file, &code).map_err(|error| ConfectTypegenError::IOError {
            file: out_file.display().to_string(),
            error,
        })?;
        info!("✅ Generated {} ({} functions, {} with error types)", out_file.display(), scan_index.functions.len(), with_errors);
    }

    if config.post_process {
        postprocess::run_all(&PostContext {
            project_root: &project_root,
            out_file: &out_file,
            module_name: &module_name,
        });
    }

    Ok(GenerationReport {
        out_file,
        functions: scan_index.functions,
        skipped_files: scan_index.skipped_files,
        module_name,
    })
}

/// Forces a `.d.ts` extension, creates the parent directory, and returns the
/// absolute output path.
fn prepare_out_file(path: &Path) -> Result<PathBuf, ConfectTypegenError>
{
    let path = declaration_path(path)?;
    let file_name = path
        .file_name()
        .ok_or_else(|| ConfectTypegenError::InvalidPath(path.display().to_string()))?;

    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&parent)
        .and_then(|_| parent.canonicalize())
        .map(|dir| dir.join(file_name))
        .map_err(|e| ConfectTypegenError::from(e).with_file_context(parent.display().to_string()))
}

/// `types.ts` → `types.d.ts`; other extensions get `.d.ts` appended.
fn declaration_path(path: &Path) -> Result<PathBuf, ConfectTypegenError>
{
    let name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| ConfectTypegenError::InvalidPath(path.display().to_string()))?;

    if name.ends_with(".d.ts") {
        return Ok(path.to_path_buf());
    }

    let rewritten = match name.strip_suffix(".ts") {
        Some(stem) => format!("{stem}.d.ts"),
        None => format!("{name}.d.ts"),
    };
    warn!("⚠️  Output must be a declaration file, writing {rewritten} instead of {name}");
    Ok(path.with_file_name(rewritten))
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn test_declaration_path()
    {
        assert_eq!(declaration_path(Path::new("out/types.d.ts")).unwrap(), PathBuf::from("out/types.d.ts"));
        assert_eq!(declaration_path(Path::new("out/types.ts")).unwrap(), PathBuf::from("out/types.d.ts"));
        assert_eq!(declaration_path(Path::new("types")).unwrap(), PathBuf::from("types.d.ts"));
        assert!(declaration_path(Path::new("/")).is_err());
    }
}
