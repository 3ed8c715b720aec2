//! Locating the definitions of identifiers referenced by schemas.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Component, Path, PathBuf};

use serde_json::Value as JsonValue;
use tracing::debug;

use crate::ast::{exported_declaration, identifier_name, node_type, string_literal, ParsedFile};
use crate::types::TypeLocation;

/// Name → definition site index built during the scan.
///
/// The first file that defines (or imports) a name wins.
#[derive(Debug, Default)]
pub(crate) struct DefinitionIndex
{
    local: BTreeMap<String, PathBuf>,
    /// Targets of relative imports, relative to the root (may start with `..`).
    relative_imports: BTreeMap<String, PathBuf>,
    imports: BTreeMap<String, String>,
}

impl DefinitionIndex
{
    /// Records the exported type declarations and package imports of one file.
    pub(crate) fn index_file(&mut self, file: &ParsedFile, relative_path: &Path)
    {
        for node in file.body() {
            if node_type(node) == Some("ImportDeclaration") {
                self.index_import(node, relative_path);
            } else if let Some(declaration) = exported_declaration(node) {
                if let Some(name) = declared_type_name(declaration) {
                    self.local
                        .entry(name.to_string())
                        .or_insert_with(|| relative_path.to_path_buf());
                }
            }
        }
    }

    fn index_import(&mut self, node: &JsonValue, relative_path: &Path)
    {
        let Some(specifier) = string_literal(&node["source"]) else {
            return;
        };
        let Some(specifiers) = node["specifiers"].as_array() else {
            return;
        };

        for import in specifiers {
            if node_type(import) != Some("ImportSpecifier") {
                continue;
            }
            let Some(name) = identifier_name(&import["local"]) else {
                continue;
            };
            let imported = identifier_name(&import["imported"]).or_else(|| string_literal(&import["imported"]));
            if imported.is_some_and(|imported| imported != name) {
                debug!("Not indexing {name}: renamed import from {specifier}");
                continue;
            }

            if specifier.starts_with('.') {
                let target = import_target(relative_path, specifier);
                self.relative_imports.entry(name.to_string()).or_insert(target);
            } else {
                self.imports
                    .entry(name.to_string())
                    .or_insert_with(|| specifier.to_string());
            }
        }
    }

    /// Where `name` is defined: local declarations first, then relative
    /// imports (files outside the scanned tree), then package imports.
    pub(crate) fn lookup(&self, name: &str) -> Option<TypeLocation>
    {
        self.local
            .get(name)
            .or_else(|| self.relative_imports.get(name))
            .map(|path| TypeLocation::Local(path.clone()))
            .or_else(|| self.imports.get(name).map(|module| TypeLocation::Package(module.clone())))
    }
}

/// Resolves every referenced name that has a known definition.
///
/// Unknown names are left out; they are emitted verbatim without an import.
pub(crate) fn resolve_locations(names: &BTreeSet<String>, index: &DefinitionIndex) -> BTreeMap<String, TypeLocation>
{
    names
        .iter()
        .filter_map(|name| match index.lookup(name) {
            Some(location) => Some((name.clone(), location)),
            None => {
                debug!("No definition found for {name}, emitting as-is");
                None
            }
        })
        .collect()
}

/// Resolves a relative specifier against the importing file's directory.
///
/// The result is relative to the root and keeps a `.ts` file name so it can be
/// treated like any scanned file.
fn import_target(importer: &Path, specifier: &str) -> PathBuf
{
    let dir = importer.parent().unwrap_or_else(|| Path::new(""));
    let mut target = normalize_path(&dir.join(specifier));

    let has_source_extension = target
        .file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| [".ts", ".tsx", ".js", ".mjs"].iter().any(|ext| name.ends_with(ext)));
    if !has_source_extension {
        let mut file_name = target.file_name().map(|name| name.to_os_string()).unwrap_or_default();
        file_name.push(".ts");
        target.set_file_name(file_name);
    }
    target
}

/// Lexically removes `.` and `..` components. Leading `..` of a relative path are kept.
pub(crate) fn normalize_path(path: &Path) -> PathBuf
{
    let mut parts: Vec<Component<'_>> = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match parts.last() {
                Some(Component::Normal(_)) => {
                    parts.pop();
                }
                Some(Component::RootDir | Component::Prefix(_)) => {}
                _ => parts.push(component),
            },
            other => parts.push(other),
        }
    }
    parts.iter().collect()
}

fn declared_type_name(declaration: &JsonValue) -> Option<&str>
{
    match node_type(declaration)? {
        "ClassDeclaration" | "Class" | "TSInterfaceDeclaration" | "TSTypeAliasDeclaration" => {
            identifier_name(&declaration["id"])
        }
        _ => None,
    }
}
