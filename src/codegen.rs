//! Assembly of the generated declaration file.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Component, Path};

use tracing::warn;

use crate::resolve::normalize_path;
use crate::schema::{capitalize, pascal_case, TypeScope};
use crate::types::{ExtractedFunction, TypeLocation};

/// Interface inside the augmented module that maps function keys to error types.
pub(crate) const AUGMENTED_INTERFACE: &str = "ConfectErrorTypes";

const HEADER: &str = "\
/* eslint-disable */
/**
 * Error types of every Confect function, keyed by `<module>.<function>`.
 *
 * THIS FILE IS AUTOMATICALLY GENERATED by confect-generate. DO NOT EDIT.
 */
";

const GLOBAL_STUB: &str = "\
declare global {
  /** Pulled in by every Confect entry point so the augmentation above is always loaded. */
  interface ConfectGeneratedTypes {
    readonly errorTypes: true;
  }
}

export {};
";

/// Inputs for one declaration file.
#[derive(Debug)]
pub(crate) struct CodegenInput<'a>
{
    /// Functions sorted by `full_key`.
    pub(crate) functions: &'a [ExtractedFunction],
    pub(crate) locations: &'a BTreeMap<String, TypeLocation>,
    /// Module whose interface is augmented.
    pub(crate) module_name: &'a str,
    /// Absolute scanned root; local locations are relative to it.
    pub(crate) root: &'a Path,
    /// Absolute directory the output file is written to.
    pub(crate) out_dir: &'a Path,
    pub(crate) emit_return_types: bool,
}

/// Renders the declaration file.
pub(crate) fn generate_code(input: &CodegenInput<'_>) -> String
{
    let mut scope = ImportCollector {
        locations: input.locations,
        used: BTreeSet::new(),
    };

    let mut entries = Vec::new();
    let mut aliases = Vec::new();
    let mut alias_names = BTreeSet::new();

    for function in input.functions {
        if let Some(schema) = &function.error_schema {
            let error_type = schema.expr.to_typescript(&mut scope);
            entries.push(format!("    \"{}\": {};\n", function.full_key, error_type));
            let alias = unique_alias(function, "Errors", &mut alias_names);
            aliases.push(format!("export type {alias} = {error_type};\n"));
        }
    }

    if input.emit_return_types {
        for function in input.functions {
            if let Some(schema) = &function.return_schema {
                let return_type = schema.expr.to_typescript(&mut scope);
                let alias = unique_alias(function, "Returns", &mut alias_names);
                aliases.push(format!("export type {alias} = {return_type};\n"));
            }
        }
    }

    let mut code = String::from(HEADER);

    let imports = scope.import_lines(input.root, input.out_dir);
    if !imports.is_empty() {
        code.push('\n');
        for line in imports {
            code.push_str(&line);
            code.push('\n');
        }
    }

    code.push('\n');
    code.push_str(&format!("declare module '{}' {{\n", input.module_name));
    code.push_str(&format!("  interface {AUGMENTED_INTERFACE} {{\n"));
    entries.iter().for_each(|entry| code.push_str(entry));
    code.push_str("  }\n}\n");

    if !aliases.is_empty() {
        code.push('\n');
        aliases.iter().for_each(|alias| code.push_str(alias));
    }

    code.push('\n');
    code.push_str(GLOBAL_STUB);

    code
}

/// `FunctionsInsertTodoErrors` for `functions.insertTodo`.
pub(crate) fn type_alias_name(function: &ExtractedFunction, suffix: &str) -> String
{
    format!("{}{}{}", pascal_case(&function.module_key), capitalize(&function.name), suffix)
}

/// [`type_alias_name`], numbered from 2 when an earlier function already took
/// the name (`admin/functions` and `admin_functions` share `AdminFunctions`).
fn unique_alias(function: &ExtractedFunction, suffix: &str, taken: &mut BTreeSet<String>) -> String
{
    let base = type_alias_name(function, suffix);
    let alias = (1..)
        .map(|n| if n == 1 { base.clone() } else { format!("{base}{n}") })
        .find(|candidate| !taken.contains(candidate))
        .unwrap_or_else(|| base.clone());

    if alias != base {
        warn!("⚠️  {} would reuse {base}, exporting it as {alias}", function.full_key);
    }
    taken.insert(alias.clone());
    alias
}

/// Relative module specifier from `from_dir` to `target` (extension dropped).
///
/// Both paths must be absolute.
pub(crate) fn relative_import(from_dir: &Path, target: &Path) -> String
{
    let target = target.with_extension("");
    let from: Vec<Component<'_>> = from_dir.components().collect();
    let to: Vec<Component<'_>> = target.components().collect();

    let common = from.iter().zip(&to).take_while(|(a, b)| a == b).count();

    let mut parts: Vec<String> = vec!["..".to_string(); from.len() - common];
    parts.extend(to[common..].iter().map(|c| c.as_os_str().to_string_lossy().into_owned()));

    let joined = parts.join("/");
    if joined.starts_with("..") {
        joined
    } else {
        format!("./{joined}")
    }
}

/// Tracks which resolved names the rendered types use.
struct ImportCollector<'a>
{
    locations: &'a BTreeMap<String, TypeLocation>,
    used: BTreeSet<String>,
}

impl TypeScope for ImportCollector<'_>
{
    fn is_defined(&self, name: &str) -> bool
    {
        self.locations.contains_key(name)
    }

    fn use_name(&mut self, name: &str)
    {
        if self.locations.contains_key(name) {
            self.used.insert(name.to_string());
        }
    }
}

impl ImportCollector<'_>
{
    /// Package imports first, then local ones; each group sorted by specifier.
    fn import_lines(&self, root: &Path, out_dir: &Path) -> Vec<String>
    {
        let mut packages: BTreeMap<String, BTreeSet<&str>> = BTreeMap::new();
        let mut locals: BTreeMap<String, BTreeSet<&str>> = BTreeMap::new();

        for name in &self.used {
            match &self.locations[name] {
                TypeLocation::Package(module) => {
                    packages.entry(module.clone()).or_default().insert(name.as_str());
                }
                TypeLocation::Local(path) => {
                    let specifier = relative_import(out_dir, &normalize_path(&root.join(path)));
                    locals.entry(specifier).or_default().insert(name.as_str());
                }
            }
        }

        packages
            .into_iter()
            .chain(locals)
            .map(|(specifier, names)| {
                let names: Vec<&str> = names.into_iter().collect();
                format!("import type {{ {} }} from '{}';", names.join(", "), specifier)
            })
            .collect()
    }
}
