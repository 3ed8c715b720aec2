//! Recognition of exported Confect function definitions.
//!
//! A definition is a top-level `export const name = confectQuery({...})`
//! (or `confectMutation` / `confectAction`). Everything else in a file is
//! ignored without error.

use std::collections::BTreeSet;
use std::path::{Component, Path};

use serde_json::Value as JsonValue;
use tracing::debug;

use crate::ast::{exported_declaration, identifier_name, node_text, node_type, object_property, unwrap_expression, ParsedFile};
use crate::schema::SchemaExpr;
use crate::types::{ExtractedFunction, FunctionKind, SchemaSource};

/// Extracts every recognized function definition from a parsed file.
///
/// `relative_path` is the file's path relative to the scanned root and is
/// used to derive the module key.
pub(crate) fn extract_functions(file: &ParsedFile, relative_path: &Path) -> Vec<ExtractedFunction>
{
    let module_key = module_key(relative_path);
    let mut functions = Vec::new();

    for node in file.body() {
        let Some(declaration) = exported_declaration(node) else {
            continue;
        };
        if node_type(declaration) != Some("VariableDeclaration") {
            continue;
        }
        let Some(declarators) = declaration["declarations"].as_array() else {
            continue;
        };

        for declarator in declarators {
            if let Some(function) = extract_declarator(declarator, &file.source, relative_path, &module_key) {
                functions.push(function);
            }
        }
    }

    functions
}

fn extract_declarator(
    declarator: &JsonValue,
    source: &str,
    relative_path: &Path,
    module_key: &str,
) -> Option<ExtractedFunction>
{
    let name = identifier_name(&declarator["id"])?;
    let init = unwrap_expression(&declarator["init"]);
    if node_type(init) != Some("CallExpression") {
        return None;
    }

    let kind = FunctionKind::from_factory(identifier_name(&init["callee"])?)?;

    let config = init["arguments"].as_array()?.first()?;
    if node_type(config) != Some("ObjectExpression") {
        debug!("Skipping {module_key}.{name}: {kind} config is not an object literal");
        return None;
    }

    let error_schema = capture_schema(config, "errors", source);
    let return_schema = capture_schema(config, "returns", source);

    let mut error_type_names = BTreeSet::new();
    if let Some(schema) = &error_schema {
        schema.expr.referenced_names(&mut error_type_names);
    }

    Some(ExtractedFunction {
        name: name.to_string(),
        kind,
        error_schema,
        return_schema,
        source_file: relative_path.to_path_buf(),
        module_key: module_key.to_string(),
        full_key: format!("{module_key}.{name}"),
        error_type_names,
    })
}

fn capture_schema(config: &JsonValue, key: &str, source: &str) -> Option<SchemaSource>
{
    let value = object_property(config, key)?;
    let text = node_text(value, source)?.to_string();
    let expr = SchemaExpr::from_node(value, source);
    Some(SchemaSource { text, expr })
}

/// Derives the namespace for a file: the relative path without its extension,
/// joined with `/` on every platform.
pub(crate) fn module_key(relative_path: &Path) -> String
{
    relative_path
        .with_extension("")
        .components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests
{
    use std::path::PathBuf;

    use oxc::span::SourceType;

    use super::*;
    use crate::ast::parse_source;

    fn parse(source: &str) -> ParsedFile
    {
        let program = parse_source(source, SourceType::from_path("functions.ts").unwrap(), "functions.ts").unwrap();
        ParsedFile {
            source: source.to_string(),
            program,
        }
    }

    #[test]
    fn test_extracts_mutation_with_errors_and_returns()
    {
        let file = parse(
            r#"
import { Schema } from "effect";
import { confectMutation } from "./confect";
import { NotFoundError } from "./errors";

export const insertTodo = confectMutation({
    args: Schema.Struct({ text: Schema.String }),
    returns: Id("todos"),
    errors: Schema.Union(NotFoundError),
    handler: ({ text }) => Effect.succeed(text),
});
"#,
        );

        let functions = extract_functions(&file, Path::new("functions.ts"));
        assert_eq!(functions.len(), 1);

        let function = &functions[0];
        assert_eq!(function.name, "insertTodo");
        assert_eq!(function.kind, FunctionKind::Mutation);
        assert_eq!(function.full_key, "functions.insertTodo");
        assert_eq!(function.error_schema.as_ref().unwrap().text, "Schema.Union(NotFoundError)");
        assert_eq!(function.return_schema.as_ref().unwrap().expr, SchemaExpr::BrandedId("todos".to_string()));
        assert_eq!(function.error_type_names.iter().collect::<Vec<_>>(), vec!["NotFoundError"]);
    }

    #[test]
    fn test_skips_non_matching_declarations()
    {
        let file = parse(
            r#"
export const helper = () => 42;
export const plain = someOtherFactory({ errors: Oops });
export const notObject = confectQuery(config);
const hidden = confectQuery({ errors: Hidden });
export function named() {}
"#,
        );

        assert!(extract_functions(&file, Path::new("functions.ts")).is_empty());
    }

    #[test]
    fn test_all_three_kinds_without_schemas()
    {
        let file = parse(
            r#"
export const list = confectQuery({ handler: () => Effect.succeed([]) });
export const clear = confectMutation({ handler: () => Effect.void });
export const sync = confectAction({ handler: () => Effect.void });
"#,
        );

        let functions = extract_functions(&file, Path::new("todos.ts"));
        let kinds: Vec<_> = functions.iter().map(|f| f.kind).collect();
        assert_eq!(kinds, vec![FunctionKind::Query, FunctionKind::Mutation, FunctionKind::Action]);
        assert!(functions.iter().all(|f| f.error_schema.is_none() && f.return_schema.is_none()));
    }

    #[test]
    fn test_module_key_is_namespaced_by_directory()
    {
        assert_eq!(module_key(Path::new("functions.ts")), "functions");
        assert_eq!(module_key(&PathBuf::from("admin").join("functions.ts")), "admin/functions");
        assert_eq!(module_key(Path::new("lib/todo.helpers.ts")), "lib/todo.helpers");
    }
}
