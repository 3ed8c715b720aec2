use std::fs;
use std::path::Path;

use confect_typegen::{generate, Configuration, GenerationReport};
use tempdir::TempDir;

/// Set up a project directory with a `convex/` folder holding the given files.
///
/// Returns the temp dir (keep alive) and a configuration pointing into it with
/// post-processing disabled.
fn setup_test_env(files: &[(&str, &str)]) -> (TempDir, Configuration)
{
    let temp_dir = TempDir::new("confect_codegen_test").expect("Failed to create temp directory");
    let convex_dir = temp_dir.path().join("convex");
    fs::create_dir_all(&convex_dir).expect("Failed to create convex dir");

    for (relative, content) in files {
        write_file(&convex_dir.join(relative), content);
    }

    let config = Configuration {
        convex_dir,
        out_file: temp_dir.path().join("confect-generated-env.d.ts"),
        post_process: false,
        ..Default::default()
    };

    (temp_dir, config)
}

fn write_file(path: &Path, content: &str)
{
    fs::create_dir_all(path.parent().expect("path has a parent")).expect("Failed to create parent dir");
    fs::write(path, content).expect("Failed to write test file");
}

/// Generate code and return the output string.
fn generate_and_read(files: &[(&str, &str)]) -> String
{
    let (_temp_dir, config) = setup_test_env(files);
    let report = generate(&config).expect("Code generation failed");
    fs::read_to_string(report.out_file).expect("Failed to read generated code")
}

const ERRORS_FILE: &str = r#"
import { Schema } from "effect";

export class NotFoundError extends Schema.TaggedError<NotFoundError>()("NotFoundError", {
    id: Schema.String,
}) {}

export class ValidationError extends Schema.TaggedError<ValidationError>()("ValidationError", {
    message: Schema.String,
}) {}
"#;

// =============================================================================
// End-to-end
// =============================================================================

#[test]
fn test_insert_todo_end_to_end()
{
    let code = generate_and_read(&[
        ("errors.ts", ERRORS_FILE),
        (
            "functions.ts",
            r#"
import { Effect, Schema } from "effect";
import { confectMutation } from "./confect";
import { NotFoundError } from "./errors";

export const insertTodo = confectMutation({
    args: Schema.Struct({ text: Schema.String }),
    returns: Id("todos"),
    errors: Schema.Union(NotFoundError),
    handler: ({ text }) => Effect.succeed(text),
});
"#,
        ),
    ]);

    assert!(code.contains("\"functions.insertTodo\": NotFoundError;"), "missing augmentation entry:\n{code}");
    assert!(code.contains("export type FunctionsInsertTodoErrors = NotFoundError;"), "missing alias:\n{code}");
    assert!(code.contains("import type { NotFoundError } from './convex/errors';"), "missing import:\n{code}");
    assert!(code.contains("declare module '@confect/core' {"), "missing module augmentation:\n{code}");
    assert!(code.contains("interface ConfectErrorTypes {"), "missing interface:\n{code}");
    assert!(code.contains("declare global {"), "missing global stub:\n{code}");
    assert!(!code.contains("ValidationError"), "unused types must not be imported:\n{code}");
}

#[test]
fn test_union_with_primitive_and_package_import()
{
    let code = generate_and_read(&[(
        "functions.ts",
        r#"
import { HttpError } from "@app/shared";

export const fetchRemote = confectAction({
    errors: Schema.Union(Schema.Number, HttpError),
    handler: () => Effect.void,
});
"#,
    )]);

    assert!(code.contains("\"functions.fetchRemote\": number | HttpError;"), "{code}");
    assert!(code.contains("import type { HttpError } from '@app/shared';"), "{code}");
}

#[test]
fn test_relative_import_outside_convex_dir()
{
    let (temp_dir, config) = setup_test_env(&[(
        "admin/functions.ts",
        r#"
import { HttpError } from "../../shared/errors";

export const sync = confectAction({ errors: Schema.Union(HttpError, Schema.Null) });
"#,
    )]);
    write_file(
        &temp_dir.path().join("shared/errors.ts"),
        "export class HttpError extends Schema.TaggedError<HttpError>()(\"HttpError\", {}) {}",
    );

    let report = generate(&config).expect("Code generation failed");
    let code = fs::read_to_string(report.out_file).unwrap();
    assert!(code.contains("\"admin/functions.sync\": HttpError | null;"), "{code}");
    assert!(code.contains("import type { HttpError } from './shared/errors';"), "{code}");
}

#[test]
fn test_nested_schema_translation()
{
    let code = generate_and_read(&[(
        "queries.ts",
        r#"
export const search = confectQuery({
    errors: Schema.Union(
        Schema.Array(Schema.Option(Schema.Number)),
        Schema.Literal("timeout"),
    ),
    handler: () => Effect.succeed([]),
});
"#,
    )]);

    assert!(code.contains("export type QueriesSearchErrors = Option<number>[] | 'timeout';"), "{code}");
}

#[test]
fn test_unresolved_error_type_passes_through()
{
    let code = generate_and_read(&[(
        "functions.ts",
        "export const get = confectQuery({ errors: Schema.Union(MissingError, Schema.Null) });",
    )]);

    assert!(code.contains("\"functions.get\": MissingError | null;"), "{code}");
    assert!(!code.contains("import type"), "{code}");
}

// =============================================================================
// Namespacing and determinism
// =============================================================================

#[test]
fn test_same_name_in_different_modules()
{
    let (_temp_dir, config) = setup_test_env(&[
        ("errors.ts", ERRORS_FILE),
        (
            "functions.ts",
            "export const list = confectQuery({ errors: Schema.Union(NotFoundError) });",
        ),
        (
            "admin/functions.ts",
            "export const list = confectQuery({ errors: Schema.Union(ValidationError) });",
        ),
    ]);

    let report = generate(&config).expect("Code generation failed");
    let keys: Vec<_> = report.functions.iter().map(|f| f.full_key.as_str()).collect();
    assert_eq!(keys, vec!["admin/functions.list", "functions.list"]);

    let code = fs::read_to_string(&report.out_file).unwrap();
    assert!(code.contains("\"admin/functions.list\": ValidationError;"), "{code}");
    assert!(code.contains("\"functions.list\": NotFoundError;"), "{code}");
    assert!(code.contains("export type AdminFunctionsListErrors = ValidationError;"), "{code}");
    assert!(code.contains("export type FunctionsListErrors = NotFoundError;"), "{code}");
    assert!(code.contains("import type { NotFoundError, ValidationError } from './convex/errors';"), "{code}");
}

#[test]
fn test_modules_with_same_pascal_name_get_distinct_aliases()
{
    let (_temp_dir, config) = setup_test_env(&[
        ("admin/functions.ts", "export const list = confectQuery({ errors: Schema.String });"),
        ("admin_functions.ts", "export const list = confectQuery({ errors: Schema.Number });"),
    ]);

    let report = generate(&config).expect("Code generation failed");
    let code = fs::read_to_string(&report.out_file).unwrap();

    assert!(code.contains("\"admin/functions.list\": string;"), "{code}");
    assert!(code.contains("\"admin_functions.list\": number;"), "{code}");
    assert!(code.contains("export type AdminFunctionsListErrors = string;"), "{code}");
    assert!(code.contains("export type AdminFunctionsListErrors2 = number;"), "{code}");
    assert_eq!(code.matches("export type AdminFunctionsListErrors =").count(), 1, "{code}");
}

#[test]
fn test_generation_is_idempotent()
{
    let (_temp_dir, config) = setup_test_env(&[
        ("errors.ts", ERRORS_FILE),
        ("b.ts", "export const second = confectQuery({ errors: Schema.Union(ValidationError, NotFoundError) });"),
        ("a.ts", "export const first = confectMutation({ errors: NotFoundError });"),
    ]);

    let first = generate(&config).expect("first run failed");
    let first_code = fs::read(&first.out_file).unwrap();
    let second = generate(&config).expect("second run failed");
    let second_code = fs::read(&second.out_file).unwrap();

    assert_eq!(first_code, second_code);
}

#[test]
fn test_non_matching_declarations_are_ignored()
{
    let (_temp_dir, config) = setup_test_env(&[(
        "helpers.ts",
        r#"
export const helper = () => 42;
export const table = defineTable({ text: v.string() });
"#,
    )]);

    let GenerationReport { functions, out_file, .. } = generate(&config).expect("Code generation failed");
    assert!(functions.is_empty());

    let code = fs::read_to_string(out_file).unwrap();
    assert!(code.contains("interface ConfectErrorTypes {\n  }"), "{code}");
    assert!(!code.contains("export type"), "{code}");
}

#[test]
fn test_unparseable_file_is_skipped()
{
    let (_temp_dir, config) = setup_test_env(&[
        ("broken.ts", "export const = confectQuery({"),
        ("functions.ts", "export const ok = confectQuery({ errors: Schema.String });"),
    ]);

    let report = generate(&config).expect("a broken file must not abort the run");
    assert_eq!(report.skipped_files.len(), 1);
    assert_eq!(report.functions.len(), 1);
}

#[test]
fn test_generated_dirs_are_not_scanned()
{
    let code = generate_and_read(&[
        ("_generated/server.ts", "export const internal = confectQuery({ errors: Schema.String });"),
        ("functions.ts", "export const visible = confectQuery({ errors: Schema.Boolean });"),
    ]);

    assert!(code.contains("\"functions.visible\": boolean;"), "{code}");
    assert!(!code.contains("internal"), "{code}");
}

// =============================================================================
// Configuration-driven output
// =============================================================================

#[test]
fn test_module_name_detected_from_manifest()
{
    let (temp_dir, config) = setup_test_env(&[("functions.ts", "export const a = confectQuery({ errors: Schema.String });")]);
    fs::write(
        temp_dir.path().join("package.json"),
        r#"{ "name": "backend", "dependencies": { "@acme/confect": "workspace:*", "effect": "^3" } }"#,
    )
    .unwrap();

    let report = generate(&config).expect("Code generation failed");
    assert_eq!(report.module_name, "@acme/confect");
    assert!(fs::read_to_string(report.out_file).unwrap().contains("declare module '@acme/confect' {"));
}

#[test]
fn test_module_name_override()
{
    let (_temp_dir, mut config) = setup_test_env(&[("functions.ts", "export const a = confectQuery({});")]);
    config.module_name = Some("@custom/confect".to_string());

    let report = generate(&config).expect("Code generation failed");
    assert!(fs::read_to_string(report.out_file).unwrap().contains("declare module '@custom/confect' {"));
}

#[test]
fn test_output_gets_declaration_extension_and_parent_dirs()
{
    let (temp_dir, mut config) = setup_test_env(&[("functions.ts", "export const a = confectQuery({});")]);
    config.out_file = temp_dir.path().join("types").join("nested").join("confect.ts");

    let report = generate(&config).expect("Code generation failed");
    assert!(report.out_file.ends_with("types/nested/confect.d.ts"));
    assert!(report.out_file.is_file());
    assert!(!temp_dir.path().join("types/nested/confect.ts").exists());
}

#[test]
fn test_output_inside_convex_dir_uses_relative_imports()
{
    let (temp_dir, mut config) = setup_test_env(&[
        ("errors.ts", ERRORS_FILE),
        ("functions.ts", "export const a = confectQuery({ errors: NotFoundError });"),
    ]);
    config.out_file = temp_dir.path().join("convex/_generated-types/confect-error-types.d.ts");

    let report = generate(&config).expect("Code generation failed");
    let code = fs::read_to_string(report.out_file).unwrap();
    assert!(code.contains("import type { NotFoundError } from '../errors';"), "{code}");
}

#[test]
fn test_emit_return_types()
{
    let (_temp_dir, mut config) = setup_test_env(&[(
        "todos.ts",
        r#"
export const get = confectQuery({
    returns: Schema.Option(confectSchema.tableSchemas.todos.withSystemFields),
});
export const insert = confectMutation({ returns: Id("todos") });
"#,
    )]);
    config.emit_return_types = true;

    let report = generate(&config).expect("Code generation failed");
    let code = fs::read_to_string(report.out_file).unwrap();
    assert!(code.contains("export type TodosGetReturns = Option<Todo>;"), "{code}");
    assert!(code.contains("export type TodosInsertReturns = Id<'todos'>;"), "{code}");
}

#[test]
fn test_post_processing_updates_project_files()
{
    let (temp_dir, mut config) = setup_test_env(&[("functions.ts", "export const a = confectQuery({});")]);
    config.post_process = true;
    fs::write(temp_dir.path().join("package.json"), r#"{ "name": "backend" }"#).unwrap();

    generate(&config).expect("Code generation failed");

    let ignore = fs::read_to_string(temp_dir.path().join(".gitignore")).unwrap();
    assert!(ignore.lines().any(|line| line == "confect-generated-env.d.ts"), "{ignore}");

    let manifest = fs::read_to_string(temp_dir.path().join("package.json")).unwrap();
    assert!(
        manifest.contains(r#""./confect-types": "./confect-generated-env.d.ts""#),
        "{manifest}"
    );
}
