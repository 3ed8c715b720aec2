//! oxc parsing and helpers for walking the serialized program tree.
//!
//! Every file is parsed with [`oxc`] and serialized into a [`serde_json::Value`]
//! so the extraction passes can match node shapes without holding on to the
//! arena allocator.

use std::path::Path;

use oxc::allocator::Allocator;
use oxc::diagnostics::OxcDiagnostic;
use oxc::parser::Parser;
use oxc::semantic::SemanticBuilder;
use oxc::span::SourceType;
use serde_json::Value as JsonValue;
use tracing::debug;

use crate::errors::ConfectTypegenError;

/// A parsed source file: the original text plus its serialized program.
#[derive(Debug)]
pub(crate) struct ParsedFile
{
    pub(crate) source: String,
    pub(crate) program: JsonValue,
}

impl ParsedFile
{
    /// Top-level statements of the program.
    pub(crate) fn body(&self) -> &[JsonValue]
    {
        self.program["body"].as_array().map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Reads and parses a TypeScript file.
///
/// # Errors
/// Returns `IOError` if the file cannot be read and `ParsingFailed` if the
/// parser panics or reports syntax/semantic errors.
pub(crate) fn parse_file(path: &Path) -> Result<ParsedFile, ConfectTypegenError>
{
    let path_str = path.to_string_lossy().to_string();

    let source = std::fs::read_to_string(path).map_err(|error| ConfectTypegenError::IOError {
        file: path_str.clone(),
        error,
    })?;

    let source_type = SourceType::from_path(path).map_err(|_| ConfectTypegenError::ParsingFailed {
        file: path_str.clone(),
        details: "Failed to determine source type".to_string(),
    })?;

    let program = parse_source(&source, source_type, &path_str)?;

    Ok(ParsedFile { source, program })
}

/// Parses TypeScript source text into a serialized program tree.
pub(crate) fn parse_source(
    source_text: &str,
    source_type: SourceType,
    label: &str,
) -> Result<JsonValue, ConfectTypegenError>
{
    let allocator = Allocator::default();
    let mut errors: Vec<OxcDiagnostic> = Vec::new();

    let ret = Parser::new(&allocator, source_text, source_type).parse();
    errors.extend(ret.errors);

    if ret.panicked {
        for error in &errors {
            debug!("{label}: {error:?}");
        }
        return Err(ConfectTypegenError::ParsingFailed {
            file: label.to_string(),
            details: "Parser panicked".to_string(),
        });
    }

    let semantics = SemanticBuilder::new().with_check_syntax_error(true).build(&ret.program);
    errors.extend(semantics.errors);

    if !errors.is_empty() {
        for error in &errors {
            debug!("{label}: {error:?}");
        }
        return Err(ConfectTypegenError::ParsingFailed {
            file: label.to_string(),
            details: format!("{} syntax error(s)", errors.len()),
        });
    }

    serde_json::to_value(&ret.program).map_err(ConfectTypegenError::SerializationFailed)
}

/// Returns the `type` tag of a node.
pub(crate) fn node_type(node: &JsonValue) -> Option<&str>
{
    node["type"].as_str()
}

/// Returns the verbatim source text a node spans.
pub(crate) fn node_text<'s>(node: &JsonValue, source: &'s str) -> Option<&'s str>
{
    let start = usize::try_from(node["start"].as_u64()?).ok()?;
    let end = usize::try_from(node["end"].as_u64()?).ok()?;
    source.get(start..end)
}

/// Name of an identifier node (reference, binding, or property name).
pub(crate) fn identifier_name(node: &JsonValue) -> Option<&str>
{
    match node_type(node)? {
        "Identifier" | "IdentifierReference" | "IdentifierName" | "BindingIdentifier" => node["name"].as_str(),
        _ => None,
    }
}

/// Value of a string literal node.
pub(crate) fn string_literal(node: &JsonValue) -> Option<&str>
{
    match node_type(node)? {
        "StringLiteral" | "Literal" => node["value"].as_str(),
        _ => None,
    }
}

/// Splits a non-computed member expression (`object.property`) into its parts.
pub(crate) fn member_parts(node: &JsonValue) -> Option<(&JsonValue, &str)>
{
    match node_type(node)? {
        "StaticMemberExpression" => Some((&node["object"], identifier_name(&node["property"])?)),
        "MemberExpression" if node["computed"].as_bool() != Some(true) => {
            Some((&node["object"], identifier_name(&node["property"])?))
        }
        _ => None,
    }
}

/// Strips wrappers that do not change what an expression denotes
/// (`(x)`, `x as T`, `x satisfies T`, `x!`).
pub(crate) fn unwrap_expression(node: &JsonValue) -> &JsonValue
{
    match node_type(node) {
        Some("ParenthesizedExpression")
        | Some("TSAsExpression")
        | Some("TSSatisfiesExpression")
        | Some("TSNonNullExpression") => unwrap_expression(&node["expression"]),
        _ => node,
    }
}

/// Returns the declaration carried by an `export ...` statement.
pub(crate) fn exported_declaration(node: &JsonValue) -> Option<&JsonValue>
{
    if node_type(node) != Some("ExportNamedDeclaration") {
        return None;
    }
    node.get("declaration").filter(|decl| !decl.is_null())
}

/// Looks up a property by key in an object literal and returns its value node.
pub(crate) fn object_property<'a>(object: &'a JsonValue, key: &str) -> Option<&'a JsonValue>
{
    if node_type(object) != Some("ObjectExpression") {
        return None;
    }

    object["properties"].as_array()?.iter().find_map(|prop| {
        let name = identifier_name(&prop["key"]).or_else(|| string_literal(&prop["key"]))?;
        (name == key).then(|| &prop["value"])
    })
}
