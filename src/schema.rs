//! The schema-expression DSL and its translation to TypeScript types.
//!
//! Captured `errors:`/`returns:` values are converted from their oxc nodes into
//! a small [`SchemaExpr`] tree. Rendering walks that tree; anything outside the
//! recognized vocabulary survives as [`SchemaExpr::Raw`] and is emitted verbatim.

use std::collections::BTreeSet;
use std::str::FromStr;

use oxc::span::SourceType;
use serde_json::Value as JsonValue;

use crate::ast::{identifier_name, member_parts, node_text, node_type, parse_source, string_literal, unwrap_expression};
use crate::errors::ConfectTypegenError;

/// Namespaces the primitive markers and wrappers are read from.
const SCHEMA_NAMESPACES: &[&str] = &["Schema", "S"];

/// Primitive schema markers (`Schema.String`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Primitive
{
    String,
    Number,
    Boolean,
    Null,
    Void,
}

impl Primitive
{
    fn from_marker(name: &str) -> Option<Self>
    {
        match name {
            "String" => Some(Self::String),
            "Number" => Some(Self::Number),
            "Boolean" => Some(Self::Boolean),
            "Null" => Some(Self::Null),
            "Void" => Some(Self::Void),
            _ => None,
        }
    }

    /// The TypeScript keyword for this primitive.
    pub fn as_typescript(self) -> &'static str
    {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Null => "null",
            Self::Void => "void",
        }
    }
}

/// A schema expression.
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaExpr
{
    Primitive(Primitive),
    /// `Schema.Union(a, b, ...)`
    Union(Vec<SchemaExpr>),
    /// `Schema.Array(inner)`
    Array(Box<SchemaExpr>),
    /// `Schema.Option(inner)`, `Schema.OptionFromSelf(inner)`, `Schema.optional(inner)`
    Optional(Box<SchemaExpr>),
    /// `Schema.Literal(...)`, each entry already rendered as a literal type
    Literal(Vec<String>),
    /// `Id("table")`
    BrandedId(String),
    /// `<schema>.tableSchemas.<table>.withSystemFields`
    TableDocument(String),
    Identifier(String),
    /// Unrecognized expression, kept as source text.
    Raw(String),
}

impl SchemaExpr
{
    /// Builds a schema expression from a serialized oxc expression node.
    pub(crate) fn from_node(node: &JsonValue, source: &str) -> Self
    {
        let node = unwrap_expression(node);

        if node_type(node) == Some("CallExpression") {
            if let Some(expr) = Self::from_call(node, source) {
                return expr;
            }
        } else if let Some(name) = identifier_name(node) {
            return Self::Identifier(name.to_string());
        } else if let Some((object, property)) = member_parts(node) {
            if is_schema_namespace(object) {
                if let Some(primitive) = Primitive::from_marker(property) {
                    return Self::Primitive(primitive);
                }
            }
            if let Some(table) = table_document(node) {
                return Self::TableDocument(table.to_string());
            }
        }

        Self::Raw(node_text(node, source).unwrap_or_default().trim().to_string())
    }

    fn from_call(node: &JsonValue, source: &str) -> Option<Self>
    {
        let callee = unwrap_expression(&node["callee"]);
        let args = node["arguments"].as_array()?;

        let (namespace, name) = match identifier_name(callee) {
            Some(name) => (None, name),
            None => {
                let (object, property) = member_parts(callee)?;
                (Some(object), property)
            }
        };

        if name == "Id" {
            return string_literal(args.first()?).map(|table| Self::BrandedId(table.to_string()));
        }

        if !namespace.is_some_and(is_schema_namespace) {
            return None;
        }

        match name {
            "Union" => Some(Self::Union(args.iter().map(|arg| Self::from_node(arg, source)).collect())),
            "Array" => Some(Self::Array(Box::new(Self::from_node(args.first()?, source)))),
            "Option" | "OptionFromSelf" | "optional" => Some(Self::Optional(Box::new(Self::from_node(args.first()?, source)))),
            "Literal" => args
                .iter()
                .map(|arg| literal_type(arg, source))
                .collect::<Option<Vec<_>>>()
                .map(Self::Literal),
            _ => None,
        }
    }

    /// Collects the capitalized identifiers this expression refers to.
    ///
    /// Table documents contribute every name they may render as.
    pub fn referenced_names(&self, names: &mut BTreeSet<String>)
    {
        match self {
            Self::Union(parts) => parts.iter().for_each(|part| part.referenced_names(names)),
            Self::Array(inner) | Self::Optional(inner) => inner.referenced_names(names),
            Self::Identifier(name) if starts_uppercase(name) => {
                names.insert(name.clone());
            }
            Self::TableDocument(table) => names.extend(table_type_candidates(table)),
            _ => {}
        }
    }

    /// Renders the expression as a TypeScript type, reporting every identifier
    /// it emits to `scope`.
    pub fn to_typescript(&self, scope: &mut impl TypeScope) -> String
    {
        match self {
            Self::Primitive(primitive) => primitive.as_typescript().to_string(),
            Self::Union(parts) if parts.is_empty() => "never".to_string(),
            Self::Union(parts) => parts
                .iter()
                .map(|part| part.to_typescript(scope))
                .collect::<Vec<_>>()
                .join(" | "),
            Self::Array(inner) => {
                let inner_ts = inner.to_typescript(scope);
                if inner.is_compound() {
                    format!("({inner_ts})[]")
                } else {
                    format!("{inner_ts}[]")
                }
            }
            Self::Optional(inner) => format!("Option<{}>", inner.to_typescript(scope)),
            Self::Literal(values) if values.is_empty() => "never".to_string(),
            Self::Literal(values) => values.join(" | "),
            Self::BrandedId(table) => format!("Id<'{table}'>"),
            Self::TableDocument(table) => {
                let candidates = table_type_candidates(table);
                let name = candidates
                    .iter()
                    .find(|candidate| scope.is_defined(candidate))
                    .unwrap_or(&candidates[0])
                    .clone();
                scope.use_name(&name);
                name
            }
            Self::Identifier(name) => {
                scope.use_name(name);
                name.clone()
            }
            Self::Raw(text) => text.clone(),
        }
    }

    /// True when rendering yields a top-level `|` union.
    fn is_compound(&self) -> bool
    {
        match self {
            Self::Union(parts) => parts.len() > 1,
            Self::Literal(values) => values.len() > 1,
            _ => false,
        }
    }
}

impl FromStr for SchemaExpr
{
    type Err = ConfectTypegenError;

    /// Parses standalone schema text such as `Schema.Array(Schema.Number)`.
    fn from_str(text: &str) -> Result<Self, Self::Err>
    {
        let wrapped = format!("const schema = {text};");
        let source_type = SourceType::from_path("schema.ts").map_err(|_| ConfectTypegenError::ParsingFailed {
            file: "<schema expression>".to_string(),
            details: "Failed to determine source type".to_string(),
        })?;
        let program = parse_source(&wrapped, source_type, "<schema expression>")?;

        let init = &program["body"][0]["declarations"][0]["init"];
        if init.is_null() {
            return Err(ConfectTypegenError::ParsingFailed {
                file: "<schema expression>".to_string(),
                details: format!("not an expression: {text}"),
            });
        }

        Ok(Self::from_node(init, &wrapped))
    }
}

/// Name lookup used while rendering.
pub trait TypeScope
{
    /// Whether `name` has a known definition.
    fn is_defined(&self, name: &str) -> bool;

    /// Records that `name` appears in the rendered output.
    fn use_name(&mut self, name: &str);
}

/// Converts `todo_items` into `TodoItems`.
pub fn pascal_case(value: &str) -> String
{
    value
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|segment| !segment.is_empty())
        .map(capitalize)
        .collect()
}

/// Uppercases the first character.
pub fn capitalize(value: &str) -> String
{
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Names a table document may render as, most preferred first.
fn table_type_candidates(table: &str) -> Vec<String>
{
    let plural = pascal_case(table);
    let singular = plural.strip_suffix('s').filter(|s| !s.is_empty()).unwrap_or(&plural).to_string();
    if singular == plural {
        vec![singular]
    } else {
        vec![singular, plural]
    }
}

fn table_document(node: &JsonValue) -> Option<&str>
{
    let (table_node, field) = member_parts(node)?;
    if field != "withSystemFields" {
        return None;
    }
    let (schemas_node, table) = member_parts(table_node)?;
    let (_, schemas) = member_parts(schemas_node)?;
    (schemas == "tableSchemas").then_some(table)
}

fn literal_type(node: &JsonValue, source: &str) -> Option<String>
{
    if let Some(value) = string_literal(node) {
        return Some(format!("'{}'", value.replace('\\', "\\\\").replace('\'', "\\'")));
    }
    match node_type(node)? {
        "NumericLiteral" | "BooleanLiteral" | "NullLiteral" | "Literal" => node_text(node, source).map(str::to_string),
        _ => None,
    }
}

fn is_schema_namespace(node: &JsonValue) -> bool
{
    identifier_name(node).is_some_and(|name| SCHEMA_NAMESPACES.contains(&name))
}

fn starts_uppercase(name: &str) -> bool
{
    name.chars().next().is_some_and(char::is_uppercase)
}
