//! Shared records produced by a scan.
//!
//! These types are the stable interface between the extraction layer (which
//! produces them) and the codegen layer (which consumes them).

use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;

use crate::schema::SchemaExpr;

/// The three Confect function factories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum FunctionKind
{
    Query,
    Mutation,
    Action,
}

impl FunctionKind
{
    /// Maps a factory identifier (`confectQuery`, ...) to its kind.
    pub fn from_factory(name: &str) -> Option<Self>
    {
        match name {
            "confectQuery" => Some(Self::Query),
            "confectMutation" => Some(Self::Mutation),
            "confectAction" => Some(Self::Action),
            _ => None,
        }
    }
}

impl fmt::Display for FunctionKind
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        match self {
            Self::Query => write!(f, "query"),
            Self::Mutation => write!(f, "mutation"),
            Self::Action => write!(f, "action"),
        }
    }
}

/// A captured `errors:` or `returns:` value.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaSource
{
    /// Verbatim source text of the property value.
    pub text: String,
    /// The value converted into the schema AST.
    pub expr: SchemaExpr,
}

/// One recognized Confect function definition.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedFunction
{
    /// Identifier bound by the exported declaration.
    pub name: String,
    pub kind: FunctionKind,
    pub error_schema: Option<SchemaSource>,
    pub return_schema: Option<SchemaSource>,
    /// Path relative to the scanned root.
    pub source_file: PathBuf,
    /// Source path without extension, `/`-separated (`admin/functions`).
    pub module_key: String,
    /// `module_key.name`, unique across the scanned tree.
    pub full_key: String,
    /// Capitalized identifiers referenced by the error schema.
    pub error_type_names: BTreeSet<String>,
}

/// Where an identifier referenced from a schema is defined.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum TypeLocation
{
    /// Exported class/interface/type alias in a scanned file (path relative to the root).
    Local(PathBuf),
    /// Named import from a package specifier.
    Package(String),
}
