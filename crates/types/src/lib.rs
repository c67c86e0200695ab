//! # Wirebind Types
//!
//! Shared data model for binding HTTP handler inputs to request values.
//!
//! The engine crate consumes these types when it classifies record fields and decodes
//! parameters; collaborators (routers, OpenAPI document assemblers) produce or consume
//! them at the boundary:
//!
//! - [`TypeKey`]: opaque identity of a target shape (record or primitive)
//! - [`ParameterLocation`] / [`ParameterStyle`]: OpenAPI parameter placement and serialization
//! - [`ParameterSpec`] / [`OperationSpec`]: operation metadata as found in an OpenAPI document
//! - [`ValueKind`]: the decodable shape of a parameter target

use std::{
    any::TypeId,
    error::Error,
    fmt,
    hash::{Hash, Hasher},
    str::FromStr,
};

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub mod kind;
pub mod openapi;

pub use kind::{IntWidth, KindCategory, ObjectField, TextParser, ValueKind};
pub use openapi::{collect_parameters, load_document};

/// Opaque, comparable identity of a target shape.
///
/// Equality and hashing use the underlying [`TypeId`]; the type name is carried only
/// for diagnostics.
#[derive(Clone, Copy)]
pub struct TypeKey {
    id: TypeId,
    name: &'static str,
}

impl TypeKey {
    /// Returns the key for `T`.
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// Fully qualified type name, as reported by [`std::any::type_name`].
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn type_id(&self) -> TypeId {
        self.id
    }
}

impl PartialEq for TypeKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeKey {}

impl Hash for TypeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeKey({})", self.name)
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Where a parameter is carried in the HTTP request.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterLocation {
    /// Captured by route matching from the URL path (`/pets/{id}`).
    Path,
    /// Query string (`?limit=10`).
    Query,
    /// Request header.
    Header,
    /// `Cookie` header entry.
    Cookie,
}

impl ParameterLocation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Path => "path",
            Self::Query => "query",
            Self::Header => "header",
            Self::Cookie => "cookie",
        }
    }
}

impl fmt::Display for ParameterLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ParameterLocation {
    type Err = ParseParameterLocationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "path" => Ok(Self::Path),
            "query" => Ok(Self::Query),
            "header" => Ok(Self::Header),
            "cookie" => Ok(Self::Cookie),
            _ => Err(ParseParameterLocationError(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseParameterLocationError(String);

impl fmt::Display for ParseParameterLocationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid parameter location '{}'; expected path, query, header or cookie", self.0)
    }
}

impl Error for ParseParameterLocationError {}

/// OpenAPI serialization style of a parameter.
///
/// A parameter without a declared style is represented as `None` by callers; how that
/// is interpreted depends on the binder's style policy.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ParameterStyle {
    Form,
    Simple,
    Label,
    Matrix,
    DeepObject,
    SpaceDelimited,
    PipeDelimited,
}

impl ParameterStyle {
    /// The style OpenAPI assumes when a parameter declares none: `simple` for path and
    /// header parameters, `form` for query and cookie parameters.
    pub fn default_for(location: ParameterLocation) -> Self {
        match location {
            ParameterLocation::Path | ParameterLocation::Header => Self::Simple,
            ParameterLocation::Query | ParameterLocation::Cookie => Self::Form,
        }
    }

    /// OpenAPI default for `explode`: true for `form`, false for every other style.
    pub fn default_explode(self) -> bool {
        matches!(self, Self::Form)
    }

    /// Locations at which this style may be used.
    pub fn allowed_locations(self) -> &'static [ParameterLocation] {
        use ParameterLocation::*;
        match self {
            Self::Form => &[Query, Cookie],
            Self::DeepObject | Self::SpaceDelimited | Self::PipeDelimited => &[Query],
            Self::Simple => &[Path, Header],
            Self::Label | Self::Matrix => &[Path],
        }
    }

    /// Target kind categories this style can decode into.
    pub fn allowed_categories(self) -> &'static [KindCategory] {
        use KindCategory::*;
        match self {
            Self::Form | Self::Label | Self::Matrix => &[Primitive, Array, Object],
            Self::Simple => &[Primitive, Array],
            Self::DeepObject => &[Object],
            Self::SpaceDelimited | Self::PipeDelimited => &[Array],
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Form => "form",
            Self::Simple => "simple",
            Self::Label => "label",
            Self::Matrix => "matrix",
            Self::DeepObject => "deepObject",
            Self::SpaceDelimited => "spaceDelimited",
            Self::PipeDelimited => "pipeDelimited",
        }
    }
}

impl fmt::Display for ParameterStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single parameter of an OpenAPI operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSpec {
    pub name: String,
    #[serde(rename = "in")]
    pub location: ParameterLocation,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<ParameterStyle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explode: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ParameterSpec {
    /// Creates a parameter with no style, explode or schema information. Path parameters
    /// are always required.
    pub fn new(name: impl Into<String>, location: ParameterLocation) -> Self {
        Self {
            name: name.into(),
            location,
            required: location == ParameterLocation::Path,
            style: None,
            explode: None,
            schema: None,
            description: None,
        }
    }

    pub fn with_style(mut self, style: ParameterStyle) -> Self {
        self.style = Some(style);
        self
    }

    pub fn with_explode(mut self, explode: bool) -> Self {
        self.explode = Some(explode);
        self
    }

    pub fn with_schema(mut self, schema: Value) -> Self {
        self.schema = Some(schema);
        self
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    /// Path parameters are required regardless of what the document declares.
    pub fn is_required(&self) -> bool {
        self.required || self.location == ParameterLocation::Path
    }

    /// The schema's `default`, if any.
    pub fn default_value(&self) -> Option<&Value> {
        self.schema.as_ref()?.get("default").filter(|value| !value.is_null())
    }

    /// Renders the schema default as the single raw (un-exploded) string that is
    /// substituted when the request carries no value for this parameter.
    ///
    /// Arrays become comma-joined elements and objects become `key,value` pairs, matching
    /// the non-exploded `form` serialization.
    pub fn default_text(&self) -> Option<String> {
        self.default_value().map(render_default)
    }
}

fn render_default(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Array(items) => items.iter().map(render_default).collect::<Vec<_>>().join(","),
        Value::Object(map) => map
            .iter()
            .flat_map(|(key, value)| [key.clone(), render_default(value)])
            .collect::<Vec<_>>()
            .join(","),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// The matched operation's metadata, as needed to decode its parameters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OperationSpec {
    #[serde(default, rename = "operationId", skip_serializing_if = "Option::is_none")]
    pub operation_id: Option<String>,
    #[serde(default)]
    pub method: String,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub parameters: Vec<ParameterSpec>,
}

impl OperationSpec {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            operation_id: None,
            method: method.into().to_ascii_uppercase(),
            path: path.into(),
            parameters: Vec::new(),
        }
    }

    pub fn with_parameter(mut self, parameter: ParameterSpec) -> Self {
        self.parameters.push(parameter);
        self
    }

    /// Looks up a parameter by name and location. Header names compare case-insensitively.
    pub fn find_parameter(&self, name: &str, location: ParameterLocation) -> Option<&ParameterSpec> {
        self.parameters.iter().find(|parameter| {
            parameter.location == location
                && match location {
                    ParameterLocation::Header => parameter.name.eq_ignore_ascii_case(name),
                    _ => parameter.name == name,
                }
        })
    }

    /// Human readable identifier used in diagnostics (`operationId` or `METHOD path`).
    pub fn display_name(&self) -> String {
        match &self.operation_id {
            Some(operation_id) => operation_id.clone(),
            None => format!("{} {}", self.method, self.path),
        }
    }
}
