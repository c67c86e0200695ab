//! Error taxonomy for compilation (registration time) and binding (request time).

use http::StatusCode;
use thiserror::Error;
use wirebind_types::{KindCategory, ParameterLocation, ParameterStyle};
use wirebind_util::http::PathDecodeError;

use crate::graph::GraphError;

/// Boxed error returned by collaborator callbacks (providers, body loaders).
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Failure to turn raw request text into a value of the target kind.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("style `{style}` is not allowed in {location}; allowed locations: {}", join(allowed))]
    UnsupportedLocation {
        style: ParameterStyle,
        location: ParameterLocation,
        allowed: Vec<ParameterLocation>,
    },

    #[error("style `{style}` cannot decode {category} target `{kind}`; allowed kinds: {}", join(allowed))]
    UnsupportedKind {
        style: ParameterStyle,
        category: KindCategory,
        kind: String,
        allowed: Vec<KindCategory>,
    },

    #[error("`{kind}` cannot be decoded from text")]
    NotDecodable { kind: String },

    #[error("parameter not found: `{name}` in {location}")]
    ParameterNotFound { name: String, location: ParameterLocation },

    #[error("missing required parameter `{name}` in {location}")]
    MissingParameter { name: String, location: ParameterLocation },

    #[error("invalid boolean `{value}`: expected `true` or `false`")]
    InvalidBool { value: String },

    #[error("value `{value}` is out of range for {target}")]
    OutOfRange { value: String, target: String },

    #[error("invalid {target} `{value}`: {reason}")]
    InvalidNumber { value: String, target: String, reason: String },

    #[error("cannot parse `{value}` as {type_name}: {message}")]
    CustomParse {
        value: String,
        type_name: &'static str,
        message: String,
    },

    #[error("malformed {style} value `{value}` for `{name}`: {reason}")]
    Malformed {
        name: String,
        style: ParameterStyle,
        value: String,
        reason: String,
    },

    #[error(transparent)]
    Path(#[from] PathDecodeError),
}

/// Registration-time failure. Fatal to route registration.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("cannot create field `{field}` of type `{ty}` for `{record}`")]
    CannotCreateField {
        field: String,
        ty: &'static str,
        record: &'static str,
    },

    #[error("unexported field `{path}` of `{record}` cannot be resolved")]
    UnexportedField { path: String, record: &'static str },

    #[error("unresolvable field `{path}` of `{record}`: {source}")]
    UnresolvableField {
        path: String,
        record: &'static str,
        #[source]
        source: Box<CompileError>,
    },

    #[error("found two request bodies: `{first}` and `{second}`")]
    DuplicateRequestBody { first: String, second: String },

    #[error("could not load param `{name}` in `{location}`: operation {operation} declares no such parameter")]
    UnknownParameter {
        name: String,
        location: ParameterLocation,
        operation: String,
    },

    #[error("parameter `{name}` in {location} of `{record}` cannot be decoded: {source}")]
    InvalidParameter {
        name: String,
        location: ParameterLocation,
        record: &'static str,
        #[source]
        source: DecodeError,
    },

    #[error("no provider for `{ty}` required by `{needed_by}`")]
    MissingProvider { ty: &'static str, needed_by: &'static str },

    #[error("dependency cycle between providers: {}", path.join(" -> "))]
    DependencyCycle { path: Vec<&'static str> },

    #[error("`{ty}` is not in the input array of `{record}`")]
    MissingInput { ty: &'static str, record: &'static str },

    #[error(transparent)]
    Graph(#[from] GraphError),
}

/// Request-time failure while running a compiled plan.
#[derive(Debug, Error)]
pub enum BindError {
    #[error("missing route context: `{record}` binds request parameters but no route context is attached")]
    MissingRouteContext { record: &'static str },

    #[error("could not load param `{name}` in `{location}`")]
    UnknownParameter { name: String, location: ParameterLocation },

    #[error("failed to decode `{field}` of `{record}`: {source}")]
    Decode {
        field: String,
        record: &'static str,
        #[source]
        source: DecodeError,
    },

    #[error("failed to load request body into `{field}` of `{record}`: {source}")]
    BodyLoad {
        field: String,
        record: &'static str,
        #[source]
        source: BoxError,
    },

    #[error("provider for `{ty}` failed: {source}")]
    Provider {
        ty: &'static str,
        #[source]
        source: BoxError,
    },

    #[error("`{ty}` is not in the input array of `{record}`")]
    MissingInput { ty: &'static str, record: &'static str },

    #[error("field `{field}` of `{record}` was never bound")]
    UnboundField { field: String, record: &'static str },

    #[error("field `{field}` of `{record}` does not hold a `{expected}`")]
    FieldType {
        field: String,
        record: &'static str,
        expected: &'static str,
    },

    #[error("field `{field}` of `{record}` could not be deserialized: {source}")]
    Deserialize {
        field: String,
        record: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("`{ty}` is shared with the container and cannot be handed out by value")]
    SharedRecord { ty: &'static str },
}

impl BindError {
    /// Suggested response status: request-shaped failures are the client's fault,
    /// everything else is a server fault.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Decode { .. } | Self::BodyLoad { .. } => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// A [`BindError`] annotated with the handler that consumed the plan.
#[derive(Debug, Error)]
#[error("{handler} ({file}:{line}): {source}")]
pub struct ExecutionError {
    handler: String,
    file: &'static str,
    line: u32,
    #[source]
    source: BindError,
}

impl ExecutionError {
    pub(crate) fn new(handler: String, file: &'static str, line: u32, source: BindError) -> Self {
        Self { handler, file, line, source }
    }

    pub fn handler(&self) -> &str {
        &self.handler
    }

    pub fn file(&self) -> &'static str {
        self.file
    }

    pub fn line(&self) -> u32 {
        self.line
    }

    pub fn bind_error(&self) -> &BindError {
        &self.source
    }

    pub fn into_bind_error(self) -> BindError {
        self.source
    }

    pub fn status_code(&self) -> StatusCode {
        self.source.status_code()
    }
}

fn join<T: std::fmt::Display>(items: &[T]) -> String {
    items.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
}
