//! # Wirebind Engine
//!
//! The Wirebind Engine binds an HTTP handler's declared input record to request values.
//! Each field comes from exactly one source: the type-keyed [`Container`], a path,
//! query, header or cookie parameter decoded by OpenAPI style rules, or the request body.
//! Everything that can be checked without a request is checked at registration time.
//!
//! ## Key Features
//!
//! - **Provenance classification**: every field resolves to one source or compilation fails
//! - **Dependency ordering**: providers run in topological order; cycles are rejected up front
//! - **OpenAPI parameter styles**: form, deepObject, simple, label, matrix and delimited arrays
//! - **Single request body**: at most one body field per record, nested records included
//!
//! ## Usage
//!
//! ```rust
//! use bytes::Bytes;
//! use http::Request;
//! use wirebind_engine::{BindError, FieldShape, FieldValues, MatchedRoute, ParamTag, PlanCompiler, Record, RecordShape};
//!
//! struct ShowPet {
//!     id: u64,
//!     verbose: bool,
//! }
//!
//! impl Record for ShowPet {
//!     fn shape() -> RecordShape {
//!         RecordShape::new::<Self>([
//!             FieldShape::param::<u64>("id", ParamTag::path("id")),
//!             FieldShape::param::<bool>("verbose", ParamTag::query("verbose")),
//!         ])
//!     }
//!
//!     fn assemble(values: &mut FieldValues) -> Result<Self, BindError> {
//!         Ok(Self {
//!             id: values.param("id")?,
//!             verbose: values.param("verbose")?,
//!         })
//!     }
//! }
//!
//! let mut compiler = PlanCompiler::default();
//! let handler = compiler.compile_handler::<ShowPet>("show_pet", None)?;
//!
//! let request = Request::builder().uri("/pets/7?verbose=true").body(Bytes::new())?;
//! let pet = handler.bind(request, MatchedRoute::new("/pets/{id}").with_path_param("id", "7"))?;
//! assert_eq!(pet.id, 7);
//! assert!(pet.verbose);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Architecture
//!
//! - **`graph`**: append-only directed graph with topological sort and cycle reporting
//! - **`record`**: record shapes, field tags and the value bag records are assembled from
//! - **`container`**: type-keyed provider registry
//! - **`compiler`**: field classification and plan compilation
//! - **`decode`**: parameter decoding per location, style and explode flag
//! - **`executor`**: request-time plan execution and the compiled handler entry point
//! - **`body`**, **`context`**, **`config`**, **`error`**: collaborators and ambient pieces

pub mod body;
pub mod compiler;
pub mod config;
pub mod container;
pub mod context;
pub mod decode;
pub mod error;
pub mod executor;
pub mod graph;
pub mod record;

pub use body::{BodyLoader, BodyTarget, ContentTypeBodyLoader, FormBodyLoader, JsonBodyLoader};
pub use compiler::{BodyDescriptor, CompiledRecord, ParameterDescriptor, PlanCompiler, Provenance};
pub use config::{BinderConfig, StylePolicy};
pub use container::{Container, Provider, ProviderArgs};
pub use context::{MatchedRoute, RouteContext};
pub use decode::{ParamBinding, ParameterDecoder};
pub use error::{BindError, CompileError, DecodeError, ExecutionError};
pub use executor::{CompiledHandler, OperationBindings, Plan, PlanExecutor, RecordGenerator, Step};
pub use graph::{CycleError, GraphError, TypeGraph};
pub use record::{FieldShape, FieldValues, Instance, ParamTag, Record, RecordShape};
pub use wirebind_types::{OperationSpec, ParameterLocation, ParameterSpec, ParameterStyle, TypeKey, ValueKind};
