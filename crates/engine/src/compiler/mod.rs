//! Plan compilation.
//!
//! [`PlanCompiler`] runs at route-registration time. For a record it classifies every
//! field, compiles nested records first, and registers a [`RecordGenerator`] in the
//! container keyed by the record's type. For a handler it then orders every provider
//! the record transitively needs and freezes the result into a [`Plan`].
//!
//! Compilation is idempotent: a record is classified and registered once per compiler,
//! and later requests for it return the cached [`CompiledRecord`].

mod classify;
mod planning;

use std::{marker::PhantomData, panic::Location, sync::Arc};

use indexmap::IndexMap;
use tracing::{debug, warn};
use wirebind_types::{OperationSpec, ParameterSpec, TypeKey, ValueKind};

pub use classify::{ClassifiedField, ClassifiedRecord, FieldClassifier, Provenance};

use crate::{
    body::{BodyLoader, BodyTarget, ContentTypeBodyLoader},
    config::BinderConfig,
    container::{Container, Provider},
    decode::{ParamBinding, ParameterDecoder},
    error::CompileError,
    executor::{CompiledHandler, FieldStep, OperationBindings, RecordGenerator},
    record::{FieldKind, Record, RecordShape},
};

/// A parameter discovered anywhere in a record's recursive field set.
#[derive(Debug, Clone)]
pub struct ParameterDescriptor {
    /// Dotted field path relative to the compiled record.
    pub field_path: String,
    /// The record that declares the field.
    pub record: &'static str,
    pub binding: ParamBinding,
    owner: TypeKey,
    field: &'static str,
}

impl ParameterDescriptor {
    /// Parameter metadata for the operation's OpenAPI document.
    pub fn to_parameter_spec(&self) -> ParameterSpec {
        self.binding.to_parameter_spec()
    }

    fn nested_under(&self, field: &str) -> Self {
        Self {
            field_path: format!("{field}.{}", self.field_path),
            ..self.clone()
        }
    }
}

/// The request body field of a record, if it has one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BodyDescriptor {
    pub field_path: String,
    pub record: &'static str,
    pub ty: TypeKey,
}

impl BodyDescriptor {
    fn nested_under(&self, field: &str) -> Self {
        Self {
            field_path: format!("{field}.{}", self.field_path),
            ..self.clone()
        }
    }
}

/// What compiling a record produced.
#[derive(Debug, Clone)]
pub struct CompiledRecord {
    ty: TypeKey,
    parameters: Vec<ParameterDescriptor>,
    request_body: Option<BodyDescriptor>,
    atomic: bool,
}

impl CompiledRecord {
    pub fn ty(&self) -> TypeKey {
        self.ty
    }

    pub fn parameters(&self) -> &[ParameterDescriptor] {
        &self.parameters
    }

    pub fn request_body(&self) -> Option<&BodyDescriptor> {
        self.request_body.as_ref()
    }

    /// Whether the record was already provided by the container and is built as a whole.
    pub fn is_atomic(&self) -> bool {
        self.atomic
    }
}

pub struct PlanCompiler {
    container: Container,
    config: BinderConfig,
    decoder: ParameterDecoder,
    body_loader: Arc<dyn BodyLoader>,
    compiled: IndexMap<TypeKey, Arc<CompiledRecord>>,
}

impl Default for PlanCompiler {
    fn default() -> Self {
        Self::new(BinderConfig::default())
    }
}

impl PlanCompiler {
    pub fn new(config: BinderConfig) -> Self {
        Self {
            container: Container::new(),
            decoder: ParameterDecoder::new(config.style_policy),
            config,
            body_loader: Arc::new(ContentTypeBodyLoader),
            compiled: IndexMap::new(),
        }
    }

    pub fn with_container(mut self, container: Container) -> Self {
        self.container = container;
        self
    }

    /// Replaces the body loader used by generators compiled from now on.
    pub fn with_body_loader(mut self, body_loader: impl BodyLoader + 'static) -> Self {
        self.body_loader = Arc::new(body_loader);
        self
    }

    pub fn config(&self) -> &BinderConfig {
        &self.config
    }

    pub fn container(&self) -> &Container {
        &self.container
    }

    pub fn container_mut(&mut self) -> &mut Container {
        &mut self.container
    }

    pub fn compiled(&self, ty: &TypeKey) -> Option<&Arc<CompiledRecord>> {
        self.compiled.get(ty)
    }

    pub fn compile_record<R: Record>(&mut self) -> Result<Arc<CompiledRecord>, CompileError> {
        self.compile_shape(R::shape())
    }

    pub fn compile_shape(&mut self, shape: RecordShape) -> Result<Arc<CompiledRecord>, CompileError> {
        if let Some(compiled) = self.compiled.get(&shape.ty()) {
            return Ok(Arc::clone(compiled));
        }
        let classified = FieldClassifier::new(&self.container, &self.compiled).classify(&shape)?;
        self.compile_classified(&classified)
    }

    fn compile_classified(&mut self, classified: &ClassifiedRecord) -> Result<Arc<CompiledRecord>, CompileError> {
        let ty = classified.shape.ty();
        let record = classified.shape.name();
        if let Some(compiled) = self.compiled.get(&ty) {
            return Ok(Arc::clone(compiled));
        }

        if classified.atomic {
            debug!(record, "record is provided by the container; no generator compiled");
            let compiled = Arc::new(CompiledRecord {
                ty,
                parameters: Vec::new(),
                request_body: None,
                atomic: true,
            });
            self.compiled.insert(ty, Arc::clone(&compiled));
            return Ok(compiled);
        }

        let mut inputs: Vec<TypeKey> = Vec::new();
        let mut steps = Vec::with_capacity(classified.fields.len());
        let mut parameters = Vec::new();
        let mut request_body = None;

        for classified_field in &classified.fields {
            let field = &classified_field.field;
            match &classified_field.provenance {
                Provenance::RequestBody => {
                    steps.push(FieldStep::LoadBody {
                        field: field.name(),
                        target: BodyTarget {
                            record,
                            field: field.name().to_string(),
                            ty: field.ty(),
                        },
                    });
                    request_body = Some(BodyDescriptor {
                        field_path: field.name().to_string(),
                        record,
                        ty: field.ty(),
                    });
                }
                Provenance::Parameter(tag) => {
                    let kind = match field.kind() {
                        FieldKind::Value(kind) => kind.clone(),
                        FieldKind::Record(_) => ValueKind::Opaque,
                    };
                    let binding = ParamBinding::from_tag(tag, kind);
                    parameters.push(ParameterDescriptor {
                        field_path: field.name().to_string(),
                        record,
                        binding: binding.clone(),
                        owner: ty,
                        field: field.name(),
                    });
                    steps.push(FieldStep::BindParameter {
                        field: field.name(),
                        binding,
                    });
                }
                Provenance::ContainerProvided => {
                    if let Some(nested) = self.compiled.get(&field.ty()) {
                        parameters.extend(nested.parameters.iter().map(|parameter| parameter.nested_under(field.name())));
                        request_body = request_body.or_else(|| nested.request_body.as_ref().map(|body| body.nested_under(field.name())));
                    }
                    steps.push(FieldStep::AssignField {
                        field: field.name(),
                        input: input_slot(&mut inputs, field.ty()),
                    });
                }
                Provenance::NestedRecord(nested) => {
                    let nested = self.compile_classified(nested)?;
                    parameters.extend(nested.parameters.iter().map(|parameter| parameter.nested_under(field.name())));
                    request_body = request_body.or_else(|| nested.request_body.as_ref().map(|body| body.nested_under(field.name())));
                    if !self.container.has_type(&field.ty()) {
                        return Err(CompileError::MissingProvider {
                            ty: field.ty().name(),
                            needed_by: record,
                        });
                    }
                    steps.push(FieldStep::AssignField {
                        field: field.name(),
                        input: input_slot(&mut inputs, field.ty()),
                    });
                }
            }
        }

        // The body is read before anything else touches the request.
        steps.sort_by_key(|step| !matches!(step, FieldStep::LoadBody { .. }));

        let generator = RecordGenerator::new(
            classified.shape.clone(),
            inputs,
            steps,
            Arc::clone(&self.body_loader),
            self.decoder,
            self.config.strict_operation_parameters,
        );
        let registered = self.container.provide(Provider::record(Arc::new(generator)));
        debug!(
            record,
            parameter_count = parameters.len(),
            has_body = request_body.is_some(),
            registered,
            "record compiled"
        );

        let compiled = Arc::new(CompiledRecord {
            ty,
            parameters,
            request_body,
            atomic: false,
        });
        self.compiled.insert(ty, Arc::clone(&compiled));
        Ok(compiled)
    }

    /// Compiles the record a handler consumes and freezes its execution plan.
    ///
    /// When `operation` is given, every parameter field is matched against the
    /// operation's parameters, unset style and explode flags are taken from it, and the
    /// effective style is validated for the field's kind and location. The caller's
    /// location is recorded for error reports.
    #[track_caller]
    pub fn compile_handler<R: Record>(
        &mut self,
        handler: impl Into<String>,
        operation: Option<&OperationSpec>,
    ) -> Result<CompiledHandler<R>, CompileError> {
        let caller = Location::caller();
        let handler = handler.into();
        let compiled = self.compile_record::<R>()?;

        let mut parameters = compiled.parameters.clone();
        if let Some(operation) = operation {
            for descriptor in &mut parameters {
                let binding = &descriptor.binding;
                match operation.find_parameter(&binding.name, binding.location) {
                    Some(parameter) => descriptor.binding = binding.clone().with_operation(parameter),
                    None if self.config.strict_operation_parameters => {
                        return Err(CompileError::UnknownParameter {
                            name: binding.name.clone(),
                            location: binding.location,
                            operation: operation.display_name(),
                        });
                    }
                    None => warn!(
                        handler = %handler,
                        parameter = %binding.name,
                        location = %binding.location,
                        "operation does not declare parameter; binding from the field tag alone"
                    ),
                }
            }
        }

        for descriptor in &parameters {
            self.decoder
                .check(&descriptor.binding)
                .map_err(|source| CompileError::InvalidParameter {
                    name: descriptor.binding.name.clone(),
                    location: descriptor.binding.location,
                    record: descriptor.record,
                    source,
                })?;
        }

        let operation = operation.cloned().map(Arc::new);
        let frozen = match &operation {
            Some(_) => parameters
                .iter()
                .map(|descriptor| ((descriptor.owner, descriptor.field), descriptor.binding.clone()))
                .collect(),
            None => IndexMap::new(),
        };
        let plan = planning::build_plan(&self.container, compiled.ty())?.with_bindings(OperationBindings::new(operation, frozen));
        debug!(handler = %handler, record = compiled.ty().name(), step_count = plan.steps().len(), "handler plan compiled");

        Ok(CompiledHandler {
            handler,
            file: caller.file(),
            line: caller.line(),
            plan: Arc::new(plan),
            parameters,
            request_body: compiled.request_body.clone(),
            record: PhantomData,
        })
    }
}

fn input_slot(inputs: &mut Vec<TypeKey>, ty: TypeKey) -> usize {
    match inputs.iter().position(|input| *input == ty) {
        Some(index) => index,
        None => {
            inputs.push(ty);
            inputs.len() - 1
        }
    }
}
