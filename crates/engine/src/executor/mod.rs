//! Request-time execution of compiled plans.
//!
//! - [`RecordGenerator`] fills one record: body first, then parameters, then inputs
//! - [`PlanExecutor`] runs a [`Plan`]'s providers in order with per-execution slots
//! - [`CompiledHandler`] is the entry point a router calls with the matched request
//!
//! Plans and generators are immutable and shared across concurrent requests; everything
//! mutable lives in the slots of a single execution.

mod types;

use std::{fmt, marker::PhantomData, sync::Arc};

use bytes::Bytes;
use http::Request;
use tracing::{debug, trace};
use wirebind_types::{OperationSpec, TypeKey};

pub use types::{FieldStep, OperationBindings, Plan, Step};

use crate::{
    body::BodyLoader,
    compiler::{BodyDescriptor, ParameterDescriptor},
    container::{Constructor, ProviderArgs},
    context::{MatchedRoute, RouteContext},
    decode::{ParamBinding, ParameterDecoder},
    error::{BindError, ExecutionError},
    record::{FieldValues, Instance, Record, RecordShape},
};

/// The generated constructor of a record.
pub struct RecordGenerator {
    shape: RecordShape,
    inputs: Vec<TypeKey>,
    steps: Vec<FieldStep>,
    body_loader: Arc<dyn BodyLoader>,
    decoder: ParameterDecoder,
    strict_operation_parameters: bool,
}

impl RecordGenerator {
    pub(crate) fn new(
        shape: RecordShape,
        inputs: Vec<TypeKey>,
        steps: Vec<FieldStep>,
        body_loader: Arc<dyn BodyLoader>,
        decoder: ParameterDecoder,
        strict_operation_parameters: bool,
    ) -> Self {
        Self {
            shape,
            inputs,
            steps,
            body_loader,
            decoder,
            strict_operation_parameters,
        }
    }

    pub fn ty(&self) -> TypeKey {
        self.shape.ty()
    }

    /// Container-provided and nested-record types, in input order.
    pub fn inputs(&self) -> &[TypeKey] {
        &self.inputs
    }

    pub fn steps(&self) -> &[FieldStep] {
        &self.steps
    }

    pub fn needs_route_context(&self) -> bool {
        self.steps
            .iter()
            .any(|step| matches!(step, FieldStep::LoadBody { .. } | FieldStep::BindParameter { .. }))
    }

    /// Builds the record from its positional inputs and the request.
    ///
    /// Parameters use the handler's compile-time `bindings`, unless the route carries an
    /// operation those bindings were not merged with.
    pub fn generate(&self, inputs: &[Instance], ctx: Option<&RouteContext>, bindings: &OperationBindings) -> Result<Instance, BindError> {
        let record = self.shape.name();
        let route_context = || ctx.ok_or(BindError::MissingRouteContext { record });
        if self.needs_route_context() {
            route_context()?;
        }

        let mut values = FieldValues::new(record);
        for step in &self.steps {
            match step {
                FieldStep::LoadBody { field, target } => {
                    let ctx = route_context()?;
                    trace!(record, field = *field, "loading request body");
                    let body = self.body_loader.load(ctx.request(), target).map_err(|source| BindError::BodyLoad {
                        field: target.field.clone(),
                        record,
                        source: source.into(),
                    })?;
                    values.insert_json(*field, body);
                }
                FieldStep::BindParameter { field, binding } => {
                    let ctx = route_context()?;
                    let merged;
                    let binding = match ctx.operation() {
                        Some(operation) if !bindings.covers(operation) => {
                            merged = self.merge_route_operation(binding, operation)?;
                            &merged
                        }
                        _ => bindings.get(self.ty(), *field).unwrap_or(binding),
                    };
                    trace!(record, field = *field, parameter = %binding.name, location = %binding.location, "binding parameter");
                    let value = self.decoder.decode(binding, ctx).map_err(|source| BindError::Decode {
                        field: field.to_string(),
                        record,
                        source,
                    })?;
                    values.insert_json(*field, value);
                }
                FieldStep::AssignField { field, input } => {
                    let value = inputs.get(*input).ok_or_else(|| BindError::MissingInput {
                        ty: self.inputs.get(*input).map_or(record, TypeKey::name),
                        record,
                    })?;
                    values.insert_instance(*field, Arc::clone(value));
                }
            }
        }

        self.shape.assemble(&mut values)
    }

    /// Merges metadata of an operation the route matched at request time.
    fn merge_route_operation(&self, binding: &ParamBinding, operation: &OperationSpec) -> Result<ParamBinding, BindError> {
        match operation.find_parameter(&binding.name, binding.location) {
            Some(parameter) => Ok(binding.clone().with_operation(parameter)),
            None if self.strict_operation_parameters => Err(BindError::UnknownParameter {
                name: binding.name.clone(),
                location: binding.location,
            }),
            None => Ok(binding.clone()),
        }
    }
}

impl fmt::Debug for RecordGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordGenerator")
            .field("ty", &self.shape.ty())
            .field("inputs", &self.inputs)
            .field("steps", &self.steps)
            .finish()
    }
}

/// Runs a [`Plan`] once.
#[derive(Debug, Clone, Copy)]
pub struct PlanExecutor<'p> {
    plan: &'p Plan,
}

impl<'p> PlanExecutor<'p> {
    pub fn new(plan: &'p Plan) -> Self {
        Self { plan }
    }

    /// Invokes every provider in plan order and returns the record instance. The first
    /// failing step aborts the execution.
    pub fn execute(&self, ctx: Option<&RouteContext>) -> Result<Instance, BindError> {
        let record = self.plan.record().name();
        if self.plan.needs_route_context() && ctx.is_none() {
            return Err(BindError::MissingRouteContext { record });
        }

        let mut slots: Vec<Option<Instance>> = vec![None; self.plan.slot_count()];
        for step in self.plan.steps() {
            let Step::InvokeProvider { provider, inputs, output } = step;
            let ty = provider.output();
            let args = inputs
                .iter()
                .zip(provider.inputs())
                .map(|(slot, input)| {
                    slots.get(*slot).cloned().flatten().ok_or(BindError::MissingInput {
                        ty: input.name(),
                        record: ty.name(),
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;

            trace!(ty = %ty, input_count = args.len(), "invoking provider");
            let value = match provider.constructor() {
                Constructor::Function(constructor) => {
                    constructor(&ProviderArgs::new(ty, &args)).map_err(|source| BindError::Provider {
                        ty: ty.name(),
                        source: source.into(),
                    })?
                }
                Constructor::Record(generator) => generator.generate(&args, ctx, self.plan.bindings())?,
            };

            match slots.get_mut(*output) {
                Some(slot) => *slot = Some(value),
                None => return Err(BindError::MissingInput { ty: ty.name(), record }),
            }
        }

        slots
            .get_mut(self.plan.output_slot())
            .and_then(Option::take)
            .ok_or(BindError::MissingInput { ty: record, record })
    }
}

/// A handler's compiled input binding.
pub struct CompiledHandler<R> {
    pub(crate) handler: String,
    pub(crate) file: &'static str,
    pub(crate) line: u32,
    pub(crate) plan: Arc<Plan>,
    pub(crate) parameters: Vec<ParameterDescriptor>,
    pub(crate) request_body: Option<BodyDescriptor>,
    pub(crate) record: PhantomData<fn() -> R>,
}

impl<R: Record> CompiledHandler<R> {
    /// Binds the record for one matched request.
    pub fn bind(&self, request: Request<Bytes>, route: MatchedRoute) -> Result<R, ExecutionError> {
        self.bind_context(&RouteContext::new(request, route))
    }

    pub fn bind_context(&self, ctx: &RouteContext) -> Result<R, ExecutionError> {
        self.unwrap_record(self.run(Some(ctx)))
    }

    /// Binds without any request, for records built only from the container.
    pub fn bind_detached(&self) -> Result<R, ExecutionError> {
        self.unwrap_record(self.run(None))
    }

    /// Like [`CompiledHandler::bind_context`], but hands out the shared instance. Needed
    /// when the container itself provides `R`.
    pub fn bind_shared(&self, ctx: Option<&RouteContext>) -> Result<Arc<R>, ExecutionError> {
        self.run(ctx)
    }

    /// Binds the record and passes it to `handler`.
    pub fn call<T>(&self, request: Request<Bytes>, route: MatchedRoute, handler: impl FnOnce(R) -> T) -> Result<T, ExecutionError> {
        self.bind(request, route).map(handler)
    }

    fn run(&self, ctx: Option<&RouteContext>) -> Result<Arc<R>, ExecutionError> {
        PlanExecutor::new(&self.plan)
            .execute(ctx)
            .and_then(|instance| {
                instance.downcast::<R>().map_err(|_| BindError::FieldType {
                    field: String::new(),
                    record: self.plan.record().name(),
                    expected: std::any::type_name::<R>(),
                })
            })
            .map_err(|source| self.annotate(source))
    }

    fn unwrap_record(&self, shared: Result<Arc<R>, ExecutionError>) -> Result<R, ExecutionError> {
        Arc::try_unwrap(shared?).map_err(|_| {
            self.annotate(BindError::SharedRecord {
                ty: std::any::type_name::<R>(),
            })
        })
    }

    fn annotate(&self, source: BindError) -> ExecutionError {
        debug!(handler = %self.handler, file = self.file, line = self.line, error = %source, "binding failed");
        ExecutionError::new(self.handler.clone(), self.file, self.line, source)
    }
}

impl<R> CompiledHandler<R> {
    pub fn handler(&self) -> &str {
        &self.handler
    }

    /// Source location of the `compile_handler` call.
    pub fn location(&self) -> (&'static str, u32) {
        (self.file, self.line)
    }

    pub fn plan(&self) -> &Plan {
        &self.plan
    }

    /// Parameters of the record, with operation metadata merged in, for the OpenAPI
    /// document assembler.
    pub fn parameters(&self) -> &[ParameterDescriptor] {
        &self.parameters
    }

    pub fn request_body(&self) -> Option<&BodyDescriptor> {
        self.request_body.as_ref()
    }

    /// The operation the handler was compiled against.
    pub fn operation(&self) -> Option<&OperationSpec> {
        self.plan.bindings().operation()
    }
}

impl<R> Clone for CompiledHandler<R> {
    fn clone(&self) -> Self {
        Self {
            handler: self.handler.clone(),
            file: self.file,
            line: self.line,
            plan: Arc::clone(&self.plan),
            parameters: self.parameters.clone(),
            request_body: self.request_body.clone(),
            record: PhantomData,
        }
    }
}

impl<R> fmt::Debug for CompiledHandler<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledHandler")
            .field("handler", &self.handler)
            .field("file", &self.file)
            .field("line", &self.line)
            .field("plan", &self.plan)
            .finish()
    }
}
