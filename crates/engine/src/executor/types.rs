//! Plan representation interpreted by the executor.

use std::sync::Arc;

use indexmap::IndexMap;
use wirebind_types::{OperationSpec, TypeKey};

use crate::{body::BodyTarget, container::Provider, decode::ParamBinding};

/// One provider invocation. `inputs` and `output` are execution slots.
#[derive(Debug, Clone)]
pub enum Step {
    InvokeProvider {
        provider: Provider,
        inputs: Vec<usize>,
        output: usize,
    },
}

/// How a record generator fills one field.
#[derive(Debug, Clone)]
pub enum FieldStep {
    /// Run the body loader into `field`.
    LoadBody { field: &'static str, target: BodyTarget },
    /// Decode a parameter into `field`.
    BindParameter { field: &'static str, binding: ParamBinding },
    /// Move the generator input at `input` into `field`.
    AssignField { field: &'static str, input: usize },
}

/// Parameter bindings merged with a handler's operation when the handler was compiled,
/// keyed by declaring record and field.
#[derive(Debug, Clone, Default)]
pub struct OperationBindings {
    operation: Option<Arc<OperationSpec>>,
    bindings: IndexMap<(TypeKey, &'static str), ParamBinding>,
}

impl OperationBindings {
    pub(crate) fn new(operation: Option<Arc<OperationSpec>>, bindings: IndexMap<(TypeKey, &'static str), ParamBinding>) -> Self {
        Self { operation, bindings }
    }

    pub fn operation(&self) -> Option<&OperationSpec> {
        self.operation.as_deref()
    }

    pub fn get(&self, record: TypeKey, field: &'static str) -> Option<&ParamBinding> {
        self.bindings.get(&(record, field))
    }

    /// Whether `operation` is the one these bindings were merged with.
    pub fn covers(&self, operation: &OperationSpec) -> bool {
        self.operation
            .as_deref()
            .is_some_and(|frozen| std::ptr::eq(frozen, operation) || frozen == operation)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

/// The frozen, reusable construction sequence of one handler record.
#[derive(Debug, Clone)]
pub struct Plan {
    record: TypeKey,
    steps: Vec<Step>,
    output: usize,
    slot_count: usize,
    needs_route_context: bool,
    bindings: OperationBindings,
}

impl Plan {
    pub(crate) fn new(record: TypeKey, steps: Vec<Step>, output: usize, slot_count: usize, needs_route_context: bool) -> Self {
        Self {
            record,
            steps,
            output,
            slot_count,
            needs_route_context,
            bindings: OperationBindings::default(),
        }
    }

    pub(crate) fn with_bindings(mut self, bindings: OperationBindings) -> Self {
        self.bindings = bindings;
        self
    }

    /// Parameter bindings as merged at compile time.
    pub fn bindings(&self) -> &OperationBindings {
        &self.bindings
    }

    pub fn record(&self) -> TypeKey {
        self.record
    }

    /// Steps in execution order: every provider after all of its inputs.
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn output_slot(&self) -> usize {
        self.output
    }

    pub fn slot_count(&self) -> usize {
        self.slot_count
    }

    /// Whether some step reads parameters or the body of the request.
    pub fn needs_route_context(&self) -> bool {
        self.needs_route_context
    }
}
