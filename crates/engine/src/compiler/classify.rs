//! Field provenance classification.
//!
//! Every exported field of a record resolves to exactly one [`Provenance`], checked in
//! this order: request body, container-provided type, parameter tag, nested record. A
//! field matching none of them fails compilation, unless the enclosing record is itself
//! provided by the container and will be constructed as a whole.

use std::sync::Arc;

use indexmap::IndexMap;
use tracing::warn;
use wirebind_types::TypeKey;

use crate::{
    compiler::CompiledRecord,
    container::Container,
    error::CompileError,
    record::{FieldKind, FieldShape, FieldTag, ParamTag, RecordShape},
};

#[derive(Debug, Clone)]
pub enum Provenance {
    Parameter(ParamTag),
    RequestBody,
    ContainerProvided,
    NestedRecord(Box<ClassifiedRecord>),
}

#[derive(Debug, Clone)]
pub struct ClassifiedField {
    pub field: FieldShape,
    /// Dotted path from the record being compiled, for diagnostics.
    pub path: String,
    pub provenance: Provenance,
}

#[derive(Debug, Clone)]
pub struct ClassifiedRecord {
    pub shape: RecordShape,
    pub fields: Vec<ClassifiedField>,
    /// The container already constructs this record; its fields are not bound.
    pub atomic: bool,
}

/// Tracks the request body across one top-level compilation, nested records included.
#[derive(Debug, Default)]
pub(crate) struct BodyTracker {
    first: Option<String>,
}

impl BodyTracker {
    pub(crate) fn record(&mut self, path: &str) -> Result<(), CompileError> {
        match &self.first {
            Some(first) => Err(CompileError::DuplicateRequestBody {
                first: first.clone(),
                second: path.to_string(),
            }),
            None => {
                self.first = Some(path.to_string());
                Ok(())
            }
        }
    }
}

pub struct FieldClassifier<'c> {
    container: &'c Container,
    compiled: &'c IndexMap<TypeKey, Arc<CompiledRecord>>,
}

impl<'c> FieldClassifier<'c> {
    pub fn new(container: &'c Container, compiled: &'c IndexMap<TypeKey, Arc<CompiledRecord>>) -> Self {
        Self { container, compiled }
    }

    pub fn classify(&self, shape: &RecordShape) -> Result<ClassifiedRecord, CompileError> {
        let mut tracker = BodyTracker::default();
        let mut visiting = Vec::new();
        self.classify_record(shape, "", false, &mut tracker, &mut visiting)
    }

    fn classify_record(
        &self,
        shape: &RecordShape,
        prefix: &str,
        nested: bool,
        tracker: &mut BodyTracker,
        visiting: &mut Vec<TypeKey>,
    ) -> Result<ClassifiedRecord, CompileError> {
        if visiting.contains(&shape.ty()) {
            let mut path: Vec<&'static str> = visiting.iter().map(TypeKey::name).collect();
            path.push(shape.name());
            return Err(CompileError::DependencyCycle { path });
        }
        visiting.push(shape.ty());

        let atomic = self.container.has_type(&shape.ty()) && !self.compiled.contains_key(&shape.ty());
        let mut fields = Vec::with_capacity(shape.fields().len());

        for field in shape.fields() {
            let path = if prefix.is_empty() {
                field.name().to_string()
            } else {
                format!("{prefix}.{}", field.name())
            };

            if !field.is_exported() {
                if nested && !atomic {
                    return Err(CompileError::UnexportedField {
                        path,
                        record: shape.name(),
                    });
                }
                continue;
            }

            match self.classify_field(shape, field, &path, atomic, tracker, visiting)? {
                Some(provenance) => fields.push(ClassifiedField {
                    field: field.clone(),
                    path,
                    provenance,
                }),
                None => continue,
            }
        }

        visiting.pop();
        Ok(ClassifiedRecord {
            shape: shape.clone(),
            fields,
            atomic,
        })
    }

    fn classify_field(
        &self,
        enclosing: &RecordShape,
        field: &FieldShape,
        path: &str,
        atomic: bool,
        tracker: &mut BodyTracker,
        visiting: &mut Vec<TypeKey>,
    ) -> Result<Option<Provenance>, CompileError> {
        if *field.tag() == FieldTag::Body {
            tracker.record(path)?;
            return Ok(Some(Provenance::RequestBody));
        }

        if self.container.has_type(&field.ty()) {
            // A generator registered by an earlier compilation still loads its own body.
            if let Some(body) = self.compiled.get(&field.ty()).and_then(|compiled| compiled.request_body()) {
                tracker.record(&format!("{path}.{}", body.field_path))?;
            }
            return Ok(Some(Provenance::ContainerProvided));
        }

        if let FieldTag::Param(tag) = field.tag() {
            return Ok(Some(Provenance::Parameter(tag.clone())));
        }

        if let FieldKind::Record(nested_shape) = field.kind() {
            let nested = self
                .classify_record(&nested_shape(), path, true, tracker, visiting)
                .map_err(|error| match error {
                    error @ CompileError::CannotCreateField { .. } => CompileError::UnresolvableField {
                        path: path.to_string(),
                        record: enclosing.name(),
                        source: Box::new(error),
                    },
                    other => other,
                })?;
            return Ok(Some(Provenance::NestedRecord(Box::new(nested))));
        }

        if atomic {
            warn!(
                record = enclosing.name(),
                field = path,
                ty = field.ty().name(),
                "field cannot be bound; the container constructs the whole record"
            );
            return Ok(None);
        }

        Err(CompileError::CannotCreateField {
            field: path.to_string(),
            ty: field.ty().name(),
            record: enclosing.name(),
        })
    }
}
