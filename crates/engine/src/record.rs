//! Record shapes: the declared input of a handler.
//!
//! A handler input is a plain struct implementing [`Record`]. Its [`RecordShape`] lists
//! every field with the field's type identity, decodable kind and provenance tag; the
//! compiler reads the shape once at registration time, and at request time the executor
//! fills a [`FieldValues`] bag from which [`Record::assemble`] builds the struct.
//!
//! ```rust
//! use wirebind_engine::record::{FieldShape, FieldValues, ParamTag, Record, RecordShape};
//! use wirebind_engine::BindError;
//!
//! struct ListPets {
//!     limit: u32,
//!     tags: Vec<String>,
//! }
//!
//! impl Record for ListPets {
//!     fn shape() -> RecordShape {
//!         RecordShape::new::<Self>([
//!             FieldShape::param::<u32>("limit", ParamTag::query("limit")),
//!             FieldShape::param::<Vec<String>>("tags", ParamTag::query("tag").explode(true)),
//!         ])
//!     }
//!
//!     fn assemble(values: &mut FieldValues) -> Result<Self, BindError> {
//!         Ok(Self {
//!             limit: values.param("limit")?,
//!             tags: values.param("tags")?,
//!         })
//!     }
//! }
//! ```

use std::{any::Any, fmt, sync::Arc};

use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde_json::Value;
use wirebind_types::{IntWidth, ParameterLocation, ParameterStyle, TypeKey, ValueKind};

use crate::error::BindError;

/// A type-erased value produced by a provider or generator.
pub type Instance = Arc<dyn Any + Send + Sync>;

/// A struct whose fields can be bound from a request.
pub trait Record: Sized + Send + Sync + 'static {
    /// Describes the fields and where each one comes from.
    fn shape() -> RecordShape;

    /// Builds the struct from bound field values.
    fn assemble(values: &mut FieldValues) -> Result<Self, BindError>;
}

type AssembleFn = fn(&mut FieldValues) -> Result<Instance, BindError>;

fn assemble_erased<R: Record>(values: &mut FieldValues) -> Result<Instance, BindError> {
    Ok(Arc::new(R::assemble(values)?))
}

/// The declared fields of a [`Record`].
#[derive(Clone)]
pub struct RecordShape {
    ty: TypeKey,
    fields: Vec<FieldShape>,
    assemble: AssembleFn,
}

impl RecordShape {
    pub fn new<R: Record>(fields: impl IntoIterator<Item = FieldShape>) -> Self {
        Self {
            ty: TypeKey::of::<R>(),
            fields: fields.into_iter().collect(),
            assemble: assemble_erased::<R>,
        }
    }

    pub fn ty(&self) -> TypeKey {
        self.ty
    }

    pub fn name(&self) -> &'static str {
        self.ty.name()
    }

    pub fn fields(&self) -> &[FieldShape] {
        &self.fields
    }

    pub(crate) fn assemble(&self, values: &mut FieldValues) -> Result<Instance, BindError> {
        (self.assemble)(values)
    }
}

impl fmt::Debug for RecordShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordShape").field("ty", &self.ty).field("fields", &self.fields).finish()
    }
}

/// What a field holds.
#[derive(Clone)]
pub enum FieldKind {
    /// A value with a decodable (or opaque) kind.
    Value(ValueKind),
    /// Another record; its shape is produced lazily so recursive declarations stay cheap.
    Record(fn() -> RecordShape),
}

impl fmt::Debug for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(kind) => f.debug_tuple("Value").field(kind).finish(),
            Self::Record(_) => f.write_str("Record"),
        }
    }
}

/// The source annotation carried by a field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldTag {
    None,
    Body,
    Param(ParamTag),
}

/// Parameter annotation: where the raw text lives and how it is serialized.
///
/// Unset style and explode fall back to the operation metadata and then to the configured
/// [`StylePolicy`](crate::config::StylePolicy).
#[derive(Debug, Clone, PartialEq)]
pub struct ParamTag {
    pub name: String,
    pub location: ParameterLocation,
    pub style: Option<ParameterStyle>,
    pub explode: Option<bool>,
    pub required: Option<bool>,
    pub default: Option<String>,
}

impl ParamTag {
    pub fn new(name: impl Into<String>, location: ParameterLocation) -> Self {
        Self {
            name: name.into(),
            location,
            style: None,
            explode: None,
            required: None,
            default: None,
        }
    }

    pub fn path(name: impl Into<String>) -> Self {
        Self::new(name, ParameterLocation::Path)
    }

    pub fn query(name: impl Into<String>) -> Self {
        Self::new(name, ParameterLocation::Query)
    }

    pub fn header(name: impl Into<String>) -> Self {
        Self::new(name, ParameterLocation::Header)
    }

    pub fn cookie(name: impl Into<String>) -> Self {
        Self::new(name, ParameterLocation::Cookie)
    }

    pub fn style(mut self, style: ParameterStyle) -> Self {
        self.style = Some(style);
        self
    }

    pub fn explode(mut self, explode: bool) -> Self {
        self.explode = Some(explode);
        self
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = Some(required);
        self
    }

    /// Raw text substituted when the request carries no value, decoded as a single
    /// un-exploded value.
    pub fn default_text(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }
}

/// One declared field of a record.
#[derive(Debug, Clone)]
pub struct FieldShape {
    name: &'static str,
    ty: TypeKey,
    kind: FieldKind,
    tag: FieldTag,
    exported: bool,
}

impl FieldShape {
    /// A parameter field whose kind is inferred from `T`.
    pub fn param<T: ParamKind>(name: &'static str, tag: ParamTag) -> Self {
        Self::param_with::<T>(name, T::kind(), tag)
    }

    /// A parameter field with an explicit kind, for objects and custom text types.
    pub fn param_with<T: 'static>(name: &'static str, kind: ValueKind, tag: ParamTag) -> Self {
        Self::build::<T>(name, FieldKind::Value(kind), FieldTag::Param(tag))
    }

    /// The request body.
    pub fn body<T: 'static>(name: &'static str) -> Self {
        Self::build::<T>(name, FieldKind::Value(ValueKind::Opaque), FieldTag::Body)
    }

    /// A nested record resolved through its own generator.
    pub fn record<R: Record>(name: &'static str) -> Self {
        Self::build::<R>(name, FieldKind::Record(R::shape), FieldTag::None)
    }

    /// An untagged value only the container can satisfy.
    pub fn value<T: 'static>(name: &'static str) -> Self {
        Self::build::<T>(name, FieldKind::Value(ValueKind::Opaque), FieldTag::None)
    }

    /// Marks the field unexported. Unexported fields are skipped at the top level and
    /// reject resolution inside nested records.
    pub fn private(mut self) -> Self {
        self.exported = false;
        self
    }

    fn build<T: 'static>(name: &'static str, kind: FieldKind, tag: FieldTag) -> Self {
        Self {
            name,
            ty: TypeKey::of::<T>(),
            kind,
            tag,
            exported: true,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn ty(&self) -> TypeKey {
        self.ty
    }

    pub fn kind(&self) -> &FieldKind {
        &self.kind
    }

    pub fn tag(&self) -> &FieldTag {
        &self.tag
    }

    pub fn is_exported(&self) -> bool {
        self.exported
    }
}

/// Types whose parameter kind can be inferred.
pub trait ParamKind: 'static {
    fn kind() -> ValueKind;
}

impl ParamKind for String {
    fn kind() -> ValueKind {
        ValueKind::String
    }
}

impl ParamKind for bool {
    fn kind() -> ValueKind {
        ValueKind::Bool
    }
}

impl ParamKind for f32 {
    fn kind() -> ValueKind {
        ValueKind::Float32
    }
}

impl ParamKind for f64 {
    fn kind() -> ValueKind {
        ValueKind::Float64
    }
}

impl<T: ParamKind> ParamKind for Vec<T> {
    fn kind() -> ValueKind {
        ValueKind::array(T::kind())
    }
}

macro_rules! int_param_kind {
    ($($ty:ty => $variant:ident($width:ident)),* $(,)?) => {
        $(
            impl ParamKind for $ty {
                fn kind() -> ValueKind {
                    ValueKind::$variant(IntWidth::$width)
                }
            }
        )*
    };
}

int_param_kind!(
    i8 => Int(W8), i16 => Int(W16), i32 => Int(W32), i64 => Int(W64), isize => Int(Size),
    u8 => Uint(W8), u16 => Uint(W16), u32 => Uint(W32), u64 => Uint(W64), usize => Uint(Size),
);

enum FieldValue {
    Json(Value),
    Instance(Instance),
}

/// Bound field values of one record, handed to [`Record::assemble`].
pub struct FieldValues {
    record: &'static str,
    values: IndexMap<&'static str, FieldValue>,
}

impl FieldValues {
    pub(crate) fn new(record: &'static str) -> Self {
        Self {
            record,
            values: IndexMap::new(),
        }
    }

    pub(crate) fn insert_json(&mut self, field: &'static str, value: Value) {
        self.values.insert(field, FieldValue::Json(value));
    }

    pub(crate) fn insert_instance(&mut self, field: &'static str, value: Instance) {
        self.values.insert(field, FieldValue::Instance(value));
    }

    pub fn contains(&self, field: &str) -> bool {
        self.values.contains_key(field)
    }

    /// Takes a decoded parameter.
    pub fn param<T: DeserializeOwned>(&mut self, field: &'static str) -> Result<T, BindError> {
        self.json(field)
    }

    /// Takes the loaded request body.
    pub fn body<T: DeserializeOwned>(&mut self, field: &'static str) -> Result<T, BindError> {
        self.json(field)
    }

    /// Takes a container-provided or nested-record value by value, cloning only when the
    /// instance is still shared.
    pub fn take<T: Clone + Send + Sync + 'static>(&mut self, field: &'static str) -> Result<T, BindError> {
        let shared = self.shared::<T>(field)?;
        Ok(Arc::try_unwrap(shared).unwrap_or_else(|shared| (*shared).clone()))
    }

    /// Takes a container-provided or nested-record value without cloning it.
    pub fn shared<T: Send + Sync + 'static>(&mut self, field: &'static str) -> Result<Arc<T>, BindError> {
        match self.values.shift_remove(field) {
            Some(FieldValue::Instance(instance)) => instance.downcast::<T>().map_err(|_| self.field_type::<T>(field)),
            Some(FieldValue::Json(_)) => Err(self.field_type::<T>(field)),
            None => Err(self.unbound(field)),
        }
    }

    fn json<T: DeserializeOwned>(&mut self, field: &'static str) -> Result<T, BindError> {
        match self.values.shift_remove(field) {
            Some(FieldValue::Json(value)) => serde_json::from_value(value).map_err(|source| BindError::Deserialize {
                field: field.to_string(),
                record: self.record,
                source,
            }),
            Some(FieldValue::Instance(_)) => Err(self.field_type::<T>(field)),
            None => Err(self.unbound(field)),
        }
    }

    fn field_type<T>(&self, field: &str) -> BindError {
        BindError::FieldType {
            field: field.to_string(),
            record: self.record,
            expected: std::any::type_name::<T>(),
        }
    }

    fn unbound(&self, field: &str) -> BindError {
        BindError::UnboundField {
            field: field.to_string(),
            record: self.record,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Clone, PartialEq)]
    struct Clock(u64);

    #[test]
    fn infers_parameter_kinds() {
        let field = FieldShape::param::<Vec<u16>>("ids", ParamTag::query("id"));
        match field.kind() {
            FieldKind::Value(kind) => assert_eq!(kind.to_string(), "array of u16"),
            FieldKind::Record(_) => panic!("expected a value kind"),
        }
        assert_eq!(field.ty(), TypeKey::of::<Vec<u16>>());
        assert!(field.is_exported());
        assert!(!FieldShape::value::<Clock>("clock").private().is_exported());
    }

    #[test]
    fn param_tag_builders() {
        let tag = ParamTag::query("color").style(ParameterStyle::DeepObject).explode(true).default_text("red");
        assert_eq!(tag.location, ParameterLocation::Query);
        assert_eq!(tag.style, Some(ParameterStyle::DeepObject));
        assert_eq!(tag.explode, Some(true));
        assert_eq!(tag.default.as_deref(), Some("red"));
    }

    #[test]
    fn field_values_hand_out_typed_values() {
        let mut values = FieldValues::new("Sample");
        values.insert_json("limit", json!(25));
        values.insert_instance("clock", Arc::new(Clock(7)));

        let limit: u32 = values.param("limit").unwrap();
        assert_eq!(limit, 25);
        assert_eq!(values.take::<Clock>("clock").unwrap(), Clock(7));
        assert!(matches!(values.param::<u32>("limit"), Err(BindError::UnboundField { .. })));
    }

    #[test]
    fn field_values_report_type_mismatches() {
        let mut values = FieldValues::new("Sample");
        values.insert_instance("clock", Arc::new(Clock(7)));
        values.insert_json("name", json!("x"));

        assert!(matches!(values.shared::<String>("clock"), Err(BindError::FieldType { .. })));
        assert!(matches!(values.param::<u32>("name"), Err(BindError::Deserialize { .. })));
    }
}
