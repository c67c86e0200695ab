//! Decodable shapes of parameter targets.

use std::{fmt, str::FromStr};

use serde::Serialize;
use serde_json::{Map, Value, json};

/// Bit width of an integer target. `Size` is the platform pointer width.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum IntWidth {
    W8,
    W16,
    W32,
    W64,
    Size,
}

impl IntWidth {
    pub fn bits(self) -> u32 {
        match self {
            Self::W8 => 8,
            Self::W16 => 16,
            Self::W32 => 32,
            Self::W64 => 64,
            Self::Size => usize::BITS,
        }
    }

    /// Inclusive range of a signed integer of this width.
    pub fn signed_range(self) -> (i64, i64) {
        match self.bits() {
            8 => (i8::MIN.into(), i8::MAX.into()),
            16 => (i16::MIN.into(), i16::MAX.into()),
            32 => (i32::MIN.into(), i32::MAX.into()),
            _ => (i64::MIN, i64::MAX),
        }
    }

    /// Largest value of an unsigned integer of this width.
    pub fn unsigned_max(self) -> u64 {
        match self.bits() {
            8 => u8::MAX.into(),
            16 => u16::MAX.into(),
            32 => u32::MAX.into(),
            _ => u64::MAX,
        }
    }
}

/// A target type's own "parse from text" capability.
///
/// Built from any `FromStr + Serialize` type; the parsed value is carried to the record
/// assembler as JSON. When present it takes precedence over the built-in primitive rules.
#[derive(Clone, Copy)]
pub struct TextParser {
    type_name: &'static str,
    parse: fn(&str) -> Result<Value, String>,
}

impl TextParser {
    pub fn of<T>() -> Self
    where
        T: FromStr + Serialize + 'static,
        T::Err: fmt::Display,
    {
        Self {
            type_name: std::any::type_name::<T>(),
            parse: parse_text::<T>,
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn parse(&self, raw: &str) -> Result<Value, String> {
        (self.parse)(raw)
    }
}

impl fmt::Debug for TextParser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TextParser({})", self.type_name)
    }
}

fn parse_text<T>(raw: &str) -> Result<Value, String>
where
    T: FromStr + Serialize,
    T::Err: fmt::Display,
{
    let parsed = raw.parse::<T>().map_err(|error| error.to_string())?;
    serde_json::to_value(parsed).map_err(|error| error.to_string())
}

/// Coarse category of a kind, used by the style policy table.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum KindCategory {
    Primitive,
    Array,
    Object,
}

impl fmt::Display for KindCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Primitive => "primitive",
            Self::Array => "array",
            Self::Object => "object",
        })
    }
}

/// A named property of an object-kinded parameter.
#[derive(Debug, Clone)]
pub struct ObjectField {
    pub name: String,
    pub kind: ValueKind,
}

impl ObjectField {
    pub fn new(name: impl Into<String>, kind: ValueKind) -> Self {
        Self { name: name.into(), kind }
    }
}

/// The shape a raw parameter string is decoded into.
#[derive(Debug, Clone)]
pub enum ValueKind {
    String,
    Bool,
    Int(IntWidth),
    Uint(IntWidth),
    Float32,
    Float64,
    Array(Box<ValueKind>),
    Object(Vec<ObjectField>),
    /// A type with its own text parser.
    Text(TextParser),
    /// Not decodable from text; only satisfiable by the container.
    Opaque,
}

impl ValueKind {
    pub fn array(element: ValueKind) -> Self {
        Self::Array(Box::new(element))
    }

    pub fn object(fields: impl IntoIterator<Item = ObjectField>) -> Self {
        Self::Object(fields.into_iter().collect())
    }

    pub fn text<T>() -> Self
    where
        T: FromStr + Serialize + 'static,
        T::Err: fmt::Display,
    {
        Self::Text(TextParser::of::<T>())
    }

    pub fn category(&self) -> KindCategory {
        match self {
            Self::Array(_) => KindCategory::Array,
            Self::Object(_) => KindCategory::Object,
            _ => KindCategory::Primitive,
        }
    }

    /// The value a target of this kind holds when nothing was decoded into it.
    ///
    /// Custom text and opaque kinds have none, and neither does an object with such a property.
    pub fn zero_value(&self) -> Option<Value> {
        match self {
            Self::String => Some(Value::String(String::new())),
            Self::Bool => Some(Value::Bool(false)),
            Self::Int(_) | Self::Uint(_) => Some(json!(0)),
            Self::Float32 | Self::Float64 => Some(json!(0.0)),
            Self::Array(_) => Some(Value::Array(Vec::new())),
            Self::Object(fields) => fields
                .iter()
                .map(|field| Some((field.name.clone(), field.kind.zero_value()?)))
                .collect::<Option<Map<_, _>>>()
                .map(Value::Object),
            Self::Text(_) | Self::Opaque => None,
        }
    }

    /// OpenAPI schema object describing this kind.
    pub fn schema(&self) -> Value {
        match self {
            Self::String | Self::Text(_) => json!({ "type": "string" }),
            Self::Bool => json!({ "type": "boolean" }),
            Self::Int(IntWidth::W64) => json!({ "type": "integer", "format": "int64" }),
            Self::Int(IntWidth::W32) => json!({ "type": "integer", "format": "int32" }),
            Self::Int(_) => json!({ "type": "integer" }),
            Self::Uint(_) => json!({ "type": "integer", "minimum": 0 }),
            Self::Float32 => json!({ "type": "number", "format": "float" }),
            Self::Float64 => json!({ "type": "number", "format": "double" }),
            Self::Array(element) => json!({ "type": "array", "items": element.schema() }),
            Self::Object(fields) => {
                let mut properties = Map::new();
                for field in fields {
                    properties.insert(field.name.clone(), field.kind.schema());
                }
                json!({ "type": "object", "properties": properties })
            }
            Self::Opaque => json!({}),
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String => f.write_str("string"),
            Self::Bool => f.write_str("bool"),
            Self::Int(IntWidth::Size) => f.write_str("isize"),
            Self::Int(width) => write!(f, "i{}", width.bits()),
            Self::Uint(IntWidth::Size) => f.write_str("usize"),
            Self::Uint(width) => write!(f, "u{}", width.bits()),
            Self::Float32 => f.write_str("f32"),
            Self::Float64 => f.write_str("f64"),
            Self::Array(element) => write!(f, "array of {element}"),
            Self::Object(_) => f.write_str("object"),
            Self::Text(parser) => f.write_str(parser.type_name()),
            Self::Opaque => f.write_str("opaque value"),
        }
    }
}
