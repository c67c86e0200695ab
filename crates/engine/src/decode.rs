//! Parameter decoding by location, style and explode flag.
//!
//! The decoder turns the raw text a request carries for one parameter into a JSON value
//! of the field's [`ValueKind`]. Allowed combinations follow OpenAPI's serialization table:
//!
//! | Style | Locations | Kinds |
//! |---|---|---|
//! | form | query, cookie | primitive, array, object |
//! | deepObject | query | object |
//! | spaceDelimited, pipeDelimited | query | array |
//! | simple | path, header | primitive, array |
//! | label, matrix | path | primitive, array, object |
//!
//! Anything else is rejected with a [`DecodeError`] instead of being coerced.

use std::num::IntErrorKind;

use serde_json::{Map, Value, json};
use wirebind_types::{IntWidth, ObjectField, ParameterLocation, ParameterSpec, ParameterStyle, ValueKind};
use wirebind_util::http::{decode_path_value, split_delimited};

use crate::{config::StylePolicy, context::RouteContext, error::DecodeError, record::ParamTag};

/// Everything needed to decode one parameter field.
#[derive(Debug, Clone)]
pub struct ParamBinding {
    pub name: String,
    pub location: ParameterLocation,
    pub style: Option<ParameterStyle>,
    pub explode: Option<bool>,
    pub required: bool,
    pub default: Option<String>,
    pub kind: ValueKind,
}

impl ParamBinding {
    pub fn from_tag(tag: &ParamTag, kind: ValueKind) -> Self {
        Self {
            name: tag.name.clone(),
            location: tag.location,
            style: tag.style,
            explode: tag.explode,
            required: tag.required.unwrap_or(false) || tag.location == ParameterLocation::Path,
            default: tag.default.clone(),
            kind,
        }
    }

    /// Fills what the field tag left open from the operation's parameter metadata.
    pub fn with_operation(mut self, parameter: &ParameterSpec) -> Self {
        self.style = self.style.or(parameter.style);
        self.explode = self.explode.or(parameter.explode);
        self.required = self.required || parameter.is_required();
        if self.default.is_none() {
            self.default = parameter.default_text();
        }
        self
    }

    /// Parameter metadata for the OpenAPI document of the operation.
    pub fn to_parameter_spec(&self) -> ParameterSpec {
        let mut schema = self.kind.schema();
        if let (Some(default), Some(object)) = (self.typed_default(), schema.as_object_mut()) {
            object.insert("default".into(), default);
        }
        let mut spec = ParameterSpec::new(&self.name, self.location)
            .required(self.required)
            .with_schema(schema);
        spec.style = self.style;
        spec.explode = self.explode;
        spec
    }

    /// The default text decoded into the field's kind. Text that does not decode is kept
    /// as a string.
    fn typed_default(&self) -> Option<Value> {
        let default = self.default.as_deref()?;
        let decoding = Decoding {
            binding: self,
            style: self.style.unwrap_or_else(|| ParameterStyle::default_for(self.location)),
            explode: false,
        };
        Some(decoding.single(default).unwrap_or_else(|_| Value::String(default.to_string())))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ParameterDecoder {
    policy: StylePolicy,
}

impl ParameterDecoder {
    pub fn new(policy: StylePolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> StylePolicy {
        self.policy
    }

    /// The style the binding is decoded with.
    pub fn style_of(&self, binding: &ParamBinding) -> ParameterStyle {
        self.policy.resolve(binding.style, binding.location)
    }

    /// Validates the (style, location, kind) combination and returns the effective style.
    pub fn check(&self, binding: &ParamBinding) -> Result<ParameterStyle, DecodeError> {
        let style = self.style_of(binding);

        if !style.allowed_locations().contains(&binding.location) {
            return Err(DecodeError::UnsupportedLocation {
                style,
                location: binding.location,
                allowed: style.allowed_locations().to_vec(),
            });
        }

        let category = binding.kind.category();
        if !style.allowed_categories().contains(&category) {
            return Err(DecodeError::UnsupportedKind {
                style,
                category,
                kind: binding.kind.to_string(),
                allowed: style.allowed_categories().to_vec(),
            });
        }

        let decodable = match &binding.kind {
            ValueKind::Array(element) => is_scalar(element),
            ValueKind::Object(fields) => fields.iter().all(|field| is_scalar(&field.kind)),
            kind => is_scalar(kind),
        };
        if !decodable {
            return Err(DecodeError::NotDecodable {
                kind: binding.kind.to_string(),
            });
        }

        Ok(style)
    }

    /// Decodes the parameter from the request.
    ///
    /// A path parameter must be present. For other locations an absent value is replaced
    /// by the default (decoded as one un-exploded value); without a default a required
    /// parameter fails and an optional one yields the kind's zero value.
    pub fn decode(&self, binding: &ParamBinding, ctx: &RouteContext) -> Result<Value, DecodeError> {
        let style = self.check(binding)?;
        let decoding = Decoding {
            binding,
            style,
            explode: binding.explode.unwrap_or_else(|| style.default_explode()),
        };

        let decoded = match binding.location {
            ParameterLocation::Path => {
                let raw = ctx.path_param(&binding.name).ok_or_else(|| DecodeError::ParameterNotFound {
                    name: binding.name.clone(),
                    location: binding.location,
                })?;
                Some(decoding.path(raw)?)
            }
            ParameterLocation::Query => decoding.keyed(ctx.query_values(&binding.name), |key| ctx.query_values(key))?,
            ParameterLocation::Cookie => decoding.keyed(ctx.cookie_values(&binding.name), |key| ctx.cookie_values(key))?,
            ParameterLocation::Header => decoding.header(&ctx.header_values(&binding.name))?,
        };

        match decoded {
            Some(value) => Ok(value),
            None => decoding.absent(),
        }
    }
}

fn is_scalar(kind: &ValueKind) -> bool {
    !matches!(kind, ValueKind::Array(_) | ValueKind::Object(_) | ValueKind::Opaque)
}

struct Decoding<'a> {
    binding: &'a ParamBinding,
    style: ParameterStyle,
    explode: bool,
}

impl Decoding<'_> {
    fn delimiter(&self) -> char {
        match self.style {
            ParameterStyle::SpaceDelimited => ' ',
            ParameterStyle::PipeDelimited => '|',
            _ => ',',
        }
    }

    /// Query and cookie values. `lookup` resolves other keys of the same location, which
    /// exploded and deep objects spread their properties over.
    fn keyed<'v>(&self, values: &'v [String], lookup: impl Fn(&str) -> &'v [String]) -> Result<Option<Value>, DecodeError> {
        match (&self.binding.kind, self.style) {
            (ValueKind::Object(fields), ParameterStyle::DeepObject) => {
                self.spread_object(fields, |field| lookup(&format!("{}[{}]", self.binding.name, field)))
            }
            (ValueKind::Object(fields), ParameterStyle::Form) if self.explode => self.spread_object(fields, lookup),
            (ValueKind::Array(element), _) if self.explode => {
                if values.is_empty() {
                    return Ok(None);
                }
                self.elements(element, values.iter().map(String::as_str), false).map(Some)
            }
            _ => match values.first() {
                Some(raw) => self.single(raw).map(Some),
                None => Ok(None),
            },
        }
    }

    fn spread_object<'v>(&self, fields: &[ObjectField], lookup: impl Fn(&str) -> &'v [String]) -> Result<Option<Value>, DecodeError> {
        let mut object = Map::new();
        let mut found = false;
        for field in fields {
            let value = match lookup(field.name.as_str()).first() {
                Some(raw) => {
                    found = true;
                    parse_scalar(&field.kind, raw)?
                }
                None => self.property_zero(field)?,
            };
            object.insert(field.name.clone(), value);
        }
        Ok(found.then_some(Value::Object(object)))
    }

    fn header(&self, values: &[&str]) -> Result<Option<Value>, DecodeError> {
        let Some(first) = values.first() else {
            return Ok(None);
        };
        match &self.binding.kind {
            ValueKind::Array(element) => {
                let items = values.iter().flat_map(|value| value.split(',')).map(str::trim).filter(|item| !item.is_empty());
                self.elements(element, items, false).map(Some)
            }
            kind => parse_scalar(kind, first.trim()).map(Some),
        }
    }

    /// One un-exploded value: a scalar, a delimited array, or `key,value` object pairs.
    fn single(&self, raw: &str) -> Result<Value, DecodeError> {
        match &self.binding.kind {
            ValueKind::Array(element) => {
                let items = split_delimited(raw, self.delimiter());
                self.elements(element, items.iter().map(String::as_str), false)
            }
            ValueKind::Object(fields) => {
                let items = split_delimited(raw, ',');
                self.object_from_flat(fields, raw, items.iter().map(String::as_str).collect(), false)
            }
            kind => parse_scalar(kind, raw),
        }
    }

    fn path(&self, raw: &str) -> Result<Value, DecodeError> {
        match self.style {
            ParameterStyle::Simple => match &self.binding.kind {
                ValueKind::Array(element) => self.elements(element, raw.split(','), true),
                kind => parse_scalar(kind, &decode_path_value(raw)?),
            },
            ParameterStyle::Label => {
                let rest = raw.strip_prefix('.').ok_or_else(|| self.malformed(raw, "expected a leading `.`"))?;
                match &self.binding.kind {
                    ValueKind::Array(element) if self.explode => self.elements(element, rest.split('.'), true),
                    ValueKind::Array(element) => self.elements(element, rest.split(','), true),
                    ValueKind::Object(fields) if self.explode => self.object_from_assignments(fields, raw, rest.split('.')),
                    ValueKind::Object(fields) => self.object_from_flat(fields, raw, rest.split(',').collect(), true),
                    kind => parse_scalar(kind, &decode_path_value(rest)?),
                }
            }
            ParameterStyle::Matrix => {
                let rest = raw.strip_prefix(';').ok_or_else(|| self.malformed(raw, "expected a leading `;`"))?;
                match &self.binding.kind {
                    ValueKind::Array(element) if self.explode => {
                        let items = rest.split(';').map(|segment| self.matrix_value(raw, segment)).collect::<Result<Vec<_>, _>>()?;
                        self.elements(element, items.into_iter(), true)
                    }
                    ValueKind::Array(element) => self.elements(element, self.matrix_value(raw, rest)?.split(','), true),
                    ValueKind::Object(fields) if self.explode => self.object_from_assignments(fields, raw, rest.split(';')),
                    ValueKind::Object(fields) => {
                        self.object_from_flat(fields, raw, self.matrix_value(raw, rest)?.split(',').collect(), true)
                    }
                    kind => parse_scalar(kind, &decode_path_value(self.matrix_value(raw, rest)?)?),
                }
            }
            style => Err(DecodeError::UnsupportedLocation {
                style,
                location: ParameterLocation::Path,
                allowed: style.allowed_locations().to_vec(),
            }),
        }
    }

    /// Strips `name=` from one matrix segment; a bare `name` is an empty value.
    fn matrix_value<'r>(&self, raw: &str, segment: &'r str) -> Result<&'r str, DecodeError> {
        let name = self.binding.name.as_str();
        match segment.strip_prefix(name) {
            Some("") => Ok(""),
            Some(rest) => rest.strip_prefix('=').ok_or_else(|| self.malformed(raw, "expected `name=value`")),
            None => Err(self.malformed(raw, &format!("expected segment for `{name}`"))),
        }
    }

    fn elements<'r>(&self, element: &ValueKind, items: impl Iterator<Item = &'r str>, percent_decoded: bool) -> Result<Value, DecodeError> {
        let mut decoded = Vec::new();
        for item in items {
            if percent_decoded {
                decoded.push(parse_scalar(element, &decode_path_value(item)?)?);
            } else {
                decoded.push(parse_scalar(element, item)?);
            }
        }
        Ok(Value::Array(decoded))
    }

    /// `k,v,k,v` pairs.
    fn object_from_flat(&self, fields: &[ObjectField], raw: &str, items: Vec<&str>, percent_decoded: bool) -> Result<Value, DecodeError> {
        if items.len() % 2 != 0 {
            return Err(self.malformed(raw, "expected key,value pairs"));
        }
        let pairs = items.chunks(2).map(|pair| (pair[0], pair[1]));
        self.object_from_pairs(fields, pairs, percent_decoded)
    }

    /// `k=v` segments.
    fn object_from_assignments<'r>(
        &self,
        fields: &[ObjectField],
        raw: &str,
        segments: impl Iterator<Item = &'r str>,
    ) -> Result<Value, DecodeError> {
        let pairs = segments
            .filter(|segment| !segment.is_empty())
            .map(|segment| segment.split_once('=').ok_or_else(|| self.malformed(raw, "expected key=value segments")))
            .collect::<Result<Vec<_>, _>>()?;
        self.object_from_pairs(fields, pairs.into_iter(), true)
    }

    /// Declared properties missing from `pairs` hold their zero value; unknown keys are ignored.
    fn object_from_pairs<'r>(
        &self,
        fields: &[ObjectField],
        pairs: impl Iterator<Item = (&'r str, &'r str)>,
        percent_decoded: bool,
    ) -> Result<Value, DecodeError> {
        let mut received = Vec::new();
        for (key, value) in pairs {
            if percent_decoded {
                received.push((decode_path_value(key)?, decode_path_value(value)?));
            } else {
                received.push((key.to_string(), value.to_string()));
            }
        }

        let mut object = Map::new();
        for field in fields {
            let value = match received.iter().find(|(key, _)| *key == field.name) {
                Some((_, raw)) => parse_scalar(&field.kind, raw)?,
                None => self.property_zero(field)?,
            };
            object.insert(field.name.clone(), value);
        }
        Ok(Value::Object(object))
    }

    fn absent(&self) -> Result<Value, DecodeError> {
        if let Some(default) = &self.binding.default {
            let fallback = Decoding {
                binding: self.binding,
                style: self.style,
                explode: false,
            };
            return fallback.single(default);
        }
        let missing = || DecodeError::MissingParameter {
            name: self.binding.name.clone(),
            location: self.binding.location,
        };
        if self.binding.required {
            return Err(missing());
        }
        self.binding.kind.zero_value().ok_or_else(missing)
    }

    /// Zero value of an object property the request left out.
    fn property_zero(&self, field: &ObjectField) -> Result<Value, DecodeError> {
        field.kind.zero_value().ok_or_else(|| DecodeError::MissingParameter {
            name: format!("{}[{}]", self.binding.name, field.name),
            location: self.binding.location,
        })
    }

    fn malformed(&self, raw: &str, reason: &str) -> DecodeError {
        DecodeError::Malformed {
            name: self.binding.name.clone(),
            style: self.style,
            value: raw.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Converts one raw token into a value of a scalar kind. A custom text parser always wins.
pub fn parse_scalar(kind: &ValueKind, raw: &str) -> Result<Value, DecodeError> {
    match kind {
        ValueKind::Text(parser) => parser.parse(raw).map_err(|message| DecodeError::CustomParse {
            value: raw.to_string(),
            type_name: parser.type_name(),
            message,
        }),
        ValueKind::String => Ok(Value::String(raw.to_string())),
        ValueKind::Bool => match raw {
            "true" => Ok(Value::Bool(true)),
            "false" => Ok(Value::Bool(false)),
            _ => Err(DecodeError::InvalidBool { value: raw.to_string() }),
        },
        ValueKind::Int(width) => parse_signed(raw, *width, kind),
        ValueKind::Uint(width) => parse_unsigned(raw, *width, kind),
        ValueKind::Float32 => {
            let parsed: f32 = raw.parse().map_err(|error: std::num::ParseFloatError| invalid_number(raw, kind, error.to_string()))?;
            finite(raw, kind, f64::from(parsed))
        }
        ValueKind::Float64 => {
            let parsed: f64 = raw.parse().map_err(|error: std::num::ParseFloatError| invalid_number(raw, kind, error.to_string()))?;
            finite(raw, kind, parsed)
        }
        ValueKind::Array(_) | ValueKind::Object(_) | ValueKind::Opaque => Err(DecodeError::NotDecodable { kind: kind.to_string() }),
    }
}

fn parse_signed(raw: &str, width: IntWidth, kind: &ValueKind) -> Result<Value, DecodeError> {
    let parsed: i64 = raw.parse().map_err(|error: std::num::ParseIntError| match error.kind() {
        IntErrorKind::PosOverflow | IntErrorKind::NegOverflow => out_of_range(raw, kind),
        _ => invalid_number(raw, kind, error.to_string()),
    })?;
    let (min, max) = width.signed_range();
    if parsed < min || parsed > max {
        return Err(out_of_range(raw, kind));
    }
    Ok(json!(parsed))
}

fn parse_unsigned(raw: &str, width: IntWidth, kind: &ValueKind) -> Result<Value, DecodeError> {
    let parsed: u64 = raw.parse().map_err(|error: std::num::ParseIntError| match error.kind() {
        IntErrorKind::PosOverflow => out_of_range(raw, kind),
        _ => invalid_number(raw, kind, error.to_string()),
    })?;
    if parsed > width.unsigned_max() {
        return Err(out_of_range(raw, kind));
    }
    Ok(json!(parsed))
}

fn finite(raw: &str, kind: &ValueKind, value: f64) -> Result<Value, DecodeError> {
    if value.is_finite() {
        Ok(json!(value))
    } else if raw.to_ascii_lowercase().contains("inf") || raw.to_ascii_lowercase().contains("nan") {
        Err(invalid_number(raw, kind, "not a finite number".into()))
    } else {
        Err(out_of_range(raw, kind))
    }
}

fn out_of_range(raw: &str, kind: &ValueKind) -> DecodeError {
    DecodeError::OutOfRange {
        value: raw.to_string(),
        target: kind.to_string(),
    }
}

fn invalid_number(raw: &str, kind: &ValueKind, reason: String) -> DecodeError {
    DecodeError::InvalidNumber {
        value: raw.to_string(),
        target: kind.to_string(),
        reason,
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use http::Request;
    use serde::Serialize;
    use serde_json::json;
    use wirebind_types::{KindCategory, OperationSpec};

    use super::*;
    use crate::context::MatchedRoute;

    fn ctx(uri: &str, path_params: &[(&str, &str)]) -> RouteContext {
        let request = Request::builder()
            .uri(uri)
            .header("X-Tags", "a, b")
            .header("X-Tags", "c")
            .header("Cookie", "theme=dark; ids=1,2")
            .body(Bytes::new())
            .unwrap();
        let route = path_params
            .iter()
            .fold(MatchedRoute::new("/test"), |route, (name, value)| route.with_path_param(*name, *value));
        RouteContext::new(request, route)
    }

    fn rgb() -> ValueKind {
        ValueKind::object([
            ObjectField::new("R", ValueKind::Uint(IntWidth::W8)),
            ObjectField::new("G", ValueKind::Uint(IntWidth::W8)),
            ObjectField::new("B", ValueKind::Uint(IntWidth::W8)),
        ])
    }

    fn decode(tag: ParamTag, kind: ValueKind, ctx: &RouteContext) -> Result<Value, DecodeError> {
        ParameterDecoder::default().decode(&ParamBinding::from_tag(&tag, kind), ctx)
    }

    #[test]
    fn form_array_unexploded_splits_commas() {
        let ctx = ctx("/?color=blue,black,brown", &[]);
        let value = decode(ParamTag::query("color").explode(false), ValueKind::array(ValueKind::String), &ctx).unwrap();
        assert_eq!(value, json!(["blue", "black", "brown"]));
    }

    #[test]
    fn form_array_exploded_reads_repeated_keys() {
        let ctx = ctx("/?color=blue&color=black&color=brown", &[]);
        let value = decode(ParamTag::query("color").explode(true), ValueKind::array(ValueKind::String), &ctx).unwrap();
        assert_eq!(value, json!(["blue", "black", "brown"]));

        // form explodes by default
        let value = decode(ParamTag::query("color"), ValueKind::array(ValueKind::String), &ctx).unwrap();
        assert_eq!(value, json!(["blue", "black", "brown"]));
    }

    #[test]
    fn deep_object_reads_bracketed_keys() {
        let ctx = ctx("/?obj[R]=100&obj[G]=200&obj[B]=150", &[]);
        let tag = ParamTag::query("obj").style(ParameterStyle::DeepObject);
        assert_eq!(decode(tag, rgb(), &ctx).unwrap(), json!({ "R": 100, "G": 200, "B": 150 }));
    }

    #[test]
    fn deep_object_leaves_missing_keys_at_zero() {
        let ctx = ctx("/?obj[G]=7&obj[X]=1", &[]);
        let tag = ParamTag::query("obj").style(ParameterStyle::DeepObject);
        assert_eq!(decode(tag.clone(), rgb(), &ctx).unwrap(), json!({ "R": 0, "G": 7, "B": 0 }));

        let empty = self::ctx("/", &[]);
        assert_eq!(decode(tag, rgb(), &empty).unwrap(), json!({ "R": 0, "G": 0, "B": 0 }));
    }

    #[test]
    fn deep_object_in_path_names_allowed_locations() {
        let binding = ParamBinding::from_tag(&ParamTag::path("obj").style(ParameterStyle::DeepObject), rgb());
        let error = ParameterDecoder::default().check(&binding).unwrap_err();
        assert!(matches!(error, DecodeError::UnsupportedLocation { ref allowed, .. } if allowed == &[ParameterLocation::Query]));
        assert!(error.to_string().contains("allowed locations: query"), "{error}");
    }

    #[test]
    fn rejects_kinds_outside_the_style_row() {
        let binding = ParamBinding::from_tag(&ParamTag::query("tags").style(ParameterStyle::DeepObject), ValueKind::String);
        assert!(matches!(
            ParameterDecoder::default().check(&binding),
            Err(DecodeError::UnsupportedKind { category: KindCategory::Primitive, .. })
        ));
        let binding = ParamBinding::from_tag(&ParamTag::header("X-Obj"), rgb());
        assert!(matches!(ParameterDecoder::default().check(&binding), Err(DecodeError::UnsupportedKind { .. })));
        let binding = ParamBinding::from_tag(&ParamTag::query("nested"), ValueKind::array(ValueKind::array(ValueKind::Bool)));
        assert!(matches!(ParameterDecoder::default().check(&binding), Err(DecodeError::NotDecodable { .. })));
    }

    #[test]
    fn explicit_policy_requires_declared_path_style() {
        let binding = ParamBinding::from_tag(&ParamTag::path("id"), ValueKind::String);
        assert_eq!(ParameterDecoder::default().check(&binding).unwrap(), ParameterStyle::Simple);
        assert!(matches!(
            ParameterDecoder::new(StylePolicy::Explicit).check(&binding),
            Err(DecodeError::UnsupportedLocation { style: ParameterStyle::Form, .. })
        ));
    }

    #[test]
    fn unsigned_overflow_is_a_range_error() {
        let ctx = ctx("/?n=18446744073709551616&m=4294967296&k=-1", &[]);
        let kind = ValueKind::Uint(IntWidth::W32);
        assert!(matches!(decode(ParamTag::query("n"), kind.clone(), &ctx), Err(DecodeError::OutOfRange { .. })));
        assert!(matches!(decode(ParamTag::query("m"), kind.clone(), &ctx), Err(DecodeError::OutOfRange { .. })));
        assert!(matches!(decode(ParamTag::query("k"), kind, &ctx), Err(DecodeError::InvalidNumber { .. })));
    }

    #[test]
    fn scalars_parse_strictly() {
        assert_eq!(parse_scalar(&ValueKind::Bool, "true").unwrap(), json!(true));
        assert!(matches!(parse_scalar(&ValueKind::Bool, "1"), Err(DecodeError::InvalidBool { .. })));
        assert!(matches!(parse_scalar(&ValueKind::Bool, "TRUE"), Err(DecodeError::InvalidBool { .. })));
        assert_eq!(parse_scalar(&ValueKind::Int(IntWidth::W8), "-128").unwrap(), json!(-128));
        assert!(matches!(parse_scalar(&ValueKind::Int(IntWidth::W8), "128"), Err(DecodeError::OutOfRange { .. })));
        assert_eq!(parse_scalar(&ValueKind::Float64, "2.5").unwrap(), json!(2.5));
        assert!(matches!(parse_scalar(&ValueKind::Float32, "1e39"), Err(DecodeError::OutOfRange { .. })));
        assert!(matches!(parse_scalar(&ValueKind::Float64, "NaN"), Err(DecodeError::InvalidNumber { .. })));
    }

    #[derive(Debug, Serialize)]
    struct Version(u32, u32);

    impl std::str::FromStr for Version {
        type Err = String;

        fn from_str(s: &str) -> Result<Self, Self::Err> {
            let (major, minor) = s.split_once('.').ok_or_else(|| "expected major.minor".to_string())?;
            Ok(Self(
                major.parse().map_err(|_| "bad major".to_string())?,
                minor.parse().map_err(|_| "bad minor".to_string())?,
            ))
        }
    }

    #[test]
    fn custom_text_parser_wins() {
        let kind = ValueKind::text::<Version>();
        assert_eq!(parse_scalar(&kind, "1.2").unwrap(), json!([1, 2]));
        assert!(matches!(parse_scalar(&kind, "1"), Err(DecodeError::CustomParse { .. })));
    }

    #[test]
    fn path_styles() {
        let ctx = ctx(
            "/",
            &[
                ("id", "caf%C3%A9"),
                ("ids", "3,4,5"),
                ("label", ".3.4"),
                ("matrix", ";matrix=3;matrix=4"),
                ("color", ";R=1;G=2"),
                ("flat", ".R,1,B,3"),
            ],
        );
        assert_eq!(decode(ParamTag::path("id"), ValueKind::String, &ctx).unwrap(), json!("café"));
        assert_eq!(
            decode(ParamTag::path("ids"), ValueKind::array(ValueKind::Uint(IntWidth::W16)), &ctx).unwrap(),
            json!([3, 4, 5])
        );
        assert_eq!(
            decode(
                ParamTag::path("label").style(ParameterStyle::Label).explode(true),
                ValueKind::array(ValueKind::Int(IntWidth::W32)),
                &ctx
            )
            .unwrap(),
            json!([3, 4])
        );
        assert_eq!(
            decode(
                ParamTag::path("matrix").style(ParameterStyle::Matrix).explode(true),
                ValueKind::array(ValueKind::Int(IntWidth::W32)),
                &ctx
            )
            .unwrap(),
            json!([3, 4])
        );
        assert_eq!(
            decode(ParamTag::path("color").style(ParameterStyle::Matrix).explode(true), rgb(), &ctx).unwrap(),
            json!({ "R": 1, "G": 2, "B": 0 })
        );
        assert_eq!(
            decode(ParamTag::path("flat").style(ParameterStyle::Label), rgb(), &ctx).unwrap(),
            json!({ "R": 1, "G": 0, "B": 3 })
        );
    }

    #[test]
    fn missing_path_parameter_is_not_found() {
        let ctx = ctx("/", &[]);
        assert!(matches!(
            decode(ParamTag::path("id"), ValueKind::String, &ctx),
            Err(DecodeError::ParameterNotFound { .. })
        ));
        assert!(matches!(
            decode(ParamTag::path("id").style(ParameterStyle::Label), ValueKind::String, &self::ctx("/", &[("id", "5")])),
            Err(DecodeError::Malformed { .. })
        ));
    }

    #[test]
    fn headers_and_cookies() {
        let ctx = ctx("/", &[]);
        assert_eq!(
            decode(ParamTag::header("x-tags"), ValueKind::array(ValueKind::String), &ctx).unwrap(),
            json!(["a", "b", "c"])
        );
        assert_eq!(decode(ParamTag::cookie("theme"), ValueKind::String, &ctx).unwrap(), json!("dark"));
        assert_eq!(
            decode(ParamTag::cookie("ids").explode(false), ValueKind::array(ValueKind::Uint(IntWidth::W8)), &ctx).unwrap(),
            json!([1, 2])
        );
    }

    #[test]
    fn absent_values_use_default_then_requiredness() {
        let ctx = ctx("/?other=1", &[]);
        let list = ValueKind::array(ValueKind::String);
        assert_eq!(
            decode(ParamTag::query("color").default_text("red,green"), list.clone(), &ctx).unwrap(),
            json!(["red", "green"])
        );
        assert!(matches!(
            decode(ParamTag::query("color").required(true), list.clone(), &ctx),
            Err(DecodeError::MissingParameter { .. })
        ));
        assert_eq!(decode(ParamTag::query("color"), list, &ctx).unwrap(), json!([]));
        assert_eq!(decode(ParamTag::query("limit"), ValueKind::Uint(IntWidth::W32), &ctx).unwrap(), json!(0));
    }

    #[test]
    fn operation_metadata_fills_unset_tag_fields() {
        let operation = OperationSpec::new("get", "/pets").with_parameter(
            ParameterSpec::new("limit", ParameterLocation::Query)
                .required(true)
                .with_explode(false)
                .with_schema(json!({ "type": "integer", "default": 20 })),
        );
        let parameter = operation.find_parameter("limit", ParameterLocation::Query).unwrap();
        let binding = ParamBinding::from_tag(&ParamTag::query("limit").explode(true), ValueKind::Uint(IntWidth::W32))
            .with_operation(parameter);
        assert_eq!(binding.explode, Some(true));
        assert!(binding.required);
        assert_eq!(binding.default.as_deref(), Some("20"));

        let spec = binding.to_parameter_spec();
        assert_eq!(spec.schema.unwrap()["default"], json!(20));

        let colors = ParamBinding::from_tag(
            &ParamTag::query("color").default_text("red,green"),
            ValueKind::array(ValueKind::String),
        );
        assert_eq!(colors.to_parameter_spec().schema.unwrap()["default"], json!(["red", "green"]));
    }

    #[test]
    fn absent_custom_text_without_default_is_missing() {
        let ctx = ctx("/?other=1", &[]);
        assert!(matches!(
            decode(ParamTag::query("v"), ValueKind::text::<Version>(), &ctx),
            Err(DecodeError::MissingParameter { ref name, .. }) if name == "v"
        ));
        assert_eq!(
            decode(ParamTag::query("v").default_text("2.0"), ValueKind::text::<Version>(), &ctx).unwrap(),
            json!([2, 0])
        );

        let kind = ValueKind::object([
            ObjectField::new("R", ValueKind::Uint(IntWidth::W8)),
            ObjectField::new("since", ValueKind::text::<Version>()),
        ]);
        let ctx = self::ctx("/?obj[R]=4", &[]);
        assert!(matches!(
            decode(ParamTag::query("obj").style(ParameterStyle::DeepObject), kind, &ctx),
            Err(DecodeError::MissingParameter { ref name, .. }) if name == "obj[since]"
        ));
    }

    #[test]
    fn delimited_query_arrays() {
        let ctx = ctx("/?spaced=1%202%203&piped=a%7Cb%7Cc", &[]);
        assert_eq!(
            decode(
                ParamTag::query("spaced").style(ParameterStyle::SpaceDelimited),
                ValueKind::array(ValueKind::Uint(IntWidth::W8)),
                &ctx
            )
            .unwrap(),
            json!([1, 2, 3])
        );
        assert_eq!(
            decode(
                ParamTag::query("piped").style(ParameterStyle::PipeDelimited),
                ValueKind::array(ValueKind::String),
                &ctx
            )
            .unwrap(),
            json!(["a", "b", "c"])
        );
    }

    #[test]
    fn form_object_unexploded_reads_key_value_pairs() {
        let ctx = ctx("/?color=R,100,G,200,B,150&odd=R,1,G", &[]);
        let tag = ParamTag::query("color").explode(false);
        assert_eq!(decode(tag, rgb(), &ctx).unwrap(), json!({ "R": 100, "G": 200, "B": 150 }));
        assert!(matches!(
            decode(ParamTag::query("odd").explode(false), rgb(), &ctx),
            Err(DecodeError::Malformed { .. })
        ));

        let request = Request::builder()
            .uri("/")
            .header("Cookie", "color=G,9")
            .body(Bytes::new())
            .unwrap();
        let cookies = RouteContext::new(request, MatchedRoute::new("/"));
        assert_eq!(
            decode(ParamTag::cookie("color").explode(false), rgb(), &cookies).unwrap(),
            json!({ "R": 0, "G": 9, "B": 0 })
        );
    }
}
