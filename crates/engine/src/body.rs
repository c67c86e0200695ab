//! Request body loading.
//!
//! Wire-level body deserialization belongs to the embedding application; the engine only
//! calls a [`BodyLoader`] once per resolved record and hands the resulting JSON value to
//! [`Record::assemble`](crate::record::Record::assemble).

use anyhow::{Context, Result, bail};
use bytes::Bytes;
use http::{Request, header::CONTENT_TYPE};
use serde_json::{Map, Value};
use wirebind_types::TypeKey;
use wirebind_util::http::parse_form_body;

/// The field a body is loaded into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BodyTarget {
    pub record: &'static str,
    pub field: String,
    pub ty: TypeKey,
}

/// Turns a request body into a JSON value for the target field.
pub trait BodyLoader: Send + Sync {
    fn load(&self, request: &Request<Bytes>, target: &BodyTarget) -> Result<Value>;
}

impl<F> BodyLoader for F
where
    F: Fn(&Request<Bytes>, &BodyTarget) -> Result<Value> + Send + Sync,
{
    fn load(&self, request: &Request<Bytes>, target: &BodyTarget) -> Result<Value> {
        self(request, target)
    }
}

/// Parses the body as JSON.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonBodyLoader;

impl BodyLoader for JsonBodyLoader {
    fn load(&self, request: &Request<Bytes>, target: &BodyTarget) -> Result<Value> {
        let body = request.body();
        if body.iter().all(u8::is_ascii_whitespace) {
            bail!("request body for `{}` is empty", target.field);
        }
        serde_json::from_slice(body).with_context(|| format!("request body for `{}` is not valid JSON", target.field))
    }
}

/// Parses an `application/x-www-form-urlencoded` body into a JSON object of strings.
/// Repeated keys become arrays.
#[derive(Debug, Clone, Copy, Default)]
pub struct FormBodyLoader;

impl BodyLoader for FormBodyLoader {
    fn load(&self, request: &Request<Bytes>, _target: &BodyTarget) -> Result<Value> {
        let mut object = Map::new();
        for (key, mut values) in parse_form_body(request.body()) {
            let value = if values.len() == 1 {
                Value::String(values.remove(0))
            } else {
                Value::Array(values.into_iter().map(Value::String).collect())
            };
            object.insert(key, value);
        }
        Ok(Value::Object(object))
    }
}

/// Chooses between form and JSON parsing by `Content-Type`. JSON is assumed when the
/// header is absent.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContentTypeBodyLoader;

impl BodyLoader for ContentTypeBodyLoader {
    fn load(&self, request: &Request<Bytes>, target: &BodyTarget) -> Result<Value> {
        let content_type = request
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.split(';').next().unwrap_or_default().trim().to_ascii_lowercase());

        match content_type.as_deref() {
            None => JsonBodyLoader.load(request, target),
            Some("application/x-www-form-urlencoded") => FormBodyLoader.load(request, target),
            Some(media) if media == "application/json" || media.ends_with("+json") => JsonBodyLoader.load(request, target),
            Some(other) => bail!("unsupported content type `{other}` for request body `{}`", target.field),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn target() -> BodyTarget {
        BodyTarget {
            record: "CreatePet",
            field: "pet".into(),
            ty: TypeKey::of::<Value>(),
        }
    }

    fn request(content_type: Option<&str>, body: &'static str) -> Request<Bytes> {
        let mut builder = Request::builder().method("POST").uri("/pets");
        if let Some(content_type) = content_type {
            builder = builder.header(CONTENT_TYPE, content_type);
        }
        builder.body(Bytes::from_static(body.as_bytes())).unwrap()
    }

    #[test]
    fn loads_json_by_default() {
        let value = ContentTypeBodyLoader.load(&request(None, r#"{"name":"Rex"}"#), &target()).unwrap();
        assert_eq!(value, json!({ "name": "Rex" }));
    }

    #[test]
    fn loads_forms_with_repeated_keys() {
        let value = ContentTypeBodyLoader
            .load(
                &request(Some("application/x-www-form-urlencoded; charset=utf-8"), "name=Rex&tag=a&tag=b"),
                &target(),
            )
            .unwrap();
        assert_eq!(value, json!({ "name": "Rex", "tag": ["a", "b"] }));
    }

    #[test]
    fn rejects_empty_and_unknown_bodies() {
        let error = JsonBodyLoader.load(&request(None, "  "), &target()).unwrap_err();
        assert!(error.to_string().contains("empty"));
        assert!(ContentTypeBodyLoader.load(&request(Some("text/plain"), "x"), &target()).is_err());
        assert!(JsonBodyLoader.load(&request(None, "{"), &target()).is_err());
    }

    #[test]
    fn closures_are_loaders() {
        let loader = |_: &Request<Bytes>, target: &BodyTarget| Ok::<_, anyhow::Error>(json!({ "field": target.field }));
        assert_eq!(loader.load(&request(None, ""), &target()).unwrap(), json!({ "field": "pet" }));
    }
}
