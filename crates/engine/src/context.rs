//! Per-request route context.

use std::sync::Arc;

use bytes::Bytes;
use http::{Request, header::COOKIE};
use indexmap::IndexMap;
use wirebind_types::OperationSpec;
use wirebind_util::http::{MultiValueMap, parse_cookie_header, parse_query};

/// What route matching produced for one request.
#[derive(Debug, Clone, Default)]
pub struct MatchedRoute {
    pattern: String,
    path_params: IndexMap<String, String>,
    operation: Option<Arc<OperationSpec>>,
}

impl MatchedRoute {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            ..Self::default()
        }
    }

    /// Adds a captured path parameter. The value is the raw, still percent-encoded segment.
    pub fn with_path_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.path_params.insert(name.into(), value.into());
        self
    }

    pub fn with_operation(mut self, operation: impl Into<Arc<OperationSpec>>) -> Self {
        self.operation = Some(operation.into());
        self
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn path_params(&self) -> &IndexMap<String, String> {
        &self.path_params
    }

    pub fn operation(&self) -> Option<&OperationSpec> {
        self.operation.as_deref()
    }
}

/// The request plus everything route matching learned about it.
///
/// Created fresh for every request and never shared; query values and cookies are parsed
/// once on creation.
#[derive(Debug)]
pub struct RouteContext {
    request: Request<Bytes>,
    route: MatchedRoute,
    query: MultiValueMap,
    cookies: MultiValueMap,
}

impl RouteContext {
    pub fn new(request: Request<Bytes>, route: MatchedRoute) -> Self {
        let query = request.uri().query().map(parse_query).unwrap_or_default();

        let mut cookies = MultiValueMap::new();
        for header in request.headers().get_all(COOKIE) {
            let Ok(header) = header.to_str() else { continue };
            for (name, value) in parse_cookie_header(header) {
                cookies.entry(name).or_default().push(value);
            }
        }

        Self {
            request,
            route,
            query,
            cookies,
        }
    }

    pub fn request(&self) -> &Request<Bytes> {
        &self.request
    }

    pub fn route(&self) -> &MatchedRoute {
        &self.route
    }

    pub fn operation(&self) -> Option<&OperationSpec> {
        self.route.operation()
    }

    pub fn path_param(&self, name: &str) -> Option<&str> {
        self.route.path_params.get(name).map(String::as_str)
    }

    pub fn query(&self) -> &MultiValueMap {
        &self.query
    }

    /// Every value received for `name`, in request order.
    pub fn query_values(&self, name: &str) -> &[String] {
        self.query.get(name).map(Vec::as_slice).unwrap_or_default()
    }

    /// Every value of header `name`. Names compare case-insensitively; values that are not
    /// visible ASCII are skipped.
    pub fn header_values(&self, name: &str) -> Vec<&str> {
        self.request
            .headers()
            .get_all(name)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .collect()
    }

    pub fn cookie_values(&self, name: &str) -> &[String] {
        self.cookies.get(name).map(Vec::as_slice).unwrap_or_default()
    }
}
