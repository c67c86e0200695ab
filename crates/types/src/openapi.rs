//! Reading operation metadata out of OpenAPI v3 documents.
//!
//! Routers usually hold the parsed document already; these helpers pull out the one
//! operation a route is registered for, with path-level and operation-level parameters
//! merged and local `$ref`s resolved.

use std::{fs, path::Path};

use anyhow::{Context, Result, anyhow};
use serde_json::Value;

use crate::{OperationSpec, ParameterSpec};

/// Loads an OpenAPI document from disk. Files ending in `.json` are parsed as JSON,
/// everything else as YAML.
pub fn load_document(file_path: impl AsRef<Path>) -> Result<Value> {
    let file_path = file_path.as_ref();
    let content = fs::read_to_string(file_path).with_context(|| format!("Failed to read OpenAPI document: {}", file_path.display()))?;

    let is_json = file_path
        .extension()
        .and_then(|extension| extension.to_str())
        .is_some_and(|extension| extension.eq_ignore_ascii_case("json"));

    if is_json {
        serde_json::from_str(&content).with_context(|| format!("Invalid JSON in {}", file_path.display()))
    } else {
        serde_yaml::from_str(&content).with_context(|| format!("Invalid YAML in {}", file_path.display()))
    }
}

fn resolve_local_ref(root: &Value, reference: &str) -> Option<Value> {
    let pointer = reference.strip_prefix('#').unwrap_or(reference);
    root.pointer(pointer).cloned()
}

/// Collects the parameters of an operation, resolving `$ref`s against `root`.
///
/// Path-level parameters come first; an operation-level parameter with the same name and
/// location replaces the path-level one in place.
pub fn collect_parameters(root: &Value, path_item: &Value, operation: &Value) -> Vec<Value> {
    let mut collected: Vec<Value> = Vec::new();
    let mut seen: Vec<(String, String)> = Vec::new();

    let levels = [path_item.get("parameters"), operation.get("parameters")];
    for parameter in levels.into_iter().flatten().filter_map(Value::as_array).flatten() {
        let resolved = match parameter.get("$ref").and_then(Value::as_str) {
            Some(reference) => resolve_local_ref(root, reference).unwrap_or_else(|| parameter.clone()),
            None => parameter.clone(),
        };

        let name = resolved.get("name").and_then(Value::as_str).unwrap_or("").to_string();
        let location = resolved.get("in").and_then(Value::as_str).unwrap_or("").to_string();
        if name.is_empty() || location.is_empty() {
            continue;
        }

        match seen.iter().position(|(seen_name, seen_location)| *seen_name == name && *seen_location == location) {
            Some(index) => collected[index] = resolved,
            None => {
                collected.push(resolved);
                seen.push((name, location));
            }
        }
    }

    collected
}

impl OperationSpec {
    /// Extracts the operation registered at `path` for `method` from an OpenAPI v3 document.
    ///
    /// # Errors
    ///
    /// Fails when the path or method is absent, or when a parameter object does not
    /// deserialize into a [`ParameterSpec`] (for example an unknown `in` location).
    pub fn from_document(root: &Value, path: &str, method: &str) -> Result<Self> {
        let path_item = root
            .get("paths")
            .and_then(|paths| paths.get(path))
            .ok_or_else(|| anyhow!("path '{}' not found in OpenAPI document", path))?;
        let method_key = method.to_ascii_lowercase();
        let operation = path_item
            .get(&method_key)
            .ok_or_else(|| anyhow!("operation {} {} not found in OpenAPI document", method.to_ascii_uppercase(), path))?;

        let parameters = collect_parameters(root, path_item, operation)
            .into_iter()
            .map(|parameter| {
                let name = parameter.get("name").and_then(Value::as_str).unwrap_or("").to_string();
                serde_json::from_value::<ParameterSpec>(parameter).with_context(|| format!("invalid parameter '{}' on {} {}", name, method_key, path))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            operation_id: operation.get("operationId").and_then(Value::as_str).map(str::to_string),
            method: method.to_ascii_uppercase(),
            path: path.to_string(),
            parameters,
        })
    }
}
