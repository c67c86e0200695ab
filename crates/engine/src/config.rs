//! Binder configuration.
//!
//! Configuration is small and mostly fixed at process start: how a parameter without a
//! declared style is serialized, and how strictly parameter-tagged fields are checked
//! against the operation metadata known at registration time. Values come from code,
//! from JSON, or from environment variables; unparsable environment values are logged
//! and ignored.

use std::{env, fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;
use wirebind_types::{ParameterLocation, ParameterStyle};

/// Environment variable selecting the [`StylePolicy`] (`location-default` or `explicit`).
pub const STYLE_POLICY_ENV: &str = "WIREBIND_STYLE_POLICY";

/// Environment variable toggling [`BinderConfig::strict_operation_parameters`].
pub const STRICT_PARAMETERS_ENV: &str = "WIREBIND_STRICT_OPERATION_PARAMETERS";

/// Error surfaced when configuration cannot be read.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The JSON payload did not match [`BinderConfig`].
    #[error("binder configuration is invalid: {0}")]
    Json(#[from] serde_json::Error),
    /// An unknown style policy name.
    #[error("unknown style policy `{0}`; expected `location-default` or `explicit`")]
    UnknownStylePolicy(String),
}

/// How the style of a parameter that declares none is chosen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StylePolicy {
    /// OpenAPI's documented defaults: `simple` for path and header, `form` for query and cookie.
    #[default]
    LocationDefault,
    /// No implicit location default: an undeclared style is the plain `form` ("none") row
    /// of the policy table, so path and header parameters must declare a style.
    Explicit,
}

impl StylePolicy {
    /// Resolves the effective style for a parameter.
    pub fn resolve(self, declared: Option<ParameterStyle>, location: ParameterLocation) -> ParameterStyle {
        match (declared, self) {
            (Some(style), _) => style,
            (None, Self::LocationDefault) => ParameterStyle::default_for(location),
            (None, Self::Explicit) => ParameterStyle::Form,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LocationDefault => "location-default",
            Self::Explicit => "explicit",
        }
    }
}

impl fmt::Display for StylePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StylePolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "location-default" | "location" | "default" => Ok(Self::LocationDefault),
            "explicit" => Ok(Self::Explicit),
            other => Err(ConfigError::UnknownStylePolicy(other.to_string())),
        }
    }
}

/// Settings consumed by the plan compiler and the parameter decoder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct BinderConfig {
    pub style_policy: StylePolicy,
    /// When the operation is known at registration time, reject parameter-tagged fields
    /// that the operation does not declare.
    pub strict_operation_parameters: bool,
}

impl Default for BinderConfig {
    fn default() -> Self {
        Self {
            style_policy: StylePolicy::default(),
            strict_operation_parameters: true,
        }
    }
}

impl BinderConfig {
    /// Defaults overridden by [`STYLE_POLICY_ENV`] and [`STRICT_PARAMETERS_ENV`].
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`BinderConfig::from_env`] with a caller-supplied variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(raw) = lookup(STYLE_POLICY_ENV).filter(|raw| !raw.trim().is_empty()) {
            match raw.parse::<StylePolicy>() {
                Ok(policy) => config.style_policy = policy,
                Err(error) => warn!(
                    variable = STYLE_POLICY_ENV,
                    value = %raw,
                    error = %error,
                    "Ignoring style policy override; using default"
                ),
            }
        }

        if let Some(raw) = lookup(STRICT_PARAMETERS_ENV).filter(|raw| !raw.trim().is_empty()) {
            match parse_flag(&raw) {
                Some(strict) => config.strict_operation_parameters = strict,
                None => warn!(
                    variable = STRICT_PARAMETERS_ENV,
                    value = %raw,
                    "Ignoring strict parameter override; expected true or false"
                ),
            }
        }

        config
    }

    pub fn from_json_str(data: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(data)?)
    }

    pub fn with_style_policy(mut self, style_policy: StylePolicy) -> Self {
        self.style_policy = style_policy;
        self
    }

    pub fn with_strict_operation_parameters(mut self, strict: bool) -> Self {
        self.strict_operation_parameters = strict;
        self
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
