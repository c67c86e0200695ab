use percent_encoding::percent_decode_str;
use thiserror::Error;

/// Error returned when a captured path value is not valid percent-encoded UTF-8.
#[derive(Debug, Error)]
#[error("path value '{raw}' is not valid percent-encoded UTF-8: {source}")]
pub struct PathDecodeError {
    raw: String,
    #[source]
    source: std::str::Utf8Error,
}

impl PathDecodeError {
    /// The raw value as captured by route matching.
    pub fn raw(&self) -> &str {
        &self.raw
    }
}

/// Percent-decodes one path value (or one element of a delimited path value).
///
/// Unlike query decoding, `+` is left as-is.
pub fn decode_path_value(raw: &str) -> Result<String, PathDecodeError> {
    percent_decode_str(raw)
        .decode_utf8()
        .map(|decoded| decoded.into_owned())
        .map_err(|source| PathDecodeError { raw: raw.to_string(), source })
}
