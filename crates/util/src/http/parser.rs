//! # Request Text Parsing
//!
//! Helpers that turn raw request text into multi-valued maps. Keys keep the order in
//! which they first appear and values keep the order in which they were received, which
//! is what exploded array parameters rely on.

use indexmap::IndexMap;
use percent_encoding::percent_decode_str;
use url::form_urlencoded;

/// Name to values map preserving first-seen key order.
pub type MultiValueMap = IndexMap<String, Vec<String>>;

/// Parses a query string (with or without the leading `?`) into a [`MultiValueMap`].
///
/// Keys and values are `application/x-www-form-urlencoded` decoded, so `+` becomes a
/// space and `%2C` becomes a comma.
///
/// # Arguments
/// * `query` - The raw query string of the request URI
///
/// # Returns
/// Every key with its values in the order they were received
///
/// # Example
/// ```rust
/// use wirebind_util::http::parse_query;
///
/// let values = parse_query("?color=blue&color=black&limit=10");
/// assert_eq!(values["color"], vec!["blue", "black"]);
/// assert_eq!(values["limit"], vec!["10"]);
/// ```
pub fn parse_query(query: &str) -> MultiValueMap {
    parse_urlencoded(query.strip_prefix('?').unwrap_or(query).as_bytes())
}

/// Parses an `application/x-www-form-urlencoded` request body.
///
/// # Example
/// ```rust
/// use wirebind_util::http::parse_form_body;
///
/// let values = parse_form_body(b"name=Rex&tag=good+boy&tag=fluffy");
/// assert_eq!(values["name"], vec!["Rex"]);
/// assert_eq!(values["tag"], vec!["good boy", "fluffy"]);
/// ```
pub fn parse_form_body(body: &[u8]) -> MultiValueMap {
    parse_urlencoded(body)
}

fn parse_urlencoded(input: &[u8]) -> MultiValueMap {
    let mut values = MultiValueMap::new();
    for (key, value) in form_urlencoded::parse(input) {
        values.entry(key.into_owned()).or_default().push(value.into_owned());
    }
    values
}

/// Parses one `Cookie` header value into `(name, value)` pairs.
///
/// Malformed pairs (no `=` or an empty name) are skipped. Surrounding double quotes are
/// removed and values are percent-decoded.
///
/// # Example
/// ```rust
/// use wirebind_util::http::parse_cookie_header;
///
/// let cookies = parse_cookie_header(r#"session=abc; theme="dark"; broken"#);
/// assert_eq!(cookies, vec![("session".to_string(), "abc".to_string()), ("theme".to_string(), "dark".to_string())]);
/// ```
pub fn parse_cookie_header(header: &str) -> Vec<(String, String)> {
    header
        .split(';')
        .filter_map(|pair| {
            let (name, value) = pair.split_once('=')?;
            let name = name.trim();
            if name.is_empty() {
                return None;
            }
            let value = value.trim();
            let value = value.strip_prefix('"').and_then(|inner| inner.strip_suffix('"')).unwrap_or(value);
            Some((name.to_string(), percent_decode_str(value).decode_utf8_lossy().into_owned()))
        })
        .collect()
}

/// Splits `raw` on `delimiter`. An empty input yields no elements rather than one empty
/// element.
///
/// # Arguments
/// * `raw` - One un-exploded parameter value
/// * `delimiter` - `,` for form and simple, ` ` for spaceDelimited, `|` for pipeDelimited
///
/// # Returns
/// The elements in order, without trimming
///
/// # Example
/// ```rust
/// use wirebind_util::http::split_delimited;
///
/// assert_eq!(split_delimited("blue|black", '|'), vec!["blue", "black"]);
/// assert_eq!(split_delimited("a,,b", ','), vec!["a", "", "b"]);
/// assert!(split_delimited("", ' ').is_empty());
/// ```
pub fn split_delimited(raw: &str, delimiter: char) -> Vec<String> {
    if raw.is_empty() {
        return Vec::new();
    }
    raw.split(delimiter).map(str::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_keeps_repeated_keys_in_order() {
        let values = parse_query("color=blue&limit=5&color=black&color=brown");
        assert_eq!(values.get_index(0).map(|(key, _)| key.as_str()), Some("color"));
        assert_eq!(values["color"], vec!["blue", "black", "brown"]);
    }

    #[test]
    fn query_decodes_brackets_and_commas() {
        let values = parse_query("obj%5BR%5D=100&list=a%2Cb&name=two+words");
        assert_eq!(values["obj[R]"], vec!["100"]);
        assert_eq!(values["list"], vec!["a,b"]);
        assert_eq!(values["name"], vec!["two words"]);
    }

    #[test]
    fn empty_query_has_no_values() {
        assert!(parse_query("").is_empty());
        assert!(parse_query("?").is_empty());
    }

    #[test]
    fn split_delimited_handles_empty_input() {
        assert!(split_delimited("", ',').is_empty());
        assert_eq!(split_delimited("3,4,5", ','), vec!["3", "4", "5"]);
        assert_eq!(split_delimited("a|b", '|'), vec!["a", "b"]);
    }

    #[test]
    fn cookie_values_are_percent_decoded() {
        let cookies = parse_cookie_header("ids=3%2C4%2C5;  =skipped; plain=x");
        assert_eq!(cookies[0], ("ids".to_string(), "3,4,5".to_string()));
        assert_eq!(cookies.len(), 2);
    }
}
