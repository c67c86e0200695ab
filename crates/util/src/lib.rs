//! # Wirebind Utilities
//!
//! Small, dependency-light helpers for reading parameter text out of HTTP requests:
//! query strings, form bodies, cookie headers and percent-encoded path values.

pub mod http;

pub use http::*;
