//! Custom handler responses.
//!
//! # Responsibilities
//! - Build immutable response values (body + headers) for custom handlers
//! - JSON convenience constructor setting `Content-Type: application/json`
//! - Convert a response value into an HTTP response
//!
//! # Design Decisions
//! - Absent body and JSON `null` body are distinct: `json_opt(None)` leaves
//!   the body unset, `json(&Value::Null)` yields the text `null`
//! - Serialization errors are returned to the caller untouched
//! - Header names/values are only checked on conversion; a bad header fails
//!   the conversion instead of being dropped

use axum::body::{Body, Bytes};
use axum::http::header::{HeaderName, HeaderValue};
use axum::http::{Response, StatusCode};
use serde::Serialize;
use thiserror::Error;

pub const APPLICATION_JSON: &str = "application/json";

/// A header that could not be placed on an HTTP response.
#[derive(Debug, Error)]
#[error("invalid response header '{name}'")]
pub struct InvalidHeader {
    pub name: String,
}

/// Body and headers produced by a custom handler.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseValue {
    body: Option<Bytes>,
    headers: Vec<(String, String)>,
}

impl ResponseValue {
    /// Response with the given body and no headers.
    pub fn of(body: impl Into<Bytes>) -> Self {
        Self {
            body: Some(body.into()),
            headers: Vec::new(),
        }
    }

    /// Response with the given body and headers, headers kept in order.
    pub fn with_headers<I, K, V>(body: impl Into<Bytes>, headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            body: Some(body.into()),
            headers: headers
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Response with no body.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Serialize `data` as the JSON body.
    pub fn json<T: Serialize + ?Sized>(data: &T) -> Result<Self, serde_json::Error> {
        let body = serde_json::to_string(data)?;
        Ok(Self::of(body).header("Content-Type", APPLICATION_JSON))
    }

    /// Like [`ResponseValue::json`], but `None` leaves the body unset.
    pub fn json_opt<T: Serialize + ?Sized>(data: Option<&T>) -> Result<Self, serde_json::Error> {
        match data {
            Some(data) => Self::json(data),
            None => Ok(Self::empty().header("Content-Type", APPLICATION_JSON)),
        }
    }

    /// Append a header.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    /// Body as UTF-8 text, if set and valid.
    pub fn body_str(&self) -> Option<&str> {
        self.body.as_deref().and_then(|b| std::str::from_utf8(b).ok())
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Look up a header value, case-insensitively.
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Convert into a `200 OK` HTTP response.
    pub fn into_http(self) -> Result<Response<Body>, InvalidHeader> {
        let mut response = Response::new(match self.body {
            Some(bytes) => Body::from(bytes),
            None => Body::empty(),
        });
        *response.status_mut() = StatusCode::OK;

        let headers = response.headers_mut();
        for (name, value) in self.headers {
            let header_name = HeaderName::from_bytes(name.as_bytes());
            let header_value = HeaderValue::from_str(&value);
            match (header_name, header_value) {
                (Ok(n), Ok(v)) => {
                    // Later values replace earlier ones for the same name.
                    headers.insert(n, v);
                }
                _ => return Err(InvalidHeader { name }),
            }
        }

        Ok(response)
    }
}
