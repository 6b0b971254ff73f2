//! Outbound request model.
//!
//! # Responsibilities
//! - Represent an immutable request (method, URL, headers, body)
//! - Validate URL and headers once, at construction
//! - Report whether the request may be sent more than once
//!
//! # Design Decisions
//! - Headers use `http::HeaderMap`: case-insensitive keys, ordered values per key
//! - Only `http` and `https` targets are accepted
//! - A built request is never mutated; retries share it behind an `Arc`

use std::fmt;
use std::str::FromStr;

use http::header::{HeaderMap, HeaderName, HeaderValue};
use thiserror::Error;
use url::Url;

use crate::http::body::RequestBody;

/// HTTP methods the executor accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
    Head,
    Options,
    Patch,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Head => "HEAD",
            Method::Options => "OPTIONS",
            Method::Patch => "PATCH",
        }
    }

    /// Idempotent per RFC 9110 section 9.2.2.
    pub fn is_idempotent(&self) -> bool {
        !matches!(self, Method::Post | Method::Patch)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = RequestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Method::Get),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "DELETE" => Ok(Method::Delete),
            "HEAD" => Ok(Method::Head),
            "OPTIONS" => Ok(Method::Options),
            "PATCH" => Ok(Method::Patch),
            _ => Err(RequestError::UnsupportedMethod(s.to_string())),
        }
    }
}

impl From<Method> for http::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => http::Method::GET,
            Method::Post => http::Method::POST,
            Method::Put => http::Method::PUT,
            Method::Delete => http::Method::DELETE,
            Method::Head => http::Method::HEAD,
            Method::Options => http::Method::OPTIONS,
            Method::Patch => http::Method::PATCH,
        }
    }
}

/// Errors raised while building a [`Request`].
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("unsupported URL scheme '{0}'")]
    UnsupportedScheme(String),

    #[error("unsupported HTTP method '{0}'")]
    UnsupportedMethod(String),

    #[error("invalid header name '{0}'")]
    InvalidHeaderName(String),

    #[error("invalid value for header '{0}'")]
    InvalidHeaderValue(String),
}

/// An immutable outbound request.
#[derive(Debug)]
pub struct Request {
    method: Method,
    url: Url,
    headers: HeaderMap,
    body: RequestBody,
}

impl Request {
    pub fn builder(method: Method, url: &str) -> RequestBuilder {
        RequestBuilder::new(method, url)
    }

    pub fn get(url: &str) -> RequestBuilder {
        Self::builder(Method::Get, url)
    }

    pub fn post(url: &str) -> RequestBuilder {
        Self::builder(Method::Post, url)
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &RequestBody {
        &self.body
    }

    /// Whether the request can be sent again after a failed attempt.
    pub fn is_replayable(&self) -> bool {
        self.body.is_replayable()
    }
}

/// Builder for [`Request`]. The first error encountered is reported by
/// [`RequestBuilder::build`].
#[derive(Debug)]
pub struct RequestBuilder {
    method: Method,
    url: Result<Url, RequestError>,
    headers: HeaderMap,
    body: RequestBody,
    error: Option<RequestError>,
}

impl RequestBuilder {
    fn new(method: Method, url: &str) -> Self {
        Self {
            method,
            url: Url::parse(url).map_err(RequestError::from),
            headers: HeaderMap::new(),
            body: RequestBody::empty(),
            error: None,
        }
    }

    /// Append a header value. Existing values for the same name are kept.
    pub fn header(mut self, name: &str, value: &str) -> Self {
        if self.error.is_some() {
            return self;
        }
        let name = match HeaderName::from_bytes(name.as_bytes()) {
            Ok(name) => name,
            Err(_) => {
                self.error = Some(RequestError::InvalidHeaderName(name.to_string()));
                return self;
            }
        };
        match HeaderValue::from_str(value) {
            Ok(value) => {
                self.headers.append(name, value);
            }
            Err(_) => {
                self.error = Some(RequestError::InvalidHeaderValue(name.to_string()));
            }
        }
        self
    }

    /// Merge a prepared header map.
    pub fn headers(mut self, headers: HeaderMap) -> Self {
        let mut last_name = None;
        for (name, value) in headers {
            if let Some(name) = name {
                last_name = Some(name);
            }
            if let Some(name) = &last_name {
                self.headers.append(name.clone(), value);
            }
        }
        self
    }

    pub fn body(mut self, body: impl Into<RequestBody>) -> Self {
        self.body = body.into();
        self
    }

    pub fn build(self) -> Result<Request, RequestError> {
        if let Some(err) = self.error {
            return Err(err);
        }
        let url = self.url?;
        match url.scheme() {
            "http" | "https" => {}
            other => return Err(RequestError::UnsupportedScheme(other.to_string())),
        }
        Ok(Request {
            method: self.method,
            url,
            headers: self.headers,
            body: self.body,
        })
    }
}
