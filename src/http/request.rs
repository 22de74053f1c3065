use bytes::Bytes;
use std::time::SystemTime;

/// HTTP request methods.
///
/// The engine accepts the methods the document API is built from. Anything
/// else on the request line is answered with 400 during header parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// GET - Retrieve a resource
    GET,
    /// HEAD - Like GET but without the response body
    HEAD,
    /// POST - Create or submit data
    POST,
    /// PUT - Replace a resource
    PUT,
    /// DELETE - Delete a resource
    DELETE,
}

impl Method {
    /// Parses an HTTP method from a request-line token (case-sensitive).
    pub fn from_token(s: &str) -> Option<Self> {
        match s {
            "GET" => Some(Method::GET),
            "HEAD" => Some(Method::HEAD),
            "POST" => Some(Method::POST),
            "PUT" => Some(Method::PUT),
            "DELETE" => Some(Method::DELETE),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Method::GET => "GET",
            Method::HEAD => "HEAD",
            Method::POST => "POST",
            Method::PUT => "PUT",
            Method::DELETE => "DELETE",
        }
    }
}

/// Conditional request headers forwarded to the dispatcher.
#[derive(Debug, Clone, Default)]
pub struct Conditionals {
    pub if_match: Option<String>,
    pub if_none_match: Option<String>,
    pub if_modified_since: Option<SystemTime>,
    pub if_unmodified_since: Option<SystemTime>,
}

/// A fully read request, ready for dispatch.
///
/// The path is carried as decoded segments and the query string as decoded
/// key/value pairs; the dispatcher never sees raw URI bytes.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    /// Percent-decoded path segments, empty components dropped.
    pub segments: Vec<String>,
    /// Percent-decoded query parameters, in order of appearance.
    pub args: Vec<(String, String)>,
    pub conditionals: Conditionals,
    /// Content-Type of the request body, verbatim.
    pub content_type: Option<String>,
    /// Request body, present only when Content-Length was nonzero.
    pub body: Option<Bytes>,
    /// Client address, for logging and dispatch decisions.
    pub peer: String,
}

impl Request {
    /// Looks up a query parameter by name; first occurrence wins.
    pub fn arg(&self, name: &str) -> Option<&str> {
        self.args
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn is_head(&self) -> bool {
        self.method == Method::HEAD
    }

    pub fn body_bytes(&self) -> &[u8] {
        self.body.as_deref().unwrap_or(&[])
    }
}
