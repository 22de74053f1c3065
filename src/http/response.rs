use crate::http::output::Output;
use std::time::SystemTime;

pub const MIME_JSON: &str = "application/json";
pub const MIME_TEXTHTML: &str = "text/html";

/// The fixed table of status codes the engine can answer with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// 200 OK
    Ok,
    /// 201 Created
    Created,
    /// 304 Not Modified
    NotModified,
    /// 400 Bad Request
    BadRequest,
    /// 403 Forbidden
    Forbidden,
    /// 404 Not Found
    NotFound,
    /// 409 Conflict
    Conflict,
    /// 412 Precondition Failed
    PreconditionFailed,
    /// 500 Internal Server Error
    InternalServerError,
    /// 501 Not Implemented
    NotImplemented,
    /// 503 Service Unavailable
    ServiceUnavailable,
}

impl Status {
    pub fn as_u16(&self) -> u16 {
        match self {
            Status::Ok => 200,
            Status::Created => 201,
            Status::NotModified => 304,
            Status::BadRequest => 400,
            Status::Forbidden => 403,
            Status::NotFound => 404,
            Status::Conflict => 409,
            Status::PreconditionFailed => 412,
            Status::InternalServerError => 500,
            Status::NotImplemented => 501,
            Status::ServiceUnavailable => 503,
        }
    }

    pub fn reason_phrase(&self) -> &'static str {
        match self {
            Status::Ok => "OK",
            Status::Created => "Created",
            Status::NotModified => "Not Modified",
            Status::BadRequest => "Bad Request",
            Status::Forbidden => "Forbidden",
            Status::NotFound => "Not Found",
            Status::Conflict => "Conflict",
            Status::PreconditionFailed => "Precondition Failed",
            Status::InternalServerError => "Internal Server Error",
            Status::NotImplemented => "Not Implemented",
            Status::ServiceUnavailable => "Service Unavailable",
        }
    }

    /// Human-readable default text for statuses that carry one. The
    /// successful statuses synthesize `{"ok":true}` instead.
    pub fn default_text(&self) -> Option<&'static str> {
        match self {
            Status::Ok | Status::Created => None,
            Status::NotModified => Some("The requested resource has not been modified."),
            Status::BadRequest => {
                Some("Your client sent a request that this server could not understand.")
            }
            Status::Forbidden => {
                Some("You don't have permission to access this resource on this server.")
            }
            Status::NotFound => Some("The requested URI was not found on this server."),
            Status::Conflict => Some("The request URI generated a conflict."),
            Status::PreconditionFailed => Some("A precondition given in the request failed."),
            Status::InternalServerError => Some("Internal Server Error"),
            Status::NotImplemented => {
                Some("The requested method is not implemented by this server.")
            }
            Status::ServiceUnavailable => {
                Some("The server is temporarily unable to service your request.")
            }
        }
    }
}

/// Everything a dispatcher may populate about the response besides the
/// status code: the body producer, its MIME type, and the caching
/// headers surfaced verbatim when present.
pub struct Reply {
    pub output: Output,
    pub mime: Option<String>,
    pub etag: Option<String>,
    pub last_modified: Option<SystemTime>,
    pub cache_control: Option<String>,
}

impl Default for Reply {
    fn default() -> Self {
        Self {
            output: Output::None,
            mime: None,
            etag: None,
            last_modified: None,
            cache_control: None,
        }
    }
}

impl Reply {
    /// Fills in the default JSON body for a reply the dispatcher left
    /// empty: `{"ok":true}` for the successful statuses, an error payload
    /// carrying the status table's text otherwise.
    pub fn synthesize_default(&mut self, status: Status) {
        if !self.output.is_none() {
            return;
        }

        let body = match status.default_text() {
            None => String::from(r#"{"ok":true}"#),
            Some(text) => format!(r#"{{"error": "{text}"}}"#),
        };

        self.output = Output::buffer(body);
        self.mime = Some(MIME_JSON.to_string());
    }
}
