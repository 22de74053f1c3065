use crate::http::request::{Conditionals, Method};

#[derive(Debug, PartialEq, Eq)]
pub enum ParseError {
    InvalidRequestLine,
    InvalidMethod,
    InvalidVersion,
    InvalidPath,
}

/// The parsed first line of a request.
#[derive(Debug)]
pub struct RequestLine {
    pub method: Method,
    pub segments: Vec<String>,
    pub args: Vec<(String, String)>,
}

/// Parses `METHOD SP path SP HTTP/1.x` into method, decoded path segments
/// and decoded query parameters.
///
/// The line must contain exactly three tokens. Unknown methods and
/// versions other than HTTP/1.0 and HTTP/1.1 are rejected; the caller
/// turns any error into a 400 response.
pub fn parse_request_line(line: &str) -> Result<RequestLine, ParseError> {
    let mut tokens = line.split(' ').filter(|t| !t.is_empty());

    let method_tok = tokens.next().ok_or(ParseError::InvalidRequestLine)?;
    let path_tok = tokens.next().ok_or(ParseError::InvalidRequestLine)?;
    let version_tok = tokens.next().ok_or(ParseError::InvalidRequestLine)?;

    if tokens.next().is_some() {
        return Err(ParseError::InvalidRequestLine);
    }

    let method = Method::from_token(method_tok).ok_or(ParseError::InvalidMethod)?;

    if version_tok != "HTTP/1.1" && version_tok != "HTTP/1.0" {
        return Err(ParseError::InvalidVersion);
    }

    let (segments, args) = parse_path(path_tok)?;

    Ok(RequestLine {
        method,
        segments,
        args,
    })
}

/// Splits the request path into decoded segments and query pairs.
fn parse_path(path: &str) -> Result<(Vec<String>, Vec<(String, String)>), ParseError> {
    if !path.starts_with('/') {
        return Err(ParseError::InvalidPath);
    }

    let (path, query) = match path.split_once('?') {
        Some((p, q)) => (p, Some(q)),
        None => (path, None),
    };

    let segments = path
        .split('/')
        .filter(|s| !s.is_empty())
        .map(percent_decode)
        .collect();

    let args = match query {
        Some(q) => url::form_urlencoded::parse(q.as_bytes())
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect(),
        None => Vec::new(),
    };

    Ok((segments, args))
}

/// Decodes %XX escapes in a path segment. Malformed escapes pass through
/// verbatim rather than failing the whole request.
fn percent_decode(segment: &str) -> String {
    let bytes = segment.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hi = (bytes[i + 1] as char).to_digit(16);
            let lo = (bytes[i + 2] as char).to_digit(16);
            if let (Some(hi), Some(lo)) = (hi, lo) {
                out.push((hi * 16 + lo) as u8);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }

    String::from_utf8_lossy(&out).into_owned()
}

/// Header fields the engine itself cares about; everything else is
/// carried only as the raw line list until dispatch.
#[derive(Debug, Default)]
pub struct HeaderFields {
    pub content_length: usize,
    pub content_type: Option<String>,
    pub conditionals: Conditionals,
}

/// Extracts the known fields from the header lines following the request
/// line. Field names are matched case-insensitively; unknown fields are
/// ignored. An unparsable Content-Length counts as zero.
pub fn parse_header_fields(lines: &[String]) -> HeaderFields {
    let mut fields = HeaderFields::default();

    for line in lines {
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        let name = name.trim();
        let value = value.trim();

        if name.eq_ignore_ascii_case("Content-Length") {
            fields.content_length = value.parse().unwrap_or(0);
        } else if name.eq_ignore_ascii_case("Content-Type") {
            fields.content_type = Some(value.to_string());
        } else if name.eq_ignore_ascii_case("If-Match") {
            fields.conditionals.if_match = Some(value.to_string());
        } else if name.eq_ignore_ascii_case("If-None-Match") {
            fields.conditionals.if_none_match = Some(value.to_string());
        } else if name.eq_ignore_ascii_case("If-Modified-Since") {
            fields.conditionals.if_modified_since = httpdate::parse_http_date(value).ok();
        } else if name.eq_ignore_ascii_case("If-Unmodified-Since") {
            fields.conditionals.if_unmodified_since = httpdate::parse_http_date(value).ok();
        }
    }

    fields
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_simple_get() {
        let line = parse_request_line("GET /db/doc1 HTTP/1.1").unwrap();

        assert_eq!(line.method, Method::GET);
        assert_eq!(line.segments, vec!["db", "doc1"]);
        assert!(line.args.is_empty());
    }

    #[test]
    fn reject_extra_tokens() {
        let err = parse_request_line("GET / HTTP/1.1 extra").unwrap_err();
        assert_eq!(err, ParseError::InvalidRequestLine);
    }

    #[test]
    fn decode_segment_escapes() {
        assert_eq!(percent_decode("a%20b"), "a b");
        assert_eq!(percent_decode("100%"), "100%");
    }
}
