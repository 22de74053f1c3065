use folio::http::parser::{ParseError, parse_header_fields, parse_request_line};
use folio::http::request::Method;

#[test]
fn test_parse_simple_get_request_line() {
    let line = parse_request_line("GET /mydb/doc1 HTTP/1.1").unwrap();

    assert_eq!(line.method, Method::GET);
    assert_eq!(line.segments, vec!["mydb", "doc1"]);
    assert!(line.args.is_empty());
}

#[test]
fn test_parse_http_10_accepted() {
    let line = parse_request_line("GET / HTTP/1.0").unwrap();
    assert_eq!(line.method, Method::GET);
    assert!(line.segments.is_empty());
}

#[test]
fn test_parse_all_supported_methods() {
    let methods = vec![
        ("GET", Method::GET),
        ("HEAD", Method::HEAD),
        ("POST", Method::POST),
        ("PUT", Method::PUT),
        ("DELETE", Method::DELETE),
    ];

    for (token, expected) in methods {
        let line = parse_request_line(&format!("{token} /db HTTP/1.1")).unwrap();
        assert_eq!(line.method, expected);
    }
}

#[test]
fn test_reject_unknown_method() {
    let err = parse_request_line("PATCH /db HTTP/1.1").unwrap_err();
    assert_eq!(err, ParseError::InvalidMethod);

    let err = parse_request_line("get /db HTTP/1.1").unwrap_err();
    assert_eq!(err, ParseError::InvalidMethod);
}

#[test]
fn test_reject_unknown_version() {
    let err = parse_request_line("GET /db HTTP/2.0").unwrap_err();
    assert_eq!(err, ParseError::InvalidVersion);
}

#[test]
fn test_reject_missing_or_extra_tokens() {
    assert_eq!(
        parse_request_line("GET /db").unwrap_err(),
        ParseError::InvalidRequestLine
    );
    assert_eq!(
        parse_request_line("GET /db HTTP/1.1 junk").unwrap_err(),
        ParseError::InvalidRequestLine
    );
    assert_eq!(
        parse_request_line("").unwrap_err(),
        ParseError::InvalidRequestLine
    );
}

#[test]
fn test_reject_relative_path() {
    let err = parse_request_line("GET db/doc HTTP/1.1").unwrap_err();
    assert_eq!(err, ParseError::InvalidPath);
}

#[test]
fn test_path_segments_drop_empty_components() {
    let line = parse_request_line("GET //a///b/ HTTP/1.1").unwrap();
    assert_eq!(line.segments, vec!["a", "b"]);
}

#[test]
fn test_path_segments_are_percent_decoded() {
    let line = parse_request_line("GET /my%20db/doc%2F1 HTTP/1.1").unwrap();
    assert_eq!(line.segments, vec!["my db", "doc/1"]);
}

#[test]
fn test_query_parameters_decoded_in_order() {
    let line = parse_request_line("GET /db/_changes?feed=continuous&since=42 HTTP/1.1").unwrap();

    assert_eq!(
        line.args,
        vec![
            ("feed".to_string(), "continuous".to_string()),
            ("since".to_string(), "42".to_string()),
        ]
    );
}

#[test]
fn test_query_percent_and_plus_decoding() {
    let line = parse_request_line("GET /db?key=%22a+b%22 HTTP/1.1").unwrap();
    assert_eq!(line.args[0].1, "\"a b\"");
}

#[test]
fn test_header_fields_content_length() {
    let lines = vec!["Host: localhost".to_string(), "Content-Length: 12".to_string()];
    let fields = parse_header_fields(&lines);
    assert_eq!(fields.content_length, 12);
}

#[test]
fn test_header_fields_names_case_insensitive() {
    let lines = vec![
        "content-length: 7".to_string(),
        "CONTENT-TYPE: application/json".to_string(),
    ];
    let fields = parse_header_fields(&lines);

    assert_eq!(fields.content_length, 7);
    assert_eq!(fields.content_type.as_deref(), Some("application/json"));
}

#[test]
fn test_header_fields_unparsable_content_length_is_zero() {
    let lines = vec!["Content-Length: banana".to_string()];
    let fields = parse_header_fields(&lines);
    assert_eq!(fields.content_length, 0);
}

#[test]
fn test_header_fields_conditionals() {
    let lines = vec![
        "If-Match: \"1-abc\"".to_string(),
        "If-None-Match: \"2-def\"".to_string(),
        "If-Modified-Since: Wed, 21 Oct 2015 07:28:00 GMT".to_string(),
    ];
    let fields = parse_header_fields(&lines);

    assert_eq!(fields.conditionals.if_match.as_deref(), Some("\"1-abc\""));
    assert_eq!(fields.conditionals.if_none_match.as_deref(), Some("\"2-def\""));
    assert!(fields.conditionals.if_modified_since.is_some());
    assert!(fields.conditionals.if_unmodified_since.is_none());
}

#[test]
fn test_header_fields_ignore_unknown_and_malformed() {
    let lines = vec![
        "X-Custom: whatever".to_string(),
        "NotAHeaderLine".to_string(),
    ];
    let fields = parse_header_fields(&lines);

    assert_eq!(fields.content_length, 0);
    assert!(fields.content_type.is_none());
}
