use folio::http::request::{Conditionals, Method, Request};

fn request(method: Method, segments: &[&str], args: &[(&str, &str)]) -> Request {
    Request {
        method,
        segments: segments.iter().map(|s| s.to_string()).collect(),
        args: args
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
        conditionals: Conditionals::default(),
        content_type: None,
        body: None,
        peer: "127.0.0.1".to_string(),
    }
}

#[test]
fn test_method_tokens_round_trip() {
    for method in [
        Method::GET,
        Method::HEAD,
        Method::POST,
        Method::PUT,
        Method::DELETE,
    ] {
        assert_eq!(Method::from_token(method.as_str()), Some(method));
    }
}

#[test]
fn test_method_unknown_token() {
    assert_eq!(Method::from_token("OPTIONS"), None);
    assert_eq!(Method::from_token(""), None);
}

#[test]
fn test_arg_lookup_first_occurrence_wins() {
    let req = request(
        Method::GET,
        &["db", "_changes"],
        &[("since", "1"), ("since", "2"), ("feed", "continuous")],
    );

    assert_eq!(req.arg("since"), Some("1"));
    assert_eq!(req.arg("feed"), Some("continuous"));
    assert_eq!(req.arg("missing"), None);
}

#[test]
fn test_is_head() {
    assert!(request(Method::HEAD, &[], &[]).is_head());
    assert!(!request(Method::GET, &[], &[]).is_head());
}

#[test]
fn test_body_bytes_defaults_to_empty() {
    let mut req = request(Method::POST, &["db"], &[]);
    assert!(req.body_bytes().is_empty());

    req.body = Some(bytes::Bytes::from_static(b"payload"));
    assert_eq!(req.body_bytes(), b"payload");
}
