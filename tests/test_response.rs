use folio::http::output::Output;
use folio::http::response::{Reply, Status};
use folio::http::writer::build_header;

fn header_string(status: Status, reply: &Reply) -> String {
    String::from_utf8(build_header(status, reply)).unwrap()
}

#[test]
fn test_status_codes_and_reasons() {
    let table = [
        (Status::Ok, 200, "OK"),
        (Status::Created, 201, "Created"),
        (Status::NotModified, 304, "Not Modified"),
        (Status::BadRequest, 400, "Bad Request"),
        (Status::Forbidden, 403, "Forbidden"),
        (Status::NotFound, 404, "Not Found"),
        (Status::Conflict, 409, "Conflict"),
        (Status::PreconditionFailed, 412, "Precondition Failed"),
        (Status::InternalServerError, 500, "Internal Server Error"),
        (Status::NotImplemented, 501, "Not Implemented"),
        (Status::ServiceUnavailable, 503, "Service Unavailable"),
    ];

    for (status, code, reason) in table {
        assert_eq!(status.as_u16(), code);
        assert_eq!(status.reason_phrase(), reason);
    }
}

#[test]
fn test_success_statuses_have_no_default_text() {
    assert!(Status::Ok.default_text().is_none());
    assert!(Status::Created.default_text().is_none());
}

#[test]
fn test_not_found_default_text() {
    assert_eq!(
        Status::NotFound.default_text(),
        Some("The requested URI was not found on this server.")
    );
}

#[test]
fn test_synthesize_ok_body() {
    let mut reply = Reply::default();
    reply.synthesize_default(Status::Ok);

    match &reply.output {
        Output::Buffer { bytes } => assert_eq!(&bytes[..], br#"{"ok":true}"#),
        _ => panic!("expected a buffer producer"),
    }
    assert_eq!(reply.mime.as_deref(), Some("application/json"));
}

#[test]
fn test_synthesize_error_body() {
    let mut reply = Reply::default();
    reply.synthesize_default(Status::NotFound);

    match &reply.output {
        Output::Buffer { bytes } => assert_eq!(
            &bytes[..],
            br#"{"error": "The requested URI was not found on this server."}"#
        ),
        _ => panic!("expected a buffer producer"),
    }
}

#[test]
fn test_synthesize_keeps_installed_producer() {
    let mut reply = Reply {
        output: Output::buffer("custom"),
        ..Default::default()
    };
    reply.synthesize_default(Status::Ok);

    match &reply.output {
        Output::Buffer { bytes } => assert_eq!(&bytes[..], b"custom"),
        _ => panic!("expected a buffer producer"),
    }
}

#[test]
fn test_header_block_for_fixed_body() {
    let mut reply = Reply::default();
    reply.synthesize_default(Status::NotFound);

    let head = header_string(Status::NotFound, &reply);

    assert!(head.starts_with("HTTP/1.1 404 Not Found\r\n"));
    assert!(head.contains("Server: folio "));
    assert!(head.contains("Date: "));
    assert!(head.contains("Content-Length: "));
    assert!(head.contains("Content-Type: application/json; charset=utf-8\r\n"));
    assert!(head.contains("Connection: close\r\n"));
    assert!(!head.contains("Transfer-Encoding"));
    assert!(head.ends_with("\r\n\r\n"));
}

#[test]
fn test_header_block_caching_headers_only_when_supplied() {
    let mut reply = Reply::default();
    reply.synthesize_default(Status::Ok);

    let head = header_string(Status::Ok, &reply);
    assert!(!head.contains("ETag"));
    assert!(!head.contains("Last-Modified"));
    assert!(!head.contains("Cache-Control"));

    reply.etag = Some("\"3-xyz\"".to_string());
    reply.last_modified = Some(std::time::SystemTime::UNIX_EPOCH);
    reply.cache_control = Some("max-age=3600".to_string());

    let head = header_string(Status::Ok, &reply);
    assert!(head.contains("ETag: \"3-xyz\"\r\n"));
    assert!(head.contains("Last-Modified: Thu, 01 Jan 1970 00:00:00 GMT\r\n"));
    assert!(head.contains("Cache-Control: max-age=3600\r\n"));
}

#[test]
fn test_header_block_for_streaming_producer() {
    struct EmptyFeed;

    impl folio::http::output::FeedSource for EmptyFeed {
        fn read(&mut self, _buf: &mut [u8], _offset: u64) -> std::io::Result<(usize, bool)> {
            Ok((0, false))
        }
    }

    let reply = Reply {
        output: Output::Feed {
            source: Box::new(EmptyFeed),
            heartbeat: std::time::Duration::from_secs(60),
        },
        mime: Some("application/json".to_string()),
        ..Default::default()
    };

    let head = header_string(Status::Ok, &reply);

    assert!(head.contains("Transfer-Encoding: chunked\r\n"));
    assert!(!head.contains("Content-Length"));
    assert!(!head.contains("Connection: close"));
}

#[test]
fn test_default_mime_follows_status_when_unset() {
    let reply = Reply {
        output: Output::buffer("<p>hi</p>"),
        ..Default::default()
    };

    // Dispatcher installed a body without a MIME type: 200 defaults to
    // JSON, errors default to text/html.
    let head = header_string(Status::Ok, &reply);
    assert!(head.contains("Content-Type: application/json; charset=utf-8"));

    let head = header_string(Status::Forbidden, &reply);
    assert!(head.contains("Content-Type: text/html; charset=utf-8"));
}
