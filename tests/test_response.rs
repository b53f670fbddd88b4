use bytes::Bytes;
use waypoint::http::response::Response;

fn response(status: u16, headers: &[(&str, &str)], body: &'static [u8]) -> Response {
    Response {
        status,
        reason: String::new(),
        version: "HTTP/1.1".to_string(),
        headers: headers
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
        body: Bytes::from_static(body),
    }
}

#[test]
fn test_header_lookup_ignores_case() {
    let resp = response(200, &[("Content-Type", "text/html")], b"");
    assert_eq!(resp.header("content-type"), Some("text/html"));
    assert_eq!(resp.header("CONTENT-TYPE"), Some("text/html"));
    assert_eq!(resp.header("Server"), None);
}

#[test]
fn test_header_lookup_returns_first() {
    let resp = response(200, &[("Set-Cookie", "a=1"), ("Set-Cookie", "b=2")], b"");
    assert_eq!(resp.header("set-cookie"), Some("a=1"));
}

#[test]
fn test_content_length() {
    assert_eq!(response(200, &[("Content-Length", " 42 ")], b"").content_length(), Some(42));
    assert_eq!(response(200, &[("Content-Length", "x")], b"").content_length(), None);
    assert_eq!(response(200, &[], b"").content_length(), None);
}

#[test]
fn test_is_success() {
    assert!(response(200, &[], b"").is_success());
    assert!(response(204, &[], b"").is_success());
    assert!(!response(301, &[], b"").is_success());
    assert!(!response(404, &[], b"").is_success());
    assert!(!response(500, &[], b"").is_success());
}

#[test]
fn test_text_is_lossy() {
    assert_eq!(response(200, &[], b"OK").text(), "OK");
    assert_eq!(response(200, &[], b"a\xffb").text(), "a\u{fffd}b");
}

#[test]
fn test_default_response_is_empty() {
    let resp = Response::default();
    assert_eq!(resp.status, 0);
    assert!(resp.headers.is_empty());
    assert!(resp.body.is_empty());
}
