use bytes::{BufMut, Bytes, BytesMut};

use crate::http::request::{Method, Request};

const HTTP_VERSION: &str = "HTTP/1.1";
pub const USER_AGENT: &str = "waypoint-httpcli/0.1";

fn put_header(buf: &mut BytesMut, key: &str, value: &str) {
    buf.put_slice(key.as_bytes());
    buf.put_slice(b": ");
    buf.put_slice(value.as_bytes());
    buf.put_slice(b"\r\n");
}

fn put_head(buf: &mut BytesMut, method: Method, request: &Request) {
    // Request line
    let path = if request.path.is_empty() {
        "/"
    } else {
        &request.path
    };
    buf.put_slice(format!("{} {} {}\r\n", method.as_str(), path, HTTP_VERSION).as_bytes());

    put_header(buf, "Host", &request.host);
    put_header(buf, "Connection", "close");
    put_header(buf, "User-Agent", USER_AGENT);

    for (key, value) in &request.headers {
        put_header(buf, key, value);
    }
}

/// Serializes `request` as a GET. Any body on the request is ignored.
pub fn format_get_request(request: &Request) -> Bytes {
    let mut buf = BytesMut::with_capacity(256);
    put_head(&mut buf, Method::GET, request);
    buf.put_slice(b"\r\n");
    buf.freeze()
}

/// Serializes `request` as a POST carrying its body (empty if none).
///
/// Adds `Content-Type: text/plain` when there is a body and the caller set
/// no content type, and always adds `Content-Length`.
pub fn format_post_request(request: &Request) -> Bytes {
    let body = request.body.clone().unwrap_or_default();
    let mut buf = BytesMut::with_capacity(256 + body.len());
    put_head(&mut buf, Method::POST, request);

    if !body.is_empty() && request.header("Content-Type").is_none() {
        put_header(&mut buf, "Content-Type", "text/plain");
    }
    if request.header("Content-Length").is_none() {
        put_header(&mut buf, "Content-Length", &body.len().to_string());
    }

    buf.put_slice(b"\r\n");
    buf.put_slice(&body);
    buf.freeze()
}

/// Serializes `request` using the framing of its own method.
pub fn format_request(request: &Request) -> Bytes {
    match request.method {
        Method::GET => format_get_request(request),
        Method::POST => format_post_request(request),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::request::RequestBuilder;

    #[test]
    fn get_has_fixed_headers_then_user_headers() {
        let req = RequestBuilder::new()
            .host("example.test")
            .path("/index.html")
            .header("Accept", "*/*")
            .build()
            .unwrap();

        let text = String::from_utf8(format_get_request(&req).to_vec()).unwrap();
        assert_eq!(
            text,
            format!(
                "GET /index.html HTTP/1.1\r\nHost: example.test\r\nConnection: close\r\n\
                 User-Agent: {USER_AGENT}\r\nAccept: */*\r\n\r\n"
            )
        );
    }

    #[test]
    fn post_adds_content_type_and_length() {
        let req = RequestBuilder::new()
            .host("example.test")
            .path("/submit")
            .method(Method::POST)
            .body("hello")
            .build()
            .unwrap();

        let text = String::from_utf8(format_post_request(&req).to_vec()).unwrap();
        assert!(text.starts_with("POST /submit HTTP/1.1\r\n"));
        assert!(text.contains("Content-Type: text/plain\r\n"));
        assert!(text.contains("Content-Length: 5\r\n"));
        assert!(text.ends_with("\r\n\r\nhello"));
    }

    #[test]
    fn post_keeps_caller_content_type() {
        let req = RequestBuilder::new()
            .host("example.test")
            .method(Method::POST)
            .header("content-type", "application/json")
            .body("{}")
            .build()
            .unwrap();

        let text = String::from_utf8(format_post_request(&req).to_vec()).unwrap();
        assert!(!text.contains("text/plain"));
        assert!(text.contains("content-type: application/json\r\n"));
    }

    #[test]
    fn post_without_body_sends_zero_length() {
        let req = RequestBuilder::new()
            .host("example.test")
            .method(Method::POST)
            .build()
            .unwrap();

        let text = String::from_utf8(format_post_request(&req).to_vec()).unwrap();
        assert!(text.contains("Content-Length: 0\r\n"));
        assert!(!text.contains("Content-Type"));
        assert!(text.ends_with("\r\n\r\n"));
    }

    #[test]
    fn format_request_follows_method() {
        let req = RequestBuilder::new()
            .host("example.test")
            .method(Method::POST)
            .body("x")
            .build()
            .unwrap();
        assert!(format_request(&req).starts_with(b"POST "));
    }
}
