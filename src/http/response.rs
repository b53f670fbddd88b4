use bytes::Bytes;

/// A response received from a server.
///
/// Headers keep the order and spelling they arrived with.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Response {
    /// Numeric status code (e.g., 200)
    pub status: u16,
    /// Reason phrase from the status line, possibly empty
    pub reason: String,
    /// HTTP version from the status line (e.g., "HTTP/1.1")
    pub version: String,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl Response {
    /// Retrieves the first header with this name, ignoring ASCII case.
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// Parsed `Content-Length`, if present and numeric.
    pub fn content_length(&self) -> Option<usize> {
        self.header("Content-Length").and_then(|v| v.trim().parse().ok())
    }

    /// Whether the status is in the 2xx range.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body as UTF-8 text, replacing invalid sequences.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}
