use bytes::Bytes;

/// HTTP request methods supported by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// GET - Retrieve a resource
    GET,
    /// POST - Submit a body
    POST,
}

impl Method {
    /// Parses an HTTP method from a string.
    ///
    /// # Example
    ///
    /// ```
    /// # use waypoint::http::request::Method;
    /// assert_eq!(Method::from_str("POST"), Some(Method::POST));
    /// assert_eq!(Method::from_str("post"), None);
    /// ```
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "GET" => Some(Method::GET),
            "POST" => Some(Method::POST),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Method::GET => "GET",
            Method::POST => "POST",
        }
    }
}

/// An outbound request, as submitted by the caller.
///
/// The client copies what it needs into a formatted buffer before any I/O
/// starts, so the caller may drop or reuse the value right after submitting.
#[derive(Debug, Clone)]
pub struct Request {
    /// Host name, optionally with `:port`
    pub host: String,
    /// Request target (e.g., "/index.html")
    pub path: String,
    pub method: Method,
    /// Extra headers, written in order after the built-in ones
    pub headers: Vec<(String, String)>,
    /// Negotiate TLS before sending
    pub use_ssl: bool,
    /// Body for POST requests
    pub body: Option<Bytes>,
}

/// Builder for constructing Request objects.
#[derive(Debug, Default)]
pub struct RequestBuilder {
    host: Option<String>,
    path: Option<String>,
    method: Option<Method>,
    headers: Vec<(String, String)>,
    use_ssl: bool,
    body: Option<Bytes>,
}

impl RequestBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    pub fn use_ssl(mut self, use_ssl: bool) -> Self {
        self.use_ssl = use_ssl;
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn build(self) -> Result<Request, &'static str> {
        let host = self.host.ok_or("host missing")?;
        if host.is_empty() {
            return Err("host missing");
        }
        let path = match self.path {
            Some(p) if !p.is_empty() => p,
            _ => "/".to_string(),
        };
        Ok(Request {
            host,
            path,
            method: self.method.unwrap_or(Method::GET),
            headers: self.headers,
            use_ssl: self.use_ssl,
            body: self.body,
        })
    }
}

impl Request {
    /// Retrieves a header value by name, ignoring ASCII case.
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// Service name used for resolution when the host carries no port.
    pub fn default_service(&self) -> &'static str {
        if self.use_ssl { "https" } else { "http" }
    }

    pub fn body_len(&self) -> usize {
        self.body.as_ref().map(Bytes::len).unwrap_or(0)
    }
}
