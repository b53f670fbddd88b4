use waypoint::http::request::{Method, RequestBuilder};

#[test]
fn test_method_from_str() {
    assert_eq!(Method::from_str("GET"), Some(Method::GET));
    assert_eq!(Method::from_str("POST"), Some(Method::POST));
    assert_eq!(Method::from_str("PUT"), None);
    assert_eq!(Method::from_str(""), None);
}

#[test]
fn test_method_as_str() {
    assert_eq!(Method::GET.as_str(), "GET");
    assert_eq!(Method::POST.as_str(), "POST");
}

#[test]
fn test_builder_defaults() {
    let req = RequestBuilder::new().host("example.com").build().unwrap();

    assert_eq!(req.host, "example.com");
    assert_eq!(req.path, "/");
    assert_eq!(req.method, Method::GET);
    assert!(req.headers.is_empty());
    assert!(!req.use_ssl);
    assert!(req.body.is_none());
    assert_eq!(req.body_len(), 0);
}

#[test]
fn test_builder_requires_host() {
    assert!(RequestBuilder::new().path("/").build().is_err());
    assert!(RequestBuilder::new().host("").build().is_err());
}

#[test]
fn test_builder_full() {
    let req = RequestBuilder::new()
        .host("api.example.com:8443")
        .path("/v1/items")
        .method(Method::POST)
        .header("Accept", "application/json")
        .header("X-Id", "7")
        .use_ssl(true)
        .body("payload")
        .build()
        .unwrap();

    assert_eq!(req.method, Method::POST);
    assert_eq!(req.headers.len(), 2);
    assert_eq!(req.header("accept"), Some("application/json"));
    assert_eq!(req.header("x-id"), Some("7"));
    assert_eq!(req.body_len(), 7);
    assert!(req.use_ssl);
}

#[test]
fn test_default_service_follows_use_ssl() {
    let plain = RequestBuilder::new().host("h").build().unwrap();
    let secure = RequestBuilder::new().host("h").use_ssl(true).build().unwrap();
    assert_eq!(plain.default_service(), "http");
    assert_eq!(secure.default_service(), "https");
}
