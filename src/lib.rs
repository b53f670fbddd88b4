//! Waypoint - asynchronous HTTP/1.x client
//!
//! Core library: byte-stream endpoints, framing-layer security, name
//! resolution and the request state machine that ties them together.

pub mod config;
pub mod endpoint;
pub mod http;
pub mod net;
pub mod security;
pub mod support;
