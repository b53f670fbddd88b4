//! HTTP/1.x client.
//!
//! # Architecture
//!
//! - **`client`**: the per-request state machine and the public [`HttpClient`]
//! - **`format`**: serializes a [`Request`](request::Request) into wire bytes
//! - **`parser`**: incremental response parser fed straight from the endpoint
//! - **`request`**: request representation and builder
//! - **`response`**: parsed response handed to the caller
//!
//! # Request State Machine
//!
//! ```text
//!        ┌─────────────┐
//!        │  Resolving  │ ← host name to candidate addresses
//!        └──────┬──────┘
//!               ▼
//!        ┌─────────────┐
//!   ┌──► │ Connecting  │ ← next untried address
//!   │    └──────┬──────┘
//!   │           ▼
//!   │    ┌─────────────┐
//!   │    │  Securing   │ ← only when use_ssl
//!   │    └──────┬──────┘
//!   │           ▼
//!   │    ┌─────────────┐
//!   ├─── │   Writing   │
//!   │    └──────┬──────┘
//!   │           ▼
//!   │    ┌─────────────┐
//!   └─── │   Reading   │ ← retries only while no byte has arrived
//!        └──────┬──────┘
//!               ▼
//!              Done → callback(Some(response) | None)
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use waypoint::http::{HttpClient, request::RequestBuilder};
//! use waypoint::support::time::deadline_after;
//!
//! # async fn demo() {
//! let request = RequestBuilder::new().host("example.com").path("/").build().unwrap();
//! let client = HttpClient::new();
//! if let Some(resp) = client.fetch(&request, deadline_after(Duration::from_secs(5))).await {
//!     println!("{} {}", resp.status, resp.text());
//! }
//! # }
//! ```

pub mod client;
pub mod format;
pub mod parser;
pub mod request;
pub mod response;

pub use client::{HttpClient, RequestFailure};
