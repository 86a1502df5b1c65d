//! Embedded HTTP layer.
//!
//! Requests and responses are modeled independently of the socket so that
//! package routes can be exercised without binding a port. The server
//! module adapts them onto `tiny_http`.

pub mod access;
pub mod base_url;
mod request;
mod response;
mod router;
pub mod server;

pub use request::{Method, Request};
pub use response::{Body, Response};
pub use router::{AccessRestricted, Handler, Outcome, Router};
