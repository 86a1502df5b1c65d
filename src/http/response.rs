//! Outgoing response model.

use crate::utils::mime::types;
use std::path::PathBuf;
use std::sync::Arc;

/// Response payload. Files are streamed by the server, not buffered here.
#[derive(Debug, Clone)]
pub enum Body {
    Empty,
    Bytes(Arc<[u8]>),
    File(PathBuf),
}

#[derive(Debug, Clone)]
pub struct Response {
    status: u16,
    headers: Vec<(String, String)>,
    body: Body,
}

impl Response {
    pub fn new(status: u16, body: Body) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body,
        }
    }

    /// 200 with an in-memory body.
    pub fn ok(content_type: &str, body: impl Into<Arc<[u8]>>) -> Self {
        Self::new(200, Body::Bytes(body.into())).with_header("Content-Type", content_type)
    }

    /// 200 streaming a file from disk.
    pub fn file(content_type: &str, path: impl Into<PathBuf>) -> Self {
        Self::new(200, Body::File(path.into())).with_header("Content-Type", content_type)
    }

    /// 302 to `location`.
    pub fn redirect(location: &str) -> Self {
        Self::new(302, Body::Empty).with_header("Location", location)
    }

    pub fn not_found() -> Self {
        Self::ok(types::PLAIN, b"404 Not Found".as_slice()).with_status(404)
    }

    pub fn access_restricted() -> Self {
        Self::ok(types::HTML, b"Access Restricted".as_slice()).with_status(403)
    }

    pub fn server_error() -> Self {
        Self::ok(types::PLAIN, b"500 Internal Server Error".as_slice()).with_status(500)
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    /// Set a header, replacing any previous value under the same name.
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.headers.push((name.to_string(), value.into()));
        self
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn body(&self) -> &Body {
        &self.body
    }

    pub fn into_body(self) -> Body {
        self.body
    }
}
