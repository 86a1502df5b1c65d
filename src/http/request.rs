//! Incoming request model.

use percent_encoding::percent_decode_str;
use std::borrow::Cow;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Head,
    Post,
    Other,
}

impl Method {
    pub fn parse(method: &str) -> Self {
        match method.to_ascii_uppercase().as_str() {
            "GET" => Self::Get,
            "HEAD" => Self::Head,
            "POST" => Self::Post,
            _ => Self::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Head => "HEAD",
            Self::Post => "POST",
            Self::Other => "OTHER",
        }
    }
}

/// A parsed request: decoded path, query pairs and lowercase header names.
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    headers: Vec<(String, String)>,
    base_url_path: String,
}

impl Request {
    /// Build a request from a method and a raw URL (`/path?query`).
    pub fn new(method: Method, url: &str) -> Self {
        let (raw_path, raw_query) = match url.split_once('?') {
            Some((p, q)) => (p, q),
            None => (url, ""),
        };
        let path = match percent_decode_str(raw_path).decode_utf8_lossy() {
            Cow::Borrowed(p) => p.to_string(),
            Cow::Owned(p) => p,
        };
        let query = url::form_urlencoded::parse(raw_query.as_bytes())
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();

        Self {
            method,
            path,
            query,
            headers: Vec::new(),
            base_url_path: String::new(),
        }
    }

    pub fn get(url: &str) -> Self {
        Self::new(Method::Get, url)
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_ascii_lowercase(), value.into()));
        self
    }

    pub fn with_base_url_path(mut self, base: impl Into<String>) -> Self {
        self.base_url_path = base.into();
        self
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// First value of a query parameter.
    pub fn query(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// First value of a header (case-insensitive name).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Sent with `X-Requested-With: XMLHttpRequest`.
    pub fn is_xhr(&self) -> bool {
        self.header("x-requested-with")
            .is_some_and(|v| v.eq_ignore_ascii_case("XMLHttpRequest"))
    }

    /// URL prefix the client reached this app under, e.g. `/shop`.
    pub fn base_url_path(&self) -> &str {
        &self.base_url_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_url() {
        let req = Request::get("/resources/app%20x/client.js?r=ABC&x=1&r=2");
        assert_eq!(req.path(), "/resources/app x/client.js");
        assert_eq!(req.query("r"), Some("ABC"));
        assert_eq!(req.query("x"), Some("1"));
        assert_eq!(req.query("missing"), None);
    }

    #[test]
    fn test_headers_case_insensitive() {
        let req = Request::get("/").with_header("X-Forwarded-Server", "a.example");
        assert_eq!(req.header("x-forwarded-server"), Some("a.example"));
        assert_eq!(req.header("HOST"), None);
    }

    #[test]
    fn test_method_parse() {
        assert_eq!(Method::parse("get"), Method::Get);
        assert_eq!(Method::parse("HEAD"), Method::Head);
        assert_eq!(Method::parse("DELETE"), Method::Other);
    }
}
