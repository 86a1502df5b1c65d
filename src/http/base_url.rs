//! Per-host base URL path lookup.
//!
//! One deployment can be reached under several hostnames, each mounting the
//! app under a different URL prefix. Keys are lowercase host names, with
//! `*` as the catch-all.

use super::Request;
use rustc_hash::FxHashMap;

pub const WILDCARD_HOST: &str = "*";

#[derive(Debug, Clone, Default)]
pub struct BaseUrlLookup {
    hosts: FxHashMap<String, String>,
}

impl BaseUrlLookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, host: &str, base_url_path: impl Into<String>) {
        self.hosts.insert(host.to_lowercase(), base_url_path.into());
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }

    /// Base URL path for `host`. Unknown hosts use the `*` entry; a missing
    /// host, or no match at all, yields the empty path.
    pub fn for_host(&self, host: Option<&str>) -> &str {
        let Some(host) = host.filter(|h| !h.is_empty()) else {
            return "";
        };
        let host = host.to_lowercase();
        self.hosts
            .get(&host)
            .or_else(|| self.hosts.get(WILDCARD_HOST))
            .map(String::as_str)
            .unwrap_or("")
    }

    /// Base URL path for a request, preferring the first
    /// `X-Forwarded-Server` entry over `Host`.
    pub fn for_request(&self, request: &Request) -> &str {
        self.for_host(request_host(request))
    }
}

impl<K: AsRef<str>, V: Into<String>> FromIterator<(K, V)> for BaseUrlLookup {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut lookup = Self::new();
        for (host, base) in iter {
            lookup.insert(host.as_ref(), base);
        }
        lookup
    }
}

fn request_host(request: &Request) -> Option<&str> {
    match request.header("x-forwarded-server") {
        Some(forwarded) => forwarded.split(',').next().map(str::trim),
        None => request.header("host"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup() -> BaseUrlLookup {
        [("Shop.Example", "/shop"), ("*", "/default")]
            .into_iter()
            .collect()
    }

    #[test]
    fn test_for_host() {
        let lookup = lookup();
        assert_eq!(lookup.for_host(Some("shop.example")), "/shop");
        assert_eq!(lookup.for_host(Some("SHOP.EXAMPLE")), "/shop");
        assert_eq!(lookup.for_host(Some("other.example")), "/default");
        assert_eq!(lookup.for_host(None), "");
    }

    #[test]
    fn test_no_wildcard() {
        let lookup: BaseUrlLookup = [("a.example", "/a")].into_iter().collect();
        assert_eq!(lookup.for_host(Some("b.example")), "");
    }

    #[test]
    fn test_forwarded_server_wins() {
        let lookup = lookup();
        let req = Request::get("/")
            .with_header("Host", "internal:8080")
            .with_header("X-Forwarded-Server", "shop.example, proxy.local");
        assert_eq!(lookup.for_request(&req), "/shop");

        let req = Request::get("/").with_header("Host", "shop.example");
        assert_eq!(lookup.for_request(&req), "/shop");
    }
}
