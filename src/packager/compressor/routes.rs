//! HTTP routes for a compressor's output, source map and sources.

use super::{Compressor, Dialect};
use crate::http::{Outcome, Request, Response, Router};

/// One year, for revisioned URLs.
const IMMUTABLE_CACHE: &str = "public, max-age=31536000";

impl<L: Dialect> Compressor<L> {
    /// Register `GET <root>/<file>`, `GET <root>/<file>.map` and
    /// `GET <root>/src/*`.
    pub fn setup_routes(&self, router: &mut Router) {
        let output_url = self.url_path();
        let map_url = format!(
            "{}{}",
            crate::utils::path::with_trailing_slash(self.root_url()),
            self.map_file_name()
        );

        let this = self.clone();
        let header_map_url = map_url.clone();
        router.get(&output_url, move |request, _| {
            Ok(this.respond_output(request, &header_map_url)?)
        });

        let this = self.clone();
        router.get(&map_url, move |request, _| Ok(this.respond_map(request)?));

        let this = self.clone();
        router.get_prefix(&self.source_url_base(), move |_, rest| {
            Ok(this.respond_source(rest))
        });
    }

    fn respond_output(&self, request: &Request, map_url: &str) -> crate::error::Result<Outcome> {
        let base = request.base_url_path();
        let Some(rendered) = self.lookup_for_base_url_path(base)? else {
            return Ok(Outcome::Respond(Response::not_found()));
        };

        let revision = request
            .query("r")
            .filter(|r| !r.is_empty())
            .map(str::to_lowercase);

        if let Some(revision) = &revision
            && self.hash().as_deref() != Some(revision.as_str())
        {
            return Ok(Outcome::Respond(Response::redirect(&format!(
                "{}{}",
                base,
                request.path()
            ))));
        }

        let mut response = Response::ok(L::CONTENT_TYPE, rendered.code.as_bytes())
            .with_header("X-SourceMap", format!("{base}{map_url}"));
        if revision.is_some() {
            response = response.with_header("Cache-Control", IMMUTABLE_CACHE);
        }
        Ok(Outcome::Respond(response))
    }

    fn respond_map(&self, request: &Request) -> crate::error::Result<Outcome> {
        let response = match self.lookup_for_base_url_path(request.base_url_path())? {
            Some(rendered) => Response::ok(L::MAP_CONTENT_TYPE, rendered.source_map.as_bytes()),
            None => Response::not_found(),
        };
        Ok(Outcome::Respond(response))
    }

    fn respond_source(&self, basename: &str) -> Outcome {
        match self.source(basename) {
            Some(text) => Outcome::Respond(Response::ok(L::CONTENT_TYPE, text.as_bytes())),
            None => Outcome::Next,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::http::{Body, Request, Response, Router};
    use crate::packager::compressor::{CssCompressor, JsCompressor};
    use crate::utils::mime::types;
    use std::fs;
    use tempfile::TempDir;

    fn body(res: &Response) -> String {
        match res.body() {
            Body::Bytes(b) => String::from_utf8(b.to_vec()).unwrap(),
            _ => String::new(),
        }
    }

    fn setup() -> (TempDir, JsCompressor, Router) {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.js"), "var alpha = 'A';\n").unwrap();
        fs::write(dir.path().join("b.js"), "var beta = 'B';\n").unwrap();

        let c = JsCompressor::new("/resources/app/js/client.js", false);
        c.add_files_in_path(dir.path(), "", false).unwrap();
        c.compress().unwrap();

        let mut router = Router::new();
        c.setup_routes(&mut router);
        (dir, c, router)
    }

    #[test]
    fn test_output_contains_fragments_in_order() {
        let (_dir, _c, router) = setup();
        let res = router.dispatch(&Request::get("/resources/app/js/client.js"));
        assert_eq!(res.status(), 200);
        assert_eq!(res.header("Content-Type"), Some(types::JAVASCRIPT));
        assert_eq!(res.header("Cache-Control"), None);
        assert_eq!(
            res.header("X-SourceMap"),
            Some("/resources/app/js/client.map")
        );
        let code = body(&res);
        assert!(code.find("alpha").unwrap() < code.find("beta").unwrap());
    }

    #[test]
    fn test_revision_handling() {
        let (_dir, c, router) = setup();
        let hash = c.hash().unwrap();

        let url = format!("/resources/app/js/client.js?r={}", hash.to_uppercase());
        let res = router.dispatch(&Request::get(&url).with_base_url_path("/shop"));
        assert_eq!(res.status(), 200);
        assert_eq!(res.header("Cache-Control"), Some("public, max-age=31536000"));
        assert_eq!(
            res.header("X-SourceMap"),
            Some("/shop/resources/app/js/client.map")
        );

        let res = router.dispatch(
            &Request::get("/resources/app/js/client.js?r=stale").with_base_url_path("/shop"),
        );
        assert_eq!(res.status(), 302);
        assert_eq!(res.header("Location"), Some("/shop/resources/app/js/client.js"));
    }

    #[test]
    fn test_map_and_sources() {
        let (_dir, _c, router) = setup();

        let res = router.dispatch(&Request::get("/resources/app/js/client.map").with_base_url_path("/shop"));
        assert_eq!(res.header("Content-Type"), Some(types::OCTET_STREAM));
        assert!(body(&res).contains("/shop/resources/app/js/src/"));

        let res = router.dispatch(&Request::get("/resources/app/js/src/A.js"));
        assert_eq!(res.status(), 200);
        assert_eq!(body(&res), "var alpha = 'A';\n");

        let res = router.dispatch(&Request::get("/resources/app/js/src/missing.js"));
        assert_eq!(res.status(), 404);
    }

    #[test]
    fn test_uncompiled_output_is_not_found() {
        let c = JsCompressor::new("/r/client.js", false);
        let mut router = Router::new();
        c.setup_routes(&mut router);
        assert_eq!(router.dispatch(&Request::get("/r/client.js")).status(), 404);
        assert_eq!(router.dispatch(&Request::get("/r/client.map")).status(), 404);
    }

    #[test]
    fn test_css_content_types() {
        let c = CssCompressor::new("/resources/app/css/client.css", false);
        c.add_content("a { color: red; }", "", "a.css").unwrap();
        c.compress().unwrap();
        let mut router = Router::new();
        c.setup_routes(&mut router);

        let res = router.dispatch(&Request::get("/resources/app/css/client.css"));
        assert_eq!(res.header("Content-Type"), Some(types::CSS));
        assert_eq!(res.header("X-SourceMap"), Some("/resources/app/css/client.map"));

        let res = router.dispatch(&Request::get("/resources/app/css/client.map"));
        assert_eq!(res.header("Content-Type"), Some(types::JAVASCRIPT));

        let res = router.dispatch(&Request::get("/resources/app/css/src/a.css"));
        assert_eq!(body(&res), "a { color: red; }");
    }
}
