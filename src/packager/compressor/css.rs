//! CSS fragments through lightningcss.

use super::{Dialect, Minified};
use crate::error::{PackError, Result};
use crate::utils::mime::types;
use lightningcss::stylesheet::{ParserOptions, PrinterOptions, StyleSheet};

pub struct Css;

impl Dialect for Css {
    const KIND: &'static str = "css";
    const EXTENSION: &'static str = ".css";
    const CONTENT_TYPE: &'static str = types::CSS;
    // Served as javascript, matching what existing clients expect.
    const MAP_CONTENT_TYPE: &'static str = types::JAVASCRIPT;

    fn minify(source: &str, basename: &str, debug: bool) -> Result<Minified> {
        let parse_error = |message: String| PackError::Parse {
            kind: Self::KIND,
            basename: basename.to_string(),
            message,
        };

        let options = ParserOptions {
            filename: basename.to_string(),
            ..ParserOptions::default()
        };
        let stylesheet = StyleSheet::parse(source, options).map_err(|e| parse_error(e.to_string()))?;
        let result = stylesheet
            .to_css(PrinterOptions {
                minify: !debug,
                ..PrinterOptions::default()
            })
            .map_err(|e| parse_error(e.to_string()))?;

        Ok(Minified {
            code: result.code.trim_end().to_string(),
            map: None,
        })
    }
}
