//! JavaScript fragments through oxc.
//!
//! Fragments are parsed as classic scripts sharing the page's global scope,
//! so top-level declarations survive even when only a later fragment (or the
//! page) uses them. Identifiers are never mangled. Debug builds run the same
//! passes and print readable output.

use super::sourcemap::parse_map;
use super::{Dialect, Minified};
use crate::error::{PackError, Result};
use crate::utils::mime::types;
use oxc::allocator::Allocator;
use oxc::codegen::{Codegen, CodegenOptions, CommentOptions};
use oxc::minifier::{CompressOptions, CompressOptionsUnused, Minifier, MinifierOptions};
use oxc::parser::Parser;
use oxc::span::SourceType;
use std::path::PathBuf;

pub struct Js;

impl Dialect for Js {
    const KIND: &'static str = "js";
    const EXTENSION: &'static str = ".js";
    const CONTENT_TYPE: &'static str = types::JAVASCRIPT;
    const MAP_CONTENT_TYPE: &'static str = types::OCTET_STREAM;

    fn minify(source: &str, basename: &str, debug: bool) -> Result<Minified> {
        let allocator = Allocator::default();
        let source_type = SourceType::script();

        let ret = Parser::new(&allocator, source, source_type).parse();
        if !ret.errors.is_empty() {
            let message = ret
                .errors
                .iter()
                .map(|e| e.to_string())
                .collect::<Vec<_>>()
                .join("; ");
            return Err(PackError::Parse {
                kind: Self::KIND,
                basename: basename.to_string(),
                message,
            });
        }
        let mut program = ret.program;

        let codegen_options = CodegenOptions {
            minify: !debug,
            comments: if debug {
                CommentOptions::default()
            } else {
                CommentOptions::disabled()
            },
            source_map_path: Some(PathBuf::from(basename)),
            ..CodegenOptions::default()
        };

        let options = MinifierOptions {
            mangle: None,
            compress: Some(compress_options()),
        };
        let ret = Minifier::new(options).minify(&allocator, &mut program);
        let output = Codegen::new()
            .with_options(codegen_options)
            .with_scoping(ret.scoping)
            .build(&program);

        let map = output
            .map
            .map(|m| parse_map(&m.to_json_string()))
            .transpose()?;

        Ok(Minified {
            code: terminate(output.code),
            map,
        })
    }
}

/// Unused bindings are kept at every level.
fn compress_options() -> CompressOptions {
    CompressOptions {
        unused: CompressOptionsUnused::Keep,
        ..CompressOptions::smallest()
    }
}

/// Trim trailing whitespace and make sure a non-empty fragment ends its last
/// statement, so the next fragment can't continue it.
fn terminate(code: String) -> String {
    let mut code = code.trim_end().to_string();
    if !code.is_empty() && !code.ends_with(';') {
        code.push(';');
    }
    code
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minify_keeps_global_names() {
        let out = Js::minify(
            "function greet(name) {\n  return 'hi ' + name;\n}\nvar answer = 40 + 2;\n",
            "a.js",
            false,
        )
        .unwrap();
        assert!(out.code.contains("greet"));
        assert!(out.code.contains("answer"));
        assert!(!out.code.contains('\n'));
        assert!(out.code.ends_with(';'));
        let map = out.map.unwrap();
        assert!(map.get_token_count() > 0);
    }

    #[test]
    fn test_top_level_declarations_survive_for_later_fragments() {
        let out = Js::minify("function helper(){return 41;}\nvar unusedTop=5;", "a.js", false).unwrap();
        assert!(out.code.contains("function helper"));
        assert!(out.code.contains("unusedTop"));

        let out = Js::minify("var x = helper()+1;", "b.js", false).unwrap();
        assert!(out.code.contains("var x"));
        assert!(out.code.contains("helper()"));
    }

    #[test]
    fn test_debug_output_is_readable() {
        let out = Js::minify("function unused() {}\nvar a = 1;\nif (a) { a = 2; }", "a.js", true).unwrap();
        assert!(out.code.contains('\n'));
        assert!(out.code.contains("var a = 1"));
        assert!(out.code.contains("function unused"));
    }

    #[test]
    fn test_parse_error_names_fragment() {
        let err = Js::minify("var = ;", "lib/broken.js", false).unwrap_err();
        match err {
            PackError::Parse { kind, basename, .. } => {
                assert_eq!(kind, "js");
                assert_eq!(basename, "lib/broken.js");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_terminate() {
        assert_eq!(terminate("a()\n".to_string()), "a();");
        assert_eq!(terminate("a();".to_string()), "a();");
        assert_eq!(terminate("  \n".to_string()), "");
    }
}
