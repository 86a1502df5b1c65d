//! Build script for minifying the embedded client scripts.

use oxc::allocator::Allocator;
use oxc::codegen::{Codegen, CodegenOptions, CommentOptions};
use oxc::mangler::MangleOptions;
use oxc::minifier::{CompressOptions, Minifier, MinifierOptions};
use oxc::parser::Parser;
use oxc::span::SourceType;
use std::fs;
use std::path::Path;

fn main() {
    let out_dir = std::env::var("OUT_DIR").unwrap();
    let out_path = Path::new(&out_dir);

    minify_js_file(
        "src/embed/client/template-lookup.js",
        &out_path.join("template-lookup.min.js"),
    );
    minify_js_file(
        "src/embed/client/loader-setup.js",
        &out_path.join("loader-setup.min.js"),
    );

    println!("cargo:rerun-if-changed=src/embed/client/template-lookup.js");
    println!("cargo:rerun-if-changed=src/embed/client/loader-setup.js");
}

fn minify_js(source: &str) -> String {
    let allocator = Allocator::default();
    // Scripts, not modules: both files rely on the global AMD loader.
    let source_type = SourceType::script();

    let ret = Parser::new(&allocator, source, source_type).parse();
    assert!(ret.errors.is_empty(), "Parse errors: {:?}", ret.errors);

    let mut program = ret.program;
    let options = MinifierOptions {
        mangle: Some(MangleOptions::default()),
        compress: Some(CompressOptions::smallest()),
    };
    let ret = Minifier::new(options).minify(&allocator, &mut program);

    Codegen::new()
        .with_options(CodegenOptions {
            minify: true,
            comments: CommentOptions::disabled(),
            ..CodegenOptions::default()
        })
        .with_scoping(ret.scoping)
        .build(&program)
        .code
}

fn minify_js_file(input: &str, output: &Path) {
    let source = fs::read_to_string(input).expect("Failed to read JS file");
    let code = minify_js(&source);
    fs::write(output, code).expect("Failed to write minified JS");
}
