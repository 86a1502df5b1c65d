//! Asset packaging: compressors, static indexes, packages and the
//! descriptors and modules they are built from.

pub mod compressor;
pub mod descriptor;
mod fragment;
pub mod module;
mod package;
pub mod static_index;
mod webpacker;

pub use compressor::{CssCompressor, JsCompressor};
pub use descriptor::{Declaration, PackageDescriptor, PackageDescriptorBuilder, TemplateBundle};
pub use fragment::{Fix, SourceFragment};
pub use module::{Module, ModuleSpec, Modules};
pub use package::AssetPackage;
pub use static_index::{CacheOptions, StaticResourceIndex};
pub use webpacker::Webpacker;
