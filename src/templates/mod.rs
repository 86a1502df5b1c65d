//! Server-side templates and client template packing.

mod packer;
mod renderer;

pub use packer::{AddFileOptions, FailurePolicy, FileProcessor, PackedTemplate, Processed, TemplatePacker};
pub use renderer::{HANDLEBARS, HandlebarsRenderer, RenderError, Renderer, Renderers};
