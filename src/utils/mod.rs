//! Shared helpers for the packager and the HTTP layer.

pub mod hash;
pub mod mime;
pub mod path;
pub mod walk;
