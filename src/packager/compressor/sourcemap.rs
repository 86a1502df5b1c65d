//! Merged source maps for concatenated fragments.
//!
//! Each fragment keeps its own minifier map (or none) plus the output line
//! it starts on. A map is rendered on demand for a given `sourceRoot`, since
//! the source URLs depend on the base URL path the client used.

use crate::error::{PackError, Result};
use sourcemap::{SourceMap, SourceMapBuilder};

pub(crate) struct FragmentMap {
    pub basename: String,
    pub line_offset: u32,
    pub lines: u32,
    pub map: Option<SourceMap>,
}

pub(crate) struct MapParts {
    file: String,
    parts: Vec<FragmentMap>,
}

impl MapParts {
    pub fn new(file: &str) -> Self {
        Self {
            file: file.to_string(),
            parts: Vec::new(),
        }
    }

    pub fn push(&mut self, part: FragmentMap) {
        self.parts.push(part);
    }

    /// Serialize the merged map with `source_root` as its `sourceRoot`.
    pub fn render(&self, source_root: &str) -> Result<String> {
        let mut builder = SourceMapBuilder::new(Some(self.file.as_str()));
        builder.set_source_root(Some(source_root));

        for part in &self.parts {
            let src_id = builder.add_source(&part.basename);
            match &part.map {
                Some(map) => {
                    let names: Vec<u32> = map.names().map(|n| builder.add_name(n)).collect();
                    for token in map.tokens() {
                        let name_id = names.get(token.get_name_id() as usize).copied();
                        builder.add_raw(
                            token.get_dst_line() + part.line_offset,
                            token.get_dst_col(),
                            token.get_src_line(),
                            token.get_src_col(),
                            Some(src_id),
                            name_id,
                            false,
                        );
                    }
                }
                // Line-level: every output line points at the fragment start.
                None => {
                    for line in 0..part.lines {
                        builder.add_raw(part.line_offset + line, 0, 0, 0, Some(src_id), None, false);
                    }
                }
            }
        }

        let mut out = Vec::new();
        builder
            .into_sourcemap()
            .to_writer(&mut out)
            .map_err(|e| PackError::SourceMap(e.to_string()))?;
        String::from_utf8(out).map_err(|e| PackError::SourceMap(e.to_string()))
    }
}

/// Parse a minifier's JSON map.
pub(crate) fn parse_map(json: &str) -> Result<SourceMap> {
    SourceMap::from_slice(json.as_bytes()).map_err(|e| PackError::SourceMap(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_line_level_parts() {
        let mut parts = MapParts::new("client.css");
        parts.push(FragmentMap {
            basename: "a.css".to_string(),
            line_offset: 0,
            lines: 1,
            map: None,
        });
        parts.push(FragmentMap {
            basename: "lib/b.css".to_string(),
            line_offset: 1,
            lines: 2,
            map: None,
        });

        let json = parts.render("/shop/resources/app/css/src/").unwrap();
        let map = SourceMap::from_slice(json.as_bytes()).unwrap();
        assert_eq!(map.get_source_root(), Some("/shop/resources/app/css/src/"));
        assert_eq!(map.get_file(), Some("client.css"));

        let token = map.lookup_token(2, 0).unwrap();
        assert_eq!(token.get_src_id(), 1);
        assert_eq!(map.get_token_count(), 3);
    }
}
