//! URL-ish path joining helpers.
//!
//! These operate on `/`-separated logical names (fragment basenames,
//! package URLs), never on filesystem paths.

/// Join `addition` under `root` with exactly one `/` between them.
///
/// A leading `/` on `addition` is dropped; an empty root yields the
/// addition unchanged.
pub fn safe_add_path(root: &str, addition: &str) -> String {
    let addition = addition.strip_prefix('/').unwrap_or(addition);
    if root.is_empty() {
        return addition.to_string();
    }
    if root.ends_with('/') {
        format!("{root}{addition}")
    } else {
        format!("{root}/{addition}")
    }
}

/// Ensure `path` ends with a `/`.
pub fn with_trailing_slash(path: &str) -> String {
    if path.ends_with('/') {
        path.to_string()
    } else {
        format!("{path}/")
    }
}

/// Ensure `path` starts with a `/` (empty stays empty).
pub fn with_leading_slash(path: &str) -> String {
    if path.is_empty() || path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    }
}

/// Reduce a package or app reference to a URL-safe segment.
///
/// Lowercases, maps the first `_` to `-` and drops anything outside
/// `[a-z0-9-]`, so later underscores vanish.
pub fn safe_reference(reference: &str) -> String {
    reference
        .to_lowercase()
        .replacen('_', "-", 1)
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-')
        .collect()
}

/// Split a URL path into `(directory, file name)` at the last `/`.
pub fn split_file_name(url_path: &str) -> (&str, &str) {
    match url_path.rfind('/') {
        Some(idx) => (&url_path[..idx], &url_path[idx + 1..]),
        None => ("", url_path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_add_path() {
        assert_eq!(safe_add_path("", "a.js"), "a.js");
        assert_eq!(safe_add_path("lib", "a.js"), "lib/a.js");
        assert_eq!(safe_add_path("lib/", "/a.js"), "lib/a.js");
        assert_eq!(safe_add_path("lib", "sub/"), "lib/sub/");
    }

    #[test]
    fn test_safe_reference() {
        assert_eq!(safe_reference("My_App"), "my-app");
        assert_eq!(safe_reference("shop/cart v2"), "shopcartv2");
        assert_eq!(safe_reference("a_b_c"), "a-bc");
    }

    #[test]
    fn test_split_file_name() {
        assert_eq!(
            split_file_name("/resources/app/js/client.js"),
            ("/resources/app/js", "client.js")
        );
        assert_eq!(split_file_name("client.js"), ("", "client.js"));
    }

    #[test]
    fn test_slashes() {
        assert_eq!(with_trailing_slash("/a"), "/a/");
        assert_eq!(with_trailing_slash("/a/"), "/a/");
        assert_eq!(with_leading_slash("a/b"), "/a/b");
        assert_eq!(with_leading_slash(""), "");
    }
}
