/// Separator between segments of a configuration path.
pub const KEY_DELIMITER: &str = ":";

const WILDCARD: &str = "*";

/// Joins path segments with [`KEY_DELIMITER`].
pub fn combine<I, S>(segments: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut path = String::new();
    for (i, segment) in segments.into_iter().enumerate() {
        if i > 0 {
            path.push_str(KEY_DELIMITER);
        }
        path.push_str(segment.as_ref());
    }
    path
}

/// Path with its last segment removed; `""` for a single-segment path.
pub fn parent_path(path: &str) -> &str {
    match path.rfind(KEY_DELIMITER) {
        Some(index) => &path[..index],
        None => "",
    }
}

/// Checks if a configuration path matches a given pattern.
///
/// Segments are compared case-insensitively and `*` matches any single
/// segment. A bare `*` matches every path.
///
/// # Examples
/// * `"Db:Provider"` matches `"db:provider"`
/// * `"Db:Provider"` matches `"Db:*"`
/// * `"Users:0"` matches `"*:0"`
pub fn path_matches(path: &str, pattern: &str) -> bool {
    if pattern == WILDCARD {
        return true;
    }

    let path_parts: Vec<&str> = path.split(KEY_DELIMITER).collect();
    let pattern_parts: Vec<&str> = pattern.split(KEY_DELIMITER).collect();

    if path_parts.len() != pattern_parts.len() {
        return false;
    }

    path_parts
        .iter()
        .zip(pattern_parts.iter())
        .all(|(path_part, pattern_part)| {
            *pattern_part == WILDCARD || segments_equal(path_part, pattern_part)
        })
}

pub(crate) fn segments_equal(left: &str, right: &str) -> bool {
    left.chars()
        .flat_map(char::to_lowercase)
        .eq(right.chars().flat_map(char::to_lowercase))
}
