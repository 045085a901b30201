//! Parsing of slash-delimited model paths such as `teams[0]/players[1]`.

/// One step of a path: an optional key followed by array selectors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    /// Key to descend into; empty when the segment is only selectors (`[0]`).
    pub key: String,
    /// Array indices applied left to right after the key.
    pub indices: Vec<usize>,
}

/// Splits `path` into segments.
///
/// Empty segments are ignored, so `""` and `"/"` denote the root. A segment
/// whose brackets don't hold plain indices is taken literally as a key.
///
/// # Examples
///
/// ```
/// use cachet::path::{parse, Segment};
///
/// let segments = parse("matches[0]/lineups[1][0]");
/// assert_eq!(segments[0], Segment { key: "matches".into(), indices: vec![0] });
/// assert_eq!(segments[1], Segment { key: "lineups".into(), indices: vec![1, 0] });
/// ```
pub fn parse(path: &str) -> Vec<Segment> {
    path.split('/')
        .filter(|component| !component.is_empty())
        .map(parse_segment)
        .collect()
}

fn parse_segment(component: &str) -> Segment {
    let literal = || Segment {
        key: component.to_string(),
        indices: Vec::new(),
    };

    if !component.ends_with(']') {
        return literal();
    }
    let Some(open) = component.find('[') else {
        return literal();
    };

    let mut indices = Vec::new();
    let mut rest = &component[open..];
    while !rest.is_empty() {
        let Some(inner) = rest.strip_prefix('[') else {
            return literal();
        };
        let Some(close) = inner.find(']') else {
            return literal();
        };
        match inner[..close].parse::<usize>() {
            Ok(index) => indices.push(index),
            Err(_) => return literal(),
        }
        rest = &inner[close + 1..];
    }

    Segment {
        key: component[..open].to_string(),
        indices,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment(key: &str, indices: &[usize]) -> Segment {
        Segment {
            key: key.to_string(),
            indices: indices.to_vec(),
        }
    }

    #[test]
    fn test_plain_keys() {
        assert_eq!(
            parse("json/data"),
            vec![segment("json", &[]), segment("data", &[])]
        );
    }

    #[test]
    fn test_root_paths() {
        assert!(parse("").is_empty());
        assert!(parse("/").is_empty());
        assert_eq!(parse("/a//b/"), vec![segment("a", &[]), segment("b", &[])]);
    }

    #[test]
    fn test_array_selectors() {
        assert_eq!(
            parse("teams[0]/players[1]"),
            vec![segment("teams", &[0]), segment("players", &[1])]
        );
        assert_eq!(parse("lineups[1][0]"), vec![segment("lineups", &[1, 0])]);
        assert_eq!(parse("[2]"), vec![segment("", &[2])]);
    }

    #[test]
    fn test_non_numeric_brackets_are_literal() {
        assert_eq!(parse("key[abc]"), vec![segment("key[abc]", &[])]);
        assert_eq!(parse("key[0]x]"), vec![segment("key[0]x]", &[])]);
        assert_eq!(parse("key[-1]"), vec![segment("key[-1]", &[])]);
    }
}
