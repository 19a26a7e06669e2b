//! Tag extraction utilities for chat events
//!
//! Tags are kept as plain string sequences (`["g", "abc"]`), so these helpers
//! work on slices rather than on `nostr_sdk::Tag`.

/// Extract a single string value from a tag by name.
/// Returns the first occurrence if multiple tags exist.
pub fn extract_tag_str<'a>(tags: &'a [Vec<String>], tag_name: &str) -> Option<&'a str> {
    tags.iter()
        .find(|tag| tag.first().map(String::as_str) == Some(tag_name))
        .and_then(|tag| tag.get(1))
        .map(String::as_str)
}

/// Extract all values for a given tag name.
pub fn extract_all_tag_values<'a>(tags: &'a [Vec<String>], tag_name: &str) -> Vec<&'a str> {
    tags.iter()
        .filter(|tag| tag.first().map(String::as_str) == Some(tag_name))
        .filter_map(|tag| tag.get(1))
        .map(String::as_str)
        .collect()
}

/// Check if any tag `[tag_name, value, ..]` exists.
pub fn has_tag_value(tags: &[Vec<String>], tag_name: &str, value: &str) -> bool {
    extract_all_tag_values(tags, tag_name).contains(&value)
}

/// Build a two-element tag.
pub fn tag(name: &str, value: &str) -> Vec<String> {
    vec![name.to_string(), value.to_string()]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<Vec<String>> {
        vec![
            tag("g", "abc"),
            tag("t", "teleport"),
            tag("t", "other"),
            vec!["n".to_string()],
        ]
    }

    #[test]
    fn test_extract_tag_str() {
        let tags = sample();
        assert_eq!(extract_tag_str(&tags, "g"), Some("abc"));
        assert_eq!(extract_tag_str(&tags, "t"), Some("teleport"));
        assert_eq!(extract_tag_str(&tags, "n"), None);
        assert_eq!(extract_tag_str(&tags, "missing"), None);
    }

    #[test]
    fn test_extract_all_tag_values() {
        let tags = sample();
        assert_eq!(extract_all_tag_values(&tags, "t"), vec!["teleport", "other"]);
    }

    #[test]
    fn test_has_tag_value() {
        let tags = sample();
        assert!(has_tag_value(&tags, "t", "other"));
        assert!(!has_tag_value(&tags, "g", "abd"));
    }
}
