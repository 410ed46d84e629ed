//! Environment file entries (`KEY=VALUE` per line)

use std::fmt;

use itertools::Itertools;

/// Ordered map of environment variables.
///
/// Keys are unique; insertion order is kept so that rewriting a file
/// preserves the position of existing keys and appends new ones.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvMap {
    entries: Vec<(String, String)>,
}

impl EnvMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `KEY=VALUE` entries.
    ///
    /// Only the first `=` splits; the key is trimmed and entries with an
    /// empty key are dropped. The value is kept verbatim and may be empty.
    pub fn parse<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut map = Self::new();
        for entry in entries {
            if let Some((key, value)) = parse_entry(entry.as_ref()) {
                map.insert(key, value);
            }
        }
        map
    }

    /// Insert or overwrite; an existing key keeps its position.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => Some(std::mem::replace(existing, value)),
            None => {
                self.entries.push((key, value));
                None
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Overlay `other` onto this map; `other` wins on key collision.
    pub fn merge(&mut self, other: EnvMap) {
        for (key, value) in other.entries {
            self.insert(key, value);
        }
    }

    pub fn merged(mut self, other: EnvMap) -> Self {
        self.merge(other);
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// File content: one `KEY=VALUE` per line with a trailing newline.
    pub fn render(&self) -> String {
        let body = self
            .entries
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .join("\n");
        format!("{body}\n")
    }
}

impl fmt::Display for EnvMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

impl<K, V> FromIterator<(K, V)> for EnvMap
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut map = Self::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

/// Split a single entry on its first `=`.
///
/// An entry without `=` is a key with an empty value.
pub fn parse_entry(entry: &str) -> Option<(String, String)> {
    let (key, value) = entry.split_once('=').unwrap_or((entry, ""));
    let key = key.trim();
    if key.is_empty() {
        return None;
    }
    Some((key.to_string(), value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_value_with_equals_when_parsing_then_only_first_splits() {
        assert_eq!(
            parse_entry("KEY=A=B"),
            Some(("KEY".to_string(), "A=B".to_string()))
        );
    }

    #[test]
    fn given_empty_key_when_parsing_then_entry_dropped() {
        let map = EnvMap::parse(["=value", "  =x", ""]);

        assert!(map.is_empty());
    }

    #[test]
    fn given_empty_value_when_parsing_then_kept() {
        let map = EnvMap::parse(["EMPTY="]);

        assert_eq!(map.get("EMPTY"), Some(""));
    }

    #[test]
    fn given_padded_key_when_parsing_then_key_trimmed_value_verbatim() {
        let map = EnvMap::parse([" KEY = spaced "]);

        assert_eq!(map.get("KEY"), Some(" spaced "));
    }

    #[test]
    fn given_entry_without_equals_when_parsing_then_empty_value() {
        assert_eq!(parse_entry("FLAG"), Some(("FLAG".to_string(), String::new())));
    }

    #[test]
    fn given_duplicate_keys_when_parsing_then_last_wins_at_first_position() {
        let map = EnvMap::parse(["A=1", "B=2", "A=3"]);

        assert_eq!(map.keys().collect::<Vec<_>>(), vec!["A", "B"]);
        assert_eq!(map.get("A"), Some("3"));
    }

    #[test]
    fn given_existing_and_new_when_merging_then_order_kept_and_new_appended() {
        let current = EnvMap::parse(["A=1", "B=2"]);

        let merged = current.merged(EnvMap::parse(["B=3", "C=4"]));

        assert_eq!(merged.render(), "A=1\nB=3\nC=4\n");
    }

    #[test]
    fn given_empty_map_when_rendering_then_single_newline() {
        assert_eq!(EnvMap::new().render(), "\n");
    }

    #[test]
    fn given_rendered_map_when_reparsed_by_lines_then_identical() {
        let map: EnvMap = [("A", "1"), ("B", "x=y"), ("C", "")].into_iter().collect();

        let reparsed = EnvMap::parse(map.render().split('\n'));

        assert_eq!(reparsed, map);
    }
}
