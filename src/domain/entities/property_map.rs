use regex::Regex;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Flat `key=value` properties, as found in a deployment properties file.
///
/// Keys and values are always non-empty and trimmed. Lines are split on the
/// first `=` only, so values may contain `=` themselves.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropertyMap {
    entries: BTreeMap<String, String>,
}

impl PropertyMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parse(text: &str) -> Self {
        Self::from_lines(text.lines())
    }

    pub(crate) fn from_lines<'a>(lines: impl IntoIterator<Item = &'a str>) -> Self {
        let mut map = Self::new();
        for line in lines {
            if let Some((key, value)) = parse_line(line) {
                map.entries.insert(key.to_string(), value.to_string());
            }
        }
        map
    }

    /// Stores a pair after trimming. Returns `false` if either side is empty.
    pub fn insert(&mut self, key: impl AsRef<str>, value: impl AsRef<str>) -> bool {
        let key = key.as_ref().trim();
        let value = value.as_ref().trim();
        if key.is_empty() || value.is_empty() {
            return false;
        }
        self.entries.insert(key.to_string(), value.to_string());
        true
    }

    /// Regex key lookup.
    ///
    /// A single match is returned as is. Several matches resolve to the key
    /// that equals `pattern` literally, or to nothing when none does. An
    /// invalid pattern behaves like a miss.
    pub fn find_key(&self, pattern: &str) -> Option<&str> {
        let regex = match Regex::new(pattern) {
            Ok(regex) => regex,
            Err(e) => {
                warn!("Invalid property key pattern {:?}: {}", pattern, e);
                return None;
            }
        };

        let matches: Vec<&str> = self
            .entries
            .keys()
            .map(String::as_str)
            .filter(|key| regex.is_match(key))
            .collect();

        match matches.as_slice() {
            [] => {
                debug!("No property key matches {:?}", pattern);
                None
            }
            [only] => Some(*only),
            several => {
                let exact = several.iter().copied().find(|key| *key == pattern);
                if exact.is_none() {
                    debug!(
                        "Property key pattern {:?} is ambiguous: {}",
                        pattern,
                        several.join(", ")
                    );
                }
                exact
            }
        }
    }

    /// Value of the key selected by [`PropertyMap::find_key`].
    pub fn get(&self, key_or_pattern: &str) -> Option<&str> {
        let key = self.find_key(key_or_pattern)?;
        self.get_exact(key)
    }

    pub fn get_exact(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: AsRef<str>, V: AsRef<str>> FromIterator<(K, V)> for PropertyMap {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut map = Self::new();
        for (key, value) in iter {
            map.insert(key, value);
        }
        map
    }
}

fn parse_line(line: &str) -> Option<(&str, &str)> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    let (key, value) = line.split_once('=')?;
    let (key, value) = (key.trim(), value.trim());
    if key.is_empty() || value.is_empty() {
        return None;
    }
    Some((key, value))
}
