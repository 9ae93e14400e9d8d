//! Authorization rule catalog
//!
//! Protected path pattern -> required authority strings, in insertion order.
//! For verb+path subjects the required set is ignored; the entry only marks
//! the path as protected.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::domain::service::path_matcher::PathMatcher;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Catalog {
    rules: IndexMap<String, Vec<String>>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a rule; re-inserting a pattern replaces its authorities in place
    pub fn insert<I, S>(&mut self, pattern: impl Into<String>, authorities: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.rules
            .insert(pattern.into(), authorities.into_iter().map(Into::into).collect());
    }

    pub fn with_rule<I, S>(mut self, pattern: impl Into<String>, authorities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.insert(pattern, authorities);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.rules.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// First rule whose pattern matches `path`; later rules are never consulted
    pub fn first_match<'a>(
        &'a self,
        matcher: &PathMatcher,
        path: &str,
    ) -> Option<(&'a str, &'a [String])> {
        self.iter().find(|(pattern, _)| matcher.matches(pattern, path))
    }
}

impl<K, V> FromIterator<(K, V)> for Catalog
where
    K: Into<String>,
    V: IntoIterator,
    V::Item: Into<String>,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut catalog = Catalog::new();
        for (pattern, authorities) in iter {
            catalog.insert(pattern, authorities);
        }
        catalog
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_match_in_insertion_order() {
        let catalog = Catalog::new()
            .with_rule("/pet/cat", ["admin", "user"])
            .with_rule("/pet/**", ["catSave"])
            .with_rule("/pet/cat/*", ["guest"]);
        let matcher = PathMatcher::new();

        let (pattern, required) = catalog.first_match(&matcher, "/pet/cat/save").unwrap();
        assert_eq!(pattern, "/pet/**");
        assert_eq!(required, ["catSave".to_string()]);

        assert!(catalog.first_match(&matcher, "/store/order").is_none());
    }

    #[test]
    fn test_json_object_preserves_order() {
        let catalog: Catalog =
            serde_json::from_str(r#"{"/b/**":["x"],"/a/**":["y"]}"#).unwrap();
        let patterns: Vec<&str> = catalog.iter().map(|(p, _)| p).collect();
        assert_eq!(patterns, ["/b/**", "/a/**"]);
    }
}
