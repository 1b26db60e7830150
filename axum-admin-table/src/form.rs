//! Submitted form values

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// URL of the page to return to after submission
pub const PREVIOUS_KEY: &str = "__admin_previous_";
/// HTTP method override
pub const METHOD_KEY: &str = "__admin_method_";
/// CSRF token
pub const TOKEN_KEY: &str = "__admin_t_";
/// `1` on create, `0` on update
pub const POST_TYPE_KEY: &str = "__admin_post_type";
/// Set when only some fields of a record are submitted
pub const SINGLE_UPDATE_KEY: &str = "__admin_is_single_update";

/// Keys that never reach the database
pub const BOOKKEEPING_KEYS: [&str; 3] = [PREVIOUS_KEY, METHOD_KEY, TOKEN_KEY];

/// Suffix of keys carrying several values of a multi-select
pub const MULTI_SUFFIX: &str = "[]";

/// Kind of write a submission performs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostKind {
    Create,
    Update,
}

impl PostKind {
    fn marker(self) -> &'static str {
        match self {
            PostKind::Create => "1",
            PostKind::Update => "0",
        }
    }
}

/// Ordered multi-map of submitted form values
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Values(BTreeMap<String, Vec<String>>);

impl Values {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collect urlencoded pairs, repeated keys accumulating their values
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut values = Self::new();
        for (key, value) in pairs {
            values.append(key, value);
        }
        values
    }

    /// Replace the values of `key` with a single value
    pub fn add(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), vec![value.into()]);
    }

    pub fn append(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.entry(key.into()).or_default().push(value.into());
    }

    /// First value of `key`, empty when absent
    pub fn get(&self, key: &str) -> &str {
        self.0
            .get(key)
            .and_then(|values| values.first())
            .map(String::as_str)
            .unwrap_or_default()
    }

    pub fn get_all(&self, key: &str) -> Option<&[String]> {
        self.0.get(key).map(Vec::as_slice)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn delete(&mut self, key: &str) -> Option<Vec<String>> {
        self.0.remove(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<String>)> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn set_post_kind(&mut self, kind: PostKind) {
        self.add(POST_TYPE_KEY, kind.marker());
    }

    pub fn post_kind(&self) -> Option<PostKind> {
        match self.get(POST_TYPE_KEY) {
            "1" => Some(PostKind::Create),
            "0" => Some(PostKind::Update),
            _ => None,
        }
    }

    pub fn is_insert_post(&self) -> bool {
        self.post_kind() == Some(PostKind::Create)
    }

    pub fn is_update_post(&self) -> bool {
        self.post_kind() == Some(PostKind::Update)
    }

    pub fn is_single_update_post(&self) -> bool {
        self.get(SINGLE_UPDATE_KEY) == "1"
    }

    /// Drop the post-type and single-update markers
    pub fn remove_remark(mut self) -> Self {
        self.0.remove(POST_TYPE_KEY);
        self.0.remove(SINGLE_UPDATE_KEY);
        self
    }
}

impl FromIterator<(String, Vec<String>)> for Values {
    fn from_iter<T: IntoIterator<Item = (String, Vec<String>)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for Values {
    type Item = (String, Vec<String>);
    type IntoIter = std::collections::btree_map::IntoIter<String, Vec<String>>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_replaces_and_append_accumulates() {
        let mut values = Values::new();
        values.append("tags[]", "a");
        values.append("tags[]", "b");
        values.add("name", "x");
        values.add("name", "y");

        assert_eq!(values.get_all("tags[]").unwrap(), ["a", "b"]);
        assert_eq!(values.get("name"), "y");
        assert_eq!(values.get("missing"), "");
    }

    #[test]
    fn test_post_markers() {
        let mut values = Values::from_pairs([("name", "x"), (SINGLE_UPDATE_KEY, "1")]);
        values.set_post_kind(PostKind::Create);
        assert!(values.is_insert_post());
        assert!(values.is_single_update_post());

        let values = values.remove_remark();
        assert_eq!(values.post_kind(), None);
        assert!(!values.is_single_update_post());
        assert_eq!(values.get("name"), "x");
    }

    #[test]
    fn test_update_marker() {
        let mut values = Values::from_pairs([("id", "3")]);
        assert!(!values.is_update_post());
        assert!(!values.is_insert_post());

        values.set_post_kind(PostKind::Update);
        assert!(values.is_update_post());
        assert!(!values.is_insert_post());
        assert_eq!(values.get(POST_TYPE_KEY), "0");
    }
}
