//! Key model.
//!
//! | family            | key                          | type |
//! |-------------------|------------------------------|------|
//! | asset record      | `{prefix}:metadata:{id}`     | hash |
//! | category index    | `{prefix}:category:{cat}`    | set  |
//! | global summary    | `{prefix}:index`             | hash |
//! | sync state        | `{prefix}:sync:state`        | hash |
//! | changed queue     | `{prefix}:sync:changed`      | list |
//! | sync lease        | `{prefix}:sync:lease`        | string with TTL |

use assetsync_core::Category;

pub const DEFAULT_PREFIX: &str = "asset";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySpace {
    prefix: String,
}

impl Default for KeySpace {
    fn default() -> Self {
        Self::new(DEFAULT_PREFIX)
    }
}

impl KeySpace {
    pub fn new(prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        let prefix = if prefix.is_empty() {
            DEFAULT_PREFIX.to_string()
        } else {
            prefix
        };
        Self { prefix }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn metadata(&self, id: &str) -> String {
        format!("{}{id}", self.metadata_prefix())
    }

    /// Common prefix of every asset record key; used for scans.
    pub fn metadata_prefix(&self) -> String {
        format!("{}:metadata:", self.prefix)
    }

    /// Inverse of [`KeySpace::metadata`].
    pub fn id_from_metadata<'k>(&self, key: &'k str) -> Option<&'k str> {
        key.strip_prefix(&self.metadata_prefix())
    }

    pub fn category(&self, category: Category) -> String {
        format!("{}:category:{category}", self.prefix)
    }

    pub fn index(&self) -> String {
        format!("{}:index", self.prefix)
    }

    pub fn sync_state(&self) -> String {
        format!("{}:sync:state", self.prefix)
    }

    pub fn changed(&self) -> String {
        format!("{}:sync:changed", self.prefix)
    }

    pub fn lease(&self) -> String {
        format!("{}:sync:lease", self.prefix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_keys() {
        let keys = KeySpace::default();
        assert_eq!(keys.metadata("web_search"), "asset:metadata:web_search");
        assert_eq!(keys.category(Category::Skill), "asset:category:skill");
        assert_eq!(keys.index(), "asset:index");
        assert_eq!(keys.sync_state(), "asset:sync:state");
        assert_eq!(keys.changed(), "asset:sync:changed");
    }

    #[test]
    fn metadata_key_roundtrips_id() {
        let keys = KeySpace::new("catalog");
        let key = keys.metadata("pdf-reader");
        assert_eq!(keys.id_from_metadata(&key), Some("pdf-reader"));
        assert_eq!(keys.id_from_metadata("asset:metadata:x"), None);
    }

    #[test]
    fn empty_prefix_falls_back_to_default() {
        assert_eq!(KeySpace::new("").prefix(), DEFAULT_PREFIX);
    }
}
