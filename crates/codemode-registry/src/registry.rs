//! Immutable capability registry

use crate::capability::{Capability, CapabilityInfo};
use indexmap::IndexMap;
use std::sync::Arc;

/// Ordered, immutable mapping from qualified name to capability
///
/// Built once per aggregation and shared read-only afterwards. Clones share
/// the underlying map.
#[derive(Debug, Clone, Default)]
pub struct CapabilityRegistry {
    entries: Arc<IndexMap<String, Capability>>,
}

impl CapabilityRegistry {
    /// Create empty registry
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a capability by name
    #[inline]
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Capability> {
        self.entries.get(name)
    }

    /// Check if a name is registered
    #[inline]
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Registered names in insertion order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Capabilities in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &Capability> {
        self.entries.values()
    }

    /// Number of capabilities
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if registry is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Name/description pairs in insertion order
    #[must_use]
    pub fn infos(&self) -> Vec<CapabilityInfo> {
        self.iter().map(Capability::info).collect()
    }

    /// One `- name: description` line per capability
    #[must_use]
    pub fn describe(&self) -> String {
        self.iter()
            .map(|c| format!("- {}: {}", c.name(), c.description()))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Later entries replace earlier entries with the same name, keeping the
/// original position.
impl FromIterator<Capability> for CapabilityRegistry {
    fn from_iter<I: IntoIterator<Item = Capability>>(iter: I) -> Self {
        let mut entries = IndexMap::new();
        for capability in iter {
            entries.insert(capability.name().to_string(), capability);
        }
        Self {
            entries: Arc::new(entries),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn cap(name: &str, description: &str, result: i64) -> Capability {
        Capability::from_fn(name, description, move |_args: Vec<Value>| async move {
            Ok(json!(result))
        })
    }

    #[test]
    fn preserves_insertion_order() {
        let registry: CapabilityRegistry =
            [cap("b", "", 1), cap("a", "", 2), cap("c", "", 3)].into_iter().collect();

        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["b", "a", "c"]);
        assert_eq!(registry.len(), 3);
        assert!(registry.contains("a"));
        assert!(!registry.contains("d"));
    }

    #[tokio::test]
    async fn later_entry_wins_on_collision() {
        let registry: CapabilityRegistry =
            [cap("x", "first", 1), cap("y", "", 2), cap("x", "second", 3)].into_iter().collect();

        assert_eq!(registry.len(), 2);
        let x = registry.get("x").unwrap();
        assert_eq!(x.description(), "second");
        assert_eq!(x.invoke(vec![]).await.unwrap(), json!(3));
    }

    #[test]
    fn describe_lists_one_line_per_capability() {
        let registry: CapabilityRegistry =
            [cap("math_add", "Adds numbers", 0), cap("kw_volume", "Search volume", 0)]
                .into_iter()
                .collect();

        assert_eq!(
            registry.describe(),
            "- math_add: Adds numbers\n- kw_volume: Search volume"
        );
    }

    #[test]
    fn empty_registry() {
        let registry = CapabilityRegistry::new();
        assert!(registry.is_empty());
        assert_eq!(registry.describe(), "");
        assert!(registry.get("anything").is_none());
    }
}
