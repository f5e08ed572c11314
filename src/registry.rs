//! Tool registry - the discovered, adapted tool set for one session

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::schema::ToolDescriptor;

/// Registry of tools discovered from a provider
///
/// Scoped to one session and rebuilt, never merged, on re-discovery.
/// Iteration order is the provider's declaration order.
#[derive(Debug, Default)]
pub struct ToolRegistry {
    tools: Vec<ToolDescriptor>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    /// Build a registry from adapted descriptors, applying the allow-list.
    /// Filtered-out tools never enter the registry.
    pub(crate) fn build(descriptors: Vec<ToolDescriptor>, allowed: Option<&[String]>) -> Self {
        let mut tools = Vec::with_capacity(descriptors.len());
        let mut index = HashMap::new();

        for descriptor in descriptors {
            if let Some(allowed) = allowed {
                if !allowed.iter().any(|name| name == &descriptor.name) {
                    debug!(tool = %descriptor.name, "dropped by allow-list");
                    continue;
                }
            }
            if index.contains_key(&descriptor.name) {
                warn!(tool = %descriptor.name, "duplicate tool name from provider, keeping first");
                continue;
            }
            index.insert(descriptor.name.clone(), tools.len());
            tools.push(descriptor);
        }

        ToolRegistry { tools, index }
    }

    /// Get a tool by name
    pub fn get(&self, name: &str) -> Option<&ToolDescriptor> {
        self.index.get(name).map(|&position| &self.tools[position])
    }

    /// Whether a tool is present
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Tool names in discovery order
    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|tool| tool.name.as_str()).collect()
    }

    /// Iterate descriptors in discovery order
    pub fn iter(&self) -> impl Iterator<Item = &ToolDescriptor> {
        self.tools.iter()
    }

    /// Number of registered tools
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{OutputShape, ParamSchema};

    fn descriptor(name: &str) -> ToolDescriptor {
        ToolDescriptor {
            name: name.to_string(),
            description: String::new(),
            input_schema: ParamSchema::Object { fields: Vec::new() },
            output: OutputShape::Text,
        }
    }

    #[test]
    fn preserves_provider_order() {
        let registry = ToolRegistry::build(
            vec![descriptor("toolA"), descriptor("toolB"), descriptor("toolC")],
            None,
        );
        assert_eq!(registry.names(), vec!["toolA", "toolB", "toolC"]);
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn allow_list_filters_at_build_time() {
        let allowed = vec!["toolB".to_string()];
        let registry = ToolRegistry::build(
            vec![descriptor("toolA"), descriptor("toolB"), descriptor("toolC")],
            Some(&allowed),
        );
        assert_eq!(registry.names(), vec!["toolB"]);
        assert!(registry.get("toolA").is_none());
        assert!(registry.contains("toolB"));
    }

    #[test]
    fn duplicate_names_keep_first() {
        let mut second = descriptor("dup");
        second.description = "second".to_string();
        let registry = ToolRegistry::build(vec![descriptor("dup"), second], None);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("dup").map(|t| t.description.as_str()), Some(""));
    }

    #[test]
    fn default_is_empty() {
        let registry = ToolRegistry::default();
        assert!(registry.is_empty());
        assert!(registry.get("anything").is_none());
    }
}
