//! The schema tree rebuilt from the bundle.
//!
//! All maps are ordered so the serialized output never depends on hash
//! iteration order; sibling ordering is still decided by the writer.

use std::collections::BTreeMap;

use serde::Serialize;

// ============ Tree ============

/// Messages and enums declared at one level of the tree
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct SchemaRoot {
    pub messages: BTreeMap<String, Message>,
    pub enums: BTreeMap<String, Vec<EnumValue>>,
}

/// A message definition, which is itself a scope for nested definitions
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct Message {
    #[serde(flatten)]
    pub nested: SchemaRoot,
    pub properties: BTreeMap<String, Property>,
    pub oneofs: BTreeMap<String, Vec<OneofVariant>>,
}

/// Label of a plain message field
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    #[default]
    Optional,
    Repeated,
    Required,
}

impl FieldKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldKind::Optional => "optional",
            FieldKind::Repeated => "repeated",
            FieldKind::Required => "required",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Property {
    pub id: u32,
    pub kind: FieldKind,
    #[serde(rename = "type")]
    pub type_name: String,
    pub packed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OneofVariant {
    pub id: u32,
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnumValue {
    pub name: String,
    pub id: i32,
}

/// Properties and oneofs interpreted from one `internalSpec` literal
#[derive(Debug, Default, Clone, PartialEq)]
pub struct FieldSet {
    pub properties: BTreeMap<String, Property>,
    pub oneofs: BTreeMap<String, Vec<OneofVariant>>,
}

// ============ Lookup ============

impl SchemaRoot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty() && self.enums.is_empty()
    }

    /// Message at a full path of segments
    pub fn message(&self, segments: &[String]) -> Option<&Message> {
        let (first, rest) = segments.split_first()?;
        let mut message = self.messages.get(first)?;
        for segment in rest {
            message = message.nested.messages.get(segment)?;
        }
        Some(message)
    }

    /// Mutable message at a full path of segments
    pub fn message_mut(&mut self, segments: &[String]) -> Option<&mut Message> {
        let (first, rest) = segments.split_first()?;
        let mut message = self.messages.get_mut(first)?;
        for segment in rest {
            message = message.nested.messages.get_mut(segment)?;
        }
        Some(message)
    }

    /// Scope holding the last segment of `segments`: the root itself for a
    /// single segment, otherwise the nested scope of the parent message.
    pub fn scope_mut(&mut self, segments: &[String]) -> Option<&mut SchemaRoot> {
        match segments.split_last() {
            Some((_, [])) => Some(self),
            Some((_, parents)) => self.message_mut(parents).map(|message| &mut message.nested),
            None => None,
        }
    }

    /// Whether a message or an enum exists at `segments`
    pub fn contains(&self, segments: &[String]) -> bool {
        let Some((last, parents)) = segments.split_last() else {
            return false;
        };
        let scope = if parents.is_empty() {
            self
        } else {
            match self.message(parents) {
                Some(parent) => &parent.nested,
                None => return false,
            }
        };
        scope.messages.contains_key(last) || scope.enums.contains_key(last)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(segments: &[&str]) -> Vec<String> {
        segments.iter().map(|s| s.to_string()).collect()
    }

    fn sample() -> SchemaRoot {
        let mut inner = Message::default();
        inner.nested.enums.insert("Kind".into(), vec![]);
        let mut outer = Message::default();
        outer.nested.messages.insert("Inner".into(), inner);
        let mut root = SchemaRoot::new();
        root.messages.insert("Outer".into(), outer);
        root
    }

    #[test]
    fn test_lookup_nested_message() {
        let root = sample();
        assert!(root.message(&path(&["Outer", "Inner"])).is_some());
        assert!(root.message(&path(&["Inner"])).is_none());
        assert!(root.message(&[]).is_none());
    }

    #[test]
    fn test_contains_messages_and_enums() {
        let root = sample();
        assert!(root.contains(&path(&["Outer"])));
        assert!(root.contains(&path(&["Outer", "Inner", "Kind"])));
        assert!(!root.contains(&path(&["Outer", "Kind"])));
        assert!(!root.contains(&path(&["Missing", "Kind"])));
    }

    #[test]
    fn test_scope_mut_for_top_level_and_nested() {
        let mut root = sample();
        root.scope_mut(&path(&["Top"])).unwrap().enums.insert("Top".into(), vec![]);
        assert!(root.enums.contains_key("Top"));

        let scope = root.scope_mut(&path(&["Outer", "Status"])).unwrap();
        scope.enums.insert("Status".into(), vec![]);
        assert!(root.contains(&path(&["Outer", "Status"])));
        assert!(root.scope_mut(&path(&["Nope", "Status"])).is_none());
    }

    #[test]
    fn test_json_shape() {
        let json = serde_json::to_value(sample()).unwrap();
        assert!(json["messages"]["Outer"]["messages"]["Inner"]["enums"]["Kind"].is_array());
        assert!(json["messages"]["Outer"]["properties"].is_object());
    }
}
