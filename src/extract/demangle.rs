//! Decoding of mangled export names into schema paths.
//!
//! The bundle flattens nested definitions into single identifiers:
//! `Outer$Inner$LeafSpec` is the message `Outer.Inner.Leaf`, while a name
//! without the `Spec` suffix (`Outer$Kind`) is an enum.

use std::fmt;

/// Suffix marking a message definition
pub const MESSAGE_SUFFIX: &str = "Spec";

/// Separator between path segments
pub const PATH_SEPARATOR: char = '$';

/// What a demangled path points at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    Message,
    Enum,
}

/// Hierarchical schema path decoded from a mangled name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DemangledPath {
    pub segments: Vec<String>,
    pub kind: TargetKind,
}

impl DemangledPath {
    pub fn new<S: Into<String>>(segments: impl IntoIterator<Item = S>, kind: TargetKind) -> Self {
        Self {
            segments: segments.into_iter().map(Into::into).collect(),
            kind,
        }
    }
}

impl fmt::Display for DemangledPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("."))
    }
}

/// Split a mangled name into its path and target kind
pub fn demangle(name: &str) -> DemangledPath {
    let (base, kind) = match name.strip_suffix(MESSAGE_SUFFIX) {
        Some(base) => (base, TargetKind::Message),
        None => (name, TargetKind::Enum),
    };
    DemangledPath::new(base.split(PATH_SEPARATOR), kind)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_message_suffix() {
        let path = demangle("Outer$Inner$LeafSpec");
        assert_eq!(path.segments, vec!["Outer", "Inner", "Leaf"]);
        assert_eq!(path.kind, TargetKind::Message);
        assert_eq!(path.to_string(), "Outer.Inner.Leaf");
    }

    #[test]
    fn test_enum_without_suffix() {
        let path = demangle("Outer$Kind");
        assert_eq!(path.segments, vec!["Outer", "Kind"]);
        assert_eq!(path.kind, TargetKind::Enum);
        assert_eq!(path.to_string(), "Outer.Kind");
    }

    #[test]
    fn test_single_segment() {
        assert_eq!(demangle("aSpec"), DemangledPath::new(["a"], TargetKind::Message));
        assert_eq!(demangle("aEnum"), DemangledPath::new(["aEnum"], TargetKind::Enum));
    }

    proptest! {
        /// Joining segments back with the separator restores the unsuffixed name.
        #[test]
        fn demangle_preserves_segments(segments in prop::collection::vec("[A-Za-z][A-Za-z0-9_]{0,8}", 1..5)) {
            let mangled = format!("{}{}", segments.join("$"), MESSAGE_SUFFIX);
            let path = demangle(&mangled);
            prop_assert_eq!(path.kind, TargetKind::Message);
            prop_assert_eq!(path.segments, segments);
        }
    }
}
