//! Common syntax-node utilities shared across the extraction stages.

use tree_sitter::Node;

// ============ Node Text ============

/// Get the source text covered by a node
pub fn get_node_text<'a>(node: Node, source: &'a [u8]) -> &'a str {
    let start = node.start_byte();
    let end = node.end_byte();
    let slice = source.get(start..end).unwrap_or(&[]);
    std::str::from_utf8(slice).unwrap_or("")
}

/// One-based line of a node, for log and error context
pub fn line_of(node: Node) -> usize {
    node.start_position().row + 1
}

// ============ Traversal ============

/// Named children of a node with comments filtered out.
///
/// tree-sitter attaches comments wherever they occur in the source, so every
/// structural check in the extractor goes through this instead of `named_children`.
pub fn named_children<'t>(node: Node<'t>) -> Vec<Node<'t>> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor)
        .filter(|child| child.kind() != "comment")
        .collect()
}

/// Strip any number of enclosing parentheses
pub fn unwrap_parens(node: Node) -> Node {
    let mut current = node;
    while current.kind() == "parenthesized_expression" {
        match named_children(current).into_iter().next() {
            Some(inner) => current = inner,
            None => break,
        }
    }
    current
}

// ============ Literals ============

/// Parse the text of a numeric literal into its value.
///
/// Handles the radix prefixes, numeric separators and the BigInt suffix that
/// a minifier may emit.
pub fn parse_number(text: &str) -> Option<f64> {
    let cleaned: String = text.trim().chars().filter(|&ch| ch != '_').collect();
    let cleaned = cleaned.strip_suffix('n').unwrap_or(&cleaned);
    let lower = cleaned.to_ascii_lowercase();

    let radix = |digits: &str, base: u32| u64::from_str_radix(digits, base).ok().map(|v| v as f64);

    if let Some(digits) = lower.strip_prefix("0x") {
        return radix(digits, 16);
    }
    if let Some(digits) = lower.strip_prefix("0o") {
        return radix(digits, 8);
    }
    if let Some(digits) = lower.strip_prefix("0b") {
        return radix(digits, 2);
    }

    lower.parse::<f64>().ok()
}

/// Render a number the way a JavaScript engine prints it
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e21 {
        format!("{:.0}", value)
    } else {
        format!("{}", value)
    }
}

/// Integer value of a numeric literal, if it is one and fits in `T`
pub fn integer_literal<T: TryFrom<i64>>(text: &str) -> Option<T> {
    let value = parse_number(text)?;
    if value.fract() != 0.0 || value.abs() > i64::MAX as f64 {
        return None;
    }
    T::try_from(value as i64).ok()
}

/// Contents of a string literal without its quotes
pub fn string_literal_value(text: &str) -> &str {
    let trimmed = text.trim();
    if trimmed.len() >= 2 {
        &trimmed[1..trimmed.len() - 1]
    } else {
        ""
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_number_radixes() {
        assert_eq!(parse_number("42"), Some(42.0));
        assert_eq!(parse_number("0x1F"), Some(31.0));
        assert_eq!(parse_number("0o17"), Some(15.0));
        assert_eq!(parse_number("0b101"), Some(5.0));
        assert_eq!(parse_number("1_000"), Some(1000.0));
        assert_eq!(parse_number("1e3"), Some(1000.0));
        assert_eq!(parse_number("abc"), None);
    }

    #[test]
    fn test_format_number_matches_js() {
        assert_eq!(format_number(5.0), "5");
        assert_eq!(format_number(0.5), "0.5");
        assert_eq!(format_number(16.0), "16");
    }

    #[test]
    fn test_integer_literal_rejects_fractions() {
        assert_eq!(integer_literal::<u32>("7"), Some(7));
        assert_eq!(integer_literal::<u32>("7.5"), None);
        assert_eq!(integer_literal::<i32>("0x10"), Some(16));
    }

    #[test]
    fn test_string_literal_value() {
        assert_eq!(string_literal_value("\"text\""), "text");
        assert_eq!(string_literal_value("'image'"), "image");
    }
}
