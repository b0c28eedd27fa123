//! Canonical proto2 rendering of a finished schema tree.

use crate::extract::schema::{EnumValue, Message, OneofVariant, Property, SchemaRoot};

// ============ Constants ============

const INDENT_STEP: usize = 4;

// ============ Entry Points ============

/// Render the whole document: header, then every top-level definition
/// ordered by name.
pub fn write_proto(root: &SchemaRoot, package: &str) -> String {
    let mut writer = ProtoWriter::new();
    writer.out.push_str(&format!("syntax = \"proto2\";\npackage {};", package));

    let mut top_level: Vec<TopLevel> = root
        .messages
        .iter()
        .map(|(name, message)| TopLevel::Message(name, message))
        .chain(root.enums.iter().map(|(name, values)| TopLevel::Enum(name, values)))
        .collect();
    top_level.sort_by(|a, b| a.name().cmp(b.name()));

    for entry in top_level {
        writer.blank_line();
        match entry {
            TopLevel::Message(name, message) => writer.write_message(name, message),
            TopLevel::Enum(name, values) => writer.write_enum(name, values),
        }
    }

    writer.out
}

enum TopLevel<'a> {
    Message(&'a str, &'a Message),
    Enum(&'a str, &'a [EnumValue]),
}

impl TopLevel<'_> {
    fn name(&self) -> &str {
        match self {
            TopLevel::Message(name, _) | TopLevel::Enum(name, _) => name,
        }
    }
}

/// A line group inside a message body, ordered by its effective id
enum Member<'a> {
    Field(&'a str, &'a Property),
    Oneof(&'a str, Vec<&'a OneofVariant>),
}

impl Member<'_> {
    fn effective_id(&self) -> u32 {
        match self {
            Member::Field(_, property) => property.id,
            Member::Oneof(_, variants) => variants.iter().map(|variant| variant.id).min().unwrap_or(0),
        }
    }
}

// ============ Writer ============

struct ProtoWriter {
    out: String,
    indent: usize,
}

impl ProtoWriter {
    fn new() -> Self {
        Self {
            out: String::new(),
            indent: 0,
        }
    }

    fn line(&mut self, text: &str) {
        self.out.push('\n');
        self.out.push_str(&" ".repeat(self.indent));
        self.out.push_str(text);
    }

    fn blank_line(&mut self) {
        self.out.push('\n');
    }

    fn write_enum(&mut self, name: &str, values: &[EnumValue]) {
        self.line(&format!("enum {} {{", name));
        self.indent += INDENT_STEP;

        let mut sorted: Vec<&EnumValue> = values.iter().collect();
        sorted.sort_by_key(|value| value.id);
        for value in sorted {
            self.line(&format!("{} = {};", value.name, value.id));
        }

        self.indent -= INDENT_STEP;
        self.line("}");
    }

    fn write_message(&mut self, name: &str, message: &Message) {
        self.line(&format!("message {} {{", name));
        self.indent += INDENT_STEP;

        let mut members: Vec<Member> = message
            .properties
            .iter()
            .map(|(name, property)| Member::Field(name, property))
            .collect();
        for (name, variants) in &message.oneofs {
            if variants.is_empty() {
                continue;
            }
            let mut sorted: Vec<&OneofVariant> = variants.iter().collect();
            sorted.sort_by_key(|variant| variant.id);
            members.push(Member::Oneof(name, sorted));
        }
        members.sort_by_key(|member| member.effective_id());

        let last = members.len().saturating_sub(1);
        for (index, member) in members.iter().enumerate() {
            match member {
                Member::Field(name, property) => self.line(&field_line(name, property)),
                Member::Oneof(name, variants) => {
                    if index != 0 {
                        self.blank_line();
                    }
                    self.write_oneof(name, variants);
                    if index != last {
                        self.blank_line();
                    }
                }
            }
        }

        for (name, nested) in &message.nested.messages {
            self.blank_line();
            self.write_message(name, nested);
        }
        for (name, values) in &message.nested.enums {
            self.blank_line();
            self.write_enum(name, values);
        }

        self.indent -= INDENT_STEP;
        self.line("}");
    }

    fn write_oneof(&mut self, name: &str, variants: &[&OneofVariant]) {
        self.line(&format!("oneof {} {{", name));
        self.indent += INDENT_STEP;
        for variant in variants {
            self.line(&format!("{} {} = {};", variant.type_name, variant.name, variant.id));
        }
        self.indent -= INDENT_STEP;
        self.line("}");
    }
}

/// `<kind> <type> <name> = <id>[ [packed = true]][ [default = X]];`
fn field_line(name: &str, property: &Property) -> String {
    let mut line = format!(
        "{} {} {} = {}",
        property.kind.as_str(),
        property.type_name,
        name,
        property.id
    );
    if property.packed {
        line.push_str(" [packed = true]");
    }
    if let Some(default) = &property.default {
        line.push_str(&format!(" [default = {}]", default));
    }
    line.push(';');
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::schema::FieldKind;
    use proptest::prelude::*;

    fn property(id: u32, kind: FieldKind, type_name: &str) -> Property {
        Property {
            id,
            kind,
            type_name: type_name.to_string(),
            packed: false,
            default: None,
        }
    }

    fn variant(id: u32, name: &str, type_name: &str) -> OneofVariant {
        OneofVariant {
            id,
            name: name.to_string(),
            type_name: type_name.to_string(),
        }
    }

    #[test]
    fn test_empty_root_is_header_only() {
        assert_eq!(write_proto(&SchemaRoot::new(), "whatsapp"), "syntax = \"proto2\";\npackage whatsapp;");
    }

    #[test]
    fn test_empty_message() {
        let mut root = SchemaRoot::new();
        root.messages.insert("a".into(), Message::default());
        assert_eq!(
            write_proto(&root, "whatsapp"),
            "syntax = \"proto2\";\npackage whatsapp;\n\nmessage a {\n}"
        );
    }

    #[test]
    fn test_field_options() {
        let mut packed = property(4, FieldKind::Repeated, "uint32");
        packed.packed = true;
        assert_eq!(field_line("ids", &packed), "repeated uint32 ids = 4 [packed = true];");

        let mut defaulted = property(5, FieldKind::Optional, "int32");
        defaulted.default = Some("5".into());
        assert_eq!(field_line("count", &defaulted), "optional int32 count = 5 [default = 5];");

        defaulted.packed = true;
        assert_eq!(
            field_line("count", &defaulted),
            "optional int32 count = 5 [packed = true] [default = 5];"
        );
    }

    #[test]
    fn test_message_layout() {
        let mut inner = Message::default();
        inner
            .properties
            .insert("flag".into(), property(1, FieldKind::Optional, "bool"));

        let mut outer = Message::default();
        outer
            .properties
            .insert("name".into(), property(1, FieldKind::Optional, "string"));
        outer
            .properties
            .insert("tail".into(), property(9, FieldKind::Repeated, "Inner"));
        outer
            .properties
            .insert("kind".into(), property(2, FieldKind::Required, "Kind"));
        outer.oneofs.insert(
            "content".into(),
            vec![variant(6, "image", "bytes"), variant(5, "text", "string")],
        );
        outer.oneofs.insert("empty".into(), Vec::new());
        outer.nested.messages.insert("Inner".into(), inner);
        outer.nested.enums.insert(
            "Kind".into(),
            vec![
                EnumValue { name: "B".into(), id: 1 },
                EnumValue { name: "A".into(), id: 0 },
            ],
        );

        let mut root = SchemaRoot::new();
        root.messages.insert("Outer".into(), outer);
        root.enums.insert("Alpha".into(), vec![EnumValue { name: "X".into(), id: 3 }]);

        let expected = "\
syntax = \"proto2\";
package whatsapp;

enum Alpha {
    X = 3;
}

message Outer {
    optional string name = 1;
    required Kind kind = 2;

    oneof content {
        string text = 5;
        bytes image = 6;
    }

    repeated Inner tail = 9;

    message Inner {
        optional bool flag = 1;
    }

    enum Kind {
        A = 0;
        B = 1;
    }
}";
        assert_eq!(write_proto(&root, "whatsapp"), expected);
    }

    #[test]
    fn test_adjacent_oneofs_get_blank_lines_on_both_sides() {
        let mut message = Message::default();
        message.oneofs.insert("first".into(), vec![variant(1, "a", "string")]);
        message.oneofs.insert("second".into(), vec![variant(2, "b", "string")]);
        let mut root = SchemaRoot::new();
        root.messages.insert("M".into(), message);

        let expected = "\
syntax = \"proto2\";
package whatsapp;

message M {
    oneof first {
        string a = 1;
    }


    oneof second {
        string b = 2;
    }
}";
        assert_eq!(write_proto(&root, "whatsapp"), expected);
    }

    #[test]
    fn test_top_level_order_is_case_sensitive() {
        let mut root = SchemaRoot::new();
        root.messages.insert("beta".into(), Message::default());
        root.messages.insert("Zeta".into(), Message::default());
        root.enums.insert("alpha".into(), Vec::new());

        let output = write_proto(&root, "whatsapp");
        let zeta = output.find("message Zeta").unwrap();
        let alpha = output.find("enum alpha").unwrap();
        let beta = output.find("message beta").unwrap();
        assert!(zeta < alpha && alpha < beta);
    }

    proptest! {
        /// Top-level names come out in non-decreasing byte order, whatever the mix.
        #[test]
        fn top_level_names_are_sorted(
            messages in prop::collection::btree_set("[A-Za-z][A-Za-z0-9]{0,6}", 0..8),
            enums in prop::collection::btree_set("[A-Za-z][A-Za-z0-9]{0,6}", 0..8),
        ) {
            let mut root = SchemaRoot::new();
            for name in &messages {
                root.messages.insert(name.clone(), Message::default());
            }
            for name in enums.difference(&messages) {
                root.enums.insert(name.clone(), Vec::new());
            }

            let output = write_proto(&root, "whatsapp");
            let names: Vec<&str> = output
                .lines()
                .filter_map(|line| line.strip_prefix("message ").or_else(|| line.strip_prefix("enum ")))
                .map(|rest| rest.trim_end_matches(" {"))
                .collect();

            prop_assert_eq!(names.len(), root.messages.len() + root.enums.len());
            prop_assert!(names.windows(2).all(|pair| pair[0] <= pair[1]));
            prop_assert_eq!(output.clone(), write_proto(&root, "whatsapp"));
        }
    }
}
