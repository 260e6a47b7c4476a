use std::fmt::{self, Write};

use protolsp_ast::*;

const INDENT: &str = "  ";

/// Formats a file into a fresh string.
pub fn format_file(file: &FileNode) -> String {
    let mut out = String::new();
    // writing to a String cannot fail
    let _ = write_file(file, &mut out);
    out
}

/// Writes the canonical form of `file` to `out`.
pub fn write_file(file: &FileNode, out: &mut impl Write) -> fmt::Result {
    let mut p = Printer { out, depth: 0 };
    p.file(file)
}

struct Printer<'w, W: Write> {
    out: &'w mut W,
    depth: usize,
}

impl<W: Write> Printer<'_, W> {
    fn indent(&mut self) -> fmt::Result {
        for _ in 0..self.depth {
            self.out.write_str(INDENT)?;
        }
        Ok(())
    }

    fn comments(&mut self, comments: &[String]) -> fmt::Result {
        for comment in comments {
            for line in comment.lines() {
                self.indent()?;
                writeln!(self.out, "{}", line.trim())?;
            }
        }
        Ok(())
    }

    fn file(&mut self, file: &FileNode) -> fmt::Result {
        let mut first = true;
        if let Some(syntax) = &file.syntax {
            self.comments(&syntax.leading_comments)?;
            writeln!(self.out, "syntax = {};", quote(&syntax.value.value))?;
            first = false;
        }

        let mut previous: Option<&FileElement> = None;
        for decl in &file.decls {
            if !first && blank_between(previous, decl) {
                writeln!(self.out)?;
            }
            first = false;
            match decl {
                FileElement::Package(n) => {
                    self.comments(&n.leading_comments)?;
                    writeln!(self.out, "package {};", n.name.as_identifier())?;
                }
                FileElement::Import(n) => {
                    self.comments(&n.leading_comments)?;
                    match &n.modifier {
                        Some(modifier) => writeln!(
                            self.out,
                            "import {} {};",
                            modifier.text,
                            quote(&n.name.value)
                        )?,
                        None => writeln!(self.out, "import {};", quote(&n.name.value))?,
                    }
                }
                FileElement::Option(n) => self.option_decl(n)?,
                FileElement::Message(n) => self.message(n)?,
                FileElement::Enum(n) => self.enumeration(n)?,
                FileElement::Service(n) => self.service(n)?,
                FileElement::Extend(n) => self.extend(n)?,
            }
            previous = Some(decl);
        }
        Ok(())
    }

    // ── options ──────────────────────────────────────────────────

    fn option_decl(&mut self, node: &OptionNode) -> fmt::Result {
        self.comments(&node.leading_comments)?;
        self.indent()?;
        writeln!(
            self.out,
            "option {} = {};",
            option_name(&node.name),
            option_value(&node.value)
        )
    }

    fn compact_options(&mut self, options: &[OptionNode]) -> fmt::Result {
        if options.is_empty() {
            return Ok(());
        }
        let rendered: Vec<String> = options
            .iter()
            .map(|o| format!("{} = {}", option_name(&o.name), option_value(&o.value)))
            .collect();
        write!(self.out, " [{}]", rendered.join(", "))
    }

    // ── messages ─────────────────────────────────────────────────

    fn message(&mut self, node: &MessageNode) -> fmt::Result {
        self.comments(&node.leading_comments)?;
        self.indent()?;
        if node.body.is_empty() {
            return writeln!(self.out, "message {} {{}}", node.name.value);
        }
        writeln!(self.out, "message {} {{", node.name.value)?;
        self.depth += 1;
        self.message_body(&node.body)?;
        self.depth -= 1;
        self.indent()?;
        writeln!(self.out, "}}")
    }

    fn message_body(&mut self, body: &[MessageElement]) -> fmt::Result {
        let mut first = true;
        for element in body {
            let nested = matches!(
                element,
                MessageElement::Message(_) | MessageElement::Enum(_) | MessageElement::Extend(_)
            );
            if nested && !first {
                writeln!(self.out)?;
            }
            first = false;
            match element {
                MessageElement::Field(f) => self.field(f)?,
                MessageElement::Map(f) => self.map_field(f)?,
                MessageElement::Group(g) => self.group(g)?,
                MessageElement::Oneof(o) => self.oneof(o)?,
                MessageElement::Message(m) => self.message(m)?,
                MessageElement::Enum(e) => self.enumeration(e)?,
                MessageElement::Extend(e) => self.extend(e)?,
                MessageElement::Option(o) => self.option_decl(o)?,
                MessageElement::Reserved(r) => self.reserved(r)?,
                MessageElement::Extensions(x) => self.extensions(x)?,
            }
        }
        Ok(())
    }

    fn field(&mut self, node: &FieldNode) -> fmt::Result {
        self.comments(&node.leading_comments)?;
        self.indent()?;
        if let Some(label) = &node.label {
            write!(self.out, "{} ", label.text)?;
        }
        write!(
            self.out,
            "{} {} = {}",
            node.field_type.as_identifier(),
            node.name.value,
            int(&node.number)
        )?;
        self.compact_options(&node.options)?;
        writeln!(self.out, ";")
    }

    fn map_field(&mut self, node: &MapFieldNode) -> fmt::Result {
        self.comments(&node.leading_comments)?;
        self.indent()?;
        write!(
            self.out,
            "map<{}, {}> {} = {}",
            node.key_type.value,
            node.value_type.as_identifier(),
            node.name.value,
            int(&node.number)
        )?;
        self.compact_options(&node.options)?;
        writeln!(self.out, ";")
    }

    fn group(&mut self, node: &GroupNode) -> fmt::Result {
        self.comments(&node.leading_comments)?;
        self.indent()?;
        if let Some(label) = &node.label {
            write!(self.out, "{} ", label.text)?;
        }
        writeln!(
            self.out,
            "group {} = {} {{",
            node.name.value,
            int(&node.number)
        )?;
        self.depth += 1;
        self.message_body(&node.body)?;
        self.depth -= 1;
        self.indent()?;
        writeln!(self.out, "}}")
    }

    fn oneof(&mut self, node: &OneofNode) -> fmt::Result {
        self.comments(&node.leading_comments)?;
        self.indent()?;
        writeln!(self.out, "oneof {} {{", node.name.value)?;
        self.depth += 1;
        for element in &node.body {
            match element {
                OneofElement::Field(f) => self.field(f)?,
                OneofElement::Group(g) => self.group(g)?,
                OneofElement::Option(o) => self.option_decl(o)?,
            }
        }
        self.depth -= 1;
        self.indent()?;
        writeln!(self.out, "}}")
    }

    fn extend(&mut self, node: &ExtendNode) -> fmt::Result {
        self.comments(&node.leading_comments)?;
        self.indent()?;
        writeln!(self.out, "extend {} {{", node.extendee.as_identifier())?;
        self.depth += 1;
        self.message_body(&node.body)?;
        self.depth -= 1;
        self.indent()?;
        writeln!(self.out, "}}")
    }

    fn reserved(&mut self, node: &ReservedNode) -> fmt::Result {
        self.comments(&node.leading_comments)?;
        self.indent()?;
        if node.names.is_empty() {
            let ranges: Vec<String> = node.ranges.iter().map(range).collect();
            writeln!(self.out, "reserved {};", ranges.join(", "))
        } else {
            let names: Vec<String> = node.names.iter().map(|n| quote(&n.value)).collect();
            writeln!(self.out, "reserved {};", names.join(", "))
        }
    }

    fn extensions(&mut self, node: &ExtensionRangeNode) -> fmt::Result {
        self.comments(&node.leading_comments)?;
        self.indent()?;
        let ranges: Vec<String> = node.ranges.iter().map(range).collect();
        write!(self.out, "extensions {}", ranges.join(", "))?;
        self.compact_options(&node.options)?;
        writeln!(self.out, ";")
    }

    // ── enums ────────────────────────────────────────────────────

    fn enumeration(&mut self, node: &EnumNode) -> fmt::Result {
        self.comments(&node.leading_comments)?;
        self.indent()?;
        if node.body.is_empty() {
            return writeln!(self.out, "enum {} {{}}", node.name.value);
        }
        writeln!(self.out, "enum {} {{", node.name.value)?;
        self.depth += 1;
        for element in &node.body {
            match element {
                EnumElement::Value(v) => {
                    self.comments(&v.leading_comments)?;
                    self.indent()?;
                    write!(self.out, "{} = {}", v.name.value, int(&v.number))?;
                    self.compact_options(&v.options)?;
                    writeln!(self.out, ";")?;
                }
                EnumElement::Option(o) => self.option_decl(o)?,
                EnumElement::Reserved(r) => self.reserved(r)?,
            }
        }
        self.depth -= 1;
        self.indent()?;
        writeln!(self.out, "}}")
    }

    // ── services ─────────────────────────────────────────────────

    fn service(&mut self, node: &ServiceNode) -> fmt::Result {
        self.comments(&node.leading_comments)?;
        self.indent()?;
        if node.body.is_empty() {
            return writeln!(self.out, "service {} {{}}", node.name.value);
        }
        writeln!(self.out, "service {} {{", node.name.value)?;
        self.depth += 1;
        for element in &node.body {
            match element {
                ServiceElement::Rpc(rpc) => self.rpc(rpc)?,
                ServiceElement::Option(o) => self.option_decl(o)?,
            }
        }
        self.depth -= 1;
        self.indent()?;
        writeln!(self.out, "}}")
    }

    fn rpc(&mut self, node: &RpcNode) -> fmt::Result {
        self.comments(&node.leading_comments)?;
        self.indent()?;
        write!(
            self.out,
            "rpc {}({}) returns ({})",
            node.name.value,
            rpc_type(&node.input),
            rpc_type(&node.output)
        )?;
        if node.options.is_empty() {
            return writeln!(self.out, ";");
        }
        writeln!(self.out, " {{")?;
        self.depth += 1;
        for option in &node.options {
            self.option_decl(option)?;
        }
        self.depth -= 1;
        self.indent()?;
        writeln!(self.out, "}}")
    }
}

// ── leaf rendering ───────────────────────────────────────────────

fn blank_between(previous: Option<&FileElement>, next: &FileElement) -> bool {
    // runs of imports stay packed, as do runs of file options
    match (previous, next) {
        (Some(FileElement::Import(_)), FileElement::Import(_)) => false,
        (Some(FileElement::Option(_)), FileElement::Option(_)) => false,
        _ => true,
    }
}

fn rpc_type(node: &RpcTypeNode) -> String {
    match &node.stream {
        Some(_) => format!("stream {}", node.message_type.as_identifier()),
        None => node.message_type.as_identifier(),
    }
}

fn range(node: &TagRangeNode) -> String {
    match &node.end {
        None => int(&node.start),
        Some(TagRangeEnd::Int(end)) => format!("{} to {}", int(&node.start), int(end)),
        Some(TagRangeEnd::Max(_)) => format!("{} to max", int(&node.start)),
    }
}

fn int(node: &IntLiteralNode) -> String {
    if node.negative {
        format!("-{}", node.value)
    } else {
        node.value.to_string()
    }
}

fn float(value: f64) -> String {
    if value.is_infinite() {
        if value < 0.0 { "-inf".to_string() } else { "inf".to_string() }
    } else if value.is_nan() {
        "nan".to_string()
    } else {
        value.to_string()
    }
}

fn option_name(node: &OptionNameNode) -> String {
    node.parts
        .iter()
        .map(|part| {
            if part.is_extension {
                format!("({})", part.name.as_identifier())
            } else {
                part.name.as_identifier()
            }
        })
        .collect::<Vec<_>>()
        .join(".")
}

fn option_value(node: &OptionValueNode) -> String {
    match node {
        OptionValueNode::Ident(n) => n.value.clone(),
        OptionValueNode::String(n) => quote(&n.value),
        OptionValueNode::Int(n) => int(n),
        OptionValueNode::Float(n) => float(n.value),
        OptionValueNode::SignedFloat(n) => {
            if n.negative {
                format!("-{}", float(n.value))
            } else {
                float(n.value)
            }
        }
        OptionValueNode::Message(n) => message_literal(n),
    }
}

fn message_literal(node: &MessageLiteralNode) -> String {
    if node.fields.is_empty() {
        return "{}".to_string();
    }
    let fields: Vec<String> = node
        .fields
        .iter()
        .map(|f| {
            let name = if f.name.is_extension {
                format!("[{}]", f.name.name.as_identifier())
            } else {
                f.name.name.as_identifier()
            };
            match &f.value {
                OptionValueNode::Message(m) => format!("{name} {}", message_literal(m)),
                other => format!("{name}: {}", option_value(other)),
            }
        })
        .collect();
    format!("{{ {} }}", fields.join(" "))
}

fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\x{:02x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}
