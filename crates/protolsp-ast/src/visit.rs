use crate::nodes::*;
use crate::span::SourceSpan;

/// A borrowed reference to any node in the tree. This is what position
/// queries hand back; `span` works uniformly across variants.
#[derive(Debug, Clone, Copy)]
pub enum Node<'a> {
    File(&'a FileNode),
    Syntax(&'a SyntaxNode),
    Package(&'a PackageNode),
    Import(&'a ImportNode),
    Option(&'a OptionNode),
    OptionName(&'a OptionNameNode),
    FieldReference(&'a FieldReferenceNode),
    MessageLiteral(&'a MessageLiteralNode),
    Message(&'a MessageNode),
    Field(&'a FieldNode),
    MapField(&'a MapFieldNode),
    Group(&'a GroupNode),
    Oneof(&'a OneofNode),
    Enum(&'a EnumNode),
    EnumValue(&'a EnumValueNode),
    Service(&'a ServiceNode),
    Rpc(&'a RpcNode),
    RpcType(&'a RpcTypeNode),
    Extend(&'a ExtendNode),
    Reserved(&'a ReservedNode),
    ExtensionRange(&'a ExtensionRangeNode),
    Keyword(&'a KeywordNode),
    Ident(&'a IdentNode),
    CompoundIdent(&'a CompoundIdentNode),
    StringLiteral(&'a StringLiteralNode),
    IntLiteral(&'a IntLiteralNode),
    FloatLiteral(&'a FloatLiteralNode),
    SignedFloatLiteral(&'a SignedFloatLiteralNode),
}

impl<'a> Node<'a> {
    pub fn span(&self) -> SourceSpan {
        match self {
            Node::File(n) => n.span,
            Node::Syntax(n) => n.span,
            Node::Package(n) => n.span,
            Node::Import(n) => n.span,
            Node::Option(n) => n.span,
            Node::OptionName(n) => n.span,
            Node::FieldReference(n) => n.span,
            Node::MessageLiteral(n) => n.span,
            Node::Message(n) => n.span,
            Node::Field(n) => n.span,
            Node::MapField(n) => n.span,
            Node::Group(n) => n.span,
            Node::Oneof(n) => n.span,
            Node::Enum(n) => n.span,
            Node::EnumValue(n) => n.span,
            Node::Service(n) => n.span,
            Node::Rpc(n) => n.span,
            Node::RpcType(n) => n.span,
            Node::Extend(n) => n.span,
            Node::Reserved(n) => n.span,
            Node::ExtensionRange(n) => n.span,
            Node::Keyword(n) => n.span,
            Node::Ident(n) => n.span,
            Node::CompoundIdent(n) => n.span,
            Node::StringLiteral(n) => n.span,
            Node::IntLiteral(n) => n.span,
            Node::FloatLiteral(n) => n.span,
            Node::SignedFloatLiteral(n) => n.span,
        }
    }

    /// Short name of the node kind, for logging.
    pub fn type_name(&self) -> &'static str {
        match self {
            Node::File(_) => "File",
            Node::Syntax(_) => "Syntax",
            Node::Package(_) => "Package",
            Node::Import(_) => "Import",
            Node::Option(_) => "Option",
            Node::OptionName(_) => "OptionName",
            Node::FieldReference(_) => "FieldReference",
            Node::MessageLiteral(_) => "MessageLiteral",
            Node::Message(_) => "Message",
            Node::Field(_) => "Field",
            Node::MapField(_) => "MapField",
            Node::Group(_) => "Group",
            Node::Oneof(_) => "Oneof",
            Node::Enum(_) => "Enum",
            Node::EnumValue(_) => "EnumValue",
            Node::Service(_) => "Service",
            Node::Rpc(_) => "Rpc",
            Node::RpcType(_) => "RpcType",
            Node::Extend(_) => "Extend",
            Node::Reserved(_) => "Reserved",
            Node::ExtensionRange(_) => "ExtensionRange",
            Node::Keyword(_) => "Keyword",
            Node::Ident(_) => "Ident",
            Node::CompoundIdent(_) => "CompoundIdent",
            Node::StringLiteral(_) => "StringLiteral",
            Node::IntLiteral(_) => "IntLiteral",
            Node::FloatLiteral(_) => "FloatLiteral",
            Node::SignedFloatLiteral(_) => "SignedFloatLiteral",
        }
    }
}

/// Called back during [`walk`]. `visit_node` fires for every node in the
/// tree; the typed methods fire in addition, for nodes of that kind. All
/// methods default to doing nothing.
#[allow(unused_variables)]
pub trait Visitor<'a> {
    fn visit_node(&mut self, node: Node<'a>) {}

    fn visit_keyword(&mut self, node: &'a KeywordNode) {}
    fn visit_ident(&mut self, node: &'a IdentNode) {}
    fn visit_compound_ident(&mut self, node: &'a CompoundIdentNode) {}
    fn visit_string_literal(&mut self, node: &'a StringLiteralNode) {}
    fn visit_int_literal(&mut self, node: &'a IntLiteralNode) {}
    fn visit_float_literal(&mut self, node: &'a FloatLiteralNode) {}
    fn visit_signed_float_literal(&mut self, node: &'a SignedFloatLiteralNode) {}

    fn visit_file(&mut self, node: &'a FileNode) {}
    fn visit_syntax(&mut self, node: &'a SyntaxNode) {}
    fn visit_package(&mut self, node: &'a PackageNode) {}
    fn visit_import(&mut self, node: &'a ImportNode) {}
    fn visit_option(&mut self, node: &'a OptionNode) {}
    fn visit_option_name(&mut self, node: &'a OptionNameNode) {}
    fn visit_field_reference(&mut self, node: &'a FieldReferenceNode) {}
    fn visit_message_literal(&mut self, node: &'a MessageLiteralNode) {}
    fn visit_message(&mut self, node: &'a MessageNode) {}
    fn visit_field(&mut self, node: &'a FieldNode) {}
    fn visit_map_field(&mut self, node: &'a MapFieldNode) {}
    fn visit_group(&mut self, node: &'a GroupNode) {}
    fn visit_oneof(&mut self, node: &'a OneofNode) {}
    fn visit_enum(&mut self, node: &'a EnumNode) {}
    fn visit_enum_value(&mut self, node: &'a EnumValueNode) {}
    fn visit_service(&mut self, node: &'a ServiceNode) {}
    fn visit_rpc(&mut self, node: &'a RpcNode) {}
    fn visit_rpc_type(&mut self, node: &'a RpcTypeNode) {}
    fn visit_extend(&mut self, node: &'a ExtendNode) {}
    fn visit_reserved(&mut self, node: &'a ReservedNode) {}
    fn visit_extension_range(&mut self, node: &'a ExtensionRangeNode) {}
}

/// Walks the tree depth-first, parents before children, children in
/// source order.
pub fn walk<'a>(file: &'a FileNode, v: &mut dyn Visitor<'a>) {
    v.visit_node(Node::File(file));
    v.visit_file(file);

    if let Some(syntax) = &file.syntax {
        walk_syntax(syntax, v);
    }
    for decl in &file.decls {
        match decl {
            FileElement::Package(n) => walk_package(n, v),
            FileElement::Import(n) => walk_import(n, v),
            FileElement::Option(n) => walk_option(n, v),
            FileElement::Message(n) => walk_message(n, v),
            FileElement::Enum(n) => walk_enum(n, v),
            FileElement::Service(n) => walk_service(n, v),
            FileElement::Extend(n) => walk_extend(n, v),
        }
    }
}

fn walk_keyword<'a>(n: &'a KeywordNode, v: &mut dyn Visitor<'a>) {
    v.visit_node(Node::Keyword(n));
    v.visit_keyword(n);
}

fn walk_ident<'a>(n: &'a IdentNode, v: &mut dyn Visitor<'a>) {
    v.visit_node(Node::Ident(n));
    v.visit_ident(n);
}

fn walk_ident_value<'a>(n: &'a IdentValueNode, v: &mut dyn Visitor<'a>) {
    match n {
        IdentValueNode::Ident(i) => walk_ident(i, v),
        IdentValueNode::Compound(c) => {
            v.visit_node(Node::CompoundIdent(c));
            v.visit_compound_ident(c);
            for part in &c.components {
                walk_ident(part, v);
            }
        }
    }
}

fn walk_string<'a>(n: &'a StringLiteralNode, v: &mut dyn Visitor<'a>) {
    v.visit_node(Node::StringLiteral(n));
    v.visit_string_literal(n);
}

fn walk_int<'a>(n: &'a IntLiteralNode, v: &mut dyn Visitor<'a>) {
    v.visit_node(Node::IntLiteral(n));
    v.visit_int_literal(n);
}

fn walk_syntax<'a>(n: &'a SyntaxNode, v: &mut dyn Visitor<'a>) {
    v.visit_node(Node::Syntax(n));
    v.visit_syntax(n);
    walk_keyword(&n.keyword, v);
    walk_string(&n.value, v);
}

fn walk_package<'a>(n: &'a PackageNode, v: &mut dyn Visitor<'a>) {
    v.visit_node(Node::Package(n));
    v.visit_package(n);
    walk_keyword(&n.keyword, v);
    walk_ident_value(&n.name, v);
}

fn walk_import<'a>(n: &'a ImportNode, v: &mut dyn Visitor<'a>) {
    v.visit_node(Node::Import(n));
    v.visit_import(n);
    walk_keyword(&n.keyword, v);
    if let Some(modifier) = &n.modifier {
        walk_keyword(modifier, v);
    }
    walk_string(&n.name, v);
}

fn walk_option<'a>(n: &'a OptionNode, v: &mut dyn Visitor<'a>) {
    v.visit_node(Node::Option(n));
    v.visit_option(n);
    if let Some(keyword) = &n.keyword {
        walk_keyword(keyword, v);
    }
    walk_option_name(&n.name, v);
    walk_option_value(&n.value, v);
}

fn walk_option_name<'a>(n: &'a OptionNameNode, v: &mut dyn Visitor<'a>) {
    v.visit_node(Node::OptionName(n));
    v.visit_option_name(n);
    for part in &n.parts {
        walk_field_reference(part, v);
    }
}

fn walk_field_reference<'a>(n: &'a FieldReferenceNode, v: &mut dyn Visitor<'a>) {
    v.visit_node(Node::FieldReference(n));
    v.visit_field_reference(n);
    walk_ident_value(&n.name, v);
}

fn walk_option_value<'a>(n: &'a OptionValueNode, v: &mut dyn Visitor<'a>) {
    match n {
        OptionValueNode::Ident(i) => walk_ident(i, v),
        OptionValueNode::String(s) => walk_string(s, v),
        OptionValueNode::Int(i) => walk_int(i, v),
        OptionValueNode::Float(f) => {
            v.visit_node(Node::FloatLiteral(f));
            v.visit_float_literal(f);
        }
        OptionValueNode::SignedFloat(f) => {
            v.visit_node(Node::SignedFloatLiteral(f));
            v.visit_signed_float_literal(f);
        }
        OptionValueNode::Message(m) => {
            v.visit_node(Node::MessageLiteral(m));
            v.visit_message_literal(m);
            for field in &m.fields {
                walk_field_reference(&field.name, v);
                walk_option_value(&field.value, v);
            }
        }
    }
}

fn walk_message<'a>(n: &'a MessageNode, v: &mut dyn Visitor<'a>) {
    v.visit_node(Node::Message(n));
    v.visit_message(n);
    walk_keyword(&n.keyword, v);
    walk_ident(&n.name, v);
    for element in &n.body {
        walk_message_element(element, v);
    }
}

fn walk_message_element<'a>(element: &'a MessageElement, v: &mut dyn Visitor<'a>) {
    match element {
        MessageElement::Field(n) => walk_field(n, v),
        MessageElement::Map(n) => walk_map_field(n, v),
        MessageElement::Group(n) => walk_group(n, v),
        MessageElement::Oneof(n) => walk_oneof(n, v),
        MessageElement::Message(n) => walk_message(n, v),
        MessageElement::Enum(n) => walk_enum(n, v),
        MessageElement::Extend(n) => walk_extend(n, v),
        MessageElement::Option(n) => walk_option(n, v),
        MessageElement::Reserved(n) => walk_reserved(n, v),
        MessageElement::Extensions(n) => walk_extension_range(n, v),
    }
}

fn walk_field<'a>(n: &'a FieldNode, v: &mut dyn Visitor<'a>) {
    v.visit_node(Node::Field(n));
    v.visit_field(n);
    if let Some(label) = &n.label {
        walk_keyword(label, v);
    }
    walk_ident_value(&n.field_type, v);
    walk_ident(&n.name, v);
    walk_int(&n.number, v);
    for option in &n.options {
        walk_option(option, v);
    }
}

fn walk_map_field<'a>(n: &'a MapFieldNode, v: &mut dyn Visitor<'a>) {
    v.visit_node(Node::MapField(n));
    v.visit_map_field(n);
    walk_keyword(&n.keyword, v);
    walk_ident(&n.key_type, v);
    walk_ident_value(&n.value_type, v);
    walk_ident(&n.name, v);
    walk_int(&n.number, v);
    for option in &n.options {
        walk_option(option, v);
    }
}

fn walk_group<'a>(n: &'a GroupNode, v: &mut dyn Visitor<'a>) {
    v.visit_node(Node::Group(n));
    v.visit_group(n);
    if let Some(label) = &n.label {
        walk_keyword(label, v);
    }
    walk_keyword(&n.keyword, v);
    walk_ident(&n.name, v);
    walk_int(&n.number, v);
    for element in &n.body {
        walk_message_element(element, v);
    }
}

fn walk_oneof<'a>(n: &'a OneofNode, v: &mut dyn Visitor<'a>) {
    v.visit_node(Node::Oneof(n));
    v.visit_oneof(n);
    walk_keyword(&n.keyword, v);
    walk_ident(&n.name, v);
    for element in &n.body {
        match element {
            OneofElement::Field(f) => walk_field(f, v),
            OneofElement::Group(g) => walk_group(g, v),
            OneofElement::Option(o) => walk_option(o, v),
        }
    }
}

fn walk_enum<'a>(n: &'a EnumNode, v: &mut dyn Visitor<'a>) {
    v.visit_node(Node::Enum(n));
    v.visit_enum(n);
    walk_keyword(&n.keyword, v);
    walk_ident(&n.name, v);
    for element in &n.body {
        match element {
            EnumElement::Value(value) => {
                v.visit_node(Node::EnumValue(value));
                v.visit_enum_value(value);
                walk_ident(&value.name, v);
                walk_int(&value.number, v);
                for option in &value.options {
                    walk_option(option, v);
                }
            }
            EnumElement::Option(o) => walk_option(o, v),
            EnumElement::Reserved(r) => walk_reserved(r, v),
        }
    }
}

fn walk_service<'a>(n: &'a ServiceNode, v: &mut dyn Visitor<'a>) {
    v.visit_node(Node::Service(n));
    v.visit_service(n);
    walk_keyword(&n.keyword, v);
    walk_ident(&n.name, v);
    for element in &n.body {
        match element {
            ServiceElement::Rpc(rpc) => walk_rpc(rpc, v),
            ServiceElement::Option(o) => walk_option(o, v),
        }
    }
}

fn walk_rpc<'a>(n: &'a RpcNode, v: &mut dyn Visitor<'a>) {
    v.visit_node(Node::Rpc(n));
    v.visit_rpc(n);
    walk_keyword(&n.keyword, v);
    walk_ident(&n.name, v);
    walk_rpc_type(&n.input, v);
    walk_keyword(&n.returns, v);
    walk_rpc_type(&n.output, v);
    for option in &n.options {
        walk_option(option, v);
    }
}

fn walk_rpc_type<'a>(n: &'a RpcTypeNode, v: &mut dyn Visitor<'a>) {
    v.visit_node(Node::RpcType(n));
    v.visit_rpc_type(n);
    if let Some(stream) = &n.stream {
        walk_keyword(stream, v);
    }
    walk_ident_value(&n.message_type, v);
}

fn walk_extend<'a>(n: &'a ExtendNode, v: &mut dyn Visitor<'a>) {
    v.visit_node(Node::Extend(n));
    v.visit_extend(n);
    walk_keyword(&n.keyword, v);
    walk_ident_value(&n.extendee, v);
    for element in &n.body {
        walk_message_element(element, v);
    }
}

fn walk_reserved<'a>(n: &'a ReservedNode, v: &mut dyn Visitor<'a>) {
    v.visit_node(Node::Reserved(n));
    v.visit_reserved(n);
    walk_keyword(&n.keyword, v);
    for range in &n.ranges {
        walk_tag_range(range, v);
    }
    for name in &n.names {
        walk_string(name, v);
    }
}

fn walk_tag_range<'a>(n: &'a TagRangeNode, v: &mut dyn Visitor<'a>) {
    walk_int(&n.start, v);
    match &n.end {
        Some(TagRangeEnd::Int(i)) => walk_int(i, v),
        Some(TagRangeEnd::Max(k)) => walk_keyword(k, v),
        None => {}
    }
}

fn walk_extension_range<'a>(n: &'a ExtensionRangeNode, v: &mut dyn Visitor<'a>) {
    v.visit_node(Node::ExtensionRange(n));
    v.visit_extension_range(n);
    walk_keyword(&n.keyword, v);
    for range in &n.ranges {
        walk_tag_range(range, v);
    }
    for option in &n.options {
        walk_option(option, v);
    }
}
