use std::collections::HashMap;

use protolsp_ast::*;

use crate::report::{ErrorWithSpan, Handler};
use crate::symbols::SymbolKind;

const MAX_FIELD_NUMBER: u64 = 536_870_911;
const RESERVED_NUMBER_LO: u64 = 19_000;
const RESERVED_NUMBER_HI: u64 = 19_999;

const MAP_KEY_TYPES: &[&str] = &[
    "int32", "int64", "uint32", "uint64", "sint32", "sint64", "fixed32", "fixed64", "sfixed32",
    "sfixed64", "bool", "string",
];

/// A declaration found in one file, under its fully-qualified name.
#[derive(Debug, Clone)]
pub struct DeclaredSymbol {
    pub full_name: String,
    pub kind: SymbolKind,
    pub span: SourceSpan,
}

/// Summary of one parsed file: its package, import paths in source order,
/// and every name it declares.
#[derive(Debug, Clone, Default)]
pub struct FileResult {
    pub package: String,
    pub imports: Vec<String>,
    pub symbols: Vec<DeclaredSymbol>,
}

/// Builds a [`FileResult`] from an AST. With `validate` set, structural
/// checks (field number ranges, duplicate names and numbers, enum shape,
/// map keys) are reported through `handler`; the result is still built.
pub fn result_from_ast(
    filename: &str,
    file: &FileNode,
    validate: bool,
    handler: &Handler<'_>,
) -> FileResult {
    let mut collector = Collector {
        filename,
        handler,
        validate,
        proto3: file
            .syntax
            .as_ref()
            .map(|s| s.value.value == "proto3")
            .unwrap_or(false),
        result: FileResult::default(),
        declared: HashMap::new(),
    };

    if validate {
        if let Some(syntax) = &file.syntax {
            let value = syntax.value.value.as_str();
            if value != "proto2" && value != "proto3" {
                collector.error(
                    syntax.value.span,
                    format!("unrecognized syntax `{value}`, expected `proto2` or `proto3`"),
                );
            }
        }
    }

    for decl in &file.decls {
        match decl {
            FileElement::Package(p) => {
                if collector.result.package.is_empty() {
                    collector.result.package = p.name.as_identifier();
                } else if validate {
                    collector.error(p.span, "multiple package declarations");
                }
            }
            FileElement::Import(i) => collector.result.imports.push(i.name.value.clone()),
            _ => {}
        }
    }

    let scope = collector.result.package.clone();
    for decl in &file.decls {
        match decl {
            FileElement::Message(m) => collector.message(&scope, m),
            FileElement::Enum(e) => collector.enumeration(&scope, e),
            FileElement::Service(s) => collector.service(&scope, s),
            FileElement::Extend(e) => collector.extend(&scope, e),
            _ => {}
        }
    }

    collector.result
}

struct Collector<'a, 'h> {
    filename: &'a str,
    handler: &'a Handler<'h>,
    validate: bool,
    proto3: bool,
    result: FileResult,
    declared: HashMap<String, SourceSpan>,
}

impl Collector<'_, '_> {
    fn error(&self, span: SourceSpan, message: impl Into<String>) {
        self.handler
            .error(ErrorWithSpan::new(self.filename, message, span));
    }

    fn declare(&mut self, scope: &str, name: &str, kind: SymbolKind, span: SourceSpan) -> String {
        let full_name = qualify(scope, name);
        if self.validate {
            if let Some(_previous) = self.declared.get(&full_name) {
                self.error(span, format!("`{full_name}` is already declared"));
            }
        }
        self.declared.insert(full_name.clone(), span);
        self.result.symbols.push(DeclaredSymbol {
            full_name: full_name.clone(),
            kind,
            span,
        });
        full_name
    }

    fn check_field_number(&self, number: &IntLiteralNode) {
        if !self.validate {
            return;
        }
        if number.negative || number.value == 0 || number.value > MAX_FIELD_NUMBER {
            self.error(
                number.span,
                format!("field number must be in range 1..={MAX_FIELD_NUMBER}"),
            );
        } else if (RESERVED_NUMBER_LO..=RESERVED_NUMBER_HI).contains(&number.value) {
            self.error(
                number.span,
                format!(
                    "field number {} is in the reserved range {RESERVED_NUMBER_LO}..={RESERVED_NUMBER_HI}",
                    number.value
                ),
            );
        }
    }

    fn message(&mut self, scope: &str, node: &MessageNode) {
        let full_name = self.declare(scope, &node.name.value, SymbolKind::Message, node.name.span);
        self.message_body(&full_name, &node.body, node.span);
    }

    fn message_body(&mut self, scope: &str, body: &[MessageElement], _span: SourceSpan) {
        let mut numbers: HashMap<u64, SourceSpan> = HashMap::new();
        for element in body {
            match element {
                MessageElement::Field(f) => self.field(scope, f, &mut numbers),
                MessageElement::Map(f) => self.map_field(scope, f, &mut numbers),
                MessageElement::Group(g) => self.group(scope, g, &mut numbers),
                MessageElement::Oneof(o) => {
                    self.declare(scope, &o.name.value, SymbolKind::Oneof, o.name.span);
                    for inner in &o.body {
                        match inner {
                            OneofElement::Field(f) => self.field(scope, f, &mut numbers),
                            OneofElement::Group(g) => self.group(scope, g, &mut numbers),
                            OneofElement::Option(_) => {}
                        }
                    }
                }
                MessageElement::Message(m) => self.message(scope, m),
                MessageElement::Enum(e) => self.enumeration(scope, e),
                MessageElement::Extend(e) => self.extend(scope, e),
                MessageElement::Option(_)
                | MessageElement::Reserved(_)
                | MessageElement::Extensions(_) => {}
            }
        }
    }

    fn field(&mut self, scope: &str, node: &FieldNode, numbers: &mut HashMap<u64, SourceSpan>) {
        self.declare(scope, &node.name.value, SymbolKind::Field, node.name.span);
        self.check_field_number(&node.number);
        self.check_duplicate_number(node.number.value, node.number.span, numbers);
        if self.validate && self.proto3 {
            if let Some(label) = &node.label {
                if label.text == "required" {
                    self.error(label.span, "`required` fields are not allowed in proto3");
                }
            }
        }
    }

    fn map_field(
        &mut self,
        scope: &str,
        node: &MapFieldNode,
        numbers: &mut HashMap<u64, SourceSpan>,
    ) {
        self.declare(scope, &node.name.value, SymbolKind::Field, node.name.span);
        self.check_field_number(&node.number);
        self.check_duplicate_number(node.number.value, node.number.span, numbers);
        if self.validate && !MAP_KEY_TYPES.contains(&node.key_type.value.as_str()) {
            self.error(
                node.key_type.span,
                format!("`{}` is not a valid map key type", node.key_type.value),
            );
        }
    }

    fn group(&mut self, scope: &str, node: &GroupNode, numbers: &mut HashMap<u64, SourceSpan>) {
        if self.validate && self.proto3 {
            self.error(node.keyword.span, "groups are not allowed in proto3");
        }
        let full_name = self.declare(scope, &node.name.value, SymbolKind::Group, node.name.span);
        self.check_field_number(&node.number);
        self.check_duplicate_number(node.number.value, node.number.span, numbers);
        self.message_body(&full_name, &node.body, node.span);
    }

    fn check_duplicate_number(
        &self,
        value: u64,
        span: SourceSpan,
        numbers: &mut HashMap<u64, SourceSpan>,
    ) {
        if let Some(_previous) = numbers.get(&value) {
            if self.validate {
                self.error(span, format!("field number {value} is already used"));
            }
        } else {
            numbers.insert(value, span);
        }
    }

    fn enumeration(&mut self, scope: &str, node: &EnumNode) {
        self.declare(scope, &node.name.value, SymbolKind::Enum, node.name.span);
        let mut first = true;
        let mut any_value = false;
        for element in &node.body {
            if let EnumElement::Value(value) = element {
                any_value = true;
                // enum values scope to the enum's parent, as in protoc
                self.declare(scope, &value.name.value, SymbolKind::EnumValue, value.name.span);
                if self.validate && self.proto3 && first {
                    if value.number.negative || value.number.value != 0 {
                        self.error(
                            value.number.span,
                            "the first enum value must be zero in proto3",
                        );
                    }
                }
                first = false;
            }
        }
        if self.validate && !any_value {
            self.error(node.name.span, "enums must have at least one value");
        }
    }

    fn service(&mut self, scope: &str, node: &ServiceNode) {
        let full_name = self.declare(scope, &node.name.value, SymbolKind::Service, node.name.span);
        for element in &node.body {
            if let ServiceElement::Rpc(rpc) = element {
                self.declare(&full_name, &rpc.name.value, SymbolKind::Method, rpc.name.span);
            }
        }
    }

    fn extend(&mut self, scope: &str, node: &ExtendNode) {
        // extension fields declare names in the enclosing scope
        let mut numbers = HashMap::new();
        for element in &node.body {
            match element {
                MessageElement::Field(f) => self.field(scope, f, &mut numbers),
                MessageElement::Group(g) => self.group(scope, g, &mut numbers),
                _ => {}
            }
        }
    }
}

fn qualify(scope: &str, name: &str) -> String {
    if scope.is_empty() {
        name.to_string()
    } else {
        format!("{scope}.{name}")
    }
}
