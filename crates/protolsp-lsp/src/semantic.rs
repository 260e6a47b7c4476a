//! Semantic token classification and the LSP delta encoding.

use protolsp_ast::{
    walk, EnumNode, EnumValueNode, FieldNode, FieldReferenceNode, FileNode, FloatLiteralNode,
    GroupNode, IntLiteralNode, KeywordNode, MapFieldNode, MessageNode, OneofNode, OptionNode,
    PackageNode, RpcNode, RpcTypeNode, ServiceNode, SignedFloatLiteralNode, SourceSpan,
    StringLiteralNode, Visitor,
};
use tower_lsp::lsp_types::{
    SemanticToken as LspSemanticToken, SemanticTokenModifier, SemanticTokensLegend,
};

use crate::cache::position::lsp_position;

/// Token types in legend order; the discriminant is the index the
/// encoding emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum TokenType {
    Namespace = 0,
    Type = 1,
    Enum = 2,
    Struct = 3,
    Interface = 4,
    TypeParameter = 5,
    Parameter = 6,
    Property = 7,
    EnumMember = 8,
    Method = 9,
    Keyword = 10,
    Modifier = 11,
    String = 12,
    Number = 13,
    Decorator = 14,
}

/// Modifier bits, in legend order.
pub const MODIFIER_DECLARATION: u32 = 1;
pub const MODIFIER_DEFINITION: u32 = 2;

pub fn legend() -> SemanticTokensLegend {
    use tower_lsp::lsp_types::SemanticTokenType as T;
    SemanticTokensLegend {
        token_types: vec![
            T::NAMESPACE,
            T::TYPE,
            T::ENUM,
            T::STRUCT,
            T::INTERFACE,
            T::TYPE_PARAMETER,
            T::PARAMETER,
            T::PROPERTY,
            T::ENUM_MEMBER,
            T::METHOD,
            T::KEYWORD,
            T::MODIFIER,
            T::STRING,
            T::NUMBER,
            T::DECORATOR,
        ],
        token_modifiers: vec![
            SemanticTokenModifier::DECLARATION,
            SemanticTokenModifier::DEFINITION,
        ],
    }
}

/// One classified token at an absolute position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SemanticToken {
    pub line: u32,
    pub start: u32,
    pub len: u32,
    pub token_type: TokenType,
    pub modifiers: u32,
}

/// Classifies every highlightable node in one pass and returns the
/// tokens sorted by (line, start).
pub fn collect(file: &FileNode) -> Vec<SemanticToken> {
    let mut collector = Collector { tokens: Vec::new() };
    walk(file, &mut collector);
    collector
        .tokens
        .sort_by(|a, b| (a.line, a.start).cmp(&(b.line, b.start)));
    collector.tokens
}

/// The LSP delta form: five integers per token. The first token carries
/// its absolute line and start; every later token carries a line delta,
/// and a start delta whenever it stays on the same line.
pub fn encode(tokens: &[SemanticToken]) -> Vec<u32> {
    let mut data = Vec::with_capacity(tokens.len() * 5);
    let mut last: Option<&SemanticToken> = None;
    for token in tokens {
        match last {
            None => {
                data.push(token.line);
                data.push(token.start);
            }
            Some(prev) => {
                let delta_line = token.line - prev.line;
                data.push(delta_line);
                if delta_line == 0 {
                    data.push(token.start - prev.start);
                } else {
                    data.push(token.start);
                }
            }
        }
        data.push(token.len);
        data.push(token.token_type as u32);
        data.push(token.modifiers);
        last = Some(token);
    }
    data
}

/// The encoded stream as tower-lsp's structured token list.
pub fn lsp_data(tokens: &[SemanticToken]) -> Vec<LspSemanticToken> {
    encode(tokens)
        .chunks_exact(5)
        .map(|chunk| LspSemanticToken {
            delta_line: chunk[0],
            delta_start: chunk[1],
            length: chunk[2],
            token_type: chunk[3],
            token_modifiers_bitset: chunk[4],
        })
        .collect()
}

struct Collector {
    tokens: Vec<SemanticToken>,
}

impl Collector {
    fn push(&mut self, span: SourceSpan, token_type: TokenType, modifiers: u32) {
        let start = lsp_position(span.start);
        self.tokens.push(SemanticToken {
            line: start.line,
            start: start.character,
            len: span.len_bytes() as u32,
            token_type,
            modifiers,
        });
    }
}

impl<'a> Visitor<'a> for Collector {
    fn visit_keyword(&mut self, node: &'a KeywordNode) {
        self.push(node.span, TokenType::Keyword, 0);
    }

    fn visit_package(&mut self, node: &'a PackageNode) {
        self.push(node.name.span(), TokenType::Namespace, MODIFIER_DECLARATION);
    }

    fn visit_service(&mut self, node: &'a ServiceNode) {
        self.push(node.name.span, TokenType::Interface, MODIFIER_DECLARATION);
    }

    fn visit_rpc(&mut self, node: &'a RpcNode) {
        self.push(node.name.span, TokenType::Method, MODIFIER_DECLARATION);
    }

    fn visit_rpc_type(&mut self, node: &'a RpcTypeNode) {
        self.push(node.message_type.span(), TokenType::Type, 0);
    }

    fn visit_message(&mut self, node: &'a MessageNode) {
        self.push(node.name.span, TokenType::Struct, MODIFIER_DECLARATION);
    }

    fn visit_enum(&mut self, node: &'a EnumNode) {
        self.push(node.name.span, TokenType::Enum, MODIFIER_DECLARATION);
    }

    fn visit_enum_value(&mut self, node: &'a EnumValueNode) {
        self.push(node.name.span, TokenType::EnumMember, MODIFIER_DECLARATION);
    }

    fn visit_field(&mut self, node: &'a FieldNode) {
        self.push(node.field_type.span(), TokenType::Type, MODIFIER_DECLARATION);
        self.push(node.name.span, TokenType::Property, MODIFIER_DECLARATION);
    }

    fn visit_map_field(&mut self, node: &'a MapFieldNode) {
        self.push(node.key_type.span, TokenType::Type, MODIFIER_DECLARATION);
        self.push(node.value_type.span(), TokenType::Type, MODIFIER_DECLARATION);
        self.push(node.name.span, TokenType::Property, MODIFIER_DECLARATION);
    }

    fn visit_oneof(&mut self, node: &'a OneofNode) {
        self.push(node.name.span, TokenType::Struct, MODIFIER_DECLARATION);
    }

    fn visit_group(&mut self, node: &'a GroupNode) {
        self.push(node.name.span, TokenType::Struct, MODIFIER_DECLARATION);
    }

    fn visit_option(&mut self, node: &'a OptionNode) {
        self.push(node.name.span, TokenType::Decorator, MODIFIER_DEFINITION);
    }

    fn visit_field_reference(&mut self, node: &'a FieldReferenceNode) {
        self.push(node.span, TokenType::Decorator, MODIFIER_DEFINITION);
    }

    fn visit_string_literal(&mut self, node: &'a StringLiteralNode) {
        self.push(node.span, TokenType::String, 0);
    }

    fn visit_int_literal(&mut self, node: &'a IntLiteralNode) {
        self.push(node.span, TokenType::Number, 0);
    }

    fn visit_float_literal(&mut self, node: &'a FloatLiteralNode) {
        self.push(node.span, TokenType::Number, 0);
    }

    fn visit_signed_float_literal(&mut self, node: &'a SignedFloatLiteralNode) {
        self.push(node.span, TokenType::Number, 0);
    }
}
