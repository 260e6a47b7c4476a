use crate::span::SourceSpan;

/// A keyword token (`message`, `syntax`, `repeated`, ...).
#[derive(Debug, Clone, PartialEq)]
pub struct KeywordNode {
    pub text: String,
    pub span: SourceSpan,
}

/// A single identifier.
#[derive(Debug, Clone, PartialEq)]
pub struct IdentNode {
    pub value: String,
    pub span: SourceSpan,
}

/// A dotted identifier like `google.protobuf.Empty`. `leading_dot` marks a
/// fully-qualified reference (`.foo.Bar`).
#[derive(Debug, Clone, PartialEq)]
pub struct CompoundIdentNode {
    pub leading_dot: bool,
    pub components: Vec<IdentNode>,
    pub span: SourceSpan,
}

impl CompoundIdentNode {
    pub fn as_identifier(&self) -> String {
        let joined = self
            .components
            .iter()
            .map(|c| c.value.as_str())
            .collect::<Vec<_>>()
            .join(".");
        if self.leading_dot {
            format!(".{joined}")
        } else {
            joined
        }
    }
}

/// Either a plain or a dotted identifier; type references and package
/// names can be both.
#[derive(Debug, Clone, PartialEq)]
pub enum IdentValueNode {
    Ident(IdentNode),
    Compound(CompoundIdentNode),
}

impl IdentValueNode {
    pub fn as_identifier(&self) -> String {
        match self {
            IdentValueNode::Ident(n) => n.value.clone(),
            IdentValueNode::Compound(n) => n.as_identifier(),
        }
    }

    pub fn span(&self) -> SourceSpan {
        match self {
            IdentValueNode::Ident(n) => n.span,
            IdentValueNode::Compound(n) => n.span,
        }
    }
}

/// A string literal; `value` is the decoded contents, the span covers the
/// quotes. Adjacent literals are concatenated by the parser.
#[derive(Debug, Clone, PartialEq)]
pub struct StringLiteralNode {
    pub value: String,
    pub span: SourceSpan,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IntLiteralNode {
    pub negative: bool,
    pub value: u64,
    pub span: SourceSpan,
}

impl IntLiteralNode {
    pub fn as_i64(&self) -> Option<i64> {
        if self.negative {
            if self.value <= i64::MAX as u64 + 1 {
                Some((self.value as i128).wrapping_neg() as i64)
            } else {
                None
            }
        } else {
            i64::try_from(self.value).ok()
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FloatLiteralNode {
    pub value: f64,
    pub span: SourceSpan,
}

/// A float literal with an explicit sign, e.g. `-1.5` in an option value.
#[derive(Debug, Clone, PartialEq)]
pub struct SignedFloatLiteralNode {
    pub negative: bool,
    pub value: f64,
    pub span: SourceSpan,
}

// ── File level ───────────────────────────────────────────────────

/// Root of a parsed file.
#[derive(Debug, Clone, PartialEq)]
pub struct FileNode {
    pub syntax: Option<SyntaxNode>,
    pub decls: Vec<FileElement>,
    pub span: SourceSpan,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FileElement {
    Package(PackageNode),
    Import(ImportNode),
    Option(OptionNode),
    Message(MessageNode),
    Enum(EnumNode),
    Service(ServiceNode),
    Extend(ExtendNode),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SyntaxNode {
    pub keyword: KeywordNode,
    pub value: StringLiteralNode,
    pub span: SourceSpan,
    pub leading_comments: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PackageNode {
    pub keyword: KeywordNode,
    pub name: IdentValueNode,
    pub span: SourceSpan,
    pub leading_comments: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImportNode {
    pub keyword: KeywordNode,
    /// `public` or `weak`, when present.
    pub modifier: Option<KeywordNode>,
    pub name: StringLiteralNode,
    pub span: SourceSpan,
    pub leading_comments: Vec<String>,
}

// ── Options ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct OptionNode {
    /// `option` keyword; absent in compact option lists (`[a = 1]`).
    pub keyword: Option<KeywordNode>,
    pub name: OptionNameNode,
    pub value: OptionValueNode,
    pub span: SourceSpan,
    pub leading_comments: Vec<String>,
}

/// An option name, e.g. `(my.ext).field.deprecated` is three parts.
#[derive(Debug, Clone, PartialEq)]
pub struct OptionNameNode {
    pub parts: Vec<FieldReferenceNode>,
    pub span: SourceSpan,
}

/// One component of an option name or one key of a message literal.
/// `is_extension` marks parenthesized custom option references.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldReferenceNode {
    pub is_extension: bool,
    pub name: IdentValueNode,
    pub span: SourceSpan,
}

#[derive(Debug, Clone, PartialEq)]
pub enum OptionValueNode {
    Ident(IdentNode),
    String(StringLiteralNode),
    Int(IntLiteralNode),
    Float(FloatLiteralNode),
    SignedFloat(SignedFloatLiteralNode),
    Message(MessageLiteralNode),
}

impl OptionValueNode {
    pub fn span(&self) -> SourceSpan {
        match self {
            OptionValueNode::Ident(n) => n.span,
            OptionValueNode::String(n) => n.span,
            OptionValueNode::Int(n) => n.span,
            OptionValueNode::Float(n) => n.span,
            OptionValueNode::SignedFloat(n) => n.span,
            OptionValueNode::Message(n) => n.span,
        }
    }
}

/// `{ key: value ... }` aggregate option value.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageLiteralNode {
    pub fields: Vec<MessageLiteralFieldNode>,
    pub span: SourceSpan,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MessageLiteralFieldNode {
    pub name: FieldReferenceNode,
    pub value: OptionValueNode,
    pub span: SourceSpan,
}

// ── Messages ─────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct MessageNode {
    pub keyword: KeywordNode,
    pub name: IdentNode,
    pub body: Vec<MessageElement>,
    pub span: SourceSpan,
    pub leading_comments: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MessageElement {
    Field(FieldNode),
    Map(MapFieldNode),
    Group(GroupNode),
    Oneof(OneofNode),
    Message(MessageNode),
    Enum(EnumNode),
    Extend(ExtendNode),
    Option(OptionNode),
    Reserved(ReservedNode),
    Extensions(ExtensionRangeNode),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldNode {
    /// `optional`, `required` or `repeated`, when present.
    pub label: Option<KeywordNode>,
    pub field_type: IdentValueNode,
    pub name: IdentNode,
    pub number: IntLiteralNode,
    pub options: Vec<OptionNode>,
    pub span: SourceSpan,
    pub leading_comments: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MapFieldNode {
    pub keyword: KeywordNode,
    pub key_type: IdentNode,
    pub value_type: IdentValueNode,
    pub name: IdentNode,
    pub number: IntLiteralNode,
    pub options: Vec<OptionNode>,
    pub span: SourceSpan,
    pub leading_comments: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GroupNode {
    pub label: Option<KeywordNode>,
    pub keyword: KeywordNode,
    pub name: IdentNode,
    pub number: IntLiteralNode,
    pub body: Vec<MessageElement>,
    pub span: SourceSpan,
    pub leading_comments: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OneofNode {
    pub keyword: KeywordNode,
    pub name: IdentNode,
    pub body: Vec<OneofElement>,
    pub span: SourceSpan,
    pub leading_comments: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum OneofElement {
    Field(FieldNode),
    Group(GroupNode),
    Option(OptionNode),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExtendNode {
    pub keyword: KeywordNode,
    pub extendee: IdentValueNode,
    pub body: Vec<MessageElement>,
    pub span: SourceSpan,
    pub leading_comments: Vec<String>,
}

/// `reserved 2, 15, 9 to 11;` or `reserved "foo", "bar";`
#[derive(Debug, Clone, PartialEq)]
pub struct ReservedNode {
    pub keyword: KeywordNode,
    pub ranges: Vec<TagRangeNode>,
    pub names: Vec<StringLiteralNode>,
    pub span: SourceSpan,
    pub leading_comments: Vec<String>,
}

/// A tag range; `max` stands in for the upper bound when present.
#[derive(Debug, Clone, PartialEq)]
pub struct TagRangeNode {
    pub start: IntLiteralNode,
    pub end: Option<TagRangeEnd>,
    pub span: SourceSpan,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TagRangeEnd {
    Int(IntLiteralNode),
    Max(KeywordNode),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExtensionRangeNode {
    pub keyword: KeywordNode,
    pub ranges: Vec<TagRangeNode>,
    pub options: Vec<OptionNode>,
    pub span: SourceSpan,
    pub leading_comments: Vec<String>,
}

// ── Enums ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct EnumNode {
    pub keyword: KeywordNode,
    pub name: IdentNode,
    pub body: Vec<EnumElement>,
    pub span: SourceSpan,
    pub leading_comments: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EnumElement {
    Value(EnumValueNode),
    Option(OptionNode),
    Reserved(ReservedNode),
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumValueNode {
    pub name: IdentNode,
    pub number: IntLiteralNode,
    pub options: Vec<OptionNode>,
    pub span: SourceSpan,
    pub leading_comments: Vec<String>,
}

// ── Services ─────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct ServiceNode {
    pub keyword: KeywordNode,
    pub name: IdentNode,
    pub body: Vec<ServiceElement>,
    pub span: SourceSpan,
    pub leading_comments: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ServiceElement {
    Rpc(RpcNode),
    Option(OptionNode),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RpcNode {
    pub keyword: KeywordNode,
    pub name: IdentNode,
    pub input: RpcTypeNode,
    pub returns: KeywordNode,
    pub output: RpcTypeNode,
    pub options: Vec<OptionNode>,
    pub span: SourceSpan,
    pub leading_comments: Vec<String>,
}

/// `(stream Foo)` half of an rpc signature.
#[derive(Debug, Clone, PartialEq)]
pub struct RpcTypeNode {
    pub stream: Option<KeywordNode>,
    pub message_type: IdentValueNode,
    pub span: SourceSpan,
}
