use protolsp_ast::*;

use crate::lexer::{tokenize, SpannedToken, Token};
use crate::report::{ErrorWithSpan, Handler};

/// Parses `source` into a best-effort AST. Problems are reported through
/// `handler`; the parser recovers at declaration boundaries and keeps
/// going, so the returned tree covers everything it could make sense of.
pub fn parse(filename: &str, source: &str, handler: &Handler<'_>) -> FileNode {
    let tokens = tokenize(filename, source, handler);
    let eof = tokens
        .last()
        .map(|t| t.span.end)
        .unwrap_or(SourcePos::new(1, 1, 0));
    let mut parser = Parser {
        filename,
        tokens,
        pos: 0,
        last_end: SourcePos::new(1, 1, 0),
        pending_comments: Vec::new(),
        handler,
        eof,
    };
    parser.parse_file(source.len())
}

struct Parser<'a, 'h> {
    filename: &'a str,
    tokens: Vec<SpannedToken>,
    pos: usize,
    last_end: SourcePos,
    pending_comments: Vec<String>,
    handler: &'a Handler<'h>,
    eof: SourcePos,
}

impl<'a, 'h> Parser<'a, 'h> {
    // ── token plumbing ───────────────────────────────────────────

    fn skip_trivia(&mut self) {
        while let Some(t) = self.tokens.get(self.pos) {
            if let Token::Comment(text) = &t.token {
                self.pending_comments.push(text.clone());
                self.last_end = t.span.end;
                self.pos += 1;
            } else {
                break;
            }
        }
    }

    fn peek(&mut self) -> Option<&Token> {
        self.skip_trivia();
        self.tokens.get(self.pos).map(|t| &t.token)
    }

    fn peek_cloned(&mut self) -> Option<Token> {
        self.peek().cloned()
    }

    fn peek_second(&mut self) -> Option<&Token> {
        self.skip_trivia();
        self.tokens[self.pos..]
            .iter()
            .skip(1)
            .find(|t| !matches!(t.token, Token::Comment(_)))
            .map(|t| &t.token)
    }

    fn peek_ident(&mut self) -> Option<&str> {
        match self.peek() {
            Some(Token::Ident(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    fn span(&mut self) -> SourceSpan {
        self.skip_trivia();
        self.tokens
            .get(self.pos)
            .map(|t| t.span)
            .unwrap_or(SourceSpan::new(self.eof, self.eof))
    }

    fn advance(&mut self) -> Option<SpannedToken> {
        self.skip_trivia();
        let tok = self.tokens.get(self.pos).cloned();
        if let Some(t) = &tok {
            self.last_end = t.span.end;
            self.pos += 1;
        }
        tok
    }

    fn take_comments(&mut self) -> Vec<String> {
        self.skip_trivia();
        std::mem::take(&mut self.pending_comments)
    }

    fn error_here(&mut self, message: impl Into<String>) {
        let span = self.span();
        self.handler
            .error(ErrorWithSpan::new(self.filename, message, span));
    }

    fn eat(&mut self, expected: &Token) -> Option<SourceSpan> {
        if self.peek() == Some(expected) {
            self.advance().map(|t| t.span)
        } else {
            None
        }
    }

    fn expect(&mut self, expected: &Token) -> Option<SourceSpan> {
        if let Some(span) = self.eat(expected) {
            return Some(span);
        }
        let got = match self.peek() {
            Some(t) => t.describe(),
            None => "end of file".to_string(),
        };
        self.error_here(format!("expected {}, got {got}", expected.describe()));
        None
    }

    fn expect_semi(&mut self) {
        self.expect(&Token::Semi);
    }

    /// Consumes the already-peeked identifier as a keyword token.
    fn take_keyword(&mut self) -> KeywordNode {
        match self.advance() {
            Some(SpannedToken {
                token: Token::Ident(text),
                span,
            }) => KeywordNode { text, span },
            Some(other) => KeywordNode {
                text: String::new(),
                span: other.span,
            },
            None => KeywordNode {
                text: String::new(),
                span: SourceSpan::new(self.eof, self.eof),
            },
        }
    }

    fn ident(&mut self) -> Option<IdentNode> {
        match self.peek() {
            Some(Token::Ident(_)) => match self.advance() {
                Some(SpannedToken {
                    token: Token::Ident(value),
                    span,
                }) => Some(IdentNode { value, span }),
                _ => None,
            },
            other => {
                let got = other.map(|t| t.describe());
                self.error_here(format!(
                    "expected identifier, got {}",
                    got.unwrap_or_else(|| "end of file".to_string())
                ));
                None
            }
        }
    }

    /// A possibly dotted type or package name, with an optional leading dot.
    fn type_name(&mut self) -> Option<IdentValueNode> {
        let leading_dot = self.eat(&Token::Dot);
        let first = self.ident()?;
        if leading_dot.is_none() && self.peek() != Some(&Token::Dot) {
            return Some(IdentValueNode::Ident(first));
        }
        let start = leading_dot.unwrap_or(first.span);
        let mut components = vec![first];
        while self.eat(&Token::Dot).is_some() {
            match self.ident() {
                Some(part) => components.push(part),
                None => break,
            }
        }
        let end = components.last().map(|c| c.span).unwrap_or(start);
        Some(IdentValueNode::Compound(CompoundIdentNode {
            leading_dot: leading_dot.is_some(),
            components,
            span: start.to(end),
        }))
    }

    /// A string literal; adjacent literals concatenate.
    fn string_value(&mut self) -> Option<StringLiteralNode> {
        let first = match self.peek() {
            Some(Token::StrLit(_)) => self.advance()?,
            other => {
                let got = other.map(|t| t.describe());
                self.error_here(format!(
                    "expected string literal, got {}",
                    got.unwrap_or_else(|| "end of file".to_string())
                ));
                return None;
            }
        };
        let mut span = first.span;
        let mut value = match first.token {
            Token::StrLit(s) => s,
            _ => return None,
        };
        while let Some(Token::StrLit(_)) = self.peek() {
            if let Some(SpannedToken {
                token: Token::StrLit(next),
                span: next_span,
            }) = self.advance()
            {
                value.push_str(&next);
                span = span.to(next_span);
            }
        }
        Some(StringLiteralNode { value, span })
    }

    fn int_literal(&mut self) -> Option<IntLiteralNode> {
        match self.peek() {
            Some(Token::IntLit(_)) => match self.advance() {
                Some(SpannedToken {
                    token: Token::IntLit(value),
                    span,
                }) => Some(IntLiteralNode {
                    negative: false,
                    value,
                    span,
                }),
                _ => None,
            },
            other => {
                let got = other.map(|t| t.describe());
                self.error_here(format!(
                    "expected integer, got {}",
                    got.unwrap_or_else(|| "end of file".to_string())
                ));
                None
            }
        }
    }

    // ── recovery ─────────────────────────────────────────────────

    /// Skips forward to the next plausible declaration boundary: past a
    /// `;`, past a balanced `}`, or up to end of file.
    fn recover(&mut self) {
        let mut depth = 0usize;
        while let Some(tok) = self.peek_cloned() {
            match tok {
                Token::Semi if depth == 0 => {
                    self.advance();
                    return;
                }
                Token::LBrace => {
                    depth += 1;
                    self.advance();
                }
                Token::RBrace => {
                    if depth <= 1 {
                        if depth == 1 {
                            self.advance();
                        }
                        return;
                    }
                    depth -= 1;
                    self.advance();
                }
                _ => {
                    self.advance();
                }
            }
        }
    }

    // ── file level ───────────────────────────────────────────────

    fn parse_file(&mut self, source_len: usize) -> FileNode {
        let start = SourcePos::new(1, 1, 0);
        let mut syntax = None;
        let mut decls = Vec::new();

        while !self.handler.aborted() {
            let comments = self.take_comments();
            let Some(tok) = self.peek_cloned() else { break };
            match tok {
                Token::Semi => {
                    self.advance();
                }
                Token::Ident(name) => match name.as_str() {
                    "syntax" => {
                        if let Some(node) = self.parse_syntax(comments) {
                            syntax = Some(node);
                        }
                    }
                    "package" => {
                        if let Some(node) = self.parse_package(comments) {
                            decls.push(FileElement::Package(node));
                        }
                    }
                    "import" => {
                        if let Some(node) = self.parse_import(comments) {
                            decls.push(FileElement::Import(node));
                        }
                    }
                    "option" => {
                        if let Some(node) = self.parse_option_decl(comments) {
                            decls.push(FileElement::Option(node));
                        }
                    }
                    "message" => {
                        if let Some(node) = self.parse_message(comments) {
                            decls.push(FileElement::Message(node));
                        }
                    }
                    "enum" => {
                        if let Some(node) = self.parse_enum(comments) {
                            decls.push(FileElement::Enum(node));
                        }
                    }
                    "service" => {
                        if let Some(node) = self.parse_service(comments) {
                            decls.push(FileElement::Service(node));
                        }
                    }
                    "extend" => {
                        if let Some(node) = self.parse_extend(comments) {
                            decls.push(FileElement::Extend(node));
                        }
                    }
                    other => {
                        self.error_here(format!("unexpected `{other}` at file scope"));
                        self.recover();
                    }
                },
                other => {
                    let got = other.describe();
                    self.error_here(format!("unexpected {got} at file scope"));
                    self.recover();
                }
            }
        }

        let mut end = self.eof;
        end.offset = end.offset.max(source_len);
        FileNode {
            syntax,
            decls,
            span: SourceSpan::new(start, end),
        }
    }

    fn parse_syntax(&mut self, comments: Vec<String>) -> Option<SyntaxNode> {
        let keyword = self.take_keyword();
        self.expect(&Token::Eq)?;
        let value = self.string_value()?;
        self.expect_semi();
        Some(SyntaxNode {
            span: keyword.span.to(SourceSpan::new(self.last_end, self.last_end)),
            keyword,
            value,
            leading_comments: comments,
        })
    }

    fn parse_package(&mut self, comments: Vec<String>) -> Option<PackageNode> {
        let keyword = self.take_keyword();
        let name = match self.type_name() {
            Some(name) => name,
            None => {
                self.recover();
                return None;
            }
        };
        self.expect_semi();
        Some(PackageNode {
            span: keyword.span.to(SourceSpan::new(self.last_end, self.last_end)),
            keyword,
            name,
            leading_comments: comments,
        })
    }

    fn parse_import(&mut self, comments: Vec<String>) -> Option<ImportNode> {
        let keyword = self.take_keyword();
        let modifier = match self.peek_ident() {
            Some("public") | Some("weak") => Some(self.take_keyword()),
            _ => None,
        };
        let name = match self.string_value() {
            Some(name) => name,
            None => {
                self.recover();
                return None;
            }
        };
        self.expect_semi();
        Some(ImportNode {
            span: keyword.span.to(SourceSpan::new(self.last_end, self.last_end)),
            keyword,
            modifier,
            name,
            leading_comments: comments,
        })
    }

    // ── options ──────────────────────────────────────────────────

    fn parse_option_decl(&mut self, comments: Vec<String>) -> Option<OptionNode> {
        let keyword = self.take_keyword();
        let node = self.parse_option_body(Some(keyword), comments);
        if node.is_some() {
            self.expect_semi();
        } else {
            self.recover();
        }
        node
    }

    fn parse_option_body(
        &mut self,
        keyword: Option<KeywordNode>,
        comments: Vec<String>,
    ) -> Option<OptionNode> {
        let start = keyword
            .as_ref()
            .map(|k| k.span)
            .unwrap_or_else(|| self.span());
        let name = self.option_name()?;
        self.expect(&Token::Eq)?;
        let value = self.option_value()?;
        Some(OptionNode {
            span: start.to(value.span()),
            keyword,
            name,
            value,
            leading_comments: comments,
        })
    }

    fn option_name(&mut self) -> Option<OptionNameNode> {
        let first = self.option_name_part()?;
        let start = first.span;
        let mut parts = vec![first];
        while self.eat(&Token::Dot).is_some() {
            match self.option_name_part() {
                Some(part) => parts.push(part),
                None => break,
            }
        }
        let end = parts.last().map(|p| p.span).unwrap_or(start);
        Some(OptionNameNode {
            span: start.to(end),
            parts,
        })
    }

    fn option_name_part(&mut self) -> Option<FieldReferenceNode> {
        if let Some(open) = self.eat(&Token::LParen) {
            let name = self.type_name()?;
            let close = self.expect(&Token::RParen).unwrap_or_else(|| name.span());
            return Some(FieldReferenceNode {
                is_extension: true,
                name,
                span: open.to(close),
            });
        }
        let ident = self.ident()?;
        Some(FieldReferenceNode {
            is_extension: false,
            span: ident.span,
            name: IdentValueNode::Ident(ident),
        })
    }

    fn option_value(&mut self) -> Option<OptionValueNode> {
        match self.peek() {
            Some(Token::StrLit(_)) => self.string_value().map(OptionValueNode::String),
            Some(Token::IntLit(_)) => self.int_literal().map(OptionValueNode::Int),
            Some(Token::FloatLit(_)) => match self.advance() {
                Some(SpannedToken {
                    token: Token::FloatLit(value),
                    span,
                }) => Some(OptionValueNode::Float(FloatLiteralNode { value, span })),
                _ => None,
            },
            Some(Token::Minus) | Some(Token::Plus) => self.signed_value(),
            Some(Token::Ident(_)) => self.ident().map(OptionValueNode::Ident),
            Some(Token::LBrace) => self.message_literal().map(OptionValueNode::Message),
            other => {
                let got = other.map(|t| t.describe());
                self.error_here(format!(
                    "expected option value, got {}",
                    got.unwrap_or_else(|| "end of file".to_string())
                ));
                None
            }
        }
    }

    fn signed_value(&mut self) -> Option<OptionValueNode> {
        let sign = self.advance()?;
        let negative = sign.token == Token::Minus;
        match self.peek() {
            Some(Token::IntLit(_)) => {
                let mut lit = self.int_literal()?;
                lit.negative = negative;
                lit.span = sign.span.to(lit.span);
                Some(OptionValueNode::Int(lit))
            }
            Some(Token::FloatLit(_)) => match self.advance() {
                Some(SpannedToken {
                    token: Token::FloatLit(value),
                    span,
                }) => Some(OptionValueNode::SignedFloat(SignedFloatLiteralNode {
                    negative,
                    value,
                    span: sign.span.to(span),
                })),
                _ => None,
            },
            Some(Token::Ident(name)) if name == "inf" => {
                let ident = self.ident()?;
                Some(OptionValueNode::SignedFloat(SignedFloatLiteralNode {
                    negative,
                    value: f64::INFINITY,
                    span: sign.span.to(ident.span),
                }))
            }
            _ => {
                self.error_here("expected number after sign");
                None
            }
        }
    }

    fn message_literal(&mut self) -> Option<MessageLiteralNode> {
        let open = self.expect(&Token::LBrace)?;
        let mut fields = Vec::new();
        loop {
            match self.peek() {
                None => {
                    self.error_here("unterminated message literal");
                    break;
                }
                Some(Token::RBrace) => break,
                Some(Token::Comma) | Some(Token::Semi) => {
                    self.advance();
                }
                _ => match self.message_literal_field() {
                    Some(field) => fields.push(field),
                    None => {
                        self.recover();
                        break;
                    }
                },
            }
        }
        let close = self.eat(&Token::RBrace).unwrap_or_else(|| self.span());
        Some(MessageLiteralNode {
            fields,
            span: open.to(close),
        })
    }

    fn message_literal_field(&mut self) -> Option<MessageLiteralFieldNode> {
        let name = if let Some(open) = self.eat(&Token::LBracket) {
            let name = self.type_name()?;
            let close = self.expect(&Token::RBracket).unwrap_or_else(|| name.span());
            FieldReferenceNode {
                is_extension: true,
                name,
                span: open.to(close),
            }
        } else {
            let ident = self.ident()?;
            FieldReferenceNode {
                is_extension: false,
                span: ident.span,
                name: IdentValueNode::Ident(ident),
            }
        };
        // the colon is optional before a nested literal
        if self.peek() != Some(&Token::LBrace) {
            self.expect(&Token::Colon)?;
        } else {
            self.eat(&Token::Colon);
        }
        let value = self.option_value()?;
        Some(MessageLiteralFieldNode {
            span: name.span.to(value.span()),
            name,
            value,
        })
    }

    fn compact_options(&mut self) -> Vec<OptionNode> {
        let mut options = Vec::new();
        if self.eat(&Token::LBracket).is_none() {
            return options;
        }
        loop {
            match self.parse_option_body(None, Vec::new()) {
                Some(option) => options.push(option),
                None => {
                    self.recover();
                    return options;
                }
            }
            if self.eat(&Token::Comma).is_none() {
                break;
            }
        }
        self.expect(&Token::RBracket);
        options
    }

    // ── messages ─────────────────────────────────────────────────

    fn parse_message(&mut self, comments: Vec<String>) -> Option<MessageNode> {
        let keyword = self.take_keyword();
        let name = match self.ident() {
            Some(name) => name,
            None => {
                self.recover();
                return None;
            }
        };
        self.expect(&Token::LBrace)?;
        let body = self.parse_message_body();
        let close = self.eat(&Token::RBrace).unwrap_or_else(|| self.span());
        Some(MessageNode {
            span: keyword.span.to(close),
            keyword,
            name,
            body,
            leading_comments: comments,
        })
    }

    fn parse_message_body(&mut self) -> Vec<MessageElement> {
        let mut body = Vec::new();
        while !self.handler.aborted() {
            let comments = self.take_comments();
            match self.peek_cloned() {
                None => {
                    self.error_here("expected `}`, got end of file");
                    break;
                }
                Some(Token::RBrace) => break,
                Some(Token::Semi) => {
                    self.advance();
                }
                Some(Token::Dot) => {
                    if let Some(field) = self.parse_field(None, comments) {
                        body.push(MessageElement::Field(field));
                    }
                }
                Some(Token::Ident(name)) => match name.as_str() {
                    "option" => {
                        if let Some(node) = self.parse_option_decl(comments) {
                            body.push(MessageElement::Option(node));
                        }
                    }
                    "message" => {
                        if let Some(node) = self.parse_message(comments) {
                            body.push(MessageElement::Message(node));
                        }
                    }
                    "enum" => {
                        if let Some(node) = self.parse_enum(comments) {
                            body.push(MessageElement::Enum(node));
                        }
                    }
                    "extend" => {
                        if let Some(node) = self.parse_extend(comments) {
                            body.push(MessageElement::Extend(node));
                        }
                    }
                    "oneof" => {
                        if let Some(node) = self.parse_oneof(comments) {
                            body.push(MessageElement::Oneof(node));
                        }
                    }
                    "reserved" => {
                        if let Some(node) = self.parse_reserved(comments) {
                            body.push(MessageElement::Reserved(node));
                        }
                    }
                    "extensions" => {
                        if let Some(node) = self.parse_extension_range(comments) {
                            body.push(MessageElement::Extensions(node));
                        }
                    }
                    "map" if self.peek_second() == Some(&Token::LAngle) => {
                        if let Some(node) = self.parse_map_field(comments) {
                            body.push(MessageElement::Map(node));
                        }
                    }
                    "repeated" | "optional" | "required" => {
                        let label = self.take_keyword();
                        if self.peek_ident() == Some("group")
                            && matches!(self.peek_second(), Some(Token::Ident(_)))
                        {
                            if let Some(node) = self.parse_group(Some(label), comments) {
                                body.push(MessageElement::Group(node));
                            }
                        } else if let Some(node) = self.parse_field(Some(label), comments) {
                            body.push(MessageElement::Field(node));
                        }
                    }
                    "group" if matches!(self.peek_second(), Some(Token::Ident(_))) => {
                        if let Some(node) = self.parse_group(None, comments) {
                            body.push(MessageElement::Group(node));
                        }
                    }
                    _ => {
                        if let Some(node) = self.parse_field(None, comments) {
                            body.push(MessageElement::Field(node));
                        }
                    }
                },
                Some(other) => {
                    let got = other.describe();
                    self.error_here(format!("unexpected {got} in message body"));
                    self.recover();
                }
            }
        }
        body
    }

    fn parse_field(
        &mut self,
        label: Option<KeywordNode>,
        comments: Vec<String>,
    ) -> Option<FieldNode> {
        let start = label.as_ref().map(|l| l.span).unwrap_or_else(|| self.span());
        let field_type = match self.type_name() {
            Some(t) => t,
            None => {
                self.recover();
                return None;
            }
        };
        let name = match self.ident() {
            Some(n) => n,
            None => {
                self.recover();
                return None;
            }
        };
        self.expect(&Token::Eq)?;
        let number = match self.int_literal() {
            Some(n) => n,
            None => {
                self.recover();
                return None;
            }
        };
        let options = self.compact_options();
        self.expect_semi();
        Some(FieldNode {
            span: start.to(SourceSpan::new(self.last_end, self.last_end)),
            label,
            field_type,
            name,
            number,
            options,
            leading_comments: comments,
        })
    }

    fn parse_map_field(&mut self, comments: Vec<String>) -> Option<MapFieldNode> {
        let keyword = self.take_keyword();
        self.expect(&Token::LAngle)?;
        let key_type = match self.ident() {
            Some(k) => k,
            None => {
                self.recover();
                return None;
            }
        };
        self.expect(&Token::Comma)?;
        let value_type = match self.type_name() {
            Some(v) => v,
            None => {
                self.recover();
                return None;
            }
        };
        self.expect(&Token::RAngle)?;
        let name = match self.ident() {
            Some(n) => n,
            None => {
                self.recover();
                return None;
            }
        };
        self.expect(&Token::Eq)?;
        let number = match self.int_literal() {
            Some(n) => n,
            None => {
                self.recover();
                return None;
            }
        };
        let options = self.compact_options();
        self.expect_semi();
        Some(MapFieldNode {
            span: keyword.span.to(SourceSpan::new(self.last_end, self.last_end)),
            keyword,
            key_type,
            value_type,
            name,
            number,
            options,
            leading_comments: comments,
        })
    }

    fn parse_group(
        &mut self,
        label: Option<KeywordNode>,
        comments: Vec<String>,
    ) -> Option<GroupNode> {
        let keyword = self.take_keyword();
        let start = label.as_ref().map(|l| l.span).unwrap_or(keyword.span);
        let name = match self.ident() {
            Some(n) => n,
            None => {
                self.recover();
                return None;
            }
        };
        self.expect(&Token::Eq)?;
        let number = match self.int_literal() {
            Some(n) => n,
            None => {
                self.recover();
                return None;
            }
        };
        self.expect(&Token::LBrace)?;
        let body = self.parse_message_body();
        let close = self.eat(&Token::RBrace).unwrap_or_else(|| self.span());
        Some(GroupNode {
            span: start.to(close),
            label,
            keyword,
            name,
            number,
            body,
            leading_comments: comments,
        })
    }

    fn parse_oneof(&mut self, comments: Vec<String>) -> Option<OneofNode> {
        let keyword = self.take_keyword();
        let name = match self.ident() {
            Some(n) => n,
            None => {
                self.recover();
                return None;
            }
        };
        self.expect(&Token::LBrace)?;
        let mut body = Vec::new();
        while !self.handler.aborted() {
            let comments = self.take_comments();
            match self.peek_cloned() {
                None => {
                    self.error_here("expected `}`, got end of file");
                    break;
                }
                Some(Token::RBrace) => break,
                Some(Token::Semi) => {
                    self.advance();
                }
                Some(Token::Ident(name)) => match name.as_str() {
                    "option" => {
                        if let Some(node) = self.parse_option_decl(comments) {
                            body.push(OneofElement::Option(node));
                        }
                    }
                    "group" if matches!(self.peek_second(), Some(Token::Ident(_))) => {
                        if let Some(node) = self.parse_group(None, comments) {
                            body.push(OneofElement::Group(node));
                        }
                    }
                    _ => {
                        if let Some(node) = self.parse_field(None, comments) {
                            body.push(OneofElement::Field(node));
                        }
                    }
                },
                Some(other) => {
                    let got = other.describe();
                    self.error_here(format!("unexpected {got} in oneof body"));
                    self.recover();
                }
            }
        }
        let close = self.eat(&Token::RBrace).unwrap_or_else(|| self.span());
        Some(OneofNode {
            span: keyword.span.to(close),
            keyword,
            name,
            body,
            leading_comments: comments,
        })
    }

    fn parse_extend(&mut self, comments: Vec<String>) -> Option<ExtendNode> {
        let keyword = self.take_keyword();
        let extendee = match self.type_name() {
            Some(e) => e,
            None => {
                self.recover();
                return None;
            }
        };
        self.expect(&Token::LBrace)?;
        let body = self.parse_message_body();
        let close = self.eat(&Token::RBrace).unwrap_or_else(|| self.span());
        Some(ExtendNode {
            span: keyword.span.to(close),
            keyword,
            extendee,
            body,
            leading_comments: comments,
        })
    }

    fn tag_ranges(&mut self) -> Vec<TagRangeNode> {
        let mut ranges = Vec::new();
        loop {
            let start = match self.int_literal() {
                Some(s) => s,
                None => break,
            };
            let mut span = start.span;
            let end = if self.peek_ident() == Some("to") {
                self.advance();
                if self.peek_ident() == Some("max") {
                    let max = self.take_keyword();
                    span = span.to(max.span);
                    Some(TagRangeEnd::Max(max))
                } else {
                    match self.int_literal() {
                        Some(end) => {
                            span = span.to(end.span);
                            Some(TagRangeEnd::Int(end))
                        }
                        None => None,
                    }
                }
            } else {
                None
            };
            ranges.push(TagRangeNode { start, end, span });
            if self.eat(&Token::Comma).is_none() {
                break;
            }
        }
        ranges
    }

    fn parse_reserved(&mut self, comments: Vec<String>) -> Option<ReservedNode> {
        let keyword = self.take_keyword();
        let mut ranges = Vec::new();
        let mut names = Vec::new();
        if matches!(self.peek(), Some(Token::StrLit(_))) {
            loop {
                match self.string_value() {
                    Some(name) => names.push(name),
                    None => break,
                }
                if self.eat(&Token::Comma).is_none() {
                    break;
                }
            }
        } else {
            ranges = self.tag_ranges();
        }
        self.expect_semi();
        Some(ReservedNode {
            span: keyword.span.to(SourceSpan::new(self.last_end, self.last_end)),
            keyword,
            ranges,
            names,
            leading_comments: comments,
        })
    }

    fn parse_extension_range(&mut self, comments: Vec<String>) -> Option<ExtensionRangeNode> {
        let keyword = self.take_keyword();
        let ranges = self.tag_ranges();
        let options = self.compact_options();
        self.expect_semi();
        Some(ExtensionRangeNode {
            span: keyword.span.to(SourceSpan::new(self.last_end, self.last_end)),
            keyword,
            ranges,
            options,
            leading_comments: comments,
        })
    }

    // ── enums ────────────────────────────────────────────────────

    fn parse_enum(&mut self, comments: Vec<String>) -> Option<EnumNode> {
        let keyword = self.take_keyword();
        let name = match self.ident() {
            Some(n) => n,
            None => {
                self.recover();
                return None;
            }
        };
        self.expect(&Token::LBrace)?;
        let mut body = Vec::new();
        while !self.handler.aborted() {
            let comments = self.take_comments();
            match self.peek_cloned() {
                None => {
                    self.error_here("expected `}`, got end of file");
                    break;
                }
                Some(Token::RBrace) => break,
                Some(Token::Semi) => {
                    self.advance();
                }
                Some(Token::Ident(name)) => match name.as_str() {
                    "option" => {
                        if let Some(node) = self.parse_option_decl(comments) {
                            body.push(EnumElement::Option(node));
                        }
                    }
                    "reserved" => {
                        if let Some(node) = self.parse_reserved(comments) {
                            body.push(EnumElement::Reserved(node));
                        }
                    }
                    _ => {
                        if let Some(node) = self.parse_enum_value(comments) {
                            body.push(EnumElement::Value(node));
                        }
                    }
                },
                Some(other) => {
                    let got = other.describe();
                    self.error_here(format!("unexpected {got} in enum body"));
                    self.recover();
                }
            }
        }
        let close = self.eat(&Token::RBrace).unwrap_or_else(|| self.span());
        Some(EnumNode {
            span: keyword.span.to(close),
            keyword,
            name,
            body,
            leading_comments: comments,
        })
    }

    fn parse_enum_value(&mut self, comments: Vec<String>) -> Option<EnumValueNode> {
        let name = self.ident()?;
        self.expect(&Token::Eq)?;
        let minus = self.eat(&Token::Minus);
        let mut number = match self.int_literal() {
            Some(n) => n,
            None => {
                self.recover();
                return None;
            }
        };
        if let Some(minus_span) = minus {
            number.negative = true;
            number.span = minus_span.to(number.span);
        }
        let options = self.compact_options();
        self.expect_semi();
        Some(EnumValueNode {
            span: name.span.to(SourceSpan::new(self.last_end, self.last_end)),
            name,
            number,
            options,
            leading_comments: comments,
        })
    }

    // ── services ─────────────────────────────────────────────────

    fn parse_service(&mut self, comments: Vec<String>) -> Option<ServiceNode> {
        let keyword = self.take_keyword();
        let name = match self.ident() {
            Some(n) => n,
            None => {
                self.recover();
                return None;
            }
        };
        self.expect(&Token::LBrace)?;
        let mut body = Vec::new();
        while !self.handler.aborted() {
            let comments = self.take_comments();
            match self.peek_cloned() {
                None => {
                    self.error_here("expected `}`, got end of file");
                    break;
                }
                Some(Token::RBrace) => break,
                Some(Token::Semi) => {
                    self.advance();
                }
                Some(Token::Ident(name)) => match name.as_str() {
                    "option" => {
                        if let Some(node) = self.parse_option_decl(comments) {
                            body.push(ServiceElement::Option(node));
                        }
                    }
                    "rpc" => {
                        if let Some(node) = self.parse_rpc(comments) {
                            body.push(ServiceElement::Rpc(node));
                        }
                    }
                    other => {
                        self.error_here(format!("unexpected `{other}` in service body"));
                        self.recover();
                    }
                },
                Some(other) => {
                    let got = other.describe();
                    self.error_here(format!("unexpected {got} in service body"));
                    self.recover();
                }
            }
        }
        let close = self.eat(&Token::RBrace).unwrap_or_else(|| self.span());
        Some(ServiceNode {
            span: keyword.span.to(close),
            keyword,
            name,
            body,
            leading_comments: comments,
        })
    }

    fn parse_rpc(&mut self, comments: Vec<String>) -> Option<RpcNode> {
        let keyword = self.take_keyword();
        let name = match self.ident() {
            Some(n) => n,
            None => {
                self.recover();
                return None;
            }
        };
        let input = self.rpc_type()?;
        let returns = if self.peek_ident() == Some("returns") {
            self.take_keyword()
        } else {
            self.error_here("expected `returns`");
            KeywordNode {
                text: "returns".to_string(),
                span: SourceSpan::new(self.last_end, self.last_end),
            }
        };
        let output = self.rpc_type()?;

        let mut options = Vec::new();
        if self.eat(&Token::LBrace).is_some() {
            loop {
                let comments = self.take_comments();
                match self.peek_cloned() {
                    None => {
                        self.error_here("expected `}`, got end of file");
                        break;
                    }
                    Some(Token::RBrace) => break,
                    Some(Token::Semi) => {
                        self.advance();
                    }
                    Some(Token::Ident(name)) if name == "option" => {
                        if let Some(node) = self.parse_option_decl(comments) {
                            options.push(node);
                        }
                    }
                    Some(other) => {
                        let got = other.describe();
                        self.error_here(format!("unexpected {got} in rpc body"));
                        self.recover();
                    }
                }
            }
            self.eat(&Token::RBrace);
        } else {
            self.expect_semi();
        }

        Some(RpcNode {
            span: keyword.span.to(SourceSpan::new(self.last_end, self.last_end)),
            keyword,
            name,
            input,
            returns,
            output,
            options,
            leading_comments: comments,
        })
    }

    fn rpc_type(&mut self) -> Option<RpcTypeNode> {
        let open = self.expect(&Token::LParen)?;
        let stream = if self.peek_ident() == Some("stream")
            && !matches!(self.peek_second(), Some(Token::RParen))
        {
            Some(self.take_keyword())
        } else {
            None
        };
        let message_type = self.type_name()?;
        let close = self
            .expect(&Token::RParen)
            .unwrap_or_else(|| message_type.span());
        Some(RpcTypeNode {
            span: open.to(close),
            stream,
            message_type,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::NoopReporter;

    fn parse_ok(source: &str) -> FileNode {
        let reporter = NoopReporter;
        let handler = Handler::new(&reporter);
        let file = parse("test.proto", source, &handler);
        assert!(!handler.errored(), "unexpected parse errors");
        file
    }

    fn parse_err(source: &str) -> FileNode {
        let reporter = NoopReporter;
        let handler = Handler::new(&reporter);
        let file = parse("test.proto", source, &handler);
        assert!(handler.errored(), "expected parse errors");
        file
    }

    // ── file level ───────────────────────────────────────────────

    #[test]
    fn parses_syntax_and_package() {
        let file = parse_ok("syntax = \"proto3\";\npackage foo.bar;\n");
        assert_eq!(file.syntax.as_ref().unwrap().value.value, "proto3");
        match &file.decls[0] {
            FileElement::Package(p) => assert_eq!(p.name.as_identifier(), "foo.bar"),
            other => panic!("expected package, got {other:?}"),
        }
    }

    #[test]
    fn single_quoted_syntax_is_fine() {
        let file = parse_ok("syntax='proto3';");
        assert_eq!(file.syntax.as_ref().unwrap().value.value, "proto3");
    }

    #[test]
    fn parses_imports_in_order() {
        let file = parse_ok(
            "import \"a.proto\";\nimport public \"b.proto\";\nimport weak \"c.proto\";\n",
        );
        let names: Vec<_> = file
            .decls
            .iter()
            .filter_map(|d| match d {
                FileElement::Import(i) => Some(i.name.value.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(names, vec!["a.proto", "b.proto", "c.proto"]);
    }

    // ── messages ─────────────────────────────────────────────────

    #[test]
    fn parses_message_with_field() {
        let file = parse_ok("message Foo { string name = 1; }");
        let FileElement::Message(m) = &file.decls[0] else {
            panic!("expected message");
        };
        assert_eq!(m.name.value, "Foo");
        let MessageElement::Field(f) = &m.body[0] else {
            panic!("expected field");
        };
        assert_eq!(f.field_type.as_identifier(), "string");
        assert_eq!(f.name.value, "name");
        assert_eq!(f.number.value, 1);
    }

    #[test]
    fn parses_nested_and_labeled() {
        let file = parse_ok(
            "message A { repeated int32 xs = 1; message B { bool ok = 1; } B b = 2; }",
        );
        let FileElement::Message(m) = &file.decls[0] else {
            panic!()
        };
        assert_eq!(m.body.len(), 3);
        let MessageElement::Field(f) = &m.body[0] else {
            panic!()
        };
        assert_eq!(f.label.as_ref().unwrap().text, "repeated");
    }

    #[test]
    fn parses_map_oneof_group() {
        let file = parse_ok(
            "message M {\n  map<string, int64> counts = 1;\n  oneof which { string a = 2; bytes b = 3; }\n  optional group Extra = 4 { int32 n = 5; }\n}",
        );
        let FileElement::Message(m) = &file.decls[0] else {
            panic!()
        };
        assert!(matches!(m.body[0], MessageElement::Map(_)));
        assert!(matches!(m.body[1], MessageElement::Oneof(_)));
        assert!(matches!(m.body[2], MessageElement::Group(_)));
    }

    #[test]
    fn parses_reserved_and_extensions() {
        let file = parse_ok(
            "message M { reserved 2, 9 to 11, 40 to max; reserved \"foo\"; extensions 100 to 199; }",
        );
        let FileElement::Message(m) = &file.decls[0] else {
            panic!()
        };
        let MessageElement::Reserved(r) = &m.body[0] else {
            panic!()
        };
        assert_eq!(r.ranges.len(), 3);
        assert!(matches!(r.ranges[2].end, Some(TagRangeEnd::Max(_))));
    }

    // ── options ──────────────────────────────────────────────────

    #[test]
    fn parses_file_and_compact_options() {
        let file = parse_ok(
            "option java_package = \"com.example\";\nmessage M { int32 x = 1 [deprecated = true, (my.ext) = -1.5]; }",
        );
        let FileElement::Option(o) = &file.decls[0] else {
            panic!()
        };
        assert_eq!(o.name.parts.len(), 1);
        let FileElement::Message(m) = &file.decls[1] else {
            panic!()
        };
        let MessageElement::Field(f) = &m.body[0] else {
            panic!()
        };
        assert_eq!(f.options.len(), 2);
        assert!(f.options[1].name.parts[0].is_extension);
        assert!(matches!(
            f.options[1].value,
            OptionValueNode::SignedFloat(_)
        ));
    }

    #[test]
    fn parses_message_literal_option() {
        let file =
            parse_ok("option (my.opt) = { foo: 1 bar: \"x\" nested { ok: true } };");
        let FileElement::Option(o) = &file.decls[0] else {
            panic!()
        };
        let OptionValueNode::Message(m) = &o.value else {
            panic!()
        };
        assert_eq!(m.fields.len(), 3);
    }

    // ── services ─────────────────────────────────────────────────

    #[test]
    fn parses_service_with_streams() {
        let file = parse_ok(
            "service S { rpc Get (GetRequest) returns (GetResponse); rpc Watch (stream Req) returns (stream Resp) { option deadline = 1; } }",
        );
        let FileElement::Service(s) = &file.decls[0] else {
            panic!()
        };
        let ServiceElement::Rpc(watch) = &s.body[1] else {
            panic!()
        };
        assert!(watch.input.stream.is_some());
        assert!(watch.output.stream.is_some());
        assert_eq!(watch.options.len(), 1);
    }

    // ── tolerance ────────────────────────────────────────────────

    #[test]
    fn recovers_after_bad_decl() {
        let file = parse_err("message { } message Ok { int32 x = 1; }");
        let names: Vec<_> = file
            .decls
            .iter()
            .filter_map(|d| match d {
                FileElement::Message(m) => Some(m.name.value.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(names, vec!["Ok"]);
    }

    #[test]
    fn missing_semicolon_still_yields_field() {
        let file = parse_err("message M { int32 x = 1 int32 y = 2; }");
        let FileElement::Message(m) = &file.decls[0] else {
            panic!()
        };
        assert!(!m.body.is_empty());
    }

    #[test]
    fn unterminated_string_produces_partial_ast() {
        let file = parse_err("syntax='proto2;");
        // the lexer flags the string, the parser still records the decl
        assert!(file.syntax.is_some());
    }

    #[test]
    fn leading_comments_attach_to_decl() {
        let file = parse_ok("// greeting\nmessage Hello {}");
        let FileElement::Message(m) = &file.decls[0] else {
            panic!()
        };
        assert_eq!(m.leading_comments, vec!["// greeting"]);
    }
}
