use protolsp_ast::{SourcePos, SourceSpan};

use crate::report::{ErrorWithSpan, Handler};

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Ident(String),
    IntLit(u64),
    FloatLit(f64),
    StrLit(String),
    Comment(String),
    Semi,
    Comma,
    Colon,
    Eq,
    Dot,
    Minus,
    Plus,
    LBrace,
    RBrace,
    LParen,
    RParen,
    LBracket,
    RBracket,
    LAngle,
    RAngle,
}

impl Token {
    pub fn describe(&self) -> String {
        match self {
            Token::Ident(s) => format!("`{s}`"),
            Token::IntLit(v) => format!("`{v}`"),
            Token::FloatLit(v) => format!("`{v}`"),
            Token::StrLit(_) => "string literal".to_string(),
            Token::Comment(_) => "comment".to_string(),
            Token::Semi => "`;`".to_string(),
            Token::Comma => "`,`".to_string(),
            Token::Colon => "`:`".to_string(),
            Token::Eq => "`=`".to_string(),
            Token::Dot => "`.`".to_string(),
            Token::Minus => "`-`".to_string(),
            Token::Plus => "`+`".to_string(),
            Token::LBrace => "`{`".to_string(),
            Token::RBrace => "`}`".to_string(),
            Token::LParen => "`(`".to_string(),
            Token::RParen => "`)`".to_string(),
            Token::LBracket => "`[`".to_string(),
            Token::RBracket => "`]`".to_string(),
            Token::LAngle => "`<`".to_string(),
            Token::RAngle => "`>`".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpannedToken {
    pub token: Token,
    pub span: SourceSpan,
}

struct Lexer<'a> {
    filename: &'a str,
    src: &'a [u8],
    offset: usize,
    line: usize,
    col: usize,
}

/// Tokenizes `source`. Lexical errors (unterminated strings or comments,
/// malformed numbers, stray bytes) go to `handler` and lexing continues.
pub fn tokenize(filename: &str, source: &str, handler: &Handler<'_>) -> Vec<SpannedToken> {
    let mut lexer = Lexer {
        filename,
        src: source.as_bytes(),
        offset: 0,
        line: 1,
        col: 1,
    };
    let mut tokens = Vec::new();
    while let Some(tok) = lexer.next_token(handler) {
        tokens.push(tok);
        if handler.aborted() {
            break;
        }
    }
    tokens
}

impl<'a> Lexer<'a> {
    fn pos(&self) -> SourcePos {
        SourcePos::new(self.line, self.col, self.offset)
    }

    fn peek(&self) -> Option<u8> {
        self.src.get(self.offset).copied()
    }

    fn peek_at(&self, ahead: usize) -> Option<u8> {
        self.src.get(self.offset + ahead).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let b = self.peek()?;
        self.offset += 1;
        if b == b'\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(b)
    }

    fn error(&self, handler: &Handler<'_>, message: impl Into<String>, span: SourceSpan) {
        handler.error(ErrorWithSpan::new(self.filename, message, span));
    }

    fn next_token(&mut self, handler: &Handler<'_>) -> Option<SpannedToken> {
        loop {
            let b = self.peek()?;
            if b.is_ascii_whitespace() {
                self.bump();
                continue;
            }

            let start = self.pos();
            let token = match b {
                b'/' if self.peek_at(1) == Some(b'/') => {
                    return Some(self.line_comment(start));
                }
                b'/' if self.peek_at(1) == Some(b'*') => {
                    return Some(self.block_comment(start, handler));
                }
                b'"' | b'\'' => return Some(self.string(start, handler)),
                b'0'..=b'9' => return Some(self.number(start, handler)),
                b'.' if self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) => {
                    return Some(self.number(start, handler));
                }
                b'_' | b'a'..=b'z' | b'A'..=b'Z' => return Some(self.ident(start)),
                b';' => Token::Semi,
                b',' => Token::Comma,
                b':' => Token::Colon,
                b'=' => Token::Eq,
                b'.' => Token::Dot,
                b'-' => Token::Minus,
                b'+' => Token::Plus,
                b'{' => Token::LBrace,
                b'}' => Token::RBrace,
                b'(' => Token::LParen,
                b')' => Token::RParen,
                b'[' => Token::LBracket,
                b']' => Token::RBracket,
                b'<' => Token::LAngle,
                b'>' => Token::RAngle,
                _ => {
                    self.bump();
                    let span = SourceSpan::new(start, self.pos());
                    self.error(
                        handler,
                        format!("unexpected character `{}`", b as char),
                        span,
                    );
                    continue;
                }
            };
            self.bump();
            return Some(SpannedToken {
                token,
                span: SourceSpan::new(start, self.pos()),
            });
        }
    }

    fn line_comment(&mut self, start: SourcePos) -> SpannedToken {
        let begin = self.offset;
        while let Some(b) = self.peek() {
            if b == b'\n' {
                break;
            }
            self.bump();
        }
        let text = String::from_utf8_lossy(&self.src[begin..self.offset]).into_owned();
        SpannedToken {
            token: Token::Comment(text),
            span: SourceSpan::new(start, self.pos()),
        }
    }

    fn block_comment(&mut self, start: SourcePos, handler: &Handler<'_>) -> SpannedToken {
        let begin = self.offset;
        self.bump();
        self.bump();
        let mut closed = false;
        while let Some(b) = self.bump() {
            if b == b'*' && self.peek() == Some(b'/') {
                self.bump();
                closed = true;
                break;
            }
        }
        let span = SourceSpan::new(start, self.pos());
        if !closed {
            self.error(handler, "unterminated block comment", span);
        }
        let text = String::from_utf8_lossy(&self.src[begin..self.offset]).into_owned();
        SpannedToken {
            token: Token::Comment(text),
            span,
        }
    }

    fn string(&mut self, start: SourcePos, handler: &Handler<'_>) -> SpannedToken {
        let quote = self.bump().unwrap_or(b'"');
        let mut value = Vec::new();
        let mut closed = false;
        while let Some(b) = self.peek() {
            if b == b'\n' {
                break;
            }
            self.bump();
            if b == quote {
                closed = true;
                break;
            }
            if b == b'\\' {
                match self.bump() {
                    Some(b'n') => value.push(b'\n'),
                    Some(b'r') => value.push(b'\r'),
                    Some(b't') => value.push(b'\t'),
                    Some(b'\\') => value.push(b'\\'),
                    Some(b'\'') => value.push(b'\''),
                    Some(b'"') => value.push(b'"'),
                    Some(b'0') => value.push(0),
                    Some(b'x') | Some(b'X') => {
                        let mut v: u32 = 0;
                        let mut digits = 0;
                        while digits < 2 {
                            match self.peek().and_then(|c| (c as char).to_digit(16)) {
                                Some(d) => {
                                    self.bump();
                                    v = v * 16 + d;
                                    digits += 1;
                                }
                                None => break,
                            }
                        }
                        value.push(v as u8);
                    }
                    Some(other) => value.push(other),
                    None => break,
                }
            } else {
                value.push(b);
            }
        }
        let span = SourceSpan::new(start, self.pos());
        if !closed {
            self.error(handler, "unterminated string literal", span);
        }
        SpannedToken {
            token: Token::StrLit(String::from_utf8_lossy(&value).into_owned()),
            span,
        }
    }

    fn number(&mut self, start: SourcePos, handler: &Handler<'_>) -> SpannedToken {
        let begin = self.offset;
        if self.peek() == Some(b'0') && matches!(self.peek_at(1), Some(b'x') | Some(b'X')) {
            self.bump();
            self.bump();
            while self.peek().is_some_and(|b| b.is_ascii_hexdigit()) {
                self.bump();
            }
            let span = SourceSpan::new(start, self.pos());
            let digits = &self.src[begin + 2..self.offset];
            let text = String::from_utf8_lossy(digits);
            return match u64::from_str_radix(&text, 16) {
                Ok(v) => SpannedToken {
                    token: Token::IntLit(v),
                    span,
                },
                Err(_) => {
                    self.error(handler, "invalid hex literal", span);
                    SpannedToken {
                        token: Token::IntLit(0),
                        span,
                    }
                }
            };
        }

        let mut is_float = false;
        while let Some(b) = self.peek() {
            match b {
                b'0'..=b'9' => {
                    self.bump();
                }
                b'.' => {
                    is_float = true;
                    self.bump();
                }
                b'e' | b'E' => {
                    is_float = true;
                    self.bump();
                    if matches!(self.peek(), Some(b'+') | Some(b'-')) {
                        self.bump();
                    }
                }
                _ => break,
            }
        }
        let span = SourceSpan::new(start, self.pos());
        let text = String::from_utf8_lossy(&self.src[begin..self.offset]).into_owned();

        if self.peek().is_some_and(|b| b == b'_' || b.is_ascii_alphabetic()) {
            self.error(
                handler,
                format!("invalid numeric literal `{text}`"),
                SourceSpan::new(start, self.pos()),
            );
            while self
                .peek()
                .is_some_and(|b| b == b'_' || b.is_ascii_alphanumeric())
            {
                self.bump();
            }
        }

        if is_float {
            let value = text.parse::<f64>().unwrap_or_else(|_| {
                self.error(handler, format!("invalid float literal `{text}`"), span);
                0.0
            });
            SpannedToken {
                token: Token::FloatLit(value),
                span,
            }
        } else {
            // a leading zero means octal
            let value = if text.len() > 1 && text.starts_with('0') {
                u64::from_str_radix(&text[1..], 8)
            } else {
                text.parse::<u64>()
            };
            let value = value.unwrap_or_else(|_| {
                self.error(handler, format!("invalid integer literal `{text}`"), span);
                0
            });
            SpannedToken {
                token: Token::IntLit(value),
                span,
            }
        }
    }

    fn ident(&mut self, start: SourcePos) -> SpannedToken {
        let begin = self.offset;
        while self
            .peek()
            .is_some_and(|b| b == b'_' || b.is_ascii_alphanumeric())
        {
            self.bump();
        }
        let text = String::from_utf8_lossy(&self.src[begin..self.offset]).into_owned();
        SpannedToken {
            token: Token::Ident(text),
            span: SourceSpan::new(start, self.pos()),
        }
    }
}
