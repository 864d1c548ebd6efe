//! Lexical analysis: turns one source buffer into a flat token stream.
//!
//! The parser addresses this stream by index and never mutates it. There
//! is no macro expansion here; a `#` directive line is skipped with a
//! warning so self-contained sources still lex.

use crate::diagnostic::{Diag, DiagnosticEngine};
use crate::source_manager::{SourceId, SourceManager, SourceSpan};
use hashbrown::HashMap;
use std::sync::OnceLock;
use symbol_table::GlobalSymbol as Symbol;

/// C11 token kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    // === literals ===
    IntegerConstant(i64),
    FloatConstant(Symbol),
    CharacterConstant(u8),
    StringLiteral(Symbol),

    // === identifiers ===
    Identifier(Symbol),

    // === keywords ===
    // storage class specifiers
    Auto,
    Extern,
    Register,
    Static,
    ThreadLocal,
    Typedef,

    // type qualifiers
    Const,
    Restrict,
    Volatile,
    Atomic,

    // type specifiers
    Bool,
    Char,
    Complex,
    Double,
    Float,
    Int,
    Long,
    Short,
    Signed,
    Unsigned,
    Void,

    Struct,
    Union,
    Enum,

    // control flow
    Break,
    Case,
    Continue,
    Default,
    Do,
    Else,
    For,
    Goto,
    If,
    Return,
    Switch,
    While,

    // other keywords
    Alignas,
    Alignof,
    Generic,
    Inline,
    Noreturn,
    Sizeof,
    StaticAssert,

    // === operators ===
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Increment,
    Decrement,

    And,
    Or,
    Xor,
    Tilde,
    Not,
    LeftShift,
    RightShift,

    Less,
    Greater,
    LessEqual,
    GreaterEqual,
    Equal,
    NotEqual,

    Assign,
    PlusAssign,
    MinusAssign,
    StarAssign,
    DivAssign,
    ModAssign,
    AndAssign,
    OrAssign,
    XorAssign,
    LeftShiftAssign,
    RightShiftAssign,

    LogicAnd,
    LogicOr,

    Arrow,
    Dot,

    Question,
    Colon,

    // === punctuation ===
    Comma,
    Semicolon,
    Ellipsis,

    LeftParen,
    RightParen,
    LeftBracket,
    RightBracket,
    LeftBrace,
    RightBrace,

    // === special ===
    EndOfFile,
    Unknown,
}

impl TokenKind {
    /// Whether this token can begin a declaration. Identifiers count only
    /// when the caller resolved them to a typedef name.
    pub fn is_declaration_start(&self, is_typedef_name: bool) -> bool {
        use TokenKind::*;
        match self {
            Typedef | Extern | Static | Auto | Register | ThreadLocal | Const | Volatile
            | Restrict | Atomic | Inline | Noreturn | Void | Char | Short | Int | Long | Float
            | Double | Signed | Unsigned | Bool | Complex | Struct | Union | Enum | Alignas
            | StaticAssert => true,
            Identifier(_) => is_typedef_name,
            _ => false,
        }
    }
}

/// Token with its source range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: SourceSpan,
}

static KEYWORDS: OnceLock<HashMap<&'static str, TokenKind>> = OnceLock::new();

fn init_keywords() -> HashMap<&'static str, TokenKind> {
    let mut map = HashMap::new();

    map.insert("auto", TokenKind::Auto);
    map.insert("break", TokenKind::Break);
    map.insert("case", TokenKind::Case);
    map.insert("char", TokenKind::Char);
    map.insert("const", TokenKind::Const);
    map.insert("continue", TokenKind::Continue);
    map.insert("default", TokenKind::Default);
    map.insert("do", TokenKind::Do);
    map.insert("double", TokenKind::Double);
    map.insert("else", TokenKind::Else);
    map.insert("enum", TokenKind::Enum);
    map.insert("extern", TokenKind::Extern);
    map.insert("float", TokenKind::Float);
    map.insert("for", TokenKind::For);
    map.insert("goto", TokenKind::Goto);
    map.insert("if", TokenKind::If);
    map.insert("inline", TokenKind::Inline);
    map.insert("int", TokenKind::Int);
    map.insert("long", TokenKind::Long);
    map.insert("register", TokenKind::Register);
    map.insert("restrict", TokenKind::Restrict);
    map.insert("return", TokenKind::Return);
    map.insert("short", TokenKind::Short);
    map.insert("signed", TokenKind::Signed);
    map.insert("sizeof", TokenKind::Sizeof);
    map.insert("static", TokenKind::Static);
    map.insert("struct", TokenKind::Struct);
    map.insert("switch", TokenKind::Switch);
    map.insert("typedef", TokenKind::Typedef);
    map.insert("union", TokenKind::Union);
    map.insert("unsigned", TokenKind::Unsigned);
    map.insert("void", TokenKind::Void);
    map.insert("volatile", TokenKind::Volatile);
    map.insert("while", TokenKind::While);

    map.insert("_Alignas", TokenKind::Alignas);
    map.insert("_Alignof", TokenKind::Alignof);
    map.insert("_Atomic", TokenKind::Atomic);
    map.insert("_Bool", TokenKind::Bool);
    map.insert("_Complex", TokenKind::Complex);
    map.insert("_Generic", TokenKind::Generic);
    map.insert("_Noreturn", TokenKind::Noreturn);
    map.insert("_Static_assert", TokenKind::StaticAssert);
    map.insert("static_assert", TokenKind::StaticAssert);
    map.insert("_Thread_local", TokenKind::ThreadLocal);

    map
}

/// Look up a keyword by its spelling.
pub fn keyword_kind(text: &str) -> Option<TokenKind> {
    KEYWORDS.get_or_init(init_keywords).get(text).copied()
}

/// Byte-level lexer over one source buffer.
pub struct Lexer<'src> {
    buffer: &'src [u8],
    source_id: SourceId,
    pos: usize,
    diag: &'src mut DiagnosticEngine,
}

impl<'src> Lexer<'src> {
    pub fn new(
        source_manager: &'src SourceManager,
        source_id: SourceId,
        diag: &'src mut DiagnosticEngine,
    ) -> Self {
        Lexer {
            buffer: source_manager.source_text(source_id).as_bytes(),
            source_id,
            pos: 0,
            diag,
        }
    }

    /// Lex the whole buffer. The result always ends with `EndOfFile`.
    pub fn tokenize(mut self) -> Vec<Token> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token();
            let at_eof = token.kind == TokenKind::EndOfFile;
            tokens.push(token);
            if at_eof {
                break;
            }
        }
        tokens
    }

    fn span_from(&self, start: usize) -> SourceSpan {
        SourceSpan::new(self.source_id, start as u32, (self.pos - start) as u32)
    }

    fn peek(&self) -> Option<u8> {
        self.buffer.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.buffer.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let b = self.peek()?;
        self.pos += 1;
        Some(b)
    }

    fn eat(&mut self, expected: u8) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn skip_trivia(&mut self) {
        loop {
            match self.peek() {
                Some(b' ' | b'\t' | b'\r' | b'\n' | 0x0b | 0x0c) => {
                    self.pos += 1;
                }
                Some(b'/') if self.peek_at(1) == Some(b'/') => {
                    while let Some(b) = self.peek() {
                        if b == b'\n' {
                            break;
                        }
                        self.pos += 1;
                    }
                }
                Some(b'/') if self.peek_at(1) == Some(b'*') => {
                    let start = self.pos;
                    self.pos += 2;
                    let mut closed = false;
                    while let Some(b) = self.bump() {
                        if b == b'*' && self.eat(b'/') {
                            closed = true;
                            break;
                        }
                    }
                    if !closed {
                        self.diag.report(Diag::UnterminatedComment, self.span_from(start));
                    }
                }
                Some(b'#') => {
                    // No preprocessor here; drop the directive line.
                    let start = self.pos;
                    while let Some(b) = self.peek() {
                        if b == b'\n' {
                            break;
                        }
                        self.pos += 1;
                    }
                    self.diag.report(Diag::DirectiveIgnored, self.span_from(start));
                }
                _ => break,
            }
        }
    }

    fn next_token(&mut self) -> Token {
        self.skip_trivia();

        let start = self.pos;
        let Some(b) = self.bump() else {
            return Token {
                kind: TokenKind::EndOfFile,
                span: self.span_from(start),
            };
        };

        let kind = match b {
            b'a'..=b'z' | b'A'..=b'Z' | b'_' => self.lex_identifier(start),
            b'0'..=b'9' => self.lex_number(start),
            b'.' if self.peek().is_some_and(|c| c.is_ascii_digit()) => self.lex_number(start),
            b'\'' => self.lex_char_constant(start),
            b'"' => self.lex_string_literal(start),

            b'(' => TokenKind::LeftParen,
            b')' => TokenKind::RightParen,
            b'[' => TokenKind::LeftBracket,
            b']' => TokenKind::RightBracket,
            b'{' => TokenKind::LeftBrace,
            b'}' => TokenKind::RightBrace,
            b',' => TokenKind::Comma,
            b';' => TokenKind::Semicolon,
            b'?' => TokenKind::Question,
            b':' => TokenKind::Colon,
            b'~' => TokenKind::Tilde,

            b'.' => {
                if self.peek() == Some(b'.') && self.peek_at(1) == Some(b'.') {
                    self.pos += 2;
                    TokenKind::Ellipsis
                } else {
                    TokenKind::Dot
                }
            }

            b'+' => {
                if self.eat(b'+') {
                    TokenKind::Increment
                } else if self.eat(b'=') {
                    TokenKind::PlusAssign
                } else {
                    TokenKind::Plus
                }
            }
            b'-' => {
                if self.eat(b'-') {
                    TokenKind::Decrement
                } else if self.eat(b'=') {
                    TokenKind::MinusAssign
                } else if self.eat(b'>') {
                    TokenKind::Arrow
                } else {
                    TokenKind::Minus
                }
            }
            b'*' => {
                if self.eat(b'=') {
                    TokenKind::StarAssign
                } else {
                    TokenKind::Star
                }
            }
            b'/' => {
                if self.eat(b'=') {
                    TokenKind::DivAssign
                } else {
                    TokenKind::Slash
                }
            }
            b'%' => {
                if self.eat(b'=') {
                    TokenKind::ModAssign
                } else {
                    TokenKind::Percent
                }
            }
            b'&' => {
                if self.eat(b'&') {
                    TokenKind::LogicAnd
                } else if self.eat(b'=') {
                    TokenKind::AndAssign
                } else {
                    TokenKind::And
                }
            }
            b'|' => {
                if self.eat(b'|') {
                    TokenKind::LogicOr
                } else if self.eat(b'=') {
                    TokenKind::OrAssign
                } else {
                    TokenKind::Or
                }
            }
            b'^' => {
                if self.eat(b'=') {
                    TokenKind::XorAssign
                } else {
                    TokenKind::Xor
                }
            }
            b'!' => {
                if self.eat(b'=') {
                    TokenKind::NotEqual
                } else {
                    TokenKind::Not
                }
            }
            b'=' => {
                if self.eat(b'=') {
                    TokenKind::Equal
                } else {
                    TokenKind::Assign
                }
            }
            b'<' => {
                if self.eat(b'<') {
                    if self.eat(b'=') {
                        TokenKind::LeftShiftAssign
                    } else {
                        TokenKind::LeftShift
                    }
                } else if self.eat(b'=') {
                    TokenKind::LessEqual
                } else {
                    TokenKind::Less
                }
            }
            b'>' => {
                if self.eat(b'>') {
                    if self.eat(b'=') {
                        TokenKind::RightShiftAssign
                    } else {
                        TokenKind::RightShift
                    }
                } else if self.eat(b'=') {
                    TokenKind::GreaterEqual
                } else {
                    TokenKind::Greater
                }
            }

            other => {
                self.diag
                    .report(Diag::InvalidChar(other as char), self.span_from(start));
                TokenKind::Unknown
            }
        };

        Token {
            kind,
            span: self.span_from(start),
        }
    }

    fn lex_identifier(&mut self, start: usize) -> TokenKind {
        while let Some(b) = self.peek() {
            if b.is_ascii_alphanumeric() || b == b'_' {
                self.pos += 1;
            } else {
                break;
            }
        }
        let text = std::str::from_utf8(&self.buffer[start..self.pos]).unwrap_or("");
        match keyword_kind(text) {
            Some(kind) => kind,
            None => TokenKind::Identifier(Symbol::new(text)),
        }
    }

    fn lex_number(&mut self, start: usize) -> TokenKind {
        let mut is_float = self.buffer[start] == b'.';
        let is_hex = self.buffer[start] == b'0' && matches!(self.peek(), Some(b'x' | b'X'));
        if is_hex {
            self.pos += 1;
        }

        while let Some(b) = self.peek() {
            match b {
                b'0'..=b'9' => self.pos += 1,
                b'a'..=b'f' | b'A'..=b'F' if is_hex => self.pos += 1,
                b'.' if !is_hex => {
                    is_float = true;
                    self.pos += 1;
                }
                b'e' | b'E' if !is_hex => {
                    is_float = true;
                    self.pos += 1;
                    if matches!(self.peek(), Some(b'+' | b'-')) {
                        self.pos += 1;
                    }
                }
                b'p' | b'P' if is_hex => {
                    is_float = true;
                    self.pos += 1;
                    if matches!(self.peek(), Some(b'+' | b'-')) {
                        self.pos += 1;
                    }
                }
                _ => break,
            }
        }

        // Suffixes (u, l, ll, f, combinations thereof)
        let digits_end = self.pos;
        while let Some(b) = self.peek() {
            match b {
                b'u' | b'U' | b'l' | b'L' => self.pos += 1,
                b'f' | b'F' if is_float => self.pos += 1,
                _ => break,
            }
        }

        let text = std::str::from_utf8(&self.buffer[start..self.pos]).unwrap_or("");
        if is_float {
            return TokenKind::FloatConstant(Symbol::new(text));
        }

        let digits = std::str::from_utf8(&self.buffer[start..digits_end]).unwrap_or("");
        let (digits, radix) = if is_hex {
            (&digits[2..], 16)
        } else if digits.len() > 1 && digits.starts_with('0') {
            (&digits[1..], 8)
        } else {
            (digits, 10)
        };

        match i64::from_str_radix(digits, radix) {
            Ok(value) => TokenKind::IntegerConstant(value),
            Err(_) => {
                self.diag
                    .report(Diag::InvalidNumber(Symbol::new(text)), self.span_from(start));
                TokenKind::IntegerConstant(0)
            }
        }
    }

    fn lex_escape(&mut self) -> u8 {
        match self.bump() {
            Some(b'n') => b'\n',
            Some(b't') => b'\t',
            Some(b'r') => b'\r',
            Some(b'0') => 0,
            Some(b'a') => 0x07,
            Some(b'b') => 0x08,
            Some(b'f') => 0x0c,
            Some(b'v') => 0x0b,
            Some(b'x') => {
                let mut value: u32 = 0;
                while let Some(b) = self.peek() {
                    match (b as char).to_digit(16) {
                        Some(d) => {
                            value = value.wrapping_mul(16).wrapping_add(d);
                            self.pos += 1;
                        }
                        None => break,
                    }
                }
                value as u8
            }
            Some(other) => other,
            None => 0,
        }
    }

    fn lex_char_constant(&mut self, start: usize) -> TokenKind {
        let value = match self.bump() {
            Some(b'\\') => self.lex_escape(),
            Some(b'\'') | Some(b'\n') | None => {
                self.diag.report(Diag::UnterminatedChar, self.span_from(start));
                return TokenKind::CharacterConstant(0);
            }
            Some(b) => b,
        };
        if !self.eat(b'\'') {
            // Skip to the closing quote of a multi-character constant.
            while let Some(b) = self.peek() {
                if b == b'\'' || b == b'\n' {
                    break;
                }
                self.pos += 1;
            }
            if !self.eat(b'\'') {
                self.diag.report(Diag::UnterminatedChar, self.span_from(start));
            }
        }
        TokenKind::CharacterConstant(value)
    }

    fn lex_string_literal(&mut self, start: usize) -> TokenKind {
        let mut content = Vec::new();
        loop {
            match self.bump() {
                Some(b'"') => break,
                Some(b'\\') => content.push(self.lex_escape()),
                Some(b'\n') | None => {
                    self.diag.report(Diag::UnterminatedString, self.span_from(start));
                    break;
                }
                Some(b) => content.push(b),
            }
        }
        let text = String::from_utf8_lossy(&content).into_owned();
        TokenKind::StringLiteral(Symbol::new(text.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(source: &str) -> (Vec<Token>, DiagnosticEngine) {
        let mut sm = SourceManager::new();
        let id = sm.add_source(source.to_string(), "<test>");
        let mut diag = DiagnosticEngine::new();
        let tokens = Lexer::new(&sm, id, &mut diag).tokenize();
        (tokens, diag)
    }

    fn kinds(source: &str) -> Vec<TokenKind> {
        lex(source).0.into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn keywords_and_identifiers() {
        assert_eq!(
            kinds("int x;"),
            vec![
                TokenKind::Int,
                TokenKind::Identifier(Symbol::new("x")),
                TokenKind::Semicolon,
                TokenKind::EndOfFile,
            ]
        );
    }

    #[test]
    fn c11_underscore_keywords() {
        assert_eq!(
            kinds("_Bool _Noreturn _Static_assert _Thread_local"),
            vec![
                TokenKind::Bool,
                TokenKind::Noreturn,
                TokenKind::StaticAssert,
                TokenKind::ThreadLocal,
                TokenKind::EndOfFile,
            ]
        );
    }

    #[test]
    fn integer_bases_and_suffixes() {
        assert_eq!(kinds("10")[0], TokenKind::IntegerConstant(10));
        assert_eq!(kinds("0x10")[0], TokenKind::IntegerConstant(16));
        assert_eq!(kinds("010")[0], TokenKind::IntegerConstant(8));
        assert_eq!(kinds("10ull")[0], TokenKind::IntegerConstant(10));
        assert_eq!(kinds("0")[0], TokenKind::IntegerConstant(0));
    }

    #[test]
    fn multi_char_operators() {
        assert_eq!(
            kinds("<<= ... -> ++ ||"),
            vec![
                TokenKind::LeftShiftAssign,
                TokenKind::Ellipsis,
                TokenKind::Arrow,
                TokenKind::Increment,
                TokenKind::LogicOr,
                TokenKind::EndOfFile,
            ]
        );
    }

    #[test]
    fn char_and_string_literals() {
        assert_eq!(kinds("'a'")[0], TokenKind::CharacterConstant(b'a'));
        assert_eq!(kinds("'\\n'")[0], TokenKind::CharacterConstant(b'\n'));
        assert_eq!(
            kinds("\"hi\\n\"")[0],
            TokenKind::StringLiteral(Symbol::new("hi\n"))
        );
    }

    #[test]
    fn comments_are_trivia() {
        assert_eq!(
            kinds("int /* c */ x; // tail"),
            vec![
                TokenKind::Int,
                TokenKind::Identifier(Symbol::new("x")),
                TokenKind::Semicolon,
                TokenKind::EndOfFile,
            ]
        );
    }

    #[test]
    fn directive_line_is_skipped_with_warning() {
        let (tokens, diag) = lex("#include <stdio.h>\nint x;");
        assert_eq!(tokens[0].kind, TokenKind::Int);
        assert_eq!(diag.diagnostics().len(), 1);
    }
}
