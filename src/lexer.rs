//! Lexer
//!
//! Hand-written scanner producing one token of lookahead for the parser.
//! Template literals surface as head/middle/tail pieces re-entered by the
//! parser, and `/` tokens can be rescanned as regular expressions when the
//! parser knows it sits in expression position.

use num_bigint::BigInt;
use num_traits::Num;

use crate::error::{Position, Span};
use crate::value::JsString;

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Eof,

    Number(f64),
    BigInt(BigInt),
    String(JsString),
    Identifier(JsString),
    Regex { pattern: JsString, flags: JsString },

    // Template literals
    TemplateHead(JsString),   // `...${
    TemplateMiddle(JsString), // }...${
    TemplateTail(JsString),   // }...`
    TemplateNoSub(JsString),  // `...`

    // Keywords
    Var,
    Let,
    Const,
    Function,
    Class,
    Extends,
    Return,
    If,
    Else,
    While,
    Do,
    For,
    In,
    InstanceOf,
    TypeOf,
    Void,
    Delete,
    New,
    This,
    Super,
    Null,
    True,
    False,
    Throw,
    Try,
    Catch,
    Finally,
    Switch,
    Case,
    Default,
    Break,
    Continue,
    Yield,
    Import,
    Export,
    Debugger,
    Async,
    Await,
    With,

    // Punctuation
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Semicolon,
    Comma,
    Dot,
    DotDotDot,
    Arrow,
    Colon,
    Question,
    QuestionDot,
    QuestionQuestion,
    QuestionQuestionAssign,

    Assign,
    PlusAssign,
    MinusAssign,
    StarAssign,
    SlashAssign,
    PercentAssign,
    StarStarAssign,
    AmpAssign,
    PipeAssign,
    CaretAssign,
    ShlAssign,
    ShrAssign,
    UshrAssign,
    AmpAmpAssign,
    PipePipeAssign,

    Plus,
    Minus,
    Star,
    StarStar,
    Slash,
    Percent,
    PlusPlus,
    MinusMinus,

    Eq,
    NotEq,
    StrictEq,
    StrictNotEq,
    Lt,
    Gt,
    LtEq,
    GtEq,

    Amp,
    Pipe,
    Caret,
    Tilde,
    Shl,
    Shr,
    Ushr,
    AmpAmp,
    PipePipe,
    Bang,
}

#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
    /// A line terminator preceded this token (drives semicolon insertion).
    pub newline_before: bool,
}

impl Token {
    pub fn eof() -> Self {
        Token {
            kind: TokenKind::Eof,
            span: Span::default(),
            newline_before: false,
        }
    }
}

#[derive(Clone)]
pub struct Lexer<'a> {
    source: &'a str,
    chars: Vec<char>,
    pos: usize,
    line: u32,
    column: u32,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
            column: 1,
        }
    }

    pub fn source(&self) -> &'a str {
        self.source
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.get(self.pos).copied()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn position(&self) -> Position {
        Position {
            line: self.line,
            column: self.column,
            offset: self.pos,
        }
    }

    /// Current scan position, for `restore`.
    pub fn checkpoint(&self) -> Position {
        self.position()
    }

    /// Reset to an arbitrary position (used by regex/template rescans and
    /// by the parser's arrow-function lookahead).
    pub fn restore(&mut self, pos: Position) {
        self.pos = pos.offset;
        self.line = pos.line;
        self.column = pos.column;
    }

    /// Skip whitespace and comments; report whether a newline was crossed.
    fn skip_trivia(&mut self) -> bool {
        let mut newline = false;
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    if c == '\n' {
                        newline = true;
                    }
                    self.bump();
                }
                Some('/') if self.peek_at(1) == Some('/') => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.bump();
                    }
                }
                Some('/') if self.peek_at(1) == Some('*') => {
                    self.bump();
                    self.bump();
                    while let Some(c) = self.bump() {
                        if c == '\n' {
                            newline = true;
                        }
                        if c == '*' && self.peek() == Some('/') {
                            self.bump();
                            break;
                        }
                    }
                }
                _ => break,
            }
        }
        newline
    }

    pub fn next_token(&mut self) -> Token {
        let newline_before = self.skip_trivia();
        let start = self.position();

        let Some(c) = self.peek() else {
            return Token {
                kind: TokenKind::Eof,
                span: Span::new(start, start),
                newline_before,
            };
        };

        let kind = match c {
            '0'..='9' => self.scan_number(),
            '"' | '\'' => self.scan_string(c),
            '`' => {
                self.bump();
                self.scan_template_literal()
            }
            c if is_identifier_start(c) => self.scan_identifier_or_keyword(),
            _ => self.scan_punctuation(),
        };

        Token {
            kind,
            span: Span::new(start, self.position()),
            newline_before,
        }
    }

    fn scan_number(&mut self) -> TokenKind {
        let start = self.pos;
        if self.peek() == Some('0') {
            match self.peek_at(1) {
                Some('x') | Some('X') => return self.scan_radix_number(16),
                Some('o') | Some('O') => return self.scan_radix_number(8),
                Some('b') | Some('B') => return self.scan_radix_number(2),
                _ => {}
            }
        }
        while matches!(self.peek(), Some('0'..='9')) {
            self.bump();
        }
        // BigInt literal.
        if self.peek() == Some('n') {
            let digits: String = self.chars[start..self.pos].iter().collect();
            self.bump();
            let value = digits.parse::<BigInt>().unwrap_or_default();
            return TokenKind::BigInt(value);
        }
        if self.peek() == Some('.') {
            self.bump();
            while matches!(self.peek(), Some('0'..='9')) {
                self.bump();
            }
        }
        if matches!(self.peek(), Some('e') | Some('E')) {
            let mut ahead = 1;
            if matches!(self.peek_at(1), Some('+') | Some('-')) {
                ahead = 2;
            }
            if matches!(self.peek_at(ahead), Some('0'..='9')) {
                self.bump();
                if matches!(self.peek(), Some('+') | Some('-')) {
                    self.bump();
                }
                while matches!(self.peek(), Some('0'..='9')) {
                    self.bump();
                }
            }
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        TokenKind::Number(text.parse().unwrap_or(f64::NAN))
    }

    fn scan_radix_number(&mut self, radix: u32) -> TokenKind {
        self.bump(); // 0
        self.bump(); // x/o/b
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_digit(radix) {
                self.bump();
            } else {
                break;
            }
        }
        let digits: String = self.chars[start..self.pos].iter().collect();
        if self.peek() == Some('n') {
            self.bump();
            let value = BigInt::from_str_radix(&digits, radix).unwrap_or_default();
            return TokenKind::BigInt(value);
        }
        let value = u64::from_str_radix(&digits, radix).unwrap_or(0) as f64;
        TokenKind::Number(value)
    }

    fn scan_string(&mut self, quote: char) -> TokenKind {
        self.bump();
        let mut value = String::new();
        while let Some(c) = self.peek() {
            if c == quote {
                self.bump();
                break;
            }
            if c == '\\' {
                self.bump();
                self.scan_escape(&mut value);
            } else if c == '\n' {
                // Unterminated; the parser reports the error position.
                break;
            } else {
                value.push(c);
                self.bump();
            }
        }
        TokenKind::String(JsString::from(value))
    }

    fn scan_escape(&mut self, out: &mut String) {
        match self.bump() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('b') => out.push('\u{8}'),
            Some('f') => out.push('\u{c}'),
            Some('v') => out.push('\u{b}'),
            Some('0') => out.push('\0'),
            Some('x') => {
                let mut code = 0u32;
                for _ in 0..2 {
                    if let Some(d) = self.peek().and_then(|c| c.to_digit(16)) {
                        code = code * 16 + d;
                        self.bump();
                    }
                }
                if let Some(c) = char::from_u32(code) {
                    out.push(c);
                }
            }
            Some('u') => {
                let mut code = 0u32;
                if self.peek() == Some('{') {
                    self.bump();
                    while let Some(d) = self.peek().and_then(|c| c.to_digit(16)) {
                        code = code * 16 + d;
                        self.bump();
                    }
                    if self.peek() == Some('}') {
                        self.bump();
                    }
                } else {
                    for _ in 0..4 {
                        if let Some(d) = self.peek().and_then(|c| c.to_digit(16)) {
                            code = code * 16 + d;
                            self.bump();
                        }
                    }
                }
                if let Some(c) = char::from_u32(code) {
                    out.push(c);
                }
            }
            Some('\n') => {} // Line continuation.
            Some(other) => out.push(other),
            None => {}
        }
    }

    /// Scan from after a backtick up to `${` or the closing backtick.
    fn scan_template_literal(&mut self) -> TokenKind {
        let mut value = String::new();
        while let Some(c) = self.peek() {
            match c {
                '`' => {
                    self.bump();
                    return TokenKind::TemplateNoSub(JsString::from(value));
                }
                '$' if self.peek_at(1) == Some('{') => {
                    self.bump();
                    self.bump();
                    return TokenKind::TemplateHead(JsString::from(value));
                }
                '\\' => {
                    self.bump();
                    self.scan_escape(&mut value);
                }
                _ => {
                    value.push(c);
                    self.bump();
                }
            }
        }
        TokenKind::TemplateNoSub(JsString::from(value))
    }

    /// Continue a template literal after a `}` closing a substitution. The
    /// parser restores the lexer to just past the brace first.
    pub fn scan_template_continuation(&mut self) -> Token {
        let start = self.position();
        let mut value = String::new();
        while let Some(c) = self.peek() {
            match c {
                '`' => {
                    self.bump();
                    return Token {
                        kind: TokenKind::TemplateTail(JsString::from(value)),
                        span: Span::new(start, self.position()),
                        newline_before: false,
                    };
                }
                '$' if self.peek_at(1) == Some('{') => {
                    self.bump();
                    self.bump();
                    return Token {
                        kind: TokenKind::TemplateMiddle(JsString::from(value)),
                        span: Span::new(start, self.position()),
                        newline_before: false,
                    };
                }
                '\\' => {
                    self.bump();
                    self.scan_escape(&mut value);
                }
                _ => {
                    value.push(c);
                    self.bump();
                }
            }
        }
        Token {
            kind: TokenKind::TemplateTail(JsString::from(value)),
            span: Span::new(start, self.position()),
            newline_before: false,
        }
    }

    /// Rescan a `/` or `/=` token as a regular expression literal. The
    /// parser calls this when the token sits in expression position.
    pub fn rescan_regex(&mut self, slash_start: Position) -> Token {
        self.restore(slash_start);
        let start = self.position();
        self.bump(); // '/'
        let mut pattern = String::new();
        let mut in_class = false;
        while let Some(c) = self.peek() {
            match c {
                '\\' => {
                    pattern.push('\\');
                    self.bump();
                    if let Some(next) = self.bump() {
                        pattern.push(next);
                    }
                }
                '[' => {
                    in_class = true;
                    pattern.push(c);
                    self.bump();
                }
                ']' => {
                    in_class = false;
                    pattern.push(c);
                    self.bump();
                }
                '/' if !in_class => {
                    self.bump();
                    break;
                }
                '\n' => break,
                _ => {
                    pattern.push(c);
                    self.bump();
                }
            }
        }
        let mut flags = String::new();
        while let Some(c) = self.peek() {
            if is_identifier_part(c) {
                flags.push(c);
                self.bump();
            } else {
                break;
            }
        }
        Token {
            kind: TokenKind::Regex {
                pattern: JsString::from(pattern),
                flags: JsString::from(flags),
            },
            span: Span::new(start, self.position()),
            newline_before: false,
        }
    }

    fn scan_identifier_or_keyword(&mut self) -> TokenKind {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if is_identifier_part(c) {
                self.bump();
            } else {
                break;
            }
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        match text.as_str() {
            "var" => TokenKind::Var,
            "let" => TokenKind::Let,
            "const" => TokenKind::Const,
            "function" => TokenKind::Function,
            "class" => TokenKind::Class,
            "extends" => TokenKind::Extends,
            "return" => TokenKind::Return,
            "if" => TokenKind::If,
            "else" => TokenKind::Else,
            "while" => TokenKind::While,
            "do" => TokenKind::Do,
            "for" => TokenKind::For,
            "in" => TokenKind::In,
            "instanceof" => TokenKind::InstanceOf,
            "typeof" => TokenKind::TypeOf,
            "void" => TokenKind::Void,
            "delete" => TokenKind::Delete,
            "new" => TokenKind::New,
            "this" => TokenKind::This,
            "super" => TokenKind::Super,
            "null" => TokenKind::Null,
            "true" => TokenKind::True,
            "false" => TokenKind::False,
            "throw" => TokenKind::Throw,
            "try" => TokenKind::Try,
            "catch" => TokenKind::Catch,
            "finally" => TokenKind::Finally,
            "switch" => TokenKind::Switch,
            "case" => TokenKind::Case,
            "default" => TokenKind::Default,
            "break" => TokenKind::Break,
            "continue" => TokenKind::Continue,
            "yield" => TokenKind::Yield,
            "import" => TokenKind::Import,
            "export" => TokenKind::Export,
            "debugger" => TokenKind::Debugger,
            "async" => TokenKind::Async,
            "await" => TokenKind::Await,
            "with" => TokenKind::With,
            _ => TokenKind::Identifier(JsString::from(text)),
        }
    }

    fn scan_punctuation(&mut self) -> TokenKind {
        let c = self.bump().expect("punctuation scanner called at EOF");
        macro_rules! eat {
            ($ch:expr) => {
                if self.peek() == Some($ch) {
                    self.bump();
                    true
                } else {
                    false
                }
            };
        }
        match c {
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '{' => TokenKind::LBrace,
            '}' => TokenKind::RBrace,
            '[' => TokenKind::LBracket,
            ']' => TokenKind::RBracket,
            ';' => TokenKind::Semicolon,
            ',' => TokenKind::Comma,
            ':' => TokenKind::Colon,
            '~' => TokenKind::Tilde,
            '.' => {
                if self.peek() == Some('.') && self.peek_at(1) == Some('.') {
                    self.bump();
                    self.bump();
                    TokenKind::DotDotDot
                } else {
                    TokenKind::Dot
                }
            }
            '?' => {
                if eat!('.') {
                    TokenKind::QuestionDot
                } else if eat!('?') {
                    if eat!('=') {
                        TokenKind::QuestionQuestionAssign
                    } else {
                        TokenKind::QuestionQuestion
                    }
                } else {
                    TokenKind::Question
                }
            }
            '+' => {
                if eat!('+') {
                    TokenKind::PlusPlus
                } else if eat!('=') {
                    TokenKind::PlusAssign
                } else {
                    TokenKind::Plus
                }
            }
            '-' => {
                if eat!('-') {
                    TokenKind::MinusMinus
                } else if eat!('=') {
                    TokenKind::MinusAssign
                } else {
                    TokenKind::Minus
                }
            }
            '*' => {
                if eat!('*') {
                    if eat!('=') {
                        TokenKind::StarStarAssign
                    } else {
                        TokenKind::StarStar
                    }
                } else if eat!('=') {
                    TokenKind::StarAssign
                } else {
                    TokenKind::Star
                }
            }
            '/' => {
                if eat!('=') {
                    TokenKind::SlashAssign
                } else {
                    TokenKind::Slash
                }
            }
            '%' => {
                if eat!('=') {
                    TokenKind::PercentAssign
                } else {
                    TokenKind::Percent
                }
            }
            '=' => {
                if eat!('=') {
                    if eat!('=') {
                        TokenKind::StrictEq
                    } else {
                        TokenKind::Eq
                    }
                } else if eat!('>') {
                    TokenKind::Arrow
                } else {
                    TokenKind::Assign
                }
            }
            '!' => {
                if eat!('=') {
                    if eat!('=') {
                        TokenKind::StrictNotEq
                    } else {
                        TokenKind::NotEq
                    }
                } else {
                    TokenKind::Bang
                }
            }
            '<' => {
                if eat!('<') {
                    if eat!('=') {
                        TokenKind::ShlAssign
                    } else {
                        TokenKind::Shl
                    }
                } else if eat!('=') {
                    TokenKind::LtEq
                } else {
                    TokenKind::Lt
                }
            }
            '>' => {
                if eat!('>') {
                    if eat!('>') {
                        if eat!('=') {
                            TokenKind::UshrAssign
                        } else {
                            TokenKind::Ushr
                        }
                    } else if eat!('=') {
                        TokenKind::ShrAssign
                    } else {
                        TokenKind::Shr
                    }
                } else if eat!('=') {
                    TokenKind::GtEq
                } else {
                    TokenKind::Gt
                }
            }
            '&' => {
                if eat!('&') {
                    if eat!('=') {
                        TokenKind::AmpAmpAssign
                    } else {
                        TokenKind::AmpAmp
                    }
                } else if eat!('=') {
                    TokenKind::AmpAssign
                } else {
                    TokenKind::Amp
                }
            }
            '|' => {
                if eat!('|') {
                    if eat!('=') {
                        TokenKind::PipePipeAssign
                    } else {
                        TokenKind::PipePipe
                    }
                } else if eat!('=') {
                    TokenKind::PipeAssign
                } else {
                    TokenKind::Pipe
                }
            }
            '^' => {
                if eat!('=') {
                    TokenKind::CaretAssign
                } else {
                    TokenKind::Caret
                }
            }
            other => TokenKind::Identifier(JsString::from(other.to_string())),
        }
    }
}

fn is_identifier_start(c: char) -> bool {
    c == '$' || c == '_' || c.is_alphabetic()
}

fn is_identifier_part(c: char) -> bool {
    c == '$' || c == '_' || c.is_alphanumeric()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        let mut lexer = Lexer::new(source);
        let mut out = Vec::new();
        loop {
            let token = lexer.next_token();
            if token.kind == TokenKind::Eof {
                break;
            }
            out.push(token.kind);
        }
        out
    }

    #[test]
    fn test_numbers() {
        assert_eq!(
            kinds("42 3.5 0x10 0b101 1e3"),
            vec![
                TokenKind::Number(42.0),
                TokenKind::Number(3.5),
                TokenKind::Number(16.0),
                TokenKind::Number(5.0),
                TokenKind::Number(1000.0),
            ]
        );
    }

    #[test]
    fn test_bigint_literal() {
        assert_eq!(kinds("12n"), vec![TokenKind::BigInt(BigInt::from(12))]);
        assert_eq!(kinds("0xffn"), vec![TokenKind::BigInt(BigInt::from(255))]);
    }

    #[test]
    fn test_strings_and_escapes() {
        assert_eq!(
            kinds(r#"'a\n' "bA""#),
            vec![
                TokenKind::String(JsString::from("a\n")),
                TokenKind::String(JsString::from("bA")),
            ]
        );
    }

    #[test]
    fn test_punctuation_munch() {
        assert_eq!(
            kinds("=== !== >>> ?. ?? => ... **="),
            vec![
                TokenKind::StrictEq,
                TokenKind::StrictNotEq,
                TokenKind::Ushr,
                TokenKind::QuestionDot,
                TokenKind::QuestionQuestion,
                TokenKind::Arrow,
                TokenKind::DotDotDot,
                TokenKind::StarStarAssign,
            ]
        );
    }

    #[test]
    fn test_keywords_vs_identifiers() {
        assert_eq!(
            kinds("let letter of"),
            vec![
                TokenKind::Let,
                TokenKind::Identifier(JsString::from("letter")),
                TokenKind::Identifier(JsString::from("of")),
            ]
        );
    }

    #[test]
    fn test_template_pieces() {
        assert_eq!(
            kinds("`ab`"),
            vec![TokenKind::TemplateNoSub(JsString::from("ab"))]
        );
        let mut lexer = Lexer::new("`a${x}b`");
        let head = lexer.next_token();
        assert_eq!(head.kind, TokenKind::TemplateHead(JsString::from("a")));
        let x = lexer.next_token();
        assert_eq!(x.kind, TokenKind::Identifier(JsString::from("x")));
        let brace = lexer.next_token();
        assert_eq!(brace.kind, TokenKind::RBrace);
        let tail = lexer.scan_template_continuation();
        assert_eq!(tail.kind, TokenKind::TemplateTail(JsString::from("b")));
    }

    #[test]
    fn test_regex_rescan() {
        let mut lexer = Lexer::new("/a+[/]/gi");
        let slash = lexer.next_token();
        assert_eq!(slash.kind, TokenKind::Slash);
        let regex = lexer.rescan_regex(slash.span.start);
        match regex.kind {
            TokenKind::Regex { pattern, flags } => {
                assert_eq!(pattern.as_str(), "a+[/]");
                assert_eq!(flags.as_str(), "gi");
            }
            other => panic!("expected regex, got {:?}", other),
        }
    }

    #[test]
    fn test_newline_tracking() {
        let mut lexer = Lexer::new("a\nb");
        let a = lexer.next_token();
        assert!(!a.newline_before);
        let b = lexer.next_token();
        assert!(b.newline_before);
    }

    #[test]
    fn test_comments_skipped() {
        assert_eq!(
            kinds("1 // line\n/* block */ 2"),
            vec![TokenKind::Number(1.0), TokenKind::Number(2.0)]
        );
    }
}
