//! Token definitions

use std::fmt;

use super::span::Span;

/// A token with its location
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
    /// A line terminator appeared between the previous token and this one.
    pub newline_before: bool,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span, newline_before: bool) -> Self {
        Self {
            kind,
            span,
            newline_before,
        }
    }
}

/// One piece of a template literal
#[derive(Debug, Clone, PartialEq)]
pub enum TemplateChunk {
    /// Cooked text
    Text(String),
    /// Byte range of an embedded `${...}` expression in the source
    Expr(Span),
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Number(f64),
    String(String),
    Template(Vec<TemplateChunk>),
    Identifier(String),

    // Keywords
    Const,
    Let,
    Var,
    Function,
    Return,
    If,
    Else,
    For,
    While,
    Do,
    Break,
    Continue,
    Throw,
    Try,
    Catch,
    Finally,
    New,
    Typeof,
    Delete,
    In,
    Instanceof,
    Await,
    True,
    False,
    Null,
    Undefined,

    // Delimiters
    LeftParen,
    RightParen,
    LeftBracket,
    RightBracket,
    LeftBrace,
    RightBrace,
    Comma,
    Semicolon,
    Colon,
    Dot,
    Ellipsis,
    Question,
    QuestionDot,
    Arrow,

    // Operators
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Power,
    PlusPlus,
    MinusMinus,
    Not,
    Assign,
    PlusAssign,
    MinusAssign,
    StarAssign,
    SlashAssign,
    PercentAssign,
    NullishAssign,
    OrAssign,
    AndAssign,
    Equal,
    NotEqual,
    StrictEqual,
    StrictNotEqual,
    LessThan,
    GreaterThan,
    LessEqual,
    GreaterEqual,
    And,
    Or,
    Nullish,

    Eof,
}

impl TokenKind {
    pub fn keyword(ident: &str) -> Option<Self> {
        let kind = match ident {
            "const" => Self::Const,
            "let" => Self::Let,
            "var" => Self::Var,
            "function" => Self::Function,
            "return" => Self::Return,
            "if" => Self::If,
            "else" => Self::Else,
            "for" => Self::For,
            "while" => Self::While,
            "do" => Self::Do,
            "break" => Self::Break,
            "continue" => Self::Continue,
            "throw" => Self::Throw,
            "try" => Self::Try,
            "catch" => Self::Catch,
            "finally" => Self::Finally,
            "new" => Self::New,
            "typeof" => Self::Typeof,
            "delete" => Self::Delete,
            "in" => Self::In,
            "instanceof" => Self::Instanceof,
            "await" => Self::Await,
            "true" => Self::True,
            "false" => Self::False,
            "null" => Self::Null,
            "undefined" => Self::Undefined,
            _ => return None,
        };
        Some(kind)
    }

    /// Keywords are valid property names after `.` and as object keys.
    pub fn as_property_name(&self) -> Option<String> {
        match self {
            Self::Identifier(name) => Some(name.clone()),
            Self::Eof => None,
            other => {
                let text = other.to_string();
                text.chars()
                    .all(|c| c.is_ascii_alphabetic())
                    .then_some(text)
            }
        }
    }

    pub fn is_assignment(&self) -> bool {
        matches!(
            self,
            Self::Assign
                | Self::PlusAssign
                | Self::MinusAssign
                | Self::StarAssign
                | Self::SlashAssign
                | Self::PercentAssign
                | Self::NullishAssign
                | Self::OrAssign
                | Self::AndAssign
        )
    }

    /// Binding power for binary operators; `None` for anything else.
    pub fn precedence(&self) -> Option<u8> {
        let p = match self {
            Self::Nullish => 1,
            Self::Or => 2,
            Self::And => 3,
            Self::Equal | Self::NotEqual | Self::StrictEqual | Self::StrictNotEqual => 4,
            Self::LessThan
            | Self::GreaterThan
            | Self::LessEqual
            | Self::GreaterEqual
            | Self::In
            | Self::Instanceof => 5,
            Self::Plus | Self::Minus => 6,
            Self::Star | Self::Slash | Self::Percent => 7,
            Self::Power => 8,
            _ => return None,
        };
        Some(p)
    }

    pub fn is_right_associative(&self) -> bool {
        matches!(self, Self::Power)
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Number(n) => return write!(f, "{n}"),
            Self::String(s) => return write!(f, "\"{s}\""),
            Self::Template(_) => "template literal",
            Self::Identifier(name) => return f.write_str(name),
            Self::Const => "const",
            Self::Let => "let",
            Self::Var => "var",
            Self::Function => "function",
            Self::Return => "return",
            Self::If => "if",
            Self::Else => "else",
            Self::For => "for",
            Self::While => "while",
            Self::Do => "do",
            Self::Break => "break",
            Self::Continue => "continue",
            Self::Throw => "throw",
            Self::Try => "try",
            Self::Catch => "catch",
            Self::Finally => "finally",
            Self::New => "new",
            Self::Typeof => "typeof",
            Self::Delete => "delete",
            Self::In => "in",
            Self::Instanceof => "instanceof",
            Self::Await => "await",
            Self::True => "true",
            Self::False => "false",
            Self::Null => "null",
            Self::Undefined => "undefined",
            Self::LeftParen => "(",
            Self::RightParen => ")",
            Self::LeftBracket => "[",
            Self::RightBracket => "]",
            Self::LeftBrace => "{",
            Self::RightBrace => "}",
            Self::Comma => ",",
            Self::Semicolon => ";",
            Self::Colon => ":",
            Self::Dot => ".",
            Self::Ellipsis => "...",
            Self::Question => "?",
            Self::QuestionDot => "?.",
            Self::Arrow => "=>",
            Self::Plus => "+",
            Self::Minus => "-",
            Self::Star => "*",
            Self::Slash => "/",
            Self::Percent => "%",
            Self::Power => "**",
            Self::PlusPlus => "++",
            Self::MinusMinus => "--",
            Self::Not => "!",
            Self::Assign => "=",
            Self::PlusAssign => "+=",
            Self::MinusAssign => "-=",
            Self::StarAssign => "*=",
            Self::SlashAssign => "/=",
            Self::PercentAssign => "%=",
            Self::NullishAssign => "??=",
            Self::OrAssign => "||=",
            Self::AndAssign => "&&=",
            Self::Equal => "==",
            Self::NotEqual => "!=",
            Self::StrictEqual => "===",
            Self::StrictNotEqual => "!==",
            Self::LessThan => "<",
            Self::GreaterThan => ">",
            Self::LessEqual => "<=",
            Self::GreaterEqual => ">=",
            Self::And => "&&",
            Self::Or => "||",
            Self::Nullish => "??",
            Self::Eof => "end of input",
        };
        f.write_str(text)
    }
}
