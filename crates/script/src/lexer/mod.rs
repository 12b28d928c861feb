//! Lexer for script source
//!
//! Produces a flat token list. Template literals are scanned in one piece:
//! literal text is cooked here and embedded `${...}` expressions are kept as
//! source ranges for the parser to re-enter.

use crate::core::span::Span;
use crate::core::token::{TemplateChunk, Token, TokenKind};
use crate::error::{ScriptError, ScriptResult};
use crate::parser::MAX_NESTING_DEPTH;

pub struct Lexer<'a> {
    input: &'a str,
    position: usize,
    end: usize,
    newline_before: bool,
    /// Templates currently open inside `${...}` of enclosing templates
    template_depth: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self::with_range(input, 0, input.len())
    }

    /// Lex only `input[start..end]`, keeping spans relative to the full input.
    pub fn with_range(input: &'a str, start: usize, end: usize) -> Self {
        Self {
            input,
            position: start,
            end,
            newline_before: false,
            template_depth: 0,
        }
    }

    pub fn tokenize(&mut self) -> ScriptResult<Vec<Token>> {
        let mut tokens = Vec::with_capacity(((self.end - self.position) / 4).max(8));
        loop {
            let token = self.next_token()?;
            let done = token.kind == TokenKind::Eof;
            tokens.push(token);
            if done {
                break;
            }
        }
        Ok(tokens)
    }

    fn current_char(&self) -> Option<char> {
        if self.position >= self.end {
            return None;
        }
        self.input[self.position..self.end].chars().next()
    }

    fn peek(&self) -> Option<char> {
        let mut chars = self.input[self.position..self.end].chars();
        chars.next();
        chars.next()
    }

    fn peek_at(&self, n: usize) -> Option<char> {
        self.input[self.position..self.end].chars().nth(n)
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.current_char()?;
        self.position += ch.len_utf8();
        Some(ch)
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.current_char() == Some(expected) {
            self.position += expected.len_utf8();
            true
        } else {
            false
        }
    }

    fn error(&self, message: impl Into<String>, start: usize) -> ScriptError {
        ScriptError::syntax(message, Span::new(start, self.position.max(start + 1)))
    }

    fn skip_trivia(&mut self) -> ScriptResult<()> {
        while let Some(ch) = self.current_char() {
            match ch {
                '\n' | '\u{2028}' | '\u{2029}' => {
                    self.newline_before = true;
                    self.advance();
                }
                c if c.is_whitespace() || c == '\u{feff}' => {
                    self.advance();
                }
                '/' if self.peek() == Some('/') => {
                    while let Some(c) = self.current_char() {
                        if c == '\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                '/' if self.peek() == Some('*') => {
                    let start = self.position;
                    self.position += 2;
                    loop {
                        match self.advance() {
                            Some('*') if self.eat('/') => break,
                            Some('\n') => self.newline_before = true,
                            Some(_) => {}
                            None => return Err(self.error("Unterminated comment", start)),
                        }
                    }
                }
                _ => break,
            }
        }
        Ok(())
    }

    pub fn next_token(&mut self) -> ScriptResult<Token> {
        self.newline_before = false;
        self.skip_trivia()?;
        let newline_before = self.newline_before;
        let start = self.position;

        let Some(ch) = self.current_char() else {
            return Ok(Token::new(
                TokenKind::Eof,
                Span::new(self.position, self.position),
                newline_before,
            ));
        };

        let kind = match ch {
            c if c.is_ascii_digit() => self.read_number()?,
            '.' if self.peek().is_some_and(|c| c.is_ascii_digit()) => self.read_number()?,
            '"' | '\'' => TokenKind::String(self.read_string(ch)?),
            '`' => TokenKind::Template(self.read_template()?),
            c if is_ident_start(c) => {
                let ident = self.read_identifier();
                TokenKind::keyword(&ident).unwrap_or(TokenKind::Identifier(ident))
            }
            _ => self.read_punctuator()?,
        };

        Ok(Token::new(
            kind,
            Span::new(start, self.position),
            newline_before,
        ))
    }

    fn read_identifier(&mut self) -> String {
        let start = self.position;
        while let Some(c) = self.current_char() {
            if is_ident_continue(c) {
                self.advance();
            } else {
                break;
            }
        }
        self.input[start..self.position].to_string()
    }

    fn read_number(&mut self) -> ScriptResult<TokenKind> {
        let start = self.position;

        if self.current_char() == Some('0') {
            let radix = match self.peek() {
                Some('x' | 'X') => Some(16),
                Some('o' | 'O') => Some(8),
                Some('b' | 'B') => Some(2),
                _ => None,
            };
            if let Some(radix) = radix {
                self.position += 2;
                let digits_start = self.position;
                while self
                    .current_char()
                    .is_some_and(|c| c.is_digit(radix) || c == '_')
                {
                    self.advance();
                }
                let digits: String = self.input[digits_start..self.position]
                    .chars()
                    .filter(|&c| c != '_')
                    .collect();
                return u64::from_str_radix(&digits, radix)
                    .map(|n| TokenKind::Number(n as f64))
                    .map_err(|_| self.error("Invalid number literal", start));
            }
        }

        while self
            .current_char()
            .is_some_and(|c| c.is_ascii_digit() || c == '_')
        {
            self.advance();
        }
        if self.current_char() == Some('.') && self.peek().is_none_or(|c| c != '.') {
            self.advance();
            while self
                .current_char()
                .is_some_and(|c| c.is_ascii_digit() || c == '_')
            {
                self.advance();
            }
        }
        if matches!(self.current_char(), Some('e' | 'E')) {
            let sign_ok = match self.peek() {
                Some('+' | '-') => self.peek_at(2).is_some_and(|c| c.is_ascii_digit()),
                Some(c) => c.is_ascii_digit(),
                None => false,
            };
            if sign_ok {
                self.advance();
                if matches!(self.current_char(), Some('+' | '-')) {
                    self.advance();
                }
                while self.current_char().is_some_and(|c| c.is_ascii_digit()) {
                    self.advance();
                }
            }
        }

        if self.current_char().is_some_and(is_ident_start) {
            return Err(self.error("Invalid or unexpected token", start));
        }

        let text: String = self.input[start..self.position]
            .chars()
            .filter(|&c| c != '_')
            .collect();
        text.parse::<f64>()
            .map(TokenKind::Number)
            .map_err(|_| self.error("Invalid number literal", start))
    }

    fn read_string(&mut self, quote: char) -> ScriptResult<String> {
        let start = self.position;
        self.advance();
        let mut value = String::new();

        loop {
            match self.advance() {
                Some(c) if c == quote => return Ok(value),
                Some('\\') => {
                    if let Some(c) = self.read_escape(start)? {
                        value.push(c);
                    }
                }
                Some('\n') | None => return Err(self.error("Invalid or unexpected token", start)),
                Some(c) => value.push(c),
            }
        }
    }

    /// Returns `None` for a line continuation.
    fn read_escape(&mut self, start: usize) -> ScriptResult<Option<char>> {
        let Some(c) = self.advance() else {
            return Err(self.error("Invalid or unexpected token", start));
        };
        let cooked = match c {
            'n' => '\n',
            't' => '\t',
            'r' => '\r',
            'b' => '\u{8}',
            'f' => '\u{c}',
            'v' => '\u{b}',
            '0' if !self.current_char().is_some_and(|d| d.is_ascii_digit()) => '\0',
            '\n' => return Ok(None),
            '\r' => {
                self.eat('\n');
                return Ok(None);
            }
            'x' => {
                let code = self.read_hex_digits(2, start)?;
                char::from_u32(code).ok_or_else(|| self.error("Invalid hexadecimal escape sequence", start))?
            }
            'u' => {
                let code = if self.eat('{') {
                    let digits_start = self.position;
                    while self.current_char().is_some_and(|d| d.is_ascii_hexdigit()) {
                        self.advance();
                    }
                    let digits = &self.input[digits_start..self.position];
                    if !self.eat('}') {
                        return Err(self.error("Invalid Unicode escape sequence", start));
                    }
                    u32::from_str_radix(digits, 16)
                        .map_err(|_| self.error("Invalid Unicode escape sequence", start))?
                } else {
                    let high = self.read_hex_digits(4, start)?;
                    // Surrogate pairs arrive as two consecutive \u escapes.
                    if (0xD800..0xDC00).contains(&high)
                        && self.current_char() == Some('\\')
                        && self.peek() == Some('u')
                    {
                        self.position += 2;
                        let low = self.read_hex_digits(4, start)?;
                        0x10000 + ((high - 0xD800) << 10) + (low.wrapping_sub(0xDC00) & 0x3FF)
                    } else {
                        high
                    }
                };
                char::from_u32(code).unwrap_or('\u{fffd}')
            }
            other => other,
        };
        Ok(Some(cooked))
    }

    fn read_hex_digits(&mut self, count: usize, start: usize) -> ScriptResult<u32> {
        let digits_start = self.position;
        for _ in 0..count {
            match self.current_char() {
                Some(c) if c.is_ascii_hexdigit() => {
                    self.advance();
                }
                _ => return Err(self.error("Invalid escape sequence", start)),
            }
        }
        u32::from_str_radix(&self.input[digits_start..self.position], 16)
            .map_err(|_| self.error("Invalid escape sequence", start))
    }

    fn read_template(&mut self) -> ScriptResult<Vec<TemplateChunk>> {
        if self.template_depth >= MAX_NESTING_DEPTH {
            return Err(self.error("Maximum nesting depth exceeded", self.position));
        }
        self.template_depth += 1;
        let chunks = self.read_template_chunks();
        self.template_depth -= 1;
        chunks
    }

    fn read_template_chunks(&mut self) -> ScriptResult<Vec<TemplateChunk>> {
        let start = self.position;
        self.advance();
        let mut chunks = Vec::new();
        let mut text = String::new();

        loop {
            match self.advance() {
                Some('`') => break,
                Some('\\') => {
                    if let Some(c) = self.read_escape(start)? {
                        text.push(c);
                    }
                }
                Some('$') if self.current_char() == Some('{') => {
                    self.advance();
                    if !text.is_empty() {
                        chunks.push(TemplateChunk::Text(std::mem::take(&mut text)));
                    }
                    let expr_start = self.position;
                    self.skip_embedded_expression(start)?;
                    // position is just past the closing brace
                    chunks.push(TemplateChunk::Expr(Span::new(expr_start, self.position - 1)));
                }
                Some(c) => text.push(c),
                None => return Err(self.error("Unterminated template literal", start)),
            }
        }

        if !text.is_empty() || chunks.is_empty() {
            chunks.push(TemplateChunk::Text(text));
        }
        Ok(chunks)
    }

    /// Skip to just past the `}` closing a `${`, honoring nested braces,
    /// strings and templates.
    fn skip_embedded_expression(&mut self, template_start: usize) -> ScriptResult<()> {
        let mut depth = 0usize;
        loop {
            match self.current_char() {
                None => return Err(self.error("Unterminated template literal", template_start)),
                Some('{') => {
                    depth += 1;
                    self.advance();
                }
                Some('}') => {
                    self.advance();
                    if depth == 0 {
                        return Ok(());
                    }
                    depth -= 1;
                }
                Some(q @ ('"' | '\'')) => {
                    self.read_string(q)?;
                }
                Some('`') => {
                    self.read_template()?;
                }
                Some(_) => {
                    self.advance();
                }
            }
        }
    }

    fn read_punctuator(&mut self) -> ScriptResult<TokenKind> {
        let start = self.position;
        let Some(ch) = self.advance() else {
            return Ok(TokenKind::Eof);
        };

        let kind = match ch {
            '(' => TokenKind::LeftParen,
            ')' => TokenKind::RightParen,
            '[' => TokenKind::LeftBracket,
            ']' => TokenKind::RightBracket,
            '{' => TokenKind::LeftBrace,
            '}' => TokenKind::RightBrace,
            ',' => TokenKind::Comma,
            ';' => TokenKind::Semicolon,
            ':' => TokenKind::Colon,
            '.' => {
                if self.current_char() == Some('.') && self.peek() == Some('.') {
                    self.position += 2;
                    TokenKind::Ellipsis
                } else {
                    TokenKind::Dot
                }
            }
            '?' => {
                if self.eat('?') {
                    if self.eat('=') {
                        TokenKind::NullishAssign
                    } else {
                        TokenKind::Nullish
                    }
                } else if self.current_char() == Some('.')
                    && !self.peek().is_some_and(|c| c.is_ascii_digit())
                {
                    self.advance();
                    TokenKind::QuestionDot
                } else {
                    TokenKind::Question
                }
            }
            '+' => {
                if self.eat('+') {
                    TokenKind::PlusPlus
                } else if self.eat('=') {
                    TokenKind::PlusAssign
                } else {
                    TokenKind::Plus
                }
            }
            '-' => {
                if self.eat('-') {
                    TokenKind::MinusMinus
                } else if self.eat('=') {
                    TokenKind::MinusAssign
                } else {
                    TokenKind::Minus
                }
            }
            '*' => {
                if self.eat('*') {
                    TokenKind::Power
                } else if self.eat('=') {
                    TokenKind::StarAssign
                } else {
                    TokenKind::Star
                }
            }
            '/' => {
                if self.eat('=') {
                    TokenKind::SlashAssign
                } else {
                    TokenKind::Slash
                }
            }
            '%' => {
                if self.eat('=') {
                    TokenKind::PercentAssign
                } else {
                    TokenKind::Percent
                }
            }
            '=' => {
                if self.eat('=') {
                    if self.eat('=') {
                        TokenKind::StrictEqual
                    } else {
                        TokenKind::Equal
                    }
                } else if self.eat('>') {
                    TokenKind::Arrow
                } else {
                    TokenKind::Assign
                }
            }
            '!' => {
                if self.eat('=') {
                    if self.eat('=') {
                        TokenKind::StrictNotEqual
                    } else {
                        TokenKind::NotEqual
                    }
                } else {
                    TokenKind::Not
                }
            }
            '<' => {
                if self.eat('=') {
                    TokenKind::LessEqual
                } else {
                    TokenKind::LessThan
                }
            }
            '>' => {
                if self.eat('=') {
                    TokenKind::GreaterEqual
                } else {
                    TokenKind::GreaterThan
                }
            }
            '&' if self.eat('&') => {
                if self.eat('=') {
                    TokenKind::AndAssign
                } else {
                    TokenKind::And
                }
            }
            '|' if self.eat('|') => {
                if self.eat('=') {
                    TokenKind::OrAssign
                } else {
                    TokenKind::Or
                }
            }
            other => {
                return Err(self.error(format!("Invalid or unexpected token '{other}'"), start));
            }
        };
        Ok(kind)
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$'
}

fn is_ident_continue(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        Lexer::new(source)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn punctuators_and_keywords() {
        assert_eq!(
            kinds("const x = a?.b ?? 1;"),
            vec![
                TokenKind::Const,
                TokenKind::Identifier("x".into()),
                TokenKind::Assign,
                TokenKind::Identifier("a".into()),
                TokenKind::QuestionDot,
                TokenKind::Identifier("b".into()),
                TokenKind::Nullish,
                TokenKind::Number(1.0),
                TokenKind::Semicolon,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn numbers() {
        assert_eq!(
            kinds("0x1F 1_000 .5 2e3 3.25"),
            vec![
                TokenKind::Number(31.0),
                TokenKind::Number(1000.0),
                TokenKind::Number(0.5),
                TokenKind::Number(2000.0),
                TokenKind::Number(3.25),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn string_escapes() {
        assert_eq!(
            kinds(r#"'it\'s' "a\nbA\u{1F600}""#),
            vec![
                TokenKind::String("it's".into()),
                TokenKind::String("a\nbA\u{1F600}".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn templates_keep_expression_ranges() {
        let source = "`Hi ${user.name}, you have ${`${n}`} items`";
        let tokens = Lexer::new(source).tokenize().unwrap();
        let TokenKind::Template(chunks) = &tokens[0].kind else {
            panic!("expected template, got {:?}", tokens[0].kind);
        };
        assert_eq!(chunks.len(), 5);
        assert_eq!(chunks[0], TemplateChunk::Text("Hi ".into()));
        let TemplateChunk::Expr(span) = &chunks[1] else {
            panic!("expected expression chunk");
        };
        assert_eq!(span.slice(source), "user.name");
        let TemplateChunk::Expr(nested) = &chunks[3] else {
            panic!("expected expression chunk");
        };
        assert_eq!(nested.slice(source), "`${n}`");
    }

    #[test]
    fn newline_flags_for_semicolon_insertion() {
        let tokens = Lexer::new("a\n/* x\n */ b c").tokenize().unwrap();
        assert!(!tokens[0].newline_before);
        assert!(tokens[1].newline_before);
        assert!(!tokens[2].newline_before);
    }

    #[test]
    fn deeply_nested_templates_are_rejected() {
        let source = format!("{}1{}", "`${".repeat(10_000), "}`".repeat(10_000));
        let err = Lexer::new(&source).tokenize().unwrap_err();
        assert_eq!(err.message(), "Maximum nesting depth exceeded");
    }

    #[test]
    fn unterminated_string_is_syntax_error() {
        let err = Lexer::new("let s = 'oops\n").tokenize().unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Syntax);
    }
}
