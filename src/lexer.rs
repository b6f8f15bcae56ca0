//! Lexical analysis for ETS source code

use crate::error::{CompilerError, Result};
use std::fmt;

/// Operators and punctuation, longest first so the scanner can match greedily.
const PUNCTUATORS: &[&str] = &[
    ">>>=", "...", "===", "!==", "**=", "<<=", ">>=", ">>>", "&&=", "||=", "??=", "=>", "==",
    "!=", "<=", ">=", "&&", "||", "??", "?.", "++", "--", "+=", "-=", "*=", "/=", "%=", "&=",
    "|=", "^=", "**", "<<", ">>", "{", "}", "(", ")", "[", "]", ";", ",", "<", ">", "+", "-",
    "*", "/", "%", "&", "|", "^", "!", "~", "?", ":", "=", ".", "@",
];

/// Keywords after which a `/` starts a regular expression literal.
const REGEX_PREFIX_KEYWORDS: &[&str] = &[
    "return", "typeof", "case", "do", "else", "in", "of", "new", "delete", "void", "throw",
    "instanceof", "yield", "await",
];

#[derive(Debug, Clone, PartialEq)]
pub enum TokenType {
    Identifier(String),
    /// String literal, raw text including its quotes.
    String(String),
    /// Numeric literal, raw text.
    Number(String),
    /// Regular expression literal, raw text including slashes and flags.
    Regex(String),
    Template(TemplateToken),
    Punct(&'static str),
    Eof,
}

/// A template literal split into raw quasis and raw `${}` sources.
/// `quasis.len() == exprs.len() + 1`.
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateToken {
    pub quasis: Vec<String>,
    pub exprs: Vec<(String, usize)>,
}

#[derive(Debug, Clone)]
pub struct Token {
    pub token_type: TokenType,
    pub line: usize,
    pub column: usize,
    /// A line terminator separates this token from the previous one.
    pub newline_before: bool,
}

impl Token {
    pub fn is_punct(&self, p: &str) -> bool {
        matches!(&self.token_type, TokenType::Punct(q) if *q == p)
    }

    pub fn is_ident(&self, name: &str) -> bool {
        matches!(&self.token_type, TokenType::Identifier(id) if id == name)
    }

    pub fn ident(&self) -> Option<&str> {
        match &self.token_type {
            TokenType::Identifier(id) => Some(id),
            _ => None,
        }
    }
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenType::Identifier(id) => write!(f, "identifier({})", id),
            TokenType::String(s) => write!(f, "string({})", s),
            TokenType::Number(n) => write!(f, "number({})", n),
            TokenType::Regex(r) => write!(f, "regex({})", r),
            TokenType::Template(_) => write!(f, "template literal"),
            TokenType::Punct(p) => write!(f, "'{}'", p),
            TokenType::Eof => write!(f, "EOF"),
        }
    }
}

pub struct Lexer {
    input: Vec<char>,
    position: usize,
    line: usize,
    column: usize,
    filename: String,
}

impl Lexer {
    pub fn new(input: &str, filename: String) -> Self {
        Self {
            input: input.chars().collect(),
            position: 0,
            line: 1,
            column: 1,
            filename,
        }
    }

    /// Lexer for a fragment that starts at `line` of the enclosing file.
    pub fn new_at_line(input: &str, filename: String, line: usize) -> Self {
        let mut lexer = Self::new(input, filename);
        lexer.line = line;
        lexer
    }

    pub fn tokenize(&mut self) -> Result<Vec<Token>> {
        let mut tokens: Vec<Token> = Vec::new();

        loop {
            let newline_before = self.skip_trivia()?;
            if self.is_at_end() {
                tokens.push(Token {
                    token_type: TokenType::Eof,
                    line: self.line,
                    column: self.column,
                    newline_before: true,
                });
                break;
            }
            let line = self.line;
            let column = self.column;
            let token_type = self.next_token(tokens.last())?;
            tokens.push(Token {
                token_type,
                line,
                column,
                newline_before,
            });
        }

        Ok(tokens)
    }

    fn next_token(&mut self, previous: Option<&Token>) -> Result<TokenType> {
        let ch = self.peek().unwrap_or('\0');

        if ch == '"' || ch == '\'' {
            return self.read_string(ch);
        }
        if ch == '`' {
            return self.read_template();
        }
        if ch.is_ascii_digit() || (ch == '.' && self.peek_at(1).map_or(false, |c| c.is_ascii_digit())) {
            return Ok(TokenType::Number(self.read_number()));
        }
        if is_identifier_start(ch) || (ch == '#' && self.peek_at(1).map_or(false, is_identifier_start)) {
            let mut ident = String::new();
            ident.push(self.advance());
            while let Some(c) = self.peek() {
                if is_identifier_part(c) {
                    ident.push(self.advance());
                } else {
                    break;
                }
            }
            return Ok(TokenType::Identifier(ident));
        }
        if ch == '/' && regex_allowed(previous) {
            return self.read_regex();
        }

        for punct in PUNCTUATORS {
            if self.matches(punct) {
                // `a?.5:b` is a conditional, not optional chaining
                if *punct == "?." && self.peek_at(2).map_or(false, |c| c.is_ascii_digit()) {
                    continue;
                }
                for _ in 0..punct.chars().count() {
                    self.advance();
                }
                return Ok(TokenType::Punct(punct));
            }
        }

        Err(CompilerError::parse(
            self.filename.clone(),
            self.line,
            format!("Unexpected character: '{}'", ch),
        ))
    }

    /// Skips whitespace and comments; reports whether a line break was crossed.
    fn skip_trivia(&mut self) -> Result<bool> {
        let mut newline = self.position == 0;
        while let Some(ch) = self.peek() {
            if ch == '\n' {
                newline = true;
                self.advance();
            } else if ch.is_whitespace() {
                self.advance();
            } else if ch == '/' && self.peek_at(1) == Some('/') {
                while let Some(c) = self.peek() {
                    if c == '\n' {
                        break;
                    }
                    self.advance();
                }
            } else if ch == '/' && self.peek_at(1) == Some('*') {
                let start_line = self.line;
                self.advance();
                self.advance();
                loop {
                    match self.peek() {
                        None => {
                            return Err(CompilerError::parse(
                                self.filename.clone(),
                                start_line,
                                "Unterminated block comment",
                            ))
                        }
                        Some('*') if self.peek_at(1) == Some('/') => {
                            self.advance();
                            self.advance();
                            break;
                        }
                        Some(c) => {
                            if c == '\n' {
                                newline = true;
                            }
                            self.advance();
                        }
                    }
                }
            } else {
                break;
            }
        }
        Ok(newline)
    }

    fn read_string(&mut self, quote: char) -> Result<TokenType> {
        let start_line = self.line;
        let mut raw = String::new();
        raw.push(self.advance());
        loop {
            match self.peek() {
                None | Some('\n') => {
                    return Err(CompilerError::parse(
                        self.filename.clone(),
                        start_line,
                        "Unterminated string literal",
                    ))
                }
                Some('\\') => {
                    raw.push(self.advance());
                    if !self.is_at_end() {
                        raw.push(self.advance());
                    }
                }
                Some(c) if c == quote => {
                    raw.push(self.advance());
                    return Ok(TokenType::String(raw));
                }
                Some(_) => raw.push(self.advance()),
            }
        }
    }

    fn read_template(&mut self) -> Result<TokenType> {
        let start_line = self.line;
        self.advance();
        let mut quasis = Vec::new();
        let mut exprs = Vec::new();
        let mut current = String::new();
        loop {
            match self.peek() {
                None => {
                    return Err(CompilerError::parse(
                        self.filename.clone(),
                        start_line,
                        "Unterminated template literal",
                    ))
                }
                Some('\\') => {
                    current.push(self.advance());
                    if !self.is_at_end() {
                        current.push(self.advance());
                    }
                }
                Some('`') => {
                    self.advance();
                    quasis.push(current);
                    return Ok(TokenType::Template(TemplateToken { quasis, exprs }));
                }
                Some('$') if self.peek_at(1) == Some('{') => {
                    self.advance();
                    self.advance();
                    quasis.push(std::mem::take(&mut current));
                    let expr_line = self.line;
                    let source = self.read_template_expression(start_line)?;
                    exprs.push((source, expr_line));
                }
                Some(_) => current.push(self.advance()),
            }
        }
    }

    /// Reads the source of a `${...}` hole up to its closing brace.
    fn read_template_expression(&mut self, start_line: usize) -> Result<String> {
        let mut depth = 0usize;
        let mut source = String::new();
        loop {
            let ch = match self.peek() {
                Some(c) => c,
                None => {
                    return Err(CompilerError::parse(
                        self.filename.clone(),
                        start_line,
                        "Unterminated template expression",
                    ))
                }
            };
            match ch {
                '{' => depth += 1,
                '}' if depth == 0 => {
                    self.advance();
                    return Ok(source);
                }
                '}' => depth -= 1,
                '"' | '\'' => {
                    if let TokenType::String(raw) = self.read_string(ch)? {
                        source.push_str(&raw);
                    }
                    continue;
                }
                '`' => {
                    // nested template: copy it verbatim
                    let begin = self.position;
                    self.read_template()?;
                    source.extend(&self.input[begin..self.position]);
                    continue;
                }
                _ => {}
            }
            source.push(self.advance());
        }
    }

    fn read_number(&mut self) -> String {
        let mut raw = String::new();
        if self.peek() == Some('0')
            && matches!(self.peek_at(1), Some('x' | 'X' | 'b' | 'B' | 'o' | 'O'))
        {
            raw.push(self.advance());
            raw.push(self.advance());
            while let Some(c) = self.peek() {
                if c.is_ascii_hexdigit() || c == '_' {
                    raw.push(self.advance());
                } else {
                    break;
                }
            }
        } else {
            while let Some(c) = self.peek() {
                if c.is_ascii_digit() || c == '_' || c == '.' {
                    if c == '.' && raw.contains('.') {
                        break;
                    }
                    raw.push(self.advance());
                } else if (c == 'e' || c == 'E')
                    && self.peek_at(1).map_or(false, |n| n.is_ascii_digit() || n == '-' || n == '+')
                {
                    raw.push(self.advance());
                    raw.push(self.advance());
                } else {
                    break;
                }
            }
        }
        if self.peek() == Some('n') {
            raw.push(self.advance());
        }
        raw
    }

    fn read_regex(&mut self) -> Result<TokenType> {
        let start_line = self.line;
        let mut raw = String::new();
        raw.push(self.advance());
        let mut in_class = false;
        loop {
            match self.peek() {
                None | Some('\n') => {
                    return Err(CompilerError::parse(
                        self.filename.clone(),
                        start_line,
                        "Unterminated regular expression literal",
                    ))
                }
                Some('\\') => {
                    raw.push(self.advance());
                    if !self.is_at_end() {
                        raw.push(self.advance());
                    }
                }
                Some('[') => {
                    in_class = true;
                    raw.push(self.advance());
                }
                Some(']') => {
                    in_class = false;
                    raw.push(self.advance());
                }
                Some('/') if !in_class => {
                    raw.push(self.advance());
                    break;
                }
                Some(_) => raw.push(self.advance()),
            }
        }
        while let Some(c) = self.peek() {
            if c.is_ascii_alphabetic() {
                raw.push(self.advance());
            } else {
                break;
            }
        }
        Ok(TokenType::Regex(raw))
    }

    fn matches(&self, text: &str) -> bool {
        text.chars()
            .enumerate()
            .all(|(i, c)| self.peek_at(i) == Some(c))
    }

    fn advance(&mut self) -> char {
        if self.position < self.input.len() {
            let ch = self.input[self.position];
            self.position += 1;
            if ch == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
            ch
        } else {
            '\0'
        }
    }

    fn peek(&self) -> Option<char> {
        self.input.get(self.position).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.input.get(self.position + offset).copied()
    }

    fn is_at_end(&self) -> bool {
        self.position >= self.input.len()
    }
}

fn is_identifier_start(ch: char) -> bool {
    ch.is_alphabetic() || ch == '_' || ch == '$'
}

fn is_identifier_part(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_' || ch == '$'
}

fn regex_allowed(previous: Option<&Token>) -> bool {
    match previous.map(|t| &t.token_type) {
        None => true,
        Some(TokenType::Punct(p)) => !matches!(*p, ")" | "]" | "}"),
        Some(TokenType::Identifier(id)) => REGEX_PREFIX_KEYWORDS.contains(&id.as_str()),
        Some(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(source: &str) -> Vec<TokenType> {
        Lexer::new(source, "test.ets".to_string())
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|t| t.token_type)
            .collect()
    }

    #[test]
    fn test_punctuators_longest_match() {
        let tokens = lex("a === b => c ?? d ?. e");
        assert_eq!(tokens[1], TokenType::Punct("==="));
        assert_eq!(tokens[3], TokenType::Punct("=>"));
        assert_eq!(tokens[5], TokenType::Punct("??"));
        assert_eq!(tokens[7], TokenType::Punct("?."));
    }

    #[test]
    fn test_decorated_field() {
        let tokens = lex("@State count: number = 0");
        assert_eq!(tokens[0], TokenType::Punct("@"));
        assert_eq!(tokens[1], TokenType::Identifier("State".into()));
        assert_eq!(tokens[5], TokenType::Punct("="));
        assert_eq!(tokens[6], TokenType::Number("0".into()));
    }

    #[test]
    fn test_string_keeps_quotes() {
        let tokens = lex(r#"'a\'b' "c""#);
        assert_eq!(tokens[0], TokenType::String(r"'a\'b'".into()));
        assert_eq!(tokens[1], TokenType::String("\"c\"".into()));
    }

    #[test]
    fn test_template_parts() {
        let tokens = lex("`count: ${this.count + 1} items`");
        match &tokens[0] {
            TokenType::Template(t) => {
                assert_eq!(t.quasis, vec!["count: ".to_string(), " items".to_string()]);
                assert_eq!(t.exprs[0].0, "this.count + 1");
            }
            other => panic!("Expected template, got {:?}", other),
        }
    }

    #[test]
    fn test_regex_versus_division() {
        let tokens = lex("let r = /ab+c/g; let d = a / b");
        assert_eq!(tokens[3], TokenType::Regex("/ab+c/g".into()));
        assert_eq!(tokens[9], TokenType::Punct("/"));
    }

    #[test]
    fn test_comments_and_newlines() {
        let tokens = Lexer::new("a // one\n/* two\n */ b", "test.ets".into())
            .tokenize()
            .unwrap();
        assert!(tokens[1].newline_before);
        assert_eq!(tokens[1].line, 3);
        assert_eq!(tokens[1].token_type, TokenType::Identifier("b".into()));
    }

    #[test]
    fn test_unterminated_string_is_error() {
        let result = Lexer::new("'abc", "test.ets".into()).tokenize();
        assert!(matches!(result, Err(CompilerError::Parse { line: 1, .. })));
    }
}
