use crate::error::LexError;
use std::fmt;

/// The lexical units of the condition language.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Identifier(String),
    Integer(i64),
    Float(f64),
    String(String),
    True,
    False,
    And,
    Or,
    Not,
    Equal,
    NotEqual,
    Greater,
    GreaterEqual,
    Less,
    LessEqual,
    LeftParen,
    RightParen,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Identifier(name) => write!(f, "{}", name),
            TokenKind::Integer(n) => write!(f, "{}", n),
            TokenKind::Float(n) => write!(f, "{}", n),
            TokenKind::String(s) => write!(f, "\"{}\"", s),
            TokenKind::True => write!(f, "TRUE"),
            TokenKind::False => write!(f, "FALSE"),
            TokenKind::And => write!(f, "AND"),
            TokenKind::Or => write!(f, "OR"),
            TokenKind::Not => write!(f, "NOT"),
            TokenKind::Equal => write!(f, "=="),
            TokenKind::NotEqual => write!(f, "!="),
            TokenKind::Greater => write!(f, ">"),
            TokenKind::GreaterEqual => write!(f, ">="),
            TokenKind::Less => write!(f, "<"),
            TokenKind::LessEqual => write!(f, "<="),
            TokenKind::LeftParen => write!(f, "("),
            TokenKind::RightParen => write!(f, ")"),
        }
    }
}

/// A token together with the character offset it starts at.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub position: usize,
}

/// Splits a condition string into tokens.
#[derive(Debug)]
pub struct Lexer<'a> {
    input: &'a str,
    source: Vec<char>,
    pos: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            source: input.chars().collect(),
            pos: 0,
        }
    }

    fn current(&self) -> Option<char> {
        self.source.get(self.pos).copied()
    }

    fn peek(&self) -> Option<char> {
        self.source.get(self.pos + 1).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.current();
        self.pos += 1;
        ch
    }

    fn skip_whitespace(&mut self) {
        while self.current().is_some_and(char::is_whitespace) {
            self.advance();
        }
    }

    fn read_identifier(&mut self) -> String {
        let mut id = String::new();
        while let Some(ch) = self.current() {
            if ch.is_alphanumeric() || ch == '_' {
                id.push(ch);
                self.advance();
            } else {
                break;
            }
        }
        id
    }

    fn read_number(&mut self, start: usize) -> Result<TokenKind, LexError> {
        let mut text = String::new();
        if self.current() == Some('-') {
            text.push('-');
            self.advance();
        }

        let mut seen_dot = false;
        while let Some(ch) = self.current() {
            if ch.is_ascii_digit() {
                text.push(ch);
            } else if ch == '.' && !seen_dot {
                seen_dot = true;
                text.push(ch);
            } else if ch == '.' || ch.is_alphanumeric() || ch == '_' {
                // Swallow the rest of the word so the error shows the whole token.
                while let Some(c) = self
                    .current()
                    .filter(|c| c.is_alphanumeric() || *c == '_' || *c == '.')
                {
                    text.push(c);
                    self.advance();
                }
                return Err(self.malformed(text, start));
            } else {
                break;
            }
            self.advance();
        }

        if text.ends_with('.') {
            return Err(self.malformed(text, start));
        }

        if seen_dot {
            text.parse::<f64>()
                .map(TokenKind::Float)
                .map_err(|_| self.malformed(text.clone(), start))
        } else {
            text.parse::<i64>()
                .map(TokenKind::Integer)
                .map_err(|_| self.malformed(text.clone(), start))
        }
    }

    fn read_string(&mut self, start: usize) -> Result<TokenKind, LexError> {
        let quote = self.advance();
        let mut s = String::new();

        while let Some(ch) = self.current() {
            if Some(ch) == quote {
                self.advance();
                return Ok(TokenKind::String(s));
            } else if ch == '\\' {
                self.advance();
                match self.advance() {
                    Some('n') => s.push('\n'),
                    Some('t') => s.push('\t'),
                    Some(escaped) => s.push(escaped),
                    None => break,
                }
            } else {
                s.push(ch);
                self.advance();
            }
        }

        Err(LexError::UnterminatedString {
            position: start,
            input: self.input.to_string(),
        })
    }

    fn malformed(&self, text: String, position: usize) -> LexError {
        LexError::MalformedNumber {
            text,
            position,
            input: self.input.to_string(),
        }
    }

    /// Returns the next token, or `None` at the end of input.
    pub fn next_token(&mut self) -> Option<Result<Token, LexError>> {
        self.skip_whitespace();
        let position = self.pos;
        let ch = self.current()?;

        let kind = if ch.is_alphabetic() || ch == '_' {
            let id = self.read_identifier();
            Ok(match id.to_ascii_uppercase().as_str() {
                "AND" => TokenKind::And,
                "OR" => TokenKind::Or,
                "NOT" => TokenKind::Not,
                "TRUE" => TokenKind::True,
                "FALSE" => TokenKind::False,
                _ => TokenKind::Identifier(id),
            })
        } else if ch.is_ascii_digit() || (ch == '-' && self.peek().is_some_and(|c| c.is_ascii_digit())) {
            self.read_number(position)
        } else if ch == '"' || ch == '\'' {
            self.read_string(position)
        } else {
            self.advance();
            let followed_by_eq = self.current() == Some('=');
            let kind = match (ch, followed_by_eq) {
                ('(', _) => Some(TokenKind::LeftParen),
                (')', _) => Some(TokenKind::RightParen),
                ('>', true) => Some(TokenKind::GreaterEqual),
                ('>', false) => Some(TokenKind::Greater),
                ('<', true) => Some(TokenKind::LessEqual),
                ('<', false) => Some(TokenKind::Less),
                ('=', true) => Some(TokenKind::Equal),
                ('!', true) => Some(TokenKind::NotEqual),
                _ => None,
            };
            match kind {
                Some(kind) => {
                    if matches!(
                        kind,
                        TokenKind::GreaterEqual
                            | TokenKind::LessEqual
                            | TokenKind::Equal
                            | TokenKind::NotEqual
                    ) {
                        self.advance();
                    }
                    Ok(kind)
                }
                None => Err(LexError::UnexpectedCharacter {
                    character: ch,
                    position,
                    input: self.input.to_string(),
                }),
            }
        };

        Some(kind.map(|kind| Token { kind, position }))
    }

    /// Tokenizes the whole input.
    pub fn tokenize(mut self) -> Result<Vec<Token>, LexError> {
        let mut tokens = Vec::new();
        while let Some(token) = self.next_token() {
            tokens.push(token?);
        }
        Ok(tokens)
    }
}

/// Convenience wrapper around [`Lexer::tokenize`].
pub fn tokenize(input: &str) -> Result<Vec<Token>, LexError> {
    Lexer::new(input).tokenize()
}
