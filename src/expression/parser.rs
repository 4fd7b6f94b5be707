use super::lexer::{Lexer, Token, TokenKind};
use crate::ast::{BinaryOperator, Expression, Value};
use crate::error::ParseError;

/// Recursive-descent parser for decision conditions.
///
/// Precedence from loosest to tightest: `OR`, `AND`, `NOT`, comparisons,
/// primaries. Binary operators associate to the left and comparisons do not chain.
pub struct Parser<'a> {
    input: &'a str,
    tokens: Vec<Token>,
    pos: usize,
}

impl<'a> Parser<'a> {
    pub fn new(input: &'a str, tokens: Vec<Token>) -> Self {
        Self {
            input,
            tokens,
            pos: 0,
        }
    }

    fn current(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn check(&self, kind: &TokenKind) -> bool {
        self.current().is_some_and(|token| &token.kind == kind)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    /// Position used in errors: the current token, or the end of input.
    fn position(&self) -> usize {
        self.current()
            .map(|token| token.position)
            .unwrap_or_else(|| self.input.chars().count())
    }

    /// Parses the full token stream, rejecting anything left over.
    pub fn parse(mut self) -> Result<Expression, ParseError> {
        if self.tokens.is_empty() {
            return Err(ParseError::Empty);
        }

        let expression = self.parse_or()?;
        match self.current() {
            None => Ok(expression),
            Some(token) => Err(ParseError::TrailingTokens {
                token: token.kind.to_string(),
                position: token.position,
                input: self.input.to_string(),
            }),
        }
    }

    fn parse_or(&mut self) -> Result<Expression, ParseError> {
        let mut left = self.parse_and()?;
        while self.check(&TokenKind::Or) {
            self.advance();
            let right = self.parse_and()?;
            left = Expression::binary(left, BinaryOperator::Or, right);
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expression, ParseError> {
        let mut left = self.parse_not()?;
        while self.check(&TokenKind::And) {
            self.advance();
            let right = self.parse_not()?;
            left = Expression::binary(left, BinaryOperator::And, right);
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<Expression, ParseError> {
        if self.check(&TokenKind::Not) {
            self.advance();
            let operand = self.parse_not()?;
            return Ok(Expression::not(operand));
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Expression, ParseError> {
        let left = self.parse_primary()?;

        let op = match self.current().map(|token| &token.kind) {
            Some(TokenKind::Equal) => BinaryOperator::Equal,
            Some(TokenKind::NotEqual) => BinaryOperator::NotEqual,
            Some(TokenKind::Greater) => BinaryOperator::GreaterThan,
            Some(TokenKind::GreaterEqual) => BinaryOperator::GreaterThanOrEqual,
            Some(TokenKind::Less) => BinaryOperator::LessThan,
            Some(TokenKind::LessEqual) => BinaryOperator::LessThanOrEqual,
            _ => return Ok(left),
        };
        self.advance();

        let right = self.parse_primary()?;
        Ok(Expression::binary(left, op, right))
    }

    fn parse_primary(&mut self) -> Result<Expression, ParseError> {
        let position = self.position();
        let Some(token) = self.advance() else {
            return Err(self.missing_operand(position));
        };

        match token.kind {
            TokenKind::Identifier(name) => Ok(Expression::Variable(name)),
            TokenKind::Integer(n) => Ok(Expression::Literal(Value::Int(n))),
            TokenKind::Float(n) => Ok(Expression::Literal(Value::Float(n))),
            TokenKind::String(s) => Ok(Expression::Literal(Value::String(s))),
            TokenKind::True => Ok(Expression::Literal(Value::Bool(true))),
            TokenKind::False => Ok(Expression::Literal(Value::Bool(false))),
            TokenKind::LeftParen => {
                let inner = self.parse_or()?;
                if self.check(&TokenKind::RightParen) {
                    self.advance();
                    Ok(inner)
                } else {
                    Err(ParseError::UnclosedParenthesis {
                        position: token.position,
                        input: self.input.to_string(),
                    })
                }
            }
            _ => Err(self.missing_operand(token.position)),
        }
    }

    fn missing_operand(&self, position: usize) -> ParseError {
        ParseError::MissingOperand {
            position,
            input: self.input.to_string(),
        }
    }
}

/// Parses a condition string into an [`Expression`].
pub fn parse(input: &str) -> Result<Expression, ParseError> {
    if input.trim().is_empty() {
        return Err(ParseError::Empty);
    }
    let tokens = Lexer::new(input).tokenize()?;
    Parser::new(input, tokens).parse()
}
