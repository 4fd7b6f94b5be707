use super::Value;
use std::collections::HashSet;
use std::fmt;

/// Binary operators of the condition language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOperator {
    Or,
    And,
    Equal,
    NotEqual,
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
}

impl BinaryOperator {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOperator::Or => "OR",
            BinaryOperator::And => "AND",
            BinaryOperator::Equal => "==",
            BinaryOperator::NotEqual => "!=",
            BinaryOperator::GreaterThan => ">",
            BinaryOperator::GreaterThanOrEqual => ">=",
            BinaryOperator::LessThan => "<",
            BinaryOperator::LessThanOrEqual => "<=",
        }
    }

    pub fn is_comparison(&self) -> bool {
        !matches!(self, BinaryOperator::Or | BinaryOperator::And)
    }

    pub fn precedence(&self) -> u8 {
        match self {
            BinaryOperator::Or => 1,
            BinaryOperator::And => 2,
            _ => 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOperator {
    Not,
}

impl UnaryOperator {
    pub fn symbol(&self) -> &'static str {
        match self {
            UnaryOperator::Not => "NOT",
        }
    }
}

/// The parsed form of a free-text decision condition.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Binary {
        left: Box<Expression>,
        op: BinaryOperator,
        right: Box<Expression>,
    },
    Unary {
        op: UnaryOperator,
        operand: Box<Expression>,
    },
    Variable(String),
    Literal(Value),
}

impl Expression {
    pub fn binary(left: Expression, op: BinaryOperator, right: Expression) -> Self {
        Expression::Binary {
            left: Box::new(left),
            op,
            right: Box::new(right),
        }
    }

    pub fn not(operand: Expression) -> Self {
        Expression::Unary {
            op: UnaryOperator::Not,
            operand: Box::new(operand),
        }
    }

    pub fn variable(name: impl Into<String>) -> Self {
        Expression::Variable(name.into())
    }

    pub fn literal(value: impl Into<Value>) -> Self {
        Expression::Literal(value.into())
    }

    pub fn precedence(&self) -> u8 {
        match self {
            Expression::Binary { op, .. } => op.precedence(),
            Expression::Unary { .. } => 3,
            Expression::Variable(_) | Expression::Literal(_) => 5,
        }
    }

    /// Collects every variable name the expression reads.
    pub fn referenced_variables(&self, names: &mut HashSet<String>) {
        match self {
            Expression::Binary { left, right, .. } => {
                left.referenced_variables(names);
                right.referenced_variables(names);
            }
            Expression::Unary { operand, .. } => operand.referenced_variables(names),
            Expression::Variable(name) => {
                names.insert(name.clone());
            }
            Expression::Literal(_) => {}
        }
    }

    fn fmt_with_precedence(&self, f: &mut fmt::Formatter<'_>, parent: u8, right: bool) -> fmt::Result {
        let current = self.precedence();
        // Comparisons do not chain, so a comparison nested in a comparison always needs parentheses.
        let needs_parens = current < parent
            || (current == parent && (current == 4 || right));

        if needs_parens {
            write!(f, "(")?;
        }

        match self {
            Expression::Binary { left, op, right } => {
                left.fmt_with_precedence(f, current, false)?;
                write!(f, " {} ", op.symbol())?;
                right.fmt_with_precedence(f, current, true)?;
            }
            Expression::Unary { op, operand } => {
                write!(f, "{} ", op.symbol())?;
                operand.fmt_with_precedence(f, current, false)?;
            }
            Expression::Variable(name) => write!(f, "{}", name)?,
            Expression::Literal(value) => write!(f, "{}", LiteralDisplay(value))?,
        }

        if needs_parens {
            write!(f, ")")?;
        }
        Ok(())
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_with_precedence(f, 0, false)
    }
}

/// Renders literals the way they would be written in a condition.
pub(crate) struct LiteralDisplay<'a>(pub &'a Value);

impl fmt::Display for LiteralDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Value::String(s) => write!(f, "\"{}\"", s.replace('"', "\\\"")),
            other => write!(f, "{}", other),
        }
    }
}
