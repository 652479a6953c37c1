//! Recursive-descent parser and evaluator for percent-rewritten formulas.
//!
//! Grammar:
//!
//! ```text
//! expression := term (('+' | '-') term)*
//! term       := unary (('*' | '/') unary)*
//! unary      := ('+' | '-') unary | primary
//! primary    := number | '(' expression ')'
//! ```
//!
//! Division follows IEEE semantics; the caller decides what to do with a
//! non-finite result.
//!
//! A sign directly followed by the same sign (`--`, `++`) is an increment or
//! decrement token in the formula language, not two unary signs, and is
//! rejected. Separated signs chain as usual: `2 - -3` is 5, `2--3` is an
//! error.

use super::FormulaError;

/// Nesting limit for parentheses and unary chains
const MAX_DEPTH: usize = 256;

#[derive(Debug, Clone, PartialEq)]
enum TokenKind {
    Number(f64),
    Op(char),
    LParen,
    RParen,
}

#[derive(Debug, Clone, PartialEq)]
struct Token {
    kind: TokenKind,
    /// Char offset in the source text
    position: usize,
}

impl Token {
    fn describe(&self) -> String {
        match &self.kind {
            TokenKind::Number(n) => n.to_string(),
            TokenKind::Op(c) => c.to_string(),
            TokenKind::LParen => "(".to_string(),
            TokenKind::RParen => ")".to_string(),
        }
    }
}

fn tokenize(text: &str) -> Result<Vec<Token>, FormulaError> {
    let chars: Vec<char> = text.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        match c {
            '(' => {
                tokens.push(Token { kind: TokenKind::LParen, position: i });
                i += 1;
            }
            ')' => {
                tokens.push(Token { kind: TokenKind::RParen, position: i });
                i += 1;
            }
            '+' | '-' if chars.get(i + 1) == Some(&c) => {
                return Err(FormulaError::UnexpectedToken {
                    token: format!("{c}{c}"),
                    position: i,
                });
            }
            '+' | '-' | '*' | '/' => {
                tokens.push(Token { kind: TokenKind::Op(c), position: i });
                i += 1;
            }
            _ if c.is_ascii_digit() || c == '.' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let literal: String = chars[start..i].iter().collect();
                let value: f64 = literal
                    .parse()
                    .map_err(|_| FormulaError::InvalidNumber(literal.clone()))?;
                tokens.push(Token { kind: TokenKind::Number(value), position: start });
            }
            _ => return Err(FormulaError::UnexpectedToken { token: c.to_string(), position: i }),
        }
    }
    Ok(tokens)
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_op(&self) -> Option<char> {
        match self.peek() {
            Some(Token { kind: TokenKind::Op(c), .. }) => Some(*c),
            _ => None,
        }
    }

    fn descend(&mut self) -> Result<(), FormulaError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(FormulaError::TooDeep);
        }
        Ok(())
    }

    fn expression(&mut self) -> Result<f64, FormulaError> {
        let mut value = self.term()?;
        while let Some(op @ ('+' | '-')) = self.peek_op() {
            self.pos += 1;
            let rhs = self.term()?;
            if op == '+' {
                value += rhs;
            } else {
                value -= rhs;
            }
        }
        Ok(value)
    }

    fn term(&mut self) -> Result<f64, FormulaError> {
        let mut value = self.unary()?;
        while let Some(op @ ('*' | '/')) = self.peek_op() {
            self.pos += 1;
            let rhs = self.unary()?;
            if op == '*' {
                value *= rhs;
            } else {
                value /= rhs;
            }
        }
        Ok(value)
    }

    fn unary(&mut self) -> Result<f64, FormulaError> {
        match self.peek_op() {
            Some(op @ ('+' | '-')) => {
                self.pos += 1;
                self.descend()?;
                let operand = self.unary()?;
                self.depth -= 1;
                Ok(if op == '-' { -operand } else { operand })
            }
            _ => self.primary(),
        }
    }

    fn primary(&mut self) -> Result<f64, FormulaError> {
        let token = self.peek().cloned().ok_or(FormulaError::UnexpectedEnd)?;
        match token.kind {
            TokenKind::Number(n) => {
                self.pos += 1;
                Ok(n)
            }
            TokenKind::LParen => {
                self.pos += 1;
                self.descend()?;
                let value = self.expression()?;
                self.depth -= 1;
                match self.peek() {
                    Some(Token { kind: TokenKind::RParen, .. }) => {
                        self.pos += 1;
                        Ok(value)
                    }
                    Some(other) => Err(FormulaError::UnexpectedToken {
                        token: other.describe(),
                        position: other.position,
                    }),
                    None => Err(FormulaError::UnclosedParen(token.position)),
                }
            }
            _ => Err(FormulaError::UnexpectedToken {
                token: token.describe(),
                position: token.position,
            }),
        }
    }
}

/// Parse and evaluate `text`. The whole input must form one expression.
pub fn evaluate(text: &str) -> Result<f64, FormulaError> {
    let tokens = tokenize(text)?;
    let mut parser = Parser {
        tokens: &tokens,
        pos: 0,
        depth: 0,
    };
    let value = parser.expression()?;
    if let Some(extra) = parser.peek() {
        return Err(FormulaError::UnexpectedToken {
            token: extra.describe(),
            position: extra.position,
        });
    }
    Ok(value)
}
