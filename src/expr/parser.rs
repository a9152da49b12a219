//! Recursive-descent parser for the aggregate-spec expression language.
//!
//! Precedence, lowest to highest: comparison → additive → multiplicative →
//! unary minus → primary. All binary operators associate left-to-right.

use crate::error::ExpressionError;
use crate::types::Value;

use super::lexer::{Spanned, Token, tokenize};
use super::{BinaryOp, Expr};

pub(crate) fn parse(source: &str) -> Result<Expr, ExpressionError> {
    let tokens = tokenize(source)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        source_len: source.len(),
    };
    let expr = parser.comparison()?;
    if let Some(t) = parser.peek() {
        return Err(ExpressionError::Syntax {
            position: t.position,
            message: format!("unexpected trailing {:?}", t.token),
        });
    }
    Ok(expr)
}

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    source_len: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Spanned> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Spanned> {
        let t = self.tokens.get(self.pos).cloned();
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    fn error_here(&self, message: impl Into<String>) -> ExpressionError {
        ExpressionError::Syntax {
            position: self.peek().map_or(self.source_len, |t| t.position),
            message: message.into(),
        }
    }

    fn expect(&mut self, expected: Token, what: &str) -> Result<(), ExpressionError> {
        match self.peek() {
            Some(t) if t.token == expected => {
                self.pos += 1;
                Ok(())
            }
            _ => Err(self.error_here(format!("expected {what}"))),
        }
    }

    fn comparison(&mut self) -> Result<Expr, ExpressionError> {
        let mut lhs = self.additive()?;
        while let Some(op) = self.peek().and_then(|t| comparison_op(&t.token)) {
            self.pos += 1;
            let rhs = self.additive()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn additive(&mut self) -> Result<Expr, ExpressionError> {
        let mut lhs = self.multiplicative()?;
        loop {
            let op = match self.peek().map(|t| &t.token) {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Sub,
                _ => break,
            };
            self.pos += 1;
            let rhs = self.multiplicative()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn multiplicative(&mut self) -> Result<Expr, ExpressionError> {
        let mut lhs = self.unary()?;
        loop {
            let op = match self.peek().map(|t| &t.token) {
                Some(Token::Star) => BinaryOp::Mul,
                Some(Token::Slash) => BinaryOp::Div,
                _ => break,
            };
            self.pos += 1;
            let rhs = self.unary()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<Expr, ExpressionError> {
        if matches!(self.peek().map(|t| &t.token), Some(Token::Minus)) {
            self.pos += 1;
            let operand = self.unary()?;
            return Ok(Expr::UnaryMinus(Box::new(operand)));
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Expr, ExpressionError> {
        let Some(t) = self.advance() else {
            return Err(self.error_here("expected an expression"));
        };
        match t.token {
            Token::FieldRef(name) => Ok(Expr::FieldRef(name)),
            Token::Integer(v) => Ok(Expr::Literal(Value::Integer(v))),
            Token::Real(v) => Ok(Expr::Literal(Value::Real(v))),
            Token::Text(s) => Ok(Expr::Literal(Value::Text(s))),
            Token::LParen => {
                let inner = self.comparison()?;
                self.expect(Token::RParen, "')'")?;
                Ok(inner)
            }
            Token::Ident(name) => {
                if !name.eq_ignore_ascii_case("coalesce") {
                    return Err(ExpressionError::Syntax {
                        position: t.position,
                        message: format!("unknown function '{name}'"),
                    });
                }
                self.expect(Token::LParen, "'(' after coalesce")?;
                let first = self.comparison()?;
                self.expect(Token::Comma, "',' between coalesce arguments")?;
                let second = self.comparison()?;
                self.expect(Token::RParen, "')' after coalesce arguments")?;
                Ok(Expr::Coalesce(Box::new(first), Box::new(second)))
            }
            other => Err(ExpressionError::Syntax {
                position: t.position,
                message: format!("unexpected {other:?}"),
            }),
        }
    }
}

fn comparison_op(token: &Token) -> Option<BinaryOp> {
    match token {
        Token::Eq => Some(BinaryOp::Eq),
        Token::NotEq => Some(BinaryOp::NotEq),
        Token::Gt => Some(BinaryOp::Gt),
        Token::Lt => Some(BinaryOp::Lt),
        Token::GtEq => Some(BinaryOp::GtEq),
        Token::LtEq => Some(BinaryOp::LtEq),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::parse;
    use crate::error::ExpressionError;
    use crate::expr::{BinaryOp, Expr};
    use crate::types::Value;

    #[test]
    fn multiplication_binds_tighter_than_comparison() {
        // ( "a" = 1 ) * "b"  vs  "a" = 1 * "b"
        let grouped = parse(r#"( "a" = 1 ) * "b""#).unwrap();
        assert!(matches!(
            grouped,
            Expr::Binary {
                op: BinaryOp::Mul,
                ..
            }
        ));

        let flat = parse(r#""a" = 1 * "b""#).unwrap();
        match flat {
            Expr::Binary {
                op: BinaryOp::Eq,
                rhs,
                ..
            } => assert!(matches!(
                *rhs,
                Expr::Binary {
                    op: BinaryOp::Mul,
                    ..
                }
            )),
            other => panic!("unexpected parse: {other:?}"),
        }
    }

    #[test]
    fn parses_coalesce_case_insensitively() {
        assert!(matches!(
            parse(r#" COALESCE("name", 'none') "#).unwrap(),
            Expr::Coalesce(..)
        ));
    }

    #[test]
    fn parses_unary_minus() {
        let expr = parse(r#"-"x" + 1"#).unwrap();
        match expr {
            Expr::Binary {
                op: BinaryOp::Add,
                lhs,
                ..
            } => assert!(matches!(*lhs, Expr::UnaryMinus(_))),
            other => panic!("unexpected parse: {other:?}"),
        }
    }

    #[test]
    fn parses_literals() {
        assert_eq!(parse("601").unwrap(), Expr::Literal(Value::Integer(601)));
        assert_eq!(parse("1.5").unwrap(), Expr::Literal(Value::Real(1.5)));
        assert_eq!(
            parse("'abc'").unwrap(),
            Expr::Literal(Value::Text("abc".to_string()))
        );
    }

    #[test]
    fn rejects_unknown_functions_and_trailing_input() {
        assert!(matches!(
            parse("greatest(1, 2)"),
            Err(ExpressionError::Syntax { .. })
        ));
        assert!(matches!(
            parse("1 2"),
            Err(ExpressionError::Syntax { .. })
        ));
        assert!(matches!(
            parse("( 1"),
            Err(ExpressionError::Syntax { .. })
        ));
    }
}
