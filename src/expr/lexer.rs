//! Tokenizer for the aggregate-spec expression language.

use crate::error::ExpressionError;

/// One lexical token.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    /// Double-quoted field reference, e.g. `"Bld_Str"`.
    FieldRef(String),
    /// Integer literal.
    Integer(i64),
    /// Real literal.
    Real(f64),
    /// Single-quoted text literal, e.g. `'none'`.
    Text(String),
    /// Bare identifier (only function names are legal here).
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    Eq,
    NotEq,
    Gt,
    Lt,
    GtEq,
    LtEq,
    LParen,
    RParen,
    Comma,
}

/// A token plus its byte offset in the source, for error reporting.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Spanned {
    pub token: Token,
    pub position: usize,
}

pub(crate) fn tokenize(source: &str) -> Result<Vec<Spanned>, ExpressionError> {
    let bytes = source.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0usize;

    while i < bytes.len() {
        let start = i;
        let c = bytes[i] as char;
        match c {
            ' ' | '\t' | '\r' | '\n' => {
                i += 1;
            }
            '"' => {
                let (name, next) = read_quoted(source, i, '"')?;
                tokens.push(spanned(Token::FieldRef(name), start));
                i = next;
            }
            '\'' => {
                let (text, next) = read_quoted(source, i, '\'')?;
                tokens.push(spanned(Token::Text(text), start));
                i = next;
            }
            '+' => {
                tokens.push(spanned(Token::Plus, start));
                i += 1;
            }
            '-' => {
                tokens.push(spanned(Token::Minus, start));
                i += 1;
            }
            '*' => {
                tokens.push(spanned(Token::Star, start));
                i += 1;
            }
            '/' => {
                tokens.push(spanned(Token::Slash, start));
                i += 1;
            }
            '(' => {
                tokens.push(spanned(Token::LParen, start));
                i += 1;
            }
            ')' => {
                tokens.push(spanned(Token::RParen, start));
                i += 1;
            }
            ',' => {
                tokens.push(spanned(Token::Comma, start));
                i += 1;
            }
            '=' => {
                tokens.push(spanned(Token::Eq, start));
                i += 1;
            }
            '<' => match bytes.get(i + 1).copied() {
                Some(b'>') => {
                    tokens.push(spanned(Token::NotEq, start));
                    i += 2;
                }
                Some(b'=') => {
                    tokens.push(spanned(Token::LtEq, start));
                    i += 2;
                }
                _ => {
                    tokens.push(spanned(Token::Lt, start));
                    i += 1;
                }
            },
            '>' => match bytes.get(i + 1).copied() {
                Some(b'=') => {
                    tokens.push(spanned(Token::GtEq, start));
                    i += 2;
                }
                _ => {
                    tokens.push(spanned(Token::Gt, start));
                    i += 1;
                }
            },
            '0'..='9' => {
                let (token, next) = read_number(source, i)?;
                tokens.push(spanned(token, start));
                i = next;
            }
            'a'..='z' | 'A'..='Z' | '_' => {
                let mut end = i + 1;
                while end < bytes.len()
                    && matches!(bytes[end] as char, 'a'..='z' | 'A'..='Z' | '0'..='9' | '_')
                {
                    end += 1;
                }
                tokens.push(spanned(Token::Ident(source[i..end].to_string()), start));
                i = end;
            }
            other => {
                return Err(ExpressionError::Syntax {
                    position: start,
                    message: format!("unexpected character '{other}'"),
                });
            }
        }
    }

    Ok(tokens)
}

fn spanned(token: Token, position: usize) -> Spanned {
    Spanned { token, position }
}

/// Reads a quoted token starting at `start` (which holds the opening quote).
/// Returns the unquoted content and the index just past the closing quote.
fn read_quoted(source: &str, start: usize, quote: char) -> Result<(String, usize), ExpressionError> {
    let rest = &source[start + 1..];
    match rest.find(quote) {
        Some(len) => Ok((rest[..len].to_string(), start + 1 + len + 1)),
        None => Err(ExpressionError::Syntax {
            position: start,
            message: format!("unterminated {quote}...{quote} literal"),
        }),
    }
}

fn read_number(source: &str, start: usize) -> Result<(Token, usize), ExpressionError> {
    let bytes = source.as_bytes();
    let mut end = start;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }

    let mut is_real = false;
    if end < bytes.len() && bytes[end] == b'.' && bytes.get(end + 1).is_some_and(u8::is_ascii_digit)
    {
        is_real = true;
        end += 1;
        while end < bytes.len() && bytes[end].is_ascii_digit() {
            end += 1;
        }
    }

    let text = &source[start..end];
    let token = if is_real {
        Token::Real(text.parse::<f64>().map_err(|e| ExpressionError::Syntax {
            position: start,
            message: e.to_string(),
        })?)
    } else {
        Token::Integer(text.parse::<i64>().map_err(|e| ExpressionError::Syntax {
            position: start,
            message: e.to_string(),
        })?)
    };
    Ok((token, end))
}
