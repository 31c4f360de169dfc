//! A minimal text-to-[`Value`] reader for the core S-expression syntax.
//!
//! `spec.md` §1 scopes a full surface-language parser/desugarer out as an
//! external collaborator; this reader only has to decode the already-core-
//! form directive payloads (`assume`/`observe`/`predict`/`infer`
//! expressions) described in `spec.md` §6, not desugar a richer surface
//! language. No parser-combinator crate is used anywhere in the example
//! corpus for a grammar this small, so it is hand-written the way a
//! one-off reader macro would be.

use std::rc::Rc;

use venture_core::{Value, VentureError};

/// Reads the first expression from `text`, ignoring any trailing input.
pub fn read(text: &str) -> Result<Value, VentureError> {
    let tokens = tokenize(text);
    let mut position = 0;
    let value = read_expr(&tokens, &mut position)?;
    Ok(value)
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Open,
    Close,
    OpenBracket,
    CloseBracket,
    Quote,
    Atom(String),
}

fn tokenize(text: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut chars = text.chars().peekable();
    while let Some(&c) = chars.peek() {
        match c {
            '(' => {
                tokens.push(Token::Open);
                chars.next();
            }
            ')' => {
                tokens.push(Token::Close);
                chars.next();
            }
            '[' => {
                tokens.push(Token::OpenBracket);
                chars.next();
            }
            ']' => {
                tokens.push(Token::CloseBracket);
                chars.next();
            }
            '\'' => {
                tokens.push(Token::Quote);
                chars.next();
            }
            c if c.is_whitespace() => {
                chars.next();
            }
            ';' => {
                for c in chars.by_ref() {
                    if c == '\n' {
                        break;
                    }
                }
            }
            _ => {
                let mut atom = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_whitespace() || "()[]'".contains(c) {
                        break;
                    }
                    atom.push(c);
                    chars.next();
                }
                tokens.push(Token::Atom(atom));
            }
        }
    }
    tokens
}

fn read_expr(tokens: &[Token], position: &mut usize) -> Result<Value, VentureError> {
    let token = tokens
        .get(*position)
        .ok_or_else(|| VentureError::illegal_program("sexpr-eof", "unexpected end of expression"))?
        .clone();
    *position += 1;

    match token {
        Token::Open => read_list(tokens, position, Token::Close),
        Token::OpenBracket => read_vector(tokens, position),
        Token::Quote => {
            let quoted = read_expr(tokens, position)?;
            Ok(Value::list(vec![Value::Symbol("quote".to_string()), quoted]))
        }
        Token::Atom(text) => Ok(atom_value(&text)),
        Token::Close | Token::CloseBracket => Err(VentureError::illegal_program(
            "sexpr-unbalanced",
            "unexpected closing delimiter",
        )),
    }
}

fn read_list(tokens: &[Token], position: &mut usize, closer: Token) -> Result<Value, VentureError> {
    let mut items = Vec::new();
    loop {
        match tokens.get(*position) {
            None => {
                return Err(VentureError::illegal_program(
                    "sexpr-unbalanced",
                    "missing closing delimiter",
                ))
            }
            Some(t) if *t == closer => {
                *position += 1;
                return Ok(Value::list(items));
            }
            _ => items.push(read_expr(tokens, position)?),
        }
    }
}

fn read_vector(tokens: &[Token], position: &mut usize) -> Result<Value, VentureError> {
    let mut items = Vec::new();
    loop {
        match tokens.get(*position) {
            None => {
                return Err(VentureError::illegal_program(
                    "sexpr-unbalanced",
                    "missing closing bracket",
                ))
            }
            Some(Token::CloseBracket) => {
                *position += 1;
                return Ok(Value::Vector(Rc::new(items)));
            }
            _ => items.push(read_expr(tokens, position)?),
        }
    }
}

fn atom_value(text: &str) -> Value {
    match text {
        "#t" | "true" => return Value::Boolean(true),
        "#f" | "false" => return Value::Boolean(false),
        "nil" | "()" => return Value::Nil,
        _ => {}
    }
    if let Some(rest) = text.strip_prefix("atom<").and_then(|s| s.strip_suffix('>')) {
        if let Ok(i) = rest.parse::<i64>() {
            return Value::Atom(i);
        }
    }
    if let Ok(n) = text.parse::<f64>() {
        return Value::Number(n);
    }
    Value::Symbol(text.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_a_nested_application() {
        let value = read("(normal (add 1 2) 0.5)").unwrap();
        assert_eq!(
            value,
            Value::list(vec![
                Value::Symbol("normal".to_string()),
                Value::list(vec![Value::Symbol("add".to_string()), Value::Number(1.0), Value::Number(2.0)]),
                Value::Number(0.5),
            ])
        );
    }

    #[test]
    fn reads_booleans_and_quote_shorthand() {
        assert_eq!(read("#t").unwrap(), Value::Boolean(true));
        let quoted = read("'foo").unwrap();
        assert_eq!(
            quoted,
            Value::list(vec![Value::Symbol("quote".to_string()), Value::Symbol("foo".to_string())])
        );
    }

    #[test]
    fn reads_bracketed_vectors() {
        let value = read("[1 2 3]").unwrap();
        assert_eq!(value, Value::Vector(Rc::new(vec![Value::Number(1.0), Value::Number(2.0), Value::Number(3.0)])));
    }
}
