//! A run script: one directive per line, read with [`venture_engine::read`]
//! and dispatched to a [`venture_engine::RiplEngine`].
//!
//! Grounded on `asm-sim`'s own habit of taking a declarative input file
//! (a YAML config plus a JSON state manifest) and feeding it straight
//! into the library it wraps, rather than growing its own DSL runtime:
//! this reader does the same, leaning entirely on `venture-engine`'s
//! existing `sexpr` grammar instead of inventing a second one.

use std::error::Error;
use std::fmt;

use venture_core::Value;
use venture_engine::read;

/// One line of a run script.
#[derive(Debug, Clone)]
pub enum ScriptLine {
    /// `(assume symbol expression)`
    Assume { symbol: String, expression: Value },
    /// `(observe expression value)`
    Observe { expression: Value, value: Value },
    /// `(predict expression)`
    Predict { expression: Value },
    /// `(sample expression)`
    Sample { expression: Value },
    /// `(forget id)`
    Forget { id: u64 },
    /// `(infer kernel-expression)`
    Infer { expression: Value },
}

/// A script line that could not be parsed.
#[derive(Debug)]
pub struct ScriptError {
    line_number: usize,
    message: String,
}

impl fmt::Display for ScriptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line_number, self.message)
    }
}

impl Error for ScriptError {}

/// Parses every non-blank, non-comment line of `text` into a [`ScriptLine`].
pub fn parse(text: &str) -> Result<Vec<ScriptLine>, ScriptError> {
    let mut lines = Vec::new();
    for (offset, raw_line) in text.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with(';') {
            continue;
        }
        lines.push(parse_line(line, offset + 1)?);
    }
    Ok(lines)
}

fn parse_line(line: &str, line_number: usize) -> Result<ScriptLine, ScriptError> {
    let to_error = |message: String| ScriptError { line_number, message };

    let expr = read(line).map_err(|err| to_error(err.info().message.clone()))?;
    let items = venture_engine_list(&expr).map_err(to_error)?;
    let (head, rest) = items
        .split_first()
        .ok_or_else(|| to_error("an empty directive".to_string()))?;
    let head = head
        .as_symbol()
        .map_err(|err| to_error(err.info().message.clone()))?;

    match head {
        "assume" => match rest {
            [symbol, expression] => Ok(ScriptLine::Assume {
                symbol: symbol.as_symbol().map_err(|err| to_error(err.info().message.clone()))?.to_string(),
                expression: expression.clone(),
            }),
            _ => Err(to_error("assume takes a symbol and an expression".to_string())),
        },
        "observe" => match rest {
            [expression, value] => Ok(ScriptLine::Observe { expression: expression.clone(), value: value.clone() }),
            _ => Err(to_error("observe takes an expression and a value".to_string())),
        },
        "predict" => match rest {
            [expression] => Ok(ScriptLine::Predict { expression: expression.clone() }),
            _ => Err(to_error("predict takes a single expression".to_string())),
        },
        "sample" => match rest {
            [expression] => Ok(ScriptLine::Sample { expression: expression.clone() }),
            _ => Err(to_error("sample takes a single expression".to_string())),
        },
        "forget" => match rest {
            [id] => Ok(ScriptLine::Forget {
                id: id.as_number().map_err(|err| to_error(err.info().message.clone()))? as u64,
            }),
            _ => Err(to_error("forget takes a single directive id".to_string())),
        },
        "infer" => match rest {
            [expression] => Ok(ScriptLine::Infer { expression: expression.clone() }),
            _ => Err(to_error("infer takes a single kernel expression".to_string())),
        },
        other => Err(to_error(format!("unknown directive: {other}"))),
    }
}

fn venture_engine_list(value: &Value) -> Result<Vec<Value>, String> {
    let mut items = Vec::new();
    let mut cursor = value;
    loop {
        match cursor {
            Value::Nil => return Ok(items),
            Value::Pair(head, tail) => {
                items.push(head.as_ref().clone());
                cursor = tail.as_ref();
            }
            _ => return Err("a directive line must be a proper list".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_full_script_skipping_comments_and_blank_lines() {
        let script = "\
            ; a comment\n\
            (assume mean (normal 0.0 1.0))\n\
            \n\
            (observe (normal mean 1.0) 2.0)\n\
            (predict mean)\n\
            (sample (flip 0.5))\n\
            (forget 1)\n\
            (infer (mh default one 10))\n\
        ";

        let lines = parse(script).unwrap();
        assert_eq!(lines.len(), 6);
        assert!(matches!(lines[0], ScriptLine::Assume { .. }));
        assert!(matches!(lines[1], ScriptLine::Observe { .. }));
        assert!(matches!(lines[2], ScriptLine::Predict { .. }));
        assert!(matches!(lines[3], ScriptLine::Sample { .. }));
        assert!(matches!(lines[4], ScriptLine::Forget { id: 1 }));
        assert!(matches!(lines[5], ScriptLine::Infer { .. }));
    }

    #[test]
    fn reports_the_offending_line_number_on_a_bad_directive() {
        let err = parse("(assume x)").unwrap_err();
        assert!(err.to_string().starts_with("line 1:"));
    }

    #[test]
    fn rejects_an_unknown_directive_name() {
        let err = parse("(frobnicate 1)").unwrap_err();
        assert!(err.to_string().contains("unknown directive"));
    }
}
