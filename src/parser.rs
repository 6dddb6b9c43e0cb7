use crate::{
    diagnostics::ParseError,
    expr::{Expr, PartialExpr},
    scope::{ScopeArena, ScopeId},
    stdlib,
};

/// Returns the closing delimiter paired with `open`, if `open` opens a tuple.
fn closer_for(open: char) -> Option<char> {
    match open {
        '(' => Some(')'),
        '[' => Some(']'),
        _ => None,
    }
}

fn is_closer(ch: char) -> bool {
    matches!(ch, ')' | ']')
}

fn starts_tuple(text: &str) -> bool {
    text.chars().next().and_then(closer_for).is_some()
}

/// Splits a tuple into its top-level member tokens.
///
/// Nested tuples of either bracket style are kept intact as single tokens,
/// atoms are separated by whitespace, and the two bracket styles must pair up
/// with each other. `tokenize_tuple("(+ 1 (* 2 3))")` yields
/// `["+", "1", "(* 2 3)"]`.
pub fn tokenize_tuple(text: &str) -> Result<Vec<String>, ParseError> {
    let trimmed = text.trim();
    let mut chars = trimmed.char_indices();
    let mut pending = match chars.next().and_then(|(_, ch)| closer_for(ch)) {
        Some(close) => vec![close],
        None => {
            return Err(ParseError::ExpectedTuple {
                text: trimmed.to_string(),
            })
        }
    };

    let unbalanced = || ParseError::UnbalancedTuple {
        text: trimmed.to_string(),
    };
    let mut tokens = Vec::new();
    let mut current = String::new();

    for (idx, ch) in chars {
        if pending.is_empty() {
            if ch.is_whitespace() {
                continue;
            }
            if is_closer(ch) {
                return Err(unbalanced());
            }
            return Err(ParseError::TrailingInput {
                text: trimmed[idx..].to_string(),
            });
        }

        if let Some(close) = closer_for(ch) {
            if pending.len() == 1 && !current.is_empty() {
                tokens.push(std::mem::take(&mut current));
            }
            pending.push(close);
            current.push(ch);
        } else if is_closer(ch) {
            if pending.pop() != Some(ch) {
                return Err(unbalanced());
            }
            match pending.len() {
                0 => {
                    if !current.is_empty() {
                        tokens.push(std::mem::take(&mut current));
                    }
                }
                1 => {
                    current.push(ch);
                    tokens.push(std::mem::take(&mut current));
                }
                _ => current.push(ch),
            }
        } else if ch.is_whitespace() && pending.len() == 1 {
            if !current.is_empty() {
                tokens.push(std::mem::take(&mut current));
            }
        } else {
            current.push(ch);
        }
    }

    if !pending.is_empty() {
        return Err(unbalanced());
    }
    Ok(tokens)
}

/// Turns a single token into an expression under `scope`.
///
/// Resolution order is fixed: tuple syntax, then bindings visible in the scope
/// chain, then builtin functions, then special forms, then the literal rules.
pub fn parse(token: &str, scope: ScopeId, scopes: &mut ScopeArena) -> Result<Expr, ParseError> {
    let token = token.trim();
    if token.is_empty() {
        return Err(ParseError::EmptyExpression);
    }

    if starts_tuple(token) {
        let tokens = tokenize_tuple(token)?;
        let local = scopes.child(scope);
        return Ok(Expr::Partial(PartialExpr {
            tokens,
            scope: local,
        }));
    }
    if let Some(bound) = scopes.get(scope, token) {
        return Ok(bound.clone());
    }
    if let Some(function) = stdlib::make_function(token) {
        return Ok(Expr::Function(function));
    }
    if let Some(form) = stdlib::make_special_form(token, scope) {
        return Ok(form);
    }
    match token {
        "true" => return Ok(Expr::Boolean(true)),
        "false" => return Ok(Expr::Boolean(false)),
        _ => {}
    }
    if looks_numeric(token) {
        return parse_number(token).map(Expr::Number);
    }
    Err(ParseError::UnrecognizedToken {
        text: token.to_string(),
    })
}

/// A numeric literal starts with a digit, or with a sign directly followed
/// by one.
fn looks_numeric(token: &str) -> bool {
    let mut chars = token.chars();
    match chars.next() {
        Some(ch) if ch.is_ascii_digit() => true,
        Some('-' | '+') => chars.next().is_some_and(|ch| ch.is_ascii_digit()),
        _ => false,
    }
}

pub fn parse_number(token: &str) -> Result<f64, ParseError> {
    token
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
        .ok_or_else(|| ParseError::MalformedNumber {
            text: token.to_string(),
        })
}

/// Rewrites every occurrence of `key` inside a tuple-shaped source string with
/// `replacement`, descending into every nested tuple. Substitution is purely
/// textual: an inner form that re-binds `key` is rewritten as well.
pub fn replace_in_scope(text: &str, key: &str, replacement: &str) -> Result<String, ParseError> {
    let text = text.trim();
    if text == key {
        return Ok(replacement.to_string());
    }
    let Some((open, close)) = text
        .chars()
        .next()
        .and_then(|open| closer_for(open).map(|close| (open, close)))
    else {
        return Ok(text.to_string());
    };

    let mut members = Vec::new();
    for token in tokenize_tuple(text)? {
        if token == key {
            members.push(replacement.to_string());
        } else if starts_tuple(&token) {
            members.push(replace_in_scope(&token, key, replacement)?);
        } else {
            members.push(token);
        }
    }
    Ok(format!("{open}{}{close}", members.join(" ")))
}
