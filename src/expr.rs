//! The expression model: every node kind the reducer can hold, and the
//! single reduction step each of them performs.

use std::fmt;

use crate::{
    diagnostics::{EvalError, ParseError, Result},
    parser,
    scope::{ScopeArena, ScopeId},
    stdlib::{Builtin, SpecialForm},
};

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// A tuple whose members are still raw token text.
    Partial(PartialExpr),
    /// A pending application. Never a value.
    Tuple(Vec<Expr>),
    Function(Function),
    Number(f64),
    Boolean(bool),
    /// A single deferred token, resolved against its scope when stepped.
    Unparsed(UnparsedExpr),
    /// Produced by definitions; never printed.
    Void,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PartialExpr {
    pub tokens: Vec<String>,
    pub scope: ScopeId,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnparsedExpr {
    pub token: String,
    pub scope: ScopeId,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Function {
    Builtin(Builtin),
    Form { form: SpecialForm, scope: ScopeId },
    Lambda(Lambda),
}

/// A user procedure. The body stays as source text and is parsed afresh
/// under a new scope on every call.
#[derive(Debug, Clone, PartialEq)]
pub struct Lambda {
    pub name: Option<String>,
    pub params: Vec<String>,
    pub body: String,
    pub scope: ScopeId,
}

impl Expr {
    pub fn is_value(&self) -> bool {
        match self {
            Expr::Function(_) | Expr::Number(_) | Expr::Boolean(_) | Expr::Void => true,
            Expr::Partial(_) | Expr::Tuple(_) | Expr::Unparsed(_) => false,
        }
    }

    pub fn is_special_form(&self) -> bool {
        matches!(self, Expr::Function(Function::Form { .. }))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Expr::Partial(_) | Expr::Tuple(_) => "tuple",
            Expr::Function(_) => "procedure",
            Expr::Number(_) => "number",
            Expr::Boolean(_) => "boolean",
            Expr::Unparsed(_) => "symbol",
            Expr::Void => "void",
        }
    }

    /// Performs one reduction step, consuming the node and returning its
    /// replacement. Values are returned unchanged.
    pub fn evaluate(self, scopes: &mut ScopeArena) -> Result<Expr> {
        match self {
            Expr::Partial(partial) => partial.expand(scopes),
            Expr::Tuple(members) => step_tuple(members, scopes),
            Expr::Unparsed(unparsed) => unparsed.resolve(scopes),
            value => Ok(value),
        }
    }

    /// Pushes every scope handle this node keeps alive onto `out`.
    pub fn captured_scopes(&self, out: &mut Vec<ScopeId>) {
        match self {
            Expr::Partial(PartialExpr { scope, .. })
            | Expr::Unparsed(UnparsedExpr { scope, .. })
            | Expr::Function(Function::Form { scope, .. })
            | Expr::Function(Function::Lambda(Lambda { scope, .. })) => out.push(*scope),
            Expr::Tuple(members) => {
                for member in members {
                    member.captured_scopes(out);
                }
            }
            Expr::Function(Function::Builtin(_))
            | Expr::Number(_)
            | Expr::Boolean(_)
            | Expr::Void => {}
        }
    }
}

impl PartialExpr {
    /// Parses every member token in order. Nested partial tuples are expanded
    /// on the spot, so the result is a fully shaped [`Expr::Tuple`]. When the
    /// head names a special form the remaining tokens are left unparsed for
    /// the form to consume.
    pub fn expand(self, scopes: &mut ScopeArena) -> Result<Expr> {
        let PartialExpr { tokens, scope } = self;
        let mut tokens = tokens.into_iter();
        let Some(first) = tokens.next() else {
            return Ok(Expr::Tuple(Vec::new()));
        };

        let head = flatten(parse_member(&first, scope, scopes)?, scopes)?;
        let deferred = head.is_special_form();
        let mut members = Vec::with_capacity(tokens.len() + 1);
        members.push(head);
        if deferred {
            members.extend(tokens.map(|token| Expr::Unparsed(UnparsedExpr { token, scope })));
        } else {
            for token in tokens {
                let member = parse_member(&token, scope, scopes)?;
                members.push(flatten(member, scopes)?);
            }
        }
        Ok(Expr::Tuple(members))
    }
}

fn flatten(expr: Expr, scopes: &mut ScopeArena) -> Result<Expr> {
    match expr {
        Expr::Partial(partial) => partial.expand(scopes),
        other => Ok(other),
    }
}

impl UnparsedExpr {
    fn resolve(self, scopes: &mut ScopeArena) -> Result<Expr> {
        parse_member(&self.token, self.scope, scopes)
    }
}

/// Parses a token met during reduction. A name that resolves to nothing is an
/// unbound symbol at this point, not a syntax error.
fn parse_member(token: &str, scope: ScopeId, scopes: &mut ScopeArena) -> Result<Expr> {
    match parser::parse(token, scope, scopes) {
        Ok(expr) => Ok(expr),
        Err(ParseError::UnrecognizedToken { text }) => {
            Err(EvalError::UndefinedSymbol { name: text }.into())
        }
        Err(err) => Err(err.into()),
    }
}

/// Steps the leftmost unreduced member in place, or applies the head once
/// every member is a value. A special-form head receives its members as they
/// are and decides for itself what to reduce.
fn step_tuple(mut members: Vec<Expr>, scopes: &mut ScopeArena) -> Result<Expr> {
    let Some(head) = members.first() else {
        return Err(EvalError::EmptyApplication.into());
    };

    if !head.is_special_form() {
        if let Some(position) = members.iter().position(|member| !member.is_value()) {
            let member = std::mem::replace(&mut members[position], Expr::Void);
            members[position] = member.evaluate(scopes)?;
            return Ok(Expr::Tuple(members));
        }
    }

    match members.remove(0) {
        Expr::Function(function) => function.call(members, scopes),
        other => Err(EvalError::NotAFunction {
            found: other.to_string(),
        }
        .into()),
    }
}

impl Function {
    pub fn name(&self) -> String {
        match self {
            Function::Builtin(builtin) => builtin.name.to_string(),
            Function::Form { form, .. } => form.name().to_string(),
            Function::Lambda(lambda) => match &lambda.name {
                Some(name) => format!("#<procedure:{name}>"),
                None => "#<procedure>".to_string(),
            },
        }
    }

    /// Applies the function to `args`. Builtins and procedures expect fully
    /// reduced arguments; a special form takes one step over its raw members.
    pub fn call(self, args: Vec<Expr>, scopes: &mut ScopeArena) -> Result<Expr> {
        match self {
            Function::Builtin(builtin) => Ok(builtin.call(&args)?),
            Function::Form { form, scope } => form.step(scope, args, scopes),
            Function::Lambda(lambda) => lambda.call(args, scopes),
        }
    }
}

impl Lambda {
    fn call(self, args: Vec<Expr>, scopes: &mut ScopeArena) -> Result<Expr> {
        if args.len() != self.params.len() {
            return Err(EvalError::ArityMismatch {
                name: self.display_name(),
                expected: self.params.len().to_string(),
                found: args.len(),
            }
            .into());
        }
        let frame = scopes.child(self.scope);
        for (param, arg) in self.params.into_iter().zip(args) {
            scopes.define(frame, param, arg);
        }
        parse_member(&self.body, frame, scopes)
    }

    fn display_name(&self) -> String {
        self.name.clone().unwrap_or_else(|| "lambda".to_string())
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Partial(partial) => write!(f, "({})", partial.tokens.join(" ")),
            Expr::Tuple(members) => {
                write!(f, "(")?;
                for (idx, member) in members.iter().enumerate() {
                    if idx > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{member}")?;
                }
                write!(f, ")")
            }
            Expr::Function(function) => write!(f, "{}", function.name()),
            // -0 prints as 0
            Expr::Number(n) if *n == 0.0 => write!(f, "0"),
            Expr::Number(n) => write!(f, "{n}"),
            Expr::Boolean(b) => write!(f, "{b}"),
            Expr::Unparsed(unparsed) => write!(f, "{}", unparsed.token),
            Expr::Void => Ok(()),
        }
    }
}
