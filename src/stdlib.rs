use std::fmt;

use indexmap::IndexMap;
use lazy_static::lazy_static;

use crate::{
    diagnostics::{EvalError, Result},
    expr::{Expr, Function, Lambda},
    parser,
    scope::{ScopeArena, ScopeId},
};

type NativeResult = std::result::Result<Expr, EvalError>;
type Callback = fn(&[Expr]) -> NativeResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exactly(usize),
    AtLeast(usize),
}

impl Arity {
    fn accepts(self, count: usize) -> bool {
        match self {
            Arity::Exactly(n) => count == n,
            Arity::AtLeast(n) => count >= n,
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arity::Exactly(n) => write!(f, "{n}"),
            Arity::AtLeast(n) => write!(f, "at least {n}"),
        }
    }
}

/// A function implemented in Rust. Arguments arrive fully reduced.
#[derive(Clone, Copy)]
pub struct Builtin {
    pub name: &'static str,
    pub arity: Arity,
    callback: Callback,
}

impl Builtin {
    pub fn call(&self, args: &[Expr]) -> NativeResult {
        if !self.arity.accepts(args.len()) {
            return Err(EvalError::ArityMismatch {
                name: self.name.to_string(),
                expected: self.arity.to_string(),
                found: args.len(),
            });
        }
        (self.callback)(args)
    }
}

impl fmt::Debug for Builtin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Builtin")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .finish()
    }
}

impl PartialEq for Builtin {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.arity == other.arity
    }
}

/// Constructs whose arguments are handed over unreduced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecialForm {
    Define,
    Lambda,
    If,
    And,
    Or,
}

pub struct Registry {
    functions: IndexMap<&'static str, Builtin>,
    forms: IndexMap<&'static str, SpecialForm>,
}

lazy_static! {
    static ref REGISTRY: Registry = Registry::install();
}

/// Builds the registry. Later calls are free.
pub fn init() {
    lazy_static::initialize(&REGISTRY);
}

pub fn registry() -> &'static Registry {
    &REGISTRY
}

pub fn has_function(name: &str) -> bool {
    REGISTRY.functions.contains_key(name)
}

pub fn make_function(name: &str) -> Option<Function> {
    REGISTRY.functions.get(name).copied().map(Function::Builtin)
}

pub fn has_special_form(name: &str) -> bool {
    REGISTRY.forms.contains_key(name)
}

pub fn make_special_form(name: &str, scope: ScopeId) -> Option<Expr> {
    REGISTRY
        .forms
        .get(name)
        .map(|&form| Expr::Function(Function::Form { form, scope }))
}

impl Registry {
    fn install() -> Self {
        let mut functions = IndexMap::new();
        for builtin in [
            native("+", Arity::AtLeast(0), num_add),
            native("-", Arity::AtLeast(1), num_sub),
            native("*", Arity::AtLeast(0), num_mul),
            native("/", Arity::AtLeast(1), num_div),
            native("=", Arity::AtLeast(1), cmp_eq),
            native("<", Arity::AtLeast(1), cmp_lt),
            native(">", Arity::AtLeast(1), cmp_gt),
            native("<=", Arity::AtLeast(1), cmp_le),
            native(">=", Arity::AtLeast(1), cmp_ge),
            native("not", Arity::Exactly(1), logic_not),
            native("abs", Arity::Exactly(1), math_abs),
            native("min", Arity::AtLeast(1), math_min),
            native("max", Arity::AtLeast(1), math_max),
            native("quotient", Arity::Exactly(2), math_quotient),
            native("remainder", Arity::Exactly(2), math_remainder),
            native("modulo", Arity::Exactly(2), math_modulo),
            native("expt", Arity::Exactly(2), math_expt),
            native("sqrt", Arity::Exactly(1), math_sqrt),
            native("zero?", Arity::Exactly(1), is_zero),
            native("number?", Arity::Exactly(1), is_number),
            native("boolean?", Arity::Exactly(1), is_boolean),
            native("procedure?", Arity::Exactly(1), is_procedure),
            native("equal?", Arity::Exactly(2), is_equal),
        ] {
            functions.insert(builtin.name, builtin);
        }

        let mut forms = IndexMap::new();
        for form in [
            SpecialForm::Define,
            SpecialForm::Lambda,
            SpecialForm::If,
            SpecialForm::And,
            SpecialForm::Or,
        ] {
            forms.insert(form.name(), form);
        }

        tracing::debug!(
            functions = functions.len(),
            forms = forms.len(),
            "initialised builtin registry"
        );
        Self { functions, forms }
    }

    pub fn function_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.functions.keys().copied()
    }

    pub fn form_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.forms.keys().copied()
    }
}

fn native(name: &'static str, arity: Arity, callback: Callback) -> Builtin {
    Builtin {
        name,
        arity,
        callback,
    }
}

impl SpecialForm {
    pub fn name(self) -> &'static str {
        match self {
            SpecialForm::Define => "define",
            SpecialForm::Lambda => "lambda",
            SpecialForm::If => "if",
            SpecialForm::And => "and",
            SpecialForm::Or => "or",
        }
    }

    /// Takes one reduction step over the form's raw arguments. Either one
    /// argument advances and the tuple is rebuilt, or the form completes and
    /// its result replaces the tuple.
    pub fn step(
        self,
        scope: ScopeId,
        mut args: Vec<Expr>,
        scopes: &mut ScopeArena,
    ) -> Result<Expr> {
        match self {
            SpecialForm::Define => {
                expect_args(self, &args, 2)?;
                let signature = source_text(&args[0]).filter(|text| text.starts_with(['(', '[']));
                if let Some(signature) = signature {
                    let body = body_text(self, &args[1])?;
                    let mut names = parser::tokenize_tuple(&signature)?.into_iter();
                    let name = names
                        .next()
                        .filter(|name| is_symbol(name))
                        .ok_or_else(|| invalid(self, "expected a procedure name"))?;
                    let params = check_params(self, names.collect())?;
                    let lambda = Lambda {
                        name: Some(name.clone()),
                        params,
                        body,
                        scope,
                    };
                    bind(scope, name, Expr::Function(Function::Lambda(lambda)), scopes);
                    return Ok(Expr::Void);
                }
                let name = symbol_name(self, &args[0])?;
                if !args[1].is_value() {
                    advance(&mut args, 1, scopes)?;
                    return Ok(self.rebuild(scope, args));
                }
                let value = match args.swap_remove(1) {
                    Expr::Function(Function::Lambda(mut lambda)) if lambda.name.is_none() => {
                        lambda.name = Some(name.clone());
                        Expr::Function(Function::Lambda(lambda))
                    }
                    value => value,
                };
                bind(scope, name, value, scopes);
                Ok(Expr::Void)
            }
            SpecialForm::Lambda => {
                expect_args(self, &args, 2)?;
                let params = source_text(&args[0])
                    .filter(|text| text.starts_with(['(', '[']))
                    .ok_or_else(|| invalid(self, "parameters must be a tuple"))?;
                let params = check_params(self, parser::tokenize_tuple(&params)?)?;
                let body = body_text(self, &args[1])?;
                Ok(Expr::Function(Function::Lambda(Lambda {
                    name: None,
                    params,
                    body,
                    scope,
                })))
            }
            SpecialForm::If => {
                expect_args(self, &args, 3)?;
                if !args[0].is_value() {
                    advance(&mut args, 0, scopes)?;
                    return Ok(self.rebuild(scope, args));
                }
                let branch = if matches!(args[0], Expr::Boolean(false)) { 2 } else { 1 };
                Ok(args.swap_remove(branch))
            }
            SpecialForm::And | SpecialForm::Or => {
                let short_circuit = self == SpecialForm::Or;
                if args.is_empty() {
                    return Ok(Expr::Boolean(!short_circuit));
                }
                if !args[0].is_value() {
                    advance(&mut args, 0, scopes)?;
                    return Ok(self.rebuild(scope, args));
                }
                let truthy = !matches!(args[0], Expr::Boolean(false));
                if truthy == short_circuit || args.len() == 1 {
                    return Ok(args.swap_remove(0));
                }
                args.remove(0);
                Ok(self.rebuild(scope, args))
            }
        }
    }

    fn rebuild(self, scope: ScopeId, args: Vec<Expr>) -> Expr {
        let mut members = Vec::with_capacity(args.len() + 1);
        members.push(Expr::Function(Function::Form { form: self, scope }));
        members.extend(args);
        Expr::Tuple(members)
    }
}

/// Definitions land in the lexical region that encloses the defining tuple.
fn bind(scope: ScopeId, name: String, value: Expr, scopes: &mut ScopeArena) {
    let target = scopes.parent(scope).unwrap_or(scope);
    tracing::debug!(%name, value = %value, "define");
    scopes.define(target, name, value);
}

fn advance(args: &mut [Expr], position: usize, scopes: &mut ScopeArena) -> Result<()> {
    let member = std::mem::replace(&mut args[position], Expr::Void);
    args[position] = member.evaluate(scopes)?;
    Ok(())
}

fn invalid(form: SpecialForm, reason: &str) -> EvalError {
    EvalError::InvalidForm {
        form: form.name().to_string(),
        reason: reason.to_string(),
    }
}

fn expect_args(
    form: SpecialForm,
    args: &[Expr],
    expected: usize,
) -> std::result::Result<(), EvalError> {
    if args.len() != expected {
        return Err(EvalError::ArityMismatch {
            name: form.name().to_string(),
            expected: expected.to_string(),
            found: args.len(),
        });
    }
    Ok(())
}

/// Source text of an argument the form has not reduced yet.
fn source_text(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Unparsed(unparsed) => Some(unparsed.token.clone()),
        Expr::Partial(_) => Some(expr.to_string()),
        _ => None,
    }
}

fn body_text(form: SpecialForm, expr: &Expr) -> std::result::Result<String, EvalError> {
    source_text(expr).ok_or_else(|| invalid(form, "body must be unevaluated source"))
}

fn symbol_name(form: SpecialForm, expr: &Expr) -> std::result::Result<String, EvalError> {
    match expr {
        Expr::Unparsed(unparsed) if is_symbol(&unparsed.token) => Ok(unparsed.token.clone()),
        other => Err(invalid(form, &format!("cannot bind `{other}`"))),
    }
}

fn check_params(
    form: SpecialForm,
    params: Vec<String>,
) -> std::result::Result<Vec<String>, EvalError> {
    for (idx, param) in params.iter().enumerate() {
        if !is_symbol(param) {
            return Err(invalid(form, &format!("`{param}` is not a parameter name")));
        }
        if params[..idx].contains(param) {
            return Err(invalid(form, &format!("duplicate parameter `{param}`")));
        }
    }
    Ok(params)
}

fn is_symbol(token: &str) -> bool {
    let mut chars = token.chars();
    match chars.next() {
        Some(ch) if ch.is_ascii_digit() || matches!(ch, '(' | ')' | '[' | ']') => false,
        Some(_) => {
            token != "true" && token != "false" && !token.contains(['(', ')', '[', ']'])
        }
        None => false,
    }
}

fn expect_number(value: &Expr, name: &str) -> std::result::Result<f64, EvalError> {
    match value {
        Expr::Number(n) => Ok(*n),
        other => Err(EvalError::TypeMismatch {
            name: name.to_string(),
            expected: "number".to_string(),
            found: other.type_name().to_string(),
        }),
    }
}

fn numbers(args: &[Expr], name: &str) -> std::result::Result<Vec<f64>, EvalError> {
    args.iter().map(|arg| expect_number(arg, name)).collect()
}

fn num_add(args: &[Expr]) -> NativeResult {
    Ok(Expr::Number(numbers(args, "+")?.into_iter().sum()))
}

fn num_mul(args: &[Expr]) -> NativeResult {
    Ok(Expr::Number(numbers(args, "*")?.into_iter().product()))
}

fn num_sub(args: &[Expr]) -> NativeResult {
    match numbers(args, "-")?.as_slice() {
        [only] => Ok(Expr::Number(-only)),
        [first, rest @ ..] => Ok(Expr::Number(rest.iter().fold(*first, |acc, n| acc - n))),
        [] => Ok(Expr::Number(0.0)),
    }
}

fn num_div(args: &[Expr]) -> NativeResult {
    let values = numbers(args, "/")?;
    let (mut acc, divisors) = match values.as_slice() {
        [only] => (1.0, std::slice::from_ref(only)),
        [first, rest @ ..] => (*first, rest),
        [] => (1.0, &[][..]),
    };
    for divisor in divisors {
        if *divisor == 0.0 {
            return Err(EvalError::DivisionByZero {
                name: "/".to_string(),
            });
        }
        acc /= divisor;
    }
    Ok(Expr::Number(acc))
}

fn compare(args: &[Expr], name: &str, holds: fn(f64, f64) -> bool) -> NativeResult {
    let values = numbers(args, name)?;
    Ok(Expr::Boolean(values.windows(2).all(|pair| holds(pair[0], pair[1]))))
}

fn cmp_eq(args: &[Expr]) -> NativeResult {
    compare(args, "=", |a, b| a == b)
}

fn cmp_lt(args: &[Expr]) -> NativeResult {
    compare(args, "<", |a, b| a < b)
}

fn cmp_gt(args: &[Expr]) -> NativeResult {
    compare(args, ">", |a, b| a > b)
}

fn cmp_le(args: &[Expr]) -> NativeResult {
    compare(args, "<=", |a, b| a <= b)
}

fn cmp_ge(args: &[Expr]) -> NativeResult {
    compare(args, ">=", |a, b| a >= b)
}

fn logic_not(args: &[Expr]) -> NativeResult {
    Ok(Expr::Boolean(matches!(args[0], Expr::Boolean(false))))
}

fn math_abs(args: &[Expr]) -> NativeResult {
    Ok(Expr::Number(expect_number(&args[0], "abs")?.abs()))
}

fn math_min(args: &[Expr]) -> NativeResult {
    let values = numbers(args, "min")?;
    Ok(Expr::Number(values.into_iter().fold(f64::INFINITY, f64::min)))
}

fn math_max(args: &[Expr]) -> NativeResult {
    let values = numbers(args, "max")?;
    Ok(Expr::Number(values.into_iter().fold(f64::NEG_INFINITY, f64::max)))
}

/// Integer-style division helpers share their operand checks.
fn integer_operands(args: &[Expr], name: &str) -> std::result::Result<(f64, f64), EvalError> {
    let dividend = expect_number(&args[0], name)?;
    let divisor = expect_number(&args[1], name)?;
    if divisor == 0.0 {
        return Err(EvalError::DivisionByZero {
            name: name.to_string(),
        });
    }
    Ok((dividend, divisor))
}

fn math_quotient(args: &[Expr]) -> NativeResult {
    let (dividend, divisor) = integer_operands(args, "quotient")?;
    Ok(Expr::Number((dividend / divisor).trunc()))
}

fn math_remainder(args: &[Expr]) -> NativeResult {
    let (dividend, divisor) = integer_operands(args, "remainder")?;
    Ok(Expr::Number(dividend % divisor))
}

/// Result takes the sign of the divisor, unlike `remainder`.
fn math_modulo(args: &[Expr]) -> NativeResult {
    let (dividend, divisor) = integer_operands(args, "modulo")?;
    let rem = dividend % divisor;
    if rem != 0.0 && (rem < 0.0) != (divisor < 0.0) {
        Ok(Expr::Number(rem + divisor))
    } else {
        Ok(Expr::Number(rem))
    }
}

fn math_expt(args: &[Expr]) -> NativeResult {
    let base = expect_number(&args[0], "expt")?;
    let exponent = expect_number(&args[1], "expt")?;
    Ok(Expr::Number(base.powf(exponent)))
}

fn math_sqrt(args: &[Expr]) -> NativeResult {
    let number = expect_number(&args[0], "sqrt")?;
    if number < 0.0 {
        return Err(EvalError::TypeMismatch {
            name: "sqrt".to_string(),
            expected: "a non-negative number".to_string(),
            found: number.to_string(),
        });
    }
    Ok(Expr::Number(number.sqrt()))
}

fn is_zero(args: &[Expr]) -> NativeResult {
    Ok(Expr::Boolean(expect_number(&args[0], "zero?")? == 0.0))
}

fn is_number(args: &[Expr]) -> NativeResult {
    Ok(Expr::Boolean(matches!(args[0], Expr::Number(_))))
}

fn is_boolean(args: &[Expr]) -> NativeResult {
    Ok(Expr::Boolean(matches!(args[0], Expr::Boolean(_))))
}

fn is_procedure(args: &[Expr]) -> NativeResult {
    Ok(Expr::Boolean(matches!(args[0], Expr::Function(_))))
}

fn is_equal(args: &[Expr]) -> NativeResult {
    let equal = match (&args[0], &args[1]) {
        (Expr::Number(a), Expr::Number(b)) => a == b,
        (Expr::Boolean(a), Expr::Boolean(b)) => a == b,
        (Expr::Void, Expr::Void) => true,
        (Expr::Function(a), Expr::Function(b)) => a == b,
        _ => false,
    };
    Ok(Expr::Boolean(equal))
}
