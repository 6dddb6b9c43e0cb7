use crate::{
    diagnostics::{EvalError, Result},
    expr::Expr,
    parser,
    scope::{ScopeArena, ScopeId},
    stdlib,
};

pub const DEFAULT_STEP_LIMIT: usize = 1_000_000;

#[derive(Debug, Clone)]
pub struct ExecutionContext {
    /// Reduction steps allowed per expression before giving up.
    pub step_limit: usize,
    /// Whether the read loop starts out printing every intermediate step.
    pub show_steps: bool,
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self {
            step_limit: DEFAULT_STEP_LIMIT,
            show_steps: false,
        }
    }
}

pub struct Interpreter {
    scopes: ScopeArena,
    global: ScopeId,
    context: ExecutionContext,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    pub fn new() -> Self {
        Self::with_context(ExecutionContext::default())
    }

    pub fn with_context(context: ExecutionContext) -> Self {
        stdlib::init();
        let mut scopes = ScopeArena::new();
        let global = scopes.root();
        Self {
            scopes,
            global,
            context,
        }
    }

    pub fn context(&self) -> &ExecutionContext {
        &self.context
    }

    pub fn global(&self) -> ScopeId {
        self.global
    }

    pub fn scopes(&self) -> &ScopeArena {
        &self.scopes
    }

    pub fn scopes_mut(&mut self) -> &mut ScopeArena {
        &mut self.scopes
    }

    /// Parses one line of source under the global scope.
    pub fn parse(&mut self, source: &str) -> Result<Expr> {
        Ok(parser::parse(source, self.global, &mut self.scopes)?)
    }

    /// Drives `expr` to a value by repeated single steps.
    pub fn reduce(&mut self, mut expr: Expr) -> Result<Expr> {
        let mut taken = 0;
        while !expr.is_value() {
            if taken >= self.context.step_limit {
                return Err(EvalError::StepLimitExceeded {
                    limit: self.context.step_limit,
                }
                .into());
            }
            expr = expr.evaluate(&mut self.scopes)?;
            taken += 1;
        }
        tracing::debug!(steps = taken, value = %expr, "reduced to value");
        Ok(expr)
    }

    /// Lazily yields `expr` followed by every intermediate state of its
    /// reduction; the last item is the final value.
    pub fn steps(&mut self, expr: Expr) -> Steps<'_> {
        Steps {
            scopes: &mut self.scopes,
            current: Some(expr),
            started: false,
            taken: 0,
            limit: self.context.step_limit,
        }
    }

    /// Parses and reduces one line, then reclaims every scope the result and
    /// the global bindings no longer reach. Values kept from earlier calls are
    /// only safe to reduce further while something bound still captures them.
    pub fn eval_source(&mut self, source: &str) -> Result<Expr> {
        let outcome = self.parse(source).and_then(|expr| self.reduce(expr));
        self.collect(outcome.as_ref().ok());
        outcome
    }

    /// Frees every scope unreachable from the global scope or from `keep`.
    pub fn collect(&mut self, keep: Option<&Expr>) -> usize {
        let values: Vec<&Expr> = keep.into_iter().collect();
        self.scopes.collect(&[self.global], &values)
    }

    /// Releases the global scope and everything descending from it. Returns
    /// the number of scopes freed.
    pub fn shutdown(mut self) -> usize {
        let released = self.scopes.release(self.global);
        tracing::debug!(released, "interpreter shut down");
        released
    }
}

/// Step-by-step reduction of one expression, exposed as an iterator.
///
/// The sequence ends after the value is produced, after the first error, or
/// with [`EvalError::StepLimitExceeded`] once the step budget runs out.
pub struct Steps<'a> {
    scopes: &'a mut ScopeArena,
    current: Option<Expr>,
    started: bool,
    taken: usize,
    limit: usize,
}

impl Iterator for Steps<'_> {
    type Item = Result<Expr>;

    fn next(&mut self) -> Option<Self::Item> {
        if !self.started {
            self.started = true;
            return self.current.clone().map(Ok);
        }

        let expr = self.current.take()?;
        if expr.is_value() {
            return None;
        }
        if self.taken >= self.limit {
            return Some(Err(EvalError::StepLimitExceeded { limit: self.limit }.into()));
        }
        self.taken += 1;
        match expr.evaluate(self.scopes) {
            Ok(next) => {
                tracing::trace!(step = self.taken, expr = %next, "reduction step");
                self.current = Some(next.clone());
                Some(Ok(next))
            }
            Err(err) => Some(Err(err)),
        }
    }
}

impl std::iter::FusedIterator for Steps<'_> {}
