use std::rc::Rc;

use crate::ast::{
    BinOp, Block, Expr, ExprKind, FunctionBody, LocalName, Stmt, StmtKind, TableField, UnOp,
};
use crate::lexer::SyntaxError;
use crate::runtime::{LuaEnv, RuntimeError, StackFrame};
use crate::value::{LuaClosure, LuaNumber, LuaTable, LuaValue};

/// Signal produced by statement execution.
#[derive(Debug, Clone, PartialEq)]
pub enum Control {
    Normal,
    Return(Vec<LuaValue>),
    Break,
    Goto(String),
}

/// Tree-walking interpreter.
///
/// The evaluator holds no mutable state of its own; environments and stack
/// frames are threaded through every call, so nested evaluations (a query
/// clause evaluated mid-script, say) are safe.
pub struct Evaluator {
    max_call_depth: usize,
}

impl Default for Evaluator {
    fn default() -> Self {
        Evaluator {
            max_call_depth: 200,
        }
    }
}

impl Evaluator {
    pub fn new() -> Self {
        Evaluator::default()
    }

    pub fn with_max_call_depth(max_call_depth: usize) -> Self {
        Evaluator { max_call_depth }
    }

    /// Execute a chunk, returning the values of its top-level `return` (if
    /// any). The chunk runs in a child scope of `env` and, like Lua's main
    /// chunk, is variadic (with no varargs bound).
    pub fn run(
        &self,
        block: &Block,
        env: &LuaEnv,
        frame: &Rc<StackFrame>,
    ) -> Result<Vec<LuaValue>, RuntimeError> {
        let scope = env.child();
        scope.define_local("...", LuaValue::table(LuaTable::new()), false);
        match self.execute_in_scope(block, &scope, frame)? {
            Control::Return(values) => Ok(values),
            Control::Normal => Ok(Vec::new()),
            Control::Break => Err(RuntimeError::Syntax(SyntaxError::new(
                "break outside a loop",
                0,
            ))),
            Control::Goto(label) => Err(RuntimeError::Syntax(SyntaxError::new(
                format!("no visible label '{}' for goto", label),
                0,
            ))),
        }
    }

    /// Execute a block in a fresh child scope.
    pub fn execute(
        &self,
        block: &Block,
        env: &LuaEnv,
        frame: &Rc<StackFrame>,
    ) -> Result<Control, RuntimeError> {
        let scope = env.child();
        self.execute_in_scope(block, &scope, frame)
    }

    fn execute_in_scope(
        &self,
        block: &Block,
        scope: &LuaEnv,
        frame: &Rc<StackFrame>,
    ) -> Result<Control, RuntimeError> {
        let mut index = 0;
        while index < block.stmts.len() {
            let stmt = &block.stmts[index];
            match self.execute_stmt(stmt, scope, frame)? {
                Control::Normal => index += 1,
                Control::Goto(label) => {
                    match find_label(block, &label) {
                        Some(target) => {
                            check_goto(block, index, target, stmt.span.start)?;
                            index = target + 1;
                        }
                        // Not visible here: resolve in the enclosing block.
                        None => return Ok(Control::Goto(label)),
                    }
                }
                other => return Ok(other),
            }
        }
        Ok(Control::Normal)
    }

    fn execute_stmt(
        &self,
        stmt: &Stmt,
        scope: &LuaEnv,
        frame: &Rc<StackFrame>,
    ) -> Result<Control, RuntimeError> {
        match &stmt.kind {
            StmtKind::Expr(expr) => {
                self.eval_multi(expr, scope, frame)?;
                Ok(Control::Normal)
            }

            StmtKind::Local { names, values } => {
                let mut evaluated = self.eval_expr_list(values, scope, frame)?;
                // Extra names bind to nil, extra values are discarded.
                evaluated.resize(names.len(), LuaValue::Nil);
                for (LocalName { name, is_const }, value) in names.iter().zip(evaluated) {
                    scope.define_local(name, value, *is_const);
                }
                Ok(Control::Normal)
            }

            StmtKind::Assign { targets, values } => {
                let mut evaluated = self.eval_expr_list(values, scope, frame)?;
                evaluated.resize(targets.len(), LuaValue::Nil);
                for (target, value) in targets.iter().zip(evaluated) {
                    self.assign(target, value, scope, frame)?;
                }
                Ok(Control::Normal)
            }

            StmtKind::If { arms, else_block } => {
                for (cond, body) in arms {
                    if self.eval(cond, scope, frame)?.truthy() {
                        return self.execute(body, scope, frame);
                    }
                }
                match else_block {
                    Some(body) => self.execute(body, scope, frame),
                    None => Ok(Control::Normal),
                }
            }

            StmtKind::While { cond, body } => {
                while self.eval(cond, scope, frame)?.truthy() {
                    match self.execute(body, scope, frame)? {
                        Control::Normal => {}
                        Control::Break => break,
                        other => return Ok(other),
                    }
                }
                Ok(Control::Normal)
            }

            StmtKind::Repeat { body, until } => {
                loop {
                    // The until condition sees the body's locals.
                    let body_scope = scope.child();
                    match self.execute_in_scope(body, &body_scope, frame)? {
                        Control::Normal => {}
                        Control::Break => break,
                        other => return Ok(other),
                    }
                    if self.eval(until, &body_scope, frame)?.truthy() {
                        break;
                    }
                }
                Ok(Control::Normal)
            }

            StmtKind::NumericFor {
                var,
                start,
                stop,
                step,
                body,
            } => self.numeric_for(var, start, stop, step.as_ref(), body, scope, frame),

            StmtKind::GenericFor { names, exprs, body } => {
                self.generic_for(names, exprs, body, scope, frame)
            }

            StmtKind::FunctionDecl { path, method, body } => {
                let name = method.clone().unwrap_or_else(|| {
                    path.last().cloned().unwrap_or_default()
                });
                let closure = self.make_closure(Some(name.clone()), body, scope);

                if path.len() == 1 && method.is_none() {
                    scope.set(&path[0], closure)?;
                    return Ok(Control::Normal);
                }

                // Walk `a.b.c` down to the owning table.
                let mut target = scope.get(&path[0]).unwrap_or(LuaValue::Nil);
                let middle = if method.is_some() {
                    &path[1..]
                } else {
                    &path[1..path.len() - 1]
                };
                for part in middle {
                    target = self.index_value(&target, &LuaValue::str(part.clone()), stmt.span)?;
                }
                match &target {
                    LuaValue::Table(t) => {
                        t.borrow_mut().set_str(&name, closure);
                        Ok(Control::Normal)
                    }
                    other => Err(RuntimeError::type_error(format!(
                        "cannot declare function field on a {} value",
                        other.type_name()
                    ))),
                }
            }

            StmtKind::LocalFunction { name, body } => {
                // Declare the name first so the body can recurse.
                scope.define_local(name, LuaValue::Nil, false);
                let closure = self.make_closure(Some(name.clone()), body, scope);
                scope.set(name, closure)?;
                Ok(Control::Normal)
            }

            StmtKind::Return(exprs) => {
                let values = self.eval_expr_list(exprs, scope, frame)?;
                Ok(Control::Return(values))
            }

            StmtKind::Break => Ok(Control::Break),
            StmtKind::Label(_) => Ok(Control::Normal),
            StmtKind::Goto(label) => Ok(Control::Goto(label.clone())),
            StmtKind::Do(body) => self.execute(body, scope, frame),
        }
    }

    fn numeric_for(
        &self,
        var: &str,
        start: &Expr,
        stop: &Expr,
        step: Option<&Expr>,
        body: &Block,
        scope: &LuaEnv,
        frame: &Rc<StackFrame>,
    ) -> Result<Control, RuntimeError> {
        let start_value = self.eval_for_number(start, scope, frame)?;
        let stop_value = self.eval_for_number(stop, scope, frame)?;
        let step_value = match step {
            Some(step) => self.eval_for_number(step, scope, frame)?,
            None => LuaNumber::Int(1),
        };

        // Integer stepping only when all three operands are integers.
        if let (LuaNumber::Int(mut i), LuaNumber::Int(stop), LuaNumber::Int(step)) =
            (start_value, stop_value, step_value)
        {
            if step == 0 {
                return Err(RuntimeError::type_error("'for' step is zero"));
            }
            loop {
                if step > 0 && i > stop {
                    break;
                }
                if step < 0 && i < stop {
                    break;
                }
                let iteration = scope.child();
                iteration.define_local(var, LuaValue::Int(i), false);
                match self.execute_in_scope(body, &iteration, frame)? {
                    Control::Normal => {}
                    Control::Break => break,
                    other => return Ok(other),
                }
                match i.checked_add(step) {
                    Some(next) => i = next,
                    None => break,
                }
            }
            return Ok(Control::Normal);
        }

        let mut i = start_value.as_f64();
        let stop = stop_value.as_f64();
        let step = step_value.as_f64();
        if step == 0.0 {
            return Err(RuntimeError::type_error("'for' step is zero"));
        }
        loop {
            if step > 0.0 && i > stop {
                break;
            }
            if step < 0.0 && i < stop {
                break;
            }
            let iteration = scope.child();
            iteration.define_local(var, LuaValue::Float(i), false);
            match self.execute_in_scope(body, &iteration, frame)? {
                Control::Normal => {}
                Control::Break => break,
                other => return Ok(other),
            }
            i += step;
        }
        Ok(Control::Normal)
    }

    fn eval_for_number(
        &self,
        expr: &Expr,
        scope: &LuaEnv,
        frame: &Rc<StackFrame>,
    ) -> Result<LuaNumber, RuntimeError> {
        let value = self.eval(expr, scope, frame)?;
        value.as_number().ok_or_else(|| {
            RuntimeError::type_error(format!(
                "'for' bound must be a number, got {}",
                value.type_name()
            ))
        })
    }

    fn generic_for(
        &self,
        names: &[String],
        exprs: &[Expr],
        body: &Block,
        scope: &LuaEnv,
        frame: &Rc<StackFrame>,
    ) -> Result<Control, RuntimeError> {
        // Evaluate the iterator expression once: function, state, control.
        let mut triple = self.eval_expr_list(exprs, scope, frame)?;
        triple.resize(3, LuaValue::Nil);
        let iterator = triple[0].clone();
        let state = triple[1].clone();
        let mut control = triple[2].clone();

        loop {
            let mut results = self.call_value(
                &iterator,
                vec![state.clone(), control.clone()],
                frame,
                "iterator",
            )?;
            results.resize(names.len().max(1), LuaValue::Nil);
            if matches!(results[0], LuaValue::Nil) {
                break;
            }
            control = results[0].clone();

            let iteration = scope.child();
            for (name, value) in names.iter().zip(results) {
                iteration.define_local(name, value, false);
            }
            match self.execute_in_scope(body, &iteration, frame)? {
                Control::Normal => {}
                Control::Break => break,
                other => return Ok(other),
            }
        }
        Ok(Control::Normal)
    }

    fn assign(
        &self,
        target: &Expr,
        value: LuaValue,
        scope: &LuaEnv,
        frame: &Rc<StackFrame>,
    ) -> Result<(), RuntimeError> {
        match &target.kind {
            ExprKind::Variable(name) => scope.set(name, value),
            ExprKind::Field { object, name } => {
                let object = self.eval(object, scope, frame)?;
                self.set_index(&object, LuaValue::str(name.clone()), value)
            }
            ExprKind::Index { object, key } => {
                let object = self.eval(object, scope, frame)?;
                let key = self.eval(key, scope, frame)?;
                self.set_index(&object, key, value)
            }
            _ => Err(RuntimeError::type_error("cannot assign to this expression")),
        }
    }

    fn set_index(
        &self,
        object: &LuaValue,
        key: LuaValue,
        value: LuaValue,
    ) -> Result<(), RuntimeError> {
        match object {
            LuaValue::Table(t) => t.borrow_mut().set(key, value),
            other => Err(RuntimeError::type_error(format!(
                "attempt to index a {} value",
                other.type_name()
            ))),
        }
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    /// Evaluate an expression to a single value (multi-value expressions
    /// are truncated to their first result).
    pub fn eval(
        &self,
        expr: &Expr,
        env: &LuaEnv,
        frame: &Rc<StackFrame>,
    ) -> Result<LuaValue, RuntimeError> {
        match &expr.kind {
            ExprKind::Nil => Ok(LuaValue::Nil),
            ExprKind::True => Ok(LuaValue::Boolean(true)),
            ExprKind::False => Ok(LuaValue::Boolean(false)),
            ExprKind::Int(n) => Ok(LuaValue::Int(*n)),
            ExprKind::Float(n) => Ok(LuaValue::Float(*n)),
            ExprKind::Str(s) => Ok(LuaValue::Str(s.clone())),

            // Reads of unbound names are silently nil (Lua semantics).
            ExprKind::Variable(name) => Ok(env.get(name).unwrap_or(LuaValue::Nil)),

            ExprKind::Paren(inner) => self.eval(inner, env, frame),

            ExprKind::Varargs | ExprKind::Call { .. } | ExprKind::MethodCall { .. } => {
                let values = self.eval_multi(expr, env, frame)?;
                Ok(values.into_iter().next().unwrap_or(LuaValue::Nil))
            }

            ExprKind::Field { object, name } => {
                let object = self.eval(object, env, frame)?;
                self.index_value(&object, &LuaValue::str(name.clone()), expr.span)
            }

            ExprKind::Index { object, key } => {
                let object = self.eval(object, env, frame)?;
                let key = self.eval(key, env, frame)?;
                self.index_value(&object, &key, expr.span)
            }

            ExprKind::Function(body) => Ok(self.make_closure(None, body, env)),

            ExprKind::Table(fields) => self.eval_table(fields, env, frame),

            ExprKind::Binary { op, left, right } => match op {
                BinOp::And => {
                    let left = self.eval(left, env, frame)?;
                    if left.truthy() {
                        self.eval(right, env, frame)
                    } else {
                        Ok(left)
                    }
                }
                BinOp::Or => {
                    let left = self.eval(left, env, frame)?;
                    if left.truthy() {
                        Ok(left)
                    } else {
                        self.eval(right, env, frame)
                    }
                }
                _ => {
                    let left = self.eval(left, env, frame)?;
                    let right = self.eval(right, env, frame)?;
                    apply_binop(*op, &left, &right)
                }
            },

            ExprKind::Unary { op, operand } => {
                let operand = self.eval(operand, env, frame)?;
                apply_unop(*op, &operand)
            }

            ExprKind::Query { source, query } => {
                let collection = self.eval(source, env, frame)?;
                match &collection {
                    LuaValue::HostObject(object) => {
                        let rows = object.query(query, env, frame, self)?;
                        let mut table = LuaTable::new();
                        for row in rows {
                            table.push(row);
                        }
                        Ok(LuaValue::table(table))
                    }
                    other => Err(RuntimeError::type_error(format!(
                        "'from' source is a {} value, not a queryable collection",
                        other.type_name()
                    ))),
                }
            }
        }
    }

    /// Evaluate an expression in a context where all of its results are
    /// kept (call arguments, return lists, generic-for expressions).
    fn eval_multi(
        &self,
        expr: &Expr,
        env: &LuaEnv,
        frame: &Rc<StackFrame>,
    ) -> Result<Vec<LuaValue>, RuntimeError> {
        match &expr.kind {
            ExprKind::Varargs => {
                let varargs = env.get("...").unwrap_or(LuaValue::Nil);
                match varargs {
                    LuaValue::Table(t) => Ok(t.borrow().array_values()),
                    _ => Ok(Vec::new()),
                }
            }
            ExprKind::Call { callee, args } => {
                let callee_value = self.eval(callee, env, frame)?;
                let arg_values = self.eval_expr_list(args, env, frame)?;
                let name = call_name(callee);
                let call_frame = frame.push(name.clone(), Some(expr.span));
                self.call_value(&callee_value, arg_values, &call_frame, &name)
            }
            ExprKind::MethodCall {
                object,
                method,
                args,
            } => {
                let receiver = self.eval(object, env, frame)?;
                let callee = self.index_value(&receiver, &LuaValue::str(method.clone()), expr.span)?;
                let mut arg_values = vec![receiver];
                arg_values.extend(self.eval_expr_list(args, env, frame)?);
                let call_frame = frame.push(method.clone(), Some(expr.span));
                self.call_value(&callee, arg_values, &call_frame, method)
            }
            _ => Ok(vec![self.eval(expr, env, frame)?]),
        }
    }

    /// Evaluate an expression list, expanding the last entry's multiple
    /// results; earlier entries are truncated to one value each.
    fn eval_expr_list(
        &self,
        exprs: &[Expr],
        env: &LuaEnv,
        frame: &Rc<StackFrame>,
    ) -> Result<Vec<LuaValue>, RuntimeError> {
        let mut values = Vec::with_capacity(exprs.len());
        for (i, expr) in exprs.iter().enumerate() {
            if i + 1 == exprs.len() {
                values.extend(self.eval_multi(expr, env, frame)?);
            } else {
                values.push(self.eval(expr, env, frame)?);
            }
        }
        Ok(values)
    }

    fn eval_table(
        &self,
        fields: &[TableField],
        env: &LuaEnv,
        frame: &Rc<StackFrame>,
    ) -> Result<LuaValue, RuntimeError> {
        let mut table = LuaTable::new();
        for (i, field) in fields.iter().enumerate() {
            match field {
                TableField::Positional(expr) => {
                    if i + 1 == fields.len() {
                        for value in self.eval_multi(expr, env, frame)? {
                            table.push(value);
                        }
                    } else {
                        table.push(self.eval(expr, env, frame)?);
                    }
                }
                TableField::Named { name, value } => {
                    let value = self.eval(value, env, frame)?;
                    table.set_str(name, value);
                }
                TableField::Computed { key, value } => {
                    let key = self.eval(key, env, frame)?;
                    let value = self.eval(value, env, frame)?;
                    table.set(key, value)?;
                }
            }
        }
        Ok(LuaValue::table(table))
    }

    fn index_value(
        &self,
        object: &LuaValue,
        key: &LuaValue,
        span: crate::ast::Span,
    ) -> Result<LuaValue, RuntimeError> {
        match object {
            LuaValue::Table(t) => Ok(t.borrow().get(key)),
            LuaValue::HostObject(o) => o.index(key),
            other => Err(RuntimeError::type_error(format!(
                "attempt to index a {} value (at offset {})",
                other.type_name(),
                span.start
            ))),
        }
    }

    fn make_closure(&self, name: Option<String>, body: &FunctionBody, env: &LuaEnv) -> LuaValue {
        LuaValue::Function(Rc::new(LuaClosure {
            name,
            body: body.clone(),
            env: env.clone(),
        }))
    }

    /// Call any callable value with already-evaluated arguments.
    pub fn call_value(
        &self,
        callee: &LuaValue,
        args: Vec<LuaValue>,
        frame: &Rc<StackFrame>,
        name: &str,
    ) -> Result<Vec<LuaValue>, RuntimeError> {
        if frame.depth > self.max_call_depth {
            return Err(RuntimeError::StackOverflow {
                limit: self.max_call_depth,
            });
        }
        match callee {
            LuaValue::Function(closure) => {
                let scope = closure.env.child();
                let params = &closure.body.params;
                for (i, param) in params.iter().enumerate() {
                    let value = args.get(i).cloned().unwrap_or(LuaValue::Nil);
                    scope.define_local(param, value, false);
                }
                if closure.body.is_vararg {
                    let mut rest = LuaTable::new();
                    for value in args.into_iter().skip(params.len()) {
                        rest.push(value);
                    }
                    scope.define_local("...", LuaValue::table(rest), false);
                }

                let result = self
                    .execute_in_scope(&closure.body.body, &scope, frame)
                    .map_err(|e| e.in_frame(format!("in function '{}'", name)))?;
                match result {
                    Control::Return(values) => Ok(values),
                    Control::Normal => Ok(Vec::new()),
                    Control::Break => Err(RuntimeError::Syntax(SyntaxError::new(
                        "break outside a loop",
                        0,
                    ))),
                    Control::Goto(label) => Err(RuntimeError::Syntax(SyntaxError::new(
                        format!("no visible label '{}' for goto", label),
                        0,
                    ))),
                }
            }
            LuaValue::HostFunction(host) => {
                (host.func)(&args).map_err(|e| e.in_frame(format!("in function '{}'", host.name)))
            }
            other => Err(RuntimeError::type_error(format!(
                "attempt to call a {} value ('{}')",
                other.type_name(),
                name
            ))),
        }
    }
}

/// Readable callee name for stack traces.
fn call_name(callee: &Expr) -> String {
    match &callee.kind {
        ExprKind::Variable(name) => name.clone(),
        ExprKind::Field { name, .. } => name.clone(),
        _ => "?".to_string(),
    }
}

fn find_label(block: &Block, label: &str) -> Option<usize> {
    block
        .stmts
        .iter()
        .position(|stmt| matches!(&stmt.kind, StmtKind::Label(l) if l == label))
}

/// A forward goto may not jump into the scope of a local declared between
/// the jump and the label.
fn check_goto(
    block: &Block,
    from: usize,
    to: usize,
    position: usize,
) -> Result<(), RuntimeError> {
    if to > from {
        for stmt in &block.stmts[from + 1..to] {
            match &stmt.kind {
                StmtKind::Local { names, .. } => {
                    let skipped = names
                        .first()
                        .map(|n| n.name.clone())
                        .unwrap_or_default();
                    return Err(RuntimeError::Syntax(SyntaxError::new(
                        format!("goto jumps into the scope of local '{}'", skipped),
                        position,
                    )));
                }
                StmtKind::LocalFunction { name, .. } => {
                    return Err(RuntimeError::Syntax(SyntaxError::new(
                        format!("goto jumps into the scope of local '{}'", name),
                        position,
                    )));
                }
                _ => {}
            }
        }
    }
    Ok(())
}

fn numeric_binop(
    op: BinOp,
    left: LuaNumber,
    right: LuaNumber,
) -> Result<LuaValue, RuntimeError> {
    use LuaNumber::{Float, Int};
    let value = match op {
        BinOp::Add => match (left, right) {
            (Int(a), Int(b)) => LuaValue::Int(a.wrapping_add(b)),
            (a, b) => LuaValue::Float(a.as_f64() + b.as_f64()),
        },
        BinOp::Sub => match (left, right) {
            (Int(a), Int(b)) => LuaValue::Int(a.wrapping_sub(b)),
            (a, b) => LuaValue::Float(a.as_f64() - b.as_f64()),
        },
        BinOp::Mul => match (left, right) {
            (Int(a), Int(b)) => LuaValue::Int(a.wrapping_mul(b)),
            (a, b) => LuaValue::Float(a.as_f64() * b.as_f64()),
        },
        // `/` always produces a float
        BinOp::Div => LuaValue::Float(left.as_f64() / right.as_f64()),
        BinOp::IntDiv => match (left, right) {
            (Int(_), Int(0)) => {
                return Err(RuntimeError::type_error("attempt to perform 'n//0'"));
            }
            (Int(a), Int(b)) => {
                let mut q = a.wrapping_div(b);
                if a.wrapping_rem(b) != 0 && (a < 0) != (b < 0) {
                    q -= 1;
                }
                LuaValue::Int(q)
            }
            (a, b) => LuaValue::Float((a.as_f64() / b.as_f64()).floor()),
        },
        BinOp::Mod => match (left, right) {
            (Int(_), Int(0)) => {
                return Err(RuntimeError::type_error("attempt to perform 'n%%0'"));
            }
            (Int(a), Int(b)) => {
                let mut r = a.wrapping_rem(b);
                if r != 0 && (r < 0) != (b < 0) {
                    r += b;
                }
                LuaValue::Int(r)
            }
            (a, b) => {
                let (a, b) = (a.as_f64(), b.as_f64());
                LuaValue::Float(a - (a / b).floor() * b)
            }
        },
        // `^` always produces a float
        BinOp::Pow => LuaValue::Float(left.as_f64().powf(right.as_f64())),
        _ => unreachable!(),
    };
    Ok(value)
}

fn integer_operand(value: &LuaValue) -> Result<i64, RuntimeError> {
    match value {
        LuaValue::Int(n) => Ok(*n),
        LuaValue::Float(n) if n.fract() == 0.0 && n.is_finite() => Ok(*n as i64),
        LuaValue::Float(_) => Err(RuntimeError::type_error(
            "number has no integer representation",
        )),
        other => Err(RuntimeError::type_error(format!(
            "bitwise operand must be an integer, got {}",
            other.type_name()
        ))),
    }
}

/// Logical 64-bit shift; counts >= 64 produce 0, negative counts shift the
/// other way (Lua 5.4 semantics).
fn shift(value: i64, amount: i64, left: bool) -> i64 {
    if amount < 0 {
        return shift(value, -amount, !left);
    }
    if amount >= 64 {
        return 0;
    }
    let unsigned = value as u64;
    let shifted = if left {
        unsigned << amount
    } else {
        unsigned >> amount
    };
    shifted as i64
}

fn concat_operand(value: &LuaValue) -> Option<String> {
    match value {
        LuaValue::Str(s) => Some(s.clone()),
        LuaValue::Int(_) | LuaValue::Float(_) => Some(value.to_string()),
        _ => None,
    }
}

pub(crate) fn apply_binop(
    op: BinOp,
    left: &LuaValue,
    right: &LuaValue,
) -> Result<LuaValue, RuntimeError> {
    match op {
        BinOp::Add
        | BinOp::Sub
        | BinOp::Mul
        | BinOp::Div
        | BinOp::IntDiv
        | BinOp::Mod
        | BinOp::Pow => match (left.as_number(), right.as_number()) {
            (Some(a), Some(b)) => numeric_binop(op, a, b),
            _ => Err(RuntimeError::type_error(format!(
                "attempt to perform arithmetic on {} and {}",
                left.type_name(),
                right.type_name()
            ))),
        },

        BinOp::Concat => match (concat_operand(left), concat_operand(right)) {
            (Some(a), Some(b)) => Ok(LuaValue::Str(format!("{}{}", a, b))),
            _ => Err(RuntimeError::type_error(format!(
                "attempt to concatenate {} and {}",
                left.type_name(),
                right.type_name()
            ))),
        },

        BinOp::Eq => Ok(LuaValue::Boolean(left == right)),
        BinOp::Ne => Ok(LuaValue::Boolean(left != right)),

        BinOp::Lt | BinOp::Gt | BinOp::Le | BinOp::Ge => {
            let ordering = match (left, right) {
                (LuaValue::Str(a), LuaValue::Str(b)) => a.cmp(b),
                _ => match (left.as_number(), right.as_number()) {
                    (Some(a), Some(b)) => a
                        .as_f64()
                        .partial_cmp(&b.as_f64())
                        .unwrap_or(std::cmp::Ordering::Equal),
                    _ => {
                        return Err(RuntimeError::type_error(format!(
                            "attempt to compare {} with {}",
                            left.type_name(),
                            right.type_name()
                        )));
                    }
                },
            };
            let result = match op {
                BinOp::Lt => ordering.is_lt(),
                BinOp::Gt => ordering.is_gt(),
                BinOp::Le => ordering.is_le(),
                BinOp::Ge => ordering.is_ge(),
                _ => unreachable!(),
            };
            Ok(LuaValue::Boolean(result))
        }

        BinOp::BitAnd | BinOp::BitOr | BinOp::BitXor | BinOp::Shl | BinOp::Shr => {
            let a = integer_operand(left)?;
            let b = integer_operand(right)?;
            let value = match op {
                BinOp::BitAnd => a & b,
                BinOp::BitOr => a | b,
                BinOp::BitXor => a ^ b,
                BinOp::Shl => shift(a, b, true),
                BinOp::Shr => shift(a, b, false),
                _ => unreachable!(),
            };
            Ok(LuaValue::Int(value))
        }

        BinOp::And | BinOp::Or => unreachable!("short-circuit ops handled in eval"),
    }
}

pub(crate) fn apply_unop(op: UnOp, operand: &LuaValue) -> Result<LuaValue, RuntimeError> {
    match op {
        UnOp::Not => Ok(LuaValue::Boolean(!operand.truthy())),
        UnOp::Neg => match operand {
            LuaValue::Int(n) => Ok(LuaValue::Int(n.wrapping_neg())),
            LuaValue::Float(n) => Ok(LuaValue::Float(-n)),
            other => Err(RuntimeError::type_error(format!(
                "attempt to negate a {} value",
                other.type_name()
            ))),
        },
        // `#` on a string is the byte length of its UTF-8 encoding.
        UnOp::Len => match operand {
            LuaValue::Str(s) => Ok(LuaValue::Int(s.len() as i64)),
            LuaValue::Table(t) => Ok(LuaValue::Int(t.borrow().len())),
            other => Err(RuntimeError::type_error(format!(
                "attempt to get length of a {} value",
                other.type_name()
            ))),
        },
        UnOp::BitNot => Ok(LuaValue::Int(!integer_operand(operand)?)),
    }
}
