//! Collection query engine.
//!
//! A `query[[ from store.pages where ... ]]` block compiles to a
//! [`CollectionQuery`] whose clause expressions are ordinary language
//! expressions. This module runs one against a prefix of the data store:
//! scan, filter, optional sort, offset/limit, projection.
//!
//! Without `order by` the pipeline streams: rows are filtered and projected
//! as the scan produces them, and the scan stops as soon as `limit` rows
//! have been collected.

use std::cmp::Ordering;
use std::rc::Rc;

use crate::ast::{CollectionQuery, Expr, OrderBy};
use crate::evaluator::Evaluator;
use crate::output::to_lua;
use crate::runtime::{LuaEnv, RuntimeError, StackFrame};
use crate::store::{DataStore, KvKey, ScanStep};
use crate::value::{HostObject, LuaValue};

/// Queryable handle over one key prefix of a [`DataStore`].
pub struct Collection {
    store: DataStore,
    prefix: KvKey,
}

impl Collection {
    /// Build the host-object value scripts see, e.g. as `store.pages`.
    pub fn value(store: DataStore, prefix: KvKey) -> LuaValue {
        LuaValue::HostObject(Rc::new(Collection { store, prefix }))
    }
}

impl DataStore {
    /// Queryable handle over `prefix`, ready to expose as a script global.
    pub fn collection(&self, prefix: KvKey) -> LuaValue {
        Collection::value(self.clone(), prefix)
    }
}

impl HostObject for Collection {
    fn type_name(&self) -> &'static str {
        "collection"
    }

    fn query(
        &self,
        query: &CollectionQuery,
        env: &LuaEnv,
        frame: &Rc<StackFrame>,
        evaluator: &Evaluator,
    ) -> Result<Vec<LuaValue>, RuntimeError> {
        run_query(&self.store, &self.prefix, query, env, frame, evaluator)
    }
}

/// Execute a query against every row under `prefix`.
pub fn run_query(
    store: &DataStore,
    prefix: &KvKey,
    query: &CollectionQuery,
    env: &LuaEnv,
    frame: &Rc<StackFrame>,
    evaluator: &Evaluator,
) -> Result<Vec<LuaValue>, RuntimeError> {
    let var = query.object_variable.as_deref().unwrap_or("_");
    let limit = eval_bound(query.limit.as_ref(), "limit", env, frame, evaluator)?;
    let offset =
        eval_bound(query.offset.as_ref(), "offset", env, frame, evaluator)?.unwrap_or(0);

    let rows = if query.order_by.is_empty() {
        stream_rows(
            store, prefix, query, var, limit, offset, env, frame, evaluator,
        )?
    } else {
        sorted_rows(
            store, prefix, query, var, limit, offset, env, frame, evaluator,
        )?
    };

    tracing::debug!(prefix = %prefix, rows = rows.len(), "query complete");
    Ok(rows)
}

/// Evaluate a limit/offset clause to a non-negative count.
fn eval_bound(
    expr: Option<&Expr>,
    clause: &str,
    env: &LuaEnv,
    frame: &Rc<StackFrame>,
    evaluator: &Evaluator,
) -> Result<Option<usize>, RuntimeError> {
    match expr {
        None => Ok(None),
        Some(expr) => {
            let value = evaluator.eval(expr, env, frame)?;
            let n = value.as_integer().ok_or_else(|| {
                RuntimeError::type_error(format!(
                    "'{}' must be an integer, got {}",
                    clause,
                    value.type_name()
                ))
            })?;
            Ok(Some(n.max(0) as usize))
        }
    }
}

/// Bind `var` to `row` in a fresh scope and evaluate `expr` there.
fn eval_clause(
    expr: &Expr,
    var: &str,
    row: &LuaValue,
    env: &LuaEnv,
    frame: &Rc<StackFrame>,
    evaluator: &Evaluator,
) -> Result<LuaValue, RuntimeError> {
    let scope = env.child();
    scope.define_local(var, row.clone(), false);
    evaluator.eval(expr, &scope, frame)
}

fn row_error(key: &KvKey, source: RuntimeError) -> RuntimeError {
    RuntimeError::QueryRow {
        key: key.to_string(),
        source: Box::new(source),
    }
}

#[allow(clippy::too_many_arguments)]
fn stream_rows(
    store: &DataStore,
    prefix: &KvKey,
    query: &CollectionQuery,
    var: &str,
    limit: Option<usize>,
    offset: usize,
    env: &LuaEnv,
    frame: &Rc<StackFrame>,
    evaluator: &Evaluator,
) -> Result<Vec<LuaValue>, RuntimeError> {
    let mut out = Vec::new();
    let mut to_skip = offset;
    // Row-level failures abort the scan; the error rides out through this slot
    // because the scan callback can only carry store errors.
    let mut failure: Option<RuntimeError> = None;

    store.scan(prefix, &mut |entry| {
        if limit == Some(0) {
            return Ok(ScanStep::Stop);
        }
        let row = to_lua(&entry.value);

        if let Some(where_clause) = &query.where_clause {
            match eval_clause(where_clause, var, &row, env, frame, evaluator) {
                Ok(value) => {
                    if !value.truthy() {
                        return Ok(ScanStep::Continue);
                    }
                }
                Err(e) => {
                    failure = Some(row_error(&entry.key, e));
                    return Ok(ScanStep::Stop);
                }
            }
        }

        if to_skip > 0 {
            to_skip -= 1;
            return Ok(ScanStep::Continue);
        }

        let projected = match &query.select {
            Some(select) => match eval_clause(select, var, &row, env, frame, evaluator) {
                Ok(value) => value,
                Err(e) => {
                    failure = Some(row_error(&entry.key, e));
                    return Ok(ScanStep::Stop);
                }
            },
            None => row,
        };
        out.push(projected);

        match limit {
            Some(limit) if out.len() >= limit => Ok(ScanStep::Stop),
            _ => Ok(ScanStep::Continue),
        }
    })?;

    match failure {
        Some(e) => Err(e),
        None => Ok(out),
    }
}

#[allow(clippy::too_many_arguments)]
fn sorted_rows(
    store: &DataStore,
    prefix: &KvKey,
    query: &CollectionQuery,
    var: &str,
    limit: Option<usize>,
    offset: usize,
    env: &LuaEnv,
    frame: &Rc<StackFrame>,
    evaluator: &Evaluator,
) -> Result<Vec<LuaValue>, RuntimeError> {
    // Sorting needs the full filtered set, so materialize first.
    let mut matched: Vec<(KvKey, LuaValue)> = Vec::new();
    let mut failure: Option<RuntimeError> = None;

    store.scan(prefix, &mut |entry| {
        let row = to_lua(&entry.value);
        if let Some(where_clause) = &query.where_clause {
            match eval_clause(where_clause, var, &row, env, frame, evaluator) {
                Ok(value) => {
                    if !value.truthy() {
                        return Ok(ScanStep::Continue);
                    }
                }
                Err(e) => {
                    failure = Some(row_error(&entry.key, e));
                    return Ok(ScanStep::Stop);
                }
            }
        }
        matched.push((entry.key, row));
        Ok(ScanStep::Continue)
    })?;
    if let Some(e) = failure {
        return Err(e);
    }

    // Precompute the sort keys; the comparator itself must be infallible.
    let mut keyed: Vec<(Vec<LuaValue>, KvKey, LuaValue)> = Vec::with_capacity(matched.len());
    for (key, row) in matched {
        let mut sort_key = Vec::with_capacity(query.order_by.len());
        for OrderBy { expr, .. } in &query.order_by {
            let value = eval_clause(expr, var, &row, env, frame, evaluator)
                .map_err(|e| row_error(&key, e))?;
            sort_key.push(value);
        }
        keyed.push((sort_key, key, row));
    }

    // Stable sort, so scan order breaks ties.
    keyed.sort_by(|(a, _, _), (b, _, _)| compare_sort_keys(a, b, &query.order_by));

    let mut out = Vec::new();
    for (_, key, row) in keyed.into_iter().skip(offset) {
        if let Some(limit) = limit {
            if out.len() >= limit {
                break;
            }
        }
        let projected = match &query.select {
            Some(select) => eval_clause(select, var, &row, env, frame, evaluator)
                .map_err(|e| row_error(&key, e))?,
            None => row,
        };
        out.push(projected);
    }
    Ok(out)
}

fn compare_sort_keys(a: &[LuaValue], b: &[LuaValue], order_by: &[OrderBy]) -> Ordering {
    for (i, OrderBy { desc, .. }) in order_by.iter().enumerate() {
        let ordering = compare_values(&a[i], &b[i]);
        let ordering = if *desc { ordering.reverse() } else { ordering };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

/// Total order over sortable values: nil first, then booleans, numbers,
/// strings, everything else. Within a rank, natural order.
fn compare_values(a: &LuaValue, b: &LuaValue) -> Ordering {
    fn rank(v: &LuaValue) -> u8 {
        match v {
            LuaValue::Nil => 0,
            LuaValue::Boolean(_) => 1,
            LuaValue::Int(_) | LuaValue::Float(_) => 2,
            LuaValue::Str(_) => 3,
            _ => 4,
        }
    }
    match (a, b) {
        (LuaValue::Boolean(a), LuaValue::Boolean(b)) => a.cmp(b),
        (LuaValue::Str(a), LuaValue::Str(b)) => a.cmp(b),
        _ => match (a.as_number(), b.as_number()) {
            (Some(a), Some(b)) => a
                .as_f64()
                .partial_cmp(&b.as_f64())
                .unwrap_or(Ordering::Equal),
            _ => rank(a).cmp(&rank(b)),
        },
    }
}
