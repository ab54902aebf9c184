use crate::ast::expressions::Expr;

/// Parsed body of a `query[[ ... ]]` block, minus the `from` source
/// expression (which lives on [`crate::ast::ExprKind::Query`]).
///
/// The clause expressions are ordinary language expressions evaluated with
/// the current row bound to `object_variable` (default `_`).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CollectionQuery {
    /// `from name = source` binds each row to `name`; defaults to `_`
    pub object_variable: Option<String>,

    /// `where expr` — rows are kept when the expression is truthy
    pub where_clause: Option<Expr>,

    /// `order by expr [asc|desc], ...` — stable multi-key sort
    pub order_by: Vec<OrderBy>,

    /// `limit n[, m]` — keep at most `n` rows
    pub limit: Option<Expr>,

    /// Offset from `limit n, m` — skip the first `m` rows
    pub offset: Option<Expr>,

    /// `select expr` — projection applied to each surviving row
    pub select: Option<Expr>,
}

/// One `order by` key with its direction.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub expr: Expr,
    pub desc: bool,
}
