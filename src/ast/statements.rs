use crate::ast::expressions::{Expr, FunctionBody};
use crate::ast::tokens::Span;

/// A sequence of statements sharing one scope.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Block {
    pub stmts: Vec<Stmt>,
}

/// A statement with its source span.
#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Span,
}

impl Stmt {
    pub fn new(kind: StmtKind, span: Span) -> Self {
        Stmt { kind, span }
    }
}

/// Statement node kinds.
#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    /// Call used as a statement
    Expr(Expr),

    /// `t1, t2 = e1, e2` — targets are names, fields, or index expressions
    Assign { targets: Vec<Expr>, values: Vec<Expr> },

    /// `local a, b <const> = e1, e2`
    ///
    /// Extra names bind to nil, extra values are discarded.
    Local {
        names: Vec<LocalName>,
        values: Vec<Expr>,
    },

    /// `if c1 then b1 elseif c2 then b2 else b3 end`
    If {
        arms: Vec<(Expr, Block)>,
        else_block: Option<Block>,
    },

    /// `while cond do body end`
    While { cond: Expr, body: Block },

    /// `repeat body until cond`
    Repeat { body: Block, until: Expr },

    /// `for v = start, stop[, step] do body end`
    NumericFor {
        var: String,
        start: Expr,
        stop: Expr,
        step: Option<Expr>,
        body: Block,
    },

    /// `for names in exprs do body end`
    GenericFor {
        names: Vec<String>,
        exprs: Vec<Expr>,
        body: Block,
    },

    /// `function a.b.c:d(params) body end`
    FunctionDecl {
        path: Vec<String>,
        method: Option<String>,
        body: FunctionBody,
    },

    /// `local function name(params) body end`
    LocalFunction { name: String, body: FunctionBody },

    /// `return e1, e2`
    Return(Vec<Expr>),

    /// `break`
    Break,

    /// `::label::`
    Label(String),

    /// `goto label`
    Goto(String),

    /// `do body end`
    Do(Block),
}

/// A name in a `local` declaration with its optional `<const>` attribute.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalName {
    pub name: String,
    pub is_const: bool,
}
